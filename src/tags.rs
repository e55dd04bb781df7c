//! Classification of trial file names into walking-type and phone-position tags.

use serde::{Deserialize, Serialize};

/// Fixed token vocabulary used to classify file names.
///
/// Tokens are matched case-sensitively against the `_`-separated parts of a
/// file name.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Vocabulary {
    /// Recognized walking-type tokens.
    pub walking_types: Vec<String>,
    /// Recognized phone-position tokens.
    pub phone_positions: Vec<String>,
    /// Position reported when no phone-position token matches.
    pub unknown_position: String,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let to_strings = |tokens: &[&str]| -> Vec<String> {
            tokens.iter().map(|tok| tok.to_string()).collect()
        };
        Self {
            walking_types: to_strings(&[
                "PLAIN",
                "WALKING",
                "RUNNING",
                "IRREGULAR",
                "STEPS",
                "BABY",
                "UPHILL",
                "DOWNHILL",
            ]),
            phone_positions: to_strings(&["HAND", "SHOULDER", "POCKET"]),
            unknown_position: "unknown".to_string(),
        }
    }
}

/// Structured tag derived from a file name.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct TrialTag {
    /// Matched walking-type tokens, in file-name order.
    pub walking_types: Vec<String>,
    /// First matched phone-position token, if any.
    pub position: Option<String>,
}

impl TrialTag {
    pub fn walking_type(&self) -> String {
        self.walking_types.join("_")
    }

    pub fn position_or<'a>(&'a self, unknown: &'a str) -> &'a str {
        self.position.as_deref().unwrap_or(unknown)
    }

    /// Walking-type tokens and position joined with `_`.
    pub fn label(&self, vocab: &Vocabulary) -> String {
        let position = self.position_or(&vocab.unknown_position);
        if self.walking_types.is_empty() {
            position.to_string()
        } else {
            format!("{}_{}", self.walking_type(), position)
        }
    }
}

pub fn classify(file_name: &str, vocab: &Vocabulary) -> TrialTag {
    let parts: Vec<&str> = file_name.split('_').collect();

    let walking_types = parts
        .iter()
        .filter(|part| vocab.walking_types.iter().any(|tok| tok == *part))
        .map(|part| part.to_string())
        .collect();

    let position = parts
        .iter()
        .find(|part| vocab.phone_positions.iter().any(|tok| tok == *part))
        .map(|part| part.to_string());

    TrialTag {
        walking_types,
        position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walking_pocket() {
        let vocab = Vocabulary::default();
        let tag = classify("RUN1_WALKING_POCKET_03", &vocab);
        assert_eq!(tag.walking_types, vec!["WALKING"]);
        assert_eq!(tag.position.as_deref(), Some("POCKET"));
        assert_eq!(tag.label(&vocab), "WALKING_POCKET");
    }

    #[test]
    fn missing_position_is_unknown() {
        let vocab = Vocabulary::default();
        let tag = classify("RUN2_UPHILL_WALKING_07", &vocab);
        assert_eq!(tag.position, None);
        assert_eq!(tag.position_or(&vocab.unknown_position), "unknown");
        assert_eq!(tag.label(&vocab), "UPHILL_WALKING_unknown");
    }

    #[test]
    fn matching_is_case_sensitive_and_whole_token() {
        let vocab = Vocabulary::default();
        let tag = classify("walking_Pocket_HANDS_BABYSTEPS", &vocab);
        assert!(tag.walking_types.is_empty());
        assert_eq!(tag.position, None);
        assert_eq!(tag.label(&vocab), "unknown");
    }

    #[test]
    fn first_position_wins() {
        let vocab = Vocabulary::default();
        let tag = classify("BABY_STEPS_HAND_SHOULDER", &vocab);
        assert_eq!(tag.walking_type(), "BABY_STEPS");
        assert_eq!(tag.position.as_deref(), Some("HAND"));
    }

    #[test]
    fn custom_vocabulary() {
        let vocab = Vocabulary {
            walking_types: vec!["STAIRS".to_string()],
            phone_positions: vec!["BAG".to_string()],
            unknown_position: "n/a".to_string(),
        };
        assert_eq!(classify("T1_STAIRS_BAG", &vocab).label(&vocab), "STAIRS_BAG");
        assert_eq!(classify("T1_WALKING_POCKET", &vocab).label(&vocab), "n/a");
    }
}
