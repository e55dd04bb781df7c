use crate::tags::Vocabulary;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Run configuration.
///
/// Every section and field is optional; missing values fall back to the
/// built-in defaults. See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub summary: SummaryConfig,
    pub vocabulary: Vocabulary,
    pub graphs: GraphsConfig,
}

/// Error summary parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SummaryConfig {
    /// Minimum number of records needed to compute quartiles.
    pub min_records: usize,
    /// Tukey fence multiplier applied to the IQR.
    pub fence_factor: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            min_records: 4,
            fence_factor: 1.5,
        }
    }
}

/// Graph generation parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphsConfig {
    /// Ground-truth step count of every trial.
    pub truth: f64,
    /// Preferred names of the step-count column, in order.
    pub step_candidates: Vec<String>,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Seed of the point jitter.
    pub jitter_seed: u64,
}

impl Default for GraphsConfig {
    fn default() -> Self {
        Self {
            truth: 50.0,
            step_candidates: ["steps_counted", "step_count", "steps", "counted_steps", "algo_steps"]
                .iter()
                .map(|name| name.to_string())
                .collect(),
            width: 1000,
            height: 500,
            jitter_seed: 42,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_num(self.summary.min_records, 1..=1_000_000)
            .context("invalid minimum number of records")?;
        check_num(self.summary.fence_factor, 0.0..=10.0).context("invalid fence factor")?;

        check_tokens(&self.vocabulary.walking_types).context("invalid walking types")?;
        check_tokens(&self.vocabulary.phone_positions).context("invalid phone positions")?;
        if self.vocabulary.unknown_position.is_empty() {
            bail!("unknown position label must not be empty");
        }

        check_num(self.graphs.truth, 0.0..1e9).context("invalid ground truth")?;
        if self.graphs.step_candidates.is_empty() {
            bail!("step column candidates must not be empty");
        }
        check_num(self.graphs.width, 200..=8000).context("invalid image width")?;
        check_num(self.graphs.height, 200..=8000).context("invalid image height")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_tokens(tokens: &[String]) -> Result<()> {
    if tokens.is_empty() {
        bail!("token list must not be empty");
    }
    // Tokens are matched against `_`-separated parts, so they cannot span one.
    if let Some(tok) = tokens.iter().find(|tok| tok.is_empty() || tok.contains('_')) {
        bail!("token must be non-empty and free of '_', but is {tok:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            "[graphs]\n\
             truth = 100.0\n\
             \n\
             [vocabulary]\n\
             phone_positions = [\"HAND\", \"BAG\"]\n",
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.graphs.truth, 100.0);
        assert_eq!(config.graphs.width, 1000);
        assert_eq!(config.vocabulary.phone_positions, vec!["HAND", "BAG"]);
        assert_eq!(config.vocabulary.walking_types.len(), 8);
        assert_eq!(config.summary, SummaryConfig::default());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[summary]\nfence = 3.0\n");
        assert!(result.is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = Config::default();
        config.summary.min_records = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.vocabulary.walking_types = vec!["BABY_STEPS".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.graphs.truth = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.graphs.width = 10;
        assert!(config.validate().is_err());
    }
}
