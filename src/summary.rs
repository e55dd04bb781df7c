use crate::config::SummaryConfig;
use crate::dataset::{Dataset, TrialRecord};
use crate::error::Error;
use crate::stats::{Fences, Quartiles, compute_mean};
use crate::tags::{Vocabulary, classify};
use serde::Serialize;
use std::fmt;

/// Distribution of the absolute errors of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Distribution {
    pub n_records: usize,
    #[serde(flatten)]
    pub quartiles: Quartiles,
    pub iqr: u64,
    pub fences: Fences,
}

impl Distribution {
    pub fn new(dataset: &Dataset, cfg: &SummaryConfig) -> Result<Self, Error> {
        let n_records = dataset.len();
        if n_records == 0 {
            return Err(Error::EmptyDataset);
        }
        if n_records < cfg.min_records {
            return Err(Error::TooFewRecords {
                found: n_records,
                min: cfg.min_records,
            });
        }

        let mut errors: Vec<u64> = dataset.records().iter().map(|r| r.absolute_error).collect();
        errors.sort_unstable();
        let quartiles = Quartiles::from_sorted(&errors).ok_or(Error::EmptyDataset)?;

        Ok(Self {
            n_records,
            quartiles,
            iqr: quartiles.iqr(),
            fences: quartiles.fences(cfg.fence_factor),
        })
    }
}

/// Disjoint split of a dataset into outliers and non-outliers.
#[derive(Debug)]
pub struct Partition<'a> {
    pub outliers: Vec<&'a TrialRecord>,
    pub non_outliers: Vec<&'a TrialRecord>,
}

impl<'a> Partition<'a> {
    pub fn new(records: &'a [TrialRecord], fences: &Fences) -> Self {
        let (non_outliers, outliers): (Vec<_>, Vec<_>) = records
            .iter()
            .partition(|r| fences.contains(r.absolute_error as f64));
        Self {
            outliers,
            non_outliers,
        }
    }

    pub fn non_outlier_mean(&self) -> Result<f64, Error> {
        compute_mean(&errors_of(&self.non_outliers)).ok_or(Error::InsufficientData)
    }

    pub fn outlier_mean(&self) -> Option<f64> {
        compute_mean(&errors_of(&self.outliers))
    }
}

fn errors_of(records: &[&TrialRecord]) -> Vec<f64> {
    records.iter().map(|r| r.absolute_error as f64).collect()
}

/// An outlier record with its classified tags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierEntry {
    pub file_name: String,
    pub label: String,
    pub walking_type: String,
    pub position: String,
    pub absolute_error: u64,
    pub steps_live: i64,
    pub steps_batch: i64,
}

/// Outlier-aware summary of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub source: String,
    pub distribution: Distribution,
    /// Outlier errors, ascending.
    pub outlier_values: Vec<u64>,
    /// Outlier records, in dataset order.
    pub outliers: Vec<OutlierEntry>,
    pub n_non_outliers: usize,
    pub mean_all: f64,
    pub mean_no_outliers: f64,
    pub reduction: f64,
    /// `None` when `mean_all` is zero.
    pub reduction_pct: Option<f64>,
}

pub struct ErrorSummarizer {
    cfg: SummaryConfig,
    vocab: Vocabulary,
}

impl ErrorSummarizer {
    pub fn new(cfg: SummaryConfig, vocab: Vocabulary) -> Self {
        Self { cfg, vocab }
    }

    /// Summarize the absolute errors of `dataset`.
    ///
    /// # Errors
    /// Returns an error if the dataset is empty or smaller than the configured
    /// minimum, or if no record survives outlier removal.
    pub fn summarize(&self, source: &str, dataset: &Dataset) -> Result<Report, Error> {
        let distribution = Distribution::new(dataset, &self.cfg)?;

        let partition = Partition::new(dataset.records(), &distribution.fences);
        log::info!(
            "{source}: {} outliers among {} records",
            partition.outliers.len(),
            distribution.n_records
        );

        let all_errors: Vec<f64> = dataset
            .records()
            .iter()
            .map(|r| r.absolute_error as f64)
            .collect();
        let mean_all = compute_mean(&all_errors).ok_or(Error::EmptyDataset)?;
        let mean_no_outliers = partition.non_outlier_mean()?;
        log::debug!("{source}: outlier mean {:?}", partition.outlier_mean());

        let reduction = mean_all - mean_no_outliers;
        let reduction_pct = (mean_all != 0.0).then(|| reduction / mean_all * 100.0);

        let mut outlier_values: Vec<u64> =
            partition.outliers.iter().map(|r| r.absolute_error).collect();
        outlier_values.sort_unstable();

        let outliers = partition
            .outliers
            .iter()
            .map(|r| self.outlier_entry(r))
            .collect();

        Ok(Report {
            source: source.to_string(),
            distribution,
            outlier_values,
            outliers,
            n_non_outliers: partition.non_outliers.len(),
            mean_all,
            mean_no_outliers,
            reduction,
            reduction_pct,
        })
    }

    fn outlier_entry(&self, record: &TrialRecord) -> OutlierEntry {
        let tag = classify(&record.file_name, &self.vocab);
        OutlierEntry {
            file_name: record.file_name.clone(),
            label: tag.label(&self.vocab),
            walking_type: tag.walking_type(),
            position: tag.position_or(&self.vocab.unknown_position).to_string(),
            absolute_error: record.absolute_error,
            steps_live: record.steps_live,
            steps_batch: record.steps_batch,
        }
    }
}

const RULE_WIDTH: usize = 60;

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);
        let dist = &self.distribution;

        writeln!(f, "{rule}")?;
        writeln!(f, "ABSOLUTE ERROR ANALYSIS - {}", self.source)?;
        writeln!(f, "{rule}")?;
        writeln!(f)?;
        writeln!(f, "Total records: {}", dist.n_records)?;
        writeln!(f)?;
        writeln!(f, "Distribution statistics:")?;
        writeln!(f, "  Q1 (25th percentile): {}", dist.quartiles.q1)?;
        writeln!(f, "  Median (50th percentile): {:.2}", dist.quartiles.median)?;
        writeln!(f, "  Q3 (75th percentile): {}", dist.quartiles.q3)?;
        writeln!(f, "  IQR (interquartile range): {}", dist.iqr)?;
        writeln!(f)?;
        writeln!(f, "Outlier bounds (IQR method):")?;
        writeln!(f, "  Lower bound: {:.2}", dist.fences.lower)?;
        writeln!(f, "  Upper bound: {:.2}", dist.fences.upper)?;
        writeln!(f)?;
        writeln!(f, "Outliers found: {}", self.outliers.len())?;
        if !self.outliers.is_empty() {
            writeln!(f, "  Values: {:?}", self.outlier_values)?;
            writeln!(f)?;
            writeln!(f, "  Files with outliers:")?;
            for entry in &self.outliers {
                writeln!(
                    f,
                    "    - {}: error={} (live={}, batch={})",
                    entry.label, entry.absolute_error, entry.steps_live, entry.steps_batch
                )?;
            }
        }
        writeln!(f)?;
        writeln!(f, "Non-outlier records: {}", self.n_non_outliers)?;
        writeln!(f)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "RESULTS")?;
        writeln!(f, "{rule}")?;
        writeln!(f)?;
        writeln!(f, "Mean absolute error (with outliers):    {:.2}", self.mean_all)?;
        writeln!(f, "Mean absolute error (without outliers): {:.2}", self.mean_no_outliers)?;
        writeln!(f)?;
        match self.reduction_pct {
            Some(pct) => writeln!(f, "Error reduction: {:.2} ({pct:.2}%)", self.reduction)?,
            None => writeln!(f, "Error reduction: {:.2} (N/A)", self.reduction)?,
        }
        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(file_name: &str, absolute_error: u64) -> TrialRecord {
        TrialRecord {
            file_name: file_name.to_string(),
            absolute_error,
            steps_live: 50 + absolute_error as i64,
            steps_batch: 50,
        }
    }

    fn dataset(errors: &[u64]) -> Dataset {
        let records = errors
            .iter()
            .enumerate()
            .map(|(idx, &err)| record(&format!("RUN{idx}_WALKING_POCKET_{idx:02}"), err))
            .collect();
        Dataset::from_records(records)
    }

    fn summarizer() -> ErrorSummarizer {
        ErrorSummarizer::new(SummaryConfig::default(), Vocabulary::default())
    }

    #[test]
    fn extreme_value_is_outlier() {
        let data = dataset(&[1, 2, 2, 3, 3, 3, 4, 4, 5, 100]);
        let report = summarizer().summarize("verification.csv", &data).unwrap();

        assert_eq!(report.distribution.quartiles.q1, 2);
        assert_eq!(report.distribution.quartiles.q3, 4);
        assert_eq!(report.distribution.iqr, 2);
        assert_eq!(report.distribution.fences.upper, 7.0);
        assert_eq!(report.outlier_values, vec![100]);
        assert_eq!(report.outliers[0].label, "WALKING_POCKET");
        assert_eq!(report.outliers[0].steps_live, 150);
        assert_eq!(report.n_non_outliers, 9);
        assert!(report.mean_no_outliers < report.mean_all);
        assert!((report.mean_all - 12.7).abs() < 1e-9);
        assert!((report.mean_no_outliers - 3.0).abs() < 1e-9);
    }

    #[test]
    fn identical_errors_have_no_outliers() {
        let data = dataset(&[5; 10]);
        let report = summarizer().summarize("flat.csv", &data).unwrap();

        assert_eq!(report.distribution.iqr, 0);
        assert_eq!(report.distribution.fences.lower, 5.0);
        assert_eq!(report.distribution.fences.upper, 5.0);
        assert!(report.outliers.is_empty());
        assert_eq!(report.mean_all, 5.0);
        assert_eq!(report.mean_no_outliers, 5.0);
        assert_eq!(report.reduction, 0.0);
        assert_eq!(report.reduction_pct, Some(0.0));
    }

    #[test]
    fn partition_covers_every_record_once() {
        let data = dataset(&[0, 40, 3, 4, 2, 90, 3, 5, 1, 4, 3, 2]);
        let dist = Distribution::new(&data, &SummaryConfig::default()).unwrap();
        let partition = Partition::new(data.records(), &dist.fences);

        assert_eq!(
            partition.outliers.len() + partition.non_outliers.len(),
            data.len()
        );
        for r in data.records() {
            let in_out = partition.outliers.iter().any(|o| std::ptr::eq(*o, r));
            let in_non = partition.non_outliers.iter().any(|o| std::ptr::eq(*o, r));
            assert!(in_out ^ in_non, "{r:?}");
        }
    }

    #[test]
    fn mean_is_weighted_combination_of_subsets() {
        let data = dataset(&[0, 40, 3, 4, 2, 90, 3, 5, 1, 4, 3, 2]);
        let report = summarizer().summarize("mixed.csv", &data).unwrap();
        let dist = report.distribution;
        let partition = Partition::new(data.records(), &dist.fences);

        let n_out = partition.outliers.len() as f64;
        let n_non = partition.non_outliers.len() as f64;
        let combined = (n_non * partition.non_outlier_mean().unwrap()
            + n_out * partition.outlier_mean().unwrap_or(0.0))
            / (n_out + n_non);
        assert!((combined - report.mean_all).abs() < 1e-9);
    }

    #[test]
    fn zero_errors_report_na_reduction() {
        let data = dataset(&[0; 6]);
        let report = summarizer().summarize("perfect.csv", &data).unwrap();
        assert_eq!(report.mean_all, 0.0);
        assert_eq!(report.reduction_pct, None);
        assert!(report.to_string().contains("Error reduction: 0.00 (N/A)"));
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let err = summarizer()
            .summarize("empty.csv", &Dataset::default())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyDataset), "{err:?}");
    }

    #[test]
    fn small_dataset_is_rejected() {
        let err = summarizer()
            .summarize("small.csv", &dataset(&[1, 2, 3]))
            .unwrap_err();
        assert!(
            matches!(err, Error::TooFewRecords { found: 3, min: 4 }),
            "{err:?}"
        );
    }

    #[test]
    fn all_outliers_leave_nothing_to_average() {
        let data = dataset(&[1, 2, 3, 4]);
        let fences = Fences {
            lower: 10.0,
            upper: 20.0,
        };
        let partition = Partition::new(data.records(), &fences);
        assert_eq!(partition.outliers.len(), 4);
        let err = partition.non_outlier_mean().unwrap_err();
        assert!(matches!(err, Error::InsufficientData), "{err:?}");
    }

    #[test]
    fn text_report_layout() {
        let mut records: Vec<_> = [3, 4, 3, 5, 4, 2, 3, 4]
            .iter()
            .map(|&e| record("RUN_PLAIN_HAND", e))
            .collect();
        records.push(record("RUN9_UPHILL_WALKING_77", 60));
        let report = summarizer()
            .summarize("verification.csv", &Dataset::from_records(records))
            .unwrap();
        let text = report.to_string();

        assert!(text.starts_with(&"=".repeat(60)));
        assert!(text.contains("ABSOLUTE ERROR ANALYSIS - verification.csv"));
        assert!(text.contains("Total records: 9"));
        assert!(text.contains("  Values: [60]"));
        assert!(text.contains("    - UPHILL_WALKING_unknown: error=60 (live=110, batch=50)"));
        assert!(text.contains("Non-outlier records: 8"));
        assert!(text.contains("Mean absolute error (with outliers):    9.78"));
        assert!(text.contains("Mean absolute error (without outliers): 3.50"));
    }
}
