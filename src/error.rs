use thiserror::Error;

/// Failures of the data path: loading a dataset and summarizing it.
#[derive(Debug, Error)]
pub enum Error {
    /// A required column is absent from the header row.
    #[error("required column {column:?} is missing")]
    Schema { column: String },

    /// A numeric cell could not be parsed.
    #[error("line {line}: column {column:?} has non-integer value {value:?}")]
    Parse {
        line: u64,
        column: String,
        value: String,
    },

    #[error("dataset has no records")]
    EmptyDataset,

    /// Quartile indices degenerate below this size.
    #[error("dataset has {found} records, but at least {min} are required")]
    TooFewRecords { found: usize, min: usize },

    /// Outlier removal left nothing to average.
    #[error("no records left after removing outliers")]
    InsufficientData,

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
