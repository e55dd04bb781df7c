use crate::error::Error;
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use std::{fs::File, io::Read, path::Path, str::FromStr};

/// One measurement trial of a step-counting algorithm.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct TrialRecord {
    /// Identifier encoding walking-type and phone-position tags.
    pub file_name: String,
    /// Absolute difference between counted steps and ground truth.
    pub absolute_error: u64,
    /// Steps counted by the live algorithm.
    pub steps_live: i64,
    /// Steps counted by the batch algorithm.
    pub steps_batch: i64,
}

/// Ordered, immutable sequence of trial records.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<TrialRecord>,
}

const COL_FILE_NAME: &str = "file_name";
const COL_ABSOLUTE_ERROR: &str = "absolute_error";
const COL_STEPS_LIVE: &str = "steps_live";
const COL_STEPS_BATCH: &str = "steps_batch";

/// Column positions of the required fields within the header row.
struct Columns {
    file_name: usize,
    absolute_error: usize,
    steps_live: usize,
    steps_batch: usize,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self, Error> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim() == name)
                .ok_or_else(|| Error::Schema {
                    column: name.to_string(),
                })
        };
        Ok(Self {
            file_name: find(COL_FILE_NAME)?,
            absolute_error: find(COL_ABSOLUTE_ERROR)?,
            steps_live: find(COL_STEPS_LIVE)?,
            steps_batch: find(COL_STEPS_BATCH)?,
        })
    }
}

fn parse_cell<T: FromStr>(record: &StringRecord, idx: usize, column: &str) -> Result<T, Error> {
    let value = record.get(idx).unwrap_or("").trim();
    value.parse().map_err(|_| Error::Parse {
        line: record.position().map_or(0, |pos| pos.line()),
        column: column.to_string(),
        value: value.to_string(),
    })
}

impl Dataset {
    pub fn from_records(records: Vec<TrialRecord>) -> Self {
        Self { records }
    }

    /// Load a [`Dataset`] from a CSV file with a header row.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, a required column is
    /// missing, or a numeric cell is not an integer.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self, Error> {
        let file = File::open(file.as_ref()).map_err(csv::Error::from)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let cols = Columns::locate(reader.headers()?)?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let record = TrialRecord {
                file_name: row.get(cols.file_name).unwrap_or("").trim().to_string(),
                absolute_error: parse_cell(&row, cols.absolute_error, COL_ABSOLUTE_ERROR)?,
                steps_live: parse_cell(&row, cols.steps_live, COL_STEPS_LIVE)?,
                steps_batch: parse_cell(&row, cols.steps_batch, COL_STEPS_BATCH)?,
            };
            log::debug!("{record:?}");
            records.push(record);
        }

        Ok(Self { records })
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_records_in_order() {
        let csv = "\
file_name,steps_live,steps_batch,absolute_error,notes
RUN1_WALKING_POCKET_03,48,51,2,ok
RUN1_RUNNING_HAND_01,60,58,10,
";
        let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(
            dataset.records()[0],
            TrialRecord {
                file_name: "RUN1_WALKING_POCKET_03".to_string(),
                absolute_error: 2,
                steps_live: 48,
                steps_batch: 51,
            }
        );
        assert_eq!(dataset.records()[1].absolute_error, 10);
        assert_eq!(dataset.records()[1].steps_batch, 58);
    }

    #[test]
    fn header_only_is_empty() {
        let csv = "file_name,absolute_error,steps_live,steps_batch\n";
        let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 0);
    }

    #[test]
    fn missing_column_is_schema_error() {
        let csv = "file_name,absolute_error,steps_live\nA,1,2\n";
        let err = Dataset::from_reader(csv.as_bytes()).unwrap_err();
        assert!(
            matches!(&err, Error::Schema { column } if column == "steps_batch"),
            "{err:?}"
        );
    }

    #[test]
    fn non_integer_error_is_parse_error() {
        let csv = "\
file_name,absolute_error,steps_live,steps_batch
A,1,50,50
B,2.5,50,50
";
        let err = Dataset::from_reader(csv.as_bytes()).unwrap_err();
        match err {
            Error::Parse {
                line,
                column,
                value,
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, "absolute_error");
                assert_eq!(value, "2.5");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn negative_error_is_rejected() {
        let csv = "file_name,absolute_error,steps_live,steps_batch\nA,-3,47,47\n";
        let err = Dataset::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "{err:?}");
    }
}
