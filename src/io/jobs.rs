use std::fmt;
use std::io::Read;

use anyhow::Result;

use crate::domain::{AccountId, parse_cents};
use crate::pool::Job;

/// Jobs read from a file, plus the lines that could not be read.
#[derive(Debug, Clone, Default)]
pub struct JobBatch {
    pub jobs: Vec<Job>,
    pub errors: Vec<ImportError>,
}

/// A rejected line of a job file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportError {
    pub line: usize,
    pub field: Option<String>,
    pub error: String,
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "line {} ({}): {}", self.line, field, self.error),
            None => write!(f, "line {}: {}", self.line, self.error),
        }
    }
}

/// Read jobs from CSV with columns `kind,from_account,to_account,amount`.
/// The first line is a header and is skipped.
///
/// Amounts are decimal strings ("50.00"). An empty account column reads as
/// the bank (0). The kind is kept verbatim: workers discard kinds they do
/// not know, so a bad kind is not an import error.
pub fn read_jobs_csv<R: Read>(reader: R) -> Result<JobBatch> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut batch = JobBatch::default();

    for (line_num, result) in csv_reader.records().enumerate() {
        let line = line_num + 2; // +2 for header and 0-indexing

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                batch.errors.push(ImportError {
                    line,
                    field: None,
                    error: format!("CSV parse error: {}", e),
                });
                continue;
            }
        };

        let kind = record.get(0).unwrap_or("");
        let from_account = match parse_account(record.get(1).unwrap_or("")) {
            Ok(id) => id,
            Err(error) => {
                batch.errors.push(ImportError {
                    line,
                    field: Some("from_account".to_string()),
                    error,
                });
                continue;
            }
        };
        let to_account = match parse_account(record.get(2).unwrap_or("")) {
            Ok(id) => id,
            Err(error) => {
                batch.errors.push(ImportError {
                    line,
                    field: Some("to_account".to_string()),
                    error,
                });
                continue;
            }
        };
        let amount_cents = match parse_cents(record.get(3).unwrap_or("")) {
            Ok(a) => a,
            Err(e) => {
                batch.errors.push(ImportError {
                    line,
                    field: Some("amount".to_string()),
                    error: format!("Invalid amount: {}", e),
                });
                continue;
            }
        };

        batch
            .jobs
            .push(Job::new(from_account, to_account, amount_cents, kind));
    }

    Ok(batch)
}

fn parse_account(value: &str) -> Result<AccountId, String> {
    if value.is_empty() {
        return Ok(0);
    }
    match value.parse::<AccountId>() {
        Ok(id) if id >= 0 => Ok(id),
        _ => Err(format!("Invalid account id '{}'", value)),
    }
}
