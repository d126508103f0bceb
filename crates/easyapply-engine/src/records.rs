//! Append-only log of processed postings.
//!
//! Rows have no header: `timestamp,jobID,job,company,attempted,result`.

use chrono::{Local, NaiveDateTime, TimeDelta};
use regex::Regex;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEDUP_WINDOW_DAYS: i64 = 2;

static UNREAD_COUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\d*\)").unwrap());

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRecord {
    pub timestamp: NaiveDateTime,
    pub job_id: String,
    pub job: String,
    pub company: String,
    pub attempted: bool,
    pub result: bool,
}

impl ApplicationRecord {
    /// Record stamped with the current local time.
    pub fn now(
        job_id: impl Into<String>,
        browser_title: &str,
        attempted: bool,
        result: bool,
    ) -> Self {
        let (job, company) = parse_browser_title(browser_title);
        Self {
            timestamp: Local::now().naive_local(),
            job_id: job_id.into(),
            job,
            company,
            attempted,
            result,
        }
    }

    fn to_row(&self) -> [String; 6] {
        [
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.job_id.clone(),
            self.job.clone(),
            self.company.clone(),
            py_bool(self.attempted).to_string(),
            py_bool(self.result).to_string(),
        ]
    }

    fn from_row(row: &csv::StringRecord) -> Option<Self> {
        let timestamp = NaiveDateTime::parse_from_str(row.get(0)?.trim(), TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            timestamp,
            job_id: row.get(1)?.trim().to_string(),
            job: row.get(2).unwrap_or_default().to_string(),
            company: row.get(3).unwrap_or_default().to_string(),
            attempted: row.get(4).is_some_and(parse_bool),
            result: row.get(5).is_some_and(parse_bool),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ApplicationLog {
    path: PathBuf,
}

impl ApplicationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &ApplicationRecord) -> Result<(), RecordError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| RecordError::Io {
                path: self.path.clone(),
                source,
            })?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .write_record(record.to_row())
            .map_err(|source| RecordError::Csv {
                path: self.path.clone(),
                source,
            })?;
        writer.flush().map_err(|source| RecordError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!("Recorded job {} in {}", record.job_id, self.path.display());
        Ok(())
    }

    /// Every parseable row. Rows with a malformed timestamp are skipped.
    pub fn read_all(&self) -> Result<Vec<ApplicationRecord>, RecordError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|source| RecordError::Csv {
                path: self.path.clone(),
                source,
            })?;
        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|source| RecordError::Csv {
                path: self.path.clone(),
                source,
            })?;
            match ApplicationRecord::from_row(&row) {
                Some(record) => records.push(record),
                None => debug!("Skipping malformed record {:?}", row),
            }
        }
        Ok(records)
    }

    /// Job IDs recorded within the last `DEDUP_WINDOW_DAYS` days.
    pub fn recent_job_ids(&self) -> HashSet<String> {
        self.job_ids_since(Local::now().naive_local() - TimeDelta::days(DEDUP_WINDOW_DAYS))
    }

    pub fn job_ids_since(&self, cutoff: NaiveDateTime) -> HashSet<String> {
        let records = match self.read_all() {
            Ok(records) => records,
            Err(e) => {
                info!("{} could not be loaded ({}); starting fresh", self.path.display(), e);
                return HashSet::new();
            }
        };
        let ids: HashSet<String> = records
            .into_iter()
            .filter(|r| r.timestamp > cutoff && !r.job_id.is_empty())
            .map(|r| r.job_id)
            .collect();
        info!("{} jobIDs found", ids.len());
        ids
    }
}

/// Split a browser title of the form `"(N) Title | Company | Site"`.
///
/// Returns `(title, company)`; a missing company is empty.
pub fn parse_browser_title(browser_title: &str) -> (String, String) {
    let mut parts = browser_title.split(" | ");
    let job = parts.next().unwrap_or_default();
    let job = UNREAD_COUNT.replace_all(job, "").trim().to_string();
    let company = parts.next().unwrap_or_default().trim().to_string();
    (job, company)
}

fn py_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

fn parse_bool(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn at(ts: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn test_parse_browser_title() {
        assert_eq!(
            parse_browser_title("(3) Rust Developer | Acme Corp | LinkedIn"),
            ("Rust Developer".to_string(), "Acme Corp".to_string())
        );
        assert_eq!(
            parse_browser_title("Developer"),
            ("Developer".to_string(), String::new())
        );
    }

    #[test]
    fn test_row_format() {
        let dir = TempDir::new().unwrap();
        let log = ApplicationLog::new(dir.path().join("output.csv"));
        let record = ApplicationRecord {
            timestamp: at("2024-05-01 09:30:00"),
            job_id: "42".into(),
            job: "Developer".into(),
            company: "Acme, Inc".into(),
            attempted: true,
            result: false,
        };
        log.append(&record).unwrap();
        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            content,
            "2024-05-01 09:30:00,42,Developer,\"Acme, Inc\",True,False\n"
        );
        assert_eq!(log.read_all().unwrap(), vec![record]);
    }

    #[test]
    fn test_job_ids_since_window() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.csv");
        std::fs::write(
            &path,
            "2024-05-01 09:00:00,1,Old,Co,True,True\n\
             2024-05-03 09:00:00,2,New,Co,True,False\n\
             garbage,3,Bad,Co,True,True\n",
        )
        .unwrap();
        let ids = ApplicationLog::new(path).job_ids_since(at("2024-05-02 00:00:00"));
        assert_eq!(ids, HashSet::from(["2".to_string()]));
    }

    #[test]
    fn test_missing_file_yields_empty_set() {
        let dir = TempDir::new().unwrap();
        let log = ApplicationLog::new(dir.path().join("nope.csv"));
        assert!(log.recent_job_ids().is_empty());
    }
}
