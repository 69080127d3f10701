use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use serde::{Deserialize, Serialize};

use crate::lock::{lock_path_for, FileLock};

/// Last persisted score for an ordered pair of identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub url1: String,
    pub url2: String,
    pub score: f64,
    pub stale: bool,
}

/// What `record` did to the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordOutcome {
    Inserted,
    Updated { previous: f64, was_stale: bool },
    /// The stored score is higher and not stale, so it was kept.
    Unchanged { stored: f64 },
}

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed record on line {line}: {reason}")]
    Malformed { line: u64, reason: String },
}

pub trait ScoreCache: Send + Sync {
    /// Persist `score` for the ordered pair `(url1, url2)`.
    ///
    /// A new pair is inserted as fresh. An existing record is overwritten only
    /// when the new score is higher or the record is stale; an overwrite always
    /// clears the stale flag.
    fn record(&self, url1: &str, url2: &str, score: f64) -> Result<RecordOutcome, CacheError>;
    fn get(&self, url1: &str, url2: &str) -> Result<Option<CacheRecord>, CacheError>;
    fn list(&self) -> Result<Vec<CacheRecord>, CacheError>;
    /// Force the next `record` of this pair to overwrite. Returns false when
    /// the pair has no record.
    fn mark_stale(&self, url1: &str, url2: &str) -> Result<bool, CacheError>;
    fn mark_all_stale(&self) -> Result<usize, CacheError>;
}

/// Apply the insert-or-update rule to an in-memory record list.
pub fn apply_record(
    records: &mut Vec<CacheRecord>,
    url1: &str,
    url2: &str,
    score: f64,
) -> RecordOutcome {
    let existing = records
        .iter_mut()
        .find(|r| r.url1 == url1 && r.url2 == url2);

    match existing {
        None => {
            records.push(CacheRecord {
                url1: url1.to_string(),
                url2: url2.to_string(),
                score,
                stale: false,
            });
            RecordOutcome::Inserted
        }
        Some(record) if record.score < score || record.stale => {
            let outcome = RecordOutcome::Updated {
                previous: record.score,
                was_stale: record.stale,
            };
            record.score = score;
            record.stale = false;
            outcome
        }
        Some(record) => RecordOutcome::Unchanged {
            stored: record.score,
        },
    }
}

#[derive(Debug, Clone)]
pub struct CsvScoreCache {
    /// Serialises read-modify-write within this process; the file lock covers
    /// other processes. Records always come from the file.
    write_guard: Arc<Mutex<()>>,
    path: PathBuf,
    lock_path: PathBuf,
}

const CSV_HEADERS: [&str; 4] = ["url1", "url2", "score", "stale"];

fn malformed(line: u64, reason: impl Into<String>) -> CacheError {
    CacheError::Malformed {
        line,
        reason: reason.into(),
    }
}

fn parse_stale(value: &str) -> Option<bool> {
    match value {
        "0" | "false" => Some(false),
        "1" | "true" => Some(true),
        _ => None,
    }
}

fn read_records(path: &Path) -> Result<Vec<CacheRecord>, CacheError> {
    let now = Instant::now();
    let mut csv_reader = csv::Reader::from_path(path)?;

    let mut records = vec![];
    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let url1 = record
            .get(0)
            .ok_or_else(|| malformed(line, "missing url1"))?
            .to_string();
        let url2 = record
            .get(1)
            .ok_or_else(|| malformed(line, "missing url2"))?
            .to_string();
        let score = record
            .get(2)
            .ok_or_else(|| malformed(line, "missing score"))?
            .parse::<f64>()
            .map_err(|e| malformed(line, format!("score: {e}")))?;
        let stale = record
            .get(3)
            .and_then(parse_stale)
            .ok_or_else(|| malformed(line, "stale must be 0 or 1"))?;

        records.push(CacheRecord {
            url1,
            url2,
            score,
            stale,
        });
    }

    log::debug!(
        "took {}ms to read {} scores",
        now.elapsed().as_micros() as f64 / 1000.0,
        records.len()
    );

    Ok(records)
}

impl CsvScoreCache {
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        if let Err(err) = std::fs::metadata(path) {
            match err.kind() {
                ErrorKind::NotFound => {
                    log::info!("Creating new score store at {}", path.display());
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    let mut csv_wrt = csv::Writer::from_path(path)?;
                    csv_wrt.write_record(CSV_HEADERS)?;
                    csv_wrt.flush()?;
                }
                _ => Err(err)?,
            }
        }

        // fail early on a malformed store
        read_records(path)?;

        Ok(CsvScoreCache {
            write_guard: Arc::new(Mutex::new(())),
            path: path.to_path_buf(),
            lock_path: lock_path_for(path),
        })
    }

    fn save(&self, records: &[CacheRecord]) -> Result<(), CacheError> {
        let mut temp_name = self.path.as_os_str().to_os_string();
        temp_name.push("-tmp");
        let temp_path = PathBuf::from(temp_name);

        let mut csv_wrt = csv::Writer::from_path(&temp_path)?;
        csv_wrt.write_record(CSV_HEADERS)?;
        for record in records {
            csv_wrt.write_record([
                record.url1.as_str(),
                record.url2.as_str(),
                record.score.to_string().as_str(),
                if record.stale { "1" } else { "0" },
            ])?;
        }
        csv_wrt.flush()?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Run `f` on the freshly re-read records while holding both the
    /// in-process and the file lock, saving afterwards when `f` says so.
    fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Vec<CacheRecord>) -> (T, bool),
    ) -> Result<T, CacheError> {
        let _guard = self
            .write_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _lock = FileLock::acquire_blocking(&self.lock_path)?;

        let mut records = read_records(&self.path)?;
        let (result, changed) = f(&mut records);
        if changed {
            self.save(&records)?;
        }

        Ok(result)
    }
}

impl ScoreCache for CsvScoreCache {
    fn record(&self, url1: &str, url2: &str, score: f64) -> Result<RecordOutcome, CacheError> {
        let outcome = self.transaction(|records| {
            let outcome = apply_record(records, url1, url2, score);
            let changed = !matches!(outcome, RecordOutcome::Unchanged { .. });
            (outcome, changed)
        })?;

        log::debug!("{url1} <> {url2}: {outcome:?}");
        Ok(outcome)
    }

    fn get(&self, url1: &str, url2: &str) -> Result<Option<CacheRecord>, CacheError> {
        Ok(read_records(&self.path)?
            .into_iter()
            .find(|r| r.url1 == url1 && r.url2 == url2))
    }

    fn list(&self) -> Result<Vec<CacheRecord>, CacheError> {
        read_records(&self.path)
    }

    fn mark_stale(&self, url1: &str, url2: &str) -> Result<bool, CacheError> {
        self.transaction(|records| {
            match records
                .iter_mut()
                .find(|r| r.url1 == url1 && r.url2 == url2)
            {
                Some(record) => {
                    let changed = !record.stale;
                    record.stale = true;
                    (true, changed)
                }
                None => (false, false),
            }
        })
    }

    fn mark_all_stale(&self) -> Result<usize, CacheError> {
        self.transaction(|records| {
            let count = records.iter().filter(|r| !r.stale).count();
            records.iter_mut().for_each(|r| r.stale = true);
            (count, count > 0)
        })
    }
}
