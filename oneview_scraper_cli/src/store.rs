//! File-backed work queue, result store and audit log.
//!
//! Structured state is only ever replaced whole through
//! [`utils::write_atomic`]; the audit log is the one append-only file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::StoreError;
use crate::utils;
use crate::{AcademicRecord, RollNumber};

/// Parse queue text: one roll number per line, blank lines ignored,
/// malformed lines dropped.
pub fn parse_queue(text: &str) -> Vec<RollNumber> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match line.parse::<RollNumber>() {
            Ok(roll) => Some(roll),
            Err(e) => {
                warn!("dropping {}", e);
                None
            }
        })
        .collect()
}

fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Pending roll numbers, in file order.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    path: PathBuf,
}

impl WorkQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current queue; an absent file is an empty queue.
    pub fn load(&self) -> Result<Vec<RollNumber>, StoreError> {
        Ok(read_optional(&self.path)?
            .map(|text| parse_queue(&text))
            .unwrap_or_default())
    }

    /// Re-read the file, drop every line equal to `roll`, rewrite the rest.
    ///
    /// Reading fresh keeps lines appended by someone else mid-run.
    pub fn remove(&self, roll: &RollNumber) -> Result<Vec<RollNumber>, StoreError> {
        let mut remaining = self.load()?;
        remaining.retain(|r| r != roll);
        self.save(&remaining)?;
        Ok(remaining)
    }

    pub fn save(&self, rolls: &[RollNumber]) -> Result<(), StoreError> {
        let text = rolls
            .iter()
            .map(RollNumber::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        utils::save_text(&text, &self.path)
    }
}

/// Accumulated records, persisted as one pretty-printed JSON array.
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<AcademicRecord>, StoreError> {
        match read_optional(&self.path)? {
            None => Ok(Vec::new()),
            Some(text) if text.trim().is_empty() => Ok(Vec::new()),
            Some(text) => serde_json::from_str(&text).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn save(&self, records: &[AcademicRecord]) -> Result<(), StoreError> {
        utils::save_json(records, &self.path)
    }
}

/// Append-only list of every attempted roll number.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn record(&self, roll: &RollNumber) -> Result<(), StoreError> {
        utils::append_line(roll.as_str(), &self.path)
    }
}

/// In-memory accumulator owned by the runner. At most one record per roll number.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResultSet {
    records: Vec<AcademicRecord>,
}

impl ResultSet {
    pub fn new(records: Vec<AcademicRecord>) -> Self {
        let mut set = Self::default();
        for record in records {
            set.upsert(record);
        }
        set
    }

    /// Add `record`, replacing an earlier record for the same roll number in place.
    /// Returns `true` when a record was replaced.
    pub fn upsert(&mut self, record: AcademicRecord) -> bool {
        match self
            .records
            .iter_mut()
            .find(|r| r.roll_number == record.roll_number)
        {
            Some(existing) => {
                *existing = record;
                true
            }
            None => {
                self.records.push(record);
                false
            }
        }
    }

    pub fn records(&self) -> &[AcademicRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::parse_record;
    use crate::test_support::StudentPage;

    fn rolls(items: &[&str]) -> Vec<RollNumber> {
        items.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn queue_text_skips_blank_and_malformed_lines() {
        assert_eq!(parse_queue("100\n\n200\nabc\n"), rolls(&["100", "200"]));
        assert_eq!(parse_queue(" 7 \r\n\r\n"), rolls(&["7"]));
        assert!(parse_queue("").is_empty());
    }

    #[test]
    fn missing_queue_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let queue = WorkQueue::new(dir.path().join("absent.txt"));
        assert!(queue.load().unwrap().is_empty());
    }

    #[test]
    fn remove_rereads_and_keeps_external_appends() {
        let dir = tempfile::tempdir().unwrap();
        let queue = WorkQueue::new(dir.path().join("queue.txt"));
        fs::write(queue.path(), "1\n2\n3\n").unwrap();

        let snapshot = queue.load().unwrap();
        fs::write(queue.path(), "1\n2\n3\n4\n").unwrap();
        let remaining = queue.remove(&snapshot[0]).unwrap();

        assert_eq!(remaining, rolls(&["2", "3", "4"]));
        assert_eq!(fs::read_to_string(queue.path()).unwrap(), "2\n3\n4");
    }

    #[test]
    fn remove_drops_duplicates_and_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let queue = WorkQueue::new(dir.path().join("queue.txt"));
        fs::write(queue.path(), "5\nxyz\n6\n5\n").unwrap();

        queue.remove(&"5".parse().unwrap()).unwrap();
        assert_eq!(fs::read_to_string(queue.path()).unwrap(), "6");
    }

    #[test]
    fn absent_or_blank_result_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("out/results.json"));
        assert!(store.load().unwrap().is_empty());

        fs::create_dir_all(dir.path().join("out")).unwrap();
        fs::write(store.path(), "  \n").unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn corrupt_result_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results.json"));
        fs::write(store.path(), "[{").unwrap();
        assert!(matches!(store.load(), Err(StoreError::Json { .. })));
    }

    #[test]
    fn result_store_round_trips_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results.json"));
        let record = parse_record(&StudentPage::default().render()).unwrap();

        store.save(std::slice::from_ref(&record)).unwrap();
        assert_eq!(store.load().unwrap(), vec![record]);
    }

    #[test]
    fn result_set_replaces_same_roll_in_place() {
        let first = parse_record(&StudentPage::with_roll("1").render()).unwrap();
        let second = parse_record(&StudentPage::with_roll("2").render()).unwrap();
        let mut again = first.clone();
        again.cgpa = "9.1".into();

        let mut set = ResultSet::new(vec![first.clone(), second.clone(), first]);
        assert_eq!(set.len(), 2);
        assert!(set.upsert(again.clone()));
        assert_eq!(set.records(), &[again, second]);
    }
}
