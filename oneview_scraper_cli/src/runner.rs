//! Crash-safe, single-worker batch loop over the work queue.
//!
//! After every roll number the result store is rewritten, then the queue,
//! then the audit log is appended. A kill between the first two writes
//! leaves the roll number queued, so the next run re-attempts it; the
//! accumulator keeps one record per roll number, so the retry replaces the
//! earlier record instead of duplicating it.

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::assemble::parse_record;
use crate::error::{Error, StoreError};
use crate::scraper::Fetcher;
use crate::store::{AuditLog, ResultSet, ResultStore, WorkQueue};
use crate::{AcademicRecord, RollNumber};

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub queue_path: PathBuf,
    pub results_path: PathBuf,
    pub audit_path: PathBuf,
    /// Pause after each roll number, to go easy on the portal.
    pub delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            queue_path: PathBuf::from("data/roll_numbers.txt"),
            results_path: PathBuf::from("out/results.json"),
            audit_path: PathBuf::from("logs/attempts.log"),
            delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub attempted: usize,
    pub extracted: usize,
    pub rejected: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchReport {
    fn start() -> Self {
        Self {
            attempted: 0,
            extracted: 0,
            rejected: 0,
            failed: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempted, {} extracted, {} rejected, {} failed",
            self.attempted, self.extracted, self.rejected, self.failed
        )?;
        if let Some(end) = self.finished_at {
            write!(f, " in {}s", (end - self.started_at).num_seconds())?;
        }
        Ok(())
    }
}

enum State {
    Loading,
    Dispatching,
    Extracting(RollNumber),
    Persisting(RollNumber, Option<AcademicRecord>),
    Drained,
    Fatal(StoreError),
}

pub struct BatchRunner<F> {
    fetcher: F,
    queue: WorkQueue,
    store: ResultStore,
    audit: AuditLog,
    delay: Duration,
    results: ResultSet,
    pending: VecDeque<RollNumber>,
}

impl<F: Fetcher> BatchRunner<F> {
    pub fn new(fetcher: F, config: &RunnerConfig) -> Self {
        Self {
            fetcher,
            queue: WorkQueue::new(&config.queue_path),
            store: ResultStore::new(&config.results_path),
            audit: AuditLog::new(&config.audit_path),
            delay: config.delay,
            results: ResultSet::default(),
            pending: VecDeque::new(),
        }
    }

    /// Records accumulated so far, including those loaded from the store.
    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    /// Run until the queue is empty. Per-item failures are logged and skipped;
    /// any store failure halts the batch and is returned.
    pub async fn run(&mut self) -> Result<BatchReport, Error> {
        let mut report = BatchReport::start();
        match self.drive(&mut report).await {
            Ok(()) => {
                report.finished_at = Some(Utc::now());
                info!(%report, "queue drained");
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "batch halted");
                Err(e.into())
            }
        }
    }

    async fn drive(&mut self, report: &mut BatchReport) -> Result<(), StoreError> {
        let mut state = State::Loading;
        loop {
            state = match state {
                State::Drained => return Ok(()),
                State::Fatal(e) => return Err(e),
                state => self.step(state, report).await.unwrap_or_else(State::Fatal),
            };
        }
    }

    async fn step(&mut self, state: State, report: &mut BatchReport) -> Result<State, StoreError> {
        Ok(match state {
            State::Loading => {
                self.results = ResultSet::new(self.store.load()?);
                let has_work = self.refill()?;
                info!(
                    queued = self.pending.len(),
                    stored = self.results.len(),
                    "stores loaded"
                );
                if has_work {
                    State::Dispatching
                } else {
                    State::Drained
                }
            }
            State::Dispatching => match self.pending.pop_front() {
                Some(roll) => State::Extracting(roll),
                None if self.refill()? => State::Dispatching,
                None => State::Drained,
            },
            State::Extracting(roll) => {
                let record = self.extract(&roll, report).await;
                State::Persisting(roll, record)
            }
            State::Persisting(roll, record) => {
                self.persist(&roll, record)?;
                tokio::time::sleep(self.delay).await;
                State::Dispatching
            }
            terminal @ (State::Drained | State::Fatal(_)) => terminal,
        })
    }

    /// Re-read the queue file; `true` if there is more work.
    fn refill(&mut self) -> Result<bool, StoreError> {
        self.pending = self.queue.load()?.into();
        Ok(!self.pending.is_empty())
    }

    async fn extract(&self, roll: &RollNumber, report: &mut BatchReport) -> Option<AcademicRecord> {
        report.attempted += 1;
        info!(roll = %roll, "processing");

        let page = match self.fetcher.fetch(roll).await {
            Ok(page) => page,
            Err(e) => {
                warn!(roll = %roll, error = %e, "fetch failed");
                report.failed += 1;
                return None;
            }
        };

        match parse_record(&page) {
            Ok(record) => {
                report.extracted += 1;
                Some(record)
            }
            Err(rejection) => {
                warn!(roll = %roll, %rejection, "no record extracted");
                report.rejected += 1;
                None
            }
        }
    }

    fn persist(&mut self, roll: &RollNumber, record: Option<AcademicRecord>) -> Result<(), StoreError> {
        if let Some(record) = record {
            if self.results.upsert(record) {
                info!(roll = %roll, "replaced an earlier record for this roll number");
            }
        }
        self.store.save(self.results.records())?;
        // The rewritten file is the queue now; drop any stale copies of `roll`.
        self.pending = self.queue.remove(roll)?.into();
        self.audit.record(roll)
    }
}
