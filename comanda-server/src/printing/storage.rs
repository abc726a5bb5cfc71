//! redb-based storage for print jobs
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `print_jobs` | `job_id` | JSON `PrintJob` | job rows (audit trail, never deleted) |
//! | `jobs_by_restaurant` | `(restaurant_id, created_at, job_id)` | `()` | FIFO claim index |
//! | `printing_jobs` | `restaurant_id` | `job_id` | per-restaurant in-flight marker |
//! | `relay_outbox` | `(restaurant_id, created_at, job_id)` | `pulled_at` | relay hand-off queue |
//!
//! # Atomicity
//!
//! Every status transition runs inside a single write transaction; redb
//! serializes writers, so a claim or a guarded transition can never be
//! half-applied or won by two callers. redb commits with
//! `Durability::Immediate` by default, so a committed job survives power
//! loss - the triggering process is not guaranteed to stay alive and the
//! queue must not depend on it.

use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::types::{JobStatus, PrintJob};

/// Job rows: key = job_id, value = JSON
const JOBS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("print_jobs");

/// FIFO index: (restaurant_id, created_at, job_id) -> ()
const JOBS_BY_RESTAURANT_TABLE: TableDefinition<(&str, i64, &str), ()> =
    TableDefinition::new("jobs_by_restaurant");

/// In-flight marker: restaurant_id -> job_id currently printing
const PRINTING_TABLE: TableDefinition<&str, &str> = TableDefinition::new("printing_jobs");

/// Relay hand-off queue: (restaurant_id, created_at, job_id) -> pulled_at
/// (0 = queued, not yet pulled by the companion device)
const RELAY_OUTBOX_TABLE: TableDefinition<(&str, i64, &str), i64> =
    TableDefinition::new("relay_outbox");

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Print job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

pub type JobStoreResult<T> = Result<T, JobStoreError>;

/// Counts per status, for the operational surface
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JobStoreStats {
    pub total: u64,
    pub pending: u64,
    pub printing: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Durable print job store backed by redb
#[derive(Clone)]
pub struct JobStore {
    db: Arc<Database>,
}

impl JobStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> JobStoreResult<Self> {
        let db = Database::create(path)?;
        Self::init_tables(db)
    }

    /// Open an in-memory database (tests and demos)
    pub fn open_in_memory() -> JobStoreResult<Self> {
        let db =
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init_tables(db)
    }

    fn init_tables(db: Database) -> JobStoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(JOBS_TABLE)?;
            let _ = write_txn.open_table(JOBS_BY_RESTAURANT_TABLE)?;
            let _ = write_txn.open_table(PRINTING_TABLE)?;
            let _ = write_txn.open_table(RELAY_OUTBOX_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    // ========== Creation ==========

    /// Create a job, idempotently
    ///
    /// If a job with the same id already exists it is returned unchanged and
    /// nothing is written: a duplicated payment confirmation never produces
    /// a second physical receipt.
    pub fn create_job(&self, job: &PrintJob) -> JobStoreResult<(PrintJob, bool)> {
        let txn = self.db.begin_write()?;
        {
            let mut jobs = txn.open_table(JOBS_TABLE)?;

            let existing = match jobs.get(job.job_id.as_str())? {
                Some(guard) => Some(serde_json::from_slice::<PrintJob>(guard.value())?),
                None => None,
            };
            if let Some(existing) = existing {
                // Dropping the transaction aborts it; no write happened
                return Ok((existing, false));
            }

            let value = serde_json::to_vec(job)?;
            jobs.insert(job.job_id.as_str(), value.as_slice())?;

            let mut idx = txn.open_table(JOBS_BY_RESTAURANT_TABLE)?;
            idx.insert(
                (job.restaurant_id.as_str(), job.created_at, job.job_id.as_str()),
                (),
            )?;
        }
        txn.commit()?;

        Ok((job.clone(), true))
    }

    // ========== Claiming ==========

    /// Atomically claim the oldest eligible pending job for a restaurant
    ///
    /// Returns `None` when:
    /// - another job for the restaurant is already `printing` (a thermal
    ///   printer takes one stream at a time; overlapping writes would
    ///   corrupt both receipts), or
    /// - the head of the queue is still backing off (`next_attempt_at` in
    ///   the future). The head blocks the queue: jobs dispatch strictly in
    ///   creation order.
    ///
    /// On success the job is flipped to `printing` in the same transaction,
    /// so no two workers can claim it.
    pub fn claim_next_pending(
        &self,
        restaurant_id: &str,
        now: i64,
    ) -> JobStoreResult<Option<PrintJob>> {
        let txn = self.db.begin_write()?;
        let claimed = {
            let mut printing = txn.open_table(PRINTING_TABLE)?;
            if printing.get(restaurant_id)?.is_some() {
                None
            } else {
                let mut jobs = txn.open_table(JOBS_TABLE)?;
                let job_ids = Self::job_ids_in_order(&txn, restaurant_id)?;

                let mut claimed = None;
                for job_id in job_ids {
                    let Some(bytes) = jobs.get(job_id.as_str())?.map(|g| g.value().to_vec())
                    else {
                        continue;
                    };
                    let mut job: PrintJob = serde_json::from_slice(&bytes)?;
                    match job.status {
                        JobStatus::Completed | JobStatus::Failed => continue,
                        // The in-flight marker above should have caught this
                        JobStatus::Printing => break,
                        JobStatus::Pending => {
                            if job.next_attempt_at > now {
                                break;
                            }
                            job.status = JobStatus::Printing;
                            job.updated_at = now;
                            let value = serde_json::to_vec(&job)?;
                            jobs.insert(job.job_id.as_str(), value.as_slice())?;
                            printing.insert(restaurant_id, job.job_id.as_str())?;
                            claimed = Some(job);
                            break;
                        }
                    }
                }
                claimed
            }
        };
        txn.commit()?;

        Ok(claimed)
    }

    /// Job ids for a restaurant in creation order
    fn job_ids_in_order(
        txn: &WriteTransaction,
        restaurant_id: &str,
    ) -> JobStoreResult<Vec<String>> {
        let idx = txn.open_table(JOBS_BY_RESTAURANT_TABLE)?;
        let range_start: (&str, i64, &str) = (restaurant_id, i64::MIN, "");
        let range_end: (&str, i64, &str) = (restaurant_id, i64::MAX, "\u{ffff}");

        let mut ids = Vec::new();
        for row in idx.range(range_start..=range_end)? {
            let (key, _) = row?;
            let (_, _, job_id) = key.value();
            ids.push(job_id.to_string());
        }
        Ok(ids)
    }

    // ========== Guarded transitions ==========

    /// `printing -> completed`; clears the error and the in-flight marker
    pub fn mark_completed(&self, job_id: &str, now: i64) -> JobStoreResult<PrintJob> {
        self.transition(job_id, JobStatus::Completed, |job| {
            job.status = JobStatus::Completed;
            job.error_message = None;
            job.completed_at = Some(now);
            job.updated_at = now;
        })
    }

    /// `printing -> failed` (terminal); the failed attempt is counted
    pub fn mark_failed(&self, job_id: &str, error: &str, now: i64) -> JobStoreResult<PrintJob> {
        self.transition(job_id, JobStatus::Failed, |job| {
            job.status = JobStatus::Failed;
            job.retry_count += 1;
            job.error_message = Some(error.to_string());
            job.updated_at = now;
        })
    }

    /// `printing -> pending`; increments retry_count and sets the backoff gate
    pub fn requeue(
        &self,
        job_id: &str,
        error: &str,
        next_attempt_at: i64,
        now: i64,
    ) -> JobStoreResult<PrintJob> {
        self.transition(job_id, JobStatus::Pending, |job| {
            job.status = JobStatus::Pending;
            job.retry_count += 1;
            job.error_message = Some(error.to_string());
            job.next_attempt_at = next_attempt_at;
            job.updated_at = now;
        })
    }

    /// Apply a guarded `printing -> *` transition in one transaction
    ///
    /// Fails with [`JobStoreError::InvalidTransition`] unless the job is
    /// currently `printing`, so concurrent callers cannot both resolve the
    /// same claim. The in-flight marker and any relay outbox entry are
    /// cleared along with the transition.
    fn transition<F>(&self, job_id: &str, to: JobStatus, apply: F) -> JobStoreResult<PrintJob>
    where
        F: FnOnce(&mut PrintJob),
    {
        let txn = self.db.begin_write()?;
        let job = {
            let mut jobs = txn.open_table(JOBS_TABLE)?;

            let bytes = jobs
                .get(job_id)?
                .map(|g| g.value().to_vec())
                .ok_or_else(|| JobStoreError::JobNotFound(job_id.to_string()))?;
            let mut job: PrintJob = serde_json::from_slice(&bytes)?;

            if job.status != JobStatus::Printing {
                return Err(JobStoreError::InvalidTransition {
                    job_id: job_id.to_string(),
                    from: job.status,
                    to,
                });
            }

            apply(&mut job);

            let value = serde_json::to_vec(&job)?;
            jobs.insert(job_id, value.as_slice())?;

            let mut printing = txn.open_table(PRINTING_TABLE)?;
            let holds_marker = printing
                .get(job.restaurant_id.as_str())?
                .map(|g| g.value() == job_id)
                .unwrap_or(false);
            if holds_marker {
                printing.remove(job.restaurant_id.as_str())?;
            }

            let mut outbox = txn.open_table(RELAY_OUTBOX_TABLE)?;
            outbox.remove((job.restaurant_id.as_str(), job.created_at, job_id))?;

            job
        };
        txn.commit()?;

        Ok(job)
    }

    // ========== Receipt bytes ==========

    /// Persist rendered bytes for a job whose bytes were lost before commit
    ///
    /// No-op when bytes are already present: `receipt_bytes` is written once
    /// and reused on every retry.
    pub fn set_receipt_bytes(&self, job_id: &str, bytes: &[u8]) -> JobStoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut jobs = txn.open_table(JOBS_TABLE)?;

            let stored = jobs
                .get(job_id)?
                .map(|g| g.value().to_vec())
                .ok_or_else(|| JobStoreError::JobNotFound(job_id.to_string()))?;
            let mut job: PrintJob = serde_json::from_slice(&stored)?;

            if !job.receipt_bytes.is_empty() {
                return Ok(());
            }

            job.receipt_bytes = bytes.to_vec();
            let value = serde_json::to_vec(&job)?;
            jobs.insert(job_id, value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    // ========== Stale recovery ==========

    /// Jobs stuck in `printing` whose last touch predates the cutoff
    ///
    /// Covers workers that died mid-dispatch and relays that never
    /// confirmed; the sweep is the only exit from `printing` without an
    /// explicit report.
    pub fn find_stale(&self, older_than_millis: i64) -> JobStoreResult<Vec<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let printing = read_txn.open_table(PRINTING_TABLE)?;
        let jobs = read_txn.open_table(JOBS_TABLE)?;

        let mut stale = Vec::new();
        for row in printing.iter()? {
            let (_, guard) = row?;
            let job_id = guard.value();
            if let Some(jg) = jobs.get(job_id)? {
                let job: PrintJob = serde_json::from_slice(jg.value())?;
                if job.status == JobStatus::Printing && job.updated_at < older_than_millis {
                    stale.push(job);
                }
            }
        }

        stale.sort_by_key(|j| j.updated_at);
        Ok(stale)
    }

    // ========== Relay outbox ==========

    /// Queue a job's bytes for pickup by the venue's companion device
    ///
    /// Re-dispatch of a requeued job resets the entry to unpulled.
    pub fn relay_enqueue(&self, job: &PrintJob) -> JobStoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut outbox = txn.open_table(RELAY_OUTBOX_TABLE)?;
            outbox.insert(
                (job.restaurant_id.as_str(), job.created_at, job.job_id.as_str()),
                0i64,
            )?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Hand the oldest unpulled byte stream to the companion device
    ///
    /// Stamps the entry as pulled so repeated polling cannot print the same
    /// receipt twice; an entry that is pulled but never confirmed is
    /// recovered by the stale sweep.
    pub fn relay_pull(
        &self,
        restaurant_id: &str,
        now: i64,
    ) -> JobStoreResult<Option<(String, Vec<u8>)>> {
        let txn = self.db.begin_write()?;
        let pulled = {
            let mut outbox = txn.open_table(RELAY_OUTBOX_TABLE)?;
            let jobs = txn.open_table(JOBS_TABLE)?;

            let range_start: (&str, i64, &str) = (restaurant_id, i64::MIN, "");
            let range_end: (&str, i64, &str) = (restaurant_id, i64::MAX, "\u{ffff}");

            let mut next = None;
            for row in outbox.range(range_start..=range_end)? {
                let (key, pulled_at) = row?;
                if pulled_at.value() != 0 {
                    continue;
                }
                let (_, created_at, job_id) = key.value();
                next = Some((created_at, job_id.to_string()));
                break;
            }

            match next {
                Some((created_at, job_id)) => {
                    let bytes = jobs
                        .get(job_id.as_str())?
                        .map(|g| g.value().to_vec())
                        .ok_or_else(|| JobStoreError::JobNotFound(job_id.clone()))?;
                    let job: PrintJob = serde_json::from_slice(&bytes)?;

                    outbox.insert((restaurant_id, created_at, job_id.as_str()), now)?;
                    Some((job_id, job.receipt_bytes))
                }
                None => None,
            }
        };
        txn.commit()?;

        Ok(pulled)
    }

    // ========== Queries ==========

    /// Get a job by id
    pub fn get_job(&self, job_id: &str) -> JobStoreResult<Option<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let jobs = read_txn.open_table(JOBS_TABLE)?;

        match jobs.get(job_id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Jobs for a restaurant, newest first (operator troubleshooting view)
    pub fn jobs_for_restaurant(&self, restaurant_id: &str) -> JobStoreResult<Vec<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let idx = read_txn.open_table(JOBS_BY_RESTAURANT_TABLE)?;
        let jobs = read_txn.open_table(JOBS_TABLE)?;

        let range_start: (&str, i64, &str) = (restaurant_id, i64::MIN, "");
        let range_end: (&str, i64, &str) = (restaurant_id, i64::MAX, "\u{ffff}");

        let mut result = Vec::new();
        for row in idx.range(range_start..=range_end)? {
            let (key, _) = row?;
            let (_, _, job_id) = key.value();
            if let Some(guard) = jobs.get(job_id)? {
                result.push(serde_json::from_slice::<PrintJob>(guard.value())?);
            }
        }

        result.sort_by_key(|j| std::cmp::Reverse(j.created_at));
        Ok(result)
    }

    /// Restaurants that have at least one claimable pending job
    ///
    /// Cheap pre-filter for the worker scan; the claim itself re-checks
    /// everything under the write transaction.
    pub fn restaurants_with_pending(&self, now: i64) -> JobStoreResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let idx = read_txn.open_table(JOBS_BY_RESTAURANT_TABLE)?;
        let jobs = read_txn.open_table(JOBS_TABLE)?;
        let printing = read_txn.open_table(PRINTING_TABLE)?;

        let mut result: Vec<String> = Vec::new();
        for row in idx.iter()? {
            let (key, _) = row?;
            let (restaurant_id, _, job_id) = key.value();

            if result.last().map(|r| r == restaurant_id).unwrap_or(false) {
                continue;
            }
            if printing.get(restaurant_id)?.is_some() {
                continue;
            }
            if let Some(guard) = jobs.get(job_id)? {
                let job: PrintJob = serde_json::from_slice(guard.value())?;
                if job.status == JobStatus::Pending && job.next_attempt_at <= now {
                    result.push(restaurant_id.to_string());
                }
            }
        }

        result.dedup();
        Ok(result)
    }

    /// Counts per status
    pub fn stats(&self) -> JobStoreResult<JobStoreStats> {
        let read_txn = self.db.begin_read()?;
        let jobs = read_txn.open_table(JOBS_TABLE)?;

        let mut stats = JobStoreStats::default();
        for row in jobs.iter()? {
            let (_, guard) = row?;
            let job: PrintJob = serde_json::from_slice(guard.value())?;
            stats.total += 1;
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Printing => stats.printing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}
