//! Print worker and stale sweeper
//!
//! Workers drive jobs from `pending` to a terminal state. Each worker
//! repeatedly scans for restaurants with claimable work, claims at most one
//! job per restaurant (the store enforces per-restaurant mutual exclusion
//! and FIFO), dispatches it, and records the outcome. Workers share no
//! mutable state; the store's transactions are the only coordination, so
//! the pool stays correct even when workers run in separate processes.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::dispatcher::TransportDispatcher;
use super::renderer::ReceiptRenderer;
use super::storage::{JobStore, JobStoreError};
use super::types::{PrintJob, SendOutcome, TransportKind};
use crate::utils::time::now_millis;

/// Retry limits and backoff shape
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total dispatch attempts before a job goes terminally failed
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Exponential backoff with jitter: `base * 2^retry_count`, capped,
    /// plus up to 25% random extra so many failing jobs do not retry in
    /// lockstep.
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry_count);
        let capped = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let jitter_budget = (capped.as_millis() as u64) / 4;
        let jitter = if jitter_budget == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_budget)
        };
        capped + Duration::from_millis(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Claims and dispatches pending print jobs
pub struct PrintWorker {
    store: JobStore,
    dispatcher: Arc<TransportDispatcher>,
    policy: RetryPolicy,
    poll_interval: Duration,
}

impl PrintWorker {
    pub fn new(
        store: JobStore,
        dispatcher: Arc<TransportDispatcher>,
        policy: RetryPolicy,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            dispatcher,
            policy,
            poll_interval,
        }
    }

    /// Run the worker until shutdown
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Print worker started");

        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Print worker received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "Worker tick failed");
                    }
                }
            }
        }

        info!("Print worker stopped");
    }

    /// One scan pass: claim and dispatch at most one job per restaurant
    ///
    /// Returns the number of jobs dispatched. Public so tests (and the run
    /// loop) can drive the worker deterministically.
    pub async fn tick(&self) -> Result<usize, JobStoreError> {
        let restaurants = self.store.restaurants_with_pending(now_millis())?;

        let mut dispatched = 0;
        for restaurant_id in restaurants {
            // A sibling worker may have raced us here; claim decides
            match self.store.claim_next_pending(&restaurant_id, now_millis())? {
                Some(job) => {
                    self.process(job).await;
                    dispatched += 1;
                }
                None => continue,
            }
        }
        Ok(dispatched)
    }

    /// Dispatch one claimed job and record the outcome
    async fn process(&self, mut job: PrintJob) {
        // A crash between intake and byte persistence leaves an empty
        // stream; the render is deterministic, so redoing it here yields
        // the exact receipt the intake produced
        if job.receipt_bytes.is_empty() {
            let renderer = ReceiptRenderer::new(job.printer.paper_width);
            match renderer.render(&job.order_data) {
                Ok(bytes) => {
                    if let Err(e) = self.store.set_receipt_bytes(&job.job_id, &bytes) {
                        error!(job_id = %job.job_id, error = %e, "Failed to persist receipt bytes");
                    }
                    job.receipt_bytes = bytes;
                }
                Err(e) => {
                    // The snapshot was validated at intake; a failure here
                    // means the stored data is unusable, not transient
                    error!(job_id = %job.job_id, error = %e, "Stored order failed to render");
                    let reason = format!("render failed: {}", e);
                    if let Err(e) = self.store.mark_failed(&job.job_id, &reason, now_millis()) {
                        error!(job_id = %job.job_id, error = %e, "Failed to mark job failed");
                    }
                    return;
                }
            }
        }

        match self.dispatcher.send(&job).await {
            Ok(SendOutcome::Delivered) => {
                match self.store.mark_completed(&job.job_id, now_millis()) {
                    Ok(done) => info!(
                        job_id = %done.job_id,
                        restaurant_id = %done.restaurant_id,
                        retry_count = done.retry_count,
                        "Print job completed"
                    ),
                    Err(e) => {
                        error!(job_id = %job.job_id, error = %e, "Failed to mark job completed")
                    }
                }
            }
            Ok(SendOutcome::Accepted) => {
                // Still in flight: the job stays printing until the relay
                // confirms or the stale sweep reclaims it
                info!(job_id = %job.job_id, "Accepted for relay, awaiting confirmation");
            }
            Err(e) => {
                self.record_failure(&job, &e.to_string());
            }
        }
    }

    /// Requeue with backoff, or terminally fail once the budget is spent
    fn record_failure(&self, job: &PrintJob, reason: &str) {
        let now = now_millis();

        if job.retry_count + 1 >= self.policy.max_retries {
            match self.store.mark_failed(&job.job_id, reason, now) {
                // ERROR is the operational alerting channel; the originating
                // order and payment are never rolled back for a print fault
                Ok(failed) => error!(
                    job_id = %failed.job_id,
                    restaurant_id = %failed.restaurant_id,
                    retry_count = failed.retry_count,
                    error = %reason,
                    "Print job permanently failed"
                ),
                Err(e) => error!(job_id = %job.job_id, error = %e, "Failed to mark job failed"),
            }
            return;
        }

        let delay = self.policy.backoff_delay(job.retry_count);
        let next_attempt_at = now + delay.as_millis() as i64;
        match self
            .store
            .requeue(&job.job_id, reason, next_attempt_at, now)
        {
            Ok(requeued) => warn!(
                job_id = %requeued.job_id,
                retry_count = requeued.retry_count,
                delay_ms = delay.as_millis() as u64,
                error = %reason,
                "Dispatch failed, job requeued"
            ),
            Err(e) => error!(job_id = %job.job_id, error = %e, "Failed to requeue job"),
        }
    }
}

/// Recovers jobs stuck in `printing`
///
/// A worker process that died mid-dispatch, or a relay that accepted bytes
/// and never confirmed, leaves a job frozen in `printing`. The sweep is the
/// only way such a job gets unstuck. Network jobs use the stale threshold;
/// relay jobs get the (longer) confirmation grace period.
pub struct StaleSweeper {
    store: JobStore,
    policy: RetryPolicy,
    stale_after: Duration,
    relay_grace: Duration,
    sweep_interval: Duration,
}

impl StaleSweeper {
    pub fn new(
        store: JobStore,
        policy: RetryPolicy,
        stale_after: Duration,
        relay_grace: Duration,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            store,
            policy,
            stale_after,
            relay_grace,
            sweep_interval,
        }
    }

    /// Run the periodic sweep until shutdown
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Stale sweeper started");

        let mut interval = tokio::time::interval(self.sweep_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Stale sweeper received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    match self.sweep_once() {
                        Ok(0) => {}
                        Ok(n) => info!(recovered = n, "Stale sweep recovered jobs"),
                        Err(e) => error!(error = %e, "Stale sweep failed"),
                    }
                }
            }
        }

        info!("Stale sweeper stopped");
    }

    /// One sweep pass; requeues each expired job at most once
    pub fn sweep_once(&self) -> Result<usize, JobStoreError> {
        let now = now_millis();
        let min_threshold = self.stale_after.min(self.relay_grace);
        let candidates = self.store.find_stale(now - min_threshold.as_millis() as i64)?;

        let mut recovered = 0;
        for job in candidates {
            let threshold = match job.printer.transport {
                TransportKind::Network { .. } => self.stale_after,
                TransportKind::BluetoothRelay { .. } => self.relay_grace,
            };
            if job.updated_at >= now - threshold.as_millis() as i64 {
                continue;
            }

            warn!(
                job_id = %job.job_id,
                restaurant_id = %job.restaurant_id,
                stuck_ms = now - job.updated_at,
                "Job stuck in printing, reclaiming"
            );

            let reason = "stale: no completion report from worker or relay";
            if job.retry_count + 1 >= self.policy.max_retries {
                match self.store.mark_failed(&job.job_id, reason, now) {
                    Ok(failed) => error!(
                        job_id = %failed.job_id,
                        restaurant_id = %failed.restaurant_id,
                        retry_count = failed.retry_count,
                        "Print job permanently failed"
                    ),
                    Err(e) => error!(job_id = %job.job_id, error = %e, "Failed to mark stale job failed"),
                }
            } else {
                let delay = self.policy.backoff_delay(job.retry_count);
                if let Err(e) = self.store.requeue(
                    &job.job_id,
                    reason,
                    now + delay.as_millis() as i64,
                    now,
                ) {
                    error!(job_id = %job.job_id, error = %e, "Failed to requeue stale job");
                    continue;
                }
            }
            recovered += 1;
        }

        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(600),
        };

        // jitter adds at most 25% on top of the capped value
        let d0 = policy.backoff_delay(0);
        assert!(d0 >= Duration::from_millis(100) && d0 <= Duration::from_millis(125));

        let d1 = policy.backoff_delay(1);
        assert!(d1 >= Duration::from_millis(200) && d1 <= Duration::from_millis(250));

        let d4 = policy.backoff_delay(4);
        assert!(d4 >= Duration::from_millis(600) && d4 <= Duration::from_millis(750));
    }

    #[test]
    fn test_backoff_no_overflow_on_large_retry_count() {
        let policy = RetryPolicy::default();
        let d = policy.backoff_delay(40);
        assert!(d <= policy.max_delay + policy.max_delay / 4);
    }
}
