//! Expired key cleanup.
//!
//! The reaper streams every expired record reference out of the store and
//! deletes them in batches no larger than the backend's mutation cap. The
//! sweep is best-effort: a failed batch is reported and skipped (its records
//! stay expired and are picked up by the next sweep), while a failed pull
//! from the stream aborts the sweep, since the element behind a failed pull
//! cannot be trusted.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::{
    error::AppError,
    store::{KeyStore, RecordRef},
    telemetry::ErrorReporter,
};

/// Outcome of one sweep.
///
/// `batches` counts every delete attempt, successful or not; with no fatal
/// error it always equals `scanned` divided by the batch cap, rounded up.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    /// References pulled from the expired-record stream
    pub scanned: usize,
    /// Records removed by successful batches
    pub deleted: usize,
    /// delete_batch calls issued
    pub batches: usize,
    /// delete_batch calls that failed and were skipped
    pub failed_batches: usize,
    /// The sweep stopped early because the caller cancelled it
    pub cancelled: bool,
}

/// Deletes expired key records in bounded batches.
pub struct ExpiryReaper {
    store: Arc<dyn KeyStore>,
    reporter: Arc<dyn ErrorReporter>,
    batch_cap: usize,
}

impl ExpiryReaper {
    /// # Arguments
    ///
    /// * `store` - Persistent key store
    /// * `reporter` - Telemetry sink for non-fatal and fatal sweep errors
    /// * `batch_cap` - Hard cap on deletions per atomic batch
    pub fn new(
        store: Arc<dyn KeyStore>,
        reporter: Arc<dyn ErrorReporter>,
        batch_cap: usize,
    ) -> Self {
        Self {
            store,
            reporter,
            batch_cap,
        }
    }

    /// Sweep every record whose expiry is at or before `now`.
    ///
    /// # Algorithm
    ///
    /// 1. Stream expired references from the store
    /// 2. Accumulate them until the batch cap is reached, then delete the
    ///    batch; a batch failure is reported and the sweep continues
    /// 3. After the stream ends, flush the final partial batch
    ///
    /// Every observed reference lands in exactly one delete call and no
    /// call exceeds the cap. A stream error is reported and aborts the
    /// sweep. Cancellation stops the sweep before the next pull or flush;
    /// un-flushed references stay expired and are swept next time.
    pub async fn sweep(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<SweepSummary, AppError> {
        let mut summary = SweepSummary::default();
        let mut pending: Vec<RecordRef> = Vec::with_capacity(self.batch_cap);
        let mut stream = self.store.query_expired(now);

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let Some(pulled) = stream.next().await else {
                break;
            };

            let reference = match pulled {
                Ok(reference) => reference,
                Err(err) => {
                    // The element behind a failed pull may not exist at
                    // all; deleting through it is not safe. Abort.
                    self.reporter.report("enumerating expired keys", &err);
                    return Err(err);
                }
            };

            tracing::debug!(record = %reference, "scheduling key record for deletion");
            pending.push(reference);
            summary.scanned += 1;

            if pending.len() == self.batch_cap {
                self.flush(&mut pending, &mut summary).await;
            }
        }

        if cancel.is_cancelled() {
            summary.cancelled = true;
            tracing::info!(
                unflushed = pending.len(),
                "sweep cancelled, remainder left for the next run"
            );
            return Ok(summary);
        }

        if !pending.is_empty() {
            self.flush(&mut pending, &mut summary).await;
        }

        Ok(summary)
    }

    /// Delete the pending batch, then clear it regardless of the outcome.
    async fn flush(&self, pending: &mut Vec<RecordRef>, summary: &mut SweepSummary) {
        summary.batches += 1;
        match self.store.delete_batch(pending).await {
            Ok(()) => summary.deleted += pending.len(),
            Err(err) => {
                // Best-effort: these records stay expired and the next
                // sweep retries them.
                summary.failed_batches += 1;
                self.reporter.report("deleting expired key batch", &err);
            }
        }
        pending.clear();
    }

    /// Run sweeps on a fixed interval until shutdown (spawn as a task).
    pub async fn run(self: Arc<Self>, period: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        tracing::info!(?period, "expiry reaper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep(Utc::now(), &shutdown).await {
                        Ok(summary) if summary.scanned > 0 => {
                            tracing::info!(
                                scanned = summary.scanned,
                                deleted = summary.deleted,
                                batches = summary.batches,
                                failed_batches = summary.failed_batches,
                                "expiry sweep finished"
                            );
                        }
                        Ok(_) => {}
                        Err(err) => tracing::warn!(%err, "expiry sweep aborted"),
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("expiry reaper stopping");
                    break;
                }
            }
        }
    }
}
