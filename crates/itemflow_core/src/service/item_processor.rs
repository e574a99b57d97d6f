//! Concurrent batch status transition.
//!
//! # Responsibility
//! - Snapshot every item id, then mark each item `PROCESSED` on the blocking
//!   worker pool, one unit of work per id.
//! - Join every unit before returning the successfully processed items.
//!
//! # Invariants
//! - The result is only produced after the last unit has finished.
//! - A unit's failure is returned as a value; it never aborts siblings and
//!   never fails the run.
//! - Results are collected by the single join loop, so workers never share a
//!   mutable collection.
//! - At most `max_workers` units are in flight at once.

use crate::model::item::{Item, ItemId};
use crate::repo::item_repo::{ItemRepository, RepoError, RepoResult};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default bound on concurrently running units of work.
pub const DEFAULT_MAX_WORKERS: usize = 16;

/// Tuning knobs for [`ItemProcessor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Artificial delay each unit sleeps before touching the store.
    pub task_delay: Duration,
    /// Maximum units in flight. `0` is clamped to `1`.
    pub max_workers: usize,
    /// Upper bound on the whole run, including the join.
    pub join_timeout: Option<Duration>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            task_delay: Duration::ZERO,
            max_workers: DEFAULT_MAX_WORKERS,
            join_timeout: None,
        }
    }
}

/// Orchestration failures. Per-item failures never show up here.
#[derive(Debug)]
pub enum ProcessError {
    /// The id snapshot could not be read.
    Snapshot(RepoError),
    /// The run did not finish within `join_timeout`.
    Timeout { waited: Duration },
    /// The worker pool refused to schedule work.
    Scheduling(String),
}

impl Display for ProcessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snapshot(err) => write!(f, "failed to snapshot item ids: {err}"),
            Self::Timeout { waited } => write!(
                f,
                "item processing did not finish within {}ms",
                waited.as_millis()
            ),
            Self::Scheduling(message) => write!(f, "failed to schedule item processing: {message}"),
        }
    }
}

impl Error for ProcessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Snapshot(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct RunSummary {
    processed: Vec<Item>,
    missing: usize,
    failed: usize,
}

/// Marks every stored item `PROCESSED` concurrently.
pub struct ItemProcessor<R: ItemRepository + 'static> {
    repo: Arc<R>,
    config: ProcessorConfig,
    permits: Arc<Semaphore>,
    processed_total: AtomicU64,
}

impl<R: ItemRepository + 'static> ItemProcessor<R> {
    pub fn new(repo: Arc<R>, config: ProcessorConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_workers.max(1)));
        Self {
            repo,
            config,
            permits,
            processed_total: AtomicU64::new(0),
        }
    }

    /// Items processed successfully across every run of this processor.
    pub fn processed_total(&self) -> u64 {
        self.processed_total.load(Ordering::Acquire)
    }

    /// Processes every item whose id exists when the run starts.
    ///
    /// Returns the persisted state of each item that was looked up, updated
    /// and saved without error, in completion order. Ids that vanish before
    /// their lookup are skipped silently; ids whose lookup or save fails are
    /// logged and skipped.
    ///
    /// # Errors
    /// - `Snapshot` when the id list cannot be read.
    /// - `Timeout` when `join_timeout` elapses first; unstarted units are
    ///   cancelled.
    /// - `Scheduling` when the worker pool cannot accept work.
    pub async fn process_all(&self) -> Result<Vec<Item>, ProcessError> {
        let started_at = Instant::now();
        let ids = self.snapshot_ids().await?;
        let total = ids.len();
        info!("event=process_all module=processor status=start items={total}");

        let run = self.run_units(ids);
        let outcome = match self.config.join_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ProcessError::Timeout { waited: limit }),
            },
            None => run.await,
        };

        let summary = match outcome {
            Ok(summary) => summary,
            Err(err) => {
                error!(
                    "event=process_all module=processor status=error items={} duration_ms={} error={}",
                    total,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        info!(
            "event=process_all module=processor status=ok items={} processed={} missing={} failed={} duration_ms={}",
            total,
            summary.processed.len(),
            summary.missing,
            summary.failed,
            started_at.elapsed().as_millis()
        );
        Ok(summary.processed)
    }

    async fn snapshot_ids(&self) -> Result<Vec<ItemId>, ProcessError> {
        let repo = Arc::clone(&self.repo);
        tokio::task::spawn_blocking(move || repo.list_item_ids())
            .await
            .map_err(|err| ProcessError::Scheduling(err.to_string()))?
            .map_err(ProcessError::Snapshot)
    }

    async fn run_units(&self, ids: Vec<ItemId>) -> Result<RunSummary, ProcessError> {
        // Dropping the set (e.g. on timeout) aborts every unit not yet started.
        let mut units = JoinSet::new();
        for id in ids {
            let permit = Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|err| ProcessError::Scheduling(err.to_string()))?;
            let repo = Arc::clone(&self.repo);
            let delay = self.config.task_delay;
            units.spawn_blocking(move || {
                let _permit = permit;
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                (id, process_item(repo.as_ref(), id))
            });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((id, Ok(Some(item)))) => {
                    debug!("event=process_item module=processor status=ok item_id={id}");
                    self.processed_total.fetch_add(1, Ordering::AcqRel);
                    summary.processed.push(item);
                }
                Ok((id, Ok(None))) => {
                    debug!(
                        "event=process_item module=processor status=skipped item_id={id} reason=not_found"
                    );
                    summary.missing += 1;
                }
                Ok((id, Err(err))) => {
                    warn!(
                        "event=process_item module=processor status=error item_id={id} error={err}"
                    );
                    summary.failed += 1;
                }
                Err(err) => {
                    error!(
                        "event=process_item module=processor status=error error_code=task_failed error={err}"
                    );
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// One unit of work: lookup, mark, persist.
///
/// The write only updates an existing row, so an item deleted after its
/// lookup is reported as a miss instead of being re-created.
fn process_item<R: ItemRepository + ?Sized>(repo: &R, id: ItemId) -> RepoResult<Option<Item>> {
    debug!(
        "event=process_item module=processor status=start item_id={} thread={}",
        id,
        std::thread::current().name().unwrap_or("unnamed")
    );

    let Some(mut item) = repo.get_item(id)? else {
        return Ok(None);
    };
    item.mark_processed();
    repo.update_item_status(id, &item.status)
}
