//! Bounded worker pool shared by every crawl phase
//!
//! This module handles:
//! - Concurrency limiting via a per-phase semaphore
//! - Stopping task admission once the run is cancelled
//! - Turning worker panics into per-task failures
//!
//! A phase hands the pool its whole task list up front and gets every
//! outcome back once all started tasks are terminal.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// One task that ran to completion, or whose worker panicked
#[derive(Debug)]
pub struct Completed<I, T> {
    pub item: I,

    /// `Err` carries the panic message
    pub outcome: Result<T, String>,
}

/// Everything a phase produced
#[derive(Debug)]
pub struct PhaseOutcome<I, T> {
    /// Started tasks, in completion order
    pub completed: Vec<Completed<I, T>>,

    /// Tasks never started because the run was cancelled
    pub skipped: Vec<I>,
}

impl<I, T> PhaseOutcome<I, T> {
    fn empty() -> Self {
        Self {
            completed: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Bounded-concurrency executor for one phase at a time
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Creates a pool running at most `workers` tasks at once (at least one)
    pub fn new(workers: usize, cancel: CancellationToken) -> Self {
        Self {
            workers: workers.max(1),
            cancel,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `work` over every item and waits for all started tasks
    ///
    /// Items are started in order as permits free up. Once the cancellation
    /// token fires no further item is started; the rest are returned in
    /// [`PhaseOutcome::skipped`]. Tasks already running are awaited, never
    /// aborted.
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, work: F) -> PhaseOutcome<I, T>
    where
        I: Clone + Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        if items.is_empty() {
            return PhaseOutcome::empty();
        }

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let work = Arc::new(work);
        let mut join_set = JoinSet::new();
        let mut outcome = PhaseOutcome::empty();
        let mut pending = items.into_iter();

        while let Some(item) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                outcome.skipped.push(item);
                outcome.skipped.extend(pending.by_ref());
                break;
            };

            let work = Arc::clone(&work);
            join_set.spawn(async move {
                let _permit = permit;
                let result = AssertUnwindSafe((*work)(item.clone()))
                    .catch_unwind()
                    .await
                    .map_err(panic_message);
                Completed {
                    item,
                    outcome: result,
                }
            });
        }

        if !outcome.skipped.is_empty() {
            tracing::info!(
                "Cancelled: {} task(s) not started, waiting for {} in flight",
                outcome.skipped.len(),
                join_set.len()
            );
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(completed) => outcome.completed.push(completed),
                // Panics are caught inside the task; only an abort lands here
                Err(e) => tracing::error!("Worker task ended abnormally: {}", e),
            }
        }

        outcome
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
