//! Bounded worker pools with ordered result collection.
//!
//! ## Bounding
//!
//! Each unit runs on Tokio's blocking thread pool, which is effectively
//! unbounded. The [`WorkerPool`] semaphore caps how many units of *one stage*
//! execute at once (an A4 canvas at 600 DPI is ~100 MB).
//!
//! ## Ordering
//!
//! Every unit of a stage is submitted up front into a `JoinSet` and collected
//! in completion order, but [`WorkerPool::run_ordered`] re-sorts by
//! submission index before returning. Downstream stages never observe
//! completion order.
//!
//! ## Cancellation
//!
//! [`CancelFlag`] is advisory. It is polled by each unit before it starts and
//! by the collector after every result; once set, queued units are aborted,
//! units already executing run to completion, and whatever completed before
//! the abort is still returned.

use crate::error::{Stage, UnitError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Upper bound on pool size; the semaphore is drained with a single `acquire_many`.
const MAX_POOL_SIZE: usize = 1024;

/// Shared cooperative cancellation flag.
///
/// Cheap to clone; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Results of one stage, in submission order.
#[derive(Debug)]
pub struct Collected<T> {
    /// `(submission_index, value)` sorted by index.
    pub items: Vec<(usize, T)>,
    /// Failed units sorted by index.
    pub errors: Vec<UnitError>,
    /// The cancel flag was observed during collection.
    pub cancelled: bool,
}

enum Slot<T> {
    Done(Result<T, UnitError>),
    Skipped,
}

/// A fixed-capacity set of concurrent workers for one pipeline stage.
#[derive(Debug)]
pub struct WorkerPool {
    stage: Stage,
    size: usize,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    /// Create a pool running at most `size` units at once (clamped to 1–1024).
    pub fn new(stage: Stage, size: usize) -> Self {
        let size = size.clamp(1, MAX_POOL_SIZE);
        Self {
            stage,
            size,
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run `work` over every job and return the results in submission order.
    ///
    /// `on_result` is invoked on the collecting task as each unit finishes
    /// (completion order) and is meant for progress reporting.
    pub async fn run_ordered<J, T, F, P>(
        &self,
        jobs: Vec<J>,
        work: F,
        cancel: &CancelFlag,
        mut on_result: P,
    ) -> Collected<T>
    where
        J: Send + 'static,
        T: Send + 'static,
        F: Fn(usize, J) -> Result<T, UnitError> + Send + Sync + 'static,
        P: FnMut(usize, Result<&T, &UnitError>),
    {
        let total = jobs.len();
        let work = Arc::new(work);
        let mut set = JoinSet::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let permits = Arc::clone(&self.permits);
            let work = Arc::clone(&work);
            let cancel = cancel.clone();
            let stage = self.stage;

            set.spawn(async move {
                let Ok(permit) = permits.acquire_owned().await else {
                    return (index, Slot::Skipped);
                };
                if cancel.is_cancelled() {
                    return (index, Slot::Skipped);
                }
                // The permit moves into the blocking closure so it is held for
                // exactly as long as the unit executes, even if this task is
                // aborted while awaiting the handle.
                let handle = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    work(index, job)
                });
                match handle.await {
                    Ok(result) => (index, Slot::Done(result)),
                    Err(e) => (
                        index,
                        Slot::Done(Err(UnitError::Panicked {
                            stage,
                            index,
                            detail: e.to_string(),
                        })),
                    ),
                }
            });
        }

        let mut items = Vec::with_capacity(total);
        let mut errors = Vec::new();
        let mut cancelled = false;

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Slot::Done(Ok(value)))) => {
                    on_result(index, Ok(&value));
                    items.push((index, value));
                }
                Ok((index, Slot::Done(Err(err)))) => {
                    on_result(index, Err(&err));
                    errors.push(err);
                }
                Ok((index, Slot::Skipped)) => {
                    debug!("{} unit {} skipped after cancellation", self.stage, index);
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!("{} collector task failed: {}", self.stage, e),
            }

            if !cancelled && cancel.is_cancelled() {
                cancelled = true;
                set.abort_all();
                debug!(
                    "{} cancelled with {}/{} units collected",
                    self.stage,
                    items.len() + errors.len(),
                    total
                );
            }
        }

        items.sort_unstable_by_key(|(index, _)| *index);
        errors.sort_by_key(UnitError::index);

        Collected {
            items,
            errors,
            cancelled,
        }
    }

    /// Wait for every executing unit to finish, then close the pool.
    pub async fn shutdown(self) {
        match self.permits.acquire_many(self.size as u32).await {
            Ok(_all) => debug!("{} pool drained ({} workers)", self.stage, self.size),
            Err(_) => debug!("{} pool already closed", self.stage),
        }
        self.permits.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn results_follow_submission_order() {
        let pool = WorkerPool::new(Stage::Encode, 4);
        // Later jobs finish first.
        let jobs: Vec<u64> = (0..8).collect();
        let completion = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&completion);

        let out = pool
            .run_ordered(
                jobs,
                |_, n| {
                    std::thread::sleep(Duration::from_millis(5 * (8 - n)));
                    Ok(n * 10)
                },
                &CancelFlag::new(),
                |index, _| seen.lock().unwrap().push(index),
            )
            .await;

        let values: Vec<u64> = out.items.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40, 50, 60, 70]);
        assert!(!out.cancelled);
        assert_eq!(completion.lock().unwrap().len(), 8);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_pool_size() {
        let pool = WorkerPool::new(Stage::Compose, 2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));

        let out = pool
            .run_ordered(
                vec![(); 10],
                move |i, ()| {
                    let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(10));
                    r.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                },
                &CancelFlag::new(),
                |_, _| {},
            )
            .await;

        assert_eq!(out.items.len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 2, "peak {}", peak.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_siblings() {
        let pool = WorkerPool::new(Stage::Encode, 3);
        let out = pool
            .run_ordered(
                vec!["a", "b", "c", "d"],
                |i, s| {
                    if i == 1 {
                        Err(UnitError::Encode {
                            group: i,
                            range: "11-20".into(),
                            detail: "bad".into(),
                        })
                    } else {
                        Ok(s.to_uppercase())
                    }
                },
                &CancelFlag::new(),
                |_, _| {},
            )
            .await;

        let indices: Vec<usize> = out.items.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 2, 3]);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].index(), 1);
    }

    #[tokio::test]
    async fn panicking_unit_becomes_unit_error() {
        let pool = WorkerPool::new(Stage::Compose, 2);
        let out = pool
            .run_ordered(
                vec![0u8, 1, 2],
                |i, v| {
                    if i == 2 {
                        panic!("canvas exploded");
                    }
                    Ok(v)
                },
                &CancelFlag::new(),
                |_, _| {},
            )
            .await;

        assert_eq!(out.items.len(), 2);
        assert!(matches!(
            out.errors.as_slice(),
            [UnitError::Panicked { stage: Stage::Compose, index: 2, .. }]
        ));
    }

    #[tokio::test]
    async fn cancellation_keeps_completed_units_only() {
        let pool = WorkerPool::new(Stage::Encode, 1);
        let cancel = CancelFlag::new();
        let flag = cancel.clone();

        let out = pool
            .run_ordered(
                (0..6).collect::<Vec<usize>>(),
                move |i, v| {
                    if i == 0 {
                        flag.cancel();
                    }
                    Ok(v)
                },
                &cancel,
                |_, _| {},
            )
            .await;

        assert!(out.cancelled);
        assert_eq!(out.items, vec![(0, 0)]);
        assert!(out.errors.is_empty());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn pre_cancelled_stage_runs_nothing() {
        let pool = WorkerPool::new(Stage::Encode, 4);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);

        let out = pool
            .run_ordered(
                vec![(); 5],
                move |i, ()| {
                    r.fetch_add(1, Ordering::SeqCst);
                    Ok(i)
                },
                &cancel,
                |_, _| {},
            )
            .await;

        assert!(out.items.is_empty());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn pool_size_is_clamped() {
        assert_eq!(WorkerPool::new(Stage::Encode, 0).size(), 1);
        assert_eq!(WorkerPool::new(Stage::Encode, 1_000_000).size(), MAX_POOL_SIZE);
    }
}
