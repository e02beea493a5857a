//! Parallel per-file execution using Rayon
//!
//! Each run gets work spread over a dedicated pool. Results are buffered by
//! input index, so the caller sees them in submission order no matter which
//! worker finished first.

use crate::error::{Error, Result};
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

/// Shared cancellation flag
///
/// Cloning yields a handle to the same flag. Work items that have not
/// started when the flag is raised are skipped; running ones finish.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Fresh, un-cancelled token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Result of parallel execution
#[derive(Debug)]
pub struct ParallelResult<R> {
    /// One slot per input, `None` where the item was skipped
    pub slots: Vec<Option<R>>,
    /// Items that ran
    pub completed: usize,
    /// Items skipped by cancellation or deadline
    pub skipped: usize,
    /// Whether the deadline cut execution short
    pub deadline_exceeded: bool,
    /// Total duration in milliseconds
    pub duration_ms: u64,
}

impl<R> ParallelResult<R> {
    /// True when every item ran
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped == 0
    }

    /// Results of the items that ran, in input order
    pub fn into_completed(self) -> Vec<R> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Executor owning a fixed-size Rayon pool
pub struct ParallelExecutor {
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("num_workers", &self.num_workers())
            .finish()
    }
}

impl ParallelExecutor {
    /// Create an executor with `num_workers` threads
    ///
    /// # Errors
    ///
    /// Zero workers, or the pool could not be built.
    pub fn new(num_workers: usize) -> Result<Self> {
        if num_workers == 0 {
            return Err(Error::Config("num_workers must be at least 1".to_string()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("rf-qa-worker-{i}"))
            .build()
            .map_err(|e| Error::Config(format!("thread pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Worker thread count
    #[must_use]
    pub fn num_workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `f` over `items`, honouring `cancel` and `deadline`
    pub fn execute<T, R, F>(
        &self,
        items: &[T],
        cancel: &CancellationToken,
        deadline: Option<Instant>,
        f: F,
    ) -> ParallelResult<R>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> R + Sync,
    {
        let start = Instant::now();
        let completed = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);
        let deadline_hit = AtomicBool::new(false);

        let indexed: Vec<(usize, Option<R>)> = self.pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .map(|(idx, item)| {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        deadline_hit.store(true, Ordering::Relaxed);
                    }
                    if cancel.is_cancelled() || deadline_hit.load(Ordering::Relaxed) {
                        skipped.fetch_add(1, Ordering::Relaxed);
                        return (idx, None);
                    }
                    let result = f(idx, item);
                    completed.fetch_add(1, Ordering::Relaxed);
                    (idx, Some(result))
                })
                .collect()
        });

        let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(items.len()).collect();
        for (idx, result) in indexed {
            slots[idx] = result;
        }

        ParallelResult {
            slots,
            completed: completed.load(Ordering::Relaxed),
            skipped: skipped.load(Ordering::Relaxed),
            deadline_exceeded: deadline_hit.load(Ordering::Relaxed),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}
