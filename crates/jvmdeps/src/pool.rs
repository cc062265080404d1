//! Bounded worker pool for registry-bound work.
//!
//! Each item becomes one task. A semaphore caps how many run at once, and
//! the shared [`CancellationToken`] is polled before each task starts and
//! again as results come in. Once it is set, every pending task is aborted.

use jvmdeps_core::CancellationToken;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
}

impl WorkerPool {
    /// A pool running at most `max_concurrency` tasks at once (at least one).
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Runs `task` for every item and returns the outputs in input order.
    ///
    /// An entry is `None` when its task was skipped or aborted by
    /// cancellation, or when it panicked.
    pub async fn run<T, F, Fut>(
        &self,
        items: Vec<T>,
        cancel: &CancellationToken,
        task: F,
    ) -> Vec<Option<Fut::Output>>
    where
        T: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let task = Arc::new(task);
        let mut results: Vec<Option<Fut::Output>> = std::iter::repeat_with(|| None)
            .take(items.len())
            .collect();
        let mut set = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let semaphore = Arc::clone(&self.semaphore);
            let cancel = cancel.clone();
            let task = Arc::clone(&task);
            set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, None);
                };
                if cancel.is_cancelled() {
                    return (index, None);
                }
                (index, Some(task(item).await))
            });
        }

        while let Some(joined) = set.join_next().await {
            if cancel.is_cancelled() {
                set.abort_all();
            }
            match joined {
                Ok((index, output)) => results[index] = output,
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::warn!("Worker task failed: {}", e),
            }
        }

        results
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let pool = WorkerPool::new(3);
        let results = pool
            .run(vec![30u64, 10, 20, 0], &CancellationToken::new(), |ms| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                ms * 2
            })
            .await;
        assert_eq!(results, vec![Some(60), Some(20), Some(40), Some(0)]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        pool.run((0..8).collect(), &CancellationToken::new(), move |_: i32| {
            let (running, peak) = (Arc::clone(&r), Arc::clone(&p));
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let results = WorkerPool::new(4)
            .run(vec![1, 2, 3], &cancel, move |n: i32| {
                c.fetch_add(1, Ordering::SeqCst);
                async move { n }
            })
            .await;
        assert_eq!(results, vec![None, None, None]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        assert_eq!(WorkerPool::new(0).max_concurrency(), 1);
    }
}
