//! Bounded-concurrency task queue.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use storyreel_common::{StoryError, StoryResult};
use tokio::sync::Semaphore;

/// Bounded worker pool for bulk generation.
///
/// At most `workers` tasks run simultaneously, and a fixed pacing delay
/// separates consecutive dispatches to stay under remote rate limits.
/// Results come back in task order; a failing task never prevents the
/// remaining tasks from running.
#[derive(Debug, Clone)]
pub struct BoundedQueue {
    workers: usize,
    pacing: Duration,
}

impl BoundedQueue {
    /// Queue with the given worker cap and inter-dispatch pacing.
    pub fn new(workers: usize, pacing: Duration) -> Self {
        Self {
            workers: workers.max(1),
            pacing,
        }
    }

    /// Worker cap.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run all tasks, returning per-task results in input order.
    pub async fn run_all<T, F, Fut>(&self, tasks: Vec<F>) -> Vec<StoryResult<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = StoryResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(tasks.len());

        for (index, task) in tasks.into_iter().enumerate() {
            // Acquire before dispatch so pacing measures actual dispatch
            // times, not enqueue times.
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            handles.push(tokio::spawn(async move {
                let result = task().await;
                drop(permit);
                result
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(StoryError::generation(format!(
                    "Generation task panicked: {join_error}"
                ))),
            });
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct InFlight {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl InFlight {
        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_worker_cap() {
        let tracker = Arc::new(InFlight::default());
        let queue = BoundedQueue::new(2, Duration::ZERO);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let tracker = tracker.clone();
                move || async move {
                    tracker.enter();
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    tracker.exit();
                    Ok(i)
                }
            })
            .collect();

        let results = queue.run_all(tasks).await;
        assert_eq!(results.len(), 8);
        assert!(tracker.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_results_preserve_task_order() {
        let queue = BoundedQueue::new(4, Duration::ZERO);
        let tasks: Vec<_> = (0..6u64)
            .map(|i| {
                move || async move {
                    // Later tasks finish first.
                    tokio::time::sleep(Duration::from_millis(12 - 2 * i)).await;
                    Ok(i)
                }
            })
            .collect();

        let results = queue.run_all(tasks).await;
        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap(), i as u64);
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_rest() {
        let queue = BoundedQueue::new(2, Duration::ZERO);
        let tasks: Vec<_> = (0..5)
            .map(|i| {
                move || async move {
                    if i == 2 {
                        Err(StoryError::generation("scene 2 failed"))
                    } else {
                        Ok(i)
                    }
                }
            })
            .collect();

        let results = queue.run_all(tasks).await;
        assert_eq!(results.len(), 5);
        assert!(results[2].is_err());
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 4);
    }

    #[tokio::test]
    async fn test_zero_workers_clamped_to_one() {
        let queue = BoundedQueue::new(0, Duration::ZERO);
        assert_eq!(queue.workers(), 1);
        let results = queue.run_all(vec![|| async { Ok(42) }]).await;
        assert_eq!(results[0].as_ref().unwrap(), &42);
    }
}
