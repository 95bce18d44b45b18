use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Serializes outbound calls to one upstream host.
///
/// All tasks scheduled against the same throttler run one at a time, in
/// submission order, and each starts no sooner than `min_interval` after the
/// previous task's start. The queue is the lock's own waiter list; tokio's
/// async mutex hands the guard to waiters FIFO, which is exactly the ordering
/// guarantee we need. Once scheduled, a task always runs; there is no
/// cancellation and no priority.
pub struct RequestThrottler {
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl RequestThrottler {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: Mutex::new(None),
        }
    }

    /// Run `task` in this host's queue, waiting out the minimum interval
    /// first. The previous task must have completed before the next one
    /// starts, so a slow upstream call also pushes back everything behind it.
    pub async fn schedule<F>(&self, task: F) -> F::Output
    where
        F: Future,
    {
        let mut last_start = self.last_start.lock().await;

        if let Some(prev) = *last_start {
            tokio::time::sleep_until(prev + self.min_interval).await;
        }
        *last_start = Some(Instant::now());

        // The guard stays held across the task, serializing completion
        task.await
    }
}
