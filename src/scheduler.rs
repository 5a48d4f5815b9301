//! Deferred task scheduling
//!
//! Wager expiry and game turn sequences run as independent tokio tasks.
//! Timers are never cancelled; a superseded timer must make its own effect a
//! no-op (see `PendingWagersPool::expire`).

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const DRAIN_POLL: Duration = Duration::from_millis(25);

/// Spawns deferred work and tracks how much of it is still in flight
#[derive(Clone, Default)]
pub struct TaskScheduler {
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight count when the task finishes or panics
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` in the background
    pub fn spawn<F, T>(&self, task: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard(self.in_flight.clone());
        tokio::spawn(async move {
            let _guard = guard;
            task.await
        })
    }

    /// Run `task` once `delay` has fully elapsed
    pub fn schedule_after<F, T>(&self, delay: Duration, task: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await
        })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until every spawned task has finished
    pub async fn drain(&self) {
        while self.in_flight() > 0 {
            tokio::time::sleep(DRAIN_POLL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test(start_paused = true)]
    async fn test_schedule_after_waits_full_delay() {
        let scheduler = TaskScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));

        let flag = fired.clone();
        let handle = scheduler.schedule_after(Duration::from_secs(30), async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(scheduler.in_flight(), 1);

        handle.await.unwrap();
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_waits_for_pending_timers() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule_after(Duration::from_secs(5), async {});
        scheduler.schedule_after(Duration::from_secs(10), async {});

        scheduler.drain().await;
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_spawn_returns_value() {
        let scheduler = TaskScheduler::new();
        let value = scheduler.spawn(async { 6 * 7 }).await.unwrap();
        assert_eq!(value, 42);
    }
}
