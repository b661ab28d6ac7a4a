//! # Tokio-backed bounded worker pool.
//!
//! [`WorkerPool`] runs every submitted [`PoolTask`] as its own tokio task and
//! bounds how many of them execute at once with a [`Semaphore`].
//!
//! ## Architecture
//! ```text
//! submit(task)
//!     │
//!     ▼
//! TaskTracker::spawn ──► acquire permit ──► catch_unwind(task) ──► counters
//!                             │                                      │
//!                             └─ token cancelled → abandoned         └─ idle? → notify
//! ```
//!
//! ## Rules
//! - `max_workers = None` means unlimited concurrency (no semaphore).
//! - A panicking task is recovered and counted as failed.
//! - `release()` closes the gate and awaits every accepted task (drain).
//! - `stop()` closes the gate and cancels the token: tasks still waiting for a
//!   permit are dropped without running; running tasks finish normally.
//! - Must be used from within a tokio runtime.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::{Pool, PoolTask, TaskStatus};
use crate::error::SubmitError;

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    waiting: AtomicU64,
    running: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
    /// Accepted tasks that have neither finished nor been abandoned.
    pending: AtomicU64,
}

struct Shared {
    counters: Counters,
    idle: Notify,
}

impl Shared {
    fn settle(&self) {
        if self.counters.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn abandon(&self) {
        self.counters.waiting.fetch_sub(1, Ordering::AcqRel);
        self.counters.abandoned.fetch_add(1, Ordering::Relaxed);
        self.settle();
    }
}

/// Bounded tokio worker pool.
pub struct WorkerPool {
    name: String,
    limit: Option<Arc<Semaphore>>,
    tracker: TaskTracker,
    token: CancellationToken,
    accepting: RwLock<bool>,
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Creates a pool running at most `max_workers` tasks at once (`None` = unlimited).
    pub fn new(name: impl Into<String>, max_workers: Option<usize>) -> Self {
        let limit = max_workers
            .map(|n| Arc::new(Semaphore::new(n.clamp(1, Semaphore::MAX_PERMITS))));
        Self {
            name: name.into(),
            limit,
            tracker: TaskTracker::new(),
            token: CancellationToken::new(),
            accepting: RwLock::new(true),
            shared: Arc::new(Shared {
                counters: Counters::default(),
                idle: Notify::new(),
            }),
        }
    }

    /// Creates an `Arc`-wrapped pool, ready for [`EventPool::set_pool`](crate::EventPool::set_pool).
    pub fn arc(name: impl Into<String>, max_workers: Option<usize>) -> Arc<Self> {
        Arc::new(Self::new(name, max_workers))
    }

    /// Number of tasks dropped by [`Pool::stop`] before they started.
    pub fn abandoned_tasks(&self) -> u64 {
        self.shared.counters.abandoned.load(Ordering::Relaxed)
    }

    /// Submits every task and waits until each of them has finished.
    ///
    /// Statuses are returned in submission order. Fails without running
    /// anything if the pool no longer accepts work; a task abandoned by a
    /// concurrent [`Pool::stop`] is reported as [`TaskStatus::Failed`].
    pub async fn submit_all_and_wait(
        &self,
        tasks: Vec<PoolTask>,
    ) -> Result<Vec<TaskStatus>, SubmitError> {
        let receivers = {
            let gate = self.accepting.read();
            if !*gate {
                return Err(SubmitError);
            }
            tasks
                .into_iter()
                .map(|task| {
                    let (tx, rx) = tokio::sync::oneshot::channel();
                    self.spawn(Box::pin(async move {
                        let status = AssertUnwindSafe(task)
                            .catch_unwind()
                            .await
                            .unwrap_or(TaskStatus::Failed);
                        let _ = tx.send(status);
                        status
                    }));
                    rx
                })
                .collect::<Vec<_>>()
        };

        let mut statuses = Vec::with_capacity(receivers.len());
        for rx in receivers {
            statuses.push(rx.await.unwrap_or(TaskStatus::Failed));
        }
        Ok(statuses)
    }

    fn spawn(&self, task: PoolTask) {
        let shared = Arc::clone(&self.shared);
        let limit = self.limit.clone();
        let token = self.token.clone();

        shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        shared.counters.waiting.fetch_add(1, Ordering::AcqRel);
        shared.counters.pending.fetch_add(1, Ordering::AcqRel);

        self.tracker.spawn(async move {
            let permit = match limit {
                Some(sem) => tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    permit = sem.acquire_owned() => permit.ok().map(Some),
                },
                None => (!token.is_cancelled()).then_some(None),
            };
            let Some(_permit) = permit else {
                shared.abandon();
                return;
            };

            shared.counters.waiting.fetch_sub(1, Ordering::AcqRel);
            shared.counters.running.fetch_add(1, Ordering::AcqRel);

            let status = AssertUnwindSafe(task)
                .catch_unwind()
                .await
                .unwrap_or(TaskStatus::Failed);

            shared.counters.running.fetch_sub(1, Ordering::AcqRel);
            match status {
                TaskStatus::Succeeded => shared.counters.successful.fetch_add(1, Ordering::Relaxed),
                TaskStatus::Failed => shared.counters.failed.fetch_add(1, Ordering::Relaxed),
            };
            shared.settle();
        });
    }

    fn close_gate(&self) {
        *self.accepting.write() = false;
        self.tracker.close();
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new("eventpool", None)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("running", &self.running())
            .field("waiting", &self.waiting_tasks())
            .field("submitted", &self.submitted_tasks())
            .finish()
    }
}

#[async_trait]
impl Pool for WorkerPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn submit(&self, task: PoolTask) -> Result<(), SubmitError> {
        let gate = self.accepting.read();
        if !*gate {
            return Err(SubmitError);
        }
        self.spawn(task);
        Ok(())
    }

    fn running(&self) -> u64 {
        self.shared.counters.running.load(Ordering::Acquire)
    }

    fn submitted_tasks(&self) -> u64 {
        self.shared.counters.submitted.load(Ordering::Relaxed)
    }

    fn waiting_tasks(&self) -> u64 {
        self.shared.counters.waiting.load(Ordering::Acquire)
    }

    fn successful_tasks(&self) -> u64 {
        self.shared.counters.successful.load(Ordering::Relaxed)
    }

    fn failed_tasks(&self) -> u64 {
        self.shared.counters.failed.load(Ordering::Relaxed)
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.shared.counters.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    async fn release(&self) {
        self.close_gate();
        self.tracker.wait().await;
    }

    fn stop(&self) {
        self.close_gate();
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn explode(msg: &'static str) -> TaskStatus {
        panic!("{msg}")
    }

    fn sleeper(ms: u64, status: TaskStatus) -> PoolTask {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            status
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_counters_after_release() {
        let pool = WorkerPool::new("test", Some(2));
        pool.submit(sleeper(10, TaskStatus::Succeeded)).unwrap();
        pool.submit(sleeper(10, TaskStatus::Failed)).unwrap();
        pool.submit(Box::pin(async { explode("boom") })).unwrap();

        pool.release().await;

        assert_eq!(pool.submitted_tasks(), 3);
        assert_eq!(pool.successful_tasks(), 1);
        assert_eq!(pool.failed_tasks(), 2);
        assert_eq!(pool.completed_tasks(), 3);
        assert_eq!(pool.running(), 0);
        assert_eq!(pool.waiting_tasks(), 0);
        assert_eq!(pool.submit(sleeper(1, TaskStatus::Succeeded)), Err(SubmitError));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new("bounded", Some(1));
        let active = Arc::new(AtomicU64::new(0));
        let peak = Arc::new(AtomicU64::new(0));

        for _ in 0..4 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            pool.submit(Box::pin(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                TaskStatus::Succeeded
            }))
            .unwrap();
        }

        pool.wait_idle().await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(pool.successful_tasks(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_abandons_waiting_tasks() {
        let pool = WorkerPool::new("stop", Some(1));
        for _ in 0..3 {
            pool.submit(sleeper(50, TaskStatus::Succeeded)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(1)).await;

        pool.stop();
        pool.wait_idle().await;

        assert_eq!(pool.successful_tasks(), 1);
        assert_eq!(pool.abandoned_tasks(), 2);
        assert!(pool.submit(sleeper(1, TaskStatus::Succeeded)).is_err());
    }

    #[tokio::test]
    async fn test_submit_all_and_wait_keeps_order() {
        let pool = WorkerPool::new("batch", None);
        let statuses = pool
            .submit_all_and_wait(vec![
                sleeper(3, TaskStatus::Failed),
                sleeper(1, TaskStatus::Succeeded),
                Box::pin(async { explode("x") }),
            ])
            .await
            .unwrap();
        assert_eq!(
            statuses,
            vec![TaskStatus::Failed, TaskStatus::Succeeded, TaskStatus::Failed]
        );
    }

    #[tokio::test]
    async fn test_wait_idle_on_empty_pool_returns() {
        WorkerPool::default().wait_idle().await;
    }
}
