//! # Worker pool abstraction.
//!
//! The dispatcher never spawns listener work directly: every invocation is
//! submitted as an independent task to a [`Pool`]. Any bounded executor
//! satisfying the contract can be plugged in with
//! [`EventPool::set_pool`](crate::EventPool::set_pool); [`WorkerPool`] is the
//! default tokio-backed implementation.
//!
//! ## Contract
//! ```text
//! submit(task) ──► waiting ──► running ──► completed (succeeded | failed)
//!                     │
//!                     └─ stop() ──► abandoned (never started)
//!
//! release(): stop accepting, wait for waiting + running tasks, return
//! stop():    stop accepting, drop waiting tasks, let running ones finish
//! ```
//!
//! ## Counters
//! - `submitted_tasks`: accepted by `submit`
//! - `waiting_tasks`: accepted but not started
//! - `running`: currently executing
//! - `successful_tasks` / `failed_tasks`: finished with [`TaskStatus::Succeeded`] /
//!   [`TaskStatus::Failed`] (a panicking task counts as failed)
//! - `completed_tasks`: successful + failed

mod worker_pool;

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::error::SubmitError;

pub use worker_pool::WorkerPool;

/// Final status of a pool task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task finished successfully.
    Succeeded,
    /// Task finished with a failure.
    Failed,
}

/// Unit of work accepted by a [`Pool`].
pub type PoolTask = Pin<Box<dyn Future<Output = TaskStatus> + Send + 'static>>;

/// Bounded task executor with introspection.
#[async_trait]
pub trait Pool: Send + Sync + 'static {
    /// Human-readable pool name (for logs).
    fn name(&self) -> &str {
        "pool"
    }

    /// Queues a task; fails once the pool was released or stopped.
    fn submit(&self, task: PoolTask) -> Result<(), SubmitError>;

    /// Number of tasks currently executing.
    fn running(&self) -> u64;

    /// Total number of accepted tasks.
    fn submitted_tasks(&self) -> u64;

    /// Number of accepted tasks not started yet.
    fn waiting_tasks(&self) -> u64;

    /// Number of tasks finished with [`TaskStatus::Succeeded`].
    fn successful_tasks(&self) -> u64;

    /// Number of tasks finished with [`TaskStatus::Failed`] or a panic.
    fn failed_tasks(&self) -> u64;

    /// Number of finished tasks.
    fn completed_tasks(&self) -> u64 {
        self.successful_tasks() + self.failed_tasks()
    }

    /// Waits until no task is waiting or running.
    async fn wait_idle(&self);

    /// Stops accepting tasks and waits for every accepted task to finish.
    async fn release(&self);

    /// Stops accepting tasks and abandons the ones not started yet.
    fn stop(&self);
}
