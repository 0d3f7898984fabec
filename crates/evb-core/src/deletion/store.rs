//! Persistence trait for pending deletion tasks.

use async_trait::async_trait;

use crate::{
    deletion::{DeletionTask, TaskId},
    Result,
};

/// Pending-task storage: one record per task, keyed by [`TaskId`].
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Record a task. Returns `false`, writing nothing, when the key exists.
    async fn insert(&self, task: &DeletionTask) -> Result<bool>;

    /// Drop a task. Returns `false` when the key was not present.
    async fn remove(&self, task_id: &TaskId) -> Result<bool>;

    async fn list(&self) -> Result<Vec<DeletionTask>>;

    /// Whether records outlive the process.
    fn is_durable(&self) -> bool {
        true
    }
}
