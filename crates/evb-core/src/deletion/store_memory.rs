//! In-memory store for tests.

use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;

use crate::{
    deletion::{store::TaskStore, DeletionTask, TaskId},
    Result,
};

/// `BTreeMap`-backed store. Nothing survives the process.
#[derive(Default)]
pub struct InMemoryStore {
    tasks: Mutex<BTreeMap<TaskId, DeletionTask>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = DeletionTask>) -> Self {
        let map = tasks
            .into_iter()
            .map(|t| (t.task_id.clone(), t))
            .collect();
        Self {
            tasks: Mutex::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn insert(&self, task: &DeletionTask) -> Result<bool> {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if tasks.contains_key(&task.task_id) {
            return Ok(false);
        }
        tasks.insert(task.task_id.clone(), task.clone());
        Ok(true)
    }

    async fn remove(&self, task_id: &TaskId) -> Result<bool> {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tasks.remove(task_id).is_some())
    }

    async fn list(&self) -> Result<Vec<DeletionTask>> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tasks.values().cloned().collect())
    }

    fn is_durable(&self) -> bool {
        false
    }
}
