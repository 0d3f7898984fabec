//! Deletion scheduler: arms tasks on a min-heap keyed by `fire_at` and fires
//! them from a background timing loop.
//!
//! - `register()` persists first, then arms; a key is never armed twice.
//! - `start()` reloads the store and fires everything already overdue before
//!   returning, so recovery happens ahead of any new registration.
//! - Each due task is fired on its own tokio task with a timeout; one slow or
//!   failing delete never holds up the loop or its neighbours.
//! - Whatever the delete result, the task is removed from the store. There is
//!   no retry.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{Mutex, Notify},
    task::{JoinHandle, JoinSet},
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    deletion::{store::TaskStore, DeletionTask, TaskId, TaskState},
    messaging::port::MessagingPort,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// Longest the timing loop sleeps before re-checking, even with nothing due.
    pub max_sleep: Duration,
    /// Bound on a single delete call.
    pub delete_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_sleep: Duration::from_secs(5),
            delete_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    Scheduled,
    /// The same chat+message pair is already pending; nothing was added.
    Duplicate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FireOutcome {
    Completed,
    FailedPermanent(String),
}

impl FireOutcome {
    /// Terminal state the task ended in.
    pub fn state(&self) -> TaskState {
        match self {
            FireOutcome::Completed => TaskState::Completed,
            FireOutcome::FailedPermanent(_) => TaskState::FailedPermanent,
        }
    }
}

pub struct DeletionScheduler {
    store: Arc<dyn TaskStore>,
    messenger: Arc<dyn MessagingPort>,
    clock: Arc<dyn Clock>,
    cfg: SchedulerConfig,
    state: Mutex<SchedulerState>,
    wake: Notify,
    cancel: CancellationToken,
    timer: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct SchedulerState {
    queue: BinaryHeap<Reverse<(DateTime<Utc>, TaskId)>>,
    tasks: HashMap<TaskId, TaskEntry>,
}

struct TaskEntry {
    task: DeletionTask,
    state: TaskState,
    armed: bool,
}

impl SchedulerState {
    fn arm(&mut self, task: DeletionTask) {
        self.queue
            .push(Reverse((task.fire_at, task.task_id.clone())));
        self.tasks.insert(
            task.task_id.clone(),
            TaskEntry {
                task,
                state: TaskState::Scheduled,
                armed: true,
            },
        );
    }

    fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        self.queue.peek().map(|Reverse((at, _))| *at)
    }

    /// Pop every armed task due at `now`, marking it `Fired`.
    fn take_due(&mut self, now: DateTime<Utc>) -> Vec<DeletionTask> {
        let mut due = Vec::new();
        while let Some(Reverse((at, _))) = self.queue.peek() {
            if *at > now {
                break;
            }
            let Some(Reverse((_, id))) = self.queue.pop() else {
                break;
            };
            if let Some(entry) = self.tasks.get_mut(&id) {
                if entry.armed && entry.state == TaskState::Scheduled {
                    entry.state = TaskState::Fired;
                    due.push(entry.task.clone());
                }
            }
        }
        due
    }
}

impl DeletionScheduler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        messenger: Arc<dyn MessagingPort>,
        clock: Arc<dyn Clock>,
        cfg: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            messenger,
            clock,
            cfg,
            state: Mutex::new(SchedulerState::default()),
            wake: Notify::new(),
            cancel: CancellationToken::new(),
            timer: Mutex::new(None),
        })
    }

    /// Reload pending tasks, fire the overdue ones, then start the timing loop.
    ///
    /// Returns the number of tasks recovered from the store.
    pub async fn start(self: &Arc<Self>) -> Result<usize> {
        let recovered = self.recover().await?;
        let fired = self.run_due().await;
        info!(
            recovered,
            fired_on_recovery = fired.len(),
            "deletion scheduler recovered pending tasks"
        );

        let mut timer = self.timer.lock().await;
        if timer.is_none() {
            let scheduler = Arc::clone(self);
            *timer = Some(tokio::spawn(async move {
                scheduler.timer_loop().await;
            }));
        }
        Ok(recovered)
    }

    /// Stop the timing loop. Durable tasks stay recorded for the next start.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.timer.lock().await.take() {
            let _ = handle.await;
        }

        let mut st = self.state.lock().await;
        let pending = st
            .tasks
            .values()
            .filter(|e| e.state == TaskState::Scheduled)
            .count();
        if self.store.is_durable() {
            info!(pending, "deletion scheduler stopped; pending tasks kept in store");
        } else {
            for entry in st.tasks.values_mut() {
                if entry.state == TaskState::Scheduled {
                    entry.state = TaskState::Cancelled;
                }
            }
            warn!(pending, "deletion scheduler stopped; store is not durable, pending tasks cancelled");
        }
    }

    /// Persist and arm a task.
    pub async fn register(&self, task: DeletionTask) -> Result<RegisterOutcome> {
        {
            let mut st = self.state.lock().await;
            if st.tasks.contains_key(&task.task_id) {
                debug!(task_id = %task.task_id, "duplicate deletion task ignored");
                return Ok(RegisterOutcome::Duplicate);
            }
            // Reserve the key; it cannot fire until armed below.
            st.tasks.insert(
                task.task_id.clone(),
                TaskEntry {
                    task: task.clone(),
                    state: TaskState::Scheduled,
                    armed: false,
                },
            );
        }

        let inserted = match self.store.insert(&task).await {
            Ok(v) => v,
            Err(e) => {
                self.state.lock().await.tasks.remove(&task.task_id);
                return Err(e);
            }
        };

        self.state.lock().await.arm(task.clone());
        self.wake.notify_one();

        if inserted {
            debug!(task_id = %task.task_id, fire_at = %task.fire_at, "deletion task scheduled");
            Ok(RegisterOutcome::Scheduled)
        } else {
            // Already durable from an earlier run; now armed in memory as well.
            Ok(RegisterOutcome::Duplicate)
        }
    }

    /// Arm every stored task not already known. Returns how many were added.
    pub async fn recover(&self) -> Result<usize> {
        let stored = self.store.list().await?;
        let mut st = self.state.lock().await;
        let mut added = 0usize;
        for task in stored {
            if st.tasks.contains_key(&task.task_id) {
                continue;
            }
            st.arm(task);
            added += 1;
        }
        if added > 0 {
            self.wake.notify_one();
        }
        Ok(added)
    }

    /// Fire every task due now and wait for all of them to finish.
    pub async fn run_due(self: &Arc<Self>) -> Vec<(TaskId, FireOutcome)> {
        let mut set = self.dispatch_due().await;
        let mut out = Vec::new();
        while let Some(res) = set.join_next().await {
            match res {
                Ok(v) => out.push(v),
                Err(e) => error!("deletion task panicked: {e}"),
            }
        }
        out
    }

    /// Tasks that have not fired yet, earliest first.
    pub async fn pending(&self) -> Vec<DeletionTask> {
        let st = self.state.lock().await;
        let mut out: Vec<DeletionTask> = st
            .tasks
            .values()
            .filter(|e| e.state == TaskState::Scheduled)
            .map(|e| e.task.clone())
            .collect();
        out.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then(a.task_id.cmp(&b.task_id)));
        out
    }

    pub async fn state_of(&self, task_id: &TaskId) -> Option<TaskState> {
        let st = self.state.lock().await;
        st.tasks.get(task_id).map(|e| e.state)
    }

    async fn dispatch_due(self: &Arc<Self>) -> JoinSet<(TaskId, FireOutcome)> {
        let now = self.clock.now();
        let due = { self.state.lock().await.take_due(now) };

        let mut set = JoinSet::new();
        for task in due {
            let scheduler = Arc::clone(self);
            set.spawn(async move {
                let id = task.task_id.clone();
                let outcome = scheduler.fire(task).await;
                (id, outcome)
            });
        }
        set
    }

    async fn fire(&self, task: DeletionTask) -> FireOutcome {
        let msg = task.message();
        // Bounds the transport call alone; the messenger must not queue deletes.
        let outcome = match timeout(self.cfg.delete_timeout, self.messenger.delete_message(msg)).await
        {
            Ok(Ok(())) => {
                info!(
                    chat_id = %task.chat_id,
                    message_id = %task.message_id,
                    "deleted expired message"
                );
                FireOutcome::Completed
            }
            Ok(Err(e)) => {
                warn!(
                    chat_id = %task.chat_id,
                    message_id = %task.message_id,
                    "failed to delete expired message: {e}"
                );
                FireOutcome::FailedPermanent(e.to_string())
            }
            Err(_) => {
                warn!(
                    chat_id = %task.chat_id,
                    message_id = %task.message_id,
                    timeout_ms = self.cfg.delete_timeout.as_millis() as u64,
                    "delete timed out"
                );
                FireOutcome::FailedPermanent("delete timed out".to_string())
            }
        };

        if let Err(e) = self.store.remove(&task.task_id).await {
            // Left in the store: it fires again after the next restart.
            error!(task_id = %task.task_id, "failed to remove deletion task from store: {e}");
        }

        self.state.lock().await.tasks.remove(&task.task_id);
        debug!(task_id = %task.task_id, state = ?outcome.state(), "deletion task finished");
        outcome
    }

    async fn timer_loop(self: Arc<Self>) {
        loop {
            let wait = self.time_until_next().await;
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.wake.notified() => continue,
                _ = sleep(wait) => {}
            }

            let mut set = self.dispatch_due().await;
            if set.is_empty() {
                continue;
            }
            tokio::spawn(async move {
                while let Some(res) = set.join_next().await {
                    if let Err(e) = res {
                        error!("deletion task panicked: {e}");
                    }
                }
            });
        }
        debug!("deletion timer loop exited");
    }

    async fn time_until_next(&self) -> Duration {
        let next = { self.state.lock().await.next_fire_at() };
        let Some(next) = next else {
            return self.cfg.max_sleep;
        };
        (next - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO)
            .min(self.cfg.max_sleep)
    }
}
