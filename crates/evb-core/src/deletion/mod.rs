//! Durable delayed deletion of sent messages.
//!
//! Each sent message that should expire gets one [`DeletionTask`]. Tasks are
//! written to a [`TaskStore`] at registration, re-armed from it on startup and
//! removed once the delete has been attempted, whatever its result.
//!
//! Task lifecycle: `Scheduled -> Fired -> Completed | FailedPermanent`, or
//! `Scheduled -> Cancelled` when a non-durable store is shut down.

pub mod scheduler;
pub mod store;
pub mod store_file;
pub mod store_memory;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ChatId, MessageId, MessageRef};

pub use scheduler::{DeletionScheduler, FireOutcome, RegisterOutcome, SchedulerConfig};
pub use store::TaskStore;
pub use store_file::FileStore;
pub use store_memory::InMemoryStore;

/// Key of a deletion task, derived from the chat and message it targets.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn for_message(msg: MessageRef) -> Self {
        Self(format!("delete_{}_{}", msg.chat_id, msg.message_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionTask {
    pub task_id: TaskId,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub fire_at: DateTime<Utc>,
}

impl DeletionTask {
    pub fn new(msg: MessageRef, fire_at: DateTime<Utc>) -> Self {
        Self {
            task_id: TaskId::for_message(msg),
            chat_id: msg.chat_id,
            message_id: msg.message_id,
            fire_at,
        }
    }

    pub fn message(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Scheduled,
    Fired,
    Completed,
    FailedPermanent,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn task_id_is_derived_from_chat_and_message() {
        let msg = MessageRef {
            chat_id: ChatId(-100123),
            message_id: MessageId(42),
        };
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let task = DeletionTask::new(msg, at);
        assert_eq!(task.task_id.as_str(), "delete_-100123_42");
        assert_eq!(task.task_id, TaskId::for_message(msg));
        assert_eq!(task.message(), msg);
    }

    #[test]
    fn task_serializes_with_minimal_schema() {
        let msg = MessageRef {
            chat_id: ChatId(7),
            message_id: MessageId(9),
        };
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let v = serde_json::to_value(DeletionTask::new(msg, at)).unwrap();
        assert_eq!(v["task_id"], "delete_7_9");
        assert_eq!(v["chat_id"], 7);
        assert_eq!(v["message_id"], 9);
        assert_eq!(v["fire_at"], "2026-01-02T03:04:05Z");
    }
}
