//! Test doubles for the transport port.
//!
//! Compiled into the library so integration tests and the adapter crate can
//! share them.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    catalog::MediaRef,
    domain::{ChatId, MessageId, MessageRef},
    errors::{TransportError, TransportErrorKind},
    messaging::{port::MessagingPort, types::InlineKeyboard},
    Result,
};

/// One outbound call recorded by [`RecordingMessenger`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Text {
        msg: MessageRef,
        text: String,
    },
    Media {
        msg: MessageRef,
        media: String,
        caption: String,
    },
    Keyboard {
        msg: MessageRef,
        text: String,
        keyboard: InlineKeyboard,
    },
}

/// Messenger that records every call and fails on request.
pub struct RecordingMessenger {
    handle: String,
    next_id: AtomicI64,
    sent: Mutex<Vec<Sent>>,
    deleted: Mutex<Vec<MessageRef>>,
    failing_media: Mutex<HashMap<String, TransportErrorKind>>,
    failing_deletes: Mutex<HashMap<i64, TransportErrorKind>>,
    delete_delay: Mutex<Option<Duration>>,
}

impl Default for RecordingMessenger {
    fn default() -> Self {
        Self::new("ExampleBot")
    }
}

impl RecordingMessenger {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            next_id: AtomicI64::new(1),
            sent: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            failing_media: Mutex::new(HashMap::new()),
            failing_deletes: Mutex::new(HashMap::new()),
            delete_delay: Mutex::new(None),
        }
    }

    /// Make every send of `media` fail with `kind`.
    pub fn fail_media(&self, media: &str, kind: TransportErrorKind) {
        lock(&self.failing_media).insert(media.to_string(), kind);
    }

    /// Make deleting message `message_id` (in any chat) fail with `kind`.
    pub fn fail_delete(&self, message_id: i64, kind: TransportErrorKind) {
        lock(&self.failing_deletes).insert(message_id, kind);
    }

    pub fn delay_deletes(&self, delay: Duration) {
        *lock(&self.delete_delay) = Some(delay);
    }

    pub fn sent(&self) -> Vec<Sent> {
        lock(&self.sent).clone()
    }

    pub fn texts(&self, chat_id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { msg, text } if msg.chat_id == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    /// `(media, caption, message)` for each media send to `chat_id`.
    pub fn media(&self, chat_id: ChatId) -> Vec<(String, String, MessageRef)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Media {
                    msg,
                    media,
                    caption,
                } if msg.chat_id == chat_id => Some((media, caption, msg)),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        lock(&self.deleted).clone()
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self.alloc(chat_id);
        lock(&self.sent).push(Sent::Text {
            msg,
            text: text.to_string(),
        });
        Ok(msg)
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &MediaRef,
        caption: &str,
    ) -> Result<MessageRef> {
        if let Some(kind) = lock(&self.failing_media).get(media.as_str()).copied() {
            return Err(TransportError::new(kind, format!("send of {} refused", media.as_str())).into());
        }
        let msg = self.alloc(chat_id);
        lock(&self.sent).push(Sent::Media {
            msg,
            media: media.as_str().to_string(),
            caption: caption.to_string(),
        });
        Ok(msg)
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        let delay = *lock(&self.delete_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(kind) = lock(&self.failing_deletes).get(&msg.message_id.0).copied() {
            return Err(TransportError::new(kind, "delete refused").into());
        }
        lock(&self.deleted).push(msg);
        Ok(())
    }

    async fn self_handle(&self) -> Result<String> {
        Ok(self.handle.clone())
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let msg = self.alloc(chat_id);
        lock(&self.sent).push(Sent::Keyboard {
            msg,
            text: text.to_string(),
            keyboard,
        });
        Ok(msg)
    }
}
