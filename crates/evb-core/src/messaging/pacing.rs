//! Outbound pacing for sends.
//!
//! Telegram caps how fast a bot may post, overall and into a single chat.
//! Sends wait for a slot that respects both gaps. Deletes and identity lookups
//! pass straight through: the deletion scheduler bounds each delete with its
//! own timeout, and that timeout covers the transport call only.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::Mutex,
    time::{sleep_until, Instant},
};
use tracing::trace;

use crate::{
    catalog::MediaRef,
    domain::{ChatId, MessageRef},
    messaging::{port::MessagingPort, types::InlineKeyboard},
    Result,
};

/// Chats tracked before entries whose slot has passed are swept.
const SWEEP_AT: usize = 1024;

/// Gaps enforced between outgoing sends.
#[derive(Clone, Copy, Debug)]
pub struct PacingConfig {
    /// Between any two sends.
    pub global_gap: Duration,
    /// Between two sends into the same chat.
    pub per_chat_gap: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            global_gap: Duration::from_millis(40),
            per_chat_gap: Duration::from_millis(1050),
        }
    }
}

#[derive(Debug)]
struct SendSlots {
    next_any: Instant,
    next_in_chat: HashMap<ChatId, Instant>,
}

impl SendSlots {
    fn new(now: Instant) -> Self {
        Self {
            next_any: now,
            next_in_chat: HashMap::new(),
        }
    }

    /// Book the earliest instant, not before `now`, at which `chat_id` may be sent to.
    fn book(&mut self, cfg: &PacingConfig, chat_id: ChatId, now: Instant) -> Instant {
        if self.next_in_chat.len() >= SWEEP_AT {
            // A passed slot constrains nothing; the chat is as good as unknown.
            self.next_in_chat.retain(|_, next| *next > now);
        }
        let chat_next = self.next_in_chat.get(&chat_id).copied().unwrap_or(now);
        let at = now.max(self.next_any).max(chat_next);
        self.next_any = at + cfg.global_gap;
        self.next_in_chat.insert(chat_id, at + cfg.per_chat_gap);
        at
    }
}

/// [`MessagingPort`] decorator that spaces out sends.
///
/// It only waits and never retries; a send that still hits a 429 surfaces as
/// `RateLimited` like any other transport failure.
pub struct PacedMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: PacingConfig,
    slots: Mutex<SendSlots>,
}

impl PacedMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: PacingConfig) -> Self {
        Self {
            inner,
            cfg,
            slots: Mutex::new(SendSlots::new(Instant::now())),
        }
    }

    async fn wait_for_slot(&self, chat_id: ChatId) {
        let now = Instant::now();
        let at = self.slots.lock().await.book(&self.cfg, chat_id, now);
        if at > now {
            trace!(%chat_id, wait_ms = (at - now).as_millis() as u64, "send paced");
            sleep_until(at).await;
        }
    }
}

#[async_trait]
impl MessagingPort for PacedMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.wait_for_slot(chat_id).await;
        self.inner.send_text(chat_id, text).await
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &MediaRef,
        caption: &str,
    ) -> Result<MessageRef> {
        self.wait_for_slot(chat_id).await;
        self.inner.send_media(chat_id, media, caption).await
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.inner.delete_message(msg).await
    }

    async fn self_handle(&self) -> Result<String> {
        self.inner.self_handle().await
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.wait_for_slot(chat_id).await;
        self.inner
            .send_inline_keyboard(chat_id, text, keyboard)
            .await
    }
}
