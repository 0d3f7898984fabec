//! Entry points the transport calls: `/start [token]` and menu selections.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::{
    domain::ChatId,
    emission::{EmitOutcome, Emitter},
    errors::InvalidTokenReason,
    menu::Menu,
    messaging::port::MessagingPort,
    payload::PayloadRouter,
    Result,
};

pub const UNRECOGNIZED_LINK_TEXT: &str = "Sorry, I don't recognize this link.";

/// Per-chat mutexes so emissions to one chat never interleave.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<ChatId, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: ChatId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            // Clones only happen under this lock, so a lone reference is idle.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// No payload: welcome text and menu were shown.
    Menu,
    Unrecognized(InvalidTokenReason),
    Emitted { batch: String, outcome: EmitOutcome },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionOutcome {
    Linked { batch: String, link_message: String },
    /// Key not in the menu; nothing was sent.
    Ignored,
}

pub struct Frontend {
    router: Arc<PayloadRouter>,
    menu: Arc<Menu>,
    emitter: Arc<Emitter>,
    messenger: Arc<dyn MessagingPort>,
    chat_locks: ChatLocks,
}

impl Frontend {
    pub fn new(
        router: Arc<PayloadRouter>,
        menu: Arc<Menu>,
        emitter: Arc<Emitter>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            router,
            menu,
            emitter,
            messenger,
            chat_locks: ChatLocks::default(),
        }
    }

    /// `/start` with the text that followed the command.
    pub async fn on_command_start(&self, chat_id: ChatId, args: &str) -> Result<StartOutcome> {
        let Some(token) = args.split_whitespace().next() else {
            self.messenger
                .send_inline_keyboard(chat_id, self.menu.welcome(), self.menu.keyboard())
                .await?;
            return Ok(StartOutcome::Menu);
        };

        let batch = match self.router.resolve(token) {
            Ok(batch) => batch,
            Err(e) => {
                info!(%chat_id, reason = ?e.reason, "unrecognized start payload");
                self.messenger
                    .send_text(chat_id, UNRECOGNIZED_LINK_TEXT)
                    .await?;
                return Ok(StartOutcome::Unrecognized(e.reason));
            }
        };

        let _guard = self.chat_locks.lock_chat(chat_id).await;
        let outcome = self.emitter.emit(chat_id, batch).await?;
        Ok(StartOutcome::Emitted {
            batch: batch.name.clone(),
            outcome,
        })
    }

    /// A menu button press carrying `key`.
    pub async fn on_selection(&self, chat_id: ChatId, key: &str) -> Result<SelectionOutcome> {
        let Some(entry) = self.menu.entry(key) else {
            debug!(%chat_id, key, "ignoring unknown selection");
            return Ok(SelectionOutcome::Ignored);
        };

        let handle = self.messenger.self_handle().await?;
        let link_message = self.menu.link_message(&handle, entry)?;
        self.messenger.send_text(chat_id, &link_message).await?;
        Ok(SelectionOutcome::Linked {
            batch: entry.batch_name.clone(),
            link_message,
        })
    }
}
