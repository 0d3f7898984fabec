use async_trait::async_trait;

use crate::{
    catalog::MediaRef,
    domain::{ChatId, MessageRef},
    messaging::types::InlineKeyboard,
    Result,
};

/// Chat transport port.
///
/// Every method is fallible; transport failures come back as
/// [`Error::Transport`](crate::Error::Transport) carrying a typed kind.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    async fn send_media(&self, chat_id: ChatId, media: &MediaRef, caption: &str)
        -> Result<MessageRef>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    /// The bot's own public handle (username without `@`).
    async fn self_handle(&self) -> Result<String>;

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;
}
