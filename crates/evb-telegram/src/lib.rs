//! Telegram adapter (teloxide).
//!
//! This crate implements the `evb-core` MessagingPort over the Telegram Bot API
//! and wires the core entry points into a polling dispatcher.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile},
    ApiError, RequestError,
};
use tokio::sync::OnceCell;

pub mod handlers;
pub mod router;

use evb_core::{
    catalog::MediaRef,
    domain::{ChatId, MessageId, MessageRef},
    errors::{Error, TransportError, TransportErrorKind},
    messaging::{port::MessagingPort, types::InlineKeyboard},
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    handle: std::sync::Arc<OnceCell<String>>,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            handle: std::sync::Arc::new(OnceCell::new()),
        }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> Result<teloxide::types::MessageId> {
        i32::try_from(message_id.0)
            .map(teloxide::types::MessageId)
            .map_err(|_| {
                TransportError::new(
                    TransportErrorKind::Rejected,
                    format!("message id out of range: {message_id}"),
                )
                .into()
            })
    }

    fn sent(chat_id: ChatId, msg: &Message) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: MessageId(i64::from(msg.id.0)),
        }
    }
}

/// Sort a teloxide failure into the transport error kinds the core reacts to.
pub fn map_err(e: RequestError) -> Error {
    let kind = match &e {
        RequestError::RetryAfter(_) => TransportErrorKind::RateLimited,
        RequestError::Network(_) | RequestError::Io(_) => TransportErrorKind::Transient,
        RequestError::Api(api) => match api {
            ApiError::MessageToDeleteNotFound
            | ApiError::MessageIdInvalid
            | ApiError::ChatNotFound => TransportErrorKind::NotFound,
            ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::UserDeactivated
            | ApiError::MessageCantBeDeleted
            | ApiError::CantInitiateConversation => TransportErrorKind::Forbidden,
            _ => TransportErrorKind::Rejected,
        },
        _ => TransportErrorKind::Rejected,
    };
    TransportError::new(kind, format!("telegram error: {e}")).into()
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self
            .bot
            .send_message(Self::tg_chat(chat_id), text.to_string())
            .await
            .map_err(map_err)?;
        Ok(Self::sent(chat_id, &msg))
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &MediaRef,
        caption: &str,
    ) -> Result<MessageRef> {
        let msg = self
            .bot
            .send_video(
                Self::tg_chat(chat_id),
                InputFile::file_id(media.as_str().to_string()),
            )
            .caption(caption.to_string())
            .await
            .map_err(map_err)?;
        Ok(Self::sent(chat_id, &msg))
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.bot
            .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id)?)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn self_handle(&self) -> Result<String> {
        let handle = self
            .handle
            .get_or_try_init(|| async {
                let me = self.bot.get_me().await.map_err(map_err)?;
                me.user.username.clone().ok_or_else(|| {
                    Error::External("bot account has no username".to_string())
                })
            })
            .await?;
        Ok(handle.clone())
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
            .buttons
            .into_iter()
            .map(|b| vec![InlineKeyboardButton::callback(b.label, b.callback_data)])
            .collect();
        let markup = InlineKeyboardMarkup::new(rows);

        let msg = self
            .bot
            .send_message(Self::tg_chat(chat_id), text.to_string())
            .reply_markup(markup)
            .await
            .map_err(map_err)?;
        Ok(Self::sent(chat_id, &msg))
    }
}
