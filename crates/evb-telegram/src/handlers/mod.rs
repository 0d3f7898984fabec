//! Telegram update handlers.
//!
//! Each handler is a small adapter that pulls the chat and payload out of the
//! update and calls into the `evb-core` frontend. Failures are logged here and
//! never returned to the dispatcher, so one chat cannot stall the others.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};
use tracing::{error, warn};

use evb_core::domain::ChatId;

use crate::router::AppState;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    // Always answer so the client stops its spinner.
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!("failed to answer callback query: {e}");
    }

    let Some(chat_id) = q.message.as_ref().map(|m| ChatId(m.chat.id.0)) else {
        return Ok(());
    };
    let Some(data) = q.data.as_deref().filter(|d| !d.is_empty()) else {
        return Ok(());
    };

    if let Err(e) = state.frontend.on_selection(chat_id, data).await {
        error!(%chat_id, selection = data, "selection failed: {e}");
    }
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !text.starts_with('/') {
        return Ok(());
    }

    let (cmd, args) = parse_command(text);
    if cmd != "start" {
        return Ok(());
    }

    let chat_id = ChatId(msg.chat.id.0);
    if let Err(e) = state.frontend.on_command_start(chat_id, &args).await {
        error!(%chat_id, "/start failed: {e}");
    }
    Ok(())
}

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}
