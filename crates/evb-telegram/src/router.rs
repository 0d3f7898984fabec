use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use evb_core::{
    clock::SystemClock,
    config::Config,
    deletion::{DeletionScheduler, FileStore},
    emission::Emitter,
    frontend::Frontend,
    menu::Menu,
    messaging::{
        port::MessagingPort,
        pacing::{PacedMessenger, PacingConfig},
    },
    payload::PayloadRouter,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub frontend: Arc<Frontend>,
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = if cfg.throttle_outbound {
        Arc::new(PacedMessenger::new(raw_messenger, PacingConfig::default()))
    } else {
        raw_messenger
    };

    match messenger.self_handle().await {
        Ok(handle) => info!("evb started: @{handle}"),
        Err(e) => warn!("could not look up bot identity: {e}"),
    }

    let catalog = Arc::new(cfg.load_catalog()?);
    let router = Arc::new(PayloadRouter::new(catalog.clone())?);
    let menu = Arc::new(Menu::new(router.clone(), cfg.link_host.clone()));
    info!(
        batches = catalog.batches().len(),
        link_host = %cfg.link_host,
        "catalog loaded"
    );

    // Store failure is fatal.
    let store = Arc::new(FileStore::open(&cfg.persistence_path).await?);

    let scheduler = DeletionScheduler::new(
        store,
        messenger.clone(),
        Arc::new(SystemClock),
        cfg.scheduler_config(),
    );
    // Overdue deletions fire before any update is taken.
    scheduler.start().await?;

    let emitter = Arc::new(Emitter::new(
        messenger.clone(),
        scheduler.clone(),
        Arc::new(SystemClock),
        cfg.retention_window(),
        catalog.caption.clone(),
    ));
    let state = Arc::new(AppState {
        frontend: Arc::new(Frontend::new(router, menu, emitter, messenger)),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    scheduler.shutdown().await;
    info!("evb stopped");
    Ok(())
}
