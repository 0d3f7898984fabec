use std::sync::Arc;

use evb_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), evb_core::Error> {
    evb_core::logging::init("evb")?;

    let cfg = Arc::new(Config::load()?);
    tracing::debug!(?cfg, "configuration loaded");

    evb_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| evb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
