//! kopiyka-bot — the chat front-end binary.
//!
//! Startup sequence:
//!   1. Read env settings (TELEGRAM_BOT_TOKEN and MASTER_KEY are required)
//!   2. Open the per-user stores under CACHE_DIR
//!   3. Spawn the scheduler jobs (interval + daily/weekly/monthly crons)
//!   4. Long-poll Telegram and dispatch messages

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

mod app;
mod handlers;
mod scheduler;
mod settings;
mod telegram;
mod templates;

use app::AppState;
use settings::Settings;

const POLL_TIMEOUT_SECS: u64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("reading environment")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .init();

    info!(cache_dir = %settings.cache_dir.display(), "kopiyka starting");

    let state = Arc::new(AppState::new(settings).context("opening stores")?);
    scheduler::spawn_jobs(Arc::clone(&state));

    info!("bot ready, polling for updates");
    let mut offset = 0i64;
    loop {
        match state.telegram.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    if let Some(message) = update.message {
                        tokio::spawn(handlers::handle_message(Arc::clone(&state), message));
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed, backing off");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}
