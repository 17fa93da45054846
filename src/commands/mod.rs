//! CLI subcommands

pub mod account;
pub mod draw;
pub mod report;
pub mod schedule;

use anyhow::{Context, Result};
use lc_lottery::notify::{LogSink, QueuedSink, WebhookSink};
use lc_lottery::state_manager::{create_store, SqliteLotteryStore};
use lc_lottery::Config;
use std::sync::Arc;
use tracing::{info, warn};

/// Open (and bootstrap) the configured database
pub fn open_store(config: &Config) -> Result<SqliteLotteryStore> {
    let path = &config.storage.db_path;
    create_store(path, config.storage.busy_timeout())
        .with_context(|| format!("Failed to open lottery database {}", path.display()))
}

/// Notification queue over the webhook sink, or over the log sink when no
/// webhook is configured or notifications are disabled.
///
/// Must be called outside the tokio runtime: the blocking HTTP client is
/// created here and later dropped on the queue's worker thread.
pub fn build_notifier(config: &Config) -> Result<Arc<QueuedSink>> {
    let n = &config.notifications;

    let queue = match (&n.webhook_url, n.enabled) {
        (Some(url), true) => {
            let sink = WebhookSink::new(url.clone(), n.timeout(), n.breaker())
                .context("Failed to build webhook client")?
                .with_bot_token(n.bot_token.clone())
                .with_secret(n.webhook_secret.clone());
            info!("Notifications: webhook {}", url);
            QueuedSink::spawn(sink)
        }
        (None, true) => {
            warn!("No webhook URL configured, notifications will only be logged");
            QueuedSink::spawn(LogSink)
        }
        (_, false) => {
            info!("Notifications disabled, logging only");
            QueuedSink::spawn(LogSink)
        }
    }
    .context("Failed to start notification worker")?;

    Ok(Arc::new(queue))
}

/// Drain the notification queue and log what happened
pub fn finish_notifications(notifier: &QueuedSink) {
    let stats = notifier.shutdown();
    info!(
        "Notifications: {} delivered, {} failed",
        stats.delivered, stats.failed
    );
}
