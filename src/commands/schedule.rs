//! Schedule command: settle pools as their draw dates come due
//!
//! Every tick checks both pools and runs the settlement for each pool whose
//! `next_draw_date` is today or earlier. Settlements run on the blocking
//! pool since storage and the engine are synchronous.

use anyhow::{Context, Result};
use chrono::Utc;
use lc_lottery::lottery::{SettlementEngine, SettlementOutcome};
use lc_lottery::notify::QueuedSink;
use lc_lottery::state_manager::SqliteLotteryStore;
use lc_lottery::{Config, DrawType};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use super::{build_notifier, finish_notifications, open_store};

pub fn run(config: Config, interval_override: Option<u64>, once: bool) -> Result<()> {
    let interval_secs = interval_override.unwrap_or(config.schedule.interval_secs).max(1);

    let store = open_store(&config)?;
    // Built before the runtime so the blocking HTTP client never lives on it
    let notifier = build_notifier(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let result = runtime.block_on(run_async(
        store,
        notifier.clone(),
        config.notifications.owner_recipient.clone(),
        interval_secs,
        once,
    ));

    drop(runtime);
    finish_notifications(&notifier);
    result
}

async fn run_async(
    store: SqliteLotteryStore,
    notifier: Arc<QueuedSink>,
    owner: String,
    interval_secs: u64,
    once: bool,
) -> Result<()> {
    info!(
        "Draw scheduler started: checking every {} seconds{}",
        interval_secs,
        if once { " (single pass)" } else { "" }
    );

    if once {
        return tick(store, notifier, owner).await;
    }

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                error!("Error setting up signal handler: {}", e);
            }
        }
    });

    let mut ticker = interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = tick(store.clone(), notifier.clone(), owner.clone()).await {
                    error!("Scheduled draw check failed: {:#}", e);
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Draw scheduler stopped.");
    Ok(())
}

async fn tick(store: SqliteLotteryStore, notifier: Arc<QueuedSink>, owner: String) -> Result<()> {
    tokio::task::spawn_blocking(move || settle_due_pools(store, notifier, owner))
        .await
        .context("Settlement task panicked")?
}

/// Settle every pool whose draw date has arrived
fn settle_due_pools(
    store: SqliteLotteryStore,
    notifier: Arc<QueuedSink>,
    owner: String,
) -> Result<()> {
    let today = Utc::now().date_naive();
    let due: Vec<DrawType> = store
        .pools()?
        .into_iter()
        .filter(|pool| pool.is_due(today))
        .map(|pool| pool.draw_type)
        .collect();

    if due.is_empty() {
        debug!("No draws due on {}", today);
        return Ok(());
    }

    let mut engine = SettlementEngine::new(store, StdRng::from_entropy(), notifier)
        .with_owner_recipient(owner);

    for draw_type in due {
        info!("{} draw is due", draw_type);
        match engine.run_on(draw_type, today) {
            Ok(SettlementOutcome::Settled(report)) => info!(
                "{} draw #{} paid out {:.2} LC to {} tickets",
                draw_type,
                report.draw.id,
                report.plan.total_paid(),
                report.draw.total_tickets
            ),
            Ok(SettlementOutcome::NothingToSettle { .. }) => {
                info!("{} draw due but no tickets sold yet", draw_type)
            }
            Err(e) => warn!("{} settlement failed, will retry next tick: {}", draw_type, e),
        }
    }

    Ok(())
}
