//! Read-only reports: pools, tickets, draw history and JSON export

use anyhow::{Context, Result};
use lc_lottery::{format_numbers, Config};
use std::path::PathBuf;
use tracing::info;

use super::open_store;

/// Create the database and seed the pools
pub fn init(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    println!("Lottery database ready: {}", config.storage.db_path.display());
    for pool in store.pools()? {
        println!(
            "  {:<8} pool seeded, next draw {}",
            pool.draw_type.as_str(),
            pool.next_draw_date
        );
    }
    Ok(())
}

pub fn pools(config: &Config) -> Result<()> {
    let store = open_store(config)?;

    println!("\n{}", "=".repeat(60));
    println!(
        "{:<10} {:>12} {:>12} {:>12} {:>12}",
        "POOL", "CURRENT", "CARRYOVER", "TOTAL", "NEXT DRAW"
    );
    println!("{}", "-".repeat(60));
    for pool in store.pools()? {
        println!(
            "{:<10} {:>12.2} {:>12.2} {:>12.2} {:>12}",
            pool.draw_type.as_str(),
            pool.current_amount,
            pool.carryover_amount,
            pool.total(),
            pool.next_draw_date.to_string()
        );
    }
    println!("{}\n", "=".repeat(60));
    Ok(())
}

pub fn tickets(config: &Config, user_id: String) -> Result<()> {
    let store = open_store(config)?;
    let tickets = store.tickets_for_user(&user_id)?;

    if tickets.is_empty() {
        println!("{} has no tickets.", user_id);
        return Ok(());
    }

    println!("\nTickets for {}", user_id);
    println!("{}", "-".repeat(60));
    for t in &tickets {
        let matches = t.matches.map(|m| m.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "#{:<6} {:<8} {:<16} {:<12} matches {:<2} payout {:.2}",
            t.id,
            t.draw_type.as_str(),
            format_numbers(&t.numbers),
            t.status.as_str(),
            matches,
            t.payout
        );
    }
    Ok(())
}

pub fn draws(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let draws = store.recent_draws(limit)?;

    if draws.is_empty() {
        println!("No draws settled yet.");
        return Ok(());
    }

    println!("\n{}", "=".repeat(60));
    println!("RECENT DRAWS");
    println!("{}", "=".repeat(60));
    for d in &draws {
        println!(
            "#{:<5} {:<8} {} numbers {:<16} pool {:>9.2} tickets {:>4} winners {:>3}",
            d.id,
            d.draw_type.as_str(),
            d.draw_date,
            d.winning_numbers.to_string(),
            d.total_pool,
            d.total_tickets,
            d.winners_count
        );
    }
    println!();
    Ok(())
}

pub fn export(config: &Config, output: Option<PathBuf>, limit: usize) -> Result<()> {
    let path = output.unwrap_or_else(|| config.storage.json_backup_path.clone());
    let store = open_store(config)?;
    store
        .export_json(&path, limit)
        .with_context(|| format!("Failed to export to {}", path.display()))?;
    info!("Exported lottery snapshot to {}", path.display());
    println!("Exported to {}", path.display());
    Ok(())
}
