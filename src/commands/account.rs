//! Ticket purchase and LC coin account commands

use anyhow::{Context, Result};
use lc_lottery::lottery::coins_for_rand;
use lc_lottery::{parse_numbers, Config, DrawType};
use tracing::info;

use super::open_store;

pub fn purchase(
    config: &Config,
    user_id: String,
    draw_type: DrawType,
    numbers: String,
    cost: Option<f64>,
) -> Result<()> {
    let numbers = parse_numbers(&numbers).context("Failed to parse ticket numbers")?;
    let cost = cost.unwrap_or_else(|| draw_type.ticket_cost());

    let store = open_store(config)?;
    let ticket = store
        .purchase_ticket(&user_id, draw_type, &numbers, cost)
        .with_context(|| format!("Ticket purchase for {} failed", user_id))?;

    let pool = store.pool(draw_type)?;
    let balance = store
        .balance(&user_id)?
        .map(|b| b.lc_coins)
        .unwrap_or_default();

    println!(
        "Ticket #{} purchased: {} draw, numbers {}, cost {} LC",
        ticket.id, draw_type, lc_lottery::format_numbers(&ticket.numbers), ticket.cost
    );
    println!("  Remaining balance: {:.2} LC", balance);
    println!(
        "  {} pool: {:.2} LC (next draw {})",
        draw_type,
        pool.total(),
        pool.next_draw_date
    );
    Ok(())
}

pub fn credit(
    config: &Config,
    user_id: String,
    amount: Option<f64>,
    rand: Option<f64>,
) -> Result<()> {
    let coins = match (amount, rand) {
        (Some(amount), _) => amount,
        (None, Some(zar)) => {
            let coins = coins_for_rand(zar);
            info!("R{:.2} converts to {} LC coins", zar, coins);
            coins
        }
        (None, None) => anyhow::bail!("Specify either --amount or --rand"),
    };

    let store = open_store(config)?;
    let balance = store
        .credit_coins(&user_id, coins)
        .with_context(|| format!("Failed to credit {}", user_id))?;

    println!(
        "Credited {} LC coins to {}. New balance: {:.2} LC",
        coins, balance.user_id, balance.lc_coins
    );
    Ok(())
}

pub fn balance(config: &Config, user_id: String) -> Result<()> {
    let store = open_store(config)?;
    match store.balance(&user_id)? {
        Some(b) => println!("{}: {:.2} LC", b.user_id, b.lc_coins),
        None => println!("{}: no account", user_id),
    }
    Ok(())
}
