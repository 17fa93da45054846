//! Draw command: settle one pool now

use anyhow::{Context, Result};
use lc_lottery::lottery::{SettlementEngine, SettlementOutcome, SettlementReport};
use lc_lottery::{Config, DrawType, TicketStatus};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use super::{build_notifier, finish_notifications, open_store};

pub fn run(config: &Config, draw_type: DrawType) -> Result<()> {
    info!("Running {} draw", draw_type);

    let store = open_store(config)?;
    let notifier = build_notifier(config)?;

    let mut engine = SettlementEngine::new(store, StdRng::from_entropy(), notifier.clone())
        .with_owner_recipient(config.notifications.owner_recipient.clone());

    let outcome = engine
        .run(draw_type)
        .with_context(|| format!("{} settlement failed", draw_type));

    finish_notifications(&notifier);

    match outcome? {
        SettlementOutcome::Settled(report) => print_report(&report),
        SettlementOutcome::NothingToSettle { draw_type } => {
            println!("No pending {} tickets, nothing to settle.", draw_type);
        }
    }

    Ok(())
}

pub fn print_report(report: &SettlementReport) {
    let draw = &report.draw;
    let b = &report.plan.breakdown;

    println!("\n{}", "=".repeat(60));
    println!(
        "{} DRAW #{} - {}",
        draw.draw_type.as_str().to_uppercase(),
        draw.id,
        draw.draw_date
    );
    println!("{}", "=".repeat(60));
    println!("  Winning numbers:     {}", draw.winning_numbers);
    println!("  Total pool:          {:.2} LC", b.total_pool);
    println!("  Tickets:             {}", draw.total_tickets);
    println!("  Winners:             {}", draw.winners_count);
    println!("  Refunds:             {} ({:.2} LC)", report.plan.partial_matches(), b.refund_total);
    println!("  Payout per winner:   {:.2} LC", b.payout_per_winner);
    println!("  House profit:        {:.2} LC", b.house_profit);
    println!("  Carryover:           {:.2} LC", b.carryover);
    if b.monthly_contribution > 0.0 {
        println!("  To monthly pool:     {:.2} LC", b.monthly_contribution);
    }
    println!("{}", "-".repeat(60));

    for outcome in report
        .plan
        .outcomes
        .iter()
        .filter(|o| o.status != TicketStatus::Lose)
    {
        println!(
            "  #{:<6} {:<20} {:<8} {:.2} LC",
            outcome.ticket_id,
            outcome.user_id,
            outcome.status.as_str(),
            outcome.payout
        );
    }

    if report.notifications_rejected > 0 {
        println!(
            "  ({} notifications could not be queued)",
            report.notifications_rejected
        );
    }
    println!("{}\n", "=".repeat(60));
}
