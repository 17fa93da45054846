//! Ticket purchase rules

use std::collections::HashSet;

use crate::error::{LotteryError, LotteryResult};
use crate::types::DrawType;

/// Rand (ZAR) needed for one LC coin
pub const RAND_PER_COIN: f64 = 3.0;

/// Whole LC coins bought with `amount_rand`
pub fn coins_for_rand(amount_rand: f64) -> f64 {
    if amount_rand <= 0.0 {
        return 0.0;
    }
    (amount_rand / RAND_PER_COIN).floor()
}

/// Check a ticket before anything is persisted
pub fn validate_ticket(draw_type: DrawType, numbers: &[u32], cost: f64) -> LotteryResult<()> {
    let count = draw_type.number_count();
    let max = draw_type.max_number();

    if numbers.len() != count || numbers.iter().any(|n| *n < 1 || *n > max) {
        return Err(LotteryError::InvalidTicket(format!(
            "{} draw requires exactly {} numbers between 1-{}",
            draw_type, count, max
        )));
    }

    let unique: HashSet<_> = numbers.iter().collect();
    if unique.len() != numbers.len() {
        return Err(LotteryError::InvalidTicket(
            "cannot select duplicate numbers".to_string(),
        ));
    }

    if cost != draw_type.ticket_cost() {
        return Err(LotteryError::InvalidTicket(format!(
            "{} ticket costs {} LC coins",
            draw_type,
            draw_type.ticket_cost()
        )));
    }

    Ok(())
}
