//! Ticket matcher
//!
//! Counts how many of a ticket's numbers appear in the winning set and
//! classifies the ticket. Only a full match wins. Weekly tickets one number
//! short are refunded their stake; monthly tickets get nothing below a full
//! match.

use crate::types::{DrawType, TicketStatus, WinningNumbers};

/// Result of matching a single ticket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub matches: u32,
    pub status: TicketStatus,
    /// Stake returned for a refund; 0 for wins (their share is known only
    /// once every ticket is matched) and losses
    pub refund: f64,
}

/// Number of ticket numbers that appear in the winning set
pub fn count_matches(numbers: &[u32], winning: &WinningNumbers) -> u32 {
    numbers.iter().filter(|n| winning.contains(**n)).count() as u32
}

pub fn classify(
    draw_type: DrawType,
    numbers: &[u32],
    stake: f64,
    winning: &WinningNumbers,
) -> MatchResult {
    let matches = count_matches(numbers, winning);

    if matches as usize == draw_type.number_count() {
        MatchResult {
            matches,
            status: TicketStatus::Win,
            refund: 0.0,
        }
    } else if draw_type.refund_matches() == Some(matches as usize) {
        MatchResult {
            matches,
            status: TicketStatus::Refund,
            refund: stake,
        }
    } else {
        MatchResult {
            matches,
            status: TicketStatus::Lose,
            refund: 0.0,
        }
    }
}
