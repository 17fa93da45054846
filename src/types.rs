//! Core data types used across the lottery system

use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LotteryError, LotteryResult};

/// Lottery draw cadence. Each type owns its own pool and match rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawType {
    Weekly,
    Monthly,
}

impl DrawType {
    pub const ALL: [DrawType; 2] = [DrawType::Weekly, DrawType::Monthly];

    /// How many numbers a ticket picks and a draw produces
    pub fn number_count(self) -> usize {
        match self {
            DrawType::Weekly => 3,
            DrawType::Monthly => 5,
        }
    }

    /// Highest number that can be picked (lowest is always 1)
    pub fn max_number(self) -> u32 {
        match self {
            DrawType::Weekly => 30,
            DrawType::Monthly => 50,
        }
    }

    /// Ticket price in LC coins
    pub fn ticket_cost(self) -> f64 {
        match self {
            DrawType::Weekly => 5.0,
            DrawType::Monthly => 10.0,
        }
    }

    /// Days between a settlement and the next scheduled draw
    pub fn interval_days(self) -> i64 {
        match self {
            DrawType::Weekly => 7,
            DrawType::Monthly => 30,
        }
    }

    /// Weekly tickets matching all but one number get their stake back.
    /// Monthly draws have no consolation tier.
    pub fn refund_matches(self) -> Option<usize> {
        match self {
            DrawType::Weekly => Some(2),
            DrawType::Monthly => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DrawType::Weekly => "weekly",
            DrawType::Monthly => "monthly",
        }
    }
}

impl fmt::Display for DrawType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrawType {
    type Err = LotteryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Ok(DrawType::Weekly),
            "monthly" => Ok(DrawType::Monthly),
            other => Err(LotteryError::InvalidRecord(format!(
                "unknown draw type '{}'",
                other
            ))),
        }
    }
}

/// Settlement outcome of a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    Win,
    /// Legacy rows only; near misses are settled as `Refund`
    PartialWin,
    Refund,
    Lose,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::Win => "win",
            TicketStatus::PartialWin => "partial_win",
            TicketStatus::Refund => "refund",
            TicketStatus::Lose => "lose",
        }
    }

    pub fn is_settled(self) -> bool {
        self != TicketStatus::Pending
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = LotteryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TicketStatus::Pending),
            "win" => Ok(TicketStatus::Win),
            "partial_win" => Ok(TicketStatus::PartialWin),
            "refund" => Ok(TicketStatus::Refund),
            "lose" => Ok(TicketStatus::Lose),
            other => Err(LotteryError::InvalidRecord(format!(
                "unknown ticket status '{}'",
                other
            ))),
        }
    }
}

/// Draw record lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawStatus {
    Pending,
    PaidOut,
}

impl DrawStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DrawStatus::Pending => "pending",
            DrawStatus::PaidOut => "paid_out",
        }
    }
}

impl FromStr for DrawStatus {
    type Err = LotteryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DrawStatus::Pending),
            "paid_out" => Ok(DrawStatus::PaidOut),
            other => Err(LotteryError::InvalidRecord(format!(
                "unknown draw status '{}'",
                other
            ))),
        }
    }
}

/// Parse a comma separated list of numbers as stored on ticket and draw rows.
/// Every field must hold a number; empty fields are rejected.
pub fn parse_numbers(s: &str) -> LotteryResult<Vec<u32>> {
    s.trim()
        .split(',')
        .map(str::trim)
        .map(|part| {
            part.parse::<u32>()
                .map_err(|_| LotteryError::InvalidRecord(format!("bad number '{}' in '{}'", part, s)))
        })
        .collect()
}

/// Inverse of [`parse_numbers`]
pub fn format_numbers(numbers: &[u32]) -> String {
    numbers.iter().join(",")
}

/// The numbers produced by a draw, kept sorted for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinningNumbers(Vec<u32>);

impl WinningNumbers {
    pub fn new(mut numbers: Vec<u32>) -> Self {
        numbers.sort_unstable();
        WinningNumbers(numbers)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, n: u32) -> bool {
        self.0.binary_search(&n).is_ok()
    }
}

impl fmt::Display for WinningNumbers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_numbers(&self.0))
    }
}

/// A purchased lottery ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub user_id: String,
    pub draw_type: DrawType,
    pub numbers: Vec<u32>,
    pub cost: f64,
    pub purchase_date: DateTime<Utc>,
    pub draw_id: Option<i64>,
    pub matches: Option<u32>,
    pub status: TicketStatus,
    pub payout: f64,
}

/// Accumulated stake and rollover for one draw type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub draw_type: DrawType,
    pub current_amount: f64,
    pub carryover_amount: f64,
    pub next_draw_date: NaiveDate,
}

impl Pool {
    /// Funds at stake if the draw ran now
    pub fn total(&self) -> f64 {
        self.current_amount + self.carryover_amount
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.next_draw_date <= today
    }
}

/// One settlement run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draw {
    pub id: i64,
    pub draw_type: DrawType,
    pub draw_date: NaiveDate,
    pub winning_numbers: WinningNumbers,
    pub total_pool: f64,
    pub total_tickets: u32,
    pub winners_count: u32,
    pub payout_per_winner: f64,
    pub carryover_amount: f64,
    pub profit_amount: f64,
    pub status: DrawStatus,
}

/// LC coin balance of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: String,
    pub lc_coins: f64,
}
