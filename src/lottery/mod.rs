//! Lottery domain logic
//!
//! Pure draw, match and payout rules plus the settlement engine that
//! applies them to a [`crate::state_manager::LotteryStore`].

pub mod generator;
pub mod matcher;
pub mod payout;
pub mod purchase;
pub mod settlement;

pub use generator::{draw_numbers, generate, RandomSource};
pub use matcher::{classify, count_matches, MatchResult};
pub use payout::{calculate, PayoutBreakdown, PayoutSchedule, Rollover};
pub use purchase::{coins_for_rand, validate_ticket, RAND_PER_COIN};
pub use settlement::{
    plan_settlement, SettlementEngine, SettlementOutcome, SettlementPhase, SettlementPlan,
    SettlementReport, TicketOutcome,
};
