//! Payout calculator
//!
//! Splits what is left of a pool after refunds between winners, the house
//! and the rollover, using a fixed schedule per draw type.
//!
//! | Draw type | winners: share / house / rollover | no winners: house / rollover |
//! |-----------|-----------------------------------|------------------------------|
//! | weekly    | 60% / 10% / 30% to monthly pool   | 10% / 90% weekly carryover   |
//! | monthly   | 80% / 12% / 8% monthly carryover  | 12% / 88% monthly carryover  |

use serde::{Deserialize, Serialize};

use crate::error::{LotteryError, LotteryResult};
use crate::types::DrawType;

/// Where the rollover of a settlement with winners ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollover {
    /// Stays in the settled pool's carryover
    OwnCarryover,
    /// Added to the monthly pool's current amount
    MonthlyPool,
}

/// Percentage split for one draw type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayoutSchedule {
    pub winner_share: f64,
    pub house_share: f64,
    pub rollover_share: f64,
    pub rollover: Rollover,
    pub no_winner_house_share: f64,
    pub no_winner_carryover_share: f64,
}

impl PayoutSchedule {
    pub fn for_draw(draw_type: DrawType) -> Self {
        match draw_type {
            DrawType::Weekly => PayoutSchedule {
                winner_share: 0.60,
                house_share: 0.10,
                rollover_share: 0.30,
                rollover: Rollover::MonthlyPool,
                no_winner_house_share: 0.10,
                no_winner_carryover_share: 0.90,
            },
            DrawType::Monthly => PayoutSchedule {
                winner_share: 0.80,
                house_share: 0.12,
                rollover_share: 0.08,
                rollover: Rollover::OwnCarryover,
                no_winner_house_share: 0.12,
                no_winner_carryover_share: 0.88,
            },
        }
    }
}

/// Result of splitting a pool
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoutBreakdown {
    pub total_pool: f64,
    pub refund_total: f64,
    pub pool_after_refunds: f64,
    pub winners: u32,
    pub winner_share: f64,
    pub payout_per_winner: f64,
    pub house_profit: f64,
    /// New carryover of the settled pool
    pub carryover: f64,
    /// Weekly only: amount credited to the monthly pool
    pub monthly_contribution: f64,
}

impl PayoutBreakdown {
    /// Everything paid to ticket holders: refunds plus the winner share
    pub fn total_paid(&self) -> f64 {
        self.refund_total + self.payout_per_winner * self.winners as f64
    }
}

/// Split `total_pool` for a draw with `winners` full matches, after
/// `refund_total` has been returned to near-miss tickets.
///
/// Per-winner payout is a plain division; residual fractions are not
/// redistributed.
pub fn calculate(
    draw_type: DrawType,
    total_pool: f64,
    refund_total: f64,
    winners: u32,
) -> LotteryResult<PayoutBreakdown> {
    if refund_total > total_pool {
        return Err(LotteryError::PoolUnderfunded {
            total_pool,
            refunds: refund_total,
        });
    }

    let schedule = PayoutSchedule::for_draw(draw_type);
    let pool_after_refunds = total_pool - refund_total;

    let mut breakdown = PayoutBreakdown {
        total_pool,
        refund_total,
        pool_after_refunds,
        winners,
        winner_share: 0.0,
        payout_per_winner: 0.0,
        house_profit: 0.0,
        carryover: 0.0,
        monthly_contribution: 0.0,
    };

    if winners > 0 {
        breakdown.winner_share = pool_after_refunds * schedule.winner_share;
        breakdown.payout_per_winner = breakdown.winner_share / winners as f64;
        breakdown.house_profit = pool_after_refunds * schedule.house_share;
        let rollover = pool_after_refunds * schedule.rollover_share;
        match schedule.rollover {
            Rollover::OwnCarryover => breakdown.carryover = rollover,
            Rollover::MonthlyPool => breakdown.monthly_contribution = rollover,
        }
    } else {
        breakdown.house_profit = pool_after_refunds * schedule.no_winner_house_share;
        breakdown.carryover = pool_after_refunds * schedule.no_winner_carryover_share;
    }

    Ok(breakdown)
}
