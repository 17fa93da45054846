//! Lottery state persistence
//!
//! A settlement runs inside one storage transaction. [`LotteryStore`] opens
//! it and [`SettlementTx`] exposes the reads and writes the settlement
//! engine needs. Dropping a transaction without calling
//! [`SettlementTx::commit`] rolls every write back.

mod sqlite;

pub use sqlite::{create_store, SqliteLotteryStore, SqliteSettlementTx};

use chrono::NaiveDate;

use crate::error::LotteryResult;
use crate::lottery::payout::PayoutBreakdown;
use crate::lottery::settlement::TicketOutcome;
use crate::types::{DrawType, Pool, Ticket, WinningNumbers};

/// Storage operations of one settlement, applied atomically
pub trait SettlementTx {
    fn load_pool(&self, draw_type: DrawType) -> LotteryResult<Pool>;

    /// Insert a pending draw record and return its id
    fn open_draw(
        &self,
        draw_type: DrawType,
        draw_date: NaiveDate,
        winning: &WinningNumbers,
    ) -> LotteryResult<i64>;

    /// Stamp `draw_id` on every unclaimed pending ticket of `draw_type` and
    /// return the claimed tickets. Tickets already claimed by another draw
    /// are never returned.
    fn claim_pending(&self, draw_type: DrawType, draw_id: i64) -> LotteryResult<Vec<Ticket>>;

    /// Fill in the tallies of a draw and mark it paid out
    fn finalize_draw(
        &self,
        draw_id: i64,
        total_tickets: u32,
        breakdown: &PayoutBreakdown,
    ) -> LotteryResult<()>;

    /// Write the settled state of a claimed ticket
    fn record_outcome(&self, draw_id: i64, outcome: &TicketOutcome) -> LotteryResult<()>;

    fn credit_balance(&self, user_id: &str, amount: f64) -> LotteryResult<()>;

    /// Zero the pool's current amount, set its carryover and next draw date
    fn reset_pool(
        &self,
        draw_type: DrawType,
        carryover: f64,
        next_draw_date: NaiveDate,
    ) -> LotteryResult<()>;

    /// Add to a pool's current amount
    fn add_to_pool(&self, draw_type: DrawType, amount: f64) -> LotteryResult<()>;

    fn commit(self) -> LotteryResult<()>
    where
        Self: Sized;
}

pub trait LotteryStore {
    type Tx<'a>: SettlementTx
    where
        Self: 'a;

    /// Open a settlement transaction. Concurrent settlements are serialized
    /// here: a second caller waits until the first commits or rolls back.
    fn begin_settlement(&self) -> LotteryResult<Self::Tx<'_>>;
}
