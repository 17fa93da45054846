//! LC Lottery
//!
//! Settlement engine for the LC-coin lottery: weekly and monthly draws,
//! ticket matching, pool splitting with carryover, SQLite-backed atomic
//! settlement and best-effort winner notifications.

pub mod common;
pub mod config;
pub mod error;
pub mod lottery;
pub mod notify;
pub mod state_manager;
pub mod types;

pub use config::Config;
pub use error::{LotteryError, LotteryResult};
pub use lottery::{SettlementEngine, SettlementOutcome, SettlementPhase};
pub use state_manager::{LotteryStore, SettlementTx, SqliteLotteryStore};
pub use types::*;
