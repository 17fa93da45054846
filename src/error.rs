//! Lottery error types

use thiserror::Error;

use crate::types::DrawType;

#[derive(Debug, Error)]
pub enum LotteryError {
    #[error("invalid ticket: {0}")]
    InvalidTicket(String),

    #[error("insufficient LC coins for {user_id}: need {required:.2}, have {available:.2}")]
    InsufficientBalance {
        user_id: String,
        required: f64,
        available: f64,
    },

    #[error("amount must be positive, got {0}")]
    InvalidAmount(f64),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("cannot draw {count} unique numbers from 1..={max_number}")]
    DrawRange { count: usize, max_number: u32 },

    #[error("{0} pool not found")]
    PoolNotFound(DrawType),

    #[error("refunds {refunds:.2} exceed pool {total_pool:.2}")]
    PoolUnderfunded { total_pool: f64, refunds: f64 },

    #[error("ticket {ticket_id} was claimed by another settlement")]
    ClaimConflict { ticket_id: i64 },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store lock poisoned")]
    LockPoisoned,
}

pub type LotteryResult<T> = Result<T, LotteryError>;
