// SQLite-backed lottery state
//
// Holds user balances, pools, tickets and draws. Settlement writes go
// through `SqliteSettlementTx`, which keeps the connection locked inside a
// `BEGIN IMMEDIATE` transaction so concurrent settlements (same process or
// another process on the same file) are serialized.

use chrono::{Duration, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::{LotteryStore, SettlementTx};
use crate::error::{LotteryError, LotteryResult};
use crate::lottery::payout::PayoutBreakdown;
use crate::lottery::purchase::validate_ticket;
use crate::lottery::settlement::TicketOutcome;
use crate::types::{
    format_numbers, parse_numbers, Draw, DrawStatus, DrawType, Pool, Ticket, TicketStatus,
    UserBalance, WinningNumbers,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS user_profiles (
        user_id TEXT PRIMARY KEY,
        lc_coins REAL NOT NULL DEFAULT 0 CHECK (lc_coins >= 0),
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS lottery_pools (
        pool_type TEXT PRIMARY KEY,
        current_amount REAL NOT NULL DEFAULT 0 CHECK (current_amount >= 0),
        carryover_amount REAL NOT NULL DEFAULT 0 CHECK (carryover_amount >= 0),
        next_draw_date TEXT NOT NULL,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS lottery_draws (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        draw_type TEXT NOT NULL,
        draw_date TEXT NOT NULL,
        winning_numbers TEXT NOT NULL,
        total_pool REAL NOT NULL DEFAULT 0,
        total_tickets INTEGER NOT NULL DEFAULT 0,
        winners_count INTEGER NOT NULL DEFAULT 0,
        payout_per_winner REAL NOT NULL DEFAULT 0,
        carryover_amount REAL NOT NULL DEFAULT 0,
        profit_amount REAL NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS lottery_tickets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        draw_type TEXT NOT NULL,
        numbers TEXT NOT NULL,
        cost REAL NOT NULL,
        purchase_date TEXT NOT NULL,
        draw_id INTEGER REFERENCES lottery_draws(id),
        matches INTEGER,
        status TEXT NOT NULL DEFAULT 'pending',
        payout REAL NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_tickets_unclaimed ON lottery_tickets(draw_type, draw_id);
    CREATE INDEX IF NOT EXISTS idx_tickets_user ON lottery_tickets(user_id);
    CREATE INDEX IF NOT EXISTS idx_draws_status ON lottery_draws(status, draw_date);
";

const TICKET_COLUMNS: &str =
    "id, user_id, draw_type, numbers, cost, purchase_date, draw_id, matches, status, payout";

const DRAW_COLUMNS: &str = "id, draw_type, draw_date, winning_numbers, total_pool, total_tickets, \
     winners_count, payout_per_winner, carryover_amount, profit_amount, status";

fn parsed_column<T: FromStr<Err = LotteryError>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn numbers_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<u32>> {
    let raw: String = row.get(idx)?;
    parse_numbers(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        id: row.get(0)?,
        user_id: row.get(1)?,
        draw_type: parsed_column(row, 2)?,
        numbers: numbers_column(row, 3)?,
        cost: row.get(4)?,
        purchase_date: row.get(5)?,
        draw_id: row.get(6)?,
        matches: row.get(7)?,
        status: parsed_column(row, 8)?,
        payout: row.get(9)?,
    })
}

fn draw_from_row(row: &Row<'_>) -> rusqlite::Result<Draw> {
    Ok(Draw {
        id: row.get(0)?,
        draw_type: parsed_column(row, 1)?,
        draw_date: row.get(2)?,
        winning_numbers: WinningNumbers::new(numbers_column(row, 3)?),
        total_pool: row.get(4)?,
        total_tickets: row.get(5)?,
        winners_count: row.get(6)?,
        payout_per_winner: row.get(7)?,
        carryover_amount: row.get(8)?,
        profit_amount: row.get(9)?,
        status: parsed_column(row, 10)?,
    })
}

fn pool_from_row(row: &Row<'_>) -> rusqlite::Result<Pool> {
    Ok(Pool {
        draw_type: parsed_column(row, 0)?,
        current_amount: row.get(1)?,
        carryover_amount: row.get(2)?,
        next_draw_date: row.get(3)?,
    })
}

fn query_pool(conn: &Connection, draw_type: DrawType) -> LotteryResult<Pool> {
    conn.query_row(
        "SELECT pool_type, current_amount, carryover_amount, next_draw_date
         FROM lottery_pools WHERE pool_type = ?1",
        params![draw_type.as_str()],
        pool_from_row,
    )
    .optional()?
    .ok_or(LotteryError::PoolNotFound(draw_type))
}

#[derive(Clone)]
pub struct SqliteLotteryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLotteryStore {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(db_path: P, busy_timeout: std::time::Duration) -> LotteryResult<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self::from_connection(conn)?;
        info!("Lottery store opened: {}", db_path.display());
        Ok(store)
    }

    /// Private in-memory database, mostly for tests and dry runs
    pub fn open_in_memory() -> LotteryResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> LotteryResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.create_tables()?;
        Ok(store)
    }

    fn lock(&self) -> LotteryResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| LotteryError::LockPoisoned)
    }

    fn create_tables(&self) -> LotteryResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA)?;

        let today = Utc::now().date_naive();
        for draw_type in DrawType::ALL {
            conn.execute(
                "INSERT OR IGNORE INTO lottery_pools (pool_type, next_draw_date) VALUES (?1, ?2)",
                params![
                    draw_type.as_str(),
                    today + Duration::days(draw_type.interval_days())
                ],
            )?;
        }

        debug!("Lottery schema created/verified");
        Ok(())
    }

    /// Add LC coins to a user, creating the account if needed
    pub fn credit_coins(&self, user_id: &str, amount: f64) -> LotteryResult<UserBalance> {
        if !(amount > 0.0) {
            return Err(LotteryError::InvalidAmount(amount));
        }

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO user_profiles (user_id, lc_coins) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET
                lc_coins = lc_coins + excluded.lc_coins,
                updated_at = CURRENT_TIMESTAMP",
            params![user_id, amount],
        )?;
        let lc_coins: f64 = conn.query_row(
            "SELECT lc_coins FROM user_profiles WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;

        info!("Credited {:.2} LC to {} (balance {:.2})", amount, user_id, lc_coins);
        Ok(UserBalance {
            user_id: user_id.to_string(),
            lc_coins,
        })
    }

    pub fn balance(&self, user_id: &str) -> LotteryResult<Option<UserBalance>> {
        let conn = self.lock()?;
        let balance = conn
            .query_row(
                "SELECT user_id, lc_coins FROM user_profiles WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(UserBalance {
                        user_id: row.get(0)?,
                        lc_coins: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(balance)
    }

    /// Buy a ticket: debit the buyer, record the ticket and grow the pool,
    /// all in one transaction. Invalid tickets change nothing.
    pub fn purchase_ticket(
        &self,
        user_id: &str,
        draw_type: DrawType,
        numbers: &[u32],
        cost: f64,
    ) -> LotteryResult<Ticket> {
        validate_ticket(draw_type, numbers, cost)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let available: f64 = tx
            .query_row(
                "SELECT lc_coins FROM user_profiles WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| LotteryError::UnknownUser(user_id.to_string()))?;

        if available < cost {
            return Err(LotteryError::InsufficientBalance {
                user_id: user_id.to_string(),
                required: cost,
                available,
            });
        }

        tx.execute(
            "UPDATE user_profiles SET lc_coins = lc_coins - ?1, updated_at = CURRENT_TIMESTAMP
             WHERE user_id = ?2",
            params![cost, user_id],
        )?;

        let purchase_date = Utc::now();
        tx.execute(
            "INSERT INTO lottery_tickets (user_id, draw_type, numbers, cost, purchase_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                draw_type.as_str(),
                format_numbers(numbers),
                cost,
                purchase_date
            ],
        )?;
        let id = tx.last_insert_rowid();

        let updated = tx.execute(
            "UPDATE lottery_pools SET current_amount = current_amount + ?1,
                updated_at = CURRENT_TIMESTAMP
             WHERE pool_type = ?2",
            params![cost, draw_type.as_str()],
        )?;
        if updated == 0 {
            return Err(LotteryError::PoolNotFound(draw_type));
        }

        tx.commit()?;

        info!(
            "Ticket #{} purchased: {} {} [{}] for {:.2} LC",
            id,
            user_id,
            draw_type,
            format_numbers(numbers),
            cost
        );

        Ok(Ticket {
            id,
            user_id: user_id.to_string(),
            draw_type,
            numbers: numbers.to_vec(),
            cost,
            purchase_date,
            draw_id: None,
            matches: None,
            status: TicketStatus::Pending,
            payout: 0.0,
        })
    }

    pub fn pool(&self, draw_type: DrawType) -> LotteryResult<Pool> {
        let conn = self.lock()?;
        query_pool(&conn, draw_type)
    }

    pub fn pools(&self) -> LotteryResult<Vec<Pool>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT pool_type, current_amount, carryover_amount, next_draw_date
             FROM lottery_pools ORDER BY pool_type DESC",
        )?;
        let pools = stmt
            .query_map([], pool_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pools)
    }

    /// A user's tickets, newest first
    pub fn tickets_for_user(&self, user_id: &str) -> LotteryResult<Vec<Ticket>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM lottery_tickets WHERE user_id = ?1 ORDER BY id DESC",
            TICKET_COLUMNS
        ))?;
        let tickets = stmt
            .query_map(params![user_id], ticket_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Loaded {} tickets for {}", tickets.len(), user_id);
        Ok(tickets)
    }

    /// Tickets of a draw type that no settlement has claimed yet
    pub fn pending_tickets(&self, draw_type: DrawType) -> LotteryResult<Vec<Ticket>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM lottery_tickets WHERE draw_type = ?1 AND draw_id IS NULL ORDER BY id",
            TICKET_COLUMNS
        ))?;
        let tickets = stmt
            .query_map(params![draw_type.as_str()], ticket_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tickets)
    }

    pub fn tickets_for_draw(&self, draw_id: i64) -> LotteryResult<Vec<Ticket>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM lottery_tickets WHERE draw_id = ?1 ORDER BY id",
            TICKET_COLUMNS
        ))?;
        let tickets = stmt
            .query_map(params![draw_id], ticket_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tickets)
    }

    /// Paid-out draws, newest first
    pub fn recent_draws(&self, limit: usize) -> LotteryResult<Vec<Draw>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM lottery_draws WHERE status = ?1
             ORDER BY draw_date DESC, id DESC LIMIT ?2",
            DRAW_COLUMNS
        ))?;
        let draws = stmt
            .query_map(
                params![DrawStatus::PaidOut.as_str(), limit as i64],
                draw_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(draws)
    }

    pub fn draw(&self, draw_id: i64) -> LotteryResult<Option<Draw>> {
        let conn = self.lock()?;
        let draw = conn
            .query_row(
                &format!("SELECT {} FROM lottery_draws WHERE id = ?1", DRAW_COLUMNS),
                params![draw_id],
                draw_from_row,
            )
            .optional()?;
        Ok(draw)
    }

    /// Number of draw records of any status
    pub fn draw_count(&self) -> LotteryResult<u32> {
        let conn = self.lock()?;
        let count = conn.query_row("SELECT COUNT(*) FROM lottery_draws", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Write pools and recent draws to a JSON file
    pub fn export_json<P: AsRef<Path>>(&self, path: P, draw_limit: usize) -> LotteryResult<()> {
        let pools = self.pools()?;
        let draws = self.recent_draws(draw_limit)?;

        let state = serde_json::json!({
            "exported_at": Utc::now().to_rfc3339(),
            "pools": pools,
            "recent_draws": draws,
        });

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(&state)?)?;
        debug!("Lottery state exported to: {}", path.display());
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> LotteryResult<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }
}

impl LotteryStore for SqliteLotteryStore {
    type Tx<'a> = SqliteSettlementTx<'a>;

    fn begin_settlement(&self) -> LotteryResult<SqliteSettlementTx<'_>> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(SqliteSettlementTx {
            conn,
            finished: false,
        })
    }
}

/// Open settlement transaction. Rolls back on drop unless committed.
pub struct SqliteSettlementTx<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl SettlementTx for SqliteSettlementTx<'_> {
    fn load_pool(&self, draw_type: DrawType) -> LotteryResult<Pool> {
        query_pool(&self.conn, draw_type)
    }

    fn open_draw(
        &self,
        draw_type: DrawType,
        draw_date: NaiveDate,
        winning: &WinningNumbers,
    ) -> LotteryResult<i64> {
        self.conn.execute(
            "INSERT INTO lottery_draws (draw_type, draw_date, winning_numbers, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                draw_type.as_str(),
                draw_date,
                winning.to_string(),
                DrawStatus::Pending.as_str()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn claim_pending(&self, draw_type: DrawType, draw_id: i64) -> LotteryResult<Vec<Ticket>> {
        let claimed = self.conn.execute(
            "UPDATE lottery_tickets SET draw_id = ?1
             WHERE draw_type = ?2 AND draw_id IS NULL AND status = 'pending'",
            params![draw_id, draw_type.as_str()],
        )?;
        debug!("Draw #{} claimed {} pending {} tickets", draw_id, claimed, draw_type);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM lottery_tickets WHERE draw_id = ?1 ORDER BY id",
            TICKET_COLUMNS
        ))?;
        let tickets = stmt
            .query_map(params![draw_id], ticket_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tickets)
    }

    fn finalize_draw(
        &self,
        draw_id: i64,
        total_tickets: u32,
        breakdown: &PayoutBreakdown,
    ) -> LotteryResult<()> {
        self.conn.execute(
            "UPDATE lottery_draws SET total_pool = ?1, total_tickets = ?2, winners_count = ?3,
                payout_per_winner = ?4, carryover_amount = ?5, profit_amount = ?6, status = ?7
             WHERE id = ?8",
            params![
                breakdown.total_pool,
                total_tickets,
                breakdown.winners,
                breakdown.payout_per_winner,
                breakdown.carryover,
                breakdown.house_profit,
                DrawStatus::PaidOut.as_str(),
                draw_id
            ],
        )?;
        Ok(())
    }

    fn record_outcome(&self, draw_id: i64, outcome: &TicketOutcome) -> LotteryResult<()> {
        let updated = self.conn.execute(
            "UPDATE lottery_tickets SET matches = ?1, status = ?2, payout = ?3
             WHERE id = ?4 AND draw_id = ?5 AND status = 'pending'",
            params![
                outcome.matches,
                outcome.status.as_str(),
                outcome.payout,
                outcome.ticket_id,
                draw_id
            ],
        )?;
        if updated != 1 {
            return Err(LotteryError::ClaimConflict {
                ticket_id: outcome.ticket_id,
            });
        }
        Ok(())
    }

    fn credit_balance(&self, user_id: &str, amount: f64) -> LotteryResult<()> {
        let updated = self.conn.execute(
            "UPDATE user_profiles SET lc_coins = lc_coins + ?1, updated_at = CURRENT_TIMESTAMP
             WHERE user_id = ?2",
            params![amount, user_id],
        )?;
        if updated == 0 {
            return Err(LotteryError::UnknownUser(user_id.to_string()));
        }
        Ok(())
    }

    fn reset_pool(
        &self,
        draw_type: DrawType,
        carryover: f64,
        next_draw_date: NaiveDate,
    ) -> LotteryResult<()> {
        let updated = self.conn.execute(
            "UPDATE lottery_pools SET current_amount = 0, carryover_amount = ?1,
                next_draw_date = ?2, updated_at = CURRENT_TIMESTAMP
             WHERE pool_type = ?3",
            params![carryover, next_draw_date, draw_type.as_str()],
        )?;
        if updated == 0 {
            return Err(LotteryError::PoolNotFound(draw_type));
        }
        Ok(())
    }

    fn add_to_pool(&self, draw_type: DrawType, amount: f64) -> LotteryResult<()> {
        let updated = self.conn.execute(
            "UPDATE lottery_pools SET current_amount = current_amount + ?1,
                updated_at = CURRENT_TIMESTAMP
             WHERE pool_type = ?2",
            params![amount, draw_type.as_str()],
        )?;
        if updated == 0 {
            return Err(LotteryError::PoolNotFound(draw_type));
        }
        Ok(())
    }

    fn commit(mut self) -> LotteryResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteSettlementTx<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => debug!("Settlement transaction rolled back"),
            Err(e) => warn!("Settlement rollback failed: {}", e),
        }
    }
}

/// Open the store configured for the application
pub fn create_store<P: AsRef<Path>>(
    db_path: P,
    busy_timeout: std::time::Duration,
) -> LotteryResult<SqliteLotteryStore> {
    SqliteLotteryStore::open(db_path, busy_timeout)
}
