//! Integration tests for the lc-lottery settlement engine
//!
//! These tests drive purchases and settlements through the public API
//! against real SQLite stores.

use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use lc_lottery::lottery::{RandomSource, SettlementEngine, SettlementOutcome, SettlementPhase};
use lc_lottery::notify::{Notification, NotificationSink, NotifyError, QueuedSink};
use lc_lottery::state_manager::create_store;
use lc_lottery::{DrawStatus, DrawType, LotteryError, SqliteLotteryStore, TicketStatus};

// =============================================================================
// Test Utilities
// =============================================================================

/// Replays fixed winning numbers
struct Scripted {
    values: Vec<u32>,
    pos: usize,
}

impl Scripted {
    fn new(values: &[u32]) -> Self {
        Scripted {
            values: values.to_vec(),
            pos: 0,
        }
    }
}

impl RandomSource for Scripted {
    fn uniform(&mut self, _low: u32, _high: u32) -> u32 {
        let v = self.values[self.pos % self.values.len()];
        self.pos += 1;
        v
    }
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Notification>>,
}

impl NotificationSink for Recorder {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.seen.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

fn settle_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
}

/// Credit `user` with exactly one ticket's cost and buy it
fn buy(store: &SqliteLotteryStore, user: &str, draw_type: DrawType, numbers: &[u32]) {
    let cost = draw_type.ticket_cost();
    store.credit_coins(user, cost).unwrap();
    store.purchase_ticket(user, draw_type, numbers, cost).unwrap();
}

/// 19 weekly losers matching at most one of 1,2,3
fn buy_weekly_losers(store: &SqliteLotteryStore, count: u32) {
    for i in 0..count {
        buy(store, &format!("player{}", i), DrawType::Weekly, &[10, 11, 12 + i]);
    }
}

fn temp_db(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "lc-lottery-{}-{}-{}",
        name,
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join("lottery.db")
}

fn balance(store: &SqliteLotteryStore, user: &str) -> f64 {
    store.balance(user).unwrap().unwrap().lc_coins
}

// =============================================================================
// Settlement Scenarios
// =============================================================================

#[test]
fn test_weekly_single_winner_feeds_monthly_pool() {
    let store = SqliteLotteryStore::open_in_memory().unwrap();
    buy(&store, "winner", DrawType::Weekly, &[3, 1, 2]);
    buy_weekly_losers(&store, 19);
    assert_relative_eq!(store.pool(DrawType::Weekly).unwrap().current_amount, 100.0);

    let recorder = Arc::new(Recorder::default());
    let mut engine = SettlementEngine::new(store.clone(), Scripted::new(&[1, 2, 3]), recorder.clone());
    let outcome = engine.run_on(DrawType::Weekly, settle_date()).unwrap();
    let report = outcome.report().unwrap();

    let b = &report.plan.breakdown;
    assert_eq!(b.winners, 1);
    assert_relative_eq!(b.payout_per_winner, 60.0, epsilon = 1e-9);
    assert_relative_eq!(b.house_profit, 10.0, epsilon = 1e-9);
    assert_relative_eq!(b.monthly_contribution, 30.0, epsilon = 1e-9);
    assert_relative_eq!(b.carryover, 0.0);

    let weekly = store.pool(DrawType::Weekly).unwrap();
    assert_eq!(weekly.current_amount, 0.0);
    assert_eq!(weekly.carryover_amount, 0.0);
    assert_eq!(weekly.next_draw_date, settle_date() + Duration::days(7));
    assert_relative_eq!(store.pool(DrawType::Monthly).unwrap().current_amount, 30.0, epsilon = 1e-9);

    assert_relative_eq!(balance(&store, "winner"), 60.0, epsilon = 1e-9);
    assert_eq!(balance(&store, "player0"), 0.0);

    let draws = store.recent_draws(10).unwrap();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].status, DrawStatus::PaidOut);
    assert_eq!(draws[0].total_tickets, 20);
    assert_eq!(draws[0].winners_count, 1);
    assert_eq!(draws[0].winning_numbers.as_slice(), &[1, 2, 3]);

    let settled = store.tickets_for_draw(draws[0].id).unwrap();
    assert_eq!(settled.len(), 20);
    assert!(settled.iter().all(|t| t.status.is_settled()));
    assert!(settled
        .iter()
        .filter(|t| t.status == TicketStatus::Lose)
        .all(|t| t.payout == 0.0));

    // Winner plus the operator summary
    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].recipient_id, "winner");
    assert_eq!(seen[1].recipient_id, "owner");
}

#[test]
fn test_weekly_no_winner_refunds_and_keeps_carryover() {
    let store = SqliteLotteryStore::open_in_memory().unwrap();
    buy(&store, "near1", DrawType::Weekly, &[1, 2, 20]);
    buy(&store, "near2", DrawType::Weekly, &[2, 3, 21]);
    for i in 0..18 {
        buy(&store, &format!("player{}", i), DrawType::Weekly, &[4, 5, 6 + i]);
    }

    let mut engine = SettlementEngine::new(store.clone(), Scripted::new(&[1, 2, 3]), Arc::new(Recorder::default()));
    let outcome = engine.run_on(DrawType::Weekly, settle_date()).unwrap();
    let b = outcome.report().unwrap().plan.breakdown;

    assert_eq!(b.winners, 0);
    assert_relative_eq!(b.refund_total, 10.0);
    assert_relative_eq!(b.pool_after_refunds, 90.0);
    assert_relative_eq!(b.house_profit, 9.0, epsilon = 1e-9);
    assert_relative_eq!(b.carryover, 81.0, epsilon = 1e-9);
    assert_eq!(b.monthly_contribution, 0.0);

    let weekly = store.pool(DrawType::Weekly).unwrap();
    assert_eq!(weekly.current_amount, 0.0);
    assert_relative_eq!(weekly.carryover_amount, 81.0, epsilon = 1e-9);
    assert_eq!(store.pool(DrawType::Monthly).unwrap().current_amount, 0.0);

    assert_relative_eq!(balance(&store, "near1"), 5.0);
    assert_relative_eq!(balance(&store, "near2"), 5.0);

    let refunds: Vec<_> = store
        .tickets_for_user("near1")
        .unwrap()
        .into_iter()
        .filter(|t| t.status == TicketStatus::Refund)
        .collect();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].matches, Some(2));
    assert_eq!(refunds[0].payout, 5.0);
}

#[test]
fn test_monthly_no_winner_split() {
    let store = SqliteLotteryStore::open_in_memory().unwrap();
    for i in 0..20 {
        buy(&store, &format!("m{}", i), DrawType::Monthly, &[1, 2, 3, 4, 10 + i]);
    }
    assert_relative_eq!(store.pool(DrawType::Monthly).unwrap().total(), 200.0);

    let mut engine = SettlementEngine::new(store.clone(), Scripted::new(&[1, 2, 3, 4, 5]), Arc::new(Recorder::default()));
    let outcome = engine.run_on(DrawType::Monthly, settle_date()).unwrap();
    let report = outcome.report().unwrap();

    // Four of five is a loss in the monthly draw
    assert!(report.plan.outcomes.iter().all(|o| o.status == TicketStatus::Lose && o.matches == 4));
    assert_relative_eq!(report.draw.profit_amount, 24.0, epsilon = 1e-9);
    assert_relative_eq!(report.draw.carryover_amount, 176.0, epsilon = 1e-9);

    let monthly = store.pool(DrawType::Monthly).unwrap();
    assert_eq!(monthly.current_amount, 0.0);
    assert_relative_eq!(monthly.carryover_amount, 176.0, epsilon = 1e-9);
    assert_eq!(monthly.next_draw_date, settle_date() + Duration::days(30));
}

#[test]
fn test_carryover_joins_next_pool() {
    let store = SqliteLotteryStore::open_in_memory().unwrap();
    buy(&store, "a", DrawType::Weekly, &[7, 8, 9]);
    buy(&store, "b", DrawType::Weekly, &[7, 8, 10]);

    let mut engine = SettlementEngine::new(store.clone(), Scripted::new(&[1, 2, 3]), Arc::new(Recorder::default()));
    engine.run_on(DrawType::Weekly, settle_date()).unwrap();
    assert_relative_eq!(store.pool(DrawType::Weekly).unwrap().carryover_amount, 9.0, epsilon = 1e-9);

    buy(&store, "c", DrawType::Weekly, &[1, 2, 3]);
    let outcome = engine
        .run_on(DrawType::Weekly, settle_date() + Duration::days(7))
        .unwrap();
    let b = outcome.report().unwrap().plan.breakdown;

    assert_relative_eq!(b.total_pool, 14.0, epsilon = 1e-9);
    assert_relative_eq!(b.payout_per_winner, 8.4, epsilon = 1e-9);
    assert_relative_eq!(balance(&store, "c"), 8.4, epsilon = 1e-9);
    assert_eq!(store.pool(DrawType::Weekly).unwrap().carryover_amount, 0.0);
}

#[test]
fn test_multiple_winners_share_equally() {
    let store = SqliteLotteryStore::open_in_memory().unwrap();
    buy(&store, "w1", DrawType::Monthly, &[5, 4, 3, 2, 1]);
    buy(&store, "w2", DrawType::Monthly, &[1, 2, 3, 4, 5]);
    buy(&store, "w3", DrawType::Monthly, &[1, 3, 5, 2, 4]);

    let mut engine = SettlementEngine::new(store.clone(), Scripted::new(&[1, 2, 3, 4, 5]), Arc::new(Recorder::default()));
    let outcome = engine.run_on(DrawType::Monthly, settle_date()).unwrap();
    let b = outcome.report().unwrap().plan.breakdown;

    assert_eq!(b.winners, 3);
    assert_relative_eq!(b.payout_per_winner, 8.0, epsilon = 1e-9);
    for user in ["w1", "w2", "w3"] {
        assert_relative_eq!(balance(&store, user), 8.0, epsilon = 1e-9);
    }
    assert_relative_eq!(store.pool(DrawType::Monthly).unwrap().carryover_amount, 2.4, epsilon = 1e-9);
}

// =============================================================================
// Invariants
// =============================================================================

#[test]
fn test_conservation_with_random_draws() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut picker = StdRng::seed_from_u64(7);
    for round in 0..5u64 {
        let store = SqliteLotteryStore::open_in_memory().unwrap();
        for i in 0..40 {
            let numbers = lc_lottery::lottery::generate(3, 30, &mut picker).unwrap();
            buy(&store, &format!("r{}-{}", round, i), DrawType::Weekly, &numbers);
        }

        let mut engine = SettlementEngine::new(
            store.clone(),
            StdRng::seed_from_u64(picker.gen()),
            Arc::new(Recorder::default()),
        );
        let outcome = engine.run_on(DrawType::Weekly, settle_date()).unwrap();
        let report = outcome.report().unwrap();
        let b = &report.plan.breakdown;

        let winning = &report.draw.winning_numbers;
        assert_eq!(winning.len(), 3);
        assert!(winning.as_slice().windows(2).all(|w| w[0] < w[1]));
        assert!(winning.as_slice().iter().all(|n| (1..=30).contains(n)));

        assert_relative_eq!(
            report.plan.total_paid() + b.house_profit + b.carryover + b.monthly_contribution,
            b.total_pool,
            epsilon = 1e-9
        );

        let stored: f64 = store
            .tickets_for_draw(report.draw.id)
            .unwrap()
            .iter()
            .map(|t| t.payout)
            .sum();
        assert_relative_eq!(stored, report.plan.total_paid(), epsilon = 1e-9);
    }
}

#[test]
fn test_second_run_finds_nothing() {
    let store = SqliteLotteryStore::open_in_memory().unwrap();
    buy(&store, "a", DrawType::Weekly, &[1, 2, 3]);

    let mut engine = SettlementEngine::new(store.clone(), Scripted::new(&[1, 2, 3]), Arc::new(Recorder::default()));
    assert!(engine.run_on(DrawType::Weekly, settle_date()).unwrap().report().is_some());
    let paid = balance(&store, "a");

    let again = engine.run_on(DrawType::Weekly, settle_date()).unwrap();
    assert!(matches!(again, SettlementOutcome::NothingToSettle { .. }));
    assert_eq!(engine.phase(), SettlementPhase::Done);
    assert_eq!(store.draw_count().unwrap(), 1);
    assert_eq!(balance(&store, "a"), paid);
}

#[test]
fn test_weekly_settlement_leaves_monthly_tickets_alone() {
    let store = SqliteLotteryStore::open_in_memory().unwrap();
    buy(&store, "a", DrawType::Weekly, &[1, 2, 3]);
    buy(&store, "b", DrawType::Monthly, &[1, 2, 3, 4, 5]);

    let mut engine = SettlementEngine::new(store.clone(), Scripted::new(&[1, 2, 3]), Arc::new(Recorder::default()));
    engine.run_on(DrawType::Weekly, settle_date()).unwrap();

    let pending = store.pending_tickets(DrawType::Monthly).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].user_id, "b");
    assert_eq!(pending[0].draw_id, None);
}

#[test]
fn test_purchase_preconditions() {
    let store = SqliteLotteryStore::open_in_memory().unwrap();
    store.credit_coins("u", 4.0).unwrap();

    assert!(matches!(
        store.purchase_ticket("u", DrawType::Weekly, &[1, 2, 3], 5.0),
        Err(LotteryError::InsufficientBalance { .. })
    ));
    assert!(matches!(
        store.purchase_ticket("ghost", DrawType::Weekly, &[1, 2, 3], 5.0),
        Err(LotteryError::UnknownUser(_))
    ));
    assert!(matches!(
        store.purchase_ticket("u", DrawType::Weekly, &[1, 1, 3], 5.0),
        Err(LotteryError::InvalidTicket(_))
    ));

    assert_eq!(balance(&store, "u"), 4.0);
    assert_eq!(store.pool(DrawType::Weekly).unwrap().current_amount, 0.0);
    assert!(store.tickets_for_user("u").unwrap().is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_runs_on_shared_store_pay_once() {
    let store = SqliteLotteryStore::open_in_memory().unwrap();
    buy(&store, "lucky", DrawType::Weekly, &[1, 2, 3]);
    buy_weekly_losers(&store, 9);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                let mut engine = SettlementEngine::new(store, Scripted::new(&[1, 2, 3]), Arc::new(Recorder::default()));
                engine.run_on(DrawType::Weekly, settle_date()).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let settled = outcomes.iter().filter(|o| o.report().is_some()).count();

    assert_eq!(settled, 1);
    assert_eq!(store.draw_count().unwrap(), 1);
    assert_relative_eq!(balance(&store, "lucky"), 30.0, epsilon = 1e-9);
}

#[test]
fn test_concurrent_processes_on_file_database_pay_once() {
    let path = temp_db("concurrent");
    let setup = create_store(&path, std::time::Duration::from_secs(5)).unwrap();
    buy(&setup, "lucky", DrawType::Weekly, &[1, 2, 3]);
    buy_weekly_losers(&setup, 9);

    // Separate connections, as two processes would have
    let handles: Vec<_> = (0..3)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                let store = create_store(&path, std::time::Duration::from_secs(5)).unwrap();
                let mut engine = SettlementEngine::new(store, Scripted::new(&[1, 2, 3]), Arc::new(Recorder::default()));
                engine.run_on(DrawType::Weekly, settle_date()).unwrap()
            })
        })
        .collect();

    let settled = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|o| o.report().is_some())
        .count();

    assert_eq!(settled, 1);
    assert_eq!(setup.draw_count().unwrap(), 1);
    assert_relative_eq!(balance(&setup, "lucky"), 30.0, epsilon = 1e-9);
    assert_relative_eq!(setup.pool(DrawType::Monthly).unwrap().current_amount, 15.0, epsilon = 1e-9);

    if let Some(dir) = path.parent() {
        std::fs::remove_dir_all(dir).ok();
    }
}

// =============================================================================
// Notifications
// =============================================================================

struct Failing;

impl NotificationSink for Failing {
    fn deliver(&self, _n: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Rejected {
            status: 503,
            body: "unavailable".to_string(),
        })
    }
}

#[test]
fn test_queued_delivery_failures_do_not_affect_settlement() {
    let store = SqliteLotteryStore::open_in_memory().unwrap();
    buy(&store, "a", DrawType::Weekly, &[1, 2, 3]);
    buy(&store, "b", DrawType::Weekly, &[1, 2, 4]);

    let queue = Arc::new(QueuedSink::spawn(Failing).unwrap());
    let mut engine = SettlementEngine::new(store.clone(), Scripted::new(&[1, 2, 3]), queue.clone())
        .with_owner_recipient("ops");
    let outcome = engine.run_on(DrawType::Weekly, settle_date()).unwrap();

    // Enqueueing succeeds; the worker fails every delivery later
    assert_eq!(outcome.report().unwrap().notifications_rejected, 0);
    let stats = queue.shutdown();
    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.failed, 3);

    assert_relative_eq!(balance(&store, "b"), 5.0);
    assert!(store.pending_tickets(DrawType::Weekly).unwrap().is_empty());
}
