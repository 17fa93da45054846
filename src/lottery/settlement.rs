//! Draw settlement
//!
//! A settlement run moves through
//! `Idle -> Drawing -> Matching -> Computing -> Persisting -> Notifying -> Done`:
//!
//! 1. draw the winning numbers
//! 2. inside one storage transaction: read the pool, open a draw record,
//!    claim every unclaimed ticket of the draw type, match them, split the
//!    pool, write ticket outcomes, credit balances and roll the pools over
//! 3. after commit, hand one notification per paid ticket plus an operator
//!    summary to the notification sink
//!
//! Any storage error before commit rolls the whole run back. Notification
//! failures are logged and never undo a committed settlement. A run that
//! claims no tickets writes nothing.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::generator::{draw_numbers, RandomSource};
use super::matcher::classify;
use super::payout::{self, PayoutBreakdown};
use crate::error::LotteryResult;
use crate::notify::{Notification, NotificationSink};
use crate::state_manager::{LotteryStore, SettlementTx};
use crate::types::{Draw, DrawStatus, DrawType, Pool, Ticket, TicketStatus, WinningNumbers};

/// Recipient of the operator summary unless configured otherwise
pub const DEFAULT_OWNER_RECIPIENT: &str = "owner";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementPhase {
    Idle,
    Drawing,
    Matching,
    Computing,
    Persisting,
    Notifying,
    Done,
}

impl fmt::Display for SettlementPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Settled state of one ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketOutcome {
    pub ticket_id: i64,
    pub user_id: String,
    pub stake: f64,
    pub matches: u32,
    pub status: TicketStatus,
    pub payout: f64,
}

/// Everything a settlement decides, computed in memory before any write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementPlan {
    pub draw_type: DrawType,
    pub winning: WinningNumbers,
    pub pool: Pool,
    pub outcomes: Vec<TicketOutcome>,
    pub breakdown: PayoutBreakdown,
}

impl SettlementPlan {
    pub fn total_tickets(&self) -> u32 {
        self.outcomes.len() as u32
    }

    /// Tickets refunded for a near miss
    pub fn partial_matches(&self) -> u32 {
        self.count(TicketStatus::Refund)
    }

    pub fn winners(&self) -> u32 {
        self.count(TicketStatus::Win)
    }

    fn count(&self, status: TicketStatus) -> u32 {
        self.outcomes.iter().filter(|o| o.status == status).count() as u32
    }

    /// Sum of ticket payouts (refunds and winner shares)
    pub fn total_paid(&self) -> f64 {
        self.outcomes.iter().map(|o| o.payout).sum()
    }

    /// One message per paid ticket followed by the operator summary
    pub fn notifications(&self, owner_recipient: &str) -> Vec<Notification> {
        let mut out: Vec<Notification> = self
            .outcomes
            .iter()
            .filter(|o| o.payout > 0.0)
            .map(|o| {
                let message = match o.status {
                    TicketStatus::Refund => format!(
                        "Lottery Refund: You matched {} numbers in the {} draw and received {} LC coins back!",
                        o.matches, self.draw_type, o.payout
                    ),
                    _ => format!(
                        "JACKPOT WINNER! You won {:.2} LC coins in the {} lottery! Numbers: {}",
                        o.payout, self.draw_type, self.winning
                    ),
                };
                Notification::new(o.user_id.clone(), message, o.payout)
            })
            .collect();

        out.push(Notification::new(owner_recipient, self.summary(), 0.0));
        out
    }

    /// Operator summary text
    pub fn summary(&self) -> String {
        let b = &self.breakdown;
        let mut lines = vec![
            format!("{} LOTTERY DRAW COMPLETE", self.draw_type.as_str().to_uppercase()),
            format!("Winning Numbers: {}", self.winning),
            format!("Total Pool: {:.2} LC", b.total_pool),
            format!("Total Tickets: {}", self.total_tickets()),
            format!("Full Winners: {}", b.winners),
        ];
        if self.draw_type.refund_matches().is_some() {
            lines.push(format!("Partial Matches: {}", self.partial_matches()));
        }
        lines.push(format!("Payout per Winner: {:.2} LC", b.payout_per_winner));
        lines.push(format!("House Profit: {:.2} LC", b.house_profit));
        if b.carryover > 0.0 {
            lines.push(format!("Carryover: {:.2} LC", b.carryover));
        }
        if b.monthly_contribution > 0.0 {
            lines.push(format!("Monthly Pool Contribution: {:.2} LC", b.monthly_contribution));
        }
        lines.join("\n")
    }
}

/// Classify each ticket against the winning numbers. Winning tickets get
/// their payout once the pool has been split.
pub fn match_tickets(
    draw_type: DrawType,
    winning: &WinningNumbers,
    tickets: &[Ticket],
) -> Vec<TicketOutcome> {
    tickets
        .iter()
        .map(|ticket| {
            let result = classify(draw_type, &ticket.numbers, ticket.cost, winning);
            TicketOutcome {
                ticket_id: ticket.id,
                user_id: ticket.user_id.clone(),
                stake: ticket.cost,
                matches: result.matches,
                status: result.status,
                payout: result.refund,
            }
        })
        .collect()
}

/// Split the pool for already matched tickets and fill in winner payouts
pub fn compute_payouts(
    draw_type: DrawType,
    winning: WinningNumbers,
    pool: Pool,
    mut outcomes: Vec<TicketOutcome>,
) -> LotteryResult<SettlementPlan> {
    let refund_total: f64 = outcomes
        .iter()
        .filter(|o| o.status == TicketStatus::Refund)
        .map(|o| o.payout)
        .sum();
    let winners = outcomes
        .iter()
        .filter(|o| o.status == TicketStatus::Win)
        .count() as u32;

    let breakdown = payout::calculate(draw_type, pool.total(), refund_total, winners)?;

    for outcome in outcomes.iter_mut().filter(|o| o.status == TicketStatus::Win) {
        outcome.payout = breakdown.payout_per_winner;
    }

    Ok(SettlementPlan {
        draw_type,
        winning,
        pool,
        outcomes,
        breakdown,
    })
}

/// Matching and computing in one call, without touching storage
pub fn plan_settlement(
    draw_type: DrawType,
    winning: &WinningNumbers,
    pool: &Pool,
    tickets: &[Ticket],
) -> LotteryResult<SettlementPlan> {
    let outcomes = match_tickets(draw_type, winning, tickets);
    compute_payouts(draw_type, winning.clone(), pool.clone(), outcomes)
}

/// Apply a plan inside an open transaction
pub fn persist_settlement<T: SettlementTx>(
    tx: &T,
    draw_id: i64,
    plan: &SettlementPlan,
    today: NaiveDate,
) -> LotteryResult<()> {
    tx.finalize_draw(draw_id, plan.total_tickets(), &plan.breakdown)?;

    for outcome in &plan.outcomes {
        tx.record_outcome(draw_id, outcome)?;
        if outcome.payout > 0.0 {
            tx.credit_balance(&outcome.user_id, outcome.payout)?;
        }
    }

    let next_draw = today + Duration::days(plan.draw_type.interval_days());
    tx.reset_pool(plan.draw_type, plan.breakdown.carryover, next_draw)?;

    if plan.breakdown.monthly_contribution > 0.0 {
        tx.add_to_pool(DrawType::Monthly, plan.breakdown.monthly_contribution)?;
    }

    Ok(())
}

/// A committed settlement
#[derive(Debug, Clone)]
pub struct SettlementReport {
    pub draw: Draw,
    pub plan: SettlementPlan,
    /// Notifications the sink refused; delivery itself is best effort
    pub notifications_rejected: usize,
}

#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    Settled(Box<SettlementReport>),
    /// No unclaimed tickets; nothing was written
    NothingToSettle { draw_type: DrawType },
}

impl SettlementOutcome {
    pub fn report(&self) -> Option<&SettlementReport> {
        match self {
            SettlementOutcome::Settled(report) => Some(report),
            SettlementOutcome::NothingToSettle { .. } => None,
        }
    }
}

fn transition(phase: &mut SettlementPhase, draw_type: DrawType, next: SettlementPhase) {
    debug!("{} settlement: {} -> {}", draw_type, phase, next);
    *phase = next;
}

/// Runs settlements against a store, drawing from `rng` and notifying
/// through `notifier`
pub struct SettlementEngine<S, R> {
    store: S,
    rng: R,
    notifier: Arc<dyn NotificationSink>,
    owner_recipient: String,
    phase: SettlementPhase,
}

impl<S: LotteryStore, R: RandomSource> SettlementEngine<S, R> {
    pub fn new(store: S, rng: R, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            store,
            rng,
            notifier,
            owner_recipient: DEFAULT_OWNER_RECIPIENT.to_string(),
            phase: SettlementPhase::Idle,
        }
    }

    pub fn with_owner_recipient(mut self, owner: impl Into<String>) -> Self {
        self.owner_recipient = owner.into();
        self
    }

    pub fn phase(&self) -> SettlementPhase {
        self.phase
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Settle `draw_type` dated today (UTC)
    pub fn run(&mut self, draw_type: DrawType) -> LotteryResult<SettlementOutcome> {
        self.run_on(draw_type, Utc::now().date_naive())
    }

    /// Settle `draw_type` with `today` as the draw date
    pub fn run_on(
        &mut self,
        draw_type: DrawType,
        today: NaiveDate,
    ) -> LotteryResult<SettlementOutcome> {
        self.phase = SettlementPhase::Idle;
        let result = self.execute(draw_type, today);
        if let Err(e) = &result {
            warn!("{} settlement failed in {} phase: {}", draw_type, self.phase, e);
            self.phase = SettlementPhase::Idle;
        }
        result
    }

    fn execute(&mut self, draw_type: DrawType, today: NaiveDate) -> LotteryResult<SettlementOutcome> {
        transition(&mut self.phase, draw_type, SettlementPhase::Drawing);
        let winning = draw_numbers(draw_type, &mut self.rng)?;
        info!("{} draw numbers: {}", draw_type, winning);

        let tx = self.store.begin_settlement()?;
        let pool = tx.load_pool(draw_type)?;
        let draw_id = tx.open_draw(draw_type, today, &winning)?;
        let tickets = tx.claim_pending(draw_type, draw_id)?;

        if tickets.is_empty() {
            drop(tx);
            info!("No pending {} tickets, nothing to settle", draw_type);
            transition(&mut self.phase, draw_type, SettlementPhase::Done);
            return Ok(SettlementOutcome::NothingToSettle { draw_type });
        }

        transition(&mut self.phase, draw_type, SettlementPhase::Matching);
        let outcomes = match_tickets(draw_type, &winning, &tickets);

        transition(&mut self.phase, draw_type, SettlementPhase::Computing);
        let plan = compute_payouts(draw_type, winning, pool, outcomes)?;

        transition(&mut self.phase, draw_type, SettlementPhase::Persisting);
        persist_settlement(&tx, draw_id, &plan, today)?;
        tx.commit()?;

        let b = &plan.breakdown;
        info!(
            "{} draw #{} settled: tickets={} winners={} refunds={} pool={:.2} per_winner={:.2} profit={:.2} carryover={:.2} monthly_contribution={:.2}",
            draw_type,
            draw_id,
            plan.total_tickets(),
            b.winners,
            plan.partial_matches(),
            b.total_pool,
            b.payout_per_winner,
            b.house_profit,
            b.carryover,
            b.monthly_contribution
        );

        let draw = Draw {
            id: draw_id,
            draw_type,
            draw_date: today,
            winning_numbers: plan.winning.clone(),
            total_pool: b.total_pool,
            total_tickets: plan.total_tickets(),
            winners_count: b.winners,
            payout_per_winner: b.payout_per_winner,
            carryover_amount: b.carryover,
            profit_amount: b.house_profit,
            status: DrawStatus::PaidOut,
        };

        transition(&mut self.phase, draw_type, SettlementPhase::Notifying);
        let notifications_rejected = self.notify(&plan);

        transition(&mut self.phase, draw_type, SettlementPhase::Done);
        Ok(SettlementOutcome::Settled(Box::new(SettlementReport {
            draw,
            plan,
            notifications_rejected,
        })))
    }

    fn notify(&self, plan: &SettlementPlan) -> usize {
        let mut rejected = 0;
        for notification in plan.notifications(&self.owner_recipient) {
            if let Err(e) = self.notifier.deliver(&notification) {
                rejected += 1;
                warn!(
                    "Failed to send notification to {}: {}",
                    notification.recipient_id, e
                );
            }
        }
        rejected
    }
}
