//! Circuit breaker for outbound notification delivery
//!
//! After `failure_threshold` consecutive failures the breaker opens and
//! delivery attempts are skipped until `cooldown` has passed. The first
//! attempt after the cooldown is a trial: success closes the breaker,
//! failure reopens it for another cooldown.

use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            config,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Whether a delivery may be attempted now
    pub fn allow(&mut self) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled = self
                    .opened_at
                    .map_or(true, |at| at.elapsed() >= self.config.cooldown);
                if cooled {
                    info!("Notification circuit half-open, sending trial delivery");
                    self.state = CircuitState::HalfOpen;
                }
                cooled
            }
        }
    }

    pub fn on_success(&mut self) {
        if self.state != CircuitState::Closed {
            info!("Notification circuit closed");
        }
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    pub fn on_failure(&mut self) {
        self.consecutive_failures += 1;
        let trip = self.state == CircuitState::HalfOpen
            || self.consecutive_failures >= self.config.failure_threshold;
        if trip && self.state != CircuitState::Open {
            warn!(
                "Notification circuit opened after {} consecutive failures",
                self.consecutive_failures
            );
            self.state = CircuitState::Open;
        }
        if self.state == CircuitState::Open {
            self.opened_at = Some(Instant::now());
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
