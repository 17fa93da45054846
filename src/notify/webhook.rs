//! Webhook notification sink
//!
//! Posts each notification as JSON to the bot webhook. When a secret is
//! configured the body is signed with HMAC-SHA256 and the hex digest sent
//! in the `X-Signature` header, so the receiver can verify the sender.

use hmac::{Hmac, Mac};
use reqwest::blocking::Client;
use serde::Serialize;
use sha2::Sha256;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use super::{Notification, NotificationSink, NotifyError};
use crate::common::{CircuitBreaker, CircuitBreakerConfig};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const BOT_TOKEN_HEADER: &str = "X-Bot-Token";

/// Hex HMAC-SHA256 of `body` keyed by `secret`
pub fn sign_payload(body: &str, secret: &str) -> String {
    // HMAC accepts keys of any length, so this never fails
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check a signature produced by [`sign_payload`]
pub fn verify_signature(body: &str, secret: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    user_id: &'a str,
    message: &'a str,
    payout: f64,
}

pub struct WebhookSink {
    client: Client,
    url: String,
    bot_token: Option<String>,
    secret: Option<String>,
    breaker: Mutex<CircuitBreaker>,
}

impl WebhookSink {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        breaker: CircuitBreakerConfig,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            bot_token: None,
            secret: None,
            breaker: Mutex::new(CircuitBreaker::new(breaker)),
        })
    }

    pub fn with_bot_token(mut self, token: Option<String>) -> Self {
        self.bot_token = token;
        self
    }

    pub fn with_secret(mut self, secret: Option<String>) -> Self {
        self.secret = secret;
        self
    }

    fn post(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = serde_json::to_string(&WebhookPayload {
            user_id: &notification.recipient_id,
            message: &notification.message,
            payout: notification.amount,
        })?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(token) = &self.bot_token {
            request = request.header(BOT_TOKEN_HEADER, token);
        }
        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(&body, secret));
        }

        let response = request.body(body).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Webhook delivered notification to {}", notification.recipient_id);
        Ok(())
    }
}

impl NotificationSink for WebhookSink {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        {
            let mut breaker = self.breaker.lock().unwrap_or_else(|p| p.into_inner());
            if !breaker.allow() {
                return Err(NotifyError::CircuitOpen);
            }
        }

        let result = self.post(notification);

        let mut breaker = self.breaker.lock().unwrap_or_else(|p| p.into_inner());
        match &result {
            Ok(()) => breaker.on_success(),
            Err(_) => breaker.on_failure(),
        }
        result
    }
}
