//! Webhook Signature Verification
//!
//! The gateway signs each notification with HMAC-SHA256 over a manifest
//! built from the notified resource id, the request id and a timestamp:
//!
//! ```text
//! x-signature:  ts=1704908010,v1=618c85345248dd820d5fd456117c2ab2ef8eda45a0282ff693eac24131a5e839
//! x-request-id: bb56a2f1-6aae-46ac-982e-9dcd3581d08e
//! manifest:     id:<data.id>;request-id:<x-request-id>;ts:<ts>;
//! ```
//!
//! Parts whose value is absent are left out of the manifest. Alphanumeric ids
//! are lower-cased before signing.
//!
//! A valid signature is also rejected when its `ts` lies outside the
//! verifier's tolerance, so a captured notification cannot be replayed once
//! the processed-payment ledger has forgotten it.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CheckoutError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Default accepted distance between `ts` and the local clock
pub const DEFAULT_TOLERANCE_SECS: i64 = 600;

/// Timestamps above this are taken to be in milliseconds
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Values taken from the notification request before its body is read
#[derive(Clone, Debug, Default)]
pub struct SignatureInput<'a> {
    /// `x-signature` header
    pub signature: Option<&'a str>,

    /// `x-request-id` header
    pub request_id: Option<&'a str>,

    /// `data.id` query parameter
    pub data_id: Option<&'a str>,
}

/// Verifies notification signatures against the shared secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance: Duration,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance: Duration::seconds(DEFAULT_TOLERANCE_SECS),
        }
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Check a notification's signature against the current time
    ///
    /// Every failure maps to the same `WebhookVerificationFailed`, so callers
    /// learn nothing about which check tripped.
    pub fn verify(&self, input: &SignatureInput<'_>) -> Result<()> {
        self.verify_at(input, Utc::now())
    }

    pub fn verify_at(&self, input: &SignatureInput<'_>, now: DateTime<Utc>) -> Result<()> {
        let header = input.signature.ok_or(CheckoutError::WebhookVerificationFailed)?;
        let (ts, v1) = parse_header(header).ok_or(CheckoutError::WebhookVerificationFailed)?;
        let expected = hex::decode(v1).map_err(|_| CheckoutError::WebhookVerificationFailed)?;

        let mut mac = self.mac()?;
        mac.update(manifest(input.data_id, input.request_id, ts).as_bytes());
        mac.verify_slice(&expected).map_err(|_| {
            tracing::warn!(request_id = ?input.request_id, "Webhook signature mismatch");
            CheckoutError::WebhookVerificationFailed
        })?;

        let signed_at = parse_timestamp(ts).ok_or(CheckoutError::WebhookVerificationFailed)?;
        if (now - signed_at).abs() > self.tolerance {
            tracing::warn!(request_id = ?input.request_id, %signed_at, "Webhook timestamp outside tolerance");
            return Err(CheckoutError::WebhookVerificationFailed);
        }
        Ok(())
    }

    /// Produce an `x-signature` header value; used by tests and local tooling
    pub fn sign(&self, data_id: Option<&str>, request_id: Option<&str>, ts: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(manifest(data_id, request_id, ts).as_bytes());
        Ok(format!("ts={ts},v1={}", hex::encode(mac.finalize().into_bytes())))
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| CheckoutError::Config(format!("webhook secret: {e}")))
    }
}

/// Split `ts=...,v1=...` into its two values
fn parse_header(header: &str) -> Option<(&str, &str)> {
    let mut ts = None;
    let mut v1 = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => ts = Some(value.trim()),
            Some(("v1", value)) => v1 = Some(value.trim()),
            _ => {}
        }
    }

    match (ts, v1) {
        (Some(ts), Some(v1)) if !ts.is_empty() && !v1.is_empty() => Some((ts, v1)),
        _ => None,
    }
}

/// `ts` in seconds or milliseconds since the epoch
fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let value: i64 = ts.parse().ok()?;
    if value >= MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

fn manifest(data_id: Option<&str>, request_id: Option<&str>, ts: &str) -> String {
    let mut out = String::new();
    if let Some(id) = data_id.filter(|id| !id.is_empty()) {
        if id.chars().all(|c| c.is_ascii_alphanumeric()) {
            out.push_str(&format!("id:{};", id.to_ascii_lowercase()));
        } else {
            out.push_str(&format!("id:{id};"));
        }
    }
    if let Some(request_id) = request_id.filter(|r| !r.is_empty()) {
        out.push_str(&format!("request-id:{request_id};"));
    }
    out.push_str(&format!("ts:{ts};"));
    out
}
