//! Server Configuration
//!
//! Read from the process environment (optionally seeded from `.env`).
//! Integration credentials are loaded separately by each adapter's
//! `from_env`; only server-level settings live here.

use std::time::Duration;

use storefront_checkout::Environment;
use storefront_checkout::idempotency::DEFAULT_LEDGER_TTL_HOURS;
use storefront_checkout::session::DEFAULT_SESSION_TTL_HOURS;
use storefront_checkout::signature::DEFAULT_TOLERANCE_SECS;

const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;
const MAX_LEDGER_TTL_HOURS: i64 = 24 * 365 * 10;
const MAX_SWEEP_INTERVAL_SECS: i64 = 60 * 60 * 24 * 7;
const MAX_WEBHOOK_TOLERANCE_SECS: i64 = 60 * 60 * 24;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Public site URL, base for the payment callback URLs
    pub base_url: String,

    pub environment: Environment,

    pub session_ttl_hours: i64,

    pub sweep_interval: Duration,

    pub processed_payment_ttl_hours: i64,

    /// Accepted clock distance for webhook signature timestamps
    pub webhook_tolerance_secs: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            base_url: "http://localhost:3000".into(),
            environment: Environment::Development,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            sweep_interval: Duration::from_secs(3600),
            processed_payment_ttl_hours: DEFAULT_LEDGER_TTL_HOURS,
            webhook_tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }
}

impl ServerConfig {
    /// Build from environment variables, falling back to defaults
    ///
    /// Unparsable or out-of-range numbers are logged and replaced by their
    /// default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            base_url: std::env::var("APP_BASE_URL").unwrap_or(defaults.base_url),
            environment: Environment::from_env(),
            session_ttl_hours: bounded(
                "CHECKOUT_TTL_HOURS",
                defaults.session_ttl_hours,
                MAX_SESSION_TTL_HOURS,
            ),
            sweep_interval: Duration::from_secs(
                bounded("CHECKOUT_SWEEP_INTERVAL_SECS", 3600, MAX_SWEEP_INTERVAL_SECS).unsigned_abs(),
            ),
            processed_payment_ttl_hours: bounded(
                "PROCESSED_PAYMENT_TTL_HOURS",
                defaults.processed_payment_ttl_hours,
                MAX_LEDGER_TTL_HOURS,
            ),
            webhook_tolerance_secs: bounded(
                "WEBHOOK_TOLERANCE_SECS",
                defaults.webhook_tolerance_secs,
                MAX_WEBHOOK_TOLERANCE_SECS,
            ),
        }
    }
}

fn bounded(key: &str, default: i64, max: i64) -> i64 {
    std::env::var(key).map_or(default, |raw| parse_bounded(key, &raw, default, max))
}

/// Accept `1..=max`, otherwise warn and use `default`
fn parse_bounded(key: &str, raw: &str, default: i64, max: i64) -> i64 {
    match raw.trim().parse::<i64>() {
        Ok(value) if (1..=max).contains(&value) => value,
        _ => {
            tracing::warn!(key, value = %raw, default, max, "Ignoring invalid setting");
            default
        }
    }
}
