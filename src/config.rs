//! Client configuration.

use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::ledger::DEFAULT_STARTING_BALANCE;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend root, without trailing slash
    pub base_url: String,
    /// Per-request timeout, applied to every endpoint including history fetches
    pub request_timeout: Duration,
    /// Opening balance assumed when reconciling the ledger
    pub starting_balance: Decimal,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            starting_balance: Decimal::from(DEFAULT_STARTING_BALANCE),
        }
    }
}

impl ClientConfig {
    /// Read `LIFESIM_*` variables, loading `.env` first if present.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let base_url = std::env::var("LIFESIM_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("LIFESIM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| parse_or_warn::<u64>("LIFESIM_TIMEOUT_SECS", &v))
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let starting_balance = std::env::var("LIFESIM_STARTING_BALANCE")
            .ok()
            .and_then(|v| parse_or_warn::<Decimal>("LIFESIM_STARTING_BALANCE", &v))
            .unwrap_or_else(|| Decimal::from(DEFAULT_STARTING_BALANCE));

        Self::default()
            .with_base_url(&base_url)
            .with_timeout(Duration::from_secs(timeout_secs))
            .with_starting_balance(starting_balance)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_starting_balance(mut self, starting_balance: Decimal) -> Self {
        self.starting_balance = starting_balance;
        self
    }
}

fn parse_or_warn<T: FromStr>(var: &str, raw: &str) -> Option<T> {
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var, value = raw, "ignoring unparsable setting, using default");
            None
        }
    }
}
