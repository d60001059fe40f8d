//! Game backend REST client
//!
//! Every endpoint is a JSON POST under the configured base URL. Failures are
//! reported either as a non-2xx status or as a `{"error": "..."}` body; both
//! map to [`ApiError::Backend`].

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::{ApiError, LedgerFetchError};
use crate::choice::Choice;
use crate::config::ClientConfig;
use crate::ledger::Ledger;
use crate::models::{
    AdvanceYearResponse, DecisionRequest, DecisionResponse, FastForwardRequest, GameId,
    GameRequest, HistoryResponse, PayLoanRequest, PlayerState, StartGameRequest,
    StartGameResponse, StateResponse, YearOutcome, RETIREMENT_AGE,
};
use crate::reconciler::LedgerSource;

pub const START_PATH: &str = "/game/start";
pub const STATE_PATH: &str = "/game/state";
pub const ADVANCE_YEAR_PATH: &str = "/game/advance-year";
pub const FAST_FORWARD_PATH: &str = "/game/fast-forward";
pub const HISTORY_PATH: &str = "/game/history";
pub const PAY_LOAN_PATH: &str = "/game/pay-loan";

#[derive(Clone)]
pub struct GameApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl GameApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("lifesim-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[inline]
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B, R>(&self, endpoint: &'static str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.url(endpoint))
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_transport(endpoint, e))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| classify_transport(endpoint, e))?;
        debug!(endpoint, status = status.as_u16(), body_len = text.len(), "backend response received");

        let parsed: Result<Value, _> = serde_json::from_str(&text);

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|v| error_message(&v))
                .unwrap_or_else(|| text.chars().take(200).collect());
            warn!(endpoint, status = status.as_u16(), %message, "backend rejected request");
            return Err(ApiError::Backend {
                endpoint,
                status: status.as_u16(),
                message,
            });
        }

        let value = parsed.map_err(|source| {
            warn!(endpoint, error = %source, body_preview = %text.chars().take(200).collect::<String>(), "backend JSON parse failed");
            ApiError::Decode { endpoint, source }
        })?;

        if let Some(message) = error_message(&value) {
            warn!(endpoint, %message, "backend returned error body");
            return Err(ApiError::Backend {
                endpoint,
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_value(value).map_err(|source| ApiError::Decode { endpoint, source })
    }

    pub async fn start_game(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<StartGameResponse, ApiError> {
        let first_name = first_name.trim();
        let last_name = last_name.trim();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(ApiError::InvalidRequest(
                "firstName and lastName are required.".to_string(),
            ));
        }
        self.post(
            START_PATH,
            &StartGameRequest {
                first_name,
                last_name,
            },
        )
        .await
    }

    pub async fn game_state(&self, game_id: &GameId) -> Result<PlayerState, ApiError> {
        let resp: StateResponse = self.post(STATE_PATH, &GameRequest { game_id }).await?;
        Ok(resp.player_state)
    }

    pub async fn advance_year(&self, game_id: &GameId) -> Result<YearOutcome, ApiError> {
        let resp: AdvanceYearResponse = self
            .post(ADVANCE_YEAR_PATH, &GameRequest { game_id })
            .await?;
        resp.into_outcome(ADVANCE_YEAR_PATH)
    }

    /// Jump straight to `target_age`, which must lie in `(current_age, 67]`.
    pub async fn fast_forward(
        &self,
        game_id: &GameId,
        current_age: u32,
        target_age: u32,
    ) -> Result<YearOutcome, ApiError> {
        validate_target_age(current_age, target_age)?;
        let resp: AdvanceYearResponse = self
            .post(
                FAST_FORWARD_PATH,
                &FastForwardRequest {
                    game_id,
                    target_age,
                },
            )
            .await?;
        resp.into_outcome(FAST_FORWARD_PATH)
    }

    /// Submit a scenario choice; the endpoint follows from the choice kind.
    pub async fn decide(
        &self,
        game_id: &GameId,
        choice: &Choice,
    ) -> Result<DecisionResponse, ApiError> {
        self.post(choice.endpoint(), &DecisionRequest { game_id, choice })
            .await
    }

    pub async fn pay_loan(
        &self,
        game_id: &GameId,
        loan_index: usize,
        amount: Decimal,
    ) -> Result<DecisionResponse, ApiError> {
        if amount <= Decimal::ZERO {
            return Err(ApiError::InvalidRequest(
                "Loan payment must be a positive amount.".to_string(),
            ));
        }
        self.post(
            PAY_LOAN_PATH,
            &PayLoanRequest {
                game_id,
                loan_index,
                amount,
            },
        )
        .await
    }

    pub async fn history(&self, game_id: &GameId) -> Result<Ledger, ApiError> {
        let resp: HistoryResponse = self.post(HISTORY_PATH, &GameRequest { game_id }).await?;
        Ok(resp.transaction_history)
    }
}

#[async_trait]
impl LedgerSource for GameApiClient {
    async fn fetch_ledger(&self, game_id: &GameId) -> Result<Ledger, LedgerFetchError> {
        self.history(game_id).await.map_err(LedgerFetchError::from)
    }
}

pub fn validate_target_age(current_age: u32, target_age: u32) -> Result<(), ApiError> {
    if target_age <= current_age || target_age > RETIREMENT_AGE {
        return Err(ApiError::InvalidRequest(format!(
            "Invalid target age. Must be a number between {} and {}.",
            current_age.saturating_add(1),
            RETIREMENT_AGE
        )));
    }
    Ok(())
}

fn classify_transport(endpoint: &'static str, e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        warn!(endpoint, "backend request timed out");
        ApiError::Timeout { endpoint }
    } else {
        warn!(endpoint, error = %e, "backend request failed");
        ApiError::Network { endpoint, source: e }
    }
}

fn error_message(v: &Value) -> Option<String> {
    match v.get("error")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_age_bounds() {
        assert!(validate_target_age(20, 21).is_ok());
        assert!(validate_target_age(20, 67).is_ok());
        assert!(validate_target_age(20, 20).is_err());
        assert!(validate_target_age(20, 68).is_err());

        let err = validate_target_age(u32::MAX, 67).unwrap_err();
        assert_eq!(
            err.user_message(),
            format!("Invalid target age. Must be a number between {} and 67.", u32::MAX)
        );

        let err = validate_target_age(30, 10).unwrap_err();
        assert_eq!(
            err.user_message(),
            "Invalid target age. Must be a number between 31 and 67."
        );
    }

    #[test]
    fn error_body_detection() {
        assert_eq!(
            error_message(&json!({"error": "Game session not found."})).as_deref(),
            Some("Game session not found.")
        );
        assert_eq!(error_message(&json!({"error": null})), None);
        assert_eq!(error_message(&json!({"playerState": {}})), None);
    }

    #[test]
    fn url_joins_base_and_path() {
        let cfg = ClientConfig::default().with_base_url("http://localhost:5000/");
        let client = GameApiClient::new(&cfg).unwrap();
        assert_eq!(client.url(HISTORY_PATH), "http://localhost:5000/game/history");
    }

    #[tokio::test]
    async fn empty_names_are_rejected_locally() {
        let client = GameApiClient::new(&ClientConfig::default()).unwrap();
        let err = client.start_game("  ", "Lovelace").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_ledger_fetch_error() {
        // Port 9 (discard) is closed on test hosts; connection is refused quickly
        let cfg = ClientConfig::default()
            .with_base_url("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2));
        let client = GameApiClient::new(&cfg).unwrap();
        let err = client
            .fetch_ledger(&GameId::new("nope"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.0,
            ApiError::Network { .. } | ApiError::Timeout { .. }
        ));
    }
}
