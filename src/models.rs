use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::api::error::ApiError;
use crate::choice::Choice;
use crate::ledger::{de_decimal_opt, Ledger};

/// Age at which the backend ends the game.
pub const RETIREMENT_AGE: u32 = 67;

/// Opaque session token issued by `/game/start`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An outstanding loan as reported in the player state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "de_decimal_opt")]
    pub remaining_amount: Option<Decimal>,
}

/// Player snapshot returned by most endpoints.
///
/// `balance` is the server's own figure and is informational only: the
/// displayed balance comes from the reconciled ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: u32,
    #[serde(rename = "currentDate", default)]
    pub current_date: Option<String>,
    #[serde(default, deserialize_with = "de_decimal_opt")]
    pub balance: Option<Decimal>,
    #[serde(default, deserialize_with = "de_decimal_opt")]
    pub income: Option<Decimal>,
    #[serde(rename = "jobTitle", default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub life_events: Vec<String>,
    #[serde(default)]
    pub loans: Vec<Loan>,
}

/// A dilemma or job offer generated by the backend for the current year.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub scenario_title: String,
    #[serde(default)]
    pub scenario_description: String,
    pub choices: Vec<Choice>,
}

/// End-of-game analysis. Sections may be plain strings or structured JSON.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FinalSummary {
    #[serde(default)]
    pub persona_title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub best_decision: Option<Value>,
    #[serde(default)]
    pub worst_decision: Option<Value>,
}

// ---- request bodies ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameRequest<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRequest<'a> {
    pub game_id: &'a GameId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FastForwardRequest<'a> {
    pub game_id: &'a GameId,
    pub target_age: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest<'a> {
    pub game_id: &'a GameId,
    pub choice: &'a Choice,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayLoanRequest<'a> {
    pub game_id: &'a GameId,
    pub loan_index: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

// ---- responses ----

#[derive(Debug, Clone, Deserialize)]
pub struct StartGameResponse {
    #[serde(rename = "gameId")]
    pub game_id: GameId,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "playerState")]
    pub player_state: PlayerState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateResponse {
    #[serde(rename = "playerState")]
    pub player_state: PlayerState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "playerState")]
    pub player_state: PlayerState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub transaction_history: Ledger,
}

/// Raw `/game/advance-year` and `/game/fast-forward` body before it is split
/// into [`YearOutcome`].
#[derive(Debug, Clone, Deserialize)]
pub struct AdvanceYearResponse {
    #[serde(rename = "gameOver", default)]
    pub game_over: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "playerState", default)]
    pub player_state: Option<PlayerState>,
    #[serde(rename = "nextEvent", default)]
    pub next_event: Option<Value>,
    #[serde(rename = "finalSummary", default)]
    pub final_summary: Option<Value>,
}

/// What happened when time moved forward.
#[derive(Debug, Clone, PartialEq)]
pub enum YearOutcome {
    NextEvent {
        message: Option<String>,
        player_state: PlayerState,
        scenario: Scenario,
    },
    GameOver {
        message: Option<String>,
        player_state: Option<PlayerState>,
        summary: FinalSummary,
    },
}

impl AdvanceYearResponse {
    pub fn into_outcome(self, endpoint: &'static str) -> Result<YearOutcome, ApiError> {
        if self.game_over {
            let summary = match self.final_summary {
                Some(v) if !v.is_null() => decode_summary(v),
                _ => FinalSummary::default(),
            };
            return Ok(YearOutcome::GameOver {
                message: self.message,
                player_state: self.player_state,
                summary,
            });
        }

        let player_state = self.player_state.ok_or_else(|| ApiError::Backend {
            endpoint,
            status: 200,
            message: "response carried neither playerState nor gameOver".to_string(),
        })?;

        let event = self.next_event.unwrap_or(Value::Null);
        // Scenario generation failures come back as {"error": "..."} inside nextEvent
        if let Some(msg) = event.get("error").and_then(Value::as_str) {
            return Err(ApiError::Backend {
                endpoint,
                status: 200,
                message: msg.to_string(),
            });
        }
        let scenario: Scenario = serde_json::from_value(event)
            .map_err(|source| ApiError::Decode { endpoint, source })?;

        Ok(YearOutcome::NextEvent {
            message: self.message,
            player_state,
            scenario,
        })
    }
}

fn decode_summary(v: Value) -> FinalSummary {
    match serde_json::from_value::<FinalSummary>(v.clone()) {
        Ok(s) => s,
        Err(_) => FinalSummary {
            summary: Some(match v {
                Value::String(s) => s,
                other => other.to_string(),
            }),
            ..FinalSummary::default()
        },
    }
}
