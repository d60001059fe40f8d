//! Game actions as seen from the UI layer.
//!
//! Each state-changing action calls the backend, folds the response into the
//! [`SessionContext`] and then reconciles the balance from a fresh ledger.

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::api::{ApiError, GameApiClient, LedgerFetchError};
use crate::models::{YearOutcome, RETIREMENT_AGE};
use crate::reconciler::{BalanceSink, RefreshOutcome};
use crate::session::SessionContext;

/// Result of a successful action. The action itself went through even if the
/// follow-up ledger refresh failed.
#[derive(Debug)]
pub struct ActionReport {
    pub message: Option<String>,
    pub ledger_error: Option<LedgerFetchError>,
    /// False when no ledger refresh was attempted. The backend drops a
    /// finished game before its history can be read, so the balance shown
    /// at game over is the last one reconciled.
    pub reconciled: bool,
}

pub struct GameController<'a> {
    api: &'a GameApiClient,
    sink: &'a dyn BalanceSink,
    starting_balance: Decimal,
}

impl<'a> GameController<'a> {
    pub fn new(api: &'a GameApiClient, sink: &'a dyn BalanceSink, starting_balance: Decimal) -> Self {
        Self {
            api,
            sink,
            starting_balance,
        }
    }

    pub async fn start(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<(SessionContext, ActionReport), ApiError> {
        let start = self.api.start_game(first_name, last_name).await?;
        let message = start.message.clone();
        let mut session = SessionContext::from_start(start, self.starting_balance);
        info!(game_id = %session.game_id(), "game started");

        let report = self.finish(&mut session, message).await;
        Ok((session, report))
    }

    pub async fn advance_year(&self, session: &mut SessionContext) -> Result<ActionReport, ApiError> {
        ensure_running(session)?;
        let outcome = self.api.advance_year(session.game_id()).await?;
        Ok(self.apply_outcome(session, outcome).await)
    }

    pub async fn fast_forward(
        &self,
        session: &mut SessionContext,
        target_age: u32,
    ) -> Result<ActionReport, ApiError> {
        ensure_running(session)?;
        let outcome = self
            .api
            .fast_forward(session.game_id(), session.player().age, target_age)
            .await?;
        Ok(self.apply_outcome(session, outcome).await)
    }

    /// Submit choice `number` (1-based) of the pending scenario.
    pub async fn choose(
        &self,
        session: &mut SessionContext,
        number: usize,
    ) -> Result<ActionReport, ApiError> {
        ensure_running(session)?;
        let choice = session.choice(number).cloned().ok_or_else(|| {
            ApiError::InvalidRequest(match session.scenario() {
                Some(s) => format!("Pick a choice between 1 and {}.", s.choices.len()),
                None => "There is no decision to make right now.".to_string(),
            })
        })?;

        let resp = self.api.decide(session.game_id(), &choice).await?;
        info!(game_id = %session.game_id(), kind = ?choice.kind(), "decision accepted");
        session.set_player(resp.player_state);
        session.clear_scenario();
        Ok(self.finish(session, resp.message).await)
    }

    /// Pay `amount` towards loan `number` (1-based, as listed in the status).
    pub async fn pay_loan(
        &self,
        session: &mut SessionContext,
        number: usize,
        amount: Decimal,
    ) -> Result<ActionReport, ApiError> {
        ensure_running(session)?;
        let index = number
            .checked_sub(1)
            .ok_or_else(|| ApiError::InvalidRequest("Loans are numbered from 1.".to_string()))?;
        let loans = &session.player().loans;
        if !loans.is_empty() && index >= loans.len() {
            return Err(ApiError::InvalidRequest(format!(
                "Pick a loan between 1 and {}.",
                loans.len()
            )));
        }

        let resp = self.api.pay_loan(session.game_id(), index, amount).await?;
        session.set_player(resp.player_state);
        Ok(self.finish(session, resp.message).await)
    }

    /// Re-read the player state without changing anything.
    pub async fn sync_state(&self, session: &mut SessionContext) -> Result<(), ApiError> {
        let player = self.api.game_state(session.game_id()).await?;
        session.set_player(player);
        Ok(())
    }

    /// Fetch the ledger and redisplay the balance.
    pub async fn refresh(
        &self,
        session: &mut SessionContext,
    ) -> Result<RefreshOutcome, LedgerFetchError> {
        let reconciler = session.reconciler();
        let outcome = reconciler
            .refresh_and_display(self.api, session.game_id(), self.sink)
            .await?;
        if let RefreshOutcome::Applied { ledger, .. } = &outcome {
            session.set_ledger(ledger.clone());
        }
        Ok(outcome)
    }

    async fn apply_outcome(&self, session: &mut SessionContext, outcome: YearOutcome) -> ActionReport {
        let message = match &outcome {
            YearOutcome::NextEvent { message, .. } | YearOutcome::GameOver { message, .. } => {
                message.clone()
            }
        };
        if let YearOutcome::GameOver { .. } = outcome {
            info!(game_id = %session.game_id(), age = RETIREMENT_AGE, "game over");
            session.record_outcome(outcome);
            return ActionReport {
                message,
                ledger_error: None,
                reconciled: false,
            };
        }
        session.record_outcome(outcome);
        self.finish(session, message).await
    }

    async fn finish(&self, session: &mut SessionContext, message: Option<String>) -> ActionReport {
        let ledger_error = match self.refresh(session).await {
            Ok(_) => None,
            Err(e) => {
                warn!(game_id = %session.game_id(), error = %e, "balance not updated");
                Some(e)
            }
        };
        ActionReport {
            message,
            reconciled: ledger_error.is_none(),
            ledger_error,
        }
    }
}

fn ensure_running(session: &SessionContext) -> Result<(), ApiError> {
    if session.is_over() {
        return Err(ApiError::InvalidRequest(
            "This game has ended. Start a new one to keep playing.".to_string(),
        ));
    }
    Ok(())
}
