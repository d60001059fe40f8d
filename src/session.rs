//! Explicit per-game session context.
//!
//! Owned by the UI layer and passed to each operation; nothing here is global.

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::choice::Choice;
use crate::ledger::{Balance, Ledger};
use crate::models::{FinalSummary, GameId, PlayerState, Scenario, StartGameResponse, YearOutcome};
use crate::reconciler::Reconciler;

#[derive(Debug)]
pub struct SessionContext {
    game_id: GameId,
    player: PlayerState,
    scenario: Option<Scenario>,
    ledger: Ledger,
    reconciler: Arc<Reconciler>,
    summary: Option<FinalSummary>,
}

impl SessionContext {
    pub fn new(game_id: GameId, player: PlayerState, starting_balance: Decimal) -> Self {
        Self {
            game_id,
            player,
            scenario: None,
            ledger: Ledger::default(),
            reconciler: Arc::new(Reconciler::new(starting_balance)),
            summary: None,
        }
    }

    pub fn from_start(start: StartGameResponse, starting_balance: Decimal) -> Self {
        Self::new(start.game_id, start.player_state, starting_balance)
    }

    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn set_player(&mut self, player: PlayerState) {
        self.player = player;
    }

    pub fn scenario(&self) -> Option<&Scenario> {
        self.scenario.as_ref()
    }

    /// Choice `number` (1-based, as shown to the player) of the pending scenario.
    pub fn choice(&self, number: usize) -> Option<&Choice> {
        let index = number.checked_sub(1)?;
        self.scenario.as_ref()?.choices.get(index)
    }

    /// Drop the pending scenario once a choice has been accepted.
    pub fn clear_scenario(&mut self) {
        self.scenario = None;
    }

    pub fn reconciler(&self) -> Arc<Reconciler> {
        Arc::clone(&self.reconciler)
    }

    /// Balance currently on display, derived from the ledger.
    pub fn balance(&self) -> Option<Balance> {
        self.reconciler.displayed_balance()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn set_ledger(&mut self, ledger: Ledger) {
        self.ledger = ledger;
    }

    pub fn is_over(&self) -> bool {
        self.summary.is_some()
    }

    pub fn summary(&self) -> Option<&FinalSummary> {
        self.summary.as_ref()
    }

    /// Fold an advance-year or fast-forward result into the session.
    pub fn record_outcome(&mut self, outcome: YearOutcome) {
        match outcome {
            YearOutcome::NextEvent {
                player_state,
                scenario,
                ..
            } => {
                self.player = player_state;
                self.scenario = Some(scenario);
            }
            YearOutcome::GameOver {
                player_state,
                summary,
                ..
            } => {
                if let Some(p) = player_state {
                    self.player = p;
                }
                self.scenario = None;
                self.summary = Some(summary);
            }
        }
    }
}
