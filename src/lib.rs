//! LifeSim Client Library
//!
//! Typed client for the life-simulation game backend, plus the reconciler
//! that derives the displayed balance from the account's transaction ledger
//! instead of trusting the balance embedded in player-state payloads.

pub mod api;
pub mod choice;
pub mod config;
pub mod controller;
pub mod ledger;
pub mod models;
pub mod reconciler;
pub mod render;
pub mod session;

pub use api::{ApiError, GameApiClient, LedgerFetchError};
pub use config::ClientConfig;
pub use controller::{ActionReport, GameController};
pub use ledger::{compute_balance, Balance, Ledger, TransactionKind, TransactionRecord};
pub use reconciler::{BalanceSink, LedgerSource, Reconciler, RefreshOutcome};
pub use session::SessionContext;
