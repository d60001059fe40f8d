//! Backend HTTP client

pub mod client;
pub mod error;

pub use client::GameApiClient;
pub use error::{ApiError, LedgerFetchError};
