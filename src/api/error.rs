//! Errors surfaced by the backend client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{endpoint} timed out")]
    Timeout { endpoint: &'static str },

    #[error("{endpoint} request failed: {source}")]
    Network {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned {status}: {message}")]
    Backend {
        endpoint: &'static str,
        status: u16,
        message: String,
    },

    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Message suitable for showing to the player.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Backend { message, .. } => message.clone(),
            ApiError::Timeout { .. } => "The game server took too long to respond.".to_string(),
            ApiError::InvalidRequest(msg) => msg.clone(),
            other => format!("Could not reach the game server ({other})."),
        }
    }
}

/// Failure to fetch or decode the transaction history.
///
/// Leaves the displayed balance untouched.
#[derive(Debug, Error)]
#[error("ledger fetch failed: {0}")]
pub struct LedgerFetchError(#[from] pub ApiError);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_message_is_shown_verbatim() {
        let err = ApiError::Backend {
            endpoint: "/decision/mcq",
            status: 404,
            message: "Game session not found.".to_string(),
        };
        assert_eq!(err.user_message(), "Game session not found.");
        assert_eq!(
            err.to_string(),
            "/decision/mcq returned 404: Game session not found."
        );
    }

    #[test]
    fn ledger_fetch_error_wraps_api_error() {
        let err = LedgerFetchError::from(ApiError::Timeout {
            endpoint: "/game/history",
        });
        assert_eq!(err.to_string(), "ledger fetch failed: /game/history timed out");
    }
}
