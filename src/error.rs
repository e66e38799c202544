//! Error types for the spreadsheet and completion backends.

use std::time::Duration;

/// Spreadsheet backend errors.
#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    /// Missing or malformed local configuration (credentials file, base URL).
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Signing or exchanging the service-account assertion failed.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// The backend rejected our credentials (401/403).
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Spreadsheet or range does not exist.
    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("rate limited: retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("sheets API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl SheetsError {
    /// Whether a later attempt could succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SheetsError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

pub type SheetsResult<T> = Result<T, SheetsError>;

/// Text-completion backend errors.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("completion API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Reasons a single answer could not be scored.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("unparseable reply: {reply:?}")]
    Unparseable { reply: String },

    #[error("score {value} outside 0..=3")]
    OutOfRange { value: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(SheetsError::Network {
            message: "reset".into()
        }
        .is_retryable());
        assert!(SheetsError::RateLimited { retry_after: None }.is_retryable());
        assert!(SheetsError::Api {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
    }

    #[test]
    fn permanent_errors_are_not_retryable() {
        assert!(!SheetsError::Unauthorized {
            message: "bad key".into()
        }
        .is_retryable());
        assert!(!SheetsError::Api {
            status: 400,
            message: "bad range".into()
        }
        .is_retryable());
        assert!(!SheetsError::NotFound {
            message: "sheet".into()
        }
        .is_retryable());
    }
}
