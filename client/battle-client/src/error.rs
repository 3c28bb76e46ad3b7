//! Error types shared across the battle client.

use serde::Serialize;
use thiserror::Error;

/// Failure kinds the presentation layer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    Network,
    MalformedResponse,
    NoQuestionsAvailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Network => "network",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::NoQuestionsAvailable => "no_questions_available",
        }
    }
}

/// Errors emitted by a `GameApi` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("credential rejected by backend (HTTP 401)")]
    Unauthorized,
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("request to {endpoint} failed: {reason}")]
    Transport {
        endpoint: &'static str,
        reason: String,
    },
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse {
        endpoint: &'static str,
        reason: String,
    },
    #[error("question bank exhausted")]
    NoQuestionsAvailable,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Unauthorized => ErrorKind::Auth,
            ApiError::Status { .. } | ApiError::Transport { .. } => ErrorKind::Network,
            ApiError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            ApiError::NoQuestionsAvailable => ErrorKind::NoQuestionsAvailable,
        }
    }

    /// Faults worth retrying for idempotent reads.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Network
    }

    pub fn malformed(endpoint: &'static str, reason: impl Into<String>) -> Self {
        ApiError::MalformedResponse {
            endpoint,
            reason: reason.into(),
        }
    }
}

/// Errors emitted by the battle controller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BattleError {
    #[error("no active battle session")]
    NoSession,
    #[error("battle already started")]
    AlreadyStarted,
    #[error("battle is over")]
    Finished,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted while loading or clearing the stored credential.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CredentialError {
    #[error("failed to read token file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors emitted by `Config::load`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),
    #[error("invalid API base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error("{key} must be a non-negative integer, got {value:?}")]
    NotANumber { key: &'static str, value: String },
    #[error("invalid battle settings: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}
