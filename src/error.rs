// src/error.rs

use std::fmt;

use crate::protocol::Response;

const INVALID_REQUEST_DATA: &str = "Invalid request data";

/// Global Application Error Enum.
/// Every command handler returns this; the router turns it into an `ERROR` envelope.
#[derive(Debug)]
pub enum AppError {
    /// No identity on the session.
    Unauthenticated,

    /// Identity present, role not allowed.
    Unauthorized,

    /// Payload missing fields or failing validation.
    BadRequest(String),

    NotFound(String),

    /// Uniqueness violations, exhausted attempts, already-graded attempts.
    Conflict(String),

    /// A storage call failed. `action` reaches the client as "Failed to {action}";
    /// `cause` is only logged.
    Persistence { action: &'static str, cause: String },

    Internal(String),
}

impl AppError {
    /// `map_err` adapter for storage calls.
    pub fn persistence(action: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
        move |e| AppError::Persistence {
            action,
            cause: e.to_string(),
        }
    }

    /// Client-facing message. Never includes internal causes.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Unauthenticated => "Not authenticated".to_string(),
            AppError::Unauthorized => "Unauthorized".to_string(),
            AppError::BadRequest(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => {
                msg.clone()
            }
            AppError::Persistence { action, .. } => format!("Failed to {}", action),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Converts the error into an `ERROR` envelope, logging server-side causes.
    pub fn into_response(self) -> Response {
        match &self {
            AppError::Persistence { action, cause } => {
                tracing::error!("Persistence error while trying to {}: {}", action, cause);
            }
            AppError::Internal(cause) => {
                tracing::error!("Internal error: {}", cause);
            }
            _ => {}
        }
        Response::error(self.client_message())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Persistence { action, cause } => {
                write!(f, "failed to {}: {}", action, cause)
            }
            AppError::Internal(cause) => write!(f, "internal error: {}", cause),
            other => f.write_str(&other.client_message()),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts `sqlx::Error` into a generic persistence failure.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Persistence {
            action: "process request",
            cause: err.to_string(),
        }
    }
}

/// Payload shape errors. The serde detail is logged, the client gets a fixed message.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::debug!("Rejected request data: {}", err);
        AppError::BadRequest(INVALID_REQUEST_DATA.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
