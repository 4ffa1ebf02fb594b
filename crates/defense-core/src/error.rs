// Shared error taxonomy for all three services (SPEC_FULL.md §7 / §10.2).
// Each binary's axum handlers map this to a status code at the boundary;
// everything else just propagates with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum DefenseError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("store unavailable: {0}")]
    StoreTransient(String),

    #[error("upstream classifier unavailable: {0}")]
    ClassifierTransient(String),

    #[error("upstream classifier returned an unexpected response: {0}")]
    ClassifierSemantic(String),

    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DefenseError {
    pub fn configuration(err: impl std::fmt::Display) -> Self {
        DefenseError::Configuration(err.to_string())
    }

    pub fn store_transient(err: impl std::fmt::Display) -> Self {
        DefenseError::StoreTransient(err.to_string())
    }

    pub fn classifier_transient(err: impl std::fmt::Display) -> Self {
        DefenseError::ClassifierTransient(err.to_string())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        DefenseError::Internal(err.to_string())
    }
}

/// Propagation policy per SPEC_FULL.md §7: only `InputInvalid` and `Internal`
/// ever surface as non-2xx from an HTTP handler. Everything else is meant to
/// be caught and locally recovered before it reaches a handler boundary; if
/// one of those variants does escape, it still gets a sane status rather
/// than panicking the request.
impl IntoResponse for DefenseError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            DefenseError::InputInvalid(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            DefenseError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            DefenseError::Configuration(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            DefenseError::StoreTransient(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            DefenseError::ClassifierTransient(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            DefenseError::ClassifierSemantic(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type DefenseResult<T> = Result<T, DefenseError>;
