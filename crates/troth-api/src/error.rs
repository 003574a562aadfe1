//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use troth_core::Error as CoreError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Core(#[from] CoreError),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Core(e) => core_status(e),
    };
    if status.is_server_error() {
      error!(status = status.as_u16(), error = %self, "request failed");
    }
    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Bearer"),
      );
    }
    res
  }
}

/// Map the shared taxonomy onto HTTP statuses.
///
/// Invariant violations and backend plumbing collapse into an opaque 500;
/// internal schema details never reach a client. An aborted deletion is the
/// one retryable failure and gets 503 so clients can tell it apart.
fn core_status(e: &CoreError) -> (StatusCode, String) {
  match e {
    CoreError::Unauthenticated => (StatusCode::UNAUTHORIZED, e.to_string()),
    CoreError::Forbidden { .. } => (StatusCode::FORBIDDEN, e.to_string()),
    CoreError::PersonNotFound(_) | CoreError::PairingNotFound(_) => {
      (StatusCode::NOT_FOUND, e.to_string())
    }
    CoreError::DuplicateAuthRef(_)
    | CoreError::SelfPairing
    | CoreError::AlreadyPaired(_) => (StatusCode::CONFLICT, e.to_string()),
    CoreError::OwnershipMismatch { .. } => {
      (StatusCode::BAD_REQUEST, e.to_string())
    }
    CoreError::DeletionAborted { .. } => (
      StatusCode::SERVICE_UNAVAILABLE,
      "account deletion aborted; safe to retry".to_string(),
    ),
    CoreError::RegistryIncomplete { .. }
    | CoreError::RegistryMismatch { .. }
    | CoreError::MultiplePairings(_)
    | CoreError::Storage(_)
    | CoreError::Decode { .. }
    | CoreError::Serialization(_) => {
      (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    }
  }
}
