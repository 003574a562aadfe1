//! Handlers for `/persons` — the registration handoff.
//!
//! Called by the authentication subsystem once it has verified a new user's
//! credentials; `auth_ref` is its opaque reference back into that system.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/persons` | Body: `{"auth_ref":"..."}` |
//! | `GET`  | `/persons/{id}` | 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use troth_core::{Error as CoreError, person::Person, store::AccountStore};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub auth_ref: String,
}

/// `POST /persons` — body: `{"auth_ref":"..."}`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AccountStore + Clone + Send + Sync + 'static,
{
  if body.auth_ref.trim().is_empty() {
    return Err(ApiError::BadRequest("auth_ref must not be empty".into()));
  }
  let person = state.store.add_person(body.auth_ref).await?;
  Ok((StatusCode::CREATED, Json(person)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /persons/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Person>, ApiError>
where
  S: AccountStore + Clone + Send + Sync + 'static,
{
  let person = state
    .store
    .get_person(id)
    .await?
    .ok_or(CoreError::PersonNotFound(id))?;
  Ok(Json(person))
}
