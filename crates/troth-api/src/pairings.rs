//! Handlers for `/pairings` — the mutual-pair handoff.
//!
//! Called once both partners have accepted an invite. Subscription
//! attachment stays with the billing subsystem, which talks to the store
//! directly.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/pairings` | Body: `{"a":"<uuid>","b":"<uuid>"}` |

use axum::{
  Json, extract::State, http::StatusCode, response::IntoResponse,
};
use serde::Deserialize;
use troth_core::store::AccountStore;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub a: Uuid,
  pub b: Uuid,
}

/// `POST /pairings` — body: `{"a":"<uuid>","b":"<uuid>"}`
///
/// Both persons must exist and be unpaired; 409 otherwise.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AccountStore + Clone + Send + Sync + 'static,
{
  let pairing = state.store.create_pairing(body.a, body.b).await?;
  Ok((StatusCode::CREATED, Json(pairing)))
}
