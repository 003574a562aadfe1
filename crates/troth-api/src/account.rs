//! Handlers for `/account` — the caller's own account.
//!
//! Both routes authenticate with a bearer token and act only on the person
//! the token was minted for; no person id is ever accepted from the client.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/account` | Person, current pairing, owned-record counts |
//! | `DELETE` | `/account` | Delete the caller's account; idempotent |

use std::{collections::BTreeMap, sync::Arc};

use axum::{
  Json, extract::State, http::HeaderMap, response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;
use troth_core::{
  Error as CoreError, orchestrator::DeletionOrchestrator, owned::OwnedKind,
  pairing::Pairing, person::Person, store::AccountStore,
};

use crate::{
  AppState,
  auth::{Caller, bearer_token},
  error::ApiError,
};

// ─── View ────────────────────────────────────────────────────────────────────

/// What `GET /account` returns: the identity row, the current pairing, and
/// per-kind owned-record counts (every registered kind, zeroes included).
#[derive(Debug, Serialize)]
pub struct AccountView {
  pub person:  Person,
  pub pairing: Option<Pairing>,
  pub owned:   BTreeMap<OwnedKind, u64>,
}

/// `GET /account`
pub async fn view<S>(
  State(state): State<AppState<S>>,
  Caller(person_id): Caller,
) -> Result<Json<AccountView>, ApiError>
where
  S: AccountStore + Clone + Send + Sync + 'static,
{
  let person = state
    .store
    .get_person(person_id)
    .await?
    .ok_or(CoreError::PersonNotFound(person_id))?;
  let pairing = state.store.pairing_for(person_id).await?;
  let owned = state.store.owned_counts(person_id).await?;
  Ok(Json(AccountView { person, pairing, owned }))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /account` — delete the caller's own account.
///
/// The raw token goes to the orchestrator, which authorizes and then runs
/// the atomic purge/unpair/remove transaction. Repeats after success return
/// `200` again: the token still verifies (it is stateless) and an
/// already-deleted account is reported as success, so clients can blindly
/// retry.
pub async fn delete_own<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
  S: AccountStore + Clone + Send + Sync + 'static,
{
  let token = bearer_token(&headers)?;
  let orchestrator = DeletionOrchestrator::new(
    Arc::clone(&state.store),
    Arc::clone(&state.tokens),
  );
  let outcome = orchestrator.execute_self(token).await?;
  Ok(Json(json!({
    "deleted":          true,
    "partner_unpaired": outcome.remaining_member.is_some(),
  })))
}
