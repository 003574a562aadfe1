//! HTTP surface for the Troth account-lifecycle service.
//!
//! Exposes an axum [`Router`] over any [`AccountStore`], plus the `server`
//! binary. The `/account` routes authenticate with a bearer token and act on
//! the token holder only; the collaborator routes are called by trusted
//! internal subsystems and leave transport auth to the fronting
//! infrastructure.
//!
//! | Method   | Path            | Notes                                    |
//! |----------|-----------------|------------------------------------------|
//! | `GET`    | `/account`      | Person, pairing, owned-record counts     |
//! | `DELETE` | `/account`      | Delete the caller's account (idempotent) |
//! | `POST`   | `/persons`      | Registration handoff                     |
//! | `GET`    | `/persons/{id}` | 404 if not found                         |
//! | `POST`   | `/pairings`     | Mutual-pair handoff                      |

pub mod account;
pub mod auth;
pub mod error;
pub mod pairings;
pub mod persons;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use troth_core::store::AccountStore;

use auth::TokenSigner;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  pub store_path:        PathBuf,
  /// HS256 signing secret for bearer tokens; at least 32 bytes.
  pub token_secret:      String,
  /// Token lifetime in seconds.
  pub token_ttl_seconds: u64,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: AccountStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub tokens: Arc<TokenSigner>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the service.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: AccountStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route(
      "/account",
      get(account::view::<S>).delete(account::delete_own::<S>),
    )
    .route("/persons", post(persons::create::<S>))
    .route("/persons/{id}", get(persons::get_one::<S>))
    .route("/pairings", post(pairings::create::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ───────────────────────────────────────────────────────
