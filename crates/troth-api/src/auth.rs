//! Bearer-token authentication: HS256 signer/verifier and the axum extractor.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use jsonwebtoken::{
  DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use troth_core::{
  Error as CoreError, orchestrator::Authorizer, store::AccountStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Shortest accepted signing secret, in bytes.
const MIN_SECRET_LEN: usize = 32;

/// The configured signing secret is too short to be usable.
#[derive(Debug, Error)]
#[error("token secret must be at least {MIN_SECRET_LEN} bytes")]
pub struct SecretTooShort;

/// Payload carried inside a bearer token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
  /// The person this credential was issued for.
  sub: Uuid,
  iat: u64,
  exp: u64,
}

// ─── Signer ──────────────────────────────────────────────────────────────────

/// Mints and verifies the HS256 bearer tokens the service accepts.
///
/// Verification is purely cryptographic and consults no account data, so a
/// token issued before an account deletion still resolves to the same person
/// id afterwards and a retried deletion lands on the idempotent success path
/// instead of failing authentication.
#[derive(Clone)]
pub struct TokenSigner {
  encoding:    EncodingKey,
  decoding:    DecodingKey,
  ttl_seconds: u64,
}

impl TokenSigner {
  pub fn new(secret: &str, ttl_seconds: u64) -> Result<Self, SecretTooShort> {
    if secret.len() < MIN_SECRET_LEN {
      return Err(SecretTooShort);
    }
    Ok(Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      ttl_seconds,
    })
  }

  /// Mint a token for `person`, expiring after the configured TTL.
  pub fn mint(
    &self,
    person: Uuid,
  ) -> Result<String, jsonwebtoken::errors::Error> {
    let now = jsonwebtoken::get_current_timestamp();
    let claims = Claims {
      sub: person,
      iat: now,
      exp: now + self.ttl_seconds,
    };
    encode(&Header::default(), &claims, &self.encoding)
  }

  /// Resolve a token to the person it was minted for.
  ///
  /// Every defect (bad signature, expired, malformed) collapses into
  /// [`CoreError::Unauthenticated`]; clients get no oracle for probing
  /// tokens.
  pub fn verify(&self, token: &str) -> troth_core::Result<Uuid> {
    decode::<Claims>(token, &self.decoding, &Validation::default())
      .map(|data| data.claims.sub)
      .map_err(|_| CoreError::Unauthenticated)
  }
}

impl Authorizer for TokenSigner {
  fn authorize(&self, token: &str) -> troth_core::Result<Uuid> {
    self.verify(token)
  }
}

// ─── Extraction ──────────────────────────────────────────────────────────────

/// Pull the bearer token out of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> troth_core::Result<&str> {
  headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .ok_or(CoreError::Unauthenticated)
}

/// The authenticated caller. Present in a handler's signature means the
/// request carried a valid bearer token for this person id.
pub struct Caller(pub Uuid);

impl<S> FromRequestParts<AppState<S>> for Caller
where
  S: AccountStore + Clone + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers)?;
    let person = state.tokens.verify(token)?;
    Ok(Caller(person))
  }
}
