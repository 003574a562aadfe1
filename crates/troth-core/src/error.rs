//! Error types for `troth-core`.
//!
//! One taxonomy is shared by every layer so callers can classify a failure
//! (authorization outcome, domain conflict, invariant violation, retryable
//! abort) without knowing which backend produced it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::owned::OwnedKind;

// ─── Deletion stages ─────────────────────────────────────────────────────────

/// The step of the account-deletion transaction that failed.
///
/// Carried by [`Error::DeletionAborted`] for logs and diagnostics; the
/// transaction is rolled back in full regardless of the stage reached.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeletionStage {
  /// Sweeping owned records per the registry rules.
  Purge,
  /// Vacating the person's pairing slot.
  Unpair,
  /// Removing the person row itself.
  Identity,
  /// The final transaction commit.
  Commit,
}

// ─── Error ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Error {
  // ── Authorization ────────────────────────────────────────────────────────
  #[error("missing or invalid credential")]
  Unauthenticated,

  #[error("caller {caller} may not act on account {target}")]
  Forbidden { caller: Uuid, target: Uuid },

  // ── Domain lookups & state machine ───────────────────────────────────────
  #[error("person not found: {0}")]
  PersonNotFound(Uuid),

  #[error("pairing not found: {0}")]
  PairingNotFound(Uuid),

  #[error("auth ref already registered: {0}")]
  DuplicateAuthRef(String),

  #[error("cannot pair a person with themselves")]
  SelfPairing,

  #[error("person {0} is already in a pairing")]
  AlreadyPaired(Uuid),

  #[error("{kind} records are {expected}-scoped")]
  OwnershipMismatch {
    kind:     OwnedKind,
    expected: &'static str,
  },

  // ── Invariant violations ─────────────────────────────────────────────────
  #[error("owned-data registry has no rule for: {missing:?}")]
  RegistryIncomplete { missing: Vec<OwnedKind> },

  /// The registry and the storage schema disagree — a registered kind has no
  /// backing table, or an owned table carries no registry rule. Fatal at
  /// startup.
  #[error("owned-data registry does not match the schema: {detail}")]
  RegistryMismatch { detail: String },

  #[error("person {0} appears in more than one pairing")]
  MultiplePairings(Uuid),

  // ── Deletion ─────────────────────────────────────────────────────────────
  /// A step of the deletion transaction failed. The transaction was rolled
  /// back; no partial state persists and the call is safe to retry.
  #[error("account deletion aborted at the {stage} stage: {source}")]
  DeletionAborted {
    stage:  DeletionStage,
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  // ── Plumbing ─────────────────────────────────────────────────────────────
  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("could not decode stored {what}: {detail}")]
  Decode {
    what:   &'static str,
    detail: String,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Wrap an arbitrary backend error as [`Error::Storage`].
  pub fn storage(
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
  ) -> Self {
    Self::Storage(err.into())
  }

  /// Wrap a failed deletion step as [`Error::DeletionAborted`].
  pub fn aborted(
    stage: DeletionStage,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
  ) -> Self {
    Self::DeletionAborted { stage, source: err.into() }
  }

  /// Whether retrying the same call may succeed without operator action.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::DeletionAborted { .. } | Self::Storage(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
