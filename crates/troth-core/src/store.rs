//! The `AccountStore` trait and the deletion outcome type.
//!
//! The trait is implemented by storage backends (e.g. `troth-store-sqlite`).
//! Higher layers (`troth-api`, the orchestrator) depend on this abstraction,
//! not on any concrete backend.

use std::{collections::BTreeMap, future::Future};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  error::Result,
  owned::{NewOwnedRecord, OwnedKind, OwnedRecord},
  pairing::{Pairing, PairingOutcome, Subscription},
  person::Person,
  registry::PurgeReport,
};

// ─── Deletion outcome ────────────────────────────────────────────────────────

/// The result of a completed [`AccountStore::delete_account`] transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionOutcome {
  pub person_id:        Uuid,
  /// `true` when the person was already gone and the call was a retried
  /// no-op — reported as success, never as an error.
  pub already_deleted:  bool,
  /// `true` when the person was the last member and the pairing row was
  /// deleted.
  pub pairing_deleted:  bool,
  /// The partner left in a half-vacated pairing, if any.
  pub remaining_member: Option<Uuid>,
  pub purged:           PurgeReport,
}

impl DeletionOutcome {
  /// The outcome reported for a retry against an already-deleted account.
  pub fn already_deleted(person_id: Uuid) -> Self {
    Self {
      person_id,
      already_deleted: true,
      pairing_deleted: false,
      remaining_member: None,
      purged: PurgeReport::default(),
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an account-lifecycle storage backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`). Methods return
/// the shared [`Error`](crate::Error) taxonomy directly so callers can
/// classify failures (retryable abort vs invariant violation vs domain
/// conflict) without knowing the backend.
pub trait AccountStore: Send + Sync {
  // ── Persons ───────────────────────────────────────────────────────────

  /// Register a person. Fails with [`Error::DuplicateAuthRef`] if
  /// `auth_ref` is already taken.
  ///
  /// [`Error::DuplicateAuthRef`]: crate::Error::DuplicateAuthRef
  fn add_person(
    &self,
    auth_ref: String,
  ) -> impl Future<Output = Result<Person>> + Send + '_;

  /// Retrieve a person by id. Returns `None` if absent, including after
  /// deletion.
  fn get_person(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Person>>> + Send + '_;

  // ── Pairings ──────────────────────────────────────────────────────────

  /// Pair two distinct, currently-unpaired persons.
  ///
  /// Fails with [`Error::SelfPairing`], [`Error::PersonNotFound`], or
  /// [`Error::AlreadyPaired`].
  ///
  /// [`Error::SelfPairing`]: crate::Error::SelfPairing
  /// [`Error::PersonNotFound`]: crate::Error::PersonNotFound
  /// [`Error::AlreadyPaired`]: crate::Error::AlreadyPaired
  fn create_pairing(
    &self,
    a: Uuid,
    b: Uuid,
  ) -> impl Future<Output = Result<Pairing>> + Send + '_;

  /// The at-most-one pairing containing `person`. More than one row is the
  /// corruption case [`Error::MultiplePairings`].
  ///
  /// [`Error::MultiplePairings`]: crate::Error::MultiplePairings
  fn pairing_for(
    &self,
    person: Uuid,
  ) -> impl Future<Output = Result<Option<Pairing>>> + Send + '_;

  /// Attach a billing reference to an existing pairing.
  fn attach_subscription(
    &self,
    pairing_id: Uuid,
    external_ref: String,
  ) -> impl Future<Output = Result<Subscription>> + Send + '_;

  /// Vacate `person`'s slot; delete the row if they were the last member.
  /// The subscription reference is left untouched either way. A person in
  /// no pairing yields [`PairingOutcome::not_paired`].
  fn remove_member(
    &self,
    person: Uuid,
  ) -> impl Future<Output = Result<PairingOutcome>> + Send + '_;

  // ── Owned records ─────────────────────────────────────────────────────

  /// Persist an owned record. The ownership shape is checked against the
  /// registry before any write.
  fn record_owned(
    &self,
    input: NewOwnedRecord,
  ) -> impl Future<Output = Result<OwnedRecord>> + Send + '_;

  /// All records of `kind` involving `person`, newest first.
  fn owned_for(
    &self,
    person: Uuid,
    kind: OwnedKind,
  ) -> impl Future<Output = Result<Vec<OwnedRecord>>> + Send + '_;

  /// Per-kind counts of records involving `person` — the audit view. Every
  /// registered kind appears, zero counts included.
  fn owned_counts(
    &self,
    person: Uuid,
  ) -> impl Future<Output = Result<BTreeMap<OwnedKind, u64>>> + Send + '_;

  // ── Deletion ──────────────────────────────────────────────────────────

  /// Remove every trace of `person` in one atomic transaction: purge owned
  /// records per the registry, vacate the pairing slot, remove the person
  /// row. Any step failure rolls the whole transaction back and surfaces
  /// [`Error::DeletionAborted`]; no partial state ever persists.
  ///
  /// Deleting an already-absent person succeeds with
  /// [`DeletionOutcome::already_deleted`] set.
  ///
  /// [`Error::DeletionAborted`]: crate::Error::DeletionAborted
  fn delete_account(
    &self,
    person: Uuid,
  ) -> impl Future<Output = Result<DeletionOutcome>> + Send + '_;
}
