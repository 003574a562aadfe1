//! Pairing — the two-slot couple record and its membership helpers.
//!
//! A pairing either exists or it does not; a row with one vacant slot is
//! ordinary data ("half-paired" is a description, not a state). A row with
//! both slots vacant is deleted rather than stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Pairing ─────────────────────────────────────────────────────────────────

/// The couple record: two member slots plus an optional billing reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pairing {
  pub pairing_id:      Uuid,
  pub slot_a:          Option<Uuid>,
  pub slot_b:          Option<Uuid>,
  pub created_at:      DateTime<Utc>,
  /// Billing handle owned by the payment subsystem; account-lifecycle
  /// operations never clear or delete it.
  pub subscription_id: Option<Uuid>,
}

impl Pairing {
  /// Whether `person` currently occupies either slot.
  pub fn contains(&self, person: Uuid) -> bool {
    self.slot_a == Some(person) || self.slot_b == Some(person)
  }

  /// The other member's id, if `person` is a member and the other slot is
  /// occupied.
  pub fn partner_of(&self, person: Uuid) -> Option<Uuid> {
    if self.slot_a == Some(person) {
      self.slot_b
    } else if self.slot_b == Some(person) {
      self.slot_a
    } else {
      None
    }
  }

  /// Occupied member ids, in slot order.
  pub fn members(&self) -> impl Iterator<Item = Uuid> {
    self.slot_a.into_iter().chain(self.slot_b)
  }
}

// ─── Membership change ───────────────────────────────────────────────────────

/// What vacating one member's slot did to the pairing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingOutcome {
  /// `true` if the member had no partner left and the row was deleted.
  pub pairing_deleted:  bool,
  /// The partner left behind in a half-vacated row, if any. Surfaced so
  /// callers can notify them.
  pub remaining_member: Option<Uuid>,
}

impl PairingOutcome {
  /// Outcome for a person who was not in any pairing.
  pub fn not_paired() -> Self {
    Self { pairing_deleted: false, remaining_member: None }
  }
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// Billing record referenced by a pairing.
///
/// Owned by the payment subsystem; stored here only so the reference
/// survives membership changes. Proration and transfer on vacancy are that
/// subsystem's decisions, driven by the [`PairingOutcome`] it is handed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
  pub subscription_id: Uuid,
  pub external_ref:    String,
  pub started_at:      DateTime<Utc>,
}
