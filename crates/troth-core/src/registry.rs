//! The owned-data registry — the single authority on what account deletion
//! must sweep.
//!
//! Purge rules are declared in one table, built once at startup and never
//! mutated afterwards. Completeness is validated before the process serves
//! traffic, and storage backends re-check the registry against their live
//! schema, so an owned table can never exist without a purge rule.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{
  error::{Error, Result},
  owned::{NewOwnedRecord, OwnedKind, Ownership},
};

// ─── Purge action ────────────────────────────────────────────────────────────

/// How rows of one owned kind are removed when a person is purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeAction {
  /// Delete rows whose single owner is the person.
  DeleteWhereOwner,
  /// Delete rows where the person fills either participant column.
  DeleteWhereParticipant,
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// The `kind → action` table consulted by every purge.
#[derive(Debug, Clone)]
pub struct OwnedDataRegistry {
  rules: BTreeMap<OwnedKind, PurgeAction>,
}

impl OwnedDataRegistry {
  /// Build a registry from explicit rules.
  /// Call [`validate`](Self::validate) before use.
  pub fn new(
    rules: impl IntoIterator<Item = (OwnedKind, PurgeAction)>,
  ) -> Self {
    Self { rules: rules.into_iter().collect() }
  }

  /// The production rule set, covering every [`OwnedKind`].
  pub fn standard() -> Self {
    use OwnedKind::*;
    use PurgeAction::*;
    Self::new([
      (Quest, DeleteWhereOwner),
      (StepClaim, DeleteWhereOwner),
      (Match, DeleteWhereParticipant),
      (Puzzle, DeleteWhereParticipant),
      (RewardGrant, DeleteWhereOwner),
      (Answer, DeleteWhereOwner),
    ])
  }

  /// Fail unless every owned kind has a rule. A deployment with an unmapped
  /// kind must not come up.
  pub fn validate(&self) -> Result<()> {
    let missing: Vec<OwnedKind> = OwnedKind::iter()
      .filter(|kind| !self.rules.contains_key(kind))
      .collect();
    if missing.is_empty() {
      Ok(())
    } else {
      Err(Error::RegistryIncomplete { missing })
    }
  }

  /// The purge action for one kind.
  pub fn action_for(&self, kind: OwnedKind) -> Result<PurgeAction> {
    self
      .rules
      .get(&kind)
      .copied()
      .ok_or(Error::RegistryIncomplete { missing: vec![kind] })
  }

  /// All rules in kind order.
  pub fn rules(&self) -> impl Iterator<Item = (OwnedKind, PurgeAction)> + '_ {
    self.rules.iter().map(|(kind, action)| (*kind, *action))
  }

  /// Reject a record whose ownership shape disagrees with the purge rule for
  /// its kind (e.g. a couple-scoped payload recorded with a single owner).
  pub fn check_shape(&self, record: &NewOwnedRecord) -> Result<()> {
    let kind = record.value.kind();
    match (self.action_for(kind)?, &record.ownership) {
      (PurgeAction::DeleteWhereOwner, Ownership::Owner { .. }) => Ok(()),
      (PurgeAction::DeleteWhereParticipant, Ownership::Participants { .. }) => {
        Ok(())
      }
      (PurgeAction::DeleteWhereOwner, _) => {
        Err(Error::OwnershipMismatch { kind, expected: "owner" })
      }
      (PurgeAction::DeleteWhereParticipant, _) => {
        Err(Error::OwnershipMismatch { kind, expected: "participant" })
      }
    }
  }
}

// ─── Purge report ────────────────────────────────────────────────────────────

/// Rows removed per owned kind by one purge sweep.
///
/// Zero counts are included so audit logs always show the full registry
/// coverage, not just the kinds that happened to have rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
  pub counts: BTreeMap<OwnedKind, u64>,
}

impl PurgeReport {
  pub fn total(&self) -> u64 { self.counts.values().sum() }

  pub fn count(&self, kind: OwnedKind) -> u64 {
    self.counts.get(&kind).copied().unwrap_or(0)
  }
}
