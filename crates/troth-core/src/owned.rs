//! Owned records — the per-person and per-couple activity data that account
//! deletion must sweep.
//!
//! Each record carries a typed payload. The payload's variant name doubles
//! as the `kind` discriminant stored in the database and as the key into the
//! owned-data registry.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Discriminant for every owned-record type known to the system.
///
/// `EnumIter` is what lets registry validation and tests enumerate the full
/// set instead of maintaining a parallel list; adding a variant without a
/// registry rule fails startup.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OwnedKind {
  Quest,
  StepClaim,
  Match,
  Puzzle,
  RewardGrant,
  Answer,
}

// ─── Payload sub-types ───────────────────────────────────────────────────────

/// A daily quest assigned to one person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestValue {
  /// Calendar day the quest was assigned for.
  pub day:    NaiveDate,
  pub prompt: String,
}

/// A claim that one step of a quest was completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepClaimValue {
  /// The quest this claim belongs to. Deliberately a loose reference — the
  /// quest row may already be purged without invalidating the claim.
  pub quest_id: Uuid,
  pub step:     u32,
}

/// One round of a head-to-head game played by both members of a couple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchValue {
  pub day:  NaiveDate,
  /// Free-text game identifier, e.g. "you_or_me".
  pub game: String,
}

/// One day's memory-flip puzzle, shared by the couple. One puzzle per couple
/// per day; the game service enforces that, not this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PuzzleValue {
  pub day:           NaiveDate,
  /// Card faces in board order.
  pub cards:         Vec<String>,
  pub matched_pairs: u32,
  pub total_pairs:   u32,
}

/// Points granted to a person for completed activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardGrantValue {
  pub amount:     i64,
  pub reason:     String,
  /// The activity that earned the grant, when one exists. Loose reference,
  /// same as [`StepClaimValue::quest_id`].
  pub related_id: Option<Uuid>,
}

/// A person's answer to a quiz question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerValue {
  pub question_id: Uuid,
  pub choice:      String,
}

// ─── OwnedValue ──────────────────────────────────────────────────────────────

/// The typed payload of an owned record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum OwnedValue {
  Quest(QuestValue),
  StepClaim(StepClaimValue),
  Match(MatchValue),
  Puzzle(PuzzleValue),
  RewardGrant(RewardGrantValue),
  Answer(AnswerValue),
}

impl OwnedValue {
  /// The discriminant of this payload.
  pub fn kind(&self) -> OwnedKind {
    match self {
      Self::Quest(_) => OwnedKind::Quest,
      Self::StepClaim(_) => OwnedKind::StepClaim,
      Self::Match(_) => OwnedKind::Match,
      Self::Puzzle(_) => OwnedKind::Puzzle,
      Self::RewardGrant(_) => OwnedKind::RewardGrant,
      Self::Answer(_) => OwnedKind::Answer,
    }
  }

  /// Serialise the inner payload (without the kind tag) for the `value_json`
  /// database column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    // The full serialised form is `{"kind": "...", "data": <payload>}`.
    // We want only the payload.
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Deserialise from the kind discriminant and JSON payload stored in the
  /// database.
  pub fn from_parts(kind: OwnedKind, data: serde_json::Value) -> Result<Self> {
    let wrapped = serde_json::json!({ "kind": kind, "data": data });
    Ok(serde_json::from_value(wrapped)?)
  }
}

// ─── Ownership ───────────────────────────────────────────────────────────────

/// Whose deletion sweeps a record away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Ownership {
  /// The record belongs to exactly one person.
  Owner { person: Uuid },
  /// The record belongs to a couple; either member's deletion removes it.
  Participants { a: Uuid, b: Uuid },
}

impl Ownership {
  /// Whether `person` is the owner or one of the participants.
  pub fn involves(&self, person: Uuid) -> bool {
    match *self {
      Self::Owner { person: p } => p == person,
      Self::Participants { a, b } => a == person || b == person,
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A persisted owned record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedRecord {
  pub record_id:   Uuid,
  pub ownership:   Ownership,
  pub value:       OwnedValue,
  /// Server-assigned timestamp; never changes after creation.
  pub recorded_at: DateTime<Utc>,
}

/// Input to [`crate::store::AccountStore::record_owned`].
/// The id and timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewOwnedRecord {
  pub ownership: Ownership,
  pub value:     OwnedValue,
}

impl NewOwnedRecord {
  /// A record scoped to a single owner.
  pub fn owned(person: Uuid, value: OwnedValue) -> Self {
    Self { ownership: Ownership::Owner { person }, value }
  }

  /// A record scoped to both members of a couple.
  pub fn shared(a: Uuid, b: Uuid, value: OwnedValue) -> Self {
    Self { ownership: Ownership::Participants { a, b }, value }
  }
}
