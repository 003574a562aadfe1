//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Owned-record payloads are
//! stored as compact JSON (inner data only; the kind is implied by the
//! table). UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use troth_core::{
  Error, Result,
  owned::{OwnedKind, OwnedRecord, OwnedValue, Ownership},
  pairing::Pairing,
  person::Person,
};
use uuid::Uuid;

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Uuid::parse_str(s)
    .map_err(|e| Error::Decode { what: "uuid", detail: e.to_string() })
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode { what: "timestamp", detail: e.to_string() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `persons` row.
pub struct RawPerson {
  pub person_id:  String,
  pub auth_ref:   String,
  pub created_at: String,
}

impl RawPerson {
  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      person_id:  decode_uuid(&self.person_id)?,
      auth_ref:   self.auth_ref,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `pairings` row.
pub struct RawPairing {
  pub pairing_id:      String,
  pub slot_a:          Option<String>,
  pub slot_b:          Option<String>,
  pub created_at:      String,
  pub subscription_id: Option<String>,
}

impl RawPairing {
  pub fn into_pairing(self) -> Result<Pairing> {
    Ok(Pairing {
      pairing_id:      decode_uuid(&self.pairing_id)?,
      slot_a:          self.slot_a.as_deref().map(decode_uuid).transpose()?,
      slot_b:          self.slot_b.as_deref().map(decode_uuid).transpose()?,
      created_at:      decode_dt(&self.created_at)?,
      subscription_id: self
        .subscription_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
    })
  }
}

/// Raw strings read from an owned table, in the uniform six-column shape
/// (owner tables select NULL participants and vice versa).
pub struct RawOwned {
  pub record_id:     String,
  pub owner:         Option<String>,
  pub participant_a: Option<String>,
  pub participant_b: Option<String>,
  pub value_json:    String,
  pub recorded_at:   String,
}

impl RawOwned {
  pub fn into_record(self, kind: OwnedKind) -> Result<OwnedRecord> {
    let ownership = match (self.owner, self.participant_a, self.participant_b)
    {
      (Some(owner), None, None) => {
        Ownership::Owner { person: decode_uuid(&owner)? }
      }
      (None, Some(a), Some(b)) => Ownership::Participants {
        a: decode_uuid(&a)?,
        b: decode_uuid(&b)?,
      },
      _ => {
        return Err(Error::Decode {
          what:   "owned record",
          detail: "ownership columns match no known shape".into(),
        });
      }
    };

    let data: serde_json::Value = serde_json::from_str(&self.value_json)?;
    let value = OwnedValue::from_parts(kind, data)?;

    Ok(OwnedRecord {
      record_id: decode_uuid(&self.record_id)?,
      ownership,
      value,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
