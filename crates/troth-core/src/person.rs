//! Person — the identity record for one account holder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One registered account holder.
///
/// Credentials live in the external authentication subsystem; `auth_ref` is
/// the opaque reference that links back to it and is unique across persons.
/// The row exists from registration until account deletion removes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
  pub person_id:  Uuid,
  pub auth_ref:   String,
  pub created_at: DateTime<Utc>,
}
