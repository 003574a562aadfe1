//! [`SqliteStore`] — the SQLite implementation of [`AccountStore`].

use std::{
  collections::{BTreeMap, BTreeSet},
  path::Path,
};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use troth_core::{
  Error, Result,
  error::DeletionStage,
  owned::{NewOwnedRecord, OwnedKind, OwnedRecord, Ownership},
  pairing::{Pairing, PairingOutcome, Subscription},
  person::Person,
  registry::{OwnedDataRegistry, PurgeAction, PurgeReport},
  store::{AccountStore, DeletionOutcome},
};

use crate::{
  encode::{RawOwned, RawPairing, RawPerson, decode_uuid, encode_dt, encode_uuid},
  schema::{SCHEMA, table_for},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An account store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All writes
/// go through the one connection, so immediate transactions serialise
/// deletion and pairing mutation without any further locking.
#[derive(Clone)]
pub struct SqliteStore {
  conn:     tokio_rusqlite::Connection,
  registry: OwnedDataRegistry,
}

// Manual impl: `tokio_rusqlite::Connection` is not `Debug`.
impl std::fmt::Debug for SqliteStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SqliteStore")
      .field("registry", &self.registry)
      .finish_non_exhaustive()
  }
}

impl SqliteStore {
  /// Open (or create) a store at `path`, run schema initialisation, and
  /// verify `registry` against both the kind enum and the live schema
  /// catalog. Any mismatch refuses to return a store.
  pub async fn open(
    path: impl AsRef<Path>,
    registry: OwnedDataRegistry,
  ) -> Result<Self> {
    registry.validate()?;
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(Error::storage)?;
    let store = Self { conn, registry };
    store.init_schema().await?;
    store.check_catalog().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory(registry: OwnedDataRegistry) -> Result<Self> {
    registry.validate()?;
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(Error::storage)?;
    let store = Self { conn, registry };
    store.init_schema().await?;
    store.check_catalog().await?;
    Ok(store)
  }

  /// Run `f` on the connection thread and flatten both error layers into the
  /// shared taxonomy.
  async fn call<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<Result<T>>
      + Send
      + 'static,
  {
    self.conn.call(f).await.map_err(Error::storage)?
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(Ok(()))
      })
      .await
  }

  /// Cross-check the registry against the schema catalog: every registered
  /// kind needs its backing table with the columns its purge rule uses, and
  /// every table outside the lifecycle set needs a registry rule.
  pub(crate) async fn check_catalog(&self) -> Result<()> {
    let registry = self.registry.clone();
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT name FROM sqlite_schema
           WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let tables: BTreeSet<String> = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<_>>()?;

        let mut problems: Vec<String> = Vec::new();
        let mut registered: BTreeSet<&'static str> = BTreeSet::new();

        for (kind, action) in registry.rules() {
          let table = table_for(kind);
          registered.insert(table);

          if !tables.contains(table) {
            problems.push(format!("kind {kind} has no backing table '{table}'"));
            continue;
          }

          let mut cols =
            conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
          let columns: BTreeSet<String> = cols
            .query_map(rusqlite::params![table], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

          let required: &[&str] = match action {
            PurgeAction::DeleteWhereOwner => &["owner_id"],
            PurgeAction::DeleteWhereParticipant => {
              &["participant_a", "participant_b"]
            }
          };
          for col in required {
            if !columns.contains(*col) {
              problems.push(format!(
                "table '{table}' lacks column '{col}' required by its purge rule"
              ));
            }
          }
        }

        for table in &tables {
          let lifecycle =
            matches!(table.as_str(), "persons" | "pairings" | "subscriptions");
          if !lifecycle && !registered.contains(table.as_str()) {
            problems
              .push(format!("table '{table}' is not covered by any registry rule"));
          }
        }

        if problems.is_empty() {
          Ok(Ok(()))
        } else {
          Ok(Err(Error::RegistryMismatch { detail: problems.join("; ") }))
        }
      })
      .await
  }
}

// ─── AccountStore impl ───────────────────────────────────────────────────────

impl AccountStore for SqliteStore {
  // ── Persons ───────────────────────────────────────────────────────────────

  async fn add_person(&self, auth_ref: String) -> Result<Person> {
    let person = Person {
      person_id: Uuid::new_v4(),
      auth_ref,
      created_at: Utc::now(),
    };

    let id_str       = encode_uuid(person.person_id);
    let at_str       = encode_dt(person.created_at);
    let auth_ref_arg = person.auth_ref.clone();

    self
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO persons (person_id, auth_ref, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, auth_ref_arg, at_str],
        );
        match res {
          Ok(_) => Ok(Ok(())),
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
          {
            Ok(Err(Error::DuplicateAuthRef(auth_ref_arg)))
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    Ok(person)
  }

  async fn get_person(&self, id: Uuid) -> Result<Option<Person>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawPerson> = self
      .call(move |conn| {
        Ok(Ok(
          conn
            .query_row(
              "SELECT person_id, auth_ref, created_at FROM persons WHERE person_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawPerson {
                  person_id:  row.get(0)?,
                  auth_ref:   row.get(1)?,
                  created_at: row.get(2)?,
                })
              },
            )
            .optional()?,
        ))
      })
      .await?;

    raw.map(RawPerson::into_person).transpose()
  }

  // ── Pairings ──────────────────────────────────────────────────────────────

  async fn create_pairing(&self, a: Uuid, b: Uuid) -> Result<Pairing> {
    if a == b {
      return Err(Error::SelfPairing);
    }

    let pairing = Pairing {
      pairing_id:      Uuid::new_v4(),
      slot_a:          Some(a),
      slot_b:          Some(b),
      created_at:      Utc::now(),
      subscription_id: None,
    };

    let id_str = encode_uuid(pairing.pairing_id);
    let a_str  = encode_uuid(a);
    let b_str  = encode_uuid(b);
    let at_str = encode_dt(pairing.created_at);

    self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Membership checks cover both slots, which the partial unique
        // indexes alone cannot.
        for (person, person_str) in [(a, &a_str), (b, &b_str)] {
          let exists: bool = tx
            .query_row(
              "SELECT 1 FROM persons WHERE person_id = ?1",
              rusqlite::params![person_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
          if !exists {
            return Ok(Err(Error::PersonNotFound(person)));
          }

          let paired: bool = tx
            .query_row(
              "SELECT 1 FROM pairings WHERE slot_a = ?1 OR slot_b = ?1",
              rusqlite::params![person_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
          if paired {
            return Ok(Err(Error::AlreadyPaired(person)));
          }
        }

        tx.execute(
          "INSERT INTO pairings (pairing_id, slot_a, slot_b, created_at, subscription_id)
           VALUES (?1, ?2, ?3, ?4, NULL)",
          rusqlite::params![id_str, a_str, b_str, at_str],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    Ok(pairing)
  }

  async fn pairing_for(&self, person: Uuid) -> Result<Option<Pairing>> {
    let person_str = encode_uuid(person);

    let raws: Vec<RawPairing> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT pairing_id, slot_a, slot_b, created_at, subscription_id
           FROM pairings WHERE slot_a = ?1 OR slot_b = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![person_str], |row| {
            Ok(RawPairing {
              pairing_id:      row.get(0)?,
              slot_a:          row.get(1)?,
              slot_b:          row.get(2)?,
              created_at:      row.get(3)?,
              subscription_id: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Ok(rows))
      })
      .await?;

    match raws.len() {
      0 => Ok(None),
      1 => raws.into_iter().next().map(RawPairing::into_pairing).transpose(),
      _ => Err(Error::MultiplePairings(person)),
    }
  }

  async fn attach_subscription(
    &self,
    pairing_id: Uuid,
    external_ref: String,
  ) -> Result<Subscription> {
    let subscription = Subscription {
      subscription_id: Uuid::new_v4(),
      external_ref,
      started_at: Utc::now(),
    };

    let sub_id_str  = encode_uuid(subscription.subscription_id);
    let pairing_str = encode_uuid(pairing_id);
    let ref_arg     = subscription.external_ref.clone();
    let at_str      = encode_dt(subscription.started_at);

    self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx
          .query_row(
            "SELECT 1 FROM pairings WHERE pairing_id = ?1",
            rusqlite::params![pairing_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(Err(Error::PairingNotFound(pairing_id)));
        }

        tx.execute(
          "INSERT INTO subscriptions (subscription_id, external_ref, started_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![sub_id_str, ref_arg, at_str],
        )?;
        // Re-attaching replaces the reference; earlier subscription rows stay
        // for the payment subsystem to reconcile.
        tx.execute(
          "UPDATE pairings SET subscription_id = ?1 WHERE pairing_id = ?2",
          rusqlite::params![sub_id_str, pairing_str],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    Ok(subscription)
  }

  async fn remove_member(&self, person: Uuid) -> Result<PairingOutcome> {
    let person_str = encode_uuid(person);

    self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = match vacate_slot(&tx, person, &person_str, Error::storage)
        {
          Ok(outcome) => outcome,
          Err(err) => return Ok(Err(err)),
        };
        tx.commit()?;
        Ok(Ok(outcome))
      })
      .await
  }

  // ── Owned records ─────────────────────────────────────────────────────────

  async fn record_owned(&self, input: NewOwnedRecord) -> Result<OwnedRecord> {
    self.registry.check_shape(&input)?;

    let record = OwnedRecord {
      record_id:   Uuid::new_v4(),
      ownership:   input.ownership,
      value:       input.value,
      recorded_at: Utc::now(),
    };

    let table     = table_for(record.value.kind());
    let id_str    = encode_uuid(record.record_id);
    let value_str = record.value.to_json()?.to_string();
    let at_str    = encode_dt(record.recorded_at);

    match record.ownership {
      Ownership::Owner { person } => {
        let owner_str = encode_uuid(person);
        let sql = format!(
          "INSERT INTO {table} (record_id, owner_id, value_json, recorded_at)
           VALUES (?1, ?2, ?3, ?4)"
        );
        self
          .call(move |conn| {
            conn.execute(
              &sql,
              rusqlite::params![id_str, owner_str, value_str, at_str],
            )?;
            Ok(Ok(()))
          })
          .await?;
      }
      Ownership::Participants { a, b } => {
        let a_str = encode_uuid(a);
        let b_str = encode_uuid(b);
        let sql = format!(
          "INSERT INTO {table} (record_id, participant_a, participant_b, value_json, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5)"
        );
        self
          .call(move |conn| {
            conn.execute(
              &sql,
              rusqlite::params![id_str, a_str, b_str, value_str, at_str],
            )?;
            Ok(Ok(()))
          })
          .await?;
      }
    }

    Ok(record)
  }

  async fn owned_for(
    &self,
    person: Uuid,
    kind: OwnedKind,
  ) -> Result<Vec<OwnedRecord>> {
    let action     = self.registry.action_for(kind)?;
    let table      = table_for(kind);
    let person_str = encode_uuid(person);

    // Uniform six-column shape; see RawOwned.
    let sql = match action {
      PurgeAction::DeleteWhereOwner => format!(
        "SELECT record_id, owner_id, NULL, NULL, value_json, recorded_at
         FROM {table} WHERE owner_id = ?1
         ORDER BY recorded_at DESC"
      ),
      PurgeAction::DeleteWhereParticipant => format!(
        "SELECT record_id, NULL, participant_a, participant_b, value_json, recorded_at
         FROM {table} WHERE participant_a = ?1 OR participant_b = ?1
         ORDER BY recorded_at DESC"
      ),
    };

    let raws: Vec<RawOwned> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![person_str], |row| {
            Ok(RawOwned {
              record_id:     row.get(0)?,
              owner:         row.get(1)?,
              participant_a: row.get(2)?,
              participant_b: row.get(3)?,
              value_json:    row.get(4)?,
              recorded_at:   row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Ok(rows))
      })
      .await?;

    raws.into_iter().map(|raw| raw.into_record(kind)).collect()
  }

  async fn owned_counts(&self, person: Uuid) -> Result<BTreeMap<OwnedKind, u64>> {
    let registry   = self.registry.clone();
    let person_str = encode_uuid(person);

    self
      .call(move |conn| {
        let mut counts = BTreeMap::new();
        for (kind, action) in registry.rules() {
          let table = table_for(kind);
          let sql = match action {
            PurgeAction::DeleteWhereOwner => {
              format!("SELECT COUNT(*) FROM {table} WHERE owner_id = ?1")
            }
            PurgeAction::DeleteWhereParticipant => format!(
              "SELECT COUNT(*) FROM {table}
               WHERE participant_a = ?1 OR participant_b = ?1"
            ),
          };
          let n: i64 =
            conn.query_row(&sql, rusqlite::params![person_str], |row| row.get(0))?;
          counts.insert(kind, n as u64);
        }
        Ok(Ok(counts))
      })
      .await
  }

  // ── Deletion ──────────────────────────────────────────────────────────────

  async fn delete_account(&self, person: Uuid) -> Result<DeletionOutcome> {
    let registry = self.registry.clone();
    self
      .call(move |conn| Ok(run_deletion(conn, &registry, person)))
      .await
  }
}

// ─── Transaction bodies ──────────────────────────────────────────────────────

/// The whole deletion as one immediate transaction: purge, unpair, remove
/// identity, commit. Every SQL failure is tagged with the stage it happened
/// in; returning early drops the transaction, which rolls everything back.
fn run_deletion(
  conn: &mut rusqlite::Connection,
  registry: &OwnedDataRegistry,
  person: Uuid,
) -> Result<DeletionOutcome> {
  let person_str = encode_uuid(person);

  let tx = conn
    .transaction_with_behavior(TransactionBehavior::Immediate)
    .map_err(Error::storage)?;

  let exists: bool = tx
    .query_row(
      "SELECT 1 FROM persons WHERE person_id = ?1",
      rusqlite::params![person_str],
      |_| Ok(true),
    )
    .optional()
    .map_err(Error::storage)?
    .unwrap_or(false);

  if !exists {
    // A retry of a completed deletion; nothing to do.
    return Ok(DeletionOutcome::already_deleted(person));
  }

  // Detect pairing corruption before mutating anything.
  let pairing_rows: i64 = tx
    .query_row(
      "SELECT COUNT(*) FROM pairings WHERE slot_a = ?1 OR slot_b = ?1",
      rusqlite::params![person_str],
      |row| row.get(0),
    )
    .map_err(Error::storage)?;
  if pairing_rows > 1 {
    return Err(Error::MultiplePairings(person));
  }

  let purged = purge_owned(&tx, registry, &person_str, |e| {
    Error::aborted(DeletionStage::Purge, e)
  })?;

  let pairing = vacate_slot(&tx, person, &person_str, |e| {
    Error::aborted(DeletionStage::Unpair, e)
  })?;

  tx.execute(
    "DELETE FROM persons WHERE person_id = ?1",
    rusqlite::params![person_str],
  )
  .map_err(|e| Error::aborted(DeletionStage::Identity, e))?;

  tx.commit()
    .map_err(|e| Error::aborted(DeletionStage::Commit, e))?;

  Ok(DeletionOutcome {
    person_id:        person,
    already_deleted:  false,
    pairing_deleted:  pairing.pairing_deleted,
    remaining_member: pairing.remaining_member,
    purged,
  })
}

/// Sweep every owned table per its registry rule, counting removed rows.
/// Kinds with no rows still appear in the report with a zero count.
fn purge_owned(
  tx: &rusqlite::Transaction<'_>,
  registry: &OwnedDataRegistry,
  person_str: &str,
  sql_err: impl Fn(rusqlite::Error) -> Error,
) -> Result<PurgeReport> {
  let mut report = PurgeReport::default();
  for (kind, action) in registry.rules() {
    let table = table_for(kind);
    let sql = match action {
      PurgeAction::DeleteWhereOwner => {
        format!("DELETE FROM {table} WHERE owner_id = ?1")
      }
      PurgeAction::DeleteWhereParticipant => format!(
        "DELETE FROM {table} WHERE participant_a = ?1 OR participant_b = ?1"
      ),
    };
    let removed = tx
      .execute(&sql, rusqlite::params![person_str])
      .map_err(&sql_err)?;
    report.counts.insert(kind, removed as u64);
  }
  Ok(report)
}

/// Vacate `person`'s slot in their at-most-one pairing row. Clears the slot
/// if the partner remains; deletes the row if the person was the last
/// member. The subscription reference is never touched.
fn vacate_slot(
  tx: &rusqlite::Transaction<'_>,
  person: Uuid,
  person_str: &str,
  sql_err: impl Fn(rusqlite::Error) -> Error,
) -> Result<PairingOutcome> {
  let mut stmt = tx
    .prepare(
      "SELECT pairing_id, slot_a, slot_b FROM pairings
       WHERE slot_a = ?1 OR slot_b = ?1",
    )
    .map_err(&sql_err)?;
  let rows: Vec<(String, Option<String>, Option<String>)> = stmt
    .query_map(rusqlite::params![person_str], |row| {
      Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    })
    .map_err(&sql_err)?
    .collect::<rusqlite::Result<_>>()
    .map_err(&sql_err)?;

  match rows.as_slice() {
    [] => Ok(PairingOutcome::not_paired()),
    [(pairing_id, slot_a, slot_b)] => {
      let in_slot_a = slot_a.as_deref() == Some(person_str);
      let partner = if in_slot_a { slot_b } else { slot_a };

      match partner {
        Some(partner_str) => {
          let column = if in_slot_a { "slot_a" } else { "slot_b" };
          tx.execute(
            &format!("UPDATE pairings SET {column} = NULL WHERE pairing_id = ?1"),
            rusqlite::params![pairing_id],
          )
          .map_err(&sql_err)?;
          Ok(PairingOutcome {
            pairing_deleted:  false,
            remaining_member: Some(decode_uuid(partner_str)?),
          })
        }
        None => {
          tx.execute(
            "DELETE FROM pairings WHERE pairing_id = ?1",
            rusqlite::params![pairing_id],
          )
          .map_err(&sql_err)?;
          Ok(PairingOutcome { pairing_deleted: true, remaining_member: None })
        }
      }
    }
    _ => Err(Error::MultiplePairings(person)),
  }
}

// ─── Test support ────────────────────────────────────────────────────────────

#[cfg(test)]
impl SqliteStore {
  /// Run arbitrary SQL — fixture setup and fault injection in tests.
  pub(crate) async fn raw_batch(&self, sql: &str) -> Result<()> {
    let sql = sql.to_owned();
    self
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(Ok(()))
      })
      .await
  }

  pub(crate) async fn count_rows(&self, table: &str) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    self
      .call(move |conn| {
        let n: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(Ok(n as u64))
      })
      .await
  }
}
