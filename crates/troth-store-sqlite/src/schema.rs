//! SQL schema for the Troth SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

use troth_core::owned::OwnedKind;

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Every table outside the three lifecycle tables (persons, pairings,
/// subscriptions) holds owned records and must carry a rule in the
/// owned-data registry; [`crate::SqliteStore::open`] refuses to start
/// otherwise.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS persons (
    person_id  TEXT PRIMARY KEY,
    auth_ref   TEXT NOT NULL UNIQUE,  -- opaque external-identity reference
    created_at TEXT NOT NULL          -- ISO 8601 UTC; server-assigned
);

-- Billing handles owned by the payment subsystem. Account-lifecycle
-- operations never UPDATE or DELETE this table.
CREATE TABLE IF NOT EXISTS subscriptions (
    subscription_id TEXT PRIMARY KEY,
    external_ref    TEXT NOT NULL,
    started_at      TEXT NOT NULL
);

-- One row per couple. A vacated slot is NULL; a row with both slots NULL is
-- deleted, never stored.
CREATE TABLE IF NOT EXISTS pairings (
    pairing_id      TEXT PRIMARY KEY,
    slot_a          TEXT REFERENCES persons(person_id),
    slot_b          TEXT REFERENCES persons(person_id),
    created_at      TEXT NOT NULL,
    subscription_id TEXT REFERENCES subscriptions(subscription_id),
    CHECK (slot_a IS NOT NULL OR slot_b IS NOT NULL),
    CHECK (slot_a IS NULL OR slot_b IS NULL OR slot_a != slot_b)
);

-- Each person occupies a given slot at most once across all rows. Cross-slot
-- membership is enforced at write time and re-checked before every deletion.
CREATE UNIQUE INDEX IF NOT EXISTS pairings_slot_a_idx
    ON pairings(slot_a) WHERE slot_a IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS pairings_slot_b_idx
    ON pairings(slot_b) WHERE slot_b IS NOT NULL;

-- Owned tables. Owner-scoped tables carry owner_id; couple-scoped tables
-- carry participant_a/participant_b. Payloads are typed JSON (inner data
-- only, discriminant implied by the table).

CREATE TABLE IF NOT EXISTS quests (
    record_id   TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL REFERENCES persons(person_id),
    value_json  TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS step_claims (
    record_id   TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL REFERENCES persons(person_id),
    value_json  TEXT NOT NULL,   -- quest link inside is loose, not a FK
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS matches (
    record_id     TEXT PRIMARY KEY,
    participant_a TEXT NOT NULL REFERENCES persons(person_id),
    participant_b TEXT NOT NULL REFERENCES persons(person_id),
    value_json    TEXT NOT NULL,
    recorded_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS puzzles (
    record_id     TEXT PRIMARY KEY,
    participant_a TEXT NOT NULL REFERENCES persons(person_id),
    participant_b TEXT NOT NULL REFERENCES persons(person_id),
    value_json    TEXT NOT NULL,   -- card state; one puzzle per couple per day
    recorded_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS reward_grants (
    record_id   TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL REFERENCES persons(person_id),
    value_json  TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS answers (
    record_id   TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL REFERENCES persons(person_id),
    value_json  TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS quests_owner_idx        ON quests(owner_id);
CREATE INDEX IF NOT EXISTS step_claims_owner_idx   ON step_claims(owner_id);
CREATE INDEX IF NOT EXISTS matches_a_idx           ON matches(participant_a);
CREATE INDEX IF NOT EXISTS matches_b_idx           ON matches(participant_b);
CREATE INDEX IF NOT EXISTS puzzles_a_idx           ON puzzles(participant_a);
CREATE INDEX IF NOT EXISTS puzzles_b_idx           ON puzzles(participant_b);
CREATE INDEX IF NOT EXISTS reward_grants_owner_idx ON reward_grants(owner_id);
CREATE INDEX IF NOT EXISTS answers_owner_idx       ON answers(owner_id);

PRAGMA user_version = 1;
";

/// The backing table for one owned kind.
pub fn table_for(kind: OwnedKind) -> &'static str {
  match kind {
    OwnedKind::Quest => "quests",
    OwnedKind::StepClaim => "step_claims",
    OwnedKind::Match => "matches",
    OwnedKind::Puzzle => "puzzles",
    OwnedKind::RewardGrant => "reward_grants",
    OwnedKind::Answer => "answers",
  }
}
