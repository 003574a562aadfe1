//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use strum::IntoEnumIterator as _;
use troth_core::{
  Error,
  error::DeletionStage,
  owned::{
    AnswerValue, MatchValue, NewOwnedRecord, OwnedKind, OwnedValue,
    PuzzleValue, QuestValue, RewardGrantValue, StepClaimValue,
  },
  person::Person,
  registry::{OwnedDataRegistry, PurgeAction},
  store::AccountStore,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory(OwnedDataRegistry::standard())
    .await
    .expect("in-memory store")
}

async fn couple(s: &SqliteStore) -> (Person, Person) {
  let a = s.add_person("idp|alice".into()).await.unwrap();
  let b = s.add_person("idp|bee".into()).await.unwrap();
  s.create_pairing(a.person_id, b.person_id).await.unwrap();
  (a, b)
}

fn day() -> NaiveDate { NaiveDate::from_ymd_opt(2025, 6, 1).unwrap() }

fn quest_for(owner: Uuid) -> NewOwnedRecord {
  NewOwnedRecord::owned(
    owner,
    OwnedValue::Quest(QuestValue {
      day:    day(),
      prompt: "cook their favourite dinner".into(),
    }),
  )
}

fn claim_for(owner: Uuid) -> NewOwnedRecord {
  NewOwnedRecord::owned(
    owner,
    OwnedValue::StepClaim(StepClaimValue {
      quest_id: Uuid::new_v4(),
      step:     1,
    }),
  )
}

fn match_between(a: Uuid, b: Uuid) -> NewOwnedRecord {
  NewOwnedRecord::shared(
    a,
    b,
    OwnedValue::Match(MatchValue { day: day(), game: "you_or_me".into() }),
  )
}

fn puzzle_between(a: Uuid, b: Uuid) -> NewOwnedRecord {
  NewOwnedRecord::shared(
    a,
    b,
    OwnedValue::Puzzle(PuzzleValue {
      day:           day(),
      cards:         ["sun", "moon", "sun", "moon"].map(String::from).to_vec(),
      matched_pairs: 2,
      total_pairs:   2,
    }),
  )
}

fn grant_for(owner: Uuid) -> NewOwnedRecord {
  NewOwnedRecord::owned(
    owner,
    OwnedValue::RewardGrant(RewardGrantValue {
      amount:     10,
      reason:     "quest_completed".into(),
      related_id: Some(Uuid::new_v4()),
    }),
  )
}

fn answer_for(owner: Uuid) -> NewOwnedRecord {
  NewOwnedRecord::owned(
    owner,
    OwnedValue::Answer(AnswerValue {
      question_id: Uuid::new_v4(),
      choice:      "me".into(),
    }),
  )
}

/// One record of `kind` involving `owner` (and `partner` for couple-scoped
/// kinds). Exhaustive on purpose: a new kind breaks this match and forces
/// the deletion tests to cover it.
fn record_for(kind: OwnedKind, owner: Uuid, partner: Uuid) -> NewOwnedRecord {
  match kind {
    OwnedKind::Quest => quest_for(owner),
    OwnedKind::StepClaim => claim_for(owner),
    OwnedKind::Match => match_between(owner, partner),
    OwnedKind::Puzzle => puzzle_between(owner, partner),
    OwnedKind::RewardGrant => grant_for(owner),
    OwnedKind::Answer => answer_for(owner),
  }
}

const ALL_TABLES: &[&str] = &[
  "persons",
  "pairings",
  "subscriptions",
  "quests",
  "step_claims",
  "matches",
  "puzzles",
  "reward_grants",
  "answers",
];

async fn table_counts(s: &SqliteStore) -> Vec<(&'static str, u64)> {
  let mut counts = Vec::new();
  for table in ALL_TABLES {
    counts.push((*table, s.count_rows(table).await.unwrap()));
  }
  counts
}

// ─── Persons ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_person() {
  let s = store().await;

  let person = s.add_person("idp|alice".into()).await.unwrap();
  assert_eq!(person.auth_ref, "idp|alice");

  let fetched = s.get_person(person.person_id).await.unwrap().unwrap();
  assert_eq!(fetched.person_id, person.person_id);
  assert_eq!(fetched.auth_ref, "idp|alice");
}

#[tokio::test]
async fn get_person_missing_returns_none() {
  let s = store().await;
  let result = s.get_person(Uuid::new_v4()).await.unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn duplicate_auth_ref_rejected() {
  let s = store().await;
  s.add_person("idp|alice".into()).await.unwrap();

  let err = s.add_person("idp|alice".into()).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateAuthRef(_)));
}

// ─── Pairings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_pairing_links_both_members() {
  let s = store().await;
  let (a, b) = couple(&s).await;

  let from_a = s.pairing_for(a.person_id).await.unwrap().unwrap();
  let from_b = s.pairing_for(b.person_id).await.unwrap().unwrap();
  assert_eq!(from_a.pairing_id, from_b.pairing_id);
  assert_eq!(from_a.partner_of(a.person_id), Some(b.person_id));
  assert_eq!(from_a.partner_of(b.person_id), Some(a.person_id));
}

#[tokio::test]
async fn self_pairing_rejected() {
  let s = store().await;
  let a = s.add_person("idp|alice".into()).await.unwrap();

  let err = s.create_pairing(a.person_id, a.person_id).await.unwrap_err();
  assert!(matches!(err, Error::SelfPairing));
}

#[tokio::test]
async fn pairing_unknown_person_rejected() {
  let s = store().await;
  let a = s.add_person("idp|alice".into()).await.unwrap();
  let ghost = Uuid::new_v4();

  let err = s.create_pairing(a.person_id, ghost).await.unwrap_err();
  assert!(matches!(err, Error::PersonNotFound(id) if id == ghost));
}

#[tokio::test]
async fn already_paired_rejected() {
  let s = store().await;
  let (a, _) = couple(&s).await;
  let c = s.add_person("idp|cee".into()).await.unwrap();

  let err = s.create_pairing(a.person_id, c.person_id).await.unwrap_err();
  assert!(matches!(err, Error::AlreadyPaired(id) if id == a.person_id));
}

#[tokio::test]
async fn attach_subscription_round_trip() {
  let s = store().await;
  let (a, _) = couple(&s).await;
  let pairing = s.pairing_for(a.person_id).await.unwrap().unwrap();

  let sub = s
    .attach_subscription(pairing.pairing_id, "pay|sub_123".into())
    .await
    .unwrap();
  assert_eq!(sub.external_ref, "pay|sub_123");

  let refreshed = s.pairing_for(a.person_id).await.unwrap().unwrap();
  assert_eq!(refreshed.subscription_id, Some(sub.subscription_id));
  assert_eq!(s.count_rows("subscriptions").await.unwrap(), 1);
}

#[tokio::test]
async fn attach_subscription_unknown_pairing_rejected() {
  let s = store().await;
  let ghost = Uuid::new_v4();

  let err = s.attach_subscription(ghost, "pay|sub_123".into()).await.unwrap_err();
  assert!(matches!(err, Error::PairingNotFound(id) if id == ghost));
}

#[tokio::test]
async fn remove_member_half_vacates_row() {
  let s = store().await;
  let (a, b) = couple(&s).await;

  let outcome = s.remove_member(a.person_id).await.unwrap();
  assert!(!outcome.pairing_deleted);
  assert_eq!(outcome.remaining_member, Some(b.person_id));

  assert!(s.pairing_for(a.person_id).await.unwrap().is_none());
  let remaining = s.pairing_for(b.person_id).await.unwrap().unwrap();
  assert!(remaining.contains(b.person_id));
  assert_eq!(remaining.partner_of(b.person_id), None);
}

#[tokio::test]
async fn remove_member_last_member_deletes_row() {
  let s = store().await;
  let (a, b) = couple(&s).await;

  s.remove_member(a.person_id).await.unwrap();
  let outcome = s.remove_member(b.person_id).await.unwrap();
  assert!(outcome.pairing_deleted);
  assert_eq!(outcome.remaining_member, None);
  assert_eq!(s.count_rows("pairings").await.unwrap(), 0);
}

#[tokio::test]
async fn remove_member_unpaired_is_noop() {
  let s = store().await;
  let a = s.add_person("idp|alice".into()).await.unwrap();

  let outcome = s.remove_member(a.person_id).await.unwrap();
  assert!(!outcome.pairing_deleted);
  assert_eq!(outcome.remaining_member, None);
}

#[tokio::test]
async fn remove_member_leaves_subscription_untouched() {
  let s = store().await;
  let (a, b) = couple(&s).await;
  let pairing = s.pairing_for(a.person_id).await.unwrap().unwrap();
  let sub = s
    .attach_subscription(pairing.pairing_id, "pay|sub_123".into())
    .await
    .unwrap();

  s.remove_member(a.person_id).await.unwrap();

  let remaining = s.pairing_for(b.person_id).await.unwrap().unwrap();
  assert_eq!(remaining.subscription_id, Some(sub.subscription_id));
  assert_eq!(s.count_rows("subscriptions").await.unwrap(), 1);
}

// ─── Owned records ───────────────────────────────────────────────────────────

#[tokio::test]
async fn record_and_list_owned() {
  let s = store().await;
  let a = s.add_person("idp|alice".into()).await.unwrap();

  let record = s.record_owned(quest_for(a.person_id)).await.unwrap();

  let listed = s.owned_for(a.person_id, OwnedKind::Quest).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].record_id, record.record_id);
  match &listed[0].value {
    OwnedValue::Quest(q) => {
      assert_eq!(q.prompt, "cook their favourite dinner")
    }
    other => panic!("expected quest payload, got {other:?}"),
  }
}

#[tokio::test]
async fn shared_record_visible_to_both_members() {
  let s = store().await;
  let (a, b) = couple(&s).await;

  s.record_owned(match_between(a.person_id, b.person_id)).await.unwrap();

  assert_eq!(s.owned_for(a.person_id, OwnedKind::Match).await.unwrap().len(), 1);
  assert_eq!(s.owned_for(b.person_id, OwnedKind::Match).await.unwrap().len(), 1);
}

#[tokio::test]
async fn daily_puzzle_swept_with_either_member() {
  let s = store().await;
  let (a, b) = couple(&s).await;

  s.record_owned(puzzle_between(a.person_id, b.person_id)).await.unwrap();

  let listed = s.owned_for(b.person_id, OwnedKind::Puzzle).await.unwrap();
  assert_eq!(listed.len(), 1);
  match &listed[0].value {
    OwnedValue::Puzzle(p) => {
      assert_eq!(p.cards.len(), 4);
      assert_eq!(p.matched_pairs, p.total_pairs);
    }
    other => panic!("expected puzzle payload, got {other:?}"),
  }

  // Couple-scoped: either member's deletion removes the shared board.
  s.delete_account(a.person_id).await.unwrap();
  assert_eq!(s.count_rows("puzzles").await.unwrap(), 0);
  assert_eq!(
    s.owned_for(b.person_id, OwnedKind::Puzzle).await.unwrap().len(),
    0
  );
}

#[tokio::test]
async fn ownership_shape_mismatch_rejected() {
  let s = store().await;
  let (a, _) = couple(&s).await;

  // A match is couple-scoped; recording it with a single owner must fail
  // before anything is written.
  let bad = NewOwnedRecord::owned(
    a.person_id,
    OwnedValue::Match(MatchValue { day: day(), game: "you_or_me".into() }),
  );
  let err = s.record_owned(bad).await.unwrap_err();
  assert!(matches!(err, Error::OwnershipMismatch { .. }));
  assert_eq!(s.count_rows("matches").await.unwrap(), 0);
}

#[tokio::test]
async fn owned_counts_enumerate_every_kind() {
  let s = store().await;
  let a = s.add_person("idp|alice".into()).await.unwrap();

  let counts = s.owned_counts(a.person_id).await.unwrap();
  assert_eq!(counts.len(), OwnedKind::iter().count());
  assert!(counts.values().all(|n| *n == 0));
}

// ─── Account deletion ────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_unpaired_person_with_no_data() {
  let s = store().await;
  let a = s.add_person("idp|alice".into()).await.unwrap();

  let outcome = s.delete_account(a.person_id).await.unwrap();
  assert!(!outcome.already_deleted);
  assert!(!outcome.pairing_deleted);
  assert_eq!(outcome.remaining_member, None);
  assert_eq!(outcome.purged.total(), 0);
  // Zero counts are still reported for every registered kind.
  assert_eq!(outcome.purged.counts.len(), OwnedKind::iter().count());

  assert!(s.get_person(a.person_id).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_paired_person_purges_and_half_vacates() {
  let s = store().await;
  let (a, b) = couple(&s).await;
  let pairing = s.pairing_for(a.person_id).await.unwrap().unwrap();
  let sub = s
    .attach_subscription(pairing.pairing_id, "pay|sub_123".into())
    .await
    .unwrap();

  for _ in 0..3 {
    s.record_owned(quest_for(a.person_id)).await.unwrap();
  }
  for _ in 0..2 {
    s.record_owned(match_between(a.person_id, b.person_id)).await.unwrap();
  }
  s.record_owned(grant_for(a.person_id)).await.unwrap();
  s.record_owned(quest_for(b.person_id)).await.unwrap();
  s.record_owned(answer_for(b.person_id)).await.unwrap();

  let outcome = s.delete_account(a.person_id).await.unwrap();
  assert!(!outcome.already_deleted);
  assert!(!outcome.pairing_deleted);
  assert_eq!(outcome.remaining_member, Some(b.person_id));
  assert_eq!(outcome.purged.count(OwnedKind::Quest), 3);
  assert_eq!(outcome.purged.count(OwnedKind::Match), 2);
  assert_eq!(outcome.purged.count(OwnedKind::RewardGrant), 1);
  assert_eq!(outcome.purged.count(OwnedKind::Answer), 0);

  // The partner's world is intact: person, solo data, half-vacated pairing,
  // subscription reference.
  assert!(s.get_person(a.person_id).await.unwrap().is_none());
  assert!(s.get_person(b.person_id).await.unwrap().is_some());
  assert_eq!(s.owned_for(b.person_id, OwnedKind::Quest).await.unwrap().len(), 1);
  assert_eq!(s.owned_for(b.person_id, OwnedKind::Answer).await.unwrap().len(), 1);
  assert_eq!(s.owned_for(b.person_id, OwnedKind::Match).await.unwrap().len(), 0);

  let remaining = s.pairing_for(b.person_id).await.unwrap().unwrap();
  assert_eq!(remaining.partner_of(b.person_id), None);
  assert_eq!(remaining.subscription_id, Some(sub.subscription_id));
  assert_eq!(s.count_rows("subscriptions").await.unwrap(), 1);
}

#[tokio::test]
async fn purge_covers_every_registered_kind() {
  let s = store().await;
  let (a, b) = couple(&s).await;

  // Enumerated from the kind set, not hand-listed: adding a kind without
  // extending record_for fails to compile, and a kind the purge missed
  // fails the count assertions below.
  for kind in OwnedKind::iter() {
    s.record_owned(record_for(kind, a.person_id, b.person_id)).await.unwrap();
  }

  let outcome = s.delete_account(a.person_id).await.unwrap();
  for kind in OwnedKind::iter() {
    assert_eq!(outcome.purged.count(kind), 1, "kind {kind} not purged");
  }

  let counts = s.owned_counts(b.person_id).await.unwrap();
  // The couple-scoped match went with the deleted member; b kept nothing.
  assert!(counts.values().all(|n| *n == 0));
}

#[tokio::test]
async fn deleting_both_members_removes_pairing_row() {
  let s = store().await;
  let (a, b) = couple(&s).await;
  s.record_owned(quest_for(a.person_id)).await.unwrap();
  s.record_owned(quest_for(b.person_id)).await.unwrap();

  let first = s.delete_account(a.person_id).await.unwrap();
  assert!(!first.pairing_deleted);

  let second = s.delete_account(b.person_id).await.unwrap();
  assert!(second.pairing_deleted);
  assert_eq!(second.remaining_member, None);

  assert_eq!(s.count_rows("pairings").await.unwrap(), 0);
  assert_eq!(s.count_rows("persons").await.unwrap(), 0);
  assert_eq!(s.count_rows("quests").await.unwrap(), 0);
}

#[tokio::test]
async fn double_delete_is_idempotent() {
  let s = store().await;
  let (a, _) = couple(&s).await;
  s.record_owned(quest_for(a.person_id)).await.unwrap();

  let first = s.delete_account(a.person_id).await.unwrap();
  assert!(!first.already_deleted);

  let before = table_counts(&s).await;
  let second = s.delete_account(a.person_id).await.unwrap();
  assert!(second.already_deleted);
  assert_eq!(second.purged.total(), 0);
  assert_eq!(table_counts(&s).await, before);
}

#[tokio::test]
async fn multiple_pairings_corruption_detected() {
  let s = store().await;
  let (a, b) = couple(&s).await;
  let c = s.add_person("idp|cee".into()).await.unwrap();

  // Hand-craft a second row containing `a` — the write path refuses this,
  // so go straight to SQL.
  s.raw_batch(&format!(
    "INSERT INTO pairings (pairing_id, slot_a, slot_b, created_at)
     VALUES ('{}', '{}', '{}', '2025-06-01T00:00:00+00:00')",
    Uuid::new_v4(),
    c.person_id,
    a.person_id,
  ))
  .await
  .unwrap();

  let before = table_counts(&s).await;

  let err = s.delete_account(a.person_id).await.unwrap_err();
  assert!(matches!(err, Error::MultiplePairings(id) if id == a.person_id));
  assert_eq!(table_counts(&s).await, before);

  let err = s.pairing_for(a.person_id).await.unwrap_err();
  assert!(matches!(err, Error::MultiplePairings(_)));

  // The uncorrupted partner is unaffected.
  assert!(s.pairing_for(b.person_id).await.unwrap().is_some());
}

// ─── Fault injection ─────────────────────────────────────────────────────────

async fn primed_couple(s: &SqliteStore) -> (Person, Person) {
  let (a, b) = couple(s).await;
  s.record_owned(quest_for(a.person_id)).await.unwrap();
  s.record_owned(match_between(a.person_id, b.person_id)).await.unwrap();
  s.record_owned(answer_for(b.person_id)).await.unwrap();
  (a, b)
}

async fn assert_aborted_and_rolled_back(
  s: &SqliteStore,
  person: Uuid,
  expected_stage: DeletionStage,
) {
  let before = table_counts(s).await;

  let err = s.delete_account(person).await.unwrap_err();
  match err {
    Error::DeletionAborted { stage, .. } => assert_eq!(stage, expected_stage),
    other => panic!("expected DeletionAborted, got {other}"),
  }

  assert_eq!(table_counts(s).await, before);
  assert!(s.get_person(person).await.unwrap().is_some());
}

#[tokio::test]
async fn abort_during_purge_rolls_everything_back() {
  let s = store().await;
  let (a, _) = primed_couple(&s).await;

  s.raw_batch(
    "CREATE TRIGGER fail_purge BEFORE DELETE ON quests
     BEGIN SELECT RAISE(ABORT, 'injected'); END;",
  )
  .await
  .unwrap();

  assert_aborted_and_rolled_back(&s, a.person_id, DeletionStage::Purge).await;

  // Clearing the fault makes the retry succeed — aborts are retryable.
  s.raw_batch("DROP TRIGGER fail_purge;").await.unwrap();
  let outcome = s.delete_account(a.person_id).await.unwrap();
  assert_eq!(outcome.purged.count(OwnedKind::Quest), 1);
}

#[tokio::test]
async fn abort_during_unpair_rolls_everything_back() {
  let s = store().await;
  let (a, _) = primed_couple(&s).await;

  s.raw_batch(
    "CREATE TRIGGER fail_unpair BEFORE UPDATE ON pairings
     BEGIN SELECT RAISE(ABORT, 'injected'); END;",
  )
  .await
  .unwrap();

  assert_aborted_and_rolled_back(&s, a.person_id, DeletionStage::Unpair).await;

  // The purge phase ran before the fault and must have been undone.
  assert_eq!(s.count_rows("quests").await.unwrap(), 1);
  assert_eq!(s.count_rows("matches").await.unwrap(), 1);
}

#[tokio::test]
async fn abort_during_identity_removal_rolls_everything_back() {
  let s = store().await;
  let (a, b) = primed_couple(&s).await;

  s.raw_batch(
    "CREATE TRIGGER fail_identity BEFORE DELETE ON persons
     BEGIN SELECT RAISE(ABORT, 'injected'); END;",
  )
  .await
  .unwrap();

  assert_aborted_and_rolled_back(&s, a.person_id, DeletionStage::Identity)
    .await;

  // Purge and unpair both ran before the fault; the pairing must be whole
  // again after rollback.
  let pairing = s.pairing_for(a.person_id).await.unwrap().unwrap();
  assert_eq!(pairing.partner_of(a.person_id), Some(b.person_id));
}

// ─── Registry validation ─────────────────────────────────────────────────────

#[tokio::test]
async fn open_with_incomplete_registry_fails() {
  let registry = OwnedDataRegistry::new(
    OwnedKind::iter()
      .filter(|kind| *kind != OwnedKind::Answer)
      .map(|kind| (kind, PurgeAction::DeleteWhereOwner)),
  );

  let err = SqliteStore::open_in_memory(registry).await.unwrap_err();
  match err {
    Error::RegistryIncomplete { missing } => {
      assert_eq!(missing, vec![OwnedKind::Answer]);
    }
    other => panic!("expected RegistryIncomplete, got {other}"),
  }
}

#[tokio::test]
async fn unregistered_owned_table_fails_catalog_check() {
  let s = store().await;

  s.raw_batch(
    "CREATE TABLE journal_entries (
       record_id   TEXT PRIMARY KEY,
       owner_id    TEXT NOT NULL,
       value_json  TEXT NOT NULL,
       recorded_at TEXT NOT NULL
     );",
  )
  .await
  .unwrap();

  let err = s.check_catalog().await.unwrap_err();
  assert!(matches!(err, Error::RegistryMismatch { .. }));
}

#[tokio::test]
async fn missing_backing_table_fails_catalog_check() {
  let s = store().await;

  s.raw_batch("DROP TABLE answers;").await.unwrap();

  let err = s.check_catalog().await.unwrap_err();
  match err {
    Error::RegistryMismatch { detail } => {
      assert!(detail.contains("answer"), "unexpected detail: {detail}");
    }
    other => panic!("expected RegistryMismatch, got {other}"),
  }
}
