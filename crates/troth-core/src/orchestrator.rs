//! The deletion orchestrator — the only entry point for account deletion.
//!
//! Authorization runs first and touches no data; all mutation happens inside
//! the store's single atomic transaction. The orchestrator holds no state
//! between calls, so any number of requests can run concurrently and rely on
//! the storage transaction for serialization.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  error::{Error, Result},
  store::{AccountStore, DeletionOutcome},
};

// ─── Authorizer ──────────────────────────────────────────────────────────────

/// Resolves a caller credential to a person id.
///
/// Implementations must not consult the account data: a credential that was
/// valid before a deletion must still resolve afterwards, so a retried
/// deletion reaches the idempotent success path instead of failing
/// authentication.
pub trait Authorizer: Send + Sync {
  /// The person id the credential was issued for, or
  /// [`Error::Unauthenticated`].
  fn authorize(&self, token: &str) -> Result<Uuid>;
}

impl<A: Authorizer + ?Sized> Authorizer for Arc<A> {
  fn authorize(&self, token: &str) -> Result<Uuid> {
    (**self).authorize(token)
  }
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// Coordinates authorization and the atomic deletion transaction.
pub struct DeletionOrchestrator<S, A> {
  store: Arc<S>,
  auth:  A,
}

impl<S: AccountStore, A: Authorizer> DeletionOrchestrator<S, A> {
  pub fn new(store: Arc<S>, auth: A) -> Self { Self { store, auth } }

  /// Delete `target`'s account on behalf of the credential holder.
  ///
  /// Self-service only: a credential resolving to anyone but `target` fails
  /// with [`Error::Forbidden`] before any data is touched. Denials are
  /// logged as an abuse signal and must not be retried by clients.
  pub async fn execute(
    &self,
    token: &str,
    target: Uuid,
  ) -> Result<DeletionOutcome> {
    let caller = self.auth.authorize(token)?;
    if caller != target {
      warn!(%caller, %target, "cross-account deletion refused");
      return Err(Error::Forbidden { caller, target });
    }
    self.run(caller).await
  }

  /// Delete the credential holder's own account — the shape the HTTP
  /// endpoint uses, where no target id is accepted from the client.
  pub async fn execute_self(&self, token: &str) -> Result<DeletionOutcome> {
    let caller = self.auth.authorize(token)?;
    self.run(caller).await
  }

  async fn run(&self, person: Uuid) -> Result<DeletionOutcome> {
    let outcome = self.store.delete_account(person).await?;
    if outcome.already_deleted {
      info!(%person, "account already deleted; retry reported as success");
    } else {
      info!(
        %person,
        purged = outcome.purged.total(),
        counts = ?outcome.purged.counts,
        pairing_deleted = outcome.pairing_deleted,
        partner_unpaired = outcome.remaining_member.is_some(),
        "account deleted",
      );
    }
    Ok(outcome)
  }
}
