//! Optimistic mutations: predict locally, call the server, then either adopt
//! the server's answer or put the entity back where it was.

use std::{future::Future, sync::Arc};

use shared::{
    domain::{EntityRef, PostId, VoteDirection, VoteTarget},
    protocol::{EntityState, ShareState, ShareTally, VoteState, VoteTally},
};
use tracing::{debug, info, warn};

use crate::{
    error::RemoteFailure,
    guard::{Admission, MutationGuard},
    remote::{ShareRemote, VoteRemote},
    store::EntityStore,
    NoticeLevel,
};

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<S> {
    /// The server accepted the action; holds the reconciled state.
    Confirmed(S),
    /// The server call failed and the entity was restored.
    RolledBack { state: S, failure: RemoteFailure },
    /// Another mutation on the entity was still in flight; nothing happened.
    Dropped,
}

impl<S> MutationOutcome<S> {
    pub fn state(&self) -> Option<&S> {
        match self {
            MutationOutcome::Confirmed(state) | MutationOutcome::RolledBack { state, .. } => {
                Some(state)
            }
            MutationOutcome::Dropped => None,
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, MutationOutcome::Dropped)
    }

    pub fn failure(&self) -> Option<&RemoteFailure> {
        match self {
            MutationOutcome::RolledBack { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

/// Releases the guard entry even if the caller stops polling mid-request.
struct PendingRelease<'a> {
    guard: &'a MutationGuard,
    entity: EntityRef,
}

impl Drop for PendingRelease<'_> {
    fn drop(&mut self) {
        self.guard.end(&self.entity);
    }
}

pub struct MutationController {
    store: Arc<EntityStore>,
    guard: Arc<MutationGuard>,
    votes: Arc<dyn VoteRemote>,
    shares: Arc<dyn ShareRemote>,
}

impl MutationController {
    pub fn new(
        store: Arc<EntityStore>,
        guard: Arc<MutationGuard>,
        votes: Arc<dyn VoteRemote>,
        shares: Arc<dyn ShareRemote>,
    ) -> Self {
        Self {
            store,
            guard,
            votes,
            shares,
        }
    }

    /// Runs one optimistic mutation on `entity`.
    ///
    /// `predicted` is written to the store before `remote` is polled. On
    /// success `reconcile` merges the response into the prediction; on failure
    /// `rollback` receives the pre-action snapshot and the current store value
    /// and decides what to restore. The guard entry is released on every path.
    pub async fn mutate<S, T, Fut, R, B>(
        &self,
        entity: EntityRef,
        previous: S,
        predicted: S,
        remote: Fut,
        reconcile: R,
        rollback: B,
    ) -> MutationOutcome<S>
    where
        S: Clone + Into<EntityState> + TryFrom<EntityState>,
        Fut: Future<Output = Result<T, RemoteFailure>>,
        R: FnOnce(&S, T) -> S,
        B: FnOnce(&S, &S) -> S,
    {
        let admission = self
            .guard
            .try_begin(entity, previous.clone(), predicted.clone());
        if let Admission::Rejected = admission {
            debug!(entity = %entity, "mutation already in flight; dropping action");
            return MutationOutcome::Dropped;
        }
        let _release = PendingRelease {
            guard: &self.guard,
            entity,
        };

        self.store.set(entity, predicted.clone());

        match remote.await {
            Ok(response) => {
                let confirmed = reconcile(&predicted, response);
                self.store.set(entity, confirmed.clone());
                MutationOutcome::Confirmed(confirmed)
            }
            Err(failure) => {
                let current =
                    S::try_from(self.store.get(&entity)).unwrap_or_else(|_| predicted.clone());
                let restored = rollback(&previous, &current);
                self.store.set(entity, restored.clone());
                warn!(entity = %entity, error = %failure, "mutation failed; rolled back");
                MutationOutcome::RolledBack {
                    state: restored,
                    failure,
                }
            }
        }
    }

    pub async fn vote(
        &self,
        target: VoteTarget,
        direction: VoteDirection,
    ) -> MutationOutcome<VoteState> {
        let entity = target.entity();
        let previous = self.store.vote(&entity);
        let predicted = previous.toggled(direction);

        let outcome = self
            .mutate(
                entity,
                previous,
                predicted,
                self.votes.submit_vote(target, direction),
                |predicted: &VoteState, tally: VoteTally| predicted.reconciled(&tally),
                |previous: &VoteState, _current: &VoteState| *previous,
            )
            .await;

        if let Some(failure) = outcome.failure() {
            self.store.notify(
                NoticeLevel::Error,
                format!("Vote failed: {}", failure.message()),
            );
        }
        outcome
    }

    pub async fn share(&self, post_id: PostId) -> MutationOutcome<ShareState> {
        let entity = EntityRef::Share { post_id };
        let previous = self.store.share(&entity);
        let predicted = previous.incremented();

        let outcome = self
            .mutate(
                entity,
                previous,
                predicted,
                self.shares.submit_share(post_id),
                |predicted: &ShareState, tally: ShareTally| {
                    tally.share_count.map(ShareState::new).unwrap_or(*predicted)
                },
                |_previous: &ShareState, current: &ShareState| current.decremented(),
            )
            .await;

        match &outcome {
            MutationOutcome::Confirmed(state) => {
                info!(post_id = %post_id, share_count = state.share_count, "share tracked");
                self.store.notify(NoticeLevel::Success, "Shared successfully!");
            }
            MutationOutcome::RolledBack { failure, .. } => self.store.notify(
                NoticeLevel::Error,
                format!("Failed to track share: {}", failure.message()),
            ),
            MutationOutcome::Dropped => {}
        }
        outcome
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
