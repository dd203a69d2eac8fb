use std::sync::Arc;

use anyhow::Result;
use shared::{
    domain::{EntityRef, PostId, VoteDirection, VoteTarget},
    protocol::{EntityState, ShareState, UploadedMedia, VoteState},
};
use tokio::sync::broadcast;

pub mod config;
pub mod controller;
pub mod error;
pub mod guard;
pub mod remote;
pub mod store;
pub mod upload;

pub use config::{load_settings, ClientSettings};
pub use controller::{MutationController, MutationOutcome};
pub use error::{RemoteFailure, UploadError, ValidationError};
pub use guard::{Admission, MutationGuard, PendingMutation};
pub use remote::{HttpRemote, MissingRemote, ShareRemote, UploadRemote, VoteRemote};
pub use store::EntityStore;
pub use upload::{MediaFile, UploadPolicy, UploadTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Everything the view layer needs to re-render or to show a toast.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    StateChanged {
        entity: EntityRef,
        state: EntityState,
    },
    Notice {
        level: NoticeLevel,
        message: String,
    },
}

/// One running client: a single store shared by the vote/share controller and
/// the media upload tracker.
pub struct FeedClient {
    store: Arc<EntityStore>,
    guard: Arc<MutationGuard>,
    controller: MutationController,
    uploads: UploadTracker,
}

impl FeedClient {
    pub fn new(policy: UploadPolicy) -> Self {
        let missing = Arc::new(MissingRemote);
        Self::new_with_dependencies(policy, missing.clone(), missing.clone(), missing)
    }

    pub fn new_with_dependencies(
        policy: UploadPolicy,
        votes: Arc<dyn VoteRemote>,
        shares: Arc<dyn ShareRemote>,
        uploads: Arc<dyn UploadRemote>,
    ) -> Self {
        let store = EntityStore::new();
        let guard = Arc::new(MutationGuard::new());
        Self {
            controller: MutationController::new(store.clone(), guard.clone(), votes, shares),
            uploads: UploadTracker::new(store.clone(), guard.clone(), uploads, policy),
            store,
            guard,
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        let remote = Arc::new(HttpRemote::new(settings)?);
        Ok(Self::new_with_dependencies(
            settings.upload_policy(),
            remote.clone(),
            remote.clone(),
            remote,
        ))
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn guard(&self) -> &Arc<MutationGuard> {
        &self.guard
    }

    pub fn uploads(&self) -> &UploadTracker {
        &self.uploads
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FeedEvent> {
        self.store.subscribe()
    }

    /// Seeds server-rendered counts before the user interacts.
    pub fn load_vote_state(&self, target: VoteTarget, state: VoteState) {
        self.store.set(target.entity(), state);
    }

    pub fn load_share_state(&self, post_id: PostId, state: ShareState) {
        self.store.set(EntityRef::Share { post_id }, state);
    }

    pub async fn vote(
        &self,
        target: VoteTarget,
        direction: VoteDirection,
    ) -> MutationOutcome<VoteState> {
        self.controller.vote(target, direction).await
    }

    pub async fn share(&self, post_id: PostId) -> MutationOutcome<ShareState> {
        self.controller.share(post_id).await
    }

    pub async fn upload(&self, file: MediaFile) -> std::result::Result<UploadedMedia, UploadError> {
        self.uploads.start(file).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
