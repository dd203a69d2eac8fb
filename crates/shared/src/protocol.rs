use serde::{Deserialize, Serialize};

use crate::domain::{CommentId, EntityRef, MediaKind, PostId, UserVote, VoteDirection, VoteTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteState {
    pub upvotes: u64,
    pub downvotes: u64,
    pub user_vote: UserVote,
}

impl VoteState {
    pub fn new(upvotes: u64, downvotes: u64, user_vote: UserVote) -> Self {
        Self {
            upvotes,
            downvotes,
            user_vote,
        }
    }

    /// Local prediction for a click in `direction`: a repeated direction clears
    /// the vote, an opposite one moves it. Counts saturate at zero.
    pub fn toggled(&self, direction: VoteDirection) -> Self {
        let mut next = *self;
        let clicked = UserVote::from(direction);

        if self.user_vote == clicked {
            next.user_vote = UserVote::None;
            match direction {
                VoteDirection::Up => next.upvotes = next.upvotes.saturating_sub(1),
                VoteDirection::Down => next.downvotes = next.downvotes.saturating_sub(1),
            }
            return next;
        }

        match self.user_vote {
            UserVote::Up => next.upvotes = next.upvotes.saturating_sub(1),
            UserVote::Down => next.downvotes = next.downvotes.saturating_sub(1),
            UserVote::None => {}
        }
        match direction {
            VoteDirection::Up => next.upvotes = next.upvotes.saturating_add(1),
            VoteDirection::Down => next.downvotes = next.downvotes.saturating_add(1),
        }
        next.user_vote = clicked;
        next
    }

    /// Server counts win over the prediction; the user's own choice is kept.
    pub fn reconciled(&self, tally: &VoteTally) -> Self {
        Self {
            upvotes: tally.upvotes.unwrap_or(self.upvotes),
            downvotes: tally.downvotes.unwrap_or(self.downvotes),
            user_vote: self.user_vote,
        }
    }

    pub fn net(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShareState {
    pub share_count: u64,
}

impl ShareState {
    pub fn new(share_count: u64) -> Self {
        Self { share_count }
    }

    pub fn incremented(&self) -> Self {
        Self {
            share_count: self.share_count.saturating_add(1),
        }
    }

    pub fn decremented(&self) -> Self {
        Self {
            share_count: self.share_count.saturating_sub(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    #[default]
    Idle,
    Staged,
    Transferring,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedMedia {
    pub url: String,
    pub id: String,
    pub media_kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UploadState {
    pub phase: UploadPhase,
    pub progress_percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_result: Option<UploadedMedia>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "state", rename_all = "snake_case")]
pub enum EntityState {
    Vote(VoteState),
    Share(ShareState),
    Upload(UploadState),
}

impl EntityState {
    /// State reported for an entity that has never been written.
    pub fn default_for(entity: &EntityRef) -> Self {
        match entity {
            EntityRef::PostVote { .. } | EntityRef::CommentVote { .. } => {
                EntityState::Vote(VoteState::default())
            }
            EntityRef::Share { .. } => EntityState::Share(ShareState::default()),
            EntityRef::Upload { .. } => EntityState::Upload(UploadState::default()),
        }
    }
}

macro_rules! entity_state_variant {
    ($variant:ident, $state:ty) => {
        impl From<$state> for EntityState {
            fn from(value: $state) -> Self {
                EntityState::$variant(value)
            }
        }

        impl TryFrom<EntityState> for $state {
            type Error = EntityState;

            fn try_from(value: EntityState) -> Result<Self, Self::Error> {
                match value {
                    EntityState::$variant(state) => Ok(state),
                    other => Err(other),
                }
            }
        }
    };
}

entity_state_variant!(Vote, VoteState);
entity_state_variant!(Share, ShareState);
entity_state_variant!(Upload, UploadState);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<PostId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<CommentId>,
    pub vote_type: i8,
}

impl VoteRequest {
    pub fn new(target: VoteTarget, direction: VoteDirection) -> Self {
        let (post_id, comment_id) = match target {
            VoteTarget::Post(post_id) => (Some(post_id), None),
            VoteTarget::Comment(comment_id) => (None, Some(comment_id)),
        };
        Self {
            post_id,
            comment_id,
            vote_type: direction.vote_type(),
        }
    }
}

/// Counts returned by the votes endpoint. Either may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteTally {
    #[serde(default)]
    pub upvotes: Option<u64>,
    #[serde(default)]
    pub downvotes: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShareTally {
    #[serde(default)]
    pub share_count: Option<u64>,
}

/// Raw body of `GET /media/signature`. `mock: true` means the storage backend
/// is not configured and carries no credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureResponse {
    pub mock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCredentials {
    pub api_key: String,
    pub timestamp: i64,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealGrant {
    pub endpoint: String,
    pub credentials: UploadCredentials,
    pub folder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadGrant {
    Real(RealGrant),
    Mock {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

/// Body returned by the media storage service after a direct upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageUploadResponse {
    pub secure_url: String,
    pub public_id: String,
    pub resource_type: String,
}

impl From<StorageUploadResponse> for UploadedMedia {
    fn from(value: StorageUploadResponse) -> Self {
        Self {
            media_kind: MediaKind::from_resource_type(&value.resource_type),
            url: value.secure_url,
            id: value.public_id,
        }
    }
}
