use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(PostId);
id_newtype!(CommentId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(pub Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The thing a mutation targets. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityRef {
    PostVote { post_id: PostId },
    CommentVote { comment_id: CommentId },
    Share { post_id: PostId },
    Upload { upload_id: UploadId },
}

impl EntityRef {
    /// Canonical string form used to key per-entity registries.
    pub fn key(&self) -> String {
        self.to_string()
    }

    pub fn vote_target(&self) -> Option<VoteTarget> {
        match *self {
            EntityRef::PostVote { post_id } => Some(VoteTarget::Post(post_id)),
            EntityRef::CommentVote { comment_id } => Some(VoteTarget::Comment(comment_id)),
            EntityRef::Share { .. } | EntityRef::Upload { .. } => None,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::PostVote { post_id } => write!(f, "post_vote:{post_id}"),
            EntityRef::CommentVote { comment_id } => write!(f, "comment_vote:{comment_id}"),
            EntityRef::Share { post_id } => write!(f, "share:{post_id}"),
            EntityRef::Upload { upload_id } => write!(f, "upload:{upload_id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteTarget {
    Post(PostId),
    Comment(CommentId),
}

impl VoteTarget {
    pub fn entity(self) -> EntityRef {
        match self {
            VoteTarget::Post(post_id) => EntityRef::PostVote { post_id },
            VoteTarget::Comment(comment_id) => EntityRef::CommentVote { comment_id },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// Wire value understood by the votes endpoint.
    pub fn vote_type(self) -> i8 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserVote {
    Up,
    Down,
    #[default]
    None,
}

impl From<VoteDirection> for UserVote {
    fn from(value: VoteDirection) -> Self {
        match value {
            VoteDirection::Up => UserVote::Up,
            VoteDirection::Down => UserVote::Down,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.to_ascii_lowercase().starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    pub fn from_resource_type(resource_type: &str) -> Self {
        if resource_type.eq_ignore_ascii_case("video") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}
