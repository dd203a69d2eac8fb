use std::fmt;

use shared::error::ErrorCode;
use thiserror::Error;

/// Failed remote operation. Carries an optional human-readable detail that the
/// presentation layer shows as a transient notice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct RemoteFailure {
    pub code: ErrorCode,
    pub status: Option<u16>,
    pub detail: Option<String>,
}

impl RemoteFailure {
    pub fn transport(detail: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Unavailable,
            status: None,
            detail: Some(detail.into()),
        }
    }

    pub fn rejected(status: u16, detail: Option<String>) -> Self {
        Self {
            code: ErrorCode::from_status(status),
            status: Some(status),
            detail,
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Internal,
            status: None,
            detail: Some(detail.into()),
        }
    }

    pub fn unavailable(what: &str) -> Self {
        Self {
            code: ErrorCode::Unavailable,
            status: None,
            detail: Some(format!("{what} backend unavailable")),
        }
    }

    pub fn message(&self) -> &str {
        self.detail.as_deref().unwrap_or("request failed")
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{:?} ({status}): {}", self.code, self.message()),
            None => write!(f, "{:?}: {}", self.code, self.message()),
        }
    }
}

impl From<reqwest::Error> for RemoteFailure {
    fn from(value: reqwest::Error) -> Self {
        match value.status() {
            Some(status) => Self::rejected(status.as_u16(), Some(value.to_string())),
            None if value.is_decode() => Self::malformed(value.to_string()),
            None => Self::transport(value.to_string()),
        }
    }
}

/// Local pre-flight rejection of a selected file. Nothing has been mutated
/// when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported media type '{mime_type}': only images and videos can be attached")]
    UnsupportedMediaType { mime_type: String },
    #[error("file is {size_bytes} bytes, limit is {max_bytes} bytes")]
    TooLarge { size_bytes: u64, max_bytes: u64 },
}

impl ValidationError {
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::UnsupportedMediaType { .. } => {
                "Unsupported file format. Please use an image or a video.".to_string()
            }
            ValidationError::TooLarge { max_bytes, .. } => format!(
                "File is too heavy! Max size allowed is {}MB.",
                max_bytes / (1024 * 1024)
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("upload failed: {0}")]
    Remote(#[from] RemoteFailure),
    #[error("upload {upload_id} was replaced by a newer file")]
    Superseded { upload_id: String },
    #[error("cannot clear while a transfer is in progress")]
    TransferInProgress,
}
