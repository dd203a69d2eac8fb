//! Single-file media upload with local preview, progress and a simulated mode
//! for when the storage backend is not configured.

use std::{sync::Arc, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use parking_lot::Mutex;
use shared::{
    domain::{EntityRef, MediaKind, UploadId},
    protocol::{EntityState, UploadGrant, UploadPhase, UploadState, UploadedMedia},
};
use tracing::{debug, info, warn};

use crate::{
    error::{RemoteFailure, UploadError, ValidationError},
    guard::{Admission, MutationGuard},
    remote::UploadRemote,
    store::EntityStore,
    NoticeLevel,
};

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn media_kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime_type)
    }

    /// Inline `data:` URL usable as a preview before anything is uploaded.
    pub fn preview_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub mock_step_percent: u8,
    pub mock_step_delay: Duration,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            mock_step_percent: 20,
            mock_step_delay: Duration::from_millis(150),
        }
    }
}

impl UploadPolicy {
    pub fn validate(&self, file: &MediaFile) -> Result<(), ValidationError> {
        let mime_type = file.mime_type.to_ascii_lowercase();
        if !mime_type.starts_with("image/") && !mime_type.starts_with("video/") {
            return Err(ValidationError::UnsupportedMediaType {
                mime_type: file.mime_type.clone(),
            });
        }
        if file.size_bytes() > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size_bytes: file.size_bytes(),
                max_bytes: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Percentages reported while simulating a transfer: `0, step, …, 100`.
    pub fn mock_ramp(&self) -> Vec<u8> {
        let step = self.mock_step_percent.clamp(1, 100) as usize;
        let mut ramp: Vec<u8> = (0..=100u8).step_by(step).collect();
        if ramp.last() != Some(&100) {
            ramp.push(100);
        }
        ramp
    }
}

struct Selection {
    upload_id: UploadId,
    file: Option<MediaFile>,
}

pub struct UploadTracker {
    store: Arc<EntityStore>,
    guard: Arc<MutationGuard>,
    remote: Arc<dyn UploadRemote>,
    policy: UploadPolicy,
    selection: Arc<Mutex<Option<Selection>>>,
}

impl UploadTracker {
    pub fn new(
        store: Arc<EntityStore>,
        guard: Arc<MutationGuard>,
        remote: Arc<dyn UploadRemote>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            store,
            guard,
            remote,
            policy,
            selection: Arc::new(Mutex::new(None)),
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn active_entity(&self) -> Option<EntityRef> {
        self.selection
            .lock()
            .as_ref()
            .map(|selection| EntityRef::Upload {
                upload_id: selection.upload_id,
            })
    }

    /// State of the file currently tracked, idle when nothing was selected.
    pub fn state(&self) -> UploadState {
        match self.active_entity() {
            Some(entity) => self.store.upload(&entity),
            None => UploadState::default(),
        }
    }

    pub fn selected_file(&self) -> Option<MediaFile> {
        self.selection
            .lock()
            .as_ref()
            .and_then(|selection| selection.file.clone())
    }

    /// Validates, previews and uploads `file`. Selecting a new file while a
    /// transfer runs stops tracking the old one without cancelling it.
    pub async fn start(&self, file: MediaFile) -> Result<UploadedMedia, UploadError> {
        if let Err(err) = self.policy.validate(&file) {
            debug!(filename = %file.filename, error = %err, "upload rejected before transfer");
            self.store.notify(NoticeLevel::Error, err.user_message());
            return Err(err.into());
        }
        self.start_as(UploadId::new(), file).await
    }

    async fn start_as(
        &self,
        upload_id: UploadId,
        file: MediaFile,
    ) -> Result<UploadedMedia, UploadError> {
        let entity = EntityRef::Upload { upload_id };
        let replaced = self.selection.lock().replace(Selection {
            upload_id,
            file: Some(file.clone()),
        });
        if let Some(previous) = replaced {
            self.forget_replaced(previous.upload_id);
        }

        let preview = file.preview_data_url();
        let staged = UploadState {
            phase: UploadPhase::Staged,
            progress_percent: 0,
            local_preview: Some(preview.clone()),
            remote_result: None,
        };
        self.store.set(entity, staged.clone());

        let transferring = UploadState {
            phase: UploadPhase::Transferring,
            ..staged.clone()
        };
        if let Admission::Rejected = self.guard.try_begin(entity, staged, transferring.clone()) {
            warn!(upload_id = %upload_id, "upload already in flight; refusing to restart it");
            self.release_selection(upload_id);
            self.store.remove(&entity);
            return Err(UploadError::TransferInProgress);
        }
        self.store.set(entity, transferring);

        let result = self.run_transfer(upload_id, &file, &preview).await;
        self.guard.end(&entity);

        if !self.is_active(upload_id) {
            debug!(upload_id = %upload_id, "discarding result of abandoned upload");
            self.store.remove(&entity);
            return Err(UploadError::Superseded {
                upload_id: upload_id.to_string(),
            });
        }

        match result {
            Ok((media, simulated)) => {
                self.store.set(
                    entity,
                    UploadState {
                        phase: UploadPhase::Complete,
                        progress_percent: 100,
                        local_preview: Some(preview),
                        remote_result: Some(media.clone()),
                    },
                );
                let message = if simulated {
                    "Mock upload complete (dev mode)"
                } else {
                    "Upload complete"
                };
                info!(upload_id = %upload_id, media_id = %media.id, simulated, "upload complete");
                self.store.notify(NoticeLevel::Success, message);
                Ok(media)
            }
            Err(failure) => {
                self.fail(upload_id, &failure);
                Err(failure.into())
            }
        }
    }

    /// Resets the tracker to idle; refused while bytes are in flight.
    ///
    /// A failed upload is put back to idle so it can be retried. A completed
    /// upload keeps its state and the tracker simply stops following it.
    pub fn clear(&self) -> Result<(), UploadError> {
        let mut selection = self.selection.lock();
        let Some(current) = selection.as_mut() else {
            return Ok(());
        };
        let entity = EntityRef::Upload {
            upload_id: current.upload_id,
        };
        match self.store.upload(&entity).phase {
            UploadPhase::Transferring => Err(UploadError::TransferInProgress),
            UploadPhase::Idle | UploadPhase::Failed => {
                current.file = None;
                self.store.set(entity, UploadState::default());
                Ok(())
            }
            UploadPhase::Staged | UploadPhase::Complete => {
                *selection = None;
                Ok(())
            }
        }
    }

    /// Drops the store entry of a replaced selection unless it is still
    /// transferring (that call cleans up after itself) or already complete.
    fn forget_replaced(&self, upload_id: UploadId) {
        let entity = EntityRef::Upload { upload_id };
        match self.store.upload(&entity).phase {
            UploadPhase::Idle | UploadPhase::Failed => {
                debug!(abandoned = %upload_id, "replacing tracked upload");
                self.store.remove(&entity);
            }
            UploadPhase::Staged | UploadPhase::Transferring | UploadPhase::Complete => {
                debug!(abandoned = %upload_id, "no longer tracking upload");
            }
        }
    }

    fn release_selection(&self, upload_id: UploadId) {
        let mut selection = self.selection.lock();
        if selection
            .as_ref()
            .is_some_and(|selection| selection.upload_id == upload_id)
        {
            *selection = None;
        }
    }

    async fn run_transfer(
        &self,
        upload_id: UploadId,
        file: &MediaFile,
        preview: &str,
    ) -> Result<(UploadedMedia, bool), RemoteFailure> {
        match self.remote.request_grant().await? {
            UploadGrant::Mock { message } => {
                warn!(
                    upload_id = %upload_id,
                    reason = message.as_deref().unwrap_or("storage not configured"),
                    "media service not configured; simulating upload"
                );
                self.store.notify(NoticeLevel::Info, "Dev mode: simulating upload...");
                self.simulate_progress(upload_id).await;
                Ok((
                    UploadedMedia {
                        url: preview.to_string(),
                        id: format!("mock_{}", Utc::now().timestamp_millis()),
                        media_kind: file.media_kind(),
                    },
                    true,
                ))
            }
            UploadGrant::Real(grant) => {
                let reporter = self.progress_reporter(upload_id);
                let media = self.remote.transfer(&grant, file, &reporter).await?;
                Ok((media, false))
            }
        }
    }

    async fn simulate_progress(&self, upload_id: UploadId) {
        let report = self.progress_reporter(upload_id);
        let ramp = self.policy.mock_ramp();
        let last = ramp.len().saturating_sub(1);
        for (index, percent) in ramp.into_iter().enumerate() {
            if !self.is_active(upload_id) {
                return;
            }
            report(percent);
            if index < last && !self.policy.mock_step_delay.is_zero() {
                tokio::time::sleep(self.policy.mock_step_delay).await;
            }
        }
    }

    /// Callback that raises the tracked percentage, never lowering it, and
    /// ignores reports once the upload is no longer the active one.
    fn progress_reporter(&self, upload_id: UploadId) -> impl Fn(u8) + Send + Sync + 'static {
        let store = self.store.clone();
        let selection = self.selection.clone();
        move |percent: u8| {
            let active = selection
                .lock()
                .as_ref()
                .is_some_and(|selection| selection.upload_id == upload_id);
            if !active {
                return;
            }
            let percent = percent.min(100);
            store.update(EntityRef::Upload { upload_id }, |current| match current {
                EntityState::Upload(state)
                    if state.phase == UploadPhase::Transferring
                        && percent > state.progress_percent =>
                {
                    Some(EntityState::Upload(UploadState {
                        progress_percent: percent,
                        ..state.clone()
                    }))
                }
                _ => None,
            });
        }
    }

    fn fail(&self, upload_id: UploadId, failure: &RemoteFailure) {
        warn!(upload_id = %upload_id, error = %failure, "upload failed");
        if let Some(selection) = self.selection.lock().as_mut() {
            if selection.upload_id == upload_id {
                selection.file = None;
            }
        }
        self.store.set(
            EntityRef::Upload { upload_id },
            UploadState {
                phase: UploadPhase::Failed,
                ..UploadState::default()
            },
        );
        self.store.notify(
            NoticeLevel::Error,
            format!("Upload failed ({}). Try again.", failure.message()),
        );
    }

    fn is_active(&self, upload_id: UploadId) -> bool {
        self.selection
            .lock()
            .as_ref()
            .is_some_and(|selection| selection.upload_id == upload_id)
    }
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
