use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use client_core::{
    FeedClient, MediaFile, MutationOutcome, RemoteFailure, ShareRemote, UploadError,
    UploadPolicy, UploadRemote, ValidationError, VoteRemote,
};
use shared::{
    domain::{PostId, UserVote, VoteDirection, VoteTarget},
    protocol::{
        RealGrant, ShareTally, UploadGrant, UploadPhase, UploadedMedia, VoteState, VoteTally,
    },
};
use tokio::sync::{oneshot, Mutex};

/// Feed backend whose answers are fixed per test.
struct FixedBackend {
    vote: Result<VoteTally, RemoteFailure>,
    grant: UploadGrant,
    vote_gate: Mutex<Option<oneshot::Receiver<()>>>,
    vote_calls: AtomicUsize,
    grant_calls: AtomicUsize,
    transfer_calls: AtomicUsize,
}

impl FixedBackend {
    fn new(vote: Result<VoteTally, RemoteFailure>) -> Self {
        Self {
            vote,
            grant: UploadGrant::Mock { message: None },
            vote_gate: Mutex::new(None),
            vote_calls: AtomicUsize::new(0),
            grant_calls: AtomicUsize::new(0),
            transfer_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VoteRemote for FixedBackend {
    async fn submit_vote(
        &self,
        _target: VoteTarget,
        _direction: VoteDirection,
    ) -> Result<VoteTally, RemoteFailure> {
        let gate = self.vote_gate.lock().await.take();
        self.vote_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.vote.clone()
    }
}

#[async_trait]
impl ShareRemote for FixedBackend {
    async fn submit_share(&self, _post_id: PostId) -> Result<ShareTally, RemoteFailure> {
        Ok(ShareTally::default())
    }
}

#[async_trait]
impl UploadRemote for FixedBackend {
    async fn request_grant(&self) -> Result<UploadGrant, RemoteFailure> {
        self.grant_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.grant.clone())
    }

    async fn transfer(
        &self,
        _grant: &RealGrant,
        _file: &MediaFile,
        _on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<UploadedMedia, RemoteFailure> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        Err(RemoteFailure::malformed("transfer not expected"))
    }
}

fn client(backend: &Arc<FixedBackend>) -> FeedClient {
    FeedClient::new_with_dependencies(
        UploadPolicy {
            mock_step_delay: Duration::ZERO,
            ..UploadPolicy::default()
        },
        backend.clone(),
        backend.clone(),
        backend.clone(),
    )
}

const POST: VoteTarget = VoteTarget::Post(PostId(100));

#[tokio::test]
async fn upvote_confirmed_by_server() {
    let backend = Arc::new(FixedBackend::new(Ok(VoteTally {
        upvotes: Some(6),
        downvotes: Some(1),
    })));
    let client = client(&backend);
    client.load_vote_state(POST, VoteState::new(5, 1, UserVote::None));

    let outcome = client.vote(POST, VoteDirection::Up).await;

    assert_eq!(
        outcome,
        MutationOutcome::Confirmed(VoteState::new(6, 1, UserVote::Up))
    );
}

#[tokio::test]
async fn upvote_reverted_when_server_fails() {
    let backend = Arc::new(FixedBackend::new(Err(RemoteFailure::transport(
        "connection reset",
    ))));
    let client = client(&backend);
    client.load_vote_state(POST, VoteState::new(5, 1, UserVote::None));

    client.vote(POST, VoteDirection::Up).await;

    assert_eq!(
        client.store().vote(&POST.entity()),
        VoteState::new(5, 1, UserVote::None)
    );
}

#[tokio::test]
async fn switching_from_up_to_down_predicts_both_counts() {
    let backend = Arc::new(FixedBackend::new(Ok(VoteTally::default())));
    let client = client(&backend);
    client.load_vote_state(POST, VoteState::new(5, 1, UserVote::Up));

    let outcome = client.vote(POST, VoteDirection::Down).await;

    assert_eq!(outcome.state(), Some(&VoteState::new(4, 2, UserVote::Down)));
}

#[tokio::test]
async fn click_during_pending_vote_is_dropped() {
    let backend = Arc::new(FixedBackend::new(Ok(VoteTally::default())));
    let (release, gate) = oneshot::channel();
    *backend.vote_gate.lock().await = Some(gate);
    let client = Arc::new(client(&backend));
    client.load_vote_state(POST, VoteState::new(5, 1, UserVote::None));

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.vote(POST, VoteDirection::Down).await })
    };
    while backend.vote_calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    let second = client.vote(POST, VoteDirection::Up).await;
    assert!(second.is_dropped());
    assert_eq!(
        client.store().vote(&POST.entity()),
        VoteState::new(5, 2, UserVote::Down)
    );

    release.send(()).expect("release");
    first.await.expect("join");
    assert_eq!(backend.vote_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn oversized_video_rejected_before_network() {
    let backend = Arc::new(FixedBackend::new(Ok(VoteTally::default())));
    let client = client(&backend);
    let video = MediaFile::new("lecture.mp4", "video/mp4", vec![0; 15 * 1024 * 1024]);

    let err = client.upload(video).await.expect_err("too large");

    assert!(matches!(
        err,
        UploadError::Validation(ValidationError::TooLarge { .. })
    ));
    assert_eq!(backend.grant_calls.load(Ordering::SeqCst), 0);
    assert_eq!(client.uploads().state().phase, UploadPhase::Idle);
}

#[tokio::test]
async fn mock_grant_completes_with_local_preview() {
    let backend = Arc::new(FixedBackend::new(Ok(VoteTally::default())));
    let client = client(&backend);
    let photo = MediaFile::new("quad.jpg", "image/jpeg", b"jpeg".to_vec());
    let preview = photo.preview_data_url();

    let media = client.upload(photo).await.expect("mock upload");

    assert_eq!(media.url, preview);
    let state = client.uploads().state();
    assert_eq!(state.phase, UploadPhase::Complete);
    assert_eq!(state.progress_percent, 100);
    assert_eq!(state.remote_result.map(|media| media.url), Some(preview));
    assert_eq!(backend.transfer_calls.load(Ordering::SeqCst), 0);
}
