use super::*;
use shared::{
    domain::{CommentId, UserVote},
    protocol::UploadPhase,
};

fn offline_client() -> FeedClient {
    FeedClient::new(UploadPolicy::default())
}

#[tokio::test]
async fn offline_vote_rolls_back_and_posts_notice() {
    let client = offline_client();
    let target = VoteTarget::Comment(CommentId(3));
    client.load_vote_state(target, VoteState::new(2, 0, UserVote::None));
    let mut events = client.subscribe_events();

    let outcome = client.vote(target, VoteDirection::Up).await;

    assert_eq!(outcome.state(), Some(&VoteState::new(2, 0, UserVote::None)));
    let mut notice = None;
    while let Ok(event) = events.try_recv() {
        if let FeedEvent::Notice { level, message } = event {
            notice = Some((level, message));
        }
    }
    let (level, message) = notice.expect("failure notice");
    assert_eq!(level, NoticeLevel::Error);
    assert_eq!(message, "Vote failed: vote backend unavailable");
}

#[tokio::test]
async fn offline_share_leaves_loaded_count_untouched() {
    let client = offline_client();
    client.load_share_state(PostId(8), ShareState::new(5));

    let outcome = client.share(PostId(8)).await;

    assert_eq!(outcome.state(), Some(&ShareState::new(5)));
    assert_eq!(
        client.store().share(&EntityRef::Share { post_id: PostId(8) }),
        ShareState::new(5)
    );
    assert_eq!(client.guard().in_flight(), 0);
}

#[tokio::test]
async fn offline_upload_fails_after_preview() {
    let client = offline_client();

    let err = client
        .upload(MediaFile::new("a.png", "image/png", vec![1, 2, 3]))
        .await
        .expect_err("no media backend");

    assert!(matches!(err, UploadError::Remote(_)));
    assert_eq!(client.uploads().state().phase, UploadPhase::Failed);
}

#[test]
fn settings_with_bad_url_do_not_build_a_client() {
    let settings = ClientSettings {
        api_base_url: "localhost:8000/api".into(),
        ..ClientSettings::default()
    };
    assert!(FeedClient::from_settings(&settings).is_err());
}
