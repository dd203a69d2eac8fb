use super::*;
use shared::domain::{PostId, UploadId, UserVote};
use shared::protocol::UploadPhase;

fn post_vote(id: i64) -> EntityRef {
    EntityRef::PostVote {
        post_id: PostId(id),
    }
}

#[test]
fn unseen_entities_report_zero_state() {
    let store = EntityStore::new();

    assert_eq!(store.vote(&post_vote(1)), VoteState::default());
    assert_eq!(store.vote(&post_vote(1)).user_vote, UserVote::None);
    assert_eq!(
        store.share(&EntityRef::Share { post_id: PostId(1) }),
        ShareState::default()
    );
    let upload = store.upload(&EntityRef::Upload {
        upload_id: UploadId::new(),
    });
    assert_eq!(upload.phase, UploadPhase::Idle);
    assert!(!store.contains(&post_vote(1)));
}

#[test]
fn set_replaces_state_and_notifies_before_returning() {
    let store = EntityStore::new();
    let mut rx = store.subscribe();
    let state = VoteState::new(3, 1, UserVote::Down);

    store.set(post_vote(7), state);

    assert_eq!(store.get(&post_vote(7)), EntityState::Vote(state));
    match rx.try_recv().expect("event published synchronously") {
        FeedEvent::StateChanged { entity, state: EntityState::Vote(published) } => {
            assert_eq!(entity, post_vote(7));
            assert_eq!(published, state);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn typed_reads_fall_back_on_mismatched_variant() {
    let store = EntityStore::new();
    store.set(post_vote(2), ShareState::new(9));

    assert_eq!(store.vote(&post_vote(2)), VoteState::default());
    assert_eq!(store.get(&post_vote(2)), EntityState::Share(ShareState::new(9)));
}

#[test]
fn update_skips_write_when_closure_declines() {
    let store = EntityStore::new();
    let entity = EntityRef::Share { post_id: PostId(4) };
    store.set(entity, ShareState::new(2));
    let mut rx = store.subscribe();

    let unchanged = store.update(entity, |_| None);
    assert!(unchanged.is_none());
    assert!(rx.try_recv().is_err());

    let bumped = store.update(entity, |current| match current {
        EntityState::Share(state) => Some(state.incremented().into()),
        _ => None,
    });
    assert_eq!(bumped, Some(EntityState::Share(ShareState::new(3))));
    assert!(matches!(rx.try_recv(), Ok(FeedEvent::StateChanged { .. })));
}

#[test]
fn notices_reach_every_subscriber() {
    let store = EntityStore::new();
    let mut first = store.subscribe();
    let mut second = store.subscribe();

    store.notify(NoticeLevel::Error, "Vote failed");

    for rx in [&mut first, &mut second] {
        match rx.try_recv().expect("notice") {
            FeedEvent::Notice { level, message } => {
                assert_eq!(level, NoticeLevel::Error);
                assert_eq!(message, "Vote failed");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

#[test]
fn remove_forgets_entity_without_notifying() {
    let store = EntityStore::new();
    let entity = post_vote(4);
    store.set(entity, VoteState::new(2, 1, UserVote::Up));
    let mut rx = store.subscribe();

    assert_eq!(
        store.remove(&entity),
        Some(EntityState::Vote(VoteState::new(2, 1, UserVote::Up)))
    );
    assert!(!store.contains(&entity));
    assert_eq!(store.vote(&entity), VoteState::default());
    assert!(rx.try_recv().is_err());
    assert_eq!(store.remove(&entity), None);
}
