//! Process-wide entity state: the last applied (predicted or authoritative)
//! value for every vote tally, share counter and upload the view has touched.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use shared::{
    domain::EntityRef,
    protocol::{EntityState, ShareState, UploadState, VoteState},
};
use tokio::sync::broadcast;
use tracing::trace;

use crate::{FeedEvent, NoticeLevel};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub struct EntityStore {
    entries: RwLock<HashMap<EntityRef, EntityState>>,
    events: broadcast::Sender<FeedEvent>,
}

impl EntityStore {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            events,
        })
    }

    /// Last applied state, or the zero state for the entity's kind.
    pub fn get(&self, entity: &EntityRef) -> EntityState {
        self.entries
            .read()
            .get(entity)
            .cloned()
            .unwrap_or_else(|| EntityState::default_for(entity))
    }

    /// Replaces the entity's state and notifies subscribers before returning.
    pub fn set(&self, entity: EntityRef, state: impl Into<EntityState>) {
        let state = state.into();
        self.entries.write().insert(entity, state.clone());
        self.publish_state(entity, state);
    }

    /// Applies `f` to the current state under the write lock. Returning `None`
    /// leaves the entry untouched and emits nothing.
    pub fn update<F>(&self, entity: EntityRef, f: F) -> Option<EntityState>
    where
        F: FnOnce(&EntityState) -> Option<EntityState>,
    {
        let next = {
            let mut entries = self.entries.write();
            let current = entries
                .get(&entity)
                .cloned()
                .unwrap_or_else(|| EntityState::default_for(&entity));
            let next = f(&current)?;
            entries.insert(entity, next.clone());
            next
        };
        self.publish_state(entity, next.clone());
        Some(next)
    }

    pub fn vote(&self, entity: &EntityRef) -> VoteState {
        match self.get(entity) {
            EntityState::Vote(state) => state,
            _ => VoteState::default(),
        }
    }

    pub fn share(&self, entity: &EntityRef) -> ShareState {
        match self.get(entity) {
            EntityState::Share(state) => state,
            _ => ShareState::default(),
        }
    }

    pub fn upload(&self, entity: &EntityRef) -> UploadState {
        match self.get(entity) {
            EntityState::Upload(state) => state,
            _ => UploadState::default(),
        }
    }

    /// Forgets the entity. Subscribers are not notified; later reads see the
    /// zero state again.
    pub fn remove(&self, entity: &EntityRef) -> Option<EntityState> {
        let removed = self.entries.write().remove(entity);
        if removed.is_some() {
            trace!(entity = %entity, "entity state dropped");
        }
        removed
    }

    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.entries.read().contains_key(entity)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let _ = self.events.send(FeedEvent::Notice {
            level,
            message: message.into(),
        });
    }

    fn publish_state(&self, entity: EntityRef, state: EntityState) {
        trace!(entity = %entity, "entity state replaced");
        // No subscribers is fine: nothing is rendering this entity yet.
        let _ = self.events.send(FeedEvent::StateChanged { entity, state });
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
