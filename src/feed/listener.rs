use std::sync::Arc;

use crate::feed::snapshot::FeedSnapshot;

/// Receives messages published by an
/// [`IncrementalFeedStore`](super::IncrementalFeedStore).
///
/// Calls are made synchronously while the store's lock is held, so an
/// implementation must return promptly and must not call back into the store.
pub trait FeedListener: Send + Sync {
    /// The complete current dataset, sent on registration and after every
    /// full update.
    fn on_full_update(&self, snapshot: &FeedSnapshot);

    /// Only the entities that changed, plus tombstones for removed ids.
    fn on_differential_update(&self, delta: &FeedSnapshot);
}

/// Handle returned on registration, used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: u64,
    listeners: Vec<(ListenerId, Arc<dyn FeedListener>)>,
}

impl ListenerRegistry {
    pub(crate) fn register(&mut self, listener: Arc<dyn FeedListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn notify_full(&self, snapshot: &FeedSnapshot) {
        for (_, listener) in &self.listeners {
            listener.on_full_update(snapshot);
        }
    }

    pub(crate) fn notify_differential(&self, delta: &FeedSnapshot) {
        for (_, listener) in &self.listeners {
            listener.on_differential_update(delta);
        }
    }
}
