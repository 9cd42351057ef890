use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::feed::listener::{FeedListener, ListenerId, ListenerRegistry};
use crate::feed::snapshot::{FeedHeaderDefaults, FeedSnapshot};
use crate::gtfs_rt::FeedEntity;
use crate::gtfs_rt::feed_header::Incrementality;

/// The authoritative entity set of one feed topic.
///
/// Each mutation consumes one incremental index: the value it publishes in
/// its header. The cached full snapshot reports the index of the most recent
/// mutation, so a consumer holding index `n` knows whether it saw `n + 1`.
///
/// One mutex guards the entities, the snapshot cache and the listener list.
/// Listeners run under it, which serializes publication against readers and
/// guarantees a newly added listener sees a baseline no update can slip past.
pub struct IncrementalFeedStore {
    heartbeat_interval: u32,
    state: Mutex<StoreState>,
}

struct StoreState {
    defaults: FeedHeaderDefaults,
    entities: HashMap<String, FeedEntity>,
    order: Vec<String>,
    cached: Option<Arc<FeedSnapshot>>,
    next_index: u64,
    listeners: ListenerRegistry,
}

impl StoreState {
    fn upsert(&mut self, entity: FeedEntity) {
        if !self.entities.contains_key(&entity.id) {
            self.order.push(entity.id.clone());
        }
        self.entities.insert(entity.id.clone(), entity);
    }

    fn consume_index(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        self.cached = None;
        index
    }

    fn snapshot(&mut self, heartbeat_interval: u32) -> Arc<FeedSnapshot> {
        if let Some(cached) = &self.cached {
            return Arc::clone(cached);
        }

        let entity = self
            .order
            .iter()
            .filter_map(|id| self.entities.get(id).cloned())
            .collect();
        let snapshot = Arc::new(FeedSnapshot::build(
            Incrementality::FullDataset,
            self.next_index - 1,
            heartbeat_interval,
            now(),
            &self.defaults,
            entity,
        ));
        self.cached = Some(Arc::clone(&snapshot));
        snapshot
    }
}

impl IncrementalFeedStore {
    pub fn new(heartbeat_interval: u32) -> Self {
        Self {
            heartbeat_interval,
            state: Mutex::new(StoreState {
                defaults: FeedHeaderDefaults::default(),
                entities: HashMap::new(),
                order: Vec::new(),
                cached: None,
                next_index: 1,
                listeners: ListenerRegistry::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_feed_header_defaults(&self, defaults: FeedHeaderDefaults) {
        let mut state = self.lock();
        state.defaults = defaults;
        state.cached = None;
    }

    /// Replaces every entity and publishes the new full dataset.
    /// Returns the incremental index of the update.
    pub fn apply_full_update(&self, entities: Vec<FeedEntity>) -> u64 {
        let mut state = self.lock();

        state.entities.clear();
        state.order.clear();
        for entity in entities {
            state.upsert(entity);
        }
        let index = state.consume_index();

        let snapshot = state.snapshot(self.heartbeat_interval);
        debug!(
            index,
            entities = snapshot.entities().len(),
            listeners = state.listeners.len(),
            "Publishing full update"
        );
        state.listeners.notify_full(&snapshot);
        index
    }

    /// Merges `added` (replacing by id), drops `removed_ids`, and publishes
    /// only the delta. Returns the incremental index of the update.
    pub fn apply_differential_update(
        &self,
        added: Vec<FeedEntity>,
        removed_ids: Vec<String>,
    ) -> u64 {
        let mut state = self.lock();

        for entity in &added {
            state.upsert(entity.clone());
        }
        let removed: HashSet<&str> = removed_ids.iter().map(String::as_str).collect();
        state.entities.retain(|id, _| !removed.contains(id.as_str()));
        state.order.retain(|id| !removed.contains(id.as_str()));
        let index = state.consume_index();

        let mut delta = added;
        delta.extend(removed_ids.iter().map(|id| FeedEntity {
            id: id.clone(),
            is_deleted: Some(true),
            ..Default::default()
        }));
        let delta = FeedSnapshot::build(
            Incrementality::Differential,
            index,
            self.heartbeat_interval,
            now(),
            &state.defaults,
            delta,
        );

        debug!(
            index,
            changed = delta.entities().len(),
            listeners = state.listeners.len(),
            "Publishing differential update"
        );
        state.listeners.notify_differential(&delta);
        index
    }

    /// The full dataset as of the last mutation, rebuilt only when stale.
    pub fn current_snapshot(&self) -> Arc<FeedSnapshot> {
        self.lock().snapshot(self.heartbeat_interval)
    }

    /// Registers `listener` and hands it the current full dataset before any
    /// further update can be published.
    pub fn add_listener(&self, listener: Arc<dyn FeedListener>) -> ListenerId {
        let mut state = self.lock();
        let snapshot = state.snapshot(self.heartbeat_interval);
        listener.on_full_update(&snapshot);
        state.listeners.register(listener)
    }

    /// Deregisters a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.lock().listeners.remove(id)
    }

    pub fn len(&self) -> usize {
        self.lock().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        received: Mutex<Vec<FeedSnapshot>>,
    }

    impl Recorder {
        fn received(&self) -> Vec<FeedSnapshot> {
            self.received.lock().unwrap().clone()
        }
    }

    impl FeedListener for Recorder {
        fn on_full_update(&self, snapshot: &FeedSnapshot) {
            self.received.lock().unwrap().push(snapshot.clone());
        }

        fn on_differential_update(&self, delta: &FeedSnapshot) {
            self.received.lock().unwrap().push(delta.clone());
        }
    }

    fn entity(id: &str) -> FeedEntity {
        FeedEntity {
            id: id.to_string(),
            ..Default::default()
        }
    }

    fn ids(snapshot: &FeedSnapshot) -> Vec<&str> {
        snapshot.entities().iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_empty_store_snapshot() {
        let store = IncrementalFeedStore::new(60);
        let snapshot = store.current_snapshot();
        assert!(snapshot.is_full_dataset());
        assert!(snapshot.entities().is_empty());
        assert_eq!(snapshot.incremental_index(), 0);
        assert_eq!(snapshot.heartbeat_interval(), 60);
    }

    #[test]
    fn test_full_then_differential() {
        let store = IncrementalFeedStore::new(60);

        let first = store.apply_full_update(vec![entity("A"), entity("B")]);
        let second = store.apply_differential_update(vec![entity("C")], vec!["A".into()]);

        assert!(second > first);
        let snapshot = store.current_snapshot();
        assert_eq!(ids(&snapshot), vec!["B", "C"]);
        assert_eq!(snapshot.incremental_index(), second);
    }

    #[test]
    fn test_full_update_replaces_everything() {
        let store = IncrementalFeedStore::new(60);
        store.apply_full_update(vec![entity("A"), entity("B")]);
        store.apply_full_update(vec![entity("C")]);

        assert_eq!(ids(&store.current_snapshot()), vec!["C"]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_differential_replaces_by_id_in_place() {
        let store = IncrementalFeedStore::new(60);
        store.apply_full_update(vec![entity("A"), entity("B")]);

        let mut updated = entity("A");
        updated.is_deleted = Some(false);
        store.apply_differential_update(vec![updated], vec![]);

        let snapshot = store.current_snapshot();
        assert_eq!(ids(&snapshot), vec!["A", "B"]);
        assert_eq!(snapshot.entities()[0].is_deleted, Some(false));
    }

    #[test]
    fn test_snapshot_is_cached_until_mutation() {
        let store = IncrementalFeedStore::new(60);
        store.apply_full_update(vec![entity("A")]);

        let a = store.current_snapshot();
        let b = store.current_snapshot();
        assert!(Arc::ptr_eq(&a, &b));

        store.apply_differential_update(vec![], vec!["A".into()]);
        let c = store.current_snapshot();
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(c.entities().is_empty());
    }

    #[test]
    fn test_listeners_get_full_then_delta() {
        let store = IncrementalFeedStore::new(60);
        let recorder = Arc::new(Recorder::default());
        store.add_listener(recorder.clone());

        store.apply_full_update(vec![entity("A"), entity("B")]);
        store.apply_differential_update(vec![entity("C")], vec!["A".into()]);

        let received = recorder.received();
        assert_eq!(received.len(), 3);
        assert!(received[0].is_full_dataset());
        assert!(received[1].is_full_dataset());
        assert_eq!(ids(&received[1]), vec!["A", "B"]);

        let delta = &received[2];
        assert!(!delta.is_full_dataset());
        assert_eq!(ids(delta), vec!["C", "A"]);
        assert_eq!(delta.entities()[1].is_deleted, Some(true));
        assert!(delta.incremental_index() > received[1].incremental_index());
    }

    #[test]
    fn test_late_listener_gets_current_full_state() {
        let store = IncrementalFeedStore::new(60);
        store.apply_full_update(vec![entity("A"), entity("B")]);
        store.apply_differential_update(vec![entity("C")], vec!["A".into()]);
        store.apply_differential_update(vec![entity("D")], vec![]);

        let recorder = Arc::new(Recorder::default());
        store.add_listener(recorder.clone());

        let received = recorder.received();
        assert_eq!(received.len(), 1);
        assert!(received[0].is_full_dataset());
        assert_eq!(ids(&received[0]), vec!["B", "C", "D"]);
        assert_eq!(received[0], *store.current_snapshot());
    }

    #[test]
    fn test_removed_listener_is_not_notified() {
        let store = IncrementalFeedStore::new(60);
        let recorder = Arc::new(Recorder::default());
        let id = store.add_listener(recorder.clone());

        assert!(store.remove_listener(id));
        assert!(!store.remove_listener(id));
        store.apply_full_update(vec![entity("A")]);

        assert_eq!(recorder.received().len(), 1);
    }

    #[test]
    fn test_header_defaults_are_applied() {
        let store = IncrementalFeedStore::new(60);
        store.set_feed_header_defaults(FeedHeaderDefaults {
            feed_version: Some("v2".into()),
        });
        let snapshot = store.current_snapshot();
        assert_eq!(snapshot.message().header.feed_version.as_deref(), Some("v2"));
    }

    #[test]
    fn test_concurrent_readers_see_consistent_snapshots() {
        let store = Arc::new(IncrementalFeedStore::new(60));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let snapshot = store.current_snapshot();
                        // every full update below carries exactly two entities
                        let n = snapshot.entities().len();
                        assert!(n == 0 || n == 2);
                    }
                })
            })
            .collect();

        for i in 0..50 {
            store.apply_full_update(vec![entity(&format!("{i}a")), entity(&format!("{i}b"))]);
        }
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(store.current_snapshot().incremental_index(), 50);
    }
}
