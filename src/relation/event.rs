//! Relation change events
//!
//! Captures pair-level changes so that derived views (join indexes) can be
//! maintained incrementally. Events are delivered synchronously, after the
//! storage is consistent again and before the mutating call returns.

use super::types::{ListenerId, RelationId};
use std::rc::{Rc, Weak};
use tracing::trace;

/// A single effective pair change, in the storage orientation of its relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<K, V> {
    Added { key: K, value: V },
    Removed { key: K, value: V },
}

impl<K, V> Change<K, V> {
    pub fn key(&self) -> &K {
        match self {
            Change::Added { key, .. } | Change::Removed { key, .. } => key,
        }
    }

    pub fn value(&self) -> &V {
        match self {
            Change::Added { value, .. } | Change::Removed { value, .. } => value,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, Change::Added { .. })
    }
}

/// A change tagged with the relation it happened in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationChange<K, V> {
    pub relation: RelationId,
    pub change: Change<K, V>,
}

impl<K, V> RelationChange<K, V> {
    pub fn added(relation: RelationId, key: K, value: V) -> Self {
        RelationChange {
            relation,
            change: Change::Added { key, value },
        }
    }

    pub fn removed(relation: RelationId, key: K, value: V) -> Self {
        RelationChange {
            relation,
            change: Change::Removed { key, value },
        }
    }
}

/// Ordered list of changes produced by one mutating call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationEvent<K, V> {
    pub changes: Vec<RelationChange<K, V>>,
}

impl<K, V> RelationEvent<K, V> {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Whether any change touches the given relation
    pub fn touches(&self, relation: RelationId) -> bool {
        self.changes.iter().any(|c| c.relation == relation)
    }
}

/// Subscriber to relation events
///
/// Listeners receive changes in the storage orientation of each relation
/// (see `BiMultiMap::is_inverted`). An event may contain changes of relations
/// the listener never subscribed to when several relations are mutated by one
/// graph operation; such changes should be ignored.
pub trait RelationListener<K, V> {
    fn on_event(&self, event: &RelationEvent<K, V>);
}

/// Weakly held subscription stored inside a relation
pub(crate) struct Subscriber<K, V> {
    pub(crate) id: ListenerId,
    pub(crate) listener: Weak<dyn RelationListener<K, V>>,
}

/// Live listener collected for dispatch
pub(crate) type LiveListener<K, V> = (ListenerId, Rc<dyn RelationListener<K, V>>);

/// Changes gathered across several relations, delivered as one event
///
/// Each listener is called once, even if it subscribed to several of the
/// relations that changed.
pub(crate) struct ChangeBatch<K, V> {
    changes: Vec<RelationChange<K, V>>,
    listeners: Vec<LiveListener<K, V>>,
}

impl<K, V> ChangeBatch<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            changes: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, change: RelationChange<K, V>) {
        self.changes.push(change);
    }

    pub(crate) fn extend(&mut self, changes: impl IntoIterator<Item = RelationChange<K, V>>) {
        self.changes.extend(changes);
    }

    pub(crate) fn listen(&mut self, listeners: Vec<LiveListener<K, V>>) {
        for (id, listener) in listeners {
            if !self.listeners.iter().any(|(seen, _)| *seen == id) {
                self.listeners.push((id, listener));
            }
        }
    }

    pub(crate) fn dispatch(self) {
        if self.changes.is_empty() {
            return;
        }
        let event = RelationEvent {
            changes: self.changes,
        };
        for (id, listener) in &self.listeners {
            trace!("Dispatching {} changes to {}", event.len(), id);
            listener.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recorder {
        seen: RefCell<Vec<usize>>,
    }

    impl RelationListener<u32, u32> for Recorder {
        fn on_event(&self, event: &RelationEvent<u32, u32>) {
            self.seen.borrow_mut().push(event.len());
        }
    }

    #[test]
    fn test_batch_calls_each_listener_once() {
        let recorder = Rc::new(Recorder {
            seen: RefCell::new(Vec::new()),
        });
        let id = ListenerId::fresh();
        let as_dyn: Rc<dyn RelationListener<u32, u32>> = recorder.clone();

        let mut batch = ChangeBatch::new();
        batch.listen(vec![(id, as_dyn.clone())]);
        batch.listen(vec![(id, as_dyn)]);
        batch.push(RelationChange::added(RelationId(1), 1, 2));
        batch.push(RelationChange::removed(RelationId(2), 3, 4));
        batch.dispatch();

        assert_eq!(*recorder.seen.borrow(), vec![2]);
    }

    #[test]
    fn test_empty_batch_is_silent() {
        let recorder = Rc::new(Recorder {
            seen: RefCell::new(Vec::new()),
        });
        let as_dyn: Rc<dyn RelationListener<u32, u32>> = recorder.clone();
        let mut batch = ChangeBatch::new();
        batch.listen(vec![(ListenerId::fresh(), as_dyn)]);
        batch.dispatch();
        assert!(recorder.seen.borrow().is_empty());
    }

    #[test]
    fn test_change_accessors() {
        let change: Change<&str, &str> = Change::Removed {
            key: "alice",
            value: "math",
        };
        assert_eq!(*change.key(), "alice");
        assert_eq!(*change.value(), "math");
        assert!(!change.is_added());
    }
}
