//! Bidirectional many-to-many map
//!
//! A `BiMultiMap<K, V>` is a set of `(key, value)` pairs that can be queried
//! efficiently from either side:
//! - forward: `key -> {values}`
//! - inverse: `value -> {keys}`
//!
//! Invariants held at all times:
//! - `v ∈ forward[k]` iff `k ∈ inverse[v]`
//! - no key or value maps to an empty bucket
//! - keys and values iterate in first-insertion order
//!
//! A `BiMultiMap` is a *handle*. Cloning it, or taking its `inverse()`,
//! yields another handle onto the same storage, and mutation through any
//! handle is visible through all of them. `copy()` is the only way to get an
//! independent duplicate.
//!
//! The structures are single-threaded (`Rc`/`RefCell`). Buckets returned by
//! `get` borrow the storage: drop them before mutating the relation, or the
//! mutation panics on the shared borrow.

use super::error::{RelationError, RelationResult};
use super::event::{ChangeBatch, LiveListener, RelationChange, RelationListener, Subscriber};
use super::types::{Element, ListenerId, RelationId};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxBuildHasher;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Insertion-ordered set used for every bucket
pub type ValueSet<V> = IndexSet<V, FxBuildHasher>;

type Buckets<K, V> = IndexMap<K, ValueSet<V>, FxBuildHasher>;

/// Shared storage behind one relation and all of its handles
pub(crate) struct Storage<K, V> {
    id: RelationId,
    forward: Buckets<K, V>,
    backward: Buckets<V, K>,
    subscribers: Vec<Subscriber<K, V>>,
}

impl<K: Element, V: Element> Storage<K, V> {
    fn new() -> Self {
        Self {
            id: RelationId::fresh(),
            forward: Buckets::default(),
            backward: Buckets::default(),
            subscribers: Vec::new(),
        }
    }

    fn insert(&mut self, key: K, value: V) -> Option<RelationChange<K, V>> {
        let fresh = self
            .forward
            .entry(key.clone())
            .or_default()
            .insert(value.clone());
        if !fresh {
            return None;
        }
        self.backward
            .entry(value.clone())
            .or_default()
            .insert(key.clone());
        trace!("Added pair to {}", self.id);
        Some(RelationChange::added(self.id, key, value))
    }

    fn remove_pair(&mut self, key: &K, value: &V) -> Option<RelationChange<K, V>> {
        let values = self.forward.get_mut(key)?;
        if !values.shift_remove(value) {
            return None;
        }
        if values.is_empty() {
            self.forward.shift_remove(key);
        }
        if let Some(keys) = self.backward.get_mut(value) {
            keys.shift_remove(key);
            if keys.is_empty() {
                self.backward.shift_remove(value);
            }
        }
        trace!("Removed pair from {}", self.id);
        Some(RelationChange::removed(self.id, key.clone(), value.clone()))
    }

    fn remove_left(&mut self, key: &K) -> Option<Vec<RelationChange<K, V>>> {
        let values = self.forward.shift_remove(key)?;
        let mut changes = Vec::with_capacity(values.len());
        for value in values {
            if let Some(keys) = self.backward.get_mut(&value) {
                keys.shift_remove(key);
                if keys.is_empty() {
                    self.backward.shift_remove(&value);
                }
            }
            changes.push(RelationChange::removed(self.id, key.clone(), value));
        }
        trace!("Removed key with {} pairs from {}", changes.len(), self.id);
        Some(changes)
    }

    fn remove_right(&mut self, value: &V) -> Option<Vec<RelationChange<K, V>>> {
        let keys = self.backward.shift_remove(value)?;
        let mut changes = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(values) = self.forward.get_mut(&key) {
                values.shift_remove(value);
                if values.is_empty() {
                    self.forward.shift_remove(&key);
                }
            }
            changes.push(RelationChange::removed(self.id, key, value.clone()));
        }
        trace!("Removed value with {} pairs from {}", changes.len(), self.id);
        Some(changes)
    }

    fn set_left(&mut self, key: K, values: Vec<V>) -> Vec<RelationChange<K, V>> {
        let current: Vec<V> = self
            .forward
            .get(&key)
            .map(|vs| vs.iter().cloned().collect())
            .unwrap_or_default();
        let mut changes = Vec::new();
        for old in current.iter().filter(|v| !values.contains(v)) {
            changes.extend(self.remove_pair(&key, old));
        }
        for value in values {
            changes.extend(self.insert(key.clone(), value));
        }
        changes
    }

    fn set_right(&mut self, value: V, keys: Vec<K>) -> Vec<RelationChange<K, V>> {
        let current: Vec<K> = self
            .backward
            .get(&value)
            .map(|ks| ks.iter().cloned().collect())
            .unwrap_or_default();
        let mut changes = Vec::new();
        for old in current.iter().filter(|k| !keys.contains(k)) {
            changes.extend(self.remove_pair(old, &value));
        }
        for key in keys {
            changes.extend(self.insert(key, value.clone()));
        }
        changes
    }

    fn replace_left(&mut self, key: &K, new_key: K) -> Vec<RelationChange<K, V>> {
        if *key == new_key {
            return Vec::new();
        }
        let mut changes = self.remove_left(key).unwrap_or_default();
        let moved: Vec<V> = changes.iter().map(|c| c.change.value().clone()).collect();
        for value in moved {
            changes.extend(self.insert(new_key.clone(), value));
        }
        changes
    }

    fn replace_right(&mut self, value: &V, new_value: V) -> Vec<RelationChange<K, V>> {
        if *value == new_value {
            return Vec::new();
        }
        let mut changes = self.remove_right(value).unwrap_or_default();
        let moved: Vec<K> = changes.iter().map(|c| c.change.key().clone()).collect();
        for key in moved {
            changes.extend(self.insert(key, new_value.clone()));
        }
        changes
    }

    fn live_listeners(&mut self) -> Vec<LiveListener<K, V>> {
        let before = self.subscribers.len();
        let mut live = Vec::with_capacity(before);
        self.subscribers.retain(|sub| match sub.listener.upgrade() {
            Some(listener) => {
                live.push((sub.id, listener));
                true
            }
            None => false,
        });
        if live.len() < before {
            debug!(
                "Pruned {} dropped listeners from {}",
                before - live.len(),
                self.id
            );
        }
        live
    }

    fn is_consistent(&self) -> bool {
        let forward_ok = self.forward.iter().all(|(k, vs)| {
            !vs.is_empty()
                && vs
                    .iter()
                    .all(|v| self.backward.get(v).map_or(false, |ks| ks.contains(k)))
        });
        let backward_ok = self.backward.iter().all(|(v, ks)| {
            !ks.is_empty()
                && ks
                    .iter()
                    .all(|k| self.forward.get(k).map_or(false, |vs| vs.contains(v)))
        });
        forward_ok && backward_ok
    }
}

/// Deliver the changes of one call to the relation's own subscribers
fn commit<A: Element, B: Element>(
    storage: &Rc<RefCell<Storage<A, B>>>,
    changes: Vec<RelationChange<A, B>>,
) {
    if changes.is_empty() {
        return;
    }
    let listeners = storage.borrow_mut().live_listeners();
    let mut batch = ChangeBatch::new();
    batch.listen(listeners);
    batch.extend(changes);
    batch.dispatch();
}

enum Handle<K, V> {
    Forward(Rc<RefCell<Storage<K, V>>>),
    Backward(Rc<RefCell<Storage<V, K>>>),
}

impl<K, V> Clone for Handle<K, V> {
    fn clone(&self) -> Self {
        match self {
            Handle::Forward(s) => Handle::Forward(Rc::clone(s)),
            Handle::Backward(s) => Handle::Backward(Rc::clone(s)),
        }
    }
}

/// Bidirectional many-to-many relation
pub struct BiMultiMap<K, V> {
    handle: Handle<K, V>,
}

impl<K, V> Clone for BiMultiMap<K, V> {
    /// Another handle onto the same storage (not a copy, see `copy()`)
    fn clone(&self) -> Self {
        BiMultiMap {
            handle: self.handle.clone(),
        }
    }
}

impl<K: Element, V: Element> BiMultiMap<K, V> {
    /// Create an empty relation
    pub fn new() -> Self {
        BiMultiMap {
            handle: Handle::Forward(Rc::new(RefCell::new(Storage::new()))),
        }
    }

    /// Create a relation from a sequence of pairs
    pub fn from_pairs(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        let map = Self::new();
        map.extend(pairs);
        map
    }

    /// Identity of the underlying storage (shared with the inverse)
    pub fn relation_id(&self) -> RelationId {
        match &self.handle {
            Handle::Forward(s) => s.borrow().id,
            Handle::Backward(s) => s.borrow().id,
        }
    }

    /// Whether this handle views the storage key/value-swapped
    pub fn is_inverted(&self) -> bool {
        matches!(self.handle, Handle::Backward(_))
    }

    /// Whether both handles share the same storage (in either orientation)
    pub fn is_same<A, B>(&self, other: &BiMultiMap<A, B>) -> bool
    where
        A: Element,
        B: Element,
    {
        self.relation_id() == other.relation_id()
    }

    /// The inverse relation over the same storage
    pub fn inverse(&self) -> BiMultiMap<V, K> {
        let handle = match &self.handle {
            Handle::Forward(s) => Handle::Backward(Rc::clone(s)),
            Handle::Backward(s) => Handle::Forward(Rc::clone(s)),
        };
        BiMultiMap { handle }
    }

    fn side(&self) -> Ref<'_, Buckets<K, V>> {
        match &self.handle {
            Handle::Forward(s) => Ref::map(s.borrow(), |s| &s.forward),
            Handle::Backward(s) => Ref::map(s.borrow(), |s| &s.backward),
        }
    }

    fn other_side(&self) -> Ref<'_, Buckets<V, K>> {
        match &self.handle {
            Handle::Forward(s) => Ref::map(s.borrow(), |s| &s.backward),
            Handle::Backward(s) => Ref::map(s.borrow(), |s| &s.forward),
        }
    }

    /// Insert a pair; returns false if it was already present
    pub fn add(&self, key: K, value: V) -> bool {
        match &self.handle {
            Handle::Forward(s) => {
                let change = s.borrow_mut().insert(key, value);
                let added = change.is_some();
                commit(s, change.into_iter().collect());
                added
            }
            Handle::Backward(s) => {
                let change = s.borrow_mut().insert(value, key);
                let added = change.is_some();
                commit(s, change.into_iter().collect());
                added
            }
        }
    }

    /// Insert every pair, reported to listeners as one event
    pub fn extend(&self, pairs: impl IntoIterator<Item = (K, V)>) {
        match &self.handle {
            Handle::Forward(s) => {
                let changes: Vec<_> = {
                    let mut storage = s.borrow_mut();
                    pairs
                        .into_iter()
                        .filter_map(|(k, v)| storage.insert(k, v))
                        .collect()
                };
                commit(s, changes);
            }
            Handle::Backward(s) => {
                let changes: Vec<_> = {
                    let mut storage = s.borrow_mut();
                    pairs
                        .into_iter()
                        .filter_map(|(k, v)| storage.insert(v, k))
                        .collect()
                };
                commit(s, changes);
            }
        }
    }

    /// Remove a pair
    ///
    /// Fails with `PairNotFound` if the pair is absent.
    pub fn remove(&self, key: &K, value: &V) -> RelationResult<()> {
        let removed = match &self.handle {
            Handle::Forward(s) => {
                let change = s.borrow_mut().remove_pair(key, value);
                let removed = change.is_some();
                commit(s, change.into_iter().collect());
                removed
            }
            Handle::Backward(s) => {
                let change = s.borrow_mut().remove_pair(value, key);
                let removed = change.is_some();
                commit(s, change.into_iter().collect());
                removed
            }
        };
        if removed {
            Ok(())
        } else {
            Err(RelationError::PairNotFound(self.relation_id()))
        }
    }

    /// Remove a key and every pair it participates in
    ///
    /// Fails with `KeyNotFound` if the key is absent.
    pub fn remove_key(&self, key: &K) -> RelationResult<()> {
        let found = match &self.handle {
            Handle::Forward(s) => {
                let changes = s.borrow_mut().remove_left(key);
                changes.map(|changes| commit(s, changes)).is_some()
            }
            Handle::Backward(s) => {
                let changes = s.borrow_mut().remove_right(key);
                changes.map(|changes| commit(s, changes)).is_some()
            }
        };
        if found {
            Ok(())
        } else {
            Err(RelationError::KeyNotFound(self.relation_id()))
        }
    }

    /// Remove a value and every pair it participates in
    ///
    /// Fails with `ValueNotFound` if the value is absent.
    pub fn remove_value(&self, value: &V) -> RelationResult<()> {
        let found = match &self.handle {
            Handle::Forward(s) => {
                let changes = s.borrow_mut().remove_right(value);
                changes.map(|changes| commit(s, changes)).is_some()
            }
            Handle::Backward(s) => {
                let changes = s.borrow_mut().remove_left(value);
                changes.map(|changes| commit(s, changes)).is_some()
            }
        };
        if found {
            Ok(())
        } else {
            Err(RelationError::ValueNotFound(self.relation_id()))
        }
    }

    /// Make `values` the exact value set of `key`
    ///
    /// Missing values are removed, new ones added; an empty `values` removes
    /// the key entirely.
    pub fn set_values(&self, key: K, values: impl IntoIterator<Item = V>) {
        let values: Vec<V> = values.into_iter().collect();
        match &self.handle {
            Handle::Forward(s) => {
                let changes = s.borrow_mut().set_left(key, values);
                commit(s, changes);
            }
            Handle::Backward(s) => {
                let changes = s.borrow_mut().set_right(key, values);
                commit(s, changes);
            }
        }
    }

    /// Move every pair of `key` onto `new_key`, merging with an existing
    /// `new_key` bucket. No-op if `key` is absent.
    pub fn replace(&self, key: &K, new_key: K) {
        match &self.handle {
            Handle::Forward(s) => {
                let changes = s.borrow_mut().replace_left(key, new_key);
                commit(s, changes);
            }
            Handle::Backward(s) => {
                let changes = s.borrow_mut().replace_right(key, new_key);
                commit(s, changes);
            }
        }
    }

    /// Live view of the values of `key` (empty if absent)
    pub fn get(&self, key: &K) -> Bucket<'_, V> {
        Bucket {
            set: Ref::filter_map(self.side(), |side| side.get(key)).ok(),
        }
    }

    /// Live view of the keys of `value` (empty if absent)
    pub fn get_inverse(&self, value: &V) -> Bucket<'_, K> {
        Bucket {
            set: Ref::filter_map(self.other_side(), |side| side.get(value)).ok(),
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.side().contains_key(key)
    }

    pub fn contains_value(&self, value: &V) -> bool {
        self.other_side().contains_key(value)
    }

    pub fn contains(&self, key: &K, value: &V) -> bool {
        self.side().get(key).map_or(false, |vs| vs.contains(value))
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.side().len()
    }

    pub fn is_empty(&self) -> bool {
        self.side().is_empty()
    }

    /// Number of pairs
    pub fn pair_count(&self) -> usize {
        self.side().values().map(|vs| vs.len()).sum()
    }

    /// Keys in first-insertion order
    pub fn keys(&self) -> Vec<K> {
        self.side().keys().cloned().collect()
    }

    /// Values in first-insertion order
    pub fn values(&self) -> Vec<V> {
        self.other_side().keys().cloned().collect()
    }

    /// Lazily iterate pairs: key order, then value order within each key
    pub fn iter_pairs(&self) -> Pairs<'_, K, V> {
        Pairs {
            side: self.side(),
            key_idx: 0,
            value_idx: 0,
        }
    }

    /// Independent deep duplicate with its own storage and no listeners
    pub fn copy(&self) -> Self {
        let storage = Storage {
            id: RelationId::fresh(),
            forward: self.side().clone(),
            backward: self.other_side().clone(),
            subscribers: Vec::new(),
        };
        debug_assert!(storage.is_consistent(), "copied relation violates I1/I2");
        BiMultiMap {
            handle: Handle::Forward(Rc::new(RefCell::new(storage))),
        }
    }

    /// Check that forward and inverse views agree and hold no empty bucket
    pub fn is_consistent(&self) -> bool {
        match &self.handle {
            Handle::Forward(s) => s.borrow().is_consistent(),
            Handle::Backward(s) => s.borrow().is_consistent(),
        }
    }

    /// Subscribe a listener to this relation's storage
    ///
    /// The listener is held weakly; once every strong reference to it is
    /// dropped it is pruned on the next mutation. Events are reported in the
    /// storage orientation, hence the listener must accept both orientations.
    pub fn subscribe<L>(&self, listener: &Rc<L>) -> ListenerId
    where
        K: 'static,
        V: 'static,
        L: RelationListener<K, V> + RelationListener<V, K> + 'static,
    {
        let id = ListenerId::fresh();
        self.subscribe_with_id(id, listener);
        id
    }

    /// Subscribe under an existing id, so a listener watching several
    /// relations is called once per multi-relation event
    pub fn subscribe_with_id<L>(&self, id: ListenerId, listener: &Rc<L>)
    where
        K: 'static,
        V: 'static,
        L: RelationListener<K, V> + RelationListener<V, K> + 'static,
    {
        match &self.handle {
            Handle::Forward(s) => {
                let weak = Rc::downgrade(listener);
                let weak: Weak<dyn RelationListener<K, V>> = weak;
                s.borrow_mut().subscribers.push(Subscriber { id, listener: weak });
            }
            Handle::Backward(s) => {
                let weak = Rc::downgrade(listener);
                let weak: Weak<dyn RelationListener<V, K>> = weak;
                s.borrow_mut().subscribers.push(Subscriber { id, listener: weak });
            }
        }
        debug!("Subscribed {} to {}", id, self.relation_id());
    }

    /// Remove a subscription; returns false if the id was not subscribed
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let removed = match &self.handle {
            Handle::Forward(s) => {
                let mut storage = s.borrow_mut();
                let before = storage.subscribers.len();
                storage.subscribers.retain(|sub| sub.id != id);
                storage.subscribers.len() < before
            }
            Handle::Backward(s) => {
                let mut storage = s.borrow_mut();
                let before = storage.subscribers.len();
                storage.subscribers.retain(|sub| sub.id != id);
                storage.subscribers.len() < before
            }
        };
        if removed {
            debug!("Unsubscribed {} from {}", id, self.relation_id());
        }
        removed
    }

    /// Like `unsubscribe`, but gives up instead of panicking when the
    /// storage is currently borrowed
    pub(crate) fn try_unsubscribe(&self, id: ListenerId) -> bool {
        match &self.handle {
            Handle::Forward(s) => s
                .try_borrow_mut()
                .map(|mut storage| storage.subscribers.retain(|sub| sub.id != id))
                .is_ok(),
            Handle::Backward(s) => s
                .try_borrow_mut()
                .map(|mut storage| storage.subscribers.retain(|sub| sub.id != id))
                .is_ok(),
        }
    }
}

/// Operations on homogeneous relations that graphs and chains batch across
/// several relations before notifying listeners once.
impl<T: Element> BiMultiMap<T, T> {
    fn storage(&self) -> &Rc<RefCell<Storage<T, T>>> {
        match &self.handle {
            Handle::Forward(s) => s,
            Handle::Backward(s) => s,
        }
    }

    /// A handle in storage orientation
    pub fn canonical(&self) -> BiMultiMap<T, T> {
        BiMultiMap {
            handle: Handle::Forward(Rc::clone(self.storage())),
        }
    }

    pub(crate) fn live_listeners(&self) -> Vec<LiveListener<T, T>> {
        self.storage().borrow_mut().live_listeners()
    }

    pub(crate) fn add_quiet(&self, key: T, value: T) -> Option<RelationChange<T, T>> {
        let mut storage = self.storage().borrow_mut();
        if self.is_inverted() {
            storage.insert(value, key)
        } else {
            storage.insert(key, value)
        }
    }

    pub(crate) fn remove_quiet(&self, key: &T, value: &T) -> Option<RelationChange<T, T>> {
        let mut storage = self.storage().borrow_mut();
        if self.is_inverted() {
            storage.remove_pair(value, key)
        } else {
            storage.remove_pair(key, value)
        }
    }

    pub(crate) fn remove_key_quiet(&self, key: &T) -> Option<Vec<RelationChange<T, T>>> {
        let mut storage = self.storage().borrow_mut();
        if self.is_inverted() {
            storage.remove_right(key)
        } else {
            storage.remove_left(key)
        }
    }

    pub(crate) fn remove_value_quiet(&self, value: &T) -> Option<Vec<RelationChange<T, T>>> {
        let mut storage = self.storage().borrow_mut();
        if self.is_inverted() {
            storage.remove_left(value)
        } else {
            storage.remove_right(value)
        }
    }

    pub(crate) fn replace_quiet(&self, key: &T, new_key: T) -> Vec<RelationChange<T, T>> {
        let mut storage = self.storage().borrow_mut();
        if self.is_inverted() {
            storage.replace_right(key, new_key)
        } else {
            storage.replace_left(key, new_key)
        }
    }
}

impl<K: Element, V: Element> Default for BiMultiMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Element, V: Element> FromIterator<(K, V)> for BiMultiMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

impl<K: Element, V: Element> PartialEq for BiMultiMap<K, V> {
    /// Pair-set equality, independent of identity and insertion order
    fn eq(&self, other: &Self) -> bool {
        let lhs = self.side();
        let rhs = other.side();
        lhs.len() == rhs.len()
            && lhs.iter().all(|(k, vs)| {
                rhs.get(k)
                    .map_or(false, |ws| ws.len() == vs.len() && vs.iter().all(|v| ws.contains(v)))
            })
    }
}

impl<K: Element + fmt::Debug, V: Element + fmt::Debug> fmt::Debug for BiMultiMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BiMultiMap(")?;
        f.debug_list().entries(self.iter_pairs()).finish()?;
        f.write_str(")")
    }
}

/// Read-only live view of one bucket
///
/// Holds a shared borrow of the relation's storage for as long as it lives.
/// Use `to_set()` for an owned snapshot.
pub struct Bucket<'a, V> {
    set: Option<Ref<'a, ValueSet<V>>>,
}

impl<'a, V: Element> Bucket<'a, V> {
    pub fn len(&self) -> usize {
        self.set.as_ref().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, value: &V) -> bool {
        self.set.as_ref().map_or(false, |s| s.contains(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> + '_ {
        self.set.iter().flat_map(|s| s.iter())
    }

    /// Owned snapshot of the bucket
    pub fn to_set(&self) -> ValueSet<V> {
        self.set.as_deref().cloned().unwrap_or_default()
    }

    pub fn to_vec(&self) -> Vec<V> {
        self.iter().cloned().collect()
    }
}

impl<'a, V: Element + fmt::Debug> fmt::Debug for Bucket<'a, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Lazy pair iterator; holds a shared borrow of the storage
pub struct Pairs<'a, K, V> {
    side: Ref<'a, Buckets<K, V>>,
    key_idx: usize,
    value_idx: usize,
}

impl<'a, K: Element, V: Element> Iterator for Pairs<'a, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, values) = self.side.get_index(self.key_idx)?;
            if let Some(value) = values.get_index(self.value_idx) {
                let pair = (key.clone(), value.clone());
                self.value_idx += 1;
                return Some(pair);
            }
            self.key_idx += 1;
            self.value_idx = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment() -> BiMultiMap<&'static str, &'static str> {
        BiMultiMap::from_pairs([("alice", "math"), ("alice", "english"), ("bob", "english")])
    }

    #[test]
    fn test_enrollment_scenario() {
        let m = enrollment();
        assert_eq!(m.get(&"alice").to_vec(), vec!["math", "english"]);
        assert_eq!(m.get_inverse(&"english").to_vec(), vec!["alice", "bob"]);

        m.remove(&"alice", &"math").unwrap();
        assert_eq!(m.get(&"alice").to_vec(), vec!["english"]);

        m.remove(&"alice", &"english").unwrap();
        assert!(!m.contains_key(&"alice"));
        assert_eq!(m.keys(), vec!["bob"]);
        assert!(m.is_consistent());
    }

    #[test]
    fn test_add_is_idempotent() {
        let m = BiMultiMap::new();
        assert!(m.add(1, 'a'));
        assert!(!m.add(1, 'a'));
        assert_eq!(m.pair_count(), 1);
        assert_eq!(m.get_inverse(&'a').to_vec(), vec![1]);
    }

    #[test]
    fn test_remove_missing_pair_fails() {
        let m = enrollment();
        let err = m.remove(&"bob", &"math").unwrap_err();
        assert_eq!(err, RelationError::PairNotFound(m.relation_id()));
        assert!(m.remove_key(&"carol").unwrap_err().is_not_found());
        assert!(m.remove_value(&"art").unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove_key_cleans_inverse() {
        let m = enrollment();
        m.remove_key(&"alice").unwrap();
        assert!(!m.contains_value(&"math"));
        assert_eq!(m.get_inverse(&"english").to_vec(), vec!["bob"]);
        assert!(m.is_consistent());

        m.remove_value(&"english").unwrap();
        assert!(m.is_empty());
        assert!(m.values().is_empty());
    }

    #[test]
    fn test_inverse_shares_storage() {
        let m = enrollment();
        let inv = m.inverse();
        inv.add("art", "carol");
        assert!(m.contains(&"carol", &"art"));
        assert!(inv.is_inverted());
        assert!(m.is_same(&inv));
        assert_eq!(inv.inverse(), m);

        m.remove_key(&"bob").unwrap();
        assert_eq!(inv.get(&"english").to_vec(), vec!["alice"]);
    }

    #[test]
    fn test_copy_is_independent() {
        let m = enrollment();
        let dup = m.copy();
        assert_eq!(dup, m);
        assert!(!dup.is_same(&m));
        dup.add("carol", "art");
        assert!(!m.contains_key(&"carol"));
    }

    #[test]
    fn test_insertion_order_is_stable() {
        let m = BiMultiMap::from_pairs([(3, 'c'), (1, 'a'), (2, 'b')]);
        m.add(1, 'z');
        m.remove(&3, &'c').unwrap();
        assert_eq!(m.keys(), vec![1, 2]);
        assert_eq!(m.values(), vec!['a', 'b', 'z']);
        let pairs: Vec<_> = m.iter_pairs().collect();
        assert_eq!(pairs, vec![(1, 'a'), (1, 'z'), (2, 'b')]);
    }

    #[test]
    fn test_set_values_and_replace() {
        let m = BiMultiMap::from_pairs([(1, 'a'), (1, 'b'), (2, 'c')]);
        m.set_values(1, ['b', 'd']);
        assert_eq!(m.get(&1).to_vec(), vec!['b', 'd']);
        assert!(!m.contains_value(&'a'));

        m.replace(&1, 2);
        assert!(!m.contains_key(&1));
        assert_eq!(m.get(&2).to_vec(), vec!['c', 'b', 'd']);
        assert_eq!(m.get_inverse(&'b').to_vec(), vec![2]);

        m.set_values(2, Vec::new());
        assert!(m.is_empty());
        assert!(m.is_consistent());
    }

    #[test]
    fn test_replace_through_inverse() {
        let m = BiMultiMap::from_pairs([(1, 'a'), (2, 'a'), (2, 'b')]);
        m.inverse().replace(&'a', 'b');
        assert_eq!(m.get(&1).to_vec(), vec!['b']);
        assert_eq!(m.get(&2).to_vec(), vec!['b']);
        assert_eq!(m.pair_count(), 2);
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = BiMultiMap::from_pairs([(1, 'a'), (2, 'b')]);
        let b = BiMultiMap::from_pairs([(2, 'b'), (1, 'a')]);
        assert_eq!(a, b);
        let c = BiMultiMap::from_pairs([('a', 1), ('b', 2)]);
        assert_eq!(a, c.inverse());
    }

    #[test]
    fn test_bucket_is_read_only_snapshot_on_demand() {
        let m = enrollment();
        let snapshot = m.get(&"alice").to_set();
        m.add("alice", "art");
        assert_eq!(snapshot.len(), 2);
        assert_eq!(m.get(&"alice").len(), 3);
        assert!(m.get(&"nobody").is_empty());
    }

    #[test]
    #[should_panic]
    fn test_mutating_while_bucket_is_alive_panics() {
        let m = enrollment();
        let bucket = m.get(&"alice");
        m.add("alice", "art");
        drop(bucket);
    }

    #[test]
    fn test_debug_format() {
        let m = BiMultiMap::from_pairs([(1, 'a')]);
        assert_eq!(format!("{:?}", m), "BiMultiMap([(1, 'a')])");
    }
}
