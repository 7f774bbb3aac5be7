//! Join index over a path of relations
//!
//! Materializes `first key -> last value` of a path `[m0, ..., mn]`.
//!
//! Two maintenance policies:
//! - `Recompute`: nothing is stored, every read walks the path.
//! - `Incremental`: the composed table is stored with a witness count per
//!   pair (the number of threads through the path that justify it). The index
//!   subscribes to every relation on the path and, for each change, adds or
//!   subtracts only the threads passing through the changed pair. A composed
//!   pair disappears when its last witness does, so parallel paths reaching
//!   the same end keep it alive.
//!
//! An incremental index whose witness counts no longer fit in a `u128`
//! falls back to walking the path on every read.

use super::compose::{
    adjust, is_saturated, revert_also, revert_later, threads_through, PathView, Witnesses,
};
use crate::relation::{
    BiMultiMap, Element, ListenerId, RelationEvent, RelationId, RelationListener, ValueSet,
};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// How a join index keeps up with its relations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MaintenancePolicy {
    /// Walk the path on every read
    Recompute,
    /// Keep a witness-counted table up to date from relation events
    #[default]
    Incremental,
}

impl fmt::Display for MaintenancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaintenancePolicy::Recompute => write!(f, "recompute"),
            MaintenancePolicy::Incremental => write!(f, "incremental"),
        }
    }
}

struct IndexInner<T: Element> {
    id: ListenerId,
    path: Vec<BiMultiMap<T, T>>,
    policy: MaintenancePolicy,
    /// `None` while a recompute index is live
    table: RefCell<Option<Witnesses<T>>>,
    attached: Cell<bool>,
}

impl<T: Element> IndexInner<T> {
    /// One handle per distinct relation on the path
    fn distinct_relations(&self) -> Vec<&BiMultiMap<T, T>> {
        let mut seen: Vec<RelationId> = Vec::new();
        let mut out = Vec::new();
        for m in &self.path {
            let id = m.relation_id();
            if !seen.contains(&id) {
                seen.push(id);
                out.push(m);
            }
        }
        out
    }

    fn apply(&self, event: &RelationEvent<T, T>) {
        let view = PathView::new(&self.path);
        let mut guard = self.table.borrow_mut();
        let Some(table) = guard.as_mut() else {
            return;
        };

        for (at, change) in event.changes.iter().enumerate() {
            let positions = view.positions_of(change.relation);
            if positions.is_empty() {
                continue;
            }
            let added = change.change.is_added();
            // Earlier positions see this change applied, later positions
            // see it reverted; later changes of the event are reverted for all.
            let before = revert_later(&event.changes, at);
            let after = revert_also(&before, change);

            for pos in positions {
                let (from, to) = view.orient(pos, change.change.key(), change.change.value());
                let starts = view.walk_backward(pos, from.clone(), &before);
                if starts.is_empty() {
                    continue;
                }
                let ends = view.walk_forward(pos + 1, to.clone(), &after);
                for (start, back) in &starts {
                    for (end, fwd) in &ends {
                        let applied = threads_through(*back, *fwd)
                            .is_some_and(|threads| adjust(table, start, end, threads, added));
                        if !applied {
                            warn!(
                                "Join index {} witness counts saturated, reading through the path from now on",
                                self.id
                            );
                            *guard = None;
                            return;
                        }
                    }
                }
                trace!(
                    "Index {} {} threads at position {} ({} starts, {} ends)",
                    self.id,
                    if added { "added" } else { "removed" },
                    pos,
                    starts.len(),
                    ends.len()
                );
            }
        }
    }

    fn read<R>(&self, f: impl FnOnce(&Witnesses<T>) -> R) -> R {
        if let Some(table) = self.table.borrow().as_ref() {
            return f(table);
        }
        f(&PathView::new(&self.path).compose())
    }
}

impl<T: Element> RelationListener<T, T> for IndexInner<T> {
    fn on_event(&self, event: &RelationEvent<T, T>) {
        if self.attached.get() {
            self.apply(event);
        }
    }
}

impl<T: Element> Drop for IndexInner<T> {
    fn drop(&mut self) {
        if !self.attached.get() || self.policy == MaintenancePolicy::Recompute {
            return;
        }
        for m in &self.path {
            // Storage may be borrowed by a live bucket; the weak subscription
            // is pruned on the next mutation anyway.
            m.try_unsubscribe(self.id);
        }
    }
}

/// Derived, read-only composed mapping between the two ends of a path
///
/// Cloning yields another handle onto the same index.
pub struct JoinIndex<T: Element> {
    inner: Rc<IndexInner<T>>,
}

impl<T: Element> Clone for JoinIndex<T> {
    fn clone(&self) -> Self {
        JoinIndex {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Element + 'static> JoinIndex<T> {
    /// Build an index over `path` (`m0.key -> mn.value`)
    pub fn new(path: Vec<BiMultiMap<T, T>>, policy: MaintenancePolicy) -> Self {
        let table = match policy {
            MaintenancePolicy::Incremental => {
                Some(PathView::new(&path).compose()).filter(|table| !is_saturated(table))
            }
            MaintenancePolicy::Recompute => None,
        };
        if policy == MaintenancePolicy::Incremental && table.is_none() {
            warn!("Witness counts over {} relations saturate, reading through the path", path.len());
        }
        let inner = Rc::new(IndexInner {
            id: ListenerId::fresh(),
            path,
            policy,
            table: RefCell::new(table),
            attached: Cell::new(true),
        });
        if policy == MaintenancePolicy::Incremental {
            for m in inner.distinct_relations() {
                m.subscribe_with_id(inner.id, &inner);
            }
        }
        debug!(
            "Created {} join index {} over {} relations",
            policy,
            inner.id,
            inner.path.len()
        );
        JoinIndex { inner }
    }

    /// An index with no path; always empty and detached
    pub fn empty() -> Self {
        JoinIndex {
            inner: Rc::new(IndexInner {
                id: ListenerId::fresh(),
                path: Vec::new(),
                policy: MaintenancePolicy::Recompute,
                table: RefCell::new(Some(Witnesses::default())),
                attached: Cell::new(false),
            }),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.inner.id
    }

    pub fn policy(&self) -> MaintenancePolicy {
        self.inner.policy
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.get()
    }

    /// Number of relations composed
    pub fn path_len(&self) -> usize {
        self.inner.path.len()
    }

    /// The relations composed, in path orientation
    pub fn path(&self) -> &[BiMultiMap<T, T>] {
        &self.inner.path
    }

    /// Stop following the relations; the current content is frozen
    pub fn detach(&self) {
        if !self.inner.attached.replace(false) {
            return;
        }
        if self.inner.policy == MaintenancePolicy::Incremental {
            for m in self.inner.distinct_relations() {
                m.unsubscribe(self.inner.id);
            }
        }
        if self.inner.table.borrow().is_none() {
            let frozen = PathView::new(&self.inner.path).compose();
            *self.inner.table.borrow_mut() = Some(frozen);
        }
        debug!("Detached join index {}", self.inner.id);
    }

    /// End values composed with `key`
    pub fn get(&self, key: &T) -> ValueSet<T> {
        if self.inner.table.borrow().is_none() {
            return PathView::new(&self.inner.path)
                .reach(key)
                .into_keys()
                .collect();
        }
        self.inner
            .read(|table| table.get(key).map(|row| row.keys().cloned().collect()))
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &T, value: &T) -> bool {
        self.witnesses(key, value) > 0
    }

    /// Number of distinct threads justifying `(key, value)`
    ///
    /// Saturates at `u128::MAX`, which then means "at least that many".
    pub fn witnesses(&self, key: &T, value: &T) -> u128 {
        if self.inner.table.borrow().is_none() {
            return PathView::new(&self.inner.path)
                .reach(key)
                .get(value)
                .copied()
                .unwrap_or(0);
        }
        self.inner
            .read(|table| table.get(key).and_then(|row| row.get(value)).copied())
            .unwrap_or(0)
    }

    /// Start keys with at least one composed value
    pub fn keys(&self) -> Vec<T> {
        self.inner.read(|table| table.keys().cloned().collect())
    }

    /// Number of start keys
    pub fn len(&self) -> usize {
        self.inner.read(|table| table.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of composed pairs
    pub fn pair_count(&self) -> usize {
        self.inner.read(|table| table.values().map(|row| row.len()).sum())
    }

    /// Composed pairs, key order then value order
    pub fn iter_pairs(&self) -> std::vec::IntoIter<(T, T)> {
        self.inner
            .read(|table| {
                table
                    .iter()
                    .flat_map(|(k, row)| row.keys().map(move |v| (k.clone(), v.clone())))
                    .collect::<Vec<_>>()
            })
            .into_iter()
    }

    /// Owned snapshot as an independent relation
    pub fn to_bimap(&self) -> BiMultiMap<T, T> {
        BiMultiMap::from_pairs(self.iter_pairs())
    }
}

impl<T: Element + fmt::Debug + 'static> fmt::Debug for JoinIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinIndex")
            .field("id", &self.inner.id)
            .field("policy", &self.inner.policy)
            .field("attached", &self.inner.attached.get())
            .field("pairs", &self.iter_pairs().collect::<Vec<_>>())
            .finish()
    }
}
