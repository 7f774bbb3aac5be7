//! Thread counting along a path of relations
//!
//! A *thread* is one sequence of pairs `(k0, v0), (v0, v1), ...` picking one
//! pair per relation of the path. Composed pairs are weighted by the number of
//! threads (witnesses) that justify them.
//!
//! Walks can be run against a virtual state: an overlay of pairs whose
//! presence differs from the live relation. Incremental maintenance uses it to
//! look at the relations "as of" a given change inside a multi-change event.
//!
//! Thread counts grow as fan-out to the power of the path length. They are
//! `u128` and saturate at `SATURATED`, which reads as "at least this many".

use crate::relation::{BiMultiMap, Element, RelationChange, RelationId};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

/// Saturation mark for thread counts too large to represent
pub(crate) const SATURATED: u128 = u128::MAX;

/// Thread counts per reached element
pub(crate) type Frontier<T> = IndexMap<T, u128, FxBuildHasher>;

/// Composed table: `start -> end -> witness count`
pub(crate) type Witnesses<T> = IndexMap<T, Frontier<T>, FxBuildHasher>;

/// A pair whose virtual presence overrides the live relation
#[derive(Debug, Clone)]
pub(crate) struct OverlayEdge<T> {
    relation: RelationId,
    key: T,
    value: T,
    present: bool,
}

impl<T: Element> OverlayEdge<T> {
    /// The state of the changed pair before `change` happened
    pub(crate) fn reverting(change: &RelationChange<T, T>) -> Self {
        OverlayEdge {
            relation: change.relation,
            key: change.change.key().clone(),
            value: change.change.value().clone(),
            present: !change.change.is_added(),
        }
    }

    fn same_pair(&self, other: &OverlayEdge<T>) -> bool {
        self.relation == other.relation && self.key == other.key && self.value == other.value
    }
}

/// Overlay that reverts every change after `at`, earliest change winning
pub(crate) fn revert_later<T: Element>(
    changes: &[RelationChange<T, T>],
    at: usize,
) -> Vec<OverlayEdge<T>> {
    let mut overlay: Vec<OverlayEdge<T>> = Vec::new();
    for change in changes.iter().skip(at + 1) {
        let edge = OverlayEdge::reverting(change);
        if !overlay.iter().any(|seen| seen.same_pair(&edge)) {
            overlay.push(edge);
        }
    }
    overlay
}

/// `overlay` with `change` reverted as well, taking priority
pub(crate) fn revert_also<T: Element>(
    overlay: &[OverlayEdge<T>],
    change: &RelationChange<T, T>,
) -> Vec<OverlayEdge<T>> {
    let first = OverlayEdge::reverting(change);
    let mut out = Vec::with_capacity(overlay.len() + 1);
    out.extend(overlay.iter().filter(|e| !e.same_pair(&first)).cloned());
    out.insert(0, first);
    out
}

/// Read access to a path, position by position
pub(crate) struct PathView<'a, T> {
    path: &'a [BiMultiMap<T, T>],
    relations: Vec<(RelationId, bool)>,
}

impl<'a, T: Element> PathView<'a, T> {
    pub(crate) fn new(path: &'a [BiMultiMap<T, T>]) -> Self {
        let relations = path
            .iter()
            .map(|m| (m.relation_id(), m.is_inverted()))
            .collect();
        Self { path, relations }
    }

    pub(crate) fn len(&self) -> usize {
        self.path.len()
    }

    /// Positions at which a relation occurs (a relation may occur several
    /// times, e.g. once forward and once inverted)
    pub(crate) fn positions_of(&self, relation: RelationId) -> Vec<usize> {
        self.relations
            .iter()
            .enumerate()
            .filter(|(_, (id, _))| *id == relation)
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Orient a storage-orientation pair as the path traverses it at `pos`
    pub(crate) fn orient<'c>(&self, pos: usize, key: &'c T, value: &'c T) -> (&'c T, &'c T) {
        if self.relations[pos].1 {
            (value, key)
        } else {
            (key, value)
        }
    }

    fn successors(&self, pos: usize, node: &T, overlay: &[OverlayEdge<T>]) -> Vec<T> {
        let mut out = self.path[pos].get(node).to_vec();
        for edge in overlay.iter().filter(|e| e.relation == self.relations[pos].0) {
            let (from, to) = self.orient(pos, &edge.key, &edge.value);
            if from != node {
                continue;
            }
            if edge.present {
                if !out.contains(to) {
                    out.push(to.clone());
                }
            } else {
                out.retain(|x| x != to);
            }
        }
        out
    }

    fn predecessors(&self, pos: usize, node: &T, overlay: &[OverlayEdge<T>]) -> Vec<T> {
        let mut out = self.path[pos].get_inverse(node).to_vec();
        for edge in overlay.iter().filter(|e| e.relation == self.relations[pos].0) {
            let (from, to) = self.orient(pos, &edge.key, &edge.value);
            if to != node {
                continue;
            }
            if edge.present {
                if !out.contains(from) {
                    out.push(from.clone());
                }
            } else {
                out.retain(|x| x != from);
            }
        }
        out
    }

    /// Threads from `start` through positions `from..len`, counted per end
    pub(crate) fn walk_forward(&self, from: usize, start: T, overlay: &[OverlayEdge<T>]) -> Frontier<T> {
        let mut frontier = Frontier::default();
        frontier.insert(start, 1);
        for pos in from..self.len() {
            let mut next = Frontier::default();
            for (node, count) in &frontier {
                for succ in self.successors(pos, node, overlay) {
                    let slot = next.entry(succ).or_insert(0);
                    *slot = slot.saturating_add(*count);
                }
            }
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }
        frontier
    }

    /// Threads ending in `start` through positions `until-1` down to 0,
    /// counted per start key
    pub(crate) fn walk_backward(&self, until: usize, start: T, overlay: &[OverlayEdge<T>]) -> Frontier<T> {
        let mut frontier = Frontier::default();
        frontier.insert(start, 1);
        for pos in (0..until).rev() {
            let mut next = Frontier::default();
            for (node, count) in &frontier {
                for pred in self.predecessors(pos, node, overlay) {
                    let slot = next.entry(pred).or_insert(0);
                    *slot = slot.saturating_add(*count);
                }
            }
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }
        frontier
    }

    /// Ends reachable from `key` on the live relations
    pub(crate) fn reach(&self, key: &T) -> Frontier<T> {
        if self.path.is_empty() || !self.path[0].contains_key(key) {
            return Frontier::default();
        }
        self.walk_forward(0, key.clone(), &[])
    }

    /// Full join computed from scratch
    pub(crate) fn compose(&self) -> Witnesses<T> {
        let mut table = Witnesses::default();
        let Some(first) = self.path.first() else {
            return table;
        };
        for key in first.keys() {
            let ends = self.walk_forward(0, key.clone(), &[]);
            if !ends.is_empty() {
                table.insert(key, ends);
            }
        }
        table
    }
}

/// True if some count in `table` hit the saturation mark
pub(crate) fn is_saturated<T>(table: &Witnesses<T>) -> bool {
    table.values().any(|row| row.values().any(|&w| w == SATURATED))
}

/// `back * fwd` threads through one changed pair, `None` once saturated
pub(crate) fn threads_through(back: u128, fwd: u128) -> Option<u128> {
    back.checked_mul(fwd).filter(|&n| n != SATURATED)
}

/// Add or subtract `count` witnesses of `(start, end)`
///
/// Returns false when an addition would saturate; the table is then left
/// with an unusable count and must be discarded by the caller.
pub(crate) fn adjust<T: Element>(table: &mut Witnesses<T>, start: &T, end: &T, count: u128, added: bool) -> bool {
    if added {
        let slot = table
            .entry(start.clone())
            .or_default()
            .entry(end.clone())
            .or_insert(0);
        match slot.checked_add(count).filter(|&n| n != SATURATED) {
            Some(n) => {
                *slot = n;
                return true;
            }
            None => return false,
        }
    }
    let Some(row) = table.get_mut(start) else {
        debug_assert!(false, "removing witnesses of an unknown composed pair");
        return true;
    };
    if let Some(witnesses) = row.get_mut(end) {
        debug_assert!(*witnesses >= count, "witness count underflow");
        *witnesses = witnesses.saturating_sub(count);
        if *witnesses == 0 {
            row.shift_remove(end);
        }
    }
    if row.is_empty() {
        table.shift_remove(start);
    }
    true
}
