//! Chain: relations composed end to end
//!
//! `[m0, m1, ..., mn]` where the values of `mi` are the keys of `mi+1`.
//! A chain only holds handles; all content lives in the referenced maps.
//! The convention is not enforced, a mismatched chain just has no rows.

use super::bimap::{BiMultiMap, ValueSet};
use super::error::{RelationError, RelationResult};
use super::event::ChangeBatch;
use super::types::Element;
use std::fmt;
use tracing::debug;

#[derive(Clone)]
pub struct Chain<T> {
    m2ms: Vec<BiMultiMap<T, T>>,
}

impl<T: Element> Chain<T> {
    pub fn new(m2ms: Vec<BiMultiMap<T, T>>) -> Self {
        Self { m2ms }
    }

    /// The referenced relations, in join order
    pub fn m2ms(&self) -> &[BiMultiMap<T, T>] {
        &self.m2ms
    }

    /// Replace positions; content mutation goes through the relations
    pub fn m2ms_mut(&mut self) -> &mut Vec<BiMultiMap<T, T>> {
        &mut self.m2ms
    }

    /// Number of relations
    pub fn len(&self) -> usize {
        self.m2ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.m2ms.is_empty()
    }

    /// Restrict the chain to threads starting at `key`
    ///
    /// Returns a chain of the same length over fresh relations: the first is
    /// filtered to `key`, each following one to the keys reached so far. The
    /// original relations are untouched.
    pub fn only(&self, key: &T) -> Chain<T> {
        let mut frontier: ValueSet<T> = ValueSet::default();
        frontier.insert(key.clone());
        let mut filtered = Vec::with_capacity(self.m2ms.len());
        for m in &self.m2ms {
            let part = BiMultiMap::new();
            let mut next = ValueSet::default();
            for k in &frontier {
                for v in m.get(k).iter() {
                    part.add(k.clone(), v.clone());
                    next.insert(v.clone());
                }
            }
            filtered.push(part);
            frontier = next;
        }
        debug!("Restricted chain of {} relations", filtered.len());
        Chain { m2ms: filtered }
    }

    /// Distinct values of column `col` (`0..=len()`)
    pub fn column(&self, col: usize) -> RelationResult<Vec<T>> {
        if col > self.m2ms.len() || self.m2ms.is_empty() {
            return Err(RelationError::ArityMismatch {
                expected: self.m2ms.len() + 1,
                actual: col + 1,
            });
        }
        if col == self.m2ms.len() {
            return Ok(self.m2ms[col - 1].values());
        }
        if col == 0 {
            return Ok(self.m2ms[0].keys());
        }
        let mut seen: ValueSet<T> = self.m2ms[col - 1].values().into_iter().collect();
        seen.extend(self.m2ms[col].keys());
        Ok(seen.into_iter().collect())
    }

    /// Add one thread: `values[i] -> values[i+1]` in every relation
    ///
    /// Listeners see a single event covering all relations.
    pub fn add(&self, values: &[T]) -> RelationResult<()> {
        if values.len() != self.m2ms.len() + 1 {
            return Err(RelationError::ArityMismatch {
                expected: self.m2ms.len() + 1,
                actual: values.len(),
            });
        }
        let mut batch = ChangeBatch::new();
        for (m, pair) in self.m2ms.iter().zip(values.windows(2)) {
            batch.listen(m.live_listeners());
            batch.extend(m.add_quiet(pair[0].clone(), pair[1].clone()));
        }
        batch.dispatch();
        Ok(())
    }

    /// Lazily iterate every thread through the chain
    pub fn rows(&self) -> Rows<'_, T> {
        Rows::new(&self.m2ms)
    }
}

impl<T: Element> PartialEq for Chain<T> {
    fn eq(&self, other: &Self) -> bool {
        self.m2ms == other.m2ms
    }
}

impl<T: Element + fmt::Debug> fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("m2ms", &self.m2ms).finish()
    }
}

/// Depth-first thread iterator
///
/// One candidate list per level is materialized as the walk descends; no
/// borrow of the relations is held between calls to `next`.
pub struct Rows<'a, T> {
    m2ms: &'a [BiMultiMap<T, T>],
    stack: Vec<(Vec<T>, usize)>,
    row: Vec<T>,
}

impl<'a, T: Element> Rows<'a, T> {
    fn new(m2ms: &'a [BiMultiMap<T, T>]) -> Self {
        let stack = match m2ms.first() {
            Some(first) => vec![(first.keys(), 0)],
            None => Vec::new(),
        };
        Self {
            m2ms,
            stack,
            row: Vec::new(),
        }
    }
}

impl<'a, T: Element> Iterator for Rows<'a, T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let depth = self.stack.len();
            let (candidates, idx) = self.stack.last_mut()?;
            if *idx >= candidates.len() {
                self.stack.pop();
                self.row.pop();
                continue;
            }
            let item = candidates[*idx].clone();
            *idx += 1;

            // depth 1 holds keys of m0, depth d+1 holds values of m(d-1)
            self.row.truncate(depth - 1);
            self.row.push(item.clone());
            if depth == self.m2ms.len() + 1 {
                let row = self.row.clone();
                self.row.pop();
                return Some(row);
            }
            let next = self.m2ms[depth - 1].get(&item).to_vec();
            self.stack.push((next, 0));
        }
    }
}
