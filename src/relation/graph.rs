//! Graph: named relations addressed by column labels
//!
//! A graph stores one `BiMultiMap` per declared pair of columns. Chains,
//! stars and join indexes are derived from it on demand and share its maps.
//!
//! Path resolution comes in two flavours:
//! - strict (`relation`, `path`): every consecutive pair of labels must be
//!   directly related, otherwise `PathNotFound`
//! - routed (`pairs`, `chain`, `star`, `route`): multi-hop, following the
//!   shortest route with a fixed tie-break (see `route`)

use super::bimap::{BiMultiMap, ValueSet};
use super::chain::Chain;
use super::error::{RelationError, RelationResult};
use super::event::ChangeBatch;
use super::schema::{Hop, Schema};
use super::star::Star;
use super::types::{ColumnLabel, Element};
use crate::config::RelationConfig;
use crate::index::{JoinIndex, MaintenancePolicy};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::cell::RefCell;
use std::fmt;
use tracing::{debug, warn};

type IndexCache<T> = IndexMap<(ColumnLabel, ColumnLabel), JoinIndex<T>, FxBuildHasher>;

/// Collection of relations between labelled columns
pub struct Graph<T: Element> {
    schema: Schema,
    /// One map per schema edge, oriented `from -> to`
    m2ms: Vec<BiMultiMap<T, T>>,
    indexes: RefCell<IndexCache<T>>,
    config: RelationConfig,
}

impl<T: Element + 'static> Graph<T> {
    /// Create a graph with one empty relation per label pair
    pub fn new<A, B>(relations: impl IntoIterator<Item = (A, B)>) -> RelationResult<Self>
    where
        A: Into<ColumnLabel>,
        B: Into<ColumnLabel>,
    {
        Self::with_config(RelationConfig::default(), relations)
    }

    pub fn with_config<A, B>(
        config: RelationConfig,
        relations: impl IntoIterator<Item = (A, B)>,
    ) -> RelationResult<Self>
    where
        A: Into<ColumnLabel>,
        B: Into<ColumnLabel>,
    {
        let mut schema = Schema::new();
        let mut m2ms = Vec::new();
        for (from, to) in relations {
            schema.add_edge(from.into(), to.into())?;
            m2ms.push(BiMultiMap::new());
        }
        Self::from_parts(config, schema, m2ms)
    }

    fn from_parts(config: RelationConfig, schema: Schema, m2ms: Vec<BiMultiMap<T, T>>) -> RelationResult<Self> {
        if m2ms.is_empty() {
            return Err(RelationError::InvalidSchema("graph has no relations".to_string()));
        }
        if !schema.is_connected() {
            return Err(RelationError::InvalidSchema(
                "columns do not form a connected graph".to_string(),
            ));
        }
        debug!(
            "Created graph with {} columns and {} relations",
            schema.columns().count(),
            m2ms.len()
        );
        Ok(Graph {
            schema,
            m2ms,
            indexes: RefCell::new(IndexCache::default()),
            config,
        })
    }

    pub fn config(&self) -> &RelationConfig {
        &self.config
    }

    /// Column labels in first-declared order
    pub fn columns(&self) -> Vec<ColumnLabel> {
        self.schema.columns().cloned().collect()
    }

    /// Declared relations as `(from, to)` label pairs
    pub fn relations(&self) -> Vec<(ColumnLabel, ColumnLabel)> {
        self.schema.edges().to_vec()
    }

    /// Whether `a` and `b` are directly related, in either direction
    pub fn contains_relation(&self, a: impl Into<ColumnLabel>, b: impl Into<ColumnLabel>) -> bool {
        self.schema.hop(&a.into(), &b.into()).is_some()
    }

    fn oriented(&self, hop: Hop) -> BiMultiMap<T, T> {
        let m = &self.m2ms[hop.edge];
        if hop.forward {
            m.clone()
        } else {
            m.inverse()
        }
    }

    fn strict_hop(&self, a: &ColumnLabel, b: &ColumnLabel) -> RelationResult<Hop> {
        for label in [a, b] {
            if !self.schema.contains_column(label) {
                return Err(RelationError::UnknownColumn(label.clone()));
            }
        }
        self.schema.hop(a, b).ok_or_else(|| RelationError::PathNotFound {
            from: a.clone(),
            to: b.clone(),
        })
    }

    /// The stored relation `a -> b` (the inverse handle if declared `b -> a`)
    pub fn relation(
        &self,
        a: impl Into<ColumnLabel>,
        b: impl Into<ColumnLabel>,
    ) -> RelationResult<BiMultiMap<T, T>> {
        let hop = self.strict_hop(&a.into(), &b.into())?;
        Ok(self.oriented(hop))
    }

    /// Chain over directly related consecutive labels, sharing stored maps
    pub fn path<L: Into<ColumnLabel>>(
        &self,
        labels: impl IntoIterator<Item = L>,
    ) -> RelationResult<Chain<T>> {
        let labels = collect_labels(labels)?;
        let m2ms = labels
            .windows(2)
            .map(|pair| self.strict_hop(&pair[0], &pair[1]).map(|hop| self.oriented(hop)))
            .collect::<RelationResult<Vec<_>>>()?;
        Ok(Chain::new(m2ms))
    }

    /// Distinct values of a column across all of its relations
    pub fn column(&self, label: impl Into<ColumnLabel>) -> RelationResult<Vec<T>> {
        let label = label.into();
        if !self.schema.contains_column(&label) {
            return Err(RelationError::UnknownColumn(label));
        }
        let mut seen: ValueSet<T> = ValueSet::default();
        for &edge in self.schema.incident(&label) {
            let m = &self.m2ms[edge];
            if self.schema.edges()[edge].0 == label {
                seen.extend(m.keys());
            } else {
                seen.extend(m.values());
            }
        }
        Ok(seen.into_iter().collect())
    }

    /// Column labels of the route from `a` to `b`, both ends included
    ///
    /// The route is the shortest one by number of relations. Among equally
    /// short routes, relations are compared hop by hop from `a` and the one
    /// registered first wins.
    pub fn route(
        &self,
        a: impl Into<ColumnLabel>,
        b: impl Into<ColumnLabel>,
    ) -> RelationResult<Vec<ColumnLabel>> {
        let a = a.into();
        let hops = self.schema.route(&a, &b.into())?;
        Ok(self.schema.route_columns(&a, &hops))
    }

    fn route_m2ms(&self, a: &ColumnLabel, b: &ColumnLabel) -> RelationResult<Vec<BiMultiMap<T, T>>> {
        let hops = self.schema.route(a, b)?;
        if hops.is_empty() {
            return Err(RelationError::PathNotFound {
                from: a.clone(),
                to: b.clone(),
            });
        }
        Ok(hops.into_iter().map(|hop| self.oriented(hop)).collect())
    }

    /// Composed pairs between two columns, kept current with the graph
    ///
    /// Indexes are cached per ordered pair of columns and built with the
    /// configured policy. Identical, unknown or unconnected columns give an
    /// empty detached index rather than an error.
    pub fn pairs(&self, a: impl Into<ColumnLabel>, b: impl Into<ColumnLabel>) -> JoinIndex<T> {
        let key = (a.into(), b.into());
        if let Some(index) = self.indexes.borrow().get(&key) {
            if index.is_attached() {
                return index.clone();
            }
        }
        let index = self.build_index(&key.0, &key.1, self.config.index_policy);
        if index.is_attached() {
            self.indexes.borrow_mut().insert(key, index.clone());
        }
        index
    }

    /// Uncached index with an explicit policy
    pub fn pairs_with_policy(
        &self,
        a: impl Into<ColumnLabel>,
        b: impl Into<ColumnLabel>,
        policy: MaintenancePolicy,
    ) -> JoinIndex<T> {
        self.build_index(&a.into(), &b.into(), policy)
    }

    fn build_index(&self, a: &ColumnLabel, b: &ColumnLabel, policy: MaintenancePolicy) -> JoinIndex<T> {
        match self.route_m2ms(a, b) {
            Ok(path) => JoinIndex::new(path, policy),
            Err(err) => {
                debug!("No index between {} and {}: {}", a, b, err);
                JoinIndex::empty()
            }
        }
    }

    /// Live index along one explicit route of directly related labels
    ///
    /// Unlike `pairs`, the caller picks the route, e.g. the long way round a
    /// cycle. The index is not cached.
    pub fn pairs_along<L: Into<ColumnLabel>>(
        &self,
        labels: impl IntoIterator<Item = L>,
        policy: MaintenancePolicy,
    ) -> RelationResult<JoinIndex<T>> {
        let chain = self.path(labels)?;
        Ok(JoinIndex::new(chain.m2ms().to_vec(), policy))
    }

    /// Union of the pairs composed along each of `routes`
    ///
    /// Every route is a strict label path and all routes must join the same
    /// two columns. The result is an owned snapshot.
    pub fn pairs_via<L, R>(&self, routes: impl IntoIterator<Item = R>) -> RelationResult<BiMultiMap<T, T>>
    where
        L: Into<ColumnLabel>,
        R: IntoIterator<Item = L>,
    {
        let mut ends: Option<(ColumnLabel, ColumnLabel)> = None;
        let mut paths = Vec::new();
        for route in routes {
            let labels = collect_labels(route)?;
            let (first, last) = (labels[0].clone(), labels[labels.len() - 1].clone());
            if let Some((a, b)) = &ends {
                if *a != first || *b != last {
                    return Err(RelationError::InvalidSchema(format!(
                        "route {} -> {} does not join {} and {}",
                        first, last, a, b
                    )));
                }
            } else {
                ends = Some((first, last));
            }
            paths.push(self.path(labels)?.m2ms().to_vec());
        }
        if ends.is_none() {
            return Err(RelationError::InvalidSchema("no route given".to_string()));
        }
        Ok(union_of(paths))
    }

    /// Union of the pairs composed along every simple route from `a` to `b`
    /// that avoids the `ignore` columns
    pub fn pairs_ignoring<L: Into<ColumnLabel>>(
        &self,
        a: impl Into<ColumnLabel>,
        b: impl Into<ColumnLabel>,
        ignore: impl IntoIterator<Item = L>,
    ) -> RelationResult<BiMultiMap<T, T>> {
        let (a, b) = (a.into(), b.into());
        let ignore: Vec<ColumnLabel> = ignore.into_iter().map(Into::into).collect();
        let paths: Vec<Vec<BiMultiMap<T, T>>> = self
            .schema
            .all_routes(&a, &b, &ignore)?
            .into_iter()
            .filter(|hops| !hops.is_empty())
            .map(|hops| hops.into_iter().map(|hop| self.oriented(hop)).collect())
            .collect();
        if paths.is_empty() {
            return Err(RelationError::PathNotFound { from: a, to: b });
        }
        debug!("Composing {} routes from {} to {}", paths.len(), a, b);
        Ok(union_of(paths))
    }

    /// Detach and forget the cached index between two columns
    pub fn release_pairs(&self, a: impl Into<ColumnLabel>, b: impl Into<ColumnLabel>) -> bool {
        let key = (a.into(), b.into());
        let released = self.indexes.borrow_mut().shift_remove(&key);
        match released {
            Some(index) => {
                index.detach();
                true
            }
            None => false,
        }
    }

    /// The relation `a -> b`: stored if direct, a snapshot of the composed
    /// pairs if only reachable through other columns
    fn resolve(&self, a: &ColumnLabel, b: &ColumnLabel) -> RelationResult<BiMultiMap<T, T>> {
        if let Some(hop) = self.schema.hop(a, b) {
            return Ok(self.oriented(hop));
        }
        let path = self.route_m2ms(a, b)?;
        Ok(JoinIndex::new(path, MaintenancePolicy::Recompute).to_bimap())
    }

    /// Chain through any connected labels
    ///
    /// Directly related labels share the stored relation. Labels only reached
    /// through other columns are bridged by a snapshot of their composed pairs.
    pub fn chain<L: Into<ColumnLabel>>(
        &self,
        labels: impl IntoIterator<Item = L>,
    ) -> RelationResult<Chain<T>> {
        let labels = collect_labels(labels)?;
        let m2ms = labels
            .windows(2)
            .map(|pair| self.resolve(&pair[0], &pair[1]))
            .collect::<RelationResult<Vec<_>>>()?;
        Ok(Chain::new(m2ms))
    }

    /// Star fanning out from `center` to each of `labels`
    pub fn star<L: Into<ColumnLabel>>(
        &self,
        center: impl Into<ColumnLabel>,
        labels: impl IntoIterator<Item = L>,
    ) -> RelationResult<Star<T, T>> {
        let center = center.into();
        let m2ms = labels
            .into_iter()
            .map(|label| self.resolve(&center, &label.into()))
            .collect::<RelationResult<Vec<_>>>()?;
        Ok(Star::new(m2ms))
    }

    /// Edges whose both columns appear in `row`, with the values to relate
    fn row_pairs(&self, row: &IndexMap<ColumnLabel, T, FxBuildHasher>) -> RelationResult<Vec<(usize, T, T)>> {
        if row.len() < 2 {
            return Err(RelationError::ArityMismatch {
                expected: 2,
                actual: row.len(),
            });
        }
        for label in row.keys() {
            if !self.schema.contains_column(label) {
                return Err(RelationError::UnknownColumn(label.clone()));
            }
        }
        let mut pairs = Vec::new();
        for (edge, (from, to)) in self.schema.edges().iter().enumerate() {
            if let (Some(k), Some(v)) = (row.get(from), row.get(to)) {
                pairs.push((edge, k.clone(), v.clone()));
            }
        }
        for label in row.keys() {
            let related = self.schema.incident(label).iter().any(|&edge| {
                let (from, to) = self.schema.edge(edge);
                row.contains_key(from) && row.contains_key(to)
            });
            if !related {
                let other = row.keys().find(|other| *other != label).unwrap_or(label);
                return Err(RelationError::PathNotFound {
                    from: label.clone(),
                    to: other.clone(),
                });
            }
        }
        Ok(pairs)
    }

    /// Add one row of `(column, value)` to every relation it covers
    ///
    /// Every relation whose two columns both appear in the row receives the
    /// pair. Each label must be related to at least one other label of the
    /// row. Listeners see a single event.
    pub fn add<L: Into<ColumnLabel>>(&self, row: impl IntoIterator<Item = (L, T)>) -> RelationResult<()> {
        let row = collect_row(row);
        let pairs = self.row_pairs(&row)?;
        let mut batch = ChangeBatch::new();
        for (edge, key, value) in pairs {
            let m = &self.m2ms[edge];
            batch.listen(m.live_listeners());
            if let Some(change) = m.add_quiet(key, value) {
                batch.push(change);
            }
        }
        self.verify();
        batch.dispatch();
        Ok(())
    }

    /// Remove the pairs a row added; all of them must exist
    pub fn remove_row<L: Into<ColumnLabel>>(
        &self,
        row: impl IntoIterator<Item = (L, T)>,
    ) -> RelationResult<()> {
        let row = collect_row(row);
        let pairs = self.row_pairs(&row)?;
        for (edge, key, value) in &pairs {
            let m = &self.m2ms[*edge];
            if !m.contains(key, value) {
                return Err(RelationError::PairNotFound(m.relation_id()));
            }
        }
        let mut batch = ChangeBatch::new();
        for (edge, key, value) in &pairs {
            let m = &self.m2ms[*edge];
            batch.listen(m.live_listeners());
            if let Some(change) = m.remove_quiet(key, value) {
                batch.push(change);
            }
        }
        self.verify();
        batch.dispatch();
        Ok(())
    }

    /// Remove `obj` from column `label`, cascading to every incident relation
    ///
    /// Fails with `ObjectNotFound` if no incident relation holds `obj`.
    /// Listeners see one event covering every relation touched.
    pub fn remove(&self, label: impl Into<ColumnLabel>, obj: &T) -> RelationResult<()> {
        let label = label.into();
        if !self.schema.contains_column(&label) {
            return Err(RelationError::UnknownColumn(label));
        }
        let mut batch = ChangeBatch::new();
        let mut found = false;
        for &edge in self.schema.incident(&label) {
            let m = &self.m2ms[edge];
            batch.listen(m.live_listeners());
            let removed = if self.schema.edge(edge).0 == label {
                m.remove_key_quiet(obj)
            } else {
                m.remove_value_quiet(obj)
            };
            if let Some(changes) = removed {
                found = true;
                batch.extend(changes);
            }
        }
        if !found {
            return Err(RelationError::ObjectNotFound(label));
        }
        debug!("Cascaded removal from column {}", label);
        self.verify();
        batch.dispatch();
        Ok(())
    }

    /// Rename values of a column in every incident relation
    ///
    /// Each `(old, new)` moves all pairs of `old` onto `new`, merging with
    /// pairs `new` already has. Listeners see a single event.
    pub fn replace_column(
        &self,
        label: impl Into<ColumnLabel>,
        mapping: impl IntoIterator<Item = (T, T)>,
    ) -> RelationResult<()> {
        let label = label.into();
        if !self.schema.contains_column(&label) {
            return Err(RelationError::UnknownColumn(label));
        }
        let mapping: Vec<(T, T)> = mapping.into_iter().collect();
        let mut batch = ChangeBatch::new();
        for &edge in self.schema.incident(&label) {
            let m = &self.m2ms[edge];
            batch.listen(m.live_listeners());
            let keyed = if self.schema.edge(edge).0 == label {
                m.clone()
            } else {
                m.inverse()
            };
            for (old, new) in &mapping {
                batch.extend(keyed.replace_quiet(old, new.clone()));
            }
        }
        self.verify();
        batch.dispatch();
        Ok(())
    }

    /// Register an existing relation between `from` and `to`
    ///
    /// One of the columns must already exist. The map stays shared with the
    /// caller.
    pub fn add_relation(
        &mut self,
        from: impl Into<ColumnLabel>,
        to: impl Into<ColumnLabel>,
        m2m: BiMultiMap<T, T>,
    ) -> RelationResult<()> {
        let (from, to) = (from.into(), to.into());
        if !self.schema.contains_column(&from) && !self.schema.contains_column(&to) {
            return Err(RelationError::InvalidSchema(format!(
                "relation {} -> {} is not connected to the graph",
                from, to
            )));
        }
        self.schema.add_edge(from, to)?;
        self.m2ms.push(m2m);
        self.invalidate_indexes();
        Ok(())
    }

    /// Merge the relations of `other` into this graph
    ///
    /// Relations must be disjoint and the columns must overlap. Maps remain
    /// shared between both graphs.
    pub fn attach(&mut self, other: &Graph<T>) -> RelationResult<()> {
        for (from, to) in other.schema.edges() {
            if self.schema.hop(from, to).is_some() {
                return Err(RelationError::InvalidSchema(format!(
                    "relation between {} and {} is in both graphs",
                    from, to
                )));
            }
        }
        if !other.schema.columns().any(|c| self.schema.contains_column(c)) {
            return Err(RelationError::InvalidSchema("graphs share no column".to_string()));
        }
        let mut schema = self.schema.clone();
        for (from, to) in other.schema.edges() {
            schema.add_edge(from.clone(), to.clone())?;
        }
        self.schema = schema;
        self.m2ms.extend(other.m2ms.iter().cloned());
        self.invalidate_indexes();
        debug!("Attached {} relations", other.m2ms.len());
        Ok(())
    }

    /// Graph over some of this graph's relations, sharing their maps
    ///
    /// Relations may be named in either direction; the sub-graph stores them
    /// as named. They must form a connected graph.
    pub fn subgraph<A, B>(&self, relations: impl IntoIterator<Item = (A, B)>) -> RelationResult<Graph<T>>
    where
        A: Into<ColumnLabel>,
        B: Into<ColumnLabel>,
    {
        let mut schema = Schema::new();
        let mut m2ms = Vec::new();
        for (from, to) in relations {
            let (from, to) = (from.into(), to.into());
            m2ms.push(self.relation(&from, &to)?);
            schema.add_edge(from, to)?;
        }
        Self::from_parts(self.config.clone(), schema, m2ms)
    }

    /// Copy of the graph keeping only pairs whose values pass the column
    /// predicates
    ///
    /// A pair survives when each of its two columns either has no predicate
    /// or accepts the pair's value in that column. The copy has fresh maps.
    pub fn filtered(&self, filters: &[(&str, &dyn Fn(&T) -> bool)]) -> RelationResult<Graph<T>> {
        let mut predicates: IndexMap<ColumnLabel, &dyn Fn(&T) -> bool, FxBuildHasher> = IndexMap::default();
        for (label, predicate) in filters {
            let label = ColumnLabel::from(*label);
            if !self.schema.contains_column(&label) {
                return Err(RelationError::UnknownColumn(label));
            }
            predicates.insert(label, *predicate);
        }
        let keep = |label: &ColumnLabel, value: &T| predicates.get(label).map_or(true, |p| p(value));

        let m2ms = self
            .schema
            .edges()
            .iter()
            .zip(&self.m2ms)
            .map(|((from, to), m)| {
                m.iter_pairs()
                    .filter(|(k, v)| keep(from, k) && keep(to, v))
                    .collect::<BiMultiMap<T, T>>()
            })
            .collect();
        debug!("Filtered graph on {} columns", predicates.len());
        Self::from_parts(self.config.clone(), self.schema.clone(), m2ms)
    }

    fn invalidate_indexes(&self) {
        let stale: Vec<JoinIndex<T>> = self.indexes.borrow_mut().drain(..).map(|(_, index)| index).collect();
        if stale.is_empty() {
            return;
        }
        warn!("Schema changed, dropping {} cached indexes", stale.len());
        for index in stale {
            index.detach();
        }
    }

    fn verify(&self) {
        if self.config.verify_invariants {
            for m in &self.m2ms {
                assert!(m.is_consistent(), "relation {} is inconsistent", m.relation_id());
            }
        }
    }
}

impl<T: Element + 'static> PartialEq for Graph<T> {
    /// Same relations holding the same pairs
    fn eq(&self, other: &Self) -> bool {
        self.schema.edges() == other.schema.edges() && self.m2ms == other.m2ms
    }
}

impl<T: Element + fmt::Debug> fmt::Debug for Graph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for ((from, to), m) in self.schema.edges().iter().zip(&self.m2ms) {
            map.entry(&format_args!("{} -> {}", from, to), m);
        }
        map.finish()
    }
}

fn collect_labels<L: Into<ColumnLabel>>(labels: impl IntoIterator<Item = L>) -> RelationResult<Vec<ColumnLabel>> {
    let labels: Vec<ColumnLabel> = labels.into_iter().map(Into::into).collect();
    if labels.len() < 2 {
        return Err(RelationError::ArityMismatch {
            expected: 2,
            actual: labels.len(),
        });
    }
    Ok(labels)
}

/// Composed pairs of several paths merged into one owned relation
fn union_of<T: Element + 'static>(paths: Vec<Vec<BiMultiMap<T, T>>>) -> BiMultiMap<T, T> {
    let union = BiMultiMap::new();
    for path in paths {
        union.extend(JoinIndex::new(path, MaintenancePolicy::Recompute).iter_pairs());
    }
    union
}

fn collect_row<L: Into<ColumnLabel>, T>(row: impl IntoIterator<Item = (L, T)>) -> IndexMap<ColumnLabel, T, FxBuildHasher> {
    row.into_iter().map(|(label, value)| (label.into(), value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn school() -> Graph<&'static str> {
        let graph = Graph::new([("student", "class"), ("class", "teacher")]).unwrap();
        graph
            .add([("student", "alice"), ("class", "math"), ("teacher", "smith")])
            .unwrap();
        graph
            .add([("student", "bob"), ("class", "art"), ("teacher", "jones")])
            .unwrap();
        graph
    }

    #[test]
    fn test_construction_is_validated() {
        assert!(matches!(
            Graph::<u32>::new(Vec::<(&str, &str)>::new()),
            Err(RelationError::InvalidSchema(_))
        ));
        assert!(Graph::<u32>::new([("a", "a")]).is_err());
        assert!(Graph::<u32>::new([("a", "b"), ("b", "a")]).is_err());
        assert!(Graph::<u32>::new([("a", "b"), ("c", "d")]).is_err());
    }

    #[test]
    fn test_relation_is_shared_and_oriented() {
        let graph = school();
        let teaches = graph.relation("teacher", "class").unwrap();
        assert!(teaches.is_inverted());
        assert_eq!(teaches.get(&"smith").to_vec(), vec!["math"]);
        graph.relation("class", "teacher").unwrap().add("math", "lee");
        assert!(teaches.contains(&"lee", &"math"));
    }

    #[test]
    fn test_strict_path_errors() {
        let graph = school();
        assert_eq!(
            graph.path(["student", "teacher"]).unwrap_err(),
            RelationError::PathNotFound {
                from: "student".into(),
                to: "teacher".into()
            }
        );
        assert_eq!(
            graph.relation("student", "room").unwrap_err(),
            RelationError::UnknownColumn("room".into())
        );
        assert_eq!(graph.path(["student", "class", "teacher"]).unwrap().len(), 2);
    }

    #[test]
    fn test_pairs_is_cached_and_live() {
        let graph = school();
        let index = graph.pairs("student", "teacher");
        assert!(index.contains(&"alice", &"smith"));
        assert_eq!(graph.pairs("student", "teacher").id(), index.id());

        graph
            .add([("student", "carol"), ("class", "math")])
            .unwrap();
        assert!(index.contains(&"carol", &"smith"));

        assert!(graph.release_pairs("student", "teacher"));
        assert!(!index.is_attached());
        assert_ne!(graph.pairs("student", "teacher").id(), index.id());
    }

    #[test]
    fn test_pairs_edge_cases_are_empty() {
        let graph = school();
        assert!(graph.pairs("student", "student").is_empty());
        assert!(graph.pairs("student", "room").is_empty());
        assert!(!graph.pairs("student", "room").is_attached());
    }

    #[test]
    fn test_cascading_remove() {
        let graph = school();
        let far = graph.pairs("student", "class");
        graph.remove("class", &"math").unwrap();
        assert!(!graph.relation("student", "class").unwrap().contains_value(&"math"));
        assert!(!graph.relation("class", "teacher").unwrap().contains_key(&"math"));
        assert!(!far.contains(&"alice", &"math"));
        assert_eq!(
            graph.remove("class", &"math").unwrap_err(),
            RelationError::ObjectNotFound("class".into())
        );
    }

    #[test]
    fn test_row_validation() {
        let graph = school();
        assert!(matches!(
            graph.add([("student", "x")]),
            Err(RelationError::ArityMismatch { .. })
        ));
        assert!(matches!(
            graph.add([("student", "x"), ("teacher", "y")]),
            Err(RelationError::PathNotFound { .. })
        ));
        assert!(graph.remove_row([("student", "alice"), ("class", "art")]).unwrap_err().is_not_found());
        graph
            .remove_row([("student", "alice"), ("class", "math"), ("teacher", "smith")])
            .unwrap();
        assert_eq!(graph.column("student").unwrap(), vec!["bob"]);
    }

    #[test]
    fn test_chain_bridges_unrelated_columns() {
        let graph = school();
        let chain = graph.chain(["student", "teacher"]).unwrap();
        let rows: Vec<_> = chain.rows().collect();
        assert_eq!(rows, vec![vec!["alice", "smith"], vec!["bob", "jones"]]);

        let star = graph.star("class", ["student", "teacher"]).unwrap();
        assert_eq!(star.combinations(&"art"), vec![vec!["bob", "jones"]]);
    }

    #[test]
    fn test_replace_column() {
        let graph = school();
        graph.replace_column("class", [("math", "algebra")]).unwrap();
        assert_eq!(graph.column("class").unwrap(), vec!["art", "algebra"]);
        assert!(graph.relation("class", "teacher").unwrap().contains(&"algebra", &"smith"));
    }

    #[test]
    fn test_structural_change_drops_indexes() {
        let mut graph = school();
        let index = graph.pairs("student", "teacher");
        let rooms = BiMultiMap::from_pairs([("math", "r1")]);
        graph.add_relation("class", "room", rooms.clone()).unwrap();
        assert!(!index.is_attached());
        assert!(graph.pairs("student", "room").contains(&"alice", &"r1"));
        assert!(graph.add_relation("x", "y", BiMultiMap::new()).is_err());
    }

    #[test]
    fn test_attach_shares_maps() {
        let mut graph = school();
        let other = Graph::new([("teacher", "school")]).unwrap();
        other.add([("teacher", "smith"), ("school", "north")]).unwrap();
        graph.attach(&other).unwrap();
        assert!(graph.pairs("student", "school").contains(&"alice", &"north"));

        other.add([("teacher", "jones"), ("school", "south")]).unwrap();
        assert!(graph.pairs("student", "school").contains(&"bob", &"south"));
        assert!(graph.attach(&other).is_err());
    }

    fn triangle() -> Graph<u32> {
        let graph = Graph::new([("a", "b"), ("b", "c"), ("c", "a")]).unwrap();
        graph.add([("a", 1), ("b", 2)]).unwrap();
        graph.add([("b", 2), ("c", 3)]).unwrap();
        graph.add([("c", 30), ("a", 1)]).unwrap();
        graph
    }

    #[test]
    fn test_explicit_routes_around_a_cycle() {
        let graph = triangle();
        // the shortest route is the direct one
        assert!(!graph.pairs("a", "c").contains(&1, &3));

        let long_way = graph.pairs_along(["a", "b", "c"], MaintenancePolicy::Incremental).unwrap();
        assert!(long_way.contains(&1, &3));
        graph.remove("b", &2).unwrap();
        assert!(long_way.is_empty());

        assert!(matches!(
            graph.pairs_along(["a", "z"], MaintenancePolicy::Recompute),
            Err(RelationError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_pairs_via_unions_routes() {
        let graph = triangle();
        let both = graph.pairs_via([vec!["a", "b", "c"], vec!["a", "c"]]).unwrap();
        assert!(both.contains(&1, &3));
        assert!(both.contains(&1, &30));
        assert_eq!(both.pair_count(), 2);

        let err = graph.pairs_via([vec!["a", "b", "c"], vec!["b", "c"]]).unwrap_err();
        assert!(matches!(err, RelationError::InvalidSchema(_)));
        assert!(graph.pairs_via(Vec::<Vec<&str>>::new()).is_err());
    }

    #[test]
    fn test_pairs_ignoring_columns() {
        let graph = triangle();
        let all = graph.pairs_ignoring("a", "c", Vec::<&str>::new()).unwrap();
        assert_eq!(all.get(&1).to_vec(), vec![3, 30]);

        let around = graph.pairs_ignoring("a", "b", ["c"]).unwrap();
        assert_eq!(around.iter_pairs().collect::<Vec<_>>(), vec![(1, 2)]);

        assert_eq!(
            graph.pairs_ignoring("a", "c", ["b", "c"]).unwrap_err(),
            RelationError::PathNotFound {
                from: "a".into(),
                to: "c".into()
            }
        );
    }

    #[test]
    fn test_subgraph_shares_maps() {
        let graph = school();
        let sub = graph.subgraph([("class", "student")]).unwrap();
        assert_eq!(
            sub.relations(),
            vec![(ColumnLabel::from("class"), ColumnLabel::from("student"))]
        );
        sub.add([("student", "carol"), ("class", "math")]).unwrap();
        assert!(graph.relation("student", "class").unwrap().contains(&"carol", &"math"));

        assert!(matches!(
            graph.subgraph([("student", "teacher")]),
            Err(RelationError::PathNotFound { .. })
        ));
        assert!(graph.subgraph(Vec::<(&str, &str)>::new()).is_err());
    }

    #[test]
    fn test_filtered_copy() {
        let graph = school();
        let not_art: &dyn Fn(&&'static str) -> bool = &|class| *class != "art";
        let filtered = graph.filtered(&[("class", not_art)]).unwrap();

        assert_eq!(filtered.column("student").unwrap(), vec!["alice"]);
        assert_eq!(filtered.column("teacher").unwrap(), vec!["smith"]);
        // fresh maps
        filtered.add([("student", "dave"), ("class", "math")]).unwrap();
        assert!(!graph.relation("student", "class").unwrap().contains_key(&"dave"));

        let unknown: &dyn Fn(&&'static str) -> bool = &|_| true;
        assert!(matches!(
            graph.filtered(&[("room", unknown)]),
            Err(RelationError::UnknownColumn(_))
        ));
    }
}
