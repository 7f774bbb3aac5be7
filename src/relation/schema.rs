//! Column adjacency of a graph and deterministic route search

use super::error::{RelationError, RelationResult};
use super::types::ColumnLabel;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::collections::VecDeque;
use tracing::trace;

/// One step along a route: which relation, and in which direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Hop {
    pub edge: usize,
    /// Traversed from its declared `from` column to its `to` column
    pub forward: bool,
}

/// Columns and the relations between them, in registration order
#[derive(Debug, Clone, Default)]
pub(crate) struct Schema {
    /// column -> incident edge indices
    columns: IndexMap<ColumnLabel, Vec<usize>, FxBuildHasher>,
    edges: Vec<(ColumnLabel, ColumnLabel)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relation between two columns
    pub fn add_edge(&mut self, from: ColumnLabel, to: ColumnLabel) -> RelationResult<usize> {
        if from == to {
            return Err(RelationError::InvalidSchema(format!(
                "relation {} -> {} references itself",
                from, to
            )));
        }
        if self.hop(&from, &to).is_some() {
            return Err(RelationError::InvalidSchema(format!(
                "relation between {} and {} declared twice",
                from, to
            )));
        }
        let edge = self.edges.len();
        self.columns.entry(from.clone()).or_default().push(edge);
        self.columns.entry(to.clone()).or_default().push(edge);
        self.edges.push((from, to));
        Ok(edge)
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnLabel> {
        self.columns.keys()
    }

    pub fn contains_column(&self, label: &ColumnLabel) -> bool {
        self.columns.contains_key(label)
    }

    pub fn edges(&self) -> &[(ColumnLabel, ColumnLabel)] {
        &self.edges
    }

    pub fn edge(&self, edge: usize) -> &(ColumnLabel, ColumnLabel) {
        &self.edges[edge]
    }

    /// Edges touching `label`, in registration order
    pub fn incident(&self, label: &ColumnLabel) -> &[usize] {
        self.columns.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The relation directly connecting `a` to `b`, if any
    pub fn hop(&self, a: &ColumnLabel, b: &ColumnLabel) -> Option<Hop> {
        self.incident(a).iter().find_map(|&edge| {
            let (from, to) = &self.edges[edge];
            if from == a && to == b {
                Some(Hop { edge, forward: true })
            } else if to == a && from == b {
                Some(Hop { edge, forward: false })
            } else {
                None
            }
        })
    }

    fn other_end(&self, hop: Hop) -> &ColumnLabel {
        let (from, to) = &self.edges[hop.edge];
        if hop.forward {
            to
        } else {
            from
        }
    }

    fn require(&self, label: &ColumnLabel) -> RelationResult<()> {
        if self.contains_column(label) {
            Ok(())
        } else {
            Err(RelationError::UnknownColumn(label.clone()))
        }
    }

    /// Shortest route from `source` to `target`
    ///
    /// Breadth-first over incident relations in registration order; the first
    /// discovery of a column fixes its parent, so among equally short routes
    /// the one whose hops were registered earliest (compared hop by hop from
    /// `source`) wins. The same schema always yields the same route.
    pub fn route(&self, source: &ColumnLabel, target: &ColumnLabel) -> RelationResult<Vec<Hop>> {
        self.require(source)?;
        self.require(target)?;
        if source == target {
            return Ok(Vec::new());
        }

        let mut queue = VecDeque::new();
        let mut parents: IndexMap<&ColumnLabel, Option<Hop>, FxBuildHasher> = IndexMap::default();
        queue.push_back(source);
        parents.insert(source, None);

        while let Some(current) = queue.pop_front() {
            if current == target {
                let mut hops = Vec::new();
                let mut column = target;
                while let Some(Some(hop)) = parents.get(column) {
                    hops.push(*hop);
                    let (from, to) = &self.edges[hop.edge];
                    column = if hop.forward { from } else { to };
                }
                hops.reverse();
                trace!("Route {} -> {} takes {} hops", source, target, hops.len());
                return Ok(hops);
            }
            for &edge in self.incident(current) {
                let forward = self.edges[edge].0 == *current;
                let hop = Hop { edge, forward };
                let next = self.other_end(hop);
                if !parents.contains_key(next) {
                    parents.insert(next, Some(hop));
                    queue.push_back(next);
                }
            }
        }

        Err(RelationError::PathNotFound {
            from: source.clone(),
            to: target.clone(),
        })
    }

    /// Every simple route from `source` to `target` avoiding `ignore`
    ///
    /// Depth-first over incident relations in registration order, so the
    /// order of the routes is stable. A column never repeats within a route.
    pub fn all_routes(
        &self,
        source: &ColumnLabel,
        target: &ColumnLabel,
        ignore: &[ColumnLabel],
    ) -> RelationResult<Vec<Vec<Hop>>> {
        self.require(source)?;
        self.require(target)?;
        let mut routes = Vec::new();
        let mut visited = vec![source];
        let mut hops = Vec::new();
        self.extend_routes(source, target, ignore, &mut visited, &mut hops, &mut routes);
        trace!("{} routes from {} to {}", routes.len(), source, target);
        Ok(routes)
    }

    fn extend_routes<'s>(
        &'s self,
        current: &'s ColumnLabel,
        target: &ColumnLabel,
        ignore: &[ColumnLabel],
        visited: &mut Vec<&'s ColumnLabel>,
        hops: &mut Vec<Hop>,
        routes: &mut Vec<Vec<Hop>>,
    ) {
        if current == target {
            routes.push(hops.clone());
            return;
        }
        for &edge in self.incident(current) {
            let hop = Hop {
                edge,
                forward: self.edges[edge].0 == *current,
            };
            let next = self.other_end(hop);
            if visited.contains(&next) || ignore.contains(next) {
                continue;
            }
            visited.push(next);
            hops.push(hop);
            self.extend_routes(next, target, ignore, visited, hops, routes);
            hops.pop();
            visited.pop();
        }
    }

    /// Column labels visited by a route, starting at `source`
    pub fn route_columns(&self, source: &ColumnLabel, hops: &[Hop]) -> Vec<ColumnLabel> {
        let mut columns = vec![source.clone()];
        for hop in hops {
            columns.push(self.other_end(*hop).clone());
        }
        columns
    }

    /// Whether every column is reachable from the first one
    pub fn is_connected(&self) -> bool {
        let Some(first) = self.columns.keys().next() else {
            return true;
        };
        self.columns
            .keys()
            .all(|label| self.route(first, label).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(pairs: &[(&str, &str)]) -> Schema {
        let mut schema = Schema::new();
        for (from, to) in pairs {
            schema.add_edge((*from).into(), (*to).into()).unwrap();
        }
        schema
    }

    #[test]
    fn test_all_routes_on_a_cycle() {
        let s = schema(&[("a", "b"), ("b", "c"), ("c", "a")]);
        let routes = s.all_routes(&"a".into(), &"c".into(), &[]).unwrap();
        let labels: Vec<Vec<ColumnLabel>> = routes
            .iter()
            .map(|hops| s.route_columns(&"a".into(), hops))
            .collect();
        let expected: Vec<Vec<ColumnLabel>> = vec![
            vec!["a".into(), "b".into(), "c".into()],
            vec!["a".into(), "c".into()],
        ];
        assert_eq!(labels, expected);

        let direct = s.all_routes(&"a".into(), &"c".into(), &[ColumnLabel::from("b")]).unwrap();
        assert_eq!(direct.len(), 1);
        assert!(s.all_routes(&"a".into(), &"c".into(), &[ColumnLabel::from("c")]).unwrap().is_empty());
        assert!(s.all_routes(&"a".into(), &"z".into(), &[]).is_err());
    }

    #[test]
    fn test_hop_in_both_directions() {
        let s = schema(&[("student", "class")]);
        assert_eq!(s.hop(&"student".into(), &"class".into()), Some(Hop { edge: 0, forward: true }));
        assert_eq!(s.hop(&"class".into(), &"student".into()), Some(Hop { edge: 0, forward: false }));
        assert_eq!(s.hop(&"class".into(), &"teacher".into()), None);
    }

    #[test]
    fn test_rejects_self_loop_and_duplicates() {
        let mut s = schema(&[("a", "b")]);
        assert!(matches!(s.add_edge("a".into(), "a".into()), Err(RelationError::InvalidSchema(_))));
        assert!(matches!(s.add_edge("b".into(), "a".into()), Err(RelationError::InvalidSchema(_))));
    }

    #[test]
    fn test_route_prefers_shortest() {
        let s = schema(&[("a", "b"), ("b", "c"), ("c", "d"), ("a", "d")]);
        let hops = s.route(&"a".into(), &"d".into()).unwrap();
        assert_eq!(hops, vec![Hop { edge: 3, forward: true }]);
    }

    #[test]
    fn test_route_tie_break_is_registration_order() {
        // a-b-d and a-c-d are equally short; a-b was registered first
        let s = schema(&[("c", "d"), ("a", "b"), ("a", "c"), ("b", "d")]);
        let hops = s.route(&"a".into(), &"d".into()).unwrap();
        let columns = s.route_columns(&"a".into(), &hops);
        let names: Vec<_> = columns.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "d"]);
    }

    #[test]
    fn test_route_errors() {
        let mut s = schema(&[("a", "b")]);
        s.add_edge("c".into(), "d".into()).unwrap();
        assert!(!s.is_connected());
        assert_eq!(
            s.route(&"a".into(), &"d".into()),
            Err(RelationError::PathNotFound { from: "a".into(), to: "d".into() })
        );
        assert_eq!(
            s.route(&"a".into(), &"z".into()),
            Err(RelationError::UnknownColumn("z".into()))
        );
        assert!(s.route(&"a".into(), &"a".into()).unwrap().is_empty());
    }
}
