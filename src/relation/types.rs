//! Core type definitions for relations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Anything usable as a key or value of a relation: a value-comparable,
/// hashable token that can be cloned into both directions of the storage.
pub trait Element: Eq + Hash + Clone {}

impl<T: Eq + Hash + Clone> Element for T {}

static NEXT_RELATION_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of the storage behind a BiMultiMap
///
/// A map and its inverse share one storage and therefore one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct RelationId(pub u64);

impl RelationId {
    pub(crate) fn fresh() -> Self {
        RelationId(NEXT_RELATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelationId({})", self.0)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl ListenerId {
    pub(crate) fn fresh() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

/// Column label of a graph (e.g., "student", "class")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ColumnLabel(String);

impl ColumnLabel {
    pub fn new(label: impl Into<String>) -> Self {
        ColumnLabel(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ColumnLabel {
    fn from(s: String) -> Self {
        ColumnLabel(s)
    }
}

impl From<&str> for ColumnLabel {
    fn from(s: &str) -> Self {
        ColumnLabel(s.to_string())
    }
}

impl From<&String> for ColumnLabel {
    fn from(s: &String) -> Self {
        ColumnLabel(s.clone())
    }
}

impl From<&ColumnLabel> for ColumnLabel {
    fn from(label: &ColumnLabel) -> Self {
        label.clone()
    }
}

impl AsRef<str> for ColumnLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_ids_are_unique() {
        let a = RelationId::fresh();
        let b = RelationId::fresh();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_column_label() {
        let label = ColumnLabel::new("student");
        assert_eq!(label.as_str(), "student");
        assert_eq!(label.to_string(), "student");

        let from_str: ColumnLabel = "student".into();
        assert_eq!(label, from_str);
    }

    #[test]
    fn test_serialized_forms() {
        assert_eq!(serde_json::to_string(&ColumnLabel::new("class")).unwrap(), "\"class\"");
        assert_eq!(serde_json::to_string(&RelationId(7)).unwrap(), "7");
        let label: ColumnLabel = serde_json::from_str("\"teacher\"").unwrap();
        assert_eq!(label.as_str(), "teacher");
    }
}
