//! Relativity
//!
//! An in-memory relational data layer: many-to-many relations whose forward
//! and inverse views stay consistent under mutation, and the structures built
//! from them.
//!
//! # Architecture
//!
//! - `BiMultiMap`: a set of `(key, value)` pairs queryable from either side.
//!   Handles share storage; `inverse()` is the same relation seen swapped.
//! - `Chain` / `Star`: cheap views over existing relations (join path and
//!   fan-out).
//! - `Graph`: relations addressed by column labels, with cascading removal
//!   and deterministic routing between columns.
//! - `JoinIndex`: a composed `start -> end` view maintained incrementally from
//!   relation events, counting witnesses so parallel paths are handled.
//!
//! Everything is single-threaded and synchronous: events are delivered before
//! the mutating call returns, so an index never lags behind its relations.
//!
//! ## Example Usage
//!
//! ```rust
//! use relativity::{BiMultiMap, Graph};
//!
//! let enrolled = BiMultiMap::from_pairs([("alice", "math"), ("alice", "english"), ("bob", "english")]);
//! assert_eq!(enrolled.get_inverse(&"english").to_vec(), vec!["alice", "bob"]);
//!
//! let graph = Graph::new([("student", "class"), ("class", "teacher")]).unwrap();
//! graph.add([("student", "alice"), ("class", "math"), ("teacher", "smith")]).unwrap();
//!
//! let taught_by = graph.pairs("student", "teacher");
//! assert!(taught_by.contains(&"alice", &"smith"));
//!
//! graph.remove("class", &"math").unwrap();
//! assert!(taught_by.is_empty());
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod index;
pub mod relation;

// Re-export main types for convenience
pub use config::{ConfigError, RelationConfig};

pub use index::{JoinIndex, MaintenancePolicy};

pub use relation::{
    BiMultiMap, Bucket, Chain, Change, ColumnLabel, Element, Graph, ListenerId, Pairs,
    RelationChange, RelationError, RelationEvent, RelationId, RelationListener, RelationResult,
    Star, StarRow, ValueSet,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
