//! Relations and the structures composed from them
//!
//! - `BiMultiMap`: the atomic many-to-many relation
//! - `Chain`: relations joined end to end
//! - `Star`: relations fanning out from one key domain
//! - `Graph`: relations addressed by column labels

pub mod bimap;
pub mod chain;
pub mod error;
pub mod event;
pub mod graph;
mod schema;
pub mod star;
pub mod types;

pub use bimap::{BiMultiMap, Bucket, Pairs, ValueSet};
pub use chain::{Chain, Rows};
pub use error::{RelationError, RelationResult};
pub use event::{Change, RelationChange, RelationEvent, RelationListener};
pub use graph::Graph;
pub use star::{Star, StarRow};
pub use types::{ColumnLabel, Element, ListenerId, RelationId};
