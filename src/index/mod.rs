//! Join indexes
//!
//! Derived views composing a path of relations into one `start -> end`
//! mapping, kept current from relation events.

mod compose;
pub mod join_index;

pub use join_index::{JoinIndex, MaintenancePolicy};
