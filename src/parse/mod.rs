//! Binding classification and graph output.
//!
//! - `Classifier`: one binding → subject `Entity` + optional `ParsedValue`
//! - `GraphWriter`: deduplicated triple and schema lines

mod classifier;
mod entity;
mod predicate;
mod writer;

pub use classifier::*;
pub use entity::*;
pub use predicate::*;
pub use writer::*;
