//! Pipeline module - graph export and flat event export.

mod events;
mod graph;

pub use events::*;
pub use graph::*;
