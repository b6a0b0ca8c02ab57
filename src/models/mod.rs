//! Core data models for wikivents.
//!
//! - `binding`: SPARQL result rows and the JSON envelope around them
//! - `config`: run configuration loaded from TOML
//! - `error`: the crate-wide error taxonomy
//! - `event`: flat event, participant and link records

mod binding;
mod config;
mod error;
mod event;

pub use binding::*;
pub use config::*;
pub use error::*;
pub use event::*;
