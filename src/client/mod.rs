//! SPARQL client module.

mod rate_limiter;
mod sparql;
pub mod templates;

pub use rate_limiter::*;
pub use sparql::*;
pub use templates::TemplateRegistry;
