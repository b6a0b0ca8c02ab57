//! wikivents - Dated Wikidata entities exported as a DGraph-ready graph.
//!
//! ## Architecture
//!
//! - **Client**: paced SPARQL queries rendered from named templates
//! - **Pool**: discovery of dated entities and bounded concurrent batch retrieval
//! - **Parse**: classification of result bindings into predicates and values
//! - **Pipeline**: bindings streamed from the pool into a deduplicating writer, plus a
//!   flat event export of events, participants and links
//!
//! ## Output
//!
//! - N-Triples with blank-node subjects (`_:Q123 <f_label> "..." .`)
//! - A DGraph schema declaring every predicate once (`e_participant: uid @reverse .`)
//! - Headerless `events.csv`, `participants.csv` and `links.csv` tables

pub mod client;
pub mod models;
pub mod output;
pub mod parse;
pub mod pipeline;
pub mod pool;

// Re-exports for convenience
pub use client::{RateLimiter, SparqlClient, TemplateRegistry};
pub use models::{Binding, Config, Event, EventResponse, Result, WikiventsError};
pub use output::{OutputFile, write_csv};
pub use parse::{Classifier, GraphWriter};
pub use pipeline::{EventQuery, GraphPipeline, RunStats};
pub use pool::{BatchFetcher, FetchStats};
