//! Error types for wikivents.
//!
//! Failure classes:
//! - Caller input: rejected before any I/O (year range, configuration)
//! - Endpoint: the SPARQL service refused, timed out, or returned garbage
//! - Binding: one result row has a shape the classifier cannot use
//! - Sink: writing an output line failed

use thiserror::Error;

/// Top-level error type for wikivents.
#[derive(Debug, Error)]
pub enum WikiventsError {
    // ═══════════════════════════════════════════════════════════════════
    // Caller input
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Invalid input: {0}")]
    Validation(String),

    // ═══════════════════════════════════════════════════════════════════
    // Endpoint boundary
    // ═══════════════════════════════════════════════════════════════════

    #[error("SPARQL endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Zero bindings returned for query [{query}]")]
    EmptyResult { query: String },

    #[error("Could not decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Binding classification
    // ═══════════════════════════════════════════════════════════════════

    #[error("Key [{key}] not found in binding")]
    MissingField { key: String },

    #[error("Invalid format for [{key}]: {reason}")]
    InvalidFormat { key: String, reason: String },

    #[error("Unknown ontology: {0}")]
    UnknownOntology(String),

    // ═══════════════════════════════════════════════════════════════════
    // Output
    // ═══════════════════════════════════════════════════════════════════

    #[error("Could not write [{subject}] [{predicate}]: {source}")]
    Write {
        subject: String,
        predicate: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not write CSV {path:?}: {source}")]
    Csv {
        path: std::path::PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Orchestration
    // ═══════════════════════════════════════════════════════════════════

    #[error("Batch {index} failed: {source}")]
    Batch {
        index: usize,
        #[source]
        source: Box<WikiventsError>,
    },

    #[error("Binding channel closed unexpectedly")]
    ChannelClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures reported by the SPARQL endpoint itself.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("{endpoint} thinks you're making too many requests (429)")]
    RateLimited { endpoint: String },

    #[error("Transient failure from {endpoint}: {reason}")]
    TransientFailure { endpoint: String, reason: String },

    #[error("Request to {endpoint} failed with status [{status}]")]
    UnexpectedStatus { endpoint: String, status: String },
}

impl WikiventsError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingField { key: key.into() }
    }

    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from classifying a single binding, as opposed to
    /// the endpoint, the sink, or the run configuration.
    pub fn is_binding_error(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. } | Self::InvalidFormat { .. } | Self::UnknownOntology(_)
        )
    }
}

/// Result type alias for wikivents.
pub type Result<T> = std::result::Result<T, WikiventsError>;
