//! Configuration models for wikivents.
//!
//! Every tunable of a run lives here: where the endpoint is, how hard to push
//! it, how to batch entities, and where output goes. A missing file or a
//! missing section falls back to the defaults below.

use crate::parse::SchemaType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for wikivents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// SPARQL endpoint settings
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Discovery and batch retrieval settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// SPARQL endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Query service URL
    #[serde(default = "default_endpoint_url")]
    pub url: String,

    /// Client-side request timeout in seconds. Wikidata kills queries at 60s.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Minimum spacing between request starts, in milliseconds
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    /// Directory holding `<name>.sparql` files that replace the built-in templates
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
}

fn default_endpoint_url() -> String {
    "https://query.wikidata.org/sparql".to_string()
}

fn default_timeout() -> u64 {
    65
}

fn default_user_agent() -> String {
    format!(
        "wikivents/{} (https://github.com/heindl/wikivents)",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_min_request_interval_ms() -> u64 {
    10
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_endpoint_url(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            min_request_interval_ms: default_min_request_interval_ms(),
            templates_dir: None,
        }
    }
}

/// Discovery and retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Entity URIs per retrieval query
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum batch queries in flight at once
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Bindings buffered between fetch tasks and the writer
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// `instanceOfLabel` values excluded from discovery (case-insensitive)
    #[serde(default = "default_ignored_classes")]
    pub ignored_classes: Vec<String>,

    /// Abort the run on the first binding that cannot be classified
    #[serde(default = "default_true")]
    pub strict: bool,
}

fn default_batch_size() -> usize {
    50
}

fn default_max_in_flight() -> usize {
    5
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_ignored_classes() -> Vec<String> {
    [
        "year",
        "solar eclipse",
        "list of persons",
        "wikimedia list article",
        "decade",
        "year BC",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_true() -> bool {
    true
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_in_flight: default_max_in_flight(),
            channel_capacity: default_channel_capacity(),
            ignored_classes: default_ignored_classes(),
            strict: default_true(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the RDF and schema files
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Gzip the output files
    #[serde(default = "default_true")]
    pub compress: bool,

    /// Schema type declared for plain string, quantity and monolingual text features
    #[serde(default = "default_literal_schema_type")]
    pub literal_schema_type: SchemaType,
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_literal_schema_type() -> SchemaType {
    SchemaType::Int
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            compress: default_true(),
            literal_schema_type: default_literal_schema_type(),
        }
    }
}

impl OutputConfig {
    /// Path of the RDF triples file.
    pub fn rdf_path(&self) -> PathBuf {
        let name = if self.compress {
            "wikivents.nt.gz"
        } else {
            "wikivents.nt"
        };
        self.directory.join(name)
    }

    /// Path of the schema file.
    pub fn schema_path(&self) -> PathBuf {
        let name = if self.compress {
            "wikivents.schema.gz"
        } else {
            "wikivents.schema"
        };
        self.directory.join(name)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// Reject values that would stall or break a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "endpoint.url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.fetch.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch.batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.fetch.max_in_flight == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch.max_in_flight",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.fetch.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch.channel_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Unknown query template: '{0}'")]
    UnknownTemplate(String),

    #[error("Query template is empty: '{0}'")]
    EmptyTemplate(String),

    #[error("Query template '{name}' has no value for placeholder '{placeholder}'")]
    UnboundPlaceholder { name: String, placeholder: String },

    #[error("Failed to read query template {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.endpoint.url, "https://query.wikidata.org/sparql");
        assert_eq!(config.fetch.batch_size, 50);
        assert_eq!(config.fetch.max_in_flight, 5);
        assert!(config.fetch.strict);
        assert_eq!(config.fetch.ignored_classes.len(), 6);
        assert_eq!(config.output.literal_schema_type, SchemaType::Int);
        assert!(config.output.compress);
    }

    #[test]
    fn test_partial_override() {
        let config: Config = toml::from_str(
            r#"
            [fetch]
            max_in_flight = 1
            strict = false

            [output]
            compress = false
            literal_schema_type = "string"
            "#,
        )
        .unwrap();
        assert_eq!(config.fetch.max_in_flight, 1);
        assert_eq!(config.fetch.batch_size, 50);
        assert!(!config.fetch.strict);
        assert_eq!(config.output.literal_schema_type, SchemaType::String);
        assert!(config.output.rdf_path().ends_with("wikivents.nt"));
        assert!(config.output.schema_path().ends_with("wikivents.schema"));
    }

    #[test]
    fn test_from_file_rejects_zero_concurrency() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wikivents.toml");
        fs::write(&path, "[fetch]\nmax_in_flight = 0\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "fetch.max_in_flight",
                ..
            }
        ));
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "[fetch\nbatch_size = ").unwrap();

        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.fetch.batch_size, 50);
        assert!(config.output.rdf_path().ends_with("wikivents.nt.gz"));
    }
}
