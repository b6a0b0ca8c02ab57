//! Predicates, schema types and the wikibase value-type ontology.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-zA-Z0-9]+").expect("predicate pattern compiles"));

/// Replace double quotes so a value can sit inside a quoted N-Triples literal.
pub fn escape_feature_value(v: &str) -> String {
    v.replace('"', "'")
}

/// What a predicate points at. The prefix is part of the predicate name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateKind {
    /// Edge to another entity (`e_`)
    Edge,
    /// Literal feature (`f_`)
    Feature,
    /// Empty-valued type marker (`t_`)
    EntityType,
}

impl PredicateKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Edge => "e_",
            Self::Feature => "f_",
            Self::EntityType => "t_",
        }
    }
}

/// Normalized, kind-prefixed predicate name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Predicate {
    kind: PredicateKind,
    name: String,
}

impl Predicate {
    /// Lower-case `label`, collapse every run of non-alphanumerics to `_`, and prefix.
    pub fn new(kind: PredicateKind, label: &str) -> Self {
        let lowered = label.to_lowercase();
        let normalized = NON_ALPHANUMERIC.replace_all(&lowered, "_");
        Self {
            kind,
            name: format!("{}{}", kind.prefix(), normalized),
        }
    }

    pub fn kind(&self) -> PredicateKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Storage type declared for a predicate in the DGraph schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Geo,
    Int,
    Float,
    String,
    Bool,
    #[default]
    Default,
    Uid,
}

impl SchemaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Geo => "geo",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Default => "default",
            Self::Uid => "uid",
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const WIKIBASE_ONTOLOGY: &str = "http://wikiba.se/ontology#";

/// Wikibase property value types the classifier knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ontology {
    Time,
    WikibaseItem,
    CommonsMedia,
    ExternalId,
    Url,
    String,
    Quantity,
    Monolingualtext,
    GlobeCoordinate,
}

impl Ontology {
    pub const ALL: [Ontology; 9] = [
        Self::Time,
        Self::WikibaseItem,
        Self::CommonsMedia,
        Self::ExternalId,
        Self::Url,
        Self::String,
        Self::Quantity,
        Self::Monolingualtext,
        Self::GlobeCoordinate,
    ];

    /// Match a full ontology URI such as `http://wikiba.se/ontology#Time`.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let local = uri.strip_prefix(WIKIBASE_ONTOLOGY)?;
        Self::ALL.into_iter().find(|o| o.local_name() == local)
    }

    pub fn local_name(self) -> &'static str {
        match self {
            Self::Time => "Time",
            Self::WikibaseItem => "WikibaseItem",
            Self::CommonsMedia => "CommonsMedia",
            Self::ExternalId => "ExternalId",
            Self::Url => "Url",
            Self::String => "String",
            Self::Quantity => "Quantity",
            Self::Monolingualtext => "Monolingualtext",
            Self::GlobeCoordinate => "GlobeCoordinate",
        }
    }

    pub fn uri(self) -> String {
        format!("{WIKIBASE_ONTOLOGY}{}", self.local_name())
    }

    /// Media, identifiers and links carry nothing worth a graph edge or feature.
    pub fn is_dropped(self) -> bool {
        matches!(self, Self::CommonsMedia | Self::ExternalId | Self::Url)
    }
}
