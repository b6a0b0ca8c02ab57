//! Graph nodes and the values attached to them.

use crate::models::{Result, WikiventsError};
use crate::parse::{Predicate, SchemaType};
use std::fmt;

const ENTITY_SEGMENT: &str = "wikidata.org/entity/Q";

/// Wikidata item identifier, e.g. `Q42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    /// Take the last path segment of a full entity URI read from binding field `key`.
    pub fn from_uri(key: &str, uri: &str) -> Result<Self> {
        if !uri.contains(ENTITY_SEGMENT) {
            return Err(WikiventsError::invalid(
                key,
                format!("invalid wikidata entity uri: {uri}"),
            ));
        }
        let id = uri.rsplit('/').next().unwrap_or(uri);
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
    /// Display label, already quote-escaped
    pub name: String,
    /// Label of the entity's `instance of` class, when known
    pub kind: Option<String>,
}

/// The object side of a classified binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueTerm {
    Literal(String),
    Entity(Entity),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedValue {
    pub value: ValueTerm,
    pub predicate: Predicate,
    pub schema_type: SchemaType,
}

impl ParsedValue {
    pub fn literal(
        value: impl Into<String>,
        predicate: Predicate,
        schema_type: SchemaType,
    ) -> Self {
        Self {
            value: ValueTerm::Literal(value.into()),
            predicate,
            schema_type,
        }
    }

    pub fn edge(entity: Entity, predicate: Predicate) -> Self {
        Self {
            value: ValueTerm::Entity(entity),
            predicate,
            schema_type: SchemaType::Uid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_from_uri() {
        let id = EntityId::from_uri("object", "http://www.wikidata.org/entity/Q362").unwrap();
        assert_eq!(id.as_str(), "Q362");
    }

    #[test]
    fn test_entity_id_rejects_non_items() {
        for uri in [
            "",
            "http://www.wikidata.org/entity/P31",
            "http://dbpedia.org/resource/World_War_II",
        ] {
            assert!(matches!(
                EntityId::from_uri("value", uri),
                Err(WikiventsError::InvalidFormat { ref key, .. }) if key == "value"
            ));
        }
    }
}
