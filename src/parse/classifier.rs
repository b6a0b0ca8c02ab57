//! Turns one entity-property binding into a subject entity and a typed value.
//!
//! Expected variables, as produced by the `entity` query template:
//! `object`, `objectLabel`, `objectInstanceOfLabel`, `propertyLabel`,
//! `wikibaseType`, `value`, `valueLabel`, `valueInstanceOfLabel`.

use crate::models::{Binding, Result, WikiventsError};
use crate::parse::{
    Entity, EntityId, Ontology, ParsedValue, Predicate, PredicateKind, SchemaType,
    escape_feature_value,
};
use tracing::{debug, warn};

const INSTANCE_OF: &str = "instance of";
const SUBCLASS_OF: &str = "subclass of";

pub struct Classifier<'a> {
    binding: &'a Binding,
    literal_schema: SchemaType,
}

impl<'a> Classifier<'a> {
    pub fn new(binding: &'a Binding) -> Self {
        Self {
            binding,
            literal_schema: SchemaType::Int,
        }
    }

    /// Schema type for string, quantity and monolingual text features.
    pub fn with_literal_schema(mut self, schema_type: SchemaType) -> Self {
        self.literal_schema = schema_type;
        self
    }

    /// Build the entity referenced by `key` and its `Label` / `InstanceOfLabel` siblings.
    ///
    /// Blank nodes and unlabeled entities yield `None`.
    pub fn entity(&self, key: &str) -> Result<Option<Entity>> {
        if self.binding.result_type(key) == "bnode" {
            debug!(key = key, "Skipping blank node entity");
            return Ok(None);
        }

        let uri = self.binding.must_string(key)?;
        let id = EntityId::from_uri(key, uri)?;

        let name = match self.binding.must_string(&format!("{key}Label")) {
            Ok(name) => escape_feature_value(name),
            Err(_) => {
                warn!(binding = ?self.binding.values(), "Received incomplete entity");
                return Ok(None);
            }
        };

        // Subject entities often lack a class, so this one stays optional.
        let kind = Some(self.binding.string(&format!("{key}InstanceOfLabel")))
            .filter(|k| !k.is_empty())
            .map(escape_feature_value);

        Ok(Some(Entity { id, name, kind }))
    }

    /// Property label, or `None` for `instance of` which is carried by `Entity::kind`.
    pub fn label(&self) -> Result<Option<&'a str>> {
        let label = self.binding.must_string("propertyLabel")?;
        if label == INSTANCE_OF {
            return Ok(None);
        }
        Ok(Some(label))
    }

    pub fn ontology(&self) -> Result<Option<Ontology>> {
        let raw = self.binding.string("wikibaseType");
        if raw.is_empty() {
            return Ok(None);
        }
        Ontology::from_uri(raw)
            .map(Some)
            .ok_or_else(|| WikiventsError::UnknownOntology(raw.to_string()))
    }

    /// Classify the property side of the binding.
    pub fn value(&self) -> Result<Option<ParsedValue>> {
        let Some(label) = self.label()? else {
            return Ok(None);
        };

        let raw = self.binding.string("value").trim();
        if raw.is_empty() {
            return Err(WikiventsError::missing("value"));
        }

        if label == SUBCLASS_OF {
            return Ok(Some(ParsedValue::literal(
                "",
                Predicate::new(PredicateKind::EntityType, &escape_feature_value(raw)),
                SchemaType::Default,
            )));
        }

        let Some(ontology) = self.ontology()? else {
            return Ok(None);
        };

        let value = match ontology {
            Ontology::CommonsMedia | Ontology::ExternalId | Ontology::Url => None,
            Ontology::WikibaseItem => self
                .entity("value")?
                .map(|e| ParsedValue::edge(e, Predicate::new(PredicateKind::Edge, label))),
            Ontology::GlobeCoordinate => {
                let (lat, lng) = self.binding.must_coordinates("value")?;
                let geojson = format!(
                    r#"{{"type":"feature","geometry":{{"type": "Point","coordinates":[{lng:.6},{lat:.6}]}}}}"#
                );
                Some(ParsedValue::literal(
                    escape_feature_value(&geojson),
                    Predicate::new(PredicateKind::Feature, label),
                    SchemaType::Geo,
                ))
            }
            Ontology::Time => parse_year(raw).map(|year| {
                ParsedValue::literal(
                    year,
                    Predicate::new(PredicateKind::Feature, label),
                    SchemaType::Int,
                )
            }),
            Ontology::String | Ontology::Quantity | Ontology::Monolingualtext => {
                Some(ParsedValue::literal(
                    escape_feature_value(raw),
                    Predicate::new(PredicateKind::Feature, label),
                    self.literal_schema,
                ))
            }
        };
        Ok(value)
    }
}

/// Signed year of an xsd:dateTime literal. A leading `-` leaves the first
/// component empty, which marks a BCE year.
fn parse_year(raw: &str) -> Option<String> {
    let fields: Vec<&str> = raw.split('-').collect();
    if fields.len() < 2 {
        debug!(value = raw, "Skipping time value without date components");
        return None;
    }
    if fields[0].is_empty() {
        return Some(format!("-{}", fields[1]));
    }
    Some(fields[0].to_string())
}
