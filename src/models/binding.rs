//! SPARQL JSON result rows.
//!
//! A binding maps a query variable to a typed term. Variables that did not
//! bind are simply absent, so every reader comes in two flavors: a lenient one
//! that returns a zero value and a `must_` one that fails with `MissingField`.

use crate::models::{Result, WikiventsError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

static WKT_POINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]*)\)").expect("WKT pattern compiles"));

/// One term in a result row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingValue {
    #[serde(default)]
    pub datatype: String,
    /// `uri`, `literal` or `bnode`
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "xml:lang", default)]
    pub lang: String,
}

/// One row of a SPARQL result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Binding(HashMap<String, BindingValue>);

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly useful for canned rows.
    pub fn with(mut self, key: impl Into<String>, kind: &str, value: impl Into<String>) -> Self {
        self.insert(
            key,
            BindingValue {
                kind: kind.to_string(),
                value: value.into(),
                ..Default::default()
            },
        );
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: BindingValue) {
        self.0.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A key counts as present only if it carries a non-empty value.
    fn ensure_key(&self, key: &str) -> Result<&BindingValue> {
        match self.0.get(key) {
            Some(v) if !v.value.is_empty() => Ok(v),
            _ => Err(WikiventsError::missing(key)),
        }
    }

    pub fn string(&self, key: &str) -> &str {
        self.must_string(key).unwrap_or_default()
    }

    pub fn must_string(&self, key: &str) -> Result<&str> {
        self.ensure_key(key).map(|v| v.value.as_str())
    }

    pub fn int(&self, key: &str) -> i64 {
        self.must_int(key).unwrap_or_default()
    }

    pub fn must_int(&self, key: &str) -> Result<i64> {
        let raw = self.must_string(key)?;
        raw.trim().parse::<i64>().map_err(|e| {
            WikiventsError::invalid(key, format!("could not parse integer {raw:?}: {e}"))
        })
    }

    /// Raw date literal. Negative (BCE) years are kept as written.
    pub fn date(&self, key: &str) -> &str {
        self.string(key)
    }

    pub fn must_date(&self, key: &str) -> Result<&str> {
        self.must_string(key)
    }

    /// `(lat, lng)`, or `(0.0, 0.0)` when absent or malformed.
    pub fn coordinates(&self, key: &str) -> (f64, f64) {
        self.must_coordinates(key).unwrap_or((0.0, 0.0))
    }

    /// Parse a WKT literal such as `Point(14.2 41.1)` into `(lat, lng)`.
    ///
    /// WKT orders the pair longitude first.
    pub fn must_coordinates(&self, key: &str) -> Result<(f64, f64)> {
        let raw = self.must_string(key)?;
        let inner = WKT_POINT
            .captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| {
                WikiventsError::invalid(key, format!("{raw:?} does not match Point(lng lat)"))
            })?;

        let coords: Vec<&str> = inner.split_whitespace().collect();
        if coords.len() < 2 {
            return Err(WikiventsError::invalid(
                key,
                format!("{raw:?} does not match Point(lng lat)"),
            ));
        }

        let parse = |s: &str| {
            s.parse::<f64>().map_err(|e| {
                WikiventsError::invalid(key, format!("could not parse coordinate {s:?}: {e}"))
            })
        };
        let lng = parse(coords[0])?;
        let lat = parse(coords[1])?;
        Ok((lat, lng))
    }

    /// Result type tag of the term, empty when absent.
    pub fn result_type(&self, key: &str) -> &str {
        self.ensure_key(key).map(|v| v.kind.as_str()).unwrap_or_default()
    }

    /// Flat `key -> value` view, sorted for stable log output.
    pub fn values(&self) -> BTreeMap<&str, &str> {
        self.0
            .iter()
            .map(|(k, v)| (k.as_str(), v.value.as_str()))
            .collect()
    }
}

/// `head` section of the SPARQL JSON envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseHead {
    #[serde(default)]
    pub link: Vec<String>,
    #[serde(default)]
    pub vars: Vec<String>,
}

/// `results` section of the SPARQL JSON envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseResults {
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub ordered: bool,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

/// Decoded `application/sparql-results+json` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub head: ResponseHead,
    #[serde(default)]
    pub results: ResponseResults,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinate(value: &str) -> Binding {
        let mut b = Binding::new();
        b.insert(
            "coordinate",
            BindingValue {
                datatype: "http://www.opengis.net/ont/geosparql#wktLiteral".to_string(),
                kind: "literal".to_string(),
                value: value.to_string(),
                lang: String::new(),
            },
        );
        b
    }

    #[test]
    fn test_must_coordinates() {
        let (lat, lng) = coordinate("Point(14.2 41.1)")
            .must_coordinates("coordinate")
            .unwrap();
        assert_eq!(lat, 41.1);
        assert_eq!(lng, 14.2);
    }

    #[test]
    fn test_must_coordinates_rejects_malformed_points() {
        for raw in ["Point()", "Point(14.2)", "Point(abc 41.1)", "Point(14.2 north)", "14.2 41.1"] {
            let err = coordinate(raw).must_coordinates("coordinate").unwrap_err();
            assert!(
                matches!(err, WikiventsError::InvalidFormat { ref key, .. } if key == "coordinate"),
                "{raw} gave {err:?}"
            );
        }
        assert_eq!(coordinate("Point()").coordinates("coordinate"), (0.0, 0.0));
    }

    #[test]
    fn test_missing_and_empty_keys() {
        let b = Binding::new().with("empty", "literal", "");

        assert_eq!(b.string("absent"), "");
        assert_eq!(b.string("empty"), "");
        assert_eq!(b.int("absent"), 0);
        assert_eq!(b.result_type("absent"), "");
        assert!(matches!(
            b.must_string("empty"),
            Err(WikiventsError::MissingField { ref key }) if key == "empty"
        ));
        assert!(matches!(
            b.must_date("absent"),
            Err(WikiventsError::MissingField { .. })
        ));
    }

    #[test]
    fn test_int_readers() {
        let b = Binding::new()
            .with("count", "literal", "42")
            .with("word", "literal", "forty-two");

        assert_eq!(b.must_int("count").unwrap(), 42);
        assert_eq!(b.int("word"), 0);
        assert!(matches!(
            b.must_int("word"),
            Err(WikiventsError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_date_passes_negative_years_through() {
        let b = Binding::new().with("date", "literal", "-0500-01-01T00:00:00Z");
        assert_eq!(b.date("date"), "-0500-01-01T00:00:00Z");
    }

    #[test]
    fn test_decode_envelope() {
        let body = r#"{
            "head": {"vars": ["object", "objectLabel"]},
            "results": {"bindings": [
                {
                    "object": {"type": "uri", "value": "http://www.wikidata.org/entity/Q42"},
                    "objectLabel": {"xml:lang": "en", "type": "literal", "value": "Douglas Adams"}
                },
                {
                    "object": {"type": "bnode", "value": "t123"}
                }
            ]}
        }"#;
        let response: QueryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.head.vars, vec!["object", "objectLabel"]);
        assert_eq!(response.results.bindings.len(), 2);

        let first = &response.results.bindings[0];
        assert_eq!(first.result_type("object"), "uri");
        assert_eq!(first.string("objectLabel"), "Douglas Adams");
        assert_eq!(response.results.bindings[1].result_type("object"), "bnode");
    }
}
