//! Named SPARQL query templates.
//!
//! Templates use `{{Name}}` placeholders. The built-in set is compiled into the
//! binary; a directory of `<name>.sparql` files can replace any of them.

use crate::models::ConfigError;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Discovery query, parameters `YearStart` and `YearEnd`.
pub const DATED_ENTITIES: &str = "dated-entities";
/// Batch retrieval query, parameter `Entities`.
pub const ENTITY: &str = "entity";
/// Event and participant rows, parameters `YearStart` and `YearEnd`.
pub const EVENTS: &str = "events";
/// Single `count` row, parameters `YearStart` and `YearEnd`.
pub const COUNT_EVENTS: &str = "count-events";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern compiles")
});

#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: HashMap<String, String>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateRegistry {
    pub fn builtin() -> Self {
        Self::from_pairs([
            (DATED_ENTITIES, include_str!("queries/dated-entities.sparql")),
            (ENTITY, include_str!("queries/entity.sparql")),
            (EVENTS, include_str!("queries/events.sparql")),
            (COUNT_EVENTS, include_str!("queries/count-events.sparql")),
        ])
    }

    pub fn from_pairs<N, T>(pairs: impl IntoIterator<Item = (N, T)>) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        Self {
            templates: pairs
                .into_iter()
                .map(|(n, t)| (n.into(), t.into()))
                .collect(),
        }
    }

    /// Built-ins, with `*.sparql` files from `dir` layered on top.
    pub fn load(dir: Option<&Path>) -> Result<Self, ConfigError> {
        let mut registry = Self::builtin();
        let Some(dir) = dir else {
            return Ok(registry);
        };

        let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::TemplateRead {
            path: dir.to_owned(),
            source: e,
        })?;
        for entry in entries {
            let path = entry
                .map_err(|e| ConfigError::TemplateRead {
                    path: dir.to_owned(),
                    source: e,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("sparql") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let body = std::fs::read_to_string(&path).map_err(|e| ConfigError::TemplateRead {
                path: path.clone(),
                source: e,
            })?;
            debug!(template = name, path = %path.display(), "Loaded query template override");
            registry.templates.insert(name.to_string(), body);
        }
        Ok(registry)
    }

    /// Substitute `params` into the named template.
    ///
    /// Unknown names, empty templates and placeholders without a value are
    /// configuration errors.
    pub fn render(&self, name: &str, params: &[(&str, String)]) -> Result<String, ConfigError> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| ConfigError::UnknownTemplate(name.to_string()))?;
        if template.trim().is_empty() {
            return Err(ConfigError::EmptyTemplate(name.to_string()));
        }

        let mut unbound: Option<String> = None;
        let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            match params.iter().find(|(k, _)| *k == key) {
                Some((_, value)) => value.clone(),
                None => {
                    unbound.get_or_insert_with(|| key.to_string());
                    String::new()
                }
            }
        });
        if let Some(placeholder) = unbound {
            return Err(ConfigError::UnboundPlaceholder {
                name: name.to_string(),
                placeholder,
            });
        }

        debug!(template = name, query = %rendered, "Rendered query template");
        Ok(rendered.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_templates_render() {
        let registry = TemplateRegistry::builtin();

        let discovery = registry
            .render(
                DATED_ENTITIES,
                &[("YearStart", "-2".to_string()), ("YearEnd", "2".to_string())],
            )
            .unwrap();
        assert!(discovery.contains("YEAR(?date) >= -2 && YEAR(?date) <= 2"));
        assert!(!discovery.contains("{{"));

        let batch = registry
            .render(
                ENTITY,
                &[("Entities", "<http://www.wikidata.org/entity/Q1>".to_string())],
            )
            .unwrap();
        assert!(batch.contains("VALUES ?object { <http://www.wikidata.org/entity/Q1> }"));
    }

    #[test]
    fn test_builtin_event_templates_render() {
        let registry = TemplateRegistry::builtin();
        let years = [("YearStart", "-500".to_string()), ("YearEnd", "-400".to_string())];
        for name in [EVENTS, COUNT_EVENTS] {
            let query = registry.render(name, &years).unwrap();
            assert!(query.contains("YEAR(?date) >= -500 && YEAR(?date) <= -400"));
        }
        assert!(registry.render(COUNT_EVENTS, &years).unwrap().contains("AS ?count"));
    }

    #[test]
    fn test_unknown_and_empty_templates() {
        let registry = TemplateRegistry::from_pairs([("blank", "  \n")]);
        assert!(matches!(
            registry.render("missing", &[]),
            Err(ConfigError::UnknownTemplate(ref n)) if n == "missing"
        ));
        assert!(matches!(
            registry.render("blank", &[]),
            Err(ConfigError::EmptyTemplate(ref n)) if n == "blank"
        ));
    }

    #[test]
    fn test_unbound_placeholder() {
        let registry = TemplateRegistry::from_pairs([("q", "SELECT {{ Year }} {{Other}}")]);
        let err = registry
            .render("q", &[("Year", "1".to_string())])
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnboundPlaceholder { ref placeholder, .. } if placeholder == "Other"
        ));
    }

    #[test]
    fn test_directory_overrides() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("entity.sparql"), "FETCH {{Entities}}").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "not a template").unwrap();

        let registry = TemplateRegistry::load(Some(temp_dir.path())).unwrap();
        assert_eq!(
            registry
                .render(ENTITY, &[("Entities", "<a> <b>".to_string())])
                .unwrap(),
            "FETCH <a> <b>"
        );
        // Untouched built-ins remain available.
        assert!(registry
            .render(
                DATED_ENTITIES,
                &[("YearStart", "1".to_string()), ("YearEnd", "2".to_string())]
            )
            .is_ok());
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(matches!(
            TemplateRegistry::load(Some(&missing)),
            Err(ConfigError::TemplateRead { .. })
        ));
    }
}
