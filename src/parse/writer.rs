//! Deduplicating RDF and schema sinks.
//!
//! Both sinks remember every line they have emitted. Repeated properties and
//! entities show up across batches constantly, so a repeated line is a silent
//! no-op rather than an error. Each sink sits behind its own mutex; the lock is
//! held across the seen-check and the write so a line can never be emitted twice.

use crate::models::{Binding, Result, WikiventsError};
use crate::parse::{
    Classifier, Entity, EntityId, ParsedValue, Predicate, PredicateKind, SchemaType, ValueTerm,
};
use std::collections::HashSet;
use std::io::Write;
use std::sync::Mutex;

struct LineSink<W> {
    seen: HashSet<String>,
    writer: W,
    written: u64,
    duplicates: u64,
}

impl<W: Write> LineSink<W> {
    fn new(writer: W) -> Self {
        Self {
            seen: HashSet::new(),
            writer,
            written: 0,
            duplicates: 0,
        }
    }

    /// Returns whether the line was new.
    fn write_line(&mut self, line: String, subject: &str, predicate: &str) -> Result<bool> {
        if self.seen.contains(&line) {
            self.duplicates += 1;
            return Ok(false);
        }
        self.writer
            .write_all(line.as_bytes())
            .map_err(|source| WikiventsError::Write {
                subject: subject.to_string(),
                predicate: predicate.to_string(),
                source,
            })?;
        self.seen.insert(line);
        self.written += 1;
        Ok(true)
    }
}

/// Line counts for one writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub triples_written: u64,
    pub triples_duplicate: u64,
    pub schema_written: u64,
    pub schema_duplicate: u64,
}

/// Concurrency-safe sink for triple and schema lines.
pub struct GraphWriter<W> {
    rdf: Mutex<LineSink<W>>,
    schema: Mutex<LineSink<W>>,
    literal_schema: SchemaType,
}

impl<W: Write> GraphWriter<W> {
    pub fn new(rdf: W, schema: W) -> Self {
        Self {
            rdf: Mutex::new(LineSink::new(rdf)),
            schema: Mutex::new(LineSink::new(schema)),
            literal_schema: SchemaType::Int,
        }
    }

    /// Schema type declared for plain string, quantity and monolingual text features.
    pub fn with_literal_schema(mut self, schema_type: SchemaType) -> Self {
        self.literal_schema = schema_type;
        self
    }

    fn with_rdf<T>(&self, f: impl FnOnce(&mut LineSink<W>) -> Result<T>) -> Result<T> {
        let mut sink = self
            .rdf
            .lock()
            .map_err(|_| WikiventsError::Internal("rdf writer lock poisoned".to_string()))?;
        f(&mut sink)
    }

    fn with_schema<T>(&self, f: impl FnOnce(&mut LineSink<W>) -> Result<T>) -> Result<T> {
        let mut sink = self
            .schema
            .lock()
            .map_err(|_| WikiventsError::Internal("schema writer lock poisoned".to_string()))?;
        f(&mut sink)
    }

    /// `_:<entity> <predicate> "<value>" .`
    pub fn write_feature(
        &self,
        entity: &EntityId,
        predicate: &Predicate,
        value: &str,
    ) -> Result<bool> {
        let line = format!("_:{entity} <{predicate}> \"{value}\" .\n");
        self.with_rdf(|sink| sink.write_line(line, entity.as_str(), predicate.as_str()))
    }

    /// `_:<object> <predicate> _:<subject> .`
    pub fn write_edge(
        &self,
        object: &EntityId,
        predicate: &Predicate,
        subject: &EntityId,
    ) -> Result<bool> {
        let line = format!("_:{object} <{predicate}> _:{subject} .\n");
        self.with_rdf(|sink| sink.write_line(line, object.as_str(), predicate.as_str()))
    }

    /// `<predicate>: <type> .`, with `@reverse` for uid edges.
    pub fn write_schema(&self, predicate: &Predicate, schema_type: SchemaType) -> Result<bool> {
        let line = match schema_type {
            SchemaType::Uid => format!("{predicate}: {schema_type} @reverse .\n"),
            _ => format!("{predicate}: {schema_type} .\n"),
        };
        self.with_schema(|sink| sink.write_line(line, predicate.as_str(), schema_type.as_str()))
    }

    /// Emit the type marker and label of an entity.
    pub fn write_entity(&self, entity: &Entity) -> Result<()> {
        if let Some(kind) = &entity.kind {
            let predicate = Predicate::new(PredicateKind::EntityType, kind);
            self.write_feature(&entity.id, &predicate, "")?;
            self.write_schema(&predicate, SchemaType::Uid)?;
        }
        if !entity.name.is_empty() {
            let predicate = Predicate::new(PredicateKind::Feature, "label");
            self.write_feature(&entity.id, &predicate, &entity.name)?;
            self.write_schema(&predicate, SchemaType::String)?;
        }
        Ok(())
    }

    /// Emit a classified value hanging off `object`.
    pub fn write_value(&self, object: &Entity, value: &ParsedValue) -> Result<()> {
        match &value.value {
            ValueTerm::Entity(target) => {
                self.write_entity(target)?;
                self.write_edge(&object.id, &value.predicate, &target.id)?;
            }
            ValueTerm::Literal(text) => {
                self.write_feature(&object.id, &value.predicate, text)?;
            }
        }
        self.write_schema(&value.predicate, value.schema_type)?;
        Ok(())
    }

    /// Classify one binding and emit everything it yields.
    pub fn write_binding(&self, binding: &Binding) -> Result<()> {
        let classifier = Classifier::new(binding).with_literal_schema(self.literal_schema);
        let Some(object) = classifier.entity("object")? else {
            return Ok(());
        };
        self.write_entity(&object)?;

        let Some(value) = classifier.value()? else {
            return Ok(());
        };
        self.write_value(&object, &value)
    }

    pub fn stats(&self) -> Result<WriterStats> {
        let (triples_written, triples_duplicate) =
            self.with_rdf(|s| Ok((s.written, s.duplicates)))?;
        let (schema_written, schema_duplicate) =
            self.with_schema(|s| Ok((s.written, s.duplicates)))?;
        Ok(WriterStats {
            triples_written,
            triples_duplicate,
            schema_written,
            schema_duplicate,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.with_rdf(|s| {
            s.writer
                .flush()
                .map_err(|e| WikiventsError::io("flushing rdf output", e))
        })?;
        self.with_schema(|s| {
            s.writer
                .flush()
                .map_err(|e| WikiventsError::io("flushing schema output", e))
        })
    }

    /// Hand back the underlying `(rdf, schema)` writers.
    pub fn into_inner(self) -> Result<(W, W)> {
        let rdf = self
            .rdf
            .into_inner()
            .map_err(|_| WikiventsError::Internal("rdf writer lock poisoned".to_string()))?;
        let schema = self
            .schema
            .into_inner()
            .map_err(|_| WikiventsError::Internal("schema writer lock poisoned".to_string()))?;
        Ok((rdf.writer, schema.writer))
    }
}
