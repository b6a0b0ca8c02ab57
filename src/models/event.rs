//! Flat event records built from the `events` query.
//!
//! Each result row pairs one event with one participant. Events are
//! deduplicated by URI, participants likewise, and every row yields a link.

use crate::models::{Binding, Result, WikiventsError};
use serde::Serialize;
use std::collections::HashMap;

/// A dated event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Event {
    pub uri: String,
    pub label: String,
    #[serde(rename = "typeURI")]
    pub type_uri: String,
    /// Raw date literal, BCE years included
    pub date: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Event {
    /// Only `eventURI` is required; everything else falls back to zero values.
    pub fn from_binding(binding: &Binding) -> Result<Self> {
        let uri = binding.must_string("eventURI")?.to_string();
        let (latitude, longitude) = binding.coordinates("coordinates");
        Ok(Self {
            uri,
            label: binding.string("eventLabel").to_string(),
            type_uri: binding.string("typeURI").to_string(),
            date: binding.date("date").to_string(),
            latitude,
            longitude,
        })
    }
}

/// A party to an event, usually a group or state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub uri: String,
    pub label: String,
    #[serde(rename = "instanceURI")]
    pub instance_uri: String,
    #[serde(rename = "instanceLabel")]
    pub instance_label: String,
}

impl Participant {
    pub fn from_binding(binding: &Binding) -> Result<Self> {
        Ok(Self {
            uri: binding.must_string("participantURI")?.to_string(),
            label: binding.string("participantLabel").to_string(),
            instance_uri: binding.string("participantInstanceURI").to_string(),
            instance_label: binding.string("participantInstanceLabel").to_string(),
        })
    }
}

/// Event to participant association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub event_uri: String,
    pub participant_uri: String,
}

/// Events, participants and the links between them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventResponse {
    pub events: Vec<Event>,
    pub participants: Vec<Participant>,
    pub links: Vec<Link>,
}

impl EventResponse {
    /// Materialize rows in arrival order.
    ///
    /// A repeated event keeps its first position and takes the fields of the
    /// latest row. A repeated participant keeps its first row.
    pub fn from_bindings(bindings: &[Binding]) -> Result<Self> {
        let mut response = Self::default();
        let mut event_index: HashMap<String, usize> = HashMap::new();
        let mut participant_index: HashMap<String, usize> = HashMap::new();

        for binding in bindings {
            let event = Event::from_binding(binding)?;
            let participant = Participant::from_binding(binding)?;

            response.links.push(Link {
                event_uri: event.uri.clone(),
                participant_uri: participant.uri.clone(),
            });

            match event_index.get(&event.uri) {
                Some(&i) => response.events[i] = event,
                None => {
                    event_index.insert(event.uri.clone(), response.events.len());
                    response.events.push(event);
                }
            }

            if !participant_index.contains_key(&participant.uri) {
                participant_index.insert(participant.uri.clone(), response.participants.len());
                response.participants.push(participant);
            }
        }

        Ok(response)
    }
}

/// Read the `count` variable of a single-row aggregate result.
pub fn count_from_bindings(query: &str, bindings: &[Binding]) -> Result<u64> {
    let first = bindings.first().ok_or_else(|| WikiventsError::EmptyResult {
        query: query.to_string(),
    })?;
    let count = first.must_int("count")?;
    u64::try_from(count)
        .map_err(|_| WikiventsError::invalid("count", format!("negative count {count}")))
}
