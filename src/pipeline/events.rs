//! Flat event export: events with their participants, written as CSV tables.

use crate::client::{SparqlClient, TemplateRegistry, templates};
use crate::models::{Config, EventResponse, Result, WikiventsError, count_from_bindings};
use crate::output::write_csv;
use crate::pool::validate_years;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const EVENTS_FILE: &str = "events.csv";
pub const PARTICIPANTS_FILE: &str = "participants.csv";
pub const LINKS_FILE: &str = "links.csv";

/// Runs the single-request event and count queries.
pub struct EventQuery {
    client: Arc<SparqlClient>,
    templates: Arc<TemplateRegistry>,
}

impl EventQuery {
    pub fn new(client: Arc<SparqlClient>, templates: Arc<TemplateRegistry>) -> Self {
        Self { client, templates }
    }

    /// Create from configuration, loading template overrides if configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Arc::new(SparqlClient::from_config(&config.endpoint)?);
        let templates = Arc::new(TemplateRegistry::load(
            config.endpoint.templates_dir.as_deref(),
        )?);
        Ok(Self::new(client, templates))
    }

    fn render(&self, name: &str, start_year: i32, end_year: i32) -> Result<String> {
        validate_years(start_year, end_year)?;
        Ok(self.templates.render(
            name,
            &[
                ("YearStart", start_year.to_string()),
                ("YearEnd", end_year.to_string()),
            ],
        )?)
    }

    /// Fetch events dated within `[start_year, end_year]` with their participants.
    pub async fn fetch_events(&self, start_year: i32, end_year: i32) -> Result<EventResponse> {
        let query = self.render(templates::EVENTS, start_year, end_year)?;
        let response = self.client.query(&query).await?;
        let events = EventResponse::from_bindings(&response.results.bindings)?;
        info!(
            rows = response.results.bindings.len(),
            events = events.events.len(),
            participants = events.participants.len(),
            "Events fetched"
        );
        Ok(events)
    }

    /// Count distinct events dated within `[start_year, end_year]`.
    pub async fn count_events(&self, start_year: i32, end_year: i32) -> Result<u64> {
        let query = self.render(templates::COUNT_EVENTS, start_year, end_year)?;
        let response = self.client.query(&query).await?;
        count_from_bindings(&query, &response.results.bindings)
    }

    /// Fetch events and write `events.csv`, `participants.csv` and
    /// `links.csv` into `directory`.
    pub async fn export(
        &self,
        start_year: i32,
        end_year: i32,
        directory: &Path,
    ) -> Result<EventResponse> {
        let response = self.fetch_events(start_year, end_year).await?;

        std::fs::create_dir_all(directory).map_err(|e| {
            WikiventsError::io(
                format!("creating output directory {}", directory.display()),
                e,
            )
        })?;
        write_csv(&directory.join(EVENTS_FILE), &response.events)?;
        write_csv(&directory.join(PARTICIPANTS_FILE), &response.participants)?;
        write_csv(&directory.join(LINKS_FILE), &response.links)?;

        info!(directory = %directory.display(), "Event tables written");
        Ok(response)
    }
}
