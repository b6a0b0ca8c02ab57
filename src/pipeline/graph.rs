//! Graph export pipeline.
//!
//! Pipeline flow:
//! Year range → Discovery → Batches → Bindings (mpsc) → Classifier → Deduplicating writer

use crate::client::{SparqlClient, TemplateRegistry};
use crate::models::{Binding, Config, Result, WikiventsError};
use crate::output::OutputFile;
use crate::parse::GraphWriter;
use crate::pool::{BatchFetcher, FetchStats, validate_years};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Statistics from one export run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub entities: usize,
    pub ignored_entities: usize,
    pub batches: usize,
    pub bindings_received: usize,
    /// Bindings skipped in lenient mode
    pub bindings_failed: usize,
    pub triples_written: u64,
    pub triples_duplicate: u64,
    pub schema_written: u64,
    pub schema_duplicate: u64,
    pub requests: u64,
    pub rate_limited: u64,
    pub runtime_secs: f64,
}

impl RunStats {
    fn record_fetch(&mut self, fetch: FetchStats) {
        self.entities = fetch.entities;
        self.ignored_entities = fetch.ignored_entities;
        self.batches = fetch.batches;
    }
}

/// Fetches a year range and writes it as N-Triples plus a DGraph schema.
pub struct GraphPipeline {
    fetcher: BatchFetcher,
    config: Config,
}

impl GraphPipeline {
    /// Create a pipeline from configuration.
    pub fn new(config: Config) -> Result<Self> {
        let client = Arc::new(SparqlClient::from_config(&config.endpoint)?);
        let templates = Arc::new(TemplateRegistry::load(
            config.endpoint.templates_dir.as_deref(),
        )?);
        let fetcher = BatchFetcher::new(client, templates, &config.fetch);
        Ok(Self { fetcher, config })
    }

    /// Create a pipeline around an existing fetcher.
    pub fn with_fetcher(config: Config, fetcher: BatchFetcher) -> Self {
        Self { fetcher, config }
    }

    /// Show a per-batch progress bar on the terminal.
    pub fn with_progress_bar(mut self) -> Self {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} batches ({percent}%)")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        self.fetcher = self.fetcher.with_progress(pb);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the export into the files named by the output configuration.
    pub async fn run(&self, start_year: i32, end_year: i32) -> Result<RunStats> {
        validate_years(start_year, end_year)?;

        let output = &self.config.output;
        std::fs::create_dir_all(&output.directory).map_err(|e| {
            WikiventsError::io(
                format!("creating output directory {}", output.directory.display()),
                e,
            )
        })?;
        let rdf = OutputFile::create(&output.rdf_path(), output.compress)?;
        let schema = OutputFile::create(&output.schema_path(), output.compress)?;
        let writer =
            GraphWriter::new(rdf, schema).with_literal_schema(output.literal_schema_type);

        let stats = self.run_with_writer(start_year, end_year, &writer).await?;

        let (rdf, schema) = writer.into_inner()?;
        rdf.finish()?;
        schema.finish()?;

        info!(
            rdf = %output.rdf_path().display(),
            schema = %output.schema_path().display(),
            "Output written"
        );
        Ok(stats)
    }

    /// Run the export into an existing writer.
    ///
    /// Bindings are classified as they arrive while batches are still being
    /// fetched. The first fatal error from either side ends the run.
    pub async fn run_with_writer<W: Write>(
        &self,
        start_year: i32,
        end_year: i32,
        writer: &GraphWriter<W>,
    ) -> Result<RunStats> {
        let start = Instant::now();
        let mut stats = RunStats::default();

        info!(
            start_year,
            end_year,
            batch_size = self.config.fetch.batch_size,
            max_in_flight = self.config.fetch.max_in_flight,
            strict = self.config.fetch.strict,
            "Starting graph export"
        );

        let (tx, mut rx) = mpsc::channel(self.config.fetch.channel_capacity.max(1));
        let fetch = self.fetcher.fetch_graph(start_year, end_year, tx);
        tokio::pin!(fetch);

        let mut fetched: Option<FetchStats> = None;
        loop {
            tokio::select! {
                result = &mut fetch, if fetched.is_none() => {
                    fetched = Some(result?);
                }
                received = rx.recv() => match received {
                    Some(binding) => {
                        stats.bindings_received += 1;
                        self.consume(writer, &binding, &mut stats)?;
                    }
                    None => break,
                }
            }
        }
        let fetched = match fetched {
            Some(f) => f,
            None => fetch.await?,
        };
        stats.record_fetch(fetched);

        writer.flush()?;
        let written = writer.stats()?;
        stats.triples_written = written.triples_written;
        stats.triples_duplicate = written.triples_duplicate;
        stats.schema_written = written.schema_written;
        stats.schema_duplicate = written.schema_duplicate;

        let limiter = self.fetcher.client().rate_limiter().stats();
        stats.requests = limiter.total_requests;
        stats.rate_limited = limiter.total_429s;
        stats.runtime_secs = start.elapsed().as_secs_f64();

        info!(
            entities = stats.entities,
            bindings = stats.bindings_received,
            failed = stats.bindings_failed,
            triples = stats.triples_written,
            schema = stats.schema_written,
            requests = stats.requests,
            rate_limited = stats.rate_limited,
            runtime = format!("{:.1}s", stats.runtime_secs),
            "Graph export complete"
        );

        Ok(stats)
    }

    fn consume<W: Write>(
        &self,
        writer: &GraphWriter<W>,
        binding: &Binding,
        stats: &mut RunStats,
    ) -> Result<()> {
        match writer.write_binding(binding) {
            Err(e) if !self.config.fetch.strict && e.is_binding_error() => {
                warn!(error = %e, binding = ?binding.values(), "Skipping unparseable binding");
                stats.bindings_failed += 1;
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{RateLimiter, templates};
    use crate::models::FetchConfig;
    use flate2::read::GzDecoder;
    use serde_json::json;
    use std::io::Read;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, query_param_contains};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIME: &str = "http://wikiba.se/ontology#Time";

    fn test_pipeline(server: &MockServer, config: Config) -> GraphPipeline {
        let client = SparqlClient::new(
            format!("{}/sparql", server.uri()),
            "wikivents-test",
            5,
            Some(Arc::new(RateLimiter::new(Duration::ZERO))),
        )
        .unwrap();
        let templates = TemplateRegistry::from_pairs([
            (templates::DATED_ENTITIES, "DISCOVER {{YearStart}} {{YearEnd}}"),
            (templates::ENTITY, "FETCH {{Entities}}"),
        ]);
        let fetcher = BatchFetcher::new(Arc::new(client), Arc::new(templates), &config.fetch);
        GraphPipeline::with_fetcher(config, fetcher)
    }

    fn term(kind: &str, value: &str) -> serde_json::Value {
        json!({"type": kind, "value": value})
    }

    fn claim(wikibase_type: &str, value: &str) -> serde_json::Value {
        json!({
            "object": term("uri", "http://www.wikidata.org/entity/Q1"),
            "objectLabel": term("literal", "Battle of Hastings"),
            "objectInstanceOfLabel": term("literal", "battle"),
            "propertyLabel": term("literal", "point in time"),
            "wikibaseType": term("uri", wikibase_type),
            "value": term("literal", value)
        })
    }

    async fn mount(server: &MockServer, bindings: Vec<serde_json::Value>) {
        Mock::given(method("GET"))
            .and(query_param_contains("query", "DISCOVER"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "head": {"vars": ["instanceOfLabel", "entities"]},
                "results": {"bindings": [{
                    "instanceOfLabel": term("literal", "battle"),
                    "entities": term("literal", "http://www.wikidata.org/entity/Q1")
                }]}
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(query_param_contains("query", "FETCH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "head": {"vars": ["object"]},
                "results": {"bindings": bindings}
            })))
            .mount(server)
            .await;
    }

    fn lines(buf: &[u8]) -> Vec<String> {
        String::from_utf8(buf.to_vec())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_run_writes_deduplicated_graph() {
        let mock_server = MockServer::start().await;
        let row = claim(TIME, "1066-10-14T00:00:00Z");
        mount(&mock_server, vec![row.clone(), row]).await;

        let pipeline = test_pipeline(&mock_server, Config::default());
        let writer = GraphWriter::new(Vec::new(), Vec::new());
        let stats = pipeline.run_with_writer(1066, 1066, &writer).await.unwrap();

        assert_eq!(stats.entities, 1);
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.bindings_received, 2);
        assert_eq!(stats.bindings_failed, 0);
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.triples_written, 3);
        assert_eq!(stats.triples_duplicate, 3);
        assert_eq!(stats.schema_written, 3);
        assert_eq!(stats.schema_duplicate, 3);

        let (rdf, schema) = writer.into_inner().unwrap();
        let rdf = lines(&rdf);
        assert_eq!(
            rdf,
            vec![
                "_:Q1 <t_battle> \"\" .",
                "_:Q1 <f_label> \"Battle of Hastings\" .",
                "_:Q1 <f_point_in_time> \"1066\" .",
            ]
        );
        let schema = lines(&schema);
        assert!(schema.contains(&"f_point_in_time: int .".to_string()));
        assert!(schema.contains(&"t_battle: uid @reverse .".to_string()));
    }

    #[tokio::test]
    async fn test_strict_run_fails_on_bad_binding() {
        let mock_server = MockServer::start().await;
        mount(
            &mock_server,
            vec![claim("http://wikiba.se/ontology#Lexeme", "L1")],
        )
        .await;

        let pipeline = test_pipeline(&mock_server, Config::default());
        let writer = GraphWriter::new(Vec::new(), Vec::new());
        let err = pipeline.run_with_writer(1, 2, &writer).await.unwrap_err();
        assert!(matches!(err, WikiventsError::UnknownOntology(_)));
    }

    #[tokio::test]
    async fn test_lenient_run_counts_bad_bindings() {
        let mock_server = MockServer::start().await;
        mount(
            &mock_server,
            vec![
                claim("http://wikiba.se/ontology#Lexeme", "L1"),
                claim(TIME, "1066-10-14T00:00:00Z"),
            ],
        )
        .await;

        let config = Config {
            fetch: FetchConfig {
                strict: false,
                ..FetchConfig::default()
            },
            ..Config::default()
        };
        let pipeline = test_pipeline(&mock_server, config);
        let writer = GraphWriter::new(Vec::new(), Vec::new());
        let stats = pipeline.run_with_writer(1, 2, &writer).await.unwrap();

        assert_eq!(stats.bindings_received, 2);
        assert_eq!(stats.bindings_failed, 1);
        let (rdf, _) = writer.into_inner().unwrap();
        assert!(lines(&rdf).contains(&"_:Q1 <f_point_in_time> \"1066\" .".to_string()));
    }

    #[tokio::test]
    async fn test_endpoint_failure_ends_run() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let pipeline = test_pipeline(&mock_server, Config::default());
        let writer = GraphWriter::new(Vec::new(), Vec::new());
        let err = pipeline.run_with_writer(1, 2, &writer).await.unwrap_err();
        assert!(matches!(err, WikiventsError::Endpoint(_)));
    }

    #[tokio::test]
    async fn test_run_writes_gzip_files() {
        let mock_server = MockServer::start().await;
        mount(&mock_server, vec![claim(TIME, "1066-10-14T00:00:00Z")]).await;

        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.output.directory = temp_dir.path().join("out");
        let pipeline = test_pipeline(&mock_server, config.clone());
        pipeline.run(1066, 1066).await.unwrap();

        let mut rdf = String::new();
        GzDecoder::new(std::fs::File::open(config.output.rdf_path()).unwrap())
            .read_to_string(&mut rdf)
            .unwrap();
        assert!(rdf.contains("_:Q1 <f_point_in_time> \"1066\" .\n"));

        let mut schema = String::new();
        GzDecoder::new(std::fs::File::open(config.output.schema_path()).unwrap())
            .read_to_string(&mut schema)
            .unwrap();
        assert!(schema.contains("f_label: string .\n"));
    }

    #[tokio::test]
    async fn test_invalid_years_create_no_files() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.output.directory = temp_dir.path().join("out");

        let pipeline = test_pipeline(&mock_server, config.clone());
        let err = pipeline.run(2000, 1999).await.unwrap_err();
        assert!(matches!(err, WikiventsError::Validation(_)));
        assert!(!config.output.directory.exists());
    }
}
