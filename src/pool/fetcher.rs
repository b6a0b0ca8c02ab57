//! Entity discovery and batched retrieval.
//!
//! Two phases:
//! 1. One discovery query lists every entity with a date inside the year range.
//! 2. The entity URIs are deduplicated, cut into fixed-size batches, and each
//!    batch's full claim set is fetched by its own task. A semaphore bounds how
//!    many of those queries are in flight against the endpoint.
//!
//! Retrieved bindings are pushed into an mpsc channel; the consumer decides what
//! to do with them.

use crate::client::{SparqlClient, TemplateRegistry, templates};
use crate::models::{Binding, FetchConfig, Result, WikiventsError};
use indicatif::ProgressBar;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info};

/// A group of entity URIs fetched with one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityBatch {
    pub index: usize,
    pub uris: Vec<String>,
}

/// Outcome of the discovery phase.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Distinct entity URIs kept
    pub entities: usize,
    /// Entity references dropped because their class is ignored
    pub ignored_entities: usize,
    pub batches: Vec<EntityBatch>,
}

/// Counts for one `fetch_graph` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub entities: usize,
    pub ignored_entities: usize,
    pub batches: usize,
    pub bindings: usize,
}

/// Split `entities` into batches of at most `batch_size`, in iteration order.
///
/// Only the last batch can be short. Empty URIs are dropped.
pub fn partition<I>(entities: I, batch_size: usize) -> Vec<EntityBatch>
where
    I: IntoIterator<Item = String>,
{
    let uris: Vec<String> = entities.into_iter().filter(|u| !u.is_empty()).collect();
    uris.chunks(batch_size.max(1))
        .enumerate()
        .map(|(index, chunk)| EntityBatch {
            index,
            uris: chunk.to_vec(),
        })
        .collect()
}

/// Both bounds are required and the range must not run backwards.
pub fn validate_years(start_year: i32, end_year: i32) -> Result<()> {
    if start_year == 0 || end_year == 0 {
        return Err(WikiventsError::Validation(
            "start and end year required".to_string(),
        ));
    }
    if end_year < start_year {
        return Err(WikiventsError::Validation(format!(
            "end year {end_year} is before start year {start_year}"
        )));
    }
    Ok(())
}

/// Discovers dated entities and retrieves their claims batch by batch.
pub struct BatchFetcher {
    client: Arc<SparqlClient>,
    templates: Arc<TemplateRegistry>,
    batch_size: usize,
    max_in_flight: usize,
    /// Lower-cased
    ignored_classes: HashSet<String>,
    progress: ProgressBar,
}

impl BatchFetcher {
    pub fn new(
        client: Arc<SparqlClient>,
        templates: Arc<TemplateRegistry>,
        config: &FetchConfig,
    ) -> Self {
        Self {
            client,
            templates,
            batch_size: config.batch_size.max(1),
            max_in_flight: config.max_in_flight.max(1),
            ignored_classes: config
                .ignored_classes
                .iter()
                .map(|c| c.to_lowercase())
                .collect(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Advance `progress` once per completed batch.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn client(&self) -> &Arc<SparqlClient> {
        &self.client
    }

    /// Run the discovery query and batch the distinct entity URIs it returns.
    pub async fn discover(&self, start_year: i32, end_year: i32) -> Result<Discovery> {
        let query = self.templates.render(
            templates::DATED_ENTITIES,
            &[
                ("YearStart", start_year.to_string()),
                ("YearEnd", end_year.to_string()),
            ],
        )?;
        let response = self.client.query(&query).await?;

        let mut entities = BTreeSet::new();
        let mut ignored_entities = 0;
        for binding in &response.results.bindings {
            let uris = binding.string("entities").split_whitespace();
            let class = binding.string("instanceOfLabel").to_lowercase();
            if self.ignored_classes.contains(&class) {
                debug!(class = %class, "Ignoring entity class");
                ignored_entities += uris.count();
                continue;
            }
            entities.extend(uris.map(str::to_string));
        }

        let count = entities.len();
        Ok(Discovery {
            entities: count,
            ignored_entities,
            batches: partition(entities, self.batch_size),
        })
    }

    /// Discover entities dated within `[start_year, end_year]` and send every
    /// binding of their claims to `sender`.
    ///
    /// Returns after every batch has been delivered, or with the first error.
    /// Batches still running at that point are left to finish on their own and
    /// their output is discarded by the caller.
    pub async fn fetch_graph(
        &self,
        start_year: i32,
        end_year: i32,
        sender: mpsc::Sender<Binding>,
    ) -> Result<FetchStats> {
        validate_years(start_year, end_year)?;

        let discovery = self.discover(start_year, end_year).await?;
        let mut stats = FetchStats {
            entities: discovery.entities,
            ignored_entities: discovery.ignored_entities,
            batches: discovery.batches.len(),
            bindings: 0,
        };

        info!(
            entities = discovery.entities,
            ignored_entities = discovery.ignored_entities,
            "Received entity references from the SPARQL endpoint"
        );

        if discovery.batches.is_empty() {
            return Ok(stats);
        }

        info!(
            batches = stats.batches,
            max_in_flight = self.max_in_flight,
            "Requesting complete entity records, slow because the endpoint rate limits heavily"
        );

        self.progress.set_length(stats.batches as u64);
        stats.bindings = self.retrieve(discovery.batches, sender).await?;
        self.progress.finish();

        info!(bindings = stats.bindings, "Finished SPARQL requests");
        Ok(stats)
    }

    /// Fetch every batch under the concurrency bound. Returns bindings delivered.
    async fn retrieve(
        &self,
        batches: Vec<EntityBatch>,
        sender: mpsc::Sender<Binding>,
    ) -> Result<usize> {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let completed = Arc::new(AtomicUsize::new(0));
        let total = batches.len();
        let mut tasks = JoinSet::new();

        for batch in batches {
            let task = self.task_handle();
            let semaphore = Arc::clone(&semaphore);
            let completed = Arc::clone(&completed);
            let sender = sender.clone();
            let progress = self.progress.clone();

            tasks.spawn(async move {
                let index = batch.index;
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| WikiventsError::Internal("Semaphore closed".to_string()))?;

                let delivered = task
                    .fetch_batch(&batch, &sender)
                    .await
                    .map_err(|e| WikiventsError::Batch {
                        index,
                        source: Box::new(e),
                    })?;

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                progress.inc(1);
                info!(
                    batch = index,
                    bindings = delivered,
                    "{}% returned",
                    (done * 100) / total
                );
                Ok::<usize, WikiventsError>(delivered)
            });
        }
        drop(sender);

        let mut delivered = 0;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => Err(WikiventsError::Internal(format!("Batch task failed: {e}"))),
            };
            match outcome {
                Ok(n) => delivered += n,
                Err(e) => {
                    tasks.detach_all();
                    return Err(e);
                }
            }
        }
        Ok(delivered)
    }

    /// Create a lightweight clone for spawning tasks.
    fn task_handle(&self) -> BatchTask {
        BatchTask {
            client: Arc::clone(&self.client),
            templates: Arc::clone(&self.templates),
        }
    }
}

/// Lightweight handle for spawned batch tasks.
struct BatchTask {
    client: Arc<SparqlClient>,
    templates: Arc<TemplateRegistry>,
}

impl BatchTask {
    async fn fetch_batch(
        &self,
        batch: &EntityBatch,
        sender: &mpsc::Sender<Binding>,
    ) -> Result<usize> {
        let entities = batch
            .uris
            .iter()
            .filter(|u| !u.is_empty())
            .map(|u| format!("<{u}>"))
            .collect::<Vec<_>>()
            .join(" ");
        if entities.is_empty() {
            return Ok(0);
        }

        let query = self
            .templates
            .render(templates::ENTITY, &[("Entities", entities)])?;
        let response = self.client.query(&query).await?;

        let mut delivered = 0;
        for binding in response.results.bindings {
            sender
                .send(binding)
                .await
                .map_err(|_| WikiventsError::ChannelClosed)?;
            delivered += 1;
        }
        Ok(delivered)
    }
}
