//! wikivents CLI - Export dated Wikidata entities as N-Triples and a DGraph schema.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use wikivents::{Config, EventQuery, GraphPipeline};

#[derive(Parser)]
#[command(name = "wikivents")]
#[command(version)]
#[command(about = "Export dated Wikidata entities as N-Triples and a DGraph schema")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every entity dated within a year range
    Fetch {
        /// First year of the range (negative for BC)
        #[arg(short, long, allow_negative_numbers = true)]
        start_year: i32,

        /// Last year of the range, inclusive
        #[arg(short, long, allow_negative_numbers = true)]
        end_year: i32,

        /// Directory for the output files (overrides output.directory)
        #[arg(short, long)]
        output_directory: Option<PathBuf>,
    },

    /// Export events, participants and links within a year range as CSV
    Events {
        /// First year of the range (negative for BC)
        #[arg(short, long, allow_negative_numbers = true)]
        start_year: i32,

        /// Last year of the range, inclusive
        #[arg(short, long, allow_negative_numbers = true)]
        end_year: i32,

        /// Directory for the CSV files (overrides output.directory)
        #[arg(short, long)]
        output_directory: Option<PathBuf>,
    },

    /// Count events within a year range
    Count {
        /// First year of the range (negative for BC)
        #[arg(short, long, allow_negative_numbers = true)]
        start_year: i32,

        /// Last year of the range, inclusive
        #[arg(short, long, allow_negative_numbers = true)]
        end_year: i32,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# wikivents configuration file

[endpoint]
url = "https://query.wikidata.org/sparql"
# The public endpoint stops queries after 60 seconds
timeout_secs = 65
user_agent = "wikivents (https://github.com/heindl/wikivents)"
min_request_interval_ms = 10
# Directory of <name>.sparql files replacing the built-in templates
# templates_dir = "queries/"

[fetch]
batch_size = 50
max_in_flight = 5
channel_capacity = 1024
# Discovery rows whose class label matches are skipped (case-insensitive)
ignored_classes = ["year", "solar eclipse", "list of persons", "wikimedia list article", "decade", "year BC"]
# Abort on the first binding that cannot be classified
strict = true

[output]
directory = "."
compress = true
# Schema type for string, quantity and monolingual text features
literal_schema_type = "int"
"#;
    println!("{example}");
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    Config::load(path.map(PathBuf::as_path))
        .with_context(|| format!("Failed to load config from {path:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
            return Ok(());
        }

        Commands::Validate => {
            let config = load_config(cli.config.as_ref())?;

            info!("Configuration is valid");
            info!("  Endpoint: {}", config.endpoint.url);
            info!(
                "  Batches: {} entities, {} in flight",
                config.fetch.batch_size, config.fetch.max_in_flight
            );
            info!(
                "  Ignored classes: {}",
                config.fetch.ignored_classes.join(", ")
            );
            info!("  Output: {:?}", config.output.rdf_path());
            return Ok(());
        }

        Commands::Fetch {
            start_year,
            end_year,
            output_directory,
        } => {
            let mut config = load_config(cli.config.as_ref())?;
            if let Some(dir) = output_directory {
                config.output.directory = dir;
            }
            let rdf_path = config.output.rdf_path();
            let schema_path = config.output.schema_path();

            let pipeline = GraphPipeline::new(config)
                .context("Failed to set up pipeline")?
                .with_progress_bar();

            let stats = pipeline
                .run(start_year, end_year)
                .await
                .with_context(|| format!("Failed to export years {start_year} to {end_year}"))?;

            println!("\n=== Export Complete ===");
            println!("Entities:    {}", stats.entities);
            println!("Ignored:     {}", stats.ignored_entities);
            println!("Batches:     {}", stats.batches);
            println!("Bindings:    {}", stats.bindings_received);
            println!("Skipped:     {}", stats.bindings_failed);
            println!(
                "Triples:     {} ({} duplicates)",
                stats.triples_written, stats.triples_duplicate
            );
            println!(
                "Schema:      {} ({} duplicates)",
                stats.schema_written, stats.schema_duplicate
            );
            println!(
                "Requests:    {} ({} rate limited)",
                stats.requests, stats.rate_limited
            );
            println!("Runtime:     {:.1}s", stats.runtime_secs);
            println!("RDF:         {rdf_path:?}");
            println!("Schema file: {schema_path:?}");
        }

        Commands::Events {
            start_year,
            end_year,
            output_directory,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let directory = output_directory.unwrap_or_else(|| config.output.directory.clone());
            let query = EventQuery::from_config(&config).context("Failed to set up client")?;

            let response = query
                .export(start_year, end_year, &directory)
                .await
                .with_context(|| format!("Failed to export events {start_year} to {end_year}"))?;

            println!("\n=== Events Exported ===");
            println!("Events:       {}", response.events.len());
            println!("Participants: {}", response.participants.len());
            println!("Links:        {}", response.links.len());
            println!("Directory:    {directory:?}");
        }

        Commands::Count {
            start_year,
            end_year,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let query = EventQuery::from_config(&config).context("Failed to set up client")?;
            let count = query
                .count_events(start_year, end_year)
                .await
                .with_context(|| format!("Failed to count events {start_year} to {end_year}"))?;
            println!("{count}");
        }
    }

    Ok(())
}
