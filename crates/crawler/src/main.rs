//! CiteForge command-line crawler
//!
//! Resolves seed titles, expands their references one level, and writes
//! the graph, corpora and index summaries as JSON.

use citeforge_common::config::AppConfig;
use citeforge_common::metrics::{register_metrics, METRICS_PREFIX, RESOLUTION_BUCKETS};
use citeforge_common::sources::{create_source, http_client};
use citeforge_common::VERSION;
use citeforge_crawler::{parse_seed_list, Crawl, MetadataResolver, TfidfIndexer};
use clap::Parser;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "citeforge", version, about = "Citation graph crawler")]
struct Args {
    /// Seed paper titles
    titles: Vec<String>,

    /// File with one seed title per line
    #[arg(long)]
    seeds_file: Option<PathBuf>,

    /// Write the crawl snapshot here as JSON
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Override crawl.concurrency
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load()?;
    if let Some(concurrency) = args.concurrency {
        config.crawl.concurrency = concurrency;
    }

    init_tracing(&config);
    info!(service = %config.observability.service_name, "Starting CiteForge v{}", VERSION);

    config.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    if config.observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(
                Matcher::Full(format!("{}_resolution_duration_seconds", METRICS_PREFIX)),
                RESOLUTION_BUCKETS,
            )?
            .install()?;
        info!("Metrics exporter listening on {}", addr);
    }
    register_metrics();

    let seeds = collect_seeds(&args, &config).await?;
    if seeds.is_empty() {
        error!("No seed titles given");
        return Err("no seed titles: pass titles, --seeds-file, or set crawl.seeds_file".into());
    }

    // Sources
    let client = http_client(config.request_timeout())?;
    let primary = create_source(&config.sources.primary, &config.sources, client.clone()).await?;
    let secondary = create_source(&config.sources.secondary, &config.sources, client).await?;
    info!(
        primary = %primary.kind(),
        secondary = %secondary.kind(),
        "Sources ready"
    );

    let resolver = MetadataResolver::new(primary, secondary, config.request_timeout());
    let indexer = TfidfIndexer::new(config.index.clone())?;
    let mut crawl = Crawl::new(
        Arc::new(resolver),
        Arc::new(indexer),
        config.crawl.concurrency,
    );

    let snapshot = crawl.run(&seeds).await;
    info!(
        seeds_resolved = snapshot.seed_pass.resolved,
        seeds_failed = snapshot.seed_pass.failed,
        references_resolved = snapshot.expansion_pass.resolved,
        references_failed = snapshot.expansion_pass.failed,
        abstracts = snapshot.abstracts.len(),
        indexes = snapshot.indexes.len(),
        index_failures = snapshot.index_failures.len(),
        "Run summary"
    );

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(path, json).await?;
        info!("Snapshot written to {}", path.display());
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}

/// Positional titles, then the seeds file, then `crawl.seeds_file`
async fn collect_seeds(args: &Args, config: &AppConfig) -> std::io::Result<Vec<String>> {
    let mut seeds = args.titles.clone();

    let mut files: Vec<PathBuf> = Vec::new();
    files.extend(args.seeds_file.clone());
    files.extend(config.crawl.seeds_file.as_ref().map(PathBuf::from));

    for path in files {
        let text = tokio::fs::read_to_string(&path).await?;
        let parsed = parse_seed_list(&text);
        info!(path = %path.display(), seeds = parsed.len(), "Loaded seed list");
        seeds.extend(parsed);
    }
    Ok(seeds)
}
