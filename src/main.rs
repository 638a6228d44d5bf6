//! graupel: batch cleansing job for cataloged tables.
//!
//! Reads a cataloged table, filters it by a pushdown predicate, remaps
//! and coerces fields, drops records with nulls, and writes the result
//! as partitioned Parquet with a commit marker.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use graupel::catalog::Catalog;
use graupel::config::Config;
use graupel::error::{AddressParseSnafu, CatalogSnafu, ConfigSnafu, JobError, MetricsSnafu};
use graupel::job::run_job;
use graupel::metrics;

/// Cataloged-table cleansing job.
#[derive(Parser, Debug)]
#[command(name = "graupel")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Job name, used for bookkeeping and the commit manifest.
    #[arg(long)]
    job_name: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration and resolve the table without processing.
    #[arg(long)]
    dry_run: bool,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), JobError> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("graupel starting (job: {})", args.job_name);

    let config = Config::from_file(&args.config).context(ConfigSnafu)?;

    if config.metrics.enabled {
        let addr = config.metrics.address.parse().context(AddressParseSnafu)?;
        metrics::init(addr).context(MetricsSnafu)?;
        debug!(
            "Metrics endpoint listening on http://{}/metrics",
            config.metrics.address
        );
    }

    if args.dry_run {
        return dry_run(&config);
    }

    let stats = run_job(config, args.job_name).await?;

    info!("Job completed successfully");
    info!("  Files read: {}", stats.files_read);
    info!("  Records read: {}", stats.records_read);
    info!("  Records filtered: {}", stats.records_filtered);
    info!("  Records dropped: {}", stats.records_dropped);
    info!("  Records written: {}", stats.records_written);
    info!("  Parquet files written: {}", stats.files_written);
    info!("  Bytes written: {}", stats.bytes_written);

    Ok(())
}

/// Validate the configuration and show what the job would do.
fn dry_run(config: &Config) -> Result<(), JobError> {
    info!("Dry run mode - validating configuration");

    let catalog = Catalog::load(&config.catalog).context(CatalogSnafu)?;
    let table = catalog
        .resolve(&config.source.database, &config.source.table)
        .context(CatalogSnafu)?;

    info!(
        "Source: {}.{} at {}",
        config.source.database, config.source.table, table.location
    );
    info!("  Format: {:?}, partition keys: {:?}", table.format, table.partition_keys);
    for column in &table.columns {
        info!("  - {}: {}", column.name, column.column_type);
    }

    if let Some(predicate) = &config.source.predicate {
        info!(
            "Predicate: {} in {:?}",
            predicate.column, predicate.values
        );
    }

    info!("Mappings: {}", config.transform.mappings.len());
    for rule in &config.transform.mappings {
        info!("  - {} -> {} ({:?})", rule.source, rule.target, rule.target_type);
    }

    info!(
        "Sink: {} partitioned by {:?}",
        config.sink.path, config.sink.partition_by
    );
    info!("Configuration is valid");

    Ok(())
}
