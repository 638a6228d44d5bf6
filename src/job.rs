//! Job orchestration.
//!
//! Runs the five stages strictly in order for each source file: read,
//! map, resolve, clean, write. Nothing is committed until every stage
//! has succeeded for every file; the `_SUCCESS` marker at the sink root
//! is the single "job complete" signal, and any error propagating out of
//! [`Job::run`] leaves the sink without one.

use serde::Serialize;
use snafu::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::{Catalog, TableEntry};
use crate::config::{Config, MB};
use crate::emit;
use crate::error::{
    CatalogSnafu, CommitSerializeSnafu, JobError, JobStorageSnafu, ReaderSnafu, TransformSnafu,
};
use crate::metrics::events::{
    BytesRead, DropReason, FilesRead, JobCommitted, RecordsDropped, RecordsRead,
};
use crate::partition;
use crate::sink::{ParquetWriterConfig, SinkWriter};
use crate::source::{RecordReader, TableScan};
use crate::storage::{StorageProvider, StorageProviderRef};
use crate::transform::{drop_null_rows, filter_in_set, resolve_types, Mapper};

/// Name of the commit marker object written at the sink root.
const COMMIT_MARKER: &str = "_SUCCESS";

/// Statistics about a job run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStats {
    pub files_read: usize,
    pub records_read: usize,
    pub records_filtered: usize,
    pub records_dropped: usize,
    pub records_written: usize,
    pub files_written: usize,
    pub bytes_written: usize,
}

/// Manifest body of the commit marker.
#[derive(Debug, Serialize)]
struct CommitManifest<'a> {
    job: &'a str,
    #[serde(flatten)]
    stats: &'a JobStats,
}

/// A fully initialized cleansing job.
///
/// Construction acquires every resource the run needs (catalog, storage
/// providers); teardown is by ownership, so nothing leaks on the failure
/// path and the commit marker only exists if the run reached the end.
pub struct Job {
    config: Config,
    job_name: String,
    table: TableEntry,
    source_storage: StorageProviderRef,
    sink_storage: StorageProviderRef,
    stats: JobStats,
}

impl Job {
    /// Create a new job from configuration.
    pub async fn new(config: Config, job_name: String) -> Result<Self, JobError> {
        let catalog = Catalog::load(&config.catalog).context(CatalogSnafu)?;
        let table = catalog
            .resolve(&config.source.database, &config.source.table)
            .context(CatalogSnafu)?
            .clone();

        let source_storage = Arc::new(
            StorageProvider::for_url_with_options(
                &table.location,
                config.source.storage_options.clone(),
            )
            .await
            .context(JobStorageSnafu)?,
        );

        let sink_storage = Arc::new(
            StorageProvider::for_url_with_options(
                &config.sink.path,
                config.sink.storage_options.clone(),
            )
            .await
            .context(JobStorageSnafu)?,
        );

        Ok(Self {
            config,
            job_name,
            table,
            source_storage,
            sink_storage,
            stats: JobStats::default(),
        })
    }

    /// Run the job to completion and commit.
    pub async fn run(mut self) -> Result<JobStats, JobError> {
        info!(
            job = %self.job_name,
            table = %format!("{}.{}", self.config.source.database, self.config.source.table),
            source = self.source_storage.url(),
            sink = self.sink_storage.url(),
            "Starting job"
        );

        let scan = TableScan::new(
            self.source_storage.clone(),
            &self.table,
            self.config.source.predicate.as_ref(),
        );
        let files = scan.list_files().await.context(JobStorageSnafu)?;
        info!("Found {} source file(s)", files.len());

        let reader = RecordReader::for_table(&self.table, self.config.source.batch_size);
        let mapper = Mapper::new(self.config.transform.mappings.clone());
        let target_schema = self.config.target_schema();

        let writer_config = ParquetWriterConfig {
            target_file_size: self.config.sink.file_size_mb * MB,
            compression: self.config.sink.compression,
        };
        let mut sink = SinkWriter::new(
            target_schema.clone(),
            writer_config,
            self.sink_storage.clone(),
            self.config.sink.partition_by.clone(),
        );

        for file in &files {
            let data = self
                .source_storage
                .get(file)
                .await
                .context(JobStorageSnafu)?;
            emit!(BytesRead {
                bytes: data.len() as u64
            });

            let partition_values = partition::extract(file, &self.table.partition_keys);
            let batches = reader.read_batches(data, file).context(ReaderSnafu)?;

            for batch in batches {
                let batch =
                    partition::inject(&batch, &partition_values).context(TransformSnafu)?;
                self.stats.records_read += batch.num_rows();
                emit!(RecordsRead {
                    count: batch.num_rows() as u64
                });

                // Row-level predicate; redundant for pushed-down partitions
                // but required for sources that store the column in-file.
                let filtered = match &self.config.source.predicate {
                    Some(predicate) => {
                        let filtered =
                            filter_in_set(&batch, &predicate.column, &predicate.values)
                                .context(TransformSnafu)?;
                        let removed = batch.num_rows() - filtered.num_rows();
                        self.stats.records_filtered += removed;
                        emit!(RecordsDropped {
                            count: removed as u64,
                            reason: DropReason::Predicate
                        });
                        filtered
                    }
                    None => batch,
                };

                let mapped = mapper.apply(&filtered).context(TransformSnafu)?;
                let resolved = resolve_types(&mapped, &target_schema).context(TransformSnafu)?;
                let clean = drop_null_rows(&resolved).context(TransformSnafu)?;

                let removed = resolved.num_rows() - clean.num_rows();
                self.stats.records_dropped += removed;
                emit!(RecordsDropped {
                    count: removed as u64,
                    reason: DropReason::Null
                });

                sink.write_batch(&clean).await?;
            }

            self.stats.files_read += 1;
            emit!(FilesRead { count: 1 });
            debug!("Finished file {}", file);
        }

        let sink_stats = sink.finalize().await?;
        self.stats.records_written = sink_stats.records_written;
        self.stats.files_written = sink_stats.files_written;
        self.stats.bytes_written = sink_stats.bytes_written;

        self.commit().await?;

        info!(job = %self.job_name, "Job committed: {:?}", self.stats);
        Ok(self.stats)
    }

    /// Publish the commit marker. This is the last step of a successful
    /// run; no data is retracted on failure, the marker is simply absent.
    async fn commit(&self) -> Result<(), JobError> {
        let manifest = CommitManifest {
            job: &self.job_name,
            stats: &self.stats,
        };
        let body = serde_json::to_vec_pretty(&manifest).context(CommitSerializeSnafu)?;

        self.sink_storage
            .put(COMMIT_MARKER, body.into())
            .await
            .context(JobStorageSnafu)?;
        emit!(JobCommitted);

        Ok(())
    }
}

/// Run a cleansing job with the given configuration.
pub async fn run_job(config: Config, job_name: String) -> Result<JobStats, JobError> {
    let job = Job::new(config, job_name).await?;
    job.run().await
}
