//! Partitioned sink writer.
//!
//! Routes each batch's rows to one Parquet writer per distinct
//! partition-value tuple and persists finished files to storage. The
//! partition columns themselves are encoded in the directory prefix and
//! excluded from the data files, Hive-style.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use arrow::array::{BooleanArray, RecordBatch, StringArray};
use arrow::compute::filter_record_batch;
use arrow::datatypes::SchemaRef;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::error::{
    ArrowSnafu, JobError, JobStorageSnafu, ParquetSnafu, PartitionColumnTypeSnafu, TransformError,
    TransformSnafu,
};
use crate::metrics::events::{BytesWritten, FilesWritten, RecordsWritten};
use crate::storage::StorageProviderRef;
use crate::{emit, sink::FinishedFile};

use super::{ParquetWriter, ParquetWriterConfig};

/// Totals accumulated by a sink writer over its lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinkStats {
    pub records_written: usize,
    pub files_written: usize,
    pub bytes_written: usize,
}

/// Writer that splits batches by partition value and persists Parquet
/// files to the sink location.
pub struct SinkWriter {
    storage: StorageProviderRef,
    writer_config: ParquetWriterConfig,
    partition_by: Vec<String>,
    /// Column indices (in the incoming schema) kept in the data files.
    file_column_indices: Vec<usize>,
    /// Schema of the written files: incoming schema minus partition columns.
    file_schema: SchemaRef,
    /// One open writer per partition prefix.
    writers: HashMap<String, ParquetWriter>,
    stats: SinkStats,
}

impl SinkWriter {
    /// Create a sink writer for batches with the given schema.
    pub fn new(
        schema: SchemaRef,
        writer_config: ParquetWriterConfig,
        storage: StorageProviderRef,
        partition_by: Vec<String>,
    ) -> Self {
        let file_column_indices: Vec<usize> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, field)| !partition_by.iter().any(|p| p == field.name()))
            .map(|(i, _)| i)
            .collect();

        let file_fields: Vec<_> = file_column_indices
            .iter()
            .map(|&i| schema.field(i).clone())
            .collect();
        let file_schema: SchemaRef =
            std::sync::Arc::new(arrow::datatypes::Schema::new(file_fields));

        Self {
            storage,
            writer_config,
            partition_by,
            file_column_indices,
            file_schema,
            writers: HashMap::new(),
            stats: SinkStats::default(),
        }
    }

    /// Route a batch's rows to their partition writers, persisting any
    /// files that rolled over.
    pub async fn write_batch(&mut self, batch: &RecordBatch) -> Result<(), JobError> {
        if batch.num_rows() == 0 {
            return Ok(());
        }

        for (prefix, group) in
            split_by_partition(batch, &self.partition_by).context(TransformSnafu)?
        {
            let data = group
                .project(&self.file_column_indices)
                .context(ArrowSnafu)
                .context(TransformSnafu)?;

            let writer = match self.writers.entry(prefix) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    debug!("Opening partition writer for {:?}", entry.key());
                    let writer = ParquetWriter::new(
                        self.file_schema.clone(),
                        self.writer_config.clone(),
                        entry.key().clone(),
                    )
                    .context(ParquetSnafu)?;
                    entry.insert(writer)
                }
            };

            writer.write_batch(&data).context(ParquetSnafu)?;
            self.stats.records_written += data.num_rows();
            emit!(RecordsWritten {
                count: data.num_rows() as u64
            });

            let finished = writer.take_finished_files();
            self.persist(finished).await?;
        }

        Ok(())
    }

    /// Close all partition writers and persist the remaining files.
    pub async fn finalize(mut self) -> Result<SinkStats, JobError> {
        let mut writers: Vec<(String, ParquetWriter)> = self.writers.drain().collect();
        writers.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (prefix, writer) in writers {
            let finished = writer.close().context(ParquetSnafu)?;
            if !finished.is_empty() {
                info!(
                    "Writing {} parquet file(s) for partition {:?}",
                    finished.len(),
                    prefix
                );
            }
            self.persist(finished).await?;
        }

        Ok(self.stats)
    }

    async fn persist(&mut self, files: Vec<FinishedFile>) -> Result<(), JobError> {
        for file in files {
            self.storage
                .put(&file.filename, file.bytes.clone())
                .await
                .context(JobStorageSnafu)?;

            self.stats.files_written += 1;
            self.stats.bytes_written += file.size;
            emit!(FilesWritten { count: 1 });
            emit!(BytesWritten {
                bytes: file.size as u64
            });
            debug!(
                "Persisted {} ({} bytes, {} records)",
                file.filename, file.size, file.record_count
            );
        }
        Ok(())
    }
}

/// Split a batch into per-partition groups keyed by directory prefix
/// (e.g. "region=us"), preserving row order within each group.
fn split_by_partition(
    batch: &RecordBatch,
    partition_by: &[String],
) -> Result<Vec<(String, RecordBatch)>, TransformError> {
    if partition_by.is_empty() {
        return Ok(vec![(String::new(), batch.clone())]);
    }

    let mut partition_columns = Vec::with_capacity(partition_by.len());
    for name in partition_by {
        let column = batch
            .column_by_name(name)
            .context(crate::error::ColumnNotFoundSnafu { name })?;
        let column = column
            .as_any()
            .downcast_ref::<StringArray>()
            .context(PartitionColumnTypeSnafu { name })?;
        partition_columns.push((name.as_str(), column));
    }

    // Per-row prefixes; partition values are non-null after the null filter
    let row_prefixes: Vec<String> = (0..batch.num_rows())
        .map(|row| {
            partition_columns
                .iter()
                .map(|(name, column)| format!("{}={}", name, column.value(row)))
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();

    let mut distinct: Vec<String> = Vec::new();
    for prefix in &row_prefixes {
        if !distinct.contains(prefix) {
            distinct.push(prefix.clone());
        }
    }

    let mut groups = Vec::with_capacity(distinct.len());
    for prefix in distinct {
        let mask: BooleanArray = row_prefixes
            .iter()
            .map(|p| Some(p == &prefix))
            .collect();
        let group = filter_record_batch(batch, &mask).context(ArrowSnafu)?;
        groups.push((prefix, group));
    }

    Ok(groups)
}
