//! Parquet file writer.
//!
//! Buffers Arrow RecordBatches into in-memory Parquet files with
//! configurable compression, rolling to a new file when the current one
//! reaches the target size. One writer serves one partition; the
//! partition values become the file's directory prefix.

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use snafu::prelude::*;
use uuid::Uuid;

use crate::config::{ParquetCompression, MB};
use crate::error::{ParquetError, WriteSnafu, WriterCreateSnafu, WriterUnavailableSnafu};

/// Configuration for the Parquet writer.
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    /// Target file size in bytes before rolling to a new file.
    pub target_file_size: usize,
    /// Compression codec.
    pub compression: ParquetCompression,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            target_file_size: 128 * MB,
            compression: ParquetCompression::Snappy,
        }
    }
}

impl ParquetWriterConfig {
    /// Create a config with a target file size in MB.
    pub fn with_file_size_mb(mut self, size_mb: usize) -> Self {
        self.target_file_size = size_mb * MB;
        self
    }

    /// Set the compression codec.
    pub fn with_compression(mut self, compression: ParquetCompression) -> Self {
        self.compression = compression;
        self
    }
}

/// A completed Parquet file, ready to persist.
#[derive(Debug, Clone)]
pub struct FinishedFile {
    /// Sink-relative filename, including the partition prefix.
    pub filename: String,
    /// Serialized size in bytes.
    pub size: usize,
    /// Number of records in the file.
    pub record_count: usize,
    /// The serialized file contents.
    pub bytes: Bytes,
}

/// Parquet writer for a single partition.
pub struct ParquetWriter {
    schema: SchemaRef,
    config: ParquetWriterConfig,
    writer: Option<ArrowWriter<Vec<u8>>>,
    /// Directory prefix for generated filenames, e.g. "region=us".
    partition_prefix: String,
    current_file_name: String,
    records_written: usize,
    finished_files: Vec<FinishedFile>,
}

impl ParquetWriter {
    /// Create a writer for one partition. `partition_prefix` is empty for
    /// unpartitioned output.
    pub fn new(
        schema: SchemaRef,
        config: ParquetWriterConfig,
        partition_prefix: String,
    ) -> Result<Self, ParquetError> {
        let writer = Self::create_writer(&schema, &config)?;
        let current_file_name = Self::generate_filename(&partition_prefix);

        Ok(Self {
            schema,
            config,
            writer: Some(writer),
            partition_prefix,
            current_file_name,
            records_written: 0,
            finished_files: Vec::new(),
        })
    }

    fn create_writer(
        schema: &SchemaRef,
        config: &ParquetWriterConfig,
    ) -> Result<ArrowWriter<Vec<u8>>, ParquetError> {
        let properties = WriterProperties::builder()
            .set_compression(match config.compression {
                ParquetCompression::Uncompressed => Compression::UNCOMPRESSED,
                ParquetCompression::Snappy => Compression::SNAPPY,
                ParquetCompression::Gzip => Compression::GZIP(GzipLevel::default()),
                ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
            })
            .build();

        ArrowWriter::try_new(Vec::new(), schema.clone(), Some(properties))
            .context(WriterCreateSnafu)
    }

    fn generate_filename(partition_prefix: &str) -> String {
        let uuid = Uuid::now_v7();
        if partition_prefix.is_empty() {
            format!("{}.parquet", uuid)
        } else {
            format!("{}/{}.parquet", partition_prefix, uuid)
        }
    }

    /// Write a batch to the current file, rolling when it reaches the
    /// target size.
    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<(), ParquetError> {
        let writer = self.writer.as_mut().context(WriterUnavailableSnafu)?;

        writer.write(batch).context(WriteSnafu)?;
        self.records_written += batch.num_rows();

        // Flushed row groups plus the in-progress one approximate the
        // eventual file size closely enough for rolling decisions.
        let flushed: i64 = writer
            .flushed_row_groups()
            .iter()
            .map(|rg| rg.compressed_size())
            .sum();
        let current_size = flushed as usize + writer.in_progress_size();
        if current_size >= self.config.target_file_size {
            tracing::debug!(
                "Rolling {} at {} bytes ({} records)",
                self.current_file_name,
                current_size,
                self.records_written
            );
            self.roll_file()?;
        }

        Ok(())
    }

    /// Roll the current file and start a new one.
    fn roll_file(&mut self) -> Result<(), ParquetError> {
        let writer = self.writer.take().context(WriterUnavailableSnafu)?;
        let bytes = Bytes::from(writer.into_inner().context(WriteSnafu)?);

        self.finished_files.push(FinishedFile {
            filename: self.current_file_name.clone(),
            size: bytes.len(),
            record_count: self.records_written,
            bytes,
        });

        self.writer = Some(Self::create_writer(&self.schema, &self.config)?);
        self.current_file_name = Self::generate_filename(&self.partition_prefix);
        self.records_written = 0;

        Ok(())
    }

    /// Close the writer and return all finished files.
    ///
    /// An open file with no records is discarded rather than written
    /// empty.
    pub fn close(mut self) -> Result<Vec<FinishedFile>, ParquetError> {
        if self.records_written > 0 {
            self.roll_file()?;
        }
        Ok(self.finished_files)
    }

    /// Take finished files without closing.
    pub fn take_finished_files(&mut self) -> Vec<FinishedFile> {
        std::mem::take(&mut self.finished_files)
    }

    /// Records buffered in the current open file.
    pub fn records_pending(&self) -> usize {
        self.records_written
    }
}
