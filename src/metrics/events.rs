//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the job.
//! Events implement the `InternalEvent` trait which emits the
//! corresponding Prometheus metric.

use metrics::counter;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when records are decoded from source files.
pub struct RecordsRead {
    pub count: u64,
}

impl InternalEvent for RecordsRead {
    fn emit(self) {
        trace!(count = self.count, "Records read");
        counter!("graupel_records_read_total").increment(self.count);
    }
}

/// Why a record was removed from the run.
#[derive(Debug, Clone, Copy)]
pub enum DropReason {
    /// Excluded by the row predicate.
    Predicate,
    /// Contained a null (or uncoercible) field.
    Null,
}

impl DropReason {
    fn as_str(&self) -> &'static str {
        match self {
            DropReason::Predicate => "predicate",
            DropReason::Null => "null",
        }
    }
}

/// Event emitted when records are removed by a filter stage.
pub struct RecordsDropped {
    pub count: u64,
    pub reason: DropReason,
}

impl InternalEvent for RecordsDropped {
    fn emit(self) {
        trace!(count = self.count, reason = self.reason.as_str(), "Records dropped");
        counter!("graupel_records_dropped_total", "reason" => self.reason.as_str())
            .increment(self.count);
    }
}

/// Event emitted when records are written to the sink.
pub struct RecordsWritten {
    pub count: u64,
}

impl InternalEvent for RecordsWritten {
    fn emit(self) {
        trace!(count = self.count, "Records written");
        counter!("graupel_records_written_total").increment(self.count);
    }
}

/// Event emitted when compressed bytes are read from the source.
pub struct BytesRead {
    pub bytes: u64,
}

impl InternalEvent for BytesRead {
    fn emit(self) {
        trace!(bytes = self.bytes, "Bytes read");
        counter!("graupel_bytes_read_total").increment(self.bytes);
    }
}

/// Event emitted when Parquet bytes are persisted to the sink.
pub struct BytesWritten {
    pub bytes: u64,
}

impl InternalEvent for BytesWritten {
    fn emit(self) {
        trace!(bytes = self.bytes, "Bytes written");
        counter!("graupel_bytes_written_total").increment(self.bytes);
    }
}

/// Event emitted when a source file has been fully processed.
pub struct FilesRead {
    pub count: u64,
}

impl InternalEvent for FilesRead {
    fn emit(self) {
        trace!(count = self.count, "Files read");
        counter!("graupel_files_read_total").increment(self.count);
    }
}

/// Event emitted when a Parquet file is persisted.
pub struct FilesWritten {
    pub count: u64,
}

impl InternalEvent for FilesWritten {
    fn emit(self) {
        trace!(count = self.count, "Files written");
        counter!("graupel_files_written_total").increment(self.count);
    }
}

/// Event emitted when the commit marker is published.
pub struct JobCommitted;

impl InternalEvent for JobCommitted {
    fn emit(self) {
        trace!("Job committed");
        counter!("graupel_jobs_committed_total").increment(1);
    }
}
