//! Sink components for writing partitioned Parquet files.

mod parquet;
mod writer;

pub use parquet::{FinishedFile, ParquetWriter, ParquetWriterConfig};
pub use writer::{SinkStats, SinkWriter};
