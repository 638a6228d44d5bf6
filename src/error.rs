//! Error types for graupel using snafu.
//!
//! This module defines structured error types with context selectors for
//! all error conditions in the codebase.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error"))]
    S3Config { source: object_store::Error },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Mapping table has no rules.
    #[snafu(display("Transform must declare at least one mapping"))]
    EmptyMappings,

    /// Sink path is empty.
    #[snafu(display("Sink path cannot be empty"))]
    EmptySinkPath,

    /// Two mapping rules produce the same output field.
    #[snafu(display("Duplicate mapping target: {name}"))]
    DuplicateTarget { name: String },

    /// A sink partition column is not produced by the mapping.
    #[snafu(display("Partition column {name} is not a mapping target"))]
    PartitionColumnUnmapped { name: String },

    /// Partition columns name output directories, so they must be strings.
    #[snafu(display("Partition column {name} must be mapped to type string"))]
    PartitionColumnNotString { name: String },

    /// Predicate declared with an empty value set.
    #[snafu(display("Predicate on {column} must list at least one value"))]
    EmptyPredicateValues { column: String },
}

// ============ Catalog Errors ============

/// Errors that can occur while loading or resolving the table catalog.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CatalogError {
    /// Failed to read the catalog file.
    #[snafu(display("Failed to read catalog file {path}"))]
    CatalogRead {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse the catalog file.
    #[snafu(display("Failed to parse catalog file {path}"))]
    CatalogParse {
        path: String,
        source: serde_yaml::Error,
    },

    /// Environment variable interpolation failed in the catalog file.
    #[snafu(display("Environment variable interpolation failed in {path}:\n{message}"))]
    CatalogEnvInterpolation { path: String, message: String },

    /// The requested table is not defined in the catalog.
    #[snafu(display("Table {database}.{table} not found in catalog"))]
    TableNotFound { database: String, table: String },

    /// The same table is defined more than once.
    #[snafu(display("Table {database}.{table} is defined more than once"))]
    DuplicateTable { database: String, table: String },

    /// A table entry has no storage location.
    #[snafu(display("Table {database}.{table} has an empty location"))]
    EmptyLocation { database: String, table: String },
}

// ============ Reader Errors ============

/// Errors that can occur while decoding source files into record batches.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReaderError {
    /// Failed to build the format decoder.
    #[snafu(display("Failed to build decoder: {message}"))]
    DecoderBuild { message: String },

    /// Failed to decode a source file.
    #[snafu(display("Failed to decode {path}: {message}"))]
    Decode { path: String, message: String },
}

// ============ Transform Errors ============

/// Errors that can occur in the mapping / resolve / clean stages.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TransformError {
    /// A required column is missing from the batch.
    #[snafu(display("Column {name} not found in batch"))]
    ColumnNotFound { name: String },

    /// The predicate column is not a string column.
    #[snafu(display("Predicate column {name} is not a string column"))]
    PredicateColumnType { name: String },

    /// A partition column is not a string column.
    #[snafu(display("Partition column {name} is not a string column"))]
    PartitionColumnType { name: String },

    /// Arrow kernel failure.
    #[snafu(display("Arrow error"))]
    Arrow { source: arrow::error::ArrowError },
}

// ============ Parquet Errors ============

/// Errors that can occur during Parquet file writing.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ParquetError {
    /// Parquet write error.
    #[snafu(display("Parquet write error"))]
    Write {
        source: ::parquet::errors::ParquetError,
    },

    /// Failed to create Parquet writer.
    #[snafu(display("Failed to create Parquet writer"))]
    WriterCreate {
        source: ::parquet::errors::ParquetError,
    },

    /// Writer is not available (internal state error).
    #[snafu(display("Parquet writer is not available"))]
    WriterUnavailable,
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Job Error (top-level) ============

/// Top-level job errors that aggregate all error types.
///
/// Any variant reaching `main` aborts the run before the commit marker is
/// written: the job either commits fully or fails with no partial commit.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum JobError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Catalog error.
    #[snafu(display("Catalog error"))]
    Catalog { source: CatalogError },

    /// Storage error.
    #[snafu(display("Storage error"))]
    JobStorage { source: StorageError },

    /// Reader error.
    #[snafu(display("Reader error"))]
    Reader { source: ReaderError },

    /// Transform error.
    #[snafu(display("Transform error"))]
    Transform { source: TransformError },

    /// Parquet error.
    #[snafu(display("Parquet error"))]
    Parquet { source: ParquetError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },

    /// Address parsing error.
    #[snafu(display("Failed to parse address"))]
    AddressParse { source: std::net::AddrParseError },

    /// Failed to serialize the commit manifest.
    #[snafu(display("Failed to serialize commit manifest"))]
    CommitSerialize { source: serde_json::Error },
}

impl JobError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            JobError::JobStorage { source } => source.is_not_found(),
            _ => false,
        }
    }
}
