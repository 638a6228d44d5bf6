//! Configuration parsing and schema management.
//!
//! Handles loading the job configuration from YAML, interpolating
//! environment variables, and converting the mapping table to an
//! Arrow schema for the transform stages.

pub(crate) mod vars;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::catalog::CatalogConfig;
use crate::error::{
    ConfigError, DuplicateTargetSnafu, EmptyMappingsSnafu, EmptyPredicateValuesSnafu,
    EmptySinkPathSnafu, EnvInterpolationSnafu, PartitionColumnNotStringSnafu,
    PartitionColumnUnmappedSnafu, ReadFileSnafu, YamlParseSnafu,
};

/// Byte size constants (binary/IEC units).
pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;

/// Main configuration structure for a cleansing job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Table catalog (inline definitions and/or a catalog file reference).
    pub catalog: CatalogConfig,
    pub source: SourceConfig,
    pub transform: TransformConfig,
    pub sink: SinkConfig,
    /// Metrics configuration (optional, disabled by default).
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Source configuration: which cataloged table to read and how to filter it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Catalog database holding the table.
    pub database: String,

    /// Table name within the database.
    pub table: String,

    /// Optional row predicate. When the predicate column is one of the
    /// table's partition keys it is pushed down to the listing step, so
    /// excluded partitions are never fetched.
    #[serde(default)]
    pub predicate: Option<PredicateConfig>,

    /// Batch size for reading records (default: 8192).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Storage options for the source location (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

/// An `IN`-set predicate over a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredicateConfig {
    /// Column the predicate applies to (source-side name).
    pub column: String,
    /// Allowed values; rows with any other value are excluded.
    pub values: Vec<String>,
}

fn default_batch_size() -> usize {
    8192
}

/// Transform configuration: the field mapping table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Mapping rules applied in order. Source fields without a rule are
    /// dropped; rules whose source field is absent produce an all-null
    /// column of the target type.
    pub mappings: Vec<MappingRule>,
}

/// A single rename-and-cast rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRule {
    /// Field name in the source data.
    pub source: String,
    /// Field name in the output.
    pub target: String,
    /// Declared output type; source values that cannot be coerced to this
    /// type become null and the row is later removed by the null filter.
    #[serde(rename = "type")]
    pub target_type: FieldType,
}

/// Supported output field types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Int32,
    Int64,
    Float32,
    Float64,
    Boolean,
    Timestamp,
    Date,
}

impl FieldType {
    /// Convert to the corresponding Arrow data type.
    pub fn to_arrow_type(self) -> DataType {
        match self {
            FieldType::String => DataType::Utf8,
            FieldType::Int32 => DataType::Int32,
            FieldType::Int64 => DataType::Int64,
            FieldType::Float32 => DataType::Float32,
            FieldType::Float64 => DataType::Float64,
            FieldType::Boolean => DataType::Boolean,
            FieldType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            FieldType::Date => DataType::Date32,
        }
    }
}

/// Sink configuration for writing partitioned Parquet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Output location.
    /// Examples: "s3://bucket/youtube/raw_statistics", "/local/path/out"
    pub path: String,

    /// Columns to partition output directories by (Hive-style `key=value/`).
    /// Partition values are encoded in the path, not in the data files.
    #[serde(default)]
    pub partition_by: Vec<String>,

    /// Target Parquet file size in MB before rolling to a new file
    /// (default: 128). This replaces a fixed single-file output with a
    /// configurable file count.
    #[serde(default = "default_file_size_mb")]
    pub file_size_mb: usize,

    /// Parquet compression codec.
    #[serde(default)]
    pub compression: ParquetCompression,

    /// Storage options for the sink location (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

fn default_file_size_mb() -> usize {
    128
}

/// Parquet compression codec.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    Uncompressed,
    #[default]
    Snappy,
    Gzip,
    Zstd,
}

/// Metrics configuration for the Prometheus endpoint.
///
/// Disabled by default: a batch job usually runs to completion and exits,
/// so the endpoint is only useful when a scraper is attached for the
/// duration of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether to expose the metrics HTTP endpoint (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;
        Self::parse(&content)
    }

    /// Parse configuration from a YAML string, interpolating environment
    /// variables first.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let result = vars::interpolate(content);
        if !result.is_ok() {
            return EnvInterpolationSnafu {
                message: result.errors.join("\n"),
            }
            .fail();
        }

        let config: Config = serde_yaml::from_str(&result.text).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.transform.mappings.is_empty(), EmptyMappingsSnafu);
        ensure!(!self.sink.path.is_empty(), EmptySinkPathSnafu);

        let mut targets = HashSet::new();
        for rule in &self.transform.mappings {
            ensure!(
                targets.insert(rule.target.as_str()),
                DuplicateTargetSnafu { name: &rule.target }
            );
        }

        for column in &self.sink.partition_by {
            let rule = self
                .transform
                .mappings
                .iter()
                .find(|r| &r.target == column)
                .context(PartitionColumnUnmappedSnafu { name: column })?;
            ensure!(
                rule.target_type == FieldType::String,
                PartitionColumnNotStringSnafu { name: column }
            );
        }

        if let Some(predicate) = &self.source.predicate {
            ensure!(
                !predicate.values.is_empty(),
                EmptyPredicateValuesSnafu {
                    column: &predicate.column
                }
            );
        }

        Ok(())
    }

    /// Convert the mapping table to the Arrow schema of the resolved output.
    ///
    /// All fields are nullable at this point; the null filter removes rows
    /// with nulls before anything is written.
    pub fn target_schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .transform
            .mappings
            .iter()
            .map(|rule| Field::new(&rule.target, rule.target_type.to_arrow_type(), true))
            .collect();
        Arc::new(Schema::new(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
catalog:
  databases:
    - name: db_youtube_raw
      tables:
        - name: raw_statistics
          location: "/data/raw"
          format: csv
          columns:
            - name: video_id
            - name: views
          partition_keys: [region]

source:
  database: db_youtube_raw
  table: raw_statistics
  predicate:
    column: region
    values: [ca, gb, us]

transform:
  mappings:
    - source: video_id
      target: video_id
      type: string
    - source: views
      target: views
      type: int64
    - source: region
      target: region
      type: string

sink:
  path: "/data/cleansed"
  partition_by: [region]
"#
    }

    #[test]
    fn test_config_yaml_parsing() {
        let config = Config::parse(minimal_yaml()).unwrap();

        assert_eq!(config.source.database, "db_youtube_raw");
        assert_eq!(config.source.table, "raw_statistics");
        assert_eq!(config.transform.mappings.len(), 3);
        assert_eq!(config.sink.partition_by, vec!["region".to_string()]);

        // Defaults
        assert_eq!(config.source.batch_size, 8192);
        assert_eq!(config.sink.file_size_mb, 128);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_target_schema() {
        let config = Config::parse(minimal_yaml()).unwrap();
        let schema = config.target_schema();

        assert_eq!(schema.fields().len(), 3);
        assert_eq!(schema.field(0).name(), "video_id");
        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(1).name(), "views");
        assert_eq!(schema.field(1).data_type(), &DataType::Int64);
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let yaml = minimal_yaml().replace("target: views", "target: video_id");
        let err = Config::parse(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTarget { .. }));
    }

    #[test]
    fn test_unmapped_partition_column_rejected() {
        let yaml = minimal_yaml().replace("partition_by: [region]", "partition_by: [country]");
        let err = Config::parse(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::PartitionColumnUnmapped { .. }));
    }

    #[test]
    fn test_non_string_partition_column_rejected() {
        let yaml = minimal_yaml().replace("partition_by: [region]", "partition_by: [views]");
        let err = Config::parse(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::PartitionColumnNotString { .. }));
    }

    #[test]
    fn test_empty_predicate_values_rejected() {
        let yaml = minimal_yaml().replace("values: [ca, gb, us]", "values: []");
        let err = Config::parse(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyPredicateValues { .. }));
    }

    #[test]
    fn test_field_type_to_arrow() {
        assert_eq!(FieldType::String.to_arrow_type(), DataType::Utf8);
        assert_eq!(FieldType::Int64.to_arrow_type(), DataType::Int64);
        assert_eq!(FieldType::Boolean.to_arrow_type(), DataType::Boolean);
        assert_eq!(FieldType::Date.to_arrow_type(), DataType::Date32);
    }
}
