//! Partition handling for Hive-style `key=value/` paths.
//!
//! Covers the three places partitions appear in a job run: building
//! pushdown prefixes for the listing step, extracting partition values
//! from file paths, and injecting those values back into record batches
//! as constant columns.

use arrow::array::{ArrayRef, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ArrowSnafu, TransformError};

/// Build listing prefixes for an `IN`-set predicate on a partition column.
///
/// `prefixes("region", ["ca", "us"])` yields `["region=ca", "region=us"]`,
/// so only those partition directories are listed at all.
pub fn prefixes(column: &str, values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| format!("{}={}", column, value))
        .collect()
}

/// Extract partition values from a file path for the given columns.
///
/// For paths like `region=us/USvideos.csv`, returns `{"region": "us"}`.
/// Columns without a `key=value` segment in the path are absent from the
/// result.
pub fn extract(path: &str, columns: &[String]) -> HashMap<String, String> {
    columns
        .iter()
        .filter_map(|key| extract_value(path, key).map(|value| (key.clone(), value)))
        .collect()
}

/// Extract a single partition value from a path for a given key.
fn extract_value(path: &str, key: &str) -> Option<String> {
    let pattern = format!("{}=", key);
    let start = path.find(&pattern)? + pattern.len();
    let rest = &path[start..];
    let end = rest.find('/').unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

/// Append path-derived partition values to a batch as constant string
/// columns.
///
/// Columns already present in the batch are left alone, so tables that
/// store the partition column redundantly in the files still work.
pub fn inject(
    batch: &RecordBatch,
    values: &HashMap<String, String>,
) -> Result<RecordBatch, TransformError> {
    if values.is_empty() {
        return Ok(batch.clone());
    }

    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();

    let mut keys: Vec<&String> = values.keys().collect();
    keys.sort();

    for key in keys {
        if schema.field_with_name(key).is_ok() {
            continue;
        }
        let value = values[key].as_str();
        fields.push(Field::new(key, DataType::Utf8, true));
        columns.push(Arc::new(StringArray::from(vec![value; batch.num_rows()])));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context(ArrowSnafu)
}
