//! Row-level `IN`-set predicate filter.

use arrow::array::{BooleanArray, RecordBatch, StringArray};
use arrow::compute::filter_record_batch;
use snafu::prelude::*;

use crate::error::{ArrowSnafu, ColumnNotFoundSnafu, PredicateColumnTypeSnafu, TransformError};

/// Keep only rows whose `column` value is in `values`.
///
/// Rows with a null in the predicate column are excluded too. This runs
/// even when the predicate was pushed down to the listing step, so
/// sources that store the column in the files (rather than the path) are
/// filtered identically.
pub fn filter_in_set(
    batch: &RecordBatch,
    column: &str,
    values: &[String],
) -> Result<RecordBatch, TransformError> {
    let array = batch
        .column_by_name(column)
        .context(ColumnNotFoundSnafu { name: column })?;
    let array = array
        .as_any()
        .downcast_ref::<StringArray>()
        .context(PredicateColumnTypeSnafu { name: column })?;

    let mask: BooleanArray = array
        .iter()
        .map(|value| Some(matches!(value, Some(v) if values.iter().any(|x| x.as_str() == v))))
        .collect();

    filter_record_batch(batch, &mask).context(ArrowSnafu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, ArrayRef, Int64Array};
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (
                "region",
                Arc::new(StringArray::from(vec![
                    Some("us"),
                    Some("de"),
                    Some("ca"),
                    None,
                ])) as ArrayRef,
            ),
            (
                "views",
                Arc::new(Int64Array::from(vec![1, 2, 3, 4])) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    fn allowed() -> Vec<String> {
        vec!["ca".to_string(), "gb".to_string(), "us".to_string()]
    }

    #[test]
    fn test_filter_keeps_allowed_values() {
        let filtered = filter_in_set(&batch(), "region", &allowed()).unwrap();

        assert_eq!(filtered.num_rows(), 2);
        let views = filtered
            .column_by_name("views")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(views.value(0), 1);
        assert_eq!(views.value(1), 3);
    }

    #[test]
    fn test_filter_excludes_null_predicate_values() {
        let filtered = filter_in_set(&batch(), "region", &allowed()).unwrap();
        let regions = filtered
            .column_by_name("region")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(regions.null_count(), 0);
    }

    #[test]
    fn test_filter_missing_column_errors() {
        let err = filter_in_set(&batch(), "country", &allowed()).unwrap_err();
        assert!(matches!(err, TransformError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_filter_non_string_column_errors() {
        let err = filter_in_set(&batch(), "views", &allowed()).unwrap_err();
        assert!(matches!(err, TransformError::PredicateColumnType { .. }));
    }
}
