//! Null-row filter: drop every row with a null in any field.

use arrow::array::{BooleanArray, RecordBatch};
use arrow::compute::{and, filter_record_batch, is_not_null};
use snafu::prelude::*;

use crate::error::{ArrowSnafu, TransformError};

/// Remove every row that has at least one null field.
pub fn drop_null_rows(batch: &RecordBatch) -> Result<RecordBatch, TransformError> {
    let mut mask: Option<BooleanArray> = None;

    for column in batch.columns() {
        let not_null = is_not_null(column.as_ref()).context(ArrowSnafu)?;
        mask = Some(match mask {
            Some(mask) => and(&mask, &not_null).context(ArrowSnafu)?,
            None => not_null,
        });
    }

    match mask {
        Some(mask) => filter_record_batch(batch, &mask).context(ArrowSnafu),
        None => Ok(batch.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use std::sync::Arc;

    #[test]
    fn test_drops_rows_with_any_null() {
        let batch = RecordBatch::try_from_iter(vec![
            (
                "video_id",
                Arc::new(StringArray::from(vec![Some("a"), Some("b"), None])) as ArrayRef,
            ),
            (
                "comment_count",
                Arc::new(Int64Array::from(vec![Some(10), None, Some(30)])) as ArrayRef,
            ),
        ])
        .unwrap();

        let clean = drop_null_rows(&batch).unwrap();

        assert_eq!(clean.num_rows(), 1);
        let ids = clean
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(ids.value(0), "a");
    }

    #[test]
    fn test_keeps_fully_populated_rows() {
        let batch = RecordBatch::try_from_iter(vec![(
            "video_id",
            Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef,
        )])
        .unwrap();

        let clean = drop_null_rows(&batch).unwrap();
        assert_eq!(clean.num_rows(), 2);
    }

    #[test]
    fn test_empty_batch_passes_through() {
        let batch = RecordBatch::try_from_iter(vec![(
            "video_id",
            Arc::new(StringArray::from(Vec::<&str>::new())) as ArrayRef,
        )])
        .unwrap();

        let clean = drop_null_rows(&batch).unwrap();
        assert_eq!(clean.num_rows(), 0);
    }
}
