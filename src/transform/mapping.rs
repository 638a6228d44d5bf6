//! Field mapping: projection, renaming, and null injection.

use arrow::array::{new_null_array, ArrayRef, RecordBatch};
use arrow::datatypes::{Field, Schema};
use snafu::prelude::*;
use std::sync::Arc;

use crate::config::MappingRule;
use crate::error::{ArrowSnafu, TransformError};

/// Applies the configured mapping table to record batches.
///
/// Output batches contain exactly the mapped fields, in rule order, under
/// their target names. Source fields without a rule are dropped. A rule
/// whose source field is absent from the batch produces an all-null
/// column of the target type, which the null filter then removes row by
/// row.
///
/// Values keep their source representation here; the resolve stage owns
/// the cast to the declared target types.
pub struct Mapper {
    rules: Vec<MappingRule>,
}

impl Mapper {
    pub fn new(rules: Vec<MappingRule>) -> Self {
        Self { rules }
    }

    /// Apply the mapping to one batch.
    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch, TransformError> {
        let mut fields = Vec::with_capacity(self.rules.len());
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(self.rules.len());

        for rule in &self.rules {
            match batch.column_by_name(&rule.source) {
                Some(column) => {
                    fields.push(Field::new(&rule.target, column.data_type().clone(), true));
                    columns.push(Arc::clone(column));
                }
                None => {
                    let data_type = rule.target_type.to_arrow_type();
                    columns.push(new_null_array(&data_type, batch.num_rows()));
                    fields.push(Field::new(&rule.target, data_type, true));
                }
            }
        }

        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context(ArrowSnafu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldType;
    use arrow::array::StringArray;
    use arrow::datatypes::DataType;

    fn rule(source: &str, target: &str, target_type: FieldType) -> MappingRule {
        MappingRule {
            source: source.to_string(),
            target: target.to_string(),
            target_type,
        }
    }

    fn source_batch() -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (
                "video_id",
                Arc::new(StringArray::from(vec!["abc", "def"])) as ArrayRef,
            ),
            (
                "channel_title",
                Arc::new(StringArray::from(vec!["x", "y"])) as ArrayRef,
            ),
            (
                "views",
                Arc::new(StringArray::from(vec!["100", "200"])) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_mapping_renames_and_projects() {
        let mapper = Mapper::new(vec![
            rule("video_id", "id", FieldType::String),
            rule("views", "views", FieldType::Int64),
        ]);

        let mapped = mapper.apply(&source_batch()).unwrap();

        assert_eq!(mapped.num_columns(), 2);
        assert_eq!(mapped.schema().field(0).name(), "id");
        assert_eq!(mapped.schema().field(1).name(), "views");
        // channel_title had no rule, so it is gone
        assert!(mapped.column_by_name("channel_title").is_none());
    }

    #[test]
    fn test_mapping_keeps_source_representation() {
        let mapper = Mapper::new(vec![rule("views", "views", FieldType::Int64)]);
        let mapped = mapper.apply(&source_batch()).unwrap();

        // Still a string column; resolve casts it later
        assert_eq!(mapped.column(0).data_type(), &DataType::Utf8);
    }

    #[test]
    fn test_missing_source_field_becomes_null_column() {
        let mapper = Mapper::new(vec![
            rule("video_id", "id", FieldType::String),
            rule("comment_count", "comment_count", FieldType::Int64),
        ]);

        let mapped = mapper.apply(&source_batch()).unwrap();

        let comment_count = mapped.column_by_name("comment_count").unwrap();
        assert_eq!(comment_count.data_type(), &DataType::Int64);
        assert_eq!(comment_count.null_count(), 2);
    }
}
