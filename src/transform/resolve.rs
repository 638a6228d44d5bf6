//! Type resolution: coerce every column to its declared target type.

use arrow::array::{ArrayRef, RecordBatch};
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::SchemaRef;
use arrow::util::display::FormatOptions;
use snafu::prelude::*;

use crate::error::{ArrowSnafu, ColumnNotFoundSnafu, TransformError};

/// Cast every column of the batch to the type declared in `target`.
///
/// Casts run in safe mode: a value that cannot be represented in the
/// target type becomes null instead of failing the batch. The null filter
/// downstream then drops the affected row, so bad values cost a row, not
/// the job.
pub fn resolve_types(
    batch: &RecordBatch,
    target: &SchemaRef,
) -> Result<RecordBatch, TransformError> {
    let options = CastOptions {
        safe: true,
        format_options: FormatOptions::default(),
    };

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(target.fields().len());
    for field in target.fields() {
        let column = batch
            .column_by_name(field.name())
            .context(ColumnNotFoundSnafu { name: field.name() })?;
        let resolved =
            cast_with_options(column.as_ref(), field.data_type(), &options).context(ArrowSnafu)?;
        columns.push(resolved);
    }

    RecordBatch::try_new(target.clone(), columns).context(ArrowSnafu)
}
