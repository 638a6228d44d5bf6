//! Source file decoder.
//!
//! Decodes CSV or NDJSON files (optionally gzip-compressed) into Arrow
//! RecordBatches. Values are read against a permissive all-string schema
//! derived from the catalog columns; the resolve stage downstream owns
//! coercion to the declared output types, so a file with messy or
//! inconsistent value types never fails the whole run here.

use std::io::{BufRead, BufReader, Cursor};
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use bytes::Bytes;
use tracing::debug;

use crate::catalog::{CompressionFormat, FileFormat, TableEntry};
use crate::error::{DecodeSnafu, DecoderBuildSnafu, ReaderError};

/// A reader for a cataloged table's data files.
pub struct RecordReader {
    schema: SchemaRef,
    format: FileFormat,
    compression: CompressionFormat,
    batch_size: usize,
}

impl RecordReader {
    /// Create a reader for the given table.
    ///
    /// The read schema covers the table's file columns only; partition
    /// keys are path-encoded and injected by the caller.
    pub fn for_table(table: &TableEntry, batch_size: usize) -> Self {
        let fields: Vec<Field> = table
            .file_columns()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect();

        Self {
            schema: Arc::new(Schema::new(fields)),
            format: table.format,
            compression: table.compression,
            batch_size,
        }
    }

    /// The permissive read schema.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Decode one file into record batches.
    pub fn read_batches(&self, data: Bytes, path: &str) -> Result<Vec<RecordBatch>, ReaderError> {
        let reader = self.decompressed(&data);

        let batches = match self.format {
            FileFormat::Csv => self.read_csv(reader, path)?,
            FileFormat::Ndjson => self.read_ndjson(reader, path)?,
        };

        let records: usize = batches.iter().map(|b| b.num_rows()).sum();
        debug!(
            "Decoded {} bytes -> {} batches ({} records) from {}",
            data.len(),
            batches.len(),
            records,
            path
        );

        Ok(batches)
    }

    fn decompressed<'a>(&self, data: &'a Bytes) -> Box<dyn BufRead + Send + 'a> {
        match self.compression {
            CompressionFormat::Gzip => Box::new(BufReader::new(flate2::read::GzDecoder::new(
                data.as_ref(),
            ))),
            CompressionFormat::None => Box::new(Cursor::new(data.as_ref())),
        }
    }

    fn read_csv(
        &self,
        reader: impl BufRead,
        path: &str,
    ) -> Result<Vec<RecordBatch>, ReaderError> {
        let csv_reader = arrow::csv::ReaderBuilder::new(Arc::clone(&self.schema))
            .with_header(true)
            .with_batch_size(self.batch_size)
            .build(reader)
            .map_err(|e| {
                DecoderBuildSnafu {
                    message: e.to_string(),
                }
                .build()
            })?;

        csv_reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| decode_error(path, e))
    }

    fn read_ndjson(
        &self,
        reader: impl BufRead,
        path: &str,
    ) -> Result<Vec<RecordBatch>, ReaderError> {
        let json_reader = arrow::json::ReaderBuilder::new(Arc::clone(&self.schema))
            .with_batch_size(self.batch_size)
            .with_coerce_primitive(true)
            .with_strict_mode(false)
            .build(reader)
            .map_err(|e| {
                DecoderBuildSnafu {
                    message: e.to_string(),
                }
                .build()
            })?;

        json_reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| decode_error(path, e))
    }
}

fn decode_error(path: &str, e: arrow::error::ArrowError) -> ReaderError {
    DecodeSnafu {
        path: path.to_string(),
        message: e.to_string(),
    }
    .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDef;
    use arrow::array::StringArray;
    use std::io::Write;

    fn table(format: FileFormat, compression: CompressionFormat) -> TableEntry {
        TableEntry {
            name: "raw_statistics".to_string(),
            location: "/data/raw".to_string(),
            format,
            compression,
            columns: vec![
                ColumnDef {
                    name: "video_id".to_string(),
                    column_type: "string".to_string(),
                },
                ColumnDef {
                    name: "views".to_string(),
                    column_type: "long".to_string(),
                },
            ],
            partition_keys: vec![],
        }
    }

    fn string_column(batch: &RecordBatch, name: &str) -> Vec<Option<String>> {
        batch
            .column_by_name(name)
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap()
            .iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect()
    }

    #[test]
    fn test_read_csv() {
        let reader = RecordReader::for_table(&table(FileFormat::Csv, CompressionFormat::None), 1024);
        let data = Bytes::from("video_id,views\nabc,100\ndef,200\n");

        let batches = reader.read_batches(data, "videos.csv").unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 2);
        assert_eq!(
            string_column(&batches[0], "video_id"),
            vec![Some("abc".to_string()), Some("def".to_string())]
        );
        // Values are read as strings; coercion happens downstream
        assert_eq!(
            string_column(&batches[0], "views"),
            vec![Some("100".to_string()), Some("200".to_string())]
        );
    }

    #[test]
    fn test_read_ndjson_coerces_primitives_to_strings() {
        let reader =
            RecordReader::for_table(&table(FileFormat::Ndjson, CompressionFormat::None), 1024);
        let data = Bytes::from(r#"{"video_id": "abc", "views": 100}"#.to_string() + "\n");

        let batches = reader.read_batches(data, "videos.ndjson").unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            string_column(&batches[0], "views"),
            vec![Some("100".to_string())]
        );
    }

    #[test]
    fn test_read_ndjson_missing_field_is_null() {
        let reader =
            RecordReader::for_table(&table(FileFormat::Ndjson, CompressionFormat::None), 1024);
        let data = Bytes::from(r#"{"video_id": "abc"}"#.to_string() + "\n");

        let batches = reader.read_batches(data, "videos.ndjson").unwrap();
        assert_eq!(string_column(&batches[0], "views"), vec![None]);
    }

    #[test]
    fn test_read_gzip_csv() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"video_id,views\nabc,100\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let reader = RecordReader::for_table(&table(FileFormat::Csv, CompressionFormat::Gzip), 1024);
        let batches = reader
            .read_batches(Bytes::from(compressed), "videos.csv.gz")
            .unwrap();
        assert_eq!(batches[0].num_rows(), 1);
    }

    #[test]
    fn test_partition_keys_excluded_from_read_schema() {
        let mut t = table(FileFormat::Csv, CompressionFormat::None);
        t.columns.push(ColumnDef {
            name: "region".to_string(),
            column_type: "string".to_string(),
        });
        t.partition_keys = vec!["region".to_string()];

        let reader = RecordReader::for_table(&t, 1024);
        assert_eq!(reader.schema().fields().len(), 2);
        assert!(reader.schema().field_with_name("region").is_err());
    }

    #[test]
    fn test_empty_file_yields_no_batches() {
        let reader = RecordReader::for_table(&table(FileFormat::Csv, CompressionFormat::None), 1024);
        let batches = reader
            .read_batches(Bytes::from("video_id,views\n"), "empty.csv")
            .unwrap();
        let records: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(records, 0);
    }
}
