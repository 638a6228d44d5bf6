//! Table scan planning: file listing with predicate pushdown.
//!
//! When the configured predicate applies to one of the table's partition
//! keys, the scan only lists the matching `key=value/` prefixes, so
//! excluded partitions are never fetched or decoded. Otherwise the whole
//! table is listed and the row-level filter downstream does the work.

use tracing::{debug, info};

use crate::catalog::{CompressionFormat, FileFormat, TableEntry};
use crate::config::PredicateConfig;
use crate::error::StorageError;
use crate::partition;
use crate::storage::StorageProviderRef;

/// A planned scan over a cataloged table's data files.
pub struct TableScan {
    storage: StorageProviderRef,
    format: FileFormat,
    compression: CompressionFormat,
    prefixes: Option<Vec<String>>,
}

impl TableScan {
    /// Plan a scan, deriving pushdown prefixes from the predicate when it
    /// targets a partition key.
    pub fn new(
        storage: StorageProviderRef,
        table: &TableEntry,
        predicate: Option<&PredicateConfig>,
    ) -> Self {
        let prefixes = predicate
            .filter(|p| table.partition_keys.contains(&p.column))
            .map(|p| partition::prefixes(&p.column, &p.values));

        if let Some(prefixes) = &prefixes {
            info!(
                "Predicate pushed down to listing: {} partition prefix(es)",
                prefixes.len()
            );
        }

        Self {
            storage,
            format: table.format,
            compression: table.compression,
            prefixes,
        }
    }

    /// List the data files selected by this scan, sorted for consistent
    /// ordering.
    pub async fn list_files(&self) -> Result<Vec<String>, StorageError> {
        let mut files = match &self.prefixes {
            None => self.storage.list_files(None).await?,
            Some(prefixes) => {
                let mut all = Vec::new();
                for prefix in prefixes {
                    all.extend(self.storage.list_files(Some(prefix)).await?);
                }
                all
            }
        };

        let total_listed = files.len();
        files.retain(|path| matches_format(path, self.format, self.compression));
        files.sort();
        files.dedup();

        debug!(
            "Listed {} objects, {} match the table format",
            total_listed,
            files.len()
        );

        Ok(files)
    }
}

/// Check whether a file path has the extension the table format implies.
fn matches_format(path: &str, format: FileFormat, compression: CompressionFormat) -> bool {
    let extensions: &[&str] = match (format, compression) {
        (FileFormat::Csv, CompressionFormat::None) => &[".csv"],
        (FileFormat::Csv, CompressionFormat::Gzip) => &[".csv.gz"],
        (FileFormat::Ndjson, CompressionFormat::None) => &[".ndjson", ".json"],
        (FileFormat::Ndjson, CompressionFormat::Gzip) => &[".ndjson.gz", ".json.gz"],
    };
    extensions.iter().any(|ext| path.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDef;
    use crate::storage::StorageProvider;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn table_entry(partition_keys: Vec<String>) -> TableEntry {
        TableEntry {
            name: "raw_statistics".to_string(),
            location: "/data/raw".to_string(),
            format: FileFormat::Csv,
            compression: CompressionFormat::None,
            columns: vec![ColumnDef {
                name: "video_id".to_string(),
                column_type: "string".to_string(),
            }],
            partition_keys,
        }
    }

    fn predicate() -> PredicateConfig {
        PredicateConfig {
            column: "region".to_string(),
            values: vec!["ca".to_string(), "us".to_string()],
        }
    }

    async fn storage_with_files(files: &[&str]) -> (tempfile::TempDir, StorageProviderRef) {
        let temp_dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = temp_dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"header\n").unwrap();
        }
        let storage = StorageProvider::for_url_with_options(
            temp_dir.path().to_str().unwrap(),
            HashMap::new(),
        )
        .await
        .unwrap();
        (temp_dir, Arc::new(storage))
    }

    #[test]
    fn test_matches_format() {
        assert!(matches_format(
            "region=us/videos.csv",
            FileFormat::Csv,
            CompressionFormat::None
        ));
        assert!(!matches_format(
            "region=us/videos.csv",
            FileFormat::Csv,
            CompressionFormat::Gzip
        ));
        assert!(matches_format(
            "a.json",
            FileFormat::Ndjson,
            CompressionFormat::None
        ));
        assert!(!matches_format(
            "a.parquet",
            FileFormat::Csv,
            CompressionFormat::None
        ));
    }

    #[tokio::test]
    async fn test_pushdown_lists_only_allowed_partitions() {
        let (_dir, storage) = storage_with_files(&[
            "region=ca/CAvideos.csv",
            "region=us/USvideos.csv",
            "region=de/DEvideos.csv",
        ])
        .await;

        let table = table_entry(vec!["region".to_string()]);
        let scan = TableScan::new(storage, &table, Some(&predicate()));

        let files = scan.list_files().await.unwrap();
        assert_eq!(files, vec!["region=ca/CAvideos.csv", "region=us/USvideos.csv"]);
    }

    #[tokio::test]
    async fn test_unpartitioned_table_lists_everything() {
        let (_dir, storage) =
            storage_with_files(&["all_videos.csv", "more_videos.csv", "notes.txt"]).await;

        let table = table_entry(vec![]);
        let scan = TableScan::new(storage, &table, Some(&predicate()));

        let files = scan.list_files().await.unwrap();
        assert_eq!(files, vec!["all_videos.csv", "more_videos.csv"]);
    }

    #[tokio::test]
    async fn test_empty_source_lists_nothing() {
        let (_dir, storage) = storage_with_files(&[]).await;

        let table = table_entry(vec!["region".to_string()]);
        let scan = TableScan::new(storage, &table, Some(&predicate()));

        let files = scan.list_files().await.unwrap();
        assert!(files.is_empty());
    }
}
