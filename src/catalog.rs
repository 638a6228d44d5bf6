//! File-backed table catalog.
//!
//! A catalog maps `database.table` names to a storage location, file
//! format, source column list, and partition keys, the way a managed data
//! catalog exposes tables to jobs. Definitions come from the job
//! configuration inline and/or from a referenced catalog YAML file.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;

use crate::error::{
    CatalogEnvInterpolationSnafu, CatalogError, CatalogParseSnafu, CatalogReadSnafu,
    DuplicateTableSnafu, EmptyLocationSnafu, TableNotFoundSnafu,
};

/// Catalog section of the job configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Optional path to a catalog YAML file (`databases:` at the top level).
    #[serde(default)]
    pub path: Option<String>,
    /// Inline database definitions, merged with the catalog file.
    #[serde(default)]
    pub databases: Vec<DatabaseDef>,
}

/// A database: a named group of tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseDef {
    pub name: String,
    pub tables: Vec<TableEntry>,
}

/// A cataloged table.
///
/// `columns` lists the fields stored in the data files, in file order
/// (CSV columns are matched by position). Partition keys are not stored
/// in the files; their values are encoded in Hive-style `key=value/`
/// directories under the table location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableEntry {
    pub name: String,
    /// Storage location of the table's data files.
    pub location: String,
    /// File format of the data files.
    pub format: FileFormat,
    /// Compression of the data files.
    #[serde(default)]
    pub compression: CompressionFormat,
    /// Columns stored in the data files.
    pub columns: Vec<ColumnDef>,
    /// Partition key columns, outermost first.
    #[serde(default)]
    pub partition_keys: Vec<String>,
}

/// A source column. The declared type is informational: values are read
/// permissively as strings and coerced by the resolve stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type", default = "default_column_type")]
    pub column_type: String,
}

fn default_column_type() -> String {
    "string".to_string()
}

/// Supported source file formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Ndjson,
}

/// Compression format for source files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionFormat {
    #[default]
    None,
    Gzip,
}

/// Top-level structure of a catalog file.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    databases: Vec<DatabaseDef>,
}

/// A loaded catalog, ready for table resolution.
#[derive(Debug, Clone)]
pub struct Catalog {
    tables: HashMap<(String, String), TableEntry>,
}

impl Catalog {
    /// Load the catalog from the configuration, merging inline definitions
    /// with the referenced catalog file (if any).
    pub fn load(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let mut databases = Vec::new();

        if let Some(path) = &config.path {
            let content = std::fs::read_to_string(path).context(CatalogReadSnafu { path })?;
            // Catalog files get the same env interpolation as the job config
            let result = crate::config::vars::interpolate(&content);
            ensure!(
                result.is_ok(),
                CatalogEnvInterpolationSnafu {
                    path,
                    message: result.errors.join("\n"),
                }
            );
            let file: CatalogFile =
                serde_yaml::from_str(&result.text).context(CatalogParseSnafu { path })?;
            databases.extend(file.databases);
        }
        databases.extend(config.databases.iter().cloned());

        let mut tables = HashMap::new();
        for database in databases {
            for table in database.tables {
                ensure!(
                    !table.location.is_empty(),
                    EmptyLocationSnafu {
                        database: &database.name,
                        table: &table.name,
                    }
                );
                let key = (database.name.clone(), table.name.clone());
                ensure!(
                    !tables.contains_key(&key),
                    DuplicateTableSnafu {
                        database: &database.name,
                        table: &table.name,
                    }
                );
                tables.insert(key, table);
            }
        }

        Ok(Self { tables })
    }

    /// Resolve a table by database and name.
    pub fn resolve(&self, database: &str, table: &str) -> Result<&TableEntry, CatalogError> {
        self.tables
            .get(&(database.to_string(), table.to_string()))
            .context(TableNotFoundSnafu { database, table })
    }

    /// Number of tables in the catalog.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

impl TableEntry {
    /// Names of the columns stored in the data files (partition keys are
    /// path-encoded and excluded here).
    pub fn file_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .filter(|name| !self.partition_keys.iter().any(|k| k == name))
    }
}
