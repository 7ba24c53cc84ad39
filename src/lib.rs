//! # Smelter - nested JSON into relational tables
//!
//! Smelter loads one semi-structured document and projects it into flat tables that
//! already exist in a destination store: one table per nesting level, named after
//! the level's lineage, with each level narrowed to the columns its table defines.
//!
//! ## Modules
//!
//! - **schema**: infer the schema tree of a row set
//! - **melt**: classify fields, explode arrays, write each level (the flattener)
//! - **catalog**: look up the columns a destination table defines
//! - **destination**: the store abstraction, with SQLite and in-memory stores
//! - **loader**: one full pass from source document to summary
//!
//! ## Quick Start
//!
//! ```rust
//! use smelter::{LoadConfig, Loader, MemoryDestination, RowSet};
//! use serde_json::json;
//!
//! let dest = MemoryDestination::new()
//!     .with_table("main", "Entity", &["id", "name"])
//!     .with_table("main", "addr", &["addr_city", "addr_zip"]);
//!
//! let document = json!({
//!     "id": 1,
//!     "name": "a",
//!     "addr": {"city": "NYC", "zip": "10001"}
//! });
//! let rows = RowSet::from_records(vec![serde_json::from_value(document).unwrap()]);
//!
//! let config = LoadConfig::default();
//! let summary = Loader::new(&config, &dest).load_rows(&rows);
//!
//! assert!(summary.report_for("addr").unwrap().outcome.is_written());
//! ```

pub mod catalog;
pub mod config;
pub mod destination;
pub mod error;
pub mod loader;
pub mod melt;
pub mod schema;
pub mod source;
pub mod summary;
pub mod types;

// Re-export commonly used types for convenience
pub use catalog::SchemaCatalog;
pub use config::{ConnectionConfig, LoadConfig};
pub use destination::{Destination, DestinationConnection, MemoryDestination, SqliteDestination};
pub use error::{MeltError, Result, StoreError};
pub use loader::Loader;
pub use melt::{Flattener, TableWriter, WriteResult};
pub use schema::{infer_schema, FieldKind, SchemaTree};
pub use summary::{LoadSummary, TableOutcome, TableReport};
pub use types::{FlatTable, MeltConfig, Record, Row, RowSet, TableIdentity};

/// Main entry point: run one pass against the SQLite destination in `config`
pub fn run_load(config: &LoadConfig) -> Result<LoadSummary> {
    config.validate()?;

    let destination = config
        .connection
        .attach
        .iter()
        .fold(SqliteDestination::new(&config.connection.endpoint), |dest, (schema, path)| {
            dest.attach(schema.as_str(), path.as_str())
        });

    Loader::new(config, &destination).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use tempfile::TempDir;

    #[test]
    fn test_run_load_with_attached_schema() {
        let dir = TempDir::new().unwrap();
        let main = dir.path().join("main.db");
        let staging = dir.path().join("staging.db");
        Connection::open(&main)
            .unwrap()
            .execute_batch("CREATE TABLE unrelated (x INTEGER);")
            .unwrap();
        Connection::open(&staging)
            .unwrap()
            .execute_batch("CREATE TABLE Entity (id INTEGER, name TEXT);")
            .unwrap();
        let source = dir.path().join("doc.json");
        std::fs::write(&source, r#"[{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]"#).unwrap();

        let mut config = LoadConfig {
            schema_name: "staging".into(),
            source_path: source.to_string_lossy().into_owned(),
            ..LoadConfig::default()
        };
        config.connection.endpoint = main.to_string_lossy().into_owned();
        config
            .connection
            .attach
            .insert("staging".into(), staging.to_string_lossy().into_owned());

        let summary = run_load(&config).unwrap();

        assert_eq!(
            summary.report_for("Entity").unwrap().outcome,
            TableOutcome::Written {
                rows: 2,
                columns: vec!["id".into(), "name".into()]
            }
        );
        let count: i64 = Connection::open(&staging)
            .unwrap()
            .query_row("SELECT COUNT(*) FROM Entity", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_run_load_rejects_incomplete_config() {
        let err = run_load(&LoadConfig::default()).unwrap_err();
        assert!(matches!(err, MeltError::Config(_)));
    }
}
