use crate::config::LoadConfig;
use crate::destination::Destination;
use crate::error::Result;
use crate::melt::{Flattener, TableWriter};
use crate::schema::infer_schema;
use crate::source::load_document;
use crate::summary::LoadSummary;
use crate::types::{FlatTable, RowSet, TableIdentity};
use tracing::{debug, info};

/// Runs one full load pass: source document in, one table per level out
pub struct Loader<'a, D: Destination> {
    config: &'a LoadConfig,
    destination: &'a D,
}

impl<'a, D: Destination> Loader<'a, D> {
    pub fn new(config: &'a LoadConfig, destination: &'a D) -> Self {
        Loader {
            config,
            destination,
        }
    }

    /// Load the configured source document and write every table.
    ///
    /// Only a source that cannot be read or parsed fails the pass.
    pub fn run(&self) -> Result<LoadSummary> {
        let records = load_document(&self.config.source_path)?;
        Ok(self.load_rows(&RowSet::from_records(records)))
    }

    /// Write the root table, then flatten every level of `rows`
    pub fn load_rows(&self, rows: &RowSet) -> LoadSummary {
        let schema = infer_schema(rows.records());
        debug!("document schema:\n{}", schema);

        let mut summary = LoadSummary::default();
        let schema_name = self.config.schema_name.as_str();

        let root = TableIdentity::new(schema_name, self.config.root_table.as_str());
        let root_rows = FlatTable::from_records(schema.names(), rows.records());
        let writer = TableWriter::new(self.destination, schema_name);
        summary.push(writer.filter_and_write(root_rows, &root));

        Flattener::new(self.destination, schema_name, &self.config.melt).flatten(rows, "", &mut summary);

        info!(
            tables = summary.tables.len(),
            written = summary.written().count(),
            errors = summary.has_errors(),
            "load pass finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::destination::{MemoryDestination, SqliteDestination};
    use crate::error::MeltError;
    use crate::summary::TableOutcome;
    use rusqlite::Connection;
    use serde_json::{json, Value};
    use std::path::Path;
    use tempfile::TempDir;

    const SCENARIO: &str = r#"{"id":1, "name":"a", "tags":["x","y"], "addr":{"city":"NYC","zip":"10001"}, "extra_field": true}"#;

    fn config(source: &Path, endpoint: &Path) -> LoadConfig {
        LoadConfig {
            source_path: source.to_string_lossy().into_owned(),
            connection: ConnectionConfig {
                endpoint: endpoint.to_string_lossy().into_owned(),
                ..ConnectionConfig::default()
            },
            ..LoadConfig::default()
        }
    }

    fn destination(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("dest.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch(
                "CREATE TABLE Entity (id INTEGER, name TEXT);
                 CREATE TABLE root (id INTEGER, tags TEXT);
                 CREATE TABLE addr (addr_city TEXT, addr_zip TEXT);",
            )
            .unwrap();
        path
    }

    fn dump(path: &Path, table: &str) -> Vec<Vec<Value>> {
        let conn = Connection::open(path).unwrap();
        let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY rowid", table)).unwrap();
        let width = stmt.column_count();
        stmt.query_map([], |row| {
            (0..width)
                .map(|i| -> rusqlite::Result<Value> {
                    Ok(match row.get::<_, rusqlite::types::Value>(i)? {
                        rusqlite::types::Value::Integer(n) => json!(n),
                        rusqlite::types::Value::Text(s) => json!(s),
                        _ => Value::Null,
                    })
                })
                .collect::<rusqlite::Result<Vec<Value>>>()
        })
        .unwrap()
        .collect::<std::result::Result<Vec<_>, _>>()
        .unwrap()
    }

    #[test]
    fn test_scenario_against_sqlite() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("doc.json");
        std::fs::write(&source, SCENARIO).unwrap();
        let endpoint = destination(&dir);

        let config = config(&source, &endpoint);
        let dest = SqliteDestination::new(&endpoint);
        let summary = Loader::new(&config, &dest).run().unwrap();

        assert_eq!(dump(&endpoint, "Entity"), vec![vec![json!(1), json!("a")]]);
        assert_eq!(
            dump(&endpoint, "root"),
            vec![vec![json!(1), json!("x")], vec![json!(1), json!("y")]]
        );
        assert_eq!(dump(&endpoint, "addr"), vec![vec![json!("NYC"), json!("10001")]]);

        // extra_field is unknown everywhere and silently dropped
        for report in &summary.tables {
            assert!(!report.outcome.is_error());
            if let TableOutcome::Written { columns, .. } = &report.outcome {
                assert!(!columns.contains(&"extra_field".to_string()));
            }
        }
        assert!(summary
            .report_for("Entity")
            .unwrap()
            .dropped_columns
            .contains(&"extra_field".to_string()));
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("doc.json");
        std::fs::write(&source, SCENARIO).unwrap();
        let endpoint = destination(&dir);
        let config = config(&source, &endpoint);
        let dest = SqliteDestination::new(&endpoint);

        let first = Loader::new(&config, &dest).run().unwrap();
        let snapshot: Vec<_> = ["Entity", "root", "addr"].iter().map(|t| dump(&endpoint, t)).collect();
        let second = Loader::new(&config, &dest).run().unwrap();
        let again: Vec<_> = ["Entity", "root", "addr"].iter().map(|t| dump(&endpoint, t)).collect();

        assert_eq!(first, second);
        assert_eq!(snapshot, again);
    }

    #[test]
    fn test_source_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let endpoint = destination(&dir);
        let config = config(&dir.path().join("missing.json"), &endpoint);
        let dest = SqliteDestination::new(&endpoint);

        let err = Loader::new(&config, &dest).run().unwrap_err();
        assert!(matches!(err, MeltError::SourceLoad { .. }));
    }

    #[test]
    fn test_unreachable_destination_marks_every_table() {
        let dest = MemoryDestination::new();
        dest.set_unavailable(true);
        let config = LoadConfig::default();
        let rows = RowSet::from_records(vec![
            serde_json::from_value(json!({"id": 1, "addr": {"city": "NYC"}})).unwrap(),
        ]);

        let summary = Loader::new(&config, &dest).load_rows(&rows);

        let tables: Vec<&str> = summary.tables.iter().map(|r| r.table.table.as_str()).collect();
        assert_eq!(tables, vec!["Entity", "root", "addr"]);
        assert!(summary.tables.iter().all(|r| r.outcome.is_error()));
    }

    #[test]
    fn test_root_write_uses_unexploded_rows() {
        let dest = MemoryDestination::new().with_table("main", "Entity", &["id", "tags"]);
        let config = LoadConfig::default();
        let rows = RowSet::from_records(vec![
            serde_json::from_value(json!({"id": 1, "tags": ["x", "y"]})).unwrap(),
        ]);

        Loader::new(&config, &dest).load_rows(&rows);

        let entity = dest.table("main", "Entity").unwrap();
        assert_eq!(entity.rows(), &[vec![json!(1), json!(["x", "y"])]]);
    }
}
