//! SQLite destination
//!
//! The schema part of a table identity is the SQLite database name: `main` for the
//! endpoint file itself, or any name attached through [`SqliteDestination::attach`].

use super::{Destination, DestinationConnection};
use crate::error::StoreError;
use crate::types::{FlatTable, TableIdentity};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

/// Connects to an existing SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteDestination {
    endpoint: PathBuf,
    attachments: Vec<(String, PathBuf)>,
}

impl SqliteDestination {
    pub fn new(endpoint: impl Into<PathBuf>) -> Self {
        SqliteDestination {
            endpoint: endpoint.into(),
            attachments: Vec::new(),
        }
    }

    /// Attach another database file under `schema` on every connection
    pub fn attach(mut self, schema: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.attachments.push((schema.into(), path.into()));
        self
    }
}

impl Destination for SqliteDestination {
    type Connection = SqliteConnection;

    fn connect(&self) -> Result<SqliteConnection, StoreError> {
        // The destination must already exist; never create it implicitly
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.endpoint, flags).map_err(|e| {
            StoreError::Unavailable(format!("{}: {}", self.endpoint.display(), e))
        })?;

        for (schema, path) in &self.attachments {
            let sql = format!("ATTACH DATABASE ?1 AS {}", quote_ident(schema));
            conn.execute(&sql, [path.to_string_lossy().into_owned()])
                .map_err(|e| StoreError::Unavailable(format!("attach {}: {}", schema, e)))?;
        }

        debug!(endpoint = %self.endpoint.display(), "opened destination connection");
        Ok(SqliteConnection { conn })
    }
}

/// One open SQLite connection; closed on drop
pub struct SqliteConnection {
    conn: Connection,
}

impl DestinationConnection for SqliteConnection {
    fn table_columns(&mut self, schema: &str, table: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1, ?2) ORDER BY cid")?;
        let columns = stmt
            .query_map([table, schema], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn overwrite(&mut self, table: &TableIdentity, data: &FlatTable) -> Result<usize, StoreError> {
        let target = format!("{}.{}", quote_ident(&table.schema), quote_ident(&table.table));
        let columns = data
            .columns()
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=data.columns().len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");

        let tx = self.conn.transaction()?;
        tx.execute(&format!("DELETE FROM {}", target), [])?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} ({}) VALUES ({})",
                target, columns, placeholders
            ))?;
            for row in data.rows() {
                stmt.execute(params_from_iter(row.iter().map(to_sql_value)))?;
            }
        }
        tx.commit()?;

        Ok(data.row_count())
    }
}

/// Quote an identifier for SQLite, doubling embedded quotes
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Bind a JSON value without coercing it: composite values travel as JSON text
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}
