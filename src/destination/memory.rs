//! In-memory destination
//!
//! Holds table definitions and contents in process. Useful as a stand-in store for
//! tests and previews; individual tables can be told to fail their catalog lookups
//! or their writes, and the whole store can be marked unreachable.

use super::{Destination, DestinationConnection};
use crate::error::StoreError;
use crate::types::{FlatTable, TableIdentity};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<(String, String), FlatTable>,
    unavailable: bool,
    failing_catalog: HashSet<String>,
    failing_writes: HashSet<String>,
    open_connections: usize,
    connections_opened: usize,
    write_log: Vec<TableIdentity>,
}

/// A destination store living entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Define an empty table with the given columns
    pub fn with_table(self, schema: &str, table: &str, columns: &[&str]) -> Self {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.lock()
            .tables
            .insert((schema.to_string(), table.to_string()), FlatTable::new(columns));
        self
    }

    /// Make every connection attempt fail
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Make catalog lookups for `table` fail
    pub fn fail_catalog(&self, table: &str) {
        self.lock().failing_catalog.insert(table.to_string());
    }

    /// Make bulk loads into `table` fail
    pub fn fail_writes(&self, table: &str) {
        self.lock().failing_writes.insert(table.to_string());
    }

    /// Current contents of a table, laid out in the table's own column order
    pub fn table(&self, schema: &str, table: &str) -> Option<FlatTable> {
        self.lock()
            .tables
            .get(&(schema.to_string(), table.to_string()))
            .cloned()
    }

    /// Tables that received a successful bulk load, in order
    pub fn write_log(&self) -> Vec<TableIdentity> {
        self.lock().write_log.clone()
    }

    /// Connections currently open
    pub fn open_connections(&self) -> usize {
        self.lock().open_connections
    }

    /// Connections opened over the store's lifetime
    pub fn connections_opened(&self) -> usize {
        self.lock().connections_opened
    }
}

impl Destination for MemoryDestination {
    type Connection = MemoryConnection;

    fn connect(&self) -> Result<MemoryConnection, StoreError> {
        let mut state = self.lock();
        if state.unavailable {
            return Err(StoreError::Unavailable("memory destination is offline".into()));
        }
        state.open_connections += 1;
        state.connections_opened += 1;
        Ok(MemoryConnection {
            state: Arc::clone(&self.state),
        })
    }
}

/// Connection handle; decrements the open count when dropped
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnection {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let mut state = self.lock();
        state.open_connections = state.open_connections.saturating_sub(1);
    }
}

impl DestinationConnection for MemoryConnection {
    fn table_columns(&mut self, schema: &str, table: &str) -> Result<Vec<String>, StoreError> {
        let state = self.lock();
        if state.failing_catalog.contains(table) {
            return Err(StoreError::Rejected(format!("catalog lookup for {} failed", table)));
        }
        Ok(state
            .tables
            .get(&(schema.to_string(), table.to_string()))
            .map(|t| t.columns().to_vec())
            .unwrap_or_default())
    }

    fn overwrite(&mut self, table: &TableIdentity, data: &FlatTable) -> Result<usize, StoreError> {
        let mut state = self.lock();
        if state.failing_writes.contains(&table.table) {
            return Err(StoreError::Rejected(format!("bulk load into {} rejected", table)));
        }

        let key = (table.schema.clone(), table.table.clone());
        let Some(existing) = state.tables.get(&key) else {
            return Err(StoreError::Rejected(format!("no such table: {}", table)));
        };

        // Map every incoming column onto its position in the stored table
        let positions = data
            .columns()
            .iter()
            .map(|column| {
                existing.column_index(column).ok_or_else(|| {
                    StoreError::Rejected(format!("no such column: {}.{}", table, column))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut replaced = FlatTable::new(existing.columns().to_vec());
        for row in data.rows() {
            let mut stored = vec![Value::Null; replaced.columns().len()];
            for (value, pos) in row.iter().zip(&positions) {
                stored[*pos] = value.clone();
            }
            replaced.push_row(stored);
        }

        state.tables.insert(key, replaced);
        state.write_log.push(table.clone());
        Ok(data.row_count())
    }
}
