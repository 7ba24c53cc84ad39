//! Destination relational stores
//!
//! A destination hands out short-lived connections. Every catalog lookup and every
//! bulk load opens its own connection and drops it before returning, whether the
//! operation succeeded or not; nothing holds a connection across tables.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryDestination;
pub use sqlite::SqliteDestination;

use crate::error::StoreError;
use crate::types::{FlatTable, TableIdentity};

/// A relational store that can be connected to on demand
pub trait Destination {
    type Connection: DestinationConnection;

    /// Open a fresh connection; released when the returned value is dropped
    fn connect(&self) -> Result<Self::Connection, StoreError>;
}

/// Operations available on one open connection
pub trait DestinationConnection {
    /// Column names currently defined for `schema.table`, in definition order.
    /// An unknown table yields an empty list.
    fn table_columns(&mut self, schema: &str, table: &str) -> Result<Vec<String>, StoreError>;

    /// Replace the table's entire contents with `data`, writing only the columns
    /// `data` carries. Returns the number of rows loaded.
    fn overwrite(&mut self, table: &TableIdentity, data: &FlatTable) -> Result<usize, StoreError>;
}
