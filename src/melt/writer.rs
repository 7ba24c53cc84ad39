use crate::catalog::SchemaCatalog;
use crate::destination::{Destination, DestinationConnection};
use crate::error::{MeltError, Result};
use crate::summary::{EmptyReason, TableOutcome, TableReport};
use crate::types::{FlatTable, TableIdentity};
use tracing::{error, info, warn};

/// Result of a single bulk load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
    Written { rows: usize },
    Skipped,
}

/// Writes flat tables to the destination with full-overwrite semantics
pub struct TableWriter<'a, D: Destination> {
    destination: &'a D,
    catalog: SchemaCatalog<'a, D>,
}

impl<'a, D: Destination> TableWriter<'a, D> {
    pub fn new(destination: &'a D, schema: &'a str) -> Self {
        TableWriter {
            destination,
            catalog: SchemaCatalog::new(destination, schema),
        }
    }

    /// Replace the contents of `table` with `data`. Empty input is skipped
    /// without contacting the destination.
    pub fn write(&self, data: &FlatTable, table: &TableIdentity) -> Result<WriteResult> {
        if data.is_empty() {
            return Ok(WriteResult::Skipped);
        }

        let mut conn = self.destination.connect().map_err(|source| MeltError::Write {
            table: table.clone(),
            source,
        })?;
        let rows = conn.overwrite(table, data).map_err(|source| MeltError::Write {
            table: table.clone(),
            source,
        })?;

        Ok(WriteResult::Written { rows })
    }

    /// Narrow `data` to the columns the destination table defines, then write it.
    ///
    /// Never fails: catalog and write errors are logged and reported as a skipped
    /// table so the caller can carry on with other tables.
    pub fn filter_and_write(&self, mut data: FlatTable, table: &TableIdentity) -> TableReport {
        if !data.has_own_columns() {
            return TableReport::new(
                table.clone(),
                TableOutcome::SkippedEmpty { reason: EmptyReason::NoColumns },
            );
        }
        if data.row_count() == 0 {
            return TableReport::new(
                table.clone(),
                TableOutcome::SkippedEmpty { reason: EmptyReason::NoRows },
            );
        }

        let known = match self.catalog.columns_of(&table.table) {
            Ok(columns) => columns,
            Err(e) => {
                error!(%table, error = %e, "skipping table");
                return TableReport::new(
                    table.clone(),
                    TableOutcome::SkippedError { error: e.to_string() },
                );
            }
        };

        let dropped = data.retain_columns(&known);
        if !dropped.is_empty() {
            warn!(%table, ?dropped, "columns unknown to the destination were dropped");
        }
        // Carried ancestor columns alone never make a level worth writing
        if !data.has_own_columns() {
            return TableReport::new(
                table.clone(),
                TableOutcome::SkippedEmpty { reason: EmptyReason::NoColumns },
            )
            .with_dropped(dropped);
        }

        let outcome = match self.write(&data, table) {
            Ok(WriteResult::Written { rows }) => {
                info!(%table, rows, "table written");
                TableOutcome::Written {
                    rows,
                    columns: data.columns().to_vec(),
                }
            }
            Ok(WriteResult::Skipped) => TableOutcome::SkippedEmpty { reason: EmptyReason::NoColumns },
            Err(e) => {
                error!(%table, error = %e, "skipping table");
                TableOutcome::SkippedError { error: e.to_string() }
            }
        };

        TableReport::new(table.clone(), outcome).with_dropped(dropped)
    }
}
