use crate::destination::{Destination, DestinationConnection};
use crate::error::{MeltError, Result};
use tracing::debug;

/// Looks up the columns a destination table currently defines.
///
/// Every lookup opens its own connection and releases it before returning. Answers
/// are never cached, so each call reflects the destination as it is right now.
pub struct SchemaCatalog<'a, D: Destination> {
    destination: &'a D,
    schema: &'a str,
}

impl<'a, D: Destination> SchemaCatalog<'a, D> {
    pub fn new(destination: &'a D, schema: &'a str) -> Self {
        SchemaCatalog { destination, schema }
    }

    /// Column names of `table` within this catalog's schema. A table the
    /// destination does not know yields an empty list.
    pub fn columns_of(&self, table: &str) -> Result<Vec<String>> {
        let mut conn = self
            .destination
            .connect()
            .map_err(|source| MeltError::CatalogUnavailable {
                table: table.to_string(),
                source,
            })?;

        let columns = conn
            .table_columns(self.schema, table)
            .map_err(|source| MeltError::CatalogQuery {
                table: table.to_string(),
                source,
            })?;

        debug!(schema = self.schema, table, ?columns, "catalog lookup");
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::MemoryDestination;

    #[test]
    fn test_columns_of_known_table() {
        let dest = MemoryDestination::new().with_table("dbo", "Entity", &["id", "name"]);
        let catalog = SchemaCatalog::new(&dest, "dbo");

        assert_eq!(catalog.columns_of("Entity").unwrap(), vec!["id", "name"]);
        assert!(catalog.columns_of("Other").unwrap().is_empty());
    }

    #[test]
    fn test_lookups_are_not_cached() {
        let dest = MemoryDestination::new();
        let catalog = SchemaCatalog::new(&dest, "dbo");
        assert!(catalog.columns_of("Entity").unwrap().is_empty());

        // Same catalog instance, table defined after the first lookup
        let _ = dest.clone().with_table("dbo", "Entity", &["id"]);
        assert_eq!(catalog.columns_of("Entity").unwrap(), vec!["id"]);
        assert_eq!(dest.connections_opened(), 2);
    }

    #[test]
    fn test_unavailable_destination() {
        let dest = MemoryDestination::new();
        dest.set_unavailable(true);

        let err = SchemaCatalog::new(&dest, "dbo").columns_of("Entity").unwrap_err();
        assert!(matches!(err, MeltError::CatalogUnavailable { .. }));
    }

    #[test]
    fn test_query_failure_releases_connection() {
        let dest = MemoryDestination::new().with_table("dbo", "Entity", &["id"]);
        dest.fail_catalog("Entity");

        let err = SchemaCatalog::new(&dest, "dbo").columns_of("Entity").unwrap_err();
        assert!(matches!(err, MeltError::CatalogQuery { .. }));
        assert_eq!(dest.open_connections(), 0);
    }
}
