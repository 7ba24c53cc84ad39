use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// One nested record: a JSON object at some level of the document
pub type Record = Map<String, Value>;

/// A row of a nested row set.
///
/// `carried` holds ancestor columns propagated into this level (see
/// [`MeltConfig::carry_columns`]). They are already flat and already named, so
/// they bypass schema inference and lineage prefixing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub fields: Record,
    pub carried: Record,
}

impl Row {
    pub fn new(fields: Record) -> Self {
        Row {
            fields,
            carried: Record::new(),
        }
    }

    pub fn with_carried(mut self, carried: Record) -> Self {
        self.carried = carried;
        self
    }
}

/// Rows sharing one schema tree at a single nesting level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    rows: Vec<Row>,
}

impl RowSet {
    pub fn new(rows: Vec<Row>) -> Self {
        RowSet { rows }
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        RowSet {
            rows: records.into_iter().map(Row::new).collect(),
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.rows.iter().map(|row| &row.fields)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Names of the carried columns, in first-seen order
    pub fn carried_columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for row in &self.rows {
            for key in row.carried.keys() {
                if seen.insert(key.as_str()) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }
}

/// A flat table: ordered column names and one value per column in every row.
///
/// The first `carried` columns are ancestor columns handed down to this level; the
/// rest are the level's own.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlatTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    #[serde(skip)]
    carried: usize,
}

impl FlatTable {
    pub fn new(columns: Vec<String>) -> Self {
        FlatTable {
            columns,
            rows: Vec::new(),
            carried: 0,
        }
    }

    /// Mark the first `count` columns as carried from an ancestor level
    pub fn with_carried_columns(mut self, count: usize) -> Self {
        self.carried = count.min(self.columns.len());
        self
    }

    pub fn carried_count(&self) -> usize {
        self.carried
    }

    /// True when at least one column belongs to this level rather than an ancestor
    pub fn has_own_columns(&self) -> bool {
        self.columns.len() > self.carried
    }

    /// Project `records` onto `columns`; fields a record lacks become null
    pub fn from_records<'a, I>(columns: Vec<String>, records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let rows = records
            .into_iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        FlatTable {
            columns,
            rows,
            carried: 0,
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len(), "row width must match columns");
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when there is nothing to write: no rows or no columns
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, top to bottom
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Keep only the columns present in `known`, preserving this table's column
    /// order. Returns the names that were dropped.
    pub fn retain_columns(&mut self, known: &[String]) -> Vec<String> {
        let known: HashSet<&str> = known.iter().map(String::as_str).collect();
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|c| known.contains(c.as_str()))
            .collect();

        if keep.iter().all(|k| *k) {
            return Vec::new();
        }

        let mut dropped = Vec::new();
        let mut columns = Vec::new();
        for (column, kept) in self.columns.drain(..).zip(&keep) {
            if *kept {
                columns.push(column);
            } else {
                dropped.push(column);
            }
        }
        self.columns = columns;
        self.carried = keep[..self.carried].iter().filter(|k| **k).count();

        for row in &mut self.rows {
            let mut flags = keep.iter();
            row.retain(|_| *flags.next().unwrap_or(&false));
        }

        dropped
    }
}

/// Destination table address: `schema.table`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentity {
    pub schema: String,
    pub table: String,
}

impl TableIdentity {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        TableIdentity {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

impl Serialize for TableIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Configuration for the flattening process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeltConfig {
    /// Separator joining lineage segments, for both column and table names
    pub separator: String,

    /// Table name used by the flattener for the document's top level
    pub fallback_table: String,

    /// When set, every explode also emits a 0-based position column named
    /// `<column><separator><suffix>`
    pub array_index: Option<String>,

    /// Fields to always treat as scalar values (never exploded or descended into)
    pub scalar_fields: Vec<String>,

    /// Output column names whose values are copied into every descendant level
    pub carry_columns: Vec<String>,
}

impl Default for MeltConfig {
    fn default() -> Self {
        MeltConfig {
            separator: String::from("_"),
            fallback_table: String::from("root"),
            array_index: None,
            scalar_fields: vec![],
            carry_columns: vec![],
        }
    }
}

impl MeltConfig {
    /// Lineage name of `name` under `prefix`; the top level has no prefix
    pub fn lineage(&self, prefix: &str, name: &str) -> String {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}{}{}", prefix, self.separator, name)
        }
    }

    /// Check if a field should always be treated as scalar
    pub fn is_scalar_field(&self, field_name: &str) -> bool {
        self.scalar_fields.iter().any(|f| f == field_name)
    }

    pub fn is_carried(&self, column: &str) -> bool {
        self.carry_columns.iter().any(|c| c == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_lineage() {
        let config = MeltConfig::default();
        assert_eq!(config.lineage("", "id"), "id");
        assert_eq!(config.lineage("addr", "city"), "addr_city");

        let dotted = MeltConfig {
            separator: ".".to_string(),
            ..MeltConfig::default()
        };
        assert_eq!(dotted.lineage("addr", "city"), "addr.city");
    }

    #[test]
    fn test_from_records_fills_missing_with_null() {
        let records = vec![
            record(json!({"id": 1, "name": "a"})),
            record(json!({"id": 2})),
        ];
        let table = FlatTable::from_records(vec!["id".into(), "name".into()], &records);

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[1], vec![json!(2), Value::Null]);
    }

    #[test]
    fn test_retain_columns_keeps_order_and_reports_dropped() {
        let mut table = FlatTable::new(vec!["id".into(), "extra".into(), "name".into()]);
        table.push_row(vec![json!(1), json!("x"), json!("a")]);

        let dropped = table.retain_columns(&["name".to_string(), "id".to_string()]);

        assert_eq!(dropped, vec!["extra".to_string()]);
        assert_eq!(table.columns(), &["id".to_string(), "name".to_string()]);
        assert_eq!(table.rows()[0], vec![json!(1), json!("a")]);
    }

    #[test]
    fn test_retain_columns_tracks_carried_columns() {
        let mut table =
            FlatTable::new(vec!["id".into(), "addr_city".into()]).with_carried_columns(1);
        table.push_row(vec![json!(1), json!("NYC")]);
        assert!(table.has_own_columns());

        let dropped = table.retain_columns(&["id".to_string(), "other".to_string()]);

        assert_eq!(dropped, vec!["addr_city".to_string()]);
        assert_eq!(table.carried_count(), 1);
        assert!(!table.has_own_columns());
    }

    #[test]
    fn test_retain_all_dropped_leaves_empty_table() {
        let mut table = FlatTable::new(vec!["extra".into()]);
        table.push_row(vec![json!(1)]);

        let dropped = table.retain_columns(&[]);

        assert_eq!(dropped.len(), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_carried_columns_first_seen_order() {
        let mut carried = Record::new();
        carried.insert("id".into(), json!(1));
        let rows = RowSet::new(vec![
            Row::new(Record::new()).with_carried(carried.clone()),
            Row::new(Record::new()).with_carried(carried),
        ]);
        assert_eq!(rows.carried_columns(), vec!["id".to_string()]);
    }

    #[test]
    fn test_table_identity_display() {
        let table = TableIdentity::new("dbo", "Entity");
        assert_eq!(table.to_string(), "dbo.Entity");
        assert_eq!(serde_json::to_value(&table).unwrap(), json!("dbo.Entity"));
    }
}
