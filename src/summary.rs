//! Per-table outcome reporting for a load pass

use crate::types::TableIdentity;
use serde::Serialize;
use std::fmt;

/// Why a table was skipped without touching the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyReason {
    /// The level produced no rows
    NoRows,
    /// The level had no flat columns, or none the destination recognises
    NoColumns,
}

/// What happened to one destination table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum TableOutcome {
    Written { rows: usize, columns: Vec<String> },
    SkippedEmpty { reason: EmptyReason },
    SkippedError { error: String },
}

impl TableOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, TableOutcome::Written { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TableOutcome::SkippedError { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub table: TableIdentity,
    pub outcome: TableOutcome,
    /// Source columns the destination table does not define
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped_columns: Vec<String>,
}

impl TableReport {
    pub fn new(table: TableIdentity, outcome: TableOutcome) -> Self {
        TableReport {
            table,
            outcome,
            dropped_columns: Vec::new(),
        }
    }

    pub fn with_dropped(mut self, dropped_columns: Vec<String>) -> Self {
        self.dropped_columns = dropped_columns;
        self
    }
}

/// Reports for every table touched by a pass, in the order they were visited
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadSummary {
    pub tables: Vec<TableReport>,
}

impl LoadSummary {
    pub fn push(&mut self, report: TableReport) {
        self.tables.push(report);
    }

    /// First report for a table name (any schema)
    pub fn report_for(&self, table: &str) -> Option<&TableReport> {
        self.tables.iter().find(|r| r.table.table == table)
    }

    pub fn written(&self) -> impl Iterator<Item = &TableReport> {
        self.tables.iter().filter(|r| r.outcome.is_written())
    }

    pub fn has_errors(&self) -> bool {
        self.tables.iter().any(|r| r.outcome.is_error())
    }
}

impl fmt::Display for TableOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableOutcome::Written { rows, columns } => {
                write!(f, "written ({} rows; {})", rows, columns.join(", "))
            }
            TableOutcome::SkippedEmpty { reason: EmptyReason::NoRows } => {
                write!(f, "skipped-empty (no rows)")
            }
            TableOutcome::SkippedEmpty { reason: EmptyReason::NoColumns } => {
                write!(f, "skipped-empty (no columns)")
            }
            TableOutcome::SkippedError { error } => write!(f, "skipped-error: {}", error),
        }
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .tables
            .iter()
            .map(|r| r.table.to_string().len())
            .max()
            .unwrap_or(0);

        for report in &self.tables {
            write!(f, "{:<width$}  {}", report.table.to_string(), report.outcome, width = width)?;
            if !report.dropped_columns.is_empty() {
                write!(f, " [dropped: {}]", report.dropped_columns.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> LoadSummary {
        let mut summary = LoadSummary::default();
        summary.push(
            TableReport::new(
                TableIdentity::new("dbo", "Entity"),
                TableOutcome::Written {
                    rows: 1,
                    columns: vec!["id".into(), "name".into()],
                },
            )
            .with_dropped(vec!["extra_field".into()]),
        );
        summary.push(TableReport::new(
            TableIdentity::new("dbo", "addr"),
            TableOutcome::SkippedError {
                error: "rejected".into(),
            },
        ));
        summary
    }

    #[test]
    fn test_summary_queries() {
        let summary = sample();
        assert!(summary.has_errors());
        assert_eq!(summary.written().count(), 1);
        assert!(summary.report_for("addr").unwrap().outcome.is_error());
        assert!(summary.report_for("missing").is_none());
    }

    #[test]
    fn test_summary_text() {
        let text = sample().to_string();
        assert_eq!(
            text,
            "dbo.Entity  written (1 rows; id, name) [dropped: extra_field]\n\
             dbo.addr    skipped-error: rejected\n"
        );
    }

    #[test]
    fn test_summary_json() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            value["tables"][0],
            json!({
                "table": "dbo.Entity",
                "outcome": {"status": "written", "rows": 1, "columns": ["id", "name"]},
                "dropped_columns": ["extra_field"]
            })
        );
        assert_eq!(value["tables"][1]["outcome"]["status"], "skipped-error");
        assert!(value["tables"][1].get("dropped_columns").is_none());
    }
}
