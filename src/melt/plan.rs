//! Per-level extraction plans
//!
//! Every decision about what a field becomes at one level (flat column, exploded
//! column, struct descent) is made here by [`classify`], once per field, before
//! any rows are touched.

use crate::schema::{FieldKind, SchemaTree};
use crate::types::MeltConfig;
use tracing::warn;

/// Extraction rule for a specific field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRule {
    /// Keep as a flat column under `column`
    Scalar { column: String },
    /// Explode `depth` array layers; each element becomes a flat column value
    ExplodeScalar { column: String, depth: usize },
    /// Descend into the struct's fields with lineage `prefix`
    NestedStruct { prefix: String },
    /// Explode `depth` array layers and descend into the element structs
    ArrayOfStructs { prefix: String, depth: usize },
}

impl FieldRule {
    pub fn is_descent(&self) -> bool {
        matches!(
            self,
            FieldRule::NestedStruct { .. } | FieldRule::ArrayOfStructs { .. }
        )
    }
}

/// A field of the current level paired with its rule
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPlan {
    /// Local field name in the current row set
    pub name: String,
    pub rule: FieldRule,
}

/// Decide what a field becomes at this level
pub fn classify(name: &str, kind: &FieldKind, prefix: &str, config: &MeltConfig) -> FieldRule {
    let new_name = config.lineage(prefix, name);

    if config.is_scalar_field(name) {
        return FieldRule::Scalar { column: new_name };
    }

    match kind {
        FieldKind::Scalar => FieldRule::Scalar { column: new_name },
        FieldKind::Struct(_) => FieldRule::NestedStruct { prefix: new_name },
        // An exploded element is re-classified: struct elements are descended into,
        // anything else lands in this level's projection
        FieldKind::Array(_) => match kind.innermost() {
            FieldKind::Struct(_) => FieldRule::ArrayOfStructs {
                prefix: new_name,
                depth: kind.array_depth(),
            },
            _ => FieldRule::ExplodeScalar {
                column: new_name,
                depth: kind.array_depth(),
            },
        },
    }
}

/// Pre-computed extraction plan for one level
#[derive(Debug, Clone, PartialEq)]
pub struct LevelPlan {
    /// Lineage prefix of this level (empty at the top)
    pub prefix: String,
    pub fields: Vec<FieldPlan>,
}

impl LevelPlan {
    pub fn from_schema(schema: &SchemaTree, prefix: &str, config: &MeltConfig) -> Self {
        let fields = schema
            .fields()
            .iter()
            .map(|(name, kind)| FieldPlan {
                name: name.clone(),
                rule: classify(name, kind, prefix, config),
            })
            .collect();

        LevelPlan {
            prefix: prefix.to_string(),
            fields,
        }
    }

    /// Fields projected into this level's flat table, in schema order
    pub fn flat_fields(&self) -> impl Iterator<Item = &FieldPlan> {
        self.fields.iter().filter(|f| !f.rule.is_descent())
    }

    /// Fields that start a recursive descent, in schema order
    pub fn descents(&self) -> impl Iterator<Item = &FieldPlan> {
        self.fields.iter().filter(|f| f.rule.is_descent())
    }

    /// Output column names of the flat projection, including position columns
    pub fn flat_columns(&self, config: &MeltConfig) -> Vec<String> {
        let mut columns = Vec::new();
        for field in self.flat_fields() {
            match &field.rule {
                FieldRule::Scalar { column } => columns.push(column.clone()),
                FieldRule::ExplodeScalar { column, .. } => {
                    columns.push(column.clone());
                    match self.index_column(column, config) {
                        Some(index) => columns.push(index),
                        None if config.array_index.is_some() => {
                            warn!(
                                column,
                                "position column omitted, its name is taken by a source field"
                            );
                        }
                        None => {}
                    }
                }
                FieldRule::NestedStruct { .. } | FieldRule::ArrayOfStructs { .. } => {}
            }
        }
        columns
    }

    /// Position column for exploded `column`, unless position columns are off or a
    /// field of this level already projects to that name
    pub fn index_column(&self, column: &str, config: &MeltConfig) -> Option<String> {
        let suffix = config.array_index.as_ref()?;
        let name = config.lineage(column, suffix);
        let taken = self.flat_fields().any(|field| match &field.rule {
            FieldRule::Scalar { column: existing }
            | FieldRule::ExplodeScalar { column: existing, .. } => *existing == name,
            FieldRule::NestedStruct { .. } | FieldRule::ArrayOfStructs { .. } => false,
        });
        (!taken).then_some(name)
    }

    /// Destination table for this level: the lineage prefix, or the configured
    /// fallback name at the top level
    pub fn table_name<'a>(&'a self, config: &'a MeltConfig) -> &'a str {
        if self.prefix.is_empty() {
            &config.fallback_table
        } else {
            &self.prefix
        }
    }
}
