use super::plan::{FieldRule, LevelPlan};
use super::writer::TableWriter;
use crate::destination::Destination;
use crate::schema::infer_schema;
use crate::summary::LoadSummary;
use crate::types::{FlatTable, MeltConfig, Record, Row, RowSet, TableIdentity};
use serde_json::Value;
use tracing::debug;

/// The recursive flattener: one flat table per nesting level.
///
/// Holds no state between calls beyond its configuration. Each call infers the
/// schema of the rows it is given, writes that level's flat projection, then
/// descends into every struct (and every array of structs) it found.
pub struct Flattener<'a, D: Destination> {
    config: &'a MeltConfig,
    schema_name: &'a str,
    writer: TableWriter<'a, D>,
}

impl<'a, D: Destination> Flattener<'a, D> {
    pub fn new(destination: &'a D, schema_name: &'a str, config: &'a MeltConfig) -> Self {
        Flattener {
            config,
            schema_name,
            writer: TableWriter::new(destination, schema_name),
        }
    }

    /// Flatten `rows` found at lineage `prefix`, recording one report per level.
    ///
    /// Per-table failures are contained in the summary; descents always run.
    pub fn flatten(&self, rows: &RowSet, prefix: &str, summary: &mut LoadSummary) {
        let schema = infer_schema(rows.records());
        let plan = LevelPlan::from_schema(&schema, prefix, self.config);
        let table = TableIdentity::new(self.schema_name, plan.table_name(self.config));
        debug!(%table, rows = rows.len(), fields = plan.fields.len(), "flattening level");

        let flat = project(rows, &plan, self.config);
        summary.push(self.writer.filter_and_write(flat, &table));

        for field in plan.descents() {
            match &field.rule {
                FieldRule::NestedStruct { prefix } => {
                    let nested = select_struct(rows, &field.name, &plan, self.config);
                    self.flatten(&nested, prefix, summary);
                }
                FieldRule::ArrayOfStructs { prefix, depth } => {
                    let nested = explode_structs(rows, &field.name, *depth, &plan, self.config);
                    self.flatten(&nested, prefix, summary);
                }
                FieldRule::Scalar { .. } | FieldRule::ExplodeScalar { .. } => {}
            }
        }
    }
}

/// Build the flat projection of one level.
///
/// Scalars are copied as they are; every exploded array multiplies the rows
/// produced so far by its element count for that source row. Carried ancestor
/// columns lead the table. A level without scalar or exploded columns projects
/// to a table with no columns.
pub fn project(rows: &RowSet, plan: &LevelPlan, config: &MeltConfig) -> FlatTable {
    let level_columns = plan.flat_columns(config);
    if level_columns.is_empty() {
        return FlatTable::new(Vec::new());
    }

    let carried: Vec<String> = rows
        .carried_columns()
        .into_iter()
        .filter(|c| !level_columns.contains(c))
        .collect();
    let indexed: Vec<bool> = plan
        .flat_fields()
        .map(|field| match &field.rule {
            FieldRule::ExplodeScalar { column, .. } => plan.index_column(column, config).is_some(),
            _ => false,
        })
        .collect();

    let mut columns = carried.clone();
    columns.extend(level_columns);
    let mut table = FlatTable::new(columns).with_carried_columns(carried.len());

    for row in rows.rows() {
        let mut partials: Vec<Vec<Value>> = vec![carried
            .iter()
            .map(|c| row.carried.get(c).cloned().unwrap_or(Value::Null))
            .collect()];

        for (field, with_index) in plan.flat_fields().zip(&indexed) {
            let value = row.fields.get(&field.name);
            match &field.rule {
                FieldRule::Scalar { .. } => {
                    let value = value.cloned().unwrap_or(Value::Null);
                    for partial in &mut partials {
                        partial.push(value.clone());
                    }
                }
                FieldRule::ExplodeScalar { depth, .. } => {
                    let elements = explode(value, *depth);
                    let mut next = Vec::with_capacity(partials.len() * elements.len());
                    for partial in &partials {
                        for (position, element) in elements.iter().enumerate() {
                            let mut out = partial.clone();
                            out.push(element.clone());
                            if *with_index {
                                out.push(Value::from(position));
                            }
                            next.push(out);
                        }
                    }
                    partials = next;
                }
                FieldRule::NestedStruct { .. } | FieldRule::ArrayOfStructs { .. } => {}
            }
        }

        for partial in partials {
            table.push_row(partial);
        }
    }

    table
}

/// Elements reached by unwrapping `depth` array layers. Null or missing values,
/// and empty arrays, yield nothing.
pub fn explode(value: Option<&Value>, depth: usize) -> Vec<Value> {
    let mut elements = Vec::new();
    if let Some(value) = value {
        collect_elements(value, depth, &mut elements);
    }
    elements
}

fn collect_elements(value: &Value, depth: usize, out: &mut Vec<Value>) {
    if depth == 0 {
        out.push(value.clone());
        return;
    }
    if let Value::Array(items) = value {
        for item in items {
            collect_elements(item, depth - 1, out);
        }
    }
}

/// Columns this row hands down to its descendants
fn carry(row: &Row, plan: &LevelPlan, config: &MeltConfig) -> Record {
    let mut carried = row.carried.clone();
    if config.carry_columns.is_empty() {
        return carried;
    }
    for field in plan.flat_fields() {
        if let FieldRule::Scalar { column } = &field.rule {
            if config.is_carried(column) {
                let value = row.fields.get(&field.name).cloned().unwrap_or(Value::Null);
                carried.insert(column.clone(), value);
            }
        }
    }
    carried
}

/// Promote the inner fields of struct `name` to a row set of their own, one row
/// per parent row. A null or missing struct becomes a row with no fields.
fn select_struct(rows: &RowSet, name: &str, plan: &LevelPlan, config: &MeltConfig) -> RowSet {
    RowSet::new(
        rows.rows()
            .iter()
            .map(|row| {
                let fields = match row.fields.get(name) {
                    Some(Value::Object(inner)) => inner.clone(),
                    _ => Record::new(),
                };
                Row::new(fields).with_carried(carry(row, plan, config))
            })
            .collect(),
    )
}

/// One nested row per struct element of array `name`
fn explode_structs(
    rows: &RowSet,
    name: &str,
    depth: usize,
    plan: &LevelPlan,
    config: &MeltConfig,
) -> RowSet {
    let mut nested = Vec::new();
    for row in rows.rows() {
        let carried = carry(row, plan, config);
        for (position, element) in explode(row.fields.get(name), depth).into_iter().enumerate() {
            let mut fields = Record::new();
            if let Some(suffix) = &config.array_index {
                fields.insert(suffix.clone(), Value::from(position));
            }
            if let Value::Object(inner) = element {
                fields.extend(inner);
            }
            nested.push(Row::new(fields).with_carried(carried.clone()));
        }
    }
    RowSet::new(nested)
}
