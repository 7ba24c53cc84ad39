//! Streaming schema inference with the accumulator pattern
//!
//! Instead of inferring a tree per row and merging trees, a builder accumulates what
//! it has seen across every row and produces the final [`SchemaTree`] once at the end.
//!
//! Merge rules:
//! - `null` and missing values contribute nothing; a field only ever null is a scalar
//! - objects merge into one struct holding the union of their fields (first-seen order)
//! - arrays merge their elements; an array never seen with elements has scalar elements
//! - any other mix of shapes (object here, string there) collapses to a scalar

use super::{FieldKind, SchemaTree};
use crate::types::Record;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Shape identifier for JSON values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum JsonShape {
    Null,
    Scalar,
    Array,
    Object,
}

impl JsonShape {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => JsonShape::Null,
            Value::Array(_) => JsonShape::Array,
            Value::Object(_) => JsonShape::Object,
            _ => JsonShape::Scalar,
        }
    }
}

/// Builder for accumulating the elements of every array seen for a field
#[derive(Debug)]
struct ArrayBuilder {
    items_builder: Box<SchemaBuilder>,
}

impl ArrayBuilder {
    fn new() -> Self {
        ArrayBuilder {
            items_builder: Box::new(SchemaBuilder::new()),
        }
    }

    fn add_array(&mut self, arr: &[Value]) {
        for item in arr {
            self.items_builder.add_value(item);
        }
    }

    fn build(self) -> FieldKind {
        FieldKind::Array(Box::new(self.items_builder.build()))
    }
}

/// Builder for accumulating the fields of every object seen for a field
#[derive(Debug, Default)]
struct ObjectBuilder {
    // Properties in first-seen order, with a name index for lookups
    properties: Vec<(String, SchemaBuilder)>,
    positions: HashMap<String, usize>,
}

impl ObjectBuilder {
    fn add_object(&mut self, obj: &Map<String, Value>) {
        for (key, value) in obj.iter() {
            let idx = match self.positions.get(key) {
                Some(idx) => *idx,
                None => {
                    self.properties.push((key.clone(), SchemaBuilder::new()));
                    self.positions.insert(key.clone(), self.properties.len() - 1);
                    self.properties.len() - 1
                }
            };
            self.properties[idx].1.add_value(value);
        }
    }

    fn build(self) -> SchemaTree {
        SchemaTree::new(
            self.properties
                .into_iter()
                .map(|(name, builder)| (name, builder.build()))
                .collect(),
        )
    }
}

/// Accumulates the shapes seen for one value position
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    // Every shape seen
    shapes: HashSet<JsonShape>,
    // Shape-specific builders
    array_builder: Option<ArrayBuilder>,
    object_builder: Option<ObjectBuilder>,
}

impl SchemaBuilder {
    /// Create a new empty schema builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value to the builder, recording its shape
    pub fn add_value(&mut self, value: &Value) {
        self.shapes.insert(JsonShape::from_value(value));

        match value {
            Value::Array(arr) => {
                let builder = self.array_builder.get_or_insert_with(ArrayBuilder::new);
                builder.add_array(arr);
            }
            Value::Object(obj) => {
                let builder = self.object_builder.get_or_insert_with(ObjectBuilder::default);
                builder.add_object(obj);
            }
            _ => {}
        }
    }

    /// Add a whole record (a top-level row)
    pub fn add_record(&mut self, record: &Record) {
        self.shapes.insert(JsonShape::Object);
        self.object_builder
            .get_or_insert_with(ObjectBuilder::default)
            .add_object(record);
    }

    /// Build the field kind from the shapes seen
    pub fn build(self) -> FieldKind {
        let mut shapes = self
            .shapes
            .iter()
            .copied()
            .filter(|shape| *shape != JsonShape::Null);

        match (shapes.next(), shapes.next()) {
            (Some(JsonShape::Object), None) => match self.object_builder {
                Some(builder) => FieldKind::Struct(builder.build()),
                None => FieldKind::Scalar,
            },
            (Some(JsonShape::Array), None) => match self.array_builder {
                Some(builder) => builder.build(),
                None => FieldKind::Scalar,
            },
            // Only nulls, plain scalars, or conflicting shapes
            _ => FieldKind::Scalar,
        }
    }

    /// Build the schema tree of a row set fed through [`SchemaBuilder::add_record`]
    pub fn build_tree(self) -> SchemaTree {
        self.object_builder
            .map(ObjectBuilder::build)
            .unwrap_or_default()
    }
}

/// Infer the schema tree of a batch of records
pub fn infer_schema<'a, I>(records: I) -> SchemaTree
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut builder = SchemaBuilder::new();
    for record in records {
        builder.add_record(record);
    }
    builder.build_tree()
}
