//! Record schema trees
//!
//! A schema tree describes the shape of one row set at one nesting level: an
//! ordered list of fields, each either a scalar, a struct with its own tree, or an
//! array of some element kind. Trees are inferred from the rows themselves (see
//! [`SchemaBuilder`]) and never outlive the level they were built for.

pub mod builder;

pub use builder::{infer_schema, SchemaBuilder};

use std::fmt;

/// Shape of a single field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar,
    Struct(SchemaTree),
    Array(Box<FieldKind>),
}

impl FieldKind {
    /// Number of array layers wrapping the innermost element
    pub fn array_depth(&self) -> usize {
        match self {
            FieldKind::Array(element) => 1 + element.array_depth(),
            _ => 0,
        }
    }

    /// The kind left once every array layer is stripped
    pub fn innermost(&self) -> &FieldKind {
        match self {
            FieldKind::Array(element) => element.innermost(),
            other => other,
        }
    }

    fn type_name(&self) -> String {
        match self {
            FieldKind::Scalar => "scalar".to_string(),
            FieldKind::Struct(_) => "struct".to_string(),
            FieldKind::Array(element) => format!("array<{}>", element.type_name()),
        }
    }
}

/// Ordered (field name, field kind) pairs of one level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaTree {
    fields: Vec<(String, FieldKind)>,
}

impl SchemaTree {
    pub fn new(fields: Vec<(String, FieldKind)>) -> Self {
        SchemaTree { fields }
    }

    pub fn fields(&self) -> &[(String, FieldKind)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldKind> {
        self.fields
            .iter()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, kind)| kind)
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Deepest chain of struct layers below this level (arrays are transparent)
    pub fn struct_depth(&self) -> usize {
        self.fields
            .iter()
            .map(|(_, kind)| match kind.innermost() {
                FieldKind::Struct(child) => 1 + child.struct_depth(),
                _ => 0,
            })
            .max()
            .unwrap_or(0)
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        for (name, kind) in &self.fields {
            writeln!(f, "{} |-- {}: {}", " |   ".repeat(indent), name, kind.type_name())?;
            if let FieldKind::Struct(child) = kind.innermost() {
                child.write_tree(f, indent + 1)?;
            }
        }
        Ok(())
    }
}

/// Tree rendering in the usual `printSchema` layout
impl fmt::Display for SchemaTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "root")?;
        self.write_tree(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> FieldKind {
        FieldKind::Struct(SchemaTree::new(vec![
            ("city".into(), FieldKind::Scalar),
            ("zip".into(), FieldKind::Scalar),
        ]))
    }

    #[test]
    fn test_array_depth_and_innermost() {
        let nested = FieldKind::Array(Box::new(FieldKind::Array(Box::new(addr()))));
        assert_eq!(nested.array_depth(), 2);
        assert_eq!(nested.innermost(), &addr());
        assert_eq!(FieldKind::Scalar.array_depth(), 0);
    }

    #[test]
    fn test_struct_depth_sees_through_arrays() {
        let tree = SchemaTree::new(vec![
            ("id".into(), FieldKind::Scalar),
            ("addrs".into(), FieldKind::Array(Box::new(addr()))),
        ]);
        assert_eq!(tree.struct_depth(), 1);
    }

    #[test]
    fn test_display_layout() {
        let tree = SchemaTree::new(vec![
            ("id".into(), FieldKind::Scalar),
            ("tags".into(), FieldKind::Array(Box::new(FieldKind::Scalar))),
            ("addr".into(), addr()),
        ]);

        let expected = "root\n |-- id: scalar\n |-- tags: array<scalar>\n |-- addr: struct\n |    |-- city: scalar\n |    |-- zip: scalar\n";
        assert_eq!(tree.to_string(), expected);
    }
}
