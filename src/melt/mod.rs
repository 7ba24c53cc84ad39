//! JSON melting - flatten nested records into one relational table per level
//!
//! This module walks a row set's schema tree, decides per field whether it stays a
//! column, explodes into rows, or opens a nested level, and writes each level's flat
//! projection to the destination table named after its lineage.

pub mod flattener;
pub mod plan;
pub mod writer;

pub use flattener::{explode, project, Flattener};
pub use plan::{classify, FieldPlan, FieldRule, LevelPlan};
pub use writer::{TableWriter, WriteResult};
