//! Schema metadata types: the arena-backed `SchemaSnapshot` and its members.
//!
//! Cross-references inside a snapshot (table -> columns, column -> foreign
//! key target) are indices into the snapshot's own flat arrays, never
//! back-pointers. This sidesteps both serialization cycles and lifetime
//! entanglement for what is, in the source system, a genuinely cyclic
//! object graph (table <-> column <-> relationship).

use crate::ids::ColumnRef;
use serde::{Deserialize, Serialize};

/// Index of a table within a `SchemaSnapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId(pub u32);

/// Index of a column within a `SchemaSnapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnId(pub u32);

/// Broad type bucket a driver-specific SQL type is mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeCategory {
    String,
    Numeric,
    Datetime,
    Binary,
    Boolean,
}

/// Whether a `TableDescriptor` is a base table or a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableKind {
    Table,
    View,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub id: ColumnId,
    pub table_id: TableId,
    pub column_ref: ColumnRef,
    pub type_category: TypeCategory,
    /// Driver-reported type name, e.g. "varchar", "numeric(10,2)".
    pub native_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub size: Option<u32>,
    pub scale: Option<u32>,
    pub comment: Option<String>,
    pub is_foreign_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub from_column: ColumnId,
    pub to_column: ColumnId,
    pub constraint_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub id: TableId,
    pub schema: String,
    pub name: String,
    pub kind: TableKind,
    /// Columns belonging to this table, in driver-reported ordinal order.
    pub columns: Vec<ColumnId>,
    /// Relationships where this table is the referencing side.
    pub outbound: Vec<usize>,
    /// Relationships where this table is the referenced side.
    pub inbound: Vec<usize>,
}

/// Flat arena holding every table, column, and relationship discovered for
/// one catalog/schema pair. Invariant: every `Relationship` in
/// `relationships` names a `from_column`/`to_column` present in `columns`;
/// references that cannot be resolved during extraction are dropped (and
/// logged), never left dangling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub catalog: String,
    pub schema: String,
    pub tables: Vec<TableDescriptor>,
    pub columns: Vec<ColumnDescriptor>,
    pub relationships: Vec<Relationship>,
}

impl SchemaSnapshot {
    pub fn new(catalog: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
            tables: Vec::new(),
            columns: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn table(&self, id: TableId) -> &TableDescriptor {
        &self.tables[id.0 as usize]
    }

    pub fn column(&self, id: ColumnId) -> &ColumnDescriptor {
        &self.columns[id.0 as usize]
    }

    /// All column descriptors, in arena order.
    pub fn all_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter()
    }

    /// Total column count across every table in the snapshot.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}
