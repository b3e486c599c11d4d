//! Database-agnostic table metadata used for type mapping and DDL generation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dialect-neutral column type category
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenericType {
    Integer,
    BigInt,
    /// Exact numeric; `precision: None` is an unconstrained numeric
    Decimal {
        precision: Option<u32>,
        scale: u32,
    },
    Varchar {
        length: u32,
    },
    /// Unbounded character data (TEXT, CLOB)
    Text,
    Date,
    DateTime,
    Boolean,
    Binary,
    Double,
    /// A native type with no generic category; carries the native name
    Other(String),
}

impl GenericType {
    pub fn is_supported(&self) -> bool {
        !matches!(self, GenericType::Other(_))
    }
}

impl fmt::Display for GenericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenericType::Integer => write!(f, "INTEGER"),
            GenericType::BigInt => write!(f, "BIGINT"),
            GenericType::Decimal {
                precision: Some(p),
                scale,
            } => write!(f, "DECIMAL({},{})", p, scale),
            GenericType::Decimal { precision: None, .. } => write!(f, "DECIMAL"),
            GenericType::Varchar { length } => write!(f, "VARCHAR({})", length),
            GenericType::Text => write!(f, "TEXT"),
            GenericType::Date => write!(f, "DATE"),
            GenericType::DateTime => write!(f, "DATETIME"),
            GenericType::Boolean => write!(f, "BOOLEAN"),
            GenericType::Binary => write!(f, "BINARY"),
            GenericType::Double => write!(f, "DOUBLE"),
            GenericType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Catalog, schema and table name of a table
///
/// Ordering is catalog, then schema, then table, which is the order
/// replication snapshots are processed and reported in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub table: String,
}

impl QualifiedName {
    pub fn new(catalog: Option<String>, schema: Option<String>, table: impl Into<String>) -> Self {
        Self {
            catalog,
            schema,
            table: table.into(),
        }
    }

    /// An unqualified table name
    pub fn table(table: impl Into<String>) -> Self {
        Self::new(None, None, table)
    }

    /// Same table name under another catalog and schema
    pub fn relocate(&self, catalog: Option<String>, schema: Option<String>) -> Self {
        Self::new(catalog, schema, self.table.clone())
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in [&self.catalog, &self.schema].into_iter().flatten() {
            write!(f, "{}.", part)?;
        }
        write!(f, "{}", self.table)
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: GenericType,
    /// Type name as the owning database spells it
    pub native_type: String,
    pub nullable: bool,
    /// 1-based position in the table
    pub ordinal: u32,
}

/// Table metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: QualifiedName,
    pub columns: Vec<ColumnDescriptor>,
    /// Primary key column names in key order
    pub primary_key: Vec<String>,
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}
