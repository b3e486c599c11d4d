//! SQL dialect differences between the supported databases

use crate::schema::{ColumnDescriptor, GenericType, QualifiedName};
use std::fmt;

/// Supported database dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// Pick the dialect from a connection URL scheme
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "sqlite" => Some(Dialect::Sqlite),
            _ => None,
        }
    }

    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Quoted `schema.table`
    ///
    /// The catalog is not part of the reference: PostgreSQL cannot address
    /// another database in a statement, MySQL calls its schemas databases and
    /// SQLite has neither.
    pub fn qualify(&self, name: &QualifiedName) -> String {
        match &name.schema {
            Some(schema) => format!("{}.{}", self.quote_ident(schema), self.quote_ident(&name.table)),
            None => self.quote_ident(&name.table),
        }
    }

    /// The n-th (1-based) positional bind marker
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Maximum bind parameters in one statement
    pub fn max_bind_params(&self) -> usize {
        match self {
            Dialect::Postgres | Dialect::MySql => 65_535,
            Dialect::Sqlite => 999,
        }
    }

    /// Native column type for a generic type, `None` when it has no mapping
    pub fn native_type(&self, generic: &GenericType) -> Option<String> {
        let native = match (self, generic) {
            (_, GenericType::Other(_)) => return None,

            (Dialect::MySql, GenericType::Integer) => "INT".to_string(),
            (_, GenericType::Integer) => "INTEGER".to_string(),
            (_, GenericType::BigInt) => "BIGINT".to_string(),

            (Dialect::Postgres, GenericType::Decimal { precision: Some(p), scale }) => {
                format!("NUMERIC({},{})", p, scale)
            }
            (Dialect::Postgres, GenericType::Decimal { precision: None, .. }) => "NUMERIC".to_string(),
            (Dialect::MySql, GenericType::Decimal { precision: None, .. }) => "DECIMAL(65,30)".to_string(),
            (_, GenericType::Decimal { precision: Some(p), scale }) => format!("DECIMAL({},{})", p, scale),
            (_, GenericType::Decimal { precision: None, .. }) => "DECIMAL".to_string(),

            // VARCHAR(16383) is the widest utf8mb4 column MySQL allows
            (Dialect::MySql, GenericType::Varchar { length }) if *length > 16_383 => "LONGTEXT".to_string(),
            (_, GenericType::Varchar { length }) => format!("VARCHAR({})", length),

            (Dialect::MySql, GenericType::Text) => "LONGTEXT".to_string(),
            (_, GenericType::Text) => "TEXT".to_string(),
            (_, GenericType::Date) => "DATE".to_string(),
            (Dialect::Postgres, GenericType::DateTime) => "TIMESTAMP".to_string(),
            (_, GenericType::DateTime) => "DATETIME".to_string(),
            (Dialect::MySql, GenericType::Boolean) => "TINYINT(1)".to_string(),
            (_, GenericType::Boolean) => "BOOLEAN".to_string(),
            (Dialect::Postgres, GenericType::Binary) => "BYTEA".to_string(),
            (Dialect::MySql, GenericType::Binary) => "LONGBLOB".to_string(),
            (Dialect::Sqlite, GenericType::Binary) => "BLOB".to_string(),
            (Dialect::Postgres, GenericType::Double) => "DOUBLE PRECISION".to_string(),
            (Dialect::MySql, GenericType::Double) => "DOUBLE".to_string(),
            (Dialect::Sqlite, GenericType::Double) => "REAL".to_string(),
        };
        Some(native)
    }

    /// Select-list expression reading a column in a shape the driver-neutral
    /// row type can decode
    ///
    /// Exact numerics and temporal values travel as text; the destination
    /// column converts them back on insert.
    pub fn select_expr(&self, column: &ColumnDescriptor) -> String {
        let ident = self.quote_ident(&column.name);
        let cast = match (self, &column.data_type) {
            (
                Dialect::Postgres,
                GenericType::Decimal { .. } | GenericType::Date | GenericType::DateTime,
            ) => Some("TEXT"),
            (
                Dialect::MySql,
                GenericType::Decimal { .. }
                | GenericType::Date
                | GenericType::DateTime
                | GenericType::Varchar { .. }
                | GenericType::Text,
            ) => Some("CHAR"),
            (Dialect::MySql, GenericType::Integer | GenericType::BigInt | GenericType::Boolean) => {
                Some("SIGNED")
            }
            (
                Dialect::Sqlite,
                GenericType::Decimal { .. } | GenericType::Date | GenericType::DateTime,
            ) => Some("TEXT"),
            (Dialect::Sqlite, GenericType::Boolean) => Some("INTEGER"),
            _ => None,
        };
        match cast {
            Some(target) => format!("CAST({} AS {}) AS {}", ident, target, ident),
            None => ident,
        }
    }

    /// Bind marker for a value written into `column`
    ///
    /// PostgreSQL types every parameter, NULLs included, and does not assign
    /// text parameters to numeric or temporal columns, so markers carry an
    /// unconstrained cast there. Length and precision checks stay with the
    /// column assignment.
    pub fn insert_placeholder(&self, n: usize, column: Option<&ColumnDescriptor>) -> String {
        let marker = self.placeholder(n);
        if *self != Dialect::Postgres {
            return marker;
        }
        let cast = column.and_then(|c| match &c.data_type {
            GenericType::Integer => Some("INTEGER"),
            GenericType::BigInt => Some("BIGINT"),
            GenericType::Decimal { .. } => Some("NUMERIC"),
            GenericType::Varchar { .. } | GenericType::Text => Some("TEXT"),
            GenericType::Date => Some("DATE"),
            GenericType::DateTime => Some("TIMESTAMP"),
            GenericType::Boolean => Some("BOOLEAN"),
            GenericType::Binary => Some("BYTEA"),
            GenericType::Double => Some("DOUBLE PRECISION"),
            GenericType::Other(_) => None,
        });
        match cast {
            Some(target) => format!("CAST({} AS {})", marker, target),
            None => marker,
        }
    }

    /// Multi-row INSERT for `rows` rows of `columns`
    ///
    /// `described` supplies destination column metadata for write-side casts.
    pub fn insert_sql(
        &self,
        table: &QualifiedName,
        columns: &[String],
        described: &[Option<&ColumnDescriptor>],
        rows: usize,
    ) -> String {
        let column_list = columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut n = 0;
        let tuples = (0..rows)
            .map(|_| {
                let markers = described
                    .iter()
                    .map(|column| {
                        n += 1;
                        self.insert_placeholder(n, *column)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", markers)
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.qualify(table),
            column_list,
            tuples
        )
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::MySql => write!(f, "mysql"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}
