//! Error taxonomy shared by the pipeline, the adapters and the replication engine.

use thiserror::Error;

/// Boxed underlying cause carried by every error variant.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while resolving configuration, moving records or replicating tables.
///
/// Each variant names the business type, database or table it concerns so a
/// failure can be attributed without a backtrace.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Missing or malformed business-type configuration
    #[error("configuration error for business type '{business_type}': {message}")]
    Configuration {
        business_type: String,
        message: String,
    },

    /// Connection acquisition or network failure
    #[error("connection error for database '{database}': {source}")]
    Connection {
        database: String,
        #[source]
        source: BoxError,
    },

    /// Source open, read or malformed record
    #[error("extraction error ({context}): {source}")]
    Extraction {
        context: String,
        #[source]
        source: BoxError,
    },

    /// A transformer rejected a record
    #[error("transform error ({context}): {message}")]
    Transform { context: String, message: String },

    /// A column type has no destination mapping
    #[error("unsupported type '{type_name}' for column '{column}' of table {table}")]
    UnsupportedType {
        table: String,
        column: String,
        type_name: String,
    },

    /// Create or drop failure
    #[error("DDL error on table {table}: {source}")]
    Ddl {
        table: String,
        #[source]
        source: BoxError,
    },

    /// Write or commit failure
    #[error("load error ({context}): {source}")]
    Load {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl EtlError {
    pub fn configuration(business_type: impl Into<String>, message: impl Into<String>) -> Self {
        EtlError::Configuration {
            business_type: business_type.into(),
            message: message.into(),
        }
    }

    pub fn connection(database: impl Into<String>, source: impl Into<BoxError>) -> Self {
        EtlError::Connection {
            database: database.into(),
            source: source.into(),
        }
    }

    pub fn extraction(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        EtlError::Extraction {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn transform(context: impl Into<String>, message: impl Into<String>) -> Self {
        EtlError::Transform {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn ddl(table: impl Into<String>, source: impl Into<BoxError>) -> Self {
        EtlError::Ddl {
            table: table.into(),
            source: source.into(),
        }
    }

    pub fn load(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        EtlError::Load {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Short category name used in reports and log lines
    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::Configuration { .. } => "ConfigurationError",
            EtlError::Connection { .. } => "ConnectionError",
            EtlError::Extraction { .. } => "ExtractionError",
            EtlError::Transform { .. } => "TransformError",
            EtlError::UnsupportedType { .. } => "UnsupportedTypeError",
            EtlError::Ddl { .. } => "DDLError",
            EtlError::Load { .. } => "LoadError",
        }
    }
}

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, EtlError>;
