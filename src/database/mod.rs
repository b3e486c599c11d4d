//! Relational database access
//!
//! Everything goes through the `sqlx` driver-neutral `Any` connection so one
//! code path serves PostgreSQL, MySQL and SQLite. Dialect differences
//! (quoting, placeholders, casts, catalog queries) live in [`Dialect`].

mod cursor;
mod dialect;
mod extractor;
mod introspect;
mod loader;
mod registry;
mod row;
mod types;
mod writer;

pub use cursor::RecordCursor;
pub use dialect::Dialect;
pub use extractor::DatabaseExtractor;
pub use introspect::Introspector;
pub use loader::DatabaseLoader;
pub use registry::{
    ConnectionRegistry, DATABASES_FILE, Database, DatabaseSpec, expand_env, redact_url,
};
pub use types::{TypeSize, classify};
pub use writer::BatchWriter;
