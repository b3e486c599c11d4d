//! Business-type configuration
//!
//! A business type names one extract/load/transform configuration triple.
//! [`ConfigResolver`] reads it from a configuration directory, applies an
//! optional override file and caches the typed result.

mod resolver;
mod types;

pub use resolver::ConfigResolver;
pub use types::{
    ColumnRule, DEFAULT_BATCH_SIZE, DEFAULT_FETCH_SIZE, DEFAULT_KIND, DropCondition,
    ExtractConfig, LoadConfig, ResolvedConfig, Role, RoleConfig, TransformConfig,
};
