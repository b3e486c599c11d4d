//! Transformer implementations
//!
//! Concrete [`Transformer`](crate::etl::Transformer)s configured from a
//! business type's `transform` section.

mod column_mapper;

pub use column_mapper::ColumnMapper;
