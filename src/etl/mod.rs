//! Core ETL (Extract, Transform, Load) abstractions
//!
//! This module defines the record shape, the extractor/transformer/loader
//! capabilities and the single driver loop that moves one record stream into
//! one destination.

mod extract;
mod load;
mod params;
mod pipeline;
mod record;
mod transform;

pub use extract::{Extractor, VecExtractor};
pub use load::{Loader, RecordSink};
pub use params::{BoundSql, bind_named};
pub use pipeline::{Pipeline, drive};
pub use record::{Record, Value};
pub use transform::{IdentityTransformer, Transformer};
