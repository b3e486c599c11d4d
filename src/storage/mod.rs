//! File-based sources and sinks
//!
//! This module handles file I/O for pipelines:
//! - Resolving caller input (path, inline text or bytes)
//! - NDJSON reading and writing

mod input;
mod ndjson;

pub use input::Input;
pub use ndjson::{NdjsonExtractor, NdjsonLoader};
