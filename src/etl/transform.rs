//! Transformer trait for record-by-record mapping

use super::Record;
use crate::error::Result;

/// Transformer trait for mapping records
///
/// Implementors define how a record changes between source and destination:
/// - Renaming or removing columns
/// - Deriving new columns
/// - Filtering records out of the stream
///
/// Returning `Ok(None)` drops the record. A transformer only touches the
/// record it is given and keeps no state between calls.
///
/// # Example
/// ```
/// use etl_relay::etl::{Record, Transformer};
/// use etl_relay::Result;
///
/// struct SkipEmpty;
///
/// impl Transformer for SkipEmpty {
///     fn transform(&self, record: Record) -> Result<Option<Record>> {
///         Ok((!record.is_empty()).then_some(record))
///     }
/// }
///
/// assert!(SkipEmpty.transform(Record::new()).unwrap().is_none());
/// ```
pub trait Transformer: Send + Sync {
    /// Transform a single record, `None` to drop it
    ///
    /// # Errors
    /// Returns a `TransformError` if the record cannot be mapped
    fn transform(&self, record: Record) -> Result<Option<Record>>;

    /// Transform multiple records, dropping those mapped to `None`
    fn transform_many(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            if let Some(record) = self.transform(record)? {
                out.push(record);
            }
        }
        Ok(out)
    }
}

/// Identity transformer that passes records through unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTransformer;

impl IdentityTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for IdentityTransformer {
    fn transform(&self, record: Record) -> Result<Option<Record>> {
        Ok(Some(record))
    }
}

impl<T: Transformer + ?Sized> Transformer for Box<T> {
    fn transform(&self, record: Record) -> Result<Option<Record>> {
        (**self).transform(record)
    }
}
