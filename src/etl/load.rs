//! Loader trait for writing records to destinations

use super::{Extractor, Record, Transformer};
use crate::error::Result;
use async_trait::async_trait;

/// Loader trait for moving a record stream into a destination
///
/// A loader owns the whole run: it opens the extractor, pulls every record,
/// applies the transformer and writes the survivors. The extractor and the
/// destination are released on every exit path. Loaders usually delegate to
/// [`drive`](super::drive) with their own [`RecordSink`].
///
/// Commit granularity is loader-specific. Callers may only rely on no record
/// being written twice and no surviving record being skipped.
///
/// # Example
/// ```no_run
/// use async_trait::async_trait;
/// use etl_relay::etl::{drive, Extractor, Loader, Record, RecordSink, Transformer};
/// use etl_relay::Result;
///
/// struct CountingLoader;
///
/// struct Discard(u64);
///
/// #[async_trait]
/// impl RecordSink for Discard {
///     async fn write(&mut self, _record: Record) -> Result<()> {
///         self.0 += 1;
///         Ok(())
///     }
///     async fn finish(&mut self) -> Result<u64> {
///         Ok(self.0)
///     }
///     async fn abort(&mut self) {}
/// }
///
/// #[async_trait]
/// impl Loader for CountingLoader {
///     async fn load(
///         &mut self,
///         extractor: &mut dyn Extractor,
///         transformer: &dyn Transformer,
///     ) -> Result<u64> {
///         drive(extractor, transformer, &mut Discard(0)).await
///     }
/// }
/// ```
#[async_trait]
pub trait Loader: Send {
    /// Run the extractor through the transformer into the destination
    ///
    /// Returns the number of records written
    ///
    /// # Errors
    /// Returns the first extraction, transform or `LoadError` encountered
    async fn load(
        &mut self,
        extractor: &mut dyn Extractor,
        transformer: &dyn Transformer,
    ) -> Result<u64>;
}

/// Destination half of a pipeline
///
/// The driver calls `write` for each surviving record, then exactly one of
/// `finish` (success) or `abort` (any failure).
#[async_trait]
pub trait RecordSink: Send {
    /// Accept one record; may buffer
    async fn write(&mut self, record: Record) -> Result<()>;

    /// Flush pending records, commit and release the destination
    ///
    /// Returns the total number of records written
    async fn finish(&mut self) -> Result<u64>;

    /// Release the destination without committing pending records
    async fn abort(&mut self);
}
