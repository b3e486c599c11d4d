//! Pipeline orchestration for ETL operations

use super::{Extractor, Loader, RecordSink, Transformer};
use crate::error::Result;

/// Counters for one pass over an extractor
#[derive(Debug, Default, Clone, Copy)]
struct PassStats {
    extracted: u64,
    dropped: u64,
    forwarded: u64,
}

/// Run one extractor through a transformer into a sink
///
/// Steps:
/// 1. Open the extractor
/// 2. Pull records until exhaustion, transforming each one
/// 3. Forward surviving records to the sink in extraction order
/// 4. Finish the sink and report the rows it wrote
///
/// Any extraction, transform or write error stops the pass. The sink is
/// aborted, the extractor closed, and the error returned. Nothing is retried.
///
/// # Errors
/// Returns the first error from any stage
pub async fn drive(
    extractor: &mut dyn Extractor,
    transformer: &dyn Transformer,
    sink: &mut dyn RecordSink,
) -> Result<u64> {
    let source = extractor.describe();
    log::info!("Starting pipeline from {}", source);

    if let Err(e) = extractor.open().await {
        log::error!("Failed to open {}: {}", source, e);
        extractor.close().await;
        sink.abort().await;
        return Err(e);
    }

    let pumped = pump(extractor, transformer, sink).await;
    extractor.close().await;

    let stats = match pumped {
        Ok(stats) => stats,
        Err(e) => {
            log::error!("Pipeline from {} stopped: {}", source, e);
            sink.abort().await;
            return Err(e);
        }
    };

    log::debug!(
        "Extracted {} records, dropped {}, forwarded {}",
        stats.extracted,
        stats.dropped,
        stats.forwarded
    );

    match sink.finish().await {
        Ok(written) => {
            log::info!("Loaded {} records from {}", written, source);
            Ok(written)
        }
        Err(e) => {
            log::error!("Failed to finish load from {}: {}", source, e);
            sink.abort().await;
            Err(e)
        }
    }
}

async fn pump(
    extractor: &mut dyn Extractor,
    transformer: &dyn Transformer,
    sink: &mut dyn RecordSink,
) -> Result<PassStats> {
    let mut stats = PassStats::default();

    while let Some(record) = extractor.next_record().await? {
        stats.extracted += 1;
        match transformer.transform(record)? {
            Some(record) => {
                sink.write(record).await?;
                stats.forwarded += 1;
            }
            None => stats.dropped += 1,
        }
    }

    Ok(stats)
}

/// ETL Pipeline bundling an extractor, a transformer and a loader
///
/// # Example
/// ```no_run
/// use etl_relay::etl::{IdentityTransformer, Pipeline, VecExtractor};
/// use etl_relay::storage::NdjsonLoader;
///
/// # async fn example() -> etl_relay::Result<()> {
/// let mut pipeline = Pipeline::new(
///     VecExtractor::new(vec![]),
///     IdentityTransformer,
///     NdjsonLoader::new("out.ndjson"),
/// );
///
/// let count = pipeline.run().await?;
/// println!("Processed {} records", count);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<E, T, L> {
    extractor: E,
    transformer: T,
    loader: L,
}

impl<E, T, L> Pipeline<E, T, L>
where
    E: Extractor,
    T: Transformer,
    L: Loader,
{
    /// Create a new pipeline
    pub fn new(extractor: E, transformer: T, loader: L) -> Self {
        Self {
            extractor,
            transformer,
            loader,
        }
    }

    /// Run the pipeline once
    ///
    /// Returns the number of records written
    ///
    /// # Errors
    /// Returns an error if any stage fails
    pub async fn run(&mut self) -> Result<u64> {
        self.loader
            .load(&mut self.extractor, &self.transformer)
            .await
    }

    /// Take the parts back, e.g. to inspect the extractor after a run
    pub fn into_parts(self) -> (E, T, L) {
        (self.extractor, self.transformer, self.loader)
    }
}
