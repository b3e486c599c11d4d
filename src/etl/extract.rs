//! Extractor trait for pulling records from a source

use super::Record;
use crate::error::Result;
use async_trait::async_trait;

/// Extractor trait for reading records from a source
///
/// Implementors wrap a forward-only source such as:
/// - A database cursor
/// - A newline-delimited file or stream
///
/// After a successful [`open`](Extractor::open) the extractor yields a lazy,
/// finite, single-pass sequence through [`next_record`](Extractor::next_record).
/// The sequence cannot be restarted.
///
/// # Example
/// ```no_run
/// use async_trait::async_trait;
/// use etl_relay::etl::{Extractor, Record};
/// use etl_relay::Result;
///
/// struct Countdown(i64);
///
/// #[async_trait]
/// impl Extractor for Countdown {
///     async fn open(&mut self) -> Result<()> {
///         Ok(())
///     }
///
///     async fn next_record(&mut self) -> Result<Option<Record>> {
///         if self.0 == 0 {
///             return Ok(None);
///         }
///         self.0 -= 1;
///         Ok(Some([("n", self.0)].into_iter().collect()))
///     }
///
///     async fn close(&mut self) {}
/// }
/// ```
#[async_trait]
pub trait Extractor: Send {
    /// Open the underlying source
    ///
    /// # Errors
    /// Returns an `ExtractionError` if the source cannot be opened
    async fn open(&mut self) -> Result<()>;

    /// Pull the next record, `None` once the source is exhausted
    ///
    /// # Errors
    /// Returns an `ExtractionError` on read failure or a malformed record
    async fn next_record(&mut self) -> Result<Option<Record>>;

    /// Release the underlying resources
    ///
    /// Must be safe to call after a failed open and more than once.
    async fn close(&mut self);

    /// Short description used in log lines and error context
    fn describe(&self) -> String {
        "extractor".to_string()
    }
}

/// Extractor over an in-memory list of records
///
/// Useful for callers that already hold their rows and for tests.
pub struct VecExtractor {
    records: std::vec::IntoIter<Record>,
    opened: bool,
}

impl VecExtractor {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into_iter(),
            opened: false,
        }
    }

    /// Records not yet pulled
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl Extractor for VecExtractor {
    async fn open(&mut self) -> Result<()> {
        self.opened = true;
        Ok(())
    }

    async fn next_record(&mut self) -> Result<Option<Record>> {
        if !self.opened {
            return Err(crate::EtlError::extraction(
                self.describe(),
                "next_record called before open",
            ));
        }
        Ok(self.records.next())
    }

    async fn close(&mut self) {
        self.opened = false;
    }

    fn describe(&self) -> String {
        "in-memory records".to_string()
    }
}
