//! NDJSON (Newline Delimited JSON) sources and sinks
//!
//! One JSON object of scalar values per line. Binary values are written as
//! base64 strings.

use super::Input;
use crate::error::{EtlError, Result};
use crate::etl::{Extractor, Loader, Record, RecordSink, Transformer, Value, drive};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufWriter, Lines};

/// Read records from NDJSON, one line at a time
pub struct NdjsonExtractor {
    input: Input,
    lines: Option<Lines<Box<dyn AsyncBufRead + Send + Unpin>>>,
    line_number: usize,
}

impl NdjsonExtractor {
    pub fn new(input: Input) -> Self {
        Self {
            input,
            lines: None,
            line_number: 0,
        }
    }

    /// Read from a file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::new(Input::File(path.as_ref().to_path_buf()))
    }
}

#[async_trait]
impl Extractor for NdjsonExtractor {
    async fn open(&mut self) -> Result<()> {
        let reader = self
            .input
            .open()
            .await
            .map_err(|e| EtlError::extraction(self.describe(), e))?;
        self.lines = Some(reader.lines());
        self.line_number = 0;
        Ok(())
    }

    async fn next_record(&mut self) -> Result<Option<Record>> {
        let context = self.describe();
        let Some(lines) = self.lines.as_mut() else {
            return Err(EtlError::extraction(context, "next_record called before open"));
        };

        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| EtlError::extraction(&context, e))?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line).map_err(|e| {
                EtlError::extraction(format!("{} line {}", context, self.line_number), e)
            })?;
            return Ok(Some(record));
        }
    }

    async fn close(&mut self) {
        self.lines = None;
    }

    fn describe(&self) -> String {
        format!("ndjson {}", self.input.describe())
    }
}

/// Write records as NDJSON to a file
///
/// The file is truncated when the load starts. Every record is written as it
/// arrives; the buffer is flushed when the load finishes or fails, so rows
/// written before a failure are kept.
pub struct NdjsonLoader {
    path: PathBuf,
}

impl NdjsonLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Loader for NdjsonLoader {
    async fn load(
        &mut self,
        extractor: &mut dyn Extractor,
        transformer: &dyn Transformer,
    ) -> Result<u64> {
        let mut sink = match NdjsonSink::create(&self.path).await {
            Ok(sink) => sink,
            Err(e) => {
                extractor.close().await;
                return Err(e);
            }
        };
        drive(extractor, transformer, &mut sink).await
    }
}

struct NdjsonSink {
    path: PathBuf,
    writer: Option<BufWriter<tokio::fs::File>>,
    written: u64,
}

impl NdjsonSink {
    async fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EtlError::load(format!("ndjson {}", path.display()), e))?;
        }
        let file = tokio::fs::File::create(path)
            .await
            .map_err(|e| EtlError::load(format!("ndjson {}", path.display()), e))?;
        log::debug!("Writing NDJSON to {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    fn context(&self) -> String {
        format!("ndjson {}", self.path.display())
    }
}

/// JSON-friendly copy of a record
fn to_json_record(record: Record) -> Record {
    record
        .iter()
        .map(|(column, value)| {
            let value = match value {
                Value::Bytes(bytes) => Value::Text(STANDARD.encode(bytes)),
                other => other.clone(),
            };
            (column.to_string(), value)
        })
        .collect()
}

#[async_trait]
impl RecordSink for NdjsonSink {
    async fn write(&mut self, record: Record) -> Result<()> {
        let context = self.context();
        let Some(writer) = self.writer.as_mut() else {
            return Err(EtlError::load(context, "sink already closed"));
        };

        let mut line = serde_json::to_vec(&to_json_record(record))
            .map_err(|e| EtlError::load(&context, e))?;
        line.push(b'\n');
        writer
            .write_all(&line)
            .await
            .map_err(|e| EtlError::load(&context, e))?;
        self.written += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<u64> {
        let context = self.context();
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .await
                .map_err(|e| EtlError::load(&context, e))?;
        }
        Ok(self.written)
    }

    async fn abort(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush().await {
                log::warn!("Failed to flush {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::{IdentityTransformer, Pipeline, VecExtractor};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_inline_text() {
        let mut extractor = NdjsonExtractor::new(Input::Text(
            "{\"id\": 1, \"name\": \"a\"}\n\n{\"id\": 2, \"name\": null}\n".to_string(),
        ));
        extractor.open().await.unwrap();

        let first = extractor.next_record().await.unwrap().unwrap();
        assert_eq!(first.get("id"), Some(&Value::Int(1)));
        let second = extractor.next_record().await.unwrap().unwrap();
        assert_eq!(second.get("name"), Some(&Value::Null));
        assert!(extractor.next_record().await.unwrap().is_none());
        extractor.close().await;
    }

    #[tokio::test]
    async fn test_malformed_line_reports_line_number() {
        let mut extractor =
            NdjsonExtractor::new(Input::Bytes(b"{\"id\": 1}\nnot json\n".to_vec()));
        extractor.open().await.unwrap();
        extractor.next_record().await.unwrap();

        let err = extractor.next_record().await.unwrap_err();
        assert_eq!(err.kind(), "ExtractionError");
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_missing_file_fails_open() {
        let mut extractor = NdjsonExtractor::from_path("/nonexistent/input.ndjson");
        assert!(extractor.open().await.is_err());
        extractor.close().await;
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("rows.ndjson");

        let records: Vec<Record> = vec![
            [("id", Value::Int(1)), ("blob", Value::Bytes(vec![0, 1, 2]))]
                .into_iter()
                .collect(),
            [("id", Value::Int(2)), ("blob", Value::Null)].into_iter().collect(),
        ];
        let mut pipeline = Pipeline::new(
            VecExtractor::new(records),
            IdentityTransformer,
            NdjsonLoader::new(&path),
        );
        assert_eq!(pipeline.run().await.unwrap(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "{\"id\":1,\"blob\":\"AAEC\"}\n{\"id\":2,\"blob\":null}\n"
        );

        let mut extractor = NdjsonExtractor::from_path(&path);
        extractor.open().await.unwrap();
        let first = extractor.next_record().await.unwrap().unwrap();
        assert_eq!(first.get("blob"), Some(&Value::Text("AAEC".into())));
    }
}
