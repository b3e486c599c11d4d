//! Caller-supplied input for file-like sources

use std::path::PathBuf;
use tokio::io::AsyncBufRead;

/// Where a file-like extractor reads from
///
/// Resolved once by the caller; extractors never guess between a path and
/// inline content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    File(PathBuf),
    Text(String),
    Bytes(Vec<u8>),
}

impl Input {
    pub fn describe(&self) -> String {
        match self {
            Input::File(path) => path.display().to_string(),
            Input::Text(text) => format!("inline text ({} bytes)", text.len()),
            Input::Bytes(bytes) => format!("inline bytes ({} bytes)", bytes.len()),
        }
    }

    /// Open a buffered reader over the content
    pub async fn open(&self) -> std::io::Result<Box<dyn AsyncBufRead + Send + Unpin>> {
        match self {
            Input::File(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Box::new(tokio::io::BufReader::new(file)))
            }
            Input::Text(text) => Ok(Box::new(std::io::Cursor::new(text.clone().into_bytes()))),
            Input::Bytes(bytes) => Ok(Box::new(std::io::Cursor::new(bytes.clone()))),
        }
    }
}

impl From<PathBuf> for Input {
    fn from(path: PathBuf) -> Self {
        Input::File(path)
    }
}
