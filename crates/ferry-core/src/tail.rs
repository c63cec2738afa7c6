//! Incremental reads of a growing log file.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Read everything appended to `path` since `offset`
///
/// Returns the new text and the offset to resume from. The new offset is
/// always `offset` plus the number of bytes consumed, so no byte is ever
/// delivered twice. A missing file yields empty text and the same offset.
/// Other I/O errors are logged and treated as "nothing new".
///
/// A multi-byte UTF-8 sequence cut off at the end of the file is left
/// unconsumed until the rest of it has been written. Any other invalid
/// UTF-8 is replaced lossily.
pub async fn read_since(path: &Path, offset: u64) -> (String, u64) {
    match read_raw(path, offset).await {
        Ok(bytes) => {
            let (text, consumed) = decode_complete(&bytes);
            (text, offset + consumed as u64)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => (String::new(), offset),
        Err(e) => {
            tracing::warn!(path = %path.display(), offset, error = %e, "failed to read log file");
            (String::new(), offset)
        }
    }
}

async fn read_raw(path: &Path, offset: u64) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).await?;
    Ok(bytes)
}

/// Decode bytes, holding back an incomplete trailing UTF-8 sequence
fn decode_complete(bytes: &[u8]) -> (String, usize) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), bytes.len()),
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            (String::from_utf8_lossy(&bytes[..valid]).into_owned(), valid)
        }
        Err(_) => (String::from_utf8_lossy(bytes).into_owned(), bytes.len()),
    }
}

/// Read position into one growing file
#[derive(Debug, Clone)]
pub struct LogCursor {
    path: PathBuf,
    offset: u64,
}

impl LogCursor {
    /// Cursor at the start of `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
        }
    }

    /// File being followed
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes consumed so far
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Check whether any byte has been read yet
    #[must_use]
    pub fn has_advanced(&self) -> bool {
        self.offset > 0
    }

    /// Read text appended since the last call
    pub async fn read_new(&mut self) -> String {
        let (text, offset) = read_since(&self.path, self.offset).await;
        self.offset = offset;
        text
    }
}
