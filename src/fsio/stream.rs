//! Bounded-memory append of generated content.
//!
//! Used only for content generation at the end of a document. The append is
//! chunked and therefore not atomic as a whole; section edits go through
//! [`crate::fsio::atomic`] instead.

use crate::error::{AccessKind, StoreError};
use crate::fsio::encoding::{ByteOrder, ChunkDecoder, Encoding, ErrorPolicy};
use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::debug;

/// Tuning for a streamed append.
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub chunk_size: usize,
    pub error_policy: ErrorPolicy,
    pub encoding: Encoding,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            error_policy: ErrorPolicy::Strict,
            encoding: Encoding::Utf8,
        }
    }
}

/// What a streamed append did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub chunks: usize,
    /// Invalid input sequences replaced or dropped under a lenient policy
    pub replaced: usize,
}

/// Append everything `source` yields to the existing file at `path`.
///
/// Memory use is bounded by `chunk_size`. Under `ErrorPolicy::Strict` invalid
/// UTF-8 stops the append with a decode error; bytes of earlier chunks stay
/// written.
pub fn stream_append<R: Read>(
    path: &Path,
    mut source: R,
    settings: &StreamSettings,
) -> Result<StreamSummary, StoreError> {
    if settings.chunk_size == 0 {
        return Err(StoreError::Validation(
            "Chunk size must be greater than zero".to_string(),
        ));
    }
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::access(path, AccessKind::NotFound),
            io::ErrorKind::PermissionDenied => StoreError::access(path, AccessKind::WriteDenied),
            _ => StoreError::io(path, e),
        })?;

    let order = match settings.encoding {
        Encoding::Utf16 => {
            let mut prefix = Vec::with_capacity(2);
            (&mut file)
                .take(2)
                .read_to_end(&mut prefix)
                .map_err(|e| StoreError::io(path, e))?;
            ByteOrder::detect(&prefix)
        }
        _ => ByteOrder::Little,
    };

    let mut decoder = ChunkDecoder::new(settings.error_policy);
    let mut buf = vec![0u8; settings.chunk_size];
    let mut summary = StreamSummary::default();
    let decode_error = |offset: u64| {
        debug!("Invalid UTF-8 at stream offset {} for {}", offset, path.display());
        StoreError::Decode {
            path: path.to_path_buf(),
            encoding: Encoding::Utf8.name().to_string(),
        }
    };

    loop {
        let read = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StoreError::io(path, e)),
        };
        let text = decoder
            .push(&buf[..read], summary.bytes_read)
            .map_err(|bad| decode_error(bad.offset))?;
        summary.bytes_read += read as u64;
        summary.chunks += 1;
        summary.bytes_written += write_fragment(&mut file, path, &text, order, settings)?;
    }

    let tail = decoder
        .finish(summary.bytes_read)
        .map_err(|bad| decode_error(bad.offset))?;
    summary.bytes_written += write_fragment(&mut file, path, &tail, order, settings)?;
    summary.replaced = decoder.replaced();

    file.sync_data().map_err(|e| StoreError::io(path, e))?;
    Ok(summary)
}

fn write_fragment(
    file: &mut std::fs::File,
    path: &Path,
    text: &str,
    order: ByteOrder,
    settings: &StreamSettings,
) -> Result<u64, StoreError> {
    if text.is_empty() {
        return Ok(0);
    }
    let bytes = settings
        .encoding
        .encode_fragment(text, settings.error_policy, order, path)?;
    file.write_all(&bytes).map_err(|e| StoreError::io(path, e))?;
    Ok(bytes.len() as u64)
}
