//! Text encodings supported for documents, and incremental UTF-8 decoding for
//! streamed input.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const UTF16_LE_BOM: [u8; 2] = [0xFF, 0xFE];
const UTF16_BE_BOM: [u8; 2] = [0xFE, 0xFF];

/// UTF-16 code unit order of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Order announced by the leading byte order mark. Files without one are
    /// read as little-endian.
    pub fn detect(prefix: &[u8]) -> Self {
        if prefix.starts_with(&UTF16_BE_BOM) {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

/// On-disk document encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    /// Written little-endian with a byte order mark; either order is read.
    #[serde(rename = "utf-16", alias = "utf16")]
    Utf16,
    #[serde(rename = "ascii")]
    Ascii,
}

impl Encoding {
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16 => "utf-16",
            Encoding::Ascii => "ascii",
        }
    }

    /// Decode a whole file. No newline or Unicode normalization happens.
    pub fn decode(&self, bytes: &[u8], path: &Path) -> Result<String, StoreError> {
        let fail = || StoreError::Decode {
            path: path.to_path_buf(),
            encoding: self.name().to_string(),
        };
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|_| fail()),
            Encoding::Ascii => {
                if bytes.is_ascii() {
                    String::from_utf8(bytes.to_vec()).map_err(|_| fail())
                } else {
                    Err(fail())
                }
            }
            Encoding::Utf16 => {
                let order = ByteOrder::detect(bytes);
                let body = match order {
                    ByteOrder::Little if !bytes.starts_with(&UTF16_LE_BOM) => bytes,
                    _ => &bytes[2..],
                };
                if body.len() % 2 != 0 {
                    return Err(fail());
                }
                let units: Vec<u16> = body
                    .chunks_exact(2)
                    .map(|pair| match order {
                        ByteOrder::Big => u16::from_be_bytes([pair[0], pair[1]]),
                        ByteOrder::Little => u16::from_le_bytes([pair[0], pair[1]]),
                    })
                    .collect();
                String::from_utf16(&units).map_err(|_| fail())
            }
        }
    }

    /// Encode a whole file, including the byte order mark for UTF-16.
    pub fn encode(&self, text: &str, path: &Path) -> Result<Vec<u8>, StoreError> {
        match self {
            Encoding::Utf16 => {
                let mut out = UTF16_LE_BOM.to_vec();
                out.extend(text.encode_utf16().flat_map(|u| u.to_le_bytes()));
                Ok(out)
            }
            _ => self.encode_fragment(text, ErrorPolicy::Strict, ByteOrder::Little, path),
        }
    }

    /// Encode text that will be appended to an existing file (no BOM).
    /// `order` only matters for UTF-16 and must match the file being extended.
    pub fn encode_fragment(
        &self,
        text: &str,
        policy: ErrorPolicy,
        order: ByteOrder,
        path: &Path,
    ) -> Result<Vec<u8>, StoreError> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Utf16 => Ok(match order {
                ByteOrder::Little => text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
                ByteOrder::Big => text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect(),
            }),
            Encoding::Ascii => {
                if text.is_ascii() {
                    return Ok(text.as_bytes().to_vec());
                }
                match policy {
                    ErrorPolicy::Strict => Err(StoreError::Encode {
                        path: path.to_path_buf(),
                        encoding: self.name().to_string(),
                    }),
                    ErrorPolicy::Replace => Ok(text
                        .chars()
                        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                        .collect()),
                    ErrorPolicy::Ignore => {
                        Ok(text.chars().filter(|c| c.is_ascii()).map(|c| c as u8).collect())
                    }
                }
            }
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What to do with undecodable input while streaming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    #[default]
    Strict,
    Replace,
    Ignore,
}

/// Incremental UTF-8 decoder that carries incomplete sequences across chunks.
#[derive(Debug)]
pub struct ChunkDecoder {
    policy: ErrorPolicy,
    carry: Vec<u8>,
    replaced: usize,
}

/// Byte offset (within the whole stream) of the first invalid sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSequence {
    pub offset: u64,
}

impl ChunkDecoder {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy,
            carry: Vec::new(),
            replaced: 0,
        }
    }

    /// Number of invalid sequences replaced or dropped so far.
    pub fn replaced(&self) -> usize {
        self.replaced
    }

    /// Decode the next chunk. `consumed` is the stream offset of `chunk`.
    pub fn push(&mut self, chunk: &[u8], consumed: u64) -> Result<String, InvalidSequence> {
        let carried = self.carry.len() as u64;
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(chunk);
        let base = consumed.saturating_sub(carried);

        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    // valid_up_to marks a char boundary, so this cannot fail.
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        None => {
                            self.carry = after.to_vec();
                            break;
                        }
                        Some(len) => {
                            let offset = base + (buf.len() - after.len()) as u64;
                            self.reject(&mut out, offset)?;
                            rest = &after[len..];
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Flush at end of stream. A dangling partial sequence is invalid input.
    pub fn finish(&mut self, consumed: u64) -> Result<String, InvalidSequence> {
        if self.carry.is_empty() {
            return Ok(String::new());
        }
        let offset = consumed.saturating_sub(self.carry.len() as u64);
        self.carry.clear();
        let mut out = String::new();
        self.reject(&mut out, offset)?;
        Ok(out)
    }

    fn reject(&mut self, out: &mut String, offset: u64) -> Result<(), InvalidSequence> {
        match self.policy {
            ErrorPolicy::Strict => return Err(InvalidSequence { offset }),
            ErrorPolicy::Replace => out.push(char::REPLACEMENT_CHARACTER),
            ErrorPolicy::Ignore => {}
        }
        self.replaced += 1;
        Ok(())
    }
}
