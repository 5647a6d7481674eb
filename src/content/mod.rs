//! Content values and their normalization into sized byte streams.
//!
//! Every entry written to an archive needs its size before its header is
//! emitted. [`normalize`] turns a caller-supplied [`ContentValue`] into a
//! [`NormalizedContent`]: a reader plus the exact number of bytes it will
//! produce. Streams are passed through when their size can be computed in
//! place; everything else is materialized into an owned buffer.
//!
//! | Value | Source | Result |
//! |-------|--------|--------|
//! | text, no transcoding | seekable stream | stream, size by seeking |
//! | text | forward-only stream, or transcoding needed | buffer |
//! | text | in memory | buffer (transcoded if needed) |
//! | binary (base64 or raw) | seekable stream | stream (decoded on the fly) |
//! | binary (base64 or raw) | in memory or forward-only | buffer |
//!
//! Buffers are owned by the returned value and freed when it is dropped,
//! whether or not the entry was written successfully.

mod base64_stream;

use std::io::{self, Read};

use crate::encoding::TextEncoding;
use crate::source::ByteSource;
use crate::{Error, Result};

/// A caller-supplied entry content value.
///
/// # Example
///
/// ```rust
/// use arcstream::content::{ContentValue, normalize};
///
/// let normalized = normalize(ContentValue::text("héllo"), "ISO-8859-1")?;
/// assert_eq!(normalized.size(), 5);
///
/// let normalized = normalize(ContentValue::base64("aGVsbG8="), "UTF-8")?;
/// assert_eq!(normalized.into_bytes()?, b"hello");
/// # Ok::<(), arcstream::Error>(())
/// ```
#[derive(Debug)]
pub enum ContentValue<'a> {
    /// UTF-8 text, transcoded to the entry encoding on write.
    Text(ByteSource<'a>),
    /// Raw bytes, or base64 text when `base64` is set.
    Binary {
        /// The bytes (or base64 symbols).
        source: ByteSource<'a>,
        /// Whether `source` holds base64 text to decode.
        base64: bool,
    },
    /// A value of some other type; rejected by [`normalize`].
    Other {
        /// Name of the value's type, for the error message.
        type_name: String,
    },
}

impl<'a> ContentValue<'a> {
    /// In-memory text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(ByteSource::memory(text.into().into_bytes()))
    }

    /// Text streamed from `source` (UTF-8).
    pub fn text_stream(source: ByteSource<'a>) -> Self {
        Self::Text(source)
    }

    /// In-memory raw bytes.
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Binary {
            source: ByteSource::memory(bytes),
            base64: false,
        }
    }

    /// Raw bytes streamed from `source`.
    pub fn binary_stream(source: ByteSource<'a>) -> Self {
        Self::Binary {
            source,
            base64: false,
        }
    }

    /// In-memory base64 text.
    pub fn base64(encoded: impl Into<String>) -> Self {
        Self::Binary {
            source: ByteSource::memory(encoded.into().into_bytes()),
            base64: true,
        }
    }

    /// base64 text streamed from `source`.
    pub fn base64_stream(source: ByteSource<'a>) -> Self {
        Self::Binary {
            source,
            base64: true,
        }
    }

    /// A value that is neither text nor binary.
    pub fn other(type_name: impl Into<String>) -> Self {
        Self::Other {
            type_name: type_name.into(),
        }
    }

    /// Returns a short name for the kind of value.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Text(_) => "text",
            Self::Binary { base64: true, .. } => "base64Binary",
            Self::Binary { .. } => "binary",
            Self::Other { type_name } => type_name,
        }
    }
}

impl From<String> for ContentValue<'_> {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<&str> for ContentValue<'_> {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<Vec<u8>> for ContentValue<'_> {
    fn from(bytes: Vec<u8>) -> Self {
        Self::binary(bytes)
    }
}

impl From<&[u8]> for ContentValue<'_> {
    fn from(bytes: &[u8]) -> Self {
        Self::binary(bytes.to_vec())
    }
}

/// A byte stream with a known length.
pub struct NormalizedContent<'a> {
    reader: Box<dyn Read + Send + 'a>,
    size: u64,
    materialized: bool,
}

impl std::fmt::Debug for NormalizedContent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedContent")
            .field("size", &self.size)
            .field("materialized", &self.materialized)
            .finish_non_exhaustive()
    }
}

impl<'a> NormalizedContent<'a> {
    fn buffer(bytes: Vec<u8>) -> Self {
        Self {
            size: bytes.len() as u64,
            reader: Box::new(io::Cursor::new(bytes)),
            materialized: true,
        }
    }

    fn stream(reader: impl Read + Send + 'a, size: u64) -> Self {
        Self {
            reader: Box::new(reader),
            size,
            materialized: false,
        }
    }

    /// Number of bytes the reader produces.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns true if the content was drained into an owned buffer.
    pub fn is_materialized(&self) -> bool {
        self.materialized
    }

    /// Reads the remaining content into a buffer.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading or decoding fails.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(usize::try_from(self.size).unwrap_or(0));
        self.reader.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl Read for NormalizedContent<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Normalizes a content value into a sized byte stream.
///
/// `encoding` names the target encoding for text values and is ignored for
/// binary values.
///
/// # Errors
///
/// - [`Error::InvalidContentType`] for [`ContentValue::Other`], before
///   anything is read.
/// - [`Error::InvalidEncoding`] if `encoding` is unknown (text only).
/// - I/O errors while sizing or materializing the source, including invalid
///   UTF-8 text that must be transcoded and invalid in-memory base64.
pub fn normalize<'a>(value: ContentValue<'a>, encoding: &str) -> Result<NormalizedContent<'a>> {
    match value {
        ContentValue::Other { type_name } => Err(Error::InvalidContentType {
            content_type: type_name,
        }),
        ContentValue::Text(source) => normalize_text(source, TextEncoding::for_label(encoding)?),
        ContentValue::Binary { source, base64 } => normalize_binary(source, base64),
    }
}

fn normalize_text(
    mut source: ByteSource<'_>,
    encoding: TextEncoding,
) -> Result<NormalizedContent<'_>> {
    if encoding.is_utf8() {
        if source.is_memory() {
            return Ok(NormalizedContent::buffer(source.into_bytes()?));
        }
        if let Some(size) = source.stream_len()? {
            return Ok(NormalizedContent::stream(source, size));
        }
        return Ok(NormalizedContent::buffer(source.into_bytes()?));
    }
    Ok(NormalizedContent::buffer(encoding.encode_reader(source)?))
}

fn normalize_binary(source: ByteSource<'_>, base64: bool) -> Result<NormalizedContent<'_>> {
    match source {
        ByteSource::Seekable(mut stream) => {
            if base64 {
                let size = base64_stream::measure(&mut stream)?;
                Ok(NormalizedContent::stream(base64_stream::decoder(stream), size))
            } else {
                let mut source = ByteSource::Seekable(stream);
                let size = source.stream_len()?.unwrap_or(0);
                Ok(NormalizedContent::stream(source, size))
            }
        }
        other => {
            let bytes = other.into_bytes()?;
            if base64 {
                Ok(NormalizedContent::buffer(base64_stream::decode_all(&bytes)?))
            } else {
                Ok(NormalizedContent::buffer(bytes))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_other_is_invalid_content_type() {
        let err = normalize(ContentValue::other("xs:integer"), "UTF-8").unwrap_err();
        assert!(
            matches!(err, Error::InvalidContentType { ref content_type } if content_type == "xs:integer")
        );
    }

    #[test]
    fn test_seekable_utf8_text_is_streamed() {
        let source = ByteSource::seekable(Cursor::new(b"hello".to_vec()));
        let normalized = normalize(ContentValue::text_stream(source), "UTF-8").unwrap();
        assert_eq!(normalized.size(), 5);
        assert!(!normalized.is_materialized());
        assert_eq!(normalized.into_bytes().unwrap(), b"hello");
    }

    #[test]
    fn test_sequential_text_is_materialized() {
        let source = ByteSource::sequential(&b"hello"[..]);
        let normalized = normalize(ContentValue::text_stream(source), "UTF-8").unwrap();
        assert!(normalized.is_materialized());
        assert_eq!(normalized.size(), 5);
    }

    #[test]
    fn test_transcoding_materializes() {
        let source = ByteSource::seekable(Cursor::new("€".as_bytes().to_vec()));
        let normalized = normalize(ContentValue::text_stream(source), "windows-1252").unwrap();
        assert!(normalized.is_materialized());
        assert_eq!(normalized.size(), 1);
        assert_eq!(normalized.into_bytes().unwrap(), vec![0x80]);
    }

    #[test]
    fn test_memory_text_sizes_after_transcoding() {
        let normalized = normalize(ContentValue::text("hé"), "UTF-16LE").unwrap();
        assert_eq!(normalized.size(), 4);
    }

    #[test]
    fn test_invalid_encoding() {
        let err = normalize(ContentValue::text("x"), "klingon").unwrap_err();
        assert!(matches!(err, Error::InvalidEncoding { .. }));
    }

    #[test]
    fn test_binary_ignores_encoding() {
        let normalized = normalize(ContentValue::binary(vec![1, 2, 3]), "klingon").unwrap();
        assert_eq!(normalized.size(), 3);
    }

    #[test]
    fn test_seekable_base64_exact_size() {
        let source = ByteSource::seekable(Cursor::new(b"aGVsbG8=".to_vec()));
        let normalized = normalize(ContentValue::base64_stream(source), "UTF-8").unwrap();
        assert!(!normalized.is_materialized());
        assert_eq!(normalized.size(), 5);
        assert_eq!(normalized.into_bytes().unwrap(), b"hello");
    }

    #[test]
    fn test_sequential_base64_materialized() {
        let source = ByteSource::sequential(&b"aGVs\nbG8="[..]);
        let normalized = normalize(ContentValue::base64_stream(source), "UTF-8").unwrap();
        assert!(normalized.is_materialized());
        assert_eq!(normalized.into_bytes().unwrap(), b"hello");
    }

    #[test]
    fn test_seekable_binary_streamed() {
        let data: Vec<u8> = (0..200u8).collect();
        let source = ByteSource::seekable(Cursor::new(data.clone()));
        let normalized = normalize(ContentValue::binary_stream(source), "UTF-8").unwrap();
        assert_eq!(normalized.size(), 200);
        assert_eq!(normalized.into_bytes().unwrap(), data);
    }
}
