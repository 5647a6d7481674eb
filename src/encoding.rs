//! Text encodings for entry content.
//!
//! Text values are UTF-8 in memory. When an entry names another encoding,
//! the text is transcoded on the way into the archive and decoded on the
//! way out. Labels are resolved with `encoding_rs`, which follows the WHATWG
//! Encoding Standard (`"latin1"` is windows-1252, `"utf-16"` is UTF-16LE).
//!
//! Characters the target encoding cannot represent are written as HTML
//! numeric character references (`&#NNNN;`), as `encoding_rs` does.

use std::io::{self, Read};

use encoding_rs::{CoderResult, Encoding, UTF_8, UTF_16BE, UTF_16LE};

use crate::{Error, Result};

/// Chunk size used when transcoding streams.
const CHUNK_SIZE: usize = 64 * 1024;

fn invalid_utf8(e: std::str::Utf8Error) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("text content is not valid UTF-8: {}", e),
    ))
}

/// A resolved text encoding.
///
/// # Example
///
/// ```rust
/// use arcstream::TextEncoding;
///
/// let latin1 = TextEncoding::for_label("ISO-8859-1").unwrap();
/// assert_eq!(latin1.encode_str("café"), b"caf\xE9");
/// assert_eq!(latin1.decode(b"caf\xE9"), "café");
///
/// assert!(TextEncoding::for_label("no-such-encoding").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding {
    encoding: &'static Encoding,
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::utf8()
    }
}

impl TextEncoding {
    /// UTF-8.
    pub fn utf8() -> Self {
        Self { encoding: UTF_8 }
    }

    /// Resolves an encoding label (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEncoding`] for unknown labels and for labels
    /// that resolve to the decode-only "replacement" encoding.
    pub fn for_label(label: &str) -> Result<Self> {
        match Encoding::for_label(label.trim().as_bytes()) {
            Some(encoding) if encoding != encoding_rs::REPLACEMENT => Ok(Self { encoding }),
            _ => Err(Error::InvalidEncoding {
                encoding: label.to_string(),
            }),
        }
    }

    /// Returns the canonical name of the encoding.
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Returns true if no transcoding is needed for UTF-8 text.
    pub fn is_utf8(&self) -> bool {
        self.encoding == UTF_8
    }

    fn utf16_big_endian(&self) -> Option<bool> {
        if self.encoding == UTF_16LE {
            Some(false)
        } else if self.encoding == UTF_16BE {
            Some(true)
        } else {
            None
        }
    }

    /// Encodes a string in this encoding.
    pub fn encode_str(&self, text: &str) -> Vec<u8> {
        let mut transcoder = Transcoder::new(*self);
        let mut out = Vec::with_capacity(text.len());
        transcoder.push(text, &mut out, true);
        out
    }

    /// Drains UTF-8 text from `input` and encodes it, chunk by chunk.
    ///
    /// Multi-byte sequences split across chunk boundaries are carried over.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading fails or the input is not valid UTF-8.
    pub fn encode_reader<R: Read>(&self, mut input: R) -> Result<Vec<u8>> {
        let mut transcoder = Transcoder::new(*self);
        let mut out = Vec::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut carry: Vec<u8> = Vec::new();

        loop {
            let n = input.read(&mut buf)?;
            if n == 0 {
                break;
            }
            carry.extend_from_slice(&buf[..n]);
            let text = match std::str::from_utf8(&carry) {
                Ok(text) => text,
                Err(e) if e.error_len().is_none() => {
                    std::str::from_utf8(&carry[..e.valid_up_to()]).map_err(invalid_utf8)?
                }
                Err(e) => return Err(invalid_utf8(e)),
            };
            let consumed = text.len();
            transcoder.push(text, &mut out, false);
            carry.drain(..consumed);
        }

        if !carry.is_empty() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "text content ends inside a UTF-8 sequence",
            )));
        }
        transcoder.push("", &mut out, true);
        Ok(out)
    }

    /// Decodes bytes in this encoding into a string.
    ///
    /// Malformed sequences become U+FFFD. No BOM sniffing is done: the
    /// named encoding always wins.
    pub fn decode(&self, bytes: &[u8]) -> String {
        self.encoding
            .decode_without_bom_handling(bytes)
            .0
            .into_owned()
    }
}

/// Incremental UTF-8 to target encoder.
struct Transcoder {
    target: TextEncoding,
    encoder: encoding_rs::Encoder,
}

impl Transcoder {
    fn new(target: TextEncoding) -> Self {
        Self {
            target,
            encoder: target.encoding.new_encoder(),
        }
    }

    fn push(&mut self, text: &str, out: &mut Vec<u8>, last: bool) {
        if self.target.is_utf8() {
            out.extend_from_slice(text.as_bytes());
            return;
        }

        // encoding_rs never encodes into UTF-16; its encoders emit UTF-8
        if let Some(big_endian) = self.target.utf16_big_endian() {
            out.reserve(text.len() * 2);
            for unit in text.encode_utf16() {
                let bytes = if big_endian {
                    unit.to_be_bytes()
                } else {
                    unit.to_le_bytes()
                };
                out.extend_from_slice(&bytes);
            }
            return;
        }

        let mut src = text;
        loop {
            out.reserve(src.len() + 16);
            let (result, read, _) = self.encoder.encode_from_utf8_to_vec(src, out, last);
            src = &src[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }
}
