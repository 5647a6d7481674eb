//! Streaming base64 decoding.

use std::io::{self, Read, Seek, SeekFrom};

use base64::Engine;
use base64::engine::GeneralPurpose;
use base64::engine::general_purpose::STANDARD;
use base64::read::DecoderReader;

use crate::{Error, Result};

const CHUNK_SIZE: usize = 16 * 1024;

/// Strips ASCII whitespace (line breaks included) from a base64 stream.
pub(crate) struct SkipWhitespace<R> {
    inner: R,
}

impl<R: Read> SkipWhitespace<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> Read for SkipWhitespace<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.inner.read(buf)?;
            if n == 0 {
                return Ok(0);
            }
            let mut kept = 0;
            for i in 0..n {
                let b = buf[i];
                if !b.is_ascii_whitespace() {
                    buf[kept] = b;
                    kept += 1;
                }
            }
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}

/// A base64 decoder over a whitespace-tolerant stream.
pub(crate) type Base64Reader<R> = DecoderReader<'static, GeneralPurpose, SkipWhitespace<R>>;

/// Wraps `input` in a streaming base64 decoder.
pub(crate) fn decoder<R: Read>(input: R) -> Base64Reader<R> {
    DecoderReader::new(SkipWhitespace::new(input), &STANDARD)
}

/// Number of decoded bytes for `symbols` base64 characters of which
/// `padding` are `=`.
pub(crate) fn decoded_len(symbols: u64, padding: u64) -> u64 {
    symbols.saturating_sub(padding) * 3 / 4
}

/// Computes the exact decoded size of a seekable base64 stream.
///
/// Reads from the current position to the end, then seeks back. Only
/// whitespace and padding are interpreted; invalid symbols are left for the
/// decoder to report.
pub(crate) fn measure<S: Read + Seek + ?Sized>(stream: &mut S) -> Result<u64> {
    let start = stream.stream_position()?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut symbols = 0u64;
    let mut padding = 0u64;

    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for &b in &buf[..n] {
            if b.is_ascii_whitespace() {
                continue;
            }
            symbols += 1;
            if b == b'=' {
                padding += 1;
            }
        }
    }

    stream.seek(SeekFrom::Start(start))?;
    Ok(decoded_len(symbols, padding))
}

/// Decodes a complete base64 text held in memory.
pub(crate) fn decode_all(encoded: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = encoded
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(compact).map_err(|e| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid base64 content: {}", e),
        ))
    })
}
