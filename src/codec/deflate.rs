//! gzip stream codec (DEFLATE inside a gzip envelope).

use std::io::{self, BufRead, Read, Write};

use flate2::bufread::MultiGzDecoder;
use flate2::write::GzEncoder;

use super::Decoder;
use crate::format::Compression;

/// Default gzip compression level.
pub const DEFAULT_LEVEL: u32 = 6;

/// gzip decoder.
///
/// Concatenated gzip members are decoded as one stream, as `gzip -d` does.
pub struct GzipDecoder<R> {
    inner: MultiGzDecoder<R>,
}

impl<R> std::fmt::Debug for GzipDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GzipDecoder").finish_non_exhaustive()
    }
}

impl<R: BufRead + Send> GzipDecoder<R> {
    /// Creates a new gzip decoder.
    pub fn new(input: R) -> Self {
        Self {
            inner: MultiGzDecoder::new(input),
        }
    }
}

impl<R: BufRead + Send> Read for GzipDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: BufRead + Send> Decoder for GzipDecoder<R> {
    fn compression(&self) -> Compression {
        Compression::Gzip
    }
}

/// gzip encoder.
pub struct GzipEncoder<W: Write> {
    inner: GzEncoder<W>,
}

impl<W: Write> std::fmt::Debug for GzipEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GzipEncoder").finish_non_exhaustive()
    }
}

impl<W: Write> GzipEncoder<W> {
    /// Creates a new gzip encoder (level 0-9).
    pub fn new(output: W, level: u32) -> Self {
        Self {
            inner: GzEncoder::new(output, flate2::Compression::new(level.min(9))),
        }
    }

    /// Writes the gzip trailer and returns the underlying writer.
    pub fn try_finish(self) -> io::Result<W> {
        self.inner.finish()
    }
}

impl<W: Write> Write for GzipEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
