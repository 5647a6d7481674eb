//! BZip2 stream codec.

use std::io::{self, BufRead, Read, Write};

use bzip2::bufread::MultiBzDecoder;
use bzip2::write::BzEncoder;

use super::Decoder;
use crate::format::Compression;

/// Default bzip2 block size level.
pub const DEFAULT_LEVEL: u32 = 9;

/// BZip2 decoder.
pub struct Bzip2Decoder<R> {
    inner: MultiBzDecoder<R>,
}

impl<R> std::fmt::Debug for Bzip2Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bzip2Decoder").finish_non_exhaustive()
    }
}

impl<R: BufRead + Send> Bzip2Decoder<R> {
    /// Creates a new BZip2 decoder.
    pub fn new(input: R) -> Self {
        Self {
            inner: MultiBzDecoder::new(input),
        }
    }
}

impl<R: BufRead + Send> Read for Bzip2Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: BufRead + Send> Decoder for Bzip2Decoder<R> {
    fn compression(&self) -> Compression {
        Compression::Bzip2
    }
}

/// BZip2 encoder.
pub struct Bzip2Encoder<W: Write> {
    inner: BzEncoder<W>,
}

impl<W: Write> std::fmt::Debug for Bzip2Encoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bzip2Encoder").finish_non_exhaustive()
    }
}

impl<W: Write> Bzip2Encoder<W> {
    /// Creates a new BZip2 encoder. Levels are clamped to 1-9.
    pub fn new(output: W, level: u32) -> Self {
        Self {
            inner: BzEncoder::new(output, bzip2::Compression::new(level.clamp(1, 9))),
        }
    }

    /// Finishes the stream and returns the underlying writer.
    pub fn try_finish(self) -> io::Result<W> {
        self.inner.finish()
    }
}

impl<W: Write> Write for Bzip2Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_bzip2_roundtrip() {
        let data = b"Hello, World! This is a test of BZip2 compression.";

        let mut encoder = Bzip2Encoder::new(Vec::new(), DEFAULT_LEVEL);
        encoder.write_all(data).unwrap();
        let compressed = encoder.try_finish().unwrap();
        assert!(compressed.starts_with(b"BZh"));

        let mut decoder = Bzip2Decoder::new(Cursor::new(compressed));
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_level_zero_clamped() {
        let mut encoder = Bzip2Encoder::new(Vec::new(), 0);
        encoder.write_all(b"x").unwrap();
        let compressed = encoder.try_finish().unwrap();
        assert!(compressed.starts_with(b"BZh1"));
    }
}
