//! LZMA-alone (`.lzma`) stream codec.
//!
//! The stream carries the 13-byte LZMA-alone header: properties,
//! dictionary size and uncompressed size. The writer does not know the
//! size up front, so it records "unknown" and terminates the stream with
//! an end marker.

use std::io::{self, Read, Write};

use super::Decoder;
use crate::format::Compression;

/// Default LZMA preset.
pub const DEFAULT_PRESET: u32 = 6;

fn to_io_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

/// LZMA decoder.
pub struct LzmaDecoder<R> {
    inner: lzma_rust2::LzmaReader<R>,
}

impl<R> std::fmt::Debug for LzmaDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzmaDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> LzmaDecoder<R> {
    /// Creates a new LZMA decoder, reading the header from `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed.
    pub fn new(input: R) -> io::Result<Self> {
        let reader =
            lzma_rust2::LzmaReader::new_mem_limit(input, u32::MAX, None).map_err(to_io_error)?;
        Ok(Self { inner: reader })
    }
}

impl<R: Read + Send> Read for LzmaDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for LzmaDecoder<R> {
    fn compression(&self) -> Compression {
        Compression::Lzma
    }
}

/// LZMA encoder.
pub struct LzmaEncoder<W: Write> {
    inner: lzma_rust2::LzmaWriter<W>,
}

impl<W: Write> std::fmt::Debug for LzmaEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzmaEncoder").finish_non_exhaustive()
    }
}

impl<W: Write> LzmaEncoder<W> {
    /// Creates a new LZMA encoder with a preset (0-9).
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder cannot be initialized.
    pub fn new(output: W, preset: u32) -> io::Result<Self> {
        let options = lzma_rust2::LzmaOptions::with_preset(preset.min(9));
        let writer =
            lzma_rust2::LzmaWriter::new_use_header(output, &options, None).map_err(to_io_error)?;
        Ok(Self { inner: writer })
    }

    /// Writes the end marker and returns the underlying writer.
    pub fn try_finish(self) -> io::Result<W> {
        self.inner.finish().map_err(to_io_error)
    }
}

impl<W: Write> Write for LzmaEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
