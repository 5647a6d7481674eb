//! Whole-stream compression layers for TAR archives.
//!
//! ZIP compresses each entry itself (through the `zip` crate); TAR relies on
//! one compression stream wrapped around the whole container. This module
//! provides that stream in both directions:
//!
//! - [`decoder`] wraps a source in the decoder for a sniffed algorithm.
//! - [`CompressedSink`] wraps a destination in the matching encoder and
//!   hands the destination back on [`CompressedSink::finish`].

pub mod deflate;

#[cfg(feature = "bzip2")]
pub mod bzip2;

#[cfg(feature = "lzma")]
pub mod lzma;

use std::io::{self, BufRead, Read, Write};

use crate::format::Compression;
use crate::{Error, Result};

pub use deflate::{GzipDecoder, GzipEncoder};

#[cfg(feature = "bzip2")]
pub use self::bzip2::{Bzip2Decoder, Bzip2Encoder};

#[cfg(feature = "lzma")]
pub use lzma::{LzmaDecoder, LzmaEncoder};

/// A decoder that reads compressed data and produces uncompressed output.
pub trait Decoder: Read + Send {
    /// Returns the algorithm this decoder undoes.
    fn compression(&self) -> Compression;
}

/// A decoder that passes data through unchanged.
pub struct CopyDecoder<R> {
    inner: R,
}

impl<R> std::fmt::Debug for CopyDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> CopyDecoder<R> {
    /// Creates a new copy decoder.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Send> Read for CopyDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for CopyDecoder<R> {
    fn compression(&self) -> Compression {
        Compression::None
    }
}

fn unavailable(compression: Compression) -> Error {
    Error::CompressionAlgorithmUnavailable {
        compression: compression.name().to_string(),
        feature: compression.required_feature().unwrap_or("default"),
    }
}

/// Builds a decoder for a whole-stream compression layer.
///
/// # Errors
///
/// - [`Error::CompressionAlgorithmUnavailable`] if the algorithm's feature
///   is not compiled in.
/// - [`Error::UnsupportedOptions`] for per-entry algorithms (STORE, DEFLATE).
/// - [`Error::CorruptedArchive`] if the stream header is malformed.
pub fn decoder<'a, R>(compression: Compression, input: R) -> Result<Box<dyn Decoder + 'a>>
where
    R: BufRead + Send + 'a,
{
    match compression {
        Compression::None => Ok(Box::new(CopyDecoder::new(input))),
        Compression::Gzip => Ok(Box::new(GzipDecoder::new(input))),
        #[cfg(feature = "bzip2")]
        Compression::Bzip2 => Ok(Box::new(Bzip2Decoder::new(input))),
        #[cfg(feature = "lzma")]
        Compression::Lzma => {
            let decoder = LzmaDecoder::new(input)
                .map_err(|e| Error::corrupted(format!("invalid LZMA header: {}", e)))?;
            Ok(Box::new(decoder))
        }
        #[allow(unreachable_patterns)]
        Compression::Bzip2 | Compression::Lzma => Err(unavailable(compression)),
        Compression::Store | Compression::Deflate => Err(Error::UnsupportedOptions(format!(
            "{} is a per-entry method, not a stream compression",
            compression
        ))),
    }
}

/// A destination wrapped in an optional stream encoder.
pub enum CompressedSink<W: Write> {
    /// No compression.
    Plain(W),
    /// gzip stream.
    Gzip(GzipEncoder<W>),
    /// bzip2 stream.
    #[cfg(feature = "bzip2")]
    Bzip2(Bzip2Encoder<W>),
    /// LZMA-alone stream.
    #[cfg(feature = "lzma")]
    Lzma(LzmaEncoder<W>),
}

impl<W: Write> std::fmt::Debug for CompressedSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CompressedSink")
            .field(&self.compression())
            .finish()
    }
}

impl<W: Write> CompressedSink<W> {
    /// Wraps `output` in the encoder for `compression`.
    ///
    /// `level` is 0-9; `None` selects the codec default.
    ///
    /// # Errors
    ///
    /// Same conditions as [`decoder`], plus I/O errors from encoder setup.
    pub fn new(output: W, compression: Compression, level: Option<u32>) -> Result<Self> {
        match compression {
            Compression::None => Ok(Self::Plain(output)),
            Compression::Gzip => Ok(Self::Gzip(GzipEncoder::new(
                output,
                level.unwrap_or(deflate::DEFAULT_LEVEL),
            ))),
            #[cfg(feature = "bzip2")]
            Compression::Bzip2 => Ok(Self::Bzip2(Bzip2Encoder::new(
                output,
                level.unwrap_or(self::bzip2::DEFAULT_LEVEL),
            ))),
            #[cfg(feature = "lzma")]
            Compression::Lzma => Ok(Self::Lzma(LzmaEncoder::new(
                output,
                level.unwrap_or(lzma::DEFAULT_PRESET),
            )?)),
            #[allow(unreachable_patterns)]
            Compression::Bzip2 | Compression::Lzma => Err(unavailable(compression)),
            Compression::Store | Compression::Deflate => Err(Error::UnsupportedOptions(format!(
                "{} is a per-entry method, not a stream compression",
                compression
            ))),
        }
    }

    /// Returns the algorithm applied by this sink.
    pub fn compression(&self) -> Compression {
        match self {
            Self::Plain(_) => Compression::None,
            Self::Gzip(_) => Compression::Gzip,
            #[cfg(feature = "bzip2")]
            Self::Bzip2(_) => Compression::Bzip2,
            #[cfg(feature = "lzma")]
            Self::Lzma(_) => Compression::Lzma,
        }
    }

    /// Finishes the compression stream and returns the destination.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Plain(mut w) => {
                w.flush()?;
                Ok(w)
            }
            Self::Gzip(e) => e.try_finish(),
            #[cfg(feature = "bzip2")]
            Self::Bzip2(e) => e.try_finish(),
            #[cfg(feature = "lzma")]
            Self::Lzma(e) => e.try_finish(),
        }
    }
}

impl<W: Write> Write for CompressedSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(e) => e.write(buf),
            #[cfg(feature = "bzip2")]
            Self::Bzip2(e) => e.write(buf),
            #[cfg(feature = "lzma")]
            Self::Lzma(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(e) => e.flush(),
            #[cfg(feature = "bzip2")]
            Self::Bzip2(e) => e.flush(),
            #[cfg(feature = "lzma")]
            Self::Lzma(e) => e.flush(),
        }
    }
}
