//! Byte sources: the capability the cursor and content adapter read from.
//!
//! A [`ByteSource`] is either a stream (seekable or not) or an owned
//! in-memory buffer. Seekability decides whether sizes can be computed in
//! place or the bytes have to be materialized first.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use crate::Result;

/// A readable and seekable stream.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// A byte-producing source.
///
/// # Example
///
/// ```rust
/// use arcstream::ByteSource;
/// use std::io::{Cursor, Read};
///
/// let mut seekable = ByteSource::seekable(Cursor::new(b"hello".to_vec()));
/// assert_eq!(seekable.stream_len().unwrap(), Some(5));
///
/// let mut stream = ByteSource::sequential(&b"hello"[..]);
/// assert_eq!(stream.stream_len().unwrap(), None);
/// assert_eq!(stream.into_bytes().unwrap(), b"hello");
/// ```
pub enum ByteSource<'a> {
    /// A stream that supports seeking.
    Seekable(Box<dyn ReadSeek + Send + 'a>),
    /// A forward-only stream.
    Sequential(Box<dyn Read + Send + 'a>),
    /// An owned buffer.
    Memory(Cursor<Vec<u8>>),
}

impl std::fmt::Debug for ByteSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seekable(_) => f.debug_tuple("Seekable").finish_non_exhaustive(),
            Self::Sequential(_) => f.debug_tuple("Sequential").finish_non_exhaustive(),
            Self::Memory(c) => f.debug_tuple("Memory").field(&c.get_ref().len()).finish(),
        }
    }
}

impl<'a> ByteSource<'a> {
    /// Wraps a seekable stream.
    pub fn seekable(stream: impl Read + Seek + Send + 'a) -> Self {
        Self::Seekable(Box::new(stream))
    }

    /// Wraps a forward-only stream.
    pub fn sequential(stream: impl Read + Send + 'a) -> Self {
        Self::Sequential(Box::new(stream))
    }

    /// Wraps an owned buffer.
    pub fn memory(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Memory(Cursor::new(bytes.into()))
    }

    /// Opens a file as a seekable source.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::seekable(File::open(path)?))
    }

    /// Returns true if the source can seek (streams and buffers alike).
    pub fn is_seekable(&self) -> bool {
        !matches!(self, Self::Sequential(_))
    }

    /// Returns true if the source is an owned buffer.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory(_))
    }

    /// Returns the number of bytes between the current position and the end.
    ///
    /// Seekable sources seek to the end and back; nothing is copied.
    /// Forward-only streams return `None`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if seeking fails.
    pub fn stream_len(&mut self) -> Result<Option<u64>> {
        match self {
            Self::Seekable(s) => Ok(Some(remaining_len(s)?)),
            Self::Memory(c) => Ok(Some(remaining_len(c)?)),
            Self::Sequential(_) => Ok(None),
        }
    }

    /// Drains the source into an owned buffer.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading fails.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Memory(c) => {
                let pos = c.position() as usize;
                let mut bytes = c.into_inner();
                if pos > 0 {
                    bytes.drain(..pos.min(bytes.len()));
                }
                Ok(bytes)
            }
            Self::Seekable(mut s) => {
                let mut bytes = Vec::new();
                s.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
            Self::Sequential(mut s) => {
                let mut bytes = Vec::new();
                s.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
        }
    }

    /// Converts into a boxed seekable stream, materializing forward-only
    /// streams into memory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading fails.
    pub fn into_read_seek(self) -> Result<Box<dyn ReadSeek + Send + 'a>> {
        match self {
            Self::Seekable(s) => Ok(s),
            Self::Memory(c) => Ok(Box::new(c)),
            Self::Sequential(_) => Ok(Box::new(Cursor::new(self.into_bytes()?))),
        }
    }
}

impl Read for ByteSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Seekable(s) => s.read(buf),
            Self::Sequential(s) => s.read(buf),
            Self::Memory(c) => c.read(buf),
        }
    }
}

impl From<Vec<u8>> for ByteSource<'_> {
    fn from(bytes: Vec<u8>) -> Self {
        Self::memory(bytes)
    }
}

impl From<&[u8]> for ByteSource<'_> {
    fn from(bytes: &[u8]) -> Self {
        Self::memory(bytes.to_vec())
    }
}

impl From<File> for ByteSource<'_> {
    fn from(file: File) -> Self {
        Self::seekable(file)
    }
}

/// Seeks to the end and back, returning the distance.
fn remaining_len<S: Seek + ?Sized>(stream: &mut S) -> io::Result<u64> {
    let pos = stream.stream_position()?;
    let end = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(pos))?;
    Ok(end.saturating_sub(pos))
}
