//! Error types for archive stream operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when reading, creating, or rewriting TAR and ZIP archives,
//! along with a convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. None of
//! them retry internally: an error aborts the cursor or writer that produced
//! it, and the caller must discard that instance.
//!
//! ```rust
//! use arcstream::{ArchiveOptions, Compression, Error, Format};
//!
//! let options = ArchiveOptions::new()
//!     .format(Format::Zip)
//!     .compression(Compression::Lzma);
//!
//! match options.validate() {
//!     Err(Error::UnsupportedCompressionForFormat { compression, format }) => {
//!         eprintln!("{} cannot be used with {}", compression, format);
//!     }
//!     Err(e) => eprintln!("other error: {}", e),
//!     Ok(()) => unreachable!(),
//! }
//! ```
//!
//! ## Configuration vs. Data Errors
//!
//! Configuration errors ([`Error::is_configuration_error`]) are always raised
//! before any byte reaches the destination. Corruption errors
//! ([`Error::is_corruption`]) come from the source archive and are fatal to
//! the cursor that hit them.

use std::io;

/// The main error type for archive operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io] | Destination or source stream failure |
/// | Corruption | [`CorruptedArchive`][Self::CorruptedArchive], [`SizeMismatch`][Self::SizeMismatch] | Bad magic, truncated stream, wrong sizes |
/// | Configuration | [`UnsupportedFormat`][Self::UnsupportedFormat], [`UnsupportedCompressionForFormat`][Self::UnsupportedCompressionForFormat], [`CompressionAlgorithmUnavailable`][Self::CompressionAlgorithmUnavailable], [`UnsupportedOptions`][Self::UnsupportedOptions], [`UnsupportedPerEntryCompression`][Self::UnsupportedPerEntryCompression] | Invalid option combinations |
/// | Input | [`EntryCountMismatch`][Self::EntryCountMismatch], [`InvalidEncoding`][Self::InvalidEncoding], [`InvalidContentType`][Self::InvalidContentType], [`InvalidArchivePath`][Self::InvalidArchivePath] | Caller-supplied values |
/// | Protocol | [`InvalidState`][Self::InvalidState] | Cursor or writer used out of order |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred on the source or destination stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The source archive could not be read.
    ///
    /// Raised for unrecognized magic bytes, truncated streams, header
    /// checksum failures and any other non-EOF failure reported while
    /// pulling headers or content. The cursor that raised it is unusable.
    #[error("Corrupted archive: {reason}")]
    CorruptedArchive {
        /// A description of what went wrong.
        reason: String,
    },

    /// The requested container format is not TAR or ZIP.
    #[error("Unsupported archive format: {format}")]
    UnsupportedFormat {
        /// The format name as supplied.
        format: String,
    },

    /// The compression algorithm is not valid for the container format.
    ///
    /// ZIP accepts STORE and DEFLATE; TAR accepts NONE, GZIP, BZIP2 and LZMA.
    #[error("Compression {compression} is not supported for format {format}")]
    UnsupportedCompressionForFormat {
        /// The requested compression name.
        compression: String,
        /// The container format name.
        format: String,
    },

    /// The compression algorithm is valid but was not compiled into this build.
    ///
    /// # Recovery
    ///
    /// Enable the corresponding feature flag when building:
    /// ```toml
    /// arcstream = { version = "0.1", features = ["bzip2", "lzma"] }
    /// ```
    #[error("Compression {compression} is unavailable (enable the `{feature}` feature)")]
    CompressionAlgorithmUnavailable {
        /// The requested compression name.
        compression: String,
        /// The Cargo feature that provides it.
        feature: &'static str,
    },

    /// An option combination the container cannot honor.
    #[error("Unsupported options: {0}")]
    UnsupportedOptions(String),

    /// A per-entry compression override that the active writer cannot apply.
    #[error("Entry '{path}' requests compression {compression}, which cannot be applied per entry")]
    UnsupportedPerEntryCompression {
        /// The entry path.
        path: String,
        /// The requested compression name.
        compression: String,
    },

    /// The number of entry descriptions and content values differ.
    #[error("Entry count mismatch: {entries} entries but {contents} contents")]
    EntryCountMismatch {
        /// Number of entry descriptions seen.
        entries: usize,
        /// Number of content values seen.
        contents: usize,
    },

    /// The named text encoding is unknown or cannot be used for encoding.
    #[error("Invalid encoding: {encoding}")]
    InvalidEncoding {
        /// The encoding label as supplied.
        encoding: String,
    },

    /// A content value was neither text nor binary.
    #[error("Invalid content type: {content_type}")]
    InvalidContentType {
        /// The type name of the rejected value.
        content_type: String,
    },

    /// A caller-supplied entry path was rejected.
    #[error("Invalid archive path: {0}")]
    InvalidArchivePath(String),

    /// An entry's content length did not match its declared size.
    ///
    /// TAR headers carry the size up front, so a content source that
    /// produces a different number of bytes would corrupt the output.
    #[error("Size mismatch for entry '{path}': declared {declared} bytes, got {actual}")]
    SizeMismatch {
        /// The entry path.
        path: String,
        /// The size written into the header.
        declared: u64,
        /// The number of bytes the source produced (may be a lower bound).
        actual: u64,
    },

    /// A cursor or writer method was called out of protocol order.
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),
}

impl Error {
    /// Returns `true` if this error was caused by invalid configuration.
    ///
    /// Configuration errors are detected before any I/O against the
    /// destination and always name the offending value.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFormat { .. }
                | Error::UnsupportedCompressionForFormat { .. }
                | Error::CompressionAlgorithmUnavailable { .. }
                | Error::UnsupportedOptions(_)
                | Error::UnsupportedPerEntryCompression { .. }
                | Error::InvalidContentType { .. }
                | Error::InvalidEncoding { .. }
        )
    }

    /// Returns `true` if this is a data corruption error.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::CorruptedArchive { .. } | Error::SizeMismatch { .. }
        )
    }

    /// Returns the entry path associated with this error, if any.
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Error::UnsupportedPerEntryCompression { path, .. } => Some(path.as_str()),
            Error::SizeMismatch { path, .. } => Some(path.as_str()),
            _ => None,
        }
    }

    /// Creates a CorruptedArchive error.
    pub fn corrupted(reason: impl Into<String>) -> Self {
        Error::CorruptedArchive {
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
