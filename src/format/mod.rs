//! Container formats, compression algorithms and capability negotiation.
//!
//! Logical names map to values through pure functions ([`std::str::FromStr`]
//! and `name()`); there are no lookup tables with mutable state.
//!
//! | Format | Accepted compression |
//! |--------|----------------------|
//! | ZIP    | STORE, DEFLATE (per entry) |
//! | TAR    | NONE, GZIP, BZIP2\*, LZMA\* (whole stream) |
//!
//! \* requires the `bzip2` / `lzma` Cargo feature.

pub mod detect;
pub mod options;

pub use detect::{Layout, detect_compression, detect_container};
pub use options::ArchiveOptions;

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Archive container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// ZIP: central-directory container with per-entry compression.
    #[default]
    Zip,
    /// TAR: 512-byte block container, optionally wrapped in one compression stream.
    Tar,
}

impl Format {
    /// Returns the canonical upper-case name.
    pub fn name(&self) -> &'static str {
        match self {
            Format::Zip => "ZIP",
            Format::Tar => "TAR",
        }
    }

    /// Returns the compression used when none is requested.
    pub fn default_compression(&self) -> Compression {
        match self {
            Format::Zip => Compression::Deflate,
            Format::Tar => Compression::None,
        }
    }

    /// Returns whether `compression` can be used with this format.
    pub fn accepts(&self, compression: Compression) -> bool {
        match self {
            Format::Zip => matches!(compression, Compression::Store | Compression::Deflate),
            Format::Tar => matches!(
                compression,
                Compression::None | Compression::Gzip | Compression::Bzip2 | Compression::Lzma
            ),
        }
    }

    /// Returns whether entries can override the archive compression.
    pub fn supports_per_entry_compression(&self) -> bool {
        matches!(self, Format::Zip)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ZIP" => Ok(Format::Zip),
            "TAR" | "USTAR" | "GNUTAR" | "PAX" => Ok(Format::Tar),
            _ => Err(Error::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

/// Compression algorithm.
///
/// For ZIP this is the per-entry method; for TAR it is the single stream
/// wrapped around the whole container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// No compression layer (TAR).
    None,
    /// Stored entries (ZIP).
    Store,
    /// Raw DEFLATE entries (ZIP).
    Deflate,
    /// gzip stream (TAR).
    Gzip,
    /// bzip2 stream (TAR).
    Bzip2,
    /// LZMA-alone stream (TAR).
    Lzma,
}

impl Compression {
    /// Returns the canonical upper-case name.
    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "NONE",
            Compression::Store => "STORE",
            Compression::Deflate => "DEFLATE",
            Compression::Gzip => "GZIP",
            Compression::Bzip2 => "BZIP2",
            Compression::Lzma => "LZMA",
        }
    }

    /// Returns true if this algorithm was compiled into the library.
    pub fn is_available(&self) -> bool {
        match self {
            Compression::None | Compression::Store | Compression::Deflate | Compression::Gzip => {
                true
            }
            Compression::Bzip2 => cfg!(feature = "bzip2"),
            Compression::Lzma => cfg!(feature = "lzma"),
        }
    }

    /// Returns the feature flag required for this algorithm.
    pub fn required_feature(&self) -> Option<&'static str> {
        match self {
            Compression::Bzip2 => Some("bzip2"),
            Compression::Lzma => Some("lzma"),
            _ => None,
        }
    }

    /// Maps a ZIP entry method onto a logical algorithm.
    ///
    /// Returns `None` for methods this crate cannot write.
    pub fn from_zip_method(method: zip::CompressionMethod) -> Option<Self> {
        match method {
            zip::CompressionMethod::Stored => Some(Compression::Store),
            zip::CompressionMethod::Deflated => Some(Compression::Deflate),
            _ => None,
        }
    }

    /// Returns the ZIP entry method for this algorithm, if it has one.
    pub fn to_zip_method(&self) -> Option<zip::CompressionMethod> {
        match self {
            Compression::Store => Some(zip::CompressionMethod::Stored),
            Compression::Deflate => Some(zip::CompressionMethod::Deflated),
            _ => None,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Compression::None),
            "STORE" | "STORED" => Ok(Compression::Store),
            "DEFLATE" => Ok(Compression::Deflate),
            "GZIP" => Ok(Compression::Gzip),
            "BZIP2" => Ok(Compression::Bzip2),
            "LZMA" => Ok(Compression::Lzma),
            _ => Err(Error::UnsupportedOptions(format!(
                "unknown compression algorithm '{}'",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names_case_insensitive() {
        assert_eq!("zip".parse::<Format>().unwrap(), Format::Zip);
        assert_eq!("Tar".parse::<Format>().unwrap(), Format::Tar);
        assert_eq!(Format::Zip.to_string(), "ZIP");
    }

    #[test]
    fn test_unknown_format_is_unsupported() {
        let err = "7z".parse::<Format>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { ref format } if format == "7z"));
    }

    #[test]
    fn test_compression_names_roundtrip() {
        for c in [
            Compression::None,
            Compression::Store,
            Compression::Deflate,
            Compression::Gzip,
            Compression::Bzip2,
            Compression::Lzma,
        ] {
            assert_eq!(c.name().parse::<Compression>().unwrap(), c);
            assert_eq!(c.name().to_lowercase().parse::<Compression>().unwrap(), c);
        }
        assert!("zstd".parse::<Compression>().is_err());
    }

    #[test]
    fn test_accepts_table() {
        assert!(Format::Zip.accepts(Compression::Store));
        assert!(Format::Zip.accepts(Compression::Deflate));
        assert!(!Format::Zip.accepts(Compression::Lzma));
        assert!(!Format::Zip.accepts(Compression::None));
        assert!(Format::Tar.accepts(Compression::None));
        assert!(Format::Tar.accepts(Compression::Gzip));
        assert!(!Format::Tar.accepts(Compression::Store));
        assert!(!Format::Tar.accepts(Compression::Deflate));
    }

    #[test]
    fn test_availability_matches_features() {
        assert!(Compression::Gzip.is_available());
        assert_eq!(Compression::Bzip2.is_available(), cfg!(feature = "bzip2"));
        assert_eq!(Compression::Lzma.is_available(), cfg!(feature = "lzma"));
        assert_eq!(Compression::Lzma.required_feature(), Some("lzma"));
        assert_eq!(Compression::Deflate.required_feature(), None);
    }

    #[test]
    fn test_zip_method_mapping() {
        assert_eq!(
            Compression::from_zip_method(zip::CompressionMethod::Stored),
            Some(Compression::Store)
        );
        assert_eq!(
            Compression::Deflate.to_zip_method(),
            Some(zip::CompressionMethod::Deflated)
        );
        assert_eq!(Compression::Gzip.to_zip_method(), None);
    }
}
