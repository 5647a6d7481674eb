//! Archive-wide write options.

use super::{Compression, Format};
use crate::{Error, Result};

/// Archive-wide options: container format, compression and attribute policy.
///
/// Options are either supplied by the caller or sniffed from the first
/// header of an existing archive (see [`crate::archive_options`]). They are
/// fixed once a writer has been opened with them; only ZIP entries may
/// override the compression individually.
///
/// # Example
///
/// ```rust
/// use arcstream::{ArchiveOptions, Compression, Format};
///
/// let options = ArchiveOptions::new()
///     .format(Format::Tar)
///     .compression(Compression::Gzip);
/// assert!(options.validate().is_ok());
///
/// // ZIP without an explicit compression uses DEFLATE
/// assert_eq!(ArchiveOptions::new().effective_compression(), Compression::Deflate);
///
/// // TAR without one writes a plain tarball
/// let tar = ArchiveOptions::new().format(Format::Tar);
/// assert_eq!(tar.effective_compression(), Compression::None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveOptions {
    /// Container format.
    pub format: Format,
    /// Compression algorithm; `None` selects the format's default.
    pub compression: Option<Compression>,
    /// Compression level (0-9); `None` selects the codec's default.
    pub level: Option<u32>,
    /// Suppress auxiliary per-entry metadata.
    ///
    /// ZIP omits Unix permission attributes; TAR writes plain ustar headers
    /// instead of GNU headers.
    pub skip_extra_attributes: bool,
}

impl ArchiveOptions {
    /// Creates options with defaults (ZIP, DEFLATE).
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from logical names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for an unknown format name and
    /// [`Error::UnsupportedOptions`] for an unknown compression name. The
    /// combination itself is checked by [`validate`](Self::validate).
    pub fn from_names(format: &str, compression: Option<&str>) -> Result<Self> {
        let format: Format = format.parse()?;
        let compression = compression.map(str::parse).transpose()?;
        Ok(Self {
            format,
            compression,
            ..Self::default()
        })
    }

    /// Sets the container format.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Sets the compression algorithm.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Sets the compression level (0-9).
    pub fn level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    /// Sets whether auxiliary per-entry metadata is suppressed.
    pub fn skip_extra_attributes(mut self, skip: bool) -> Self {
        self.skip_extra_attributes = skip;
        self
    }

    /// Returns the compression actually used.
    pub fn effective_compression(&self) -> Compression {
        self.compression
            .unwrap_or_else(|| self.format.default_compression())
    }

    /// Validates the format/compression combination.
    ///
    /// Runs before any writer is opened; a writer never starts with
    /// options that fail here.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedCompressionForFormat`] if the algorithm is not
    ///   valid for the format.
    /// - [`Error::CompressionAlgorithmUnavailable`] if the algorithm is valid
    ///   but its feature is not compiled in.
    /// - [`Error::UnsupportedOptions`] if the level is out of range.
    pub fn validate(&self) -> Result<()> {
        let compression = self.effective_compression();

        if !self.format.accepts(compression) {
            return Err(Error::UnsupportedCompressionForFormat {
                compression: compression.name().to_string(),
                format: self.format.name().to_string(),
            });
        }

        if !compression.is_available() {
            return Err(Error::CompressionAlgorithmUnavailable {
                compression: compression.name().to_string(),
                feature: compression.required_feature().unwrap_or("default"),
            });
        }

        if let Some(level) = self.level {
            if level > 9 {
                return Err(Error::UnsupportedOptions(format!(
                    "compression level {} out of range (0-9)",
                    level
                )));
            }
        }

        Ok(())
    }

    /// Validates a per-entry compression override against these options.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedOptions`] if the format has no per-entry
    ///   negotiation (any override on TAR).
    /// - [`Error::UnsupportedPerEntryCompression`] if the format negotiates
    ///   per entry but cannot apply this algorithm.
    pub fn validate_entry_override(&self, path: &str, compression: Compression) -> Result<()> {
        if !self.format.supports_per_entry_compression() {
            return Err(Error::UnsupportedOptions(format!(
                "per-entry compression {} requested for '{}' but {} has no per-entry compression",
                compression, path, self.format
            )));
        }
        if !self.format.accepts(compression) {
            return Err(Error::UnsupportedPerEntryCompression {
                path: path.to_string(),
                compression: compression.name().to_string(),
            });
        }
        Ok(())
    }
}
