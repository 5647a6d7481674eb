//! Entry metadata model.

use crate::format::Compression;
use crate::timestamp::Timestamp;
use crate::{ArchivePath, Result};

/// Default text encoding for entries.
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// Default permission bits for regular files (rw-r--r--).
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Default permission bits for directories (rwxr-xr-x).
pub const DEFAULT_DIRECTORY_MODE: u32 = 0o755;

/// Kind of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntryKind {
    /// A regular file with a data phase.
    #[default]
    Regular,
    /// A directory; written without data.
    Directory,
}

/// Metadata for one container entry.
///
/// The same type describes entries read from an archive and entries about
/// to be written. On read, fields the container does not declare stay
/// `None`; on write, `None` fields fall back to defaults:
///
/// | Field | Write default |
/// |-------|---------------|
/// | `size` | computed from the content source |
/// | `modified` | current wall-clock time |
/// | `permissions` | `0o644` files, `0o755` directories |
/// | `compression` | the archive compression |
///
/// This struct is marked `#[non_exhaustive]`; build it with
/// [`file`](Self::file) / [`directory`](Self::directory) and the `with_*`
/// methods.
///
/// # Example
///
/// ```rust
/// use arcstream::{Compression, EntryMetadata};
///
/// let meta = EntryMetadata::file("docs/readme.txt")?
///     .with_encoding("ISO-8859-1")
///     .with_compression(Compression::Store);
/// assert!(!meta.is_directory());
/// # Ok::<(), arcstream::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct EntryMetadata {
    /// Container-relative path, without a trailing slash.
    pub path: ArchivePath,
    /// Regular file or directory.
    pub kind: EntryKind,
    /// Uncompressed size in bytes, when known.
    pub size: Option<u64>,
    /// Last modification time.
    pub modified: Option<Timestamp>,
    /// Text encoding name applied to text content sources.
    pub encoding: String,
    /// Per-entry compression override (ZIP only).
    pub compression: Option<Compression>,
    /// Compressed size in bytes, when the container declares it.
    ///
    /// Informational; ignored when writing.
    pub compressed_size: Option<u64>,
    /// Unix permission bits.
    pub permissions: Option<u32>,
}

impl EntryMetadata {
    /// Creates metadata for a regular file at a caller-supplied path.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArchivePath`] if the path is rejected.
    pub fn file(path: &str) -> Result<Self> {
        Ok(Self::new(ArchivePath::new(path)?, EntryKind::Regular))
    }

    /// Creates metadata for a directory at a caller-supplied path.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArchivePath`] if the path is rejected.
    pub fn directory(path: &str) -> Result<Self> {
        Ok(Self::new(ArchivePath::new(path)?, EntryKind::Directory))
    }

    /// Creates metadata with an already-built path.
    pub fn new(path: ArchivePath, kind: EntryKind) -> Self {
        Self {
            path,
            kind,
            size: None,
            modified: None,
            encoding: DEFAULT_ENCODING.to_string(),
            compression: None,
            compressed_size: None,
            permissions: None,
        }
    }

    /// Sets the declared size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the modification time.
    pub fn with_modified(mut self, modified: Timestamp) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Sets the text encoding.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Sets the per-entry compression override.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Sets the Unix permission bits.
    pub fn with_permissions(mut self, mode: u32) -> Self {
        self.permissions = Some(mode);
        self
    }

    /// Returns true if this is a directory entry.
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Returns the entry path as a string slice.
    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    /// Returns the permission bits to write for this entry.
    pub fn effective_permissions(&self) -> u32 {
        self.permissions.map(|m| m & 0o7777).unwrap_or(match self.kind {
            EntryKind::Regular => DEFAULT_FILE_MODE,
            EntryKind::Directory => DEFAULT_DIRECTORY_MODE,
        })
    }

    /// Returns the modification time to write for this entry.
    pub fn effective_modified(&self) -> Timestamp {
        self.modified.unwrap_or_else(Timestamp::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_defaults() {
        let meta = EntryMetadata::file("a.txt").unwrap();
        assert_eq!(meta.kind, EntryKind::Regular);
        assert_eq!(meta.size, None);
        assert_eq!(meta.encoding, "UTF-8");
        assert_eq!(meta.effective_permissions(), 0o644);
        assert!(meta.compression.is_none());
    }

    #[test]
    fn test_directory_defaults() {
        let meta = EntryMetadata::directory("dir/").unwrap();
        assert!(meta.is_directory());
        assert_eq!(meta.path(), "dir");
        assert_eq!(meta.effective_permissions(), 0o755);
    }

    #[test]
    fn test_permissions_masked() {
        let meta = EntryMetadata::file("x").unwrap().with_permissions(0o100600);
        assert_eq!(meta.effective_permissions(), 0o600);
    }

    #[test]
    fn test_effective_modified_prefers_explicit() {
        let ts = Timestamp::from_unix_secs(42);
        let meta = EntryMetadata::file("x").unwrap().with_modified(ts);
        assert_eq!(meta.effective_modified(), ts);
    }

    #[test]
    fn test_invalid_path_rejected() {
        assert!(EntryMetadata::file("../x").is_err());
    }
}
