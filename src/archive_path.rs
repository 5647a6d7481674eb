//! Entry path type for container-relative paths.

use crate::{Error, Result};
use std::fmt;

/// Maximum length for caller-supplied entry paths (in bytes).
///
/// GNU long-name records and PAX headers let TAR store paths of any length,
/// so this only guards against absurd inputs.
const MAX_PATH_LENGTH: usize = 32768;

/// A container-relative entry path.
///
/// Paths always use forward slashes and never carry a trailing slash;
/// directory-ness is a property of the entry, not of its path. Writers add
/// the trailing slash back where the container expects one.
///
/// Paths supplied by callers go through [`ArchivePath::new`], which rejects:
/// - empty paths and NUL bytes
/// - absolute paths (leading `/`)
/// - empty segments (`a//b`)
/// - `.` and `..` segments
///
/// Paths read from an existing archive go through [`ArchivePath::from_archive`],
/// which keeps them as stored so that replayed entries are byte-identical.
///
/// # Examples
///
/// ```
/// use arcstream::ArchivePath;
///
/// let path = ArchivePath::new("dir/file.txt").unwrap();
/// assert_eq!(path.as_str(), "dir/file.txt");
///
/// // A single trailing slash is normalized away
/// assert_eq!(ArchivePath::new("dir/").unwrap().as_str(), "dir");
///
/// assert!(ArchivePath::new("../secret").is_err());
/// assert!(ArchivePath::new("/absolute/path").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchivePath(String);

impl ArchivePath {
    /// Creates a new `ArchivePath` from a caller-supplied string, validating it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArchivePath`] if the path is empty, contains a
    /// NUL byte, is absolute, or contains empty, `.` or `..` segments.
    pub fn new(s: &str) -> Result<Self> {
        let trimmed = s.strip_suffix('/').unwrap_or(s);
        Self::validate(trimmed)?;
        Ok(Self(trimmed.to_string()))
    }

    /// Creates an `ArchivePath` from a name stored in an existing archive.
    ///
    /// No validation is applied apart from removing trailing slashes.
    pub fn from_archive(raw: &str) -> Self {
        let trimmed = raw.trim_end_matches('/');
        if trimmed.is_empty() {
            Self(raw.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    fn validate(s: &str) -> Result<()> {
        if s.contains('\0') {
            return Err(Error::InvalidArchivePath("contains NUL byte".into()));
        }

        if s.is_empty() {
            return Err(Error::InvalidArchivePath("empty path".into()));
        }

        if s.len() > MAX_PATH_LENGTH {
            return Err(Error::InvalidArchivePath(format!(
                "path exceeds maximum length of {} bytes",
                MAX_PATH_LENGTH
            )));
        }

        if s.starts_with('/') {
            return Err(Error::InvalidArchivePath(
                "absolute path not allowed".into(),
            ));
        }

        for segment in s.split('/') {
            if segment.is_empty() {
                return Err(Error::InvalidArchivePath(
                    "empty segment (consecutive slashes)".into(),
                ));
            }
            if segment == "." {
                return Err(Error::InvalidArchivePath("'.' segment not allowed".into()));
            }
            if segment == ".." {
                return Err(Error::InvalidArchivePath(
                    "'..' segment not allowed (path traversal)".into(),
                ));
            }
        }

        Ok(())
    }

    /// Returns the path as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the path with a trailing slash, as directories are stored.
    pub fn as_directory(&self) -> String {
        format!("{}/", self.0)
    }

    /// Returns the file name (last segment) of this path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Returns the parent directory of this path, if any.
    pub fn parent(&self) -> Option<Self> {
        self.0.rfind('/').map(|idx| Self(self.0[..idx].to_string()))
    }
}

impl AsRef<str> for ArchivePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for ArchivePath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ArchivePath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_nested_path() {
        let path = ArchivePath::new("dir/file.txt").unwrap();
        assert_eq!(path.as_str(), "dir/file.txt");
    }

    #[test]
    fn test_valid_unicode() {
        let path = ArchivePath::new("日本語/файл.txt").unwrap();
        assert_eq!(path.as_str(), "日本語/файл.txt");
    }

    #[test]
    fn test_trailing_slash_normalized() {
        let path = ArchivePath::new("dir/").unwrap();
        assert_eq!(path.as_str(), "dir");
        assert_eq!(path.as_directory(), "dir/");
    }

    #[test]
    fn test_invalid_empty() {
        let err = ArchivePath::new("").unwrap_err();
        assert!(matches!(err, Error::InvalidArchivePath(_)));
        assert!(ArchivePath::new("/").is_err());
    }

    #[test]
    fn test_invalid_nul_byte() {
        let err = ArchivePath::new("file\0.txt").unwrap_err();
        assert!(err.to_string().contains("NUL"));
    }

    #[test]
    fn test_invalid_absolute_path() {
        let err = ArchivePath::new("/etc/passwd").unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn test_invalid_empty_segment() {
        let err = ArchivePath::new("a//b").unwrap_err();
        assert!(err.to_string().contains("empty segment"));
    }

    #[test]
    fn test_invalid_dot_segments() {
        assert!(ArchivePath::new("./file").is_err());
        assert!(ArchivePath::new("a/../b").is_err());
        let err = ArchivePath::new("../secret").unwrap_err();
        assert!(err.to_string().contains(".."));
    }

    #[test]
    fn test_from_archive_keeps_stored_name() {
        assert_eq!(ArchivePath::from_archive("./a.txt").as_str(), "./a.txt");
        assert_eq!(ArchivePath::from_archive("docs/").as_str(), "docs");
        assert_eq!(ArchivePath::from_archive("/").as_str(), "/");
    }

    #[test]
    fn test_file_name_and_parent() {
        let path = ArchivePath::new("a/b/c.txt").unwrap();
        assert_eq!(path.file_name(), "c.txt");
        assert_eq!(path.parent().unwrap().as_str(), "a/b");
        assert!(ArchivePath::new("c.txt").unwrap().parent().is_none());
    }
}
