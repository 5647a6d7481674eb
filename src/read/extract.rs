//! Lazy extraction of entry contents.
//!
//! [`Extract`] owns an [`ArchiveReader`] and yields one value per matching
//! entry as it is iterated. The sequence is forward-only; extracting again
//! needs a fresh source.

use super::{ArchiveReader, MatchMode, NameSet};
use crate::encoding::TextEncoding;
use crate::entry::{DEFAULT_ENCODING, EntryMetadata};
use crate::source::ByteSource;
use crate::Result;

/// Which entries to extract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NameSelection {
    /// Every regular file, in archive order. Directories are passed over.
    #[default]
    All,
    /// Entries whose path is in the set, in archive order.
    Names(NameSet),
}

impl NameSelection {
    /// Selects every regular file.
    pub fn all() -> Self {
        Self::All
    }

    /// Selects the given paths.
    pub fn names<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::Names(names.into_iter().collect())
    }
}

impl From<NameSet> for NameSelection {
    fn from(names: NameSet) -> Self {
        Self::Names(names)
    }
}

/// How extracted bytes are returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtractMode {
    /// Decode as text in the configured encoding.
    #[default]
    Text,
    /// Return raw bytes.
    Binary,
}

/// Options for [`extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Text or binary output.
    pub mode: ExtractMode,
    /// Encoding of entry bytes in text mode.
    pub encoding: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            mode: ExtractMode::Text,
            encoding: DEFAULT_ENCODING.to_string(),
        }
    }
}

impl ExtractOptions {
    /// Text mode in UTF-8.
    pub fn text() -> Self {
        Self::default()
    }

    /// Binary mode.
    pub fn binary() -> Self {
        Self {
            mode: ExtractMode::Binary,
            ..Self::default()
        }
    }

    /// Sets the text encoding.
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }
}

/// One extracted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedValue {
    /// Decoded text.
    Text(String),
    /// Raw bytes.
    Binary(Vec<u8>),
}

impl ExtractedValue {
    /// Returns the text, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Returns the value as bytes (text re-encoded as UTF-8).
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.into_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

/// Lazy iterator over extracted entries.
#[derive(Debug)]
pub struct Extract<'a> {
    reader: ArchiveReader<'a>,
    selection: NameSelection,
    text: Option<TextEncoding>,
    finished: bool,
}

impl<'a> Extract<'a> {
    /// Wraps an open reader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEncoding`](crate::Error::InvalidEncoding) in
    /// text mode if the encoding is unknown.
    pub fn new(
        reader: ArchiveReader<'a>,
        selection: NameSelection,
        options: &ExtractOptions,
    ) -> Result<Self> {
        let text = match options.mode {
            ExtractMode::Text => Some(TextEncoding::for_label(&options.encoding)?),
            ExtractMode::Binary => None,
        };
        Ok(Self {
            reader,
            selection,
            text,
            finished: false,
        })
    }

    fn next_match(&mut self) -> Result<Option<EntryMetadata>> {
        match &self.selection {
            NameSelection::Names(names) => self.reader.lookup(names, MatchMode::Include),
            NameSelection::All => {
                while let Some(entry) = self.reader.next_header()? {
                    if !entry.is_directory() {
                        return Ok(Some(entry));
                    }
                }
                Ok(None)
            }
        }
    }

    fn next_value(&mut self) -> Result<Option<(EntryMetadata, ExtractedValue)>> {
        let Some(entry) = self.next_match()? else {
            return Ok(None);
        };
        let bytes = self.reader.read_content()?;
        log::debug!("Extracted '{}' ({} bytes)", entry.path(), bytes.len());
        let value = match self.text {
            Some(encoding) => ExtractedValue::Text(encoding.decode(&bytes)),
            None => ExtractedValue::Binary(bytes),
        };
        Ok(Some((entry, value)))
    }
}

impl Iterator for Extract<'_> {
    type Item = Result<(EntryMetadata, ExtractedValue)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.next_value().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
            self.reader.close();
        }
        item
    }
}

/// Extracts entries lazily.
///
/// # Example
///
/// ```rust
/// use arcstream::{ArchiveOptions, ContentValue, EntryMetadata, ExtractOptions, NameSelection};
///
/// let archive = arcstream::create(
///     vec![EntryMetadata::file("a.txt")?, EntryMetadata::file("b.txt")?],
///     vec![ContentValue::text("hello"), ContentValue::text("world")],
///     &ArchiveOptions::default(),
/// )?;
///
/// let selection = NameSelection::names(["b.txt"]);
/// let mut values = arcstream::extract(archive, &selection, &ExtractOptions::text())?;
/// let (entry, value) = values.next().unwrap()?;
/// assert_eq!(entry.path(), "b.txt");
/// assert_eq!(value.as_text(), Some("world"));
/// assert!(values.next().is_none());
/// # Ok::<(), arcstream::Error>(())
/// ```
///
/// # Errors
///
/// Errors from [`ArchiveReader::open`] and [`Extract::new`]; per-entry
/// failures are yielded by the iterator and end it.
pub fn extract<'a>(
    source: impl Into<ByteSource<'a>>,
    selection: &NameSelection,
    options: &ExtractOptions,
) -> Result<Extract<'a>> {
    let reader = ArchiveReader::open(source.into())?;
    Extract::new(reader, selection.clone(), options)
}

/// Extracts the selected entries as text decoded from `encoding`.
///
/// # Errors
///
/// As for [`extract`], collected eagerly.
pub fn extract_text<'a>(
    source: impl Into<ByteSource<'a>>,
    selection: &NameSelection,
    encoding: &str,
) -> Result<Vec<String>> {
    let options = ExtractOptions::text().encoding(encoding);
    extract(source, selection, &options)?
        .map(|item| {
            item.map(|(_, value)| match value {
                ExtractedValue::Text(text) => text,
                ExtractedValue::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            })
        })
        .collect()
}

/// Extracts the selected entries as raw bytes.
///
/// # Errors
///
/// As for [`extract`], collected eagerly.
pub fn extract_binary<'a>(
    source: impl Into<ByteSource<'a>>,
    selection: &NameSelection,
) -> Result<Vec<Vec<u8>>> {
    extract(source, selection, &ExtractOptions::binary())?
        .map(|item| item.map(|(_, value)| value.into_bytes()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn tar_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut dir = tar::Header::new_gnu();
        dir.set_entry_type(tar::EntryType::Directory);
        dir.set_size(0);
        dir.set_mode(0o755);
        builder.append_data(&mut dir, "dir/", std::io::empty()).unwrap();
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_all_skips_directories() {
        let bytes = tar_archive(&[("dir/a.txt", b"one"), ("b.txt", b"two")]);
        let texts = extract_text(bytes, &NameSelection::all(), "UTF-8").unwrap();
        assert_eq!(texts, ["one", "two"]);
    }

    #[test]
    fn test_named_selection_keeps_archive_order() {
        let bytes = tar_archive(&[("a", b"1"), ("b", b"2"), ("c", b"3")]);
        let selection = NameSelection::names(["c", "a"]);
        let values = extract_binary(bytes, &selection).unwrap();
        assert_eq!(values, vec![b"1".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn test_text_decoding() {
        let bytes = tar_archive(&[("latin.txt", b"caf\xE9")]);
        let texts = extract_text(bytes, &NameSelection::all(), "ISO-8859-1").unwrap();
        assert_eq!(texts, ["café"]);
    }

    #[test]
    fn test_invalid_encoding_fails_before_reading() {
        let bytes = tar_archive(&[("a", b"1")]);
        let err = extract(bytes, &NameSelection::all(), &ExtractOptions::text().encoding("nope"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEncoding { .. }));
    }

    #[test]
    fn test_iterator_is_lazy_and_finite() {
        let bytes = tar_archive(&[("a", b"1"), ("b", b"2")]);
        let mut values = extract(bytes, &NameSelection::all(), &ExtractOptions::binary()).unwrap();
        let (first, _) = values.next().unwrap().unwrap();
        assert_eq!(first.path(), "a");
        assert!(values.next().is_some());
        assert!(values.next().is_none());
        assert!(values.next().is_none());
    }

    #[test]
    fn test_corruption_ends_iteration() {
        let mut bytes = tar_archive(&[("a", &[1u8; 1000]), ("b", b"2")]);
        bytes.truncate(512 * 3);
        let mut values = extract(bytes, &NameSelection::all(), &ExtractOptions::binary()).unwrap();
        assert!(values.next().unwrap().unwrap_err().is_corruption());
        assert!(values.next().is_none());
    }
}
