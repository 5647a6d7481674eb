//! Archive editor: the filter-rebuild loop behind update and delete.

use std::io::{self, Read, Seek, Write};

use crate::content::ContentValue;
use crate::entry::EntryMetadata;
use crate::format::ArchiveOptions;
use crate::read::{ArchiveReader, MatchMode, NameSet};
use crate::source::ByteSource;
use crate::write::ArchiveWriter;
use crate::{Error, Result};

use super::operation::{EditMode, Operation};

/// Result of an edit operation.
#[must_use = "edit result should be checked to verify operation completed as expected"]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditResult {
    /// Number of entries replayed unchanged.
    pub entries_kept: usize,
    /// Number of original entries dropped because a new entry replaces them.
    pub entries_replaced: usize,
    /// Number of original entries dropped by a delete.
    pub entries_deleted: usize,
    /// Number of entries appended after the kept ones.
    pub entries_added: usize,
    /// Uncompressed data bytes in the new archive.
    pub total_bytes: u64,
    /// Bytes written to the output.
    pub packed_bytes: u64,
}

impl EditResult {
    /// Returns the total number of entries in the resulting archive.
    pub fn total_entries(&self) -> usize {
        self.entries_kept + self.entries_added
    }

    /// Returns the compression ratio (packed / total).
    pub fn compression_ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            1.0
        } else {
            self.packed_bytes as f64 / self.total_bytes as f64
        }
    }
}

/// An editor for rewriting archive contents.
///
/// Operations are queued and only applied when [`apply`](Self::apply) is
/// called. Applying streams the source archive once: entries not named by
/// any operation are replayed into a new archive of the same format and
/// compression, then replacement and new entries are appended.
///
/// # Example
///
/// ```rust
/// use arcstream::{ArchiveEditor, ArchiveOptions, ContentValue, EntryMetadata};
/// use std::io::Cursor;
///
/// let original = arcstream::create(
///     vec![EntryMetadata::file("a.txt")?, EntryMetadata::file("b.txt")?],
///     vec![ContentValue::text("one"), ContentValue::text("two")],
///     &ArchiveOptions::default(),
/// )?;
///
/// let mut editor = ArchiveEditor::open(original)?;
/// editor.delete("a.txt");
/// editor.put(EntryMetadata::file("c.txt")?, ContentValue::text("three"));
/// let (result, output) = editor.apply(Cursor::new(Vec::new()))?;
///
/// assert_eq!(result.entries_kept, 1);
/// assert_eq!(result.entries_deleted, 1);
/// assert_eq!(result.entries_added, 1);
/// let names: Vec<_> = arcstream::entries(output.into_inner())?
///     .into_iter()
///     .map(|e| e.path().to_string())
///     .collect();
/// assert_eq!(names, ["b.txt", "c.txt"]);
/// # Ok::<(), arcstream::Error>(())
/// ```
#[derive(Debug)]
pub struct ArchiveEditor<'a> {
    reader: ArchiveReader<'a>,
    operations: Vec<Operation<'a>>,
    options: Option<ArchiveOptions>,
}

impl<'a> ArchiveEditor<'a> {
    /// Opens an editor over an existing archive.
    ///
    /// # Errors
    ///
    /// Errors from [`ArchiveReader::open`].
    pub fn open(source: impl Into<ByteSource<'a>>) -> Result<Self> {
        Ok(Self::new(ArchiveReader::open(source.into())?))
    }

    /// Creates an editor over an open reader that has not been advanced.
    pub fn new(reader: ArchiveReader<'a>) -> Self {
        Self {
            reader,
            operations: Vec::new(),
            options: None,
        }
    }

    /// Sets the options used when the source archive has no entries.
    ///
    /// An archive with at least one entry is always rewritten with its own
    /// format and compression.
    pub fn with_options(mut self, options: ArchiveOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Returns the number of pending operations.
    pub fn pending_operations(&self) -> usize {
        self.operations.len()
    }

    /// Returns whether there are any pending operations.
    pub fn has_pending_operations(&self) -> bool {
        !self.operations.is_empty()
    }

    /// Clears all pending operations.
    pub fn clear_operations(&mut self) {
        self.operations.clear();
    }

    /// Queues deletion of every entry named `name`. Deleting a name the
    /// archive does not contain is a no-op.
    pub fn delete(&mut self, name: &str) {
        self.operations.push(Operation::Delete {
            name: name.to_string(),
        });
    }

    /// Queues a new entry that replaces any existing entry at the same path.
    pub fn put(&mut self, meta: EntryMetadata, content: ContentValue<'a>) {
        self.operations.push(Operation::Put { meta, content });
    }

    /// Applies all pending operations, writing the new archive to `output`.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedOptions`] / [`Error::UnsupportedPerEntryCompression`]
    ///   for per-entry overrides the sniffed format cannot honor, and
    ///   [`Error::InvalidContentType`] for unusable content values. Both are
    ///   raised before the writer is opened.
    /// - [`Error::CorruptedArchive`] if the source cannot be read.
    /// - Errors from [`ArchiveWriter`].
    pub fn apply<W: Write + Seek>(self, output: W) -> Result<(EditResult, W)> {
        let mut dropped = NameSet::new();
        let mut replaced = NameSet::new();
        let mut additions = Vec::new();
        for operation in self.operations {
            match operation {
                Operation::Delete { name } => {
                    dropped.insert(name);
                }
                Operation::Put { meta, content } => {
                    dropped.insert(meta.path());
                    replaced.insert(meta.path());
                    additions.push((meta, content));
                }
            }
        }
        let mode = if additions.is_empty() {
            EditMode::Delete
        } else {
            EditMode::Update
        };
        Rebuild {
            reader: self.reader,
            dropped,
            replaced,
            mode,
            fallback: self.options,
        }
        .run(additions, output)
    }
}

/// Trait extension for [`ArchiveReader`] to enable editing.
pub trait EditableArchive<'a>: Sized {
    /// Creates an editor for this archive.
    fn edit(self) -> ArchiveEditor<'a>;
}

impl<'a> EditableArchive<'a> for ArchiveReader<'a> {
    fn edit(self) -> ArchiveEditor<'a> {
        ArchiveEditor::new(self)
    }
}

/// One pass of the filter-rebuild algorithm.
struct Rebuild<'a> {
    reader: ArchiveReader<'a>,
    /// Every name that is deleted or replaced.
    dropped: NameSet,
    replaced: NameSet,
    mode: EditMode,
    fallback: Option<ArchiveOptions>,
}

impl<'a> Rebuild<'a> {
    fn run<W: Write + Seek>(
        mut self,
        additions: Vec<(EntryMetadata, ContentValue<'a>)>,
        output: W,
    ) -> Result<(EditResult, W)> {
        let mut result = EditResult::default();

        // Sniff options at the first kept entry; it is replayed below
        let first = self.next_kept(&mut result)?;
        let is_empty = first.is_none() && result.entries_replaced + result.entries_deleted == 0;
        let options = match self.fallback {
            Some(fallback) if is_empty => fallback,
            _ => self.reader.options(),
        };

        for (meta, content) in &additions {
            if let Some(compression) = meta.compression {
                options.validate_entry_override(meta.path(), compression)?;
            }
            if let ContentValue::Other { type_name } = content {
                return Err(Error::InvalidContentType {
                    content_type: type_name.clone(),
                });
            }
        }

        let mut writer = ArchiveWriter::open(output, &options)?;

        let mut next = first;
        while let Some(entry) = next {
            let name = entry.path();
            if entry.is_directory() {
                writer.write_directory(&entry)?;
            } else {
                let mut content = Tracked::new(self.reader.content_reader()?);
                match writer.write_entry(&entry, &mut content) {
                    Ok(written) => result.total_bytes += written,
                    Err(e) if content.failed => {
                        return Err(Error::corrupted(format!(
                            "entry '{}' could not be read: {}",
                            name, e
                        )));
                    }
                    Err(e) => return Err(e),
                }
            }
            result.entries_kept += 1;
            next = self.next_kept(&mut result)?;
        }
        self.reader.close();

        if self.mode == EditMode::Update {
            for (meta, content) in additions {
                result.total_bytes += writer.write_value(&meta, content)?;
                result.entries_added += 1;
            }
        }

        let (write_result, output) = writer.finish()?;
        result.packed_bytes = write_result.compressed_size;
        log::debug!(
            "Rebuilt archive: {} kept, {} replaced, {} deleted, {} added",
            result.entries_kept,
            result.entries_replaced,
            result.entries_deleted,
            result.entries_added
        );
        Ok((result, output))
    }
}

impl Rebuild<'_> {
    /// Advances to the next entry that is neither deleted nor replaced,
    /// counting the ones passed over.
    fn next_kept(&mut self, result: &mut EditResult) -> Result<Option<EntryMetadata>> {
        let replaced = &self.replaced;
        self.reader.lookup_with(&self.dropped, MatchMode::Exclude, |entry| {
            if replaced.contains(entry.path()) {
                log::debug!("Replacing entry '{}'", entry.path());
                result.entries_replaced += 1;
            } else {
                log::debug!("Deleting entry '{}'", entry.path());
                result.entries_deleted += 1;
            }
        })
    }
}

/// Records whether a read from the original archive failed.
struct Tracked<R> {
    inner: R,
    failed: bool,
}

impl<R> Tracked<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            failed: false,
        }
    }
}

impl<R: Read> Read for Tracked<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|_| self.failed = true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Compression, Format};
    use std::io::Cursor;

    fn archive(options: &ArchiveOptions, files: &[(&str, &str)]) -> Vec<u8> {
        crate::write::create(
            files.iter().map(|(n, _)| EntryMetadata::file(n).unwrap()),
            files.iter().map(|(_, c)| ContentValue::text(*c)),
            options,
        )
        .unwrap()
    }

    #[test]
    fn test_edit_result_defaults() {
        let result = EditResult::default();
        assert_eq!(result.total_entries(), 0);
        assert_eq!(result.compression_ratio(), 1.0);
    }

    #[test]
    fn test_replace_counts() {
        let bytes = archive(&ArchiveOptions::default(), &[("a", "1"), ("b", "2")]);
        let mut editor = ArchiveEditor::open(bytes).unwrap();
        editor.put(EntryMetadata::file("b").unwrap(), ContentValue::text("new"));
        editor.put(EntryMetadata::file("c").unwrap(), ContentValue::text("3"));
        let (result, _) = editor.apply(Cursor::new(Vec::new())).unwrap();
        assert_eq!(result.entries_kept, 1);
        assert_eq!(result.entries_replaced, 1);
        assert_eq!(result.entries_added, 2);
        assert_eq!(result.total_entries(), 3);
        assert_eq!(result.total_bytes, 1 + 3 + 1);
    }

    #[test]
    fn test_layout_is_mirrored() {
        let options = ArchiveOptions::new()
            .format(Format::Tar)
            .compression(Compression::Gzip);
        let bytes = archive(&options, &[("a", "1")]);
        let mut editor = ArchiveEditor::open(bytes).unwrap();
        editor.delete("nothing");
        let (_, output) = editor
            .with_options(ArchiveOptions::default())
            .apply(Cursor::new(Vec::new()))
            .unwrap();
        assert_eq!(crate::read::archive_options(output.into_inner()).unwrap(), options);
    }

    #[test]
    fn test_dropped_entries_are_counted_while_scanning() {
        let options = ArchiveOptions::new()
            .format(Format::Tar)
            .compression(Compression::Gzip);
        let bytes = archive(&options, &[("a", "1"), ("b", "2"), ("a", "3")]);
        let mut editor = ArchiveEditor::open(bytes)
            .unwrap()
            .with_options(ArchiveOptions::default());
        editor.delete("a");
        editor.put(EntryMetadata::file("b").unwrap(), ContentValue::text("22"));
        let (result, output) = editor.apply(Cursor::new(Vec::new())).unwrap();
        assert_eq!(result.entries_deleted, 2);
        assert_eq!(result.entries_replaced, 1);
        assert_eq!(result.entries_kept, 0);

        // Every entry was dropped, but the source was not empty
        assert_eq!(crate::read::archive_options(output.into_inner()).unwrap(), options);
    }

    #[test]
    fn test_empty_source_uses_fallback() {
        let tar = ArchiveOptions::new().format(Format::Tar);
        let mut editor = ArchiveEditor::open(Vec::new()).unwrap().with_options(tar);
        editor.put(EntryMetadata::file("a").unwrap(), ContentValue::text("1"));
        let (_, output) = editor.apply(Cursor::new(Vec::new())).unwrap();
        let bytes = output.into_inner();
        let sniffed = crate::read::archive_options(bytes.clone()).unwrap();
        assert_eq!(sniffed.format, Format::Tar);
        assert_eq!(sniffed.effective_compression(), Compression::None);
        assert_eq!(crate::read::entries(bytes).unwrap().len(), 1);
    }

    #[test]
    fn test_override_on_tar_rejected_before_writing() {
        let tar = ArchiveOptions::new().format(Format::Tar);
        let bytes = archive(&tar, &[("a", "1")]);
        let mut editor = ArchiveEditor::open(bytes).unwrap();
        editor.put(
            EntryMetadata::file("b")
                .unwrap()
                .with_compression(Compression::Store),
            ContentValue::text("2"),
        );
        let mut output = Cursor::new(Vec::new());
        let err = editor.apply(&mut output).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOptions(_)));
        assert!(output.get_ref().is_empty());
    }

    #[test]
    fn test_invalid_content_rejected_before_writing() {
        let bytes = archive(&ArchiveOptions::default(), &[("a", "1")]);
        let mut editor = ArchiveEditor::open(bytes).unwrap();
        editor.put(EntryMetadata::file("b").unwrap(), ContentValue::other("xs:date"));
        let mut output = Cursor::new(Vec::new());
        assert!(matches!(
            editor.apply(&mut output),
            Err(Error::InvalidContentType { .. })
        ));
        assert!(output.get_ref().is_empty());
    }

    #[test]
    fn test_edit_via_reader_extension() {
        let bytes = archive(&ArchiveOptions::default(), &[("a", "1"), ("b", "2")]);
        let reader = ArchiveReader::open(ByteSource::memory(bytes)).unwrap();
        let mut editor = reader.edit();
        editor.delete("a");
        assert_eq!(editor.pending_operations(), 1);
        let (result, _) = editor.apply(Cursor::new(Vec::new())).unwrap();
        assert_eq!(result.entries_deleted, 1);
        assert_eq!(result.entries_kept, 1);
    }
}
