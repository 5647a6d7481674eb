//! Bulk archive creation.

use std::io::{Cursor, Seek, Write};

use super::{ArchiveWriter, WriteResult};
use crate::content::ContentValue;
use crate::entry::EntryMetadata;
use crate::format::ArchiveOptions;
use crate::{Error, Result};

/// Writes each entry with the content value at the same position.
///
/// Both sequences must have the same length. A short content sequence is
/// detected when the missing value is needed; surplus values are detected
/// once every entry has been written.
pub(crate) fn write_pairs<'a, W: Write + Seek>(
    writer: &mut ArchiveWriter<W>,
    entries: Vec<EntryMetadata>,
    contents: impl IntoIterator<Item = ContentValue<'a>>,
) -> Result<()> {
    let total = entries.len();
    let mut contents = contents.into_iter();
    for (index, meta) in entries.iter().enumerate() {
        let Some(value) = contents.next() else {
            return Err(Error::EntryCountMismatch {
                entries: total,
                contents: index,
            });
        };
        writer.write_value(meta, value)?;
    }
    if contents.next().is_some() {
        return Err(Error::EntryCountMismatch {
            entries: total,
            contents: total + 1 + contents.count(),
        });
    }
    Ok(())
}

/// Creates an archive in `sink` from entries and their contents.
///
/// # Errors
///
/// - Configuration errors from [`ArchiveOptions::validate`].
/// - [`Error::EntryCountMismatch`] if the counts differ.
/// - Errors from [`ArchiveWriter::write_value`].
pub fn create_into<'a, W: Write + Seek>(
    sink: W,
    entries: impl IntoIterator<Item = EntryMetadata>,
    contents: impl IntoIterator<Item = ContentValue<'a>>,
    options: &ArchiveOptions,
) -> Result<(WriteResult, W)> {
    let mut writer = ArchiveWriter::open(sink, options)?;
    write_pairs(&mut writer, entries.into_iter().collect(), contents)?;
    writer.finish()
}

/// Creates an archive in memory.
///
/// # Example
///
/// ```rust
/// use arcstream::{ArchiveOptions, ContentValue, EntryMetadata, Error};
///
/// let err = arcstream::create(
///     vec![EntryMetadata::file("a")?, EntryMetadata::file("b")?],
///     vec![ContentValue::text("only one")],
///     &ArchiveOptions::default(),
/// )
/// .unwrap_err();
/// assert!(matches!(err, Error::EntryCountMismatch { entries: 2, contents: 1 }));
/// # Ok::<(), arcstream::Error>(())
/// ```
///
/// # Errors
///
/// As for [`create_into`].
pub fn create<'a>(
    entries: impl IntoIterator<Item = EntryMetadata>,
    contents: impl IntoIterator<Item = ContentValue<'a>>,
    options: &ArchiveOptions,
) -> Result<Vec<u8>> {
    let (_, sink) = create_into(Cursor::new(Vec::new()), entries, contents, options)?;
    Ok(sink.into_inner())
}
