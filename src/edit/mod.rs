//! Archive editing.
//!
//! TAR and ZIP containers are forward-only, so there is no in-place edit.
//! Update and delete rewrite the whole archive in one pass:
//!
//! 1. Open a reader on the original and scan to the first entry whose name
//!    is neither replaced nor deleted, using
//!    [`ArchiveReader::lookup`](crate::ArchiveReader::lookup) with
//!    [`MatchMode::Exclude`](crate::MatchMode::Exclude). The format and
//!    compression of the new archive are taken from the original at this
//!    point; an archive without any entries falls back to caller-supplied
//!    or default options.
//! 2. Open a writer with those options.
//! 3. Replay that entry and every later one the same scan stops on. Kept
//!    content is streamed from the reader straight into the writer.
//! 4. For an update, append the new entries.
//!
//! Memory use stays at one entry's buffer at most; a kept entry is never
//! held in memory.
//!
//! # Entries that do not survive a rebuild
//!
//! Only regular files and directories are carried over. Symbolic links,
//! hard links, device nodes and FIFOs in a TAR source, and symbolic links
//! in a ZIP source, are skipped by the reader with a warning. They are
//! missing from the rebuilt archive even when no name is deleted.
//!
//! # Example
//!
//! ```rust
//! use arcstream::{ArchiveOptions, ContentValue, EntryMetadata, NameSelection};
//!
//! let archive = arcstream::create(
//!     vec![EntryMetadata::file("a.txt")?, EntryMetadata::file("b.txt")?],
//!     vec![ContentValue::text("hello"), ContentValue::text("old")],
//!     &ArchiveOptions::default(),
//! )?;
//!
//! let updated = arcstream::update(
//!     archive,
//!     vec![EntryMetadata::file("b.txt")?],
//!     vec![ContentValue::text("new")],
//! )?;
//! let texts = arcstream::extract_text(updated.clone(), &NameSelection::all(), "UTF-8")?;
//! assert_eq!(texts, ["hello", "new"]);
//!
//! let trimmed = arcstream::delete(updated, ["a.txt"])?;
//! assert_eq!(arcstream::entries(trimmed)?.len(), 1);
//! # Ok::<(), arcstream::Error>(())
//! ```

mod editor;
mod operation;

pub use editor::{ArchiveEditor, EditResult, EditableArchive};
pub use operation::{EditMode, Operation};

use std::io::Cursor;

use crate::content::ContentValue;
use crate::entry::EntryMetadata;
use crate::source::ByteSource;
use crate::{Error, Result};

/// Replaces or adds entries, returning the new archive.
///
/// Each entry is paired with the content value at the same position. Every
/// original entry whose path matches a new entry is dropped; the new
/// entries are appended after the kept ones.
///
/// # Errors
///
/// - [`Error::EntryCountMismatch`] if the counts differ, before the source
///   is read.
/// - Errors from [`ArchiveEditor::apply`].
pub fn update<'a>(
    source: impl Into<ByteSource<'a>>,
    entries: impl IntoIterator<Item = EntryMetadata>,
    contents: impl IntoIterator<Item = ContentValue<'a>>,
) -> Result<Vec<u8>> {
    let entries: Vec<_> = entries.into_iter().collect();
    let contents: Vec<_> = contents.into_iter().collect();
    if entries.len() != contents.len() {
        return Err(Error::EntryCountMismatch {
            entries: entries.len(),
            contents: contents.len(),
        });
    }

    let mut editor = ArchiveEditor::open(source)?;
    for (meta, content) in entries.into_iter().zip(contents) {
        editor.put(meta, content);
    }
    let (_, output) = editor.apply(Cursor::new(Vec::new()))?;
    Ok(output.into_inner())
}

/// Removes every entry whose name is in `names`, returning the new archive.
///
/// Names that do not occur in the archive are ignored, so deleting twice
/// gives the same result as deleting once.
///
/// # Errors
///
/// Errors from [`ArchiveEditor::apply`].
pub fn delete<'a, S: AsRef<str>>(
    source: impl Into<ByteSource<'a>>,
    names: impl IntoIterator<Item = S>,
) -> Result<Vec<u8>> {
    let mut editor = ArchiveEditor::open(source)?;
    for name in names {
        editor.delete(name.as_ref());
    }
    let (_, output) = editor.apply(Cursor::new(Vec::new()))?;
    Ok(output.into_inner())
}
