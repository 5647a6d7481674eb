//! # arcstream
//!
//! Streaming read, create, update and delete for TAR and ZIP archives.
//!
//! Archives are processed one entry at a time. Reading walks a forward-only
//! cursor over the source; writing appends entries to a sink; editing
//! rebuilds the archive in a single pass, streaming kept entries from the
//! original into the new one. No archive is ever held in memory as a whole
//! unless the caller hands over an in-memory buffer.
//!
//! ## Supported layouts
//!
//! | Format | Compression |
//! |--------|-------------|
//! | ZIP | `store`, `deflate` (per archive or per entry) |
//! | TAR | none, `gzip`, `bzip2`, `lzma` (whole stream) |
//!
//! `bzip2` and `lzma` sit behind the default features of the same name.
//!
//! ## Quick Start
//!
//! ### Creating an Archive
//!
//! ```rust
//! use arcstream::{ArchiveOptions, Compression, ContentValue, EntryMetadata, Format};
//!
//! let options = ArchiveOptions::new()
//!     .format(Format::Tar)
//!     .compression(Compression::Gzip);
//!
//! let archive = arcstream::create(
//!     vec![EntryMetadata::directory("docs")?, EntryMetadata::file("docs/a.txt")?],
//!     vec![ContentValue::text(""), ContentValue::text("hello")],
//!     &options,
//! )?;
//! # Ok::<(), arcstream::Error>(())
//! ```
//!
//! ### Reading an Archive
//!
//! ```rust
//! use arcstream::{ArchiveOptions, ArchiveReader, ByteSource, ContentValue, EntryMetadata};
//!
//! # let archive = arcstream::create(
//! #     vec![EntryMetadata::file("a.txt")?],
//! #     vec![ContentValue::text("hello")],
//! #     &ArchiveOptions::default(),
//! # )?;
//! let mut reader = ArchiveReader::open(ByteSource::memory(archive))?;
//! while let Some(entry) = reader.next_header()? {
//!     let bytes = reader.read_content()?;
//!     println!("{}: {} bytes", entry.path(), bytes.len());
//! }
//! # Ok::<(), arcstream::Error>(())
//! ```
//!
//! ### Extracting Values
//!
//! ```rust
//! use arcstream::{ArchiveOptions, ContentValue, EntryMetadata, NameSelection};
//!
//! # let archive = arcstream::create(
//! #     vec![EntryMetadata::file("a.txt")?, EntryMetadata::file("b.txt")?],
//! #     vec![ContentValue::text("one"), ContentValue::text("two")],
//! #     &ArchiveOptions::default(),
//! # )?;
//! let texts = arcstream::extract_text(archive, &NameSelection::names(["b.txt"]), "UTF-8")?;
//! assert_eq!(texts, ["two"]);
//! # Ok::<(), arcstream::Error>(())
//! ```
//!
//! ### Editing an Archive
//!
//! ```rust
//! use arcstream::{ArchiveOptions, ContentValue, EntryMetadata};
//!
//! # let archive = arcstream::create(
//! #     vec![EntryMetadata::file("a.txt")?],
//! #     vec![ContentValue::text("old")],
//! #     &ArchiveOptions::default(),
//! # )?;
//! let updated = arcstream::update(
//!     archive,
//!     vec![EntryMetadata::file("a.txt")?],
//!     vec![ContentValue::text("new")],
//! )?;
//! let emptied = arcstream::delete(updated, ["a.txt"])?;
//! assert!(arcstream::entries(emptied)?.is_empty());
//! # Ok::<(), arcstream::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `bzip2` | Yes | BZip2 layer for TAR |
//! | `lzma` | Yes | LZMA-alone (`.lzma`, not xz) layer for TAR |
//!
//! Requesting a compression whose feature is disabled fails with
//! [`Error::CompressionAlgorithmUnavailable`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod archive_path;
pub mod codec;
pub mod content;
pub mod edit;
pub mod encoding;
pub mod entry;
pub mod error;
pub mod format;
pub mod read;
pub mod source;
pub mod timestamp;
pub mod write;

pub use archive_path::ArchivePath;
pub use error::{Error, Result};
pub use timestamp::Timestamp;

pub use content::{ContentValue, NormalizedContent, normalize};
pub use encoding::TextEncoding;
pub use entry::{EntryKind, EntryMetadata};
pub use format::{ArchiveOptions, Compression, Format, Layout};
pub use source::{ByteSource, ReadSeek};

pub use read::{
    ArchiveReader, EntryContent, Extract, ExtractMode, ExtractOptions, ExtractedValue, MatchMode,
    NameSelection, NameSet, archive_options, entries,
};
pub use read::extract::{extract, extract_binary, extract_text};

pub use write::create::{create, create_into};
pub use write::{ArchiveWriter, WriteResult};

pub use edit::{ArchiveEditor, EditMode, EditResult, EditableArchive, Operation, delete, update};
