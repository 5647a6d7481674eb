//! Forward-only archive reading.
//!
//! [`ArchiveReader`] binds to a [`ByteSource`], sniffs the container format
//! and compression layer from the first bytes, and then hands out entries
//! one header at a time. The protocol is strictly sequential:
//!
//! 1. [`next_header`](ArchiveReader::next_header) advances to the next entry.
//! 2. At most one content operation ([`read_content`](ArchiveReader::read_content),
//!    [`content_reader`](ArchiveReader::content_reader),
//!    [`copy_content`](ArchiveReader::copy_content) or
//!    [`skip_content`](ArchiveReader::skip_content)) consumes its data.
//!    A second call for the same header yields no bytes.
//! 3. Unread content is skipped automatically by the next `next_header`.
//!
//! # Example
//!
//! ```rust
//! use arcstream::{ArchiveOptions, ArchiveReader, ByteSource, ContentValue, EntryMetadata};
//!
//! let archive = arcstream::create(
//!     vec![EntryMetadata::file("a.txt")?],
//!     vec![ContentValue::text("hello")],
//!     &ArchiveOptions::default(),
//! )?;
//!
//! let mut reader = ArchiveReader::open(ByteSource::memory(archive))?;
//! while let Some(entry) = reader.next_header()? {
//!     let data = reader.read_content()?;
//!     assert_eq!(entry.size, Some(data.len() as u64));
//! }
//! reader.close();
//! # Ok::<(), arcstream::Error>(())
//! ```

pub mod extract;
mod tar_stream;
mod zip_stream;

pub use extract::{Extract, ExtractMode, ExtractOptions, ExtractedValue, NameSelection};

use std::collections::HashSet;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};

use crate::codec;
use crate::entry::{EntryKind, EntryMetadata};
use crate::format::detect::{Layout, SNIFF_LEN, detect_compression, detect_container};
use crate::format::{ArchiveOptions, Compression, Format};
use crate::source::{ByteSource, ReadSeek};
use crate::timestamp::Timestamp;
use crate::{ArchivePath, Error, Result};

use tar_stream::TarStream;
use zip_stream::ZipStream;

/// Chunk size for copying entry content.
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Upper bound for the buffer preallocated from a declared entry size.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Unix file type mask and symlink type, as stored in ZIP external attributes.
const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

fn read_failed(e: io::Error) -> Error {
    Error::corrupted(format!("failed to read archive: {}", e))
}

fn zip_failed(e: zip::result::ZipError) -> Error {
    match e {
        zip::result::ZipError::Io(e) => read_failed(e),
        other => Error::corrupted(other.to_string()),
    }
}

/// Whether [`ArchiveReader::lookup`] stops on names inside or outside the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Stop on an entry whose path is in the set.
    Include,
    /// Stop on an entry whose path is not in the set.
    Exclude,
}

impl MatchMode {
    /// Returns true if an entry with the given membership is a match.
    pub fn matches(&self, in_set: bool) -> bool {
        match self {
            Self::Include => in_set,
            Self::Exclude => !in_set,
        }
    }
}

/// A set of entry paths, compared without trailing slashes.
///
/// `"docs/"` and `"docs"` name the same entry, matching how directory
/// paths are reported by [`ArchiveReader::next_header`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameSet {
    names: HashSet<String>,
}

fn normalize_name(name: &str) -> &str {
    match name.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => name,
    }
}

impl NameSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a name; returns false if it was already present.
    pub fn insert(&mut self, name: impl AsRef<str>) -> bool {
        self.names.insert(normalize_name(name.as_ref()).to_string())
    }

    /// Returns true if the set contains `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(normalize_name(name))
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for NameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

impl<S: AsRef<str>> Extend<S> for NameSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.insert(name);
        }
    }
}

/// Streaming reader over the content of the current entry.
pub struct EntryContent<'r> {
    inner: Box<dyn Read + 'r>,
}

impl std::fmt::Debug for EntryContent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryContent").finish_non_exhaustive()
    }
}

impl<'r> EntryContent<'r> {
    fn new(inner: impl Read + 'r) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    fn empty() -> Self {
        Self::new(io::empty())
    }
}

impl Read for EntryContent<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Builds entry metadata from a ZIP header; `None` for skipped entries.
fn describe_zip_file(file: &zip::read::ZipFile<'_>) -> Option<EntryMetadata> {
    let kind = if file.is_dir() {
        EntryKind::Directory
    } else if file.unix_mode().is_some_and(|m| m & S_IFMT == S_IFLNK) {
        log::warn!("Skipping ZIP symlink entry '{}'", file.name());
        return None;
    } else {
        EntryKind::Regular
    };

    let compression = Compression::from_zip_method(file.compression());
    if compression.is_none() && kind == EntryKind::Regular {
        log::warn!(
            "ZIP entry '{}' uses method {:?}, which cannot be mirrored on write",
            file.name(),
            file.compression()
        );
    }

    let mut meta = EntryMetadata::new(ArchivePath::from_archive(file.name()), kind);
    meta.size = Some(if kind == EntryKind::Directory { 0 } else { file.size() });
    meta.compressed_size = Some(file.compressed_size());
    meta.modified = file
        .last_modified()
        .map(|dt| Timestamp::from_zip_datetime(&dt));
    meta.permissions = file.unix_mode().map(|m| m & 0o7777);
    meta.compression = compression;
    Some(meta)
}

/// ZIP entries are addressed by index in the central directory.
struct ZipCursor<'a> {
    archive: zip::ZipArchive<Box<dyn ReadSeek + Send + 'a>>,
    next_index: usize,
    current_index: Option<usize>,
}

impl ZipCursor<'_> {
    fn next_entry(&mut self) -> Result<Option<EntryMetadata>> {
        while self.next_index < self.archive.len() {
            let index = self.next_index;
            self.next_index += 1;
            let file = self.archive.by_index_raw(index).map_err(zip_failed)?;
            let Some(meta) = describe_zip_file(&file) else {
                continue;
            };
            self.current_index = Some(index);
            return Ok(Some(meta));
        }
        self.current_index = None;
        Ok(None)
    }

    fn content(&mut self) -> Result<EntryContent<'_>> {
        let Some(index) = self.current_index else {
            return Ok(EntryContent::empty());
        };
        let file = self.archive.by_index(index).map_err(zip_failed)?;
        Ok(EntryContent::new(file))
    }

    /// Method of the first regular file not yet handed out, the closest
    /// thing ZIP has to an archive-wide compression setting.
    fn leading_method(&mut self) -> Compression {
        for index in self.next_index..self.archive.len() {
            let Ok(file) = self.archive.by_index_raw(index) else {
                break;
            };
            if file.is_dir() {
                continue;
            }
            return Compression::from_zip_method(file.compression())
                .unwrap_or_else(|| Format::Zip.default_compression());
        }
        Format::Zip.default_compression()
    }
}

enum Backend<'a> {
    Empty,
    Tar(TarStream<'a>),
    Zip(Box<ZipCursor<'a>>),
    ZipStream(Box<ZipStream<'a>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeFirst,
    AtEntry { content_taken: bool },
    Exhausted,
    Closed,
}

/// A forward-only cursor over the entries of a TAR or ZIP archive.
pub struct ArchiveReader<'a> {
    backend: Option<Backend<'a>>,
    state: State,
    current: Option<EntryMetadata>,
    layout: Option<Layout>,
}

impl std::fmt::Debug for ArchiveReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("state", &self.state)
            .field("layout", &self.layout)
            .field("current", &self.current.as_ref().map(|e| e.path()))
            .finish_non_exhaustive()
    }
}

impl<'a> ArchiveReader<'a> {
    /// Binds a reader to `source`, detecting the format and compression.
    ///
    /// A zero-length source is an empty archive with no layout. A ZIP
    /// archive on a forward-only source is walked through its local
    /// headers; only an entry that relies on a data descriptor makes the
    /// rest of the stream be buffered.
    ///
    /// # Errors
    ///
    /// - [`Error::CorruptedArchive`] if the bytes are neither TAR nor ZIP
    ///   (optionally under gzip, bzip2 or LZMA) or the first structures are
    ///   malformed.
    /// - [`Error::CompressionAlgorithmUnavailable`] if the detected
    ///   compression layer is not compiled in.
    pub fn open(source: ByteSource<'a>) -> Result<Self> {
        let (head, source) = peek(source)?;
        if head.is_empty() {
            log::debug!("Opened empty archive");
            return Ok(Self::with_backend(Backend::Empty, None));
        }

        // LZMA-alone has no magic, so a recognizable container wins
        let container = detect_container(&head);
        if container.is_none() {
            let compression = detect_compression(&head);
            if compression != Compression::None {
                return Self::open_compressed(source, compression);
            }
        }

        match container {
            Some(Format::Zip) => {
                if let ByteSource::Sequential(stream) = source {
                    let mut zip = Box::new(ZipStream::open(stream)?);
                    let layout = Layout {
                        format: Format::Zip,
                        compression: zip.leading_method(),
                    };
                    log::debug!("Opened forward-only ZIP stream ({})", layout.compression);
                    return Ok(Self::with_backend(Backend::ZipStream(zip), Some(layout)));
                }
                let stream = source.into_read_seek()?;
                let archive = zip::ZipArchive::new(stream).map_err(zip_failed)?;
                let mut cursor = Box::new(ZipCursor {
                    archive,
                    next_index: 0,
                    current_index: None,
                });
                let layout = Layout {
                    format: Format::Zip,
                    compression: cursor.leading_method(),
                };
                log::debug!(
                    "Opened ZIP archive with {} entries ({})",
                    cursor.archive.len(),
                    layout.compression
                );
                Ok(Self::with_backend(Backend::Zip(cursor), Some(layout)))
            }
            Some(Format::Tar) => {
                log::debug!("Opened TAR archive");
                let stream = TarStream::new(Box::new(source));
                let layout = Layout {
                    format: Format::Tar,
                    compression: Compression::None,
                };
                Ok(Self::with_backend(Backend::Tar(stream), Some(layout)))
            }
            None => Err(Error::corrupted("unrecognized archive format")),
        }
    }

    fn open_compressed(source: ByteSource<'a>, compression: Compression) -> Result<Self> {
        let mut decoder = codec::decoder(compression, BufReader::new(source))?;

        let mut head = Vec::with_capacity(SNIFF_LEN);
        (&mut decoder)
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut head)
            .map_err(read_failed)?;

        let layout = Layout {
            format: Format::Tar,
            compression,
        };
        if head.is_empty() {
            log::debug!("Opened empty {} stream", compression);
            return Ok(Self::with_backend(Backend::Empty, Some(layout)));
        }

        match detect_container(&head) {
            Some(Format::Tar) => {
                log::debug!("Opened TAR archive ({})", compression);
                let stream = TarStream::new(Box::new(Cursor::new(head).chain(decoder)));
                Ok(Self::with_backend(Backend::Tar(stream), Some(layout)))
            }
            Some(Format::Zip) => Err(Error::corrupted(format!(
                "ZIP archive inside a {} stream",
                compression
            ))),
            None => Err(Error::corrupted(format!(
                "{} stream does not contain a TAR archive",
                compression
            ))),
        }
    }

    fn with_backend(backend: Backend<'a>, layout: Option<Layout>) -> Self {
        Self {
            backend: Some(backend),
            state: State::BeforeFirst,
            current: None,
            layout,
        }
    }

    /// Returns the detected layout; `None` for an empty source.
    pub fn layout(&self) -> Option<Layout> {
        self.layout
    }

    /// Returns the options a writer needs to produce an archive of the
    /// same layout. An empty source reports the defaults.
    pub fn options(&self) -> ArchiveOptions {
        match self.layout {
            Some(layout) => ArchiveOptions::new()
                .format(layout.format)
                .compression(layout.compression),
            None => ArchiveOptions::default(),
        }
    }

    /// Returns the metadata of the current entry.
    pub fn current(&self) -> Option<&EntryMetadata> {
        match self.state {
            State::AtEntry { .. } => self.current.as_ref(),
            _ => None,
        }
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    /// Advances to the next entry, skipping unread content of the current
    /// one. Returns `None` at the end of the archive, and again on every
    /// later call.
    ///
    /// # Errors
    ///
    /// - [`Error::CorruptedArchive`] if the next header cannot be read.
    /// - [`Error::InvalidState`] after [`close`](Self::close).
    pub fn next_header(&mut self) -> Result<Option<EntryMetadata>> {
        let backend = match (&self.state, self.backend.as_mut()) {
            (State::Closed, _) | (_, None) => return Err(Error::InvalidState("reader is closed")),
            (State::Exhausted, _) => return Ok(None),
            (_, Some(backend)) => backend,
        };

        let next = match backend {
            Backend::Empty => None,
            Backend::Tar(tar) => tar.next_entry()?,
            Backend::Zip(zip) => zip.next_entry()?,
            Backend::ZipStream(zip) => zip.next_entry()?,
        };

        match next {
            Some(entry) => {
                self.state = State::AtEntry {
                    content_taken: false,
                };
                self.current = Some(entry.clone());
                Ok(Some(entry))
            }
            None => {
                self.state = State::Exhausted;
                self.current = None;
                Ok(None)
            }
        }
    }

    /// Checks that content may be taken and marks it as taken.
    ///
    /// Returns `false` if there is nothing left to read for this header.
    fn take_content(&mut self) -> Result<bool> {
        match self.state {
            State::Closed => Err(Error::InvalidState("reader is closed")),
            State::BeforeFirst => Err(Error::InvalidState(
                "content requested before the first header",
            )),
            State::Exhausted => Err(Error::InvalidState(
                "content requested after the end of the archive",
            )),
            State::AtEntry { content_taken } => {
                self.state = State::AtEntry {
                    content_taken: true,
                };
                let is_dir = self.current.as_ref().is_some_and(EntryMetadata::is_directory);
                Ok(!content_taken && !is_dir)
            }
        }
    }

    fn open_content(&mut self) -> Result<EntryContent<'_>> {
        match self.backend.as_mut() {
            Some(Backend::Tar(tar)) => Ok(EntryContent::new(tar)),
            Some(Backend::Zip(zip)) => zip.content(),
            Some(Backend::ZipStream(zip)) => zip.content(),
            Some(Backend::Empty) | None => Ok(EntryContent::empty()),
        }
    }

    /// Reads the whole content of the current entry.
    ///
    /// Returns an empty buffer for directories and when the content was
    /// already consumed.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] before the first header, after the end or
    ///   after [`close`](Self::close).
    /// - [`Error::CorruptedArchive`] if the entry data cannot be decoded.
    pub fn read_content(&mut self) -> Result<Vec<u8>> {
        if !self.take_content()? {
            return Ok(Vec::new());
        }
        let hint = match (self.backend.as_ref(), self.current.as_ref()) {
            (Some(Backend::Tar(tar)), _) => tar.remaining(),
            (_, Some(entry)) => entry.size.unwrap_or(0),
            _ => 0,
        };
        let mut out = Vec::with_capacity(hint.min(MAX_PREALLOCATION) as usize);
        self.open_content()?
            .read_to_end(&mut out)
            .map_err(read_failed)?;
        Ok(out)
    }

    /// Returns a streaming reader over the content of the current entry.
    ///
    /// Whatever the reader leaves unread is skipped by the next
    /// [`next_header`](Self::next_header).
    ///
    /// # Errors
    ///
    /// Same as [`read_content`](Self::read_content).
    pub fn content_reader(&mut self) -> Result<EntryContent<'_>> {
        if !self.take_content()? {
            return Ok(EntryContent::empty());
        }
        self.open_content()
    }

    /// Copies the content of the current entry into `out`, returning the
    /// number of bytes copied.
    ///
    /// # Errors
    ///
    /// Read failures are [`Error::CorruptedArchive`]; write failures are
    /// [`Error::Io`]. State errors as for [`read_content`](Self::read_content).
    pub fn copy_content(&mut self, out: &mut dyn Write) -> Result<u64> {
        let mut content = self.content_reader()?;
        let mut buf = vec![0u8; COPY_CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = match content.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(read_failed(e)),
            };
            out.write_all(&buf[..n])?;
            total += n as u64;
        }
        Ok(total)
    }

    /// Discards the content of the current entry.
    ///
    /// # Errors
    ///
    /// State errors as for [`read_content`](Self::read_content); TAR data
    /// that ends early is [`Error::CorruptedArchive`].
    pub fn skip_content(&mut self) -> Result<()> {
        if !self.take_content()? {
            return Ok(());
        }
        if let Some(Backend::Tar(tar)) = self.backend.as_mut() {
            tar.skip_rest()?;
        }
        Ok(())
    }

    /// Scans forward to the next entry whose path is inside (`Include`) or
    /// outside (`Exclude`) `names`. Entries passed over have their content
    /// skipped. Returns `None` at the end of the archive.
    ///
    /// # Errors
    ///
    /// Same as [`next_header`](Self::next_header).
    pub fn lookup(&mut self, names: &NameSet, mode: MatchMode) -> Result<Option<EntryMetadata>> {
        self.lookup_with(names, mode, |entry| {
            log::debug!("Passing over entry '{}'", entry.path());
        })
    }

    /// [`lookup`](Self::lookup), calling `passed` for every entry it
    /// passes over.
    pub(crate) fn lookup_with(
        &mut self,
        names: &NameSet,
        mode: MatchMode,
        mut passed: impl FnMut(&EntryMetadata),
    ) -> Result<Option<EntryMetadata>> {
        while let Some(entry) = self.next_header()? {
            if mode.matches(names.contains(entry.path())) {
                return Ok(Some(entry));
            }
            passed(&entry);
        }
        Ok(None)
    }

    /// Releases the underlying container reader. Safe to call repeatedly
    /// and after a failure.
    pub fn close(&mut self) {
        if self.backend.take().is_some() {
            log::debug!("Closed archive reader");
        }
        self.state = State::Closed;
        self.current = None;
    }
}

/// Lists the entries of an archive, skipping all content.
///
/// # Errors
///
/// Errors from [`ArchiveReader::open`] and [`ArchiveReader::next_header`].
pub fn entries<'a>(source: impl Into<ByteSource<'a>>) -> Result<Vec<EntryMetadata>> {
    let mut reader = ArchiveReader::open(source.into())?;
    let mut listed = Vec::new();
    while let Some(entry) = reader.next_header()? {
        reader.skip_content()?;
        listed.push(entry);
    }
    reader.close();
    Ok(listed)
}

/// Reports the options an archive was written with, as far as they can be
/// sniffed. An empty archive reports the defaults.
///
/// # Errors
///
/// Errors from [`ArchiveReader::open`].
pub fn archive_options<'a>(source: impl Into<ByteSource<'a>>) -> Result<ArchiveOptions> {
    let mut reader = ArchiveReader::open(source.into())?;
    let options = reader.options();
    reader.close();
    Ok(options)
}

/// Reads up to [`SNIFF_LEN`] bytes and returns them together with a source
/// that still starts at the first byte.
fn peek(source: ByteSource<'_>) -> Result<(Vec<u8>, ByteSource<'_>)> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    match source {
        ByteSource::Sequential(mut stream) => {
            (&mut stream)
                .take(SNIFF_LEN as u64)
                .read_to_end(&mut head)
                .map_err(read_failed)?;
            let replay = Cursor::new(head.clone()).chain(stream);
            Ok((head, ByteSource::sequential(replay)))
        }
        ByteSource::Seekable(mut stream) => {
            let start = stream.stream_position()?;
            (&mut stream)
                .take(SNIFF_LEN as u64)
                .read_to_end(&mut head)
                .map_err(read_failed)?;
            stream.seek(SeekFrom::Start(start))?;
            Ok((head, ByteSource::Seekable(stream)))
        }
        ByteSource::Memory(mut cursor) => {
            let start = cursor.position();
            (&mut cursor).take(SNIFF_LEN as u64).read_to_end(&mut head)?;
            cursor.set_position(start);
            Ok((head, ByteSource::Memory(cursor)))
        }
    }
}
