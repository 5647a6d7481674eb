//! Archive writing.
//!
//! [`ArchiveWriter`] emits a TAR or ZIP container entry by entry. Every
//! entry header is written before its data, so the entry size must be known
//! up front: entries without a declared size are buffered first.
//!
//! # Example
//!
//! ```rust
//! use arcstream::{ArchiveOptions, ArchiveWriter, Compression, EntryMetadata, Format};
//! use std::io::Cursor;
//!
//! let options = ArchiveOptions::new()
//!     .format(Format::Tar)
//!     .compression(Compression::Gzip);
//! let mut writer = ArchiveWriter::open(Cursor::new(Vec::new()), &options)?;
//!
//! let meta = EntryMetadata::file("hello.txt")?.with_size(5);
//! writer.write_entry(&meta, &mut &b"hello"[..])?;
//! writer.write_directory(&EntryMetadata::directory("docs")?)?;
//!
//! let (result, sink) = writer.finish()?;
//! assert_eq!(result.entries_written, 1);
//! assert_eq!(result.directories_written, 1);
//! assert!(!sink.into_inner().is_empty());
//! # Ok::<(), arcstream::Error>(())
//! ```

pub mod create;

pub use create::create;

use std::io::{self, Read, Seek, Write};

use zip::write::SimpleFileOptions;

use crate::codec::CompressedSink;
use crate::content::{ContentValue, normalize};
use crate::entry::EntryMetadata;
use crate::format::{ArchiveOptions, Compression, Format};
use crate::{Error, Result};

/// Chunk size for streaming entry data into the container.
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Entries at least this large need ZIP64 extensions.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

fn zip_write_failed(e: zip::result::ZipError) -> Error {
    match e {
        zip::result::ZipError::Io(e) => Error::Io(e),
        other => Error::Io(io::Error::other(other)),
    }
}

/// Statistics about a finished archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteResult {
    /// Number of regular file entries written.
    pub entries_written: usize,
    /// Number of directory entries written.
    pub directories_written: usize,
    /// Total uncompressed bytes.
    pub total_size: u64,
    /// Bytes written to the sink.
    pub compressed_size: u64,
}

impl WriteResult {
    /// Returns the compression ratio (compressed / uncompressed).
    pub fn compression_ratio(&self) -> f64 {
        if self.total_size == 0 {
            1.0
        } else {
            self.compressed_size as f64 / self.total_size as f64
        }
    }
}

/// State of the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Accepting new entries.
    AcceptingEntries,
    /// An entry failed after its header was emitted; the output is unusable.
    Poisoned,
}

enum Backend<W: Write + Seek> {
    Zip(zip::ZipWriter<W>),
    Tar(tar::Builder<CompressedSink<W>>),
}

/// A TAR or ZIP archive writer.
pub struct ArchiveWriter<W: Write + Seek> {
    backend: Backend<W>,
    options: ArchiveOptions,
    state: WriterState,
    result: WriteResult,
    start: u64,
}

impl<W: Write + Seek> std::fmt::Debug for ArchiveWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Validates `options` and starts an archive at the current position
    /// of `sink`.
    ///
    /// # Errors
    ///
    /// Configuration errors from [`ArchiveOptions::validate`], raised
    /// before anything is written, and I/O errors from the sink.
    pub fn open(mut sink: W, options: &ArchiveOptions) -> Result<Self> {
        options.validate()?;
        let start = sink.stream_position()?;
        let backend = match options.format {
            Format::Zip => Backend::Zip(zip::ZipWriter::new(sink)),
            Format::Tar => {
                let compressed =
                    CompressedSink::new(sink, options.effective_compression(), options.level)?;
                Backend::Tar(tar::Builder::new(compressed))
            }
        };
        log::debug!(
            "Opened {} writer ({})",
            options.format,
            options.effective_compression()
        );
        Ok(Self {
            backend,
            options: *options,
            state: WriterState::AcceptingEntries,
            result: WriteResult::default(),
            start,
        })
    }

    /// Returns the options the writer was opened with.
    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Returns statistics for the entries written so far.
    pub fn result(&self) -> &WriteResult {
        &self.result
    }

    fn ensure_accepting_entries(&self) -> Result<()> {
        if self.state != WriterState::AcceptingEntries {
            return Err(Error::InvalidState(
                "writer failed on an earlier entry and cannot accept more",
            ));
        }
        Ok(())
    }

    /// Resolves the compression for one entry.
    fn entry_compression(&self, meta: &EntryMetadata) -> Result<Compression> {
        match meta.compression {
            Some(compression) => {
                self.options
                    .validate_entry_override(meta.path(), compression)?;
                Ok(compression)
            }
            None => Ok(self.options.effective_compression()),
        }
    }

    /// Writes one entry, streaming its data from `content`.
    ///
    /// Directories are delegated to [`write_directory`](Self::write_directory)
    /// and `content` is not read. Returns the number of data bytes written.
    ///
    /// When `meta.size` is set it is authoritative. For ZIP, a source that
    /// ends early is tolerated because sizes are recorded after the data.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedOptions`] / [`Error::UnsupportedPerEntryCompression`]
    ///   for an invalid per-entry override, raised before anything is
    ///   written.
    /// - [`Error::SizeMismatch`] if the source produces more bytes than
    ///   declared (or fewer, for TAR).
    /// - [`Error::InvalidState`] if an earlier entry failed.
    /// - I/O errors from the source or sink.
    ///
    /// Any failure after the header was emitted poisons the writer.
    pub fn write_entry(&mut self, meta: &EntryMetadata, content: &mut dyn Read) -> Result<u64> {
        self.ensure_accepting_entries()?;
        if meta.is_directory() {
            return self.write_directory(meta).map(|()| 0);
        }
        let compression = self.entry_compression(meta)?;

        let outcome = match &mut self.backend {
            Backend::Zip(zip) => write_zip_file(zip, &self.options, meta, compression, content),
            Backend::Tar(builder) => write_tar_file(builder, &self.options, meta, content),
        };
        match outcome {
            Ok(written) => {
                log::debug!("Wrote entry '{}' ({} bytes)", meta.path(), written);
                self.result.entries_written += 1;
                self.result.total_size += written;
                Ok(written)
            }
            Err(e) => {
                self.state = WriterState::Poisoned;
                Err(e)
            }
        }
    }

    /// Writes a zero-length directory entry.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if an earlier entry failed, and I/O errors.
    pub fn write_directory(&mut self, meta: &EntryMetadata) -> Result<()> {
        self.ensure_accepting_entries()?;
        let outcome = match &mut self.backend {
            Backend::Zip(zip) => {
                let options = zip_entry_options(&self.options, meta, Compression::Store);
                zip.add_directory(meta.path.as_directory(), options)
                    .map_err(zip_write_failed)
            }
            Backend::Tar(builder) => {
                let mut header = tar_header(&self.options, meta, tar::EntryType::Directory, 0);
                builder
                    .append_data(&mut header, meta.path.as_directory(), io::empty())
                    .map_err(Error::Io)
            }
        };
        match outcome {
            Ok(()) => {
                self.result.directories_written += 1;
                Ok(())
            }
            Err(e) => {
                self.state = WriterState::Poisoned;
                Err(e)
            }
        }
    }

    /// Normalizes a content value and writes it as the data of `meta`.
    ///
    /// The normalized size replaces any size declared in `meta`. For
    /// directories the value is dropped unread.
    ///
    /// # Errors
    ///
    /// Errors from [`normalize`] (raised before anything is written) and
    /// from [`write_entry`](Self::write_entry).
    pub fn write_value(&mut self, meta: &EntryMetadata, value: ContentValue<'_>) -> Result<u64> {
        self.ensure_accepting_entries()?;
        if meta.is_directory() {
            return self.write_directory(meta).map(|()| 0);
        }
        let mut content = normalize(value, &meta.encoding)?;
        let sized = meta.clone().with_size(content.size());
        self.write_entry(&sized, &mut content)
    }

    /// Writes the container trailer and returns the sink.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if an entry failed earlier, and I/O errors
    /// while finalizing.
    pub fn finish(self) -> Result<(WriteResult, W)> {
        self.ensure_accepting_entries()?;
        let mut sink = match self.backend {
            Backend::Zip(zip) => zip.finish().map_err(zip_write_failed)?,
            Backend::Tar(builder) => builder.into_inner()?.finish()?,
        };
        sink.flush()?;

        let end = sink.stream_position()?;
        let mut result = self.result;
        result.compressed_size = end.saturating_sub(self.start);
        log::debug!(
            "Finished archive: {} entries, {} directories, {} bytes",
            result.entries_written,
            result.directories_written,
            result.compressed_size
        );
        Ok((result, sink))
    }
}

fn zip_entry_options(
    options: &ArchiveOptions,
    meta: &EntryMetadata,
    compression: Compression,
) -> SimpleFileOptions {
    let method = compression
        .to_zip_method()
        .unwrap_or(zip::CompressionMethod::Deflated);
    let mut file_options = SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(meta.effective_modified().to_zip_datetime())
        .large_file(meta.size.is_some_and(|size| size >= ZIP64_THRESHOLD));
    if compression == Compression::Deflate {
        if let Some(level) = options.level {
            file_options = file_options.compression_level(Some(i64::from(level)));
        }
    }
    if !options.skip_extra_attributes {
        file_options = file_options.unix_permissions(meta.effective_permissions());
    }
    file_options
}

fn write_zip_file<W: Write + Seek>(
    zip: &mut zip::ZipWriter<W>,
    options: &ArchiveOptions,
    meta: &EntryMetadata,
    compression: Compression,
    content: &mut dyn Read,
) -> Result<u64> {
    zip.start_file(meta.path(), zip_entry_options(options, meta, compression))
        .map_err(zip_write_failed)?;

    let limit = meta.size.map_or(u64::MAX, |size| size.saturating_add(1));
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let want = usize::try_from(limit - written)
            .unwrap_or(usize::MAX)
            .min(buf.len());
        if want == 0 {
            break;
        }
        let n = match content.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        };
        zip.write_all(&buf[..n])?;
        written += n as u64;
    }

    match meta.size {
        Some(declared) if written > declared => {
            Err(size_mismatch(meta, declared, written + drain(content)?))
        }
        _ => Ok(written),
    }
}

fn tar_header(
    options: &ArchiveOptions,
    meta: &EntryMetadata,
    entry_type: tar::EntryType,
    size: u64,
) -> tar::Header {
    let mut header = if options.skip_extra_attributes {
        tar::Header::new_ustar()
    } else {
        tar::Header::new_gnu()
    };
    header.set_entry_type(entry_type);
    header.set_size(size);
    header.set_mode(meta.effective_permissions());
    header.set_mtime(meta.effective_modified().as_tar_mtime());
    header
}

fn write_tar_file<W: Write>(
    builder: &mut tar::Builder<W>,
    options: &ArchiveOptions,
    meta: &EntryMetadata,
    content: &mut dyn Read,
) -> Result<u64> {
    let Some(declared) = meta.size else {
        // The header carries the size, so an unsized source is buffered
        let mut buffered = Vec::new();
        content.read_to_end(&mut buffered)?;
        let sized = meta.clone().with_size(buffered.len() as u64);
        return write_tar_file(builder, options, &sized, &mut buffered.as_slice());
    };

    let mut header = tar_header(options, meta, tar::EntryType::Regular, declared);
    let mut exact = ExactReader::new(content, declared);
    match builder.append_data(&mut header, meta.path(), &mut exact) {
        Ok(()) => {}
        Err(_) if exact.short => {
            return Err(size_mismatch(meta, declared, declared - exact.remaining));
        }
        Err(e) => return Err(Error::Io(e)),
    }

    let extra = drain(exact.inner)?;
    if extra > 0 {
        return Err(size_mismatch(meta, declared, declared + extra));
    }
    Ok(declared)
}

fn size_mismatch(meta: &EntryMetadata, declared: u64, actual: u64) -> Error {
    Error::SizeMismatch {
        path: meta.path().to_string(),
        declared,
        actual,
    }
}

/// Reads the rest of `content`, returning how many bytes were left.
fn drain(content: &mut dyn Read) -> Result<u64> {
    Ok(io::copy(content, &mut io::sink())?)
}

/// Yields exactly `remaining` bytes, failing if the source ends early.
struct ExactReader<'r> {
    inner: &'r mut dyn Read,
    remaining: u64,
    short: bool,
}

impl<'r> ExactReader<'r> {
    fn new(inner: &'r mut dyn Read, size: u64) -> Self {
        Self {
            inner,
            remaining: size,
            short: false,
        }
    }
}

impl Read for ExactReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = buf
            .len()
            .min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            self.short = true;
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "entry content ended before its declared size",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
