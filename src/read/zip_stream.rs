//! Forward-only ZIP reader for sources that cannot seek.
//!
//! Entries are read from their local headers with
//! [`zip::read::read_zipfile_from_stream`], so nothing beyond the current
//! local header is held in memory. An entry whose sizes are only known from
//! a trailing data descriptor cannot be delimited that way: from that entry
//! on, the rest of the stream is buffered and read through its central
//! directory.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use super::{EntryContent, ZipCursor, describe_zip_file, read_failed, zip_failed};
use crate::entry::EntryMetadata;
use crate::format::{Compression, Format};
use crate::source::ReadSeek;
use crate::{Error, Result};

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;
const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0606_4b50;

/// Fixed part of a local file header, signature included.
const LOCAL_HEADER_LEN: usize = 30;

/// General purpose flag: sizes follow the data in a descriptor.
const DATA_DESCRIPTOR_FLAG: u16 = 1 << 3;

fn truncated() -> Error {
    Error::corrupted("truncated ZIP stream")
}

/// The source stream, able to replay one local header that was already
/// consumed.
struct Replay<'a> {
    head: Cursor<Vec<u8>>,
    rest: Box<dyn Read + Send + 'a>,
    position: u64,
}

impl<'a> Replay<'a> {
    fn new(rest: Box<dyn Read + Send + 'a>) -> Self {
        Self {
            head: Cursor::new(Vec::new()),
            rest,
            position: 0,
        }
    }

    /// Makes `header` the next bytes read again.
    fn rewind(&mut self, header: Vec<u8>) {
        self.position = self.position.saturating_sub(header.len() as u64);
        self.head = Cursor::new(header);
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        self.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                truncated()
            } else {
                read_failed(e)
            }
        })
    }

    fn discard(&mut self, n: u64) -> Result<()> {
        let copied = io::copy(&mut self.by_ref().take(n), &mut io::sink()).map_err(read_failed)?;
        if copied < n {
            return Err(truncated());
        }
        Ok(())
    }
}

impl Read for Replay<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match self.head.read(buf)? {
            0 => self.rest.read(buf)?,
            n => n,
        };
        self.position += n as u64;
        Ok(n)
    }
}

/// The tail of an archive whose first `offset` bytes were streamed past.
///
/// Offsets in the central directory stay valid; the skipped prefix reads
/// as zeros.
struct Resumed {
    offset: u64,
    tail: Vec<u8>,
    position: u64,
}

impl Read for Resumed {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position < self.offset {
            let gap = usize::try_from(self.offset - self.position).unwrap_or(usize::MAX);
            let n = buf.len().min(gap);
            buf[..n].fill(0);
            self.position += n as u64;
            return Ok(n);
        }
        let at = usize::try_from(self.position - self.offset).unwrap_or(usize::MAX);
        let available = self.tail.get(at..).unwrap_or(&[]);
        let n = buf.len().min(available.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for Resumed {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let end = self.offset + self.tail.len() as u64;
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(delta) => end.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        match target {
            Some(p) => {
                self.position = p;
                Ok(p)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before the start of the archive",
            )),
        }
    }
}

/// Compressed data of a file entry that has not been consumed yet.
struct PendingData {
    header: Vec<u8>,
    compressed_size: u64,
}

struct LocalEntry {
    meta: EntryMetadata,
    data: Option<PendingData>,
}

enum Step {
    Entry(LocalEntry),
    End,
    Descriptor { start: u64, header: Vec<u8> },
}

/// A forward-only ZIP cursor over a stream that cannot seek.
pub(super) struct ZipStream<'a> {
    reader: Replay<'a>,
    queued: VecDeque<LocalEntry>,
    armed: Option<PendingData>,
    central: Option<Box<ZipCursor<'a>>>,
    finished: bool,
}

impl<'a> ZipStream<'a> {
    /// Reads up to the first file header.
    ///
    /// Leading directories carry no data, so they are queued and the first
    /// file's method is known before any entry is handed out.
    pub(super) fn open(stream: Box<dyn Read + Send + 'a>) -> Result<Self> {
        let mut zip = Self {
            reader: Replay::new(stream),
            queued: VecDeque::new(),
            armed: None,
            central: None,
            finished: false,
        };
        loop {
            match zip.read_local()? {
                Step::Entry(entry) => {
                    let is_file = entry.data.is_some();
                    zip.queued.push_back(entry);
                    if is_file {
                        break;
                    }
                }
                Step::End => {
                    zip.finished = true;
                    break;
                }
                Step::Descriptor { start, header } => {
                    zip.central = Some(zip.resume_from_central(start, header)?);
                    break;
                }
            }
        }
        Ok(zip)
    }

    /// Method of the first regular file.
    pub(super) fn leading_method(&mut self) -> Compression {
        if let Some(entry) = self.queued.iter().find(|e| e.data.is_some()) {
            return entry
                .meta
                .compression
                .unwrap_or_else(|| Format::Zip.default_compression());
        }
        match self.central.as_mut() {
            Some(central) => central.leading_method(),
            None => Format::Zip.default_compression(),
        }
    }

    pub(super) fn next_entry(&mut self) -> Result<Option<EntryMetadata>> {
        if let Some(data) = self.armed.take() {
            self.reader.discard(data.compressed_size)?;
        }
        if let Some(entry) = self.queued.pop_front() {
            return Ok(Some(self.arm(entry)));
        }
        if let Some(central) = self.central.as_mut() {
            return central.next_entry();
        }
        if self.finished {
            return Ok(None);
        }
        match self.read_local()? {
            Step::Entry(entry) => Ok(Some(self.arm(entry))),
            Step::End => {
                log::debug!("Reached the ZIP central directory");
                self.finished = true;
                Ok(None)
            }
            Step::Descriptor { start, header } => {
                let mut central = self.resume_from_central(start, header)?;
                let next = central.next_entry();
                self.central = Some(central);
                next
            }
        }
    }

    pub(super) fn content(&mut self) -> Result<EntryContent<'_>> {
        if let Some(central) = self.central.as_mut() {
            return central.content();
        }
        let Some(data) = self.armed.take() else {
            return Ok(EntryContent::empty());
        };
        self.reader.rewind(data.header);
        // Dropping the entry drains whatever the caller leaves unread
        match zip::read::read_zipfile_from_stream(&mut self.reader).map_err(zip_failed)? {
            Some(file) => Ok(EntryContent::new(file)),
            None => Err(Error::corrupted("ZIP local header could not be re-read")),
        }
    }

    fn arm(&mut self, entry: LocalEntry) -> EntryMetadata {
        self.armed = entry.data;
        entry.meta
    }

    /// Reads the next local header. Directory data and skipped entries are
    /// discarded here; file data is left in the stream.
    fn read_local(&mut self) -> Result<Step> {
        loop {
            let start = self.reader.position;
            let mut signature = [0u8; 4];
            self.reader.fill(&mut signature)?;
            match u32::from_le_bytes(signature) {
                LOCAL_HEADER_SIGNATURE => {}
                CENTRAL_HEADER_SIGNATURE
                | END_OF_CENTRAL_DIRECTORY_SIGNATURE
                | ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE => return Ok(Step::End),
                other => {
                    return Err(Error::corrupted(format!(
                        "unexpected ZIP record signature {:#010x}",
                        other
                    )));
                }
            }

            let mut header = vec![0u8; LOCAL_HEADER_LEN];
            header[..4].copy_from_slice(&signature);
            self.reader.fill(&mut header[4..])?;
            let flags = u16::from_le_bytes([header[6], header[7]]);
            let name_len = usize::from(u16::from_le_bytes([header[26], header[27]]));
            let extra_len = usize::from(u16::from_le_bytes([header[28], header[29]]));
            header.resize(LOCAL_HEADER_LEN + name_len + extra_len, 0);
            self.reader.fill(&mut header[LOCAL_HEADER_LEN..])?;

            if flags & DATA_DESCRIPTOR_FLAG != 0 {
                return Ok(Step::Descriptor { start, header });
            }

            let (meta, compressed_size) = {
                let mut replay = Cursor::new(&header[..]);
                let file = zip::read::read_zipfile_from_stream(&mut replay)
                    .map_err(zip_failed)?
                    .ok_or_else(|| Error::corrupted("missing ZIP local header"))?;
                (describe_zip_file(&file), file.compressed_size())
            };

            match meta {
                Some(meta) if !meta.is_directory() => {
                    return Ok(Step::Entry(LocalEntry {
                        meta,
                        data: Some(PendingData {
                            header,
                            compressed_size,
                        }),
                    }));
                }
                Some(meta) => {
                    self.reader.discard(compressed_size)?;
                    return Ok(Step::Entry(LocalEntry { meta, data: None }));
                }
                None => self.reader.discard(compressed_size)?,
            }
        }
    }

    /// Buffers the rest of the stream and continues from its central
    /// directory, starting at the entry whose header begins at `start`.
    fn resume_from_central(&mut self, start: u64, header: Vec<u8>) -> Result<Box<ZipCursor<'a>>> {
        log::warn!(
            "ZIP entry at offset {} uses a data descriptor; buffering the rest of the stream",
            start
        );
        // Entries before `start` cannot be read back, so the central
        // directory is entered by name
        let name = {
            let mut plain = header.clone();
            plain[6] &= !(DATA_DESCRIPTOR_FLAG as u8);
            let mut replay = Cursor::new(&plain[..]);
            let file = zip::read::read_zipfile_from_stream(&mut replay)
                .map_err(zip_failed)?
                .ok_or_else(|| Error::corrupted("missing ZIP local header"))?;
            file.name().to_string()
        };
        let mut tail = header;
        self.reader.read_to_end(&mut tail).map_err(read_failed)?;
        self.finished = true;

        let resumed: Box<dyn ReadSeek + Send + 'a> = Box::new(Resumed {
            offset: start,
            tail,
            position: 0,
        });
        let archive = zip::ZipArchive::new(resumed).map_err(zip_failed)?;
        let next_index = archive.index_for_name(&name).ok_or_else(|| {
            Error::corrupted(format!(
                "ZIP entry '{}' is missing from the central directory",
                name
            ))
        })?;
        Ok(Box::new(ZipCursor {
            archive,
            next_index,
            current_index: None,
        }))
    }
}
