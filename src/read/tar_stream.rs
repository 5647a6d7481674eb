//! Forward-only TAR reader.
//!
//! Walks 512-byte header blocks with [`tar::Header`] for field decoding and
//! keeps track of how much of the current entry's data (and block padding)
//! is still unread. Only regular files and directories are surfaced; other
//! entry types are skipped.
//!
//! Supported extensions:
//! - GNU long names (`L` entries)
//! - PAX extended headers (`x`): `path`, `size` and `mtime` records, read
//!   with [`tar::PaxExtensions`]
//! - PAX global headers (`g`) are consumed and ignored

use std::io::{self, Read};

use crate::entry::{EntryKind, EntryMetadata};
use crate::format::detect::{TAR_BLOCK_SIZE, tar_checksum_matches};
use crate::timestamp::Timestamp;
use crate::{ArchivePath, Error, Result};

/// Largest GNU long-name or PAX payload we are willing to buffer.
const MAX_METADATA_PAYLOAD: u64 = 1024 * 1024;

fn padding_for(size: u64) -> u64 {
    let block = TAR_BLOCK_SIZE as u64;
    (block - size % block) % block
}

fn out_of_range() -> Error {
    Error::corrupted("TAR entry size out of range")
}

/// Data size plus block padding.
fn padded(size: u64) -> Result<u64> {
    size.checked_add(padding_for(size)).ok_or_else(out_of_range)
}

fn truncated() -> Error {
    Error::corrupted("truncated TAR stream")
}

fn read_failed(e: io::Error) -> Error {
    Error::corrupted(format!("failed to read TAR stream: {}", e))
}

/// Pending extended attributes collected from `L`/`x` entries.
#[derive(Debug, Default)]
struct Extensions {
    path: Option<Vec<u8>>,
    size: Option<u64>,
    mtime: Option<i64>,
}

impl Extensions {
    /// Takes `path`, `size` and `mtime` from a PAX extended header payload.
    fn apply_pax(&mut self, payload: &[u8]) -> Result<()> {
        let end = payload.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        for record in tar::PaxExtensions::new(&payload[..end]) {
            let record = record
                .map_err(|e| Error::corrupted(format!("malformed PAX extended header: {}", e)))?;
            match record.key() {
                Ok("path") => self.path = Some(record.value_bytes().to_vec()),
                Ok("size") => {
                    let size: u64 = record
                        .value()
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| Error::corrupted("malformed PAX size record"))?;
                    if size > i64::MAX as u64 {
                        return Err(out_of_range());
                    }
                    self.size = Some(size);
                }
                Ok("mtime") => {
                    // Fractional seconds are allowed; keep the integer part
                    self.mtime = record
                        .value()
                        .ok()
                        .and_then(|v| v.split('.').next())
                        .and_then(|v| v.parse().ok());
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// A forward-only TAR cursor over a decompressed stream.
pub(crate) struct TarStream<'a> {
    inner: Box<dyn Read + Send + 'a>,
    remaining: u64,
    padding: u64,
    finished: bool,
}

impl std::fmt::Debug for TarStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TarStream")
            .field("remaining", &self.remaining)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<'a> TarStream<'a> {
    pub(crate) fn new(inner: Box<dyn Read + Send + 'a>) -> Self {
        Self {
            inner,
            remaining: 0,
            padding: 0,
            finished: false,
        }
    }

    /// Advances to the next regular file or directory header.
    ///
    /// Unread data of the current entry is skipped first. Returns `None`
    /// at the end-of-archive marker or at a clean end of stream.
    pub(crate) fn next_entry(&mut self) -> Result<Option<EntryMetadata>> {
        if self.finished {
            return Ok(None);
        }
        self.skip_rest()?;

        let mut ext = Extensions::default();
        loop {
            let Some(block) = self.read_block()? else {
                self.finished = true;
                return Ok(None);
            };
            if block.iter().all(|&b| b == 0) {
                self.finished = true;
                return Ok(None);
            }
            if !tar_checksum_matches(&block) {
                return Err(Error::corrupted("TAR header checksum mismatch"));
            }

            let header = tar::Header::from_byte_slice(&block);
            let entry_type = header.entry_type();
            let header_size = header
                .entry_size()
                .map_err(|e| Error::corrupted(format!("invalid TAR entry size: {}", e)))?;

            if entry_type.is_gnu_longname() {
                let mut name = self.read_payload(header_size)?;
                while name.last() == Some(&0) {
                    name.pop();
                }
                ext.path = Some(name);
                continue;
            }
            if entry_type.is_pax_local_extensions() {
                let payload = self.read_payload(header_size)?;
                ext.apply_pax(&payload)?;
                continue;
            }
            if entry_type.is_pax_global_extensions() || entry_type.is_gnu_longlink() {
                self.discard(padded(header_size)?)?;
                continue;
            }

            let size = ext.size.unwrap_or(header_size);
            let total = padded(size)?;
            let kind = if entry_type.is_dir() {
                EntryKind::Directory
            } else if entry_type.is_file() || entry_type.is_contiguous() {
                EntryKind::Regular
            } else {
                let path = String::from_utf8_lossy(&header.path_bytes()).into_owned();
                log::warn!(
                    "Skipping TAR entry '{}' of unsupported type {:?}",
                    path, entry_type
                );
                self.discard(total)?;
                ext = Extensions::default();
                continue;
            };

            let raw_path = match ext.path.take() {
                Some(p) => p,
                None => header.path_bytes().into_owned(),
            };
            let mtime = match ext.mtime {
                Some(secs) => secs,
                None => header.mtime().map(|t| t as i64).unwrap_or(0),
            };

            let mut meta = EntryMetadata::new(
                ArchivePath::from_archive(&String::from_utf8_lossy(&raw_path)),
                kind,
            );
            meta.size = Some(if kind == EntryKind::Directory { 0 } else { size });
            meta.modified = Some(Timestamp::from_unix_secs(mtime));
            meta.permissions = header.mode().ok().map(|m| m & 0o7777);

            self.remaining = size;
            self.padding = total - size;
            return Ok(Some(meta));
        }
    }

    /// Discards the rest of the current entry, including block padding.
    pub(crate) fn skip_rest(&mut self) -> Result<()> {
        let n = self
            .remaining
            .checked_add(self.padding)
            .ok_or_else(out_of_range)?;
        self.remaining = 0;
        self.padding = 0;
        self.discard(n)
    }

    /// Number of unread data bytes in the current entry.
    pub(crate) fn remaining(&self) -> u64 {
        self.remaining
    }

    fn discard(&mut self, n: u64) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        let copied =
            io::copy(&mut (&mut self.inner).take(n), &mut io::sink()).map_err(read_failed)?;
        if copied < n {
            return Err(truncated());
        }
        Ok(())
    }

    fn read_payload(&mut self, size: u64) -> Result<Vec<u8>> {
        if size > MAX_METADATA_PAYLOAD {
            return Err(Error::corrupted(format!(
                "TAR extended header of {} bytes exceeds limit",
                size
            )));
        }
        let mut payload = vec![0u8; size as usize];
        self.inner.read_exact(&mut payload).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                truncated()
            } else {
                read_failed(e)
            }
        })?;
        self.discard(padding_for(size))?;
        Ok(payload)
    }

    /// Reads one header block; `None` on a clean end of stream.
    fn read_block(&mut self) -> Result<Option<[u8; TAR_BLOCK_SIZE]>> {
        let mut block = [0u8; TAR_BLOCK_SIZE];
        let mut filled = 0;
        while filled < TAR_BLOCK_SIZE {
            match self.inner.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(read_failed(e)),
            }
        }
        match filled {
            0 => Ok(None),
            TAR_BLOCK_SIZE => Ok(Some(block)),
            _ => Err(truncated()),
        }
    }
}

impl Read for TarStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "TAR entry data ends early",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build(f: impl FnOnce(&mut tar::Builder<Vec<u8>>)) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        f(&mut builder);
        builder.into_inner().unwrap()
    }

    fn append_file(builder: &mut tar::Builder<Vec<u8>>, path: &str, data: &[u8]) {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o640);
        header.set_mtime(1_600_000_000);
        header.set_entry_type(tar::EntryType::Regular);
        builder.append_data(&mut header, path, data).unwrap();
    }

    fn stream(bytes: Vec<u8>) -> TarStream<'static> {
        TarStream::new(Box::new(Cursor::new(bytes)))
    }

    #[test]
    fn test_reads_entries_and_data() {
        let bytes = build(|b| {
            append_file(b, "a.txt", b"hello");
            append_file(b, "b.txt", b"world!");
        });
        let mut tar = stream(bytes);

        let a = tar.next_entry().unwrap().unwrap();
        assert_eq!(a.path(), "a.txt");
        assert_eq!(a.size, Some(5));
        assert_eq!(a.permissions, Some(0o640));
        assert_eq!(a.modified.unwrap().as_unix_secs(), 1_600_000_000);
        let mut data = String::new();
        tar.read_to_string(&mut data).unwrap();
        assert_eq!(data, "hello");

        // Second entry's data is skipped when not read
        let b = tar.next_entry().unwrap().unwrap();
        assert_eq!(b.path(), "b.txt");
        assert!(tar.next_entry().unwrap().is_none());
        assert!(tar.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_directory_trailing_slash_stripped() {
        let bytes = build(|b| {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            b.append_data(&mut header, "docs/", io::empty()).unwrap();
        });
        let mut tar = stream(bytes);
        let dir = tar.next_entry().unwrap().unwrap();
        assert!(dir.is_directory());
        assert_eq!(dir.path(), "docs");
    }

    #[test]
    fn test_long_gnu_name() {
        let long = format!("{}/file.txt", "d".repeat(150));
        let bytes = build(|b| append_file(b, &long, b"x"));
        let mut tar = stream(bytes);
        assert_eq!(tar.next_entry().unwrap().unwrap().path(), long);
    }

    #[test]
    fn test_symlink_skipped() {
        let bytes = build(|b| {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            header.set_link_name("target").unwrap();
            b.append_data(&mut header, "link", io::empty()).unwrap();
            append_file(b, "real.txt", b"data");
        });
        let mut tar = stream(bytes);
        assert_eq!(tar.next_entry().unwrap().unwrap().path(), "real.txt");
        assert!(tar.next_entry().unwrap().is_none());
    }

    fn append_pax(builder: &mut tar::Builder<Vec<u8>>, records: &[u8]) {
        let mut header = tar::Header::new_ustar();
        header.set_entry_type(tar::EntryType::XHeader);
        header.set_size(records.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, "PaxHeaders/entry", records)
            .unwrap();
    }

    #[test]
    fn test_pax_records() {
        let bytes = build(|b| {
            append_pax(b, b"28 path=some/very/long/name\n19 mtime=1234.5678\n");
            append_file(b, "short", b"data");
        });
        let mut tar = stream(bytes);
        let entry = tar.next_entry().unwrap().unwrap();
        assert_eq!(entry.path(), "some/very/long/name");
        assert_eq!(entry.modified.unwrap().as_unix_secs(), 1234);
        assert_eq!(entry.size, Some(4));
    }

    #[test]
    fn test_malformed_pax_record_is_corrupt() {
        let bytes = build(|b| {
            append_pax(b, b"99 path=x\n");
            append_file(b, "a.txt", b"");
        });
        assert!(stream(bytes).next_entry().unwrap_err().is_corruption());
    }

    #[test]
    fn test_pax_size_beyond_i64_is_corrupt() {
        let bytes = build(|b| {
            append_pax(b, b"29 size=18446744073709551615\n");
            append_file(b, "a.txt", b"");
        });
        let err = stream(bytes).next_entry().unwrap_err();
        assert!(err.is_corruption(), "{:?}", err);
    }

    #[test]
    fn test_huge_binary_size_is_corrupt() {
        let mut header = tar::Header::new_gnu();
        header.set_path("a.txt").unwrap();
        header.set_size(u64::MAX);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        let mut bytes = header.as_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 1024]);

        let mut tar = stream(bytes);
        assert!(tar.next_entry().unwrap_err().is_corruption());
    }

    #[test]
    fn test_truncated_data_is_corrupt() {
        let mut bytes = build(|b| append_file(b, "a.txt", &[1u8; 2000]));
        bytes.truncate(1024);
        let mut tar = stream(bytes);
        tar.next_entry().unwrap().unwrap();
        assert!(tar.next_entry().unwrap_err().is_corruption());
    }

    #[test]
    fn test_bad_checksum_is_corrupt() {
        let mut bytes = build(|b| append_file(b, "a.txt", b"hello"));
        bytes[0] ^= 0x55;
        let mut tar = stream(bytes);
        assert!(tar.next_entry().unwrap_err().is_corruption());
    }

    #[test]
    fn test_padding() {
        assert_eq!(padding_for(0), 0);
        assert_eq!(padding_for(1), 511);
        assert_eq!(padding_for(512), 0);
        assert_eq!(padding_for(513), 511);
    }
}
