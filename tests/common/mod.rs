//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use arcstream::{
    ArchiveOptions, ArchiveReader, ByteSource, Compression, ContentValue, EntryMetadata, Format,
};

/// Creates an in-memory archive from `(path, text)` pairs.
pub fn create_text_archive(options: &ArchiveOptions, entries: &[(&str, &str)]) -> Vec<u8> {
    let metas = entries
        .iter()
        .map(|(name, _)| EntryMetadata::file(name).unwrap())
        .collect::<Vec<_>>();
    let contents = entries
        .iter()
        .map(|(_, text)| ContentValue::text(*text))
        .collect::<Vec<_>>();
    arcstream::create(metas, contents, options).unwrap()
}

/// Creates an in-memory archive from `(path, bytes)` pairs.
pub fn create_binary_archive(options: &ArchiveOptions, entries: &[(&str, &[u8])]) -> Vec<u8> {
    let metas = entries
        .iter()
        .map(|(name, _)| EntryMetadata::file(name).unwrap())
        .collect::<Vec<_>>();
    let contents = entries
        .iter()
        .map(|(_, bytes)| ContentValue::binary(*bytes))
        .collect::<Vec<_>>();
    arcstream::create(metas, contents, options).unwrap()
}

/// Reads every entry of an archive as `(path, bytes)`, directories included
/// with empty content.
pub fn read_all(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut reader = ArchiveReader::open(ByteSource::memory(archive.to_vec())).unwrap();
    let mut out = Vec::new();
    while let Some(entry) = reader.next_header().unwrap() {
        let bytes = reader.read_content().unwrap();
        out.push((entry.path().to_string(), bytes));
    }
    out
}

/// Lists entry paths in archive order.
pub fn names(archive: &[u8]) -> Vec<String> {
    arcstream::entries(archive.to_vec())
        .unwrap()
        .iter()
        .map(|e| e.path().to_string())
        .collect()
}

/// Every valid format/compression pair available in this build.
pub fn all_layouts() -> Vec<ArchiveOptions> {
    let mut layouts = vec![
        ArchiveOptions::new()
            .format(Format::Zip)
            .compression(Compression::Store),
        ArchiveOptions::new()
            .format(Format::Zip)
            .compression(Compression::Deflate),
        ArchiveOptions::new()
            .format(Format::Tar)
            .compression(Compression::None),
        ArchiveOptions::new()
            .format(Format::Tar)
            .compression(Compression::Gzip),
    ];
    if Compression::Bzip2.is_available() {
        layouts.push(
            ArchiveOptions::new()
                .format(Format::Tar)
                .compression(Compression::Bzip2),
        );
    }
    if Compression::Lzma.is_available() {
        layouts.push(
            ArchiveOptions::new()
                .format(Format::Tar)
                .compression(Compression::Lzma),
        );
    }
    layouts
}

/// Builds a plain tarball with the `tar` crate directly.
pub fn raw_tar(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_600_000_000);
        header.set_entry_type(tar::EntryType::Regular);
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Builds a ZIP archive with the `zip` crate directly.
pub fn raw_zip(files: &[(&str, &[u8])], method: zip::CompressionMethod) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default().compression_method(method);
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
