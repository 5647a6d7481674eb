//! Update and delete tests.
//!
//! Rebuilt archives must keep the original layout, keep untouched entries
//! byte-identical, and put replacements at the end.

mod common;

use std::io::Cursor;

use arcstream::{
    ArchiveEditor, ArchiveOptions, ArchiveReader, ByteSource, Compression, ContentValue,
    EditableArchive, EntryMetadata, Error, Format, NameSelection,
};
use common::{all_layouts, create_text_archive, names, read_all};

#[test]
fn test_update_replaces_and_appends() {
    for options in all_layouts() {
        let archive = create_text_archive(&options, &[("a", "1"), ("b", "2"), ("c", "3")]);
        let updated = arcstream::update(
            archive.clone(),
            vec![
                EntryMetadata::file("b").unwrap(),
                EntryMetadata::file("d").unwrap(),
            ],
            vec![ContentValue::text("two"), ContentValue::text("4")],
        )
        .unwrap();

        assert_eq!(names(&updated), ["a", "c", "b", "d"], "layout {:?}", options);
        let texts = arcstream::extract_text(updated.clone(), &NameSelection::all(), "UTF-8").unwrap();
        assert_eq!(texts, ["1", "3", "two", "4"]);

        let before = arcstream::archive_options(archive).unwrap();
        let after = arcstream::archive_options(updated).unwrap();
        assert_eq!(before.format, after.format);
        assert_eq!(before.effective_compression(), after.effective_compression());
    }
}

#[test]
fn test_kept_entries_are_byte_identical() {
    let payload: Vec<u8> = (0..50_000u32).map(|i| (i * 31 % 256) as u8).collect();
    for options in all_layouts() {
        let archive = arcstream::create(
            vec![
                EntryMetadata::file("keep.bin").unwrap(),
                EntryMetadata::file("swap.txt").unwrap(),
            ],
            vec![ContentValue::binary(payload.clone()), ContentValue::text("old")],
            &options,
        )
        .unwrap();
        let updated = arcstream::update(
            archive,
            vec![EntryMetadata::file("swap.txt").unwrap()],
            vec![ContentValue::text("new")],
        )
        .unwrap();
        let read = read_all(&updated);
        assert_eq!(read[0].0, "keep.bin");
        assert_eq!(read[0].1, payload);
        assert_eq!(read[1].1, b"new");
    }
}

#[test]
fn test_update_replaces_duplicates() {
    let archive = common::raw_tar(&[("dup", b"1"), ("other", b"x"), ("dup", b"2")]);
    let updated = arcstream::update(
        archive,
        vec![EntryMetadata::file("dup").unwrap()],
        vec![ContentValue::text("3")],
    )
    .unwrap();
    assert_eq!(names(&updated), ["other", "dup"]);
}

#[test]
fn test_delete_is_idempotent() {
    for options in all_layouts() {
        let archive = create_text_archive(&options, &[("a", "1"), ("b", "2"), ("c", "3")]);
        let once = arcstream::delete(archive, ["b"]).unwrap();
        let twice = arcstream::delete(once.clone(), ["b"]).unwrap();
        assert_eq!(names(&once), ["a", "c"]);
        assert_eq!(read_all(&once), read_all(&twice));
    }
}

#[test]
fn test_delete_everything_leaves_empty_archive() {
    let options = ArchiveOptions::new()
        .format(Format::Tar)
        .compression(Compression::Gzip);
    let archive = create_text_archive(&options, &[("a", "1")]);
    let emptied = arcstream::delete(archive, ["a"]).unwrap();
    assert!(arcstream::entries(emptied.clone()).unwrap().is_empty());

    let reader = ArchiveReader::open(ByteSource::memory(emptied)).unwrap();
    let layout = reader.layout().unwrap();
    assert_eq!(layout.format, Format::Tar);
    assert_eq!(layout.compression, Compression::Gzip);
}

#[test]
fn test_update_empty_source_uses_defaults() {
    let updated = arcstream::update(
        Vec::<u8>::new(),
        vec![EntryMetadata::file("first.txt").unwrap()],
        vec![ContentValue::text("hi")],
    )
    .unwrap();
    let options = arcstream::archive_options(updated.clone()).unwrap();
    assert_eq!(options.format, Format::Zip);
    assert_eq!(options.effective_compression(), Compression::Deflate);
    assert_eq!(names(&updated), ["first.txt"]);
}

#[test]
fn test_update_cardinality_checked_first() {
    let err = arcstream::update(
        b"not an archive".to_vec(),
        vec![EntryMetadata::file("a").unwrap()],
        vec![ContentValue::text("1"), ContentValue::text("2")],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::EntryCountMismatch {
            entries: 1,
            contents: 2
        }
    ));
}

#[test]
fn test_update_rejects_override_on_tar() {
    let archive = create_text_archive(&ArchiveOptions::new().format(Format::Tar), &[("a", "1")]);
    let err = arcstream::update(
        archive,
        vec![
            EntryMetadata::file("b")
                .unwrap()
                .with_compression(Compression::Store),
        ],
        vec![ContentValue::text("2")],
    )
    .unwrap_err();
    assert!(err.is_configuration_error());
}

#[test]
fn test_update_zip_with_override() {
    let archive = create_text_archive(&ArchiveOptions::default(), &[("a", "1")]);
    let updated = arcstream::update(
        archive,
        vec![
            EntryMetadata::file("b")
                .unwrap()
                .with_compression(Compression::Store),
        ],
        vec![ContentValue::text("2")],
    )
    .unwrap();
    let listed = arcstream::entries(updated).unwrap();
    assert_eq!(listed[1].compression, Some(Compression::Store));
}

#[test]
fn test_update_invalid_content_type() {
    let archive = create_text_archive(&ArchiveOptions::default(), &[("a", "1")]);
    let err = arcstream::update(
        archive,
        vec![EntryMetadata::file("b").unwrap()],
        vec![ContentValue::other("Integer")],
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidContentType { .. }));
}

#[test]
fn test_editor_result_counts() {
    let archive = create_text_archive(
        &ArchiveOptions::default(),
        &[("a", "1"), ("b", "2"), ("c", "3")],
    );
    let mut editor = ArchiveEditor::open(archive).unwrap();
    editor.delete("a");
    editor.put(EntryMetadata::file("b").unwrap(), ContentValue::text("22"));
    editor.put(EntryMetadata::file("z").unwrap(), ContentValue::text("26"));
    assert_eq!(editor.pending_operations(), 3);

    let (result, output) = editor.apply(Cursor::new(Vec::new())).unwrap();
    assert_eq!(result.entries_kept, 1);
    assert_eq!(result.entries_deleted, 1);
    assert_eq!(result.entries_replaced, 1);
    assert_eq!(result.entries_added, 2);
    assert_eq!(result.total_entries(), 3);
    assert_eq!(names(&output.into_inner()), ["c", "b", "z"]);
}

#[test]
fn test_edit_from_reader() {
    let archive = create_text_archive(&ArchiveOptions::default(), &[("a", "1"), ("b", "2")]);
    let reader = ArchiveReader::open(ByteSource::sequential(Cursor::new(archive))).unwrap();
    let mut editor = reader.edit();
    editor.delete("b");
    let (_, output) = editor.apply(Cursor::new(Vec::new())).unwrap();
    assert_eq!(names(&output.into_inner()), ["a"]);
}

#[test]
fn test_truncated_source_fails_as_corruption() {
    let data = vec![b'x'; 2000];
    let mut archive = common::create_binary_archive(
        &ArchiveOptions::new().format(Format::Tar),
        &[("a", &data)],
    );
    archive.truncate(1000);
    let err = arcstream::delete(archive, ["zzz"]).unwrap_err();
    assert!(err.is_corruption(), "unexpected error: {:?}", err);
}

#[test]
fn test_links_do_not_survive_a_rebuild() {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(4);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    builder.append_data(&mut header, "real.txt", &b"data"[..]).unwrap();
    let mut link = tar::Header::new_gnu();
    link.set_size(0);
    link.set_entry_type(tar::EntryType::Symlink);
    link.set_link_name("real.txt").unwrap();
    builder.append_data(&mut link, "alias", std::io::empty()).unwrap();
    let archive = builder.into_inner().unwrap();

    let rebuilt = arcstream::delete(archive, Vec::<&str>::new()).unwrap();
    assert_eq!(names(&rebuilt), ["real.txt"]);
}

#[test]
fn test_sequential_zip_source_is_edited() {
    let archive = create_text_archive(&ArchiveOptions::default(), &[("a", "1"), ("b", "2")]);
    let updated = arcstream::update(
        ByteSource::sequential(Cursor::new(archive)),
        vec![EntryMetadata::file("a").unwrap()],
        vec![ContentValue::text("one")],
    )
    .unwrap();
    let texts = arcstream::extract_text(updated, &NameSelection::all(), "UTF-8").unwrap();
    assert_eq!(texts, ["2", "one"]);
}
