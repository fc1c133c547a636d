//! Multi-file stream tests over real files.

use std::{
    fs,
    io::{Read, Seek, SeekFrom},
    path::PathBuf,
};

use d2vsource::{D2vError, MultiFileReader, SeekTarget};
use tempfile::TempDir;

/// Two files: `0..10` then `10..16`.
fn split_source() -> (TempDir, Vec<PathBuf>) {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("VTS_01_1.VOB");
    let second = dir.path().join("VTS_01_2.VOB");
    fs::write(&first, (0u8..10).collect::<Vec<_>>()).unwrap();
    fs::write(&second, (10u8..16).collect::<Vec<_>>()).unwrap();
    (dir, vec![first, second])
}

#[test]
fn reads_across_file_boundary() {
    let (_dir, paths) = split_source();
    let mut reader = MultiFileReader::open(&paths).unwrap();
    assert_eq!(reader.len(), 16);

    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).unwrap();
    assert_eq!(bytes, (0u8..16).collect::<Vec<_>>());
}

#[test]
fn seek_target_sets_origin() {
    let (_dir, paths) = split_source();
    let mut reader = MultiFileReader::open(&paths).unwrap();

    reader
        .seek_to_target(SeekTarget {
            file: 0,
            position: 8,
        })
        .unwrap();
    assert_eq!(reader.len(), 8);

    let mut buffer = [0u8; 4];
    reader.read_exact(&mut buffer).unwrap();
    assert_eq!(buffer, [8, 9, 10, 11]);

    reader.seek(SeekFrom::Start(0)).unwrap();
    reader.read_exact(&mut buffer).unwrap();
    assert_eq!(buffer, [8, 9, 10, 11]);
}

#[test]
fn seek_target_in_second_file() {
    let (_dir, paths) = split_source();
    let mut reader = MultiFileReader::open(&paths).unwrap();

    reader
        .seek_to_target(SeekTarget {
            file: 1,
            position: 2,
        })
        .unwrap();
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).unwrap();
    assert_eq!(bytes, [12, 13, 14, 15]);
}

#[test]
fn seek_from_end_and_current() {
    let (_dir, paths) = split_source();
    let mut reader = MultiFileReader::open(&paths).unwrap();

    assert_eq!(reader.seek(SeekFrom::End(-3)).unwrap(), 13);
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte).unwrap();
    assert_eq!(byte, [13]);

    assert_eq!(reader.seek(SeekFrom::Current(-5)).unwrap(), 9);
    reader.read_exact(&mut byte).unwrap();
    assert_eq!(byte, [9]);

    assert!(reader.seek(SeekFrom::Current(-100)).is_err());
}

#[test]
fn reading_past_end_returns_zero() {
    let (_dir, paths) = split_source();
    let mut reader = MultiFileReader::open(&paths).unwrap();

    reader.seek(SeekFrom::Start(40)).unwrap();
    let mut buffer = [0u8; 4];
    assert_eq!(reader.read(&mut buffer).unwrap(), 0);
}

#[test]
fn target_outside_files_is_rejected() {
    let (_dir, paths) = split_source();
    let mut reader = MultiFileReader::open(&paths).unwrap();

    let error = reader
        .seek_to_target(SeekTarget {
            file: 2,
            position: 0,
        })
        .unwrap_err();
    assert!(matches!(error, D2vError::StructuralInconsistency(_)));

    assert!(
        reader
            .seek_to_target(SeekTarget {
                file: 1,
                position: 7,
            })
            .is_err()
    );
}

#[test]
fn empty_or_missing_files_cannot_open() {
    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty.vob");
    fs::write(&empty, b"").unwrap();

    let error = MultiFileReader::open(&[&empty]).unwrap_err();
    assert!(matches!(error, D2vError::CannotOpen { .. }), "{error}");

    let missing = dir.path().join("missing.vob");
    let error = MultiFileReader::open(&[&missing]).unwrap_err();
    assert!(error.is_parse_error());
}
