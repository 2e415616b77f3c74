//! End-to-end tests against the filesystem backend
//!
//! These exercise the full stack: registry resolution, the on-disk sharded
//! layout, envelope encoding and the integrity checks on the way back out.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::tempdir;

use blobcask::{Error, Registry, Store};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct FileMeta {
    filename: String,
    content_type: String,
}

fn file_store(base: &Path) -> Store {
    Store::open_default(&format!("file://{}", base.display())).unwrap()
}

/// Find the single finalized blob file under the base dir, skipping tmp/.
fn finalized_files(base: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in fs::read_dir(base).unwrap() {
        let entry = entry.unwrap();
        if entry.file_name() == "tmp" {
            continue;
        }
        if entry.path().is_dir() {
            for inner in fs::read_dir(entry.path()).unwrap() {
                found.push(inner.unwrap().path());
            }
        } else {
            found.push(entry.path());
        }
    }
    found
}

#[test]
fn test_roundtrip_on_disk() {
    let dir = tempdir().unwrap();
    let store = file_store(dir.path());

    let meta = FileMeta {
        filename: "report.pdf".into(),
        content_type: "application/pdf".into(),
    };
    let id = store.put(b"%PDF-1.7 pretend", Some(&meta)).unwrap();

    let mut rfile = store.open_blob(&id).unwrap();
    assert_eq!(rfile.metadata_as::<FileMeta>().unwrap().unwrap(), meta);
    assert_eq!(rfile.read_all().unwrap(), b"%PDF-1.7 pretend");
    rfile.close().unwrap();
}

#[test]
fn test_reopen_across_stores() {
    let dir = tempdir().unwrap();
    let id = {
        let store = file_store(dir.path());
        let id = store.put::<()>(b"durable", None).unwrap();
        store.close().unwrap();
        id
    };

    let store = file_store(dir.path());
    assert_eq!(store.read_all(&id).unwrap(), b"durable");
}

#[test]
fn test_sharded_layout_on_disk() {
    let dir = tempdir().unwrap();
    let store = file_store(dir.path());

    store.put_id::<()>("abc123XY", b"x", None).unwrap();
    assert!(dir.path().join("XY").join("abc123").is_file());

    store.put_id::<()>("abc123XY.png", b"x", None).unwrap();
    assert!(dir.path().join("XY").join("abc123.png").is_file());
}

#[test]
fn test_non_ascii_id_roundtrip() {
    let dir = tempdir().unwrap();
    let store = file_store(dir.path());

    store.put_id::<()>("ab€", b"payload", None).unwrap();
    assert_eq!(store.read_all("ab€").unwrap(), b"payload");

    store.put_id::<()>("ほげ-42.png", b"image", None).unwrap();
    assert_eq!(store.read_all("ほげ-42.png").unwrap(), b"image");
    store.remove("ほげ-42.png").unwrap();
    assert!(matches!(
        store.open_blob("ほげ-42.png"),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn test_no_temp_files_after_close() {
    let dir = tempdir().unwrap();
    let store = file_store(dir.path());
    store.put::<()>(b"payload", None).unwrap();

    let tmp_entries: Vec<_> = fs::read_dir(dir.path().join("tmp")).unwrap().collect();
    assert!(tmp_entries.is_empty());
}

#[test]
fn test_payload_corruption_detected() {
    let dir = tempdir().unwrap();
    let store = file_store(dir.path());
    let id = store.put::<()>(b"pristine payload bytes", None).unwrap();

    // Flip one payload byte (the payload is the file's tail).
    let path = finalized_files(dir.path()).pop().unwrap();
    let mut raw = fs::read(&path).unwrap();
    let last = raw.len() - 1;
    raw[last] ^= 0x01;
    fs::write(&path, &raw).unwrap();

    assert!(matches!(
        store.read_all(&id),
        Err(Error::CorruptData { .. })
    ));
}

#[test]
fn test_truncation_detected() {
    let dir = tempdir().unwrap();
    let store = file_store(dir.path());
    let id = store.put::<()>(b"pristine payload bytes", None).unwrap();

    let path = finalized_files(dir.path()).pop().unwrap();
    let raw = fs::read(&path).unwrap();
    fs::write(&path, &raw[..raw.len() - 4]).unwrap();

    assert!(matches!(
        store.read_all(&id),
        Err(Error::CorruptData { .. })
    ));
}

#[test]
fn test_corrupt_length_field_detected() {
    let dir = tempdir().unwrap();
    let store = file_store(dir.path());
    let id = store.put::<()>(b"pristine payload bytes", None).unwrap();

    // With no metadata the data-length field sits at bytes 25..33. Claim
    // an absurd length; the read must fail cleanly, not allocate for it.
    let path = finalized_files(dir.path()).pop().unwrap();
    let mut raw = fs::read(&path).unwrap();
    raw[25..33].copy_from_slice(&(1u64 << 62).to_be_bytes());
    fs::write(&path, &raw).unwrap();

    assert!(matches!(
        store.read_all(&id),
        Err(Error::CorruptData { .. })
    ));
}

#[test]
fn test_version_gate() {
    let dir = tempdir().unwrap();
    let store = file_store(dir.path());
    let id = store.put::<()>(b"payload", None).unwrap();

    let path = finalized_files(dir.path()).pop().unwrap();
    let mut raw = fs::read(&path).unwrap();
    raw[0] = 2;
    fs::write(&path, &raw).unwrap();

    assert!(matches!(
        store.open_blob(&id),
        Err(Error::CorruptEnvelope { .. })
    ));
}

#[test]
fn test_metadata_corruption_detected_at_open() {
    let dir = tempdir().unwrap();
    let store = file_store(dir.path());
    let meta = FileMeta {
        filename: "x".into(),
        content_type: "y".into(),
    };
    let id = store.put(b"payload", Some(&meta)).unwrap();

    // First metadata byte sits right after the 25-byte prelude.
    let path = finalized_files(dir.path()).pop().unwrap();
    let mut raw = fs::read(&path).unwrap();
    raw[25] ^= 0xff;
    fs::write(&path, &raw).unwrap();

    assert!(matches!(
        store.open_blob(&id),
        Err(Error::CorruptEnvelope { .. })
    ));
}

#[test]
fn test_empty_metadata_roundtrip() {
    let dir = tempdir().unwrap();
    let store = file_store(dir.path());
    let id = store.put::<()>(b"payload", None).unwrap();

    let mut rfile = store.open_blob(&id).unwrap();
    assert!(rfile.metadata().is_empty());
    assert_eq!(rfile.read_all().unwrap(), b"payload");
    rfile.close().unwrap();
}

#[test]
fn test_remove_then_open_is_not_found() {
    let dir = tempdir().unwrap();
    let store = file_store(dir.path());
    let id = store.put::<()>(b"short lived", None).unwrap();

    store.remove(&id).unwrap();
    assert!(matches!(
        store.open_blob(&id),
        Err(Error::NotFound { .. })
    ));
    store.remove(&id).unwrap();
}

#[test]
fn test_overwrite_is_last_close_wins() {
    let dir = tempdir().unwrap();
    let store = file_store(dir.path());
    store.put_id::<()>("stable-id-01", b"first", None).unwrap();
    store.put_id::<()>("stable-id-01", b"second", None).unwrap();
    assert_eq!(store.read_all("stable-id-01").unwrap(), b"second");
}

#[test]
fn test_unregistered_scheme_fails_at_open() {
    let registry = Registry::builtin();
    assert!(matches!(
        Store::open("gridfs://blobs", &registry),
        Err(Error::Config(_))
    ));
}
