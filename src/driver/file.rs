//! Filesystem driver
//!
//! Blobs live under a base directory in a sharded tree:
//! `base/<last-2-chars-of-id>/<rest-of-id><ext>`. The last two characters
//! are used as the bucket because the default id generator's leading
//! characters grow monotonically with time; sharding on them would funnel
//! every blob from a given period into the same directory.
//!
//! Writes go to `base/tmp/<id>` with exclusive-create semantics and are
//! promoted to the sharded path with an atomic rename at commit time, so a
//! reader can never observe a half-written blob under its final id.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Location;
use crate::driver::{BlobReader, BlobWriter, Driver};
use crate::{Error, Result};

/// Factory registered under the `file` scheme. The location value is the
/// base directory; it and its `tmp/` subdirectory are created if absent.
pub(crate) fn open_location(location: &Location) -> Result<Arc<dyn Driver>> {
    let dir = PathBuf::from(location.value());
    FileDriver::open(dir).map(|d| Arc::new(d) as Arc<dyn Driver>)
}

/// Local-disk storage backend.
pub struct FileDriver {
    dir: PathBuf,
    tmp_dir: PathBuf,
}

impl FileDriver {
    /// Open a driver rooted at `dir`, creating the directory tree if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let tmp_dir = dir.join("tmp");
        fs::create_dir_all(&tmp_dir).map_err(|e| {
            Error::Config(format!(
                "cannot create blob directory {}: {e}",
                tmp_dir.display()
            ))
        })?;
        Ok(FileDriver { dir, tmp_dir })
    }

    fn tmp_path(&self, id: &str) -> PathBuf {
        self.tmp_dir.join(id)
    }

    /// Final sharded path for an id: extension stripped, last two characters
    /// of the stem as the bucket, remainder (plus extension) as the name.
    /// Stems of two characters or fewer cannot be split and land directly
    /// under the base directory. Ids are caller-supplied and may be any
    /// UTF-8, so the split point is found per character, never by byte.
    fn final_path(&self, id: &str) -> PathBuf {
        let (stem, ext) = split_extension(id);
        let shard_at = match stem.char_indices().nth_back(1) {
            Some((i, _)) if i > 0 => i,
            _ => return self.dir.join(id),
        };
        let (name, shard) = stem.split_at(shard_at);
        self.dir.join(shard).join(format!("{name}{ext}"))
    }
}

fn split_extension(id: &str) -> (&str, &str) {
    match id.rfind('.') {
        // A leading dot is a hidden-file name, not an extension.
        Some(0) | None => (id, ""),
        Some(pos) => id.split_at(pos),
    }
}

impl Driver for FileDriver {
    fn create(&self, id: &str) -> io::Result<Box<dyn BlobWriter>> {
        let tmp = self.tmp_path(id);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&tmp)?;
        Ok(Box::new(FileWriter {
            file: Some(file),
            tmp,
            dest: self.final_path(id),
        }))
    }

    fn open(&self, id: &str) -> io::Result<Box<dyn BlobReader>> {
        let file = File::open(self.final_path(id))?;
        Ok(Box::new(file))
    }

    fn remove(&self, id: &str) -> io::Result<()> {
        match fs::remove_file(self.final_path(id)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn close(&self) -> io::Result<()> {
        Ok(())
    }

    fn scheme(&self) -> &'static str {
        "file"
    }
}

struct FileWriter {
    file: Option<File>,
    tmp: PathBuf,
    dest: PathBuf,
}

impl FileWriter {
    fn file(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "file handle already finalized"))
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

impl BlobWriter for FileWriter {
    fn can_seek(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file()?.seek(pos)
    }

    fn commit(&mut self) -> io::Result<()> {
        let file = self
            .file
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "file handle already finalized"))?;
        file.sync_all()?;
        drop(file);
        if let Some(parent) = self.dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&self.tmp, &self.dest)
    }

    fn abort(&mut self) -> io::Result<()> {
        self.file.take();
        match fs::remove_file(&self.tmp) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_sharded_path() {
        let dir = tempdir().unwrap();
        let drv = FileDriver::open(dir.path()).unwrap();
        assert_eq!(drv.final_path("abc123XY"), dir.path().join("XY/abc123"));
        assert_eq!(
            drv.final_path("abc123XY.png"),
            dir.path().join("XY/abc123.png")
        );
    }

    #[test]
    fn test_non_ascii_ids_shard_on_char_boundaries() {
        let dir = tempdir().unwrap();
        let drv = FileDriver::open(dir.path()).unwrap();
        // '€' is three bytes; the bucket is still the last two characters.
        assert_eq!(drv.final_path("ab€"), dir.path().join("b€").join("a"));
        assert_eq!(
            drv.final_path("blob-日本語"),
            dir.path().join("本語").join("blob-日")
        );
        // Two characters of any width cannot be split.
        assert_eq!(drv.final_path("a€"), dir.path().join("a€"));
        assert_eq!(drv.final_path("a€.png"), dir.path().join("a€.png"));
    }

    #[test]
    fn test_short_ids_are_not_sharded() {
        let dir = tempdir().unwrap();
        let drv = FileDriver::open(dir.path()).unwrap();
        assert_eq!(drv.final_path("ab"), dir.path().join("ab"));
        assert_eq!(drv.final_path("ab.png"), dir.path().join("ab.png"));
    }

    #[test]
    fn test_create_commit_open_roundtrip() {
        let dir = tempdir().unwrap();
        let drv = FileDriver::open(dir.path()).unwrap();

        let mut w = drv.create("blob01ab").unwrap();
        w.write_all(b"raw bytes").unwrap();
        w.commit().unwrap();

        let mut r = drv.open("blob01ab").unwrap();
        let mut got = Vec::new();
        r.read_to_end(&mut got).unwrap();
        assert_eq!(got, b"raw bytes");
    }

    #[test]
    fn test_exclusive_create() {
        let dir = tempdir().unwrap();
        let drv = FileDriver::open(dir.path()).unwrap();

        let _w = drv.create("dup01").unwrap();
        let err = drv.create("dup01").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_uncommitted_blob_is_not_openable() {
        let dir = tempdir().unwrap();
        let drv = FileDriver::open(dir.path()).unwrap();

        let mut w = drv.create("pending1").unwrap();
        w.write_all(b"half").unwrap();
        let err = drv.open("pending1").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_abort_removes_temp_file() {
        let dir = tempdir().unwrap();
        let drv = FileDriver::open(dir.path()).unwrap();

        let mut w = drv.create("gone01").unwrap();
        w.write_all(b"scrap").unwrap();
        w.abort().unwrap();
        assert!(!dir.path().join("tmp/gone01").exists());
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let dir = tempdir().unwrap();
        let drv = FileDriver::open(dir.path()).unwrap();
        drv.remove("never-existed-01").unwrap();
    }
}
