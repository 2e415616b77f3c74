//! In-memory driver
//!
//! A `HashMap`-backed store for tests and embedding. It mirrors the
//! filesystem driver's lifecycle: writes stage into a private buffer, an id
//! reservation plays the role of the exclusive-create temp file, and commit
//! publishes the whole buffer under the map's write lock in one step.

use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::Location;
use crate::driver::{BlobReader, BlobWriter, Driver};
use crate::Result;

/// Factory registered under the `mem` scheme. The location value is
/// ignored; every open produces an independent store.
pub(crate) fn open_location(_location: &Location) -> Result<Arc<dyn Driver>> {
    Ok(Arc::new(MemoryDriver::new()))
}

#[derive(Default)]
struct Shared {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    pending: Mutex<HashSet<String>>,
}

/// Heap-backed storage backend.
#[derive(Default)]
pub struct MemoryDriver {
    shared: Arc<Shared>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed blobs, for tests.
    pub fn len(&self) -> usize {
        self.shared.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.blobs.read().is_empty()
    }
}

impl Driver for MemoryDriver {
    fn create(&self, id: &str) -> io::Result<Box<dyn BlobWriter>> {
        let mut pending = self.shared.pending.lock();
        if !pending.insert(id.to_string()) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("blob {id:?} is already being written"),
            ));
        }
        Ok(Box::new(MemoryWriter {
            id: id.to_string(),
            buf: Some(Cursor::new(Vec::new())),
            shared: Arc::clone(&self.shared),
        }))
    }

    fn open(&self, id: &str) -> io::Result<Box<dyn BlobReader>> {
        let blobs = self.shared.blobs.read();
        let data = blobs
            .get(id)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no blob {id:?}")))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn remove(&self, id: &str) -> io::Result<()> {
        self.shared.blobs.write().remove(id);
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        Ok(())
    }

    fn scheme(&self) -> &'static str {
        "mem"
    }
}

struct MemoryWriter {
    id: String,
    buf: Option<Cursor<Vec<u8>>>,
    shared: Arc<Shared>,
}

impl MemoryWriter {
    fn buf(&mut self) -> io::Result<&mut Cursor<Vec<u8>>> {
        self.buf
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "memory handle already finalized"))
    }

    fn release(&mut self) {
        self.shared.pending.lock().remove(&self.id);
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        // A dropped, unfinalized writer must not pin its id forever.
        if self.buf.is_some() {
            self.release();
        }
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf()?.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BlobWriter for MemoryWriter {
    fn can_seek(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buf()?.seek(pos)
    }

    fn commit(&mut self) -> io::Result<()> {
        let buf = self
            .buf
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "memory handle already finalized"))?;
        self.shared
            .blobs
            .write()
            .insert(self.id.clone(), buf.into_inner());
        self.release();
        Ok(())
    }

    fn abort(&mut self) -> io::Result<()> {
        self.buf.take();
        self.release();
        Ok(())
    }
}
