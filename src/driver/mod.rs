//! Storage driver abstraction
//!
//! A [`Driver`] is a backend that can create, open and remove raw blob
//! streams by id. The store layers the envelope codec on top of whatever a
//! driver hands back, so drivers never interpret blob contents.
//!
//! Drivers are looked up by scheme through an explicit [`Registry`] owned by
//! the caller; there is no process-wide mutable table.

mod file;
mod memory;

pub use file::FileDriver;
pub use memory::MemoryDriver;

use std::collections::HashMap;
use std::io::{self, Read, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Location;
use crate::{Error, Result};

/// A raw write stream for one in-progress blob.
///
/// The handle writes into a scratch location; nothing is visible under the
/// blob's id until [`commit`](BlobWriter::commit) promotes it atomically.
/// Seeking is an optional capability: the store checks
/// [`can_seek`](BlobWriter::can_seek) before deciding how to finalize the
/// envelope's data header.
pub trait BlobWriter: Write + Send {
    /// Whether the backend supports repositioning the write cursor.
    fn can_seek(&self) -> bool;

    /// Reposition the write cursor. Drivers without seek support return
    /// an error of kind [`io::ErrorKind::Unsupported`].
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Durably promote the scratch artifact to its final address. Must be
    /// atomic with respect to readers: an `open` of the id observes either
    /// the previous state or the fully committed blob, never a prefix.
    fn commit(&mut self) -> io::Result<()>;

    /// Discard the scratch artifact without publishing anything.
    fn abort(&mut self) -> io::Result<()>;
}

impl std::fmt::Debug for dyn BlobWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BlobWriter")
    }
}

/// A raw read stream for one stored blob.
pub trait BlobReader: Read + Send {}

impl std::fmt::Debug for dyn BlobReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BlobReader")
    }
}

impl<T: Read + Send> BlobReader for T {}

/// Contract every storage backend implements.
///
/// Implementations must be safe for concurrent use: the store shares one
/// driver across all in-flight operations.
pub trait Driver: Send + Sync {
    /// Open a scratch write stream for a new blob. Fails with
    /// [`io::ErrorKind::AlreadyExists`] if a scratch stream for the same id
    /// is already open.
    fn create(&self, id: &str) -> io::Result<Box<dyn BlobWriter>>;

    /// Open a committed blob for reading. Fails with
    /// [`io::ErrorKind::NotFound`] if no blob exists under the id.
    fn open(&self, id: &str) -> io::Result<Box<dyn BlobReader>>;

    /// Delete a committed blob. Removing an id that does not exist is not
    /// an error.
    fn remove(&self, id: &str) -> io::Result<()>;

    /// Release backend resources. Idempotent.
    fn close(&self) -> io::Result<()>;

    /// The scheme this driver was registered under, for error reporting.
    fn scheme(&self) -> &'static str;
}

/// A factory producing a driver from a parsed location.
pub type DriverFactory = fn(&Location) -> Result<Arc<dyn Driver>>;

// Schemes we know about but do not ship a driver for, so the error for an
// unregistered scheme can point at the missing collaborator.
const EXTERNAL_SCHEMES: &[(&str, &str)] = &[
    ("s3", "an S3 object-store driver"),
    ("gridfs", "a GridFS driver"),
];

/// Explicit scheme → factory table.
///
/// [`Registry::builtin`] pre-registers the drivers shipped with this crate;
/// embedders add their own backends with [`register`](Registry::register)
/// before opening a store.
pub struct Registry {
    factories: RwLock<HashMap<String, DriverFactory>>,
}

impl Registry {
    /// An empty registry with no drivers.
    pub fn new() -> Self {
        Registry {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// A registry with the built-in `file` and `mem` drivers.
    pub fn builtin() -> Self {
        let registry = Registry::new();
        registry.register("file", file::open_location);
        registry.register("mem", memory::open_location);
        registry
    }

    /// Register a driver factory under a scheme, replacing any previous
    /// registration for the same scheme.
    pub fn register(&self, scheme: &str, factory: DriverFactory) {
        self.factories.write().insert(scheme.to_string(), factory);
    }

    /// Resolve a location to an opened driver.
    pub fn open(&self, location: &Location) -> Result<Arc<dyn Driver>> {
        let factory = {
            let factories = self.factories.read();
            factories.get(location.scheme()).copied()
        };
        match factory {
            Some(factory) => factory(location),
            None => {
                let scheme = location.scheme();
                let hint = EXTERNAL_SCHEMES
                    .iter()
                    .find(|(s, _)| *s == scheme)
                    .map(|(_, what)| format!(" (register {what} to use it)"))
                    .unwrap_or_default();
                Err(Error::Config(format!(
                    "no blob store driver registered for scheme {scheme:?}{hint}"
                )))
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::builtin()
    }
}
