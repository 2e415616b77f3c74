//! Blob store orchestrator
//!
//! [`Store`] binds a storage driver to the envelope codec: it generates ids,
//! writes and validates envelope headers, and hands out streaming
//! [`WFile`]/[`RFile`] handles that keep the integrity hashes honest as
//! payload bytes move through them.

mod rfile;
mod wfile;

pub use rfile::RFile;
pub use wfile::WFile;

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::config::Location;
use crate::driver::{BlobWriter, Driver, Registry};
use crate::envelope::{self, DecodeError};
use crate::id::{IdGenerator, TimeOrderedIds};
use crate::{Error, Result};

/// A connection to a blob store.
///
/// Owns exactly one driver for its lifetime and caches nothing: every
/// operation goes straight to the backend. The store is safe to share
/// across threads to the extent the driver is, which both built-in drivers
/// are.
pub struct Store {
    driver: Arc<dyn Driver>,
    ids: Box<dyn IdGenerator>,
}

impl Store {
    /// Open a store at a scheme-qualified location, resolving the scheme
    /// through `registry`. An unregistered scheme is a configuration
    /// error, reported before any backend work happens.
    pub fn open(url: &str, registry: &Registry) -> Result<Self> {
        let location = Location::from_str(url)?;
        let driver = registry.open(&location)?;
        Ok(Store::with_driver(driver))
    }

    /// Open a store using the built-in driver registry.
    pub fn open_default(url: &str) -> Result<Self> {
        Store::open(url, &Registry::builtin())
    }

    /// Wrap an already-constructed driver.
    pub fn with_driver(driver: Arc<dyn Driver>) -> Self {
        Store {
            driver,
            ids: Box::new(TimeOrderedIds),
        }
    }

    /// Replace the id generation strategy.
    pub fn with_id_generator(mut self, ids: Box<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Create a new blob under a generated id. The returned handle must be
    /// closed for the blob to become readable.
    pub fn create<M: Serialize>(&self, meta: Option<&M>) -> Result<WFile> {
        self.create_id(&self.ids.generate(), meta)
    }

    /// Like [`create`](Store::create) with a caller-chosen id. Writing an
    /// id that already holds a blob is allowed; the previous contents are
    /// replaced when the new handle is successfully closed.
    pub fn create_id<M: Serialize>(&self, id: &str, meta: Option<&M>) -> Result<WFile> {
        let encoded = match meta {
            Some(m) => Some(bincode::serialize(m)?),
            None => None,
        };
        self.create_id_raw(id, encoded.as_deref())
    }

    /// Envelope-level create: the metadata is taken as already-serialized
    /// bytes, so callers can bring any serialization strategy.
    ///
    /// If writing the envelope header fails, the in-progress artifact is
    /// discarded and the id is removed before the error is returned, so a
    /// failed create never leaves a blob resolvable under the id.
    pub fn create_id_raw(&self, id: &str, meta: Option<&[u8]>) -> Result<WFile> {
        let mut writer = self
            .driver
            .create(id)
            .map_err(|e| Error::from_io(id, "create", e))?;
        match self.write_header(&mut writer, id, meta) {
            Ok(metadata_len) => Ok(WFile::new(
                id.to_string(),
                writer,
                self.driver.scheme(),
                metadata_len,
            )),
            Err(err) => {
                // Best-effort rollback; the original error wins.
                if let Err(e) = writer.abort() {
                    warn!(id, error = %e, "failed to discard in-progress blob");
                }
                if let Err(e) = self.driver.remove(id) {
                    warn!(id, error = %e, "failed to remove partially created blob");
                }
                Err(err)
            }
        }
    }

    fn write_header(
        &self,
        writer: &mut Box<dyn BlobWriter>,
        id: &str,
        meta: Option<&[u8]>,
    ) -> Result<u64> {
        envelope::write_prelude(writer, meta)
            .map_err(|e| Error::from_io(id, "write header", e))?;
        if writer.can_seek() {
            // Reserve the data header for patching at finalize time.
            envelope::write_data_header(writer, 0, 0)
                .map_err(|e| Error::from_io(id, "write header", e))?;
        }
        Ok(meta.map(|m| m.len() as u64).unwrap_or(0))
    }

    /// Open a blob for reading. The envelope header is decoded and
    /// validated here; payload integrity is verified by the returned
    /// handle as the payload streams out.
    pub fn open_blob(&self, id: &str) -> Result<RFile> {
        let mut reader = self
            .driver
            .open(id)
            .map_err(|e| Error::from_io(id, "open", e))?;
        match envelope::read_envelope(&mut reader) {
            Ok(env) => Ok(RFile::new(id.to_string(), reader, env)),
            Err(err) => Err(self.decode_error(id, err)),
        }
    }

    fn decode_error(&self, id: &str, err: DecodeError) -> Error {
        match err {
            // An envelope shorter than its own header is corruption, not
            // an I/O condition of the backend.
            DecodeError::Io(e) if e.kind() != std::io::ErrorKind::UnexpectedEof => {
                Error::from_io(id, "read header", e)
            }
            other => Error::CorruptEnvelope {
                id: id.to_string(),
                source: other,
            },
        }
    }

    /// Open, read the whole payload, verify it and close.
    pub fn read_all(&self, id: &str) -> Result<Vec<u8>> {
        let mut rfile = self.open_blob(id)?;
        let data = rfile.read_all()?;
        rfile.close()?;
        Ok(data)
    }

    /// Store a payload with optional metadata under a generated id.
    pub fn put<M: Serialize>(&self, data: &[u8], meta: Option<&M>) -> Result<String> {
        self.put_id(&self.ids.generate(), data, meta)
    }

    /// Store a payload with optional metadata under the given id.
    pub fn put_id<M: Serialize>(&self, id: &str, data: &[u8], meta: Option<&M>) -> Result<String> {
        let mut wfile = self.create_id(id, meta)?;
        wfile.write_all(data)?;
        wfile.close()?;
        Ok(id.to_string())
    }

    /// Delete the blob with the given id.
    pub fn remove(&self, id: &str) -> Result<()> {
        self.driver
            .remove(id)
            .map_err(|e| Error::from_io(id, "remove", e))
    }

    /// Close the connection to the backend. The store must not be used
    /// afterwards.
    pub fn close(&self) -> Result<()> {
        self.driver
            .close()
            .map_err(|e| Error::from_io("store", "close", e))
    }
}
