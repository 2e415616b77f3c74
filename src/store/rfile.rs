//! Read handle for a stored blob

use std::io::{self, Read};

use serde::de::DeserializeOwned;

use crate::driver::BlobReader;
use crate::envelope::{ContentHasher, Envelope};
use crate::{Error, Result};

/// A streaming read handle returned by [`Store::open_blob`].
///
/// Reads are clamped to the payload length recorded in the envelope. Once
/// the payload has been fully consumed, [`close`](RFile::close) (and
/// [`read_all`](RFile::read_all)) compare the streamed length and hash
/// against the header and report [`Error::CorruptData`] on any mismatch.
///
/// [`Store::open_blob`]: crate::Store::open_blob
pub struct RFile {
    id: String,
    reader: Option<Box<dyn BlobReader>>,
    metadata: Vec<u8>,
    data_length: u64,
    data_hash: u64,
    hasher: ContentHasher,
    read: u64,
}

impl RFile {
    pub(crate) fn new(id: String, reader: Box<dyn BlobReader>, envelope: Envelope) -> Self {
        RFile {
            id,
            reader: Some(reader),
            metadata: envelope.metadata,
            data_length: envelope.data_length,
            data_hash: envelope.data_hash,
            hasher: ContentHasher::new(),
            read: 0,
        }
    }

    /// The blob id this handle reads from.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Payload length recorded in the envelope.
    pub fn len(&self) -> u64 {
        self.data_length
    }

    pub fn is_empty(&self) -> bool {
        self.data_length == 0
    }

    /// The decoded metadata bytes; empty if the blob was stored without
    /// metadata. The caller deserializes these with its own strategy, or
    /// uses [`metadata_as`](RFile::metadata_as) for the built-in one.
    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    /// Deserialize the metadata with the built-in bincode strategy.
    /// Returns `None` if the blob has no metadata.
    pub fn metadata_as<M: DeserializeOwned>(&self) -> Result<Option<M>> {
        if self.metadata.is_empty() {
            return Ok(None);
        }
        Ok(Some(bincode::deserialize(&self.metadata)?))
    }

    /// Stream payload bytes, folding them into the running hash.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let reader = self.reader.as_mut().ok_or(Error::ClosedHandle)?;
        let remaining = self.data_length - self.read;
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(remaining.min(usize::MAX as u64) as usize);
        let n = reader
            .read(&mut buf[..want])
            .map_err(|e| Error::from_io(&self.id, "read", e))?;
        self.hasher.update(&buf[..n]);
        self.read += n as u64;
        Ok(n)
    }

    /// Read the remaining payload to its end and verify its integrity.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        // The header's length field is untrusted until verified; cap the
        // upfront allocation and let the loop grow the buffer as real
        // bytes arrive.
        let remaining = self.data_length - self.read;
        let mut out = Vec::with_capacity(remaining.min(64 * 1024) as usize);
        let mut buf = [0u8; 8 * 1024];
        loop {
            let n = self.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        self.verify()?;
        Ok(out)
    }

    /// Release the backend handle. If the payload was fully consumed, the
    /// streamed length and hash must match the envelope; a mismatch is
    /// surfaced here as [`Error::CorruptData`]. Double close is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.reader.take().is_none() {
            return Ok(());
        }
        if self.read == self.data_length {
            self.verify()?;
        }
        Ok(())
    }

    fn verify(&self) -> Result<()> {
        let actual_hash = self.hasher.finish();
        if self.read != self.data_length || actual_hash != self.data_hash {
            return Err(Error::CorruptData {
                id: self.id.clone(),
                expected_len: self.data_length,
                actual_len: self.read,
                expected_hash: self.data_hash,
                actual_hash,
            });
        }
        Ok(())
    }
}

impl Read for RFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        RFile::read(self, buf).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}
