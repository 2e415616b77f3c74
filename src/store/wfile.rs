//! Write handle for an in-progress blob

use std::io::{self, SeekFrom, Write};

use tracing::warn;

use crate::driver::BlobWriter;
use crate::envelope::{self, ContentHasher};
use crate::{Error, Result};

/// A streaming write handle returned by [`Store::create`].
///
/// Payload bytes written here are folded into the running length and hash;
/// [`close`](WFile::close) patches both into the envelope's reserved data
/// header and promotes the blob to its final address. Dropping an unclosed
/// handle aborts the write, so nothing becomes visible under the id and no
/// scratch artifact is leaked.
///
/// [`Store::create`]: crate::Store::create
pub struct WFile {
    id: String,
    writer: Option<Box<dyn BlobWriter>>,
    scheme: &'static str,
    metadata_len: u64,
    hasher: ContentHasher,
    written: u64,
}

impl WFile {
    pub(crate) fn new(
        id: String,
        writer: Box<dyn BlobWriter>,
        scheme: &'static str,
        metadata_len: u64,
    ) -> Self {
        WFile {
            id,
            writer: Some(writer),
            scheme,
            metadata_len,
            hasher: ContentHasher::new(),
            written: 0,
        }
    }

    /// The blob id this handle writes to.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stream payload bytes to the backend.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let writer = self.writer.as_mut().ok_or(Error::ClosedHandle)?;
        let n = writer
            .write(buf)
            .map_err(|e| Error::from_io(&self.id, "write", e))?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    /// Write the whole buffer.
    pub fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf)?;
            if n == 0 {
                return Err(Error::Io {
                    id: self.id.clone(),
                    op: "write",
                    source: io::Error::new(io::ErrorKind::WriteZero, "backend accepted 0 bytes"),
                });
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    /// Finalize the blob: patch the envelope's data length and hash into
    /// the reserved header fields and atomically promote the blob to its
    /// final address. Closing an already-closed handle is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let mut writer = match self.writer.take() {
            Some(w) => w,
            None => return Ok(()),
        };
        if !writer.can_seek() {
            // No trailer strategy is implemented; a non-seekable backend
            // cannot express the final length and hash.
            let err = Error::UnsupportedFinalization {
                scheme: self.scheme.to_string(),
            };
            self.abort_raw(&mut writer);
            return Err(err);
        }
        let result = self.finalize(&mut writer);
        if let Err(err) = result {
            self.abort_raw(&mut writer);
            return Err(err);
        }
        Ok(())
    }

    fn finalize(&mut self, writer: &mut Box<dyn BlobWriter>) -> Result<()> {
        let offset = envelope::data_header_offset(self.metadata_len);
        writer
            .seek(SeekFrom::Start(offset))
            .map_err(|e| Error::from_io(&self.id, "finalize", e))?;
        envelope::write_data_header(writer, self.written, self.hasher.finish())
            .map_err(|e| Error::from_io(&self.id, "finalize", e))?;
        writer
            .commit()
            .map_err(|e| Error::from_io(&self.id, "commit", e))
    }

    fn abort_raw(&self, writer: &mut Box<dyn BlobWriter>) {
        if let Err(e) = writer.abort() {
            warn!(id = %self.id, error = %e, "failed to discard in-progress blob");
        }
    }
}

impl std::fmt::Debug for WFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WFile")
            .field("id", &self.id)
            .field("scheme", &self.scheme)
            .field("metadata_len", &self.metadata_len)
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

impl Write for WFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        WFile::write(self, buf).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(w) => w.flush(),
            None => Err(io::Error::new(io::ErrorKind::Other, Error::ClosedHandle)),
        }
    }
}

impl Drop for WFile {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            self.abort_raw(&mut writer);
        }
    }
}
