//! Binary envelope codec
//!
//! Every stored blob is wrapped in a fixed-layout envelope. The layout is a
//! wire-format contract: other implementations must reproduce it byte for
//! byte to read blobs written here.
//!
//! ```text
//! [PRELUDE: 25 + L bytes]
//!   - version: 1 byte (currently 1)
//!   - flags: 8 bytes (reserved, 0)
//!   - metadata length L: 8 bytes BE
//!   - metadata hash: 8 bytes BE (FNV-1a 64 of the metadata, 0 if L == 0)
//!   - metadata: L bytes
//!
//! [DATA HEADER: 16 bytes, at offset 25 + L]
//!   - data length: 8 bytes BE
//!   - data hash: 8 bytes BE (FNV-1a 64 of the payload)
//!
//! [PAYLOAD: data length bytes]
//! ```
//!
//! On a seekable backend the data header is written as 16 zero bytes at
//! create time and patched with the real length and hash at finalize time.
//! All integers are big-endian. The hash algorithm is FNV-1a 64-bit; it is
//! a format constant, not an implementation detail.

use std::hash::Hasher;
use std::io::{Read, Write};

use thiserror::Error;

/// Envelope format version written by this implementation.
pub const VERSION: u8 = 1;

/// Reserved flags field, always zero.
pub const FLAGS: u64 = 0;

/// Size of the prelude before the metadata bytes.
pub const PRELUDE_LEN: u64 = 1 + 8 + 8 + 8;

/// Size of the reserved data length + data hash fields.
pub const DATA_HEADER_LEN: u64 = 8 + 8;

/// Offset of the data header for a given metadata length.
pub fn data_header_offset(metadata_len: u64) -> u64 {
    PRELUDE_LEN + metadata_len
}

/// Upper bound on the serialized metadata size. Anything larger in a
/// header is treated as corruption rather than an allocation request.
pub const MAX_METADATA_LEN: u64 = 64 * 1024 * 1024;

/// Errors produced while decoding an envelope header.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    #[error("metadata length {0} exceeds the {MAX_METADATA_LEN} byte limit")]
    MetadataTooLarge(u64),

    #[error("metadata hash mismatch: header says {expected:#018x}, computed {actual:#018x}")]
    MetadataHashMismatch { expected: u64, actual: u64 },

    #[error("truncated or unreadable header: {0}")]
    Io(#[from] std::io::Error),
}

/// Streaming FNV-1a 64 accumulator for payload and metadata integrity.
///
/// Thin wrapper over [`fnv::FnvHasher`] so the format hash has one named
/// home and call sites do not depend on `std::hash::Hasher` directly.
#[derive(Default)]
pub struct ContentHasher(fnv::FnvHasher);

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.0.write(bytes);
    }

    pub fn finish(&self) -> u64 {
        self.0.finish()
    }
}

/// One-shot hash of a byte slice.
pub fn content_hash(bytes: &[u8]) -> u64 {
    let mut h = ContentHasher::new();
    h.update(bytes);
    h.finish()
}

/// Decoded envelope header fields.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub metadata: Vec<u8>,
    pub metadata_hash: u64,
    pub data_length: u64,
    pub data_hash: u64,
}

/// Write the envelope prelude: version, flags, metadata length, metadata
/// hash and the metadata bytes themselves. An absent metadata value is
/// encoded as length 0, hash 0.
pub fn write_prelude<W: Write>(w: &mut W, metadata: Option<&[u8]>) -> std::io::Result<()> {
    if let Some(meta) = metadata {
        if meta.len() as u64 > MAX_METADATA_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("metadata is {} bytes, limit is {MAX_METADATA_LEN}", meta.len()),
            ));
        }
    }
    w.write_all(&[VERSION])?;
    w.write_all(&FLAGS.to_be_bytes())?;
    match metadata {
        Some(meta) if !meta.is_empty() => {
            w.write_all(&(meta.len() as u64).to_be_bytes())?;
            w.write_all(&content_hash(meta).to_be_bytes())?;
            w.write_all(meta)?;
        }
        _ => {
            w.write_all(&0u64.to_be_bytes())?;
            w.write_all(&0u64.to_be_bytes())?;
        }
    }
    Ok(())
}

/// Write the data header (length + hash). Used both for the zeroed
/// placeholder at create time and for the patched values at finalize time.
pub fn write_data_header<W: Write>(w: &mut W, length: u64, hash: u64) -> std::io::Result<()> {
    w.write_all(&length.to_be_bytes())?;
    w.write_all(&hash.to_be_bytes())?;
    Ok(())
}

/// Read and validate the envelope header, leaving the reader positioned at
/// the first payload byte.
///
/// The metadata hash is verified here; the data hash is not, since the
/// payload has not been read yet. Verifying the payload as it streams out
/// is the read handle's job.
pub fn read_envelope<R: Read>(r: &mut R) -> Result<Envelope, DecodeError> {
    let version = read_u8(r)?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    // Flags are reserved; read and ignore.
    let _flags = read_u64(r)?;
    let metadata_len = read_u64(r)?;
    if metadata_len > MAX_METADATA_LEN {
        return Err(DecodeError::MetadataTooLarge(metadata_len));
    }
    let metadata_hash = read_u64(r)?;
    let mut metadata = vec![0u8; metadata_len as usize];
    r.read_exact(&mut metadata)?;
    if metadata_len > 0 {
        let actual = content_hash(&metadata);
        if actual != metadata_hash {
            return Err(DecodeError::MetadataHashMismatch {
                expected: metadata_hash,
                actual,
            });
        }
    }
    let data_length = read_u64(r)?;
    let data_hash = read_u64(r)?;
    Ok(Envelope {
        metadata,
        metadata_hash,
        data_length,
        data_hash,
    })
}

fn read_u8<R: Read>(r: &mut R) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u64<R: Read>(r: &mut R) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}
