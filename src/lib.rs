//! # blobcask
//!
//! A blob store that persists opaque byte payloads plus optional structured
//! metadata behind a stable binary envelope, delegating physical placement
//! to a pluggable storage driver.
//!
//! ## Core Concepts
//!
//! - **Blobs**: opaque payloads plus optional metadata, addressed by an
//!   opaque id
//! - **Envelope**: the versioned binary header wrapping every payload, with
//!   64-bit integrity hashes for metadata and data
//! - **Drivers**: storage backends (local filesystem, in-memory) selected
//!   by a scheme-qualified location and resolved through an explicit
//!   registry
//! - **Handles**: streaming write/read handles that hash payload bytes as
//!   they move and verify them at finalize/close time
//!
//! ## Example
//!
//! ```ignore
//! use blobcask::Store;
//!
//! let store = Store::open_default("file:///var/data/blobs")?;
//! let id = store.put(b"payload", Some(&meta))?;
//! let data = store.read_all(&id)?;
//! ```

pub mod config;
pub mod driver;
pub mod envelope;
pub mod id;
pub mod store;

mod error;

pub use config::Location;
pub use driver::{BlobReader, BlobWriter, Driver, FileDriver, MemoryDriver, Registry};
pub use error::{Error, Result};
pub use id::{IdGenerator, TimeOrderedIds};
pub use store::{RFile, Store, WFile};

/// Envelope format version written by this crate.
pub const VERSION: u8 = envelope::VERSION;
