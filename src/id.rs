//! Blob id generation
//!
//! Ids are opaque strings, but the default generator keeps two promises the
//! filesystem driver's sharding relies on: the leading characters increase
//! monotonically with time, and the trailing characters are random. Sharding
//! on the last two characters therefore spreads blobs written in the same
//! period across buckets instead of piling them into one directory.

use uuid::Uuid;

/// Strategy for producing new blob ids.
///
/// Implementations must return globally unique ids; the store never checks
/// for collisions beyond the driver's exclusive-create semantics.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Default generator: UUIDv7 rendered as 32 lowercase hex characters.
///
/// UUIDv7 is a millisecond timestamp followed by random bits, which gives
/// exactly the time-ordered-prefix/random-suffix shape described above.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeOrderedIds;

impl IdGenerator for TimeOrderedIds {
    fn generate(&self) -> String {
        Uuid::now_v7().simple().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let gen = TimeOrderedIds;
        let a = gen.generate();
        let b = gen.generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_ids_are_hex_and_fixed_width() {
        let id = TimeOrderedIds.generate();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ids_sort_by_time() {
        let gen = TimeOrderedIds;
        let earlier = gen.generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let later = gen.generate();
        assert!(earlier < later);
    }
}
