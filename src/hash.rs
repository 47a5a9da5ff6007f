//! Record hashing.
//!
//! Every record is hashed from its raw bytes with a fresh `H::default()` hasher and
//! truncated to 32 bits. With the default `WyHash` (seed 0) the result is identical
//! across workers, runs and processes.

use std::hash::Hasher;

/// 32-bit hash of `record` computed with hasher `H`.
#[inline]
pub fn hash_record<H: Hasher + Default>(record: &[u8]) -> u32 {
    let mut hasher = H::default();
    hasher.write(record);
    hasher.finish() as u32
}

/// Bitmap index of `hash` for a bitmap of `bitmap_size` bits (a power of two).
#[inline]
pub fn bitmap_index(hash: u32, bitmap_size: usize) -> usize {
    hash as usize & (bitmap_size - 1)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashSet;
    use test_case::test_case;
    use wyhash::WyHash;

    #[test]
    fn test_hash_is_deterministic() {
        let first = hash_record::<WyHash>(b"192.168.0.1");
        let second = hash_record::<WyHash>(b"192.168.0.1");
        assert_eq!(first, second);
        assert_ne!(first, hash_record::<WyHash>(b"192.168.0.2"));
    }

    #[test]
    fn test_hash_is_thread_independent() {
        let local = hash_record::<WyHash>(b"10.0.0.1");
        let remote = std::thread::spawn(|| hash_record::<WyHash>(b"10.0.0.1"))
            .join()
            .unwrap();
        assert_eq!(local, remote);
    }

    #[test]
    fn test_hash_spreads_over_index_space() {
        // 4096 distinct addresses into 2^16 buckets: a uniform hash leaves
        // about 4096 * (1 - 4096 / 2^17) ~ 3968 distinct indices.
        let indices: HashSet<usize> = (0..4096u32)
            .map(|i| format!("10.{}.{}.{}", i >> 16, (i >> 8) & 0xff, i & 0xff))
            .map(|ip| bitmap_index(hash_record::<WyHash>(ip.as_bytes()), 1 << 16))
            .collect();
        assert!(indices.len() > 3800, "too many collisions: {}", indices.len());
    }

    #[test_case(0xffff_ffff, 1 => 0)]
    #[test_case(0xffff_ffff, 1 << 10 => 1023)]
    #[test_case(0x1234_5678, 1 << 16 => 0x5678)]
    #[test_case(0x1234_5678, 1 << 32 => 0x1234_5678)]
    fn test_bitmap_index(hash: u32, bitmap_size: usize) -> usize {
        bitmap_index(hash, bitmap_size)
    }
}
