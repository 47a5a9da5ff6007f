//! Hash bitmap shared by all workers of a counting run.
//!
//! The bitmap is a fixed array of 64-bit words. Workers mark hashed records with
//! [`set`](HashBitmapTrait::set); once every worker has finished, the estimator reads
//! [`population_count`](HashBitmapTrait::population_count) exactly once.
//!
//! Invariants:
//! - the size in bits is a power of two, so callers mask hashes with `size - 1`;
//! - bits only go from 0 to 1 during a run, which keeps the fill monotonic;
//! - `set` is idempotent (OR semantics) and commutative across workers, so the final
//!   state does not depend on how workers interleave.
//!
//! `population_count` is only meaningful once concurrent writers are done: it makes no
//! attempt to take a consistent snapshot while bits are still being set.

use enum_dispatch::enum_dispatch;

use crate::atomic::AtomicBitmap;
use crate::config::{validate_bitmap_size, BitmapStrategy};
use crate::error::Result;
use crate::locked::LockedBitmap;

/// Number of bits stored in one bitmap word.
pub(crate) const WORD_BITS: usize = 64;

/// Bitmap strategies supported by a counting run
#[derive(Debug)]
#[enum_dispatch]
pub enum HashBitmap {
    Locked(LockedBitmap),
    Atomic(AtomicBitmap),
}

/// Operations shared by every bitmap strategy.
#[enum_dispatch(HashBitmap)]
pub trait HashBitmapTrait {
    /// Mark bit `index`, which must be below `len()`.
    fn set(&self, index: usize);
    /// Number of bits set.
    fn population_count(&self) -> usize;
    /// Size of the bitmap in bits.
    fn len(&self) -> usize;
    /// Heap memory used by the bitmap words, in bytes.
    fn size_of(&self) -> usize;

    /// True when no bit is set. Unlike `len()`, this tracks contents, not size.
    fn is_empty(&self) -> bool {
        self.population_count() == 0
    }

    /// Number of bits still unset.
    fn zero_count(&self) -> usize {
        self.len() - self.population_count()
    }

    /// Fraction of bits set, in `[0, 1]`.
    fn fill_ratio(&self) -> f64 {
        self.population_count() as f64 / self.len() as f64
    }

    fn to_string(&self) -> String {
        format!(
            "bits: {}, set: {}, size: {}",
            self.len(),
            self.population_count(),
            self.size_of()
        )
    }
}

impl HashBitmap {
    /// Allocate a zeroed bitmap of `size` bits using `strategy`.
    pub fn new(strategy: BitmapStrategy, size: usize) -> Result<Self> {
        validate_bitmap_size(size)?;
        Ok(match strategy {
            BitmapStrategy::Locked => HashBitmap::Locked(LockedBitmap::new(size)),
            BitmapStrategy::Atomic => HashBitmap::Atomic(AtomicBitmap::new(size)),
        })
    }

    pub fn strategy(&self) -> BitmapStrategy {
        match self {
            HashBitmap::Locked(_) => BitmapStrategy::Locked,
            HashBitmap::Atomic(_) => BitmapStrategy::Atomic,
        }
    }
}

/// Number of words needed to hold `size` bits.
#[inline]
pub(crate) fn word_count(size: usize) -> usize {
    size.div_ceil(WORD_BITS)
}

/// Word index and in-word mask of bit `index`.
#[inline]
pub(crate) fn locate(index: usize) -> (usize, u64) {
    (index / WORD_BITS, 1u64 << (index % WORD_BITS))
}
