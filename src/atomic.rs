//! ## Atomic bitmap
//! Lock-free bitmap strategy: every 64-bit word is an `AtomicU64` and bits are set
//! with a single `fetch_or`, which is idempotent and commutative across threads.
//!
//! Memory use is exactly `ceil(len / 64) * 8` bytes.
//!
//! `set` uses `Release` and `population_count` uses `Acquire`, so a reader that has
//! synchronized with the writers (join, channel receive) observes every bit they set.

use std::fmt::{Debug, Formatter};
use std::mem::size_of_val;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bitmap::{locate, word_count, HashBitmapTrait};

pub struct AtomicBitmap {
    /// Number of bits
    len: usize,
    words: Box<[AtomicU64]>,
}

impl AtomicBitmap {
    pub(crate) fn new(len: usize) -> Self {
        let words = (0..word_count(len)).map(|_| AtomicU64::new(0)).collect();
        Self { len, words }
    }
}

impl HashBitmapTrait for AtomicBitmap {
    #[inline]
    fn set(&self, index: usize) {
        debug_assert!(index < self.len, "bit {index} out of range {}", self.len);
        let (word, mask) = locate(index);
        // Bits already set are only read, never written again.
        if self.words[word].load(Ordering::Relaxed) & mask == 0 {
            self.words[word].fetch_or(mask, Ordering::Release);
        }
    }

    fn population_count(&self) -> usize {
        self.words
            .iter()
            .map(|word| word.load(Ordering::Acquire).count_ones() as usize)
            .sum()
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    fn size_of(&self) -> usize {
        size_of_val(&*self.words)
    }
}

impl Debug for AtomicBitmap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string())
    }
}
