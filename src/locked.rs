//! ## Locked bitmap
//! Baseline bitmap strategy: every 64-bit word is guarded by its own mutex.
//!
//! Contention is bounded to two workers hitting the same word at the same time,
//! and there is no global lock. Each word costs 16 bytes (`parking_lot` lock byte,
//! padding and the `u64` itself).

use std::fmt::{Debug, Formatter};
use std::mem::size_of_val;

use parking_lot::Mutex;

use crate::bitmap::{locate, word_count, HashBitmapTrait};

pub struct LockedBitmap {
    /// Number of bits
    len: usize,
    words: Box<[Mutex<u64>]>,
}

impl LockedBitmap {
    pub(crate) fn new(len: usize) -> Self {
        let words = (0..word_count(len)).map(|_| Mutex::new(0)).collect();
        Self { len, words }
    }
}

impl HashBitmapTrait for LockedBitmap {
    #[inline]
    fn set(&self, index: usize) {
        debug_assert!(index < self.len, "bit {index} out of range {}", self.len);
        let (word, mask) = locate(index);
        *self.words[word].lock() |= mask;
    }

    fn population_count(&self) -> usize {
        self.words
            .iter()
            .map(|word| word.lock().count_ones() as usize)
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

impl Debug for LockedBitmap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string())
    }
}
