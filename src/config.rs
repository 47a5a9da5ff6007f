//! Configuration of a counting run.
//!
//! - `number_of_threads`: number of workers draining the chunk queue, at least 1.
//! - `lines_per_chunk`: number of records moved through the queue as one item, at least 1.
//!   Larger chunks reduce queue contention at the cost of coarser backpressure.
//! - `bitmap_size`: number of bits in the hash bitmap, a power of two in `[1, 2^32]`.
//!   Memory use is `bitmap_size / 8` bytes for the atomic strategy.
//! - `queue_capacity`: `None` for an unbounded queue, `Some(n)` to block the reader
//!   once `n` chunks are waiting.
//! - `strategy`: how the bitmap synchronizes concurrent writers.
//!
//! All checks happen in [`CounterConfig::validate`], before any thread is started.

use std::num::NonZeroUsize;
use std::thread;

use crate::error::{Error, Result};

/// Default number of records per chunk.
pub const DEFAULT_LINES_PER_CHUNK: usize = 10_000;
/// Default bitmap size: 2^30 bits (128 MiB).
pub const DEFAULT_BITMAP_SIZE: usize = 1 << 30;
/// Largest bitmap addressable by a 32-bit record hash.
pub const MAX_BITMAP_SIZE: usize = 1 << 32;
/// Smallest bitmap picked by [`CounterConfig::for_expected_cardinality`] (one word).
const MIN_SIZED_BITMAP: usize = 64;

/// Synchronization strategy of the hash bitmap.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with_serde", serde(rename_all = "lowercase"))]
pub enum BitmapStrategy {
    /// One mutex per 64-bit word.
    Locked,
    /// One atomic word per 64 bits, updated with `fetch_or`.
    #[default]
    Atomic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterConfig {
    pub number_of_threads: usize,
    pub lines_per_chunk: usize,
    pub bitmap_size: usize,
    pub queue_capacity: Option<usize>,
    pub strategy: BitmapStrategy,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            number_of_threads: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            lines_per_chunk: DEFAULT_LINES_PER_CHUNK,
            bitmap_size: DEFAULT_BITMAP_SIZE,
            queue_capacity: None,
            strategy: BitmapStrategy::default(),
        }
    }
}

impl CounterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with a bitmap sized for `expected` distinct records.
    ///
    /// The bitmap gets at least twice as many bits as expected records, which keeps the
    /// fill ratio under ~40% and the estimate in the accurate range of linear counting.
    pub fn for_expected_cardinality(expected: usize) -> Self {
        Self::default().with_bitmap_size(bitmap_size_for(expected))
    }

    pub fn with_threads(mut self, number_of_threads: usize) -> Self {
        self.number_of_threads = number_of_threads;
        self
    }

    pub fn with_lines_per_chunk(mut self, lines_per_chunk: usize) -> Self {
        self.lines_per_chunk = lines_per_chunk;
        self
    }

    pub fn with_bitmap_size(mut self, bitmap_size: usize) -> Self {
        self.bitmap_size = bitmap_size;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: Option<usize>) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_strategy(mut self, strategy: BitmapStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Check every option, returning the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.number_of_threads == 0 {
            return Err(Error::invalid_config(
                "number_of_threads",
                "at least one worker is required",
            ));
        }
        if self.lines_per_chunk == 0 {
            return Err(Error::invalid_config(
                "lines_per_chunk",
                "chunks must hold at least one line",
            ));
        }
        validate_bitmap_size(self.bitmap_size)?;
        if self.queue_capacity == Some(0) {
            return Err(Error::invalid_config(
                "queue_capacity",
                "a bounded queue must hold at least one chunk",
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_bitmap_size(bitmap_size: usize) -> Result<()> {
    if !bitmap_size.is_power_of_two() {
        return Err(Error::invalid_config(
            "bitmap_size",
            format!("{bitmap_size} is not a power of two"),
        ));
    }
    if bitmap_size > MAX_BITMAP_SIZE {
        return Err(Error::invalid_config(
            "bitmap_size",
            format!("{bitmap_size} exceeds the 32-bit hash space"),
        ));
    }
    Ok(())
}

/// Smallest power of two holding at least `2 * expected` bits, within `[64, 2^32]`.
pub fn bitmap_size_for(expected: usize) -> usize {
    expected
        .saturating_mul(2)
        .checked_next_power_of_two()
        .unwrap_or(MAX_BITMAP_SIZE)
        .clamp(MIN_SIZED_BITMAP, MAX_BITMAP_SIZE)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_default_is_valid() {
        let config = CounterConfig::default();
        assert!(config.number_of_threads >= 1);
        assert_eq!(config.bitmap_size, 1 << 30);
        assert_eq!(config.lines_per_chunk, 10_000);
        assert_eq!(config.queue_capacity, None);
        assert_eq!(config.strategy, BitmapStrategy::Atomic);
        config.validate().expect("default config must be valid");
    }

    #[test_case(CounterConfig::new().with_threads(0) => "number_of_threads"; "zero threads")]
    #[test_case(CounterConfig::new().with_lines_per_chunk(0) => "lines_per_chunk"; "zero chunk size")]
    #[test_case(CounterConfig::new().with_bitmap_size(0) => "bitmap_size"; "zero bitmap")]
    #[test_case(CounterConfig::new().with_bitmap_size(1000) => "bitmap_size"; "non power of two bitmap")]
    #[test_case(CounterConfig::new().with_bitmap_size(1 << 33) => "bitmap_size"; "bitmap beyond hash space")]
    #[test_case(CounterConfig::new().with_queue_capacity(Some(0)) => "queue_capacity"; "empty bounded queue")]
    fn test_validate_rejects(config: CounterConfig) -> &'static str {
        match config.validate() {
            Err(Error::InvalidConfig { name, .. }) => name,
            other => panic!("unexpected validation result: {other:?}"),
        }
    }

    #[test_case(1)]
    #[test_case(64)]
    #[test_case(1 << 20)]
    #[test_case(1 << 32)]
    fn test_validate_accepts_bitmap_size(bitmap_size: usize) {
        let config = CounterConfig::new()
            .with_threads(2)
            .with_bitmap_size(bitmap_size)
            .with_queue_capacity(Some(1));
        assert!(config.validate().is_ok());
    }

    #[test_case(0 => 64)]
    #[test_case(1 => 64)]
    #[test_case(100 => 256)]
    #[test_case(1_000_000 => 1 << 21)]
    #[test_case(1 << 31 => 1 << 32)]
    #[test_case(usize::MAX => 1 << 32)]
    fn test_bitmap_size_for(expected: usize) -> usize {
        bitmap_size_for(expected)
    }

    #[test]
    fn test_for_expected_cardinality() {
        let config = CounterConfig::for_expected_cardinality(5_000);
        assert_eq!(config.bitmap_size, 16_384);
        assert!(config.validate().is_ok());
    }
}
