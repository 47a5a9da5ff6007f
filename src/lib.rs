//! `distinct-counter` estimates the number of distinct lines (IP addresses, user ids, ...)
//! in very large text sources without storing the lines themselves.
//!
//! Every line is hashed into a fixed-size bitmap shared by a pool of worker threads, and
//! linear counting turns the fraction of bits left unset into a cardinality estimate.
//! Memory use is fixed by the bitmap size (`bitmap_size / 8` bytes); accuracy is good
//! while fewer than ~50% of the bits end up set.
//!
//! ```no_run
//! use distinct_counter::{CounterConfig, DistinctCounter};
//!
//! let counter: DistinctCounter = DistinctCounter::new(CounterConfig::default())?;
//! let report = counter.count_file("ip_addresses.txt")?;
//! println!("unique addresses: {}", report.estimate);
//! # Ok::<(), distinct_counter::Error>(())
//! ```
#[cfg(not(target_pointer_width = "64"))]
compile_error!("distinct-counter requires a 64-bit target");

mod atomic;
pub mod bitmap;
mod cancel;
pub mod config;
pub mod counter;
mod error;
pub mod estimate;
pub mod hash;
mod locked;
mod queue;
pub mod reader;
#[cfg(feature = "with_serde")]
mod serde;
mod worker;

pub use atomic::AtomicBitmap;
pub use bitmap::{HashBitmap, HashBitmapTrait};
pub use cancel::CancellationToken;
pub use config::{BitmapStrategy, CounterConfig};
pub use counter::{count_distinct, CountReport, DistinctCounter, Ingestion};
pub use error::{Error, Result};
pub use estimate::{linear_counting, Estimate};
pub use locked::LockedBitmap;
