//! # Serde support for CounterConfig
//!
//! `CounterConfig` is (de)serialized as a map of its options. Missing options take their
//! default value, unknown options are rejected, and the result goes through
//! [`CounterConfig::validate`] so an invalid configuration never deserializes
//! successfully:
//!
//! ```json
//! { "number_of_threads": 12, "lines_per_chunk": 10000, "bitmap_size": 1073741824,
//!   "queue_capacity": null, "strategy": "atomic" }
//! ```
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{BitmapStrategy, CounterConfig};

#[derive(Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    number_of_threads: usize,
    lines_per_chunk: usize,
    bitmap_size: usize,
    queue_capacity: Option<usize>,
    strategy: BitmapStrategy,
}

impl Default for RawConfig {
    fn default() -> Self {
        CounterConfig::default().into()
    }
}

impl From<CounterConfig> for RawConfig {
    fn from(config: CounterConfig) -> Self {
        Self {
            number_of_threads: config.number_of_threads,
            lines_per_chunk: config.lines_per_chunk,
            bitmap_size: config.bitmap_size,
            queue_capacity: config.queue_capacity,
            strategy: config.strategy,
        }
    }
}

impl Serialize for CounterConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        RawConfig::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CounterConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawConfig::deserialize(deserializer)?;
        let config = CounterConfig {
            number_of_threads: raw.number_of_threads,
            lines_per_chunk: raw.lines_per_chunk,
            bitmap_size: raw.bitmap_size,
            queue_capacity: raw.queue_capacity,
            strategy: raw.strategy,
        };
        config.validate().map_err(D::Error::custom)?;
        Ok(config)
    }
}
