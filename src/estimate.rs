//! Linear counting estimator.
//!
//! For a bitmap of `m` bits with `z` bits left unset after hashing every record, the
//! expected number of distinct records is `m * ln(m / z)`.
//!
//! Paper: Whang, Vander-Zanden, Taylor, "A Linear-Time Probabilistic Counting
//! Algorithm for Database Applications" (1990).
//!
//! The estimate is accurate while the fill ratio `1 - z / m` stays below ~50%. Past that
//! the error grows quickly, and a fully set bitmap (`z == 0`) carries no information
//! beyond "at least `m * ln(m)` records": that case is reported as
//! [`Estimate::Saturated`] instead of an infinite or NaN value.

use std::fmt::{Display, Formatter};

/// Result of the linear counting estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Estimate {
    /// Estimated number of distinct records.
    Count(u64),
    /// Every bit was set; the bitmap is too small for the input.
    Saturated { bitmap_size: usize },
}

impl Estimate {
    /// Estimated cardinality, `None` when the bitmap saturated.
    pub fn value(&self) -> Option<u64> {
        match *self {
            Estimate::Count(count) => Some(count),
            Estimate::Saturated { .. } => None,
        }
    }

    /// Estimated cardinality, or the largest estimate the bitmap can express
    /// (`floor(m * ln m)`, one bit left unset) when it saturated.
    pub fn value_or_bound(&self) -> u64 {
        match *self {
            Estimate::Count(count) => count,
            Estimate::Saturated { bitmap_size } => truncate(bitmap_size, 1),
        }
    }

    pub fn is_saturated(&self) -> bool {
        matches!(self, Estimate::Saturated { .. })
    }
}

impl Display for Estimate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Estimate::Count(count) => write!(f, "{count}"),
            Estimate::Saturated { bitmap_size } => write!(
                f,
                "estimate unavailable: bitmap of {bitmap_size} bits saturated, increase bitmap size"
            ),
        }
    }
}

/// Linear counting estimate for a bitmap of `bitmap_size` bits with `zero_count` unset bits.
///
/// The result is rounded toward zero. No unset bits yields [`Estimate::Saturated`];
/// a bitmap with every bit unset yields `Count(0)`.
pub fn linear_counting(bitmap_size: usize, zero_count: usize) -> Estimate {
    debug_assert!(zero_count <= bitmap_size);
    if zero_count >= bitmap_size {
        return Estimate::Count(0);
    }
    if zero_count == 0 {
        return Estimate::Saturated { bitmap_size };
    }
    Estimate::Count(truncate(bitmap_size, zero_count))
}

#[inline]
fn truncate(bitmap_size: usize, zero_count: usize) -> u64 {
    let m = bitmap_size as f64;
    (m * (m / zero_count as f64).ln()) as u64
}

/// Standard error of linear counting relative to the true cardinality `n`:
/// `sqrt(m * (e^t - t - 1)) / n` with load factor `t = n / m`.
pub fn standard_error(bitmap_size: usize, cardinality: u64) -> f64 {
    if cardinality == 0 || bitmap_size == 0 {
        return 0.0;
    }
    let m = bitmap_size as f64;
    let n = cardinality as f64;
    let t = n / m;
    (m * (t.exp() - t - 1.0)).sqrt() / n
}
