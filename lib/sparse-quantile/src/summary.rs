//! Running statistics for a sketch.

use crate::common::float_eq;

/// Basic running statistics over a stream of observations.
///
/// Tracks the minimum, maximum, sum, average, and count of every raw value fed to the owning
/// sketch. Two summaries accumulated independently can be merged without access to the raw data,
/// with the same distributive semantics as the sketch's bin store.
///
/// This is the only part of a sketch included in its externally serialized form: bins are
/// derivable, ephemeral state.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Summary {
    min: f64,
    max: f64,
    sum: f64,
    avg: f64,
    cnt: u64,
}

impl Summary {
    /// Minimum value seen by this summary.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Maximum value seen by this summary.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Sum of all values seen by this summary.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Average of all values seen by this summary.
    pub fn avg(&self) -> f64 {
        self.avg
    }

    /// Number of values seen by this summary.
    pub fn count(&self) -> u64 {
        self.cnt
    }

    /// Inserts a single raw value.
    pub fn insert(&mut self, v: f64) {
        if v < self.min {
            self.min = v;
        }

        if v > self.max {
            self.max = v;
        }

        self.cnt += 1;
        self.sum += v;
        self.avg += (v - self.avg) / self.cnt as f64;
    }

    /// Merges another summary into this one, without mutating `other`.
    pub fn merge(&mut self, other: &Summary) {
        if other.cnt == 0 {
            return;
        }

        if self.cnt == 0 {
            *self = *other;
            return;
        }

        self.cnt += other.cnt;
        if other.max > self.max {
            self.max = other.max;
        }
        if other.min < self.min {
            self.min = other.min;
        }
        self.sum += other.sum;
        self.avg = self.avg + (other.avg - self.avg) * other.cnt as f64 / self.cnt as f64;
    }

    /// Resets the summary to its empty state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            min: f64::MAX,
            max: f64::MIN,
            sum: 0.0,
            avg: 0.0,
            cnt: 0,
        }
    }
}

impl PartialEq for Summary {
    fn eq(&self, other: &Self) -> bool {
        // We use floating-point-specific relative comparisons for sum/avg because they can be
        // minimally different between summaries purely due to floating-point behavior, despite
        // being fed the same exact data in terms of recorded samples.
        self.cnt == other.cnt
            && float_eq(self.min, other.min)
            && float_eq(self.max, other.max)
            && float_eq(self.sum, other.sum)
            && float_eq(self.avg, other.avg)
    }
}
