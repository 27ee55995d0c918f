use num_traits::{PrimInt, Unsigned};

// Pre-generated sketch parameters.
mod generated {
    include!(concat!(env!("OUT_DIR"), "/params.rs"));
}

pub use self::generated::*;

/// A value that can be used as the key in a sketch bin.
pub trait AsBinKey: PrimInt + Unsigned + std::fmt::Debug {
    /// The additive identity of the key type.
    const ZERO: Self;

    /// The maximum value of the key type.
    const MAX: Self;

    /// Returns `true` if the key is zero.
    fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    /// Converts `i64` into `Self`.
    ///
    /// Callers must have already clamped `value` into the key's range.
    fn from_i64(value: i64) -> Self;

    /// Converts `Self` into `i64`, losslessly.
    fn into_i64(self) -> i64;
}

impl AsBinKey for u16 {
    const ZERO: Self = 0;
    const MAX: Self = Self::MAX;

    fn from_i64(value: i64) -> Self {
        value as Self
    }

    fn into_i64(self) -> i64 {
        i64::from(self)
    }
}

impl AsBinKey for u32 {
    const ZERO: Self = 0;
    const MAX: Self = Self::MAX;

    fn from_i64(value: i64) -> Self {
        value as Self
    }

    fn into_i64(self) -> i64 {
        i64::from(self)
    }
}

/// Configuration parameters for a [`Sketch`][crate::Sketch].
///
/// Implementations of this trait are generated at build time from a chosen relative accuracy and
/// minimum resolvable value, and select the bin-key width the sketch is monomorphized over.
pub trait SketchParameters: Copy {
    /// The type of the key used to index bins.
    type BinKey: AsBinKey;

    // User-provided parameters.
    //
    // These form the basis of the desired behavior of the sketch: the smallest value that can be
    // resolved and the relative accuracy of reported quantiles.

    /// The minimum resolvable value that can be resolved by this sketch.
    const MINIMUM_VALUE: f64;

    /// The relative accuracy of the quantiles reported by this sketch.
    const RELATIVE_ACCURACY: f64;

    // Generated parameters.
    //
    // These are pre-generated values used by the actual sketch logic when interpolating keys/values.

    /// The gamma parameter of the index mapping.
    ///
    /// For a given value `v`, the bin index it belongs to is roughly equal to `log(v) / log(gamma)`.
    const GAMMA_V: f64;

    /// The natural logarithm of the gamma parameter.
    ///
    /// Used purely for avoiding calculating `log(gamma)` repeatedly.
    const GAMMA_LN: f64;

    /// Minimum value representable by a sketch with these params.
    ///
    /// Values below `NORM_MIN` cannot be told apart from zero and are assigned the zero key.
    const NORM_MIN: f64;

    /// Bias of the exponent, used to ensure key(v) >= 1 for any resolvable value.
    const NORM_BIAS: i32;

    /// Gets the value lower bound of the bin at the given key.
    #[inline]
    fn bin_lower_bound(k: Self::BinKey) -> f64 {
        if k == Self::BinKey::MAX {
            return f64::INFINITY;
        }

        if k.is_zero() {
            return 0.0;
        }

        Self::GAMMA_V.powf((k.into_i64() - i64::from(Self::NORM_BIAS)) as f64)
    }

    /// Gets the key for the given value.
    ///
    /// The key corresponds to the bin where this value would be represented. The value returned
    /// here is such that:
    ///
    /// > γ^k <= v < γ^(k+1)
    ///
    /// Keys are unsigned: this mapping is defined over non-negative observations, and any value
    /// that cannot be resolved -- non-positive, below `NORM_MIN`, or NaN -- lands in the zero bin.
    #[allow(clippy::cast_possible_truncation)]
    #[inline]
    fn key(v: f64) -> Self::BinKey {
        if v.is_nan() || v < Self::NORM_MIN {
            return Self::BinKey::ZERO;
        }

        // Calculate our key based on the interpolated value. An `f64` to `i64` cast saturates,
        // so even an infinite input cannot produce a key outside the clamped range.
        let unbiased_key = (v.ln() / Self::GAMMA_LN).round_ties_even() as i64;
        let biased_key = unbiased_key.saturating_add(i64::from(Self::NORM_BIAS));

        let clamped_key = biased_key.clamp(1, Self::BinKey::MAX.into_i64());
        Self::BinKey::from_i64(clamped_key)
    }
}
