//! The quantile sketch facade.

use std::mem;

use tracing::warn;

use crate::params::{DefaultSketchParameters, SketchParameters};
use crate::store::{Bin, SparseStore};
use crate::summary::Summary;

/// A sparse, mergeable quantile sketch with a relative error bound.
///
/// The sketch maps every observation to a logarithmic bucket key and tracks one bin per occupied
/// bucket, alongside running statistics over the raw values. Sketches accumulated independently
/// (per shard, per time window) can be merged without re-scanning raw data, and quantile queries
/// interpolate within bucket boundaries, corrected at the extremes with the exact observed
/// minimum and maximum.
///
/// A sketch is a single-writer data structure: concurrent mutation requires external
/// synchronization, or sharding across sketches followed by a merge.
///
/// # Features
///
/// This crate exposes a single feature, `serde`, which enables serialization and deserialization
/// of `Sketch` with `serde`. Only the summary statistics are part of the serialized form: bins
/// are derivable, ephemeral state and are rebuilt empty on deserialization.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(bound(serialize = "", deserialize = "")))]
pub struct Sketch<P = DefaultSketchParameters>
where
    P: SketchParameters,
{
    /// The bins within the sketch.
    #[cfg_attr(feature = "serde", serde(skip))]
    store: SparseStore<P>,

    /// Running statistics over all raw observations.
    summary: Summary,
}

impl<P: SketchParameters> Sketch<P> {
    /// Returns the number of bins in the sketch.
    pub fn bin_count(&self) -> usize {
        self.store.bins().len()
    }

    /// Whether or not this sketch is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Number of samples currently represented by this sketch.
    pub fn count(&self) -> u64 {
        self.store.total_count()
    }

    /// Minimum value seen by this sketch.
    ///
    /// Returns `None` if the sketch is empty.
    pub fn min(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.summary.min())
        }
    }

    /// Maximum value seen by this sketch.
    ///
    /// Returns `None` if the sketch is empty.
    pub fn max(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.summary.max())
        }
    }

    /// Sum of all values seen by this sketch.
    ///
    /// Returns `None` if the sketch is empty.
    pub fn sum(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.summary.sum())
        }
    }

    /// Average value seen by this sketch.
    ///
    /// Returns `None` if the sketch is empty.
    pub fn avg(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.summary.avg())
        }
    }

    /// Returns the current bins of this sketch, ascending by key.
    pub fn bins(&self) -> &[Bin<P>] {
        self.store.bins()
    }

    /// Returns the running statistics of this sketch.
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Inserts many values into the sketch.
    ///
    /// Each value updates the running statistics and is mapped to its bucket key; the whole key
    /// batch is then folded into the bin store in a single pass. The key buffer comes from a
    /// per-sketch pool and is returned once the batch lands, so steady-state batch insertion does
    /// not allocate for the keys themselves.
    pub fn insert_many(&mut self, vs: &[f64]) {
        let mut keys = self.store.acquire_key_list();

        for v in vs {
            self.summary.insert(*v);
            keys.push(P::key(*v));
        }

        self.store.insert_keys(&mut keys);
        self.store.release_key_list(keys);
    }

    /// Inserts a single value into the sketch.
    ///
    /// NOTE: this is a batch of one, paying the full pool round-trip and merge per value;
    /// `insert_many` is much more efficient.
    pub fn insert(&mut self, v: f64) {
        self.insert_many(&[v]);
    }

    /// Gets the value at a given quantile.
    ///
    /// Special cases, in order of precedence:
    ///
    /// - an empty sketch returns `0.0` for any `q`
    /// - `q <= 0` returns the observed minimum
    /// - `q >= 1` returns the observed maximum
    pub fn quantile(&self, q: f64) -> f64 {
        if self.store.is_empty() {
            return 0.0;
        }

        if q <= 0.0 {
            return self.summary.min();
        }

        if q >= 1.0 {
            return self.summary.max();
        }

        let wanted_rank = rank(self.store.total_count(), q);
        let bins = self.store.bins();
        let mut n = 0.0;

        for (i, bin) in bins.iter().enumerate() {
            let nf = bin.count() as f64;
            n += nf;
            if n <= wanted_rank {
                continue;
            }

            let weight = (n - wanted_rank) / nf;
            let mut v_low = P::bin_lower_bound(bin.key());
            let mut v_high = v_low * P::GAMMA_V;

            // Interpolating between bucket boundaries bounds the error by the mapping's relative
            // accuracy; the outermost buckets use the exact observed extremes instead of their
            // mapped boundary.
            if i == bins.len() - 1 {
                v_high = self.summary.max();
            }
            if i == 0 {
                v_low = self.summary.min();
            }

            // A bucket's mapped lower bound is the middle of the value range that rounds into it,
            // so the raw interpolation can poke past the observed extremes; clamping keeps the
            // estimate inside them (and keeps quantile monotone in q).
            let estimated = v_low * weight + v_high * (1.0 - weight);
            return estimated.clamp(self.summary.min(), self.summary.max());
        }

        // Only reachable if the total count has drifted from the sum of the bin counts, which
        // the insert and merge paths maintain as impossible.
        debug_assert!(false, "quantile scan exhausted bins before reaching rank {wanted_rank}");
        warn!(q, wanted_rank, "quantile scan exhausted bins; total count exceeds sum of bin counts");
        self.summary.max()
    }

    /// Merges another sketch into this sketch, without mutating `other`.
    ///
    /// All samples present in the other sketch will be correctly represented in this sketch, and
    /// the summary statistics will represent the union of samples from both sketches.
    pub fn merge(&mut self, other: &Sketch<P>) {
        self.summary.merge(&other.summary);
        self.store.merge(&other.store);
    }

    /// Deep-copies this sketch into `dst`.
    ///
    /// `dst`'s existing bin capacity is reused where possible; afterwards the two sketches share
    /// no state, and mutating one never affects the other.
    pub fn copy_to(&self, dst: &mut Sketch<P>) {
        self.store.copy_to(&mut dst.store);
        dst.summary = self.summary;
    }

    /// Returns a deep copy of this sketch.
    pub fn copy(&self) -> Sketch<P> {
        let mut dst = Sketch::default();
        self.copy_to(&mut dst);
        dst
    }

    /// Resets the sketch to its empty state.
    ///
    /// Bin storage capacity (and the key-buffer pool) is retained for reuse.
    pub fn reset(&mut self) {
        self.summary.reset();
        self.store.clear();
    }

    /// Memory use of the sketch in bytes, as `(used, allocated)`.
    ///
    /// Delegates to the bin store's accounting and adds the fixed size of the summary to both
    /// components. Read-only, intended for capacity-planning telemetry.
    pub fn mem_size(&self) -> (usize, usize) {
        let summary_size = mem::size_of::<Summary>();

        let (used, allocated) = self.store.mem_size();
        (used + summary_size, allocated + summary_size)
    }

    /// Rebuilds a sketch from a summary and raw `(key, count)` bin content.
    ///
    /// The bin content must be strictly ascending by key with positive counts, and the counts
    /// must sum to the summary's count; anything else is rejected, since it would create a sketch
    /// whose internal invariants do not hold.
    ///
    /// ## Errors
    ///
    /// Returns an error if a bin count is zero, if keys are not strictly ascending, or if the
    /// summary count disagrees with the sum of the bin counts.
    pub fn from_raw_parts(summary: Summary, raw_bins: &[(P::BinKey, u64)]) -> Result<Sketch<P>, &'static str> {
        let mut store = SparseStore::default();

        let mut last_key = None;
        for (k, n) in raw_bins {
            if *n == 0 {
                return Err("bin count must be positive");
            }

            if let Some(last) = last_key {
                if *k <= last {
                    return Err("bin keys must be strictly ascending");
                }
            }
            last_key = Some(*k);

            store.push_bin(*k, *n);
        }

        if store.total_count() != summary.count() {
            return Err("summary count disagrees with sum of bin counts");
        }

        Ok(Sketch { store, summary })
    }
}

impl<P: SketchParameters> Default for Sketch<P> {
    fn default() -> Self {
        Self {
            store: SparseStore::default(),
            summary: Summary::default(),
        }
    }
}

impl<P: SketchParameters> PartialEq for Sketch<P> {
    fn eq(&self, other: &Self) -> bool {
        self.summary == other.summary && self.store == other.store
    }
}

fn rank(count: u64, q: f64) -> f64 {
    let rank = q * (count - 1) as f64;
    rank.round_ties_even()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::DefaultSketchParameters;

    fn assert_consistent(sketch: &Sketch) {
        let bin_total: u64 = sketch.bins().iter().map(|b| b.count()).sum();
        assert_eq!(bin_total, sketch.count());
        assert_eq!(sketch.summary().count(), sketch.count());

        for window in sketch.bins().windows(2) {
            assert!(window[0].key() < window[1].key(), "bins must be strictly ascending");
        }
    }

    #[test]
    fn test_sketch_basic() {
        let mut sketch: Sketch = Sketch::default();
        assert!(sketch.is_empty());
        assert_eq!(sketch.count(), 0);
        assert_eq!(sketch.min(), None);
        assert_eq!(sketch.max(), None);
        assert_eq!(sketch.sum(), None);
        assert_eq!(sketch.avg(), None);

        sketch.insert(3.15);
        assert!(!sketch.is_empty());
        assert_eq!(sketch.count(), 1);
        assert_eq!(sketch.min(), Some(3.15));
        assert_eq!(sketch.max(), Some(3.15));
        assert_eq!(sketch.sum(), Some(3.15));
        assert_eq!(sketch.avg(), Some(3.15));

        sketch.insert(2.28);
        assert_eq!(sketch.count(), 2);
        assert_eq!(sketch.min(), Some(2.28));
        assert_eq!(sketch.max(), Some(3.15));
        assert_consistent(&sketch);
    }

    #[test]
    fn test_insert_many_matches_single_inserts() {
        let values = [4.0, 1.5, 1.5, 900.0, 0.25, 37.5];

        let mut batched: Sketch = Sketch::default();
        batched.insert_many(&values);

        let mut single: Sketch = Sketch::default();
        for v in values {
            single.insert(v);
        }

        assert_eq!(single, batched);
        assert_consistent(&batched);
    }

    #[test]
    fn test_batch_scenario() {
        let mut sketch: Sketch = Sketch::default();
        sketch.insert_many(&[1.0, 2.0, 2.0, 3.0]);

        assert_eq!(sketch.min(), Some(1.0));
        assert_eq!(sketch.max(), Some(3.0));
        assert_eq!(sketch.count(), 4);
        assert_consistent(&sketch);

        // The median estimate must land inside the distribution and within the mapping's
        // relative error bound of the true median.
        let median = sketch.quantile(0.5);
        assert!(median > 1.0 && median < 3.0);
        assert!((median - 2.0).abs() / 2.0 <= 2.0 * DefaultSketchParameters::RELATIVE_ACCURACY);
    }

    #[test]
    fn test_merge_scenario() {
        let mut left: Sketch = Sketch::default();
        left.insert_many(&[10.0, 20.0]);

        let mut right: Sketch = Sketch::default();
        right.insert_many(&[20.0, 30.0]);

        let right_before = right.copy();
        left.merge(&right);

        assert_eq!(left.count(), 4);
        assert_eq!(left.min(), Some(10.0));
        assert_eq!(left.max(), Some(30.0));
        assert_consistent(&left);

        // The colliding bucket for value 20 must have its counts summed into one bin.
        let key_for_twenty = DefaultSketchParameters::key(20.0);
        let bin = left
            .bins()
            .iter()
            .find(|b| b.key() == key_for_twenty)
            .expect("merged sketch should have a bin for value 20");
        assert_eq!(bin.count(), 2);

        // Merging never mutates the other sketch.
        assert_eq!(right_before, right);
    }

    #[test]
    fn test_quantile_empty_and_boundaries() {
        let empty: Sketch = Sketch::default();
        for q in [-1.0, 0.0, 0.5, 1.0, 2.0] {
            assert_eq!(empty.quantile(q), 0.0);
        }

        let mut sketch: Sketch = Sketch::default();
        sketch.insert_many(&[3.0, 1.0, 7.0, 5.0]);

        assert_eq!(sketch.quantile(0.0), 1.0);
        assert_eq!(sketch.quantile(-0.5), 1.0);
        assert_eq!(sketch.quantile(1.0), 7.0);
        assert_eq!(sketch.quantile(1.5), 7.0);
    }

    #[test]
    fn test_quantile_monotonic() {
        let mut sketch: Sketch = Sketch::default();
        let values = (1..=1000).map(|i| f64::from(i) * 0.1).collect::<Vec<_>>();
        sketch.insert_many(&values);

        let mut last = sketch.quantile(0.0);
        for p in 1..=100 {
            let q = f64::from(p) / 100.0;
            let estimated = sketch.quantile(q);
            assert!(
                estimated >= last,
                "quantile({q}) = {estimated} regressed below {last}"
            );
            last = estimated;
        }
    }

    #[test]
    fn test_single_bin_interpolates_between_extremes() {
        // All values land in one bucket, which is both the first and the last bin: both edge
        // corrections apply and the estimate stays inside the observed extremes.
        let mut sketch: Sketch = Sketch::default();
        sketch.insert_many(&[100.0, 100.5, 101.0]);
        assert_eq!(sketch.bin_count(), 1);

        let estimated = sketch.quantile(0.5);
        assert!((100.0..=101.0).contains(&estimated));
    }

    #[test]
    fn test_copy_isolation() {
        let mut source: Sketch = Sketch::default();
        source.insert_many(&[2.0, 4.0, 8.0, 16.0]);

        let mut copy = source.copy();
        assert_eq!(source, copy);
        for p in 0..=10 {
            let q = f64::from(p) / 10.0;
            assert_eq!(source.quantile(q), copy.quantile(q));
        }

        copy.insert(32.0);
        assert_eq!(source.count(), 4);
        assert_eq!(source.max(), Some(16.0));
        assert_eq!(copy.count(), 5);
        assert_eq!(copy.max(), Some(32.0));
    }

    #[test]
    fn test_reset() {
        let mut sketch: Sketch = Sketch::default();
        sketch.insert_many(&[1.0, 2.0, 3.0]);

        sketch.reset();
        assert!(sketch.is_empty());
        assert_eq!(sketch.quantile(0.5), 0.0);
        assert_eq!(Sketch::default(), sketch);

        // A reset sketch is immediately reusable.
        sketch.insert_many(&[5.0, 6.0]);
        assert_eq!(sketch.count(), 2);
        assert_eq!(sketch.min(), Some(5.0));
        assert_consistent(&sketch);
    }

    #[test]
    fn test_mem_size() {
        let mut sketch: Sketch = Sketch::default();
        let (empty_used, empty_allocated) = sketch.mem_size();
        assert!(empty_allocated >= empty_used);

        sketch.insert_many(&[1.0, 10.0, 100.0, 1000.0, 10000.0]);
        let (used, allocated) = sketch.mem_size();
        assert!(used > empty_used);
        assert!(allocated >= used);
    }

    #[test]
    fn test_from_raw_parts_round_trip() {
        let mut source: Sketch = Sketch::default();
        source.insert_many(&[1.0, 2.0, 2.0, 3.0]);

        let raw_bins = source.bins().iter().map(|b| (b.key(), b.count())).collect::<Vec<_>>();
        let rebuilt = Sketch::from_raw_parts(*source.summary(), &raw_bins).expect("exported bins should be valid");

        assert_eq!(source, rebuilt);
        assert_consistent(&rebuilt);
    }

    #[test]
    fn test_from_raw_parts_rejects_invalid_bins() {
        let mut summary = Summary::default();
        summary.insert(1.0);
        summary.insert(2.0);

        assert_eq!(
            Err("bin count must be positive"),
            Sketch::<DefaultSketchParameters>::from_raw_parts(summary, &[(1000, 2), (1001, 0)])
        );
        assert_eq!(
            Err("bin keys must be strictly ascending"),
            Sketch::<DefaultSketchParameters>::from_raw_parts(summary, &[(1001, 1), (1000, 1)])
        );
        assert_eq!(
            Err("summary count disagrees with sum of bin counts"),
            Sketch::<DefaultSketchParameters>::from_raw_parts(summary, &[(1000, 1)])
        );
    }
}
