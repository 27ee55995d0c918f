//! The sparse bin store and its insertion/merge algorithms.

use std::cmp::Ordering;
use std::mem;

use smallvec::SmallVec;

use crate::params::SketchParameters;
use crate::pool::KeyListPool;

/// A sketch bin.
///
/// Represents every observation that fell into one logarithmic bucket: the bucket's integer key
/// and the number of observations mapped to it. A bin with a zero count never exists in a store.
#[derive(Clone, Copy, Debug)]
pub struct Bin<P: SketchParameters> {
    /// The bin index.
    pub(crate) k: P::BinKey,

    /// The number of observations within the bin.
    pub(crate) n: u64,
}

impl<P: SketchParameters> Bin<P> {
    /// Returns the key of the bin.
    pub fn key(&self) -> P::BinKey {
        self.k
    }

    /// Returns the number of observations within the bin.
    pub fn count(&self) -> u64 {
        self.n
    }
}

// Implemented manually so that bins compare without a `PartialEq` bound on the parameter type:
// both fields already compare directly.
impl<P: SketchParameters> PartialEq for Bin<P> {
    fn eq(&self, other: &Self) -> bool {
        self.k == other.k && self.n == other.n
    }
}

impl<P: SketchParameters> Eq for Bin<P> {}

pub(crate) type BinList<P> = SmallVec<[Bin<P>; 4]>;

/// An ordered, key-unique collection of bins.
///
/// Bins are kept strictly ascending by key with no duplicates, and the total count always equals
/// the sum of the per-bin counts. Storage grows geometrically and is only reclaimed on an explicit
/// clear, never shrunk automatically.
#[derive(Debug)]
pub(crate) struct SparseStore<P: SketchParameters> {
    bins: BinList<P>,
    count: u64,
    key_pool: Option<KeyListPool<P::BinKey>>,
}

impl<P: SketchParameters> SparseStore<P> {
    /// Returns the current bins, ascending by key.
    pub(crate) fn bins(&self) -> &[Bin<P>] {
        &self.bins
    }

    /// Total number of observations across all bins.
    pub(crate) fn total_count(&self) -> u64 {
        self.count
    }

    /// Whether or not this store holds any observations.
    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Acquires a key buffer from the store's pool, lazily creating the pool on first use.
    pub(crate) fn acquire_key_list(&mut self) -> Vec<P::BinKey> {
        self.key_pool.get_or_insert_with(KeyListPool::default).acquire()
    }

    /// Returns a key buffer to the store's pool.
    pub(crate) fn release_key_list(&mut self, keys: Vec<P::BinKey>) {
        self.key_pool.get_or_insert_with(KeyListPool::default).release(keys);
    }

    /// Inserts a batch of keys into the store.
    ///
    /// The input need not be sorted or unique: it is sorted in place, then folded into the
    /// existing bins with a single linear merge, aggregating runs of equal keys as it goes. The
    /// total count grows by `keys.len()`.
    pub(crate) fn insert_keys(&mut self, keys: &mut [P::BinKey]) {
        if keys.is_empty() {
            return;
        }

        keys.sort_unstable();

        // Merge the sorted batch and the existing bins with two cursors, writing into a buffer
        // sized to the worst case (every input key lands in a new bin) so the merge itself never
        // reallocates.
        let mut merged = BinList::<P>::with_capacity(self.bins.len() + keys.len());

        let mut bins_idx = 0;
        let mut key_idx = 0;
        let bins_len = self.bins.len();
        let keys_len = keys.len();

        while bins_idx < bins_len && key_idx < keys_len {
            let bin = self.bins[bins_idx];
            let vk = keys[key_idx];

            match bin.k.cmp(&vk) {
                Ordering::Greater => {
                    let kn = count_leading_equal(keys, key_idx);
                    merged.push(Bin { k: vk, n: kn });
                    key_idx += kn as usize;
                }
                Ordering::Less => {
                    merged.push(bin);
                    bins_idx += 1;
                }
                Ordering::Equal => {
                    let kn = count_leading_equal(keys, key_idx);
                    merged.push(Bin {
                        k: bin.k,
                        n: bin.n + kn,
                    });
                    bins_idx += 1;
                    key_idx += kn as usize;
                }
            }
        }

        merged.extend_from_slice(&self.bins[bins_idx..]);

        while key_idx < keys_len {
            let vk = keys[key_idx];
            let kn = count_leading_equal(keys, key_idx);
            merged.push(Bin { k: vk, n: kn });
            key_idx += kn as usize;
        }

        self.bins = merged;
        self.count += keys_len as u64;
    }

    /// Merges another store into this one, without mutating `other`.
    ///
    /// Both inputs are already sorted and key-unique, so this is a two-way zipper merge: equal
    /// keys have their counts summed into one bin, unequal keys are carried through unchanged.
    pub(crate) fn merge(&mut self, other: &Self) {
        let mut merged = BinList::<P>::with_capacity(self.bins.len() + other.bins.len());

        let mut bins_idx = 0;
        for other_bin in &other.bins {
            let start = bins_idx;
            while bins_idx < self.bins.len() && self.bins[bins_idx].k < other_bin.k {
                bins_idx += 1;
            }

            merged.extend_from_slice(&self.bins[start..bins_idx]);

            if bins_idx >= self.bins.len() || self.bins[bins_idx].k > other_bin.k {
                merged.push(*other_bin);
            } else {
                merged.push(Bin {
                    k: other_bin.k,
                    n: other_bin.n + self.bins[bins_idx].n,
                });
                bins_idx += 1;
            }
        }

        merged.extend_from_slice(&self.bins[bins_idx..]);

        self.bins = merged;
        self.count += other.count;
    }

    /// Clears the store to its logical empty state.
    ///
    /// Allocated capacity is retained so that a reused store does not pay reallocation churn in
    /// hot loops.
    pub(crate) fn clear(&mut self) {
        self.bins.clear();
        self.count = 0;
    }

    /// Memory use of the store in bytes, as `(used, allocated)`.
    ///
    /// `used` reflects the bins currently live, `allocated` the reserved capacity; both include
    /// the store's fixed overhead. Read-only, intended for capacity-planning telemetry.
    pub(crate) fn mem_size(&self) -> (usize, usize) {
        let bin_size = mem::size_of::<Bin<P>>();
        let fixed_size = mem::size_of::<Self>();

        (
            fixed_size + self.bins.len() * bin_size,
            fixed_size + self.bins.capacity() * bin_size,
        )
    }

    /// Appends a bin to the end of the store.
    ///
    /// Callers must keep keys strictly ascending and counts positive; this is only exposed for
    /// rebuilding a store from previously exported bin content.
    pub(crate) fn push_bin(&mut self, k: P::BinKey, n: u64) {
        self.bins.push(Bin { k, n });
        self.count += n;
    }

    /// Deep-copies this store's content into `dst`, reusing `dst`'s capacity where possible.
    ///
    /// The destination's key-buffer pool is left as-is; only bin content and the total count are
    /// replaced. The two stores share no backing storage afterwards.
    pub(crate) fn copy_to(&self, dst: &mut Self) {
        dst.bins.clear();
        dst.bins.extend_from_slice(&self.bins);
        dst.count = self.count;
    }
}

impl<P: SketchParameters> Clone for SparseStore<P> {
    fn clone(&self) -> Self {
        // Scratch buffers are never shared between stores: the clone starts with a fresh pool.
        Self {
            bins: self.bins.clone(),
            count: self.count,
            key_pool: None,
        }
    }
}

impl<P: SketchParameters> Default for SparseStore<P> {
    fn default() -> Self {
        Self {
            bins: BinList::<P>::new(),
            count: 0,
            key_pool: None,
        }
    }
}

impl<P: SketchParameters> PartialEq for SparseStore<P> {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count && self.bins == other.bins
    }
}

impl<P: SketchParameters> Eq for SparseStore<P> {}

fn count_leading_equal<K: Eq>(keys: &[K], start_idx: usize) -> u64 {
    if start_idx == keys.len() - 1 {
        return 1;
    }

    let mut idx = start_idx;
    while idx < keys.len() && keys[idx] == keys[start_idx] {
        idx += 1;
    }

    (idx - start_idx) as u64
}
