//! Reusable key buffers for batched inserts.

/// A pool of reusable key buffers.
///
/// Bulk insertion needs a temporary key list sized to the input batch. Without pooling, every
/// bulk-insert call would allocate and discard that list, which is the dominant avoidable
/// allocation cost at high ingestion rates. The pool hands out empty buffers that keep the
/// capacity they grew to on previous use.
///
/// The pool is owned by a single store and is not safe for concurrent use.
#[derive(Debug)]
pub(crate) struct KeyListPool<K> {
    lists: Vec<Vec<K>>,
}

// Implemented manually so that an empty pool exists for any key type: a derived impl would
// require `K: Default`, which the key types are not bounded by.
impl<K> Default for KeyListPool<K> {
    fn default() -> Self {
        Self { lists: Vec::new() }
    }
}

impl<K> KeyListPool<K> {
    /// Acquires a key buffer from the pool.
    ///
    /// The buffer has a logical length of zero but may carry retained capacity from a prior use.
    /// Buffers handed out by nested acquires are always distinct instances.
    pub(crate) fn acquire(&mut self) -> Vec<K> {
        self.lists.pop().unwrap_or_default()
    }

    /// Returns a key buffer to the pool.
    ///
    /// The buffer is truncated to zero length, retaining its capacity. Callers must not hold on
    /// to any reference to the buffer after releasing it.
    pub(crate) fn release(&mut self, mut list: Vec<K>) {
        list.clear();
        self.lists.push(list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_retains_capacity() {
        let mut pool = KeyListPool::<u16>::default();

        let mut list = pool.acquire();
        list.extend_from_slice(&[1, 2, 3, 4]);
        let capacity = list.capacity();
        pool.release(list);

        let reused = pool.acquire();
        assert!(reused.is_empty());
        assert_eq!(capacity, reused.capacity());
    }

    #[test]
    fn test_nested_acquires_are_distinct() {
        let mut pool = KeyListPool::<u16>::default();

        let mut first = pool.acquire();
        let mut second = pool.acquire();
        first.push(1);
        second.push(2);

        assert_eq!(&[1], first.as_slice());
        assert_eq!(&[2], second.as_slice());

        pool.release(first);
        pool.release(second);
    }
}
