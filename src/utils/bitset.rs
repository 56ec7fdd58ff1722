//! Fixed-capacity bit set over variable indices.
//!
//! Blocks track the variables they read from outside (`depends`) as a bit set
//! sized to the procedure's variable table. Liveness iterates unions over these
//! sets until nothing grows, so the operations that feed that loop report
//! whether they changed anything.
//!
//! # Example
//!
//! ```rust
//! use tyflow::utils::BitSet;
//!
//! let mut live = BitSet::new(4);
//! live.insert(1);
//! live.insert(3);
//!
//! let mut other = BitSet::new(4);
//! other.insert(2);
//! assert!(live.union_with(&other));
//! assert_eq!(live.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
//! ```

/// A bit vector indexed by small integers.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct BitSet {
    words: Vec<u64>,
    len: usize,
}

impl BitSet {
    /// Creates a new empty bit set able to hold indices `0..capacity`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
            len: capacity,
        }
    }

    /// Returns the capacity of this bit set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Sets the bit at `index`, returning `true` if it was previously clear.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn insert(&mut self, index: usize) -> bool {
        assert!(index < self.len, "index out of bounds");
        let mask = 1u64 << (index % 64);
        let word = &mut self.words[index / 64];
        let fresh = *word & mask == 0;
        *word |= mask;
        fresh
    }

    /// Returns `true` if the bit at `index` is set. Out-of-range indices are never set.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        index < self.len && (self.words[index / 64] & (1u64 << (index % 64))) != 0
    }

    /// Returns the number of bits set.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Computes the union with another bit set in place.
    ///
    /// Returns `true` if `self` changed.
    ///
    /// # Panics
    ///
    /// Panics if the two sets have different capacities.
    pub fn union_with(&mut self, other: &Self) -> bool {
        assert_eq!(self.len, other.len, "bit sets must have same length");
        let mut changed = false;
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            let old = *a;
            *a |= *b;
            changed |= old != *a;
        }
        changed
    }

    /// Removes every bit that is set in `other` from `self`.
    ///
    /// Returns `true` if `self` changed.
    ///
    /// # Panics
    ///
    /// Panics if the two sets have different capacities.
    pub fn difference_with(&mut self, other: &Self) -> bool {
        assert_eq!(self.len, other.len, "bit sets must have same length");
        let mut changed = false;
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            let old = *a;
            *a &= !*b;
            changed |= old != *a;
        }
        changed
    }

    /// Returns an iterator over the indices of set bits, in ascending order.
    pub fn iter(&self) -> BitSetIter<'_> {
        BitSetIter {
            set: self,
            word_idx: 0,
            bit_idx: 0,
        }
    }
}

impl std::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Iterator over the set bits in a [`BitSet`].
pub struct BitSetIter<'a> {
    set: &'a BitSet,
    word_idx: usize,
    bit_idx: usize,
}

impl Iterator for BitSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        while self.word_idx < self.set.words.len() {
            let word = self.set.words[self.word_idx];
            while self.bit_idx < 64 {
                let idx = self.word_idx * 64 + self.bit_idx;
                if idx >= self.set.len {
                    return None;
                }
                self.bit_idx += 1;
                if (word & (1u64 << (self.bit_idx - 1))) != 0 {
                    return Some(idx);
                }
            }
            self.word_idx += 1;
            self.bit_idx = 0;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitset_insert_reports_fresh_bits() {
        let mut bs = BitSet::new(70);
        assert!(bs.is_empty());
        assert!(bs.insert(3));
        assert!(!bs.insert(3));
        assert!(bs.insert(69));
        assert_eq!(bs.count(), 2);
        assert!(bs.contains(69));
        assert!(!bs.contains(70));
    }

    #[test]
    fn test_bitset_union_reports_growth() {
        let mut a = BitSet::new(10);
        let mut b = BitSet::new(10);
        a.insert(1);
        b.insert(1);
        assert!(!a.union_with(&b));

        b.insert(7);
        assert!(a.union_with(&b));
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![1, 7]);
    }

    #[test]
    fn test_bitset_difference() {
        let mut a = BitSet::new(10);
        let mut b = BitSet::new(10);
        a.insert(0);
        a.insert(2);
        b.insert(2);
        b.insert(4);

        assert!(a.difference_with(&b));
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![0]);
        assert!(!a.difference_with(&b));
    }

    #[test]
    fn test_bitset_empty_capacity() {
        let bs = BitSet::new(0);
        assert_eq!(bs.len(), 0);
        assert_eq!(bs.iter().count(), 0);
        assert!(!bs.contains(0));
        assert_eq!(format!("{bs:?}"), "{}");
    }
}
