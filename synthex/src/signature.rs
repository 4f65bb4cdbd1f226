//! Fixed-width bitsets over the current point set.
//!
//! Bit `i` records that an expression is correct (or a predicate holds) at
//! point `i`. A factory fixes the universe size for one enumeration pass;
//! when the universe grows the caches copy old signatures into wider ones
//! and re-evaluate only at the new indices.

use std::hash::{Hash, Hasher};

use fixedbitset::FixedBitSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    bits: FixedBitSet,
}

impl Signature {
    /// Mark point `idx` as satisfied.
    ///
    /// # Panics
    ///
    /// Panics when `idx` is outside the universe.
    pub fn add(&mut self, idx: usize) {
        self.bits.insert(idx);
    }

    #[must_use]
    pub fn test(&self, idx: usize) -> bool {
        self.bits.contains(idx)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.is_clear()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.bits.count_ones(..) == self.bits.len()
    }

    #[must_use]
    pub fn size_of_universe(&self) -> usize {
        self.bits.len()
    }

    /// Copy the low `other.size_of_universe()` bits of `other` into a
    /// freshly minted wider signature; the remaining bits stay unset until
    /// the caller re-evaluates at the new points.
    pub fn copy_in(&mut self, other: &Signature) {
        debug_assert!(other.size_of_universe() <= self.size_of_universe());
        for idx in other.bits.ones() {
            self.bits.insert(idx);
        }
    }

    pub fn union_with(&mut self, other: &Signature) {
        debug_assert_eq!(other.size_of_universe(), self.size_of_universe());
        self.bits.union_with(&other.bits);
    }

    /// Indices of the satisfied points.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.ones()
    }
}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits.len().hash(state);
        for idx in self.bits.ones() {
            idx.hash(state);
        }
    }
}

/// Mints signatures of a fixed universe size.
#[derive(Debug, Clone, Copy)]
pub struct SignatureFactory {
    universe: usize,
}

impl SignatureFactory {
    #[must_use]
    pub fn new(universe: usize) -> Self {
        Self { universe }
    }

    #[must_use]
    pub fn mint(&self) -> Signature {
        Signature {
            bits: FixedBitSet::with_capacity(self.universe),
        }
    }

    #[must_use]
    pub fn size_of_universe(&self) -> usize {
        self.universe
    }
}

#[cfg(test)]
mod test {
    use hashbrown::HashMap;

    use super::SignatureFactory;

    #[test]
    fn test_add_and_test() {
        let factory = SignatureFactory::new(4);
        let mut sig = factory.mint();
        assert!(sig.is_empty());
        assert!(!sig.is_full());
        sig.add(1);
        sig.add(3);
        assert!(sig.test(1));
        assert!(!sig.test(2));
        assert!(!sig.is_empty());
    }

    #[test]
    fn test_full() {
        let factory = SignatureFactory::new(2);
        let mut sig = factory.mint();
        sig.add(0);
        assert!(!sig.is_full());
        sig.add(1);
        assert!(sig.is_full());
    }

    #[test]
    fn test_copy_in_extends_prefix() {
        let old = SignatureFactory::new(2);
        let mut prev = old.mint();
        prev.add(1);

        let grown = SignatureFactory::new(4);
        let mut next = grown.mint();
        next.copy_in(&prev);
        next.add(3);
        assert!(!next.test(0));
        assert!(next.test(1));
        assert!(!next.test(2));
        assert!(next.test(3));
        assert_eq!(next.size_of_universe(), 4);
    }

    #[test]
    fn test_union() {
        let factory = SignatureFactory::new(3);
        let mut a = factory.mint();
        a.add(0);
        let mut b = factory.mint();
        b.add(2);
        a.union_with(&b);
        assert!(a.test(0));
        assert!(a.test(2));
        assert!(!a.is_full());
    }

    #[test]
    fn test_signatures_are_map_keys() {
        let factory = SignatureFactory::new(3);
        let mut a = factory.mint();
        a.add(0);
        let mut b = factory.mint();
        b.add(0);
        let mut c = factory.mint();
        c.add(1);

        let mut map = HashMap::new();
        map.insert(a, "first");
        assert_eq!(map.get(&b), Some(&"first"));
        assert_eq!(map.get(&c), None);
    }
}
