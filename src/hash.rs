use std::hash::{BuildHasher, Hash};

/// Integer avalanche used to spread fingerprints across buckets.
///
/// Three rounds of xor-shift, the first two followed by a multiply.
pub fn mix32(mut x: u32) -> u32 {
    x = ((x >> 16) ^ x).wrapping_mul(0x45d9f3b);
    x = ((x >> 16) ^ x).wrapping_mul(0x45d9f3b);
    (x >> 16) ^ x
}

/// A hash capability over `T`.
///
/// Implemented for plain functions and closures, so `|n: &u32| *n as u64` is
/// a valid hash function. Use [`BuildHasherFn`] to reuse a
/// [`BuildHasher`].
pub trait HashFn<T: ?Sized> {
    fn hash(&self, item: &T) -> u64;
}

impl<T, F> HashFn<T> for F
where
    T: ?Sized,
    F: Fn(&T) -> u64,
{
    fn hash(&self, item: &T) -> u64 {
        self(item)
    }
}

/// Adapts a [`BuildHasher`] into a [`HashFn`].
#[derive(Clone, Debug, Default)]
pub struct BuildHasherFn<S>(pub S);

impl<T, S> HashFn<T> for BuildHasherFn<S>
where
    T: Hash + ?Sized,
    S: BuildHasher,
{
    fn hash(&self, item: &T) -> u64 {
        self.0.hash_one(item)
    }
}
