use crate::bit_store::BitStore;
use crate::config::FilterConfig;
use crate::error::{ConfigError, NotEnoughSpace};
use crate::hash::mix32;
use crate::set_membership::SetMembership;
use log::debug;
use rand::Rng;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

/// Approximate membership filter using partial-key cuckoo hashing.
///
/// Each bucket is stored in a bit-packed buffer as `bucket_entries` occupancy
/// bits followed by `bucket_entries` fingerprints of `fingerprint_bits` bits.
/// An item lives in one of two buckets: `i1`, derived from the high bits of
/// its hash, and `i1 ^ mix32(fingerprint)`.
///
/// False positives are possible. False negatives only happen after an
/// [`insert`](Self::insert) returned `false`: the eviction walk relocates
/// fingerprints it never puts back, and the last evicted one is lost.
///
/// The bucket count is rounded up to a power of two so that the alternate
/// bucket of the alternate bucket is always the original one.
pub struct CuckooFilter<T: ?Sized, H, R> {
    table: BitStore<u32>,
    config: FilterConfig,
    num_buckets: usize,
    bucket_bits: usize,
    build_hasher: H,
    rng: R,
    _phantom: PhantomData<T>,
}

impl<T: ?Sized, H, R> CuckooFilter<T, H, R> {
    pub fn new(config: FilterConfig, build_hasher: H, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;

        let too_large = |bucket_bits| ConfigError::TooLarge {
            num_buckets: config.num_buckets,
            bucket_bits,
        };
        let bucket_bits = (config.fingerprint_bits + 1)
            .checked_mul(config.bucket_entries)
            .ok_or_else(|| too_large(usize::MAX))?;
        let num_buckets = config
            .num_buckets
            .checked_next_power_of_two()
            .ok_or_else(|| too_large(bucket_bits))?;
        let total_bits = num_buckets
            .checked_mul(bucket_bits)
            .ok_or_else(|| too_large(bucket_bits))?;

        Ok(Self {
            table: BitStore::with_bits(total_bits),
            config,
            num_buckets,
            bucket_bits,
            build_hasher,
            rng,
            _phantom: PhantomData,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Effective bucket count, a power of two.
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    /// Bits used by one bucket, occupancy bitmap included.
    pub fn bucket_bits(&self) -> usize {
        self.bucket_bits
    }

    pub fn capacity(&self) -> usize {
        self.num_buckets * self.config.bucket_entries
    }

    /// Number of occupied fingerprint slots.
    pub fn len(&self) -> usize {
        (0..self.num_buckets)
            .map(|bucket| {
                self.table
                    .count_ones_in(self.bucket_offset(bucket), self.config.bucket_entries)
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    fn bucket_offset(&self, bucket: usize) -> usize {
        bucket * self.bucket_bits
    }

    fn entry_offset(&self, bucket: usize, entry: usize) -> usize {
        self.bucket_offset(bucket)
            + self.config.bucket_entries
            + entry * self.config.fingerprint_bits
    }

    fn is_occupied(&self, bucket: usize, entry: usize) -> bool {
        self.table.get_bit(self.bucket_offset(bucket) + entry)
    }

    fn fingerprint_at(&self, bucket: usize, entry: usize) -> u32 {
        self.table.get(self.entry_offset(bucket, entry), self.config.fingerprint_bits)
    }

    fn store_fingerprint(&mut self, bucket: usize, entry: usize, fingerprint: u32) {
        let offset = self.entry_offset(bucket, entry);
        self.table.set(offset, self.config.fingerprint_bits, fingerprint);
    }

    fn alt_index(&self, index: usize, fingerprint: u32) -> usize {
        index ^ (mix32(fingerprint) as usize & (self.num_buckets - 1))
    }

    /// Stores `fingerprint` in the first free entry of `bucket`.
    fn try_insert(&mut self, bucket: usize, fingerprint: u32) -> bool {
        match (0..self.config.bucket_entries).find(|&entry| !self.is_occupied(bucket, entry)) {
            Some(entry) => {
                let offset = self.bucket_offset(bucket) + entry;
                self.table.set_bit(offset, true);
                self.store_fingerprint(bucket, entry, fingerprint);
                true
            }
            None => false,
        }
    }

    fn find(&self, bucket: usize, fingerprint: u32) -> Option<usize> {
        (0..self.config.bucket_entries).find(|&entry| {
            self.is_occupied(bucket, entry) && self.fingerprint_at(bucket, entry) == fingerprint
        })
    }

    fn fingerprint_mask(&self) -> u32 {
        u32::MAX >> (u32::BITS as usize - self.config.fingerprint_bits)
    }
}

impl<T, H, R> CuckooFilter<T, H, R>
where
    T: Hash + ?Sized,
    H: BuildHasher,
{
    fn index_and_fingerprint(&self, item: &T) -> (usize, u32) {
        let hash = self.build_hasher.hash_one(item);
        let fingerprint = hash as u32 & self.fingerprint_mask();
        let index = (hash >> self.config.fingerprint_bits) as usize & (self.num_buckets - 1);
        (index, fingerprint)
    }

    /// Returns `true` if `item` may be in the filter, `false` if it
    /// definitely is not.
    pub fn contains(&self, item: &T) -> bool {
        let (i1, fingerprint) = self.index_and_fingerprint(item);
        let i2 = self.alt_index(i1, fingerprint);

        self.find(i1, fingerprint).is_some() || self.find(i2, fingerprint).is_some()
    }

    /// Removes one stored copy of `item`'s fingerprint.
    ///
    /// Only the occupancy bit is cleared. Removing an item that was never
    /// inserted may remove a colliding item instead.
    pub fn remove(&mut self, item: &T) -> bool {
        let (i1, fingerprint) = self.index_and_fingerprint(item);
        let i2 = self.alt_index(i1, fingerprint);

        for bucket in [i1, i2] {
            if let Some(entry) = self.find(bucket, fingerprint) {
                let offset = self.bucket_offset(bucket) + entry;
                self.table.set_bit(offset, false);
                return true;
            }
        }
        false
    }
}

impl<T, H, R> CuckooFilter<T, H, R>
where
    T: Hash + ?Sized,
    H: BuildHasher,
    R: Rng,
{
    /// Adds `item`, returning `false` if no free entry was found within
    /// `max_insert_loops` evictions.
    ///
    /// A failed insert leaves the filter modified: fingerprints moved during
    /// the walk stay moved and the last evicted fingerprint is dropped, so a
    /// previously inserted item may stop being reported. Rebuild with more
    /// buckets when this happens.
    pub fn insert(&mut self, item: &T) -> bool {
        let (i1, fingerprint) = self.index_and_fingerprint(item);
        let i2 = self.alt_index(i1, fingerprint);
        debug_assert_eq!(i1, self.alt_index(i2, fingerprint));

        if self.try_insert(i1, fingerprint) || self.try_insert(i2, fingerprint) {
            return true;
        }

        let mut index = if self.rng.gen_bool(0.5) { i1 } else { i2 };
        let mut fingerprint = fingerprint;

        for _ in 0..self.config.max_insert_loops {
            let entry = self.rng.gen_range(0..self.config.bucket_entries);
            let evicted = self.fingerprint_at(index, entry);
            self.store_fingerprint(index, entry, fingerprint);

            fingerprint = evicted;
            index = self.alt_index(index, fingerprint);
            if self.try_insert(index, fingerprint) {
                return true;
            }
        }

        debug!(
            "cuckoo filter insert gave up after {} evictions ({} of {} entries occupied)",
            self.config.max_insert_loops,
            self.len(),
            self.capacity()
        );
        false
    }
}

impl<T, H, R> SetMembership<T> for CuckooFilter<T, H, R>
where
    T: Hash + ?Sized,
    H: BuildHasher,
    R: Rng,
{
    type InsertError = NotEnoughSpace;

    fn contains(&self, item: &T) -> bool {
        CuckooFilter::contains(self, item)
    }

    fn insert(&mut self, item: &T) -> Result<(), Self::InsertError> {
        if CuckooFilter::insert(self, item) {
            Ok(())
        } else {
            Err(NotEnoughSpace)
        }
    }

    fn remove(&mut self, item: &T) -> bool {
        CuckooFilter::remove(self, item)
    }
}

impl<T: ?Sized, H, R> std::fmt::Debug for CuckooFilter<T, H, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CuckooFilter {{ fingerprint_bits: {}, num_buckets: {}, bucket_entries: {} }}",
            self.config.fingerprint_bits, self.num_buckets, self.config.bucket_entries
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::hash::{BuildHasherDefault, DefaultHasher};

    fn make_filter<T: ?Sized>(
        bucket_entries: usize,
        num_buckets: usize,
        max_insert_loops: usize,
        fingerprint_bits: usize,
    ) -> CuckooFilter<T, BuildHasherDefault<DefaultHasher>, StdRng> {
        let config = FilterConfig {
            bucket_entries,
            num_buckets,
            max_insert_loops,
            fingerprint_bits,
        };
        CuckooFilter::new(config, Default::default(), StdRng::seed_from_u64(7)).unwrap()
    }

    #[test]
    fn test_invalid_config() {
        let new = |config| {
            CuckooFilter::<str, BuildHasherDefault<DefaultHasher>, _>::new(
                config,
                Default::default(),
                StdRng::seed_from_u64(0),
            )
            .unwrap_err()
        };
        let base = FilterConfig::default();

        assert_eq!(
            new(FilterConfig {
                bucket_entries: 3,
                ..base
            }),
            ConfigError::BucketEntries(3)
        );
        assert_eq!(
            new(FilterConfig {
                num_buckets: 0,
                ..base
            }),
            ConfigError::NumBuckets(0)
        );
        assert_eq!(
            new(FilterConfig {
                fingerprint_bits: 33,
                ..base
            }),
            ConfigError::FingerprintBits { got: 33, max: 32 }
        );
        assert!(matches!(
            new(FilterConfig {
                num_buckets: usize::MAX,
                ..base
            }),
            ConfigError::TooLarge { .. }
        ));
    }

    #[test]
    fn test_geometry() {
        let cf = make_filter::<str>(4, 100, 50, 12);

        assert_eq!(cf.num_buckets(), 128);
        assert_eq!(cf.bucket_bits(), 52);
        assert_eq!(cf.capacity(), 512);
        assert_eq!(cf.table.words().len(), (128 * 52) / 32);
        assert_eq!(cf.config().num_buckets, 100);
    }

    #[test]
    fn test_add_contains_remove() {
        let mut cf = make_filter::<str>(4, 100, 50, 12);

        assert!(cf.insert("0"));
        assert!(cf.contains("0"));
        assert!(cf.remove("0"));
        assert!(!cf.contains("0"));
        assert!(!cf.remove("0"));
    }

    #[test]
    fn test_one_at_a_time() {
        let mut cf = make_filter::<str>(4, 100, 50, 12);

        for i in 0..10 {
            let val = i.to_string();
            assert!(cf.insert(&val));
            assert!(cf.contains(&val));
            cf.remove(&val);
            assert!(!cf.contains(&val));
        }
        assert!(cf.is_empty());
    }

    #[test]
    fn test_contains_empty() {
        let cf = make_filter::<i32>(4, 64, 500, 8);

        for i in 0..100 {
            assert!(!cf.contains(&i));
        }
    }

    #[test]
    fn test_contains_inserted() {
        let mut cf = make_filter::<i32>(4, 128, 500, 12);

        for i in 0..300 {
            assert!(cf.insert(&i), "insert {i} failed");
        }
        for i in 0..300 {
            assert!(cf.contains(&i), "lost {i}");
        }
        assert_eq!(cf.len(), 300);
    }

    #[test]
    fn test_full_width_fingerprints() {
        let mut cf = make_filter::<u64>(2, 32, 500, 32);

        for i in 0..20 {
            assert!(cf.insert(&i));
        }
        for i in 0..20 {
            assert!(cf.contains(&i));
        }
    }

    #[test]
    fn test_duplicates_are_counted() {
        let mut cf = make_filter::<str>(4, 1, 10, 8);

        assert!(cf.insert("a"));
        assert!(cf.insert("a"));
        assert_eq!(cf.len(), 2);

        assert!(cf.remove("a"));
        assert!(cf.contains("a"));
        assert!(cf.remove("a"));
        assert!(!cf.contains("a"));
    }

    #[test]
    fn test_not_enough_space() {
        let mut cf = make_filter::<i32>(1, 1, 5, 8);

        assert_eq!(SetMembership::insert(&mut cf, &1), Ok(()));
        assert_eq!(SetMembership::insert(&mut cf, &2), Err(NotEnoughSpace));
        assert_eq!(cf.len(), 1);
    }

    #[test]
    fn test_give_up_keeps_filter_full() {
        let mut cf = make_filter::<i32>(1, 2, 20, 8);

        let failures = (0..10).filter(|i| !cf.insert(i)).count();

        assert!(failures >= 8);
        assert!(cf.len() <= 2);
    }

    #[test]
    fn test_bucket_layout() {
        let mut cf = make_filter::<str>(2, 1, 1, 4);

        assert!(cf.try_insert(0, 0b1011));
        assert_eq!(cf.table.words(), &[0b1011_0_1]);

        assert!(cf.try_insert(0, 0b0110));
        assert_eq!(cf.table.words(), &[0b0110_1011_1_1]);

        assert!(!cf.try_insert(0, 0b1111));
    }

    #[test]
    fn test_remove_clears_only_occupancy() {
        let mut cf = make_filter::<str>(2, 1, 1, 4);
        cf.try_insert(0, 0b1011);
        cf.try_insert(0, 0b0110);

        assert_eq!(cf.find(0, 0b1011), Some(0));
        cf.table.set_bit(0, false);

        assert_eq!(cf.table.words(), &[0b0110_1011_1_0]);
        assert_eq!(cf.find(0, 0b1011), None);
        assert_eq!(cf.find(0, 0b0110), Some(1));
    }

    #[test]
    fn test_entries_straddle_words() {
        let mut cf = make_filter::<str>(4, 4, 1, 6);
        assert_eq!(cf.bucket_bits(), 28);

        for bucket in 0..4 {
            for entry in 0..4u32 {
                assert!(cf.try_insert(bucket, 0b10_0100 | entry));
            }
        }
        for bucket in 0..4 {
            for entry in 0..4 {
                assert!(cf.is_occupied(bucket, entry));
                assert_eq!(cf.fingerprint_at(bucket, entry), 0b10_0100 | entry as u32);
            }
        }
        assert_eq!(cf.len(), 16);
    }

    #[test]
    fn test_alt_index_is_involution() {
        let cf = make_filter::<str>(4, 100, 1, 12);

        for index in 0..cf.num_buckets() {
            for fingerprint in [0, 1, 2, 0xabc, 0xfff] {
                let alt = cf.alt_index(index, fingerprint);
                assert!(alt < cf.num_buckets());
                assert_eq!(cf.alt_index(alt, fingerprint), index);
            }
        }
    }

    #[test]
    fn test_clear() {
        let mut cf = make_filter::<i32>(4, 16, 50, 8);
        for i in 0..20 {
            cf.insert(&i);
        }

        cf.clear();

        assert!(cf.is_empty());
        assert!(!cf.contains(&3));
    }

    #[test]
    fn test_debug() {
        let cf = make_filter::<str>(4, 100, 50, 12);

        assert_eq!(
            format!("{cf:?}"),
            "CuckooFilter { fingerprint_bits: 12, num_buckets: 128, bucket_entries: 4 }"
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::hash::{BuildHasherDefault, DefaultHasher};

    fn make_filter(seed: u64) -> CuckooFilter<u64, BuildHasherDefault<DefaultHasher>, StdRng> {
        let config = FilterConfig {
            bucket_entries: 4,
            num_buckets: 64,
            max_insert_loops: 100,
            fingerprint_bits: 10,
        };
        CuckooFilter::new(config, Default::default(), StdRng::seed_from_u64(seed)).unwrap()
    }

    proptest! {
        #[test]
        fn no_false_negatives_without_overflow(
            items in proptest::collection::vec(any::<u64>(), 0..150),
            seed in any::<u64>(),
        ) {
            let mut cf = make_filter(seed);
            let all_inserted = items.iter().all(|item| cf.insert(item));
            prop_assume!(all_inserted);

            for item in &items {
                prop_assert!(cf.contains(item));
            }
        }

        #[test]
        fn removing_everything_empties_filter(
            items in proptest::collection::vec(any::<u64>(), 0..150),
            seed in any::<u64>(),
        ) {
            let mut cf = make_filter(seed);
            let all_inserted = items.iter().all(|item| cf.insert(item));
            prop_assume!(all_inserted);

            for item in &items {
                prop_assert!(cf.remove(item));
            }
            prop_assert!(cf.is_empty());
        }
    }
}
