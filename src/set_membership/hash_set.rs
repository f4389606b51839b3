use crate::config::HashSetConfig;
use crate::error::{CapacityExhausted, ConfigError};
use crate::hash::HashFn;
use crate::set_membership::SetMembership;
use log::debug;
use std::fmt::{Debug, Formatter};

/// Slots per table of a new or cleared set.
pub const DEFAULT_HALF_LEN: usize = 8;

/// A single 32-bit hash yields two 16-bit slot hashes, so no table can use
/// more slots than this.
const SINGLE_HASH_MAX_HALF_LEN: usize = 1 << 16;

/// Growth stops once a table would hold this many slots per element. An
/// overflow beyond that comes from colliding hashes, not a crowded table.
const MAX_SLOTS_PER_ELEMENT: usize = 1 << 10;

enum Hashers<H1, H2> {
    Single(H1),
    Dual(H1, H2),
}

impl<H1, H2> Hashers<H1, H2> {
    /// Raw hashes for table A and table B, before reduction by the table size.
    fn hashes<T: ?Sized>(&self, item: &T) -> (u64, u64)
    where
        H1: HashFn<T>,
        H2: HashFn<T>,
    {
        match self {
            Hashers::Single(hasher) => {
                let hash = hasher.hash(item) as u32;
                (u64::from(hash >> 16), u64::from(hash & 0xffff))
            }
            Hashers::Dual(h1, h2) => (h1.hash(item), h2.hash(item)),
        }
    }

    fn max_half_len(&self) -> usize {
        match self {
            Hashers::Single(_) => SINGLE_HASH_MAX_HALF_LEN,
            Hashers::Dual(..) => usize::MAX,
        }
    }
}

/// Slot pair for raw `hashes` in a store of `2 * half_len` slots.
fn slot_pair((a, b): (u64, u64), half_len: usize) -> (usize, usize) {
    let half = half_len as u64;
    ((a % half) as usize, half_len + (b % half) as usize)
}

/// Runs the eviction walk for `item` over `table`.
///
/// Each round places the carried item into its table-A slot and, if that
/// evicted someone, places the evicted item into its table-B slot. If no
/// round lands on an empty slot the walk is undone and `item` is handed back
/// with `table` unchanged.
fn place<K>(
    table: &mut [Option<K>],
    max_insert_loops: usize,
    item: K,
    hashes: impl Fn(&K) -> (u64, u64),
) -> Result<(), K> {
    let half_len = table.len() / 2;
    let mut path = Vec::new();
    let mut item = item;

    for _ in 0..max_insert_loops {
        for side in [0, 1] {
            let (a, b) = slot_pair(hashes(&item), half_len);
            let slot = if side == 0 { a } else { b };
            match table[slot] {
                Some(ref mut occupant) => {
                    std::mem::swap(occupant, &mut item);
                    path.push(slot);
                }
                None => {
                    table[slot] = Some(item);
                    return Ok(());
                }
            }
        }
    }

    for slot in path.into_iter().rev() {
        if let Some(occupant) = &mut table[slot] {
            std::mem::swap(occupant, &mut item);
        }
    }
    Err(item)
}

fn empty_table<T>(half_len: usize) -> Vec<Option<T>> {
    (0..2 * half_len).map(|_| None).collect()
}

/// Exact set using cuckoo hashing over two tables.
///
/// Every element lives either in its table-A slot or its table-B slot, so a
/// lookup inspects at most two slots. Inserts displace occupants back and
/// forth between the tables; when a walk does not terminate within
/// `max_insert_loops` rounds the tables double and the insert starts over.
///
/// Hashing is supplied either as two independent [`HashFn`]s, or as a single
/// 32-bit hash whose upper and lower 16 bits select the two slots.
pub struct CuckooHashSet<T, H1, H2 = H1> {
    table: Vec<Option<T>>,
    half_len: usize,
    len: usize,
    config: HashSetConfig,
    hashers: Hashers<H1, H2>,
}

impl<T, H1, H2> CuckooHashSet<T, H1, H2> {
    /// Creates a set hashing table A with `h1` and table B with `h2`.
    pub fn with_hashers(config: HashSetConfig, h1: H1, h2: H2) -> Result<Self, ConfigError> {
        Self::build(config, Hashers::Dual(h1, h2))
    }

    fn build(config: HashSetConfig, hashers: Hashers<H1, H2>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            table: empty_table(DEFAULT_HALF_LEN),
            half_len: DEFAULT_HALF_LEN,
            len: 0,
            config,
            hashers,
        })
    }

    pub fn config(&self) -> &HashSetConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn half_len(&self) -> usize {
        self.half_len
    }

    pub fn capacity(&self) -> usize {
        self.table.len()
    }

    /// Drops every element and shrinks back to the default size.
    pub fn clear(&mut self) {
        self.table = empty_table(DEFAULT_HALF_LEN);
        self.half_len = DEFAULT_HALF_LEN;
        self.len = 0;
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.table.iter().flatten(),
            remaining: self.len,
        }
    }

    /// Largest half length the next growth may reach, counting the element
    /// being inserted.
    fn max_half_len(&self) -> usize {
        let addressable = isize::MAX as usize / (2 * std::mem::size_of::<Option<T>>().max(1));
        let useful = (self.len + 1)
            .max(DEFAULT_HALF_LEN)
            .saturating_mul(MAX_SLOTS_PER_ELEMENT);
        self.config
            .max_half_len
            .min(self.hashers.max_half_len())
            .min(addressable)
            .min(useful)
    }
}

impl<T, H> CuckooHashSet<T, H, H> {
    /// Creates a set deriving both slots from one 32-bit hash: the upper 16
    /// bits pick the table-A slot, the lower 16 bits the table-B slot.
    ///
    /// Each table is capped at 2^16 slots in this mode.
    pub fn with_hasher(config: HashSetConfig, hasher: H) -> Result<Self, ConfigError> {
        Self::build(config, Hashers::Single(hasher))
    }
}

impl<T, H1, H2> CuckooHashSet<T, H1, H2>
where
    T: Eq,
    H1: HashFn<T>,
    H2: HashFn<T>,
{
    fn position(&self, item: &T) -> Option<usize> {
        let (a, b) = slot_pair(self.hashers.hashes(item), self.half_len);
        [a, b]
            .into_iter()
            .find(|&slot| self.table[slot].as_ref() == Some(item))
    }

    pub fn contains(&self, item: &T) -> bool {
        self.position(item).is_some()
    }

    /// Adds `item`, returning `false` if an equal element was already present.
    ///
    /// # Panics
    ///
    /// Panics if the set cannot grow far enough to place `item`; see
    /// [`try_insert`](Self::try_insert).
    pub fn insert(&mut self, item: T) -> bool {
        match self.try_insert(item) {
            Ok(inserted) => inserted,
            Err(err) => panic!("{err}"),
        }
    }

    /// Adds `item`, returning `Ok(false)` if an equal element was already
    /// present.
    ///
    /// Fails if placing `item` needs more slots per table than the configured
    /// `max_half_len`, than the hashers can address, or than 1024 per
    /// element. The set keeps exactly its previous elements in that case,
    /// although it may have grown while trying.
    pub fn try_insert(&mut self, item: T) -> Result<bool, CapacityExhausted> {
        if self.contains(&item) {
            return Ok(false);
        }

        if self.len as f64 > self.config.load_factor * self.half_len as f64 {
            if let Err(err) = self.grow("load factor") {
                debug!("cuckoo hash set kept its size: {err}");
            }
        }

        let mut item = item;
        loop {
            let hashers = &self.hashers;
            match place(&mut self.table, self.config.max_insert_loops, item, |item| {
                hashers.hashes(item)
            }) {
                Ok(()) => break,
                Err(homeless) => {
                    self.grow("eviction overflow")?;
                    item = homeless;
                }
            }
        }

        self.len += 1;
        Ok(true)
    }

    /// Removes and returns the element equal to `item`.
    pub fn take(&mut self, item: &T) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let slot = self.position(item)?;
        let taken = self.table[slot].take();
        self.len -= 1;
        taken
    }

    /// Removes `item`, returning whether it was present.
    pub fn remove(&mut self, item: &T) -> bool {
        self.take(item).is_some()
    }

    /// Doubles both tables and re-places every element.
    ///
    /// The new arrangement is worked out on element indices first, doubling
    /// again while a re-placement overflows, so elements only move once a
    /// complete arrangement exists.
    fn grow(&mut self, reason: &str) -> Result<(), CapacityExhausted> {
        let max_half_len = self.max_half_len();
        let entries: Vec<(usize, (u64, u64))> = self
            .table
            .iter()
            .enumerate()
            .filter_map(|(slot, item)| item.as_ref().map(|item| (slot, self.hashers.hashes(item))))
            .collect();

        let mut half_len = self.half_len;
        let arrangement = loop {
            if half_len > max_half_len / 2 {
                return Err(CapacityExhausted { max_half_len });
            }
            half_len *= 2;

            let mut table = empty_table::<usize>(half_len);
            let placed = (0..entries.len()).all(|entry| {
                place(&mut table, self.config.max_insert_loops, entry, |&entry| {
                    entries[entry].1
                })
                .is_ok()
            });
            if placed {
                break table;
            }
            debug!("cuckoo hash set rehash into {half_len} slots per table overflowed");
        };

        debug!(
            "growing cuckoo hash set from {} to {} slots per table ({reason}, {} elements)",
            self.half_len, half_len, self.len
        );
        let mut old = std::mem::take(&mut self.table);
        self.table = arrangement
            .into_iter()
            .map(|entry| entry.and_then(|entry| old[entries[entry].0].take()))
            .collect();
        self.half_len = half_len;
        Ok(())
    }
}

impl<T, H1, H2> Extend<T> for CuckooHashSet<T, H1, H2>
where
    T: Eq,
    H1: HashFn<T>,
    H2: HashFn<T>,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

impl<T, H1, H2> SetMembership<T> for CuckooHashSet<T, H1, H2>
where
    T: Clone + Eq,
    H1: HashFn<T>,
    H2: HashFn<T>,
{
    type InsertError = CapacityExhausted;

    fn contains(&self, item: &T) -> bool {
        CuckooHashSet::contains(self, item)
    }

    fn insert(&mut self, item: &T) -> Result<(), Self::InsertError> {
        self.try_insert(item.clone()).map(|_| ())
    }

    fn remove(&mut self, item: &T) -> bool {
        CuckooHashSet::remove(self, item)
    }
}

impl<T: Debug, H1, H2> Debug for CuckooHashSet<T, H1, H2> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Borrowing iterator over a [`CuckooHashSet`], table A first.
pub struct Iter<'a, T> {
    inner: std::iter::Flatten<std::slice::Iter<'a, Option<T>>>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T, H1, H2> IntoIterator for &'a CuckooHashSet<T, H1, H2> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, H1, H2> IntoIterator for CuckooHashSet<T, H1, H2> {
    type Item = T;
    type IntoIter = std::iter::Flatten<std::vec::IntoIter<Option<T>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter().flatten()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::hash::mix32;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone)]
    enum Op {
        Insert(u32),
        Remove(u32),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0u32..256).prop_map(Op::Insert),
            1 => (0u32..256).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn matches_reference_set(
            ops in proptest::collection::vec(op_strategy(), 0..400),
            max_insert_loops in 1usize..20,
        ) {
            let config = HashSetConfig {
                max_insert_loops,
                ..HashSetConfig::default()
            };
            let mut set: CuckooHashSet<u32, _, _> = CuckooHashSet::with_hashers(
                config,
                |n: &u32| *n as u64,
                |n: &u32| mix32(*n) as u64,
            )
            .unwrap();
            let mut reference = HashSet::new();

            for op in ops {
                match op {
                    Op::Insert(n) => prop_assert_eq!(set.insert(n), reference.insert(n)),
                    Op::Remove(n) => prop_assert_eq!(set.remove(&n), reference.remove(&n)),
                }
                prop_assert_eq!(set.len(), reference.len());
            }

            for n in 0..256 {
                prop_assert_eq!(set.contains(&n), reference.contains(&n));
            }
            prop_assert_eq!(set.iter().count(), set.len());
        }
    }
}
