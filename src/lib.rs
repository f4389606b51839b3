//! Cuckoo-hashing set structures.
//!
//! - [`CuckooFilter`]: approximate membership over a bit-packed table of
//!   fingerprints. May report false positives, never grows.
//! - [`CuckooHashSet`]: exact membership with two candidate slots per
//!   element, doubling when an eviction walk does not terminate.
//!
//! Neither structure is synchronised; wrap an instance in a lock to share it
//! between threads.

pub mod bit_store;
pub mod config;
pub mod error;
pub mod hash;
pub mod set_membership;

pub use bit_store::BitStore;
pub use config::{FilterConfig, HashSetConfig};
pub use error::{CapacityExhausted, ConfigError, NotEnoughSpace};
pub use hash::{mix32, BuildHasherFn, HashFn};
pub use set_membership::cuckoo::CuckooFilter;
pub use set_membership::hash_set::CuckooHashSet;
pub use set_membership::SetMembership;
