use crate::error::ConfigError;
use crate::set_membership::hash_set::DEFAULT_HALF_LEN;

/// Geometry of a [`CuckooFilter`](crate::CuckooFilter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    /// Fingerprint slots per bucket. Must be a power of two.
    pub bucket_entries: usize,
    /// Requested bucket count, rounded up to a power of two by the filter.
    pub num_buckets: usize,
    /// Eviction steps attempted before an insert gives up.
    pub max_insert_loops: usize,
    /// Width of a stored fingerprint, at most 32.
    pub fingerprint_bits: usize,
}

impl FilterConfig {
    pub const MAX_FINGERPRINT_BITS: usize = u32::BITS as usize;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_entries == 0 || !self.bucket_entries.is_power_of_two() {
            return Err(ConfigError::BucketEntries(self.bucket_entries));
        }
        if self.num_buckets == 0 {
            return Err(ConfigError::NumBuckets(self.num_buckets));
        }
        if self.max_insert_loops == 0 {
            return Err(ConfigError::MaxInsertLoops(self.max_insert_loops));
        }
        if !(1..=Self::MAX_FINGERPRINT_BITS).contains(&self.fingerprint_bits) {
            return Err(ConfigError::FingerprintBits {
                got: self.fingerprint_bits,
                max: Self::MAX_FINGERPRINT_BITS,
            });
        }
        Ok(())
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            bucket_entries: 4,
            num_buckets: 1024,
            max_insert_loops: 500,
            fingerprint_bits: 16,
        }
    }
}

/// Tuning of a [`CuckooHashSet`](crate::CuckooHashSet).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HashSetConfig {
    /// Eviction rounds attempted before the set grows.
    pub max_insert_loops: usize,
    /// The set grows before an insert once `len > load_factor * half_len`.
    pub load_factor: f64,
    /// Upper bound on slots per table. Needing more is
    /// [`CapacityExhausted`](crate::CapacityExhausted).
    pub max_half_len: usize,
}

impl HashSetConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_insert_loops == 0 {
            return Err(ConfigError::MaxInsertLoops(self.max_insert_loops));
        }
        if !self.load_factor.is_finite() || self.load_factor <= 0. {
            return Err(ConfigError::LoadFactor(self.load_factor));
        }
        if self.max_half_len < DEFAULT_HALF_LEN {
            return Err(ConfigError::MaxHalfLen {
                got: self.max_half_len,
                min: DEFAULT_HALF_LEN,
            });
        }
        Ok(())
    }
}

impl Default for HashSetConfig {
    fn default() -> Self {
        Self {
            max_insert_loops: 100,
            load_factor: 0.9,
            max_half_len: usize::MAX,
        }
    }
}
