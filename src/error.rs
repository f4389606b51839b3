/// A constructor argument violates its documented constraint.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("bucket_entries must be a power of two >= 1, got {0}")]
    BucketEntries(usize),
    #[error("num_buckets must be >= 1, got {0}")]
    NumBuckets(usize),
    #[error("max_insert_loops must be >= 1, got {0}")]
    MaxInsertLoops(usize),
    #[error("fingerprint_bits must be in the range [1, {max}], got {got}")]
    FingerprintBits { got: usize, max: usize },
    #[error("load_factor must be finite and > 0, got {0}")]
    LoadFactor(f64),
    #[error("max_half_len must be >= {min}, got {got}")]
    MaxHalfLen { got: usize, min: usize },
    #[error("filter of {num_buckets} buckets x {bucket_bits} bits overflows usize")]
    TooLarge {
        num_buckets: usize,
        bucket_bits: usize,
    },
}

/// The filter's eviction walk gave up before finding a free entry.
///
/// Fingerprints relocated along the walk stay where they were moved, and the
/// last evicted fingerprint is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("not enough space")]
pub struct NotEnoughSpace;

/// The hash set needed to grow past the largest table it can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cuckoo hash set cannot grow beyond {max_half_len} slots per table")]
pub struct CapacityExhausted {
    pub max_half_len: usize,
}
