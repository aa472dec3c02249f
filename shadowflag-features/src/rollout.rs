//! Gradual rollout evaluation
//!
//! Maps `(flag name, identifier, percentage)` to a yes/no decision by
//! hashing `"{flag}:{identifier}"` with MD5, reading the digest as a
//! big-endian integer and reducing it modulo 100. The same inputs always
//! land in the same bucket, on any platform and in any process.

use md5::{Digest, Md5};

/// Separator placed between the flag name and the identifier.
pub const HASH_SEPARATOR: char = ':';

/// Number of rollout buckets.
pub const BUCKET_COUNT: u128 = 100;

/// Compute the rollout bucket (0-99) for an identifier under a flag.
pub fn bucket(flag_name: &str, identifier: &str) -> u8 {
    let mut hasher = Md5::new();
    hasher.update(flag_name.as_bytes());
    hasher.update([HASH_SEPARATOR as u8]);
    hasher.update(identifier.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    (u128::from_be_bytes(bytes) % BUCKET_COUNT) as u8
}

/// Decide whether `identifier` falls inside a `percentage` rollout of `flag_name`.
///
/// A percentage of zero (or anything not greater than zero, NaN included)
/// never enables. A percentage of 100 always enables since buckets stop at 99.
pub fn evaluate(flag_name: &str, identifier: &str, percentage: f64) -> bool {
    if percentage.is_nan() || percentage <= 0.0 {
        return false;
    }

    f64::from(bucket(flag_name, identifier)) < percentage
}

/// Clamp a percentage into `[0, 100]`, mapping NaN to 0.
pub fn clamp_percentage(percentage: f64) -> f64 {
    if percentage.is_nan() {
        0.0
    } else {
        percentage.clamp(0.0, 100.0)
    }
}
