//! Approximate membership over every number seen during the run.
//!
//! A split block Bloom filter: memory is decided up front from the expected
//! capacity and target false-positive rate and never grows. Inserted values are
//! always reported as present. Past `capacity` insertions the false-positive
//! rate climbs above the target; the filter warns once when that happens.

use std::f64::consts::LN_2;
use std::hash::Hasher;

use sbbf_rs_safe::Filter;
use siphasher::sip::SipHasher13;
use thiserror::Error;
use tracing::warn;

use crate::record::Number;

#[derive(Error, Debug, PartialEq)]
pub enum FilterError {
    #[error("filter capacity must be positive")]
    ZeroCapacity,
    #[error("false positive rate must be within (0, 1), got {0}")]
    InvalidFalsePositiveRate(f64),
}

pub struct MembershipFilter {
    filter: Filter,
    keys: (u64, u64),
    bits_per_key: usize,
    capacity: usize,
    inserted: usize,
    warned_over_capacity: bool,
}

/// Bits per key needed for `false_positive_rate`. Split blocks cost about a
/// tenth more than the classic `-ln(p) / ln(2)^2`.
fn bits_per_key(false_positive_rate: f64) -> usize {
    let classic = -false_positive_rate.ln() / (LN_2 * LN_2);
    ((classic * 1.1).ceil() as usize).max(1)
}

impl MembershipFilter {
    /// Size a filter for `capacity` values at `false_positive_rate`, with fresh
    /// random hash keys.
    pub fn new(capacity: usize, false_positive_rate: f64) -> Result<Self, FilterError> {
        Self::with_keys(capacity, false_positive_rate, rand::random())
    }

    pub fn with_keys(
        capacity: usize,
        false_positive_rate: f64,
        keys: (u64, u64),
    ) -> Result<Self, FilterError> {
        if capacity == 0 {
            return Err(FilterError::ZeroCapacity);
        }
        if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
            return Err(FilterError::InvalidFalsePositiveRate(false_positive_rate));
        }

        let bits_per_key = bits_per_key(false_positive_rate);
        Ok(Self {
            filter: Filter::new(bits_per_key, capacity),
            keys,
            bits_per_key,
            capacity,
            inserted: 0,
            warned_over_capacity: false,
        })
    }

    pub fn contains(&self, number: Number) -> bool {
        self.filter.contains_hash(self.hash(number))
    }

    /// Add `number`. Returns true if it was definitely not seen before.
    pub fn insert(&mut self, number: Number) -> bool {
        let hash = self.hash(number);
        if self.filter.contains_hash(hash) {
            return false;
        }
        self.filter.insert_hash(hash);

        self.inserted += 1;
        if self.inserted > self.capacity && !self.warned_over_capacity {
            self.warned_over_capacity = true;
            warn!(
                capacity = self.capacity,
                "membership filter is over capacity, false positive rate will exceed its target"
            );
        }
        true
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bits_per_key(&self) -> usize {
        self.bits_per_key
    }

    pub fn size_in_bytes(&self) -> usize {
        self.filter.as_bytes().len()
    }

    /// Fraction of bits set.
    pub fn fill_ratio(&self) -> f64 {
        let bytes = self.filter.as_bytes();
        if bytes.is_empty() {
            return 0.0;
        }
        let set: u64 = bytes.iter().map(|b| u64::from(b.count_ones())).sum();
        set as f64 / (bytes.len() * 8) as f64
    }

    fn hash(&self, number: Number) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(self.keys.0, self.keys.1);
        hasher.write(&number.value().to_le_bytes());
        hasher.finish()
    }
}
