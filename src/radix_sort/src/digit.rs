//! Bit ranges, digit windows and digit extraction.

use serde::{Deserialize, Serialize};

use crate::error::InvalidArgument;
use crate::key::RadixKey;

/// Requested output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Contiguous range `[start_bit, end_bit)` of the encoded key that takes
/// part in the ordering. Bits outside the range are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitRange {
    start_bit: u32,
    end_bit: u32,
}

impl BitRange {
    /// Bit range `[start_bit, end_bit)`; validated against the key type when used.
    pub const fn new(start_bit: u32, end_bit: u32) -> Self {
        Self { start_bit, end_bit }
    }

    /// Every bit of `K`.
    pub const fn full<K: RadixKey>() -> Self {
        Self::new(0, K::BITS)
    }

    pub const fn start_bit(&self) -> u32 {
        self.start_bit
    }

    pub const fn end_bit(&self) -> u32 {
        self.end_bit
    }

    /// Number of bits in the range.
    pub const fn width(&self) -> u32 {
        self.end_bit.saturating_sub(self.start_bit)
    }

    /// Check `0 <= start_bit < end_bit <= K::BITS`.
    pub fn validate<K: RadixKey>(&self) -> Result<(), InvalidArgument> {
        if self.start_bit < self.end_bit && self.end_bit <= K::BITS {
            Ok(())
        } else {
            Err(InvalidArgument::BitRange {
                start_bit: self.start_bit,
                end_bit: self.end_bit,
                key_bits: K::BITS,
            })
        }
    }

    /// Split into windows of at most `radix_bits`, least significant first.
    ///
    /// Only the most significant window can be narrower than `radix_bits`.
    pub fn windows(&self, radix_bits: u32) -> Vec<DigitWindow> {
        let radix_bits = radix_bits.max(1);
        (self.start_bit..self.end_bit)
            .step_by(radix_bits as usize)
            .map(|start_bit| DigitWindow {
                start_bit,
                bits: radix_bits.min(self.end_bit - start_bit),
            })
            .collect()
    }
}

/// Bits `[start_bit, start_bit + bits)` consumed by one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DigitWindow {
    pub start_bit: u32,
    pub bits: u32,
}

impl DigitWindow {
    /// Number of buckets, `2^bits`.
    #[inline]
    pub fn radix_size(&self) -> usize {
        1 << self.bits
    }

    #[inline]
    pub fn mask(&self) -> u64 {
        (1u64 << self.bits) - 1
    }
}

/// Bucket of an encoded key for one window.
///
/// Descending order maps bucket `b` to `2^bits - 1 - b`, so histogram,
/// offset and scatter stages only ever deal with ascending buckets.
#[inline]
pub fn extract_digit(encoded: u64, window: DigitWindow, order: SortOrder) -> u32 {
    let digit = (encoded >> window.start_bit) & window.mask();
    match order {
        SortOrder::Ascending => digit as u32,
        SortOrder::Descending => (window.mask() - digit) as u32,
    }
}
