//! Sortable key types and their radix encodings.
//!
//! A radix sort only compares unsigned bit patterns, so every key type maps
//! itself into an unsigned integer of the same width such that unsigned
//! comparison of the encodings agrees with the natural order of the keys.
//! Encodings are only used to compute digits; the keys themselves are moved
//! bit-for-bit.
//!
//! | Type                     | Encoding                                         |
//! |--------------------------|--------------------------------------------------|
//! | `u8` `u16` `u32` `u64`   | identity                                         |
//! | `i8` `i16` `i32` `i64`   | flip the sign bit                                |
//! | `f32` `f64`              | negative: flip all bits; otherwise flip sign bit |
//!
//! Floats additionally encode `-0.0` like `+0.0`, and every NaN (any sign, any
//! payload) as the all-ones pattern, so NaNs form one group above `+inf`.

use bytemuck::Pod;
use std::fmt::Debug;

/// A fixed-width key the radix sort can order.
pub trait RadixKey: Pod + Debug + Send + Sync + 'static {
    /// Width of the key in bits.
    const BITS: u32;

    /// Order-preserving encoding in the low [`Self::BITS`] bits of a `u64`.
    fn to_radix_bits(self) -> u64;
}

macro_rules! impl_unsigned_key {
    ($($t:ty),* $(,)?) => {$(
        /// Unsigned integers already order like their bit patterns.
        impl RadixKey for $t {
            const BITS: u32 = <$t>::BITS;

            #[inline]
            fn to_radix_bits(self) -> u64 {
                self as u64
            }
        }
    )*};
}

macro_rules! impl_signed_key {
    ($($t:ty => $u:ty),* $(,)?) => {$(
        /// Two's complement: flipping the sign bit moves negatives below
        /// non-negatives and keeps the order within each half.
        impl RadixKey for $t {
            const BITS: u32 = <$t>::BITS;

            #[inline]
            fn to_radix_bits(self) -> u64 {
                let sign: $u = 1 << (<$u>::BITS - 1);
                ((self as $u) ^ sign) as u64
            }
        }
    )*};
}

macro_rules! impl_float_key {
    ($($t:ty => $u:ty),* $(,)?) => {$(
        /// IEEE 754: sign-magnitude. Flipping every bit of a negative value
        /// reverses its magnitude order and places it below all non-negative
        /// values, whose sign bit is set instead.
        impl RadixKey for $t {
            const BITS: u32 = <$u>::BITS;

            #[inline]
            fn to_radix_bits(self) -> u64 {
                if self.is_nan() {
                    return <$u>::MAX as u64;
                }
                let sign: $u = 1 << (<$u>::BITS - 1);
                // -0.0 == +0.0
                let bits = if self == 0.0 { 0 } else { self.to_bits() };
                let mask = if bits & sign != 0 { <$u>::MAX } else { sign };
                (bits ^ mask) as u64
            }
        }
    )*};
}

impl_unsigned_key!(u8, u16, u32, u64);
impl_signed_key!(i8 => u8, i16 => u16, i32 => u32, i64 => u64);
impl_float_key!(f32 => u32, f64 => u64);
