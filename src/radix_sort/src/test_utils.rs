//! Test utilities for the radix sort engine.
//!
//! Provides seeded key generators (including IEEE special values for
//! floats), the input sizes the conformance sweep runs, host-side stable
//! reference sorts, bit-exact comparison and a device round-trip harness.
//!
//! There are two references. [`stable_sort_reference`] compares the bits of
//! a range of each key's radix encoding, so it can check partial bit ranges.
//! [`natural_sort_reference`] compares keys by value and never encodes
//! them, so a wrong encoding cannot hide behind it.

use std::cmp::Ordering;

use anyhow::{ensure, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use radix_device::Device;

use crate::device_sort::DeviceRadixSort;
use crate::digit::{BitRange, SortOrder};
use crate::key::RadixKey;

/// Keys that can be generated for tests.
pub trait RandomKey: RadixKey {
    /// `len` random keys. Integers cover their full range, floats `[-1000, 1000]`.
    fn random_vec(len: usize, rng: &mut StdRng) -> Vec<Self>;

    /// Values worth planting in every input (signed zeros, infinities, NaNs).
    fn special_values() -> Vec<Self> {
        Vec::new()
    }

    /// Order by value: `Ord` for integers; for floats `-0.0 == +0.0` and every
    /// NaN equal to every other NaN and above `+inf`.
    fn natural_cmp(&self, other: &Self) -> Ordering;
}

macro_rules! impl_random_int {
    ($($t:ty),*) => {$(
        impl RandomKey for $t {
            fn random_vec(len: usize, rng: &mut StdRng) -> Vec<Self> {
                (0..len).map(|_| rng.gen::<$t>()).collect()
            }

            fn natural_cmp(&self, other: &Self) -> Ordering {
                self.cmp(other)
            }
        }
    )*};
}

macro_rules! impl_random_float {
    ($($t:ident),*) => {$(
        impl RandomKey for $t {
            fn random_vec(len: usize, rng: &mut StdRng) -> Vec<Self> {
                let dist = Uniform::new_inclusive(-1000.0 as $t, 1000.0 as $t);
                (0..len).map(|_| dist.sample(rng)).collect()
            }

            fn special_values() -> Vec<Self> {
                vec![
                    0.0,
                    -0.0,
                    $t::INFINITY,
                    $t::NEG_INFINITY,
                    $t::NAN,
                    -$t::NAN,
                    $t::MIN_POSITIVE,
                    -$t::MIN_POSITIVE,
                    $t::MAX,
                    $t::MIN,
                ]
            }

            fn natural_cmp(&self, other: &Self) -> Ordering {
                match (self.is_nan(), other.is_nan()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    // -0.0 and +0.0 compare equal.
                    (false, false) => self.partial_cmp(other).unwrap_or(Ordering::Equal),
                }
            }
        }
    )*};
}

impl_random_int!(u8, i8, u16, i16, u32, i32, u64, i64);
impl_random_float!(f32, f64);

/// `len` keys from a generator seeded with `seed`, with the special values of
/// `K` planted at random positions.
pub fn random_keys<K: RandomKey>(len: usize, seed: u64) -> Vec<K> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut keys = K::random_vec(len, &mut rng);
    add_special_values(&mut keys, seed);
    keys
}

/// Overwrite distinct random positions of `keys` with `K::special_values()`.
///
/// Inputs not longer than the special value list are left unchanged.
pub fn add_special_values<K: RandomKey>(keys: &mut [K], seed: u64) {
    let specials = K::special_values();
    if keys.len() <= specials.len() {
        return;
    }
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed_5eed);
    let positions = rand::seq::index::sample(&mut rng, keys.len(), specials.len());
    for (index, value) in positions.iter().zip(specials) {
        keys[index] = value;
    }
}

/// Input sizes for one seed: edge cases and tile boundaries of the default
/// configuration, plus three random sizes. Sorted ascending.
pub fn get_sizes(seed: u64) -> Vec<usize> {
    let mut sizes = vec![
        0,
        1,
        10,
        53,
        211,
        1024,
        2047,
        2048,
        2049,
        2345,
        4096,
        34_567,
        (1 << 16) - 1220,
    ];
    let mut rng = StdRng::seed_from_u64(seed);
    sizes.extend((0..3).map(|_| rng.gen_range(1..=100_000)));
    sizes.sort_unstable();
    sizes
}

/// Host stable sort comparing only the bits of `bits` of each key's radix
/// encoding.
pub fn stable_sort_reference<K: RadixKey>(keys: &[K], bits: BitRange, order: SortOrder) -> Vec<K> {
    let width = bits.width();
    let mask = if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    };
    let key = |k: &K| (k.to_radix_bits() >> bits.start_bit()) & mask;

    let mut sorted = keys.to_vec();
    match order {
        SortOrder::Ascending => sorted.sort_by_key(key),
        SortOrder::Descending => sorted.sort_by(|a, b| key(b).cmp(&key(a))),
    }
    sorted
}

/// Host stable sort of whole keys by [`RandomKey::natural_cmp`].
pub fn natural_sort_reference<K: RandomKey>(keys: &[K], order: SortOrder) -> Vec<K> {
    let mut sorted = keys.to_vec();
    match order {
        SortOrder::Ascending => sorted.sort_by(|a, b| a.natural_cmp(b)),
        SortOrder::Descending => sorted.sort_by(|a, b| b.natural_cmp(a)),
    }
    sorted
}

/// Index of the first key whose bytes differ, if any.
pub fn first_bit_mismatch<K: RadixKey>(actual: &[K], expected: &[K]) -> Option<usize> {
    if actual.len() != expected.len() {
        return Some(actual.len().min(expected.len()));
    }
    actual
        .iter()
        .zip(expected)
        .position(|(a, e)| bytemuck::bytes_of(a) != bytemuck::bytes_of(e))
}

/// Assert two key slices are bit-for-bit identical (NaN payloads and the
/// sign of zero included).
pub fn assert_bit_eq<K: RadixKey>(actual: &[K], expected: &[K]) {
    if let Some(index) = first_bit_mismatch(actual, expected) {
        panic!(
            "keys differ at index {index} (lengths {} and {}): {:?} != {:?}",
            actual.len(),
            expected.len(),
            actual.get(index),
            expected.get(index)
        );
    }
}

/// Upload `keys`, sort them on a fresh stream of `device` and download the
/// result.
///
/// In-place sorts run on the uploaded buffer; out-of-place sorts write a
/// separate output buffer and leave the upload untouched.
pub fn sort_on_device<K: RadixKey>(
    engine: &DeviceRadixSort,
    device: &Device,
    keys: &[K],
    bits: BitRange,
    order: SortOrder,
    in_place: bool,
) -> Result<Vec<K>> {
    let n = keys.len();
    let stream = device.create_stream();

    let bytes = engine
        .temporary_storage_bytes::<K>(n, bits)
        .context("temporary storage query failed")?;
    ensure!(bytes > 0, "temporary storage requirement must be positive");
    let mut temp = device
        .alloc_temporary(bytes)
        .context("failed to allocate temporary storage")?;
    let mut input = device.upload(keys).context("failed to upload keys")?;

    if in_place {
        let keys = input.as_mut_slice();
        match order {
            SortOrder::Ascending => engine.sort_keys_in_place(&stream, &mut temp, keys, n, bits),
            SortOrder::Descending => {
                engine.sort_keys_descending_in_place(&stream, &mut temp, keys, n, bits)
            }
        }
        .context("in-place sort failed")?;
        stream.synchronize()?;
        return Ok(input.to_host());
    }

    let mut output = device.alloc::<K>(n).context("failed to allocate output")?;
    let (src, dst) = (input.as_slice(), output.as_mut_slice());
    match order {
        SortOrder::Ascending => engine.sort_keys(&stream, &mut temp, src, dst, n, bits),
        SortOrder::Descending => engine.sort_keys_descending(&stream, &mut temp, src, dst, n, bits),
    }
    .context("sort failed")?;
    stream.synchronize()?;

    ensure!(
        first_bit_mismatch(input.as_slice(), keys).is_none(),
        "out-of-place sort modified its input"
    );
    Ok(output.to_host())
}
