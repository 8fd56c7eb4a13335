//! End-to-end sweep of the sort entry points against the host reference.
//!
//! Every case runs over several seeds and the sizes from
//! [`get_sizes`](crate::test_utils::get_sizes), alternating in-place and
//! out-of-place sorts, and compares the output bit for bit. Full-range cases
//! are additionally checked against the natural order of the key type.

use radix_device::Device;

use crate::config::KernelConfig;
use crate::device_sort::DeviceRadixSort;
use crate::digit::{BitRange, SortOrder};
use crate::test_utils::{
    assert_bit_eq, get_sizes, natural_sort_reference, random_keys, sort_on_device,
    stable_sort_reference, RandomKey,
};

const SEEDS: [u64; 2] = [0, 0x9e37_79b9];

fn run_sort_keys<K: RandomKey>(order: SortOrder, bits: BitRange) {
    let device = Device::host();
    let engine = DeviceRadixSort::builder()
        .radix_bits(8)
        .scan_config(KernelConfig::new(256, 3))
        .sort_config(KernelConfig::new(256, 8))
        .debug_synchronous(false)
        .build()
        .expect("tested configuration should be valid");

    let full_range = bits == BitRange::full::<K>();
    let mut in_place = false;
    for seed in SEEDS {
        for size in get_sizes(seed) {
            in_place = !in_place;
            let keys: Vec<K> = random_keys(size, seed);
            let expected = stable_sort_reference(&keys, bits, order);

            let output = sort_on_device(&engine, &device, &keys, bits, order, in_place)
                .unwrap_or_else(|e| panic!("seed {seed} size {size}: {e:#}"));

            #[cfg(feature = "test-verbose")]
            eprintln!(
                "{} {order:?} [{}, {}) seed={seed} size={size} in_place={in_place}",
                std::any::type_name::<K>(),
                bits.start_bit(),
                bits.end_bit()
            );

            assert_bit_eq(&output, &expected);
            if full_range {
                assert_bit_eq(&output, &natural_sort_reference(&keys, order));
            }
        }
    }
    assert_eq!(device.memory_in_use(), 0);
}

macro_rules! sort_keys_cases {
    ($($name:ident: $key:ty, $order:ident, $start:expr, $end:expr;)*) => {$(
        #[test]
        fn $name() {
            run_sort_keys::<$key>(SortOrder::$order, BitRange::new($start, $end));
        }
    )*};
}

sort_keys_cases! {
    sort_keys_u8: u8, Ascending, 0, 8;
    sort_keys_i8_descending: i8, Descending, 0, 8;
    sort_keys_u16_partial: u16, Ascending, 3, 11;
    sort_keys_i16_descending: i16, Descending, 0, 16;
    sort_keys_u32: u32, Ascending, 0, 32;
    sort_keys_u32_descending: u32, Descending, 0, 32;
    sort_keys_u32_single_bit: u32, Ascending, 0, 1;
    sort_keys_i32_partial_descending: i32, Descending, 7, 31;
    sort_keys_u64_partial: u64, Ascending, 4, 10;
    sort_keys_i64: i64, Ascending, 0, 64;
    sort_keys_u64_top_bit_descending: u64, Descending, 63, 64;
    sort_keys_f32: f32, Ascending, 0, 32;
    sort_keys_f32_descending: f32, Descending, 0, 32;
    sort_keys_f64: f64, Ascending, 0, 64;
    sort_keys_f64_descending_partial: f64, Descending, 20, 64;
}
