//! Per-tile digit histogram.
//!
//! One block per tile of `block_size * items_per_thread` keys. Each block
//! counts the digits of its keys into a block-local histogram and writes it
//! as its column of the bucket-major table: `table[bucket * tiles + tile]`.

use radix_device::{DeviceError, LaunchConfig, Result, SharedSlice};

use super::KernelLauncher;
use crate::config::KernelConfig;
use crate::digit::{extract_digit, DigitWindow, SortOrder};
use crate::key::RadixKey;

/// Bucket-major histogram table computed on the host.
///
/// # Arguments
/// * `keys` - Keys of the pass
/// * `window` - Digit window of the pass
/// * `order` - Sort order (descending inverts buckets)
/// * `tile_size` - Keys per tile
///
/// # Returns
/// `2^window.bits * tiles` counts, indexed `bucket * tiles + tile`.
pub fn histogram_cpu<K: RadixKey>(
    keys: &[K],
    window: DigitWindow,
    order: SortOrder,
    tile_size: usize,
) -> Vec<u32> {
    let tiles = keys.len().div_ceil(tile_size);
    let mut table = vec![0u32; window.radix_size() * tiles];
    for (tile, chunk) in keys.chunks(tile_size).enumerate() {
        for &key in chunk {
            let digit = extract_digit(key.to_radix_bits(), window, order) as usize;
            table[digit * tiles + tile] += 1;
        }
    }
    table
}

/// Launch the histogram kernel.
///
/// `histogram` must hold at least `2^window.bits * tiles` entries; only that
/// prefix is written. Nothing is launched for an empty key slice.
pub fn launch_histogram<K: RadixKey>(
    launcher: &KernelLauncher<'_>,
    keys: &[K],
    window: DigitWindow,
    order: SortOrder,
    config: KernelConfig,
    histogram: &mut [u32],
) -> Result<()> {
    let tile_size = config.tile_size();
    let tiles = keys.len().div_ceil(tile_size);
    if tiles == 0 {
        return Ok(());
    }
    let radix_size = window.radix_size();
    let cells = radix_size * tiles;
    if histogram.len() < cells {
        return Err(DeviceError::SizeMismatch {
            expected: cells,
            actual: histogram.len(),
        });
    }

    let launch = LaunchConfig::for_items(keys.len(), tile_size, config.block_size)?;
    let ipt = config.items_per_thread as usize;
    let table = SharedSlice::new(&mut histogram[..cells]);

    launcher.launch("radix_histogram", launch, |block| {
        let tile = block.block_idx as usize;
        let tile_start = tile * tile_size;
        let tile_keys = &keys[tile_start..keys.len().min(tile_start + tile_size)];

        // Block-shared counters.
        let mut counts = vec![0u32; radix_size];
        for thread in block.threads() {
            for i in block.thread_items(thread, ipt, tile_keys.len()) {
                let digit = extract_digit(tile_keys[i].to_radix_bits(), window, order);
                counts[digit as usize] += 1;
            }
        }

        for (bucket, &count) in counts.iter().enumerate() {
            // SAFETY: column `tile` of the table belongs to this block only.
            unsafe { table.write(bucket * tiles + tile, count)? };
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use radix_device::Device;

    const WINDOW: DigitWindow = DigitWindow {
        start_bit: 0,
        bits: 4,
    };

    #[test]
    fn test_histogram_cpu_layout() {
        let keys = [1u8, 2, 1, 15, 2, 2];
        let table = histogram_cpu(&keys, WINDOW, SortOrder::Ascending, 4);
        // Two tiles: [1, 2, 1, 15] and [2, 2]; cell = bucket * 2 + tile.
        assert_eq!(table.len(), 32);
        assert_eq!(table[2], 2);
        assert_eq!(table[4], 1);
        assert_eq!(table[5], 2);
        assert_eq!(table[30], 1);
        assert_eq!(table.iter().sum::<u32>(), 6);
    }

    #[test]
    fn test_histogram_descending_inverts_buckets() {
        let keys = [0u16, 0, 3];
        let table = histogram_cpu(&keys, WINDOW, SortOrder::Descending, 8);
        assert_eq!(table[15], 2);
        assert_eq!(table[12], 1);
    }

    #[test]
    fn test_histogram_gpu_vs_cpu() {
        let device = Device::host();
        let stream = device.create_stream();
        let launcher = KernelLauncher::new(&stream, false);
        let config = KernelConfig::new(16, 3);

        let keys: Vec<u32> = (0..1000u32).map(|i| i.wrapping_mul(2_654_435_761)).collect();
        let window = DigitWindow {
            start_bit: 8,
            bits: 6,
        };
        for order in [SortOrder::Ascending, SortOrder::Descending] {
            let expected = histogram_cpu(&keys, window, order, config.tile_size());
            let mut table = vec![u32::MAX; expected.len() + 5];
            launch_histogram(&launcher, &keys, window, order, config, &mut table).unwrap();
            stream.synchronize().unwrap();
            assert_eq!(&table[..expected.len()], &expected[..]);
            assert!(table[expected.len()..].iter().all(|&v| v == u32::MAX));
        }
    }

    #[test]
    fn test_histogram_partial_tile() {
        let device = Device::host();
        let stream = device.create_stream();
        let launcher = KernelLauncher::new(&stream, false);
        let config = KernelConfig::new(4, 2);

        let keys = [7i8, -1, 7, 0, 7];
        let expected = histogram_cpu(&keys, WINDOW, SortOrder::Ascending, 8);
        let mut table = vec![0u32; 16];
        launch_histogram(&launcher, &keys, WINDOW, SortOrder::Ascending, config, &mut table)
            .unwrap();
        stream.synchronize().unwrap();
        assert_eq!(table, expected);
        assert_eq!(table[7], 3);
    }

    #[test]
    fn test_histogram_empty_and_short_table() {
        let device = Device::host();
        let stream = device.create_stream();
        let launcher = KernelLauncher::new(&stream, false);
        let config = KernelConfig::new(4, 2);

        let mut table = vec![0u32; 16];
        launch_histogram::<u32>(&launcher, &[], WINDOW, SortOrder::Ascending, config, &mut table)
            .unwrap();
        assert_eq!(stream.launch_count(), 0);

        let keys = [0u32; 9];
        let err = launch_histogram(&launcher, &keys, WINDOW, SortOrder::Ascending, config, &mut table)
            .unwrap_err();
        assert_eq!(
            err,
            DeviceError::SizeMismatch {
                expected: 32,
                actual: 16
            }
        );
    }
}
