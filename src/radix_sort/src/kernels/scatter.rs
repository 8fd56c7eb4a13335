//! Stable scatter of keys to their global digit offsets.
//!
//! One block per tile, using the same tiling as the histogram kernel. The
//! block ranks its keys per bucket in blocked (input) order: thread `t`
//! starts bucket `b` at `offsets[b * tiles + tile]` plus the number of `b`
//! keys owned by threads `0..t`, then writes its own keys in order. Ties
//! therefore keep their input order, across tiles as well as within one.

use radix_device::{DeviceError, LaunchConfig, Result, SharedSlice};

use super::KernelLauncher;
use crate::config::KernelConfig;
use crate::digit::{extract_digit, DigitWindow, SortOrder};
use crate::key::RadixKey;

/// One stable counting-sort pass on the host.
pub fn sort_pass_cpu<K: RadixKey>(keys: &[K], window: DigitWindow, order: SortOrder) -> Vec<K> {
    let digit = |key: &K| extract_digit(key.to_radix_bits(), window, order) as usize;

    let mut offsets = vec![0usize; window.radix_size()];
    for key in keys {
        offsets[digit(key)] += 1;
    }
    let mut sum = 0;
    for offset in offsets.iter_mut() {
        let count = *offset;
        *offset = sum;
        sum += count;
    }

    let mut out = vec![K::zeroed(); keys.len()];
    for key in keys {
        let d = digit(key);
        out[offsets[d]] = *key;
        offsets[d] += 1;
    }
    out
}

/// Launch the scatter kernel.
///
/// # Arguments
/// * `launcher` - Stream the kernel is issued to
/// * `keys` - Keys of the pass
/// * `window` - Digit window of the pass
/// * `order` - Sort order, as given to the histogram kernel
/// * `config` - Block shape; must match the histogram launch
/// * `offsets` - Exclusive scan of the bucket-major histogram table
/// * `output` - Destination, at least `keys.len()` long
pub fn launch_scatter<K: RadixKey>(
    launcher: &KernelLauncher<'_>,
    keys: &[K],
    window: DigitWindow,
    order: SortOrder,
    config: KernelConfig,
    offsets: &[u32],
    output: &mut [K],
) -> Result<()> {
    let tile_size = config.tile_size();
    let tiles = keys.len().div_ceil(tile_size);
    if tiles == 0 {
        return Ok(());
    }
    let radix_size = window.radix_size();
    if offsets.len() < radix_size * tiles {
        return Err(DeviceError::SizeMismatch {
            expected: radix_size * tiles,
            actual: offsets.len(),
        });
    }

    let launch = LaunchConfig::for_items(keys.len(), tile_size, config.block_size)?;
    let ipt = config.items_per_thread as usize;
    let block_dim = config.block_size as usize;
    let out = SharedSlice::new(output);

    launcher.launch("radix_scatter", launch, |block| {
        let tile = block.block_idx as usize;
        let tile_start = tile * tile_size;
        let tile_keys = &keys[tile_start..keys.len().min(tile_start + tile_size)];

        // Load digits.
        let mut digits = vec![0u32; tile_keys.len()];
        for thread in block.threads() {
            for i in block.thread_items(thread, ipt, tile_keys.len()) {
                digits[i] = extract_digit(tile_keys[i].to_radix_bits(), window, order);
            }
        }

        // Per-thread bucket counts, bucket-major.
        let mut ranks = vec![0u32; radix_size * block_dim];
        for thread in block.threads() {
            for i in block.thread_items(thread, ipt, tile_keys.len()) {
                ranks[digits[i] as usize * block_dim + thread as usize] += 1;
            }
        }

        // Exclusive scan across threads, seeded with the tile's global offset.
        for (bucket, row) in ranks.chunks_mut(block_dim).enumerate() {
            let mut running = offsets[bucket * tiles + tile];
            for rank in row.iter_mut() {
                let count = *rank;
                *rank = running;
                running += count;
            }
        }

        for thread in block.threads() {
            for i in block.thread_items(thread, ipt, tile_keys.len()) {
                let slot = &mut ranks[digits[i] as usize * block_dim + thread as usize];
                // SAFETY: offsets partition [0, n), so every destination is
                // written by exactly one thread of the grid.
                unsafe { out.write(*slot as usize, tile_keys[i])? };
                *slot += 1;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{exclusive_scan_cpu, histogram_cpu};
    use radix_device::Device;

    fn scatter_on_device<K: RadixKey>(
        keys: &[K],
        window: DigitWindow,
        order: SortOrder,
        config: KernelConfig,
    ) -> Vec<K> {
        let device = Device::host();
        let stream = device.create_stream();
        let launcher = KernelLauncher::new(&stream, false);

        let table = histogram_cpu(keys, window, order, config.tile_size());
        let offsets = exclusive_scan_cpu(&table);
        let mut output = vec![K::zeroed(); keys.len()];
        launch_scatter(&launcher, keys, window, order, config, &offsets, &mut output).unwrap();
        stream.synchronize().unwrap();
        output
    }

    #[test]
    fn test_sort_pass_cpu_is_stable() {
        let window = DigitWindow {
            start_bit: 0,
            bits: 4,
        };
        // High nibble tags the input position.
        let keys = [0x03u8, 0x11, 0x23, 0x31, 0x40];
        assert_eq!(
            sort_pass_cpu(&keys, window, SortOrder::Ascending),
            vec![0x40, 0x11, 0x31, 0x03, 0x23]
        );
        assert_eq!(
            sort_pass_cpu(&keys, window, SortOrder::Descending),
            vec![0x03, 0x23, 0x11, 0x31, 0x40]
        );
    }

    #[test]
    fn test_scatter_gpu_vs_cpu() {
        let keys: Vec<u64> = (0..3000u64)
            .map(|i| i.wrapping_mul(0x9e37_79b9_7f4a_7c15))
            .collect();
        let window = DigitWindow {
            start_bit: 56,
            bits: 5,
        };
        for config in [KernelConfig::new(16, 4), KernelConfig::new(7, 3)] {
            for order in [SortOrder::Ascending, SortOrder::Descending] {
                assert_eq!(
                    scatter_on_device(&keys, window, order, config),
                    sort_pass_cpu(&keys, window, order)
                );
            }
        }
    }

    #[test]
    fn test_scatter_keeps_ties_across_tiles() {
        // Digit 0 everywhere: the pass must be the identity.
        let keys: Vec<u32> = (0..100u32).map(|i| i << 8).collect();
        let window = DigitWindow {
            start_bit: 0,
            bits: 8,
        };
        let out = scatter_on_device(&keys, window, SortOrder::Ascending, KernelConfig::new(4, 3));
        assert_eq!(out, keys);
    }

    #[test]
    fn test_scatter_bad_offsets_fault() {
        let device = Device::host();
        let stream = device.create_stream();
        let launcher = KernelLauncher::new(&stream, false);
        let window = DigitWindow {
            start_bit: 0,
            bits: 1,
        };

        let keys = [1u8, 0];
        let offsets = [5u32, 0];
        let mut output = [0u8; 2];
        launch_scatter(
            &launcher,
            &keys,
            window,
            SortOrder::Ascending,
            KernelConfig::new(2, 1),
            &offsets,
            &mut output,
        )
        .unwrap();
        assert_eq!(
            stream.synchronize().unwrap_err(),
            DeviceError::IllegalAddress { index: 5, len: 2 }
        );
    }
}
