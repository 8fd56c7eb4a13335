//! Device-wide exclusive prefix sum of `u32` values.
//!
//! Computes global digit offsets from the bucket-major histogram table. The
//! scan runs as three launches so no block ever waits on another:
//!
//! 1. `radix_scan_tiles`: each block scans its tile and stores the tile total
//!    in `partials[tile]`
//! 2. `radix_scan_partials`: a single block exclusive-scans `partials`
//! 3. `radix_scan_add_partials`: each block adds `partials[tile]` to its tile
//!
//! All sums fit in `u32` because the table counts at most `u32::MAX` keys.

use radix_device::{BlockContext, DeviceError, LaunchConfig, Result, SharedSlice};

use super::KernelLauncher;
use crate::config::KernelConfig;

/// Exclusive prefix sum on the host.
pub fn exclusive_scan_cpu(input: &[u32]) -> Vec<u32> {
    let mut sum = 0u32;
    input
        .iter()
        .map(|&v| {
            let prefix = sum;
            sum += v;
            prefix
        })
        .collect()
}

/// Launch the three-kernel exclusive scan of `input` into `output`.
///
/// # Arguments
/// * `launcher` - Stream the kernels are issued to
/// * `input` - Values to scan
/// * `output` - Receives the exclusive scan, same length as `input`
/// * `partials` - One slot per scan tile
/// * `config` - Block shape; a tile holds `block_size * items_per_thread` values
pub fn launch_exclusive_scan(
    launcher: &KernelLauncher<'_>,
    input: &[u32],
    output: &mut [u32],
    partials: &mut [u32],
    config: KernelConfig,
) -> Result<()> {
    if input.len() != output.len() {
        return Err(DeviceError::SizeMismatch {
            expected: output.len(),
            actual: input.len(),
        });
    }
    let tile_size = config.tile_size();
    let tiles = input.len().div_ceil(tile_size);
    if tiles == 0 {
        return Ok(());
    }
    if partials.len() < tiles {
        return Err(DeviceError::SizeMismatch {
            expected: tiles,
            actual: partials.len(),
        });
    }

    let ipt = config.items_per_thread as usize;
    let grid = LaunchConfig::for_items(input.len(), tile_size, config.block_size)?;
    let n = input.len();
    let tile_range = move |tile: usize| tile * tile_size..n.min((tile + 1) * tile_size);

    let out = SharedSlice::new(output);
    let totals = SharedSlice::new(&mut partials[..tiles]);

    launcher.launch("radix_scan_tiles", grid, |block| {
        let tile = block.block_idx as usize;
        let range = tile_range(tile);
        // SAFETY: tiles are disjoint and tile `tile` belongs to this block.
        let values = unsafe { out.range_mut(range.clone())? };
        values.copy_from_slice(&input[range]);
        let total = block_exclusive_scan(values, &block, ipt, 0);
        // SAFETY: one partial per block.
        unsafe { totals.write(tile, total) }
    })?;

    launcher.launch(
        "radix_scan_partials",
        LaunchConfig::new(1, config.block_size),
        |block| {
            // SAFETY: the grid has a single block.
            let values = unsafe { totals.range_mut(0..tiles)? };
            let mut carry = 0;
            for chunk in values.chunks_mut(tile_size) {
                carry = block_exclusive_scan(chunk, &block, ipt, carry);
            }
            Ok(())
        },
    )?;

    launcher.launch("radix_scan_add_partials", grid, |block| {
        let tile = block.block_idx as usize;
        // SAFETY: this block only reads its own partial.
        let prefix = unsafe { totals.read(tile)? };
        if prefix == 0 {
            return Ok(());
        }
        // SAFETY: as in `radix_scan_tiles`.
        let values = unsafe { out.range_mut(tile_range(tile))? };
        for thread in block.threads() {
            for i in block.thread_items(thread, ipt, values.len()) {
                values[i] += prefix;
            }
        }
        Ok(())
    })
}

/// Cooperative exclusive scan of one tile held by `block`, in place.
///
/// Thread `t` owns the blocked items `[t * ipt, (t + 1) * ipt)`. Each thread
/// reduces its items, the thread totals are scanned (seeded with `carry`),
/// then each thread scans its items from its own prefix. Returns `carry` plus
/// the tile total.
fn block_exclusive_scan(values: &mut [u32], block: &BlockContext, ipt: usize, carry: u32) -> u32 {
    let len = values.len();

    let mut thread_prefix = vec![0u32; block.block_dim as usize];
    for thread in block.threads() {
        thread_prefix[thread as usize] = values[block.thread_items(thread, ipt, len)].iter().sum();
    }

    let mut running = carry;
    for prefix in thread_prefix.iter_mut() {
        let total = *prefix;
        *prefix = running;
        running += total;
    }

    for thread in block.threads() {
        let mut sum = thread_prefix[thread as usize];
        for value in &mut values[block.thread_items(thread, ipt, len)] {
            let v = *value;
            *value = sum;
            sum += v;
        }
    }
    running
}
