//! CubeCL kernels of one radix sort pass.
//!
//! Keys live on the device as their radix encodings split into two `u32`
//! arrays (`codes_lo` holds bits 0..32, `codes_hi` bits 32..64; zero for
//! keys of 32 bits or less), plus the index of each key in the caller's
//! input. The scatter moves all three, so the host can gather the original
//! keys bit for bit once the last pass is done.
//!
//! Launch shapes match the host-emulated kernels in [`crate::kernels`]: one
//! cube per tile of `block_size * items_per_thread` items, thread `t` owning
//! the blocked items `[t * ipt, (t + 1) * ipt)` of its tile.

use cubecl::prelude::*;

/// Digit of an encoded key for the window starting at `start_bit`.
///
/// `mask` is `2^bits - 1`; descending order inverts the digit.
#[cube]
pub fn window_digit(lo: u32, hi: u32, start_bit: u32, mask: u32, descending: u32) -> u32 {
    let mut bits = lo;
    if start_bit >= 32u32 {
        bits = hi >> (start_bit - 32u32);
    } else {
        if start_bit > 0u32 {
            bits = (lo >> start_bit) | (hi << (32u32 - start_bit));
        }
    }

    let mut digit = bits & mask;
    if descending == 1u32 {
        digit = mask - digit;
    }
    digit
}

/// Per-tile digit counts into the bucket-major table `histogram[b * tiles + tile]`.
#[cube(launch_unchecked)]
pub fn radix_histogram_kernel(
    codes_lo: &Array<u32>,
    codes_hi: &Array<u32>,
    num_keys: u32,
    start_bit: u32,
    descending: u32,
    tiles: u32,
    histogram: &mut Array<u32>,
    #[comptime] radix_size: u32,
    #[comptime] items_per_thread: u32,
) {
    let tile = CUBE_POS_X;
    let tid = UNIT_POS_X;
    let mask = radix_size - 1;

    let mut counts = SharedMemory::<Atomic<u32>>::new(radix_size);
    let mut bucket = tid;
    while bucket < radix_size {
        Atomic::store(&counts[bucket], 0u32);
        bucket += CUBE_DIM_X;
    }
    sync_cube();

    let thread_start = (tile * CUBE_DIM_X + tid) * items_per_thread;
    for i in 0..items_per_thread {
        let idx = thread_start + i;
        if idx < num_keys {
            let digit = window_digit(codes_lo[idx], codes_hi[idx], start_bit, mask, descending);
            Atomic::add(&counts[digit], 1u32);
        }
    }
    sync_cube();

    // Column `tile` of the table belongs to this cube only
    let mut out_bucket = tid;
    while out_bucket < radix_size {
        histogram[out_bucket * tiles + tile] = Atomic::load(&counts[out_bucket]);
        out_bucket += CUBE_DIM_X;
    }
}

/// Exclusive scan of one tile of `input`; the tile total goes to `partials[tile]`.
#[cube(launch_unchecked)]
pub fn radix_scan_tiles_kernel(
    input: &Array<u32>,
    num_values: u32,
    output: &mut Array<u32>,
    partials: &mut Array<u32>,
    #[comptime] block_size: u32,
    #[comptime] items_per_thread: u32,
) {
    let tile = CUBE_POS_X;
    let tid = UNIT_POS_X;
    let thread_start = (tile * block_size + tid) * items_per_thread;

    let mut thread_totals = SharedMemory::<u32>::new(block_size);
    let mut total = 0u32;
    for i in 0..items_per_thread {
        let idx = thread_start + i;
        if idx < num_values {
            total += input[idx];
        }
    }
    thread_totals[tid] = total;
    sync_cube();

    if tid == 0u32 {
        let mut running = 0u32;
        for t in 0..block_size {
            let value = thread_totals[t];
            thread_totals[t] = running;
            running += value;
        }
        partials[tile] = running;
    }
    sync_cube();

    let mut sum = thread_totals[tid];
    for i in 0..items_per_thread {
        let idx = thread_start + i;
        if idx < num_values {
            let value = input[idx];
            output[idx] = sum;
            sum += value;
        }
    }
}

/// Exclusive scan of the tile totals. Launched as a single unit.
#[cube(launch_unchecked)]
pub fn radix_scan_partials_kernel(partials: &mut Array<u32>, tiles: u32) {
    if UNIT_POS_X == 0u32 {
        let mut running = 0u32;
        for t in 0..tiles {
            let value = partials[t];
            partials[t] = running;
            running += value;
        }
    }
}

/// Add the scanned tile totals to every value of their tile.
#[cube(launch_unchecked)]
pub fn radix_scan_add_partials_kernel(
    partials: &Array<u32>,
    num_values: u32,
    output: &mut Array<u32>,
    #[comptime] items_per_thread: u32,
) {
    let tile = CUBE_POS_X;
    let prefix = partials[tile];
    let thread_start = (tile * CUBE_DIM_X + UNIT_POS_X) * items_per_thread;
    for i in 0..items_per_thread {
        let idx = thread_start + i;
        if idx < num_values {
            output[idx] += prefix;
        }
    }
}

/// Stable scatter of codes and indices to their global digit offsets.
///
/// A key's rank is the number of keys with the same digit before it in the
/// tile, so ties keep their input order within the tile; the bucket-major
/// offsets keep it across tiles.
#[cube(launch_unchecked)]
pub fn radix_scatter_kernel(
    codes_lo: &Array<u32>,
    codes_hi: &Array<u32>,
    indices: &Array<u32>,
    offsets: &Array<u32>,
    num_keys: u32,
    start_bit: u32,
    descending: u32,
    tiles: u32,
    out_lo: &mut Array<u32>,
    out_hi: &mut Array<u32>,
    out_indices: &mut Array<u32>,
    #[comptime] radix_size: u32,
    #[comptime] tile_size: u32,
    #[comptime] items_per_thread: u32,
) {
    let tile = CUBE_POS_X;
    let tid = UNIT_POS_X;
    let mask = radix_size - 1;
    let tile_start = tile * tile_size;

    let mut digits = SharedMemory::<u32>::new(tile_size);
    for i in 0..items_per_thread {
        let local = tid * items_per_thread + i;
        let idx = tile_start + local;
        // Past every bucket, so tail slots never match
        let mut digit = radix_size;
        if idx < num_keys {
            digit = window_digit(codes_lo[idx], codes_hi[idx], start_bit, mask, descending);
        }
        digits[local] = digit;
    }
    sync_cube();

    for i in 0..items_per_thread {
        let local = tid * items_per_thread + i;
        let idx = tile_start + local;
        if idx < num_keys {
            let digit = digits[local];
            let mut rank = 0u32;
            for j in 0..local {
                if digits[j] == digit {
                    rank += 1u32;
                }
            }

            let pos = offsets[digit * tiles + tile] + rank;
            out_lo[pos] = codes_lo[idx];
            out_hi[pos] = codes_hi[idx];
            out_indices[pos] = indices[idx];
        }
    }
}

