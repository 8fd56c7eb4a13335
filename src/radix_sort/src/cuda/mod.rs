//! CUDA backend: the radix sort pass pipeline as CubeCL kernels.
//!
//! Runs the same histogram, three-kernel scan and scatter cycle as
//! [`DeviceRadixSort`](crate::DeviceRadixSort), configured by the same
//! [`RadixSortConfig`] and planned by the same [`PassPlan`], on a CUDA device
//! through `cubecl::cuda`. The host-emulated device remains the default
//! backend and the test oracle.
//!
//! # Example
//!
//! ```ignore
//! use radix_sort::cuda::CudaRadixSort;
//! use radix_sort::{BitRange, RadixSortConfig, SortOrder};
//!
//! let sorter = CudaRadixSort::new(RadixSortConfig::default())?;
//! let sorted = sorter.sort_keys(&keys, BitRange::full::<f32>(), SortOrder::Descending)?;
//! ```

pub mod kernels;

use cubecl::client::ComputeClient;
use cubecl::cuda::{CudaDevice, CudaRuntime};
use cubecl::prelude::*;
use cubecl::server::Handle;

use crate::config::RadixSortConfig;
use crate::digit::{BitRange, SortOrder};
use crate::error::{InvalidArgument, Result};
use crate::key::RadixKey;
use crate::plan::{PassPlan, Placement};
use crate::timing::{PassPhase, SortTiming, SortTimingCollector};

use kernels::{
    radix_histogram_kernel, radix_scan_add_partials_kernel, radix_scan_partials_kernel,
    radix_scan_tiles_kernel, radix_scatter_kernel,
};

/// Type alias for CUDA compute client.
type CudaClient = ComputeClient<<CudaRuntime as Runtime>::Server>;

/// Check whether a CUDA device can be opened.
pub fn is_cuda_available() -> bool {
    std::panic::catch_unwind(|| {
        let _device = CudaDevice::new(0);
    })
    .is_ok()
}

/// Split radix encodings into low and high 32-bit halves.
pub fn split_codes<K: RadixKey>(keys: &[K]) -> (Vec<u32>, Vec<u32>) {
    keys.iter()
        .map(|key| {
            let code = key.to_radix_bits();
            (code as u32, (code >> 32) as u32)
        })
        .unzip()
}

/// Device buffers of one key set: encoded halves plus input indices.
struct KeyHandles {
    lo: Handle,
    hi: Handle,
    indices: Handle,
}

impl KeyHandles {
    fn empty(client: &CudaClient, len: usize) -> Self {
        let bytes = len * std::mem::size_of::<u32>();
        Self {
            lo: client.empty(bytes),
            hi: client.empty(bytes),
            indices: client.empty(bytes),
        }
    }
}

/// Radix sort on a CUDA device.
pub struct CudaRadixSort {
    /// CUDA device (kept alive for the sorter's lifetime)
    #[allow(dead_code)]
    device: CudaDevice,
    client: CudaClient,
    config: RadixSortConfig,
}

impl CudaRadixSort {
    /// Create a sorter on the default CUDA device.
    pub fn new(config: RadixSortConfig) -> Result<Self> {
        Self::with_device_id(0, config)
    }

    /// Create a sorter on a specific CUDA device.
    pub fn with_device_id(device_id: usize, config: RadixSortConfig) -> Result<Self> {
        config.validate()?;
        let device = CudaDevice::new(device_id);
        let client = CudaRuntime::client(&device);
        Ok(Self {
            device,
            client,
            config,
        })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &RadixSortConfig {
        &self.config
    }

    /// Sort `keys` by the bits of `bits` and return the sorted copy.
    ///
    /// Stable, and bit-exact like the host-emulated engine: keys are moved
    /// through an index permutation, never re-created from their encodings.
    pub fn sort_keys<K: RadixKey>(
        &self,
        keys: &[K],
        bits: BitRange,
        order: SortOrder,
    ) -> Result<Vec<K>> {
        self.sort_keys_timed(keys, bits, order).map(|(sorted, _)| sorted)
    }

    /// [`sort_keys`](Self::sort_keys) with the timing record of the call.
    pub fn sort_keys_timed<K: RadixKey>(
        &self,
        keys: &[K],
        bits: BitRange,
        order: SortOrder,
    ) -> Result<(Vec<K>, SortTiming)> {
        bits.validate::<K>()?;
        let num_keys = u32::try_from(keys.len())
            .map_err(|_| InvalidArgument::KeyCountTooLarge(keys.len()))?;
        if keys.is_empty() {
            return Ok((Vec::new(), SortTiming::default()));
        }

        let n = keys.len();
        let sort = self.config.sort;
        let scan = self.config.scan;
        let tile_size = sort.tile_size();
        let tiles = n.div_ceil(tile_size);
        let max_cells = self.config.radix_size() * tiles;
        let scan_tiles = max_cells.div_ceil(scan.tile_size());
        let descending = u32::from(order == SortOrder::Descending);

        // Upload encodings and identity indices
        let (lo, hi) = split_codes(keys);
        let indices: Vec<u32> = (0..num_keys).collect();
        let mut current = KeyHandles {
            lo: self.client.create(u32::as_bytes(&lo)),
            hi: self.client.create(u32::as_bytes(&hi)),
            indices: self.client.create(u32::as_bytes(&indices)),
        };
        let mut alternate = KeyHandles::empty(&self.client, n);

        let word = std::mem::size_of::<u32>();
        let histogram = self.client.empty(max_cells * word);
        let offsets = self.client.empty(max_cells * word);
        let partials = self.client.empty(scan_tiles.max(1) * word);

        let plan = PassPlan::new(bits, self.config.radix_bits, Placement::OutOfPlace);
        tracing::debug!(
            key_count = n,
            key_bits = K::BITS,
            start_bit = bits.start_bit(),
            end_bit = bits.end_bit(),
            ?order,
            passes = plan.pass_count(),
            tiles,
            "cuda radix sort"
        );

        let mut collector = SortTimingCollector::new();
        collector.start_sort();

        for (pass, window) in plan.windows().iter().copied().enumerate() {
            collector.start_pass(pass, window);
            let radix_size = window.radix_size() as u32;
            let cells = window.radix_size() * tiles;
            let cell_tiles = cells.div_ceil(scan.tile_size()) as u32;

            unsafe {
                radix_histogram_kernel::launch_unchecked::<CudaRuntime>(
                    &self.client,
                    CubeCount::Static(tiles as u32, 1, 1),
                    CubeDim::new(sort.block_size, 1, 1),
                    ArrayArg::from_raw_parts::<u32>(&current.lo, n, 1),
                    ArrayArg::from_raw_parts::<u32>(&current.hi, n, 1),
                    ScalarArg::new(num_keys),
                    ScalarArg::new(window.start_bit),
                    ScalarArg::new(descending),
                    ScalarArg::new(tiles as u32),
                    ArrayArg::from_raw_parts::<u32>(&histogram, cells, 1),
                    radix_size,
                    sort.items_per_thread,
                );
            }
            cubecl::future::block_on(self.client.sync());
            collector.record_phase(PassPhase::Histogram);

            unsafe {
                radix_scan_tiles_kernel::launch_unchecked::<CudaRuntime>(
                    &self.client,
                    CubeCount::Static(cell_tiles, 1, 1),
                    CubeDim::new(scan.block_size, 1, 1),
                    ArrayArg::from_raw_parts::<u32>(&histogram, cells, 1),
                    ScalarArg::new(cells as u32),
                    ArrayArg::from_raw_parts::<u32>(&offsets, cells, 1),
                    ArrayArg::from_raw_parts::<u32>(&partials, cell_tiles as usize, 1),
                    scan.block_size,
                    scan.items_per_thread,
                );
                radix_scan_partials_kernel::launch_unchecked::<CudaRuntime>(
                    &self.client,
                    CubeCount::Static(1, 1, 1),
                    CubeDim::new(1, 1, 1),
                    ArrayArg::from_raw_parts::<u32>(&partials, cell_tiles as usize, 1),
                    ScalarArg::new(cell_tiles),
                );
                radix_scan_add_partials_kernel::launch_unchecked::<CudaRuntime>(
                    &self.client,
                    CubeCount::Static(cell_tiles, 1, 1),
                    CubeDim::new(scan.block_size, 1, 1),
                    ArrayArg::from_raw_parts::<u32>(&partials, cell_tiles as usize, 1),
                    ScalarArg::new(cells as u32),
                    ArrayArg::from_raw_parts::<u32>(&offsets, cells, 1),
                    scan.items_per_thread,
                );
            }
            cubecl::future::block_on(self.client.sync());
            collector.record_phase(PassPhase::Offsets);

            unsafe {
                radix_scatter_kernel::launch_unchecked::<CudaRuntime>(
                    &self.client,
                    CubeCount::Static(tiles as u32, 1, 1),
                    CubeDim::new(sort.block_size, 1, 1),
                    ArrayArg::from_raw_parts::<u32>(&current.lo, n, 1),
                    ArrayArg::from_raw_parts::<u32>(&current.hi, n, 1),
                    ArrayArg::from_raw_parts::<u32>(&current.indices, n, 1),
                    ArrayArg::from_raw_parts::<u32>(&offsets, cells, 1),
                    ScalarArg::new(num_keys),
                    ScalarArg::new(window.start_bit),
                    ScalarArg::new(descending),
                    ScalarArg::new(tiles as u32),
                    ArrayArg::from_raw_parts::<u32>(&alternate.lo, n, 1),
                    ArrayArg::from_raw_parts::<u32>(&alternate.hi, n, 1),
                    ArrayArg::from_raw_parts::<u32>(&alternate.indices, n, 1),
                    radix_size,
                    tile_size as u32,
                    sort.items_per_thread,
                );
            }
            cubecl::future::block_on(self.client.sync());
            collector.record_phase(PassPhase::Scatter);
            collector.end_pass();

            std::mem::swap(&mut current, &mut alternate);
        }

        // Gather the original keys through the final permutation
        let index_bytes = self.client.read_one(current.indices);
        let permutation = u32::from_bytes(&index_bytes);
        let sorted = permutation.iter().map(|&i| keys[i as usize]).collect();

        let timing = collector.finish();
        tracing::trace!(total_ms = timing.total_ms, "cuda radix sort finished");
        Ok((sorted, timing))
    }
}
