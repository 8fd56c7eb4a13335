//! Device-wide radix sort entry points.
//!
//! # Example
//!
//! ```
//! use radix_sort::{BitRange, DeviceRadixSort};
//! use radix_device::Device;
//!
//! let device = Device::host();
//! let stream = device.create_stream();
//! let engine = DeviceRadixSort::builder().build().unwrap();
//!
//! let keys = [5u32, 1, 4, 1, 3];
//! let bits = BitRange::full::<u32>();
//! let bytes = engine.temporary_storage_bytes::<u32>(keys.len(), bits).unwrap();
//! let mut temp = device.alloc_temporary(bytes).unwrap();
//! let mut output = [0u32; 5];
//!
//! engine
//!     .sort_keys(&stream, &mut temp, &keys, &mut output, keys.len(), bits)
//!     .unwrap();
//! stream.synchronize().unwrap();
//! assert_eq!(output, [1, 1, 3, 4, 5]);
//! ```

use radix_device::{DeviceError, Stream, TemporaryStorage};

use crate::config::{KernelConfig, RadixSortConfig};
use crate::digit::{BitRange, SortOrder};
use crate::error::{InvalidArgument, Result};
use crate::kernels::{launch_exclusive_scan, launch_histogram, launch_scatter, KernelLauncher};
use crate::key::RadixKey;
use crate::plan::{KeySlot, PassPlan, PassRoute, Placement};
use crate::storage::{StorageLayout, Workspace};
use crate::timing::{PassPhase, SortTiming, SortTimingCollector};

/// Builder for [`DeviceRadixSort`].
#[derive(Debug, Clone)]
pub struct DeviceRadixSortBuilder {
    config: RadixSortConfig,
    debug_synchronous: bool,
}

impl DeviceRadixSortBuilder {
    /// Create a new builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: RadixSortConfig::default(),
            debug_synchronous: false,
        }
    }

    /// Replace the whole tuning record.
    pub fn config(mut self, config: RadixSortConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the digit width consumed per pass (1..=8).
    pub fn radix_bits(mut self, radix_bits: u32) -> Self {
        self.config.radix_bits = radix_bits;
        self
    }

    /// Set the block shape of the offset scan kernels.
    pub fn scan_config(mut self, scan: KernelConfig) -> Self {
        self.config.scan = scan;
        self
    }

    /// Set the block shape of the histogram and scatter kernels.
    pub fn sort_config(mut self, sort: KernelConfig) -> Self {
        self.config.sort = sort;
        self
    }

    /// Synchronize and log after every kernel launch.
    pub fn debug_synchronous(mut self, enabled: bool) -> Self {
        self.debug_synchronous = enabled;
        self
    }

    /// Validate the configuration and build the engine.
    pub fn build(self) -> Result<DeviceRadixSort> {
        self.config.validate()?;
        Ok(DeviceRadixSort {
            config: self.config,
            debug_synchronous: self.debug_synchronous,
        })
    }
}

impl Default for DeviceRadixSortBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// LSD radix sort of fixed-width keys on a device stream.
///
/// Each call sorts the first `key_count` keys by the bits in a [`BitRange`],
/// ascending or descending, and is stable: keys that agree on every bit of
/// the range keep their input order. The caller provides temporary storage
/// of at least [`temporary_storage_bytes`](Self::temporary_storage_bytes);
/// the engine allocates nothing itself.
///
/// Work is issued to `stream` and may fail asynchronously. Callers observe
/// the result through the returned `Result` and `Stream::synchronize`.
#[derive(Debug, Clone)]
pub struct DeviceRadixSort {
    config: RadixSortConfig,
    debug_synchronous: bool,
}

impl Default for DeviceRadixSort {
    fn default() -> Self {
        Self {
            config: RadixSortConfig::default(),
            debug_synchronous: false,
        }
    }
}

impl DeviceRadixSort {
    pub fn builder() -> DeviceRadixSortBuilder {
        DeviceRadixSortBuilder::new()
    }

    /// Get the current configuration.
    pub fn config(&self) -> &RadixSortConfig {
        &self.config
    }

    pub fn debug_synchronous(&self) -> bool {
        self.debug_synchronous
    }

    /// Bytes of temporary storage a sort of `key_count` keys of type `K`
    /// requires. Always positive, including for zero keys.
    ///
    /// Touches no device state.
    pub fn temporary_storage_bytes<K: RadixKey>(
        &self,
        key_count: usize,
        bits: BitRange,
    ) -> Result<usize> {
        bits.validate::<K>()?;
        check_key_count(key_count)?;
        Ok(StorageLayout::new::<K>(key_count, &self.config).total())
    }

    /// Sort `input[..key_count]` ascending into `output[..key_count]`.
    ///
    /// `input` is only read.
    pub fn sort_keys<K: RadixKey>(
        &self,
        stream: &Stream,
        temp: &mut TemporaryStorage,
        input: &[K],
        output: &mut [K],
        key_count: usize,
        bits: BitRange,
    ) -> Result<()> {
        self.sort_keys_timed(stream, temp, Some(input), output, key_count, bits, SortOrder::Ascending)
            .map(drop)
    }

    /// Sort `input[..key_count]` descending into `output[..key_count]`.
    pub fn sort_keys_descending<K: RadixKey>(
        &self,
        stream: &Stream,
        temp: &mut TemporaryStorage,
        input: &[K],
        output: &mut [K],
        key_count: usize,
        bits: BitRange,
    ) -> Result<()> {
        self.sort_keys_timed(stream, temp, Some(input), output, key_count, bits, SortOrder::Descending)
            .map(drop)
    }

    /// Sort `keys[..key_count]` ascending in place.
    pub fn sort_keys_in_place<K: RadixKey>(
        &self,
        stream: &Stream,
        temp: &mut TemporaryStorage,
        keys: &mut [K],
        key_count: usize,
        bits: BitRange,
    ) -> Result<()> {
        self.sort_keys_timed(stream, temp, None, keys, key_count, bits, SortOrder::Ascending)
            .map(drop)
    }

    /// Sort `keys[..key_count]` descending in place.
    pub fn sort_keys_descending_in_place<K: RadixKey>(
        &self,
        stream: &Stream,
        temp: &mut TemporaryStorage,
        keys: &mut [K],
        key_count: usize,
        bits: BitRange,
    ) -> Result<()> {
        self.sort_keys_timed(stream, temp, None, keys, key_count, bits, SortOrder::Descending)
            .map(drop)
    }

    /// Sort and return the timing record of the call.
    ///
    /// With `input` the keys are sorted from `input` into `output`; without
    /// it `output` is sorted in place. Pass windows are always recorded;
    /// durations only with the `profiling` feature. A sort of zero keys
    /// returns an empty record.
    #[allow(clippy::too_many_arguments)]
    pub fn sort_keys_timed<K: RadixKey>(
        &self,
        stream: &Stream,
        temp: &mut TemporaryStorage,
        input: Option<&[K]>,
        output: &mut [K],
        key_count: usize,
        bits: BitRange,
        order: SortOrder,
    ) -> Result<SortTiming> {
        // ---- Argument checks, before anything reaches the stream ----
        bits.validate::<K>()?;
        check_key_count(key_count)?;
        for buffer_len in input.map(|i| i.len()).into_iter().chain([output.len()]) {
            if key_count > buffer_len {
                return Err(InvalidArgument::KeyCountExceedsBuffer {
                    key_count,
                    buffer_len,
                }
                .into());
            }
        }
        if key_count == 0 {
            return Ok(SortTiming::default());
        }

        let layout = StorageLayout::new::<K>(key_count, &self.config);
        let Workspace {
            histogram,
            offsets,
            partials,
            scratch,
        } = layout.carve::<K>(temp.as_bytes_mut())?;

        let placement = match input {
            Some(_) => Placement::OutOfPlace,
            None => Placement::InPlace,
        };
        let plan = PassPlan::new(bits, self.config.radix_bits, placement);
        tracing::debug!(
            key_count,
            key_bits = K::BITS,
            start_bit = bits.start_bit(),
            end_bit = bits.end_bit(),
            ?order,
            ?placement,
            passes = plan.pass_count(),
            tiles = layout.tiles(),
            "radix sort"
        );

        let mut buffers = KeyBuffers {
            input: input.map(|i| &i[..key_count]),
            output: &mut output[..key_count],
            scratch,
        };
        let launcher = KernelLauncher::new(stream, self.debug_synchronous);
        let mut collector = SortTimingCollector::new();
        collector.start_sort();

        if plan.stages_input() {
            launcher.copy(&*buffers.output, buffers.scratch)?;
        }

        for (pass, window) in plan.windows().iter().copied().enumerate() {
            collector.start_pass(pass, window);
            let cells = window.radix_size() * layout.tiles();
            let (keys, destination) = buffers.split(plan.route(pass))?;

            launch_histogram(
                &launcher,
                keys,
                window,
                order,
                self.config.sort,
                &mut histogram[..cells],
            )?;
            collector.record_phase(PassPhase::Histogram);

            launch_exclusive_scan(
                &launcher,
                &histogram[..cells],
                &mut offsets[..cells],
                partials,
                self.config.scan,
            )?;
            collector.record_phase(PassPhase::Offsets);

            launch_scatter(
                &launcher,
                keys,
                window,
                order,
                self.config.sort,
                &offsets[..cells],
                destination,
            )?;
            collector.record_phase(PassPhase::Scatter);
            collector.end_pass();
        }
        let timing = collector.finish();

        #[cfg(feature = "profiling")]
        for pass in &timing.passes {
            tracing::debug!(
                pass = pass.pass,
                start_bit = pass.start_bit,
                bits = pass.bits,
                histogram_ms = pass.histogram_ms,
                offsets_ms = pass.offsets_ms,
                scatter_ms = pass.scatter_ms,
                "radix sort pass"
            );
        }
        tracing::trace!(total_ms = timing.total_ms, "radix sort issued");

        stream.status()?;
        Ok(timing)
    }
}

fn check_key_count(key_count: usize) -> std::result::Result<(), InvalidArgument> {
    if u32::try_from(key_count).is_err() {
        return Err(InvalidArgument::KeyCountTooLarge(key_count));
    }
    Ok(())
}

/// The key buffers of one sort call, all `key_count` long.
struct KeyBuffers<'a, K> {
    input: Option<&'a [K]>,
    output: &'a mut [K],
    scratch: &'a mut [K],
}

impl<K> KeyBuffers<'_, K> {
    /// Source and destination of a pass.
    ///
    /// A [`PassPlan`] never routes a pass from the input of an in-place sort
    /// or between a buffer and itself; such a route is rejected before any
    /// launch.
    fn split(&mut self, route: PassRoute) -> radix_device::Result<(&[K], &mut [K])> {
        match (route.source, route.destination, self.input) {
            (KeySlot::Input, KeySlot::Output, Some(input)) => Ok((input, &mut *self.output)),
            (KeySlot::Input, KeySlot::Scratch, Some(input)) => Ok((input, &mut *self.scratch)),
            (KeySlot::Output, KeySlot::Scratch, _) => Ok((&*self.output, &mut *self.scratch)),
            (KeySlot::Scratch, KeySlot::Output, _) => Ok((&*self.scratch, &mut *self.output)),
            (source, destination, input) => Err(DeviceError::InvalidLaunch {
                kernel: "radix_histogram",
                reason: format!(
                    "no key buffers for route {source:?} -> {destination:?} (input present: {})",
                    input.is_some()
                ),
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RadixSortError;
    use crate::test_utils::{random_keys, sort_on_device, stable_sort_reference};
    use radix_device::Device;

    fn small_engine() -> DeviceRadixSort {
        DeviceRadixSort::builder()
            .radix_bits(3)
            .scan_config(KernelConfig::new(2, 2))
            .sort_config(KernelConfig::new(4, 2))
            .build()
            .expect("small config should be valid")
    }

    fn injected() -> DeviceError {
        DeviceError::LaunchFailure {
            kernel: "injected",
            reason: "test".into(),
        }
    }

    #[test]
    fn test_sorts_example() {
        let device = Device::host();
        let engine = DeviceRadixSort::default();
        let bits = BitRange::full::<u32>();
        let keys = [5u32, 1, 4, 1, 3];

        let asc = sort_on_device(&engine, &device, &keys, bits, SortOrder::Ascending, false).unwrap();
        assert_eq!(asc, vec![1, 1, 3, 4, 5]);
        let desc = sort_on_device(&engine, &device, &keys, bits, SortOrder::Descending, true).unwrap();
        assert_eq!(desc, vec![5, 4, 3, 1, 1]);

        let bytes = [5u8, 1, 4, 1, 3];
        let out = sort_on_device(
            &engine,
            &device,
            &bytes,
            BitRange::new(0, 8),
            SortOrder::Ascending,
            true,
        )
        .unwrap();
        assert_eq!(out, vec![1, 1, 3, 4, 5]);
    }

    #[test]
    fn test_bits_outside_range_ignored() {
        let device = Device::host();
        let engine = DeviceRadixSort::default();
        let keys = [0b1010u8, 0b1001];
        let out = sort_on_device(
            &engine,
            &device,
            &keys,
            BitRange::new(0, 1),
            SortOrder::Ascending,
            false,
        )
        .unwrap();
        assert_eq!(out, vec![0b1010, 0b1001]);
    }

    #[test]
    fn test_stable_ties_in_both_orders() {
        let device = Device::host();
        let engine = small_engine();
        // Sort on the low 4 bits; the high bits record the input position.
        let keys: Vec<u16> = (0..300u16).map(|i| (i << 4) | (i * 7 % 5)).collect();
        let bits = BitRange::new(0, 4);

        for order in [SortOrder::Ascending, SortOrder::Descending] {
            for in_place in [false, true] {
                let out = sort_on_device(&engine, &device, &keys, bits, order, in_place).unwrap();
                assert_eq!(out, stable_sort_reference(&keys, bits, order));
            }
        }
    }

    #[test]
    fn test_multi_tile_against_reference() {
        let device = Device::host();
        let engine = small_engine();
        let keys: Vec<i32> = random_keys(1000, 7);
        for bits in [BitRange::full::<i32>(), BitRange::new(5, 17), BitRange::new(31, 32)] {
            for order in [SortOrder::Ascending, SortOrder::Descending] {
                let out = sort_on_device(&engine, &device, &keys, bits, order, false).unwrap();
                assert_eq!(out, stable_sort_reference(&keys, bits, order));
            }
        }
    }

    #[test]
    fn test_float_order() {
        let device = Device::host();
        let engine = DeviceRadixSort::default();
        let keys = [2.5f64, f64::NEG_INFINITY, -0.0, 1e-300, -7.25, f64::INFINITY, 0.0];
        let out = sort_on_device(
            &engine,
            &device,
            &keys,
            BitRange::full::<f64>(),
            SortOrder::Ascending,
            false,
        )
        .unwrap();
        let bits: Vec<u64> = out.iter().map(|v| v.to_bits()).collect();
        let expected: Vec<u64> = [f64::NEG_INFINITY, -7.25, -0.0, 0.0, 1e-300, 2.5, f64::INFINITY]
            .iter()
            .map(|v| v.to_bits())
            .collect();
        // -0.0 and 0.0 tie and keep their input order.
        assert_eq!(bits, expected);
    }

    #[test]
    fn test_in_place_matches_out_of_place() {
        let device = Device::host();
        let engine = DeviceRadixSort::default();
        let keys: Vec<f32> = random_keys(5000, 11);
        // Odd (3 passes) and even (4 passes) pass counts.
        for bits in [BitRange::new(0, 24), BitRange::full::<f32>()] {
            let a = sort_on_device(&engine, &device, &keys, bits, SortOrder::Descending, false).unwrap();
            let b = sort_on_device(&engine, &device, &keys, bits, SortOrder::Descending, true).unwrap();
            assert_eq!(bytemuck::cast_slice::<f32, u8>(&a), bytemuck::cast_slice::<f32, u8>(&b));
        }
    }

    #[test]
    fn test_idempotent_and_dual() {
        let device = Device::host();
        let engine = small_engine();
        let bits = BitRange::full::<u64>();
        // Unique keys.
        let keys: Vec<u64> = (0..777u64).map(|i| i.wrapping_mul(0x9e37_79b9_7f4a_7c15)).collect();

        let asc = sort_on_device(&engine, &device, &keys, bits, SortOrder::Ascending, false).unwrap();
        let again = sort_on_device(&engine, &device, &asc, bits, SortOrder::Ascending, true).unwrap();
        assert_eq!(asc, again);

        let mut desc = sort_on_device(&engine, &device, &keys, bits, SortOrder::Descending, false).unwrap();
        desc.reverse();
        assert_eq!(asc, desc);
    }

    #[test]
    fn test_input_untouched_and_tail_preserved() {
        let device = Device::host();
        let stream = device.create_stream();
        let engine = DeviceRadixSort::default();
        let bits = BitRange::full::<i8>();

        let input = [3i8, -2, 1, 100, 100];
        let mut output = [9i8; 5];
        let bytes = engine.temporary_storage_bytes::<i8>(3, bits).unwrap();
        let mut temp = device.alloc_temporary(bytes).unwrap();
        engine
            .sort_keys(&stream, &mut temp, &input, &mut output, 3, bits)
            .unwrap();
        stream.synchronize().unwrap();

        assert_eq!(input, [3, -2, 1, 100, 100]);
        assert_eq!(output, [-2, 1, 3, 9, 9]);
    }

    #[test]
    fn test_zero_keys() {
        let device = Device::host();
        let stream = device.create_stream();
        let engine = DeviceRadixSort::default();
        let bits = BitRange::full::<u16>();

        assert!(engine.temporary_storage_bytes::<u16>(0, bits).unwrap() > 0);
        // Empty storage is fine when there is nothing to sort.
        let mut temp = device.alloc_temporary(0).unwrap();
        engine
            .sort_keys_in_place::<u16>(&stream, &mut temp, &mut [], 0, bits)
            .unwrap();
        assert_eq!(stream.launch_count(), 0);
    }

    #[test]
    fn test_invalid_bit_range() {
        let device = Device::host();
        let stream = device.create_stream();
        let engine = DeviceRadixSort::default();
        let mut temp = device.alloc_temporary(1 << 16).unwrap();
        let mut keys = [1u32, 2];

        for bits in [BitRange::new(0, 33), BitRange::new(4, 4), BitRange::new(9, 3)] {
            let err = engine
                .sort_keys_in_place(&stream, &mut temp, &mut keys, 2, bits)
                .unwrap_err();
            assert!(err.is_invalid_argument());
            assert!(engine.temporary_storage_bytes::<u32>(2, bits).is_err());
        }
        assert_eq!(stream.launch_count(), 0);
    }

    #[test]
    fn test_insufficient_storage() {
        let device = Device::host();
        let stream = device.create_stream();
        let engine = DeviceRadixSort::default();
        let bits = BitRange::full::<u32>();
        let input = [4u32, 3, 2, 1];
        let mut output = [0u32; 4];

        // Sizing query skipped.
        let mut temp = device.alloc_temporary(0).unwrap();
        let err = engine
            .sort_keys(&stream, &mut temp, &input, &mut output, 4, bits)
            .unwrap_err();
        let required = engine.temporary_storage_bytes::<u32>(4, bits).unwrap();
        assert_eq!(
            err,
            RadixSortError::InvalidArgument(InvalidArgument::InsufficientStorage {
                required,
                provided: 0
            })
        );

        let mut temp = device.alloc_temporary(required - 1).unwrap();
        assert!(engine
            .sort_keys(&stream, &mut temp, &input, &mut output, 4, bits)
            .unwrap_err()
            .is_invalid_argument());
        assert_eq!(stream.launch_count(), 0);
    }

    #[test]
    fn test_key_count_exceeds_buffer() {
        let device = Device::host();
        let stream = device.create_stream();
        let engine = DeviceRadixSort::default();
        let bits = BitRange::full::<u32>();
        let mut temp = device.alloc_temporary(1 << 16).unwrap();

        let err = engine
            .sort_keys(&stream, &mut temp, &[1u32, 2], &mut [0u32; 3], 3, bits)
            .unwrap_err();
        assert_eq!(
            err,
            RadixSortError::InvalidArgument(InvalidArgument::KeyCountExceedsBuffer {
                key_count: 3,
                buffer_len: 2
            })
        );
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_key_count_too_large() {
        let engine = DeviceRadixSort::default();
        let n = u32::MAX as usize + 1;
        let err = engine
            .temporary_storage_bytes::<u8>(n, BitRange::full::<u8>())
            .unwrap_err();
        assert_eq!(err, RadixSortError::from(InvalidArgument::KeyCountTooLarge(n)));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let err = DeviceRadixSort::builder().radix_bits(9).build().unwrap_err();
        assert!(matches!(
            err,
            RadixSortError::InvalidArgument(InvalidArgument::Config(_))
        ));
        assert!(DeviceRadixSort::builder()
            .sort_config(KernelConfig::new(0, 8))
            .build()
            .is_err());

        let engine = DeviceRadixSort::builder()
            .config(RadixSortConfig::default())
            .debug_synchronous(true)
            .build()
            .unwrap();
        assert!(engine.debug_synchronous());
        assert_eq!(engine.config(), &RadixSortConfig::default());
    }

    fn sort_with_fault(debug_synchronous: bool, after_operations: u64) -> (Result<()>, u64) {
        let device = Device::host();
        let stream = device.create_stream();
        let engine = DeviceRadixSort::builder()
            .debug_synchronous(debug_synchronous)
            .build()
            .unwrap();
        let bits = BitRange::full::<u32>();
        let keys: Vec<u32> = random_keys(3000, 3);
        let mut output = vec![0u32; keys.len()];
        let bytes = engine.temporary_storage_bytes::<u32>(keys.len(), bits).unwrap();
        let mut temp = device.alloc_temporary(bytes).unwrap();

        stream.inject_fault(after_operations, injected());
        let result = engine.sort_keys(&stream, &mut temp, &keys, &mut output, keys.len(), bits);
        (result, stream.launch_count())
    }

    #[test]
    fn test_device_fault_propagates() {
        // 4 passes of 5 launches; fail the very last scatter.
        let (result, launches) = sort_with_fault(false, 19);
        assert_eq!(result.unwrap_err(), RadixSortError::Device(injected()));
        assert_eq!(launches, 20);

        // A failure in the first pass stops the remaining launches.
        let (result, launches) = sort_with_fault(false, 0);
        assert_eq!(result.unwrap_err(), RadixSortError::Device(injected()));
        assert_eq!(launches, 1);
    }

    #[test]
    fn test_device_fault_debug_synchronous() {
        let (result, launches) = sort_with_fault(true, 6);
        let err = result.unwrap_err();
        assert!(!err.is_invalid_argument());
        assert!(!err.is_allocation_failure());
        assert_eq!(err, RadixSortError::Device(injected()));
        assert_eq!(launches, 7);
    }

    #[test]
    fn test_sticky_stream_error_reported() {
        let device = Device::host();
        let stream = device.create_stream();
        let engine = DeviceRadixSort::default();
        let bits = BitRange::full::<u8>();
        let mut keys = [3u8, 1, 2];
        let bytes = engine.temporary_storage_bytes::<u8>(3, bits).unwrap();
        let mut temp = device.alloc_temporary(bytes).unwrap();

        stream.inject_fault(0, injected());
        let _ = stream.copy(&[0u8], &mut [0u8]);
        let err = engine
            .sort_keys_in_place(&stream, &mut temp, &mut keys, 3, bits)
            .unwrap_err();
        assert_eq!(err, RadixSortError::Device(injected()));
    }

    #[test]
    fn test_allocation_failure_classified() {
        let device = Device::with_memory_limit(4096);
        let engine = DeviceRadixSort::default();
        let bits = BitRange::full::<u64>();
        let bytes = engine.temporary_storage_bytes::<u64>(10_000, bits).unwrap();

        let err: RadixSortError = device.alloc_temporary(bytes).unwrap_err().into();
        assert!(err.is_allocation_failure());

        let keys: Vec<u64> = random_keys(10_000, 1);
        let err = sort_on_device(&engine, &device, &keys, bits, SortOrder::Ascending, false)
            .unwrap_err();
        let cause = err
            .downcast_ref::<DeviceError>()
            .expect("allocation error should be preserved");
        assert!(cause.is_out_of_memory());
    }

    #[test]
    fn test_timed_sort_reports_passes() {
        let device = Device::host();
        let stream = device.create_stream();
        let engine = DeviceRadixSort::default();
        // 20 bits at 8 bits per pass: windows at 4, 12 and 20 (top one narrower).
        let bits = BitRange::new(4, 24);
        let mut keys: Vec<u32> = random_keys(2500, 17);
        let expected = stable_sort_reference(&keys, bits, SortOrder::Descending);
        let bytes = engine.temporary_storage_bytes::<u32>(keys.len(), bits).unwrap();
        let mut temp = device.alloc_temporary(bytes).unwrap();

        let n = keys.len();
        let timing = engine
            .sort_keys_timed(&stream, &mut temp, None, &mut keys, n, bits, SortOrder::Descending)
            .unwrap();
        stream.synchronize().unwrap();
        assert_eq!(keys, expected);

        let windows: Vec<(usize, u32, u32)> = timing
            .passes
            .iter()
            .map(|p| (p.pass, p.start_bit, p.bits))
            .collect();
        assert_eq!(windows, vec![(0, 4, 8), (1, 12, 8), (2, 20, 4)]);
        assert!(timing.total_ms >= 0.0);

        let empty = engine
            .sort_keys_timed::<u32>(&stream, &mut temp, Some(&[][..]), &mut [], 0, bits, SortOrder::Ascending)
            .unwrap();
        assert!(empty.passes.is_empty());
    }

    #[test]
    fn test_split_rejects_unplanned_route() {
        let mut output = [1u8, 2];
        let mut scratch = [0u8; 2];
        let mut buffers = KeyBuffers {
            input: None,
            output: &mut output,
            scratch: &mut scratch,
        };
        // In-place sorts have no input buffer.
        let route = PassRoute {
            source: KeySlot::Input,
            destination: KeySlot::Output,
        };
        assert!(matches!(
            buffers.split(route),
            Err(DeviceError::InvalidLaunch { .. })
        ));
        let route = PassRoute {
            source: KeySlot::Scratch,
            destination: KeySlot::Scratch,
        };
        assert!(buffers.split(route).is_err());

        let route = PassRoute {
            source: KeySlot::Scratch,
            destination: KeySlot::Output,
        };
        let (source, destination) = buffers.split(route).unwrap();
        assert_eq!(source, &[0, 0]);
        assert_eq!(destination, &[1, 2]);
    }
}
