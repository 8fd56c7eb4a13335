//! Device-wide LSD radix sort.
//!
//! Sorts arrays of fixed-width keys (`u8` to `u64`, `i8` to `i64`, `f32`,
//! `f64`) by an arbitrary contiguous bit range, ascending or descending, on
//! a [`radix_device`] stream. The sort is stable and never allocates: the
//! caller queries the temporary storage size, allocates it, and passes it to
//! every call.
//!
//! # Architecture
//!
//! Keys are processed least significant digit first, `radix_bits` bits per
//! pass. Each pass is a fixed pipeline of launches:
//! - Histogram: per-tile digit counts
//! - Offsets: device-wide exclusive scan of the counts (three launches)
//! - Scatter: stable move of every key to its offset
//!
//! Passes ping-pong between the caller's buffer and a scratch buffer carved
//! from temporary storage; the last pass always writes the caller's output.
//!
//! # Backends
//!
//! [`DeviceRadixSort`] runs on the host-emulated [`radix_device`] runtime and
//! is always available. With the `cuda` feature, [`cuda::CudaRadixSort`] runs
//! the same pass pipeline as CubeCL kernels on a CUDA device.
//!
//! # Usage
//!
//! ```ignore
//! use radix_device::Device;
//! use radix_sort::{BitRange, DeviceRadixSort, KernelConfig};
//!
//! let device = Device::host();
//! let stream = device.create_stream();
//! let engine = DeviceRadixSort::builder()
//!     .radix_bits(8)
//!     .scan_config(KernelConfig::new(256, 3))
//!     .sort_config(KernelConfig::new(256, 8))
//!     .build()?;
//!
//! let bits = BitRange::full::<f32>();
//! let bytes = engine.temporary_storage_bytes::<f32>(keys.len(), bits)?;
//! let mut temp = device.alloc_temporary(bytes)?;
//! engine.sort_keys_descending_in_place(&stream, &mut temp, &mut keys, keys.len(), bits)?;
//! stream.synchronize()?;
//! ```

pub mod config;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod device_sort;
pub mod digit;
pub mod error;
pub mod kernels;
pub mod key;
pub mod plan;
pub mod storage;
pub mod test_utils;
pub mod timing;

#[cfg(test)]
mod conformance;

pub use config::{KernelConfig, RadixSortConfig, MAX_RADIX_BITS};
pub use device_sort::{DeviceRadixSort, DeviceRadixSortBuilder};
pub use digit::{extract_digit, BitRange, DigitWindow, SortOrder};
pub use error::{InvalidArgument, RadixSortError, Result};
pub use key::RadixKey;
pub use plan::{KeySlot, PassPlan, PassRoute, Placement};
pub use storage::{StorageLayout, STORAGE_ALIGNMENT};
pub use timing::{PassPhase, PassTiming, SortTiming, SortTimingCollector};

// Device runtime the entry points are written against
pub use radix_device::{Device, DeviceError, Stream, TemporaryStorage};
