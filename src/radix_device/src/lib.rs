//! Host-emulated device runtime for the radix sort engine.
//!
//! This crate provides the device-side collaborators the sort is written
//! against:
//! - Device handles with a memory budget and RAII allocations
//! - Opaque temporary storage for algorithm scratch space
//! - In-order streams with sticky errors and fault injection
//! - One-dimensional kernel launches over a grid of independent blocks
//!
//! Blocks of a launch run concurrently on the rayon thread pool, so kernels
//! must follow the same rules as on a GPU: no cross-block synchronization and
//! no two blocks writing the same location within one launch.
//!
//! # Example
//!
//! ```ignore
//! use radix_device::{Device, LaunchConfig};
//!
//! let device = Device::host();
//! let stream = device.create_stream();
//! let mut temp = device.alloc_temporary(4096)?;
//! stream.launch("my_kernel", LaunchConfig::new(grid, 256), |block| { ... })?;
//! stream.synchronize()?;
//! ```

pub mod error;
pub mod launch;
pub mod memory;
pub mod stream;

pub use error::{DeviceError, Result};
pub use launch::{BlockContext, LaunchConfig, SharedSlice};
pub use memory::{Device, DeviceBuffer, DeviceProperties, TemporaryStorage};
pub use stream::Stream;
