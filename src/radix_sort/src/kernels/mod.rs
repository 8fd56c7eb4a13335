//! Device kernels of one radix sort pass.
//!
//! A pass is five launches on one stream:
//! - `radix_histogram`: per-tile digit counts into the bucket-major table
//! - `radix_scan_tiles`, `radix_scan_partials`, `radix_scan_add_partials`:
//!   device-wide exclusive scan of the table into global offsets
//! - `radix_scatter`: stable scatter of every key to its offset
//!
//! Each module also carries a host reference (`*_cpu`) that the device
//! kernels are tested against.

pub mod histogram;
pub mod scan;
pub mod scatter;

pub use histogram::{histogram_cpu, launch_histogram};
pub use scan::{exclusive_scan_cpu, launch_exclusive_scan};
pub use scatter::{launch_scatter, sort_pass_cpu};

use bytemuck::Pod;
use radix_device::{BlockContext, LaunchConfig, Result, Stream};

use crate::timing::Timer;

/// Issues kernels to a stream, optionally synchronizing after each one.
///
/// In debug-synchronous mode every launch is followed by a stream
/// synchronization and a log record, and a device failure is returned from
/// the launch that caused it instead of from a later call. Durations in the
/// record are measured with the `profiling` feature only.
#[derive(Debug, Clone, Copy)]
pub struct KernelLauncher<'s> {
    stream: &'s Stream,
    debug_synchronous: bool,
}

impl<'s> KernelLauncher<'s> {
    pub fn new(stream: &'s Stream, debug_synchronous: bool) -> Self {
        Self {
            stream,
            debug_synchronous,
        }
    }

    pub fn stream(&self) -> &'s Stream {
        self.stream
    }

    pub fn launch<F>(&self, name: &'static str, config: LaunchConfig, kernel: F) -> Result<()>
    where
        F: Fn(BlockContext) -> Result<()> + Sync,
    {
        let timer = Timer::new();
        self.stream.launch(name, config, kernel)?;
        if self.debug_synchronous {
            self.stream.synchronize()?;
            tracing::debug!(
                kernel = name,
                grid_dim = config.grid_dim,
                block_dim = config.block_dim,
                elapsed_ms = timer.elapsed_ms(),
                "kernel finished"
            );
        }
        Ok(())
    }

    /// Device-to-device copy, synchronized like a launch.
    pub fn copy<T: Pod>(&self, src: &[T], dst: &mut [T]) -> Result<()> {
        let timer = Timer::new();
        self.stream.copy(src, dst)?;
        if self.debug_synchronous {
            self.stream.synchronize()?;
            tracing::debug!(
                elements = src.len(),
                elapsed_ms = timer.elapsed_ms(),
                "copy finished"
            );
        }
        Ok(())
    }
}
