//! In-order execution streams.
//!
//! Operations issued to one stream execute in issue order. Blocks of a kernel
//! run concurrently on the rayon pool. The emulation finishes each operation
//! before the issuing call returns, but failures are reported the way an
//! asynchronous device reports them: the failing launch itself returns `Ok`,
//! the error is kept as the stream's *sticky error*, and every later operation
//! (and [`Stream::synchronize`]) returns it without doing any work.
//!
//! # Example
//!
//! ```
//! use radix_device::{Device, LaunchConfig, SharedSlice};
//!
//! let device = Device::host();
//! let stream = device.create_stream();
//! let mut out = device.alloc::<u32>(8).unwrap();
//! let slots = SharedSlice::new(out.as_mut_slice());
//!
//! stream
//!     .launch("fill_block_ids", LaunchConfig::new(2, 4), |block| {
//!         for thread in block.threads() {
//!             let index = (block.block_idx * block.block_dim + thread) as usize;
//!             // SAFETY: every thread of the grid writes a distinct index.
//!             unsafe { slots.write(index, block.block_idx)? };
//!         }
//!         Ok(())
//!     })
//!     .unwrap();
//! stream.synchronize().unwrap();
//! assert_eq!(out.to_host(), vec![0, 0, 0, 0, 1, 1, 1, 1]);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::error::{DeviceError, Result};
use crate::launch::{BlockContext, LaunchConfig};
use crate::memory::DeviceInner;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct StreamState {
    sticky: Option<DeviceError>,
    operations: u64,
    fault: Option<ArmedFault>,
}

struct ArmedFault {
    remaining: u64,
    error: DeviceError,
}

/// In-order stream of device operations.
pub struct Stream {
    id: u64,
    device: Arc<DeviceInner>,
    state: Mutex<StreamState>,
}

impl Stream {
    pub(crate) fn new(device: Arc<DeviceInner>) -> Self {
        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(stream = id, device = device.ordinal, "stream created");
        Self {
            id,
            device,
            state: Mutex::new(StreamState::default()),
        }
    }

    /// Stream identifier, unique within the process.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of operations that started executing on this stream.
    pub fn launch_count(&self) -> u64 {
        self.state.lock().operations
    }

    /// Launch `kernel` over the grid described by `config`.
    ///
    /// Returns an error immediately if the stream already holds a sticky
    /// error or the configuration is invalid. An error returned by a block is
    /// recorded as the sticky error and surfaces at the next stream call.
    pub fn launch<F>(&self, name: &'static str, config: LaunchConfig, kernel: F) -> Result<()>
    where
        F: Fn(BlockContext) -> Result<()> + Sync,
    {
        if let Err(e) = config.validate(name, self.device.properties.max_block_dim) {
            return Err(self.record(name, e));
        }
        let injected = self.begin(name)?;

        tracing::trace!(
            stream = self.id,
            kernel = name,
            grid_dim = config.grid_dim,
            block_dim = config.block_dim,
            "launch"
        );

        let outcome = match injected {
            Some(error) => Err(error),
            None => (0..config.grid_dim).into_par_iter().try_for_each(|block_idx| {
                kernel(BlockContext {
                    block_idx,
                    block_dim: config.block_dim,
                    grid_dim: config.grid_dim,
                })
            }),
        };

        if let Err(e) = outcome {
            self.record(name, e);
        }
        Ok(())
    }

    /// Device-to-device copy of `src` into `dst`.
    pub fn copy<T: Pod>(&self, src: &[T], dst: &mut [T]) -> Result<()> {
        const NAME: &str = "memcpy_dtod";
        if src.len() != dst.len() {
            return Err(self.record(
                NAME,
                DeviceError::SizeMismatch {
                    expected: dst.len(),
                    actual: src.len(),
                },
            ));
        }
        match self.begin(NAME)? {
            Some(error) => {
                self.record(NAME, error);
            }
            None => dst.copy_from_slice(src),
        }
        Ok(())
    }

    /// Wait for all issued work and report the sticky error, if any.
    pub fn synchronize(&self) -> Result<()> {
        self.status()
    }

    /// Report the sticky error without waiting.
    pub fn status(&self) -> Result<()> {
        match &self.state.lock().sticky {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Make the operation issued after `after_operations` further successful
    /// starts fail with `error`.
    ///
    /// `inject_fault(0, e)` fails the very next launch or copy. Used to
    /// exercise failure propagation in callers.
    pub fn inject_fault(&self, after_operations: u64, error: DeviceError) {
        self.state.lock().fault = Some(ArmedFault {
            remaining: after_operations,
            error,
        });
    }

    /// Count an operation in and return an injected failure due for it.
    fn begin(&self, name: &'static str) -> Result<Option<DeviceError>> {
        let mut state = self.state.lock();
        if let Some(e) = &state.sticky {
            tracing::warn!(stream = self.id, op = name, error = %e, "skipped after sticky error");
            return Err(e.clone());
        }
        state.operations += 1;

        let due = match state.fault.as_mut() {
            Some(fault) if fault.remaining == 0 => true,
            Some(fault) => {
                fault.remaining -= 1;
                false
            }
            None => false,
        };
        Ok(if due {
            state.fault.take().map(|f| f.error)
        } else {
            None
        })
    }

    /// Keep the first failure on this stream and hand back the error.
    fn record(&self, name: &'static str, error: DeviceError) -> DeviceError {
        let mut state = self.state.lock();
        tracing::debug!(stream = self.id, op = name, %error, "stream error");
        state.sticky.get_or_insert_with(|| error.clone());
        error
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("device", &self.device.ordinal)
            .field("operations", &state.operations)
            .field("sticky", &state.sticky)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
