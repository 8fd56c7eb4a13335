//! Kernel launch geometry and block-level helpers.
//!
//! A kernel is a function of one [`BlockContext`]. The stream runs every block
//! of the grid concurrently and blocks never wait on each other; code that
//! needs cross-block ordering has to be split into separate launches.
//!
//! Inside a block the threads are written out as loops over
//! [`BlockContext::threads`]. Consecutive loops play the role of phases
//! separated by a block barrier: every thread finishes one loop before any
//! thread starts the next.

use std::marker::PhantomData;
use std::ops::Range;

use crate::error::{DeviceError, Result};

/// Grid and block dimensions of a launch (one-dimensional).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Number of blocks in the grid.
    pub grid_dim: u32,
    /// Number of threads in each block.
    pub block_dim: u32,
}

impl LaunchConfig {
    pub fn new(grid_dim: u32, block_dim: u32) -> Self {
        Self {
            grid_dim,
            block_dim,
        }
    }

    /// Grid with enough blocks to cover `work_items` at `items_per_block` each.
    pub fn for_items(work_items: usize, items_per_block: usize, block_dim: u32) -> Result<Self> {
        let blocks = work_items.div_ceil(items_per_block.max(1));
        let grid_dim = u32::try_from(blocks).map_err(|_| DeviceError::InvalidLaunch {
            kernel: "<grid>",
            reason: format!("{blocks} blocks exceed the grid limit"),
        })?;
        Ok(Self::new(grid_dim, block_dim))
    }

    pub(crate) fn validate(&self, kernel: &'static str, max_block_dim: u32) -> Result<()> {
        if self.grid_dim == 0 {
            return Err(DeviceError::InvalidLaunch {
                kernel,
                reason: "grid has no blocks".to_string(),
            });
        }
        if self.block_dim == 0 || self.block_dim > max_block_dim {
            return Err(DeviceError::InvalidLaunch {
                kernel,
                reason: format!(
                    "block_dim {} outside 1..={max_block_dim}",
                    self.block_dim
                ),
            });
        }
        Ok(())
    }
}

/// Identity of the block being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub block_idx: u32,
    pub block_dim: u32,
    pub grid_dim: u32,
}

impl BlockContext {
    /// Thread indices of this block.
    pub fn threads(&self) -> Range<u32> {
        0..self.block_dim
    }

    /// Element range owned by `thread` in a blocked arrangement of
    /// `items_per_thread` items, relative to the start of the tile and
    /// clipped to `tile_len`.
    ///
    /// Thread `t` owns `[t * items_per_thread, (t + 1) * items_per_thread)`,
    /// so visiting threads in order visits the tile in order.
    pub fn thread_items(&self, thread: u32, items_per_thread: usize, tile_len: usize) -> Range<usize> {
        let start = (thread as usize * items_per_thread).min(tile_len);
        let end = (start + items_per_thread).min(tile_len);
        start..end
    }
}

/// Global memory written concurrently by the blocks of one launch.
///
/// Blocks of a grid write disjoint locations of the same allocation (a
/// scatter, a column of a table). Bounds are checked on every access and a
/// violation is reported as [`DeviceError::IllegalAddress`]; disjointness is
/// the caller's contract, stated on each unsafe method.
pub struct SharedSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: access is only possible through the unsafe methods below, whose
// contracts rule out two blocks touching the same element in one launch.
unsafe impl<T: Send> Send for SharedSlice<'_, T> {}
unsafe impl<T: Send> Sync for SharedSlice<'_, T> {}

impl<'a, T: Copy> SharedSlice<'a, T> {
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Write one element.
    ///
    /// # Safety
    /// No other block may read or write `index` during the same launch.
    pub unsafe fn write(&self, index: usize, value: T) -> Result<()> {
        if index >= self.len {
            return Err(DeviceError::IllegalAddress {
                index,
                len: self.len,
            });
        }
        self.ptr.add(index).write(value);
        Ok(())
    }

    /// Read one element.
    ///
    /// # Safety
    /// No other block may write `index` during the same launch.
    pub unsafe fn read(&self, index: usize) -> Result<T> {
        if index >= self.len {
            return Err(DeviceError::IllegalAddress {
                index,
                len: self.len,
            });
        }
        Ok(self.ptr.add(index).read())
    }

    /// Borrow a contiguous range exclusively for the calling block.
    ///
    /// # Safety
    /// No other block may access any element of `range` during the same launch,
    /// and the returned slice must not outlive the block.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn range_mut(&self, range: Range<usize>) -> Result<&mut [T]> {
        if range.start > range.end || range.end > self.len {
            return Err(DeviceError::IllegalAddress {
                index: range.end.max(range.start),
                len: self.len,
            });
        }
        Ok(std::slice::from_raw_parts_mut(
            self.ptr.add(range.start),
            range.end - range.start,
        ))
    }
}
