//! Tuning parameters for the sort kernels.

use serde::{Deserialize, Serialize};

use crate::error::InvalidArgument;

/// Largest supported digit width. Histogram and offset tables hold
/// `2^radix_bits` buckets per tile.
pub const MAX_RADIX_BITS: u32 = 8;

/// Largest block a kernel config may request.
pub const MAX_BLOCK_SIZE: u32 = 1024;

/// Block shape of one kernel family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Threads per block.
    pub block_size: u32,
    /// Consecutive items owned by each thread.
    pub items_per_thread: u32,
}

impl KernelConfig {
    pub const fn new(block_size: u32, items_per_thread: u32) -> Self {
        Self {
            block_size,
            items_per_thread,
        }
    }

    /// Items processed by one block.
    #[inline]
    pub fn tile_size(&self) -> usize {
        self.block_size as usize * self.items_per_thread as usize
    }

    fn validate(&self, name: &str) -> Result<(), InvalidArgument> {
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(InvalidArgument::Config(format!(
                "{name}.block_size {} outside 1..={MAX_BLOCK_SIZE}",
                self.block_size
            )));
        }
        if self.items_per_thread == 0 {
            return Err(InvalidArgument::Config(format!(
                "{name}.items_per_thread must be positive"
            )));
        }
        Ok(())
    }
}

/// Complete tuning record of a [`DeviceRadixSort`](crate::DeviceRadixSort).
///
/// The default is the configuration the conformance tests run with:
/// 8-bit digits, offsets scanned by 256x3 blocks and keys histogrammed and
/// scattered by 256x8 blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadixSortConfig {
    /// Digit width consumed per pass.
    pub radix_bits: u32,
    /// Blocks of the offset scan kernels.
    pub scan: KernelConfig,
    /// Blocks of the histogram and scatter kernels.
    pub sort: KernelConfig,
}

impl Default for RadixSortConfig {
    fn default() -> Self {
        Self {
            radix_bits: 8,
            scan: KernelConfig::new(256, 3),
            sort: KernelConfig::new(256, 8),
        }
    }
}

impl RadixSortConfig {
    pub fn validate(&self) -> Result<(), InvalidArgument> {
        if !(1..=MAX_RADIX_BITS).contains(&self.radix_bits) {
            return Err(InvalidArgument::Config(format!(
                "radix_bits {} outside 1..={MAX_RADIX_BITS}",
                self.radix_bits
            )));
        }
        self.scan.validate("scan")?;
        self.sort.validate("sort")?;
        Ok(())
    }

    /// Buckets per digit.
    #[inline]
    pub fn radix_size(&self) -> usize {
        1 << self.radix_bits
    }
}
