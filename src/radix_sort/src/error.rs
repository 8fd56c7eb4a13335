//! Error types for the radix sort engine.
//!
//! Argument problems are detected before anything is issued to the stream and
//! leave device state untouched. Device failures carry the first error the
//! stream recorded; once one is reported the remaining passes are abandoned
//! and the output buffer holds unspecified contents.

use radix_device::DeviceError;
use thiserror::Error;

/// Caller-contract violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidArgument {
    #[error("bit range [{start_bit}, {end_bit}) is invalid for {key_bits}-bit keys")]
    BitRange {
        start_bit: u32,
        end_bit: u32,
        key_bits: u32,
    },

    /// Also returned when the sizing query was skipped and an empty region is passed.
    #[error("temporary storage holds {provided} bytes but {required} are required")]
    InsufficientStorage { required: usize, provided: usize },

    #[error("key count {key_count} exceeds buffer length {buffer_len}")]
    KeyCountExceedsBuffer { key_count: usize, buffer_len: usize },

    #[error("key count {0} exceeds the 32-bit offset range")]
    KeyCountTooLarge(usize),

    #[error("temporary storage section `{0}` is misaligned")]
    StorageAlignment(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Error returned by every sort entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadixSortError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgument),

    #[error("device execution failed: {0}")]
    Device(#[from] DeviceError),
}

impl RadixSortError {
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, RadixSortError::InvalidArgument(_))
    }

    /// Allocation failures are reported through the same `Device` variant as
    /// execution failures; this tells them apart.
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, RadixSortError::Device(e) if e.is_out_of_memory())
    }
}

pub type Result<T, E = RadixSortError> = std::result::Result<T, E>;
