//! Device error codes.
//!
//! Every fallible device operation reports one of these. Errors raised while a
//! stream executes work become *sticky*: the stream keeps the first one and
//! returns it from every later operation (see [`crate::Stream`]).

use thiserror::Error;

/// Device runtime error codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The allocator could not satisfy a request.
    #[error("device out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },

    /// Grid or block dimensions are outside the device limits.
    #[error("invalid launch configuration for `{kernel}`: {reason}")]
    InvalidLaunch { kernel: &'static str, reason: String },

    /// A kernel addressed memory outside an allocation.
    #[error("illegal address: index {index} outside allocation of {len} elements")]
    IllegalAddress { index: usize, len: usize },

    /// A kernel or memory operation failed while executing.
    #[error("`{kernel}` failed: {reason}")]
    LaunchFailure { kernel: &'static str, reason: String },

    /// Source and destination of a copy disagree in length.
    #[error("size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

impl DeviceError {
    /// Whether this error came from the allocator.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, DeviceError::OutOfMemory { .. })
    }
}

/// Result alias for device operations.
pub type Result<T, E = DeviceError> = std::result::Result<T, E>;
