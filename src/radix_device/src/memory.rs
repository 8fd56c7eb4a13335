//! Device handle and device memory.
//!
//! Memory is host-backed but accounted against the device's memory budget, so
//! allocation failures behave like they do on hardware: a request larger than
//! the remaining budget fails with [`DeviceError::OutOfMemory`] and nothing is
//! allocated. Allocations return their bytes to the budget when dropped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::Mutex;

use crate::error::{DeviceError, Result};
use crate::stream::Stream;

// ============================================================================
// Device
// ============================================================================

/// Static properties of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProperties {
    /// Human-readable device name.
    pub name: String,
    /// Total memory available to allocations, in bytes.
    pub total_memory: usize,
    /// Largest number of threads per block a launch may request.
    pub max_block_dim: u32,
}

impl Default for DeviceProperties {
    fn default() -> Self {
        Self {
            name: "host-emulated device".to_string(),
            total_memory: 4 << 30,
            max_block_dim: 1024,
        }
    }
}

static NEXT_DEVICE_ORDINAL: AtomicU64 = AtomicU64::new(0);

pub(crate) struct DeviceInner {
    pub(crate) ordinal: u64,
    pub(crate) properties: DeviceProperties,
    used: Mutex<usize>,
}

impl DeviceInner {
    fn available(&self) -> usize {
        self.properties.total_memory.saturating_sub(*self.used.lock())
    }
}

/// Handle to a device. Cheap to clone; clones share the memory budget.
///
/// # Example
///
/// ```
/// use radix_device::Device;
///
/// let device = Device::host();
/// let stream = device.create_stream();
/// let keys = device.upload(&[3u32, 1, 2]).unwrap();
/// assert_eq!(keys.len(), 3);
/// stream.synchronize().unwrap();
/// ```
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

impl Device {
    /// Create a device with the given properties.
    pub fn new(properties: DeviceProperties) -> Self {
        let ordinal = NEXT_DEVICE_ORDINAL.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            ordinal,
            name = %properties.name,
            total_memory = properties.total_memory,
            "device created"
        );
        Self {
            inner: Arc::new(DeviceInner {
                ordinal,
                properties,
                used: Mutex::new(0),
            }),
        }
    }

    /// Create a device with default properties.
    pub fn host() -> Self {
        Self::new(DeviceProperties::default())
    }

    /// Create a device whose memory budget is `total_memory` bytes.
    pub fn with_memory_limit(total_memory: usize) -> Self {
        Self::new(DeviceProperties {
            total_memory,
            ..DeviceProperties::default()
        })
    }

    /// Device properties.
    pub fn properties(&self) -> &DeviceProperties {
        &self.inner.properties
    }

    /// Bytes currently allocated on this device.
    pub fn memory_in_use(&self) -> usize {
        *self.inner.used.lock()
    }

    /// Bytes still available for allocation.
    pub fn memory_available(&self) -> usize {
        self.inner.available()
    }

    /// Create a new in-order stream on this device.
    pub fn create_stream(&self) -> Stream {
        Stream::new(Arc::clone(&self.inner))
    }

    /// Allocate a zero-initialized buffer of `len` elements.
    pub fn alloc<T: Pod>(&self, len: usize) -> Result<DeviceBuffer<T>> {
        let bytes = len
            .checked_mul(std::mem::size_of::<T>())
            .ok_or_else(|| DeviceError::OutOfMemory {
                requested: usize::MAX,
                available: self.inner.available(),
            })?;
        let lease = self.reserve(bytes)?;

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| DeviceError::OutOfMemory {
                requested: bytes,
                available: self.inner.available(),
            })?;
        data.resize(len, T::zeroed());

        Ok(DeviceBuffer {
            data,
            _lease: lease,
        })
    }

    /// Allocate a buffer and copy `data` into it.
    pub fn upload<T: Pod>(&self, data: &[T]) -> Result<DeviceBuffer<T>> {
        let mut buffer = self.alloc(data.len())?;
        buffer.copy_from_host(data)?;
        Ok(buffer)
    }

    /// Allocate an opaque temporary storage region of `bytes` bytes.
    pub fn alloc_temporary(&self, bytes: usize) -> Result<TemporaryStorage> {
        let lease = self.reserve(bytes)?;
        let words = bytes.div_ceil(std::mem::size_of::<u64>());

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(words)
            .map_err(|_| DeviceError::OutOfMemory {
                requested: bytes,
                available: self.inner.available(),
            })?;
        storage.resize(words, 0u64);

        Ok(TemporaryStorage {
            words: storage,
            len: bytes,
            _lease: lease,
        })
    }

    fn reserve(&self, bytes: usize) -> Result<MemoryLease> {
        let mut used = self.inner.used.lock();
        let available = self.inner.properties.total_memory.saturating_sub(*used);
        if bytes > available {
            tracing::warn!(
                ordinal = self.inner.ordinal,
                requested = bytes,
                available,
                "device allocation failed"
            );
            return Err(DeviceError::OutOfMemory {
                requested: bytes,
                available,
            });
        }
        *used += bytes;
        Ok(MemoryLease {
            device: Arc::clone(&self.inner),
            bytes,
        })
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("ordinal", &self.inner.ordinal)
            .field("properties", &self.inner.properties)
            .field("memory_in_use", &self.memory_in_use())
            .finish()
    }
}

/// Bytes held against a device's budget until dropped.
struct MemoryLease {
    device: Arc<DeviceInner>,
    bytes: usize,
}

impl Drop for MemoryLease {
    fn drop(&mut self) {
        let mut used = self.device.used.lock();
        *used = used.saturating_sub(self.bytes);
    }
}

// ============================================================================
// Device Buffer
// ============================================================================

/// Typed device allocation. Freed on drop.
pub struct DeviceBuffer<T: Pod> {
    data: Vec<T>,
    _lease: MemoryLease,
}

impl<T: Pod> DeviceBuffer<T> {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size in bytes.
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of_val(self.data.as_slice())
    }

    /// Copy `src` from the host into the start of this buffer.
    pub fn copy_from_host(&mut self, src: &[T]) -> Result<()> {
        if src.len() > self.data.len() {
            return Err(DeviceError::SizeMismatch {
                expected: self.data.len(),
                actual: src.len(),
            });
        }
        self.data[..src.len()].copy_from_slice(src);
        Ok(())
    }

    /// Copy the start of this buffer into `dst` on the host.
    pub fn copy_to_host(&self, dst: &mut [T]) -> Result<()> {
        if dst.len() > self.data.len() {
            return Err(DeviceError::SizeMismatch {
                expected: self.data.len(),
                actual: dst.len(),
            });
        }
        dst.copy_from_slice(&self.data[..dst.len()]);
        Ok(())
    }

    /// Download the whole buffer.
    pub fn to_host(&self) -> Vec<T> {
        self.data.clone()
    }

    /// Device view for kernel arguments.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable device view for kernel arguments.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for DeviceBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("len", &self.data.len())
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}

// ============================================================================
// Temporary Storage
// ============================================================================

/// Opaque scratch region handed to device algorithms.
///
/// The base is 8-byte aligned, so algorithms can carve typed sections out of
/// it at any offset that is a multiple of their element alignment.
pub struct TemporaryStorage {
    words: Vec<u64>,
    len: usize,
    _lease: MemoryLease,
}

impl TemporaryStorage {
    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw bytes of the region.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..len]
    }
}

impl fmt::Debug for TemporaryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryStorage")
            .field("len", &self.len)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_zeroed() {
        let device = Device::host();
        let buffer = device.alloc::<u64>(16).unwrap();
        assert_eq!(buffer.len(), 16);
        assert_eq!(buffer.size_bytes(), 128);
        assert!(buffer.to_host().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_upload_download() {
        let device = Device::host();
        let buffer = device.upload(&[1.5f32, -2.0, 3.25]).unwrap();
        let mut host = [0.0f32; 3];
        buffer.copy_to_host(&mut host).unwrap();
        assert_eq!(host, [1.5, -2.0, 3.25]);
    }

    #[test]
    fn test_copy_from_host_too_large() {
        let device = Device::host();
        let mut buffer = device.alloc::<u32>(2).unwrap();
        let err = buffer.copy_from_host(&[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            DeviceError::SizeMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_memory_accounting_released_on_drop() {
        let device = Device::with_memory_limit(1024);
        {
            let _a = device.alloc::<u32>(100).unwrap();
            let _t = device.alloc_temporary(200).unwrap();
            assert_eq!(device.memory_in_use(), 600);
            assert_eq!(device.memory_available(), 424);
        }
        assert_eq!(device.memory_in_use(), 0);
    }

    #[test]
    fn test_out_of_memory() {
        let device = Device::with_memory_limit(64);
        let _held = device.alloc::<u8>(60).unwrap();
        let err = device.alloc::<u32>(2).unwrap_err();
        assert_eq!(
            err,
            DeviceError::OutOfMemory {
                requested: 8,
                available: 4
            }
        );
        // Failed allocations do not leak budget.
        assert_eq!(device.memory_in_use(), 60);
    }

    #[test]
    fn test_size_overflow_is_out_of_memory() {
        let device = Device::host();
        assert!(device.alloc::<u64>(usize::MAX).unwrap_err().is_out_of_memory());
    }

    #[test]
    fn test_temporary_storage_bytes() {
        let device = Device::host();
        let mut storage = device.alloc_temporary(13).unwrap();
        assert_eq!(storage.len(), 13);
        assert_eq!(storage.as_bytes_mut().len(), 13);
        assert_eq!(storage.as_bytes_mut().as_ptr() as usize % 8, 0);

        let empty = device.alloc_temporary(0).unwrap();
        assert!(empty.is_empty());
    }
}
