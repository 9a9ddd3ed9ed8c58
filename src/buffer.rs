//! Scan buffers
//!
//! A scan writes into caller-owned memory from a driver thread while the
//! caller keeps reading it. [`ScanBuffer`] owns that memory behind an
//! `Arc` so the subsystem that started the scan can hold it alive until
//! the scan is stopped, and exposes element access through volatile
//! reads and writes only. Nothing here synchronizes with the driver:
//! read behind the write index reported in [`TransferStatus`].

use std::cell::UnsafeCell;
use std::sync::Arc;

use crate::error::{Result, UlError};
use crate::structures::TransferStatus;

mod sealed {
    pub trait Sealed {}
    impl Sealed for f64 {}
    impl Sealed for u64 {}
}

/// Sample widths the driver writes: `f64` for analog and synchronous
/// scans, `u64` for digital and counter scans
pub trait Sample: sealed::Sealed + Copy + Default + Send + Sync + 'static {}

impl Sample for f64 {}
impl Sample for u64 {}

/// Flat interleaved sample buffer of `channels * samples_per_channel`
/// elements
pub struct ScanBuffer<T: Sample> {
    data: Arc<[UnsafeCell<T>]>,
    channels: usize,
}

// SAFETY: elements are plain `Copy` numbers and are only touched through
// volatile single-element reads and writes; tearing between the driver
// thread and the reader is the documented caller concern.
unsafe impl<T: Sample> Send for ScanBuffer<T> {}
unsafe impl<T: Sample> Sync for ScanBuffer<T> {}

impl<T: Sample> Clone for ScanBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            channels: self.channels,
        }
    }
}

impl<T: Sample> ScanBuffer<T> {
    /// Allocate a zeroed buffer for `channels` channels of
    /// `samples_per_channel` samples each
    ///
    /// Fails with [`UlError::BadBuffer`] for zero channels and with
    /// [`UlError::BadBufferSize`] when the element count overflows. Zero
    /// samples per channel is allowed; scans reject such a buffer.
    pub fn new(channels: usize, samples_per_channel: usize) -> Result<Self> {
        if channels == 0 {
            return Err(UlError::BadBuffer);
        }
        let len = channels
            .checked_mul(samples_per_channel)
            .ok_or(UlError::BadBufferSize)?;
        let data: Arc<[UnsafeCell<T>]> = (0..len).map(|_| UnsafeCell::new(T::default())).collect();
        Ok(Self { data, channels })
    }

    /// Build a buffer holding `samples`, laid out as `channels` columns
    ///
    /// `samples.len()` must be a whole number of scans.
    pub fn from_samples(channels: usize, samples: &[T]) -> Result<Self> {
        if channels == 0 {
            return Err(UlError::BadBuffer);
        }
        if samples.len() % channels != 0 {
            return Err(UlError::BadBufferSize);
        }
        let data: Arc<[UnsafeCell<T>]> = samples.iter().map(|&s| UnsafeCell::new(s)).collect();
        Ok(Self { data, channels })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn samples_per_channel(&self) -> usize {
        self.data.len() / self.channels
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.data.get(index).map(|cell| {
            // SAFETY: the pointer comes from a live element of `data`.
            unsafe { std::ptr::read_volatile(cell.get()) }
        })
    }

    /// Store `value` at `index`; out of range writes are ignored
    pub fn set(&self, index: usize, value: T) {
        if let Some(cell) = self.data.get(index) {
            // SAFETY: the pointer comes from a live element of `data`.
            unsafe { std::ptr::write_volatile(cell.get(), value) }
        }
    }

    /// Overwrite the buffer from `samples`, starting at index zero
    pub fn copy_from_slice(&self, samples: &[T]) {
        for (index, &value) in samples.iter().enumerate().take(self.len()) {
            self.set(index, value);
        }
    }

    /// Snapshot of the whole buffer
    pub fn to_vec(&self) -> Vec<T> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }

    /// True when both handles point at the same allocation
    pub fn shares_storage(&self, other: &ScanBuffer<T>) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Samples of the most recently completed scan, one per channel
    pub fn latest_scan(&self, status: &TransferStatus) -> Option<Vec<T>> {
        let start = status.latest_index()?;
        if self.is_empty() {
            return None;
        }
        Some(
            (0..self.channels)
                .filter_map(|ch| self.get((start + ch) % self.len()))
                .collect(),
        )
    }

    /// Up to `count` of the most recently completed scans, oldest first
    ///
    /// Walks backward from the reported write index modulo the buffer
    /// length, so it stays valid for continuous scans that have wrapped.
    pub fn recent(&self, status: &TransferStatus, count: usize) -> Vec<Vec<T>> {
        let Some(start) = status.latest_index() else {
            return Vec::new();
        };
        if self.is_empty() {
            return Vec::new();
        }
        let available = usize::try_from(status.current_scan_count)
            .unwrap_or(usize::MAX)
            .min(self.samples_per_channel());
        let count = count.min(available);
        let len = self.len();
        (0..count)
            .rev()
            .map(|back| {
                let offset = (back * self.channels) % len;
                let scan_start = (start + len - offset) % len;
                (0..self.channels)
                    .filter_map(|ch| self.get((scan_start + ch) % len))
                    .collect()
            })
            .collect()
    }

    /// Raw pointer handed to the driver for the duration of a scan
    pub(crate) fn as_mut_ptr(&self) -> *mut T {
        UnsafeCell::raw_get(self.data.as_ptr())
    }
}

impl<T: Sample + std::fmt::Debug> std::fmt::Debug for ScanBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanBuffer")
            .field("channels", &self.channels)
            .field("samples_per_channel", &self.samples_per_channel())
            .finish()
    }
}

/// Buffer for analog and synchronous scans
pub type FloatBuffer = ScanBuffer<f64>;
/// Buffer for digital and counter scans
pub type IntBuffer = ScanBuffer<u64>;

/// Allocate a buffer for an analog or synchronous scan
pub fn create_float_buffer(channels: usize, samples_per_channel: usize) -> Result<FloatBuffer> {
    ScanBuffer::new(channels, samples_per_channel)
}

/// Allocate a buffer for a digital or counter scan
pub fn create_int_buffer(channels: usize, samples_per_channel: usize) -> Result<IntBuffer> {
    ScanBuffer::new(channels, samples_per_channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(channels: usize, samples: usize) -> FloatBuffer {
        let buf = create_float_buffer(channels, samples).unwrap();
        for i in 0..buf.len() {
            buf.set(i, i as f64);
        }
        buf
    }

    #[test]
    fn test_buffer_shape() {
        let buf = create_int_buffer(4, 100).unwrap();
        assert_eq!(buf.len(), 400);
        assert_eq!(buf.channels(), 4);
        assert_eq!(buf.samples_per_channel(), 100);
        assert_eq!(buf.get(400), None);
    }

    #[test]
    fn test_clone_shares_storage() {
        let buf = create_float_buffer(2, 4).unwrap();
        let other = buf.clone();
        other.set(3, 1.5);
        assert_eq!(buf.get(3), Some(1.5));
        assert!(buf.shares_storage(&other));
    }

    #[test]
    fn test_latest_scan() {
        let buf = ramp(2, 5);
        let status = TransferStatus {
            current_scan_count: 3,
            current_total_count: 6,
            current_index: 4,
        };
        assert_eq!(buf.latest_scan(&status), Some(vec![4.0, 5.0]));
        assert_eq!(buf.latest_scan(&TransferStatus::default()), None);
    }

    #[test]
    fn test_recent_wraps() {
        let buf = ramp(2, 5);
        // Scan 7 landed at index 2 after wrapping once
        let status = TransferStatus {
            current_scan_count: 7,
            current_total_count: 14,
            current_index: 2,
        };
        let scans = buf.recent(&status, 3);
        assert_eq!(scans, vec![vec![8.0, 9.0], vec![0.0, 1.0], vec![2.0, 3.0]]);
    }

    #[test]
    fn test_recent_limited_by_available() {
        let buf = ramp(1, 10);
        let status = TransferStatus {
            current_scan_count: 2,
            current_total_count: 2,
            current_index: 1,
        };
        assert_eq!(buf.recent(&status, 5), vec![vec![0.0], vec![1.0]]);
    }

    #[test]
    fn test_degenerate_shapes_are_rejected() {
        assert_eq!(FloatBuffer::new(0, 10).unwrap_err(), UlError::BadBuffer);
        assert_eq!(
            IntBuffer::new(2, usize::MAX).unwrap_err(),
            UlError::BadBufferSize
        );
        assert_eq!(
            FloatBuffer::from_samples(0, &[1.0]).unwrap_err(),
            UlError::BadBuffer
        );
        assert_eq!(
            FloatBuffer::from_samples(2, &[1.0, 2.0, 3.0]).unwrap_err(),
            UlError::BadBufferSize
        );

        let empty = FloatBuffer::new(3, 0).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.channels(), 3);
    }

    #[test]
    fn test_from_samples_keeps_layout() {
        let buf = IntBuffer::from_samples(2, &[1, 2, 3, 4]).unwrap();
        assert_eq!(buf.samples_per_channel(), 2);
        assert_eq!(buf.to_vec(), vec![1, 2, 3, 4]);
    }
}
