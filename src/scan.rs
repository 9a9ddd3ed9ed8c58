//! Scan bookkeeping shared by the subsystem façades
//!
//! The driver writes into a scan buffer from its own thread until the scan
//! is idle. [`ScanSlot`] holds a clone of the buffer the subsystem handed
//! to the driver and drops it only once a status query reports `Idle`, so
//! the memory outlives the scan even if the caller lets go of its handle.
//!
//! Every accepted start bumps a generation counter. An `Idle` answer only
//! releases the buffer of the generation that was current when the query
//! was issued, so a query that raced with a newer start cannot unpin the
//! newer buffer.

use log::{debug, trace};
use parking_lot::Mutex;

use crate::buffer::{Sample, ScanBuffer};
use crate::device::DeviceContext;
use crate::driver::{ScanTarget, UlDriver};
use crate::enums::{ScanStatus, WaitType};
use crate::error::{Result, UlError};
use crate::ffi::DaqDeviceHandle;
use crate::structures::TransferStatus;

/// Native form of a per-channel sample count
pub(crate) fn sample_count(samples_per_channel: usize) -> Result<i32> {
    i32::try_from(samples_per_channel).map_err(|_| UlError::BadSampleCount)
}

struct Pinned<T: Sample> {
    generation: u64,
    buffer: Option<ScanBuffer<T>>,
}

pub(crate) struct ScanSlot<T: Sample> {
    target: ScanTarget,
    active: Mutex<Pinned<T>>,
}

impl<T: Sample> ScanSlot<T> {
    pub(crate) fn new(target: ScanTarget) -> Self {
        Self {
            target,
            active: Mutex::new(Pinned {
                generation: 0,
                buffer: None,
            }),
        }
    }

    /// Start a scan through `start` and keep `buffer` alive if it was accepted
    pub(crate) fn start<F>(
        &self,
        ctx: &DeviceContext,
        buffer: &ScanBuffer<T>,
        start: F,
    ) -> Result<f64>
    where
        F: FnOnce(&dyn UlDriver, DaqDeviceHandle) -> Result<f64>,
    {
        let handle = ctx.handle()?;
        let rate = start(ctx.driver(), handle)?;
        {
            let mut pinned = self.active.lock();
            pinned.generation += 1;
            pinned.buffer = Some(buffer.clone());
        }
        debug!(
            "{:?} scan started: {} x {} samples at {} Hz",
            self.target,
            buffer.channels(),
            buffer.samples_per_channel(),
            rate
        );
        Ok(rate)
    }

    pub(crate) fn status(&self, ctx: &DeviceContext) -> Result<(ScanStatus, TransferStatus)> {
        let handle = ctx.handle()?;
        let generation = self.generation();
        let (status, transfer) = ctx.driver().scan_status(handle, self.target)?;
        self.settle(generation, status);
        Ok((status, transfer))
    }

    /// Ask the driver to stop, then refresh the status
    ///
    /// Stopping is a request. The buffer stays pinned until a status query
    /// sees the scan idle.
    pub(crate) fn stop(&self, ctx: &DeviceContext) -> Result<()> {
        ctx.driver().scan_stop(ctx.handle()?, self.target)?;
        debug!("{:?} scan stop requested", self.target);
        self.status(ctx).map(|_| ())
    }

    pub(crate) fn wait(
        &self,
        ctx: &DeviceContext,
        wait_type: WaitType,
        wait_param: i64,
        timeout: f64,
    ) -> Result<()> {
        ctx.driver()
            .scan_wait(ctx.handle()?, self.target, wait_type, wait_param, timeout)?;
        self.status(ctx).map(|_| ())
    }

    /// Buffer of the scan that is (or may still be) running
    pub(crate) fn buffer(&self) -> Option<ScanBuffer<T>> {
        self.active.lock().buffer.clone()
    }

    fn generation(&self) -> u64 {
        self.active.lock().generation
    }

    /// Apply a status answer obtained while `generation` was current
    fn settle(&self, generation: u64, status: ScanStatus) {
        if status != ScanStatus::Idle {
            return;
        }
        let mut pinned = self.active.lock();
        if pinned.generation != generation {
            trace!("{:?} idle answer predates a newer scan", self.target);
            return;
        }
        if pinned.buffer.take().is_some() {
            trace!("{:?} scan buffer released", self.target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use crate::buffer::FloatBuffer;
    use crate::driver::ScanRequest;
    use crate::enums::{AInScanFlag, AiInputMode, InterfaceType, Range, ScanOption};
    use crate::mock::{MockDriver, MockProfile};
    use crate::structures::DaqDeviceDescriptor;

    fn context() -> (Arc<MockDriver>, DeviceContext) {
        let descriptor =
            DaqDeviceDescriptor::new("USB-1808X", 0x13d, InterfaceType::USB, "01D97CFA");
        let driver = Arc::new(
            MockDriver::new().with_device(descriptor.clone(), MockProfile::multifunction()),
        );
        let handle = driver.create_device(&descriptor).unwrap();
        driver.connect(handle).unwrap();
        let ctx = DeviceContext::new(driver.clone(), handle);
        (driver, ctx)
    }

    fn start(
        slot: &ScanSlot<f64>,
        ctx: &DeviceContext,
        buffer: &FloatBuffer,
        options: ScanOption,
    ) -> Result<f64> {
        let request = ScanRequest {
            low_channel: 0,
            high_channel: 0,
            samples_per_channel: buffer.samples_per_channel() as i32,
            rate: 100.0,
            options,
        };
        slot.start(ctx, buffer, |driver, handle| {
            driver.a_in_scan(
                handle,
                &request,
                AiInputMode::SingleEnded,
                Range::Bip10Volts,
                AInScanFlag::empty(),
                buffer,
            )
        })
    }

    #[test]
    fn test_buffer_pinned_until_idle() {
        let (_driver, ctx) = context();
        let slot = ScanSlot::new(ScanTarget::AIn);
        let buffer = FloatBuffer::new(1, 10).unwrap();
        start(&slot, &ctx, &buffer, ScanOption::CONTINUOUS).unwrap();
        assert!(slot.buffer().unwrap().shares_storage(&buffer));

        let (status, _) = slot.status(&ctx).unwrap();
        assert_eq!(status, ScanStatus::Running);
        assert!(slot.buffer().is_some());

        slot.stop(&ctx).unwrap();
        assert!(slot.buffer().is_none());
    }

    #[test]
    fn test_rejected_scan_pins_nothing() {
        let (_driver, ctx) = context();
        let slot = ScanSlot::new(ScanTarget::AIn);
        let buffer = FloatBuffer::new(1, 0).unwrap();
        assert!(start(&slot, &ctx, &buffer, ScanOption::DEFAULTIO).is_err());
        assert!(slot.buffer().is_none());
    }

    #[test]
    fn test_sample_count_bounds() {
        assert_eq!(sample_count(10_000), Ok(10_000));
        assert_eq!(sample_count(usize::MAX), Err(UlError::BadSampleCount));
    }

    #[test]
    fn test_wait_releases_finished_scan() {
        let (_driver, ctx) = context();
        let slot = ScanSlot::new(ScanTarget::AIn);
        let buffer = FloatBuffer::new(1, 10).unwrap();
        start(&slot, &ctx, &buffer, ScanOption::DEFAULTIO).unwrap();
        slot.wait(&ctx, WaitType::WaitUntilDone, 0, 1.0).unwrap();
        assert!(slot.buffer().is_none());
    }

    #[test]
    fn test_stale_idle_keeps_newer_buffer() {
        let (_driver, ctx) = context();
        let slot = ScanSlot::new(ScanTarget::AIn);
        let buffer = FloatBuffer::new(1, 10).unwrap();

        // An idle answer obtained before the scan started
        let before = slot.generation();
        start(&slot, &ctx, &buffer, ScanOption::CONTINUOUS).unwrap();
        slot.settle(before, ScanStatus::Idle);
        assert!(slot.buffer().is_some());

        slot.settle(slot.generation(), ScanStatus::Idle);
        assert!(slot.buffer().is_none());
    }

    #[test]
    fn test_concurrent_status_never_unpins_running_scan() {
        let (driver, ctx) = context();
        let handle = ctx.handle().unwrap();
        let slot = ScanSlot::new(ScanTarget::AIn);
        let buffer = FloatBuffer::new(1, 10).unwrap();
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                while !done.load(Ordering::Relaxed) {
                    let _ = slot.status(&ctx);
                }
            });

            let mut unpinned = 0;
            for _ in 0..20_000 {
                driver.scan_stop(handle, ScanTarget::AIn).unwrap();
                start(&slot, &ctx, &buffer, ScanOption::CONTINUOUS).unwrap();
                let (status, _) = driver.scan_status(handle, ScanTarget::AIn).unwrap();
                if status == ScanStatus::Running && slot.buffer().is_none() {
                    unpinned += 1;
                }
            }
            done.store(true, Ordering::Relaxed);
            assert_eq!(unpinned, 0);
        });
    }
}
