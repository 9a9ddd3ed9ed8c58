//! Analog output subsystem

use std::sync::Arc;

use crate::buffer::FloatBuffer;
use crate::constants::*;
use crate::device::DeviceContext;
use crate::driver::{InfoTarget, ScanRequest, ScanTarget, TriggerTarget};
use crate::enums::{AOutFlag, AOutScanFlag, Range, ScanOption, ScanStatus, TriggerType, WaitType};
use crate::error::Result;
use crate::scan::{sample_count, ScanSlot};
use crate::structures::TransferStatus;
use crate::utils::to_u32;

/// Analog output subsystem of a [`crate::DaqDevice`]
pub struct AoDevice {
    ctx: Arc<DeviceContext>,
    info: AoInfo,
    scan: ScanSlot<f64>,
}

impl AoDevice {
    pub(crate) fn new(ctx: Arc<DeviceContext>) -> Self {
        Self {
            info: AoInfo {
                ctx: Arc::clone(&ctx),
            },
            ctx,
            scan: ScanSlot::new(ScanTarget::AOut),
        }
    }

    pub fn info(&self) -> &AoInfo {
        &self.info
    }

    /// Write one value to `channel`
    ///
    /// `value` is in volts, or in raw counts with `AOutFlag::NOSCALEDATA`.
    pub fn a_out(&self, channel: i32, range: Range, flags: AOutFlag, value: f64) -> Result<()> {
        self.ctx
            .driver()
            .a_out(self.ctx.handle()?, channel, range, flags, value)
    }

    /// Start generating the interleaved samples in `data`
    ///
    /// The buffer must be filled before the call. Returns the rate the
    /// hardware actually runs at.
    #[allow(clippy::too_many_arguments)]
    pub fn a_out_scan(
        &self,
        low_channel: i32,
        high_channel: i32,
        range: Range,
        samples_per_channel: usize,
        rate: f64,
        options: ScanOption,
        flags: AOutScanFlag,
        data: &FloatBuffer,
    ) -> Result<f64> {
        let request = ScanRequest {
            low_channel,
            high_channel,
            samples_per_channel: sample_count(samples_per_channel)?,
            rate,
            options,
        };
        self.scan.start(&self.ctx, data, |driver, handle| {
            driver.a_out_scan(handle, &request, range, flags, data)
        })
    }

    pub fn set_trigger(
        &self,
        trig_type: TriggerType,
        trigger_channel: i32,
        level: f64,
        variance: f64,
        retrigger_sample_count: u32,
    ) -> Result<()> {
        self.ctx.set_trigger(
            TriggerTarget::AOut,
            trigger_channel,
            trig_type,
            level,
            variance,
            retrigger_sample_count,
        )
    }

    pub fn scan_status(&self) -> Result<(ScanStatus, TransferStatus)> {
        self.scan.status(&self.ctx)
    }

    pub fn scan_stop(&self) -> Result<()> {
        self.scan.stop(&self.ctx)
    }

    pub fn scan_wait(&self, wait_type: WaitType, wait_param: i64, timeout: f64) -> Result<()> {
        self.scan.wait(&self.ctx, wait_type, wait_param, timeout)
    }

    pub fn scan_buffer(&self) -> Option<FloatBuffer> {
        self.scan.buffer()
    }
}

/// Analog output capabilities
pub struct AoInfo {
    ctx: Arc<DeviceContext>,
}

impl AoInfo {
    fn dbl(&self, item: i32) -> Result<f64> {
        self.ctx.info_dbl(InfoTarget::Ao, item, 0)
    }

    /// D/A resolution in bits
    pub fn resolution(&self) -> Result<u32> {
        self.ctx.info(InfoTarget::Ao, AO_INFO_RESOLUTION, 0).map(to_u32)
    }

    pub fn num_chans(&self) -> Result<usize> {
        self.ctx.info_count(InfoTarget::Ao, AO_INFO_NUM_CHANS, 0)
    }

    pub fn scan_options(&self) -> Result<Vec<ScanOption>> {
        self.ctx.info_list(InfoTarget::Ao, AO_INFO_SCAN_OPTIONS, 0)
    }

    pub fn has_pacer(&self) -> Result<bool> {
        self.ctx.info_flag(InfoTarget::Ao, AO_INFO_HAS_PACER, 0)
    }

    pub fn ranges(&self) -> Result<Vec<Range>> {
        let count = self.ctx.info_count(InfoTarget::Ao, AO_INFO_NUM_RANGES, 0)?;
        (0..count as u32)
            .map(|index| Range::from_raw(self.ctx.info(InfoTarget::Ao, AO_INFO_RANGE, index)?))
            .collect()
    }

    pub fn trigger_types(&self) -> Result<Vec<TriggerType>> {
        self.ctx.info_list(InfoTarget::Ao, AO_INFO_TRIG_TYPES, 0)
    }

    pub fn fifo_size(&self) -> Result<usize> {
        self.ctx.info_count(InfoTarget::Ao, AO_INFO_FIFO_SIZE, 0)
    }

    pub fn min_scan_rate(&self) -> Result<f64> {
        self.dbl(AO_INFO_MIN_SCAN_RATE)
    }

    pub fn max_scan_rate(&self) -> Result<f64> {
        self.dbl(AO_INFO_MAX_SCAN_RATE)
    }

    pub fn max_throughput(&self) -> Result<f64> {
        self.dbl(AO_INFO_MAX_THROUGHPUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DaqDevice;
    use crate::enums::InterfaceType;
    use crate::error::UlError;
    use crate::mock::{MockDriver, MockProfile};
    use crate::structures::DaqDeviceDescriptor;

    fn open() -> (Arc<MockDriver>, DaqDevice) {
        let descriptor =
            DaqDeviceDescriptor::new("USB-1808X", 0x13d, InterfaceType::USB, "01D97CFA");
        let driver = Arc::new(
            MockDriver::new().with_device(descriptor.clone(), MockProfile::multifunction()),
        );
        let device = DaqDevice::with_driver(driver.clone(), &descriptor).unwrap();
        device.connect().unwrap();
        (driver, device)
    }

    #[test]
    fn test_a_out() {
        let (driver, device) = open();
        let ao = device.ao_device().unwrap();
        ao.a_out(1, Range::Bip10Volts, AOutFlag::empty(), -3.5).unwrap();
        assert_eq!(driver.analog_output(device.handle().unwrap(), 1), Ok(Some(-3.5)));
        assert_eq!(
            ao.a_out(0, Range::Bip10Volts, AOutFlag::empty(), 12.0),
            Err(UlError::BadDaVal)
        );
        assert_eq!(
            ao.a_out(0, Range::Bip5Volts, AOutFlag::empty(), 1.0),
            Err(UlError::BadRange)
        );
    }

    #[test]
    fn test_info() {
        let (_driver, device) = open();
        let info = device.ao_device().unwrap().info();
        assert_eq!(info.resolution(), Ok(16));
        assert_eq!(info.num_chans(), Ok(2));
        assert_eq!(info.ranges(), Ok(vec![Range::Bip10Volts]));
        assert!(info.has_pacer().unwrap());
        assert_eq!(info.max_scan_rate(), Ok(500_000.0));
        assert!(info.scan_options().unwrap().contains(&ScanOption::CONTINUOUS));
    }

    #[test]
    fn test_scan_drives_outputs() {
        let (driver, device) = open();
        let handle = device.handle().unwrap();
        let ao = device.ao_device().unwrap();
        let data = FloatBuffer::new(2, 3).unwrap();
        for (index, volts) in [0.5, -0.5, 1.0, -1.0, 1.5, -1.5].into_iter().enumerate() {
            data.set(index, volts);
        }
        ao.a_out_scan(
            0,
            1,
            Range::Bip10Volts,
            3,
            1000.0,
            ScanOption::DEFAULTIO,
            AOutScanFlag::empty(),
            &data,
        )
        .unwrap();
        assert!(ao.scan_buffer().is_some());

        driver.advance_scan(handle, ScanTarget::AOut, 3).unwrap();
        assert_eq!(driver.analog_output(handle, 0), Ok(Some(1.5)));
        assert_eq!(driver.analog_output(handle, 1), Ok(Some(-1.5)));
        let (status, transfer) = ao.scan_status().unwrap();
        assert_eq!(status, ScanStatus::Idle);
        assert_eq!(transfer.current_total_count, 6);
        assert!(ao.scan_buffer().is_none());
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let (_driver, device) = open();
        let ao = device.ao_device().unwrap();
        let data = FloatBuffer::new(1, 3).unwrap();
        let result = ao.a_out_scan(
            0,
            1,
            Range::Bip10Volts,
            3,
            1000.0,
            ScanOption::DEFAULTIO,
            AOutScanFlag::empty(),
            &data,
        );
        assert_eq!(result, Err(UlError::BadBufferSize));
    }
}
