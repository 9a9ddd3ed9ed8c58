//! Synchronous multi-type output

use std::sync::Arc;

use crate::buffer::FloatBuffer;
use crate::constants::*;
use crate::device::DeviceContext;
use crate::driver::{InfoTarget, ScanTarget, TriggerConfig};
use crate::enums::{DaqOutChanType, DaqOutScanFlag, ScanOption, ScanStatus, TriggerType, WaitType};
use crate::error::Result;
use crate::scan::{sample_count, ScanSlot};
use crate::structures::{DaqInChanDescriptor, DaqOutChanDescriptor, TransferStatus};

/// Synchronous output subsystem of a [`crate::DaqDevice`]
pub struct DaqoDevice {
    ctx: Arc<DeviceContext>,
    info: DaqoInfo,
    scan: ScanSlot<f64>,
}

impl DaqoDevice {
    pub(crate) fn new(ctx: Arc<DeviceContext>) -> Self {
        Self {
            info: DaqoInfo {
                ctx: Arc::clone(&ctx),
            },
            ctx,
            scan: ScanSlot::new(ScanTarget::DaqOut),
        }
    }

    pub fn info(&self) -> &DaqoInfo {
        &self.info
    }

    /// Drive `channels` in lockstep from the interleaved samples in `data`
    ///
    /// Column `i` of every scan feeds `channels[i]`. Returns the actual rate.
    pub fn daq_out_scan(
        &self,
        channels: &[DaqOutChanDescriptor],
        samples_per_channel: usize,
        rate: f64,
        options: ScanOption,
        flags: DaqOutScanFlag,
        data: &FloatBuffer,
    ) -> Result<f64> {
        let samples_per_channel = sample_count(samples_per_channel)?;
        self.scan.start(&self.ctx, data, |driver, handle| {
            driver.daq_out_scan(
                handle,
                channels,
                samples_per_channel,
                rate,
                options,
                flags,
                data,
            )
        })
    }

    /// Configure the trigger
    ///
    /// The trigger watches an input signal, so the channel is described
    /// like a synchronous input channel.
    pub fn set_trigger(
        &self,
        trig_type: TriggerType,
        trigger_channel: &DaqInChanDescriptor,
        level: f64,
        variance: f64,
        retrigger_sample_count: u32,
    ) -> Result<()> {
        let config = TriggerConfig {
            trig_type,
            level,
            variance,
            retrigger_sample_count,
        };
        self.ctx
            .driver()
            .daq_out_set_trigger(self.ctx.handle()?, trigger_channel, &config)
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

/// Synchronous output capabilities
pub struct DaqoInfo {
    ctx: Arc<DeviceContext>,
}

impl DaqoInfo {
    fn dbl(&self, item: i32) -> Result<f64> {
        self.ctx.info_dbl(InfoTarget::DaqO, item, 0)
    }

    pub fn chan_types(&self) -> Result<Vec<DaqOutChanType>> {
        self.ctx.info_list(InfoTarget::DaqO, DAQO_INFO_CHAN_TYPES, 0)
    }

    pub fn scan_options(&self) -> Result<Vec<ScanOption>> {
        self.ctx.info_list(InfoTarget::DaqO, DAQO_INFO_SCAN_OPTIONS, 0)
    }

    pub fn trigger_types(&self) -> Result<Vec<TriggerType>> {
        self.ctx.info_list(InfoTarget::DaqO, DAQO_INFO_TRIG_TYPES, 0)
    }

    pub fn fifo_size(&self) -> Result<usize> {
        self.ctx.info_count(InfoTarget::DaqO, DAQO_INFO_FIFO_SIZE, 0)
    }

    pub fn min_scan_rate(&self) -> Result<f64> {
        self.dbl(DAQO_INFO_MIN_SCAN_RATE)
    }

    pub fn max_scan_rate(&self) -> Result<f64> {
        self.dbl(DAQO_INFO_MAX_SCAN_RATE)
    }

    pub fn max_throughput(&self) -> Result<f64> {
        self.dbl(DAQO_INFO_MAX_THROUGHPUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DaqDevice;
    use crate::enums::{DaqInChanType, DigitalDirection, DigitalPortType, InterfaceType, Range};
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
    fn test_mixed_output_scan() {
        let (driver, device) = open();
        let handle = device.handle().unwrap();
        device
            .dio_device()
            .unwrap()
            .d_config_port(DigitalPortType::FirstPortA, DigitalDirection::Output)
            .unwrap();

        let daqo = device.daqo_device().unwrap();
        let channels = [
            DaqOutChanDescriptor::new(1, DaqOutChanType::ANALOG, Range::Bip10Volts),
            DaqOutChanDescriptor::new(
                DigitalPortType::FirstPortA.raw(),
                DaqOutChanType::DIGITAL,
                Range::Bip10Volts,
            ),
        ];
        let data = FloatBuffer::from_samples(2, &[2.0, 1.0, -2.0, 255.0]).unwrap();
        daqo.daq_out_scan(
            &channels,
            2,
            1000.0,
            ScanOption::DEFAULTIO,
            DaqOutScanFlag::empty(),
            &data,
        )
        .unwrap();
        driver.advance_scan(handle, ScanTarget::DaqOut, 2).unwrap();

        assert_eq!(driver.analog_output(handle, 1), Ok(Some(-2.0)));
        assert_eq!(driver.port_output(handle, DigitalPortType::FirstPortA), Ok(255));
        assert_eq!(daqo.scan_status().unwrap().0, ScanStatus::Idle);
    }

    #[test]
    fn test_continuous_output_runs_until_stopped() {
        let (_driver, device) = open();
        let daqo = device.daqo_device().unwrap();
        let channels = [DaqOutChanDescriptor::new(0, DaqOutChanType::ANALOG, Range::Bip10Volts)];
        let data = FloatBuffer::new(1, 100).unwrap();
        daqo.daq_out_scan(
            &channels,
            100,
            1000.0,
            ScanOption::CONTINUOUS,
            DaqOutScanFlag::empty(),
            &data,
        )
        .unwrap();
        assert_eq!(daqo.scan_status().unwrap().0, ScanStatus::Running);
        assert_eq!(
            daqo.scan_wait(WaitType::WaitUntilDone, 0, 0.1),
            Err(UlError::TimedOut)
        );
        daqo.scan_stop().unwrap();
        assert!(daqo.scan_buffer().is_none());
    }

    #[test]
    fn test_trigger_channel_is_an_input() {
        let (_driver, device) = open();
        let daqo = device.daqo_device().unwrap();
        let channel = DaqInChanDescriptor::new(0, DaqInChanType::ANALOG_SE, Range::Bip10Volts);
        assert!(daqo.set_trigger(TriggerType::POS_EDGE, &channel, 0.0, 0.0, 0).is_ok());
        assert_eq!(
            daqo.set_trigger(TriggerType::GATE_HIGH, &channel, 0.0, 0.0, 0),
            Err(UlError::BadTrigType)
        );
    }

    #[test]
    fn test_info() {
        let (_driver, device) = open();
        let info = device.daqo_device().unwrap().info();
        assert_eq!(
            info.chan_types(),
            Ok(vec![DaqOutChanType::ANALOG, DaqOutChanType::DIGITAL])
        );
        assert_eq!(info.max_scan_rate(), Ok(500_000.0));
    }
}
