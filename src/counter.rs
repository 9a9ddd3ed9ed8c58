//! Counter subsystem

use std::sync::Arc;

use log::trace;

use crate::buffer::IntBuffer;
use crate::constants::*;
use crate::device::DeviceContext;
use crate::driver::{InfoTarget, ScanRequest, ScanTarget, TriggerTarget};
use crate::enums::{
    CInScanFlag, CounterMeasurementMode, CounterMeasurementType, CounterRegisterType, ScanOption,
    ScanStatus, TriggerType, WaitType,
};
use crate::error::Result;
use crate::scan::{sample_count, ScanSlot};
use crate::structures::{CounterScanConfig, TransferStatus};
use crate::utils::to_u32;

/// Counter subsystem of a [`crate::DaqDevice`]
pub struct CtrDevice {
    ctx: Arc<DeviceContext>,
    info: CtrInfo,
    scan: ScanSlot<u64>,
}

impl CtrDevice {
    pub(crate) fn new(ctx: Arc<DeviceContext>) -> Self {
        Self {
            info: CtrInfo {
                ctx: Arc::clone(&ctx),
            },
            ctx,
            scan: ScanSlot::new(ScanTarget::CIn),
        }
    }

    pub fn info(&self) -> &CtrInfo {
        &self.info
    }

    /// Current count of `counter`
    pub fn c_in(&self, counter: i32) -> Result<u64> {
        self.ctx.driver().c_in(self.ctx.handle()?, counter)
    }

    pub fn c_read(&self, counter: i32, register: CounterRegisterType) -> Result<u64> {
        self.ctx
            .driver()
            .c_read(self.ctx.handle()?, counter, register)
    }

    /// Write `value` into a counter register
    ///
    /// Loading `LOAD` also presets the count.
    pub fn c_load(&self, counter: i32, register: CounterRegisterType, value: u64) -> Result<()> {
        self.ctx
            .driver()
            .c_load(self.ctx.handle()?, counter, register, value)?;
        trace!("Counter {} {:?} loaded with {}", counter, register, value);
        Ok(())
    }

    pub fn c_clear(&self, counter: i32) -> Result<()> {
        self.ctx.driver().c_clear(self.ctx.handle()?, counter)
    }

    /// Select what `counter` measures during subsequent scans
    pub fn c_config_scan(&self, counter: i32, config: &CounterScanConfig) -> Result<()> {
        self.ctx
            .driver()
            .c_config_scan(self.ctx.handle()?, counter, config)
    }

    /// Scan counters `low_counter..=high_counter` into `data`
    ///
    /// Counters are cleared when the scan starts unless
    /// `CInScanFlag::NOCLEAR` is given.
    #[allow(clippy::too_many_arguments)]
    pub fn c_in_scan(
        &self,
        low_counter: i32,
        high_counter: i32,
        samples_per_counter: usize,
        rate: f64,
        options: ScanOption,
        flags: CInScanFlag,
        data: &IntBuffer,
    ) -> Result<f64> {
        let request = ScanRequest {
            low_channel: low_counter,
            high_channel: high_counter,
            samples_per_channel: sample_count(samples_per_counter)?,
            rate,
            options,
        };
        self.scan.start(&self.ctx, data, |driver, handle| {
            driver.c_in_scan(handle, &request, flags, data)
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
            TriggerTarget::CIn,
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

    pub fn scan_buffer(&self) -> Option<IntBuffer> {
        self.scan.buffer()
    }
}

/// Counter capabilities
pub struct CtrInfo {
    ctx: Arc<DeviceContext>,
}

impl CtrInfo {
    fn dbl(&self, item: i32) -> Result<f64> {
        self.ctx.info_dbl(InfoTarget::Ctr, item, 0)
    }

    pub fn num_ctrs(&self) -> Result<usize> {
        self.ctx.info_count(InfoTarget::Ctr, CTR_INFO_NUM_CTRS, 0)
    }

    /// What `counter` can measure
    pub fn measurement_types(&self, counter: u32) -> Result<Vec<CounterMeasurementType>> {
        self.ctx
            .info_list(InfoTarget::Ctr, CTR_INFO_MEASUREMENT_TYPES, counter)
    }

    /// Modes valid for one measurement type
    pub fn measurement_modes(
        &self,
        measurement_type: CounterMeasurementType,
    ) -> Result<Vec<CounterMeasurementMode>> {
        self.ctx.info_list(
            InfoTarget::Ctr,
            CTR_INFO_MEASUREMENT_MODES,
            measurement_type.bits(),
        )
    }

    pub fn register_types(&self) -> Result<Vec<CounterRegisterType>> {
        self.ctx.info_list(InfoTarget::Ctr, CTR_INFO_REGISTER_TYPES, 0)
    }

    /// Counter width in bits
    pub fn resolution(&self) -> Result<u32> {
        self.ctx
            .info(InfoTarget::Ctr, CTR_INFO_RESOLUTION, 0)
            .map(to_u32)
    }

    pub fn has_pacer(&self) -> Result<bool> {
        self.ctx.info_flag(InfoTarget::Ctr, CTR_INFO_HAS_PACER, 0)
    }

    pub fn scan_options(&self) -> Result<Vec<ScanOption>> {
        self.ctx.info_list(InfoTarget::Ctr, CTR_INFO_SCAN_OPTIONS, 0)
    }

    pub fn trigger_types(&self) -> Result<Vec<TriggerType>> {
        self.ctx.info_list(InfoTarget::Ctr, CTR_INFO_TRIG_TYPES, 0)
    }

    pub fn fifo_size(&self) -> Result<usize> {
        self.ctx.info_count(InfoTarget::Ctr, CTR_INFO_FIFO_SIZE, 0)
    }

    pub fn min_scan_rate(&self) -> Result<f64> {
        self.dbl(CTR_INFO_MIN_SCAN_RATE)
    }

    pub fn max_scan_rate(&self) -> Result<f64> {
        self.dbl(CTR_INFO_MAX_SCAN_RATE)
    }

    pub fn max_throughput(&self) -> Result<f64> {
        self.dbl(CTR_INFO_MAX_THROUGHPUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DaqDevice;
    use crate::enums::{CounterEdgeDetection, InterfaceType};
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
    fn test_load_read_clear() {
        let (driver, device) = open();
        let ctr = device.ctr_device().unwrap();
        driver.set_counter(device.handle().unwrap(), 0, 42).unwrap();
        assert_eq!(ctr.c_in(0), Ok(42));

        ctr.c_load(0, CounterRegisterType::LOAD, 1000).unwrap();
        assert_eq!(ctr.c_in(0), Ok(1000));
        assert_eq!(ctr.c_read(0, CounterRegisterType::LOAD), Ok(1000));
        assert_eq!(
            ctr.c_load(0, CounterRegisterType::COUNT, 5),
            Err(UlError::BadCtrReg)
        );

        ctr.c_clear(0).unwrap();
        assert_eq!(ctr.c_in(0), Ok(0));
        assert_eq!(ctr.c_in(4), Err(UlError::BadCtr));
    }

    #[test]
    fn test_info() {
        let (_driver, device) = open();
        let info = device.ctr_device().unwrap().info();
        assert_eq!(info.num_ctrs(), Ok(4));
        assert_eq!(info.measurement_types(2), Ok(vec![CounterMeasurementType::ENCODER]));
        assert_eq!(
            info.measurement_modes(CounterMeasurementType::PULSE_WIDTH),
            Ok(vec![
                CounterMeasurementMode::PULSE_WIDTH_GATING_ON,
                CounterMeasurementMode::PULSE_WIDTH_INVERT_GATE
            ])
        );
        assert_eq!(info.register_types().unwrap().len(), 6);
        assert_eq!(info.resolution(), Ok(32));
    }

    #[test]
    fn test_config_scan_checks_type() {
        let (driver, device) = open();
        let ctr = device.ctr_device().unwrap();
        let period = CounterScanConfig {
            measurement_type: CounterMeasurementType::PERIOD,
            measurement_mode: CounterMeasurementMode::PERIOD_X10,
            edge_detection: CounterEdgeDetection::FallingEdge,
            ..CounterScanConfig::default()
        };
        ctr.c_config_scan(1, &period).unwrap();
        assert_eq!(driver.counter_config(device.handle().unwrap(), 1), Ok(Some(period)));
        assert_eq!(ctr.c_config_scan(3, &period), Err(UlError::BadCtrMeasureType));

        let bad_mode = CounterScanConfig {
            measurement_mode: CounterMeasurementMode::ENCODER_X4,
            ..period
        };
        assert_eq!(ctr.c_config_scan(1, &bad_mode), Err(UlError::BadCtrMeasureMode));
    }

    #[test]
    fn test_scan_clears_unless_noclear() {
        let (driver, device) = open();
        let handle = device.handle().unwrap();
        let ctr = device.ctr_device().unwrap();
        driver.set_counter(handle, 0, 500).unwrap();
        driver.set_counter(handle, 1, 500).unwrap();

        let data = IntBuffer::new(1, 2).unwrap();
        ctr.c_in_scan(0, 0, 2, 10.0, ScanOption::DEFAULTIO, CInScanFlag::empty(), &data)
            .unwrap();
        driver.advance_scan(handle, ScanTarget::CIn, 2).unwrap();
        assert_eq!(data.to_vec(), vec![1, 2]);
        assert_eq!(ctr.scan_status().unwrap().0, ScanStatus::Idle);

        let data = IntBuffer::new(1, 2).unwrap();
        ctr.c_in_scan(1, 1, 2, 10.0, ScanOption::DEFAULTIO, CInScanFlag::NOCLEAR, &data)
            .unwrap();
        driver.advance_scan(handle, ScanTarget::CIn, 1).unwrap();
        assert_eq!(data.get(0), Some(501));
    }
}
