//! Analog input subsystem
//!
//! [`AiDevice`] wraps single-sample reads, paced scans and the
//! channel-gain queue. Capabilities are reported by [`AiInfo`] and
//! per-channel settings live in [`AiConfig`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::debug;

use crate::buffer::FloatBuffer;
use crate::constants::*;
use crate::device::DeviceContext;
use crate::driver::{InfoTarget, ScanRequest, ScanTarget, TriggerTarget};
use crate::enums::{
    AInFlag, AInScanFlag, AdcTimingMode, AiChanQueueLimitation, AiChanType, AiInputMode,
    AiQueueType, AutoZeroMode, CouplingMode, IepeMode, Range, ScanOption, ScanStatus, TcType,
    TempUnit, TriggerType, WaitType,
};
use crate::error::Result;
use crate::scan::{sample_count, ScanSlot};
use crate::structures::{AiQueueElement, TransferStatus};
use crate::utils::{single_flag, to_u32};

// ============================================================================
// Device
// ============================================================================

/// Analog input subsystem of a [`crate::DaqDevice`]
pub struct AiDevice {
    ctx: Arc<DeviceContext>,
    info: AiInfo,
    config: AiConfig,
    scan: ScanSlot<f64>,
    /// Length of the loaded channel-gain queue, 0 when none is loaded
    queue_len: AtomicUsize,
}

impl AiDevice {
    pub(crate) fn new(ctx: Arc<DeviceContext>) -> Self {
        Self {
            info: AiInfo {
                ctx: Arc::clone(&ctx),
            },
            config: AiConfig {
                ctx: Arc::clone(&ctx),
            },
            ctx,
            scan: ScanSlot::new(ScanTarget::AIn),
            queue_len: AtomicUsize::new(0),
        }
    }

    pub fn info(&self) -> &AiInfo {
        &self.info
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Read one sample from `channel`
    ///
    /// Returns volts, or raw counts with `AInFlag::NOSCALEDATA`.
    pub fn a_in(
        &self,
        channel: i32,
        input_mode: AiInputMode,
        range: Range,
        flags: AInFlag,
    ) -> Result<f64> {
        self.ctx
            .driver()
            .a_in(self.ctx.handle()?, channel, input_mode, range, flags)
    }

    /// Start a paced scan of `low_channel..=high_channel` into `data`
    ///
    /// While a channel-gain queue is loaded the queue decides the channel
    /// order, mode and range of every column and the channel arguments are
    /// ignored. Returns the rate the hardware actually runs at.
    #[allow(clippy::too_many_arguments)]
    pub fn a_in_scan(
        &self,
        low_channel: i32,
        high_channel: i32,
        input_mode: AiInputMode,
        range: Range,
        samples_per_channel: usize,
        rate: f64,
        options: ScanOption,
        flags: AInScanFlag,
        data: &FloatBuffer,
    ) -> Result<f64> {
        let queued = self.queue_len.load(Ordering::Acquire);
        let (low_channel, high_channel) = if queued > 0 {
            (0, queued as i32 - 1)
        } else {
            (low_channel, high_channel)
        };
        let request = ScanRequest {
            low_channel,
            high_channel,
            samples_per_channel: sample_count(samples_per_channel)?,
            rate,
            options,
        };
        self.scan.start(&self.ctx, data, |driver, handle| {
            driver.a_in_scan(handle, &request, input_mode, range, flags, data)
        })
    }

    /// Load a channel-gain queue used by subsequent scans
    ///
    /// An empty slice clears the queue.
    pub fn a_in_load_queue(&self, queue: &[AiQueueElement]) -> Result<()> {
        self.ctx
            .driver()
            .a_in_load_queue(self.ctx.handle()?, queue)?;
        self.queue_len.store(queue.len(), Ordering::Release);
        debug!("Loaded AI queue with {} element(s)", queue.len());
        Ok(())
    }

    /// Configure the trigger used by scans started with `ScanOption::EXTTRIGGER`
    pub fn set_trigger(
        &self,
        trig_type: TriggerType,
        trigger_channel: i32,
        level: f64,
        variance: f64,
        retrigger_sample_count: u32,
    ) -> Result<()> {
        self.ctx.set_trigger(
            TriggerTarget::AIn,
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

    /// Block until the scan finishes or `timeout` seconds pass
    ///
    /// A negative timeout waits forever.
    pub fn scan_wait(&self, wait_type: WaitType, wait_param: i64, timeout: f64) -> Result<()> {
        self.scan.wait(&self.ctx, wait_type, wait_param, timeout)
    }

    /// Buffer of the running scan
    pub fn scan_buffer(&self) -> Option<FloatBuffer> {
        self.scan.buffer()
    }
}

// ============================================================================
// Info
// ============================================================================

/// Analog input capabilities
pub struct AiInfo {
    ctx: Arc<DeviceContext>,
}

impl AiInfo {
    fn int(&self, item: i32, index: u32) -> Result<i64> {
        self.ctx.info(InfoTarget::Ai, item, index)
    }

    fn dbl(&self, item: i32) -> Result<f64> {
        self.ctx.info_dbl(InfoTarget::Ai, item, 0)
    }

    /// A/D resolution in bits
    pub fn resolution(&self) -> Result<u32> {
        self.int(AI_INFO_RESOLUTION, 0).map(to_u32)
    }

    pub fn num_chans(&self) -> Result<usize> {
        self.ctx.info_count(InfoTarget::Ai, AI_INFO_NUM_CHANS, 0)
    }

    pub fn num_chans_by_mode(&self, input_mode: AiInputMode) -> Result<usize> {
        self.ctx
            .info_count(InfoTarget::Ai, AI_INFO_NUM_CHANS_BY_MODE, input_mode.raw() as u32)
    }

    pub fn num_chans_by_type(&self, chan_type: AiChanType) -> Result<usize> {
        self.ctx
            .info_count(InfoTarget::Ai, AI_INFO_NUM_CHANS_BY_TYPE, chan_type.bits())
    }

    pub fn chan_types(&self) -> Result<Vec<AiChanType>> {
        self.ctx.info_list(InfoTarget::Ai, AI_INFO_CHAN_TYPES, 0)
    }

    pub fn scan_options(&self) -> Result<Vec<ScanOption>> {
        self.ctx.info_list(InfoTarget::Ai, AI_INFO_SCAN_OPTIONS, 0)
    }

    /// True if scans are hardware paced
    pub fn has_pacer(&self) -> Result<bool> {
        self.ctx.info_flag(InfoTarget::Ai, AI_INFO_HAS_PACER, 0)
    }

    /// Ranges available in `input_mode`, in the order the device lists them
    pub fn ranges(&self, input_mode: AiInputMode) -> Result<Vec<Range>> {
        let (count_item, range_item) = match input_mode {
            AiInputMode::Differential => (AI_INFO_NUM_DIFF_RANGES, AI_INFO_DIFF_RANGE),
            _ => (AI_INFO_NUM_SE_RANGES, AI_INFO_SE_RANGE),
        };
        let count = self.ctx.info_count(InfoTarget::Ai, count_item, 0)?;
        (0..count as u32)
            .map(|index| Range::from_raw(self.int(range_item, index)?))
            .collect()
    }

    pub fn trigger_types(&self) -> Result<Vec<TriggerType>> {
        self.ctx.info_list(InfoTarget::Ai, AI_INFO_TRIG_TYPES, 0)
    }

    /// Longest channel-gain queue accepted in `input_mode`
    pub fn max_queue_length(&self, input_mode: AiInputMode) -> Result<usize> {
        self.ctx.info_count(
            InfoTarget::Ai,
            AI_INFO_MAX_QUEUE_LENGTH_BY_MODE,
            input_mode.raw() as u32,
        )
    }

    pub fn queue_types(&self) -> Result<Vec<AiQueueType>> {
        self.ctx.info_list(InfoTarget::Ai, AI_INFO_QUEUE_TYPES, 0)
    }

    pub fn chan_queue_limitations(&self) -> Result<Vec<AiChanQueueLimitation>> {
        self.ctx.info_list(InfoTarget::Ai, AI_INFO_QUEUE_LIMITS, 0)
    }

    /// FIFO size in bytes
    pub fn fifo_size(&self) -> Result<usize> {
        self.ctx.info_count(InfoTarget::Ai, AI_INFO_FIFO_SIZE, 0)
    }

    pub fn min_scan_rate(&self) -> Result<f64> {
        self.dbl(AI_INFO_MIN_SCAN_RATE)
    }

    pub fn max_scan_rate(&self) -> Result<f64> {
        self.dbl(AI_INFO_MAX_SCAN_RATE)
    }

    /// Aggregate samples per second across all channels
    pub fn max_throughput(&self) -> Result<f64> {
        self.dbl(AI_INFO_MAX_THROUGHPUT)
    }

    pub fn max_burst_rate(&self) -> Result<f64> {
        self.dbl(AI_INFO_MAX_BURST_RATE)
    }

    pub fn max_burst_throughput(&self) -> Result<f64> {
        self.dbl(AI_INFO_MAX_BURST_THROUGHPUT)
    }
}

// ============================================================================
// Config
// ============================================================================

/// Analog input settings
///
/// Channel settings take the channel number as `channel`. Device wide
/// settings take no channel.
pub struct AiConfig {
    ctx: Arc<DeviceContext>,
}

impl AiConfig {
    fn set(&self, item: i32, index: u32, value: i64) -> Result<()> {
        self.ctx
            .driver()
            .ai_set_config(self.ctx.handle()?, item, index, value)
    }

    fn get(&self, item: i32, index: u32) -> Result<i64> {
        self.ctx.driver().ai_config(self.ctx.handle()?, item, index)
    }

    fn set_dbl(&self, item: i32, index: u32, value: f64) -> Result<()> {
        self.ctx
            .driver()
            .ai_set_config_dbl(self.ctx.handle()?, item, index, value)
    }

    fn get_dbl(&self, item: i32, index: u32) -> Result<f64> {
        self.ctx
            .driver()
            .ai_config_dbl(self.ctx.handle()?, item, index)
    }

    pub fn set_chan_type(&self, channel: u32, chan_type: AiChanType) -> Result<()> {
        self.set(AI_CFG_CHAN_TYPE, channel, chan_type.bits().into())
    }

    pub fn chan_type(&self, channel: u32) -> Result<AiChanType> {
        single_flag(self.get(AI_CFG_CHAN_TYPE, channel)?)
    }

    /// Thermocouple type of `channel`
    pub fn set_chan_tc_type(&self, channel: u32, tc_type: TcType) -> Result<()> {
        self.set(AI_CFG_CHAN_TC_TYPE, channel, tc_type.raw().into())
    }

    pub fn chan_tc_type(&self, channel: u32) -> Result<TcType> {
        TcType::from_raw(self.get(AI_CFG_CHAN_TC_TYPE, channel)?)
    }

    pub fn set_chan_temp_unit(&self, channel: u32, unit: TempUnit) -> Result<()> {
        self.set(AI_CFG_CHAN_TEMP_UNIT, channel, unit.raw().into())
    }

    pub fn chan_temp_unit(&self, channel: u32) -> Result<TempUnit> {
        TempUnit::from_raw(self.get(AI_CFG_CHAN_TEMP_UNIT, channel)?)
    }

    /// Temperature unit of every channel
    pub fn set_temp_unit(&self, unit: TempUnit) -> Result<()> {
        self.set(AI_CFG_TEMP_UNIT, 0, unit.raw().into())
    }

    pub fn temp_unit(&self) -> Result<TempUnit> {
        TempUnit::from_raw(self.get(AI_CFG_TEMP_UNIT, 0)?)
    }

    pub fn set_adc_timing_mode(&self, mode: AdcTimingMode) -> Result<()> {
        self.set(AI_CFG_ADC_TIMING_MODE, 0, mode.raw().into())
    }

    pub fn adc_timing_mode(&self) -> Result<AdcTimingMode> {
        AdcTimingMode::from_raw(self.get(AI_CFG_ADC_TIMING_MODE, 0)?)
    }

    pub fn set_auto_zero_mode(&self, mode: AutoZeroMode) -> Result<()> {
        self.set(AI_CFG_AUTO_ZERO_MODE, 0, mode.raw().into())
    }

    pub fn auto_zero_mode(&self) -> Result<AutoZeroMode> {
        AutoZeroMode::from_raw(self.get(AI_CFG_AUTO_ZERO_MODE, 0)?)
    }

    /// IEPE excitation of `channel`
    pub fn set_chan_iepe_mode(&self, channel: u32, mode: IepeMode) -> Result<()> {
        self.set(AI_CFG_CHAN_IEPE_MODE, channel, mode.raw().into())
    }

    pub fn chan_iepe_mode(&self, channel: u32) -> Result<IepeMode> {
        IepeMode::from_raw(self.get(AI_CFG_CHAN_IEPE_MODE, channel)?)
    }

    pub fn set_chan_coupling_mode(&self, channel: u32, mode: CouplingMode) -> Result<()> {
        self.set(AI_CFG_CHAN_COUPLING_MODE, channel, mode.raw().into())
    }

    pub fn chan_coupling_mode(&self, channel: u32) -> Result<CouplingMode> {
        CouplingMode::from_raw(self.get(AI_CFG_CHAN_COUPLING_MODE, channel)?)
    }

    /// Sensor sensitivity of `channel` in V/unit
    pub fn set_chan_sensor_sensitivity(&self, channel: u32, sensitivity: f64) -> Result<()> {
        self.set_dbl(AI_CFG_CHAN_SENSOR_SENSITIVITY, channel, sensitivity)
    }

    pub fn chan_sensor_sensitivity(&self, channel: u32) -> Result<f64> {
        self.get_dbl(AI_CFG_CHAN_SENSOR_SENSITIVITY, channel)
    }

    /// Slope applied to scaled data of `channel`
    pub fn set_chan_slope(&self, channel: u32, slope: f64) -> Result<()> {
        self.set_dbl(AI_CFG_CHAN_SLOPE, channel, slope)
    }

    pub fn chan_slope(&self, channel: u32) -> Result<f64> {
        self.get_dbl(AI_CFG_CHAN_SLOPE, channel)
    }

    pub fn set_chan_offset(&self, channel: u32, offset: f64) -> Result<()> {
        self.set_dbl(AI_CFG_CHAN_OFFSET, channel, offset)
    }

    pub fn chan_offset(&self, channel: u32) -> Result<f64> {
        self.get_dbl(AI_CFG_CHAN_OFFSET, channel)
    }

    /// Date of the last factory calibration
    pub fn cal_date(&self) -> Result<SystemTime> {
        let seconds = self.get(AI_CFG_CAL_DATE, 0)?;
        Ok(UNIX_EPOCH + Duration::from_secs(u64::try_from(seconds).unwrap_or(0)))
    }

    /// Calibration date as formatted by the driver
    pub fn cal_date_str(&self) -> Result<String> {
        self.ctx
            .driver()
            .ai_config_str(self.ctx.handle()?, AI_CFG_CAL_DATE_STR, 0)
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
    fn test_a_in_reads_channel() {
        let (driver, device) = open();
        driver.set_analog_input(device.handle().unwrap(), 2, 1.25).unwrap();
        let ai = device.ai_device().unwrap();
        let volts = ai
            .a_in(2, AiInputMode::SingleEnded, Range::Bip10Volts, AInFlag::empty())
            .unwrap();
        assert_eq!(volts, 1.25);
        assert_eq!(
            ai.a_in(9, AiInputMode::SingleEnded, Range::Bip10Volts, AInFlag::empty()),
            Err(UlError::BadAiChan)
        );
    }

    #[test]
    fn test_info() {
        let (_driver, device) = open();
        let info = device.ai_device().unwrap().info();
        assert_eq!(info.resolution(), Ok(18));
        assert_eq!(info.num_chans_by_mode(AiInputMode::Differential), Ok(4));
        assert_eq!(info.chan_types(), Ok(vec![AiChanType::VOLTAGE]));
        assert_eq!(
            info.ranges(AiInputMode::SingleEnded).unwrap()[..2],
            [Range::Bip10Volts, Range::Bip5Volts]
        );
        assert_eq!(info.max_queue_length(AiInputMode::SingleEnded), Ok(8));
        assert_eq!(
            info.chan_queue_limitations(),
            Ok(vec![
                AiChanQueueLimitation::UNIQUE_CHAN,
                AiChanQueueLimitation::ASCENDING_CHAN
            ])
        );
        assert!(info.min_scan_rate().unwrap() < info.max_scan_rate().unwrap());
        assert_eq!(info.max_burst_rate(), Err(UlError::BadInfoItem));
    }

    #[test]
    fn test_config_round_trip() {
        let (_driver, device) = open();
        let config = device.ai_device().unwrap().config();
        config.set_chan_tc_type(3, TcType::K).unwrap();
        assert_eq!(config.chan_tc_type(3), Ok(TcType::K));
        assert_eq!(config.chan_tc_type(2), Ok(TcType::J));
        config.set_temp_unit(TempUnit::Kelvin).unwrap();
        assert_eq!(config.temp_unit(), Ok(TempUnit::Kelvin));
        config.set_chan_slope(1, 2.5).unwrap();
        assert_eq!(config.chan_slope(1), Ok(2.5));
        assert_eq!(
            config.set_chan_sensor_sensitivity(1, 0.0),
            Err(UlError::BadSensorSensitivity)
        );
        assert_eq!(config.chan_type(0), Ok(AiChanType::VOLTAGE));
        assert_eq!(
            config.set_chan_type(0, AiChanType::TC),
            Err(UlError::BadAiChanType)
        );
    }

    #[test]
    fn test_cal_date() {
        let (_driver, device) = open();
        let config = device.ai_device().unwrap().config();
        let date = config.cal_date().unwrap();
        assert_eq!(
            date.duration_since(UNIX_EPOCH).unwrap().as_secs(),
            1_600_000_000
        );
        assert_eq!(config.cal_date_str(), Ok("2020-09-13 12:26:40".to_string()));
    }

    #[test]
    fn test_queue_drives_scan_columns() {
        let (driver, device) = open();
        let handle = device.handle().unwrap();
        driver.set_analog_input(handle, 5, 3.0).unwrap();
        driver.set_analog_input(handle, 1, -2.0).unwrap();
        let ai = device.ai_device().unwrap();
        let queue = [
            AiQueueElement::new(5, AiInputMode::SingleEnded, Range::Bip10Volts),
            AiQueueElement::new(1, AiInputMode::SingleEnded, Range::Bip5Volts),
        ];
        ai.a_in_load_queue(&queue).unwrap();
        assert_eq!(driver.loaded_queue(handle).unwrap(), queue.to_vec());

        let buffer = FloatBuffer::new(2, 4).unwrap();
        ai.a_in_scan(
            0,
            7,
            AiInputMode::SingleEnded,
            Range::Bip10Volts,
            4,
            100.0,
            ScanOption::DEFAULTIO,
            AInScanFlag::empty(),
            &buffer,
        )
        .unwrap();
        driver.advance_scan(handle, ScanTarget::AIn, 4).unwrap();
        assert_eq!(buffer.get(0), Some(3.0));
        assert_eq!(buffer.get(1), Some(-2.0));

        ai.a_in_load_queue(&[]).unwrap();
        assert!(driver.loaded_queue(handle).unwrap().is_empty());
    }

    #[test]
    fn test_second_scan_is_rejected_until_stopped() {
        let (_driver, device) = open();
        let ai = device.ai_device().unwrap();
        let buffer = FloatBuffer::new(1, 100).unwrap();
        let scan = || {
            ai.a_in_scan(
                0,
                0,
                AiInputMode::SingleEnded,
                Range::Bip10Volts,
                100,
                1000.0,
                ScanOption::CONTINUOUS,
                AInScanFlag::empty(),
                &buffer,
            )
        };
        scan().unwrap();
        assert_eq!(scan(), Err(UlError::AlreadyActive));
        ai.scan_stop().unwrap();
        assert_eq!(ai.scan_status().unwrap().0, ScanStatus::Idle);
        assert!(scan().is_ok());
    }

    #[test]
    fn test_trigger_type_is_checked() {
        let (driver, device) = open();
        let ai = device.ai_device().unwrap();
        ai.set_trigger(TriggerType::RISING, 0, 1.5, 0.1, 0).unwrap();
        let trigger = driver.last_trigger(device.handle().unwrap()).unwrap().unwrap();
        assert_eq!(trigger.trig_type, TriggerType::RISING);
        assert_eq!(trigger.level, 1.5);
        assert_eq!(
            ai.set_trigger(TriggerType::PATTERN_EQ, 0, 0.0, 0.0, 0),
            Err(UlError::BadTrigType)
        );
    }
}
