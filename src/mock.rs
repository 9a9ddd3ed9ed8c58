//! In-process [`UlDriver`] for tests and hardware-free development
//!
//! [`MockDriver`] models each device well enough to exercise the façades:
//! handles and connection state, info items, analog input configuration,
//! digital ports, counters, timers, device memory, scans and events.
//!
//! Scans never progress on their own. A test moves them forward with
//! [`MockDriver::advance_scan`], which writes samples into the caller's
//! buffer, updates the transfer status and fires events on the calling
//! thread, the same way the native driver fires them on its own thread.

use std::collections::HashMap;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::buffer::{FloatBuffer, IntBuffer};
use crate::constants::*;
use crate::driver::{
    EventHandler, InfoTarget, PulseOutRequest, ScanRequest, ScanTarget, TriggerConfig,
    TriggerTarget, UlDriver,
};
use crate::enums::{
    AInFlag, AInScanFlag, AOutFlag, AOutScanFlag, AdcTimingMode, AiChanType, AiInputMode,
    AutoZeroMode, CInScanFlag, CounterMeasurementMode, CounterMeasurementType,
    CounterRegisterType, CouplingMode, DInScanFlag, DOutScanFlag, DaqEventType, DaqInChanType,
    DaqInScanFlag, DaqOutChanType, DaqOutScanFlag, DevVersionType, DigitalDirection,
    DigitalPortIoType, DigitalPortType, IepeMode, InterfaceType, MemAccessType, MemRegion,
    Range, ScanOption, ScanStatus, TcType, TempUnit, TimerType, TmrStatus, TriggerType,
    WaitType,
};
use crate::error::{Result, UlError};
use crate::ffi::DaqDeviceHandle;
use crate::structures::{
    AiQueueElement, CounterScanConfig, DaqDeviceDescriptor, DaqInChanDescriptor,
    DaqOutChanDescriptor, MemDescriptor, PulseOutResult, TransferStatus,
};

type InfoKey = (InfoTarget, i32, u32);

/// An event callback queued for delivery once the state lock is released
type Dispatch = (EventHandler, DaqEventType, u64);

// ============================================================================
// Device profiles
// ============================================================================

/// Capabilities a simulated device reports
///
/// A profile is a table of info items keyed the way the native info entry
/// points are addressed, plus the few values the model needs to behave
/// like hardware (pacer clock, firmware versions, memory map, calibration
/// date). Items that are absent fail with [`UlError::BadInfoItem`].
#[derive(Debug, Clone)]
pub struct MockProfile {
    info: HashMap<InfoKey, i64>,
    info_dbl: HashMap<InfoKey, f64>,
    versions: HashMap<u32, String>,
    memory: Vec<MemDescriptor>,
    pacer_clock_hz: f64,
    cal_date: i64,
    cal_date_str: String,
}

impl MockProfile {
    /// A device that reports nothing
    pub fn empty() -> Self {
        Self {
            info: HashMap::new(),
            info_dbl: HashMap::new(),
            versions: HashMap::new(),
            memory: Vec::new(),
            pacer_clock_hz: 64_000_000.0,
            cal_date: 0,
            cal_date_str: String::new(),
        }
    }

    /// A USB-1808X style multifunction device
    ///
    /// Eight 18-bit analog inputs (four differential), two analog outputs,
    /// an auxiliary bit-configurable port and one 8-bit port, four
    /// counters, two timers, synchronous input and output, calibration and
    /// user memory. Burst mode items are deliberately missing.
    pub fn multifunction() -> Self {
        use InfoTarget::*;

        let mut p = Self::empty();
        for item in [
            DEV_INFO_HAS_AI_DEV,
            DEV_INFO_HAS_AO_DEV,
            DEV_INFO_HAS_DIO_DEV,
            DEV_INFO_HAS_CTR_DEV,
            DEV_INFO_HAS_TMR_DEV,
            DEV_INFO_HAS_DAQI_DEV,
            DEV_INFO_HAS_DAQO_DEV,
        ] {
            p.set(Device, item, 0, 1);
        }
        p.set(Device, DEV_INFO_DAQ_EVENT_TYPES, 0, DaqEventType::all().bits().into());

        let scan_options: i64 = (ScanOption::SINGLEIO
            | ScanOption::BLOCKIO
            | ScanOption::CONTINUOUS
            | ScanOption::EXTCLOCK
            | ScanOption::EXTTRIGGER
            | ScanOption::RETRIGGER
            | ScanOption::PACEROUT)
            .bits()
            .into();
        let digital_triggers: i64 =
            (TriggerType::POS_EDGE | TriggerType::NEG_EDGE | TriggerType::HIGH | TriggerType::LOW)
                .bits()
                .into();
        let analog_triggers = digital_triggers
            | i64::from(
                (TriggerType::RISING
                    | TriggerType::FALLING
                    | TriggerType::ABOVE
                    | TriggerType::BELOW)
                    .bits(),
            );

        // Analog input
        let ai_ranges = [
            Range::Bip10Volts,
            Range::Bip5Volts,
            Range::Uni10Volts,
            Range::Uni5Volts,
        ];
        p.set(Ai, AI_INFO_RESOLUTION, 0, 18);
        p.set(Ai, AI_INFO_NUM_CHANS, 0, 8);
        p.set(Ai, AI_INFO_NUM_CHANS_BY_MODE, AiInputMode::Differential.raw() as u32, 4);
        p.set(Ai, AI_INFO_NUM_CHANS_BY_MODE, AiInputMode::SingleEnded.raw() as u32, 8);
        p.set(Ai, AI_INFO_NUM_CHANS_BY_TYPE, AiChanType::VOLTAGE.bits(), 8);
        p.set(Ai, AI_INFO_CHAN_TYPES, 0, AiChanType::VOLTAGE.bits().into());
        p.set(Ai, AI_INFO_SCAN_OPTIONS, 0, scan_options);
        p.set(Ai, AI_INFO_HAS_PACER, 0, 1);
        p.set(Ai, AI_INFO_NUM_DIFF_RANGES, 0, ai_ranges.len() as i64);
        p.set(Ai, AI_INFO_NUM_SE_RANGES, 0, ai_ranges.len() as i64);
        for (index, range) in ai_ranges.iter().enumerate() {
            p.set(Ai, AI_INFO_DIFF_RANGE, index as u32, range.raw().into());
            p.set(Ai, AI_INFO_SE_RANGE, index as u32, range.raw().into());
        }
        p.set(Ai, AI_INFO_TRIG_TYPES, 0, analog_triggers);
        p.set(Ai, AI_INFO_MAX_QUEUE_LENGTH_BY_MODE, AiInputMode::Differential.raw() as u32, 4);
        p.set(Ai, AI_INFO_MAX_QUEUE_LENGTH_BY_MODE, AiInputMode::SingleEnded.raw() as u32, 8);
        p.set(Ai, AI_INFO_QUEUE_TYPES, 0, 0b111);
        p.set(Ai, AI_INFO_QUEUE_LIMITS, 0, 0b011);
        p.set(Ai, AI_INFO_FIFO_SIZE, 0, 4096);
        p.set_dbl(Ai, AI_INFO_MIN_SCAN_RATE, 0, 0.0149);
        p.set_dbl(Ai, AI_INFO_MAX_SCAN_RATE, 0, 200_000.0);
        p.set_dbl(Ai, AI_INFO_MAX_THROUGHPUT, 0, 1_600_000.0);

        // Analog output
        p.set(Ao, AO_INFO_RESOLUTION, 0, 16);
        p.set(Ao, AO_INFO_NUM_CHANS, 0, 2);
        p.set(Ao, AO_INFO_SCAN_OPTIONS, 0, scan_options);
        p.set(Ao, AO_INFO_HAS_PACER, 0, 1);
        p.set(Ao, AO_INFO_NUM_RANGES, 0, 1);
        p.set(Ao, AO_INFO_RANGE, 0, Range::Bip10Volts.raw().into());
        p.set(Ao, AO_INFO_TRIG_TYPES, 0, digital_triggers);
        p.set(Ao, AO_INFO_FIFO_SIZE, 0, 2048);
        p.set_dbl(Ao, AO_INFO_MIN_SCAN_RATE, 0, 0.0149);
        p.set_dbl(Ao, AO_INFO_MAX_SCAN_RATE, 0, 500_000.0);
        p.set_dbl(Ao, AO_INFO_MAX_THROUGHPUT, 0, 1_000_000.0);

        // Digital I/O
        p.set(Dio, DIO_INFO_NUM_PORTS, 0, 2);
        p.set(Dio, DIO_INFO_PORT_TYPE, 0, DigitalPortType::AuxPort.raw().into());
        p.set(Dio, DIO_INFO_PORT_TYPE, 1, DigitalPortType::FirstPortA.raw().into());
        p.set(Dio, DIO_INFO_PORT_IO_TYPE, 0, DigitalPortIoType::BitIo.raw().into());
        p.set(Dio, DIO_INFO_PORT_IO_TYPE, 1, DigitalPortIoType::Bidirectional.raw().into());
        p.set(Dio, DIO_INFO_NUM_BITS, 0, 4);
        p.set(Dio, DIO_INFO_NUM_BITS, 1, 8);
        for direction in DigitalDirection::ALL {
            let index = direction.raw() as u32;
            p.set(Dio, DIO_INFO_HAS_PACER, index, 1);
            p.set(Dio, DIO_INFO_SCAN_OPTIONS, index, scan_options);
            p.set(Dio, DIO_INFO_TRIG_TYPES, index, digital_triggers);
            p.set(Dio, DIO_INFO_FIFO_SIZE, index, 2048);
            p.set_dbl(Dio, DIO_INFO_MIN_SCAN_RATE, index, 0.0149);
            p.set_dbl(Dio, DIO_INFO_MAX_SCAN_RATE, index, 500_000.0);
            p.set_dbl(Dio, DIO_INFO_MAX_THROUGHPUT, index, 8_000_000.0);
        }

        // Counters: two event/period counters and two encoders
        let general = CounterMeasurementType::COUNT
            | CounterMeasurementType::PERIOD
            | CounterMeasurementType::PULSE_WIDTH
            | CounterMeasurementType::TIMING;
        p.set(Ctr, CTR_INFO_NUM_CTRS, 0, 4);
        for counter in 0..4u32 {
            let types = if counter < 2 {
                general
            } else {
                CounterMeasurementType::ENCODER
            };
            p.set(Ctr, CTR_INFO_MEASUREMENT_TYPES, counter, types.bits().into());
        }
        let modes = [
            (
                CounterMeasurementType::COUNT,
                CounterMeasurementMode::CLEAR_ON_READ
                    | CounterMeasurementMode::COUNT_DOWN
                    | CounterMeasurementMode::GATE_CONTROLS_DIR
                    | CounterMeasurementMode::GATE_CLEARS_CTR
                    | CounterMeasurementMode::GATE_TRIG_SRC
                    | CounterMeasurementMode::OUTPUT_ON
                    | CounterMeasurementMode::OUTPUT_INITIAL_STATE_HIGH
                    | CounterMeasurementMode::NO_RECYCLE
                    | CounterMeasurementMode::RANGE_LIMIT_ON,
            ),
            (
                CounterMeasurementType::PERIOD,
                CounterMeasurementMode::PERIOD_X10
                    | CounterMeasurementMode::PERIOD_X100
                    | CounterMeasurementMode::PERIOD_X1000
                    | CounterMeasurementMode::PERIOD_GATING_ON
                    | CounterMeasurementMode::PERIOD_INVERT_GATE,
            ),
            (
                CounterMeasurementType::PULSE_WIDTH,
                CounterMeasurementMode::PULSE_WIDTH_GATING_ON
                    | CounterMeasurementMode::PULSE_WIDTH_INVERT_GATE,
            ),
            (
                CounterMeasurementType::TIMING,
                CounterMeasurementMode::TIMING_MODE_INVERT_GATE,
            ),
            (
                CounterMeasurementType::ENCODER,
                CounterMeasurementMode::ENCODER_X2
                    | CounterMeasurementMode::ENCODER_X4
                    | CounterMeasurementMode::ENCODER_LATCH_ON_Z
                    | CounterMeasurementMode::ENCODER_CLEAR_ON_Z
                    | CounterMeasurementMode::ENCODER_NO_RECYCLE
                    | CounterMeasurementMode::ENCODER_RANGE_LIMIT_ON
                    | CounterMeasurementMode::ENCODER_Z_ACTIVE_EDGE,
            ),
        ];
        for (kind, mask) in modes {
            p.set(Ctr, CTR_INFO_MEASUREMENT_MODES, kind.bits(), mask.bits().into());
        }
        p.set(Ctr, CTR_INFO_REGISTER_TYPES, 0, CounterRegisterType::all().bits().into());
        p.set(Ctr, CTR_INFO_RESOLUTION, 0, 32);
        p.set(Ctr, CTR_INFO_HAS_PACER, 0, 1);
        p.set(Ctr, CTR_INFO_SCAN_OPTIONS, 0, scan_options);
        p.set(Ctr, CTR_INFO_TRIG_TYPES, 0, digital_triggers);
        p.set(Ctr, CTR_INFO_FIFO_SIZE, 0, 4096);
        p.set_dbl(Ctr, CTR_INFO_MIN_SCAN_RATE, 0, 0.0149);
        p.set_dbl(Ctr, CTR_INFO_MAX_SCAN_RATE, 0, 200_000.0);
        p.set_dbl(Ctr, CTR_INFO_MAX_THROUGHPUT, 0, 1_600_000.0);

        // Timers
        p.set(Tmr, TMR_INFO_NUM_TMRS, 0, 2);
        for timer in 0..2u32 {
            p.set(Tmr, TMR_INFO_TYPE, timer, TimerType::Advanced.raw().into());
            p.set_dbl(Tmr, TMR_INFO_MIN_FREQ, timer, 0.0149);
            p.set_dbl(Tmr, TMR_INFO_MAX_FREQ, timer, 32_000_000.0);
        }

        // Synchronous input and output
        let daqi_types = DaqInChanType::ANALOG_DIFF
            | DaqInChanType::ANALOG_SE
            | DaqInChanType::DIGITAL
            | DaqInChanType::CTR32;
        p.set(DaqI, DAQI_INFO_CHAN_TYPES, 0, daqi_types.bits().into());
        p.set(DaqI, DAQI_INFO_SCAN_OPTIONS, 0, scan_options);
        p.set(DaqI, DAQI_INFO_TRIG_TYPES, 0, analog_triggers);
        p.set(DaqI, DAQI_INFO_FIFO_SIZE, 0, 4096);
        p.set_dbl(DaqI, DAQI_INFO_MIN_SCAN_RATE, 0, 0.0149);
        p.set_dbl(DaqI, DAQI_INFO_MAX_SCAN_RATE, 0, 200_000.0);
        p.set_dbl(DaqI, DAQI_INFO_MAX_THROUGHPUT, 0, 1_600_000.0);

        let daqo_types = DaqOutChanType::ANALOG | DaqOutChanType::DIGITAL;
        p.set(DaqO, DAQO_INFO_CHAN_TYPES, 0, daqo_types.bits().into());
        p.set(DaqO, DAQO_INFO_SCAN_OPTIONS, 0, scan_options);
        p.set(DaqO, DAQO_INFO_TRIG_TYPES, 0, analog_triggers);
        p.set(DaqO, DAQO_INFO_FIFO_SIZE, 0, 2048);
        p.set_dbl(DaqO, DAQO_INFO_MIN_SCAN_RATE, 0, 0.0149);
        p.set_dbl(DaqO, DAQO_INFO_MAX_SCAN_RATE, 0, 500_000.0);
        p.set_dbl(DaqO, DAQO_INFO_MAX_THROUGHPUT, 0, 1_000_000.0);

        p.with_version(DevVersionType::FwMain, "1.02")
            .with_version(DevVersionType::Fpga, "3.00")
            .with_memory(MemDescriptor {
                region: MemRegion::CAL,
                address: 0x7000,
                size: 0x1000,
                access_types: MemAccessType::READ,
            })
            .with_memory(MemDescriptor {
                region: MemRegion::USER,
                address: 0,
                size: 256,
                access_types: MemAccessType::READ | MemAccessType::WRITE,
            })
            .with_cal_date(1_600_000_000, "2020-09-13 12:26:40")
    }

    pub fn with_info(mut self, target: InfoTarget, item: i32, index: u32, value: i64) -> Self {
        self.set(target, item, index, value);
        self
    }

    pub fn with_info_dbl(mut self, target: InfoTarget, item: i32, index: u32, value: f64) -> Self {
        self.set_dbl(target, item, index, value);
        self
    }

    /// Remove an item so queries for it fail
    pub fn without_info(mut self, target: InfoTarget, item: i32, index: u32) -> Self {
        self.info.remove(&(target, item, index));
        self.info_dbl.remove(&(target, item, index));
        self
    }

    pub fn with_version(mut self, kind: DevVersionType, version: &str) -> Self {
        self.versions.insert(kind.raw() as u32, version.to_string());
        self
    }

    /// Add a memory region and advertise it in `DEV_INFO_MEM_REGIONS`
    pub fn with_memory(mut self, descriptor: MemDescriptor) -> Self {
        let key = (InfoTarget::Device, DEV_INFO_MEM_REGIONS, 0);
        let mask = self.info.get(&key).copied().unwrap_or(0) | i64::from(descriptor.region.bits());
        self.info.insert(key, mask);
        self.memory.retain(|m| m.region != descriptor.region);
        self.memory.push(descriptor);
        self
    }

    pub fn with_pacer_clock(mut self, hz: f64) -> Self {
        self.pacer_clock_hz = hz;
        self
    }

    pub fn with_cal_date(mut self, seconds: i64, text: &str) -> Self {
        self.cal_date = seconds;
        self.cal_date_str = text.to_string();
        self
    }

    fn set(&mut self, target: InfoTarget, item: i32, index: u32, value: i64) {
        self.info.insert((target, item, index), value);
    }

    fn set_dbl(&mut self, target: InfoTarget, item: i32, index: u32, value: f64) {
        self.info_dbl.insert((target, item, index), value);
    }

    fn info(&self, target: InfoTarget, item: i32, index: u32) -> Result<i64> {
        self.info
            .get(&(target, item, index))
            .copied()
            .ok_or(UlError::BadInfoItem)
    }

    fn info_dbl(&self, target: InfoTarget, item: i32, index: u32) -> Result<f64> {
        self.info_dbl
            .get(&(target, item, index))
            .copied()
            .ok_or(UlError::BadInfoItem)
    }

    fn info_or(&self, target: InfoTarget, item: i32, index: u32, default: i64) -> i64 {
        self.info(target, item, index).unwrap_or(default)
    }

    fn mask(&self, target: InfoTarget, item: i32, index: u32) -> u32 {
        self.info_or(target, item, index, 0) as u32
    }

    /// Rate the pacer can actually produce for `rate`, kept inside `[min, max]`
    fn snap_rate(&self, rate: f64, min: f64, max: f64) -> f64 {
        let divisor = (self.pacer_clock_hz / rate).round().max(1.0);
        (self.pacer_clock_hz / divisor).clamp(min, max)
    }
}

impl Default for MockProfile {
    fn default() -> Self {
        Self::multifunction()
    }
}

// ============================================================================
// Simulated device state
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Column {
    Analog(i32),
    Port(DigitalPortType),
    Counter(i32),
}

enum MockBuffer {
    Float(FloatBuffer),
    Int(IntBuffer),
}

impl MockBuffer {
    fn len(&self) -> usize {
        match self {
            MockBuffer::Float(b) => b.len(),
            MockBuffer::Int(b) => b.len(),
        }
    }

    fn get(&self, index: usize) -> Option<f64> {
        match self {
            MockBuffer::Float(b) => b.get(index),
            MockBuffer::Int(b) => b.get(index).map(|v| v as f64),
        }
    }

    fn set(&self, index: usize, value: f64) {
        match self {
            MockBuffer::Float(b) => b.set(index, value),
            MockBuffer::Int(b) => b.set(index, value as u64),
        }
    }
}

struct MockScan {
    status: ScanStatus,
    options: ScanOption,
    columns: Vec<Column>,
    samples_per_channel: usize,
    buffer: MockBuffer,
    transfer: TransferStatus,
}

struct ScanStart {
    options: ScanOption,
    samples_per_channel: i32,
    rate: f64,
    columns: Vec<Column>,
    buffer: MockBuffer,
}

struct MockEvent {
    types: DaqEventType,
    parameter: u64,
    next_threshold: u64,
    handler: EventHandler,
}

#[derive(Debug, Clone, Copy)]
struct MockPort {
    port_type: DigitalPortType,
    io_type: DigitalPortIoType,
    bits: u32,
    latch: u64,
    inputs: u64,
    /// Set bits are outputs
    direction_mask: u64,
}

impl MockPort {
    fn width_mask(&self) -> u64 {
        if self.bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }

    fn read(&self) -> u64 {
        ((self.latch & self.direction_mask) | (self.inputs & !self.direction_mask))
            & self.width_mask()
    }

    fn check_bit(&self, bit: i32) -> Result<u32> {
        u32::try_from(bit)
            .ok()
            .filter(|&b| b < self.bits)
            .ok_or(UlError::BadBitNum)
    }
}

struct MockDevice {
    descriptor: DaqDeviceDescriptor,
    profile: MockProfile,
    present: bool,
    connected: bool,
    ai_config: HashMap<(i32, u32), i64>,
    ai_config_dbl: HashMap<(i32, u32), f64>,
    analog_inputs: HashMap<i32, f64>,
    analog_outputs: HashMap<i32, f64>,
    ports: Vec<MockPort>,
    counters: HashMap<(i32, u32), u64>,
    counter_configs: HashMap<i32, CounterScanConfig>,
    timers: HashMap<i32, TmrStatus>,
    queue: Vec<AiQueueElement>,
    last_trigger: Option<TriggerConfig>,
    scans: HashMap<ScanTarget, MockScan>,
    events: Vec<MockEvent>,
    memory: HashMap<u32, Vec<u8>>,
    led_flashes: u32,
}

/// Info items that describe a scan subsystem
fn scan_items(target: ScanTarget) -> (InfoTarget, u32, i32) {
    match target {
        ScanTarget::AIn => (InfoTarget::Ai, 0, AI_INFO_SCAN_OPTIONS),
        ScanTarget::AOut => (InfoTarget::Ao, 0, AO_INFO_SCAN_OPTIONS),
        ScanTarget::DIn => (
            InfoTarget::Dio,
            DigitalDirection::Input.raw() as u32,
            DIO_INFO_SCAN_OPTIONS,
        ),
        ScanTarget::DOut => (
            InfoTarget::Dio,
            DigitalDirection::Output.raw() as u32,
            DIO_INFO_SCAN_OPTIONS,
        ),
        ScanTarget::CIn => (InfoTarget::Ctr, 0, CTR_INFO_SCAN_OPTIONS),
        ScanTarget::DaqIn => (InfoTarget::DaqI, 0, DAQI_INFO_SCAN_OPTIONS),
        ScanTarget::DaqOut => (InfoTarget::DaqO, 0, DAQO_INFO_SCAN_OPTIONS),
    }
}

fn check_trigger_type(supported: TriggerType, config: &TriggerConfig) -> Result<()> {
    let requested = config.trig_type;
    if requested.bits().count_ones() != 1 || !supported.contains(requested) {
        return Err(UlError::BadTrigType);
    }
    Ok(())
}

fn ai_config_default(item: i32) -> Option<i64> {
    let value: i64 = match item {
        AI_CFG_CHAN_TYPE => AiChanType::VOLTAGE.bits().into(),
        AI_CFG_CHAN_TC_TYPE => TcType::J.raw().into(),
        AI_CFG_CHAN_TEMP_UNIT | AI_CFG_TEMP_UNIT => TempUnit::Celsius.raw().into(),
        AI_CFG_ADC_TIMING_MODE => AdcTimingMode::Auto.raw().into(),
        AI_CFG_AUTO_ZERO_MODE => AutoZeroMode::None.raw().into(),
        AI_CFG_CHAN_IEPE_MODE => IepeMode::Disabled.raw().into(),
        AI_CFG_CHAN_COUPLING_MODE => CouplingMode::Dc.raw().into(),
        _ => return None,
    };
    Some(value)
}

fn ai_config_dbl_default(item: i32) -> Option<f64> {
    match item {
        AI_CFG_CHAN_SLOPE | AI_CFG_CHAN_SENSOR_SENSITIVITY => Some(1.0),
        AI_CFG_CHAN_OFFSET => Some(0.0),
        _ => None,
    }
}

/// Items that apply to the whole device rather than one channel
fn ai_config_is_global(item: i32) -> bool {
    matches!(
        item,
        AI_CFG_TEMP_UNIT | AI_CFG_ADC_TIMING_MODE | AI_CFG_AUTO_ZERO_MODE | AI_CFG_CAL_DATE
    )
}

impl MockDevice {
    fn new(descriptor: DaqDeviceDescriptor, profile: MockProfile) -> Self {
        let ports = (0..profile.info_or(InfoTarget::Dio, DIO_INFO_NUM_PORTS, 0, 0).max(0) as u32)
            .filter_map(|index| {
                let port_type = DigitalPortType::from_raw(
                    profile.info(InfoTarget::Dio, DIO_INFO_PORT_TYPE, index).ok()?,
                )
                .ok()?;
                let io_type = DigitalPortIoType::from_raw(profile.info_or(
                    InfoTarget::Dio,
                    DIO_INFO_PORT_IO_TYPE,
                    index,
                    DigitalPortIoType::Bidirectional.raw().into(),
                ))
                .ok()?;
                let bits = profile.info_or(InfoTarget::Dio, DIO_INFO_NUM_BITS, index, 8) as u32;
                let mut port = MockPort {
                    port_type,
                    io_type,
                    bits,
                    latch: 0,
                    inputs: 0,
                    direction_mask: 0,
                };
                if io_type == DigitalPortIoType::Output {
                    port.direction_mask = port.width_mask();
                }
                Some(port)
            })
            .collect();
        let memory = profile
            .memory
            .iter()
            .map(|m| (m.region.bits(), vec![0u8; m.size as usize]))
            .collect();

        Self {
            descriptor,
            profile,
            present: true,
            connected: false,
            ai_config: HashMap::new(),
            ai_config_dbl: HashMap::new(),
            analog_inputs: HashMap::new(),
            analog_outputs: HashMap::new(),
            ports,
            counters: HashMap::new(),
            counter_configs: HashMap::new(),
            timers: HashMap::new(),
            queue: Vec::new(),
            last_trigger: None,
            scans: HashMap::new(),
            events: Vec::new(),
            memory,
            led_flashes: 0,
        }
    }

    // ---- validation ----

    fn ai_channel_count(&self, mode: AiInputMode) -> Result<i64> {
        self.profile
            .info(InfoTarget::Ai, AI_INFO_NUM_CHANS_BY_MODE, mode.raw() as u32)
            .map_err(|_| UlError::BadInputMode)
    }

    fn ai_ranges(&self, mode: AiInputMode) -> Vec<Range> {
        let (count_item, range_item) = match mode {
            AiInputMode::Differential => (AI_INFO_NUM_DIFF_RANGES, AI_INFO_DIFF_RANGE),
            _ => (AI_INFO_NUM_SE_RANGES, AI_INFO_SE_RANGE),
        };
        let count = self.profile.info_or(InfoTarget::Ai, count_item, 0, 0).max(0) as u32;
        (0..count)
            .filter_map(|i| self.profile.info(InfoTarget::Ai, range_item, i).ok())
            .filter_map(|raw| Range::from_raw(raw).ok())
            .collect()
    }

    fn check_ai(&self, channel: i32, mode: AiInputMode, range: Range) -> Result<()> {
        let count = self.ai_channel_count(mode)?;
        if channel < 0 || i64::from(channel) >= count {
            return Err(UlError::BadAiChan);
        }
        if !self.ai_ranges(mode).contains(&range) {
            return Err(UlError::BadRange);
        }
        Ok(())
    }

    fn check_ai_index(&self, index: u32) -> Result<()> {
        let count = self.profile.info_or(InfoTarget::Ai, AI_INFO_NUM_CHANS, 0, 0);
        if i64::from(index) >= count {
            return Err(UlError::BadAiChan);
        }
        Ok(())
    }

    fn check_ao(&self, channel: i32, range: Range) -> Result<()> {
        let count = self.profile.info_or(InfoTarget::Ao, AO_INFO_NUM_CHANS, 0, 0);
        if channel < 0 || i64::from(channel) >= count {
            return Err(UlError::BadAoChan);
        }
        let ranges = self.profile.info_or(InfoTarget::Ao, AO_INFO_NUM_RANGES, 0, 0).max(0) as u32;
        let supported = (0..ranges)
            .filter_map(|i| self.profile.info(InfoTarget::Ao, AO_INFO_RANGE, i).ok())
            .any(|raw| raw == i64::from(range.raw()));
        if !supported {
            return Err(UlError::BadRange);
        }
        Ok(())
    }

    fn check_counter(&self, counter: i32) -> Result<()> {
        let count = self.profile.info_or(InfoTarget::Ctr, CTR_INFO_NUM_CTRS, 0, 0);
        if counter < 0 || i64::from(counter) >= count {
            return Err(UlError::BadCtr);
        }
        Ok(())
    }

    fn check_register(&self, register: CounterRegisterType) -> Result<u32> {
        let supported = CounterRegisterType::from_bits_retain(self.profile.mask(
            InfoTarget::Ctr,
            CTR_INFO_REGISTER_TYPES,
            0,
        ));
        if register.bits().count_ones() != 1 || !supported.contains(register) {
            return Err(UlError::BadCtrReg);
        }
        Ok(register.bits())
    }

    fn counter_max(&self) -> u64 {
        let resolution = self.profile.info_or(InfoTarget::Ctr, CTR_INFO_RESOLUTION, 0, 32);
        if resolution >= 64 {
            u64::MAX
        } else {
            (1u64 << resolution.max(0)) - 1
        }
    }

    fn check_timer(&self, timer: i32) -> Result<()> {
        let count = self.profile.info_or(InfoTarget::Tmr, TMR_INFO_NUM_TMRS, 0, 0);
        if timer < 0 || i64::from(timer) >= count {
            return Err(UlError::BadTmr);
        }
        Ok(())
    }

    fn port(&self, port: DigitalPortType) -> Result<&MockPort> {
        self.ports
            .iter()
            .find(|p| p.port_type == port)
            .ok_or(UlError::BadPortType)
    }

    fn port_mut(&mut self, port: DigitalPortType) -> Result<&mut MockPort> {
        self.ports
            .iter_mut()
            .find(|p| p.port_type == port)
            .ok_or(UlError::BadPortType)
    }

    /// Ports whose identifiers fall inside `[low, high]`, in port order
    fn port_columns(&self, low: i32, high: i32) -> Result<Vec<Column>> {
        let columns: Vec<Column> = self
            .ports
            .iter()
            .filter(|p| (low..=high).contains(&p.port_type.raw()))
            .map(|p| Column::Port(p.port_type))
            .collect();
        if columns.is_empty() {
            return Err(UlError::BadPortType);
        }
        Ok(columns)
    }

    fn daq_in_column(&self, descriptor: &DaqInChanDescriptor) -> Result<Column> {
        let supported = DaqInChanType::from_bits_retain(self.profile.mask(
            InfoTarget::DaqI,
            DAQI_INFO_CHAN_TYPES,
            0,
        ));
        let kind = descriptor.chan_type;
        if kind.bits().count_ones() != 1 || !supported.contains(kind) {
            return Err(UlError::BadDaqiChanType);
        }
        if kind == DaqInChanType::ANALOG_DIFF || kind == DaqInChanType::ANALOG_SE {
            let mode = if kind == DaqInChanType::ANALOG_DIFF {
                AiInputMode::Differential
            } else {
                AiInputMode::SingleEnded
            };
            self.check_ai(descriptor.channel, mode, descriptor.range)?;
            Ok(Column::Analog(descriptor.channel))
        } else if kind == DaqInChanType::DIGITAL {
            let port = DigitalPortType::from_raw(descriptor.channel.into())
                .map_err(|_| UlError::BadPortType)?;
            self.port(port)?;
            Ok(Column::Port(port))
        } else {
            self.check_counter(descriptor.channel)?;
            Ok(Column::Counter(descriptor.channel))
        }
    }

    fn daq_out_column(&self, descriptor: &DaqOutChanDescriptor) -> Result<Column> {
        let supported = DaqOutChanType::from_bits_retain(self.profile.mask(
            InfoTarget::DaqO,
            DAQO_INFO_CHAN_TYPES,
            0,
        ));
        let kind = descriptor.chan_type;
        if kind.bits().count_ones() != 1 || !supported.contains(kind) {
            return Err(UlError::BadDaqoChanType);
        }
        if kind == DaqOutChanType::ANALOG {
            self.check_ao(descriptor.channel, descriptor.range)?;
            Ok(Column::Analog(descriptor.channel))
        } else {
            let port = DigitalPortType::from_raw(descriptor.channel.into())
                .map_err(|_| UlError::BadPortType)?;
            self.port(port)?;
            Ok(Column::Port(port))
        }
    }

    fn trigger_types(&self, target: TriggerTarget) -> TriggerType {
        let (info, item, index) = match target {
            TriggerTarget::AIn => (InfoTarget::Ai, AI_INFO_TRIG_TYPES, 0),
            TriggerTarget::AOut => (InfoTarget::Ao, AO_INFO_TRIG_TYPES, 0),
            TriggerTarget::DIn => (
                InfoTarget::Dio,
                DIO_INFO_TRIG_TYPES,
                DigitalDirection::Input.raw() as u32,
            ),
            TriggerTarget::DOut => (
                InfoTarget::Dio,
                DIO_INFO_TRIG_TYPES,
                DigitalDirection::Output.raw() as u32,
            ),
            TriggerTarget::CIn => (InfoTarget::Ctr, CTR_INFO_TRIG_TYPES, 0),
            TriggerTarget::Tmr => return TriggerType::all(),
        };
        TriggerType::from_bits_retain(self.profile.mask(info, item, index))
    }

    fn handler_for(&self, kind: DaqEventType) -> Option<EventHandler> {
        self.events
            .iter()
            .find(|e| e.types.contains(kind))
            .map(|e| EventHandler::clone(&e.handler))
    }

    // ---- analog input configuration ----

    fn ai_set_config(&mut self, item: i32, index: u32, value: i64) -> Result<()> {
        let global = ai_config_is_global(item);
        if !global {
            self.check_ai_index(index)?;
        }
        match item {
            AI_CFG_CHAN_TYPE => {
                let supported = AiChanType::from_bits_retain(self.profile.mask(
                    InfoTarget::Ai,
                    AI_INFO_CHAN_TYPES,
                    0,
                ));
                let valid = u32::try_from(value)
                    .ok()
                    .map(AiChanType::from_bits_retain)
                    .is_some_and(|t| t.bits().count_ones() == 1 && supported.contains(t));
                if !valid {
                    return Err(UlError::BadAiChanType);
                }
            }
            AI_CFG_CHAN_TC_TYPE => {
                TcType::from_raw(value).map_err(|_| UlError::BadTcType)?;
            }
            AI_CFG_CHAN_TEMP_UNIT | AI_CFG_TEMP_UNIT => {
                TempUnit::from_raw(value).map_err(|_| UlError::BadUnit)?;
            }
            AI_CFG_ADC_TIMING_MODE => {
                AdcTimingMode::from_raw(value).map_err(|_| UlError::BadConfigVal)?;
            }
            AI_CFG_AUTO_ZERO_MODE => {
                AutoZeroMode::from_raw(value).map_err(|_| UlError::BadConfigVal)?;
            }
            AI_CFG_CHAN_IEPE_MODE => {
                IepeMode::from_raw(value).map_err(|_| UlError::BadIepeMode)?;
            }
            AI_CFG_CHAN_COUPLING_MODE => {
                CouplingMode::from_raw(value).map_err(|_| UlError::BadCouplingMode)?;
            }
            AI_CFG_CAL_DATE => return Err(UlError::ConfigNotSupported),
            _ => return Err(UlError::BadConfigItem),
        }
        self.ai_config.insert((item, if global { 0 } else { index }), value);
        Ok(())
    }

    fn ai_config(&self, item: i32, index: u32) -> Result<i64> {
        let global = ai_config_is_global(item);
        if !global {
            self.check_ai_index(index)?;
        }
        if item == AI_CFG_CAL_DATE {
            return Ok(self.profile.cal_date);
        }
        let default = ai_config_default(item).ok_or(UlError::BadConfigItem)?;
        Ok(self
            .ai_config
            .get(&(item, if global { 0 } else { index }))
            .copied()
            .unwrap_or(default))
    }

    fn ai_set_config_dbl(&mut self, item: i32, index: u32, value: f64) -> Result<()> {
        ai_config_dbl_default(item).ok_or(UlError::BadConfigItem)?;
        self.check_ai_index(index)?;
        if !value.is_finite() {
            return Err(UlError::BadConfigVal);
        }
        if item == AI_CFG_CHAN_SENSOR_SENSITIVITY && value <= 0.0 {
            return Err(UlError::BadSensorSensitivity);
        }
        self.ai_config_dbl.insert((item, index), value);
        Ok(())
    }

    fn ai_config_dbl(&self, item: i32, index: u32) -> Result<f64> {
        let default = ai_config_dbl_default(item).ok_or(UlError::BadConfigItem)?;
        self.check_ai_index(index)?;
        Ok(self
            .ai_config_dbl
            .get(&(item, index))
            .copied()
            .unwrap_or(default))
    }

    // ---- scans ----

    fn start_scan(&mut self, target: ScanTarget, start: ScanStart) -> Result<f64> {
        if self
            .scans
            .get(&target)
            .is_some_and(|s| s.status == ScanStatus::Running)
        {
            return Err(UlError::AlreadyActive);
        }
        let samples_per_channel = usize::try_from(start.samples_per_channel)
            .ok()
            .filter(|&n| n > 0)
            .ok_or(UlError::BadSampleCount)?;
        if start.columns.is_empty() {
            return Err(UlError::BadNumChans);
        }
        if start.buffer.len() < start.columns.len() * samples_per_channel {
            return Err(UlError::BadBufferSize);
        }

        let (info, index, options_item) = scan_items(target);
        let supported = ScanOption::from_bits_retain(self.profile.mask(info, options_item, index));
        if !supported.contains(start.options) {
            return Err(UlError::BadOption);
        }
        let rate = if start.options.contains(ScanOption::EXTCLOCK) {
            start.rate
        } else {
            // Every subsystem numbers its rate items the same way
            let min = self.profile.info_dbl(info, AI_INFO_MIN_SCAN_RATE, index)?;
            let max = self.profile.info_dbl(info, AI_INFO_MAX_SCAN_RATE, index)?;
            if !(start.rate >= min && start.rate <= max) {
                return Err(UlError::BadRate);
            }
            self.profile.snap_rate(start.rate, min, max)
        };

        if target.is_input() {
            for event in &mut self.events {
                event.next_threshold = event.parameter;
            }
        }
        debug!(
            "mock {:?} scan started: {} columns x {} samples at {} Hz",
            target,
            start.columns.len(),
            samples_per_channel,
            rate
        );
        self.scans.insert(
            target,
            MockScan {
                status: ScanStatus::Running,
                options: start.options,
                columns: start.columns,
                samples_per_channel,
                buffer: start.buffer,
                transfer: TransferStatus::default(),
            },
        );
        Ok(rate)
    }

    fn next_sample(&mut self, column: Column) -> f64 {
        match column {
            Column::Analog(channel) => self.analog_inputs.get(&channel).copied().unwrap_or(0.0),
            Column::Port(port) => self.port(port).map(MockPort::read).unwrap_or(0) as f64,
            Column::Counter(counter) => {
                let max = self.counter_max();
                let value = self
                    .counters
                    .entry((counter, CounterRegisterType::COUNT.bits()))
                    .or_insert(0);
                *value = if *value >= max { 0 } else { *value + 1 };
                *value as f64
            }
        }
    }

    fn apply_output(&mut self, column: Column, value: f64) {
        match column {
            Column::Analog(channel) => {
                self.analog_outputs.insert(channel, value);
            }
            Column::Port(port) => {
                if let Ok(p) = self.port_mut(port) {
                    p.latch = value as u64 & p.width_mask();
                }
            }
            Column::Counter(_) => {}
        }
    }

    /// Move a running scan forward by up to `scans` samples per channel
    fn advance(&mut self, target: ScanTarget, scans: u64) -> (TransferStatus, Vec<Dispatch>) {
        let mut fired = Vec::new();
        let Some(mut scan) = self.scans.remove(&target) else {
            return (TransferStatus::default(), fired);
        };
        let input = target.is_input();
        let width = scan.columns.len();

        for _ in 0..scans {
            if scan.status != ScanStatus::Running {
                break;
            }
            let position = (scan.transfer.current_scan_count % scan.samples_per_channel as u64)
                as usize
                * width;
            for (offset, column) in scan.columns.clone().into_iter().enumerate() {
                if input {
                    let sample = self.next_sample(column);
                    scan.buffer.set(position + offset, sample);
                } else if let Some(value) = scan.buffer.get(position + offset) {
                    self.apply_output(column, value);
                }
            }
            scan.transfer.current_scan_count += 1;
            scan.transfer.current_total_count += width as u64;
            scan.transfer.current_index = position as i64;

            if input {
                for event in &mut self.events {
                    if event.types.contains(DaqEventType::ON_DATA_AVAILABLE)
                        && scan.transfer.current_scan_count >= event.next_threshold
                    {
                        fired.push((
                            EventHandler::clone(&event.handler),
                            DaqEventType::ON_DATA_AVAILABLE,
                            scan.transfer.current_total_count,
                        ));
                        event.next_threshold += event.parameter;
                    }
                }
            }

            if !scan.options.contains(ScanOption::CONTINUOUS)
                && scan.transfer.current_scan_count >= scan.samples_per_channel as u64
            {
                scan.status = ScanStatus::Idle;
                let end = if input {
                    DaqEventType::ON_END_OF_INPUT_SCAN
                } else {
                    DaqEventType::ON_END_OF_OUTPUT_SCAN
                };
                if let Some(handler) = self.handler_for(end) {
                    fired.push((handler, end, scan.transfer.current_total_count));
                }
                debug!("mock {:?} scan complete", target);
            }
        }

        let transfer = scan.transfer;
        self.scans.insert(target, scan);
        (transfer, fired)
    }

    fn any_scan_running(&self) -> bool {
        self.scans.values().any(|scan| scan.status == ScanStatus::Running)
    }

    fn stop_all_scans(&mut self) {
        for scan in self.scans.values_mut() {
            scan.status = ScanStatus::Idle;
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Teardown related call seen by the mock, in arrival order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCall {
    /// A stop that found the scan running
    ScanStop(ScanTarget),
    /// `scans_running` is true when any scan was still running at the time
    Disconnect { scans_running: bool },
    Release,
}

struct MockState {
    next_handle: DaqDeviceHandle,
    inventory: Vec<(DaqDeviceDescriptor, MockProfile)>,
    devices: HashMap<DaqDeviceHandle, MockDevice>,
    lifecycle: Vec<(DaqDeviceHandle, LifecycleCall)>,
    usb_priority: i64,
    version: String,
}

impl MockState {
    fn device(&self, handle: DaqDeviceHandle) -> Result<&MockDevice> {
        self.devices.get(&handle).ok_or(UlError::BadDevHandle)
    }

    fn device_mut(&mut self, handle: DaqDeviceHandle) -> Result<&mut MockDevice> {
        self.devices.get_mut(&handle).ok_or(UlError::BadDevHandle)
    }

    fn connected(&mut self, handle: DaqDeviceHandle) -> Result<&mut MockDevice> {
        let device = self.device_mut(handle)?;
        if !device.connected {
            return Err(UlError::DevNotConnected);
        }
        Ok(device)
    }
}

/// Scriptable stand-in for the native driver
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use uldaq::{DaqDevice, DaqDeviceDescriptor, InterfaceType, MockDriver, MockProfile};
///
/// let descriptor = DaqDeviceDescriptor::new("USB-1808X", 0x13d, InterfaceType::USB, "01D97CFA");
/// let driver = Arc::new(
///     MockDriver::new().with_device(descriptor.clone(), MockProfile::multifunction()),
/// );
///
/// let device = DaqDevice::with_driver(driver, &descriptor)?;
/// device.connect()?;
/// assert!(device.is_connected()?);
/// # Ok::<(), uldaq::UlError>(())
/// ```
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_handle: 1,
                inventory: Vec::new(),
                devices: HashMap::new(),
                lifecycle: Vec::new(),
                usb_priority: 0,
                version: "1.2.1".to_string(),
            }),
        }
    }
}

impl MockDriver {
    /// A driver with no devices attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device that inventory scans will report
    pub fn with_device(self, descriptor: DaqDeviceDescriptor, profile: MockProfile) -> Self {
        self.add_device(descriptor, profile);
        self
    }

    pub fn add_device(&self, descriptor: DaqDeviceDescriptor, profile: MockProfile) {
        self.state.lock().inventory.push((descriptor, profile));
    }

    fn with_device_state<R>(
        &self,
        handle: DaqDeviceHandle,
        f: impl FnOnce(&mut MockDevice) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.state.lock();
        f(state.device_mut(handle)?)
    }

    fn with_connected<R>(
        &self,
        handle: DaqDeviceHandle,
        f: impl FnOnce(&mut MockDevice) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.state.lock();
        f(state.connected(handle)?)
    }

    fn dispatch(fired: Vec<Dispatch>) {
        for (handler, kind, data) in fired {
            trace!("mock event {:?} data {}", kind, data);
            handler(kind, data);
        }
    }

    // ---- test hooks ----

    /// Produce `scans` samples per channel on a running scan
    ///
    /// Input scans sample the simulated inputs into the buffer; output
    /// scans consume the buffer into the simulated outputs. Events fire on
    /// the calling thread after the state lock is released.
    pub fn advance_scan(
        &self,
        handle: DaqDeviceHandle,
        target: ScanTarget,
        scans: u64,
    ) -> Result<TransferStatus> {
        let (transfer, fired) = {
            let mut state = self.state.lock();
            state.device_mut(handle)?.advance(target, scans)
        };
        Self::dispatch(fired);
        Ok(transfer)
    }

    /// Abort a running scan as if the hardware reported `error`
    pub fn fail_scan(
        &self,
        handle: DaqDeviceHandle,
        target: ScanTarget,
        error: UlError,
    ) -> Result<()> {
        let fired = {
            let mut state = self.state.lock();
            let device = state.device_mut(handle)?;
            let Some(scan) = device.scans.get_mut(&target) else {
                return Ok(());
            };
            if scan.status != ScanStatus::Running {
                return Ok(());
            }
            scan.status = ScanStatus::Idle;
            let kind = if target.is_input() {
                DaqEventType::ON_INPUT_SCAN_ERROR
            } else {
                DaqEventType::ON_OUTPUT_SCAN_ERROR
            };
            let code = error.code().unwrap_or_default();
            device
                .handler_for(kind)
                .map(|handler| vec![(handler, kind, code as u64)])
                .unwrap_or_default()
        };
        Self::dispatch(fired);
        Ok(())
    }

    /// Voltage seen on an analog input channel
    pub fn set_analog_input(
        &self,
        handle: DaqDeviceHandle,
        channel: i32,
        volts: f64,
    ) -> Result<()> {
        self.with_device_state(handle, |d| {
            d.analog_inputs.insert(channel, volts);
            Ok(())
        })
    }

    /// Last value written to an analog output channel
    pub fn analog_output(&self, handle: DaqDeviceHandle, channel: i32) -> Result<Option<f64>> {
        self.with_device_state(handle, |d| Ok(d.analog_outputs.get(&channel).copied()))
    }

    /// Levels driven onto the input bits of a port
    pub fn set_port_input(
        &self,
        handle: DaqDeviceHandle,
        port: DigitalPortType,
        value: u64,
    ) -> Result<()> {
        self.with_device_state(handle, |d| {
            d.port_mut(port)?.inputs = value;
            Ok(())
        })
    }

    /// Output latch of a port
    pub fn port_output(&self, handle: DaqDeviceHandle, port: DigitalPortType) -> Result<u64> {
        self.with_device_state(handle, |d| Ok(d.port(port)?.latch))
    }

    pub fn set_counter(&self, handle: DaqDeviceHandle, counter: i32, value: u64) -> Result<()> {
        self.with_device_state(handle, |d| {
            d.check_counter(counter)?;
            d.counters
                .insert((counter, CounterRegisterType::COUNT.bits()), value);
            Ok(())
        })
    }

    pub fn counter_config(
        &self,
        handle: DaqDeviceHandle,
        counter: i32,
    ) -> Result<Option<CounterScanConfig>> {
        self.with_device_state(handle, |d| Ok(d.counter_configs.get(&counter).copied()))
    }

    pub fn loaded_queue(&self, handle: DaqDeviceHandle) -> Result<Vec<AiQueueElement>> {
        self.with_device_state(handle, |d| Ok(d.queue.clone()))
    }

    /// Most recent trigger accepted on any subsystem of the device
    pub fn last_trigger(&self, handle: DaqDeviceHandle) -> Result<Option<TriggerConfig>> {
        self.with_device_state(handle, |d| Ok(d.last_trigger))
    }

    pub fn led_flashes(&self, handle: DaqDeviceHandle) -> Result<u32> {
        self.with_device_state(handle, |d| Ok(d.led_flashes))
    }

    /// Event types currently bound to a handler
    pub fn enabled_events(&self, handle: DaqDeviceHandle) -> Result<DaqEventType> {
        self.with_device_state(handle, |d| {
            Ok(d
                .events
                .iter()
                .fold(DaqEventType::empty(), |acc, e| acc | e.types))
        })
    }

    /// Simulate the device dropping off the bus
    pub fn unplug_device(&self, handle: DaqDeviceHandle) -> Result<()> {
        self.with_device_state(handle, |d| {
            d.present = false;
            d.connected = false;
            d.stop_all_scans();
            Ok(())
        })
    }

    /// Scan stops, disconnects and releases seen for `handle`, oldest first
    ///
    /// The log outlives the release of the handle.
    pub fn lifecycle_calls(&self, handle: DaqDeviceHandle) -> Vec<LifecycleCall> {
        self.state
            .lock()
            .lifecycle
            .iter()
            .filter(|(h, _)| *h == handle)
            .map(|&(_, call)| call)
            .collect()
    }

    /// True once `handle` was handed out and then released
    pub fn is_released(&self, handle: DaqDeviceHandle) -> bool {
        let state = self.state.lock();
        handle > 0 && handle < state.next_handle && !state.devices.contains_key(&handle)
    }
}

impl UlDriver for MockDriver {
    fn inventory(
        &self,
        interface: InterfaceType,
        max_devices: usize,
    ) -> Result<Vec<DaqDeviceDescriptor>> {
        let state = self.state.lock();
        Ok(state
            .inventory
            .iter()
            .filter(|(d, _)| d.dev_interface.intersects(interface))
            .take(max_devices)
            .map(|(d, _)| d.clone())
            .collect())
    }

    fn create_device(&self, descriptor: &DaqDeviceDescriptor) -> Result<DaqDeviceHandle> {
        let mut state = self.state.lock();
        let (known, profile) = state
            .inventory
            .iter()
            .find(|(d, _)| {
                d.unique_id == descriptor.unique_id && d.product_id == descriptor.product_id
            })
            .map(|(d, p)| (d.clone(), p.clone()))
            .ok_or(UlError::BadDescriptor)?;
        let handle = state.next_handle;
        state.next_handle += 1;
        state.devices.insert(handle, MockDevice::new(known, profile));
        debug!("mock handle {} created for {}", handle, descriptor.unique_id);
        Ok(handle)
    }

    fn device_descriptor(&self, handle: DaqDeviceHandle) -> Result<DaqDeviceDescriptor> {
        let state = self.state.lock();
        Ok(state.device(handle)?.descriptor.clone())
    }

    fn connect(&self, handle: DaqDeviceHandle) -> Result<()> {
        self.with_device_state(handle, |d| {
            if !d.present {
                return Err(UlError::DevNotFound);
            }
            d.connected = true;
            Ok(())
        })
    }

    fn disconnect(&self, handle: DaqDeviceHandle) -> Result<()> {
        let mut state = self.state.lock();
        let device = state.device_mut(handle)?;
        let scans_running = device.any_scan_running();
        device.connected = false;
        device.stop_all_scans();
        state
            .lifecycle
            .push((handle, LifecycleCall::Disconnect { scans_running }));
        Ok(())
    }

    fn release(&self, handle: DaqDeviceHandle) -> Result<()> {
        let mut state = self.state.lock();
        state.devices.remove(&handle).ok_or(UlError::BadDevHandle)?;
        state.lifecycle.push((handle, LifecycleCall::Release));
        debug!("mock handle {} released", handle);
        Ok(())
    }

    fn is_connected(&self, handle: DaqDeviceHandle) -> Result<bool> {
        let state = self.state.lock();
        Ok(state.device(handle)?.connected)
    }

    fn flash_led(&self, handle: DaqDeviceHandle, flash_count: i32) -> Result<()> {
        self.with_connected(handle, |d| {
            let count = u32::try_from(flash_count).map_err(|_| UlError::BadArg)?;
            d.led_flashes += count;
            Ok(())
        })
    }

    fn library_info_str(&self, item: i32, _index: u32) -> Result<String> {
        match item {
            UL_INFO_VER_STR => Ok(self.state.lock().version.clone()),
            _ => Err(UlError::BadInfoItem),
        }
    }

    fn set_library_config(&self, item: i32, _index: u32, value: i64) -> Result<()> {
        match item {
            UL_CFG_USB_XFER_PRIORITY if (0..=99).contains(&value) => {
                self.state.lock().usb_priority = value;
                Ok(())
            }
            UL_CFG_USB_XFER_PRIORITY => Err(UlError::BadConfigVal),
            _ => Err(UlError::BadConfigItem),
        }
    }

    fn library_config(&self, item: i32, _index: u32) -> Result<i64> {
        match item {
            UL_CFG_USB_XFER_PRIORITY => Ok(self.state.lock().usb_priority),
            _ => Err(UlError::BadConfigItem),
        }
    }

    fn get_info(
        &self,
        handle: DaqDeviceHandle,
        target: InfoTarget,
        item: i32,
        index: u32,
    ) -> Result<i64> {
        let state = self.state.lock();
        state.device(handle)?.profile.info(target, item, index)
    }

    fn get_info_dbl(
        &self,
        handle: DaqDeviceHandle,
        target: InfoTarget,
        item: i32,
        index: u32,
    ) -> Result<f64> {
        let state = self.state.lock();
        state.device(handle)?.profile.info_dbl(target, item, index)
    }

    fn dev_config_str(&self, handle: DaqDeviceHandle, item: i32, index: u32) -> Result<String> {
        self.with_connected(handle, |d| match item {
            DEV_CFG_VER_STR => d
                .profile
                .versions
                .get(&index)
                .cloned()
                .ok_or(UlError::BadConfigItem),
            _ => Err(UlError::BadConfigItem),
        })
    }

    fn ai_set_config(
        &self,
        handle: DaqDeviceHandle,
        item: i32,
        index: u32,
        value: i64,
    ) -> Result<()> {
        self.with_connected(handle, |d| d.ai_set_config(item, index, value))
    }

    fn ai_config(&self, handle: DaqDeviceHandle, item: i32, index: u32) -> Result<i64> {
        self.with_connected(handle, |d| d.ai_config(item, index))
    }

    fn ai_set_config_dbl(
        &self,
        handle: DaqDeviceHandle,
        item: i32,
        index: u32,
        value: f64,
    ) -> Result<()> {
        self.with_connected(handle, |d| d.ai_set_config_dbl(item, index, value))
    }

    fn ai_config_dbl(&self, handle: DaqDeviceHandle, item: i32, index: u32) -> Result<f64> {
        self.with_connected(handle, |d| d.ai_config_dbl(item, index))
    }

    fn ai_config_str(&self, handle: DaqDeviceHandle, item: i32, _index: u32) -> Result<String> {
        self.with_connected(handle, |d| match item {
            AI_CFG_CAL_DATE_STR => Ok(d.profile.cal_date_str.clone()),
            _ => Err(UlError::BadConfigItem),
        })
    }

    fn dio_config(&self, handle: DaqDeviceHandle, item: i32, index: u32) -> Result<i64> {
        self.with_connected(handle, |d| match item {
            DIO_CFG_PORT_DIRECTION_MASK => d
                .ports
                .get(index as usize)
                .map(|p| p.direction_mask as i64)
                .ok_or(UlError::BadPortType),
            _ => Err(UlError::BadConfigItem),
        })
    }

    fn a_in(
        &self,
        handle: DaqDeviceHandle,
        channel: i32,
        input_mode: AiInputMode,
        range: Range,
        flags: AInFlag,
    ) -> Result<f64> {
        self.with_connected(handle, |d| {
            d.check_ai(channel, input_mode, range)?;
            let (min, max) = range.limits();
            let volts = d
                .analog_inputs
                .get(&channel)
                .copied()
                .unwrap_or(0.0)
                .clamp(min, max);
            if flags.contains(AInFlag::NOSCALEDATA) {
                let resolution = d.profile.info_or(InfoTarget::Ai, AI_INFO_RESOLUTION, 0, 16);
                let full = ((1u64 << resolution.clamp(1, 32)) - 1) as f64;
                return Ok(((volts - min) / (max - min) * full).round());
            }
            Ok(volts)
        })
    }

    fn a_in_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        input_mode: AiInputMode,
        range: Range,
        _flags: AInScanFlag,
        buffer: &FloatBuffer,
    ) -> Result<f64> {
        self.with_connected(handle, |d| {
            let columns = if d.queue.is_empty() {
                if request.low_channel > request.high_channel {
                    return Err(UlError::BadAiChan);
                }
                (request.low_channel..=request.high_channel)
                    .map(|ch| d.check_ai(ch, input_mode, range).map(|_| Column::Analog(ch)))
                    .collect::<Result<Vec<_>>>()?
            } else {
                d.queue.iter().map(|e| Column::Analog(e.channel)).collect()
            };
            d.start_scan(
                ScanTarget::AIn,
                ScanStart {
                    options: request.options,
                    samples_per_channel: request.samples_per_channel,
                    rate: request.rate,
                    columns,
                    buffer: MockBuffer::Float(buffer.clone()),
                },
            )
        })
    }

    fn a_in_load_queue(&self, handle: DaqDeviceHandle, queue: &[AiQueueElement]) -> Result<()> {
        self.with_connected(handle, |d| {
            if let Some(first) = queue.first() {
                let max = d.profile.info_or(
                    InfoTarget::Ai,
                    AI_INFO_MAX_QUEUE_LENGTH_BY_MODE,
                    first.input_mode.raw() as u32,
                    0,
                );
                if queue.len() as i64 > max {
                    return Err(UlError::BadQueueSize);
                }
                for element in queue {
                    d.check_ai(element.channel, element.input_mode, element.range)?;
                }
            }
            d.queue = queue.to_vec();
            Ok(())
        })
    }

    fn a_out(
        &self,
        handle: DaqDeviceHandle,
        channel: i32,
        range: Range,
        flags: AOutFlag,
        value: f64,
    ) -> Result<()> {
        self.with_connected(handle, |d| {
            d.check_ao(channel, range)?;
            let (min, max) = range.limits();
            let volts = if flags.contains(AOutFlag::NOSCALEDATA) {
                let resolution = d.profile.info_or(InfoTarget::Ao, AO_INFO_RESOLUTION, 0, 16);
                let full = ((1u64 << resolution.clamp(1, 32)) - 1) as f64;
                if !(0.0..=full).contains(&value) {
                    return Err(UlError::BadDaVal);
                }
                min + value / full * (max - min)
            } else {
                if !(min..=max).contains(&value) {
                    return Err(UlError::BadDaVal);
                }
                value
            };
            d.analog_outputs.insert(channel, volts);
            Ok(())
        })
    }

    fn a_out_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        range: Range,
        _flags: AOutScanFlag,
        buffer: &FloatBuffer,
    ) -> Result<f64> {
        self.with_connected(handle, |d| {
            if request.low_channel > request.high_channel {
                return Err(UlError::BadAoChan);
            }
            let columns = (request.low_channel..=request.high_channel)
                .map(|ch| d.check_ao(ch, range).map(|_| Column::Analog(ch)))
                .collect::<Result<Vec<_>>>()?;
            d.start_scan(
                ScanTarget::AOut,
                ScanStart {
                    options: request.options,
                    samples_per_channel: request.samples_per_channel,
                    rate: request.rate,
                    columns,
                    buffer: MockBuffer::Float(buffer.clone()),
                },
            )
        })
    }

    fn d_config_port(
        &self,
        handle: DaqDeviceHandle,
        port: DigitalPortType,
        direction: DigitalDirection,
    ) -> Result<()> {
        self.with_connected(handle, |d| {
            let p = d.port_mut(port)?;
            match p.io_type {
                DigitalPortIoType::Bidirectional | DigitalPortIoType::BitIo => {
                    p.direction_mask = match direction {
                        DigitalDirection::Output => p.width_mask(),
                        DigitalDirection::Input => 0,
                    };
                    Ok(())
                }
                _ => Err(UlError::ConfigNotSupported),
            }
        })
    }

    fn d_config_bit(
        &self,
        handle: DaqDeviceHandle,
        port: DigitalPortType,
        bit: i32,
        direction: DigitalDirection,
    ) -> Result<()> {
        self.with_connected(handle, |d| {
            let p = d.port_mut(port)?;
            if p.io_type != DigitalPortIoType::BitIo {
                return Err(UlError::ConfigNotSupported);
            }
            let bit = p.check_bit(bit)?;
            match direction {
                DigitalDirection::Output => p.direction_mask |= 1 << bit,
                DigitalDirection::Input => p.direction_mask &= !(1 << bit),
            }
            Ok(())
        })
    }

    fn d_in(&self, handle: DaqDeviceHandle, port: DigitalPortType) -> Result<u64> {
        self.with_connected(handle, |d| Ok(d.port(port)?.read()))
    }

    fn d_out(&self, handle: DaqDeviceHandle, port: DigitalPortType, value: u64) -> Result<()> {
        self.with_connected(handle, |d| {
            let p = d.port_mut(port)?;
            if value & !p.width_mask() != 0 {
                return Err(UlError::BadPortVal);
            }
            if p.direction_mask == 0 {
                return Err(UlError::WrongDigConfig);
            }
            p.latch = value;
            Ok(())
        })
    }

    fn d_bit_in(&self, handle: DaqDeviceHandle, port: DigitalPortType, bit: i32) -> Result<u32> {
        self.with_connected(handle, |d| {
            let p = d.port(port)?;
            let bit = p.check_bit(bit)?;
            Ok(((p.read() >> bit) & 1) as u32)
        })
    }

    fn d_bit_out(
        &self,
        handle: DaqDeviceHandle,
        port: DigitalPortType,
        bit: i32,
        value: u32,
    ) -> Result<()> {
        self.with_connected(handle, |d| {
            let p = d.port_mut(port)?;
            let bit = p.check_bit(bit)?;
            if value > 1 {
                return Err(UlError::BadPortVal);
            }
            if p.direction_mask & (1 << bit) == 0 {
                return Err(UlError::WrongDigConfig);
            }
            if value == 1 {
                p.latch |= 1 << bit;
            } else {
                p.latch &= !(1 << bit);
            }
            Ok(())
        })
    }

    fn d_in_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        _flags: DInScanFlag,
        buffer: &IntBuffer,
    ) -> Result<f64> {
        self.with_connected(handle, |d| {
            let columns = d.port_columns(request.low_channel, request.high_channel)?;
            d.start_scan(
                ScanTarget::DIn,
                ScanStart {
                    options: request.options,
                    samples_per_channel: request.samples_per_channel,
                    rate: request.rate,
                    columns,
                    buffer: MockBuffer::Int(buffer.clone()),
                },
            )
        })
    }

    fn d_out_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        _flags: DOutScanFlag,
        buffer: &IntBuffer,
    ) -> Result<f64> {
        self.with_connected(handle, |d| {
            let columns = d.port_columns(request.low_channel, request.high_channel)?;
            if columns.iter().any(|c| match c {
                Column::Port(port) => d.port(*port).map_or(true, |p| p.direction_mask == 0),
                _ => false,
            }) {
                return Err(UlError::WrongDigConfig);
            }
            d.start_scan(
                ScanTarget::DOut,
                ScanStart {
                    options: request.options,
                    samples_per_channel: request.samples_per_channel,
                    rate: request.rate,
                    columns,
                    buffer: MockBuffer::Int(buffer.clone()),
                },
            )
        })
    }

    fn c_in(&self, handle: DaqDeviceHandle, counter: i32) -> Result<u64> {
        self.c_read(handle, counter, CounterRegisterType::COUNT)
    }

    fn c_read(
        &self,
        handle: DaqDeviceHandle,
        counter: i32,
        register: CounterRegisterType,
    ) -> Result<u64> {
        self.with_connected(handle, |d| {
            d.check_counter(counter)?;
            let register = d.check_register(register)?;
            Ok(d.counters.get(&(counter, register)).copied().unwrap_or(0))
        })
    }

    fn c_load(
        &self,
        handle: DaqDeviceHandle,
        counter: i32,
        register: CounterRegisterType,
        value: u64,
    ) -> Result<()> {
        self.with_connected(handle, |d| {
            d.check_counter(counter)?;
            if register == CounterRegisterType::COUNT {
                return Err(UlError::BadCtrReg);
            }
            let bits = d.check_register(register)?;
            if value > d.counter_max() {
                return Err(UlError::BadCtrVal);
            }
            d.counters.insert((counter, bits), value);
            if register == CounterRegisterType::LOAD {
                d.counters
                    .insert((counter, CounterRegisterType::COUNT.bits()), value);
            }
            Ok(())
        })
    }

    fn c_clear(&self, handle: DaqDeviceHandle, counter: i32) -> Result<()> {
        self.with_connected(handle, |d| {
            d.check_counter(counter)?;
            d.counters
                .insert((counter, CounterRegisterType::COUNT.bits()), 0);
            Ok(())
        })
    }

    fn c_config_scan(
        &self,
        handle: DaqDeviceHandle,
        counter: i32,
        config: &CounterScanConfig,
    ) -> Result<()> {
        self.with_connected(handle, |d| {
            d.check_counter(counter)?;
            let types = CounterMeasurementType::from_bits_retain(d.profile.mask(
                InfoTarget::Ctr,
                CTR_INFO_MEASUREMENT_TYPES,
                counter as u32,
            ));
            let kind = config.measurement_type;
            if kind.bits().count_ones() != 1 || !types.contains(kind) {
                return Err(UlError::BadCtrMeasureType);
            }
            let modes = CounterMeasurementMode::from_bits_retain(d.profile.mask(
                InfoTarget::Ctr,
                CTR_INFO_MEASUREMENT_MODES,
                kind.bits(),
            ));
            if !modes.contains(config.measurement_mode) {
                return Err(UlError::BadCtrMeasureMode);
            }
            d.counter_configs.insert(counter, *config);
            Ok(())
        })
    }

    fn c_in_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        flags: CInScanFlag,
        buffer: &IntBuffer,
    ) -> Result<f64> {
        self.with_connected(handle, |d| {
            if request.low_channel > request.high_channel {
                return Err(UlError::BadCtr);
            }
            let columns = (request.low_channel..=request.high_channel)
                .map(|ctr| d.check_counter(ctr).map(|_| Column::Counter(ctr)))
                .collect::<Result<Vec<_>>>()?;
            let rate = d.start_scan(
                ScanTarget::CIn,
                ScanStart {
                    options: request.options,
                    samples_per_channel: request.samples_per_channel,
                    rate: request.rate,
                    columns,
                    buffer: MockBuffer::Int(buffer.clone()),
                },
            )?;
            if !flags.contains(CInScanFlag::NOCLEAR) {
                for ctr in request.low_channel..=request.high_channel {
                    d.counters.insert((ctr, CounterRegisterType::COUNT.bits()), 0);
                }
            }
            Ok(rate)
        })
    }

    fn pulse_out_start(
        &self,
        handle: DaqDeviceHandle,
        timer: i32,
        request: &PulseOutRequest,
    ) -> Result<PulseOutResult> {
        self.with_connected(handle, |d| {
            d.check_timer(timer)?;
            if d.timers.get(&timer) == Some(&TmrStatus::Running) {
                return Err(UlError::AlreadyActive);
            }
            let min = d.profile.info_dbl(InfoTarget::Tmr, TMR_INFO_MIN_FREQ, timer as u32)?;
            let max = d.profile.info_dbl(InfoTarget::Tmr, TMR_INFO_MAX_FREQ, timer as u32)?;
            if !(request.frequency >= min && request.frequency <= max) {
                return Err(UlError::BadFrequency);
            }
            if !(request.duty_cycle > 0.0 && request.duty_cycle < 1.0) {
                return Err(UlError::BadDutyCycle);
            }
            if !(request.initial_delay >= 0.0) {
                return Err(UlError::BadInitialDelay);
            }
            let clock = d.profile.pacer_clock_hz;
            let divisor = (clock / request.frequency).round().max(1.0);
            let high = (request.duty_cycle * divisor)
                .round()
                .clamp(1.0, (divisor - 1.0).max(1.0));
            d.timers.insert(timer, TmrStatus::Running);
            Ok(PulseOutResult {
                frequency: (clock / divisor).clamp(min, max),
                duty_cycle: high / divisor,
                initial_delay: request.initial_delay,
            })
        })
    }

    fn pulse_out_stop(&self, handle: DaqDeviceHandle, timer: i32) -> Result<()> {
        self.with_connected(handle, |d| {
            d.check_timer(timer)?;
            d.timers.insert(timer, TmrStatus::Idle);
            Ok(())
        })
    }

    fn pulse_out_status(&self, handle: DaqDeviceHandle, timer: i32) -> Result<TmrStatus> {
        self.with_connected(handle, |d| {
            d.check_timer(timer)?;
            Ok(d.timers.get(&timer).copied().unwrap_or(TmrStatus::Idle))
        })
    }

    fn daq_in_scan(
        &self,
        handle: DaqDeviceHandle,
        channels: &[DaqInChanDescriptor],
        samples_per_channel: i32,
        rate: f64,
        options: ScanOption,
        _flags: DaqInScanFlag,
        buffer: &FloatBuffer,
    ) -> Result<f64> {
        self.with_connected(handle, |d| {
            let columns = channels
                .iter()
                .map(|c| d.daq_in_column(c))
                .collect::<Result<Vec<_>>>()?;
            d.start_scan(
                ScanTarget::DaqIn,
                ScanStart {
                    options,
                    samples_per_channel,
                    rate,
                    columns,
                    buffer: MockBuffer::Float(buffer.clone()),
                },
            )
        })
    }

    fn daq_out_scan(
        &self,
        handle: DaqDeviceHandle,
        channels: &[DaqOutChanDescriptor],
        samples_per_channel: i32,
        rate: f64,
        options: ScanOption,
        _flags: DaqOutScanFlag,
        buffer: &FloatBuffer,
    ) -> Result<f64> {
        self.with_connected(handle, |d| {
            let columns = channels
                .iter()
                .map(|c| d.daq_out_column(c))
                .collect::<Result<Vec<_>>>()?;
            d.start_scan(
                ScanTarget::DaqOut,
                ScanStart {
                    options,
                    samples_per_channel,
                    rate,
                    columns,
                    buffer: MockBuffer::Float(buffer.clone()),
                },
            )
        })
    }

    fn scan_status(
        &self,
        handle: DaqDeviceHandle,
        target: ScanTarget,
    ) -> Result<(ScanStatus, TransferStatus)> {
        let state = self.state.lock();
        let device = state.device(handle)?;
        Ok(device
            .scans
            .get(&target)
            .map(|s| (s.status, s.transfer))
            .unwrap_or((ScanStatus::Idle, TransferStatus::default())))
    }

    fn scan_stop(&self, handle: DaqDeviceHandle, target: ScanTarget) -> Result<()> {
        let mut state = self.state.lock();
        let Some(scan) = state.device_mut(handle)?.scans.get_mut(&target) else {
            return Ok(());
        };
        let was_running = scan.status == ScanStatus::Running;
        scan.status = ScanStatus::Idle;
        if was_running {
            debug!("mock {:?} scan stopped", target);
            state.lifecycle.push((handle, LifecycleCall::ScanStop(target)));
        }
        Ok(())
    }

    /// Finite scans run to completion; continuous scans time out at once
    fn scan_wait(
        &self,
        handle: DaqDeviceHandle,
        target: ScanTarget,
        _wait_type: WaitType,
        _wait_param: i64,
        _timeout: f64,
    ) -> Result<()> {
        let fired = {
            let mut state = self.state.lock();
            let device = state.device_mut(handle)?;
            let remaining = match device.scans.get(&target) {
                Some(scan) if scan.status == ScanStatus::Running => {
                    if scan.options.contains(ScanOption::CONTINUOUS) {
                        return Err(UlError::TimedOut);
                    }
                    (scan.samples_per_channel as u64)
                        .saturating_sub(scan.transfer.current_scan_count)
                }
                _ => return Ok(()),
            };
            device.advance(target, remaining).1
        };
        Self::dispatch(fired);
        Ok(())
    }

    fn set_trigger(
        &self,
        handle: DaqDeviceHandle,
        target: TriggerTarget,
        channel: i32,
        config: &TriggerConfig,
    ) -> Result<()> {
        self.with_connected(handle, |d| {
            if target == TriggerTarget::Tmr {
                d.check_timer(channel)?;
                if config.trig_type.is_empty() {
                    return Err(UlError::BadTrigType);
                }
            } else {
                check_trigger_type(d.trigger_types(target), config)?;
            }
            d.last_trigger = Some(*config);
            Ok(())
        })
    }

    fn daq_in_set_trigger(
        &self,
        handle: DaqDeviceHandle,
        channel: &DaqInChanDescriptor,
        config: &TriggerConfig,
    ) -> Result<()> {
        self.with_connected(handle, |d| {
            let supported = TriggerType::from_bits_retain(d.profile.mask(
                InfoTarget::DaqI,
                DAQI_INFO_TRIG_TYPES,
                0,
            ));
            check_trigger_type(supported, config)?;
            d.daq_in_column(channel)?;
            d.last_trigger = Some(*config);
            Ok(())
        })
    }

    fn daq_out_set_trigger(
        &self,
        handle: DaqDeviceHandle,
        channel: &DaqInChanDescriptor,
        config: &TriggerConfig,
    ) -> Result<()> {
        self.with_connected(handle, |d| {
            let supported = TriggerType::from_bits_retain(d.profile.mask(
                InfoTarget::DaqO,
                DAQO_INFO_TRIG_TYPES,
                0,
            ));
            check_trigger_type(supported, config)?;
            d.daq_in_column(channel)?;
            d.last_trigger = Some(*config);
            Ok(())
        })
    }

    fn enable_event(
        &self,
        handle: DaqDeviceHandle,
        event_types: DaqEventType,
        event_parameter: u64,
        handler: EventHandler,
    ) -> Result<()> {
        self.with_device_state(handle, |d| {
            let supported = DaqEventType::from_bits_retain(d.profile.mask(
                InfoTarget::Device,
                DEV_INFO_DAQ_EVENT_TYPES,
                0,
            ));
            if event_types.is_empty() || !supported.contains(event_types) {
                return Err(UlError::BadEventType);
            }
            if event_types.contains(DaqEventType::ON_DATA_AVAILABLE) && event_parameter == 0 {
                return Err(UlError::BadEventParameter);
            }
            if d.events.iter().any(|e| e.types.intersects(event_types)) {
                return Err(UlError::EventAlreadyEnabled);
            }
            d.events.push(MockEvent {
                types: event_types,
                parameter: event_parameter,
                next_threshold: event_parameter,
                handler,
            });
            Ok(())
        })
    }

    fn disable_event(&self, handle: DaqDeviceHandle, event_types: DaqEventType) -> Result<()> {
        self.with_device_state(handle, |d| {
            for event in &mut d.events {
                event.types.remove(event_types);
            }
            d.events.retain(|e| !e.types.is_empty());
            Ok(())
        })
    }

    fn mem_get_info(&self, handle: DaqDeviceHandle, region: MemRegion) -> Result<MemDescriptor> {
        let state = self.state.lock();
        state
            .device(handle)?
            .profile
            .memory
            .iter()
            .find(|m| m.region == region)
            .copied()
            .ok_or(UlError::BadMemRegion)
    }

    fn mem_read(
        &self,
        handle: DaqDeviceHandle,
        region: MemRegion,
        address: u32,
        buffer: &mut [u8],
    ) -> Result<()> {
        self.with_connected(handle, |d| {
            let (descriptor, offset) = mem_location(d, region, address, buffer.len())?;
            if !descriptor.access_types.contains(MemAccessType::READ) {
                return Err(UlError::MemAccessDenied);
            }
            let data = d.memory.get(&region.bits()).ok_or(UlError::BadMemRegion)?;
            buffer.copy_from_slice(&data[offset..offset + buffer.len()]);
            Ok(())
        })
    }

    fn mem_write(
        &self,
        handle: DaqDeviceHandle,
        region: MemRegion,
        address: u32,
        data: &[u8],
    ) -> Result<()> {
        self.with_connected(handle, |d| {
            let (descriptor, offset) = mem_location(d, region, address, data.len())?;
            if !descriptor.access_types.contains(MemAccessType::WRITE) {
                return Err(UlError::MemAccessDenied);
            }
            let memory = d.memory.get_mut(&region.bits()).ok_or(UlError::BadMemRegion)?;
            memory[offset..offset + data.len()].copy_from_slice(data);
            Ok(())
        })
    }
}

/// Region descriptor and offset of `len` bytes at `address`
fn mem_location(
    device: &MockDevice,
    region: MemRegion,
    address: u32,
    len: usize,
) -> Result<(MemDescriptor, usize)> {
    let descriptor = device
        .profile
        .memory
        .iter()
        .find(|m| m.region == region)
        .copied()
        .ok_or(UlError::BadMemRegion)?;
    let offset = address
        .checked_sub(descriptor.address)
        .ok_or(UlError::BadMemAddress)? as usize;
    if offset + len > descriptor.size as usize {
        return Err(UlError::BadMemAddress);
    }
    Ok((descriptor, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn descriptor() -> DaqDeviceDescriptor {
        DaqDeviceDescriptor::new("USB-1808X", 0x13d, InterfaceType::USB, "01D97CFA")
    }

    fn connected_driver() -> (MockDriver, DaqDeviceHandle) {
        let driver = MockDriver::new().with_device(descriptor(), MockProfile::multifunction());
        let handle = driver.create_device(&descriptor()).unwrap();
        driver.connect(handle).unwrap();
        (driver, handle)
    }

    fn request(low: i32, high: i32, samples: i32, rate: f64, options: ScanOption) -> ScanRequest {
        ScanRequest {
            low_channel: low,
            high_channel: high,
            samples_per_channel: samples,
            rate,
            options,
        }
    }

    #[test]
    fn test_inventory_filters_by_interface() {
        let driver = MockDriver::new().with_device(descriptor(), MockProfile::multifunction());
        assert_eq!(driver.inventory(InterfaceType::ANY, 100).unwrap().len(), 1);
        assert!(driver.inventory(InterfaceType::ETHERNET, 100).unwrap().is_empty());
        assert!(driver.inventory(InterfaceType::USB, 0).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_descriptor() {
        let driver = MockDriver::new();
        assert_eq!(driver.create_device(&descriptor()), Err(UlError::BadDescriptor));
    }

    #[test]
    fn test_io_requires_connection() {
        let driver = MockDriver::new().with_device(descriptor(), MockProfile::multifunction());
        let handle = driver.create_device(&descriptor()).unwrap();
        assert_eq!(
            driver.a_in(handle, 0, AiInputMode::SingleEnded, Range::Bip10Volts, AInFlag::empty()),
            Err(UlError::DevNotConnected)
        );
        // Info does not touch the device
        assert_eq!(driver.get_info(handle, InfoTarget::Ai, AI_INFO_NUM_CHANS, 0), Ok(8));
    }

    #[test]
    fn test_release_invalidates_handle() {
        let (driver, handle) = connected_driver();
        driver.release(handle).unwrap();
        assert!(driver.is_released(handle));
        assert_eq!(driver.is_connected(handle), Err(UlError::BadDevHandle));
        assert_eq!(driver.release(handle), Err(UlError::BadDevHandle));
    }

    #[test]
    fn test_rate_is_snapped_to_pacer() {
        let (driver, handle) = connected_driver();
        let buffer = FloatBuffer::new(1, 100).unwrap();
        let rate = driver
            .a_in_scan(
                handle,
                &request(0, 0, 100, 1234.5, ScanOption::CONTINUOUS),
                AiInputMode::SingleEnded,
                Range::Bip10Volts,
                AInScanFlag::empty(),
                &buffer,
            )
            .unwrap();
        let divisor = (64_000_000.0f64 / 1234.5).round();
        assert_eq!(rate, 64_000_000.0 / divisor);
    }

    #[test]
    fn test_scan_argument_checks() {
        let (driver, handle) = connected_driver();
        let small = FloatBuffer::new(1, 10).unwrap();
        let scan = |req: ScanRequest, buffer: &FloatBuffer| {
            driver.a_in_scan(
                handle,
                &req,
                AiInputMode::SingleEnded,
                Range::Bip10Volts,
                AInScanFlag::empty(),
                buffer,
            )
        };
        assert_eq!(
            scan(request(0, 1, 10, 100.0, ScanOption::DEFAULTIO), &small),
            Err(UlError::BadBufferSize)
        );
        assert_eq!(
            scan(request(0, 0, 10, 1e9, ScanOption::DEFAULTIO), &small),
            Err(UlError::BadRate)
        );
        assert_eq!(
            scan(request(0, 0, 10, 100.0, ScanOption::BURSTMODE), &small),
            Err(UlError::BadOption)
        );
        assert_eq!(
            scan(
                request(0, 8, 10, 100.0, ScanOption::DEFAULTIO),
                &FloatBuffer::new(9, 10).unwrap()
            ),
            Err(UlError::BadAiChan)
        );
        assert_eq!(
            scan(request(0, 0, 0, 100.0, ScanOption::DEFAULTIO), &small),
            Err(UlError::BadSampleCount)
        );
    }

    #[test]
    fn test_finite_scan_completes_and_fires_end_event() {
        let (driver, handle) = connected_driver();
        let ends = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&ends);
        driver
            .enable_event(
                handle,
                DaqEventType::ON_END_OF_INPUT_SCAN,
                0,
                Arc::new(move |_, data| seen.store(data, Ordering::SeqCst)),
            )
            .unwrap();
        driver.set_analog_input(handle, 1, 2.5).unwrap();
        let buffer = FloatBuffer::new(2, 5).unwrap();
        driver
            .a_in_scan(
                handle,
                &request(0, 1, 5, 100.0, ScanOption::DEFAULTIO),
                AiInputMode::SingleEnded,
                Range::Bip10Volts,
                AInScanFlag::empty(),
                &buffer,
            )
            .unwrap();
        let status = driver.advance_scan(handle, ScanTarget::AIn, 50).unwrap();
        assert_eq!(status.current_scan_count, 5);
        assert_eq!(status.current_index, 8);
        assert_eq!(ends.load(Ordering::SeqCst), 10);
        assert_eq!(buffer.get(9), Some(2.5));
        let (state, _) = driver.scan_status(handle, ScanTarget::AIn).unwrap();
        assert_eq!(state, ScanStatus::Idle);
    }

    #[test]
    fn test_scan_wait_on_continuous_scan_times_out() {
        let (driver, handle) = connected_driver();
        let buffer = IntBuffer::new(1, 16).unwrap();
        driver
            .c_in_scan(
                handle,
                &request(0, 0, 16, 1000.0, ScanOption::CONTINUOUS),
                CInScanFlag::empty(),
                &buffer,
            )
            .unwrap();
        assert_eq!(
            driver.scan_wait(handle, ScanTarget::CIn, WaitType::WaitUntilDone, 0, 1.0),
            Err(UlError::TimedOut)
        );
        driver.advance_scan(handle, ScanTarget::CIn, 20).unwrap();
        // Wrapped: position of scan 20 is (19 % 16)
        assert_eq!(buffer.get(3), Some(20));
    }

    #[test]
    fn test_digital_direction_and_readback() {
        let (driver, handle) = connected_driver();
        let port = DigitalPortType::FirstPortA;
        assert_eq!(driver.d_out(handle, port, 0x0f), Err(UlError::WrongDigConfig));
        driver.d_config_port(handle, port, DigitalDirection::Output).unwrap();
        driver.d_out(handle, port, 0xa5).unwrap();
        assert_eq!(driver.d_in(handle, port), Ok(0xa5));
        assert_eq!(driver.d_out(handle, port, 0x1ff), Err(UlError::BadPortVal));
        assert_eq!(driver.dio_config(handle, DIO_CFG_PORT_DIRECTION_MASK, 1), Ok(0xff));
        assert_eq!(
            driver.d_config_bit(handle, port, 0, DigitalDirection::Input),
            Err(UlError::ConfigNotSupported)
        );

        let aux = DigitalPortType::AuxPort;
        driver.d_config_bit(handle, aux, 2, DigitalDirection::Output).unwrap();
        driver.set_port_input(handle, aux, 0b0001).unwrap();
        driver.d_bit_out(handle, aux, 2, 1).unwrap();
        assert_eq!(driver.d_in(handle, aux), Ok(0b0101));
        assert_eq!(driver.d_bit_out(handle, aux, 0, 1), Err(UlError::WrongDigConfig));
        assert_eq!(driver.d_bit_in(handle, aux, 4), Err(UlError::BadBitNum));
    }

    #[test]
    fn test_event_registration_rules() {
        let (driver, handle) = connected_driver();
        let noop: EventHandler = Arc::new(|_, _| {});
        assert_eq!(
            driver.enable_event(handle, DaqEventType::ON_DATA_AVAILABLE, 0, noop.clone()),
            Err(UlError::BadEventParameter)
        );
        assert_eq!(
            driver.enable_event(handle, DaqEventType::NONE, 1, noop.clone()),
            Err(UlError::BadEventType)
        );
        driver
            .enable_event(
                handle,
                DaqEventType::ON_DATA_AVAILABLE | DaqEventType::ON_INPUT_SCAN_ERROR,
                10,
                noop.clone(),
            )
            .unwrap();
        assert_eq!(
            driver.enable_event(handle, DaqEventType::ON_INPUT_SCAN_ERROR, 0, noop.clone()),
            Err(UlError::EventAlreadyEnabled)
        );
        driver.disable_event(handle, DaqEventType::ON_INPUT_SCAN_ERROR).unwrap();
        assert_eq!(driver.enabled_events(handle), Ok(DaqEventType::ON_DATA_AVAILABLE));
    }

    #[test]
    fn test_memory_access() {
        let (driver, handle) = connected_driver();
        driver.mem_write(handle, MemRegion::USER, 16, &[1, 2, 3]).unwrap();
        let mut out = [0u8; 3];
        driver.mem_read(handle, MemRegion::USER, 16, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3]);
        assert_eq!(
            driver.mem_write(handle, MemRegion::CAL, 0x7000, &[0]),
            Err(UlError::MemAccessDenied)
        );
        assert_eq!(
            driver.mem_read(handle, MemRegion::USER, 255, &mut out),
            Err(UlError::BadMemAddress)
        );
        assert_eq!(
            driver.mem_get_info(handle, MemRegion::SETTINGS),
            Err(UlError::BadMemRegion)
        );
    }

    #[test]
    fn test_pulse_out_snaps_timing() {
        let (driver, handle) = connected_driver();
        let pulse = PulseOutRequest {
            frequency: 1000.0,
            duty_cycle: 0.25,
            pulse_count: 0,
            initial_delay: 0.0,
            idle_state: crate::enums::TmrIdleState::Low,
            options: crate::enums::PulseOutOption::DEFAULT,
        };
        let result = driver.pulse_out_start(handle, 0, &pulse).unwrap();
        assert_eq!(result.frequency, 1000.0);
        assert_eq!(result.duty_cycle, 0.25);
        assert_eq!(driver.pulse_out_status(handle, 0), Ok(TmrStatus::Running));
        assert_eq!(driver.pulse_out_start(handle, 0, &pulse), Err(UlError::AlreadyActive));
        assert_eq!(
            driver.pulse_out_start(handle, 2, &pulse),
            Err(UlError::BadTmr)
        );
        driver.pulse_out_stop(handle, 0).unwrap();
        assert_eq!(driver.pulse_out_status(handle, 0), Ok(TmrStatus::Idle));
    }
}
