//! Native uldaq constants
//!
//! Item selectors for the info/config entry points, shared flag bits and
//! buffer sizes. The numeric values are fixed by the native library and
//! must never be renumbered.

// ============================================================================
// Buffer sizes
// ============================================================================

/// Length of the buffer handed to `ulGetErrMsg`
pub const ERR_MSG_LEN: usize = 512;
/// Capacity of the fixed string fields in `DaqDeviceDescriptor`
pub const DESCRIPTOR_STR_LEN: usize = 64;
/// Reserved bytes at the end of `DaqDeviceDescriptor`
pub const DESCRIPTOR_RESERVED_LEN: usize = 512;
/// Reserved bytes at the end of the smaller native records
pub const RECORD_RESERVED_LEN: usize = 64;
/// Initial buffer size used for string info/config queries
pub const CONFIG_STR_LEN: usize = 128;
/// Default bound on the number of descriptors an inventory scan returns
pub const DEFAULT_MAX_DEVICES: usize = 100;

// ============================================================================
// Shared data flag bits (used by the per-subsystem flag sets)
// ============================================================================

/// Return raw A/D counts instead of engineering units
pub const NOSCALEDATA: u32 = 1 << 0;
/// Skip the calibration factors
pub const NOCALIBRATEDATA: u32 = 1 << 1;
/// Do not clear the counter at scan start
pub const NOCLEAR: u32 = 1 << 3;

// ============================================================================
// Library level items
// ============================================================================

/// Library version string
pub const UL_INFO_VER_STR: i32 = 2000;
/// USB transfer thread priority
pub const UL_CFG_USB_XFER_PRIORITY: i32 = 1;

// ============================================================================
// Device info / config items
// ============================================================================

pub const DEV_INFO_HAS_AI_DEV: i32 = 1;
pub const DEV_INFO_HAS_AO_DEV: i32 = 2;
pub const DEV_INFO_HAS_DIO_DEV: i32 = 3;
pub const DEV_INFO_HAS_CTR_DEV: i32 = 4;
pub const DEV_INFO_HAS_TMR_DEV: i32 = 5;
pub const DEV_INFO_HAS_DAQI_DEV: i32 = 6;
pub const DEV_INFO_HAS_DAQO_DEV: i32 = 7;
/// Bitmask of `DaqEventType`
pub const DEV_INFO_DAQ_EVENT_TYPES: i32 = 8;
/// Bitmask of `MemRegion`
pub const DEV_INFO_MEM_REGIONS: i32 = 9;

/// Version string, indexed by `DevVersionType`
pub const DEV_CFG_VER_STR: i32 = 2000;

// ============================================================================
// Analog input items
// ============================================================================

pub const AI_INFO_RESOLUTION: i32 = 1;
pub const AI_INFO_NUM_CHANS: i32 = 2;
/// Indexed by `AiInputMode`
pub const AI_INFO_NUM_CHANS_BY_MODE: i32 = 3;
/// Indexed by `AiChanType`
pub const AI_INFO_NUM_CHANS_BY_TYPE: i32 = 4;
pub const AI_INFO_CHAN_TYPES: i32 = 5;
pub const AI_INFO_SCAN_OPTIONS: i32 = 6;
pub const AI_INFO_HAS_PACER: i32 = 7;
pub const AI_INFO_NUM_DIFF_RANGES: i32 = 8;
pub const AI_INFO_NUM_SE_RANGES: i32 = 9;
pub const AI_INFO_DIFF_RANGE: i32 = 10;
pub const AI_INFO_SE_RANGE: i32 = 11;
pub const AI_INFO_TRIG_TYPES: i32 = 12;
pub const AI_INFO_MAX_QUEUE_LENGTH_BY_MODE: i32 = 13;
pub const AI_INFO_QUEUE_TYPES: i32 = 14;
pub const AI_INFO_QUEUE_LIMITS: i32 = 15;
pub const AI_INFO_FIFO_SIZE: i32 = 16;

pub const AI_INFO_MIN_SCAN_RATE: i32 = 1000;
pub const AI_INFO_MAX_SCAN_RATE: i32 = 1001;
pub const AI_INFO_MAX_THROUGHPUT: i32 = 1002;
pub const AI_INFO_MAX_BURST_RATE: i32 = 1003;
pub const AI_INFO_MAX_BURST_THROUGHPUT: i32 = 1004;

pub const AI_CFG_CHAN_TYPE: i32 = 1;
pub const AI_CFG_CHAN_TC_TYPE: i32 = 2;
pub const AI_CFG_CHAN_TEMP_UNIT: i32 = 3;
pub const AI_CFG_TEMP_UNIT: i32 = 4;
pub const AI_CFG_ADC_TIMING_MODE: i32 = 5;
pub const AI_CFG_AUTO_ZERO_MODE: i32 = 6;
/// Seconds since the epoch
pub const AI_CFG_CAL_DATE: i32 = 7;
pub const AI_CFG_CHAN_IEPE_MODE: i32 = 8;
pub const AI_CFG_CHAN_COUPLING_MODE: i32 = 9;

pub const AI_CFG_CHAN_SLOPE: i32 = 1000;
pub const AI_CFG_CHAN_OFFSET: i32 = 1001;
pub const AI_CFG_CHAN_SENSOR_SENSITIVITY: i32 = 1002;

pub const AI_CFG_CAL_DATE_STR: i32 = 2000;

// ============================================================================
// Analog output items
// ============================================================================

pub const AO_INFO_RESOLUTION: i32 = 1;
pub const AO_INFO_NUM_CHANS: i32 = 2;
pub const AO_INFO_SCAN_OPTIONS: i32 = 3;
pub const AO_INFO_HAS_PACER: i32 = 4;
pub const AO_INFO_NUM_RANGES: i32 = 5;
pub const AO_INFO_RANGE: i32 = 6;
pub const AO_INFO_TRIG_TYPES: i32 = 7;
pub const AO_INFO_FIFO_SIZE: i32 = 8;

pub const AO_INFO_MIN_SCAN_RATE: i32 = 1000;
pub const AO_INFO_MAX_SCAN_RATE: i32 = 1001;
pub const AO_INFO_MAX_THROUGHPUT: i32 = 1002;

// ============================================================================
// Digital I/O items
// ============================================================================

pub const DIO_INFO_NUM_PORTS: i32 = 1;
/// Indexed by port number
pub const DIO_INFO_PORT_TYPE: i32 = 2;
pub const DIO_INFO_PORT_IO_TYPE: i32 = 3;
pub const DIO_INFO_NUM_BITS: i32 = 4;
/// Indexed by `DigitalDirection`
pub const DIO_INFO_HAS_PACER: i32 = 5;
pub const DIO_INFO_SCAN_OPTIONS: i32 = 6;
pub const DIO_INFO_TRIG_TYPES: i32 = 7;
pub const DIO_INFO_FIFO_SIZE: i32 = 8;

pub const DIO_INFO_MIN_SCAN_RATE: i32 = 1000;
pub const DIO_INFO_MAX_SCAN_RATE: i32 = 1001;
pub const DIO_INFO_MAX_THROUGHPUT: i32 = 1002;

/// Indexed by the position of the port in `DIO_INFO_PORT_TYPE` order
pub const DIO_CFG_PORT_DIRECTION_MASK: i32 = 1;

// ============================================================================
// Counter items
// ============================================================================

pub const CTR_INFO_NUM_CTRS: i32 = 1;
/// Indexed by counter number
pub const CTR_INFO_MEASUREMENT_TYPES: i32 = 2;
/// Indexed by `CounterMeasurementType`
pub const CTR_INFO_MEASUREMENT_MODES: i32 = 3;
pub const CTR_INFO_REGISTER_TYPES: i32 = 4;
pub const CTR_INFO_RESOLUTION: i32 = 5;
pub const CTR_INFO_HAS_PACER: i32 = 6;
pub const CTR_INFO_SCAN_OPTIONS: i32 = 7;
pub const CTR_INFO_TRIG_TYPES: i32 = 8;
pub const CTR_INFO_FIFO_SIZE: i32 = 9;

pub const CTR_INFO_MIN_SCAN_RATE: i32 = 1000;
pub const CTR_INFO_MAX_SCAN_RATE: i32 = 1001;
pub const CTR_INFO_MAX_THROUGHPUT: i32 = 1002;

// ============================================================================
// Timer items
// ============================================================================

pub const TMR_INFO_NUM_TMRS: i32 = 1;
pub const TMR_INFO_TYPE: i32 = 2;

pub const TMR_INFO_MIN_FREQ: i32 = 1000;
pub const TMR_INFO_MAX_FREQ: i32 = 1001;

// ============================================================================
// Synchronous DAQ input / output items
// ============================================================================

pub const DAQI_INFO_CHAN_TYPES: i32 = 1;
pub const DAQI_INFO_SCAN_OPTIONS: i32 = 2;
pub const DAQI_INFO_TRIG_TYPES: i32 = 3;
pub const DAQI_INFO_FIFO_SIZE: i32 = 4;

pub const DAQI_INFO_MIN_SCAN_RATE: i32 = 1000;
pub const DAQI_INFO_MAX_SCAN_RATE: i32 = 1001;
pub const DAQI_INFO_MAX_THROUGHPUT: i32 = 1002;

pub const DAQO_INFO_CHAN_TYPES: i32 = 1;
pub const DAQO_INFO_SCAN_OPTIONS: i32 = 2;
pub const DAQO_INFO_TRIG_TYPES: i32 = 3;
pub const DAQO_INFO_FIFO_SIZE: i32 = 4;

pub const DAQO_INFO_MIN_SCAN_RATE: i32 = 1000;
pub const DAQO_INFO_MAX_SCAN_RATE: i32 = 1001;
pub const DAQO_INFO_MAX_THROUGHPUT: i32 = 1002;
