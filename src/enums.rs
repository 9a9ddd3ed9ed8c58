//! Native enumerations
//!
//! Closed value sets are plain `#[repr(i32)]` enums with `raw`/`from_raw`
//! conversions. Sets whose values are single bits (and which the driver
//! reports as masks) are `bitflags` types so that capability masks can be
//! expanded with [`crate::utils::enum_mask_to_list`]. Zero valued members
//! of those sets are associated constants equal to `empty()`.

use bitflags::bitflags;

use crate::constants::{NOCALIBRATEDATA, NOCLEAR, NOSCALEDATA};
use crate::error::{Result, UlError};

macro_rules! ul_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:expr,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl $name {
            /// Every member in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Native numeric value
            pub fn raw(self) -> i32 {
                self as i32
            }

            /// Convert a value reported by the driver
            pub fn from_raw(value: i64) -> Result<Self> {
                $(
                    if value == $value as i64 {
                        return Ok($name::$variant);
                    }
                )+
                Err(UlError::UnknownValue {
                    type_name: stringify!($name),
                    value,
                })
            }
        }
    };
}

ul_enum! {
    /// A/D channel input mode
    pub enum AiInputMode {
        Differential = 1,
        SingleEnded = 2,
        PseudoDifferential = 3,
    }
}

ul_enum! {
    /// Thermocouple type
    pub enum TcType {
        J = 1,
        K = 2,
        T = 3,
        E = 4,
        R = 5,
        S = 6,
        B = 7,
        N = 8,
    }
}

ul_enum! {
    /// Analog input or output range
    pub enum Range {
        Bip60Volts = 1,
        Bip30Volts = 2,
        Bip15Volts = 3,
        Bip20Volts = 4,
        Bip10Volts = 5,
        Bip5Volts = 6,
        Bip4Volts = 7,
        Bip2Pt5Volts = 8,
        Bip2Volts = 9,
        Bip1Pt25Volts = 10,
        Bip1Volts = 11,
        BipPt625Volts = 12,
        BipPt5Volts = 13,
        BipPt25Volts = 14,
        BipPt125Volts = 15,
        BipPt2Volts = 16,
        BipPt1Volts = 17,
        BipPt078Volts = 18,
        BipPt05Volts = 19,
        BipPt01Volts = 20,
        BipPt005Volts = 21,
        Uni60Volts = 1001,
        Uni30Volts = 1002,
        Uni15Volts = 1003,
        Uni20Volts = 1004,
        Uni10Volts = 1005,
        Uni5Volts = 1006,
        Uni4Volts = 1007,
        Uni2Pt5Volts = 1008,
        Uni2Volts = 1009,
        Uni1Pt25Volts = 1010,
        Uni1Volts = 1011,
        UniPt625Volts = 1012,
        UniPt5Volts = 1013,
        UniPt25Volts = 1014,
        UniPt125Volts = 1015,
        UniPt2Volts = 1016,
        UniPt1Volts = 1017,
        UniPt078Volts = 1018,
        UniPt05Volts = 1019,
        UniPt01Volts = 1020,
        UniPt005Volts = 1021,
    }
}

impl Range {
    /// True for the +/- ranges
    pub fn is_bipolar(self) -> bool {
        self.raw() < 1000
    }

    /// Full scale magnitude in volts
    pub fn full_scale(self) -> f64 {
        match self.raw() % 1000 {
            1 => 60.0,
            2 => 30.0,
            3 => 15.0,
            4 => 20.0,
            5 => 10.0,
            6 => 5.0,
            7 => 4.0,
            8 => 2.5,
            9 => 2.0,
            10 => 1.25,
            11 => 1.0,
            12 => 0.625,
            13 => 0.5,
            14 => 0.25,
            15 => 0.125,
            16 => 0.2,
            17 => 0.1,
            18 => 0.078,
            19 => 0.05,
            20 => 0.01,
            _ => 0.005,
        }
    }

    /// `(min, max)` in volts
    pub fn limits(self) -> (f64, f64) {
        let span = self.full_scale();
        if self.is_bipolar() {
            (-span, span)
        } else {
            (0.0, span)
        }
    }
}

ul_enum! {
    /// Temperature unit
    pub enum TempUnit {
        Celsius = 1,
        Fahrenheit = 2,
        Kelvin = 3,
    }
}

ul_enum! {
    /// Temperature scale applied to returned data
    pub enum TempScale {
        Celsius = 1,
        Fahrenheit = 2,
        Kelvin = 3,
        Volts = 4,
        NoScale = 5,
    }
}

ul_enum! {
    /// Auto-zero mode
    pub enum AutoZeroMode {
        None = 1,
        EverySample = 2,
        Once = 3,
    }
}

ul_enum! {
    /// ADC timing mode
    pub enum AdcTimingMode {
        Auto = 1,
        HighRes = 2,
        HighSpeed = 3,
    }
}

ul_enum! {
    /// IEPE excitation mode
    pub enum IepeMode {
        Disabled = 1,
        Enabled = 2,
    }
}

ul_enum! {
    /// Input coupling
    pub enum CouplingMode {
        Dc = 1,
        Ac = 2,
    }
}

ul_enum! {
    /// Digital port identifier
    pub enum DigitalPortType {
        AuxPort = 1,
        AuxPort1 = 2,
        AuxPort2 = 3,
        FirstPortA = 10,
        FirstPortB = 11,
        FirstPortC = 12,
        FirstPortCH = 13,
        SecondPortA = 14,
        SecondPortB = 15,
        SecondPortCL = 16,
        SecondPortCH = 17,
        ThirdPortA = 18,
        ThirdPortB = 19,
        ThirdPortCL = 20,
        ThirdPortCH = 21,
        FourthPortA = 22,
        FourthPortB = 23,
        FourthPortCL = 24,
        FourthPortCH = 25,
        FifthPortA = 26,
        FifthPortB = 27,
        FifthPortCL = 28,
        FifthPortCH = 29,
        SixthPortA = 30,
        SixthPortB = 31,
        SixthPortCL = 32,
        SixthPortCH = 33,
        SeventhPortA = 34,
        SeventhPortB = 35,
        SeventhPortCL = 36,
        SeventhPortCH = 37,
        EighthPortA = 38,
        EighthPortB = 39,
        EighthPortCL = 40,
        EighthPortCH = 41,
    }
}

impl DigitalPortType {
    pub const AUX_PORT0: Self = Self::AuxPort;
    /// Low nibble of the first port C
    pub const FIRST_PORT_CL: Self = Self::FirstPortC;
}

ul_enum! {
    /// How a digital port may be configured
    pub enum DigitalPortIoType {
        Input = 1,
        Output = 2,
        Bidirectional = 3,
        BitIo = 4,
        NonConfigurable = 5,
    }
}

ul_enum! {
    /// Direction of a digital port or bit
    pub enum DigitalDirection {
        Input = 1,
        Output = 2,
    }
}

ul_enum! {
    pub enum TimerType {
        Standard = 1,
        Advanced = 2,
    }
}

ul_enum! {
    /// Output level while a timer is idle
    pub enum TmrIdleState {
        Low = 1,
        High = 2,
    }
}

ul_enum! {
    pub enum TmrStatus {
        Idle = 0,
        Running = 1,
    }
}

ul_enum! {
    /// State of a background scan
    pub enum ScanStatus {
        Idle = 0,
        Running = 1,
    }
}

ul_enum! {
    /// Counter debounce time
    pub enum CounterDebounceTime {
        Debounce0ns = 0,
        Debounce500ns = 1,
        Debounce1500ns = 2,
        Debounce3500ns = 3,
        Debounce7500ns = 4,
        Debounce15500ns = 5,
        Debounce31500ns = 6,
        Debounce63500ns = 7,
        Debounce127500ns = 8,
        Debounce100us = 9,
        Debounce300us = 10,
        Debounce700us = 11,
        Debounce1500us = 12,
        Debounce3100us = 13,
        Debounce6300us = 14,
        Debounce12700us = 15,
        Debounce25500us = 16,
    }
}

ul_enum! {
    pub enum CounterDebounceMode {
        None = 0,
        TriggerAfterStable = 1,
        TriggerBeforeStable = 2,
    }
}

ul_enum! {
    pub enum CounterEdgeDetection {
        RisingEdge = 1,
        FallingEdge = 2,
    }
}

ul_enum! {
    /// Tick size used by period, pulse width and timing measurements
    pub enum CounterTickSize {
        Tick20Pt83ns = 1,
        Tick208Pt3ns = 2,
        Tick2083Pt3ns = 3,
        Tick20833Pt3ns = 4,
        Tick20ns = 11,
        Tick200ns = 12,
        Tick2000ns = 13,
        Tick20000ns = 14,
    }
}

ul_enum! {
    /// Condition a scan wait blocks on
    pub enum WaitType {
        WaitUntilDone = 1,
    }
}

ul_enum! {
    /// Firmware component selected by a version query
    pub enum DevVersionType {
        FwMain = 0,
        Fpga = 1,
        Radio = 2,
    }
}

bitflags! {
    /// Transport a device is attached through
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InterfaceType: u32 {
        const USB = 1 << 0;
        const BLUETOOTH = 1 << 1;
        const ETHERNET = 1 << 2;
    }
}

impl InterfaceType {
    pub const ANY: Self = Self::all();
}

bitflags! {
    /// Analog input channel type
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AiChanType: u32 {
        const VOLTAGE = 1 << 0;
        const TC = 1 << 1;
        const RTD = 1 << 2;
        const THERMISTOR = 1 << 3;
        const SEMICONDUCTOR = 1 << 4;
        const DISABLED = 1 << 30;
    }
}

bitflags! {
    /// Channel-gain queue capabilities
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AiQueueType: u32 {
        const CHAN_QUEUE = 1 << 0;
        const GAIN_QUEUE = 1 << 1;
        const MODE_QUEUE = 1 << 2;
    }
}

bitflags! {
    /// Restrictions on channel order in the channel-gain queue
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AiChanQueueLimitation: u32 {
        const UNIQUE_CHAN = 1 << 0;
        const ASCENDING_CHAN = 1 << 1;
        const CONSECUTIVE_CHAN = 1 << 2;
    }
}

bitflags! {
    /// Trigger condition
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TriggerType: u32 {
        const POS_EDGE = 1 << 0;
        const NEG_EDGE = 1 << 1;
        const HIGH = 1 << 2;
        const LOW = 1 << 3;
        const GATE_HIGH = 1 << 4;
        const GATE_LOW = 1 << 5;
        const RISING = 1 << 6;
        const FALLING = 1 << 7;
        const ABOVE = 1 << 8;
        const BELOW = 1 << 9;
        const GATE_ABOVE = 1 << 10;
        const GATE_BELOW = 1 << 11;
        const GATE_IN_WINDOW = 1 << 12;
        const GATE_OUT_WINDOW = 1 << 13;
        const PATTERN_EQ = 1 << 14;
        const PATTERN_NE = 1 << 15;
        const PATTERN_ABOVE = 1 << 16;
        const PATTERN_BELOW = 1 << 17;
    }
}

impl TriggerType {
    pub const NONE: Self = Self::empty();
}

bitflags! {
    /// Scan options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScanOption: u32 {
        const SINGLEIO = 1 << 0;
        const BLOCKIO = 1 << 1;
        const BURSTIO = 1 << 2;
        const CONTINUOUS = 1 << 3;
        const EXTCLOCK = 1 << 4;
        const EXTTRIGGER = 1 << 5;
        const RETRIGGER = 1 << 6;
        const BURSTMODE = 1 << 7;
        const PACEROUT = 1 << 8;
    }
}

impl ScanOption {
    /// Let the driver pick the transfer mode
    pub const DEFAULTIO: Self = Self::empty();
}

bitflags! {
    /// Flags for single analog reads
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AInFlag: u32 {
        const NOSCALEDATA = NOSCALEDATA;
        const NOCALIBRATEDATA = NOCALIBRATEDATA;
    }
}

bitflags! {
    /// Flags for analog input scans
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AInScanFlag: u32 {
        const NOSCALEDATA = NOSCALEDATA;
        const NOCALIBRATEDATA = NOCALIBRATEDATA;
    }
}

bitflags! {
    /// Flags for single analog writes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AOutFlag: u32 {
        const NOSCALEDATA = NOSCALEDATA;
        const NOCALIBRATEDATA = NOCALIBRATEDATA;
    }
}

bitflags! {
    /// Flags for analog output scans
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AOutScanFlag: u32 {
        const NOSCALEDATA = NOSCALEDATA;
        const NOCALIBRATEDATA = NOCALIBRATEDATA;
    }
}

bitflags! {
    /// Flags for counter input scans
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CInScanFlag: u32 {
        const CTR16_BIT = 1 << 0;
        const CTR32_BIT = 1 << 1;
        const CTR64_BIT = 1 << 2;
        const NOCLEAR = NOCLEAR;
    }
}

bitflags! {
    /// Flags for digital input scans (none defined yet)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DInScanFlag: u32 {}
}

bitflags! {
    /// Flags for digital output scans (none defined yet)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DOutScanFlag: u32 {}
}

bitflags! {
    /// Flags for counter scan configuration (none defined yet)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CConfigScanFlag: u32 {}
}

bitflags! {
    /// Flags for synchronous input scans
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DaqInScanFlag: u32 {
        const NOSCALEDATA = NOSCALEDATA;
        const NOCALIBRATEDATA = NOCALIBRATEDATA;
        const NOCLEAR = NOCLEAR;
    }
}

bitflags! {
    /// Flags for synchronous output scans
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DaqOutScanFlag: u32 {
        const NOSCALEDATA = NOSCALEDATA;
        const NOCALIBRATEDATA = NOCALIBRATEDATA;
    }
}

bitflags! {
    /// Counter measurement type
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CounterMeasurementType: u32 {
        const COUNT = 1 << 0;
        const PERIOD = 1 << 1;
        const PULSE_WIDTH = 1 << 2;
        const TIMING = 1 << 3;
        const ENCODER = 1 << 4;
    }
}

bitflags! {
    /// Counter measurement mode
    ///
    /// Which bits apply depends on the measurement type the counter is
    /// configured for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CounterMeasurementMode: u32 {
        const CLEAR_ON_READ = 1 << 0;
        const COUNT_DOWN = 1 << 1;
        const GATE_CONTROLS_DIR = 1 << 2;
        const GATE_CLEARS_CTR = 1 << 3;
        const GATE_TRIG_SRC = 1 << 4;
        const OUTPUT_ON = 1 << 5;
        const OUTPUT_INITIAL_STATE_HIGH = 1 << 6;
        const NO_RECYCLE = 1 << 7;
        const RANGE_LIMIT_ON = 1 << 8;
        const GATING_ON = 1 << 9;
        const INVERT_GATE = 1 << 10;
        const PERIOD_X10 = 1 << 11;
        const PERIOD_X100 = 1 << 12;
        const PERIOD_X1000 = 1 << 13;
        const PERIOD_GATING_ON = 1 << 14;
        const PERIOD_INVERT_GATE = 1 << 15;
        const PULSE_WIDTH_GATING_ON = 1 << 16;
        const PULSE_WIDTH_INVERT_GATE = 1 << 17;
        const TIMING_MODE_INVERT_GATE = 1 << 18;
        const ENCODER_X2 = 1 << 19;
        const ENCODER_X4 = 1 << 20;
        const ENCODER_LATCH_ON_Z = 1 << 21;
        const ENCODER_CLEAR_ON_Z = 1 << 22;
        const ENCODER_NO_RECYCLE = 1 << 23;
        const ENCODER_RANGE_LIMIT_ON = 1 << 24;
        const ENCODER_Z_ACTIVE_EDGE = 1 << 25;
    }
}

impl CounterMeasurementMode {
    pub const DEFAULT: Self = Self::empty();
    pub const PERIOD_X1: Self = Self::empty();
    pub const PULSE_WIDTH_DEFAULT: Self = Self::empty();
    pub const TIMING_DEFAULT: Self = Self::empty();
    pub const ENCODER_X1: Self = Self::empty();
}

bitflags! {
    /// Counter register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CounterRegisterType: u32 {
        const COUNT = 1 << 0;
        const LOAD = 1 << 1;
        const MIN_LIMIT = 1 << 2;
        const MAX_LIMIT = 1 << 3;
        const OUTPUT_VAL0 = 1 << 4;
        const OUTPUT_VAL1 = 1 << 5;
    }
}

bitflags! {
    /// Channel type inside a synchronous input scan
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DaqInChanType: u32 {
        const ANALOG_DIFF = 1 << 0;
        const ANALOG_SE = 1 << 1;
        const DIGITAL = 1 << 2;
        const CTR16 = 1 << 3;
        const CTR32 = 1 << 4;
        const CTR48 = 1 << 5;
    }
}

bitflags! {
    /// Channel type inside a synchronous output scan
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DaqOutChanType: u32 {
        const ANALOG = 1 << 0;
        const DIGITAL = 1 << 1;
    }
}

bitflags! {
    /// Timer pulse output options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PulseOutOption: u32 {
        const EXTTRIGGER = 1 << 5;
        const RETRIGGER = 1 << 6;
    }
}

impl PulseOutOption {
    pub const DEFAULT: Self = Self::empty();
}

bitflags! {
    /// Conditions the driver can raise callbacks for
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DaqEventType: u32 {
        const ON_DATA_AVAILABLE = 1 << 0;
        const ON_INPUT_SCAN_ERROR = 1 << 1;
        const ON_END_OF_INPUT_SCAN = 1 << 2;
        const ON_OUTPUT_SCAN_ERROR = 1 << 3;
        const ON_END_OF_OUTPUT_SCAN = 1 << 4;
    }
}

impl DaqEventType {
    pub const NONE: Self = Self::empty();
}

bitflags! {
    /// Device memory region
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemRegion: u32 {
        const CAL = 1 << 0;
        const USER = 1 << 1;
        const SETTINGS = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemAccessType: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_limits() {
        assert_eq!(Range::Bip10Volts.limits(), (-10.0, 10.0));
        assert_eq!(Range::Uni5Volts.limits(), (0.0, 5.0));
        assert_eq!(Range::BipPt005Volts.full_scale(), 0.005);
        assert!(!Range::UniPt078Volts.is_bipolar());
    }

    #[test]
    fn test_from_raw() {
        assert_eq!(Range::from_raw(1005), Ok(Range::Uni10Volts));
        assert_eq!(DigitalPortType::from_raw(12), Ok(DigitalPortType::FIRST_PORT_CL));
        assert_eq!(
            AiInputMode::from_raw(7),
            Err(UlError::UnknownValue {
                type_name: "AiInputMode",
                value: 7
            })
        );
    }

    #[test]
    fn test_zero_members_are_empty() {
        assert!(ScanOption::DEFAULTIO.is_empty());
        assert!(TriggerType::NONE.is_empty());
        assert_eq!(CounterMeasurementMode::ENCODER_X1, CounterMeasurementMode::DEFAULT);
        assert_eq!(InterfaceType::ANY.bits(), 7);
    }
}
