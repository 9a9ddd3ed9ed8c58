//! Error types for the uldaq bindings
//!
//! Every native entry point returns an integer status code. Zero is
//! success; anything else maps onto one variant of [`UlError`]. The
//! variants mirror the driver's closed error table one to one, so the
//! numeric code survives the round trip through [`UlError::code`] and
//! [`UlError::from_code`].

use thiserror::Error;

/// Result type alias for uldaq operations
pub type Result<T> = std::result::Result<T, UlError>;

/// Code reported when the driver refuses to create a device from a descriptor.
pub const BAD_DESCRIPTOR_CODE: i32 = 100_001;

macro_rules! ul_errors {
    ($($(#[$doc:meta])* $code:literal => $variant:ident : $msg:literal,)+) => {
        /// Error types for uldaq operations
        #[derive(Error, Debug, Clone, PartialEq, Eq)]
        pub enum UlError {
            $(
                $(#[$doc])*
                #[error($msg)]
                $variant,
            )+

            /// The driver did not accept the device descriptor
            #[error("Invalid device descriptor")]
            BadDescriptor,

            /// A code outside the known error table
            #[error("Unknown error code {0}")]
            Unknown(i32),

            /// The driver returned a value that does not belong to the expected enumeration
            #[error("Unexpected {type_name} value {value} reported by the driver")]
            UnknownValue { type_name: &'static str, value: i64 },
        }

        impl UlError {
            /// Map a non-zero native status code onto its variant
            pub fn from_code(code: i32) -> Self {
                match code {
                    $($code => UlError::$variant,)+
                    BAD_DESCRIPTOR_CODE => UlError::BadDescriptor,
                    other => UlError::Unknown(other),
                }
            }

            /// Native status code for this error
            ///
            /// Returns `None` for errors raised by the bindings themselves
            /// rather than by the driver.
            pub fn code(&self) -> Option<i32> {
                match self {
                    $(UlError::$variant => Some($code),)+
                    UlError::BadDescriptor => Some(BAD_DESCRIPTOR_CODE),
                    UlError::Unknown(code) => Some(*code),
                    UlError::UnknownValue { .. } => None,
                }
            }
        }
    };
}

ul_errors! {
    1 => UnhandledException: "Unhandled internal exception",
    2 => BadDevHandle: "Invalid device handle",
    3 => BadDevType: "This function cannot be used with this device",
    4 => UsbDevNoPermission: "Insufficient permission to access this device",
    5 => UsbInterfaceClaimed: "USB interface is already claimed",
    6 => DevNotFound: "Device not found",
    7 => DevNotConnected: "Device not connected or connection lost",
    8 => DeadDev: "Device no longer responding",
    9 => BadBufferSize: "Buffer too small for operation",
    10 => BadBuffer: "Invalid buffer",
    11 => BadMemType: "Invalid memory type",
    12 => BadMemRegion: "Invalid memory region",
    13 => BadRange: "Invalid range",
    14 => BadAiChan: "Invalid analog input channel specified",
    15 => BadInputMode: "Invalid input mode specified",
    /// Only one scan may run per subsystem
    16 => AlreadyActive: "A background process is already in progress",
    17 => BadTrigType: "Invalid trigger type specified",
    18 => Overrun: "FIFO overrun, data was not transferred from device fast enough",
    19 => Underrun: "FIFO underrun, data was not transferred to device fast enough",
    20 => TimedOut: "Operation timed out",
    21 => BadOption: "Invalid option specified",
    22 => BadRate: "Invalid sampling rate specified",
    23 => BadBurstIoCount: "Sample count cannot be greater than FIFO size for BURSTIO scans",
    24 => ConfigNotSupported: "Configuration not supported",
    25 => BadConfigVal: "Invalid configuration value",
    26 => BadAiChanType: "Invalid analog input channel type specified",
    27 => AdcOverrun: "ADC overrun occurred",
    28 => BadTcType: "Invalid thermocouple type specified",
    29 => BadUnit: "Invalid unit specified",
    30 => BadQueueSize: "Invalid queue size",
    31 => BadConfigItem: "Invalid config item specified",
    32 => BadInfoItem: "Invalid info item specified",
    33 => BadFlag: "Invalid flag specified",
    34 => BadSampleCount: "Invalid sample count specified",
    35 => Internal: "Internal error",
    36 => BadCouplingMode: "Invalid coupling mode",
    37 => BadSensorSensitivity: "Invalid sensor sensitivity",
    38 => BadIepeMode: "Invalid IEPE mode",
    39 => BadAiChanQueue: "Invalid channel queue specified",
    40 => BadAiGainQueue: "Invalid gain queue specified",
    41 => BadAiModeQueue: "Invalid mode queue specified",
    42 => FpgaFileNotFound: "FPGA file not found",
    43 => UnableToReadFpgaFile: "Unable to read FPGA file",
    44 => NoFpga: "FPGA not loaded",
    45 => BadArg: "Invalid argument",
    46 => MinSlopeValReached: "Minimum slope value reached",
    47 => MaxSlopeValReached: "Maximum slope value reached",
    48 => MinOffsetValReached: "Minimum offset value reached",
    49 => MaxOffsetValReached: "Maximum offset value reached",
    50 => BadPortType: "Invalid port type specified",
    51 => WrongDigConfig: "Digital I/O is configured incorrectly",
    52 => BadBitNum: "Invalid bit number",
    53 => BadPortVal: "Invalid port value specified",
    54 => BadRetrigCount: "Invalid re-trigger count",
    55 => BadAoChan: "Invalid analog output channel specified",
    56 => BadDaVal: "Invalid D/A output value specified",
    57 => BadTmr: "Invalid timer specified",
    58 => BadFrequency: "Invalid frequency specified",
    59 => BadDutyCycle: "Invalid duty cycle specified",
    60 => BadInitialDelay: "Invalid initial delay specified",
    61 => BadCtr: "Invalid counter specified",
    62 => BadCtrVal: "Invalid counter value specified",
    63 => BadDaqiChanType: "Invalid DAQ input channel type specified",
    64 => BadNumChans: "Invalid number of channels specified",
    65 => BadCtrReg: "Invalid counter register specified",
    66 => BadCtrMeasureType: "Invalid counter measurement type specified",
    67 => BadCtrMeasureMode: "Invalid counter measurement mode specified",
    68 => BadDebounceTime: "Invalid debounce time specified",
    69 => BadDebounceMode: "Invalid debounce mode specified",
    70 => BadEdgeDetection: "Invalid edge detection mode specified",
    71 => BadTickSize: "Invalid tick size specified",
    72 => BadDaqoChanType: "Invalid DAQ output channel type specified",
    73 => NoConnectionEstablished: "No connection established",
    74 => BadEventType: "Invalid event type specified",
    75 => EventAlreadyEnabled: "An event handler has already been enabled for this event type",
    76 => BadEventParameter: "Invalid event parameter specified",
    77 => BadCallbackFunction: "Invalid callback function specified",
    78 => BadMemAddress: "Invalid memory address",
    79 => MemAccessDenied: "Memory access denied",
    80 => DevUnavailable: "Device is not available at time of request",
    81 => BadRetrigTrigType: "Re-trigger option is not supported for the specified trigger type",
}

impl UlError {
    /// Turn a native status code into a `Result`
    pub fn check(code: i32) -> Result<()> {
        if code == 0 {
            Ok(())
        } else {
            Err(UlError::from_code(code))
        }
    }

    /// Check if this error is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, UlError::TimedOut)
    }

    /// Check if the device is gone or was never reachable
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            UlError::DevNotFound
                | UlError::DevNotConnected
                | UlError::DeadDev
                | UlError::NoConnectionEstablished
                | UlError::DevUnavailable
        )
    }

    /// Check if this error concerns the scan buffer or data transfer
    pub fn is_buffer_error(&self) -> bool {
        matches!(
            self,
            UlError::BadBuffer
                | UlError::BadBufferSize
                | UlError::Overrun
                | UlError::Underrun
                | UlError::AdcOverrun
        )
    }
}
