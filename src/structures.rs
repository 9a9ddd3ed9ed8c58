//! uldaq value records
//!
//! Safe counterparts of the fixed-layout native records. Each one converts
//! explicitly to and from its `ffi` mirror at the boundary.

use std::ffi::c_char;

use crate::enums::{
    AiInputMode, CConfigScanFlag, CounterDebounceMode, CounterDebounceTime,
    CounterEdgeDetection, CounterMeasurementMode, CounterMeasurementType, CounterTickSize,
    DaqInChanType, DaqOutChanType, DigitalPortIoType, DigitalPortType, InterfaceType,
    MemAccessType, MemRegion, Range,
};
use crate::error::Result;
use crate::ffi;

/// Read a NUL terminated fixed-size C string field
pub(crate) fn c_chars_to_string(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Copy `value` into a fixed-size C string field, truncating so the
/// terminator always fits
pub(crate) fn string_to_c_chars(value: &str, out: &mut [c_char]) {
    out.fill(0);
    let max = out.len().saturating_sub(1);
    for (dst, src) in out.iter_mut().zip(value.bytes().take(max)) {
        *dst = src as c_char;
    }
}

/// Identity of a DAQ device as reported by an inventory scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaqDeviceDescriptor {
    /// Generic device name
    pub product_name: String,
    /// Numeric product identifier
    pub product_id: u32,
    /// Transport the device was found on
    pub dev_interface: InterfaceType,
    /// Name of the device, may include the product name
    pub dev_string: String,
    /// Serial number (USB) or MAC address (Ethernet)
    pub unique_id: String,
}

impl DaqDeviceDescriptor {
    pub fn new(
        product_name: &str,
        product_id: u32,
        dev_interface: InterfaceType,
        unique_id: &str,
    ) -> Self {
        Self {
            product_name: product_name.to_string(),
            product_id,
            dev_interface,
            dev_string: product_name.to_string(),
            unique_id: unique_id.to_string(),
        }
    }

    pub fn from_raw(raw: &ffi::DaqDeviceDescriptor) -> Self {
        Self {
            product_name: c_chars_to_string(&raw.product_name),
            product_id: raw.product_id,
            dev_interface: InterfaceType::from_bits_retain(raw.dev_interface),
            dev_string: c_chars_to_string(&raw.dev_string),
            unique_id: c_chars_to_string(&raw.unique_id),
        }
    }

    pub fn to_raw(&self) -> ffi::DaqDeviceDescriptor {
        let mut raw = ffi::DaqDeviceDescriptor {
            product_id: self.product_id,
            dev_interface: self.dev_interface.bits(),
            ..Default::default()
        };
        string_to_c_chars(&self.product_name, &mut raw.product_name);
        string_to_c_chars(&self.dev_string, &mut raw.dev_string);
        string_to_c_chars(&self.unique_id, &mut raw.unique_id);
        raw
    }
}

impl std::fmt::Display for DaqDeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (0x{:x}) [{}] {:?}",
            self.product_name, self.product_id, self.unique_id, self.dev_interface
        )
    }
}

/// Progress of a background scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStatus {
    /// Samples acquired per channel since the scan started
    pub current_scan_count: u64,
    /// Samples acquired across all channels since the scan started
    pub current_total_count: u64,
    /// Buffer index of the first sample of the most recently completed
    /// scan, or -1 before any scan has completed
    pub current_index: i64,
}

impl Default for TransferStatus {
    fn default() -> Self {
        Self {
            current_scan_count: 0,
            current_total_count: 0,
            current_index: -1,
        }
    }
}

impl TransferStatus {
    pub fn from_raw(raw: &ffi::TransferStatus) -> Self {
        Self {
            current_scan_count: raw.current_scan_count,
            current_total_count: raw.current_total_count,
            current_index: raw.current_index,
        }
    }

    /// Index of the latest complete scan, if any data has arrived
    pub fn latest_index(&self) -> Option<usize> {
        usize::try_from(self.current_index).ok()
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scan count: {}\ntotal count: {}\nindex: {}",
            self.current_scan_count, self.current_total_count, self.current_index
        )
    }
}

/// Channel-gain queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiQueueElement {
    pub channel: i32,
    pub input_mode: AiInputMode,
    pub range: Range,
}

impl AiQueueElement {
    pub fn new(channel: i32, input_mode: AiInputMode, range: Range) -> Self {
        Self {
            channel,
            input_mode,
            range,
        }
    }

    pub fn to_raw(&self) -> ffi::AiQueueElement {
        ffi::AiQueueElement {
            channel: self.channel,
            input_mode: self.input_mode.raw(),
            range: self.range.raw(),
            reserved: [0; crate::constants::RECORD_RESERVED_LEN],
        }
    }
}

/// One column of a synchronous input scan
///
/// `channel` is the analog channel, the `DigitalPortType` value or the
/// counter number depending on `chan_type`. `range` only matters for
/// analog channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaqInChanDescriptor {
    pub channel: i32,
    pub chan_type: DaqInChanType,
    pub range: Range,
}

impl DaqInChanDescriptor {
    pub fn new(channel: i32, chan_type: DaqInChanType, range: Range) -> Self {
        Self {
            channel,
            chan_type,
            range,
        }
    }

    /// Descriptor for a whole digital port
    pub fn digital(port: DigitalPortType) -> Self {
        Self::new(port.raw(), DaqInChanType::DIGITAL, Range::Bip10Volts)
    }

    pub fn to_raw(&self) -> ffi::DaqInChanDescriptor {
        ffi::DaqChanDescriptor {
            channel: self.channel,
            chan_type: self.chan_type.bits(),
            range: self.range.raw(),
            reserved: [0; crate::constants::RECORD_RESERVED_LEN],
        }
    }

    pub fn from_raw(raw: &ffi::DaqInChanDescriptor) -> Result<Self> {
        Ok(Self {
            channel: raw.channel,
            chan_type: DaqInChanType::from_bits_retain(raw.chan_type),
            range: Range::from_raw(raw.range.into())?,
        })
    }
}

/// One column of a synchronous output scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaqOutChanDescriptor {
    pub channel: i32,
    pub chan_type: DaqOutChanType,
    pub range: Range,
}

impl DaqOutChanDescriptor {
    pub fn new(channel: i32, chan_type: DaqOutChanType, range: Range) -> Self {
        Self {
            channel,
            chan_type,
            range,
        }
    }

    pub fn to_raw(&self) -> ffi::DaqOutChanDescriptor {
        ffi::DaqChanDescriptor {
            channel: self.channel,
            chan_type: self.chan_type.bits(),
            range: self.range.raw(),
            reserved: [0; crate::constants::RECORD_RESERVED_LEN],
        }
    }
}

/// Location and permissions of a device memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemDescriptor {
    pub region: MemRegion,
    pub address: u32,
    /// Size in bytes
    pub size: u32,
    pub access_types: MemAccessType,
}

impl MemDescriptor {
    pub fn from_raw(region: MemRegion, raw: &ffi::MemDescriptor) -> Self {
        Self {
            region,
            address: raw.address,
            size: raw.size,
            access_types: MemAccessType::from_bits_retain(raw.access_types),
        }
    }
}

impl std::fmt::Display for MemDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}: address 0x{:x}, {} bytes, {:?}",
            self.region, self.address, self.size, self.access_types
        )
    }
}

/// Properties of a single digital port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DioPortInfo {
    pub port_type: DigitalPortType,
    pub port_io_type: DigitalPortIoType,
    pub number_of_bits: u32,
}

impl std::fmt::Display for DioPortInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} ({:?}, {} bits)",
            self.port_type, self.port_io_type, self.number_of_bits
        )
    }
}

/// Measurement setup applied to a counter before a counter scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterScanConfig {
    pub measurement_type: CounterMeasurementType,
    pub measurement_mode: CounterMeasurementMode,
    pub edge_detection: CounterEdgeDetection,
    pub tick_size: CounterTickSize,
    pub debounce_mode: CounterDebounceMode,
    pub debounce_time: CounterDebounceTime,
    pub flags: CConfigScanFlag,
}

impl Default for CounterScanConfig {
    /// Plain rising edge event counting without debounce
    fn default() -> Self {
        Self {
            measurement_type: CounterMeasurementType::COUNT,
            measurement_mode: CounterMeasurementMode::DEFAULT,
            edge_detection: CounterEdgeDetection::RisingEdge,
            tick_size: CounterTickSize::Tick20Pt83ns,
            debounce_mode: CounterDebounceMode::None,
            debounce_time: CounterDebounceTime::Debounce0ns,
            flags: CConfigScanFlag::empty(),
        }
    }
}

/// Timing actually applied by the driver when a pulse train starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseOutResult {
    pub frequency: f64,
    pub duty_cycle: f64,
    pub initial_delay: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_to_raw() {
        let desc = DaqDeviceDescriptor::new("USB-1808X", 0x13d, InterfaceType::USB, "01ABCDEF");
        let raw = desc.to_raw();
        assert_eq!(raw.product_id, 0x13d);
        assert_eq!(raw.dev_interface, 1);
        assert_eq!(raw.product_name[0] as u8, b'U');
        assert_eq!(raw.product_name[9], 0);
        assert_eq!(DaqDeviceDescriptor::from_raw(&raw), desc);
    }

    #[test]
    fn test_long_strings_are_truncated() {
        let name = "x".repeat(100);
        let raw = DaqDeviceDescriptor::new(&name, 1, InterfaceType::ETHERNET, "id").to_raw();
        assert_eq!(raw.product_name[62] as u8, b'x');
        assert_eq!(raw.product_name[63], 0);
        assert_eq!(c_chars_to_string(&raw.product_name).len(), 63);
    }

    #[test]
    fn test_transfer_status_index() {
        assert_eq!(TransferStatus::default().latest_index(), None);
        let status = TransferStatus {
            current_scan_count: 10,
            current_total_count: 40,
            current_index: 36,
        };
        assert_eq!(status.latest_index(), Some(36));
    }

    #[test]
    fn test_chan_descriptor_to_raw() {
        let raw = DaqInChanDescriptor::digital(DigitalPortType::FirstPortA).to_raw();
        assert_eq!(raw.channel, 10);
        assert_eq!(raw.chan_type, 1 << 2);
        let back = DaqInChanDescriptor::from_raw(&raw).unwrap();
        assert_eq!(back.chan_type, DaqInChanType::DIGITAL);
    }
}
