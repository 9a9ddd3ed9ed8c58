//! The native layer behind every façade
//!
//! [`UlDriver`] is a one-to-one, safely typed view of the libuldaq entry
//! point table. The façade types never talk to the library directly; they
//! hold an `Arc<dyn UlDriver>` so the same code runs against
//! [`crate::native::NativeDriver`] on real hardware and against
//! [`crate::mock::MockDriver`] in tests.
//!
//! Implementations return the driver's verdict unchanged. Retries,
//! fallbacks and cleanup policy belong to the caller.

use std::sync::Arc;

use crate::buffer::{FloatBuffer, IntBuffer};
use crate::enums::{
    AInFlag, AInScanFlag, AOutFlag, AOutScanFlag, AiInputMode, CInScanFlag, CounterRegisterType,
    DInScanFlag, DOutScanFlag, DaqEventType, DaqInScanFlag, DaqOutScanFlag, DigitalDirection,
    DigitalPortType, InterfaceType, MemRegion, PulseOutOption, Range, ScanOption, ScanStatus,
    TmrIdleState, TmrStatus, TriggerType, WaitType,
};
use crate::error::{Result, UlError};
use crate::ffi::DaqDeviceHandle;
use crate::structures::{
    AiQueueElement, CounterScanConfig, DaqDeviceDescriptor, DaqInChanDescriptor,
    DaqOutChanDescriptor, MemDescriptor, PulseOutResult, TransferStatus,
};

/// Callback bound to one or more event types. Runs on a driver thread.
pub type EventHandler = Arc<dyn Fn(DaqEventType, u64) + Send + Sync>;

/// Which info entry point an item code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoTarget {
    Device,
    Ai,
    Ao,
    Dio,
    Ctr,
    Tmr,
    DaqI,
    DaqO,
}

/// Which background scan a status, stop or wait call refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanTarget {
    AIn,
    AOut,
    DIn,
    DOut,
    CIn,
    DaqIn,
    DaqOut,
}

impl ScanTarget {
    pub const ALL: [ScanTarget; 7] = [
        ScanTarget::AIn,
        ScanTarget::AOut,
        ScanTarget::DIn,
        ScanTarget::DOut,
        ScanTarget::CIn,
        ScanTarget::DaqIn,
        ScanTarget::DaqOut,
    ];

    /// True for acquisitions, false for generations
    pub fn is_input(self) -> bool {
        matches!(
            self,
            ScanTarget::AIn | ScanTarget::DIn | ScanTarget::CIn | ScanTarget::DaqIn
        )
    }
}

/// Subsystems whose trigger is addressed by a plain channel number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerTarget {
    AIn,
    AOut,
    DIn,
    DOut,
    CIn,
    Tmr,
}

/// Trigger settings shared by every `*SetTrigger` entry point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerConfig {
    pub trig_type: TriggerType,
    pub level: f64,
    pub variance: f64,
    pub retrigger_sample_count: u32,
}

/// Arguments of a channel range scan (analog and counter scans)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRequest {
    pub low_channel: i32,
    pub high_channel: i32,
    pub samples_per_channel: i32,
    pub rate: f64,
    pub options: ScanOption,
}

impl ScanRequest {
    /// Number of interleaved columns the scan writes
    pub fn channel_count(&self) -> usize {
        usize::try_from(self.high_channel - self.low_channel + 1).unwrap_or(0)
    }

    /// Elements the buffer must hold
    pub fn required_len(&self) -> usize {
        self.channel_count() * usize::try_from(self.samples_per_channel).unwrap_or(0)
    }
}

/// Pulse train parameters requested from a timer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseOutRequest {
    pub frequency: f64,
    pub duty_cycle: f64,
    /// Zero runs until stopped
    pub pulse_count: u64,
    pub initial_delay: f64,
    pub idle_state: TmrIdleState,
    pub options: PulseOutOption,
}

/// Safe view of the libuldaq entry points
pub trait UlDriver: Send + Sync {
    // Discovery and handle lifecycle
    fn inventory(&self, interface: InterfaceType, max_devices: usize)
        -> Result<Vec<DaqDeviceDescriptor>>;
    fn create_device(&self, descriptor: &DaqDeviceDescriptor) -> Result<DaqDeviceHandle>;
    fn device_descriptor(&self, handle: DaqDeviceHandle) -> Result<DaqDeviceDescriptor>;
    fn connect(&self, handle: DaqDeviceHandle) -> Result<()>;
    fn disconnect(&self, handle: DaqDeviceHandle) -> Result<()>;
    fn release(&self, handle: DaqDeviceHandle) -> Result<()>;
    fn is_connected(&self, handle: DaqDeviceHandle) -> Result<bool>;
    fn flash_led(&self, handle: DaqDeviceHandle, flash_count: i32) -> Result<()>;

    /// Human readable text for `error`
    fn error_message(&self, error: &UlError) -> String {
        error.to_string()
    }

    // Library level settings
    fn library_info_str(&self, item: i32, index: u32) -> Result<String>;
    fn set_library_config(&self, item: i32, index: u32, value: i64) -> Result<()>;
    fn library_config(&self, item: i32, index: u32) -> Result<i64>;

    // Info and configuration
    fn get_info(&self, handle: DaqDeviceHandle, target: InfoTarget, item: i32, index: u32)
        -> Result<i64>;
    fn get_info_dbl(
        &self,
        handle: DaqDeviceHandle,
        target: InfoTarget,
        item: i32,
        index: u32,
    ) -> Result<f64>;
    fn dev_config_str(&self, handle: DaqDeviceHandle, item: i32, index: u32) -> Result<String>;
    fn ai_set_config(&self, handle: DaqDeviceHandle, item: i32, index: u32, value: i64)
        -> Result<()>;
    fn ai_config(&self, handle: DaqDeviceHandle, item: i32, index: u32) -> Result<i64>;
    fn ai_set_config_dbl(
        &self,
        handle: DaqDeviceHandle,
        item: i32,
        index: u32,
        value: f64,
    ) -> Result<()>;
    fn ai_config_dbl(&self, handle: DaqDeviceHandle, item: i32, index: u32) -> Result<f64>;
    fn ai_config_str(&self, handle: DaqDeviceHandle, item: i32, index: u32) -> Result<String>;
    fn dio_config(&self, handle: DaqDeviceHandle, item: i32, index: u32) -> Result<i64>;

    // Analog input
    fn a_in(
        &self,
        handle: DaqDeviceHandle,
        channel: i32,
        input_mode: AiInputMode,
        range: Range,
        flags: AInFlag,
    ) -> Result<f64>;
    fn a_in_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        input_mode: AiInputMode,
        range: Range,
        flags: AInScanFlag,
        buffer: &FloatBuffer,
    ) -> Result<f64>;
    fn a_in_load_queue(&self, handle: DaqDeviceHandle, queue: &[AiQueueElement]) -> Result<()>;

    // Analog output
    fn a_out(
        &self,
        handle: DaqDeviceHandle,
        channel: i32,
        range: Range,
        flags: AOutFlag,
        value: f64,
    ) -> Result<()>;
    fn a_out_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        range: Range,
        flags: AOutScanFlag,
        buffer: &FloatBuffer,
    ) -> Result<f64>;

    // Digital I/O
    fn d_config_port(
        &self,
        handle: DaqDeviceHandle,
        port: DigitalPortType,
        direction: DigitalDirection,
    ) -> Result<()>;
    fn d_config_bit(
        &self,
        handle: DaqDeviceHandle,
        port: DigitalPortType,
        bit: i32,
        direction: DigitalDirection,
    ) -> Result<()>;
    fn d_in(&self, handle: DaqDeviceHandle, port: DigitalPortType) -> Result<u64>;
    fn d_out(&self, handle: DaqDeviceHandle, port: DigitalPortType, value: u64) -> Result<()>;
    fn d_bit_in(&self, handle: DaqDeviceHandle, port: DigitalPortType, bit: i32) -> Result<u32>;
    fn d_bit_out(
        &self,
        handle: DaqDeviceHandle,
        port: DigitalPortType,
        bit: i32,
        value: u32,
    ) -> Result<()>;
    /// `request` channels are `DigitalPortType` values
    fn d_in_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        flags: DInScanFlag,
        buffer: &IntBuffer,
    ) -> Result<f64>;
    fn d_out_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        flags: DOutScanFlag,
        buffer: &IntBuffer,
    ) -> Result<f64>;

    // Counters
    fn c_in(&self, handle: DaqDeviceHandle, counter: i32) -> Result<u64>;
    fn c_read(
        &self,
        handle: DaqDeviceHandle,
        counter: i32,
        register: CounterRegisterType,
    ) -> Result<u64>;
    fn c_load(
        &self,
        handle: DaqDeviceHandle,
        counter: i32,
        register: CounterRegisterType,
        value: u64,
    ) -> Result<()>;
    fn c_clear(&self, handle: DaqDeviceHandle, counter: i32) -> Result<()>;
    fn c_config_scan(
        &self,
        handle: DaqDeviceHandle,
        counter: i32,
        config: &CounterScanConfig,
    ) -> Result<()>;
    fn c_in_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        flags: CInScanFlag,
        buffer: &IntBuffer,
    ) -> Result<f64>;

    // Timers
    fn pulse_out_start(
        &self,
        handle: DaqDeviceHandle,
        timer: i32,
        request: &PulseOutRequest,
    ) -> Result<PulseOutResult>;
    fn pulse_out_stop(&self, handle: DaqDeviceHandle, timer: i32) -> Result<()>;
    fn pulse_out_status(&self, handle: DaqDeviceHandle, timer: i32) -> Result<TmrStatus>;

    // Synchronous multi-type scans
    fn daq_in_scan(
        &self,
        handle: DaqDeviceHandle,
        channels: &[DaqInChanDescriptor],
        samples_per_channel: i32,
        rate: f64,
        options: ScanOption,
        flags: DaqInScanFlag,
        buffer: &FloatBuffer,
    ) -> Result<f64>;
    fn daq_out_scan(
        &self,
        handle: DaqDeviceHandle,
        channels: &[DaqOutChanDescriptor],
        samples_per_channel: i32,
        rate: f64,
        options: ScanOption,
        flags: DaqOutScanFlag,
        buffer: &FloatBuffer,
    ) -> Result<f64>;

    // Scan control shared by every subsystem
    fn scan_status(
        &self,
        handle: DaqDeviceHandle,
        target: ScanTarget,
    ) -> Result<(ScanStatus, TransferStatus)>;
    fn scan_stop(&self, handle: DaqDeviceHandle, target: ScanTarget) -> Result<()>;
    fn scan_wait(
        &self,
        handle: DaqDeviceHandle,
        target: ScanTarget,
        wait_type: WaitType,
        wait_param: i64,
        timeout: f64,
    ) -> Result<()>;

    // Triggers
    fn set_trigger(
        &self,
        handle: DaqDeviceHandle,
        target: TriggerTarget,
        channel: i32,
        config: &TriggerConfig,
    ) -> Result<()>;
    fn daq_in_set_trigger(
        &self,
        handle: DaqDeviceHandle,
        channel: &DaqInChanDescriptor,
        config: &TriggerConfig,
    ) -> Result<()>;
    fn daq_out_set_trigger(
        &self,
        handle: DaqDeviceHandle,
        channel: &DaqInChanDescriptor,
        config: &TriggerConfig,
    ) -> Result<()>;

    // Events
    fn enable_event(
        &self,
        handle: DaqDeviceHandle,
        event_types: DaqEventType,
        event_parameter: u64,
        handler: EventHandler,
    ) -> Result<()>;
    fn disable_event(&self, handle: DaqDeviceHandle, event_types: DaqEventType) -> Result<()>;

    // Device memory
    fn mem_get_info(&self, handle: DaqDeviceHandle, region: MemRegion) -> Result<MemDescriptor>;
    fn mem_read(
        &self,
        handle: DaqDeviceHandle,
        region: MemRegion,
        address: u32,
        buffer: &mut [u8],
    ) -> Result<()>;
    fn mem_write(
        &self,
        handle: DaqDeviceHandle,
        region: MemRegion,
        address: u32,
        data: &[u8],
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_request_len() {
        let request = ScanRequest {
            low_channel: 0,
            high_channel: 3,
            samples_per_channel: 10_000,
            rate: 1000.0,
            options: ScanOption::CONTINUOUS,
        };
        assert_eq!(request.channel_count(), 4);
        assert_eq!(request.required_len(), 40_000);
    }

    #[test]
    fn test_inverted_range_has_no_channels() {
        let request = ScanRequest {
            low_channel: 3,
            high_channel: 1,
            samples_per_channel: 10,
            rate: 1.0,
            options: ScanOption::DEFAULTIO,
        };
        assert_eq!(request.required_len(), 0);
    }

    #[test]
    fn test_scan_direction() {
        assert!(ScanTarget::DaqIn.is_input());
        assert!(!ScanTarget::AOut.is_input());
    }
}
