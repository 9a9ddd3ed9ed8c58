//! Raw libuldaq ABI
//!
//! `#[repr(C)]` mirrors of the native records and, with the `hardware`
//! feature, the entry point table. Native enums are passed as `c_int`
//! and bitmask enums as `c_uint`; the safe types in [`crate::enums`]
//! convert to and from those.

#[cfg(feature = "hardware")]
use std::ffi::c_double;
use std::ffi::{c_char, c_int, c_longlong, c_uint, c_ulonglong, c_void};

use crate::constants::{DESCRIPTOR_RESERVED_LEN, DESCRIPTOR_STR_LEN, RECORD_RESERVED_LEN};

/// Opaque driver-side device token. Zero is never a valid handle.
pub type DaqDeviceHandle = c_longlong;

/// Status code returned by every entry point
pub type UlErrorCode = c_int;

/// Native event callback
pub type DaqEventCallback =
    Option<unsafe extern "C" fn(DaqDeviceHandle, c_uint, c_ulonglong, *mut c_void)>;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct DaqDeviceDescriptor {
    pub product_name: [c_char; DESCRIPTOR_STR_LEN],
    pub product_id: c_uint,
    pub dev_interface: c_uint,
    pub dev_string: [c_char; DESCRIPTOR_STR_LEN],
    pub unique_id: [c_char; DESCRIPTOR_STR_LEN],
    pub reserved: [c_char; DESCRIPTOR_RESERVED_LEN],
}

impl Default for DaqDeviceDescriptor {
    fn default() -> Self {
        Self {
            product_name: [0; DESCRIPTOR_STR_LEN],
            product_id: 0,
            dev_interface: 0,
            dev_string: [0; DESCRIPTOR_STR_LEN],
            unique_id: [0; DESCRIPTOR_STR_LEN],
            reserved: [0; DESCRIPTOR_RESERVED_LEN],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct TransferStatus {
    pub current_scan_count: c_ulonglong,
    pub current_total_count: c_ulonglong,
    pub current_index: c_longlong,
    pub reserved: [c_char; RECORD_RESERVED_LEN],
}

impl Default for TransferStatus {
    fn default() -> Self {
        Self {
            current_scan_count: 0,
            current_total_count: 0,
            current_index: -1,
            reserved: [0; RECORD_RESERVED_LEN],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct AiQueueElement {
    pub channel: c_int,
    pub input_mode: c_int,
    pub range: c_int,
    pub reserved: [c_char; RECORD_RESERVED_LEN],
}

/// Shared layout of `DaqInChanDescriptor` and `DaqOutChanDescriptor`
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DaqChanDescriptor {
    pub channel: c_int,
    pub chan_type: c_uint,
    pub range: c_int,
    pub reserved: [c_char; RECORD_RESERVED_LEN],
}

pub type DaqInChanDescriptor = DaqChanDescriptor;
pub type DaqOutChanDescriptor = DaqChanDescriptor;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct MemDescriptor {
    pub address: c_uint,
    pub size: c_uint,
    pub access_types: c_uint,
    pub reserved: [c_char; RECORD_RESERVED_LEN],
}

impl Default for MemDescriptor {
    fn default() -> Self {
        Self {
            address: 0,
            size: 0,
            access_types: 0,
            reserved: [0; RECORD_RESERVED_LEN],
        }
    }
}

#[cfg(feature = "hardware")]
#[link(name = "uldaq")]
extern "C" {
    pub fn ulGetDaqDeviceInventory(
        interface_types: c_uint,
        descriptors: *mut DaqDeviceDescriptor,
        num_descriptors: *mut c_uint,
    ) -> UlErrorCode;
    pub fn ulCreateDaqDevice(descriptor: DaqDeviceDescriptor) -> DaqDeviceHandle;
    pub fn ulGetDaqDeviceDescriptor(
        handle: DaqDeviceHandle,
        descriptor: *mut DaqDeviceDescriptor,
    ) -> UlErrorCode;
    pub fn ulConnectDaqDevice(handle: DaqDeviceHandle) -> UlErrorCode;
    pub fn ulDisconnectDaqDevice(handle: DaqDeviceHandle) -> UlErrorCode;
    pub fn ulReleaseDaqDevice(handle: DaqDeviceHandle) -> UlErrorCode;
    pub fn ulIsDaqDeviceConnected(handle: DaqDeviceHandle, connected: *mut c_int) -> UlErrorCode;
    pub fn ulFlashLed(handle: DaqDeviceHandle, flash_count: c_int) -> UlErrorCode;

    pub fn ulAIn(
        handle: DaqDeviceHandle,
        channel: c_int,
        input_mode: c_int,
        range: c_int,
        flags: c_uint,
        data: *mut c_double,
    ) -> UlErrorCode;
    pub fn ulAInScan(
        handle: DaqDeviceHandle,
        low_chan: c_int,
        high_chan: c_int,
        input_mode: c_int,
        range: c_int,
        samples_per_chan: c_int,
        rate: *mut c_double,
        options: c_uint,
        flags: c_uint,
        data: *mut c_double,
    ) -> UlErrorCode;
    pub fn ulAInScanStatus(
        handle: DaqDeviceHandle,
        status: *mut c_int,
        xfer_status: *mut TransferStatus,
    ) -> UlErrorCode;
    pub fn ulAInScanStop(handle: DaqDeviceHandle) -> UlErrorCode;
    pub fn ulAInScanWait(
        handle: DaqDeviceHandle,
        wait_type: c_int,
        wait_param: c_longlong,
        timeout: c_double,
    ) -> UlErrorCode;
    pub fn ulAInLoadQueue(
        handle: DaqDeviceHandle,
        queue: *mut AiQueueElement,
        num_elements: c_uint,
    ) -> UlErrorCode;
    pub fn ulAInSetTrigger(
        handle: DaqDeviceHandle,
        trig_type: c_uint,
        trig_chan: c_int,
        level: c_double,
        variance: c_double,
        retrigger_sample_count: c_uint,
    ) -> UlErrorCode;

    pub fn ulAOut(
        handle: DaqDeviceHandle,
        channel: c_int,
        range: c_int,
        flags: c_uint,
        data: c_double,
    ) -> UlErrorCode;
    pub fn ulAOutScan(
        handle: DaqDeviceHandle,
        low_chan: c_int,
        high_chan: c_int,
        range: c_int,
        samples_per_chan: c_int,
        rate: *mut c_double,
        options: c_uint,
        flags: c_uint,
        data: *mut c_double,
    ) -> UlErrorCode;
    pub fn ulAOutScanWait(
        handle: DaqDeviceHandle,
        wait_type: c_int,
        wait_param: c_longlong,
        timeout: c_double,
    ) -> UlErrorCode;
    pub fn ulAOutScanStatus(
        handle: DaqDeviceHandle,
        status: *mut c_int,
        xfer_status: *mut TransferStatus,
    ) -> UlErrorCode;
    pub fn ulAOutScanStop(handle: DaqDeviceHandle) -> UlErrorCode;
    pub fn ulAOutSetTrigger(
        handle: DaqDeviceHandle,
        trig_type: c_uint,
        trig_chan: c_int,
        level: c_double,
        variance: c_double,
        retrigger_sample_count: c_uint,
    ) -> UlErrorCode;

    pub fn ulDConfigPort(handle: DaqDeviceHandle, port: c_int, direction: c_int) -> UlErrorCode;
    pub fn ulDConfigBit(
        handle: DaqDeviceHandle,
        port: c_int,
        bit_num: c_int,
        direction: c_int,
    ) -> UlErrorCode;
    pub fn ulDIn(handle: DaqDeviceHandle, port: c_int, data: *mut c_ulonglong) -> UlErrorCode;
    pub fn ulDOut(handle: DaqDeviceHandle, port: c_int, data: c_ulonglong) -> UlErrorCode;
    pub fn ulDBitIn(
        handle: DaqDeviceHandle,
        port: c_int,
        bit_num: c_int,
        bit_value: *mut c_uint,
    ) -> UlErrorCode;
    pub fn ulDBitOut(
        handle: DaqDeviceHandle,
        port: c_int,
        bit_num: c_int,
        bit_value: c_uint,
    ) -> UlErrorCode;
    pub fn ulDInScan(
        handle: DaqDeviceHandle,
        low_port: c_int,
        high_port: c_int,
        samples_per_port: c_int,
        rate: *mut c_double,
        options: c_uint,
        flags: c_uint,
        data: *mut c_ulonglong,
    ) -> UlErrorCode;
    pub fn ulDInScanStatus(
        handle: DaqDeviceHandle,
        status: *mut c_int,
        xfer_status: *mut TransferStatus,
    ) -> UlErrorCode;
    pub fn ulDInScanStop(handle: DaqDeviceHandle) -> UlErrorCode;
    pub fn ulDInScanWait(
        handle: DaqDeviceHandle,
        wait_type: c_int,
        wait_param: c_longlong,
        timeout: c_double,
    ) -> UlErrorCode;
    pub fn ulDInSetTrigger(
        handle: DaqDeviceHandle,
        trig_type: c_uint,
        trig_chan: c_int,
        level: c_double,
        variance: c_double,
        retrigger_sample_count: c_uint,
    ) -> UlErrorCode;
    pub fn ulDOutScan(
        handle: DaqDeviceHandle,
        low_port: c_int,
        high_port: c_int,
        samples_per_port: c_int,
        rate: *mut c_double,
        options: c_uint,
        flags: c_uint,
        data: *mut c_ulonglong,
    ) -> UlErrorCode;
    pub fn ulDOutScanStatus(
        handle: DaqDeviceHandle,
        status: *mut c_int,
        xfer_status: *mut TransferStatus,
    ) -> UlErrorCode;
    pub fn ulDOutScanStop(handle: DaqDeviceHandle) -> UlErrorCode;
    pub fn ulDOutScanWait(
        handle: DaqDeviceHandle,
        wait_type: c_int,
        wait_param: c_longlong,
        timeout: c_double,
    ) -> UlErrorCode;
    pub fn ulDOutSetTrigger(
        handle: DaqDeviceHandle,
        trig_type: c_uint,
        trig_chan: c_int,
        level: c_double,
        variance: c_double,
        retrigger_sample_count: c_uint,
    ) -> UlErrorCode;

    pub fn ulCIn(handle: DaqDeviceHandle, counter_num: c_int, data: *mut c_ulonglong)
        -> UlErrorCode;
    pub fn ulCRead(
        handle: DaqDeviceHandle,
        counter_num: c_int,
        reg_type: c_uint,
        data: *mut c_ulonglong,
    ) -> UlErrorCode;
    pub fn ulCLoad(
        handle: DaqDeviceHandle,
        counter_num: c_int,
        reg_type: c_uint,
        load_value: c_ulonglong,
    ) -> UlErrorCode;
    pub fn ulCClear(handle: DaqDeviceHandle, counter_num: c_int) -> UlErrorCode;
    pub fn ulCConfigScan(
        handle: DaqDeviceHandle,
        counter_num: c_int,
        measurement_type: c_uint,
        measurement_mode: c_uint,
        edge_detection: c_int,
        tick_size: c_int,
        debounce_mode: c_int,
        debounce_time: c_int,
        flags: c_uint,
    ) -> UlErrorCode;
    pub fn ulCInScan(
        handle: DaqDeviceHandle,
        low_counter: c_int,
        high_counter: c_int,
        samples_per_counter: c_int,
        rate: *mut c_double,
        options: c_uint,
        flags: c_uint,
        data: *mut c_ulonglong,
    ) -> UlErrorCode;
    pub fn ulCInSetTrigger(
        handle: DaqDeviceHandle,
        trig_type: c_uint,
        trig_chan: c_int,
        level: c_double,
        variance: c_double,
        retrigger_sample_count: c_uint,
    ) -> UlErrorCode;
    pub fn ulCInScanStatus(
        handle: DaqDeviceHandle,
        status: *mut c_int,
        xfer_status: *mut TransferStatus,
    ) -> UlErrorCode;
    pub fn ulCInScanStop(handle: DaqDeviceHandle) -> UlErrorCode;
    pub fn ulCInScanWait(
        handle: DaqDeviceHandle,
        wait_type: c_int,
        wait_param: c_longlong,
        timeout: c_double,
    ) -> UlErrorCode;

    pub fn ulTmrPulseOutStart(
        handle: DaqDeviceHandle,
        timer_num: c_int,
        frequency: *mut c_double,
        duty_cycle: *mut c_double,
        pulse_count: c_ulonglong,
        initial_delay: *mut c_double,
        idle_state: c_int,
        options: c_uint,
    ) -> UlErrorCode;
    pub fn ulTmrPulseOutStop(handle: DaqDeviceHandle, timer_num: c_int) -> UlErrorCode;
    pub fn ulTmrPulseOutStatus(
        handle: DaqDeviceHandle,
        timer_num: c_int,
        status: *mut c_int,
    ) -> UlErrorCode;
    pub fn ulTmrSetTrigger(
        handle: DaqDeviceHandle,
        trig_type: c_uint,
        trig_chan: c_int,
        level: c_double,
        variance: c_double,
        retrigger_sample_count: c_uint,
    ) -> UlErrorCode;

    pub fn ulDaqInScan(
        handle: DaqDeviceHandle,
        descriptors: *mut DaqInChanDescriptor,
        num_chans: c_int,
        samples_per_chan: c_int,
        rate: *mut c_double,
        options: c_uint,
        flags: c_uint,
        data: *mut c_double,
    ) -> UlErrorCode;
    pub fn ulDaqInScanStatus(
        handle: DaqDeviceHandle,
        status: *mut c_int,
        xfer_status: *mut TransferStatus,
    ) -> UlErrorCode;
    pub fn ulDaqInScanStop(handle: DaqDeviceHandle) -> UlErrorCode;
    pub fn ulDaqInScanWait(
        handle: DaqDeviceHandle,
        wait_type: c_int,
        wait_param: c_longlong,
        timeout: c_double,
    ) -> UlErrorCode;
    pub fn ulDaqInSetTrigger(
        handle: DaqDeviceHandle,
        trig_type: c_uint,
        trig_chan: DaqInChanDescriptor,
        level: c_double,
        variance: c_double,
        retrigger_sample_count: c_uint,
    ) -> UlErrorCode;
    pub fn ulDaqOutScan(
        handle: DaqDeviceHandle,
        descriptors: *mut DaqOutChanDescriptor,
        num_chans: c_int,
        samples_per_chan: c_int,
        rate: *mut c_double,
        options: c_uint,
        flags: c_uint,
        data: *mut c_double,
    ) -> UlErrorCode;
    pub fn ulDaqOutScanStatus(
        handle: DaqDeviceHandle,
        status: *mut c_int,
        xfer_status: *mut TransferStatus,
    ) -> UlErrorCode;
    pub fn ulDaqOutScanStop(handle: DaqDeviceHandle) -> UlErrorCode;
    pub fn ulDaqOutScanWait(
        handle: DaqDeviceHandle,
        wait_type: c_int,
        wait_param: c_longlong,
        timeout: c_double,
    ) -> UlErrorCode;
    pub fn ulDaqOutSetTrigger(
        handle: DaqDeviceHandle,
        trig_type: c_uint,
        trig_chan: DaqInChanDescriptor,
        level: c_double,
        variance: c_double,
        retrigger_sample_count: c_uint,
    ) -> UlErrorCode;

    pub fn ulEnableEvent(
        handle: DaqDeviceHandle,
        event_types: c_uint,
        event_parameter: c_ulonglong,
        callback: DaqEventCallback,
        user_data: *mut c_void,
    ) -> UlErrorCode;
    pub fn ulDisableEvent(handle: DaqDeviceHandle, event_types: c_uint) -> UlErrorCode;

    pub fn ulMemRead(
        handle: DaqDeviceHandle,
        region: c_uint,
        address: c_uint,
        buffer: *mut u8,
        count: c_uint,
    ) -> UlErrorCode;
    pub fn ulMemWrite(
        handle: DaqDeviceHandle,
        region: c_uint,
        address: c_uint,
        buffer: *mut u8,
        count: c_uint,
    ) -> UlErrorCode;
    pub fn ulMemGetInfo(
        handle: DaqDeviceHandle,
        region: c_uint,
        descriptor: *mut MemDescriptor,
    ) -> UlErrorCode;

    pub fn ulGetErrMsg(err_code: UlErrorCode, err_msg: *mut c_char) -> UlErrorCode;
    pub fn ulGetInfoStr(
        info_item: c_int,
        index: c_uint,
        info_str: *mut c_char,
        max_len: *mut c_uint,
    ) -> UlErrorCode;
    pub fn ulSetConfig(config_item: c_int, index: c_uint, value: c_longlong) -> UlErrorCode;
    pub fn ulGetConfig(config_item: c_int, index: c_uint, value: *mut c_longlong) -> UlErrorCode;

    pub fn ulDevGetInfo(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_longlong,
    ) -> UlErrorCode;
    pub fn ulDevGetConfigStr(
        handle: DaqDeviceHandle,
        config_item: c_int,
        index: c_uint,
        config_str: *mut c_char,
        max_len: *mut c_uint,
    ) -> UlErrorCode;

    pub fn ulAIGetInfo(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_longlong,
    ) -> UlErrorCode;
    pub fn ulAIGetInfoDbl(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_double,
    ) -> UlErrorCode;
    pub fn ulAISetConfig(
        handle: DaqDeviceHandle,
        config_item: c_int,
        index: c_uint,
        value: c_longlong,
    ) -> UlErrorCode;
    pub fn ulAIGetConfig(
        handle: DaqDeviceHandle,
        config_item: c_int,
        index: c_uint,
        value: *mut c_longlong,
    ) -> UlErrorCode;
    pub fn ulAISetConfigDbl(
        handle: DaqDeviceHandle,
        config_item: c_int,
        index: c_uint,
        value: c_double,
    ) -> UlErrorCode;
    pub fn ulAIGetConfigDbl(
        handle: DaqDeviceHandle,
        config_item: c_int,
        index: c_uint,
        value: *mut c_double,
    ) -> UlErrorCode;
    pub fn ulAIGetConfigStr(
        handle: DaqDeviceHandle,
        config_item: c_int,
        index: c_uint,
        config_str: *mut c_char,
        max_len: *mut c_uint,
    ) -> UlErrorCode;
    pub fn ulAOGetInfo(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_longlong,
    ) -> UlErrorCode;
    pub fn ulAOGetInfoDbl(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_double,
    ) -> UlErrorCode;
    pub fn ulDIOGetInfo(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_longlong,
    ) -> UlErrorCode;
    pub fn ulDIOGetInfoDbl(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_double,
    ) -> UlErrorCode;
    pub fn ulDIOGetConfig(
        handle: DaqDeviceHandle,
        config_item: c_int,
        index: c_uint,
        value: *mut c_longlong,
    ) -> UlErrorCode;
    pub fn ulCtrGetInfo(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_longlong,
    ) -> UlErrorCode;
    pub fn ulCtrGetInfoDbl(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_double,
    ) -> UlErrorCode;
    pub fn ulTmrGetInfo(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_longlong,
    ) -> UlErrorCode;
    pub fn ulTmrGetInfoDbl(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_double,
    ) -> UlErrorCode;
    pub fn ulDaqIGetInfo(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_longlong,
    ) -> UlErrorCode;
    pub fn ulDaqIGetInfoDbl(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_double,
    ) -> UlErrorCode;
    pub fn ulDaqOGetInfo(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_longlong,
    ) -> UlErrorCode;
    pub fn ulDaqOGetInfoDbl(
        handle: DaqDeviceHandle,
        info_item: c_int,
        index: c_uint,
        value: *mut c_double,
    ) -> UlErrorCode;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn test_record_sizes() {
        assert_eq!(size_of::<DaqDeviceDescriptor>(), 712);
        assert_eq!(size_of::<TransferStatus>(), 88);
        assert_eq!(size_of::<AiQueueElement>(), 76);
        assert_eq!(size_of::<DaqChanDescriptor>(), 76);
        assert_eq!(size_of::<MemDescriptor>(), 76);
    }

    #[test]
    fn test_record_alignment() {
        assert_eq!(align_of::<DaqDeviceDescriptor>(), 4);
        assert_eq!(align_of::<TransferStatus>(), 8);
    }

    #[test]
    fn test_field_offsets() {
        let desc = DaqDeviceDescriptor::default();
        let base = &desc as *const _ as usize;
        assert_eq!(&desc.product_id as *const _ as usize - base, 64);
        assert_eq!(&desc.dev_interface as *const _ as usize - base, 68);
        assert_eq!(&desc.dev_string as *const _ as usize - base, 72);
        assert_eq!(&desc.unique_id as *const _ as usize - base, 136);

        let status = TransferStatus::default();
        let base = &status as *const _ as usize;
        assert_eq!(&status.current_index as *const _ as usize - base, 16);
    }
}
