//! [`UlDriver`] over the real libuldaq shared library
//!
//! Only compiled with the `hardware` feature. Every method is a single
//! native call followed by a status check; the only extra work is
//! marshalling records and keeping event handlers alive while the driver
//! may still call them.

use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_uint, c_ulonglong, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{debug, error, trace};
use parking_lot::Mutex;

use crate::buffer::{FloatBuffer, IntBuffer};
use crate::constants::{CONFIG_STR_LEN, ERR_MSG_LEN};
use crate::driver::{
    EventHandler, InfoTarget, PulseOutRequest, ScanRequest, ScanTarget, TriggerConfig,
    TriggerTarget, UlDriver,
};
use crate::enums::{
    AInFlag, AInScanFlag, AOutFlag, AOutScanFlag, AiInputMode, CInScanFlag, CounterRegisterType,
    DInScanFlag, DOutScanFlag, DaqEventType, DaqInScanFlag, DaqOutScanFlag, DigitalDirection,
    DigitalPortType, InterfaceType, MemRegion, Range, ScanOption, ScanStatus, TmrStatus,
    WaitType,
};
use crate::error::{Result, UlError};
use crate::ffi::{self, DaqDeviceHandle};
use crate::structures::{
    c_chars_to_string, AiQueueElement, CounterScanConfig, DaqDeviceDescriptor,
    DaqInChanDescriptor, DaqOutChanDescriptor, MemDescriptor, PulseOutResult, TransferStatus,
};

/// Handlers registered through `ulEnableEvent`, per device. The driver
/// holds a raw pointer to each boxed handler, so a box may only be
/// dropped once all of its event bits are disabled.
type EventRegistry = HashMap<DaqDeviceHandle, Vec<(DaqEventType, Box<EventHandler>)>>;

/// Driver backed by libuldaq
#[derive(Default)]
pub struct NativeDriver {
    events: Mutex<EventRegistry>,
}

impl NativeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a string query, growing the buffer once if the driver asks for more
    fn query_string<F>(mut query: F) -> Result<String>
    where
        F: FnMut(*mut c_char, *mut c_uint) -> ffi::UlErrorCode,
    {
        let mut buf: Vec<c_char> = vec![0; CONFIG_STR_LEN];
        let mut len = CONFIG_STR_LEN as c_uint;
        let code = query(buf.as_mut_ptr(), &mut len);
        if code != 0 && UlError::from_code(code) == UlError::BadBufferSize {
            buf = vec![0; len as usize + 1];
            len = buf.len() as c_uint;
            UlError::check(query(buf.as_mut_ptr(), &mut len))?;
        } else {
            UlError::check(code)?;
        }
        Ok(c_chars_to_string(&buf))
    }

    fn ensure_capacity(available: usize, required: usize) -> Result<()> {
        if required == 0 || available < required {
            return Err(UlError::BadBufferSize);
        }
        Ok(())
    }

    fn drop_handlers(&self, handle: DaqDeviceHandle, event_types: DaqEventType) {
        let mut events = self.events.lock();
        if let Some(entries) = events.get_mut(&handle) {
            for (mask, _) in entries.iter_mut() {
                mask.remove(event_types);
            }
            entries.retain(|(mask, _)| !mask.is_empty());
            if entries.is_empty() {
                events.remove(&handle);
            }
        }
    }
}

unsafe extern "C" fn event_trampoline(
    _handle: DaqDeviceHandle,
    event_type: c_uint,
    event_data: c_ulonglong,
    user_data: *mut c_void,
) {
    if user_data.is_null() {
        return;
    }
    // SAFETY: `user_data` is the `Box<EventHandler>` registered in
    // `enable_event`, kept alive in the registry until disabled.
    let handler = unsafe { &*(user_data as *const EventHandler) };
    let event = DaqEventType::from_bits_retain(event_type);
    if catch_unwind(AssertUnwindSafe(|| handler(event, event_data))).is_err() {
        error!("event callback for {:?} panicked", event);
    }
}

type InfoFn = unsafe extern "C" fn(DaqDeviceHandle, c_int, c_uint, *mut i64) -> ffi::UlErrorCode;
type InfoDblFn =
    unsafe extern "C" fn(DaqDeviceHandle, c_int, c_uint, *mut f64) -> ffi::UlErrorCode;
type StatusFn =
    unsafe extern "C" fn(DaqDeviceHandle, *mut c_int, *mut ffi::TransferStatus) -> ffi::UlErrorCode;
type StopFn = unsafe extern "C" fn(DaqDeviceHandle) -> ffi::UlErrorCode;
type WaitFn = unsafe extern "C" fn(DaqDeviceHandle, c_int, i64, f64) -> ffi::UlErrorCode;
type TriggerFn =
    unsafe extern "C" fn(DaqDeviceHandle, c_uint, c_int, f64, f64, c_uint) -> ffi::UlErrorCode;

fn info_fn(target: InfoTarget) -> InfoFn {
    match target {
        InfoTarget::Device => ffi::ulDevGetInfo,
        InfoTarget::Ai => ffi::ulAIGetInfo,
        InfoTarget::Ao => ffi::ulAOGetInfo,
        InfoTarget::Dio => ffi::ulDIOGetInfo,
        InfoTarget::Ctr => ffi::ulCtrGetInfo,
        InfoTarget::Tmr => ffi::ulTmrGetInfo,
        InfoTarget::DaqI => ffi::ulDaqIGetInfo,
        InfoTarget::DaqO => ffi::ulDaqOGetInfo,
    }
}

/// The device level has no floating point info items
fn info_dbl_fn(target: InfoTarget) -> Option<InfoDblFn> {
    let query: InfoDblFn = match target {
        InfoTarget::Device => return None,
        InfoTarget::Ai => ffi::ulAIGetInfoDbl,
        InfoTarget::Ao => ffi::ulAOGetInfoDbl,
        InfoTarget::Dio => ffi::ulDIOGetInfoDbl,
        InfoTarget::Ctr => ffi::ulCtrGetInfoDbl,
        InfoTarget::Tmr => ffi::ulTmrGetInfoDbl,
        InfoTarget::DaqI => ffi::ulDaqIGetInfoDbl,
        InfoTarget::DaqO => ffi::ulDaqOGetInfoDbl,
    };
    Some(query)
}

fn status_fn(target: ScanTarget) -> StatusFn {
    match target {
        ScanTarget::AIn => ffi::ulAInScanStatus,
        ScanTarget::AOut => ffi::ulAOutScanStatus,
        ScanTarget::DIn => ffi::ulDInScanStatus,
        ScanTarget::DOut => ffi::ulDOutScanStatus,
        ScanTarget::CIn => ffi::ulCInScanStatus,
        ScanTarget::DaqIn => ffi::ulDaqInScanStatus,
        ScanTarget::DaqOut => ffi::ulDaqOutScanStatus,
    }
}

fn stop_fn(target: ScanTarget) -> StopFn {
    match target {
        ScanTarget::AIn => ffi::ulAInScanStop,
        ScanTarget::AOut => ffi::ulAOutScanStop,
        ScanTarget::DIn => ffi::ulDInScanStop,
        ScanTarget::DOut => ffi::ulDOutScanStop,
        ScanTarget::CIn => ffi::ulCInScanStop,
        ScanTarget::DaqIn => ffi::ulDaqInScanStop,
        ScanTarget::DaqOut => ffi::ulDaqOutScanStop,
    }
}

fn wait_fn(target: ScanTarget) -> WaitFn {
    match target {
        ScanTarget::AIn => ffi::ulAInScanWait,
        ScanTarget::AOut => ffi::ulAOutScanWait,
        ScanTarget::DIn => ffi::ulDInScanWait,
        ScanTarget::DOut => ffi::ulDOutScanWait,
        ScanTarget::CIn => ffi::ulCInScanWait,
        ScanTarget::DaqIn => ffi::ulDaqInScanWait,
        ScanTarget::DaqOut => ffi::ulDaqOutScanWait,
    }
}

fn trigger_fn(target: TriggerTarget) -> TriggerFn {
    match target {
        TriggerTarget::AIn => ffi::ulAInSetTrigger,
        TriggerTarget::AOut => ffi::ulAOutSetTrigger,
        TriggerTarget::DIn => ffi::ulDInSetTrigger,
        TriggerTarget::DOut => ffi::ulDOutSetTrigger,
        TriggerTarget::CIn => ffi::ulCInSetTrigger,
        TriggerTarget::Tmr => ffi::ulTmrSetTrigger,
    }
}

impl UlDriver for NativeDriver {
    fn inventory(
        &self,
        interface: InterfaceType,
        max_devices: usize,
    ) -> Result<Vec<DaqDeviceDescriptor>> {
        let mut raw = vec![ffi::DaqDeviceDescriptor::default(); max_devices];
        let mut count = c_uint::try_from(max_devices).map_err(|_| UlError::BadArg)?;
        // SAFETY: `raw` holds `count` writable descriptors.
        UlError::check(unsafe {
            ffi::ulGetDaqDeviceInventory(interface.bits(), raw.as_mut_ptr(), &mut count)
        })?;
        raw.truncate(count as usize);
        debug!("inventory found {} device(s)", raw.len());
        Ok(raw.iter().map(DaqDeviceDescriptor::from_raw).collect())
    }

    fn create_device(&self, descriptor: &DaqDeviceDescriptor) -> Result<DaqDeviceHandle> {
        // SAFETY: the descriptor is passed by value.
        let handle = unsafe { ffi::ulCreateDaqDevice(descriptor.to_raw()) };
        if handle == 0 {
            return Err(UlError::BadDescriptor);
        }
        Ok(handle)
    }

    fn device_descriptor(&self, handle: DaqDeviceHandle) -> Result<DaqDeviceDescriptor> {
        let mut raw = ffi::DaqDeviceDescriptor::default();
        // SAFETY: `raw` is a valid out pointer.
        UlError::check(unsafe { ffi::ulGetDaqDeviceDescriptor(handle, &mut raw) })?;
        Ok(DaqDeviceDescriptor::from_raw(&raw))
    }

    fn connect(&self, handle: DaqDeviceHandle) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulConnectDaqDevice(handle) })
    }

    fn disconnect(&self, handle: DaqDeviceHandle) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulDisconnectDaqDevice(handle) })
    }

    fn release(&self, handle: DaqDeviceHandle) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulReleaseDaqDevice(handle) })?;
        // The driver no longer references any handler of this device
        self.events.lock().remove(&handle);
        Ok(())
    }

    fn is_connected(&self, handle: DaqDeviceHandle) -> Result<bool> {
        let mut connected: c_int = 0;
        // SAFETY: `connected` is a valid out pointer.
        UlError::check(unsafe { ffi::ulIsDaqDeviceConnected(handle, &mut connected) })?;
        Ok(connected != 0)
    }

    fn flash_led(&self, handle: DaqDeviceHandle, flash_count: i32) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulFlashLed(handle, flash_count) })
    }

    fn error_message(&self, err: &UlError) -> String {
        let Some(code) = err.code() else {
            return err.to_string();
        };
        let mut buf: [c_char; ERR_MSG_LEN] = [0; ERR_MSG_LEN];
        // SAFETY: `buf` is ERR_MSG_LEN bytes as the driver requires.
        match UlError::check(unsafe { ffi::ulGetErrMsg(code, buf.as_mut_ptr()) }) {
            Ok(()) => c_chars_to_string(&buf),
            Err(_) => err.to_string(),
        }
    }

    fn library_info_str(&self, item: i32, index: u32) -> Result<String> {
        // SAFETY: the query closure receives a buffer and its length.
        Self::query_string(|buf, len| unsafe { ffi::ulGetInfoStr(item, index, buf, len) })
    }

    fn set_library_config(&self, item: i32, index: u32, value: i64) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulSetConfig(item, index, value) })
    }

    fn library_config(&self, item: i32, index: u32) -> Result<i64> {
        let mut value = 0;
        // SAFETY: `value` is a valid out pointer.
        UlError::check(unsafe { ffi::ulGetConfig(item, index, &mut value) })?;
        Ok(value)
    }

    fn get_info(
        &self,
        handle: DaqDeviceHandle,
        target: InfoTarget,
        item: i32,
        index: u32,
    ) -> Result<i64> {
        let mut value = 0;
        // SAFETY: `value` is a valid out pointer.
        UlError::check(unsafe { info_fn(target)(handle, item, index, &mut value) })?;
        trace!("{:?} info {}[{}] = {}", target, item, index, value);
        Ok(value)
    }

    fn get_info_dbl(
        &self,
        handle: DaqDeviceHandle,
        target: InfoTarget,
        item: i32,
        index: u32,
    ) -> Result<f64> {
        let query = info_dbl_fn(target).ok_or(UlError::BadInfoItem)?;
        let mut value = 0.0;
        // SAFETY: `value` is a valid out pointer.
        UlError::check(unsafe { query(handle, item, index, &mut value) })?;
        Ok(value)
    }

    fn dev_config_str(&self, handle: DaqDeviceHandle, item: i32, index: u32) -> Result<String> {
        // SAFETY: the query closure receives a buffer and its length.
        Self::query_string(|buf, len| unsafe {
            ffi::ulDevGetConfigStr(handle, item, index, buf, len)
        })
    }

    fn ai_set_config(
        &self,
        handle: DaqDeviceHandle,
        item: i32,
        index: u32,
        value: i64,
    ) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulAISetConfig(handle, item, index, value) })
    }

    fn ai_config(&self, handle: DaqDeviceHandle, item: i32, index: u32) -> Result<i64> {
        let mut value = 0;
        // SAFETY: `value` is a valid out pointer.
        UlError::check(unsafe { ffi::ulAIGetConfig(handle, item, index, &mut value) })?;
        Ok(value)
    }

    fn ai_set_config_dbl(
        &self,
        handle: DaqDeviceHandle,
        item: i32,
        index: u32,
        value: f64,
    ) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulAISetConfigDbl(handle, item, index, value) })
    }

    fn ai_config_dbl(&self, handle: DaqDeviceHandle, item: i32, index: u32) -> Result<f64> {
        let mut value = 0.0;
        // SAFETY: `value` is a valid out pointer.
        UlError::check(unsafe { ffi::ulAIGetConfigDbl(handle, item, index, &mut value) })?;
        Ok(value)
    }

    fn ai_config_str(&self, handle: DaqDeviceHandle, item: i32, index: u32) -> Result<String> {
        // SAFETY: the query closure receives a buffer and its length.
        Self::query_string(|buf, len| unsafe {
            ffi::ulAIGetConfigStr(handle, item, index, buf, len)
        })
    }

    fn dio_config(&self, handle: DaqDeviceHandle, item: i32, index: u32) -> Result<i64> {
        let mut value = 0;
        // SAFETY: `value` is a valid out pointer.
        UlError::check(unsafe { ffi::ulDIOGetConfig(handle, item, index, &mut value) })?;
        Ok(value)
    }

    fn a_in(
        &self,
        handle: DaqDeviceHandle,
        channel: i32,
        input_mode: AiInputMode,
        range: Range,
        flags: AInFlag,
    ) -> Result<f64> {
        let mut data = 0.0;
        // SAFETY: `data` is a valid out pointer.
        UlError::check(unsafe {
            ffi::ulAIn(
                handle,
                channel,
                input_mode.raw(),
                range.raw(),
                flags.bits(),
                &mut data,
            )
        })?;
        Ok(data)
    }

    fn a_in_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        input_mode: AiInputMode,
        range: Range,
        flags: AInScanFlag,
        buffer: &FloatBuffer,
    ) -> Result<f64> {
        Self::ensure_capacity(buffer.len(), request.required_len())?;
        let mut rate = request.rate;
        // SAFETY: the buffer holds at least `required_len` elements and
        // the caller keeps it alive until the scan stops.
        UlError::check(unsafe {
            ffi::ulAInScan(
                handle,
                request.low_channel,
                request.high_channel,
                input_mode.raw(),
                range.raw(),
                request.samples_per_channel,
                &mut rate,
                request.options.bits(),
                flags.bits(),
                buffer.as_mut_ptr(),
            )
        })?;
        Ok(rate)
    }

    fn a_in_load_queue(&self, handle: DaqDeviceHandle, queue: &[AiQueueElement]) -> Result<()> {
        let mut raw: Vec<ffi::AiQueueElement> = queue.iter().map(|e| e.to_raw()).collect();
        let len = c_uint::try_from(raw.len()).map_err(|_| UlError::BadQueueSize)?;
        // SAFETY: `raw` holds `len` elements.
        UlError::check(unsafe { ffi::ulAInLoadQueue(handle, raw.as_mut_ptr(), len) })
    }

    fn a_out(
        &self,
        handle: DaqDeviceHandle,
        channel: i32,
        range: Range,
        flags: AOutFlag,
        value: f64,
    ) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulAOut(handle, channel, range.raw(), flags.bits(), value) })
    }

    fn a_out_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        range: Range,
        flags: AOutScanFlag,
        buffer: &FloatBuffer,
    ) -> Result<f64> {
        Self::ensure_capacity(buffer.len(), request.required_len())?;
        let mut rate = request.rate;
        // SAFETY: see `a_in_scan`.
        UlError::check(unsafe {
            ffi::ulAOutScan(
                handle,
                request.low_channel,
                request.high_channel,
                range.raw(),
                request.samples_per_channel,
                &mut rate,
                request.options.bits(),
                flags.bits(),
                buffer.as_mut_ptr(),
            )
        })?;
        Ok(rate)
    }

    fn d_config_port(
        &self,
        handle: DaqDeviceHandle,
        port: DigitalPortType,
        direction: DigitalDirection,
    ) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulDConfigPort(handle, port.raw(), direction.raw()) })
    }

    fn d_config_bit(
        &self,
        handle: DaqDeviceHandle,
        port: DigitalPortType,
        bit: i32,
        direction: DigitalDirection,
    ) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulDConfigBit(handle, port.raw(), bit, direction.raw()) })
    }

    fn d_in(&self, handle: DaqDeviceHandle, port: DigitalPortType) -> Result<u64> {
        let mut data = 0;
        // SAFETY: `data` is a valid out pointer.
        UlError::check(unsafe { ffi::ulDIn(handle, port.raw(), &mut data) })?;
        Ok(data)
    }

    fn d_out(&self, handle: DaqDeviceHandle, port: DigitalPortType, value: u64) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulDOut(handle, port.raw(), value) })
    }

    fn d_bit_in(&self, handle: DaqDeviceHandle, port: DigitalPortType, bit: i32) -> Result<u32> {
        let mut value = 0;
        // SAFETY: `value` is a valid out pointer.
        UlError::check(unsafe { ffi::ulDBitIn(handle, port.raw(), bit, &mut value) })?;
        Ok(value)
    }

    fn d_bit_out(
        &self,
        handle: DaqDeviceHandle,
        port: DigitalPortType,
        bit: i32,
        value: u32,
    ) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulDBitOut(handle, port.raw(), bit, value) })
    }

    fn d_in_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        flags: DInScanFlag,
        buffer: &IntBuffer,
    ) -> Result<f64> {
        Self::ensure_capacity(buffer.len(), request.required_len())?;
        let mut rate = request.rate;
        // SAFETY: see `a_in_scan`.
        UlError::check(unsafe {
            ffi::ulDInScan(
                handle,
                request.low_channel,
                request.high_channel,
                request.samples_per_channel,
                &mut rate,
                request.options.bits(),
                flags.bits(),
                buffer.as_mut_ptr(),
            )
        })?;
        Ok(rate)
    }

    fn d_out_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        flags: DOutScanFlag,
        buffer: &IntBuffer,
    ) -> Result<f64> {
        Self::ensure_capacity(buffer.len(), request.required_len())?;
        let mut rate = request.rate;
        // SAFETY: see `a_in_scan`.
        UlError::check(unsafe {
            ffi::ulDOutScan(
                handle,
                request.low_channel,
                request.high_channel,
                request.samples_per_channel,
                &mut rate,
                request.options.bits(),
                flags.bits(),
                buffer.as_mut_ptr(),
            )
        })?;
        Ok(rate)
    }

    fn c_in(&self, handle: DaqDeviceHandle, counter: i32) -> Result<u64> {
        let mut data = 0;
        // SAFETY: `data` is a valid out pointer.
        UlError::check(unsafe { ffi::ulCIn(handle, counter, &mut data) })?;
        Ok(data)
    }

    fn c_read(
        &self,
        handle: DaqDeviceHandle,
        counter: i32,
        register: CounterRegisterType,
    ) -> Result<u64> {
        let mut data = 0;
        // SAFETY: `data` is a valid out pointer.
        UlError::check(unsafe { ffi::ulCRead(handle, counter, register.bits(), &mut data) })?;
        Ok(data)
    }

    fn c_load(
        &self,
        handle: DaqDeviceHandle,
        counter: i32,
        register: CounterRegisterType,
        value: u64,
    ) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulCLoad(handle, counter, register.bits(), value) })
    }

    fn c_clear(&self, handle: DaqDeviceHandle, counter: i32) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulCClear(handle, counter) })
    }

    fn c_config_scan(
        &self,
        handle: DaqDeviceHandle,
        counter: i32,
        config: &CounterScanConfig,
    ) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe {
            ffi::ulCConfigScan(
                handle,
                counter,
                config.measurement_type.bits(),
                config.measurement_mode.bits(),
                config.edge_detection.raw(),
                config.tick_size.raw(),
                config.debounce_mode.raw(),
                config.debounce_time.raw(),
                config.flags.bits(),
            )
        })
    }

    fn c_in_scan(
        &self,
        handle: DaqDeviceHandle,
        request: &ScanRequest,
        flags: CInScanFlag,
        buffer: &IntBuffer,
    ) -> Result<f64> {
        Self::ensure_capacity(buffer.len(), request.required_len())?;
        let mut rate = request.rate;
        // SAFETY: see `a_in_scan`.
        UlError::check(unsafe {
            ffi::ulCInScan(
                handle,
                request.low_channel,
                request.high_channel,
                request.samples_per_channel,
                &mut rate,
                request.options.bits(),
                flags.bits(),
                buffer.as_mut_ptr(),
            )
        })?;
        Ok(rate)
    }

    fn pulse_out_start(
        &self,
        handle: DaqDeviceHandle,
        timer: i32,
        request: &PulseOutRequest,
    ) -> Result<PulseOutResult> {
        let mut frequency = request.frequency;
        let mut duty_cycle = request.duty_cycle;
        let mut initial_delay = request.initial_delay;
        // SAFETY: the three in/out pointers are locals.
        UlError::check(unsafe {
            ffi::ulTmrPulseOutStart(
                handle,
                timer,
                &mut frequency,
                &mut duty_cycle,
                request.pulse_count,
                &mut initial_delay,
                request.idle_state.raw(),
                request.options.bits(),
            )
        })?;
        Ok(PulseOutResult {
            frequency,
            duty_cycle,
            initial_delay,
        })
    }

    fn pulse_out_stop(&self, handle: DaqDeviceHandle, timer: i32) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulTmrPulseOutStop(handle, timer) })
    }

    fn pulse_out_status(&self, handle: DaqDeviceHandle, timer: i32) -> Result<TmrStatus> {
        let mut status: c_int = 0;
        // SAFETY: `status` is a valid out pointer.
        UlError::check(unsafe { ffi::ulTmrPulseOutStatus(handle, timer, &mut status) })?;
        TmrStatus::from_raw(status.into())
    }

    fn daq_in_scan(
        &self,
        handle: DaqDeviceHandle,
        channels: &[DaqInChanDescriptor],
        samples_per_channel: i32,
        rate: f64,
        options: ScanOption,
        flags: DaqInScanFlag,
        buffer: &FloatBuffer,
    ) -> Result<f64> {
        let samples = usize::try_from(samples_per_channel).map_err(|_| UlError::BadSampleCount)?;
        Self::ensure_capacity(buffer.len(), channels.len() * samples)?;
        let mut raw: Vec<ffi::DaqInChanDescriptor> = channels.iter().map(|c| c.to_raw()).collect();
        let num_chans = c_int::try_from(raw.len()).map_err(|_| UlError::BadNumChans)?;
        let mut rate = rate;
        // SAFETY: `raw` holds `num_chans` descriptors; buffer as in `a_in_scan`.
        UlError::check(unsafe {
            ffi::ulDaqInScan(
                handle,
                raw.as_mut_ptr(),
                num_chans,
                samples_per_channel,
                &mut rate,
                options.bits(),
                flags.bits(),
                buffer.as_mut_ptr(),
            )
        })?;
        Ok(rate)
    }

    fn daq_out_scan(
        &self,
        handle: DaqDeviceHandle,
        channels: &[DaqOutChanDescriptor],
        samples_per_channel: i32,
        rate: f64,
        options: ScanOption,
        flags: DaqOutScanFlag,
        buffer: &FloatBuffer,
    ) -> Result<f64> {
        let samples = usize::try_from(samples_per_channel).map_err(|_| UlError::BadSampleCount)?;
        Self::ensure_capacity(buffer.len(), channels.len() * samples)?;
        let mut raw: Vec<ffi::DaqOutChanDescriptor> =
            channels.iter().map(|c| c.to_raw()).collect();
        let num_chans = c_int::try_from(raw.len()).map_err(|_| UlError::BadNumChans)?;
        let mut rate = rate;
        // SAFETY: see `daq_in_scan`.
        UlError::check(unsafe {
            ffi::ulDaqOutScan(
                handle,
                raw.as_mut_ptr(),
                num_chans,
                samples_per_channel,
                &mut rate,
                options.bits(),
                flags.bits(),
                buffer.as_mut_ptr(),
            )
        })?;
        Ok(rate)
    }

    fn scan_status(
        &self,
        handle: DaqDeviceHandle,
        target: ScanTarget,
    ) -> Result<(ScanStatus, TransferStatus)> {
        let query = status_fn(target);
        let mut status: c_int = 0;
        let mut xfer = ffi::TransferStatus::default();
        // SAFETY: both out pointers are locals.
        UlError::check(unsafe { query(handle, &mut status, &mut xfer) })?;
        Ok((
            ScanStatus::from_raw(status.into())?,
            TransferStatus::from_raw(&xfer),
        ))
    }

    fn scan_stop(&self, handle: DaqDeviceHandle, target: ScanTarget) -> Result<()> {
        let stop = stop_fn(target);
        // SAFETY: plain value arguments.
        UlError::check(unsafe { stop(handle) })
    }

    fn scan_wait(
        &self,
        handle: DaqDeviceHandle,
        target: ScanTarget,
        wait_type: WaitType,
        wait_param: i64,
        timeout: f64,
    ) -> Result<()> {
        let wait = wait_fn(target);
        // SAFETY: plain value arguments.
        UlError::check(unsafe { wait(handle, wait_type.raw(), wait_param, timeout) })
    }

    fn set_trigger(
        &self,
        handle: DaqDeviceHandle,
        target: TriggerTarget,
        channel: i32,
        config: &TriggerConfig,
    ) -> Result<()> {
        let set = trigger_fn(target);
        // SAFETY: plain value arguments.
        UlError::check(unsafe {
            set(
                handle,
                config.trig_type.bits(),
                channel,
                config.level,
                config.variance,
                config.retrigger_sample_count,
            )
        })
    }

    fn daq_in_set_trigger(
        &self,
        handle: DaqDeviceHandle,
        channel: &DaqInChanDescriptor,
        config: &TriggerConfig,
    ) -> Result<()> {
        // SAFETY: the descriptor is passed by value.
        UlError::check(unsafe {
            ffi::ulDaqInSetTrigger(
                handle,
                config.trig_type.bits(),
                channel.to_raw(),
                config.level,
                config.variance,
                config.retrigger_sample_count,
            )
        })
    }

    fn daq_out_set_trigger(
        &self,
        handle: DaqDeviceHandle,
        channel: &DaqInChanDescriptor,
        config: &TriggerConfig,
    ) -> Result<()> {
        // SAFETY: the descriptor is passed by value.
        UlError::check(unsafe {
            ffi::ulDaqOutSetTrigger(
                handle,
                config.trig_type.bits(),
                channel.to_raw(),
                config.level,
                config.variance,
                config.retrigger_sample_count,
            )
        })
    }

    fn enable_event(
        &self,
        handle: DaqDeviceHandle,
        event_types: DaqEventType,
        event_parameter: u64,
        handler: EventHandler,
    ) -> Result<()> {
        let boxed = Box::new(handler);
        let user_data = &*boxed as *const EventHandler as *const c_void as *mut c_void;
        // Hold the registry lock across the call so a concurrent disable
        // cannot observe the handler before it is stored
        let mut events = self.events.lock();
        // SAFETY: `user_data` points into `boxed`, which is stored below and
        // outlives the registration.
        UlError::check(unsafe {
            ffi::ulEnableEvent(
                handle,
                event_types.bits(),
                event_parameter,
                Some(event_trampoline),
                user_data,
            )
        })?;
        events.entry(handle).or_default().push((event_types, boxed));
        debug!("enabled {:?} on handle {}", event_types, handle);
        Ok(())
    }

    fn disable_event(&self, handle: DaqDeviceHandle, event_types: DaqEventType) -> Result<()> {
        // SAFETY: plain value arguments.
        UlError::check(unsafe { ffi::ulDisableEvent(handle, event_types.bits()) })?;
        self.drop_handlers(handle, event_types);
        Ok(())
    }

    fn mem_get_info(&self, handle: DaqDeviceHandle, region: MemRegion) -> Result<MemDescriptor> {
        let mut raw = ffi::MemDescriptor::default();
        // SAFETY: `raw` is a valid out pointer.
        UlError::check(unsafe { ffi::ulMemGetInfo(handle, region.bits(), &mut raw) })?;
        Ok(MemDescriptor::from_raw(region, &raw))
    }

    fn mem_read(
        &self,
        handle: DaqDeviceHandle,
        region: MemRegion,
        address: u32,
        buffer: &mut [u8],
    ) -> Result<()> {
        let count = c_uint::try_from(buffer.len()).map_err(|_| UlError::BadBufferSize)?;
        // SAFETY: `buffer` is `count` writable bytes.
        UlError::check(unsafe {
            ffi::ulMemRead(handle, region.bits(), address, buffer.as_mut_ptr(), count)
        })
    }

    fn mem_write(
        &self,
        handle: DaqDeviceHandle,
        region: MemRegion,
        address: u32,
        data: &[u8],
    ) -> Result<()> {
        let count = c_uint::try_from(data.len()).map_err(|_| UlError::BadBufferSize)?;
        // The native signature takes a mutable pointer but only reads it
        let mut copy = data.to_vec();
        // SAFETY: `copy` is `count` bytes.
        UlError::check(unsafe {
            ffi::ulMemWrite(handle, region.bits(), address, copy.as_mut_ptr(), count)
        })
    }
}
