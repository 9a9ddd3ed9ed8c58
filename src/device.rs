//! DAQ device implementation
//!
//! [`DaqDevice`] owns a driver handle for one physical device. It builds
//! the subsystem façades the device reports, routes event subscriptions
//! and on every exit path stops scans first, then disconnects, then
//! releases the handle.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bitflags::Flags;
use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::analog_input::AiDevice;
use crate::analog_output::AoDevice;
use crate::constants::*;
use crate::counter::CtrDevice;
use crate::daq_input::DaqiDevice;
use crate::daq_output::DaqoDevice;
use crate::device_info::{DaqDeviceConfig, DaqDeviceInfo};
use crate::digital_io::DioDevice;
use crate::driver::{EventHandler, InfoTarget, ScanTarget, TriggerConfig, TriggerTarget, UlDriver};
use crate::enums::{DaqEventType, MemRegion, ScanStatus, TriggerType};
use crate::error::{Result, UlError};
use crate::ffi::DaqDeviceHandle;
use crate::structures::DaqDeviceDescriptor;
use crate::timer::TmrDevice;
use crate::utils::{enum_mask_to_list, to_count};

/// Driver and handle shared by a device and its subsystems
///
/// Once released, every accessor fails with [`UlError::BadDevHandle`]
/// without reaching the driver.
pub(crate) struct DeviceContext {
    driver: Arc<dyn UlDriver>,
    handle: DaqDeviceHandle,
    released: AtomicBool,
}

impl DeviceContext {
    pub(crate) fn new(driver: Arc<dyn UlDriver>, handle: DaqDeviceHandle) -> Self {
        Self {
            driver,
            handle,
            released: AtomicBool::new(false),
        }
    }

    pub(crate) fn handle(&self) -> Result<DaqDeviceHandle> {
        if self.released.load(Ordering::Acquire) {
            return Err(UlError::BadDevHandle);
        }
        Ok(self.handle)
    }

    pub(crate) fn driver(&self) -> &dyn UlDriver {
        self.driver.as_ref()
    }

    fn mark_released(&self) {
        self.released.store(true, Ordering::Release);
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub(crate) fn info(&self, target: InfoTarget, item: i32, index: u32) -> Result<i64> {
        self.driver.get_info(self.handle()?, target, item, index)
    }

    pub(crate) fn info_dbl(&self, target: InfoTarget, item: i32, index: u32) -> Result<f64> {
        self.driver.get_info_dbl(self.handle()?, target, item, index)
    }

    pub(crate) fn info_count(&self, target: InfoTarget, item: i32, index: u32) -> Result<usize> {
        self.info(target, item, index).map(to_count)
    }

    pub(crate) fn info_flag(&self, target: InfoTarget, item: i32, index: u32) -> Result<bool> {
        self.info(target, item, index).map(|value| value != 0)
    }

    /// Query a bitmask item and expand it into its named flags
    pub(crate) fn info_list<F>(&self, target: InfoTarget, item: i32, index: u32) -> Result<Vec<F>>
    where
        F: Flags<Bits = u32> + Copy,
    {
        self.info(target, item, index).map(enum_mask_to_list)
    }

    pub(crate) fn set_trigger(
        &self,
        target: TriggerTarget,
        channel: i32,
        trig_type: TriggerType,
        level: f64,
        variance: f64,
        retrigger_sample_count: u32,
    ) -> Result<()> {
        let config = TriggerConfig {
            trig_type,
            level,
            variance,
            retrigger_sample_count,
        };
        self.driver
            .set_trigger(self.handle()?, target, channel, &config)
    }
}

/// Arguments handed to an event callback
#[derive(Debug)]
pub struct EventCallbackArgs<'a, T> {
    /// The single event type that occurred
    pub event_type: DaqEventType,
    /// Driver supplied payload: the cumulative sample count for
    /// `ON_DATA_AVAILABLE` and end of scan, the error code for scan errors
    pub event_data: u64,
    /// Value registered with the callback
    pub user_data: &'a T,
}

/// A connected (or connectable) DAQ device
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use uldaq::{AInFlag, AiInputMode, DaqDevice, InterfaceType, Range, UlDriver};
///
/// fn read_first_channel(driver: Arc<dyn UlDriver>) -> uldaq::Result<()> {
///     let devices = driver.inventory(InterfaceType::ANY, 100)?;
///     let Some(descriptor) = devices.first() else {
///         println!("No DAQ device found");
///         return Ok(());
///     };
///
///     let device = DaqDevice::with_driver(driver, descriptor)?;
///     device.connect()?;
///
///     if let Some(ai) = device.ai_device() {
///         let volts = ai.a_in(0, AiInputMode::SingleEnded, Range::Bip10Volts, AInFlag::empty())?;
///         println!("Channel 0: {:.6} V", volts);
///     }
///
///     // Scans are stopped, the device disconnected and the handle released
///     device.close()
/// }
/// ```
pub struct DaqDevice {
    ctx: Arc<DeviceContext>,
    descriptor: DaqDeviceDescriptor,
    info: DaqDeviceInfo,
    config: DaqDeviceConfig,
    ai: Option<AiDevice>,
    ao: Option<AoDevice>,
    dio: Option<DioDevice>,
    ctr: Option<CtrDevice>,
    tmr: Option<TmrDevice>,
    daqi: Option<DaqiDevice>,
    daqo: Option<DaqoDevice>,
    /// One handler per event type bit
    events: Mutex<HashMap<DaqEventType, EventHandler>>,
}

impl DaqDevice {
    /// Create a device on the native driver
    #[cfg(feature = "hardware")]
    pub fn new(descriptor: &DaqDeviceDescriptor) -> Result<Self> {
        Self::with_driver(Arc::new(crate::native::NativeDriver::new()), descriptor)
    }

    /// Create a device on an explicit driver
    ///
    /// Subsystems are built for every `DEV_INFO_HAS_*` item the device
    /// reports as present. If any of those queries fails the handle is
    /// released before the error is returned.
    pub fn with_driver(
        driver: Arc<dyn UlDriver>,
        descriptor: &DaqDeviceDescriptor,
    ) -> Result<Self> {
        let handle = driver.create_device(descriptor)?;
        debug!("Created handle {} for {}", handle, descriptor);
        let ctx = Arc::new(DeviceContext::new(driver, handle));

        match Self::build(Arc::clone(&ctx), descriptor) {
            Ok(device) => Ok(device),
            Err(e) => {
                if let Err(release_err) = ctx.driver().release(handle) {
                    warn!("Failed to release handle {}: {}", handle, release_err);
                }
                ctx.mark_released();
                Err(e)
            }
        }
    }

    fn build(ctx: Arc<DeviceContext>, descriptor: &DaqDeviceDescriptor) -> Result<Self> {
        let info = DaqDeviceInfo::new(Arc::clone(&ctx));
        let has = |item: i32| ctx.info_flag(InfoTarget::Device, item, 0);

        let ai = has(DEV_INFO_HAS_AI_DEV)?.then(|| AiDevice::new(Arc::clone(&ctx)));
        let ao = has(DEV_INFO_HAS_AO_DEV)?.then(|| AoDevice::new(Arc::clone(&ctx)));
        let dio = has(DEV_INFO_HAS_DIO_DEV)?.then(|| DioDevice::new(Arc::clone(&ctx)));
        let ctr = has(DEV_INFO_HAS_CTR_DEV)?.then(|| CtrDevice::new(Arc::clone(&ctx)));
        let tmr = has(DEV_INFO_HAS_TMR_DEV)?.then(|| TmrDevice::new(Arc::clone(&ctx)));
        let daqi = has(DEV_INFO_HAS_DAQI_DEV)?.then(|| DaqiDevice::new(Arc::clone(&ctx)));
        let daqo = has(DEV_INFO_HAS_DAQO_DEV)?.then(|| DaqoDevice::new(Arc::clone(&ctx)));

        Ok(Self {
            config: DaqDeviceConfig::new(Arc::clone(&ctx)),
            ctx,
            descriptor: descriptor.clone(),
            info,
            ai,
            ao,
            dio,
            ctr,
            tmr,
            daqi,
            daqo,
            events: Mutex::new(HashMap::new()),
        })
    }

    /// Native handle, or `BadDevHandle` once released
    pub fn handle(&self) -> Result<DaqDeviceHandle> {
        self.ctx.handle()
    }

    /// Descriptor as currently reported by the driver
    pub fn get_descriptor(&self) -> Result<DaqDeviceDescriptor> {
        self.ctx.driver().device_descriptor(self.ctx.handle()?)
    }

    pub fn connect(&self) -> Result<()> {
        self.ctx.driver().connect(self.ctx.handle()?)?;
        debug!("Connected to {}", self.descriptor.unique_id);
        Ok(())
    }

    pub fn is_connected(&self) -> Result<bool> {
        self.ctx.driver().is_connected(self.ctx.handle()?)
    }

    pub fn disconnect(&self) -> Result<()> {
        self.ctx.driver().disconnect(self.ctx.handle()?)?;
        debug!("Disconnected from {}", self.descriptor.unique_id);
        Ok(())
    }

    /// Blink the device LED `flash_count` times
    pub fn flash_led(&self, flash_count: i32) -> Result<()> {
        self.ctx.driver().flash_led(self.ctx.handle()?, flash_count)
    }

    pub fn info(&self) -> &DaqDeviceInfo {
        &self.info
    }

    pub fn config(&self) -> &DaqDeviceConfig {
        &self.config
    }

    pub fn ai_device(&self) -> Option<&AiDevice> {
        self.ai.as_ref()
    }

    pub fn ao_device(&self) -> Option<&AoDevice> {
        self.ao.as_ref()
    }

    pub fn dio_device(&self) -> Option<&DioDevice> {
        self.dio.as_ref()
    }

    pub fn ctr_device(&self) -> Option<&CtrDevice> {
        self.ctr.as_ref()
    }

    pub fn tmr_device(&self) -> Option<&TmrDevice> {
        self.tmr.as_ref()
    }

    pub fn daqi_device(&self) -> Option<&DaqiDevice> {
        self.daqi.as_ref()
    }

    pub fn daqo_device(&self) -> Option<&DaqoDevice> {
        self.daqo.as_ref()
    }

    // ---- device memory ----

    /// Read `count` bytes starting at `address`
    pub fn mem_read(&self, region: MemRegion, address: u32, count: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; count];
        self.ctx
            .driver()
            .mem_read(self.ctx.handle()?, region, address, &mut data)?;
        Ok(data)
    }

    pub fn mem_write(&self, region: MemRegion, address: u32, data: &[u8]) -> Result<()> {
        self.ctx
            .driver()
            .mem_write(self.ctx.handle()?, region, address, data)
    }

    // ---- events ----

    /// Bind `callback` to every type in `event_types`
    ///
    /// For `ON_DATA_AVAILABLE`, `event_parameter` is the number of samples
    /// per channel between callbacks. The callback runs on a driver thread
    /// and must return promptly. Binding a type that already has a
    /// callback fails with `EventAlreadyEnabled`.
    pub fn enable_event<T, F>(
        &self,
        event_types: DaqEventType,
        event_parameter: u64,
        callback: F,
        user_data: T,
    ) -> Result<()>
    where
        T: Send + Sync + 'static,
        F: Fn(EventCallbackArgs<'_, T>) + Send + Sync + 'static,
    {
        let handle = self.ctx.handle()?;
        let mut events = self.events.lock();
        if event_types.iter().any(|kind| events.contains_key(&kind)) {
            return Err(UlError::EventAlreadyEnabled);
        }

        let handler: EventHandler = Arc::new(move |event_type, event_data| {
            let args = EventCallbackArgs {
                event_type,
                event_data,
                user_data: &user_data,
            };
            // Never unwind into the driver's callback thread
            if catch_unwind(AssertUnwindSafe(|| callback(args))).is_err() {
                error!("Callback for {:?} panicked", event_type);
            }
        });
        self.ctx
            .driver()
            .enable_event(handle, event_types, event_parameter, Arc::clone(&handler))?;
        for kind in event_types.iter() {
            events.insert(kind, Arc::clone(&handler));
        }
        debug!("Enabled events {:?}", event_types);
        Ok(())
    }

    pub fn disable_event(&self, event_types: DaqEventType) -> Result<()> {
        let handle = self.ctx.handle()?;
        let mut events = self.events.lock();
        self.ctx.driver().disable_event(handle, event_types)?;
        for kind in event_types.iter() {
            events.remove(&kind);
        }
        debug!("Disabled events {:?}", event_types);
        Ok(())
    }

    /// Event types that currently have a callback
    pub fn enabled_events(&self) -> DaqEventType {
        self.events
            .lock()
            .keys()
            .fold(DaqEventType::empty(), |acc, kind| acc | *kind)
    }

    // ---- teardown ----

    fn scan_targets(&self) -> Vec<ScanTarget> {
        let mut targets = Vec::new();
        if self.ai.is_some() {
            targets.push(ScanTarget::AIn);
        }
        if self.ao.is_some() {
            targets.push(ScanTarget::AOut);
        }
        if self.dio.is_some() {
            targets.extend([ScanTarget::DIn, ScanTarget::DOut]);
        }
        if self.ctr.is_some() {
            targets.push(ScanTarget::CIn);
        }
        if self.daqi.is_some() {
            targets.push(ScanTarget::DaqIn);
        }
        if self.daqo.is_some() {
            targets.push(ScanTarget::DaqOut);
        }
        targets
    }

    /// Stop every scan that is running on any subsystem
    pub fn stop_all_scans(&self) -> Result<()> {
        let handle = self.ctx.handle()?;
        let driver = self.ctx.driver();
        for target in self.scan_targets() {
            let (status, _) = driver.scan_status(handle, target)?;
            if status == ScanStatus::Running {
                driver.scan_stop(handle, target)?;
                debug!("Stopped {:?} scan", target);
            }
        }
        Ok(())
    }

    /// Invalidate the handle
    ///
    /// Every later call on this device or its subsystems fails with
    /// `BadDevHandle`. Prefer [`DaqDevice::close`], which stops scans and
    /// disconnects first.
    pub fn release(&self) -> Result<()> {
        let handle = self.ctx.handle()?;
        self.ctx.driver().release(handle)?;
        self.ctx.mark_released();
        self.events.lock().clear();
        debug!("Released handle {}", handle);
        Ok(())
    }

    /// Stop scans, disconnect and release, reporting the first failure
    ///
    /// Every step runs even if an earlier one failed.
    pub fn close(self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&self) -> Result<()> {
        if self.ctx.is_released() {
            return Ok(());
        }
        let mut first_error = None;
        let mut record = |step: &str, result: Result<()>| {
            if let Err(e) = result {
                warn!(
                    "Teardown of {}: {} failed: {}",
                    self.descriptor.unique_id,
                    step,
                    self.ctx.driver().error_message(&e)
                );
                first_error.get_or_insert(e);
            }
        };

        if self.is_connected().unwrap_or(false) {
            record("stop scans", self.stop_all_scans());
            record("disconnect", self.disconnect());
        }
        record("release", self.release());
        if !self.ctx.is_released() {
            // The driver refused; never touch this handle again
            self.ctx.mark_released();
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Display for DaqDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.descriptor)
    }
}

impl std::fmt::Debug for DaqDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaqDevice")
            .field("descriptor", &self.descriptor)
            .field("handle", &self.ctx.handle)
            .field("released", &self.ctx.is_released())
            .finish()
    }
}

impl Drop for DaqDevice {
    fn drop(&mut self) {
        // Failures are logged by teardown
        let _ = self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    use crate::enums::InterfaceType;
    use crate::mock::{MockDriver, MockProfile};

    fn descriptor() -> DaqDeviceDescriptor {
        DaqDeviceDescriptor::new("USB-1808X", 0x13d, InterfaceType::USB, "01D97CFA")
    }

    fn open(profile: MockProfile) -> (Arc<MockDriver>, DaqDevice) {
        let driver = Arc::new(MockDriver::new().with_device(descriptor(), profile));
        let device = DaqDevice::with_driver(driver.clone(), &descriptor()).unwrap();
        device.connect().unwrap();
        (driver, device)
    }

    #[test]
    fn test_subsystems_follow_capabilities() {
        let profile = MockProfile::multifunction()
            .with_info(InfoTarget::Device, DEV_INFO_HAS_AO_DEV, 0, 0)
            .with_info(InfoTarget::Device, DEV_INFO_HAS_TMR_DEV, 0, 0);
        let (_driver, device) = open(profile);
        assert!(device.ai_device().is_some());
        assert!(device.ao_device().is_none());
        assert!(device.tmr_device().is_none());
        assert!(device.daqo_device().is_some());
    }

    #[test]
    fn test_failed_construction_releases_handle() {
        let profile =
            MockProfile::multifunction().without_info(InfoTarget::Device, DEV_INFO_HAS_CTR_DEV, 0);
        let driver = Arc::new(MockDriver::new().with_device(descriptor(), profile));
        let err = DaqDevice::with_driver(driver.clone(), &descriptor()).unwrap_err();
        assert_eq!(err, UlError::BadInfoItem);
        assert!(driver.is_released(1));
    }

    #[test]
    fn test_drop_runs_teardown() {
        let (driver, device) = open(MockProfile::multifunction());
        let handle = device.handle().unwrap();
        drop(device);
        assert!(driver.is_released(handle));
    }

    #[test]
    fn test_close_after_release_is_ok() {
        let (_driver, device) = open(MockProfile::multifunction());
        device.release().unwrap();
        assert_eq!(device.connect(), Err(UlError::BadDevHandle));
        assert_eq!(device.release(), Err(UlError::BadDevHandle));
        assert!(device.close().is_ok());
    }

    #[test]
    fn test_event_registry_per_bit() {
        let (driver, device) = open(MockProfile::multifunction());
        let count = Arc::new(AtomicU64::new(0));
        device
            .enable_event(
                DaqEventType::ON_END_OF_INPUT_SCAN | DaqEventType::ON_INPUT_SCAN_ERROR,
                0,
                |args: EventCallbackArgs<'_, Arc<AtomicU64>>| {
                    args.user_data.fetch_add(1, Ordering::SeqCst);
                },
                Arc::clone(&count),
            )
            .unwrap();
        assert_eq!(
            device.enable_event(
                DaqEventType::ON_INPUT_SCAN_ERROR,
                0,
                |_: EventCallbackArgs<'_, ()>| {},
                ()
            ),
            Err(UlError::EventAlreadyEnabled)
        );
        device.disable_event(DaqEventType::ON_INPUT_SCAN_ERROR).unwrap();
        assert_eq!(device.enabled_events(), DaqEventType::ON_END_OF_INPUT_SCAN);
        assert_eq!(
            driver.enabled_events(device.handle().unwrap()),
            Ok(DaqEventType::ON_END_OF_INPUT_SCAN)
        );
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let (driver, device) = open(MockProfile::multifunction());
        device
            .enable_event(
                DaqEventType::ON_END_OF_INPUT_SCAN,
                0,
                |_: EventCallbackArgs<'_, ()>| panic!("callback failure"),
                (),
            )
            .unwrap();
        let ai = device.ai_device().unwrap();
        let buffer = crate::buffer::FloatBuffer::new(1, 10).unwrap();
        ai.a_in_scan(
            0,
            0,
            crate::enums::AiInputMode::SingleEnded,
            crate::enums::Range::Bip10Volts,
            10,
            100.0,
            crate::enums::ScanOption::DEFAULTIO,
            crate::enums::AInScanFlag::empty(),
            &buffer,
        )
        .unwrap();
        let handle = device.handle().unwrap();
        assert!(driver.advance_scan(handle, ScanTarget::AIn, 10).is_ok());
    }

    #[test]
    fn test_memory_round_trip() {
        let (_driver, device) = open(MockProfile::multifunction());
        device.mem_write(MemRegion::USER, 8, b"uldaq").unwrap();
        assert_eq!(device.mem_read(MemRegion::USER, 8, 5).unwrap(), b"uldaq".to_vec());
    }
}
