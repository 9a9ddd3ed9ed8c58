//! Device and library level information and configuration

use std::sync::Arc;

use crate::constants::*;
use crate::device::DeviceContext;
use crate::driver::{InfoTarget, UlDriver};
use crate::enums::{DaqEventType, DevVersionType, MemRegion};
use crate::error::Result;
use crate::structures::MemDescriptor;

/// Which subsystems a device has and what it can signal
pub struct DaqDeviceInfo {
    ctx: Arc<DeviceContext>,
    mem_info: DevMemInfo,
}

impl DaqDeviceInfo {
    pub(crate) fn new(ctx: Arc<DeviceContext>) -> Self {
        Self {
            mem_info: DevMemInfo {
                ctx: Arc::clone(&ctx),
            },
            ctx,
        }
    }

    fn has(&self, item: i32) -> Result<bool> {
        self.ctx.info_flag(InfoTarget::Device, item, 0)
    }

    pub fn product_id(&self) -> Result<u32> {
        let descriptor = self.ctx.driver().device_descriptor(self.ctx.handle()?)?;
        Ok(descriptor.product_id)
    }

    pub fn has_ai_device(&self) -> Result<bool> {
        self.has(DEV_INFO_HAS_AI_DEV)
    }

    pub fn has_ao_device(&self) -> Result<bool> {
        self.has(DEV_INFO_HAS_AO_DEV)
    }

    pub fn has_dio_device(&self) -> Result<bool> {
        self.has(DEV_INFO_HAS_DIO_DEV)
    }

    pub fn has_ctr_device(&self) -> Result<bool> {
        self.has(DEV_INFO_HAS_CTR_DEV)
    }

    pub fn has_tmr_device(&self) -> Result<bool> {
        self.has(DEV_INFO_HAS_TMR_DEV)
    }

    pub fn has_daqi_device(&self) -> Result<bool> {
        self.has(DEV_INFO_HAS_DAQI_DEV)
    }

    pub fn has_daqo_device(&self) -> Result<bool> {
        self.has(DEV_INFO_HAS_DAQO_DEV)
    }

    /// Event types the device can raise
    pub fn event_types(&self) -> Result<Vec<DaqEventType>> {
        self.ctx
            .info_list(InfoTarget::Device, DEV_INFO_DAQ_EVENT_TYPES, 0)
    }

    pub fn mem_info(&self) -> &DevMemInfo {
        &self.mem_info
    }
}

/// Layout of the device's memory regions
pub struct DevMemInfo {
    ctx: Arc<DeviceContext>,
}

impl DevMemInfo {
    pub fn mem_regions(&self) -> Result<Vec<MemRegion>> {
        self.ctx.info_list(InfoTarget::Device, DEV_INFO_MEM_REGIONS, 0)
    }

    /// Address, size and access rights of `region`
    pub fn mem_region_info(&self, region: MemRegion) -> Result<MemDescriptor> {
        self.ctx.driver().mem_get_info(self.ctx.handle()?, region)
    }
}

/// Device configuration
pub struct DaqDeviceConfig {
    ctx: Arc<DeviceContext>,
}

impl DaqDeviceConfig {
    pub(crate) fn new(ctx: Arc<DeviceContext>) -> Self {
        Self { ctx }
    }

    /// Version string of a firmware component
    pub fn version(&self, kind: DevVersionType) -> Result<String> {
        self.ctx
            .driver()
            .dev_config_str(self.ctx.handle()?, DEV_CFG_VER_STR, kind.raw() as u32)
    }
}

/// Settings that apply to the whole driver rather than one device
pub struct UlConfig {
    driver: Arc<dyn UlDriver>,
}

impl UlConfig {
    pub fn new(driver: Arc<dyn UlDriver>) -> Self {
        Self { driver }
    }

    /// Configuration of the native library
    #[cfg(feature = "hardware")]
    pub fn native() -> Self {
        Self::new(Arc::new(crate::native::NativeDriver::new()))
    }

    /// Priority of the USB transfer thread, 0 (default) to 99
    pub fn set_usb_transfer_priority(&self, priority: u32) -> Result<()> {
        self.driver
            .set_library_config(UL_CFG_USB_XFER_PRIORITY, 0, i64::from(priority))
    }

    pub fn usb_transfer_priority(&self) -> Result<u32> {
        self.driver
            .library_config(UL_CFG_USB_XFER_PRIORITY, 0)
            .map(|value| value as u32)
    }

    /// Version of the native library
    pub fn version(&self) -> Result<String> {
        self.driver.library_info_str(UL_INFO_VER_STR, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DaqDevice;
    use crate::enums::{InterfaceType, MemAccessType};
    use crate::error::UlError;
    use crate::mock::{MockDriver, MockProfile};
    use crate::structures::DaqDeviceDescriptor;

    fn open() -> DaqDevice {
        let descriptor =
            DaqDeviceDescriptor::new("USB-1808X", 0x13d, InterfaceType::USB, "01D97CFA");
        let driver = Arc::new(
            MockDriver::new().with_device(descriptor.clone(), MockProfile::multifunction()),
        );
        let device = DaqDevice::with_driver(driver, &descriptor).unwrap();
        device.connect().unwrap();
        device
    }

    #[test]
    fn test_device_info() {
        let device = open();
        let info = device.info();
        assert_eq!(info.product_id(), Ok(0x13d));
        assert_eq!(info.has_daqi_device(), Ok(true));
        assert_eq!(info.event_types().unwrap().len(), 5);
        assert_eq!(
            info.mem_info().mem_regions(),
            Ok(vec![MemRegion::CAL, MemRegion::USER])
        );
        let cal = info.mem_info().mem_region_info(MemRegion::CAL).unwrap();
        assert_eq!(cal.address, 0x7000);
        assert_eq!(cal.access_types, MemAccessType::READ);
    }

    #[test]
    fn test_versions() {
        let device = open();
        assert_eq!(device.config().version(DevVersionType::FwMain), Ok("1.02".to_string()));
        assert_eq!(
            device.config().version(DevVersionType::Radio),
            Err(UlError::BadConfigItem)
        );
    }

    #[test]
    fn test_library_config() {
        let config = UlConfig::new(Arc::new(MockDriver::new()));
        config.set_usb_transfer_priority(40).unwrap();
        assert_eq!(config.usb_transfer_priority(), Ok(40));
        assert_eq!(config.set_usb_transfer_priority(100), Err(UlError::BadConfigVal));
        assert_eq!(config.version(), Ok("1.2.1".to_string()));
    }
}
