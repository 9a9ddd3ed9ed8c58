//! Digital I/O subsystem
//!
//! Ports are addressed by [`DigitalPortType`]. Capability items that
//! depend on the transfer direction are indexed by [`DigitalDirection`],
//! per-port items by the position of the port in the device's port list.

use std::sync::Arc;

use crate::buffer::IntBuffer;
use crate::constants::*;
use crate::device::DeviceContext;
use crate::driver::{InfoTarget, ScanRequest, ScanTarget, TriggerTarget};
use crate::enums::{
    DInScanFlag, DOutScanFlag, DigitalDirection, DigitalPortIoType, DigitalPortType, ScanOption,
    ScanStatus, TriggerType, WaitType,
};
use crate::error::{Result, UlError};
use crate::scan::{sample_count, ScanSlot};
use crate::structures::{DioPortInfo, TransferStatus};
use crate::utils::{to_count, to_u32};

/// Position of `port` in the device's port list
fn port_index(ctx: &DeviceContext, port: DigitalPortType) -> Result<u32> {
    let count = ctx.info_count(InfoTarget::Dio, DIO_INFO_NUM_PORTS, 0)? as u32;
    for index in 0..count {
        if ctx.info(InfoTarget::Dio, DIO_INFO_PORT_TYPE, index)? == i64::from(port.raw()) {
            return Ok(index);
        }
    }
    Err(UlError::BadPortType)
}

// ============================================================================
// Device
// ============================================================================

/// Digital I/O subsystem of a [`crate::DaqDevice`]
pub struct DioDevice {
    ctx: Arc<DeviceContext>,
    info: DioInfo,
    config: DioConfig,
    in_scan: ScanSlot<u64>,
    out_scan: ScanSlot<u64>,
}

impl DioDevice {
    pub(crate) fn new(ctx: Arc<DeviceContext>) -> Self {
        Self {
            info: DioInfo {
                ctx: Arc::clone(&ctx),
            },
            config: DioConfig {
                ctx: Arc::clone(&ctx),
            },
            ctx,
            in_scan: ScanSlot::new(ScanTarget::DIn),
            out_scan: ScanSlot::new(ScanTarget::DOut),
        }
    }

    pub fn info(&self) -> &DioInfo {
        &self.info
    }

    pub fn config(&self) -> &DioConfig {
        &self.config
    }

    /// Set the direction of every bit of `port`
    pub fn d_config_port(&self, port: DigitalPortType, direction: DigitalDirection) -> Result<()> {
        self.ctx
            .driver()
            .d_config_port(self.ctx.handle()?, port, direction)
    }

    /// Set the direction of one bit of a bit-configurable port
    pub fn d_config_bit(
        &self,
        port: DigitalPortType,
        bit: i32,
        direction: DigitalDirection,
    ) -> Result<()> {
        self.ctx
            .driver()
            .d_config_bit(self.ctx.handle()?, port, bit, direction)
    }

    pub fn d_in(&self, port: DigitalPortType) -> Result<u64> {
        self.ctx.driver().d_in(self.ctx.handle()?, port)
    }

    pub fn d_out(&self, port: DigitalPortType, value: u64) -> Result<()> {
        self.ctx.driver().d_out(self.ctx.handle()?, port, value)
    }

    pub fn d_bit_in(&self, port: DigitalPortType, bit: i32) -> Result<u32> {
        self.ctx.driver().d_bit_in(self.ctx.handle()?, port, bit)
    }

    pub fn d_bit_out(&self, port: DigitalPortType, bit: i32, value: u32) -> Result<()> {
        self.ctx
            .driver()
            .d_bit_out(self.ctx.handle()?, port, bit, value)
    }

    /// Scan every port from `low_port` to `high_port` into `data`
    #[allow(clippy::too_many_arguments)]
    pub fn d_in_scan(
        &self,
        low_port: DigitalPortType,
        high_port: DigitalPortType,
        samples_per_port: usize,
        rate: f64,
        options: ScanOption,
        flags: DInScanFlag,
        data: &IntBuffer,
    ) -> Result<f64> {
        let request = ScanRequest {
            low_channel: low_port.raw(),
            high_channel: high_port.raw(),
            samples_per_channel: sample_count(samples_per_port)?,
            rate,
            options,
        };
        self.in_scan.start(&self.ctx, data, |driver, handle| {
            driver.d_in_scan(handle, &request, flags, data)
        })
    }

    /// Write the interleaved port values in `data` at a paced rate
    #[allow(clippy::too_many_arguments)]
    pub fn d_out_scan(
        &self,
        low_port: DigitalPortType,
        high_port: DigitalPortType,
        samples_per_port: usize,
        rate: f64,
        options: ScanOption,
        flags: DOutScanFlag,
        data: &IntBuffer,
    ) -> Result<f64> {
        let request = ScanRequest {
            low_channel: low_port.raw(),
            high_channel: high_port.raw(),
            samples_per_channel: sample_count(samples_per_port)?,
            rate,
            options,
        };
        self.out_scan.start(&self.ctx, data, |driver, handle| {
            driver.d_out_scan(handle, &request, flags, data)
        })
    }

    pub fn d_in_set_trigger(
        &self,
        trig_type: TriggerType,
        trigger_channel: i32,
        level: f64,
        variance: f64,
        retrigger_sample_count: u32,
    ) -> Result<()> {
        self.ctx.set_trigger(
            TriggerTarget::DIn,
            trigger_channel,
            trig_type,
            level,
            variance,
            retrigger_sample_count,
        )
    }

    pub fn d_out_set_trigger(
        &self,
        trig_type: TriggerType,
        trigger_channel: i32,
        level: f64,
        variance: f64,
        retrigger_sample_count: u32,
    ) -> Result<()> {
        self.ctx.set_trigger(
            TriggerTarget::DOut,
            trigger_channel,
            trig_type,
            level,
            variance,
            retrigger_sample_count,
        )
    }

    pub fn d_in_scan_status(&self) -> Result<(ScanStatus, TransferStatus)> {
        self.in_scan.status(&self.ctx)
    }

    pub fn d_out_scan_status(&self) -> Result<(ScanStatus, TransferStatus)> {
        self.out_scan.status(&self.ctx)
    }

    pub fn d_in_scan_stop(&self) -> Result<()> {
        self.in_scan.stop(&self.ctx)
    }

    pub fn d_out_scan_stop(&self) -> Result<()> {
        self.out_scan.stop(&self.ctx)
    }

    pub fn d_in_scan_wait(&self, wait_type: WaitType, wait_param: i64, timeout: f64) -> Result<()> {
        self.in_scan.wait(&self.ctx, wait_type, wait_param, timeout)
    }

    pub fn d_out_scan_wait(
        &self,
        wait_type: WaitType,
        wait_param: i64,
        timeout: f64,
    ) -> Result<()> {
        self.out_scan.wait(&self.ctx, wait_type, wait_param, timeout)
    }

    pub fn d_in_scan_buffer(&self) -> Option<IntBuffer> {
        self.in_scan.buffer()
    }

    pub fn d_out_scan_buffer(&self) -> Option<IntBuffer> {
        self.out_scan.buffer()
    }
}

// ============================================================================
// Info
// ============================================================================

/// Digital I/O capabilities
pub struct DioInfo {
    ctx: Arc<DeviceContext>,
}

impl DioInfo {
    fn by_direction(&self, item: i32, direction: DigitalDirection) -> Result<i64> {
        self.ctx.info(InfoTarget::Dio, item, direction.raw() as u32)
    }

    fn dbl_by_direction(&self, item: i32, direction: DigitalDirection) -> Result<f64> {
        self.ctx
            .info_dbl(InfoTarget::Dio, item, direction.raw() as u32)
    }

    pub fn num_ports(&self) -> Result<usize> {
        self.ctx.info_count(InfoTarget::Dio, DIO_INFO_NUM_PORTS, 0)
    }

    /// Ports in the order the device lists them
    pub fn port_types(&self) -> Result<Vec<DigitalPortType>> {
        (0..self.num_ports()? as u32)
            .map(|index| {
                let raw = self.ctx.info(InfoTarget::Dio, DIO_INFO_PORT_TYPE, index)?;
                DigitalPortType::from_raw(raw)
            })
            .collect()
    }

    pub fn port_info(&self, port: DigitalPortType) -> Result<DioPortInfo> {
        let index = port_index(&self.ctx, port)?;
        Ok(DioPortInfo {
            port_type: port,
            port_io_type: DigitalPortIoType::from_raw(self.ctx.info(
                InfoTarget::Dio,
                DIO_INFO_PORT_IO_TYPE,
                index,
            )?)?,
            number_of_bits: self
                .ctx
                .info(InfoTarget::Dio, DIO_INFO_NUM_BITS, index)
                .map(to_u32)?,
        })
    }

    pub fn num_bits(&self, port: DigitalPortType) -> Result<u32> {
        self.port_info(port).map(|info| info.number_of_bits)
    }

    pub fn port_io_type(&self, port: DigitalPortType) -> Result<DigitalPortIoType> {
        self.port_info(port).map(|info| info.port_io_type)
    }

    pub fn has_pacer(&self, direction: DigitalDirection) -> Result<bool> {
        self.by_direction(DIO_INFO_HAS_PACER, direction)
            .map(|value| value != 0)
    }

    pub fn scan_options(&self, direction: DigitalDirection) -> Result<Vec<ScanOption>> {
        self.ctx
            .info_list(InfoTarget::Dio, DIO_INFO_SCAN_OPTIONS, direction.raw() as u32)
    }

    pub fn trigger_types(&self, direction: DigitalDirection) -> Result<Vec<TriggerType>> {
        self.ctx
            .info_list(InfoTarget::Dio, DIO_INFO_TRIG_TYPES, direction.raw() as u32)
    }

    pub fn fifo_size(&self, direction: DigitalDirection) -> Result<usize> {
        self.by_direction(DIO_INFO_FIFO_SIZE, direction)
            .map(to_count)
    }

    pub fn min_scan_rate(&self, direction: DigitalDirection) -> Result<f64> {
        self.dbl_by_direction(DIO_INFO_MIN_SCAN_RATE, direction)
    }

    pub fn max_scan_rate(&self, direction: DigitalDirection) -> Result<f64> {
        self.dbl_by_direction(DIO_INFO_MAX_SCAN_RATE, direction)
    }

    pub fn max_throughput(&self, direction: DigitalDirection) -> Result<f64> {
        self.dbl_by_direction(DIO_INFO_MAX_THROUGHPUT, direction)
    }
}

// ============================================================================
// Config
// ============================================================================

/// Current digital I/O configuration
pub struct DioConfig {
    ctx: Arc<DeviceContext>,
}

impl DioConfig {
    /// Direction of every bit of `port`; a set bit is an output
    pub fn port_direction_mask(&self, port: DigitalPortType) -> Result<u64> {
        let index = port_index(&self.ctx, port)?;
        let mask = self
            .ctx
            .driver()
            .dio_config(self.ctx.handle()?, DIO_CFG_PORT_DIRECTION_MASK, index)?;
        Ok(mask as u64)
    }

    /// Direction of each bit of `port`, lowest bit first
    pub fn bit_directions(&self, port: DigitalPortType) -> Result<Vec<DigitalDirection>> {
        let index = port_index(&self.ctx, port)?;
        let bits = self
            .ctx
            .info(InfoTarget::Dio, DIO_INFO_NUM_BITS, index)
            .map(to_u32)?
            .min(64);
        let mask = self.port_direction_mask(port)?;
        Ok((0..bits)
            .map(|bit| {
                if (mask >> bit) & 1 == 1 {
                    DigitalDirection::Output
                } else {
                    DigitalDirection::Input
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DaqDevice;
    use crate::enums::InterfaceType;
    use crate::mock::{MockDriver, MockProfile};
    use crate::structures::DaqDeviceDescriptor;

    fn open() -> (Arc<MockDriver>, DaqDevice) {
        let descriptor =
            DaqDeviceDescriptor::new("USB-1808X", 0x13d, InterfaceType::USB, "01D97CFA");
        let driver = Arc::new(
            MockDriver::new().with_device(descriptor.clone(), MockProfile::multifunction()),
        );
        let device = DaqDevice::with_driver(driver.clone(), &descriptor).unwrap();
        device.connect().unwrap();
        (driver, device)
    }

    #[test]
    fn test_port_info() {
        let (_driver, device) = open();
        let info = device.dio_device().unwrap().info();
        assert_eq!(
            info.port_types(),
            Ok(vec![DigitalPortType::AuxPort, DigitalPortType::FirstPortA])
        );
        let port = info.port_info(DigitalPortType::FirstPortA).unwrap();
        assert_eq!(port.port_io_type, DigitalPortIoType::Bidirectional);
        assert_eq!(port.number_of_bits, 8);
        assert_eq!(
            info.port_info(DigitalPortType::SecondPortA),
            Err(UlError::BadPortType)
        );
        assert!(info.has_pacer(DigitalDirection::Output).unwrap());
        assert_eq!(info.max_scan_rate(DigitalDirection::Input), Ok(500_000.0));
    }

    #[test]
    fn test_port_write_requires_output_direction() {
        let (driver, device) = open();
        let dio = device.dio_device().unwrap();
        let port = DigitalPortType::FirstPortA;
        assert_eq!(dio.d_out(port, 0x5a), Err(UlError::WrongDigConfig));

        dio.d_config_port(port, DigitalDirection::Output).unwrap();
        dio.d_out(port, 0x5a).unwrap();
        assert_eq!(driver.port_output(device.handle().unwrap(), port), Ok(0x5a));
        assert_eq!(dio.d_in(port), Ok(0x5a));
        assert_eq!(dio.d_out(port, 0x100), Err(UlError::BadPortVal));
    }

    #[test]
    fn test_bit_directions() {
        let (driver, device) = open();
        let dio = device.dio_device().unwrap();
        let port = DigitalPortType::AuxPort;
        dio.d_config_bit(port, 2, DigitalDirection::Output).unwrap();
        assert_eq!(dio.config().port_direction_mask(port), Ok(0b0100));
        assert_eq!(
            dio.config().bit_directions(port).unwrap(),
            vec![
                DigitalDirection::Input,
                DigitalDirection::Input,
                DigitalDirection::Output,
                DigitalDirection::Input
            ]
        );

        driver
            .set_port_input(device.handle().unwrap(), port, 0b0001)
            .unwrap();
        dio.d_bit_out(port, 2, 1).unwrap();
        assert_eq!(dio.d_bit_in(port, 0), Ok(1));
        assert_eq!(dio.d_bit_in(port, 2), Ok(1));
        assert_eq!(dio.d_bit_out(port, 1, 1), Err(UlError::WrongDigConfig));
        assert_eq!(dio.d_bit_in(port, 4), Err(UlError::BadBitNum));
    }

    #[test]
    fn test_in_and_out_scans_are_independent() {
        let (driver, device) = open();
        let handle = device.handle().unwrap();
        let dio = device.dio_device().unwrap();
        driver
            .set_port_input(handle, DigitalPortType::FirstPortA, 0x81)
            .unwrap();

        let input = IntBuffer::new(1, 4).unwrap();
        dio.d_in_scan(
            DigitalPortType::FirstPortA,
            DigitalPortType::FirstPortA,
            4,
            100.0,
            ScanOption::CONTINUOUS,
            DInScanFlag::empty(),
            &input,
        )
        .unwrap();

        dio.d_config_port(DigitalPortType::AuxPort, DigitalDirection::Output)
            .unwrap();
        let output = IntBuffer::from_samples(1, &[1, 2, 3]).unwrap();
        dio.d_out_scan(
            DigitalPortType::AuxPort,
            DigitalPortType::AuxPort,
            3,
            100.0,
            ScanOption::DEFAULTIO,
            DOutScanFlag::empty(),
            &output,
        )
        .unwrap();

        driver.advance_scan(handle, ScanTarget::DIn, 2).unwrap();
        driver.advance_scan(handle, ScanTarget::DOut, 3).unwrap();
        assert_eq!(input.get(1), Some(0x81));
        assert_eq!(driver.port_output(handle, DigitalPortType::AuxPort), Ok(3));

        assert_eq!(dio.d_out_scan_status().unwrap().0, ScanStatus::Idle);
        assert_eq!(dio.d_in_scan_status().unwrap().0, ScanStatus::Running);
        dio.d_in_scan_stop().unwrap();
        assert!(dio.d_in_scan_buffer().is_none());
    }
}
