//! Helpers shared by the subsystem façades

use bitflags::Flags;
use log::debug;

use crate::driver::UlDriver;
use crate::enums::InterfaceType;
use crate::error::{Result, UlError};
use crate::structures::DaqDeviceDescriptor;

/// Discover the devices attached through `interface`
///
/// At most `max_devices` descriptors are returned.
pub fn daq_device_inventory(
    driver: &dyn UlDriver,
    interface: InterfaceType,
    max_devices: usize,
) -> Result<Vec<DaqDeviceDescriptor>> {
    let devices = driver.inventory(interface, max_devices)?;
    debug!("Inventory on {:?} found {} device(s)", interface, devices.len());
    Ok(devices)
}

/// Discover devices through the native library
///
/// `None` uses the default bound of 100 devices.
#[cfg(feature = "hardware")]
pub fn get_daq_device_inventory(
    interface: InterfaceType,
    max_devices: Option<usize>,
) -> Result<Vec<DaqDeviceDescriptor>> {
    let driver = crate::native::NativeDriver::new();
    daq_device_inventory(
        &driver,
        interface,
        max_devices.unwrap_or(crate::constants::DEFAULT_MAX_DEVICES),
    )
}

/// Expand a capability mask reported by the driver into the set of named
/// flags it contains
///
/// The result follows the declaration order of `F`. Zero valued members
/// never appear, and a zero mask yields an empty list.
pub fn enum_mask_to_list<F>(mask: i64) -> Vec<F>
where
    F: Flags<Bits = u32> + Copy,
{
    // Masks are 32 bit on the native side even though info items are i64
    let mask = mask as u32;
    F::FLAGS
        .iter()
        .map(|flag| *flag.value())
        .filter(|value| {
            let bits = value.bits();
            bits != 0 && bits & mask != 0
        })
        .collect()
}

/// Convert a non-negative count reported by the driver
pub(crate) fn to_count(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

pub(crate) fn to_u32(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// Interpret a configuration value that holds exactly one flag of `F`
pub(crate) fn single_flag<F>(value: i64) -> Result<F>
where
    F: Flags<Bits = u32>,
{
    let flag = u32::try_from(value)
        .ok()
        .filter(|bits| bits.count_ones() == 1)
        .and_then(F::from_bits);
    flag.ok_or_else(|| {
        let full = std::any::type_name::<F>();
        UlError::UnknownValue {
            type_name: full.rsplit("::").next().unwrap_or(full),
            value,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{CounterMeasurementType, DaqEventType, ScanOption, TriggerType};

    #[test]
    fn test_mask_expansion_keeps_declaration_order() {
        let mask = (CounterMeasurementType::TIMING | CounterMeasurementType::PERIOD).bits();
        let list: Vec<CounterMeasurementType> = enum_mask_to_list(mask as i64);
        assert_eq!(
            list,
            vec![CounterMeasurementType::PERIOD, CounterMeasurementType::TIMING]
        );
    }

    #[test]
    fn test_bits_one_and_four() {
        let list: Vec<DaqEventType> = enum_mask_to_list(0b10010);
        assert_eq!(
            list,
            vec![
                DaqEventType::ON_INPUT_SCAN_ERROR,
                DaqEventType::ON_END_OF_OUTPUT_SCAN
            ]
        );
    }

    #[test]
    fn test_zero_mask_is_empty() {
        assert!(enum_mask_to_list::<DaqEventType>(0).is_empty());
        assert!(enum_mask_to_list::<ScanOption>(0).is_empty());
    }

    #[test]
    fn test_unknown_bits_are_ignored() {
        let list: Vec<TriggerType> = enum_mask_to_list(1 << 20 | 1);
        assert_eq!(list, vec![TriggerType::POS_EDGE]);
    }

    #[test]
    fn test_single_flag() {
        use crate::enums::AiChanType;
        assert_eq!(single_flag::<AiChanType>(AiChanType::TC.bits() as i64), Ok(AiChanType::TC));
        assert_eq!(
            single_flag::<AiChanType>(0b11),
            Err(UlError::UnknownValue {
                type_name: "AiChanType",
                value: 3
            })
        );
    }

    #[test]
    fn test_inventory_helper() {
        use crate::mock::{MockDriver, MockProfile};
        let driver = MockDriver::new()
            .with_device(
                DaqDeviceDescriptor::new("USB-1808X", 0x13d, InterfaceType::USB, "A"),
                MockProfile::multifunction(),
            )
            .with_device(
                DaqDeviceDescriptor::new("E-1608", 0x12f, InterfaceType::ETHERNET, "B"),
                MockProfile::multifunction(),
            );
        assert_eq!(daq_device_inventory(&driver, InterfaceType::ANY, 100).unwrap().len(), 2);
        assert_eq!(daq_device_inventory(&driver, InterfaceType::ANY, 1).unwrap().len(), 1);
        let usb = daq_device_inventory(&driver, InterfaceType::USB, 100).unwrap();
        assert_eq!(usb[0].unique_id, "A");
    }

    #[test]
    fn test_to_count() {
        assert_eq!(to_count(-1), 0);
        assert_eq!(to_count(16), 16);
    }
}
