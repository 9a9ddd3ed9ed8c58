//! Universal Library (libuldaq) bindings for Rust
//!
//! This crate wraps the native uldaq driver for Measurement Computing data
//! acquisition devices behind safe, typed façades. It turns native status
//! codes into [`UlError`], capability bitmasks into lists of typed flags and
//! keeps scan buffers alive for as long as the driver may write into them.
//!
//! # Features
//!
//! - Device discovery, connection and ordered teardown
//! - Capability and configuration queries for every subsystem
//! - Single-sample and paced scan I/O for analog, digital and counter channels
//! - Pulse output timers, triggers and event callbacks
//! - Synchronous multi-type scans across analog, digital and counter channels
//!
//! The native library is only linked with the `hardware` feature. Without it
//! every façade runs against [`MockDriver`], an in-process model of a
//! multifunction device.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use uldaq::{
//!     daq_device_inventory, AInScanFlag, AiInputMode, DaqDevice, DaqDeviceDescriptor,
//!     FloatBuffer, InterfaceType, MockDriver, MockProfile, Range, ScanOption, WaitType,
//! };
//!
//! fn main() -> uldaq::Result<()> {
//!     // With the `hardware` feature, `get_daq_device_inventory` and
//!     // `DaqDevice::new` talk to libuldaq instead
//!     let descriptor =
//!         DaqDeviceDescriptor::new("USB-1808X", 0x13d, InterfaceType::USB, "01D97CFA");
//!     let driver =
//!         Arc::new(MockDriver::new().with_device(descriptor, MockProfile::multifunction()));
//!
//!     let devices = daq_device_inventory(driver.as_ref(), InterfaceType::ANY, 10)?;
//!     let Some(descriptor) = devices.first() else {
//!         println!("No DAQ device found");
//!         return Ok(());
//!     };
//!
//!     let device = DaqDevice::with_driver(driver.clone(), descriptor)?;
//!     device.connect()?;
//!
//!     if let Some(ai) = device.ai_device() {
//!         let buffer = FloatBuffer::new(4, 1000)?;
//!         let rate = ai.a_in_scan(
//!             0,
//!             3,
//!             AiInputMode::SingleEnded,
//!             Range::Bip10Volts,
//!             1000,
//!             1000.0,
//!             ScanOption::DEFAULTIO,
//!             AInScanFlag::empty(),
//!             &buffer,
//!         )?;
//!         println!("Scanning at {} Hz", rate);
//!         ai.scan_wait(WaitType::WaitUntilDone, 0, 5.0)?;
//!         println!("{:?}", &buffer.to_vec()[..4]);
//!     }
//!
//!     device.close()
//! }
//! ```

pub mod analog_input;
pub mod analog_output;
pub mod buffer;
pub mod constants;
pub mod counter;
pub mod daq_input;
pub mod daq_output;
pub mod device;
pub mod device_info;
pub mod digital_io;
pub mod driver;
pub mod enums;
pub mod error;
pub mod ffi;
pub mod mock;
#[cfg(feature = "hardware")]
pub mod native;
mod scan;
pub mod structures;
pub mod timer;
pub mod utils;

// Re-export main types at crate root
pub use analog_input::{AiConfig, AiDevice, AiInfo};
pub use analog_output::{AoDevice, AoInfo};
pub use buffer::{
    create_float_buffer, create_int_buffer, FloatBuffer, IntBuffer, Sample, ScanBuffer,
};
pub use counter::{CtrDevice, CtrInfo};
pub use daq_input::{DaqiDevice, DaqiInfo};
pub use daq_output::{DaqoDevice, DaqoInfo};
pub use device::{DaqDevice, EventCallbackArgs};
pub use device_info::{DaqDeviceConfig, DaqDeviceInfo, DevMemInfo, UlConfig};
pub use digital_io::{DioConfig, DioDevice, DioInfo};
pub use driver::{EventHandler, InfoTarget, ScanTarget, TriggerConfig, TriggerTarget, UlDriver};
pub use enums::*;
pub use error::{Result, UlError};
pub use ffi::DaqDeviceHandle;
pub use mock::{LifecycleCall, MockDriver, MockProfile};
#[cfg(feature = "hardware")]
pub use native::NativeDriver;
pub use structures::{
    AiQueueElement, CounterScanConfig, DaqDeviceDescriptor, DaqInChanDescriptor,
    DaqOutChanDescriptor, DioPortInfo, MemDescriptor, PulseOutResult, TransferStatus,
};
pub use timer::{TmrDevice, TmrInfo};
#[cfg(feature = "hardware")]
pub use utils::get_daq_device_inventory;
pub use utils::{daq_device_inventory, enum_mask_to_list};
