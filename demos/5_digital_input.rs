//! Digital Input Example
//!
//! Configures the first digital port of the first device for input and
//! prints its value once a second.

use std::thread;
use std::time::Duration;

use uldaq::{
    get_daq_device_inventory, DaqDevice, DigitalDirection, DigitalPortIoType, InterfaceType,
    NativeDriver, UlDriver,
};

const READINGS: usize = 10;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", NativeDriver::new().error_message(&e));
        std::process::exit(1);
    }
}

fn run() -> uldaq::Result<()> {
    let devices = get_daq_device_inventory(InterfaceType::ANY, None)?;
    let Some(descriptor) = devices.first() else {
        println!("No DAQ device found");
        return Ok(());
    };

    let device = DaqDevice::new(descriptor)?;
    let Some(dio) = device.dio_device() else {
        println!("{} has no digital I/O subsystem", descriptor.product_name);
        return Ok(());
    };

    device.connect()?;

    let Some(&port) = dio.info().port_types()?.first() else {
        println!("No digital port available");
        return device.close();
    };
    let port_info = dio.info().port_info(port)?;
    println!("Using {}", port_info);

    // Fixed-direction ports cannot be configured
    if matches!(
        port_info.port_io_type,
        DigitalPortIoType::Bidirectional | DigitalPortIoType::BitIo
    ) {
        dio.d_config_port(port, DigitalDirection::Input)?;
    }

    let width = port_info.number_of_bits as usize;
    for _ in 0..READINGS {
        let value = dio.d_in(port)?;
        println!("{:?} = 0x{:02x} ({:0width$b})", port, value, value, width = width);
        thread::sleep(Duration::from_secs(1));
    }

    device.close()
}
