//! Analog Input Example
//!
//! Reads one sample from each of the first four analog input channels of
//! the first device found, ten times, using the first input mode and range
//! the device reports.

use std::thread;
use std::time::Duration;

use uldaq::{
    get_daq_device_inventory, AInFlag, AiInputMode, DaqDevice, InterfaceType, NativeDriver,
    UlDriver,
};

const CHANNELS: i32 = 4;
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
    println!("Using {}", descriptor);

    let device = DaqDevice::new(descriptor)?;
    let Some(ai) = device.ai_device() else {
        println!("{} has no analog input subsystem", descriptor.product_name);
        return Ok(());
    };

    device.connect()?;

    // Prefer single-ended inputs, which give the most channels
    let input_mode = if ai.info().num_chans_by_mode(AiInputMode::SingleEnded)? > 0 {
        AiInputMode::SingleEnded
    } else {
        AiInputMode::Differential
    };
    let Some(&range) = ai.info().ranges(input_mode)?.first() else {
        println!("No range available for {:?}", input_mode);
        return device.close();
    };
    let channels = CHANNELS.min(ai.info().num_chans_by_mode(input_mode)? as i32);
    println!("Input mode: {:?}, range: {:?}", input_mode, range);
    println!();

    for reading in 0..READINGS {
        let mut line = format!("{:>3}:", reading);
        for channel in 0..channels {
            let volts = ai.a_in(channel, input_mode, range, AInFlag::empty())?;
            line.push_str(&format!("  ch{} = {:+.6}", channel, volts));
        }
        println!("{}", line);
        thread::sleep(Duration::from_millis(500));
    }

    device.close()
}
