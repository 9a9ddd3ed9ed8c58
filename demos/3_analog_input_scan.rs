//! Analog Input Scan Example
//!
//! Starts a continuous, hardware paced scan of the first four analog input
//! channels and prints the latest values for a few seconds. The rate used
//! for timing is the one the driver returns, not the one requested.

use std::thread;
use std::time::{Duration, Instant};

use uldaq::{
    get_daq_device_inventory, AInScanFlag, AiInputMode, DaqDevice, FloatBuffer, InterfaceType,
    NativeDriver, ScanOption, ScanStatus, UlDriver,
};

const SAMPLES_PER_CHANNEL: usize = 10_000;
const RATE: f64 = 1000.0;
const RUN_TIME: Duration = Duration::from_secs(5);

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
    let Some(ai) = device.ai_device() else {
        println!("{} has no analog input subsystem", descriptor.product_name);
        return Ok(());
    };
    if !ai.info().has_pacer()? {
        println!("{} does not support hardware paced input", descriptor.product_name);
        return Ok(());
    }

    device.connect()?;

    let input_mode = AiInputMode::SingleEnded;
    let Some(&range) = ai.info().ranges(input_mode)?.first() else {
        println!("No range available for {:?}", input_mode);
        return device.close();
    };
    let high_channel = (ai.info().num_chans_by_mode(input_mode)?.min(4) as i32) - 1;
    let channels = (high_channel + 1) as usize;

    let buffer = FloatBuffer::new(channels, SAMPLES_PER_CHANNEL)?;
    let rate = ai.a_in_scan(
        0,
        high_channel,
        input_mode,
        range,
        SAMPLES_PER_CHANNEL,
        RATE,
        ScanOption::CONTINUOUS,
        AInScanFlag::empty(),
        &buffer,
    )?;
    println!("{} scanning {} channel(s) at {:.3} Hz", descriptor, channels, rate);

    let started = Instant::now();
    while started.elapsed() < RUN_TIME {
        let (status, transfer) = ai.scan_status()?;
        if status != ScanStatus::Running {
            println!("Scan stopped unexpectedly");
            break;
        }
        if let Some(latest) = buffer.latest_scan(&transfer) {
            println!("{}  {:?}", transfer, latest);
        }
        thread::sleep(Duration::from_millis(250));
    }

    ai.scan_stop()?;
    device.close()
}
