//! Analog Input Scan Events Example
//!
//! Runs a finite scan and lets the driver report progress through event
//! callbacks instead of polling. The data-available callback fires every
//! `EVENT_SAMPLES` samples per channel and prints the newest scan.

use std::sync::Arc;

use uldaq::{
    get_daq_device_inventory, AInScanFlag, AiInputMode, DaqDevice, DaqEventType, EventCallbackArgs,
    FloatBuffer, InterfaceType, NativeDriver, Range, ScanOption, UlDriver, WaitType,
};

const CHANNELS: usize = 2;
const SAMPLES_PER_CHANNEL: usize = 10_000;
const EVENT_SAMPLES: u64 = 1000;
const RATE: f64 = 1000.0;

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
    let supported = device.info().event_types()?;
    if !supported.contains(&DaqEventType::ON_DATA_AVAILABLE) {
        println!("{} does not report scan events", descriptor.product_name);
        return Ok(());
    }

    device.connect()?;

    let buffer = Arc::new(FloatBuffer::new(CHANNELS, SAMPLES_PER_CHANNEL)?);
    let events = DaqEventType::ON_DATA_AVAILABLE
        | DaqEventType::ON_INPUT_SCAN_ERROR
        | DaqEventType::ON_END_OF_INPUT_SCAN;
    device.enable_event(events, EVENT_SAMPLES, on_event, Arc::clone(&buffer))?;

    let rate = ai.a_in_scan(
        0,
        CHANNELS as i32 - 1,
        AiInputMode::SingleEnded,
        Range::Bip10Volts,
        SAMPLES_PER_CHANNEL,
        RATE,
        ScanOption::DEFAULTIO,
        AInScanFlag::empty(),
        &buffer,
    )?;
    println!("Scanning at {:.3} Hz", rate);

    let timeout = SAMPLES_PER_CHANNEL as f64 / rate + 5.0;
    ai.scan_wait(WaitType::WaitUntilDone, 0, timeout)?;

    device.disable_event(events)?;
    device.close()
}

fn on_event(args: EventCallbackArgs<'_, Arc<FloatBuffer>>) {
    if args.event_type == DaqEventType::ON_DATA_AVAILABLE {
        let total = args.event_data as usize;
        let scans = total / CHANNELS;
        // Index of the first sample of the newest complete scan
        let start = ((scans.max(1) - 1) % SAMPLES_PER_CHANNEL) * CHANNELS;
        let latest: Vec<f64> = (0..CHANNELS)
            .filter_map(|ch| args.user_data.get(start + ch))
            .collect();
        println!("{:>8} samples  {:?}", total, latest);
    } else if args.event_type == DaqEventType::ON_INPUT_SCAN_ERROR {
        eprintln!("Scan error, code {}", args.event_data);
    } else if args.event_type == DaqEventType::ON_END_OF_INPUT_SCAN {
        println!("Scan complete, {} samples", args.event_data);
    }
}
