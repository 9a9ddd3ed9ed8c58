//! DAQ Input Scan With Trigger Example
//!
//! Builds a synchronous scan from whatever the device offers (two analog
//! channels, then a digital port or a counter), arms it on the first
//! supported trigger type and prints the newest values while it runs.

use std::thread;
use std::time::{Duration, Instant};

use uldaq::{
    get_daq_device_inventory, AiInputMode, DaqDevice, DaqInChanDescriptor, DaqInChanType,
    DaqInScanFlag, FloatBuffer, InterfaceType, NativeDriver, Range, ScanOption, ScanStatus,
    UlDriver,
};

const SAMPLES_PER_CHANNEL: usize = 10_000;
const RATE: f64 = 1000.0;
const RUN_TIME: Duration = Duration::from_secs(10);

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
    let Some(daqi) = device.daqi_device() else {
        println!("{} has no DAQ input subsystem", descriptor.product_name);
        return Ok(());
    };
    let Some(&trigger) = daqi.info().trigger_types()?.first() else {
        println!("{} has no external trigger", descriptor.product_name);
        return Ok(());
    };

    device.connect()?;

    let chan_types = daqi.info().chan_types()?;
    let mut channels = Vec::new();
    if chan_types.contains(&DaqInChanType::ANALOG_SE) {
        if let Some(ai) = device.ai_device() {
            if let Some(&range) = ai.info().ranges(AiInputMode::SingleEnded)?.first() {
                channels.extend(
                    (0..2).map(|ch| DaqInChanDescriptor::new(ch, DaqInChanType::ANALOG_SE, range)),
                );
            }
        }
    }
    if chan_types.contains(&DaqInChanType::DIGITAL) {
        if let Some(dio) = device.dio_device() {
            if let Some(&port) = dio.info().port_types()?.first() {
                channels.push(DaqInChanDescriptor::digital(port));
            }
        }
    } else if chan_types.contains(&DaqInChanType::CTR32) {
        channels.push(DaqInChanDescriptor::new(0, DaqInChanType::CTR32, Range::Bip10Volts));
    }
    if channels.is_empty() {
        println!("No channel type usable for a DAQ input scan");
        return device.close();
    }

    println!("Scan channels:");
    for (i, channel) in channels.iter().enumerate() {
        println!("  {}: {:?} {}", i, channel.chan_type, channel.channel);
    }
    println!("Trigger type: {:?}", trigger);

    // An external trigger ignores the trigger channel
    let trigger_channel = channels[0];
    daqi.set_trigger(trigger, &trigger_channel, 0.0, 0.0, 0)?;

    let buffer = FloatBuffer::new(channels.len(), SAMPLES_PER_CHANNEL)?;
    let rate = daqi.daq_in_scan(
        &channels,
        SAMPLES_PER_CHANNEL,
        RATE,
        ScanOption::CONTINUOUS | ScanOption::EXTTRIGGER,
        DaqInScanFlag::empty(),
        &buffer,
    )?;
    println!("Waiting for trigger, scan rate {:.3} Hz", rate);

    let started = Instant::now();
    while started.elapsed() < RUN_TIME {
        let (status, transfer) = daqi.scan_status()?;
        if status != ScanStatus::Running {
            break;
        }
        if let Some(latest) = buffer.latest_scan(&transfer) {
            let values: Vec<String> = channels
                .iter()
                .zip(latest)
                .map(|(channel, value)| {
                    let analog = DaqInChanType::ANALOG_SE | DaqInChanType::ANALOG_DIFF;
                    if channel.chan_type.intersects(analog) {
                        format!("{:+.6}", value)
                    } else {
                        format!("{}", value as u64)
                    }
                })
                .collect();
            println!("{}  [{}]", transfer, values.join(", "));
        }
        thread::sleep(Duration::from_millis(100));
    }

    daqi.scan_stop()?;
    device.close()
}
