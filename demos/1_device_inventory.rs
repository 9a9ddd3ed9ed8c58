//! Device Inventory Example
//!
//! Lists every DAQ device the native driver can see and prints what each
//! one supports. Devices are connected only long enough to read their
//! firmware versions.

use uldaq::{
    get_daq_device_inventory, DaqDevice, DevVersionType, InterfaceType, NativeDriver, UlConfig,
    UlDriver,
};

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", NativeDriver::new().error_message(&e));
        std::process::exit(1);
    }
}

fn run() -> uldaq::Result<()> {
    println!("{}", "=".repeat(60));
    println!("uldaq device inventory");
    println!("{}", "=".repeat(60));
    println!("Library version: {}", UlConfig::native().version()?);
    println!();

    let devices = get_daq_device_inventory(InterfaceType::ANY, None)?;
    if devices.is_empty() {
        println!("No DAQ device found");
        return Ok(());
    }
    println!("Found {} DAQ device(s)", devices.len());

    for descriptor in &devices {
        println!();
        println!("{}", "-".repeat(60));
        println!("{}", descriptor);
        println!("{}", "-".repeat(60));

        let device = DaqDevice::new(descriptor)?;
        let info = device.info();
        println!("  Analog input:  {}", info.has_ai_device()?);
        println!("  Analog output: {}", info.has_ao_device()?);
        println!("  Digital I/O:   {}", info.has_dio_device()?);
        println!("  Counters:      {}", info.has_ctr_device()?);
        println!("  Timers:        {}", info.has_tmr_device()?);
        println!("  DAQ input:     {}", info.has_daqi_device()?);
        println!("  DAQ output:    {}", info.has_daqo_device()?);
        println!("  Events:        {:?}", info.event_types()?);
        println!("  Memory:        {:?}", info.mem_info().mem_regions()?);

        device.connect()?;
        for kind in [DevVersionType::FwMain, DevVersionType::Fpga] {
            match device.config().version(kind) {
                Ok(version) => println!("  {:?} version: {}", kind, version),
                Err(e) => println!("  {:?} version: unavailable ({})", kind, e),
            }
        }
        device.close()?;
    }

    Ok(())
}
