//! End-to-end behaviour of the device façades against the mock driver

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uldaq::constants::*;
use uldaq::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn descriptor() -> DaqDeviceDescriptor {
    DaqDeviceDescriptor::new("USB-1808X", 0x13d, InterfaceType::USB, "01D97CFA")
}

fn open() -> (Arc<MockDriver>, DaqDevice) {
    init_logging();
    let driver = Arc::new(
        MockDriver::new().with_device(descriptor(), MockProfile::multifunction()),
    );
    let device = DaqDevice::with_driver(driver.clone(), &descriptor()).unwrap();
    device.connect().unwrap();
    (driver, device)
}

// ============================================================================
// Capability queries
// ============================================================================

#[test]
fn test_declared_info_items_answer() {
    let (_driver, device) = open();
    let ai = device.ai_device().unwrap().info();
    assert!(ai.resolution().is_ok());
    assert!(ai.num_chans().is_ok());
    assert!(ai.num_chans_by_mode(AiInputMode::Differential).is_ok());
    assert!(ai.chan_types().is_ok());
    assert!(ai.scan_options().is_ok());
    assert!(ai.has_pacer().is_ok());
    assert!(ai.ranges(AiInputMode::SingleEnded).is_ok());
    assert!(ai.trigger_types().is_ok());
    assert!(ai.fifo_size().is_ok());
    assert!(ai.min_scan_rate().is_ok());
    assert!(ai.max_scan_rate().is_ok());
    assert!(ai.max_throughput().is_ok());

    let ctr = device.ctr_device().unwrap().info();
    assert!(ctr.num_ctrs().is_ok());
    assert!(ctr.register_types().is_ok());

    let tmr = device.tmr_device().unwrap().info();
    assert!(tmr.num_tmrs().is_ok());
}

#[test]
fn test_undeclared_info_items_fail() {
    let (driver, device) = open();
    let handle = device.handle().unwrap();
    assert_eq!(
        driver.get_info(handle, InfoTarget::Ai, 999, 0),
        Err(UlError::BadInfoItem)
    );
    assert_eq!(
        driver.get_info_dbl(handle, InfoTarget::Ao, AI_INFO_MAX_BURST_RATE, 0),
        Err(UlError::BadInfoItem)
    );
    // The multifunction profile has no burst mode
    assert_eq!(
        device.ai_device().unwrap().info().max_burst_rate(),
        Err(UlError::BadInfoItem)
    );
}

#[test]
fn test_profile_without_an_item() {
    init_logging();
    let profile = MockProfile::multifunction().without_info(InfoTarget::Ai, AI_INFO_FIFO_SIZE, 0);
    let driver = Arc::new(MockDriver::new().with_device(descriptor(), profile));
    let device = DaqDevice::with_driver(driver, &descriptor()).unwrap();
    device.connect().unwrap();
    assert_eq!(
        device.ai_device().unwrap().info().fifo_size(),
        Err(UlError::BadInfoItem)
    );
}

#[test]
fn test_mask_expansion() {
    // Bits 1 and 4 of a five flag type
    let flags = DaqEventType::ON_INPUT_SCAN_ERROR | DaqEventType::ON_END_OF_OUTPUT_SCAN;
    let mask = i64::from(flags.bits());
    assert_eq!(
        enum_mask_to_list::<DaqEventType>(mask),
        vec![DaqEventType::ON_INPUT_SCAN_ERROR, DaqEventType::ON_END_OF_OUTPUT_SCAN]
    );
    assert!(enum_mask_to_list::<DaqEventType>(0).is_empty());
}

// ============================================================================
// Handle lifecycle
// ============================================================================

#[test]
fn test_release_invalidates_everything() {
    let (driver, device) = open();
    let handle = device.handle().unwrap();
    device.release().unwrap();
    assert!(driver.is_released(handle));

    assert_eq!(device.handle(), Err(UlError::BadDevHandle));
    assert_eq!(device.connect(), Err(UlError::BadDevHandle));
    assert_eq!(device.is_connected(), Err(UlError::BadDevHandle));
    assert_eq!(device.release(), Err(UlError::BadDevHandle));

    let ai = device.ai_device().unwrap();
    assert_eq!(
        ai.a_in(0, AiInputMode::SingleEnded, Range::Bip10Volts, AInFlag::empty()),
        Err(UlError::BadDevHandle)
    );
    assert_eq!(ai.info().num_chans(), Err(UlError::BadDevHandle));
    assert_eq!(
        device.dio_device().unwrap().d_in(DigitalPortType::FirstPortA),
        Err(UlError::BadDevHandle)
    );
    // Closing a released device has nothing left to do
    assert!(device.close().is_ok());
}

fn start_continuous_ai(device: &DaqDevice, buffer: &FloatBuffer) {
    device
        .ai_device()
        .unwrap()
        .a_in_scan(
            0,
            0,
            AiInputMode::SingleEnded,
            Range::Bip10Volts,
            100,
            1000.0,
            ScanOption::CONTINUOUS,
            AInScanFlag::empty(),
            buffer,
        )
        .unwrap();
}

#[test]
fn test_drop_tears_down_running_scan() {
    let (driver, device) = open();
    let handle = device.handle().unwrap();
    let buffer = FloatBuffer::new(1, 100).unwrap();
    start_continuous_ai(&device, &buffer);
    drop(device);

    assert!(driver.is_released(handle));
    assert_eq!(
        driver.lifecycle_calls(handle),
        vec![
            LifecycleCall::ScanStop(ScanTarget::AIn),
            LifecycleCall::Disconnect {
                scans_running: false
            },
            LifecycleCall::Release,
        ]
    );
}

#[test]
fn test_close_stops_every_scan_before_disconnecting() {
    let (driver, device) = open();
    let handle = device.handle().unwrap();
    let input = FloatBuffer::new(1, 100).unwrap();
    let output = FloatBuffer::new(1, 100).unwrap();
    start_continuous_ai(&device, &input);
    device
        .ao_device()
        .unwrap()
        .a_out_scan(
            0,
            0,
            Range::Bip10Volts,
            100,
            1000.0,
            ScanOption::CONTINUOUS,
            AOutScanFlag::empty(),
            &output,
        )
        .unwrap();

    device.close().unwrap();

    let calls = driver.lifecycle_calls(handle);
    assert_eq!(calls.len(), 4);
    assert!(calls[..2].contains(&LifecycleCall::ScanStop(ScanTarget::AIn)));
    assert!(calls[..2].contains(&LifecycleCall::ScanStop(ScanTarget::AOut)));
    assert_eq!(
        calls[2],
        LifecycleCall::Disconnect {
            scans_running: false
        }
    );
    assert_eq!(calls[3], LifecycleCall::Release);
}

#[test]
fn test_close_of_idle_device_skips_scan_stops() {
    let (driver, device) = open();
    let handle = device.handle().unwrap();
    device.close().unwrap();
    assert_eq!(
        driver.lifecycle_calls(handle),
        vec![
            LifecycleCall::Disconnect {
                scans_running: false
            },
            LifecycleCall::Release,
        ]
    );
}

#[test]
fn test_unplugged_device_reports_connection_error() {
    let (driver, device) = open();
    driver.unplug_device(device.handle().unwrap()).unwrap();
    let err = device
        .ai_device()
        .unwrap()
        .a_in(0, AiInputMode::SingleEnded, Range::Bip10Volts, AInFlag::empty())
        .unwrap_err();
    assert!(err.is_connection_error());
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_round_trip() {
    let (_driver, device) = open();
    let config = device.ai_device().unwrap().config();

    config.set_chan_slope(3, 2.5).unwrap();
    assert_eq!(config.chan_slope(3), Ok(2.5));
    config.set_chan_offset(3, -0.125).unwrap();
    assert_eq!(config.chan_offset(3), Ok(-0.125));
    config.set_temp_unit(TempUnit::Kelvin).unwrap();
    assert_eq!(config.temp_unit(), Ok(TempUnit::Kelvin));
    config.set_auto_zero_mode(AutoZeroMode::Once).unwrap();
    assert_eq!(config.auto_zero_mode(), Ok(AutoZeroMode::Once));

    assert_eq!(
        config.set_chan_sensor_sensitivity(0, 0.0),
        Err(UlError::BadSensorSensitivity)
    );
}

#[test]
fn test_library_config_round_trip() {
    init_logging();
    let driver = Arc::new(MockDriver::new());
    let config = UlConfig::new(driver);
    config.set_usb_transfer_priority(42).unwrap();
    assert_eq!(config.usb_transfer_priority(), Ok(42));
    assert_eq!(config.set_usb_transfer_priority(100), Err(UlError::BadConfigVal));
}

// ============================================================================
// Scans
// ============================================================================

#[test]
fn test_continuous_scan_rate_and_status() {
    let (_driver, device) = open();
    let ai = device.ai_device().unwrap();
    let buffer = FloatBuffer::new(4, 10_000).unwrap();
    let rate = ai
        .a_in_scan(
            0,
            3,
            AiInputMode::SingleEnded,
            Range::Bip10Volts,
            10_000,
            1000.0,
            ScanOption::CONTINUOUS,
            AInScanFlag::empty(),
            &buffer,
        )
        .unwrap();

    let info = ai.info();
    assert!(rate >= info.min_scan_rate().unwrap());
    assert!(rate <= info.max_scan_rate().unwrap());
    for _ in 0..3 {
        assert_eq!(ai.scan_status().unwrap().0, ScanStatus::Running);
    }

    ai.scan_stop().unwrap();
    assert_eq!(ai.scan_status().unwrap().0, ScanStatus::Idle);
}

#[test]
fn test_second_scan_is_rejected_until_stopped() {
    let (_driver, device) = open();
    let ai = device.ai_device().unwrap();
    let start = |buffer: &FloatBuffer| {
        ai.a_in_scan(
            0,
            1,
            AiInputMode::SingleEnded,
            Range::Bip5Volts,
            100,
            500.0,
            ScanOption::CONTINUOUS,
            AInScanFlag::empty(),
            buffer,
        )
    };

    let first = FloatBuffer::new(2, 100).unwrap();
    start(&first).unwrap();
    let second = FloatBuffer::new(2, 100).unwrap();
    assert_eq!(start(&second), Err(UlError::AlreadyActive));
    // The running scan keeps its own buffer
    assert!(ai.scan_buffer().unwrap().shares_storage(&first));

    ai.scan_stop().unwrap();
    assert_eq!(ai.scan_status().unwrap().0, ScanStatus::Idle);
    assert!(start(&second).is_ok());
}

#[test]
fn test_latest_scan_follows_write_index() {
    let (driver, device) = open();
    let handle = device.handle().unwrap();
    let ai = device.ai_device().unwrap();
    let buffer = FloatBuffer::new(2, 5).unwrap();
    ai.a_in_scan(
        0,
        1,
        AiInputMode::SingleEnded,
        Range::Bip10Volts,
        5,
        100.0,
        ScanOption::CONTINUOUS,
        AInScanFlag::empty(),
        &buffer,
    )
    .unwrap();

    for scan in 0..7 {
        driver.set_analog_input(handle, 0, f64::from(scan)).unwrap();
        driver.set_analog_input(handle, 1, -f64::from(scan)).unwrap();
        driver.advance_scan(handle, ScanTarget::AIn, 1).unwrap();
    }

    let (_, status) = ai.scan_status().unwrap();
    assert_eq!(status.current_scan_count, 7);
    assert_eq!(buffer.latest_scan(&status), Some(vec![6.0, -6.0]));
    assert_eq!(
        buffer.recent(&status, 3),
        vec![vec![4.0, -4.0], vec![5.0, -5.0], vec![6.0, -6.0]]
    );
}

#[test]
fn test_trigger_type_must_be_supported() {
    let (_driver, device) = open();
    let ai = device.ai_device().unwrap();
    assert!(ai.set_trigger(TriggerType::RISING, 0, 1.5, 0.1, 0).is_ok());
    assert_eq!(
        ai.set_trigger(TriggerType::GATE_HIGH, 0, 0.0, 0.0, 0),
        Err(UlError::BadTrigType)
    );
    let dio = device.dio_device().unwrap();
    assert_eq!(
        dio.d_in_set_trigger(TriggerType::RISING, 0, 0.0, 0.0, 0),
        Err(UlError::BadTrigType)
    );
}

// ============================================================================
// Events
// ============================================================================

#[test]
fn test_data_available_fires_once_per_threshold() {
    let (driver, device) = open();
    let handle = device.handle().unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::clone(&calls);
    device
        .enable_event(
            DaqEventType::ON_DATA_AVAILABLE,
            1000,
            move |args: EventCallbackArgs<'_, &'static str>| {
                seen.lock()
                    .push((args.event_type, args.event_data, *args.user_data));
            },
            "scan-0",
        )
        .unwrap();

    let ai = device.ai_device().unwrap();
    let buffer = FloatBuffer::new(4, 10_000).unwrap();
    ai.a_in_scan(
        0,
        3,
        AiInputMode::SingleEnded,
        Range::Bip10Volts,
        10_000,
        1000.0,
        ScanOption::CONTINUOUS,
        AInScanFlag::empty(),
        &buffer,
    )
    .unwrap();

    driver.advance_scan(handle, ScanTarget::AIn, 999).unwrap();
    assert!(calls.lock().is_empty());
    driver.advance_scan(handle, ScanTarget::AIn, 1).unwrap();
    assert_eq!(
        *calls.lock(),
        vec![(DaqEventType::ON_DATA_AVAILABLE, 4000, "scan-0")]
    );
    ai.scan_stop().unwrap();
}

#[test]
fn test_event_binding_is_exclusive() {
    let (driver, device) = open();
    let handle = device.handle().unwrap();
    let count = Arc::new(AtomicUsize::new(0));

    let hits = Arc::clone(&count);
    let kinds = DaqEventType::ON_END_OF_INPUT_SCAN | DaqEventType::ON_INPUT_SCAN_ERROR;
    device
        .enable_event(
            kinds,
            0,
            move |_args: EventCallbackArgs<'_, ()>| {
                hits.fetch_add(1, Ordering::SeqCst);
            },
            (),
        )
        .unwrap();
    assert_eq!(device.enabled_events(), kinds);
    assert_eq!(driver.enabled_events(handle), Ok(kinds));

    assert_eq!(
        device.enable_event(
            DaqEventType::ON_INPUT_SCAN_ERROR,
            0,
            |_: EventCallbackArgs<'_, ()>| {},
            ()
        ),
        Err(UlError::EventAlreadyEnabled)
    );

    device.disable_event(kinds).unwrap();
    assert_eq!(device.enabled_events(), DaqEventType::empty());
    assert!(device
        .enable_event(DaqEventType::ON_INPUT_SCAN_ERROR, 0, |_: EventCallbackArgs<'_, ()>| {}, ())
        .is_ok());
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_scan_error_event_carries_code() {
    let (driver, device) = open();
    let handle = device.handle().unwrap();
    let codes = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::clone(&codes);
    device
        .enable_event(
            DaqEventType::ON_INPUT_SCAN_ERROR,
            0,
            move |args: EventCallbackArgs<'_, ()>| seen.lock().push(args.event_data),
            (),
        )
        .unwrap();

    let ai = device.ai_device().unwrap();
    let buffer = FloatBuffer::new(1, 100).unwrap();
    ai.a_in_scan(
        0,
        0,
        AiInputMode::SingleEnded,
        Range::Bip10Volts,
        100,
        1000.0,
        ScanOption::CONTINUOUS,
        AInScanFlag::empty(),
        &buffer,
    )
    .unwrap();
    driver.fail_scan(handle, ScanTarget::AIn, UlError::Overrun).unwrap();

    let expected = UlError::Overrun.code().map(|c| c as u64);
    assert_eq!(codes.lock().first().copied(), expected);
    assert_eq!(ai.scan_status().unwrap().0, ScanStatus::Idle);
}
