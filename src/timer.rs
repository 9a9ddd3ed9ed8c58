//! Timer (pulse output) subsystem

use std::sync::Arc;

use log::debug;

use crate::constants::*;
use crate::device::DeviceContext;
use crate::driver::{InfoTarget, PulseOutRequest, TriggerTarget};
use crate::enums::{PulseOutOption, TimerType, TmrIdleState, TmrStatus, TriggerType};
use crate::error::Result;
use crate::structures::PulseOutResult;

/// Timer subsystem of a [`crate::DaqDevice`]
pub struct TmrDevice {
    ctx: Arc<DeviceContext>,
    info: TmrInfo,
}

impl TmrDevice {
    pub(crate) fn new(ctx: Arc<DeviceContext>) -> Self {
        Self {
            info: TmrInfo {
                ctx: Arc::clone(&ctx),
            },
            ctx,
        }
    }

    pub fn info(&self) -> &TmrInfo {
        &self.info
    }

    /// Start a pulse train on `timer`
    ///
    /// `duty_cycle` is the high fraction of each period (0 < d < 1) and a
    /// `pulse_count` of zero runs until [`TmrDevice::pulse_out_stop`]. The
    /// result holds the timing the hardware could actually produce.
    #[allow(clippy::too_many_arguments)]
    pub fn pulse_out_start(
        &self,
        timer: i32,
        frequency: f64,
        duty_cycle: f64,
        pulse_count: u64,
        initial_delay: f64,
        idle_state: TmrIdleState,
        options: PulseOutOption,
    ) -> Result<PulseOutResult> {
        let request = PulseOutRequest {
            frequency,
            duty_cycle,
            pulse_count,
            initial_delay,
            idle_state,
            options,
        };
        let result = self
            .ctx
            .driver()
            .pulse_out_start(self.ctx.handle()?, timer, &request)?;
        debug!(
            "Timer {} started at {} Hz, duty cycle {}",
            timer, result.frequency, result.duty_cycle
        );
        Ok(result)
    }

    pub fn pulse_out_stop(&self, timer: i32) -> Result<()> {
        self.ctx.driver().pulse_out_stop(self.ctx.handle()?, timer)
    }

    pub fn pulse_out_status(&self, timer: i32) -> Result<TmrStatus> {
        self.ctx
            .driver()
            .pulse_out_status(self.ctx.handle()?, timer)
    }

    /// Configure the trigger used with `PulseOutOption::EXTTRIGGER`
    pub fn set_trigger(
        &self,
        trig_type: TriggerType,
        trigger_channel: i32,
        level: f64,
        variance: f64,
        retrigger_count: u32,
    ) -> Result<()> {
        self.ctx.set_trigger(
            TriggerTarget::Tmr,
            trigger_channel,
            trig_type,
            level,
            variance,
            retrigger_count,
        )
    }
}

/// Timer capabilities
pub struct TmrInfo {
    ctx: Arc<DeviceContext>,
}

impl TmrInfo {
    pub fn num_tmrs(&self) -> Result<usize> {
        self.ctx.info_count(InfoTarget::Tmr, TMR_INFO_NUM_TMRS, 0)
    }

    pub fn timer_type(&self, timer: u32) -> Result<TimerType> {
        TimerType::from_raw(self.ctx.info(InfoTarget::Tmr, TMR_INFO_TYPE, timer)?)
    }

    pub fn min_frequency(&self, timer: u32) -> Result<f64> {
        self.ctx.info_dbl(InfoTarget::Tmr, TMR_INFO_MIN_FREQ, timer)
    }

    pub fn max_frequency(&self, timer: u32) -> Result<f64> {
        self.ctx.info_dbl(InfoTarget::Tmr, TMR_INFO_MAX_FREQ, timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DaqDevice;
    use crate::enums::InterfaceType;
    use crate::error::UlError;
    use crate::mock::{MockDriver, MockProfile};
    use crate::structures::DaqDeviceDescriptor;

    fn open() -> DaqDevice {
        let descriptor =
            DaqDeviceDescriptor::new("USB-1808X", 0x13d, InterfaceType::USB, "01D97CFA");
        let driver = Arc::new(
            MockDriver::new().with_device(descriptor.clone(), MockProfile::multifunction()),
        );
        let device = DaqDevice::with_driver(driver, &descriptor).unwrap();
        device.connect().unwrap();
        device
    }

    #[test]
    fn test_pulse_out_snaps_to_clock() {
        let device = open();
        let tmr = device.tmr_device().unwrap();
        let result = tmr
            .pulse_out_start(
                0,
                3_000_000.0,
                0.5,
                0,
                0.0,
                TmrIdleState::Low,
                PulseOutOption::DEFAULT,
            )
            .unwrap();
        // 64 MHz / 21
        assert!((result.frequency - 3_047_619.05).abs() < 0.01);
        assert!(result.duty_cycle > 0.0 && result.duty_cycle < 1.0);
        assert_eq!(tmr.pulse_out_status(0), Ok(TmrStatus::Running));
        assert_eq!(
            tmr.pulse_out_start(0, 1000.0, 0.5, 0, 0.0, TmrIdleState::Low, PulseOutOption::DEFAULT),
            Err(UlError::AlreadyActive)
        );

        tmr.pulse_out_stop(0).unwrap();
        assert_eq!(tmr.pulse_out_status(0), Ok(TmrStatus::Idle));
    }

    #[test]
    fn test_pulse_out_rejects_bad_timing() {
        let device = open();
        let tmr = device.tmr_device().unwrap();
        let start = |frequency, duty_cycle| {
            tmr.pulse_out_start(
                1,
                frequency,
                duty_cycle,
                10,
                0.0,
                TmrIdleState::High,
                PulseOutOption::DEFAULT,
            )
        };
        assert_eq!(start(1.0e9, 0.5), Err(UlError::BadFrequency));
        assert_eq!(start(1000.0, 1.0), Err(UlError::BadDutyCycle));
        assert_eq!(tmr.pulse_out_status(2), Err(UlError::BadTmr));
    }

    #[test]
    fn test_info() {
        let device = open();
        let info = device.tmr_device().unwrap().info();
        assert_eq!(info.num_tmrs(), Ok(2));
        assert_eq!(info.timer_type(1), Ok(TimerType::Advanced));
        assert_eq!(info.max_frequency(0), Ok(32_000_000.0));
        assert_eq!(info.timer_type(5), Err(UlError::BadInfoItem));
    }
}
