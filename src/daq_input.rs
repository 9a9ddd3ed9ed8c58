//! Synchronous multi-type input
//!
//! A DAQ input scan samples analog channels, digital ports and counters
//! on one pacer. Each tick writes one sample per descriptor into the
//! buffer, in descriptor order.

use std::sync::Arc;

use crate::buffer::FloatBuffer;
use crate::constants::*;
use crate::device::DeviceContext;
use crate::driver::{InfoTarget, ScanTarget, TriggerConfig};
use crate::enums::{DaqInChanType, DaqInScanFlag, ScanOption, ScanStatus, TriggerType, WaitType};
use crate::error::Result;
use crate::scan::{sample_count, ScanSlot};
use crate::structures::{DaqInChanDescriptor, TransferStatus};

/// Synchronous input subsystem of a [`crate::DaqDevice`]
pub struct DaqiDevice {
    ctx: Arc<DeviceContext>,
    info: DaqiInfo,
    scan: ScanSlot<f64>,
}

impl DaqiDevice {
    pub(crate) fn new(ctx: Arc<DeviceContext>) -> Self {
        Self {
            info: DaqiInfo {
                ctx: Arc::clone(&ctx),
            },
            ctx,
            scan: ScanSlot::new(ScanTarget::DaqIn),
        }
    }

    pub fn info(&self) -> &DaqiInfo {
        &self.info
    }

    /// Scan `channels` in lockstep into `data`
    ///
    /// Column `i` of every scan holds `channels[i]`. Digital and counter
    /// values are stored as whole numbers. Returns the actual rate.
    pub fn daq_in_scan(
        &self,
        channels: &[DaqInChanDescriptor],
        samples_per_channel: usize,
        rate: f64,
        options: ScanOption,
        flags: DaqInScanFlag,
        data: &FloatBuffer,
    ) -> Result<f64> {
        let samples_per_channel = sample_count(samples_per_channel)?;
        self.scan.start(&self.ctx, data, |driver, handle| {
            driver.daq_in_scan(
                handle,
                channels,
                samples_per_channel,
                rate,
                options,
                flags,
                data,
            )
        })
    }

    /// Configure the trigger; `trigger_channel` names the signal it watches
    pub fn set_trigger(
        &self,
        trig_type: TriggerType,
        trigger_channel: &DaqInChanDescriptor,
        level: f64,
        variance: f64,
        retrigger_sample_count: u32,
    ) -> Result<()> {
        let config = TriggerConfig {
            trig_type,
            level,
            variance,
            retrigger_sample_count,
        };
        self.ctx
            .driver()
            .daq_in_set_trigger(self.ctx.handle()?, trigger_channel, &config)
    }

    pub fn scan_status(&self) -> Result<(ScanStatus, TransferStatus)> {
        self.scan.status(&self.ctx)
    }

    pub fn scan_stop(&self) -> Result<()> {
        self.scan.stop(&self.ctx)
    }

    pub fn scan_wait(&self, wait_type: WaitType, wait_param: i64, timeout: f64) -> Result<()> {
        self.scan.wait(&self.ctx, wait_type, wait_param, timeout)
    }

    pub fn scan_buffer(&self) -> Option<FloatBuffer> {
        self.scan.buffer()
    }
}

/// Synchronous input capabilities
pub struct DaqiInfo {
    ctx: Arc<DeviceContext>,
}

impl DaqiInfo {
    fn dbl(&self, item: i32) -> Result<f64> {
        self.ctx.info_dbl(InfoTarget::DaqI, item, 0)
    }

    /// Channel types a descriptor may use
    pub fn chan_types(&self) -> Result<Vec<DaqInChanType>> {
        self.ctx.info_list(InfoTarget::DaqI, DAQI_INFO_CHAN_TYPES, 0)
    }

    pub fn scan_options(&self) -> Result<Vec<ScanOption>> {
        self.ctx.info_list(InfoTarget::DaqI, DAQI_INFO_SCAN_OPTIONS, 0)
    }

    pub fn trigger_types(&self) -> Result<Vec<TriggerType>> {
        self.ctx.info_list(InfoTarget::DaqI, DAQI_INFO_TRIG_TYPES, 0)
    }

    pub fn fifo_size(&self) -> Result<usize> {
        self.ctx.info_count(InfoTarget::DaqI, DAQI_INFO_FIFO_SIZE, 0)
    }

    pub fn min_scan_rate(&self) -> Result<f64> {
        self.dbl(DAQI_INFO_MIN_SCAN_RATE)
    }

    pub fn max_scan_rate(&self) -> Result<f64> {
        self.dbl(DAQI_INFO_MAX_SCAN_RATE)
    }

    pub fn max_throughput(&self) -> Result<f64> {
        self.dbl(DAQI_INFO_MAX_THROUGHPUT)
    }
}
