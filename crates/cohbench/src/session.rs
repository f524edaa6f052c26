//! Hardware session
//!
//! Opens the shared window and the TTC register block through `/dev/mem`
//! and wraps them in a Controller. The Controller's view is uncached, so
//! its cache maintenance is a no-op; the Responder firmware does its own.

use std::sync::Arc;
use std::time::Duration;

use cohbench_core::{CohError, Controller, SharedAccess};
use cohbench_runtime::{
    calibrate, BenchConfig, Calibration, ConfigError, MapError, Mapping, MmioCounter, UncachedPort,
};
use thiserror::Error;

/// Host time spent measuring the counter rate.
pub const CALIBRATION_WINDOW: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot map shared window: {0}")]
    Window(#[source] MapError),

    #[error("cannot map timer registers: {0}")]
    Timer(#[source] MapError),

    #[error(transparent)]
    Protocol(#[from] CohError),
}

/// Controller over physical memory.
pub struct HardwareSession {
    controller: Controller<UncachedPort, MmioCounter>,
    calibration: Calibration,
}

impl HardwareSession {
    /// Map, enable the timer, and check that it ticks.
    pub fn open(config: &BenchConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let layout = config.layout;

        let window = Mapping::physical(config.phys_base, layout.region_size)
            .map_err(SessionError::Window)?;
        log::info!("shared window: {:?}", window);

        let counter = MmioCounter::map(config.timer_base, config.timer_freq_hz)
            .map_err(SessionError::Timer)?;
        counter.enable();
        let calibration = calibrate(&counter, CALIBRATION_WINDOW)?;

        let access = SharedAccess::new(UncachedPort::new(Arc::new(window)), layout)?;
        Ok(Self {
            controller: Controller::new(access, counter, config.controller_policy()),
            calibration,
        })
    }

    #[inline]
    pub fn controller(&self) -> &Controller<UncachedPort, MmioCounter> {
        &self.controller
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }
}
