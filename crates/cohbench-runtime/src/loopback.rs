//! In-process loopback
//!
//! Runs the Responder on its own thread over an anonymous shared mapping,
//! with the Controller driving it from the calling thread. The Controller
//! uses an `UncachedPort`; the Responder uses a `SimCachedPort`
//! (non-coherent write-back model) or, for a coherent baseline, an
//! `UncachedPort` as well. Both read one `HostCounter`.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cohbench_core::{
    CohError, Command, Controller, ControllerPolicy, MemoryPort, PollDelay, RegionLayout,
    Responder, ResponderReport, SharedAccess,
};
use thiserror::Error;

use crate::counter::HostCounter;
use crate::memory::{MapError, Mapping};
use crate::port::{SimCachedPort, UncachedPort};

/// How the Responder thread sees the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderView {
    /// Software write-back cache (stale reads without maintenance)
    Cached,
    /// Direct access, as on a coherent interconnect
    Coherent,
}

/// Sleep-based poll delay for a Responder running under an OS.
#[derive(Debug, Clone, Copy)]
pub struct SleepDelay(pub Duration);

impl PollDelay for SleepDelay {
    fn pause(&mut self) {
        if self.0.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.0);
        }
    }
}

/// Loopback parameters.
#[derive(Debug, Clone, Copy)]
pub struct LoopbackOptions {
    pub layout: RegionLayout,
    pub view: ResponderView,
    /// Nominal frequency of the shared host counter
    pub frequency_hz: u32,
    /// First counter value, e.g. close to `u32::MAX` to force a wrap
    pub counter_start: u32,
    /// Responder idle poll delay
    pub responder_delay: Duration,
}

impl Default for LoopbackOptions {
    fn default() -> Self {
        Self {
            layout: RegionLayout::BUILD,
            view: ResponderView::Cached,
            frequency_hz: 100_000_000,
            counter_start: 0,
            responder_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoopbackError {
    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Protocol(#[from] CohError),

    #[error("responder thread panicked")]
    ResponderPanicked,

    #[error("cannot spawn responder thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// A running Controller/Responder pair.
pub struct Loopback {
    controller: Controller<UncachedPort, HostCounter>,
    responder: Option<JoinHandle<Result<ResponderReport, CohError>>>,
    mapping: Arc<Mapping>,
}

impl Loopback {
    /// Map the window and start the Responder thread.
    pub fn spawn(
        options: LoopbackOptions,
        policy: ControllerPolicy,
    ) -> Result<Self, LoopbackError> {
        let layout = options.layout;
        layout.check()?;

        let mapping = Arc::new(Mapping::anonymous(layout.region_size)?);
        let counter = HostCounter::starting_at(options.frequency_hz, options.counter_start);
        let delay = SleepDelay(options.responder_delay);

        let responder_map = mapping.clone();
        let builder = thread::Builder::new().name("cohbench-responder".into());
        let handle = match options.view {
            ResponderView::Cached => {
                let port = SimCachedPort::new(responder_map, layout.cache_line);
                builder.spawn(move || {
                    run_responder(port, layout, counter, delay, |cache: &SimCachedPort| {
                        log::debug!(
                            "responder cache: {:?}, {} lines resident, {} dirty",
                            cache.stats(),
                            cache.resident_lines(),
                            cache.dirty_lines()
                        );
                    })
                })
            }
            ResponderView::Coherent => {
                let port = UncachedPort::new(responder_map);
                builder.spawn(move || run_responder(port, layout, counter, delay, |_| {}))
            }
        }
        .map_err(LoopbackError::Spawn)?;

        let access = SharedAccess::new(UncachedPort::new(mapping.clone()), layout)?;
        log::debug!("loopback responder started ({:?} view)", options.view);

        Ok(Self {
            controller: Controller::new(access, counter, policy),
            responder: Some(handle),
            mapping,
        })
    }

    #[inline]
    pub fn controller(&self) -> &Controller<UncachedPort, HostCounter> {
        &self.controller
    }

    /// The shared backing memory.
    pub fn mapping(&self) -> &Arc<Mapping> {
        &self.mapping
    }

    /// Wait for the Responder thread to exit after Shutdown.
    pub fn join(mut self) -> Result<ResponderReport, LoopbackError> {
        match self.responder.take() {
            Some(handle) => match handle.join() {
                Ok(result) => Ok(result?),
                Err(_) => Err(LoopbackError::ResponderPanicked),
            },
            None => Err(LoopbackError::ResponderPanicked),
        }
    }
}

impl Drop for Loopback {
    fn drop(&mut self) {
        if let Some(handle) = self.responder.take() {
            let access = self.controller.access();
            access.publish_u32(access.layout().command_offset(), Command::Shutdown.word());
            if handle.join().is_err() {
                log::error!("responder thread panicked during teardown");
            }
        }
    }
}

fn run_responder<P, F>(
    port: P,
    layout: RegionLayout,
    counter: HostCounter,
    delay: SleepDelay,
    on_exit: F,
) -> Result<ResponderReport, CohError>
where
    P: MemoryPort,
    F: FnOnce(&P),
{
    let access = SharedAccess::new(port, layout)?;
    let mut responder = Responder::new(access, counter, delay);
    let report = responder.run();
    if let Err(e) = &report {
        log::error!("responder failed: {}", e);
    }
    on_exit(responder.access().port());
    report
}
