//! Controller side of the mailbox.
//!
//! Runs on the OS-hosted agent with an uncached view of the window. Every
//! wait is bounded by a `PollPolicy`; a timeout fails the current packet
//! and leaves the protocol ready for the next one.

use std::time::{Duration, Instant};

use crate::access::SharedAccess;
use crate::control::{Command, Status};
use crate::error::{CohError, CohResult};
use crate::poll::PollPolicy;
use crate::port::MemoryPort;
use crate::results::{self, Drained};
use crate::timestamp::{tick_delta, ticks_to_micros, FreeRunningCounter};

/// Wait bounds for each phase.
///
/// A Done timeout does not fence the timed-out packet off from the next
/// one. If the Responder had read Process but not yet published Busy when
/// the Controller gave up, its status still reads Ready, so the next
/// packet's Ready wait passes at once and the late Done is taken as the
/// next packet's acknowledgement. Keep `packet.timeout` well above the
/// Responder's worst-case turnaround.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerPolicy {
    /// Ready before a packet, then Done after it
    pub packet: PollPolicy,
    /// First Ready at startup
    pub ready: PollPolicy,
    /// Done after Shutdown
    pub shutdown: PollPolicy,
}

impl Default for ControllerPolicy {
    fn default() -> Self {
        Self {
            packet: PollPolicy::packet(),
            ready: PollPolicy::ready(),
            shutdown: PollPolicy::packet().with_timeout(Duration::from_millis(100)),
        }
    }
}

/// A packet the Responder acknowledged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acknowledgement {
    pub sender_ts: u32,
    pub receiver_ts: u32,
    pub delta: u64,
    /// Host time from signalling Process to observing Done
    pub elapsed: Duration,
}

impl Acknowledgement {
    #[inline]
    pub fn delta_micros(&self, frequency_hz: u32) -> f64 {
        ticks_to_micros(self.delta, frequency_hz)
    }
}

/// The uncached agent's protocol driver.
pub struct Controller<P, C> {
    access: SharedAccess<P>,
    counter: C,
    policy: ControllerPolicy,
}

impl<P, C> Controller<P, C>
where
    P: MemoryPort,
    C: FreeRunningCounter,
{
    pub fn new(access: SharedAccess<P>, counter: C, policy: ControllerPolicy) -> Self {
        Self { access, counter, policy }
    }

    #[inline]
    pub fn access(&self) -> &SharedAccess<P> {
        &self.access
    }

    #[inline]
    pub fn counter(&self) -> &C {
        &self.counter
    }

    #[inline]
    pub fn policy(&self) -> &ControllerPolicy {
        &self.policy
    }

    /// Current Responder status, `None` for an unrecognised word.
    pub fn status(&self) -> Option<Status> {
        Status::from_word(self.access.read_remote_u32(self.access.layout().status_offset()))
    }

    /// Clear the command word and wait for the Responder's first Ready.
    pub fn wait_until_ready(&self) -> CohResult<Duration> {
        let layout = self.access.layout();
        self.access.publish_u32(layout.command_offset(), Command::Idle.word());

        log::info!(
            "waiting up to {:?} for responder Ready",
            self.policy.ready.timeout
        );
        let waited = self.wait_for(Status::Ready, &self.policy.ready)?;
        log::info!("responder ready after {:?}", waited);
        Ok(waited)
    }

    /// Transfer one packet and wait for its acknowledgement.
    pub fn send_packet(&self, payload: &[u8]) -> CohResult<Acknowledgement> {
        let layout = *self.access.layout();
        if payload.len() > layout.max_payload {
            return Err(CohError::PayloadTooLarge {
                size: payload.len(),
                max: layout.max_payload,
            });
        }

        self.wait_for(Status::Ready, &self.policy.packet)?;

        self.access.store_bytes(layout.payload_offset(), payload);
        self.access.flush_range(layout.payload_offset(), payload.len());
        self.access.store_u32(layout.size_offset(), payload.len() as u32);

        let sender_ts = self.counter.now();
        self.access.store_u32(layout.sender_ts_offset(), sender_ts);
        self.access.flush_span(layout.controller_line());
        self.access.complete();

        let signalled = Instant::now();
        self.access.publish_u32(layout.command_offset(), Command::Process.word());

        let done = self.wait_for(Status::Done, &self.policy.packet);
        let receiver_ts = self.access.read_remote_u32(layout.receiver_ts_offset());
        let elapsed = signalled.elapsed();

        self.access.publish_u32(layout.command_offset(), Command::Idle.word());

        done?;
        Ok(Acknowledgement {
            sender_ts,
            receiver_ts,
            delta: tick_delta(sender_ts, receiver_ts, self.counter.max_value()),
            elapsed,
        })
    }

    /// Tell the Responder to flush its results and stop.
    ///
    /// Shutdown is only sent once the Responder is Ready. A Done still
    /// showing from an earlier packet would otherwise be mistaken for the
    /// shutdown acknowledgement before the results are final.
    pub fn shutdown(&self) -> CohResult<Duration> {
        let layout = self.access.layout();
        if let Err(e) = self.wait_for(Status::Ready, &self.policy.packet) {
            log::warn!("responder not Ready, Shutdown not sent: {}", e);
            return Err(e);
        }
        self.access.publish_u32(layout.command_offset(), Command::Shutdown.word());
        let waited = self.wait_for(Status::Done, &self.policy.shutdown)?;
        log::debug!("shutdown acknowledged after {:?}", waited);
        Ok(waited)
    }

    /// Read back the Responder's results. Call after `shutdown`.
    pub fn drain(&self) -> Drained {
        results::drain(&self.access)
    }

    fn wait_for(&self, status: Status, policy: &PollPolicy) -> CohResult<Duration> {
        let offset = self.access.layout().status_offset();
        policy
            .poll_until(|| self.access.read_remote_u32(offset) == status.word())
            .map_err(|elapsed| CohError::Timeout {
                waiting_for: status_name(status),
                elapsed,
            })
    }
}

fn status_name(status: Status) -> &'static str {
    match status {
        Status::Ready => "Ready",
        Status::Busy => "Busy",
        Status::Done => "Done",
    }
}
