//! Experiment orchestrator
//!
//! Sweeps an ordered list of payload sizes, sending `iterations` packets of
//! each, then shuts the Responder down and drains its results:
//!
//! ```text
//! wait Ready ─▶ for size in sizes ─▶ for i in 0..iterations ─▶ fill ─▶ send ─▶ tally
//!                                                                      │
//!                              Shutdown ─▶ drain ─▶ ResultSet ◀─────────┘
//! ```
//!
//! A failed packet is counted and the sweep moves on. A missing Responder
//! at startup aborts; any other error that is not per-packet ends the
//! sweep early but still shuts the Responder down and drains it.

use std::time::Duration;

use cohbench_core::timestamp::ticks_to_micros;
use cohbench_core::{CohError, Controller, Drained, FreeRunningCounter, MemoryPort, RegionLayout};
use thiserror::Error;

/// Payload sizes for the 8 MiB DDR window.
pub const DDR_SIZES: &[usize] = &[
    1, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65536,
];

/// Payload sizes for the 64 KiB TCM window.
pub const TCM_SIZES: &[usize] = &[1, 4, 16, 32, 64, 128, 256, 512, 1024];

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("sweep plan has no payload sizes")]
    NoSizes,

    #[error("sweep plan has zero iterations")]
    NoIterations,

    #[error("payload size {size} exceeds the {max}-byte payload area")]
    SizeTooLarge { size: usize, max: usize },

    #[error("responder never became ready: {0}")]
    NotReady(#[source] CohError),
}

/// What to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    pub sizes: Vec<usize>,
    pub iterations: u32,
    pub inter_packet_delay: Duration,
}

impl SweepPlan {
    pub fn new(sizes: Vec<usize>, iterations: u32) -> Self {
        Self {
            sizes,
            iterations,
            inter_packet_delay: Duration::from_micros(100),
        }
    }

    /// Default size list for `layout`: the DDR list when the payload area
    /// holds 64 KiB, the TCM list otherwise, trimmed to the payload area.
    pub fn for_layout(layout: &RegionLayout, iterations: u32) -> Self {
        let list = if layout.max_payload >= 64 * 1024 {
            DDR_SIZES
        } else {
            TCM_SIZES
        };
        let sizes = list
            .iter()
            .copied()
            .filter(|&s| s <= layout.max_payload)
            .collect();
        Self::new(sizes, iterations)
    }

    pub fn inter_packet_delay(mut self, d: Duration) -> Self {
        self.inter_packet_delay = d;
        self
    }

    /// Reject plans that could not run on `layout`.
    pub fn validate(&self, layout: &RegionLayout) -> Result<(), SweepError> {
        if self.sizes.is_empty() {
            return Err(SweepError::NoSizes);
        }
        if self.iterations == 0 {
            return Err(SweepError::NoIterations);
        }
        if let Some(&size) = self.sizes.iter().find(|&&s| s > layout.max_payload) {
            return Err(SweepError::SizeTooLarge {
                size,
                max: layout.max_payload,
            });
        }
        Ok(())
    }

    /// Total packets the plan sends.
    pub fn attempts(&self) -> u64 {
        self.sizes.len() as u64 * self.iterations as u64
    }
}

/// Fill `buf` with the byte pattern `i mod 256`.
pub fn fill_pattern(buf: &mut [u8]) {
    for (i, b) in buf.iter_mut().enumerate() {
        *b = i as u8;
    }
}

/// Outcome counts for one payload size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeTally {
    pub size: usize,
    pub attempted: u32,
    pub succeeded: u32,
}

/// Progress callbacks.
pub trait Progress {
    fn size_started(&mut self, _size: usize, _iterations: u32) {}
    fn size_finished(&mut self, _tally: &SizeTally) {}
}

/// Progress sink that reports nothing.
pub struct Quiet;

impl Progress for Quiet {}

/// One recorded packet with its latency in microseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub packet_size: u32,
    pub sender_ts: u32,
    pub receiver_ts: u32,
    pub delta_ticks: u32,
    pub delta_us: f64,
}

/// Latency summary for one payload size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeStats {
    pub size: u32,
    pub count: usize,
    pub min_us: f64,
    pub mean_us: f64,
    pub max_us: f64,
}

/// Results read back from the Responder.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub samples: Vec<Sample>,
    /// Count word the Responder published
    pub reported: usize,
    /// Entries dropped for a bad marker
    pub discarded: usize,
    pub frequency_hz: u32,
}

impl ResultSet {
    pub fn from_drained(drained: Drained, frequency_hz: u32) -> Self {
        let samples = drained
            .entries
            .iter()
            .map(|e| Sample {
                packet_size: e.packet_size,
                sender_ts: e.sender_ts,
                receiver_ts: e.receiver_ts,
                delta_ticks: e.delta_ticks,
                delta_us: ticks_to_micros(e.delta_ticks as u64, frequency_hz),
            })
            .collect();
        Self {
            samples,
            reported: drained.reported,
            discarded: drained.discarded,
            frequency_hz,
        }
    }

    /// Per-size min/mean/max, in order of first appearance.
    pub fn stats(&self) -> Vec<SizeStats> {
        let mut out: Vec<SizeStats> = Vec::new();
        for s in &self.samples {
            match out.iter_mut().find(|st| st.size == s.packet_size) {
                Some(st) => {
                    st.mean_us += s.delta_us;
                    st.min_us = st.min_us.min(s.delta_us);
                    st.max_us = st.max_us.max(s.delta_us);
                    st.count += 1;
                }
                None => out.push(SizeStats {
                    size: s.packet_size,
                    count: 1,
                    min_us: s.delta_us,
                    mean_us: s.delta_us,
                    max_us: s.delta_us,
                }),
            }
        }
        for st in &mut out {
            st.mean_us /= st.count as f64;
        }
        out
    }
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepSummary {
    pub tallies: Vec<SizeTally>,
    pub attempted: u64,
    pub succeeded: u64,
    /// The Responder acknowledged Shutdown
    pub shutdown_acked: bool,
    /// Error that ended the sweep before the plan was done
    pub aborted: Option<CohError>,
    pub results: ResultSet,
}

impl SweepSummary {
    pub fn failed(&self) -> u64 {
        self.attempted - self.succeeded
    }

    /// Fraction of packets acknowledged, 0.0 for an empty sweep.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.attempted as f64
        }
    }
}

/// Run `plan` through `controller`.
pub fn run_sweep<P, C, G>(
    controller: &Controller<P, C>,
    plan: &SweepPlan,
    progress: &mut G,
) -> Result<SweepSummary, SweepError>
where
    P: MemoryPort,
    C: FreeRunningCounter,
    G: Progress + ?Sized,
{
    let layout = *controller.access().layout();
    plan.validate(&layout)?;
    controller.wait_until_ready().map_err(SweepError::NotReady)?;

    log::info!(
        "sweeping {} sizes x {} iterations ({} packets)",
        plan.sizes.len(),
        plan.iterations,
        plan.attempts()
    );

    let mut summary = SweepSummary::default();
    let mut payload = vec![0u8; layout.max_payload];
    fill_pattern(&mut payload);

    'sizes: for &size in &plan.sizes {
        progress.size_started(size, plan.iterations);
        let mut tally = SizeTally { size, attempted: 0, succeeded: 0 };

        for i in 0..plan.iterations {
            tally.attempted += 1;
            match controller.send_packet(&payload[..size]) {
                Ok(ack) => {
                    tally.succeeded += 1;
                    log::trace!("size {} #{}: {} ticks in {:?}", size, i, ack.delta, ack.elapsed);
                }
                Err(e) if e.is_per_packet() => log::warn!("size {} #{} failed: {}", size, i, e),
                Err(e) => {
                    log::error!("size {} #{}: {}; ending sweep", size, i, e);
                    progress.size_finished(&tally);
                    summary.attempted += tally.attempted as u64;
                    summary.succeeded += tally.succeeded as u64;
                    summary.tallies.push(tally);
                    summary.aborted = Some(e);
                    break 'sizes;
                }
            }
            if !plan.inter_packet_delay.is_zero() {
                std::thread::sleep(plan.inter_packet_delay);
            }
        }

        progress.size_finished(&tally);
        summary.attempted += tally.attempted as u64;
        summary.succeeded += tally.succeeded as u64;
        summary.tallies.push(tally);
    }

    summary.shutdown_acked = match controller.shutdown() {
        Ok(_) => true,
        Err(e) => {
            log::warn!("shutdown not acknowledged: {}; results may be incomplete", e);
            false
        }
    };

    let drained = controller.drain();
    if drained.entries.len() as u64 != summary.succeeded {
        log::info!(
            "{} entries recorded for {} acknowledged packets",
            drained.entries.len(),
            summary.succeeded
        );
    }
    summary.results = ResultSet::from_drained(drained, controller.counter().frequency_hz());

    log::info!(
        "sweep done: {}/{} packets acknowledged ({:.1}%)",
        summary.succeeded,
        summary.attempted,
        summary.success_rate() * 100.0
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern() {
        let mut buf = vec![0xFFu8; 300];
        fill_pattern(&mut buf);
        assert_eq!(buf[0], 0);
        assert_eq!(buf[255], 255);
        assert_eq!(buf[256], 0);
        assert_eq!(buf[299], 43);
    }

    #[test]
    fn test_plan_for_layout() {
        let ddr = SweepPlan::for_layout(&RegionLayout::DDR, 100);
        assert_eq!(ddr.sizes, DDR_SIZES.to_vec());
        assert_eq!(ddr.attempts(), 1400);

        let tcm = SweepPlan::for_layout(&RegionLayout::TCM, 10);
        assert_eq!(tcm.sizes, TCM_SIZES.to_vec());
        assert!(tcm.validate(&RegionLayout::TCM).is_ok());
    }

    #[test]
    fn test_plan_validation() {
        let plan = SweepPlan::new(vec![1, 8192], 1);
        assert!(matches!(
            plan.validate(&RegionLayout::TCM),
            Err(SweepError::SizeTooLarge { size: 8192, max: 4096 })
        ));
        assert!(matches!(
            SweepPlan::new(vec![], 1).validate(&RegionLayout::TCM),
            Err(SweepError::NoSizes)
        ));
        assert!(matches!(
            SweepPlan::new(vec![1], 0).validate(&RegionLayout::TCM),
            Err(SweepError::NoIterations)
        ));
    }

    #[test]
    fn test_stats() {
        let sample = |size, us| Sample {
            packet_size: size,
            sender_ts: 0,
            receiver_ts: 0,
            delta_ticks: 0,
            delta_us: us,
        };
        let set = ResultSet {
            samples: vec![sample(64, 1.0), sample(64, 3.0), sample(128, 5.0)],
            ..Default::default()
        };
        let stats = set.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].size, 64);
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[0].mean_us, 2.0);
        assert_eq!(stats[0].min_us, 1.0);
        assert_eq!(stats[0].max_us, 3.0);
        assert_eq!(stats[1].mean_us, 5.0);
    }

    #[test]
    fn test_success_rate() {
        let s = SweepSummary { attempted: 4, succeeded: 3, ..Default::default() };
        assert_eq!(s.failed(), 1);
        assert_eq!(s.success_rate(), 0.75);
        assert_eq!(SweepSummary::default().success_rate(), 0.0);
    }
}
