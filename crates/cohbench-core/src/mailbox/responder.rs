//! Responder side of the mailbox.
//!
//! Runs on the cached agent with no OS underneath: no allocation, no
//! blocking primitives, an unbounded top-level wait. The host loopback
//! harness runs the same code on a thread.

use crate::access::SharedAccess;
use crate::control::{Command, Status};
use crate::error::CohResult;
use crate::port::MemoryPort;
use crate::results::{ResultEntry, ResultsLog};
use crate::timestamp::{self, Correlation, FreeRunningCounter};

/// Pause between empty polls of the command word.
pub trait PollDelay {
    fn pause(&mut self);
}

/// Busy-wait for a fixed number of `spin_loop` hints.
#[derive(Debug, Clone, Copy)]
pub struct SpinDelay(pub u32);

impl Default for SpinDelay {
    fn default() -> Self {
        SpinDelay(1_000)
    }
}

impl PollDelay for SpinDelay {
    #[inline]
    fn pause(&mut self) {
        for _ in 0..self.0 {
            core::hint::spin_loop();
        }
    }
}

/// Outcome of one `poll_once`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing to do
    Idle,
    /// A packet was timestamped and acknowledged
    Processed(ResultEntry),
    /// `size` exceeded the payload area; acknowledged without a record
    Rejected { size: u32 },
    /// Controller cleared the command, status back to Ready
    Rearmed,
    /// Results flushed, loop should exit
    Shutdown,
}

/// Totals at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponderReport {
    /// Process commands acted on (recorded, dropped or rejected)
    pub packets: usize,
    /// Entries in the results log
    pub recorded: usize,
    /// Entries refused because the log was full
    pub dropped: usize,
    /// Oversized packets
    pub rejected: usize,
}

/// The cached agent's protocol loop.
pub struct Responder<P, C, D = SpinDelay> {
    access: SharedAccess<P>,
    counter: C,
    delay: D,
    results: ResultsLog,
    status: Status,
    packets: usize,
    rejected: usize,
}

impl<P, C, D> Responder<P, C, D>
where
    P: MemoryPort,
    C: FreeRunningCounter,
    D: PollDelay,
{
    pub fn new(access: SharedAccess<P>, counter: C, delay: D) -> Self {
        let results = ResultsLog::new(access.layout());
        Self {
            access,
            counter,
            delay,
            results,
            status: Status::Ready,
            packets: 0,
            rejected: 0,
        }
    }

    /// Check the counter, clear the results area and publish Ready.
    pub fn start(&mut self) -> CohResult<()> {
        let delay = &mut self.delay;
        timestamp::self_test(&self.counter, || delay.pause())?;

        self.results.reset(&self.access);
        self.set_status(Status::Ready);
        log::info!(
            "responder ready: payload {} bytes, {} result slots",
            self.access.layout().max_payload,
            self.results.capacity()
        );
        Ok(())
    }

    /// Read the command word once and act on it.
    pub fn poll_once(&mut self) -> Step {
        let layout = *self.access.layout();
        let word = self.access.read_remote_u32(layout.command_offset());

        match (Command::from_word(word), self.status) {
            (Some(Command::Process), Status::Ready) => self.process(),
            (Some(Command::Idle), Status::Done) => {
                self.set_status(Status::Ready);
                Step::Rearmed
            }
            (Some(Command::Shutdown), _) => {
                self.results.finalize(&self.access);
                self.set_status(Status::Done);
                log::info!(
                    "responder shutdown: {} recorded, {} dropped, {} rejected",
                    self.results.count(),
                    self.results.dropped(),
                    self.rejected
                );
                Step::Shutdown
            }
            _ => Step::Idle,
        }
    }

    /// `start`, then poll until Shutdown.
    pub fn run(&mut self) -> CohResult<ResponderReport> {
        self.start()?;
        loop {
            match self.poll_once() {
                Step::Shutdown => break,
                Step::Idle => self.delay.pause(),
                _ => {}
            }
        }
        Ok(self.report())
    }

    pub fn report(&self) -> ResponderReport {
        ResponderReport {
            packets: self.packets,
            recorded: self.results.count(),
            dropped: self.results.dropped(),
            rejected: self.rejected,
        }
    }

    #[inline]
    pub fn status(&self) -> Status {
        self.status
    }

    #[inline]
    pub fn results(&self) -> &ResultsLog {
        &self.results
    }

    #[inline]
    pub fn access(&self) -> &SharedAccess<P> {
        &self.access
    }

    fn process(&mut self) -> Step {
        let layout = *self.access.layout();
        self.packets += 1;

        // The command read invalidated the Controller's line, so size and
        // sender_ts below come from memory.
        let size = self.access.load_u32(layout.size_offset());
        let sender_ts = self.access.load_u32(layout.sender_ts_offset());

        if size as usize > layout.max_payload {
            log::warn!(
                "rejecting packet of {} bytes (payload area is {})",
                size,
                layout.max_payload
            );
            self.rejected += 1;
            self.set_status(Status::Done);
            return Step::Rejected { size };
        }

        let payload = layout.line_span(layout.payload_offset(), size as usize);
        self.access.invalidate_span(payload);
        self.access.complete();
        let receiver_ts = self.counter.now();

        self.set_status(Status::Busy);

        let correlation = Correlation::new(sender_ts, receiver_ts, self.counter.max_value());
        let entry = ResultEntry::new(size, correlation);
        if !self.results.append(&self.access, &entry) && self.results.dropped() == 1 {
            log::warn!("results log full at {} entries, dropping", self.results.capacity());
        }

        self.access.publish_u32(layout.receiver_ts_offset(), receiver_ts);
        self.set_status(Status::Done);
        log::trace!(
            "packet {} bytes ({} lines), delta {} ticks",
            size,
            payload.lines(layout.cache_line),
            correlation.delta
        );
        Step::Processed(entry)
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
        self.access
            .publish_u32(self.access.layout().status_offset(), status.word());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::testing::{TracePort, VecPort};
    use crate::layout::RegionLayout;
    use crate::results::RESULT_MARKER;
    use core::cell::Cell;

    struct TickCounter(Cell<u32>);

    impl FreeRunningCounter for TickCounter {
        fn now(&self) -> u32 {
            let v = self.0.get();
            self.0.set(v.wrapping_add(5));
            v
        }
        fn frequency_hz(&self) -> u32 {
            100_000_000
        }
    }

    fn layout() -> RegionLayout {
        RegionLayout::new(0x1_0000, 64, 4096, 0x2000, 3)
    }

    fn responder<P: MemoryPort>(port: P) -> Responder<P, TickCounter, SpinDelay> {
        let access = SharedAccess::new(port, layout()).unwrap();
        let mut r = Responder::new(access, TickCounter(Cell::new(1_000)), SpinDelay(1));
        r.start().unwrap();
        r
    }

    fn post<P: MemoryPort>(
        r: &Responder<P, TickCounter, SpinDelay>,
        cmd: Command,
        size: u32,
        ts: u32,
    ) {
        let a = r.access();
        a.store_u32(a.layout().size_offset(), size);
        a.store_u32(a.layout().sender_ts_offset(), ts);
        a.store_u32(a.layout().command_offset(), cmd.word());
    }

    fn status_word<P: MemoryPort>(r: &Responder<P, TickCounter, SpinDelay>) -> u32 {
        r.access().load_u32(layout().status_offset())
    }

    #[test]
    fn test_start_publishes_ready() {
        let mut r = responder(VecPort::new(0x1_0000));
        assert_eq!(status_word(&r), Status::Ready.word());
        assert_eq!(r.poll_once(), Step::Idle);
    }

    #[test]
    fn test_start_fails_on_stalled_counter() {
        struct Frozen;
        impl FreeRunningCounter for Frozen {
            fn now(&self) -> u32 {
                9
            }
            fn frequency_hz(&self) -> u32 {
                1
            }
        }
        let access = SharedAccess::new(VecPort::new(0x1_0000), layout()).unwrap();
        let mut r = Responder::new(access, Frozen, SpinDelay(1));
        assert!(r.start().is_err());
        assert_eq!(r.access().load_u32(layout().status_offset()), 0);
    }

    #[test]
    fn test_process_cycle() {
        let mut r = responder(VecPort::new(0x1_0000));
        post(&r, Command::Process, 64, 990);

        let step = r.poll_once();
        let Step::Processed(entry) = step else {
            panic!("expected Processed, got {:?}", step);
        };
        assert_eq!(entry.packet_size, 64);
        assert_eq!(entry.sender_ts, 990);
        assert_eq!(entry.marker, RESULT_MARKER);
        assert_eq!(entry.delta_ticks, entry.receiver_ts - 990);
        assert_eq!(status_word(&r), Status::Done.word());
        assert_eq!(
            r.access().load_u32(layout().receiver_ts_offset()),
            entry.receiver_ts
        );

        // Command still reads Process: ignored until the Controller clears it.
        assert_eq!(r.poll_once(), Step::Idle);
        assert_eq!(r.results().count(), 1);

        post(&r, Command::Idle, 0, 0);
        assert_eq!(r.poll_once(), Step::Rearmed);
        assert_eq!(status_word(&r), Status::Ready.word());
    }

    #[test]
    fn test_oversized_packet_rejected() {
        let mut r = responder(VecPort::new(0x1_0000));
        post(&r, Command::Process, 4097, 0);
        assert_eq!(r.poll_once(), Step::Rejected { size: 4097 });
        assert_eq!(status_word(&r), Status::Done.word());
        assert_eq!(r.results().count(), 0);
        assert_eq!(r.report().rejected, 1);
    }

    #[test]
    fn test_oversized_packet_never_invalidates_payload() {
        let mut r = responder(TracePort::new(0x1_0000));
        r.access().port().ops.borrow_mut().clear();
        post(&r, Command::Process, 0x10_0000, 0);
        r.poll_once();
        let payload = layout().payload_offset();
        assert!(r
            .access()
            .port()
            .ops()
            .iter()
            .all(|&(op, off, _)| op != "invalidate" || off < payload));
    }

    #[test]
    fn test_timestamp_after_payload_invalidate() {
        let mut r = responder(TracePort::new(0x1_0000));
        r.access().port().ops.borrow_mut().clear();
        post(&r, Command::Process, 200, 0);
        r.access().port().ops.borrow_mut().clear();
        r.poll_once();

        let ops = r.access().port().ops();
        let payload = layout().payload_offset();
        let inv = ops
            .iter()
            .position(|&op| op == ("invalidate", payload, 256))
            .unwrap();
        assert_eq!(ops[inv + 1], ("barrier", 0, 0));
        // Next op is the Busy store.
        assert_eq!(ops[inv + 2], ("store", layout().status_offset(), 4));
    }

    #[test]
    fn test_capacity_and_shutdown() {
        let mut r = responder(VecPort::new(0x1_0000));
        for i in 0..5u32 {
            post(&r, Command::Process, i + 1, 0);
            assert!(matches!(r.poll_once(), Step::Processed(_)));
            post(&r, Command::Idle, 0, 0);
            assert_eq!(r.poll_once(), Step::Rearmed);
        }
        post(&r, Command::Shutdown, 0, 0);
        assert_eq!(r.poll_once(), Step::Shutdown);
        assert_eq!(status_word(&r), Status::Done.word());

        let report = r.report();
        assert_eq!(report.packets, 5);
        assert_eq!(report.recorded, 3);
        assert_eq!(report.dropped, 2);
        assert_eq!(r.access().load_u32(layout().results_header_offset()), 3);
    }

    #[test]
    fn test_reissued_process_runs_one_cycle_per_edge() {
        let mut r = responder(TracePort::new(0x1_0000));
        // Process left set after Done, re-written without an Idle in
        // between, and Idle written twice.
        let script = [
            (Command::Process, 8, 100),
            (Command::Process, 8, 100),
            (Command::Process, 16, 200),
            (Command::Idle, 0, 0),
            (Command::Idle, 0, 0),
            (Command::Process, 32, 300),
            (Command::Process, 32, 300),
            (Command::Idle, 0, 0),
            (Command::Process, 64, 400),
        ];

        let mut prev = Command::Idle;
        let mut edges = 0;
        let mut processed = 0;
        for (cmd, size, ts) in script {
            if prev == Command::Idle && cmd == Command::Process {
                edges += 1;
            }
            prev = cmd;
            post(&r, cmd, size, ts);
            for _ in 0..3 {
                if matches!(r.poll_once(), Step::Processed(_)) {
                    processed += 1;
                }
            }
        }
        assert_eq!(edges, 3);
        assert_eq!(processed, edges);

        let statuses = r.access().port().stored(layout().status_offset());
        let busy: Vec<usize> = statuses
            .iter()
            .enumerate()
            .filter(|&(_, &w)| w == Status::Busy.word())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(busy.len(), edges);
        for i in busy {
            assert_eq!(statuses[i + 1], Status::Done.word());
        }

        assert_eq!(r.results().count(), edges);
        let sizes: Vec<u32> = (0..edges)
            .map(|i| r.access().load_u32(layout().entry_offset(i)))
            .collect();
        assert_eq!(sizes, vec![8, 32, 64]);
    }

    #[test]
    fn test_invalidated_lines_grow_with_size() {
        let mut r = responder(TracePort::new(0x1_0000));
        let status = layout().status_offset();
        let payload = layout().payload_offset();

        let mut lines = Vec::new();
        for size in [1u32, 64, 4096] {
            post(&r, Command::Process, size, 0);
            r.access().port().ops.borrow_mut().clear();
            assert!(matches!(r.poll_once(), Step::Processed(_)));

            // Everything before the Busy store precedes the receiver timestamp.
            let ops = r.access().port().ops();
            let stamp = ops.iter().position(|&op| op == ("store", status, 4)).unwrap();
            let invalidated: usize = ops[..stamp]
                .iter()
                .filter(|&&(op, off, _)| op == "invalidate" && off >= payload)
                .map(|&(_, _, len)| len / layout().cache_line)
                .sum();
            lines.push(invalidated);

            post(&r, Command::Idle, 0, 0);
            assert_eq!(r.poll_once(), Step::Rearmed);
        }
        assert_eq!(lines, vec![1, 1, 64]);
    }
}
