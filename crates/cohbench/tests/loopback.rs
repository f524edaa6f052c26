//! End-to-end runs of the Controller against a Responder thread that sees
//! the window through a simulated non-coherent write-back cache.

use std::sync::Arc;
use std::time::Duration;

use cohbench::{
    generate_csv, run_probe, run_sweep, ControllerPolicy, Loopback, LoopbackOptions, Mapping,
    PollPolicy, Progress, Quiet, RegionLayout, ResponderView, SharedAccess, SimCachedPort,
    SizeTally, SweepPlan, UncachedPort, PATTERN_NEW, PATTERN_OLD,
};
use cohbench_core::results::RESULT_MARKER;

fn policy() -> ControllerPolicy {
    let p = PollPolicy::new(64, Duration::from_micros(10), Duration::from_secs(5));
    ControllerPolicy { packet: p, ready: p, shutdown: p }
}

fn spawn(layout: RegionLayout) -> Loopback {
    let opts = LoopbackOptions { layout, ..Default::default() };
    Loopback::spawn(opts, policy()).unwrap()
}

#[derive(Default)]
struct Recorder {
    started: Vec<usize>,
    finished: Vec<SizeTally>,
}

impl Progress for Recorder {
    fn size_started(&mut self, size: usize, _iterations: u32) {
        self.started.push(size);
    }

    fn size_finished(&mut self, tally: &SizeTally) {
        self.finished.push(*tally);
    }
}

#[test]
fn sweep_records_every_packet() {
    let lb = spawn(RegionLayout::TCM);
    let plan = SweepPlan::new(vec![1, 64, 4096], 10).inter_packet_delay(Duration::ZERO);
    let mut progress = Recorder::default();

    let summary = run_sweep(lb.controller(), &plan, &mut progress).unwrap();

    assert_eq!(summary.attempted, 30);
    assert_eq!(summary.succeeded, 30);
    assert!(summary.shutdown_acked);
    assert!(summary.aborted.is_none());
    assert_eq!(progress.started, vec![1, 64, 4096]);
    assert!(progress.finished.iter().all(|t| t.attempted == 10 && t.succeeded == 10));

    let results = &summary.results;
    assert_eq!(results.reported, 30);
    assert_eq!(results.discarded, 0);
    assert_eq!(results.samples.len(), 30);
    for (i, s) in results.samples.iter().enumerate() {
        let expected = [1, 64, 4096][i / 10];
        assert_eq!(s.packet_size, expected);
        assert_eq!(s.delta_ticks, s.receiver_ts.wrapping_sub(s.sender_ts));
    }

    let csv = generate_csv(results);
    assert_eq!(csv.lines().count(), 31);

    let report = lb.join().unwrap();
    assert_eq!(report.packets, 30);
    assert_eq!(report.recorded, 30);
    assert_eq!(report.dropped, 0);
}

#[test]
fn full_log_drops_extra_packets() {
    let layout = RegionLayout::new(0x1_0000, 64, 1024, 0x2000, 3);
    let lb = spawn(layout);
    let plan = SweepPlan::new(vec![16], 5).inter_packet_delay(Duration::ZERO);

    let summary = run_sweep(lb.controller(), &plan, &mut Quiet).unwrap();

    // Packets past capacity are still acknowledged, just not recorded.
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.results.reported, 3);
    assert_eq!(summary.results.samples.len(), 3);

    let report = lb.join().unwrap();
    assert_eq!(report.recorded, 3);
    assert_eq!(report.dropped, 2);
}

#[test]
fn back_to_back_packets_are_each_recorded_once() {
    let lb = spawn(RegionLayout::TCM);
    let controller = lb.controller();
    controller.wait_until_ready().unwrap();

    for _ in 0..50 {
        controller.send_packet(&[0x5A; 32]).unwrap();
    }
    controller.shutdown().unwrap();

    let drained = controller.drain();
    assert_eq!(drained.entries.len(), 50);
    let mut senders: Vec<u32> = drained.entries.iter().map(|e| e.sender_ts).collect();
    senders.dedup();
    assert_eq!(senders.len(), 50, "a packet was processed twice");
    assert_eq!(lb.join().unwrap().recorded, 50);
}

#[test]
fn corrupted_entry_is_discarded() {
    let lb = spawn(RegionLayout::TCM);
    let controller = lb.controller();
    controller.wait_until_ready().unwrap();
    for _ in 0..3 {
        controller.send_packet(&[1; 8]).unwrap();
    }
    controller.shutdown().unwrap();

    let access = controller.access();
    let marker = access.layout().entry_offset(1) + 16;
    assert_eq!(access.read_remote_u32(marker), RESULT_MARKER);
    access.publish_u32(marker, 0xDEAD_BEEF);

    let drained = controller.drain();
    assert_eq!(drained.reported, 3);
    assert_eq!(drained.discarded, 1);
    assert_eq!(drained.entries.len(), 2);
    lb.join().unwrap();
}

#[test]
fn deltas_survive_counter_wrap() {
    let opts = LoopbackOptions {
        layout: RegionLayout::TCM,
        counter_start: u32::MAX - 50_000,
        ..Default::default()
    };
    let lb = Loopback::spawn(opts, policy()).unwrap();
    let controller = lb.controller();
    controller.wait_until_ready().unwrap();

    for _ in 0..20 {
        let ack = controller.send_packet(&[7; 64]).unwrap();
        // One second at 100 MHz; a non-wrapping subtraction would be near 2^32.
        assert!(ack.delta < 100_000_000, "delta {} looks unwrapped", ack.delta);
    }
    controller.shutdown().unwrap();

    for e in controller.drain().entries {
        assert_eq!(e.delta_ticks, e.receiver_ts.wrapping_sub(e.sender_ts));
        assert!(e.delta_ticks < 100_000_000);
    }
    lb.join().unwrap();
}

#[test]
fn coherent_view_round_trip() {
    let opts = LoopbackOptions {
        layout: RegionLayout::TCM,
        view: ResponderView::Coherent,
        ..Default::default()
    };
    let lb = Loopback::spawn(opts, policy()).unwrap();
    let plan = SweepPlan::new(vec![4, 256], 3).inter_packet_delay(Duration::ZERO);
    let summary = run_sweep(lb.controller(), &plan, &mut Quiet).unwrap();
    assert_eq!(summary.success_rate(), 1.0);
    assert_eq!(summary.results.samples.len(), 6);
    lb.join().unwrap();
}

#[test]
fn cached_reader_stays_stale_without_invalidate() {
    let layout = RegionLayout::TCM;
    let mapping = Arc::new(Mapping::anonymous(layout.region_size).unwrap());
    let writer = SharedAccess::new(UncachedPort::new(mapping.clone()), layout).unwrap();
    let reader = SharedAccess::new(SimCachedPort::new(mapping, layout.cache_line), layout).unwrap();
    let offset = layout.payload_offset();

    let stale = run_probe(&writer, &reader, offset, 100, false);
    assert_eq!(stale.old, 100);
    assert_eq!(stale.coherency_rate(), Some(0.0));

    let fresh = run_probe(&writer, &reader, offset, 100, true);
    assert_eq!(fresh.new, 100);
    assert_eq!(fresh.coherency_rate(), Some(1.0));

    assert_eq!(writer.load_u32(offset), PATTERN_NEW);
    assert_ne!(PATTERN_OLD, PATTERN_NEW);
}
