//! Coherence benchmark driver
//!
//! Runs the Controller side of the benchmark against a Responder on the
//! real-time core (`/dev/mem`, needs root) or against an in-process
//! loopback Responder with a simulated write-back cache.
//!
//! # Environment Variables
//!
//! - `RUST_LOG=debug` - Log level (default `info`)
//! - `COHBENCH_ITERATIONS`, `COHBENCH_PHYS_BASE`, `COHBENCH_TIMER_BASE`,
//!   `COHBENCH_TIMER_FREQ_HZ`, `COHBENCH_PACKET_TIMEOUT_US`,
//!   `COHBENCH_READY_TIMEOUT_MS`, `COHBENCH_OUTPUT`, ... - see `BenchConfig`
//!
//! ```text
//! sudo cohbench sweep --layout ddr --iterations 100
//! cohbench sweep --loopback --layout tcm --sizes 1,64,1024
//! cohbench probe --reads 1000
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use cohbench::{
    render_table, run_probe, run_sweep, write_csv, BenchConfig, HardwareSession, Loopback,
    LoopbackOptions, Mapping, MemoryPort, Progress, RegionLayout, ResponderView, SharedAccess,
    SimCachedPort, SizeTally, SweepPlan, SweepSummary, UncachedPort,
};
use cohbench_runtime::CachedPort;

#[derive(Parser, Debug)]
#[command(name = "cohbench")]
#[command(version, about = "Software-managed cache coherence benchmark")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send packets of increasing size and export per-packet latency
    Sweep {
        /// Packets per payload size
        #[arg(long)]
        iterations: Option<u32>,

        /// CSV output path
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Shared window layout
        #[arg(long, value_enum, default_value = "build")]
        layout: LayoutArg,

        /// Comma-separated payload sizes (default: list for the layout)
        #[arg(long, value_delimiter = ',')]
        sizes: Vec<usize>,

        /// Per-packet acknowledgement timeout in microseconds
        #[arg(long)]
        timeout_us: Option<u64>,

        /// Run against an in-process Responder instead of /dev/mem
        #[arg(long)]
        loopback: bool,

        /// Loopback Responder reads memory directly instead of through a
        /// simulated write-back cache
        #[arg(long, requires = "loopback")]
        coherent: bool,
    },

    /// Count stale reads a cached reader sees after a remote update
    Probe {
        /// Samples taken after the update
        #[arg(long, default_value = "1000")]
        reads: u32,

        /// Invalidate before every sample
        #[arg(long)]
        invalidate: bool,

        /// Reader cache: simulated write-back or the host's own
        #[arg(long, value_enum, default_value = "sim")]
        reader: ReaderArg,
    },

    /// Print the shared window layout and configuration
    Layout {
        #[arg(long, value_enum, default_value = "build")]
        layout: LayoutArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    Build,
    Ddr,
    Tcm,
}

impl LayoutArg {
    fn layout(self) -> RegionLayout {
        match self {
            LayoutArg::Build => RegionLayout::BUILD,
            LayoutArg::Ddr => RegionLayout::DDR,
            LayoutArg::Tcm => RegionLayout::TCM,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ReaderArg {
    Sim,
    Host,
}

/// `size N bytes... done (ok/total)` on stdout.
struct ConsoleProgress;

impl Progress for ConsoleProgress {
    fn size_started(&mut self, size: usize, _iterations: u32) {
        print!("size {} bytes... ", size);
        let _ = std::io::stdout().flush();
    }

    fn size_finished(&mut self, tally: &SizeTally) {
        println!("done ({}/{})", tally.succeeded, tally.attempted);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sweep {
            iterations,
            output,
            layout,
            sizes,
            timeout_us,
            loopback,
            coherent,
        } => {
            let mut config = BenchConfig::from_env().layout(layout.layout());
            if let Some(n) = iterations {
                config = config.iterations(n);
            }
            if let Some(path) = output {
                config = config.output(path);
            }
            if let Some(us) = timeout_us {
                config = config.packet_timeout(Duration::from_micros(us));
            }
            config.validate()?;

            let mut plan = SweepPlan::for_layout(&config.layout, config.iterations)
                .inter_packet_delay(config.inter_packet_delay);
            if !sizes.is_empty() {
                plan.sizes = sizes;
            }

            let summary = if loopback {
                let view = if coherent { ResponderView::Coherent } else { ResponderView::Cached };
                sweep_loopback(&config, &plan, view)?
            } else {
                sweep_hardware(&config, &plan)?
            };
            finish(&config, &summary)
        }
        Commands::Probe { reads, invalidate, reader } => probe(reads, invalidate, reader),
        Commands::Layout { layout } => {
            let config = BenchConfig::from_env().layout(layout.layout());
            config.print();
            print_layout(&config.layout);
            Ok(())
        }
    }
}

fn sweep_hardware(config: &BenchConfig, plan: &SweepPlan) -> anyhow::Result<SweepSummary> {
    let session = HardwareSession::open(config).context("cannot open hardware session")?;
    let cal = session.calibration();
    println!(
        "timer: {:.0} Hz measured, {} Hz configured",
        cal.measured_hz, cal.configured_hz
    );
    Ok(run_sweep(session.controller(), plan, &mut ConsoleProgress)?)
}

fn sweep_loopback(
    config: &BenchConfig,
    plan: &SweepPlan,
    view: ResponderView,
) -> anyhow::Result<SweepSummary> {
    let opts = LoopbackOptions {
        layout: config.layout,
        view,
        frequency_hz: config.timer_freq_hz,
        ..Default::default()
    };
    let lb = Loopback::spawn(opts, config.controller_policy())?;
    let summary = run_sweep(lb.controller(), plan, &mut ConsoleProgress)?;
    if !summary.shutdown_acked {
        // Dropping forces Shutdown regardless of status and joins.
        drop(lb);
        return Ok(summary);
    }
    match lb.join() {
        Ok(report) => log::info!(
            "responder: {} packets, {} recorded, {} dropped, {} rejected",
            report.packets,
            report.recorded,
            report.dropped,
            report.rejected
        ),
        Err(e) => log::warn!("responder did not exit cleanly: {}", e),
    }
    Ok(summary)
}

fn finish(config: &BenchConfig, summary: &SweepSummary) -> anyhow::Result<()> {
    println!(
        "\n{}/{} packets acknowledged ({:.1}%), {} results recorded",
        summary.succeeded,
        summary.attempted,
        summary.success_rate() * 100.0,
        summary.results.samples.len()
    );
    if let Some(e) = &summary.aborted {
        println!("sweep ended early: {}", e);
    }
    print!("{}", render_table(&summary.results));

    write_csv(&summary.results, &config.output)
        .with_context(|| format!("cannot write {}", config.output.display()))?;
    println!("results written to {}", config.output.display());

    if summary.succeeded == 0 {
        bail!("no packet was acknowledged");
    }
    Ok(())
}

fn probe(reads: u32, invalidate: bool, reader: ReaderArg) -> anyhow::Result<()> {
    let layout = RegionLayout::TCM;
    let mapping = Arc::new(Mapping::anonymous(layout.region_size)?);
    let writer = SharedAccess::new(UncachedPort::new(mapping.clone()), layout)?;

    match reader {
        ReaderArg::Sim => {
            let port = SimCachedPort::new(mapping, layout.cache_line);
            probe_with(&writer, SharedAccess::new(port, layout)?, reads, invalidate)
        }
        ReaderArg::Host => {
            let port = CachedPort::new(mapping, layout.cache_line);
            probe_with(&writer, SharedAccess::new(port, layout)?, reads, invalidate)
        }
    }
}

fn probe_with<R: MemoryPort>(
    writer: &SharedAccess<UncachedPort>,
    reader: SharedAccess<R>,
    reads: u32,
    invalidate: bool,
) -> anyhow::Result<()> {
    let offset = reader.layout().payload_offset();
    let counts = run_probe(writer, &reader, offset, reads, invalidate);

    println!("reads:   {}", counts.reads);
    println!("old:     {}", counts.old);
    println!("new:     {}", counts.new);
    println!("other:   {}", counts.other);
    match counts.coherency_rate() {
        Some(rate) => println!("coherency rate: {:.1}%", rate * 100.0),
        None => println!("coherency rate: n/a"),
    }
    Ok(())
}

fn print_layout(layout: &RegionLayout) {
    println!("control (Controller line): {:#08x}", layout.command_offset());
    println!("control (Responder line):  {:#08x}", layout.status_offset());
    println!(
        "payload:                   {:#08x}..{:#08x}",
        layout.payload_offset(),
        layout.payload_offset() + layout.max_payload
    );
    println!(
        "results:                   {:#08x}..{:#08x} ({} entries)",
        layout.results_header_offset(),
        layout.results_header_offset() + layout.results_len(),
        layout.max_results
    );
}
