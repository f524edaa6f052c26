//! CSV export
//!
//! One row per recorded packet:
//!
//! ```text
//! packet_size,sender_timestamp,receiver_timestamp,delta_ticks,delta_us
//! 64,1000,1250,250,2.500
//! ```

use std::fs;
use std::io;
use std::path::Path;

use crate::orchestrator::ResultSet;

/// CSV header row.
pub const CSV_HEADER: &str = "packet_size,sender_timestamp,receiver_timestamp,delta_ticks,delta_us";

/// Render `results` as CSV with a header row.
pub fn generate_csv(results: &ResultSet) -> String {
    let mut csv = String::with_capacity(64 + results.samples.len() * 48);
    csv.push_str(CSV_HEADER);
    csv.push('\n');

    for s in &results.samples {
        csv.push_str(&format!(
            "{},{},{},{},{:.3}\n",
            s.packet_size, s.sender_ts, s.receiver_ts, s.delta_ticks, s.delta_us
        ));
    }
    csv
}

/// Write `results` to `path`.
pub fn write_csv(results: &ResultSet, path: &Path) -> io::Result<()> {
    fs::write(path, generate_csv(results))?;
    log::info!("wrote {} samples to {}", results.samples.len(), path.display());
    Ok(())
}

/// Human-readable per-size latency table.
pub fn render_table(results: &ResultSet) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>10} {:>8} {:>12} {:>12} {:>12}\n",
        "size", "samples", "min_us", "mean_us", "max_us"
    ));
    for st in results.stats() {
        out.push_str(&format!(
            "{:>10} {:>8} {:>12.3} {:>12.3} {:>12.3}\n",
            st.size, st.count, st.min_us, st.mean_us, st.max_us
        ));
    }
    out
}
