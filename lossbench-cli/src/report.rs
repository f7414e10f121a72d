use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use lossbench_engine::MatrixReport;

/// Renders both tables plus a list of skipped cells.
pub fn render_summary(report: &MatrixReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Lossbench run {} ===", report.run_id);
    let _ = writeln!(out, "Elapsed: {:.2?}", report.elapsed);
    let _ = writeln!(out);
    let _ = writeln!(out, "Average transfer time (ms)");
    let _ = write!(out, "{}", report.time_table);
    let _ = writeln!(out);
    let _ = writeln!(out, "Average throughput (MB/s)");
    let _ = write!(out, "{}", report.bandwidth_table);

    if !report.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Skipped cells ({}):", report.failures.len());
        for failure in &report.failures {
            let _ = writeln!(
                out,
                "  {} @ {}: [{}] {}",
                failure.label, failure.loss, failure.kind, failure.message
            );
        }
    }
    out
}

pub fn write_json(report: &MatrixReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("serialize report")?;
    fs::write(path, json).with_context(|| format!("write report to {}", path.display()))?;
    Ok(())
}
