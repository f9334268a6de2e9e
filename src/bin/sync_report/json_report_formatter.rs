use std::fs;
use std::path::Path;

use readalong::Report;

pub fn write_report(path: &Path, report: &Report) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            format!(
                "Failed to create report output directory '{}': {err}",
                parent.display()
            )
        })?;
    }

    let mut json = serde_json::to_string_pretty(report)
        .map_err(|err| format!("Failed to serialize sync report: {err}"))?;
    json.push('\n');
    fs::write(path, json)
        .map_err(|err| format!("Failed to write report file '{}': {err}", path.display()))
}

/// One-line digest printed after the report is written.
pub fn summary_line(report: &Report) -> String {
    let counts = &report.aggregates.counts;
    let gap_p90 = report
        .aggregates
        .duration_gap_secs
        .as_ref()
        .map_or(0.0, |d| d.p90);
    let err_p90 = report
        .aggregates
        .abs_err_ms_p90
        .as_ref()
        .map(|d| format!("{:.1}ms", d.p90))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "units: {} estimated: {} invalid: {} cross_check_disagreements: {} gap_p90: {:.4}s abs_err_p90: {}",
        counts.total,
        counts.estimated,
        counts.structurally_invalid,
        counts.cross_check_disagreements,
        gap_p90,
        err_p90
    )
}
