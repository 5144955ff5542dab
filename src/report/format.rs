use anyhow::Result;
use console::style;

use super::{ProbeReport, ProbeStatus, RunReport};
use crate::config::OutputFormat;

/// Render a finished run in the requested format
pub fn format_report(report: &RunReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Human => Ok(format_human(report)),
    }
}

fn format_human(report: &RunReport) -> String {
    let mut out = format!("Probes against {}\n\n", style(&report.target).bold());

    for probe in &report.probes {
        out.push_str(&format_probe(probe));
    }

    let summary = &report.summary;
    let mut counts = vec![format!("{} passed", summary.passed)];
    if summary.failed > 0 {
        counts.push(format!("{} failed", summary.failed));
    }
    if summary.errored > 0 {
        counts.push(format!("{} errored", summary.errored));
    }
    if summary.skipped > 0 {
        counts.push(format!("{} skipped", summary.skipped));
    }

    let line = format!(
        "{} probe{}: {} ({})",
        summary.total,
        if summary.total == 1 { "" } else { "s" },
        counts.join(", "),
        format_millis(report.duration_ms)
    );
    let line = if report.succeeded() {
        style(line).green()
    } else {
        style(line).red()
    };
    out.push_str(&format!("\n{}\n", line));

    out
}

fn format_probe(probe: &ProbeReport) -> String {
    let duration = style(format!("({})", format_millis(probe.duration_ms))).dim();

    let mut out = match probe.status {
        ProbeStatus::Passed => format!("  {} {} {}\n", style("✓").green(), probe.name, duration),
        ProbeStatus::Failed => format!("  {} {} {}\n", style("✗").red(), probe.name, duration),
        ProbeStatus::Errored => format!(
            "  {} {} errored {}\n",
            style("!").red().bold(),
            probe.name,
            duration
        ),
        ProbeStatus::Skipped => format!("  {} {} skipped\n", style("-").dim(), probe.name),
    };

    for check in probe.checks.iter().filter(|c| !c.passed) {
        out.push_str(&format!("      {}\n", style(&check.query).dim()));
        if let Some(message) = &check.message {
            out.push_str(&format!("      {}\n", style(message).red()));
        }
    }

    if let Some(error) = &probe.error {
        for line in error.lines() {
            out.push_str(&format!("      {}\n", line));
        }
    }

    out
}

/// Compact duration: `850ms`, `2.3s`, `1m05s`
pub fn format_millis(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{}.{}s", ms / 1000, (ms % 1000) / 100)
    } else {
        let secs = ms / 1000;
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}
