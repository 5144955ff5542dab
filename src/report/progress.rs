use console::style;

use super::format::format_millis;
use super::{ProbeReport, ProbeStatus};

/// Live progress lines printed while probes run
pub struct ProgressReporter {
    total: usize,
    current: usize,
    enabled: bool,
}

impl ProgressReporter {
    pub fn new(total: usize, enabled: bool) -> Self {
        Self {
            total,
            current: 0,
            enabled,
        }
    }

    /// Reporter that prints nothing (JSON output, library use)
    pub fn silent() -> Self {
        Self::new(0, false)
    }

    pub fn start_probe(&mut self, name: &str) {
        self.current += 1;
        if self.enabled {
            println!(
                "{} Probe {}/{}: {}",
                style("→").cyan(),
                self.current,
                self.total,
                name
            );
        }
    }

    pub fn provisioning(&self, what: &str) {
        if self.enabled {
            println!("    {}", style(format!("starting {}...", what)).dim());
        }
    }

    pub fn finish_probe(&self, report: &ProbeReport) {
        if !self.enabled {
            return;
        }

        let duration = format_millis(report.duration_ms);
        match report.status {
            ProbeStatus::Passed => println!(
                "    {} {} checks passed ({})",
                style("✓").green(),
                report.checks.len(),
                style(&duration).green()
            ),
            ProbeStatus::Failed => {
                let failed = report.checks.iter().filter(|c| !c.passed).count();
                println!(
                    "    {} {}/{} checks failed ({})",
                    style("✗").red(),
                    failed,
                    report.checks.len(),
                    duration
                );
            }
            ProbeStatus::Errored => println!("    {} errored ({})", style("✗").red(), duration),
            ProbeStatus::Skipped => println!("    {} skipped", style("-").dim()),
        }
    }

    pub fn skip_probe(&mut self, report: &ProbeReport) {
        self.current += 1;
        if self.enabled {
            println!(
                "{} Probe {}/{}: {} (skipped after earlier failure)",
                style("-").dim(),
                self.current,
                self.total,
                report.name
            );
        }
    }
}
