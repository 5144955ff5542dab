//! Results of a probe run and their presentation.

pub mod format;
pub mod progress;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use format::format_report;
pub use progress::ProgressReporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// Every check passed
    Passed,
    /// At least one check did not meet its expectation
    Failed,
    /// The probe could not be run (container, connection or script failure)
    Errored,
    /// Not run because an earlier probe failed with fail-fast enabled
    Skipped,
}

impl ProbeStatus {
    pub fn is_success(self) -> bool {
        matches!(self, ProbeStatus::Passed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CheckOutcome {
    pub query: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeReport {
    pub name: String,
    pub description: String,
    pub status: ProbeStatus,
    pub checks: Vec<CheckOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ProbeReport {
    /// Report for a probe whose checks all ran
    pub fn completed(
        name: &str,
        description: &str,
        checks: Vec<CheckOutcome>,
        duration_ms: u64,
    ) -> Self {
        let status = if checks.iter().all(|c| c.passed) {
            ProbeStatus::Passed
        } else {
            ProbeStatus::Failed
        };

        Self {
            name: name.to_string(),
            description: description.to_string(),
            status,
            checks,
            error: None,
            duration_ms,
        }
    }

    pub fn errored(name: &str, description: &str, error: &anyhow::Error, duration_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            status: ProbeStatus::Errored,
            checks: vec![],
            error: Some(format!("{:#}", error)),
            duration_ms,
        }
    }

    pub fn skipped(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            status: ProbeStatus::Skipped,
            checks: vec![],
            error: None,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunReport {
    /// Image or (masked) server URL the probes ran against
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub summary: RunSummary,
    pub probes: Vec<ProbeReport>,
}

impl RunReport {
    pub fn new(
        target: String,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        probes: Vec<ProbeReport>,
    ) -> Self {
        let mut summary = RunSummary {
            total: probes.len(),
            ..Default::default()
        };
        for probe in &probes {
            match probe.status {
                ProbeStatus::Passed => summary.passed += 1,
                ProbeStatus::Failed => summary.failed += 1,
                ProbeStatus::Errored => summary.errored += 1,
                ProbeStatus::Skipped => summary.skipped += 1,
            }
        }

        Self {
            target,
            started_at,
            duration_ms,
            summary,
            probes,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.summary.passed == self.summary.total
    }
}
