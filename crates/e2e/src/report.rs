//! Scenario and suite reports

use chrono::{DateTime, Utc};
use clubhouse_common::{Capability, Expectation, Outcome, Role};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::E2eResult;

pub const REPORT_FILE: &str = "access-report.json";

/// Attached to every report: what a passing run does and does not prove.
pub const UI_ONLY_NOTE: &str = "Outcomes describe what the UI offers each role. \
An absent affordance is not evidence that the server rejects the operation.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub label: String,
    pub capability: Option<Capability>,
    pub expected: Option<Expectation>,
    pub outcome: Outcome,
    /// Observed outcome contradicts the expectation
    pub unexpected: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    pub duration_ms: u64,
}

impl StepReport {
    pub fn not_executed(index: usize, label: String, capability: Option<Capability>, why: &str) -> Self {
        Self {
            index,
            label,
            capability,
            expected: None,
            outcome: Outcome::NotExecuted,
            unexpected: false,
            diagnostics: vec![why.to_string()],
            duration_ms: 0,
        }
    }
}

/// Compensating action run after the steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupReport {
    pub action: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl CleanupReport {
    /// Nothing is left to repair: the compensator ran, or there was nothing to undo
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Outcome::Allowed | Outcome::SkippedMissingFixture)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    /// Every executed step matched its expectation
    Passed,
    /// At least one unexpected outcome
    Failed,
    /// No unexpected outcome, but some step could not be settled
    Inconclusive,
    /// The fixture was missing
    Skipped,
    /// The session could not be established
    Blocked,
    /// The scenario deadline expired
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub role: Role,
    pub session_id: Option<Uuid>,
    pub status: ScenarioStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub steps: Vec<StepReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cleanup: Vec<CleanupReport>,
    pub error: Option<String>,
}

impl ScenarioReport {
    pub fn unexpected(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.unexpected)
    }

    pub fn has_unexpected(&self) -> bool {
        self.unexpected().next().is_some()
    }

    pub fn cleanup_failures(&self) -> usize {
        self.cleanup.iter().filter(|c| !c.succeeded()).count()
    }

    pub fn outcome_of(&self, index: usize) -> Option<Outcome> {
        self.steps.get(index).map(|s| s.outcome)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub allowed: usize,
    pub denied: usize,
    pub gated: usize,
    pub probe_failed: usize,
    pub skipped_by_policy: usize,
    pub skipped_missing_fixture: usize,
    pub not_executed: usize,
    pub unexpected: usize,
}

impl OutcomeCounts {
    fn record(&mut self, step: &StepReport) {
        match step.outcome {
            Outcome::Allowed => self.allowed += 1,
            Outcome::Denied => self.denied += 1,
            Outcome::Gated => self.gated += 1,
            Outcome::ProbeFailed => self.probe_failed += 1,
            Outcome::SkippedByPolicy => self.skipped_by_policy += 1,
            Outcome::SkippedMissingFixture => self.skipped_missing_fixture += 1,
            Outcome::NotExecuted => self.not_executed += 1,
        }
        if step.unexpected {
            self.unexpected += 1;
        }
    }
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub counts: OutcomeCounts,
    pub scenarios: Vec<ScenarioReport>,
    pub note: String,
}

impl SuiteReport {
    pub fn new(started_at: DateTime<Utc>, duration_ms: u64, scenarios: Vec<ScenarioReport>) -> Self {
        // Fixture resolution is bookkeeping, only capability steps are counted.
        let mut counts = OutcomeCounts::default();
        for step in scenarios
            .iter()
            .flat_map(|s| s.steps.iter())
            .filter(|s| s.capability.is_some())
        {
            counts.record(step);
        }

        Self {
            started_at,
            duration_ms,
            counts,
            scenarios,
            note: UI_ONLY_NOTE.to_string(),
        }
    }

    /// The run fails if and only if some outcome contradicted its expectation
    pub fn success(&self) -> bool {
        self.counts.unexpected == 0
    }

    /// Write the report as JSON into `output_dir`
    pub fn write(&self, output_dir: &Path) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join(REPORT_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Report written to: {}", path.display());
        Ok(path)
    }

    /// Per-scenario, per-capability summary
    pub fn log_summary(&self) {
        for report in &self.scenarios {
            let line = format!(
                "{:?} {} as {} ({} ms)",
                report.status, report.scenario, report.role, report.duration_ms
            );
            match report.status {
                ScenarioStatus::Passed => info!("✓ {}", line),
                ScenarioStatus::Failed => error!("✗ {}", line),
                _ => warn!("- {}{}", line, report.error.as_deref().map(|e| format!(": {e}")).unwrap_or_default()),
            }

            for step in &report.steps {
                let expected = step
                    .expected
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "-".to_string());
                if step.unexpected {
                    error!(
                        "    {} expected {} got {} {:?}",
                        step.label, expected, step.outcome, step.diagnostics
                    );
                } else {
                    info!("    {} expected {} got {}", step.label, expected, step.outcome);
                }
            }

            if report.cleanup_failures() > 0 {
                warn!(
                    "    {} cleanup action(s) failed; fixture may need manual repair",
                    report.cleanup_failures()
                );
            }
        }

        let c = &self.counts;
        info!("");
        info!(
            "Outcomes: {} allowed, {} denied, {} gated, {} probe-failed, {} skipped, {} not executed, {} unexpected ({} ms)",
            c.allowed,
            c.denied,
            c.gated,
            c.probe_failed,
            c.skipped_by_policy + c.skipped_missing_fixture,
            c.not_executed,
            c.unexpected,
            self.duration_ms
        );
        info!("{}", self.note);
    }
}
