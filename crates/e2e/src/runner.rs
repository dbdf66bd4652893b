//! Scenario runner that orchestrates sessions, probes, actions and cleanup

use chrono::Utc;
use clubhouse_common::{Capability, Expectation, ExpectationMatrix, Outcome, ProbeResult, ResourceContext, Role};
use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::action::{Action, ActionEngine, ActionOutcome};
use crate::browser::BrowserAutomation;
use crate::config::HarnessConfig;
use crate::credentials::CredentialStore;
use crate::error::{E2eError, E2eResult};
use crate::fixture::{FixtureLocks, FixtureResolver};
use crate::probe::CapabilityProbe;
use crate::report::{CleanupReport, ScenarioReport, ScenarioStatus, StepReport, SuiteReport};
use crate::scenario::{Scenario, Step};
use crate::session::SessionController;

/// Switches that change what a run is permitted to do
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Execute actions no compensator can undo
    pub allow_irreversible: bool,
}

/// Where cleanup finds a created resource whose id was never captured
#[derive(Debug, Clone)]
enum Lookup {
    Club(String),
    Discussion(String),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Club(name) => write!(f, "club '{name}'"),
            Lookup::Discussion(title) => write!(f, "discussion '{title}'"),
        }
    }
}

/// Compensator queued for an action, with the context it applies to
#[derive(Debug, Clone)]
struct Compensation {
    action: Action,
    context: ResourceContext,
    lookup: Option<Lookup>,
    /// The action was seen to complete
    confirmed: bool,
}

impl Compensation {
    /// Queued before the action runs so a deadline or a lost result mid-action
    /// still leaves the undo in place.
    fn tentative(action: &Action, context: &ResourceContext) -> Option<Self> {
        let compensator = action.compensator()?;
        let mut context = context.clone();
        let lookup = match action {
            Action::CreateClub { name, .. } => {
                context.club_id = None;
                Some(Lookup::Club(name.clone()))
            }
            Action::CreateDiscussion { title, .. } => {
                context.discussion_id = None;
                Some(Lookup::Discussion(title.clone()))
            }
            _ => None,
        };
        Some(Self {
            action: compensator,
            context,
            lookup,
            confirmed: false,
        })
    }

    fn confirm(&mut self, context: &ResourceContext) {
        self.context = context.clone();
        self.lookup = None;
        self.confirmed = true;
    }
}

/// Runs scenarios as each role on a single browser, one at a time
pub struct ScenarioRunner<B> {
    browser: B,
    sessions: SessionController,
    probe: CapabilityProbe,
    actions: ActionEngine,
    fixtures: FixtureResolver,
    locks: FixtureLocks,
    credentials: CredentialStore,
    matrix: ExpectationMatrix,
    options: RunOptions,
    scenario_timeout: Duration,
    cleanup_timeout: Duration,
}

impl<B: BrowserAutomation> ScenarioRunner<B> {
    pub fn new(
        config: &HarnessConfig,
        browser: B,
        credentials: CredentialStore,
        matrix: ExpectationMatrix,
    ) -> E2eResult<Self> {
        Ok(Self {
            browser,
            sessions: SessionController::new(config),
            probe: CapabilityProbe::new(config),
            actions: ActionEngine::new(config)?,
            fixtures: FixtureResolver::new(config)?,
            locks: FixtureLocks::new(),
            credentials,
            matrix,
            options: RunOptions::default(),
            scenario_timeout: config.timeouts.scenario(),
            cleanup_timeout: config.timeouts.cleanup(),
        })
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Share fixture locks with other runners touching the same application
    pub fn with_locks(mut self, locks: FixtureLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn browser_mut(&mut self) -> &mut B {
        &mut self.browser
    }

    pub fn sessions(&self) -> &SessionController {
        &self.sessions
    }

    /// Close the browser and hand it back
    pub async fn close(mut self) -> E2eResult<B> {
        self.browser.close().await?;
        Ok(self.browser)
    }

    /// Run every scenario as each of its roles.
    ///
    /// Scenarios and the expectation matrix are validated before the browser
    /// is touched; either being invalid fails the whole run.
    pub async fn run_suite(&mut self, scenarios: &[Scenario]) -> E2eResult<SuiteReport> {
        for scenario in scenarios {
            scenario.validate()?;
        }

        let capabilities: BTreeSet<Capability> =
            scenarios.iter().flat_map(|s| s.capabilities()).collect();
        self.matrix.validate(capabilities)?;

        let started_at = Utc::now();
        let start = Instant::now();
        let mut reports = Vec::new();

        info!("Running {} scenario(s)...", scenarios.len());

        for scenario in scenarios {
            for role in Role::ALL.into_iter().filter(|r| scenario.runs_as(*r)) {
                reports.push(self.run(role, scenario).await);
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        Ok(SuiteReport::new(started_at, duration_ms, reports))
    }

    /// Run one scenario as `role`: establish, execute, clean up, tear down.
    pub async fn run(&mut self, role: Role, scenario: &Scenario) -> ScenarioReport {
        let started_at = Utc::now();
        let start = Instant::now();

        let _fixture_guard = match &scenario.fixture {
            Some(fixture) => Some(self.locks.acquire(fixture).await),
            None => None,
        };

        info!("▶ {} as {}", scenario.name, role);

        let mut context = scenario
            .fixture
            .as_deref()
            .map(ResourceContext::for_fixture)
            .unwrap_or_default();

        let mut handle = match self
            .sessions
            .establish(&mut self.browser, role, self.credentials.get(role))
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                let (status, outcome, why) = match &e {
                    E2eError::CredentialsMissing(_) => {
                        warn!("⊘ {} as {}: {}", scenario.name, role, e);
                        (ScenarioStatus::Skipped, Outcome::SkippedMissingFixture, format!("skipped: {e}"))
                    }
                    _ => {
                        error!("✗ {} as {}: {}", scenario.name, role, e);
                        (ScenarioStatus::Blocked, Outcome::NotExecuted, format!("blocked: {e}"))
                    }
                };
                let steps = scenario
                    .steps
                    .iter()
                    .enumerate()
                    .map(|(i, step)| StepReport {
                        outcome,
                        ..StepReport::not_executed(i, step.label(), step.capability(), &why)
                    })
                    .collect();

                return ScenarioReport {
                    scenario: scenario.name.clone(),
                    role,
                    session_id: None,
                    status,
                    started_at,
                    duration_ms: start.elapsed().as_millis() as u64,
                    steps,
                    cleanup: vec![],
                    error: Some(e.to_string()),
                };
            }
        };

        let deadline = scenario.deadline(self.scenario_timeout);
        let mut steps = Vec::with_capacity(scenario.steps.len());
        let mut compensations: Vec<Compensation> = Vec::new();

        let aborted = timeout(
            deadline,
            self.execute_steps(role, scenario, &mut context, &mut steps, &mut compensations),
        )
        .await
        .is_err();

        if aborted {
            warn!(
                "{} as {} hit its {} ms deadline after {} step(s)",
                scenario.name,
                role,
                deadline.as_millis(),
                steps.len()
            );
            let why = format!("aborted: scenario deadline of {} ms expired", deadline.as_millis());
            for (i, step) in scenario.steps.iter().enumerate().skip(steps.len()) {
                steps.push(StepReport::not_executed(i, step.label(), step.capability(), &why));
            }
        }

        let cleanup = self.run_cleanup(compensations).await;

        let mut error = None;
        if let Err(e) = self.sessions.teardown(&mut self.browser, &mut handle).await {
            error!("Teardown of session {} failed: {}", handle.id(), e);
            error = Some(e.to_string());
        }

        let status = scenario_status(aborted, &steps);
        ScenarioReport {
            scenario: scenario.name.clone(),
            role,
            session_id: Some(handle.id()),
            status,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            cleanup,
            error,
        }
    }

    async fn execute_steps(
        &mut self,
        role: Role,
        scenario: &Scenario,
        context: &mut ResourceContext,
        reports: &mut Vec<StepReport>,
        compensations: &mut Vec<Compensation>,
    ) {
        let mut fixture_missing: Option<String> = None;
        let mut halted: Option<(Outcome, String)> = None;

        for (index, step) in scenario.steps.iter().enumerate() {
            if let Some(why) = &fixture_missing {
                reports.push(StepReport {
                    outcome: Outcome::SkippedMissingFixture,
                    ..StepReport::not_executed(index, step.label(), step.capability(), why)
                });
                continue;
            }
            if let Some((outcome, why)) = &halted {
                reports.push(StepReport {
                    outcome: *outcome,
                    ..StepReport::not_executed(index, step.label(), step.capability(), why)
                });
                continue;
            }

            let started = Instant::now();
            let mut report = self.execute_step(index, role, step, context, compensations).await;
            report.duration_ms = started.elapsed().as_millis() as u64;

            if let Step::RequireFixture { .. } = step {
                if report.outcome == Outcome::SkippedMissingFixture {
                    fixture_missing = report.diagnostics.first().cloned();
                }
            }
            if step.is_blocking() {
                if report.unexpected || report.outcome == Outcome::ProbeFailed {
                    warn!("Blocking step {} ({}) failed, halting", index + 1, report.label);
                    halted = Some((Outcome::NotExecuted, format!("blocked by step {}", index + 1)));
                } else if report.outcome.is_skipped() {
                    info!("Blocking step {} ({}) was skipped, so are its dependents", index + 1, report.label);
                    halted = Some((report.outcome, format!("step {} was skipped", index + 1)));
                }
            }

            reports.push(report);
        }
    }

    async fn execute_step(
        &mut self,
        index: usize,
        role: Role,
        step: &Step,
        context: &mut ResourceContext,
        compensations: &mut Vec<Compensation>,
    ) -> StepReport {
        let mut report = StepReport {
            index,
            label: step.label(),
            capability: step.capability(),
            expected: None,
            outcome: Outcome::NotExecuted,
            unexpected: false,
            diagnostics: vec![],
            duration_ms: 0,
        };

        let capability = match step {
            Step::RequireFixture { club, discussion } => {
                match self.require_fixture(context, discussion.as_deref()).await {
                    Ok(Ok(note)) => {
                        report.outcome = Outcome::Allowed;
                        report.diagnostics.push(note);
                    }
                    Ok(Err(missing)) => {
                        warn!("Fixture '{}' not found ({}); skipping the rest of the scenario", club, missing);
                        report.outcome = Outcome::SkippedMissingFixture;
                        report.diagnostics.push(E2eError::FixtureMissing(missing).to_string());
                    }
                    Err(e) => {
                        report.outcome = Outcome::ProbeFailed;
                        report.diagnostics.push(e.to_string());
                    }
                }
                return report;
            }
            Step::Probe { capability, .. } => *capability,
            Step::Action { action, .. } => action.capability(),
        };

        let expected = step
            .expectation_override()
            .or_else(|| self.matrix.expected_outcome(role, capability));
        report.expected = expected;

        if expected == Some(Expectation::Indeterminate) {
            report.outcome = Outcome::SkippedMissingFixture;
            report.diagnostics.push(format!(
                "{capability} for {role} depends on fixture data; not asserted"
            ));
            return report;
        }

        let result = match step {
            Step::Action { action, irreversible, retries, .. } => {
                if (*irreversible || action.is_irreversible()) && !self.options.allow_irreversible {
                    report.outcome = Outcome::SkippedByPolicy;
                    report
                        .diagnostics
                        .push(format!("{action} cannot be undone; run with irreversible actions allowed"));
                    return report;
                }
                let outcome = self.perform_action(role, action, *irreversible, *retries, context, compensations).await;
                report.diagnostics.extend(outcome.diagnostics);
                outcome.result
            }
            _ => self.probe.probe(&mut self.browser, capability, context).await,
        };

        if let ProbeResult::ProbeFailed { reason } = &result {
            report.diagnostics.push(reason.clone());
        }
        report.outcome = result.outcome();

        match expected {
            Some(expectation) => {
                report.unexpected = expectation.verdict(&result) == Some(false);
                if report.unexpected {
                    error!(
                        "Unexpected outcome: {} as {} expected {} got {}",
                        capability, role, expectation, report.outcome
                    );
                }
            }
            None => report.diagnostics.push(format!("no expectation recorded for {role}/{capability}")),
        }

        report
    }

    /// Resolve the fixture ids into `context`. The inner `Err` names what is missing.
    async fn require_fixture(
        &mut self,
        context: &mut ResourceContext,
        discussion: Option<&str>,
    ) -> E2eResult<Result<String, String>> {
        let fixture = context.fixture.clone().unwrap_or_default();

        let Some(club_id) = self.fixtures.resolve(&mut self.browser, context).await? else {
            return Ok(Err(fixture));
        };
        context.club_id = Some(club_id);

        let Some(title) = discussion else {
            return Ok(Ok(format!("club id {club_id}")));
        };
        match self.fixtures.resolve_discussion(&mut self.browser, context, title).await? {
            Some(id) => {
                context.discussion_id = Some(id);
                Ok(Ok(format!("club id {club_id}, discussion id {id}")))
            }
            None => Ok(Err(format!("{fixture} / {title}"))),
        }
    }

    async fn perform_action(
        &mut self,
        role: Role,
        action: &Action,
        irreversible: bool,
        retries: u8,
        context: &mut ResourceContext,
        compensations: &mut Vec<Compensation>,
    ) -> ActionOutcome {
        if irreversible || action.is_irreversible() {
            warn!(
                "!!! IRREVERSIBLE: {} as {} on {:?} cannot be undone by cleanup",
                action, role, context.fixture
            );
        }

        let queued = Compensation::tentative(action, context).map(|c| {
            compensations.push(c);
            compensations.len() - 1
        });

        let mut outcome = self.actions.perform(&mut self.browser, action, context).await;
        if outcome.result.is_failed() && retries > 0 {
            if outcome.dispatched {
                warn!("Not retrying {}: it was submitted and may have taken effect", action);
            } else {
                info!("Retrying {} once after: {:?}", action, outcome.result);
                outcome = self.actions.perform(&mut self.browser, action, context).await;
            }
        }

        if let Some(slot) = queued {
            match (&outcome.result, outcome.dispatched) {
                (ProbeResult::Allowed, _) => {
                    let compensation = &mut compensations[slot];
                    compensation.confirm(context);
                    debug!("Queued {} to undo {}", compensation.action, action);
                }
                (ProbeResult::ProbeFailed { .. }, true) => {
                    warn!("{} is unconfirmed; its compensator stays queued", action);
                }
                _ => compensations.truncate(slot),
            }
        }
        outcome
    }

    /// Replay compensators newest first
    async fn run_cleanup(&mut self, compensations: Vec<Compensation>) -> Vec<CleanupReport> {
        let mut reports = Vec::with_capacity(compensations.len());

        for mut compensation in compensations.into_iter().rev() {
            let label = compensation.action.to_string();
            let report = match timeout(self.cleanup_timeout, self.compensate(&mut compensation)).await {
                Ok(report) => report,
                Err(_) => CleanupReport {
                    action: label,
                    outcome: Outcome::ProbeFailed,
                    diagnostics: vec![format!(
                        "cleanup timed out after {} ms",
                        self.cleanup_timeout.as_millis()
                    )],
                },
            };

            if report.succeeded() {
                debug!("Cleanup {} done", report.action);
            } else {
                warn!("Cleanup {} did not complete: {:?}", report.action, report.diagnostics);
            }
            reports.push(report);
        }

        reports
    }

    async fn compensate(&mut self, compensation: &mut Compensation) -> CleanupReport {
        let action = compensation.action.to_string();

        if let Some(lookup) = compensation.lookup.clone() {
            match self.locate(&lookup, &compensation.context).await {
                Ok(Some(id)) => match lookup {
                    Lookup::Club(_) => compensation.context.club_id = Some(id),
                    Lookup::Discussion(_) => compensation.context.discussion_id = Some(id),
                },
                Ok(None) => {
                    return CleanupReport {
                        action,
                        outcome: Outcome::SkippedMissingFixture,
                        diagnostics: vec![format!("{lookup} not found; nothing to undo")],
                    }
                }
                Err(e) => {
                    return CleanupReport {
                        action,
                        outcome: Outcome::ProbeFailed,
                        diagnostics: vec![format!("could not look up {lookup}: {e}")],
                    }
                }
            }
        }

        let outcome = self
            .actions
            .perform(&mut self.browser, &compensation.action, &mut compensation.context)
            .await;

        // An unconfirmed action that never landed leaves no affordance to undo it.
        if !compensation.confirmed && !outcome.dispatched && outcome.result == ProbeResult::Denied {
            let mut diagnostics = vec![format!("{action} not offered; nothing to undo")];
            diagnostics.extend(outcome.diagnostics);
            return CleanupReport {
                action,
                outcome: Outcome::SkippedMissingFixture,
                diagnostics,
            };
        }

        let mut diagnostics = outcome.diagnostics;
        if let ProbeResult::ProbeFailed { reason } = &outcome.result {
            diagnostics.push(reason.clone());
        }
        CleanupReport {
            action,
            outcome: outcome.result.outcome(),
            diagnostics,
        }
    }

    async fn locate(&mut self, lookup: &Lookup, context: &ResourceContext) -> E2eResult<Option<u64>> {
        match lookup {
            Lookup::Club(name) => {
                let by_name = ResourceContext::for_fixture(name.as_str());
                self.fixtures.resolve(&mut self.browser, &by_name).await
            }
            Lookup::Discussion(title) => {
                self.fixtures
                    .resolve_discussion(&mut self.browser, context, title)
                    .await
            }
        }
    }
}

fn scenario_status(aborted: bool, steps: &[StepReport]) -> ScenarioStatus {
    let fixture_missing = steps
        .iter()
        .any(|s| s.capability.is_none() && s.outcome == Outcome::SkippedMissingFixture);

    if steps.iter().any(|s| s.unexpected) {
        ScenarioStatus::Failed
    } else if aborted {
        ScenarioStatus::Aborted
    } else if fixture_missing {
        ScenarioStatus::Skipped
    } else if steps.iter().any(|s| s.outcome == Outcome::ProbeFailed) {
        ScenarioStatus::Inconclusive
    } else {
        ScenarioStatus::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(capability: Option<Capability>, outcome: Outcome, unexpected: bool) -> StepReport {
        StepReport {
            index: 0,
            label: "step".to_string(),
            capability,
            expected: None,
            outcome,
            unexpected,
            diagnostics: vec![],
            duration_ms: 0,
        }
    }

    #[test]
    fn unexpected_outcome_fails_the_scenario() {
        let steps = [
            step(Some(Capability::EditSettings), Outcome::Allowed, true),
            step(Some(Capability::ViewDiscussion), Outcome::NotExecuted, false),
        ];
        assert_eq!(scenario_status(true, &steps), ScenarioStatus::Failed);
    }

    #[test]
    fn missing_fixture_skips() {
        let steps = [
            step(None, Outcome::SkippedMissingFixture, false),
            step(Some(Capability::JoinClub), Outcome::SkippedMissingFixture, false),
        ];
        assert_eq!(scenario_status(false, &steps), ScenarioStatus::Skipped);
    }

    #[test]
    fn indeterminate_expectations_still_pass() {
        let steps = [step(Some(Capability::ReviewApplications), Outcome::SkippedMissingFixture, false)];
        assert_eq!(scenario_status(false, &steps), ScenarioStatus::Passed);
    }

    #[test]
    fn probe_failures_are_inconclusive() {
        let steps = [step(Some(Capability::ManageEvents), Outcome::ProbeFailed, false)];
        assert_eq!(scenario_status(false, &steps), ScenarioStatus::Inconclusive);
        assert_eq!(scenario_status(true, &steps), ScenarioStatus::Aborted);
    }
}
