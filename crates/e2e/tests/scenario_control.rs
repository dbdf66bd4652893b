use clubhouse_common::{Capability, Expectation, ExpectationMatrix, Outcome, Role};
use clubhouse_e2e::mock::FIXTURE_CLUB;
use clubhouse_e2e::{
    CredentialStore, Credentials, E2eError, HarnessConfig, Scenario, ScenarioRunner, ScenarioStatus,
    SimulatedClubApp,
};
use std::time::Duration;

fn runner(app: SimulatedClubApp) -> ScenarioRunner<SimulatedClubApp> {
    runner_with(app, SimulatedClubApp::credentials())
}

fn runner_with(app: SimulatedClubApp, credentials: CredentialStore) -> ScenarioRunner<SimulatedClubApp> {
    ScenarioRunner::new(
        &HarnessConfig::default(),
        app,
        credentials,
        ExpectationMatrix::reading_club(),
    )
    .unwrap()
}

const SETTINGS_THEN_DISCUSSIONS: &str = r#"
name: settings-gate
fixture: Test Club
steps:
  - step: require_fixture
    club: Test Club
  - step: probe
    capability: edit_settings
    expect: allowed
    blocking: true
  - step: probe
    capability: view_discussion
"#;

/// Blocking Step Test
///
/// When a blocking step does not come out as expected, the remaining steps
/// are reported as not executed instead of being run against a state the
/// scenario did not plan for.
#[tokio::test]
async fn blocking_failure_halts_remaining_steps() {
    let scenario = Scenario::from_yaml(SETTINGS_THEN_DISCUSSIONS).unwrap();
    let mut runner = runner(SimulatedClubApp::new());

    let report = runner.run(Role::Member, &scenario).await;
    assert_eq!(report.outcome_of(1), Some(Outcome::Denied));
    assert!(report.steps[1].unexpected);
    assert_eq!(report.outcome_of(2), Some(Outcome::NotExecuted));
    assert_eq!(report.steps[2].diagnostics, vec!["blocked by step 2".to_string()]);
    assert_eq!(report.status, ScenarioStatus::Failed);
}

/// Missing Fixture Test
///
/// If the fixture club is gone every step is skipped, the scenario is
/// reported as skipped, and the run does not fail because of it.
#[tokio::test]
async fn missing_fixture_skips_without_failing() {
    let scenario = Scenario::from_yaml(SETTINGS_THEN_DISCUSSIONS).unwrap();
    let mut app = SimulatedClubApp::new();
    assert!(app.remove_club(FIXTURE_CLUB));
    let mut runner = runner(app);

    let suite = runner.run_suite(&[scenario]).await.unwrap();
    for report in &suite.scenarios {
        assert_eq!(report.status, ScenarioStatus::Skipped, "{}", report.role);
        assert!(report
            .steps
            .iter()
            .all(|s| s.outcome == Outcome::SkippedMissingFixture));
        assert!(report.steps[2].diagnostics[0].contains(FIXTURE_CLUB));
    }
    assert!(suite.success());
    assert_eq!(suite.counts.skipped_missing_fixture, 2 * Role::ALL.len());
}

/// Blocked Session Test
///
/// A role whose sign-in fails runs none of its steps; other roles in the
/// same suite are unaffected.
#[tokio::test]
async fn failed_sign_in_blocks_only_that_role() {
    let scenario = Scenario::from_yaml(
        r#"
name: discussions-visible
roles: [member, admin]
fixture: Test Club
steps:
  - step: require_fixture
    club: Test Club
  - step: probe
    capability: view_discussion
"#,
    )
    .unwrap();

    let credentials = SimulatedClubApp::credentials()
        .with(Role::Member, Credentials::new("mia", "stale-password"));
    let mut runner = runner_with(SimulatedClubApp::new(), credentials);
    let suite = runner.run_suite(&[scenario]).await.unwrap();

    let member = suite.scenarios.iter().find(|r| r.role == Role::Member).unwrap();
    assert_eq!(member.status, ScenarioStatus::Blocked);
    assert_eq!(member.session_id, None);
    assert!(member.steps.iter().all(|s| s.outcome == Outcome::NotExecuted));
    assert!(member.error.as_deref().unwrap_or_default().contains("login rejected"));

    let admin = suite.scenarios.iter().find(|r| r.role == Role::Admin).unwrap();
    assert_eq!(admin.status, ScenarioStatus::Passed);
    assert_eq!(admin.outcome_of(1), Some(Outcome::Allowed));
}

/// Missing Credentials Test
///
/// A role with no credentials configured is a configuration gap: its
/// scenarios are skipped rather than blocked, and the run still succeeds.
#[tokio::test]
async fn missing_credentials_skip_that_role() {
    let scenario = Scenario::from_yaml(
        r#"
name: discussions-visible
roles: [guest, member]
fixture: Test Club
steps:
  - step: require_fixture
    club: Test Club
  - step: probe
    capability: view_discussion
"#,
    )
    .unwrap();

    let mut runner = runner_with(SimulatedClubApp::new(), CredentialStore::new());
    let suite = runner.run_suite(&[scenario]).await.unwrap();

    let member = suite.scenarios.iter().find(|r| r.role == Role::Member).unwrap();
    assert_eq!(member.status, ScenarioStatus::Skipped);
    assert_eq!(member.session_id, None);
    assert!(member
        .steps
        .iter()
        .all(|s| s.outcome == Outcome::SkippedMissingFixture));
    assert!(member.error.as_deref().unwrap_or_default().contains("missing"));

    let guest = suite.scenarios.iter().find(|r| r.role == Role::Guest).unwrap();
    assert_eq!(guest.status, ScenarioStatus::Passed);
    assert!(suite.success());
}

/// Skipped Blocking Step Test
///
/// A blocking step that is skipped by policy skips its dependents the same
/// way, instead of letting them run against a state that never came about.
#[tokio::test]
async fn skipped_blocking_step_skips_its_dependents() {
    let scenario = Scenario::from_yaml(
        r#"
name: hand-over-then-delete
roles: [owner]
fixture: Test Club
steps:
  - step: require_fixture
    club: Test Club
  - step: action
    action:
      kind: transfer_ownership
      to: adam
    irreversible: true
    blocking: true
  - step: probe
    capability: delete_club
    expect: denied
"#,
    )
    .unwrap();

    let mut runner = runner(SimulatedClubApp::new());
    let suite = runner.run_suite(&[scenario]).await.unwrap();
    let report = &suite.scenarios[0];

    assert_eq!(report.outcome_of(1), Some(Outcome::SkippedByPolicy));
    assert_eq!(report.outcome_of(2), Some(Outcome::SkippedByPolicy));
    assert!(!report.steps[2].unexpected);
    assert_eq!(report.steps[2].diagnostics, vec!["step 2 was skipped".to_string()]);
    assert_eq!(report.status, ScenarioStatus::Passed);
    assert!(suite.success());

    let club = runner.browser().club_id(FIXTURE_CLUB).unwrap();
    assert_eq!(runner.browser().owner_of(club), Some("olivia"));
}

/// Indeterminate Blocking Step Test
#[tokio::test]
async fn indeterminate_blocking_step_skips_its_dependents() {
    let scenario = Scenario::from_yaml(
        r#"
name: leave-then-rejoin
roles: [member]
fixture: Test Club
steps:
  - step: require_fixture
    club: Test Club
  - step: probe
    capability: leave_club
    blocking: true
  - step: probe
    capability: join_club
    expect: denied
"#,
    )
    .unwrap();

    let mut runner = runner(SimulatedClubApp::new());
    let report = runner.run(Role::Member, &scenario).await;

    assert_eq!(report.outcome_of(1), Some(Outcome::SkippedMissingFixture));
    assert_eq!(report.outcome_of(2), Some(Outcome::SkippedMissingFixture));
    assert!(!report.has_unexpected());
    assert_eq!(report.status, ScenarioStatus::Passed);
}

/// Scenario Deadline Test
///
/// A scenario that overruns its deadline is aborted: the unfinished steps
/// are not executed, yet the compensators queued so far still run.
#[tokio::test(start_paused = true)]
async fn deadline_aborts_but_still_cleans_up() {
    let scenario = Scenario::from_yaml(
        r#"
name: slow-membership
roles: [member]
fixture: Test Club
timeout_ms: 2500
steps:
  - step: require_fixture
    club: Test Club
  - step: action
    action:
      kind: join_club
  - step: probe
    capability: leave_club
    expect: allowed
"#,
    )
    .unwrap();

    let mut app = SimulatedClubApp::new();
    app.set_latency(Duration::from_secs(1));
    let mut runner = runner(app);

    let report = runner.run(Role::Member, &scenario).await;
    assert_eq!(report.status, ScenarioStatus::Aborted, "{:?}", report.steps);
    assert_eq!(report.outcome_of(1), Some(Outcome::Allowed));
    assert_eq!(report.outcome_of(2), Some(Outcome::NotExecuted));
    assert!(report.steps[2].diagnostics[0].contains("2500 ms"));

    assert_eq!(report.cleanup.len(), 1);
    assert!(report.cleanup[0].succeeded(), "{:?}", report.cleanup[0]);
    let club = runner.browser().club_id(FIXTURE_CLUB).unwrap();
    assert!(!runner.browser().is_member(club, "mia"));
}

/// Page Readiness Retry Test
///
/// A page that misses its ready marker once is retried and settles; one
/// that never becomes ready is a probe failure, which makes the scenario
/// inconclusive but is never counted as a denial.
#[tokio::test]
async fn unready_pages_are_retried_once() {
    let scenario = Scenario::from_yaml(
        r#"
name: members-link
roles: [admin]
fixture: Test Club
steps:
  - step: require_fixture
    club: Test Club
  - step: probe
    capability: manage_members
"#,
    )
    .unwrap();

    let mut app = SimulatedClubApp::new();
    app.stall("/clubs/1", 1);
    let mut flaky = runner(app);
    let report = flaky.run(Role::Admin, &scenario).await;
    assert_eq!(report.outcome_of(1), Some(Outcome::Allowed));
    assert_eq!(report.status, ScenarioStatus::Passed);

    let mut app = SimulatedClubApp::new();
    app.stall_forever("/clubs/1");
    let mut broken = runner(app);
    let suite = broken.run_suite(&[scenario]).await.unwrap();
    let report = &suite.scenarios[0];
    assert_eq!(report.outcome_of(1), Some(Outcome::ProbeFailed));
    assert!(!report.steps[1].unexpected);
    assert!(report.steps[1].diagnostics.iter().any(|d| d.contains("retried once")));
    assert_eq!(report.status, ScenarioStatus::Inconclusive);
    assert_eq!(suite.counts.denied, 0);
    assert!(suite.success());
}

/// Incomplete Matrix Test
///
/// A matrix without an entry for some role and capability under test stops
/// the run before any page is opened.
#[tokio::test]
async fn incomplete_matrix_fails_before_browsing() {
    let scenario = Scenario::from_yaml(
        "name: join\nsteps:\n  - step: probe\n    capability: join_club\n",
    )
    .unwrap();
    let matrix = ExpectationMatrix::new().with(Role::Member, Capability::JoinClub, Expectation::Allowed);

    let mut runner = ScenarioRunner::new(
        &HarnessConfig::default(),
        SimulatedClubApp::new(),
        SimulatedClubApp::credentials(),
        matrix,
    )
    .unwrap();

    let err = runner.run_suite(&[scenario]).await.unwrap_err();
    assert!(matches!(err, E2eError::Common(_)));
    assert!(err.to_string().contains("guest/join_club"), "{err}");
    assert_eq!(runner.browser().navigations(), 0);
}

/// Deadline Mid-Action Test
///
/// The deadline can expire after an action was submitted but before its
/// result shows. The compensator was queued up front, so cleanup still
/// takes the membership back out.
#[tokio::test(start_paused = true)]
async fn deadline_during_action_still_cleans_up() {
    let scenario = Scenario::from_yaml(
        r#"
name: slow-join
roles: [member]
fixture: Test Club
timeout_ms: 2000
steps:
  - step: require_fixture
    club: Test Club
  - step: action
    action:
      kind: join_club
"#,
    )
    .unwrap();

    let mut app = SimulatedClubApp::new();
    app.set_commit_latency(Duration::from_secs(5));
    let mut runner = runner(app);

    let report = runner.run(Role::Member, &scenario).await;
    assert_eq!(report.status, ScenarioStatus::Aborted, "{:?}", report.steps);
    assert_eq!(report.outcome_of(1), Some(Outcome::NotExecuted));

    assert_eq!(report.cleanup.len(), 1);
    assert_eq!(report.cleanup[0].action, "leave_club");
    assert_eq!(report.cleanup[0].outcome, Outcome::Allowed);

    let club = runner.browser().club_id(FIXTURE_CLUB).unwrap();
    assert!(!runner.browser().is_member(club, "mia"));
}
