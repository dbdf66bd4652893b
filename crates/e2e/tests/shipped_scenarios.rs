use clubhouse_common::{Capability, ExpectationMatrix, Outcome};
use clubhouse_e2e::{HarnessConfig, Scenario, ScenarioRunner, ScenarioStatus, SimulatedClubApp};
use std::path::PathBuf;

fn crate_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Matrix File Test
///
/// The matrix shipped next to the scenarios is the built-in reading-club
/// matrix, spelled out.
#[test]
fn shipped_matrix_matches_built_in() {
    let matrix = ExpectationMatrix::from_file(&crate_dir().join("matrix/reading-club.yaml")).unwrap();
    matrix.validate(Capability::ALL).unwrap();
    assert_eq!(matrix, ExpectationMatrix::reading_club());
}

/// Example Config Test
#[test]
fn example_config_loads() {
    let config = HarnessConfig::from_file(&crate_dir().join("harness.example.yaml")).unwrap();
    assert_eq!(config.timeouts.affordance_ms, 1500);
    let events = config.catalog.affordance(Capability::ManageEvents).unwrap();
    assert_eq!(events.route, "/clubs/{club_id}/events");
    assert!(config.catalog.action(Capability::JoinClub).is_some());
}

/// Shipped Scenario Test
///
/// Every scenario in `scenarios/` runs clean against the simulated
/// application: no unexpected outcome, nothing inconclusive, every
/// compensator succeeds, and the fixture is left as it was found.
#[tokio::test]
async fn shipped_scenarios_pass_against_simulated_app() {
    let scenarios = Scenario::load_all(&crate_dir().join("scenarios")).unwrap();
    assert!(scenarios.len() >= 5);

    let mut runner = ScenarioRunner::new(
        &HarnessConfig::default(),
        SimulatedClubApp::new(),
        SimulatedClubApp::credentials(),
        ExpectationMatrix::reading_club(),
    )
    .unwrap();

    let suite = runner.run_suite(&scenarios).await.unwrap();
    for report in &suite.scenarios {
        assert!(
            matches!(report.status, ScenarioStatus::Passed),
            "{} as {} was {:?}: {:?}",
            report.scenario,
            report.role,
            report.status,
            report.steps
        );
        assert_eq!(report.cleanup_failures(), 0, "{} as {}", report.scenario, report.role);
    }
    assert!(suite.success());
    assert_eq!(suite.counts.probe_failed, 0);

    let destructive = suite
        .scenarios
        .iter()
        .find(|r| r.scenario == "remove-member")
        .unwrap();
    assert_eq!(destructive.outcome_of(1), Some(Outcome::SkippedByPolicy));

    let app = runner.browser();
    let club = app.club_id("Test Club").unwrap();
    assert_eq!(app.club_count(), 1);
    assert_eq!(app.discussion_count(club), 1);
    assert!(app.is_member(club, "reader"));
    assert!(!app.is_member(club, "mia"));
}
