use clubhouse_common::{Capability, ExpectationMatrix, Outcome, Role};
use clubhouse_e2e::{HarnessConfig, Scenario, ScenarioRunner, ScenarioStatus, SimulatedClubApp};

fn runner(app: SimulatedClubApp) -> ScenarioRunner<SimulatedClubApp> {
    ScenarioRunner::new(
        &HarnessConfig::default(),
        app,
        SimulatedClubApp::credentials(),
        ExpectationMatrix::reading_club(),
    )
    .unwrap()
}

fn every_capability() -> Scenario {
    let mut yaml = String::from(
        "name: role-matrix\nfixture: Test Club\nsteps:\n  - step: require_fixture\n    club: Test Club\n    discussion: Welcome\n",
    );
    for capability in Capability::ALL {
        yaml.push_str(&format!("  - step: probe\n    capability: {capability}\n"));
    }
    Scenario::from_yaml(&yaml).unwrap()
}

/// Role Matrix Agreement Test
///
/// Probes every capability as every role against the fixture club and
/// asserts the observed UI agrees with the reading-club expectation matrix
/// cell by cell. Indeterminate cells are skipped, never asserted.
#[tokio::test]
async fn observed_ui_matches_reading_club_matrix() {
    let mut runner = runner(SimulatedClubApp::new());
    let suite = runner.run_suite(&[every_capability()]).await.unwrap();

    assert_eq!(suite.scenarios.len(), Role::ALL.len());
    for report in &suite.scenarios {
        let unexpected: Vec<_> = report.unexpected().map(|s| s.label.clone()).collect();
        assert!(unexpected.is_empty(), "{} disagreed on {:?}", report.role, unexpected);
        assert_eq!(report.status, ScenarioStatus::Passed, "{}: {:?}", report.role, report.steps);
        assert_eq!(report.outcome_of(0), Some(Outcome::Allowed), "fixture not resolved for {}", report.role);
    }

    assert!(suite.success());
    assert_eq!(suite.counts.unexpected, 0);
    assert_eq!(suite.counts.probe_failed, 0);
    assert_eq!(suite.counts.gated, 1);
    assert_eq!(suite.counts.skipped_missing_fixture, 5);
    assert_eq!(suite.counts.allowed, 22);
    assert_eq!(suite.counts.denied, 24);
}

/// Member vs Owner Test
///
/// The same probe on the same club has to come out differently for a plain
/// member and for the owner.
#[tokio::test]
async fn member_and_owner_differ_on_manage_members() {
    let scenario = Scenario::from_yaml(
        r#"
name: manage-members
roles: [member, owner]
fixture: Test Club
steps:
  - step: require_fixture
    club: Test Club
  - step: probe
    capability: manage_members
"#,
    )
    .unwrap();

    let mut runner = runner(SimulatedClubApp::new());
    let suite = runner.run_suite(&[scenario]).await.unwrap();
    assert!(suite.success());

    let outcome = |role: Role| {
        suite
            .scenarios
            .iter()
            .find(|r| r.role == role)
            .and_then(|r| r.outcome_of(1))
    };
    assert_eq!(outcome(Role::Member), Some(Outcome::Denied));
    assert_eq!(outcome(Role::Owner), Some(Outcome::Allowed));
}

/// Sign-in Gate Test
///
/// A guest who sees no "create club" entry point is denied. A guest who is
/// shown one that leads to the sign-in page is gated, which the default
/// matrix does not expect and must report.
#[tokio::test]
async fn guest_create_club_is_denied_or_gated() {
    let scenario = Scenario::from_yaml(
        r#"
name: guest-create-club
roles: [guest]
steps:
  - step: probe
    capability: create_club
"#,
    )
    .unwrap();

    let mut hidden = runner(SimulatedClubApp::new());
    let report = hidden.run(Role::Guest, &scenario).await;
    assert_eq!(report.outcome_of(0), Some(Outcome::Denied));
    assert_eq!(report.status, ScenarioStatus::Passed);

    let mut shown = runner(SimulatedClubApp::new().with_guest_create_button());
    let report = shown.run(Role::Guest, &scenario).await;
    assert_eq!(report.outcome_of(0), Some(Outcome::Gated));
    assert!(report.has_unexpected());
    assert_eq!(report.status, ScenarioStatus::Failed);
}
