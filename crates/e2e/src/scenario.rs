//! Declarative YAML access scenarios

use clubhouse_common::{Capability, Expectation, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use crate::action::Action;
use crate::error::{E2eError, E2eResult};

/// An ordered list of probes and actions run once per role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Roles to run as; every role when omitted
    #[serde(default = "all_roles")]
    pub roles: Vec<Role>,

    /// Shared fixture club this scenario touches
    #[serde(default)]
    pub fixture: Option<String>,

    /// Overrides the configured scenario deadline
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    pub steps: Vec<Step>,
}

fn all_roles() -> Vec<Role> {
    Role::ALL.to_vec()
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Resolve the fixture club (and optionally one of its discussions by
    /// title); every later step is skipped when either is missing
    RequireFixture {
        club: String,
        #[serde(default)]
        discussion: Option<String>,
    },

    /// Check whether the capability is offered, without changing anything
    Probe {
        capability: Capability,
        /// Defaults to the matrix entry for the running role
        #[serde(default)]
        expect: Option<Expectation>,
        #[serde(default)]
        blocking: bool,
    },

    /// Perform a state-changing action
    Action {
        action: Action,
        #[serde(default)]
        expect: Option<Expectation>,
        #[serde(default)]
        blocking: bool,
        /// Must be set for actions no compensator can undo
        #[serde(default)]
        irreversible: bool,
        /// Extra attempts after an unsettled outcome (0 or 1)
        #[serde(default)]
        retries: u8,
    },
}

impl Step {
    pub fn capability(&self) -> Option<Capability> {
        match self {
            Step::RequireFixture { .. } => None,
            Step::Probe { capability, .. } => Some(*capability),
            Step::Action { action, .. } => Some(action.capability()),
        }
    }

    pub fn is_blocking(&self) -> bool {
        match self {
            Step::RequireFixture { .. } => true,
            Step::Probe { blocking, .. } | Step::Action { blocking, .. } => *blocking,
        }
    }

    /// Explicit expectation, if the scenario overrides the matrix
    pub fn expectation_override(&self) -> Option<Expectation> {
        match self {
            Step::RequireFixture { .. } => None,
            Step::Probe { expect, .. } | Step::Action { expect, .. } => *expect,
        }
    }

    /// Short label used in reports and logs
    pub fn label(&self) -> String {
        match self {
            Step::RequireFixture { club, discussion: None } => format!("require_fixture({club})"),
            Step::RequireFixture { club, discussion: Some(d) } => {
                format!("require_fixture({club} / {d})")
            }
            Step::Probe { capability, .. } => format!("probe {capability}"),
            Step::Action { action, .. } => format!("action {action}"),
        }
    }
}

impl Scenario {
    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let scenario: Self = serde_yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all scenarios from a directory, sorted by name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            scenarios.push(Self::from_file(entry.path())?);
        }

        scenarios.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = scenarios.windows(2).find(|pair| pair[0].name == pair[1].name) {
            return Err(E2eError::InvalidScenario {
                scenario: pair[0].name.clone(),
                reason: "name is used by more than one file".to_string(),
            });
        }

        Ok(scenarios)
    }

    /// Keep only the scenarios carrying `tag`
    pub fn filter_by_tag(scenarios: Vec<Self>, tag: &str) -> Vec<Self> {
        scenarios
            .into_iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }

    /// Reject scenarios that could not be run safely
    pub fn validate(&self) -> E2eResult<()> {
        let invalid = |reason: String| E2eError::InvalidScenario {
            scenario: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(invalid("no steps".to_string()));
        }
        if self.roles.is_empty() {
            return Err(invalid("no roles".to_string()));
        }
        if self.timeout_ms == Some(0) {
            return Err(invalid("timeout_ms must be positive".to_string()));
        }

        for (index, step) in self.steps.iter().enumerate() {
            let at = index + 1;
            match step {
                Step::RequireFixture { club, .. } => {
                    if self.fixture.as_deref() != Some(club.as_str()) {
                        return Err(invalid(format!(
                            "step {at} requires '{club}' but the scenario fixture is {:?}",
                            self.fixture
                        )));
                    }
                }
                Step::Probe { .. } => {}
                Step::Action { action, irreversible, retries, .. } => {
                    if action.is_irreversible() && !irreversible {
                        return Err(invalid(format!(
                            "step {at} ({action}) cannot be undone and must be marked irreversible"
                        )));
                    }
                    if *retries > 1 {
                        return Err(invalid(format!(
                            "step {at} asks for {retries} retries, at most 1 is allowed"
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Capabilities exercised by this scenario
    pub fn capabilities(&self) -> BTreeSet<Capability> {
        self.steps.iter().filter_map(Step::capability).collect()
    }

    pub fn runs_as(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn deadline(&self, default: Duration) -> Duration {
        self.timeout_ms.map(Duration::from_millis).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMBERSHIP: &str = r#"
name: membership-round-trip
description: Join and leave the shared fixture club
tags:
  - membership
  - smoke
roles: [member, admin]
fixture: Test Club
steps:
  - step: require_fixture
    club: Test Club
  - step: probe
    capability: manage_members
  - step: action
    action:
      kind: join_club
    expect: allowed
    blocking: true
"#;

    #[test]
    fn parses_scenario() {
        let scenario = Scenario::from_yaml(MEMBERSHIP).unwrap();
        assert_eq!(scenario.name, "membership-round-trip");
        assert_eq!(scenario.roles, vec![Role::Member, Role::Admin]);
        assert_eq!(scenario.steps.len(), 3);
        assert!(scenario.steps[2].is_blocking());
        assert_eq!(
            scenario.steps[2].expectation_override(),
            Some(Expectation::Allowed)
        );
        assert_eq!(
            scenario.capabilities().into_iter().collect::<Vec<_>>(),
            vec![Capability::JoinClub, Capability::ManageMembers]
        );
    }

    #[test]
    fn roles_default_to_all() {
        let yaml = "name: x\nsteps:\n  - step: probe\n    capability: view_discussion\n";
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.roles, Role::ALL.to_vec());
        assert_eq!(
            scenario.deadline(Duration::from_secs(120)),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn rejects_unflagged_irreversible_action() {
        let yaml = r#"
name: delete-unflagged
fixture: Test Club
steps:
  - step: action
    action:
      kind: delete_club
"#;
        let err = Scenario::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, E2eError::InvalidScenario { .. }));
        assert!(err.to_string().contains("irreversible"));
    }

    #[test]
    fn accepts_flagged_irreversible_action() {
        let yaml = r#"
name: delete-flagged
steps:
  - step: action
    action:
      kind: remove_member
      username: reader
    irreversible: true
"#;
        Scenario::from_yaml(yaml).unwrap();
    }

    #[test]
    fn rejects_more_than_one_retry() {
        let yaml = r#"
name: retry-happy
steps:
  - step: action
    action:
      kind: join_club
    retries: 3
"#;
        assert!(Scenario::from_yaml(yaml).is_err());
    }

    #[test]
    fn fixture_must_match_scenario() {
        let yaml = r#"
name: wrong-fixture
fixture: Test Club
steps:
  - step: require_fixture
    club: Other Club
"#;
        assert!(Scenario::from_yaml(yaml).is_err());
    }

    #[test]
    fn filters_by_tag() {
        let tagged = Scenario::from_yaml(MEMBERSHIP).unwrap();
        let untagged = Scenario::from_yaml(
            "name: plain\nsteps:\n  - step: probe\n    capability: create_club\n",
        )
        .unwrap();
        let smoke = Scenario::filter_by_tag(vec![tagged, untagged], "smoke");
        assert_eq!(smoke.len(), 1);
        assert_eq!(smoke[0].name, "membership-round-trip");
    }
}
