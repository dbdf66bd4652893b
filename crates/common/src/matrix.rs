//! Role/capability expectation matrix
//!
//! The matrix is the oracle for every probe and action assertion. It is
//! built once (from YAML or the built-in table), validated at startup and
//! read-only for the rest of the run.
//!
//! ```yaml
//! guest:
//!   create_club: denied
//!   join_club: gated
//! owner:
//!   manage_members: allowed
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Capability, Expectation, Role};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectationMatrix {
    entries: BTreeMap<Role, BTreeMap<Capability, Expectation>>,
}

impl ExpectationMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: Role, capability: Capability, expectation: Expectation) -> Self {
        self.set(role, capability, expectation);
        self
    }

    pub fn set(&mut self, role: Role, capability: Capability, expectation: Expectation) {
        self.entries
            .entry(role)
            .or_default()
            .insert(capability, expectation);
    }

    /// Set the same expectation for several capabilities of one role
    pub fn with_row(mut self, role: Role, row: &[(Capability, Expectation)]) -> Self {
        for (capability, expectation) in row {
            self.set(role, *capability, *expectation);
        }
        self
    }

    pub fn expected_outcome(&self, role: Role, capability: Capability) -> Option<Expectation> {
        self.entries.get(&role)?.get(&capability).copied()
    }

    /// Check that every role has an entry for each capability under test.
    pub fn validate<I>(&self, capabilities: I) -> Result<()>
    where
        I: IntoIterator<Item = Capability>,
    {
        let capabilities: Vec<Capability> = capabilities.into_iter().collect();
        let mut missing = Vec::new();

        for role in Role::ALL {
            for capability in &capabilities {
                if self.expected_outcome(role, *capability).is_none() {
                    missing.push((role, *capability));
                }
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            missing.sort();
            missing.dedup();
            Err(Error::MatrixIncomplete { missing })
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading expectation matrix from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expectations for the reading-club application.
    ///
    /// `member` is a signed-in user who did not create the fixture club and
    /// is not yet in it; `admin` is a club admin who is not the owner.
    pub fn reading_club() -> Self {
        use Capability::*;
        use Expectation::*;

        Self::new()
            .with_row(
                Role::Guest,
                &[
                    (CreateClub, Denied),
                    (JoinClub, Gated),
                    (LeaveClub, Denied),
                    (EditSettings, Denied),
                    (ManageMembers, Denied),
                    (RemoveMember, Denied),
                    (TransferOwnership, Denied),
                    (CreateDiscussion, Denied),
                    // Public clubs expose discussions to guests, private ones don't.
                    (ViewDiscussion, Indeterminate),
                    (DeleteDiscussion, Denied),
                    (ManageEvents, Denied),
                    (ReviewApplications, Denied),
                    (DeleteClub, Denied),
                ],
            )
            .with_row(
                Role::Member,
                &[
                    (CreateClub, Allowed),
                    (JoinClub, Allowed),
                    (LeaveClub, Indeterminate),
                    (EditSettings, Denied),
                    (ManageMembers, Denied),
                    (RemoveMember, Denied),
                    (TransferOwnership, Denied),
                    (CreateDiscussion, Indeterminate),
                    (ViewDiscussion, Allowed),
                    (DeleteDiscussion, Denied),
                    (ManageEvents, Denied),
                    (ReviewApplications, Denied),
                    (DeleteClub, Denied),
                ],
            )
            .with_row(
                Role::Admin,
                &[
                    (CreateClub, Allowed),
                    (JoinClub, Denied),
                    (LeaveClub, Allowed),
                    (EditSettings, Allowed),
                    (ManageMembers, Allowed),
                    (RemoveMember, Allowed),
                    (TransferOwnership, Denied),
                    (CreateDiscussion, Allowed),
                    (ViewDiscussion, Allowed),
                    (DeleteDiscussion, Allowed),
                    (ManageEvents, Allowed),
                    // Needs a pending application to exist.
                    (ReviewApplications, Indeterminate),
                    (DeleteClub, Denied),
                ],
            )
            .with_row(
                Role::Owner,
                &[
                    (CreateClub, Allowed),
                    (JoinClub, Denied),
                    (LeaveClub, Denied),
                    (EditSettings, Allowed),
                    (ManageMembers, Allowed),
                    (RemoveMember, Allowed),
                    (TransferOwnership, Allowed),
                    (CreateDiscussion, Allowed),
                    (ViewDiscussion, Allowed),
                    (DeleteDiscussion, Allowed),
                    (ManageEvents, Allowed),
                    (ReviewApplications, Indeterminate),
                    (DeleteClub, Allowed),
                ],
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_club_matrix_is_exhaustive() {
        let matrix = ExpectationMatrix::reading_club();
        matrix.validate(Capability::ALL).unwrap();
        assert_eq!(matrix.len(), Role::ALL.len() * Capability::ALL.len());
    }

    #[test]
    fn member_and_owner_disagree_on_manage_members() {
        let matrix = ExpectationMatrix::reading_club();
        assert_eq!(
            matrix.expected_outcome(Role::Member, Capability::ManageMembers),
            Some(Expectation::Denied)
        );
        assert_eq!(
            matrix.expected_outcome(Role::Owner, Capability::ManageMembers),
            Some(Expectation::Allowed)
        );
    }

    #[test]
    fn validation_lists_every_gap() {
        let matrix = ExpectationMatrix::new()
            .with(Role::Guest, Capability::CreateClub, Expectation::Gated)
            .with(Role::Owner, Capability::CreateClub, Expectation::Allowed);

        let err = matrix.validate([Capability::CreateClub]).unwrap_err();
        match err {
            Error::MatrixIncomplete { missing } => {
                assert_eq!(
                    missing,
                    vec![
                        (Role::Member, Capability::CreateClub),
                        (Role::Admin, Capability::CreateClub),
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validation_only_covers_capabilities_under_test() {
        let mut matrix = ExpectationMatrix::new();
        for role in Role::ALL {
            matrix.set(role, Capability::ViewDiscussion, Expectation::Allowed);
        }
        matrix.validate([Capability::ViewDiscussion]).unwrap();
        assert!(matrix.validate([Capability::DeleteClub]).is_err());
    }

    #[test]
    fn parses_yaml_matrix() {
        let yaml = r#"
guest:
  create_club: gated
member:
  create_club: allowed
  manage_members: denied
"#;
        let matrix = ExpectationMatrix::from_yaml(yaml).unwrap();
        assert_eq!(
            matrix.expected_outcome(Role::Guest, Capability::CreateClub),
            Some(Expectation::Gated)
        );
        assert_eq!(matrix.expected_outcome(Role::Admin, Capability::CreateClub), None);
        assert_eq!(matrix.len(), 3);
    }

    #[test]
    fn rejects_unknown_expectation() {
        let yaml = "guest:\n  create_club: maybe\n";
        assert!(matches!(ExpectationMatrix::from_yaml(yaml), Err(Error::Yaml(_))));
    }
}
