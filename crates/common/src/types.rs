//! Core types for the access harness

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Actor identity a scenario runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Guest,
    Member,
    Admin,
    Owner,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Guest, Role::Member, Role::Admin, Role::Owner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Guests browse anonymously and never need credentials
    pub fn requires_credentials(&self) -> bool {
        !matches!(self, Role::Guest)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownRole(s.to_string()))
    }
}

/// A named, atomic permission under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CreateClub,
    JoinClub,
    LeaveClub,
    EditSettings,
    ManageMembers,
    RemoveMember,
    TransferOwnership,
    CreateDiscussion,
    ViewDiscussion,
    DeleteDiscussion,
    ManageEvents,
    ReviewApplications,
    DeleteClub,
}

impl Capability {
    pub const ALL: [Capability; 13] = [
        Capability::CreateClub,
        Capability::JoinClub,
        Capability::LeaveClub,
        Capability::EditSettings,
        Capability::ManageMembers,
        Capability::RemoveMember,
        Capability::TransferOwnership,
        Capability::CreateDiscussion,
        Capability::ViewDiscussion,
        Capability::DeleteDiscussion,
        Capability::ManageEvents,
        Capability::ReviewApplications,
        Capability::DeleteClub,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CreateClub => "create_club",
            Capability::JoinClub => "join_club",
            Capability::LeaveClub => "leave_club",
            Capability::EditSettings => "edit_settings",
            Capability::ManageMembers => "manage_members",
            Capability::RemoveMember => "remove_member",
            Capability::TransferOwnership => "transfer_ownership",
            Capability::CreateDiscussion => "create_discussion",
            Capability::ViewDiscussion => "view_discussion",
            Capability::DeleteDiscussion => "delete_discussion",
            Capability::ManageEvents => "manage_events",
            Capability::ReviewApplications => "review_applications",
            Capability::DeleteClub => "delete_club",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Capability::ALL
            .into_iter()
            .find(|cap| cap.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownCapability(s.to_string()))
    }
}

/// Expected outcome of a (role, capability) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    Allowed,
    Denied,
    /// The affordance is visible but activating it sends the actor to sign in.
    Gated,
    /// Depends on fixture data the harness cannot guarantee; skipped, never asserted.
    Indeterminate,
}

impl Expectation {
    /// Whether an observed result agrees with this expectation.
    ///
    /// Returns `None` when no verdict can be reached: the expectation is
    /// indeterminate or the probe itself failed.
    pub fn verdict(&self, observed: &ProbeResult) -> Option<bool> {
        if matches!(self, Expectation::Indeterminate) {
            return None;
        }
        let outcome = observed.as_expectation()?;
        Some(outcome == *self)
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Expectation::Allowed => "allowed",
            Expectation::Denied => "denied",
            Expectation::Gated => "gated",
            Expectation::Indeterminate => "indeterminate",
        };
        f.write_str(s)
    }
}

/// Result of checking one capability against one resource for the current session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ProbeResult {
    Allowed,
    Denied,
    Gated,
    /// The probe could not determine state. Never a synonym for `Denied`.
    ProbeFailed { reason: String },
}

impl ProbeResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        ProbeResult::ProbeFailed { reason: reason.into() }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ProbeResult::ProbeFailed { .. })
    }

    fn as_expectation(&self) -> Option<Expectation> {
        match self {
            ProbeResult::Allowed => Some(Expectation::Allowed),
            ProbeResult::Denied => Some(Expectation::Denied),
            ProbeResult::Gated => Some(Expectation::Gated),
            ProbeResult::ProbeFailed { .. } => None,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            ProbeResult::Allowed => Outcome::Allowed,
            ProbeResult::Denied => Outcome::Denied,
            ProbeResult::Gated => Outcome::Gated,
            ProbeResult::ProbeFailed { .. } => Outcome::ProbeFailed,
        }
    }
}

/// Outcome kinds surfaced in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Allowed,
    Denied,
    Gated,
    ProbeFailed,
    SkippedByPolicy,
    SkippedMissingFixture,
    /// Blocked by an earlier step or aborted by the scenario deadline
    NotExecuted,
}

impl Outcome {
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Outcome::SkippedByPolicy | Outcome::SkippedMissingFixture | Outcome::NotExecuted
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Allowed => "allowed",
            Outcome::Denied => "denied",
            Outcome::Gated => "gated",
            Outcome::ProbeFailed => "probe-failed",
            Outcome::SkippedByPolicy => "skipped-by-policy",
            Outcome::SkippedMissingFixture => "skipped-missing-fixture",
            Outcome::NotExecuted => "not-executed",
        };
        f.write_str(s)
    }
}

/// Concrete resource instance a capability is evaluated against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceContext {
    /// Name of the shared fixture club, if the scenario uses one
    #[serde(default)]
    pub fixture: Option<String>,

    #[serde(default)]
    pub club_id: Option<u64>,

    #[serde(default)]
    pub discussion_id: Option<u64>,

    /// Extra template variables (e.g. names of created resources)
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

impl ResourceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_fixture(name: impl Into<String>) -> Self {
        Self {
            fixture: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_club(mut self, club_id: u64) -> Self {
        self.club_id = Some(club_id);
        self
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "club_id" => self.club_id.map(|id| id.to_string()),
            "discussion_id" => self.discussion_id.map(|id| id.to_string()),
            "fixture" => self.fixture.clone(),
            other => self.vars.get(other).cloned(),
        }
    }

    /// Substitute `{name}` placeholders in a route or field template.
    pub fn render(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| Error::UnresolvedPlaceholder(template.to_string()))?;
            let key = &after[..close];
            let value = self
                .lookup(key)
                .ok_or_else(|| Error::UnresolvedPlaceholder(key.to_string()))?;
            out.push_str(&value);
            rest = &after[close + 1..];
        }
        out.push_str(rest);

        Ok(out)
    }
}
