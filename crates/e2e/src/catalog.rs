//! Capability catalog
//!
//! Maps every capability to the UI affordance that exposes it and, for the
//! capabilities that can be exercised, to the interaction script that
//! performs it. Route and value templates use `{name}` placeholders that are
//! filled from the [`ResourceContext`](clubhouse_common::ResourceContext).

use clubhouse_common::Capability;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PAGE_READY: &str = r#"[data-testid="page-ready"]"#;
const CONFIRM: &str = r#"[data-testid="confirm-button"]"#;

fn testid(id: &str) -> String {
    format!(r#"[data-testid="{id}"]"#)
}

fn default_true() -> bool {
    true
}

/// Where and how a capability shows up in the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affordance {
    /// Route template the affordance lives on
    pub route: String,

    /// Element that marks the page as rendered
    #[serde(default)]
    pub ready: Option<String>,

    pub selector: String,

    /// A present but disabled affordance counts as denied
    #[serde(default = "default_true")]
    pub require_enabled: bool,

    /// Follow the affordance's link target to detect a sign-in gate
    #[serde(default)]
    pub follow_link: bool,
}

impl Affordance {
    fn on(route: &str, selector: String) -> Self {
        Self {
            route: route.to_string(),
            ready: None,
            selector,
            require_enabled: true,
            follow_link: false,
        }
    }

    fn gated(mut self) -> Self {
        self.follow_link = true;
        self
    }

    pub fn ready_selector(&self) -> &str {
        self.ready.as_deref().unwrap_or(PAGE_READY)
    }
}

/// One UI interaction inside an action script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "do", rename_all = "snake_case")]
pub enum Interaction {
    Click { selector: String },
    Fill { selector: String, value: String },
}

impl Interaction {
    pub fn selector(&self) -> &str {
        match self {
            Interaction::Click { selector } | Interaction::Fill { selector, .. } => selector,
        }
    }
}

/// Resource id recovered from the URL after an action completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureTarget {
    ClubId,
    DiscussionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionScript {
    pub route: String,

    #[serde(default)]
    pub ready: Option<String>,

    pub interactions: Vec<Interaction>,

    #[serde(default)]
    pub capture: Option<CaptureTarget>,
}

impl ActionScript {
    fn on(route: &str, interactions: Vec<Interaction>) -> Self {
        Self {
            route: route.to_string(),
            ready: None,
            interactions,
            capture: None,
        }
    }

    fn capturing(mut self, target: CaptureTarget) -> Self {
        self.capture = Some(target);
        self
    }

    pub fn ready_selector(&self) -> &str {
        self.ready.as_deref().unwrap_or(PAGE_READY)
    }
}

fn click(selector: impl Into<String>) -> Interaction {
    Interaction::Click { selector: selector.into() }
}

fn fill(selector: impl Into<String>, value: &str) -> Interaction {
    Interaction::Fill {
        selector: selector.into(),
        value: value.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityCatalog {
    pub affordances: BTreeMap<Capability, Affordance>,
    pub actions: BTreeMap<Capability, ActionScript>,
}

impl CapabilityCatalog {
    pub fn affordance(&self, capability: Capability) -> Option<&Affordance> {
        self.affordances.get(&capability)
    }

    pub fn action(&self, capability: Capability) -> Option<&ActionScript> {
        self.actions.get(&capability)
    }

    /// Fill entries a partial config left out with the built-in ones
    pub fn fill_defaults(&mut self) {
        let defaults = Self::default();
        for (capability, affordance) in defaults.affordances {
            self.affordances.entry(capability).or_insert(affordance);
        }
        for (capability, script) in defaults.actions {
            self.actions.entry(capability).or_insert(script);
        }
    }
}

impl Default for CapabilityCatalog {
    fn default() -> Self {
        use Capability::*;

        const CLUB: &str = "/clubs/{club_id}";
        const MEMBERS: &str = "/clubs/{club_id}/members";
        const SETTINGS: &str = "/clubs/{club_id}/settings";
        const DISCUSSION: &str = "/clubs/{club_id}/discussions/{discussion_id}";

        let affordances = BTreeMap::from([
            (CreateClub, Affordance::on("/clubs", testid("create-club-button")).gated()),
            (JoinClub, Affordance::on(CLUB, testid("join-club-button")).gated()),
            (LeaveClub, Affordance::on(CLUB, testid("leave-club-button"))),
            (EditSettings, Affordance::on(CLUB, testid("club-settings-link"))),
            (ManageMembers, Affordance::on(CLUB, testid("manage-members-link"))),
            (RemoveMember, Affordance::on(MEMBERS, testid("remove-member-button"))),
            (TransferOwnership, Affordance::on(MEMBERS, testid("transfer-ownership-button"))),
            (CreateDiscussion, Affordance::on(CLUB, testid("new-discussion-button"))),
            (ViewDiscussion, Affordance::on(CLUB, testid("discussion-list"))),
            (DeleteDiscussion, Affordance::on(DISCUSSION, testid("delete-discussion-button"))),
            (ManageEvents, Affordance::on(CLUB, testid("manage-events-link"))),
            (ReviewApplications, Affordance::on(CLUB, testid("review-applications-link"))),
            (DeleteClub, Affordance::on(SETTINGS, testid("delete-club-button"))),
        ]);

        let actions = BTreeMap::from([
            (JoinClub, ActionScript::on(CLUB, vec![click(testid("join-club-button"))])),
            (
                LeaveClub,
                ActionScript::on(CLUB, vec![click(testid("leave-club-button")), click(CONFIRM)]),
            ),
            (
                CreateClub,
                ActionScript::on(
                    "/clubs/new",
                    vec![
                        fill(testid("club-name-input"), "{club_name}"),
                        fill(testid("club-description-input"), "{club_description}"),
                        click(testid("create-club-submit")),
                    ],
                )
                .capturing(CaptureTarget::ClubId),
            ),
            (
                DeleteClub,
                ActionScript::on(SETTINGS, vec![click(testid("delete-club-button")), click(CONFIRM)]),
            ),
            (
                CreateDiscussion,
                ActionScript::on(
                    "/clubs/{club_id}/discussions/new",
                    vec![
                        fill(testid("discussion-title-input"), "{discussion_title}"),
                        fill(testid("discussion-body-input"), "{discussion_body}"),
                        click(testid("create-discussion-submit")),
                    ],
                )
                .capturing(CaptureTarget::DiscussionId),
            ),
            (
                DeleteDiscussion,
                ActionScript::on(
                    DISCUSSION,
                    vec![click(testid("delete-discussion-button")), click(CONFIRM)],
                ),
            ),
            (
                TransferOwnership,
                ActionScript::on(
                    MEMBERS,
                    vec![
                        click(r#"[data-testid="transfer-ownership-button"][data-username="{target_user}"]"#),
                        click(CONFIRM),
                    ],
                ),
            ),
            (
                RemoveMember,
                ActionScript::on(
                    MEMBERS,
                    vec![
                        click(r#"[data-testid="remove-member-button"][data-username="{target_user}"]"#),
                        click(CONFIRM),
                    ],
                ),
            ),
        ]);

        Self { affordances, actions }
    }
}
