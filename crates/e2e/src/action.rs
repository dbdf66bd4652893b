//! State-changing actions and their compensators
//!
//! Every reversible action names the step that undoes it; the runner queues
//! that compensator before the action starts and replays the queue after
//! the scenario, whatever the assertions said. Inherently irreversible
//! actions have no compensator and must be opted into explicitly.

use clubhouse_common::{Capability, ProbeResult, ResourceContext};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::browser::{path_matches, BrowserAutomation, WaitState};
use crate::catalog::{CapabilityCatalog, CaptureTarget, Interaction};
use crate::config::HarnessConfig;
use crate::error::E2eResult;
use crate::notification::{NotificationKind, NotificationProbe};
use crate::probe::{open_page, PageState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    JoinClub,
    LeaveClub,
    CreateClub {
        name: String,
        #[serde(default)]
        description: String,
    },
    DeleteClub,
    CreateDiscussion {
        title: String,
        #[serde(default)]
        body: String,
    },
    DeleteDiscussion,
    TransferOwnership {
        to: String,
    },
    RemoveMember {
        username: String,
    },
}

impl Action {
    pub fn capability(&self) -> Capability {
        match self {
            Action::JoinClub => Capability::JoinClub,
            Action::LeaveClub => Capability::LeaveClub,
            Action::CreateClub { .. } => Capability::CreateClub,
            Action::DeleteClub => Capability::DeleteClub,
            Action::CreateDiscussion { .. } => Capability::CreateDiscussion,
            Action::DeleteDiscussion => Capability::DeleteDiscussion,
            Action::TransferOwnership { .. } => Capability::TransferOwnership,
            Action::RemoveMember { .. } => Capability::RemoveMember,
        }
    }

    /// Destructive actions that no compensator can undo
    pub fn is_irreversible(&self) -> bool {
        matches!(
            self,
            Action::DeleteClub
                | Action::DeleteDiscussion
                | Action::TransferOwnership { .. }
                | Action::RemoveMember { .. }
        )
    }

    /// The step that returns the resource to its pre-action state.
    ///
    /// | action | compensator |
    /// |--------|-------------|
    /// | join_club | leave_club |
    /// | leave_club | join_club |
    /// | create_club | delete_club (of the created club) |
    /// | create_discussion | delete_discussion (of the created discussion) |
    pub fn compensator(&self) -> Option<Action> {
        match self {
            Action::JoinClub => Some(Action::LeaveClub),
            Action::LeaveClub => Some(Action::JoinClub),
            Action::CreateClub { .. } => Some(Action::DeleteClub),
            Action::CreateDiscussion { .. } => Some(Action::DeleteDiscussion),
            _ => None,
        }
    }

    /// Expose action parameters to the script templates
    fn bind(&self, context: &mut ResourceContext) {
        match self {
            Action::CreateClub { name, description } => {
                context.set_var("club_name", name.as_str());
                context.set_var("club_description", description.as_str());
            }
            Action::CreateDiscussion { title, body } => {
                context.set_var("discussion_title", title.as_str());
                context.set_var("discussion_body", body.as_str());
            }
            Action::TransferOwnership { to } => context.set_var("target_user", to.as_str()),
            Action::RemoveMember { username } => context.set_var("target_user", username.as_str()),
            _ => {}
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CreateClub { name, .. } => write!(f, "create_club({name})"),
            Action::CreateDiscussion { title, .. } => write!(f, "create_discussion({title})"),
            Action::TransferOwnership { to } => write!(f, "transfer_ownership({to})"),
            Action::RemoveMember { username } => write!(f, "remove_member({username})"),
            other => f.write_str(other.capability().as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// `Allowed` = completed, `Denied` = rejected, `Gated` = sent to sign-in,
    /// `ProbeFailed` = unsettled
    pub result: ProbeResult,
    pub diagnostics: Vec<String>,
    /// The committing click was sent, so the application may have applied
    /// the change even when no result was observed
    pub dispatched: bool,
}

impl ActionOutcome {
    fn new(result: ProbeResult) -> Self {
        Self {
            result,
            diagnostics: Vec::new(),
            dispatched: false,
        }
    }

    fn with_note(mut self, note: impl Into<String>) -> Self {
        self.diagnostics.push(note.into());
        self
    }
}

pub struct ActionEngine {
    catalog: CapabilityCatalog,
    notifications: NotificationProbe,
    login_route: String,
    page_timeout: Duration,
    affordance_timeout: Duration,
    settle_timeout: Duration,
    club_id_pattern: Regex,
    discussion_id_pattern: Regex,
}

impl ActionEngine {
    pub fn new(config: &HarnessConfig) -> E2eResult<Self> {
        Ok(Self {
            catalog: config.catalog.clone(),
            notifications: NotificationProbe::new(config.notification.clone()),
            login_route: config.routes.login.clone(),
            page_timeout: config.timeouts.probe(),
            affordance_timeout: config.timeouts.affordance(),
            settle_timeout: config.timeouts.action(),
            club_id_pattern: Regex::new(&config.fixture.club_id_pattern)?,
            discussion_id_pattern: Regex::new(&config.fixture.discussion_id_pattern)?,
        })
    }

    /// Perform `action` against `context`, recording any created resource id in it.
    pub async fn perform<B>(
        &self,
        browser: &mut B,
        action: &Action,
        context: &mut ResourceContext,
    ) -> ActionOutcome
    where
        B: BrowserAutomation + ?Sized,
    {
        action.bind(context);
        let mut dispatched = false;
        let mut outcome = match self.try_perform(browser, action, context, &mut dispatched).await {
            Ok(outcome) => outcome,
            Err(e) => ActionOutcome::new(ProbeResult::failed(e.to_string())),
        };
        outcome.dispatched = dispatched;
        debug!("action {} -> {:?} (dispatched: {})", action, outcome.result, dispatched);
        outcome
    }

    async fn try_perform<B>(
        &self,
        browser: &mut B,
        action: &Action,
        context: &mut ResourceContext,
        dispatched: &mut bool,
    ) -> E2eResult<ActionOutcome>
    where
        B: BrowserAutomation + ?Sized,
    {
        let capability = action.capability();
        let Some(script) = self.catalog.action(capability) else {
            return Ok(ActionOutcome::new(ProbeResult::failed(format!(
                "no action script defined for {capability}"
            ))));
        };

        let route = context.render(&script.route)?;
        match open_page(
            browser,
            &route,
            script.ready_selector(),
            &self.login_route,
            self.page_timeout,
        )
        .await?
        {
            PageState::Ready => {}
            PageState::SignInRedirect => {
                return Ok(ActionOutcome::new(ProbeResult::Denied)
                    .with_note(format!("{route} redirected to sign-in")))
            }
            PageState::NotReady => {
                return Ok(ActionOutcome::new(ProbeResult::failed(format!(
                    "{route} did not become ready (retried once)"
                ))))
            }
        }

        // The last click submits the change.
        let commit = script
            .interactions
            .iter()
            .rposition(|i| matches!(i, Interaction::Click { .. }));

        for (index, interaction) in script.interactions.iter().enumerate() {
            let selector = context.render(interaction.selector())?;
            let wait = if index == 0 {
                self.affordance_timeout
            } else {
                self.page_timeout
            };

            let shown = browser.wait_for(&selector, WaitState::Visible, wait).await?;
            if !shown.is_satisfied() {
                // A missing entry point means the actor is not offered the action.
                return Ok(if index == 0 {
                    ActionOutcome::new(ProbeResult::Denied)
                        .with_note(format!("affordance {selector} not present"))
                } else {
                    ActionOutcome::new(ProbeResult::failed(format!(
                        "{selector} did not appear mid-action"
                    )))
                });
            }

            match interaction {
                Interaction::Click { .. } => {
                    if index == 0 && !browser.is_enabled(&selector).await? {
                        return Ok(ActionOutcome::new(ProbeResult::Denied)
                            .with_note(format!("affordance {selector} is disabled")));
                    }
                    if commit == Some(index) {
                        *dispatched = true;
                    }
                    browser.click(&selector).await?;
                }
                Interaction::Fill { value, .. } => {
                    let value = context.render(value)?;
                    browser.fill(&selector, &value).await?;
                }
            }
        }

        let notification = self
            .notifications
            .await_notification(browser, self.settle_timeout)
            .await?;

        let mut outcome = match notification {
            Some(n) => match n.kind {
                NotificationKind::Success => ActionOutcome::new(ProbeResult::Allowed),
                NotificationKind::Error => {
                    let note = n.message.unwrap_or_else(|| "error notification".to_string());
                    ActionOutcome::new(ProbeResult::Denied).with_note(note)
                }
                NotificationKind::Other(kind) => ActionOutcome::new(ProbeResult::failed(format!(
                    "unrecognised notification kind '{kind}'"
                ))),
            },
            None => {
                let path = browser.current_path().await?;
                if path_matches(&path, &self.login_route) {
                    ActionOutcome::new(ProbeResult::Gated).with_note("activating the entry point led to sign-in")
                } else {
                    ActionOutcome::new(ProbeResult::failed(format!(
                        "no notification within {} ms",
                        self.settle_timeout.as_millis()
                    )))
                }
            }
        };

        if outcome.result == ProbeResult::Allowed {
            if let Some(target) = script.capture {
                outcome = self.capture(browser, target, context, outcome).await?;
            }
        }

        Ok(outcome)
    }

    async fn capture<B>(
        &self,
        browser: &mut B,
        target: CaptureTarget,
        context: &mut ResourceContext,
        outcome: ActionOutcome,
    ) -> E2eResult<ActionOutcome>
    where
        B: BrowserAutomation + ?Sized,
    {
        let path = browser.current_path().await?;
        let pattern = match target {
            CaptureTarget::ClubId => &self.club_id_pattern,
            CaptureTarget::DiscussionId => &self.discussion_id_pattern,
        };

        let id = pattern
            .captures(&path)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok());

        let Some(id) = id else {
            warn!("Created resource id not recoverable from {}", path);
            // Without an id the compensator would hit the wrong resource.
            return Ok(ActionOutcome::new(ProbeResult::failed(format!(
                "completed, but no {target:?} in {path}; cleanup will look it up by name"
            ))));
        };

        match target {
            CaptureTarget::ClubId => context.club_id = Some(id),
            CaptureTarget::DiscussionId => context.discussion_id = Some(id),
        }
        Ok(outcome.with_note(format!("created {target:?} {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversible_actions_have_compensators() {
        let reversible = [
            Action::JoinClub,
            Action::LeaveClub,
            Action::CreateClub { name: "Night Owls".into(), description: String::new() },
            Action::CreateDiscussion { title: "Chapter 1".into(), body: String::new() },
        ];
        for action in reversible {
            assert!(!action.is_irreversible());
            assert!(action.compensator().is_some(), "{action} has no compensator");
        }
    }

    #[test]
    fn irreversible_actions_have_none() {
        let irreversible = [
            Action::DeleteClub,
            Action::DeleteDiscussion,
            Action::TransferOwnership { to: "adam".into() },
            Action::RemoveMember { username: "rae".into() },
        ];
        for action in irreversible {
            assert!(action.is_irreversible());
            assert!(action.compensator().is_none());
        }
    }

    #[test]
    fn join_and_leave_undo_each_other() {
        assert_eq!(Action::JoinClub.compensator(), Some(Action::LeaveClub));
        assert_eq!(Action::LeaveClub.compensator(), Some(Action::JoinClub));
    }

    #[test]
    fn parses_tagged_yaml() {
        let action: Action = serde_yaml::from_str("kind: remove_member\nusername: rae\n").unwrap();
        assert_eq!(action, Action::RemoveMember { username: "rae".into() });
        assert_eq!(action.capability(), Capability::RemoveMember);
        assert_eq!(action.to_string(), "remove_member(rae)");
    }

    #[test]
    fn binds_template_variables() {
        let mut context = ResourceContext::new();
        Action::TransferOwnership { to: "adam".into() }.bind(&mut context);
        assert_eq!(context.vars.get("target_user").map(String::as_str), Some("adam"));
    }
}
