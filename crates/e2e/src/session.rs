//! Session controller
//!
//! Owns the establish/teardown lifecycle of the one authenticated browser
//! session a harness may hold at a time. A [`SessionHandle`] is handed out by
//! [`SessionController::establish`] and must go back through
//! [`SessionController::teardown`] before another role can sign in.

use chrono::{DateTime, Utc};
use clubhouse_common::Role;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::browser::{BrowserAutomation, WaitState};
use crate::config::{HarnessConfig, LoginSelectors, RouteConfig};
use crate::credentials::Credentials;
use crate::error::{E2eError, E2eResult};

/// Ownership of one authenticated (or anonymous) browser session.
///
/// Not `Clone`; a session belongs to exactly one role.
#[derive(Debug)]
pub struct SessionHandle {
    id: Uuid,
    role: Role,
    identity: Option<String>,
    established_at: DateTime<Utc>,
    cleared: bool,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Display name shown by the application, `None` for guests
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }
}

pub struct SessionController {
    routes: RouteConfig,
    login: LoginSelectors,
    auth_timeout: Duration,
    active: Option<(Uuid, Role)>,
}

impl SessionController {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            routes: config.routes.clone(),
            login: config.login.clone(),
            auth_timeout: config.timeouts.auth(),
            active: None,
        }
    }

    pub fn active_role(&self) -> Option<Role> {
        self.active.map(|(_, role)| role)
    }

    /// Sign in as `role`. Guests get a freshly cleared anonymous session.
    pub async fn establish<B>(
        &mut self,
        browser: &mut B,
        role: Role,
        credentials: Option<&Credentials>,
    ) -> E2eResult<SessionHandle>
    where
        B: BrowserAutomation + ?Sized,
    {
        if let Some((_, active)) = self.active {
            return Err(E2eError::SessionStillActive(active));
        }

        let credentials = if role.requires_credentials() {
            match credentials {
                Some(c) if !c.is_placeholder() => Some(c),
                _ => return Err(E2eError::CredentialsMissing(role)),
            }
        } else {
            None
        };

        browser.clear_client_state().await?;

        let attempt = match credentials {
            Some(credentials) => self.sign_in(browser, role, credentials).await.map(Some),
            None => self.enter_anonymously(browser).await.map(|_| None),
        };

        let identity = match attempt {
            Ok(identity) => identity,
            Err(e) => {
                // Never leave a half-authenticated browser behind.
                if let Err(clear_err) = browser.clear_client_state().await {
                    warn!("Failed to clear client state after failed sign-in: {}", clear_err);
                }
                return Err(e);
            }
        };

        let handle = SessionHandle {
            id: Uuid::new_v4(),
            role,
            identity,
            established_at: Utc::now(),
            cleared: false,
        };
        self.active = Some((handle.id, role));

        info!(
            "Session {} established as {}{}",
            handle.id,
            role,
            handle
                .identity()
                .map(|name| format!(" ({name})"))
                .unwrap_or_default()
        );
        Ok(handle)
    }

    async fn enter_anonymously<B>(&self, browser: &mut B) -> E2eResult<()>
    where
        B: BrowserAutomation + ?Sized,
    {
        browser.navigate(&self.routes.home).await?;

        let marker = browser
            .wait_for(&self.login.authenticated_marker, WaitState::Hidden, self.auth_timeout)
            .await?;
        if !marker.is_satisfied() {
            return Err(E2eError::AuthenticationFailed {
                role: Role::Guest,
                reason: "an authenticated identity survived clearing client state".to_string(),
            });
        }
        Ok(())
    }

    async fn sign_in<B>(
        &self,
        browser: &mut B,
        role: Role,
        credentials: &Credentials,
    ) -> E2eResult<String>
    where
        B: BrowserAutomation + ?Sized,
    {
        let failed = |reason: String| E2eError::AuthenticationFailed { role, reason };

        debug!("Signing in as {} ({})", role, credentials.username);
        browser.navigate(&self.routes.login).await?;

        let form = browser
            .wait_for(&self.login.identifier, WaitState::Visible, self.auth_timeout)
            .await?;
        if !form.is_satisfied() {
            return Err(failed("login form did not render".to_string()));
        }

        browser.fill(&self.login.identifier, &credentials.username).await?;
        browser.fill(&self.login.password, &credentials.password).await?;
        browser.click(&self.login.submit).await?;

        let signed_in = browser
            .wait_for(&self.login.authenticated_marker, WaitState::Visible, self.auth_timeout)
            .await?;
        if !signed_in.is_satisfied() {
            let reason = match browser.text(&self.login.error).await? {
                Some(message) if !message.trim().is_empty() => {
                    format!("login rejected: {}", message.trim())
                }
                _ => format!(
                    "no authenticated marker within {} ms",
                    self.auth_timeout.as_millis()
                ),
            };
            return Err(failed(reason));
        }

        let shown = browser
            .text(&self.login.authenticated_marker)
            .await?
            .map(|text| text.trim().to_string())
            .unwrap_or_default();

        if let Some(expected) = &credentials.display_name {
            if &shown != expected {
                return Err(failed(format!(
                    "signed in as '{shown}' but expected '{expected}'"
                )));
            }
        }

        Ok(shown)
    }

    /// Clear every trace of the session. Calling it again is a no-op.
    pub async fn teardown<B>(&mut self, browser: &mut B, handle: &mut SessionHandle) -> E2eResult<()>
    where
        B: BrowserAutomation + ?Sized,
    {
        if handle.cleared {
            debug!("Session {} already cleared", handle.id);
            return Ok(());
        }

        if handle.role.requires_credentials() {
            if let Some(logout) = &self.routes.logout {
                if let Err(e) = browser.navigate(logout).await {
                    warn!("Logout navigation failed, clearing state anyway: {}", e);
                }
            }
        }

        browser.clear_client_state().await?;
        handle.cleared = true;

        if self.active.map(|(id, _)| id) == Some(handle.id) {
            self.active = None;
        }

        info!("Session {} ({}) torn down", handle.id, handle.role);
        Ok(())
    }
}
