//! Capability probe
//!
//! Decides whether the current session is offered a capability on a given
//! resource by looking for its affordance. Probing is read-only: it
//! navigates and inspects, and the only link it ever follows is an
//! affordance's own `href` when checking for a sign-in gate.
//!
//! A page that never becomes ready is reported as `ProbeFailed`, never as
//! `Denied`. UI absence says nothing about server-side enforcement; that has
//! to be verified elsewhere.

use clubhouse_common::{Capability, ProbeResult, ResourceContext};
use std::time::Duration;
use tracing::debug;

use crate::browser::{path_matches, BrowserAutomation, WaitState};
use crate::catalog::CapabilityCatalog;
use crate::config::HarnessConfig;
use crate::error::E2eResult;

/// How a page load settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Ready,
    /// The application sent the session to the sign-in page instead
    SignInRedirect,
    /// Not ready after the single retry
    NotReady,
}

/// Navigate and wait for `ready`, retrying the navigation exactly once.
pub async fn open_page<B>(
    browser: &mut B,
    route: &str,
    ready: &str,
    login_route: &str,
    timeout: Duration,
) -> E2eResult<PageState>
where
    B: BrowserAutomation + ?Sized,
{
    let wants_login = path_matches(route, login_route);

    for attempt in 1..=2 {
        browser.navigate(route).await?;
        let outcome = browser.wait_for(ready, WaitState::Visible, timeout).await?;

        let path = browser.current_path().await?;
        if !wants_login && path_matches(&path, login_route) {
            return Ok(PageState::SignInRedirect);
        }
        if outcome.is_satisfied() {
            return Ok(PageState::Ready);
        }
        if attempt == 1 {
            debug!("{} not ready after {} ms, retrying once", route, timeout.as_millis());
        }
    }

    Ok(PageState::NotReady)
}

pub struct CapabilityProbe {
    catalog: CapabilityCatalog,
    login_route: String,
    probe_timeout: Duration,
    affordance_timeout: Duration,
}

impl CapabilityProbe {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            catalog: config.catalog.clone(),
            login_route: config.routes.login.clone(),
            probe_timeout: config.timeouts.probe(),
            affordance_timeout: config.timeouts.affordance(),
        }
    }

    pub async fn probe<B>(
        &self,
        browser: &mut B,
        capability: Capability,
        context: &ResourceContext,
    ) -> ProbeResult
    where
        B: BrowserAutomation + ?Sized,
    {
        let result = match self.try_probe(browser, capability, context).await {
            Ok(result) => result,
            Err(e) => ProbeResult::failed(e.to_string()),
        };
        debug!("probe {} -> {:?}", capability, result);
        result
    }

    async fn try_probe<B>(
        &self,
        browser: &mut B,
        capability: Capability,
        context: &ResourceContext,
    ) -> E2eResult<ProbeResult>
    where
        B: BrowserAutomation + ?Sized,
    {
        let Some(affordance) = self.catalog.affordance(capability) else {
            return Ok(ProbeResult::failed(format!("no affordance defined for {capability}")));
        };

        let route = context.render(&affordance.route)?;
        let selector = context.render(&affordance.selector)?;

        match open_page(
            browser,
            &route,
            affordance.ready_selector(),
            &self.login_route,
            self.probe_timeout,
        )
        .await?
        {
            PageState::Ready => {}
            PageState::SignInRedirect => return Ok(ProbeResult::Denied),
            PageState::NotReady => {
                return Ok(ProbeResult::failed(format!(
                    "{route} did not become ready within {} ms (retried once)",
                    self.probe_timeout.as_millis()
                )))
            }
        }

        let present = browser
            .wait_for(&selector, WaitState::Visible, self.affordance_timeout)
            .await?;
        if !present.is_satisfied() {
            return Ok(ProbeResult::Denied);
        }

        if affordance.require_enabled && !browser.is_enabled(&selector).await? {
            return Ok(ProbeResult::Denied);
        }

        if affordance.follow_link {
            if let Some(href) = browser.attribute(&selector, "href").await? {
                return self.check_gate(browser, &href).await;
            }
        }

        Ok(ProbeResult::Allowed)
    }

    /// Follow the affordance's link; landing on sign-in means it is gated.
    async fn check_gate<B>(&self, browser: &mut B, href: &str) -> E2eResult<ProbeResult>
    where
        B: BrowserAutomation + ?Sized,
    {
        let state = open_page(
            browser,
            href,
            crate::catalog::PAGE_READY,
            &self.login_route,
            self.probe_timeout,
        )
        .await?;

        if state == PageState::NotReady {
            return Ok(ProbeResult::failed(format!("link target {href} did not become ready")));
        }

        let path = browser.current_path().await?;
        Ok(if path_matches(&path, &self.login_route) {
            ProbeResult::Gated
        } else {
            ProbeResult::Allowed
        })
    }
}
