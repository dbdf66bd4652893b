//! Fixture resolution and per-fixture serialisation
//!
//! Scenarios name their fixture club; before any step runs the resolver
//! looks it up on the discovery page and recovers its numeric id, and
//! likewise for a named discussion on the club page. Runs that touch the
//! same fixture take its lock so mutations never interleave.

use clubhouse_common::ResourceContext;
use regex::Regex;
use std::collections::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::browser::{path_of, BrowserAutomation, WaitState};
use crate::config::HarnessConfig;
use crate::error::{E2eError, E2eResult};
use crate::probe::{open_page, PageState};

pub struct FixtureResolver {
    clubs_route: String,
    login_route: String,
    ready: String,
    club_link: String,
    club_route: String,
    discussion_link: String,
    club_id_pattern: Regex,
    discussion_id_pattern: Regex,
    page_timeout: Duration,
    link_timeout: Duration,
}

impl FixtureResolver {
    pub fn new(config: &HarnessConfig) -> E2eResult<Self> {
        Ok(Self {
            clubs_route: config.routes.clubs.clone(),
            login_route: config.routes.login.clone(),
            ready: config.fixture.ready.clone(),
            club_link: config.fixture.club_link.clone(),
            club_route: config.fixture.club_route.clone(),
            discussion_link: config.fixture.discussion_link.clone(),
            club_id_pattern: Regex::new(&config.fixture.club_id_pattern)?,
            discussion_id_pattern: Regex::new(&config.fixture.discussion_id_pattern)?,
            page_timeout: config.timeouts.probe(),
            link_timeout: config.timeouts.affordance(),
        })
    }

    /// Look up the club named by `context.fixture`.
    ///
    /// `Ok(None)` means the club is not listed. Errors are reserved for a
    /// discovery page that cannot be read at all.
    pub async fn resolve<B>(&self, browser: &mut B, context: &ResourceContext) -> E2eResult<Option<u64>>
    where
        B: BrowserAutomation + ?Sized,
    {
        let id = self
            .find_link(browser, context, &self.clubs_route, &self.club_link, &self.club_id_pattern)
            .await?;
        debug!("Fixture {:?} resolved to {:?}", context.fixture, id);
        Ok(id)
    }

    /// Look up a discussion by title on the page of `context.club_id`.
    pub async fn resolve_discussion<B>(
        &self,
        browser: &mut B,
        context: &ResourceContext,
        title: &str,
    ) -> E2eResult<Option<u64>>
    where
        B: BrowserAutomation + ?Sized,
    {
        let mut context = context.clone();
        context.set_var("discussion", title);

        let route = context.render(&self.club_route)?;
        let id = self
            .find_link(browser, &context, &route, &self.discussion_link, &self.discussion_id_pattern)
            .await?;
        debug!("Discussion '{}' resolved to {:?}", title, id);
        Ok(id)
    }

    async fn find_link<B>(
        &self,
        browser: &mut B,
        context: &ResourceContext,
        route: &str,
        link: &str,
        pattern: &Regex,
    ) -> E2eResult<Option<u64>>
    where
        B: BrowserAutomation + ?Sized,
    {
        match open_page(browser, route, &self.ready, &self.login_route, self.page_timeout).await? {
            PageState::Ready => {}
            PageState::SignInRedirect => {
                return Err(E2eError::FixtureMissing(format!(
                    "{route} requires sign-in for this role"
                )))
            }
            PageState::NotReady => return Err(E2eError::Timeout(format!("{route} to become ready"))),
        }

        let link = context.render(link)?;
        let shown = browser.wait_for(&link, WaitState::Attached, self.link_timeout).await?;
        if !shown.is_satisfied() {
            debug!("{} not found on {}", link, route);
            return Ok(None);
        }

        let Some(href) = browser.attribute(&link, "href").await? else {
            return Ok(None);
        };

        Ok(pattern
            .captures(&path_of(&href))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok()))
    }
}

/// One async lock per fixture name
#[derive(Clone, Default)]
pub struct FixtureLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl FixtureLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `fixture`; released when the guard drops.
    pub async fn acquire(&self, fixture: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(fixture.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
