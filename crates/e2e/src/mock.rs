//! In-memory reading-club application
//!
//! [`SimulatedClubApp`] implements [`BrowserAutomation`] against a model of
//! the club UI: the pages, the `data-testid` affordances each role sees, the
//! sign-in redirect for guarded routes, confirmation dialogs and typed toast
//! notifications. It understands attribute selectors only
//! (`[data-testid="x"][data-username="y"]`). Waits are answered at once; the
//! only simulated time is the optional per-navigation latency.
//!
//! Seeded state: accounts `olivia` (owner), `adam` (admin) and `mia` (signed-in
//! non-member), and the public club "Test Club" with plain member `reader` and
//! one discussion.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use clubhouse_common::Role;

use crate::browser::{path_of, BrowserAutomation, WaitOutcome, WaitState};
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{E2eError, E2eResult};

pub const FIXTURE_CLUB: &str = "Test Club";

const LOGIN: &str = "/login";

struct Account {
    username: &'static str,
    password: &'static str,
    display_name: &'static str,
    role: Role,
}

static ACCOUNTS: [Account; 3] = [
    Account { username: "olivia", password: "owner-pass-1", display_name: "Olivia Owner", role: Role::Owner },
    Account { username: "adam", password: "admin-pass-1", display_name: "Adam Admin", role: Role::Admin },
    Account { username: "mia", password: "member-pass-1", display_name: "Mia Member", role: Role::Member },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Owner,
    Admin,
    Member,
    Outsider,
}

impl Membership {
    fn is_member(self) -> bool {
        self != Membership::Outsider
    }

    fn is_staff(self) -> bool {
        matches!(self, Membership::Owner | Membership::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Club {
    name: String,
    private: bool,
    owner: String,
    admins: BTreeSet<String>,
    members: BTreeSet<String>,
    discussions: BTreeMap<u64, String>,
}

impl Club {
    fn membership(&self, user: Option<&str>) -> Membership {
        match user {
            Some(u) if u == self.owner => Membership::Owner,
            Some(u) if self.admins.contains(u) => Membership::Admin,
            Some(u) if self.members.contains(u) => Membership::Member,
            _ => Membership::Outsider,
        }
    }

    fn leave(&mut self, user: &str) {
        self.admins.remove(user);
        self.members.remove(user);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Home,
    Login,
    Logout,
    Clubs,
    NewClub,
    Club(u64),
    Members(u64),
    Settings(u64),
    NewDiscussion(u64),
    Discussion(u64, u64),
    Unknown,
}

impl Route {
    fn parse(path: &str) -> Self {
        let bare = path.split(['?', '#']).next().unwrap_or(path);
        let segments: Vec<&str> = bare.split('/').filter(|s| !s.is_empty()).collect();
        fn id(segment: &str) -> Option<u64> {
            segment.parse().ok()
        }

        match segments.as_slice() {
            [] => Route::Home,
            ["login"] => Route::Login,
            ["logout"] => Route::Logout,
            ["clubs"] => Route::Clubs,
            ["clubs", "new"] => Route::NewClub,
            ["clubs", c] => id(c).map(Route::Club).unwrap_or(Route::Unknown),
            ["clubs", c, "members"] => id(c).map(Route::Members).unwrap_or(Route::Unknown),
            ["clubs", c, "settings"] => id(c).map(Route::Settings).unwrap_or(Route::Unknown),
            ["clubs", c, "discussions", "new"] => {
                id(c).map(Route::NewDiscussion).unwrap_or(Route::Unknown)
            }
            ["clubs", c, "discussions", d] => match (id(c), id(d)) {
                (Some(c), Some(d)) => Route::Discussion(c, d),
                _ => Route::Unknown,
            },
            _ => Route::Unknown,
        }
    }

    fn requires_sign_in(self) -> bool {
        matches!(
            self,
            Route::NewClub
                | Route::Members(_)
                | Route::Settings(_)
                | Route::NewDiscussion(_)
                | Route::Discussion(..)
        )
    }

    fn club(self) -> Option<u64> {
        match self {
            Route::Club(c)
            | Route::Members(c)
            | Route::Settings(c)
            | Route::NewDiscussion(c)
            | Route::Discussion(c, _) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Element {
    attrs: BTreeMap<String, String>,
    text: String,
    enabled: bool,
}

impl Element {
    fn testid(id: &str) -> Self {
        Self {
            attrs: BTreeMap::from([("data-testid".to_string(), id.to_string())]),
            text: String::new(),
            enabled: true,
        }
    }

    fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    fn href(self, href: impl Into<String>) -> Self {
        self.attr("href", href)
    }

    fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    fn matches(&self, selector: &[(String, String)]) -> bool {
        selector.iter().all(|(k, v)| self.get(k) == Some(v.as_str()))
    }
}

/// Parse `[attr="value"]...` into attribute constraints
fn parse_selector(selector: &str) -> E2eResult<Vec<(String, String)>> {
    let unsupported = || E2eError::Browser(format!("unsupported selector: {selector}"));

    let mut rest = selector.trim();
    let mut constraints = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[').ok_or_else(unsupported)?;
        let close = inner.find(']').ok_or_else(unsupported)?;
        let (name, value) = inner[..close].split_once('=').ok_or_else(unsupported)?;
        let value = value.trim().trim_matches('"').trim_matches('\'');
        constraints.push((name.trim().to_string(), value.to_string()));
        rest = inner[close + 1..].trim_start();
    }

    if constraints.is_empty() {
        return Err(unsupported());
    }
    Ok(constraints)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Leave(u64),
    DeleteClub(u64),
    DeleteDiscussion(u64, u64),
    Transfer(u64, String),
    Remove(u64, String),
}

#[derive(Debug, Clone)]
struct Toast {
    kind: &'static str,
    message: String,
}

pub struct SimulatedClubApp {
    clubs: BTreeMap<u64, Club>,
    next_id: u64,
    session: Option<String>,
    path: String,
    blank: bool,
    form: BTreeMap<String, String>,
    login_error: Option<String>,
    pending: Option<Pending>,
    toast: Option<Toast>,
    reject_next: Option<String>,
    stalls: BTreeMap<String, u32>,
    guest_create_button: bool,
    latency: Duration,
    commit_latency: Duration,
    drop_notification: bool,
    navigations: usize,
}

impl Default for SimulatedClubApp {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedClubApp {
    pub fn new() -> Self {
        let fixture = Club {
            name: FIXTURE_CLUB.to_string(),
            private: false,
            owner: "olivia".to_string(),
            admins: BTreeSet::from(["adam".to_string()]),
            members: BTreeSet::from(["reader".to_string()]),
            discussions: BTreeMap::from([(2, "Welcome".to_string())]),
        };

        Self {
            clubs: BTreeMap::from([(1, fixture)]),
            next_id: 3,
            session: None,
            path: "about:blank".to_string(),
            blank: true,
            form: BTreeMap::new(),
            login_error: None,
            pending: None,
            toast: None,
            reject_next: None,
            stalls: BTreeMap::new(),
            guest_create_button: false,
            latency: Duration::ZERO,
            commit_latency: Duration::ZERO,
            drop_notification: false,
            navigations: 0,
        }
    }

    /// Credentials of the seeded accounts, display names included
    pub fn credentials() -> CredentialStore {
        ACCOUNTS.iter().fold(CredentialStore::new(), |store, account| {
            store.with(
                account.role,
                Credentials::new(account.username, account.password)
                    .with_display_name(account.display_name),
            )
        })
    }

    /// Show guests a "create club" link that leads to sign-in
    pub fn with_guest_create_button(mut self) -> Self {
        self.guest_create_button = true;
        self
    }

    /// Leave the next `loads` loads of `path` without a ready marker
    pub fn stall(&mut self, path: &str, loads: u32) {
        self.stalls.insert(path.to_string(), loads);
    }

    pub fn stall_forever(&mut self, path: &str) {
        self.stall(path, u32::MAX);
    }

    pub fn set_latency(&mut self, latency: Duration) {
        self.latency = latency;
    }

    /// Delay the response to a click that changed state
    pub fn set_commit_latency(&mut self, latency: Duration) {
        self.commit_latency = latency;
    }

    /// Apply the next state change without showing its toast
    pub fn drop_next_notification(&mut self) {
        self.drop_notification = true;
    }

    /// Have the next state change fail server-side with `message`
    pub fn reject_next_action(&mut self, message: &str) {
        self.reject_next = Some(message.to_string());
    }

    pub fn remove_club(&mut self, name: &str) -> bool {
        match self.club_id(name) {
            Some(id) => self.clubs.remove(&id).is_some(),
            None => false,
        }
    }

    pub fn club_id(&self, name: &str) -> Option<u64> {
        self.clubs.iter().find(|(_, c)| c.name == name).map(|(id, _)| *id)
    }

    pub fn club_count(&self) -> usize {
        self.clubs.len()
    }

    pub fn discussion_count(&self, club_id: u64) -> usize {
        self.clubs.get(&club_id).map(|c| c.discussions.len()).unwrap_or(0)
    }

    pub fn is_member(&self, club_id: u64, username: &str) -> bool {
        self.clubs
            .get(&club_id)
            .map(|c| c.membership(Some(username)).is_member())
            .unwrap_or(false)
    }

    pub fn owner_of(&self, club_id: u64) -> Option<&str> {
        self.clubs.get(&club_id).map(|c| c.owner.as_str())
    }

    pub fn signed_in_as(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn navigations(&self) -> usize {
        self.navigations
    }

    fn user(&self) -> Option<&str> {
        self.session.as_deref()
    }

    fn goto(&mut self, target: &str) {
        self.pending = None;
        self.toast = None;
        self.form.clear();

        let mut path = path_of(target);
        let mut route = Route::parse(&path);
        if route == Route::Logout {
            self.session = None;
            path = "/".to_string();
            route = Route::Home;
        }
        if route != Route::Login {
            self.login_error = None;
        }
        if route.requires_sign_in() && self.session.is_none() {
            path = format!("{LOGIN}?next={path}");
        }

        let bare = path.split('?').next().unwrap_or(&path).to_string();
        self.blank = match self.stalls.get_mut(&bare) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                true
            }
            _ => false,
        };
        self.path = path;
    }

    fn elements(&self) -> Vec<Element> {
        if self.blank {
            return Vec::new();
        }

        let route = Route::parse(&self.path);
        if route == Route::Unknown {
            return Vec::new();
        }

        let user = self.user();
        let mut page = vec![Element::testid("page-ready")];

        if let Some(user) = user {
            let name = ACCOUNTS
                .iter()
                .find(|a| a.username == user)
                .map(|a| a.display_name)
                .unwrap_or(user);
            page.push(Element::testid("user-menu").text(name));
        }

        match route {
            Route::Home | Route::Logout | Route::Unknown => {}
            Route::Login => {
                page.push(Element::testid("login-identifier-input"));
                page.push(Element::testid("login-password-input"));
                page.push(Element::testid("login-submit"));
                if let Some(error) = &self.login_error {
                    page.push(Element::testid("login-error").text(error.clone()));
                }
            }
            Route::Clubs => {
                for (id, club) in &self.clubs {
                    page.push(
                        Element::testid("club-link")
                            .attr("data-club-name", club.name.clone())
                            .href(format!("/clubs/{id}"))
                            .text(club.name.clone()),
                    );
                }
                if user.is_some() || self.guest_create_button {
                    page.push(Element::testid("create-club-button").href("/clubs/new"));
                }
            }
            Route::NewClub => {
                page.push(Element::testid("club-name-input"));
                page.push(Element::testid("club-description-input"));
                page.push(Element::testid("create-club-submit"));
            }
            _ => {
                let Some((club_id, club)) = route
                    .club()
                    .and_then(|id| self.clubs.get(&id).map(|c| (id, c)))
                else {
                    page.push(Element::testid("not-found"));
                    return self.with_overlays(page);
                };
                self.club_page(route, club_id, club, &mut page);
            }
        }

        self.with_overlays(page)
    }

    fn club_page(&self, route: Route, club_id: u64, club: &Club, page: &mut Vec<Element>) {
        let user = self.user();
        let membership = club.membership(user);

        match route {
            Route::Club(_) => {
                page.push(Element::testid("club-name").text(club.name.clone()));
                for (id, title) in &club.discussions {
                    page.push(
                        Element::testid("discussion-link")
                            .attr("data-discussion-title", title.clone())
                            .href(format!("/clubs/{club_id}/discussions/{id}"))
                            .text(title.clone()),
                    );
                }
                if user.is_some() {
                    let list = club.discussions.values().cloned().collect::<Vec<_>>().join("\n");
                    page.push(Element::testid("discussion-list").text(list));
                }
                match (user, membership) {
                    (None, _) => page.push(
                        Element::testid("join-club-button").href(format!("{LOGIN}?next=/clubs/{club_id}")),
                    ),
                    (Some(_), Membership::Outsider) => page.push(Element::testid("join-club-button")),
                    (Some(_), Membership::Owner) => {}
                    (Some(_), _) => page.push(Element::testid("leave-club-button")),
                }
                if membership.is_member() {
                    page.push(Element::testid("new-discussion-button").href(format!("/clubs/{club_id}/discussions/new")));
                }
                if membership.is_staff() {
                    page.push(Element::testid("club-settings-link").href(format!("/clubs/{club_id}/settings")));
                    page.push(Element::testid("manage-members-link").href(format!("/clubs/{club_id}/members")));
                    page.push(Element::testid("manage-events-link").href(format!("/clubs/{club_id}/events")));
                    if club.private {
                        page.push(Element::testid("review-applications-link"));
                    }
                }
            }
            Route::Members(_) => {
                let everyone = std::iter::once(&club.owner)
                    .chain(club.admins.iter())
                    .chain(club.members.iter());
                for username in everyone {
                    page.push(Element::testid("member-row").attr("data-username", username.clone()));
                    let target = club.membership(Some(username.as_str()));
                    let removable = match membership {
                        Membership::Owner => target != Membership::Owner,
                        Membership::Admin => target == Membership::Member,
                        _ => false,
                    };
                    if removable {
                        page.push(Element::testid("remove-member-button").attr("data-username", username.clone()));
                    }
                    if membership == Membership::Owner && target != Membership::Owner {
                        page.push(
                            Element::testid("transfer-ownership-button").attr("data-username", username.clone()),
                        );
                    }
                }
            }
            Route::Settings(_) => {
                if membership == Membership::Owner {
                    page.push(Element::testid("delete-club-button"));
                }
            }
            Route::NewDiscussion(_) => {
                if membership.is_member() {
                    page.push(Element::testid("discussion-title-input"));
                    page.push(Element::testid("discussion-body-input"));
                    page.push(Element::testid("create-discussion-submit"));
                }
            }
            Route::Discussion(_, discussion_id) => match club.discussions.get(&discussion_id) {
                Some(title) => {
                    page.push(Element::testid("discussion-title").text(title.clone()));
                    if membership.is_staff() {
                        page.push(Element::testid("delete-discussion-button"));
                    }
                }
                None => page.push(Element::testid("not-found")),
            },
            _ => {}
        }
    }

    fn with_overlays(&self, mut page: Vec<Element>) -> Vec<Element> {
        if self.pending.is_some() {
            page.push(Element::testid("confirm-button"));
        }
        if let Some(toast) = &self.toast {
            page.push(
                Element::testid("toast")
                    .attr("data-kind", toast.kind)
                    .text(toast.message.clone()),
            );
        }
        page
    }

    fn find(&self, selector: &str) -> E2eResult<Option<Element>> {
        let constraints = parse_selector(selector)?;
        Ok(self.elements().into_iter().find(|e| e.matches(&constraints)))
    }

    fn notify(&mut self, kind: &'static str, message: impl Into<String>) {
        if std::mem::take(&mut self.drop_notification) {
            return;
        }
        self.toast = Some(Toast { kind, message: message.into() });
    }

    /// Server-side gate shared by every state change
    fn admit(&mut self) -> bool {
        match self.reject_next.take() {
            Some(message) => {
                self.notify("error", message);
                false
            }
            None => true,
        }
    }

    fn denied(&mut self) {
        self.notify("error", "You do not have permission to do that");
    }

    fn submit_login(&mut self) {
        let username = self.form.get("login-identifier-input").cloned().unwrap_or_default();
        let password = self.form.get("login-password-input").cloned().unwrap_or_default();

        let account = ACCOUNTS
            .iter()
            .find(|a| a.username == username && a.password == password);

        match account {
            Some(account) => {
                self.session = Some(account.username.to_string());
                self.goto("/");
            }
            None => {
                self.login_error = Some("Invalid username or password".to_string());
                self.goto(LOGIN);
            }
        }
    }

    fn current_club(&self) -> Option<u64> {
        Route::parse(&self.path).club().filter(|id| self.clubs.contains_key(id))
    }

    fn join(&mut self, club_id: u64) {
        let Some(user) = self.session.clone() else {
            return self.denied();
        };
        if !self.admit() {
            return;
        }
        if let Some(club) = self.clubs.get_mut(&club_id) {
            club.members.insert(user);
            let message = format!("Welcome to {}", club.name);
            self.notify("success", message);
        }
    }

    fn create_club(&mut self) {
        let Some(user) = self.session.clone() else {
            return self.denied();
        };
        let name = self.form.get("club-name-input").cloned().unwrap_or_default();
        if name.trim().is_empty() {
            return self.notify("error", "Club name is required");
        }
        if self.club_id(&name).is_some() {
            return self.notify("error", "A club with that name already exists");
        }
        if !self.admit() {
            return;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.clubs.insert(
            id,
            Club {
                name,
                private: false,
                owner: user,
                admins: BTreeSet::new(),
                members: BTreeSet::new(),
                discussions: BTreeMap::new(),
            },
        );
        self.goto(&format!("/clubs/{id}"));
        self.notify("success", "Club created");
    }

    fn create_discussion(&mut self, club_id: u64) {
        let title = self.form.get("discussion-title-input").cloned().unwrap_or_default();
        let member = self
            .clubs
            .get(&club_id)
            .map(|c| c.membership(self.user()).is_member())
            .unwrap_or(false);
        if !member {
            return self.denied();
        }
        if title.trim().is_empty() {
            return self.notify("error", "Title is required");
        }
        if !self.admit() {
            return;
        }

        let id = self.next_id;
        self.next_id += 1;
        if let Some(club) = self.clubs.get_mut(&club_id) {
            club.discussions.insert(id, title);
        }
        self.goto(&format!("/clubs/{club_id}/discussions/{id}"));
        self.notify("success", "Discussion started");
    }

    fn confirm(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let user = self.session.clone();
        let club_id = pending_club(&pending);
        let Some(membership) = self.clubs.get(&club_id).map(|c| c.membership(user.as_deref())) else {
            return self.notify("error", "Club not found");
        };

        let permitted = match &pending {
            Pending::Leave(_) => membership.is_member() && membership != Membership::Owner,
            Pending::DeleteClub(_) | Pending::Transfer(..) => membership == Membership::Owner,
            Pending::DeleteDiscussion(..) => membership.is_staff(),
            Pending::Remove(_, target) => {
                let target = self
                    .clubs
                    .get(&club_id)
                    .map(|c| c.membership(Some(target.as_str())));
                match membership {
                    Membership::Owner => target.is_some_and(|t| t != Membership::Owner),
                    Membership::Admin => target == Some(Membership::Member),
                    _ => false,
                }
            }
        };
        if !permitted {
            return self.denied();
        }
        if !self.admit() {
            return;
        }

        match pending {
            Pending::Leave(id) => {
                if let (Some(club), Some(user)) = (self.clubs.get_mut(&id), user.as_deref()) {
                    club.leave(user);
                }
                self.notify("success", "You left the club");
            }
            Pending::DeleteClub(id) => {
                self.clubs.remove(&id);
                self.goto("/clubs");
                self.notify("success", "Club deleted");
            }
            Pending::DeleteDiscussion(id, discussion) => {
                if let Some(club) = self.clubs.get_mut(&id) {
                    club.discussions.remove(&discussion);
                }
                self.goto(&format!("/clubs/{id}"));
                self.notify("success", "Discussion deleted");
            }
            Pending::Transfer(id, target) => {
                if let Some(club) = self.clubs.get_mut(&id) {
                    club.leave(&target);
                    let previous = std::mem::replace(&mut club.owner, target);
                    club.admins.insert(previous);
                }
                self.notify("success", "Ownership transferred");
            }
            Pending::Remove(id, target) => {
                if let Some(club) = self.clubs.get_mut(&id) {
                    club.leave(&target);
                }
                self.notify("success", "Member removed");
            }
        }
    }

    fn activate(&mut self, element: &Element) {
        let testid = element.get("data-testid").unwrap_or_default().to_string();
        let username = element.get("data-username").map(str::to_string);
        let club = self.current_club();
        let route = Route::parse(&self.path);

        match (testid.as_str(), club) {
            ("login-submit", _) => self.submit_login(),
            ("join-club-button", Some(id)) if element.get("href").is_none() => self.join(id),
            ("leave-club-button", Some(id)) => self.pending = Some(Pending::Leave(id)),
            ("delete-club-button", Some(id)) => self.pending = Some(Pending::DeleteClub(id)),
            ("delete-discussion-button", Some(id)) => {
                if let Route::Discussion(_, discussion) = route {
                    self.pending = Some(Pending::DeleteDiscussion(id, discussion));
                }
            }
            ("transfer-ownership-button", Some(id)) => {
                if let Some(target) = username {
                    self.pending = Some(Pending::Transfer(id, target));
                }
            }
            ("remove-member-button", Some(id)) => {
                if let Some(target) = username {
                    self.pending = Some(Pending::Remove(id, target));
                }
            }
            ("confirm-button", _) => self.confirm(),
            ("create-club-submit", _) => self.create_club(),
            ("create-discussion-submit", Some(id)) => self.create_discussion(id),
            _ => {
                if let Some(href) = element.get("href") {
                    let href = href.to_string();
                    self.navigations += 1;
                    self.goto(&href);
                }
            }
        }
    }
}

fn pending_club(pending: &Pending) -> u64 {
    match pending {
        Pending::Leave(id)
        | Pending::DeleteClub(id)
        | Pending::DeleteDiscussion(id, _)
        | Pending::Transfer(id, _)
        | Pending::Remove(id, _) => *id,
    }
}

#[async_trait]
impl BrowserAutomation for SimulatedClubApp {
    async fn navigate(&mut self, url: &str) -> E2eResult<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.navigations += 1;
        self.goto(url);
        Ok(())
    }

    async fn current_path(&mut self) -> E2eResult<String> {
        Ok(self.path.clone())
    }

    async fn wait_for(
        &mut self,
        selector: &str,
        state: WaitState,
        _timeout: Duration,
    ) -> E2eResult<WaitOutcome> {
        let present = self.find(selector)?.is_some();
        let satisfied = match state {
            WaitState::Visible | WaitState::Attached => present,
            WaitState::Hidden | WaitState::Detached => !present,
        };
        Ok(if satisfied {
            WaitOutcome::Satisfied
        } else {
            WaitOutcome::TimedOut
        })
    }

    async fn is_visible(&mut self, selector: &str) -> E2eResult<bool> {
        Ok(self.find(selector)?.is_some())
    }

    async fn is_enabled(&mut self, selector: &str) -> E2eResult<bool> {
        Ok(self.find(selector)?.map(|e| e.enabled).unwrap_or(false))
    }

    async fn click(&mut self, selector: &str) -> E2eResult<()> {
        let element = self
            .find(selector)?
            .ok_or_else(|| E2eError::Browser(format!("no element matches {selector}")))?;
        let before = (!self.commit_latency.is_zero()).then(|| self.clubs.clone());
        self.activate(&element);
        if before.is_some_and(|clubs| clubs != self.clubs) {
            tokio::time::sleep(self.commit_latency).await;
        }
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> E2eResult<()> {
        let element = self
            .find(selector)?
            .ok_or_else(|| E2eError::Browser(format!("no element matches {selector}")))?;
        let key = element.get("data-testid").unwrap_or_default().to_string();
        self.form.insert(key, value.to_string());
        Ok(())
    }

    async fn text(&mut self, selector: &str) -> E2eResult<Option<String>> {
        Ok(self.find(selector)?.map(|e| e.text))
    }

    async fn attribute(&mut self, selector: &str, name: &str) -> E2eResult<Option<String>> {
        Ok(self
            .find(selector)?
            .and_then(|e| e.get(name).map(str::to_string)))
    }

    async fn clear_client_state(&mut self) -> E2eResult<()> {
        self.session = None;
        self.form.clear();
        self.pending = None;
        self.login_error = None;
        Ok(())
    }
}
