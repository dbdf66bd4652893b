//! Credentials for the authenticated roles
//!
//! Credentials come from the environment (or an externally managed file fed
//! into it), never from scenario definitions:
//!
//! ```text
//! CLUBHOUSE_OWNER_USERNAME / CLUBHOUSE_OWNER_PASSWORD / CLUBHOUSE_OWNER_DISPLAY_NAME
//! CLUBHOUSE_ADMIN_USERNAME / ...
//! CLUBHOUSE_MEMBER_USERNAME / ...
//! ```

use clubhouse_common::Role;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Values that mean "nobody filled this in yet"
const PLACEHOLDERS: &[&str] = &[
    "changeme",
    "change-me",
    "password",
    "placeholder",
    "replace_me",
    "replace-me",
    "todo",
    "xxx",
    "your_password",
    "your-password",
];

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,

    /// Text the authenticated marker should show once signed in
    pub display_name: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Whether either field is unset or an obvious placeholder
    pub fn is_placeholder(&self) -> bool {
        is_placeholder_value(&self.username) || is_placeholder_value(&self.password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("display_name", &self.display_name)
            .finish()
    }
}

fn is_placeholder_value(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lower = trimmed.to_ascii_lowercase();
    PLACEHOLDERS.contains(&lower.as_str())
        || (trimmed.starts_with('<') && trimmed.ends_with('>'))
        || (trimmed.starts_with("${") && trimmed.ends_with('}'))
}

#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    by_role: HashMap<Role, Credentials>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: Role, credentials: Credentials) -> Self {
        self.insert(role, credentials);
        self
    }

    pub fn insert(&mut self, role: Role, credentials: Credentials) {
        self.by_role.insert(role, credentials);
    }

    pub fn get(&self, role: Role) -> Option<&Credentials> {
        self.by_role.get(&role)
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (environment, parsed dotenv file, ...)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut store = Self::new();

        for role in Role::ALL.into_iter().filter(Role::requires_credentials) {
            let prefix = format!("CLUBHOUSE_{}", role.as_str().to_ascii_uppercase());
            let username = lookup(&format!("{prefix}_USERNAME"));
            let password = lookup(&format!("{prefix}_PASSWORD"));

            if let (Some(username), Some(password)) = (username, password) {
                let mut credentials = Credentials::new(username, password);
                credentials.display_name = lookup(&format!("{prefix}_DISPLAY_NAME"));
                debug!("Loaded credentials for role {}", role);
                store.insert(role, credentials);
            }
        }

        store
    }
}
