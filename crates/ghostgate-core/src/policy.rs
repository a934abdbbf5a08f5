//! Channel access policy.
//!
//! Decides which backend groups the principal auto-joins, from three pattern
//! lists. Patterns are unanchored regular expressions matched against the
//! channel's protocol name.
//!
//! Precedence, first rule that applies wins:
//!
//! 1. allow-only is set and nothing matches: deny
//! 2. only exclude is set: allow unless excluded
//! 3. nothing is set: allow
//! 4. include is set: allow iff included (exclude is ignored)

use regex::Regex;
use tracing::trace;

use crate::ConfigError;

/// Compiled channel join filter.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    allow_only: Vec<Regex>,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern)
                .map_err(|source| ConfigError::Pattern { pattern: pattern.clone(), source })
        })
        .collect()
}

fn any_match(patterns: &[Regex], name: &str) -> bool {
    patterns.iter().any(|re| re.is_match(name))
}

impl AccessPolicy {
    /// Compile the three pattern lists.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Pattern`] for the first invalid regular expression.
    pub fn new(
        allow_only: &[String],
        include: &[String],
        exclude: &[String],
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            allow_only: compile(allow_only)?,
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Policy that admits every channel.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Whether the principal may join the channel called `name`.
    pub fn may_join(&self, name: &str) -> bool {
        if !self.allow_only.is_empty() && !any_match(&self.allow_only, name) {
            trace!(channel = name, "not in allow-only list");
            return false;
        }

        let decision = match (self.include.is_empty(), self.exclude.is_empty()) {
            (true, false) => !any_match(&self.exclude, name),
            (true, true) => true,
            (false, _) => any_match(&self.include, name),
        };
        trace!(channel = name, decision, "may_join");
        decision
    }
}

/// Allowed backend servers for login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerRestriction {
    servers: Vec<String>,
}

impl ServerRestriction {
    /// Restrict logins to `servers`. Empty allows any server.
    pub fn new(servers: Vec<String>) -> Self {
        Self { servers }
    }

    /// Whether logging in to `server` is allowed.
    pub fn permits(&self, server: &str) -> bool {
        self.servers.is_empty() || self.servers.iter().any(|allowed| allowed == server)
    }
}
