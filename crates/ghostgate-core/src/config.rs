//! Gateway configuration.
//!
//! TOML with a `[gateway]` table and one table per backend protocol:
//!
//! ```toml
//! [gateway]
//! service_nick = "ghostgate"
//!
//! [deltachat]
//! prefixcontext = true
//! joinexclude = ["^#random"]
//! syntaxhighlighting = "terminal256:monokai"
//! ```
//!
//! Every key is optional; missing keys are off or empty. [`Settings`] is the
//! compiled form used at runtime.

use std::{collections::HashMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{AccessPolicy, ConfigError, ContextStyle, ServerRestriction, SyntaxStyle};

const DEFAULT_SERVICE_NICK: &str = "ghostgate";
const DEFAULT_QUEUE_CAPACITY: usize = 1000;

fn default_service_nick() -> String {
    DEFAULT_SERVICE_NICK.to_string()
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Gateway-wide settings.
    #[serde(default)]
    pub gateway: GatewaySection,
    /// Per-protocol bridge settings keyed by protocol name.
    #[serde(flatten)]
    pub protocols: HashMap<String, BridgeConfig>,
}

/// The `[gateway]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewaySection {
    /// Nick of the system service account.
    #[serde(default = "default_service_nick")]
    pub service_nick: String,
    /// Capacity of each session's backend event queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self { service_nick: default_service_nick(), queue_capacity: default_queue_capacity() }
    }
}

/// Settings of one backend protocol table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Append ` (mention <nick>)` when a mention key occurs in a message.
    #[serde(rename = "showmentions")]
    pub show_mentions: bool,
    /// Thread tags before the message text.
    #[serde(rename = "prefixcontext")]
    pub prefix_context: bool,
    /// Thread tags after the message text.
    #[serde(rename = "suffixcontext")]
    pub suffix_context: bool,
    /// Repeat the thread tag on every line.
    #[serde(rename = "showcontextmulti")]
    pub show_context_multi: bool,
    /// Drop reaction events.
    #[serde(rename = "hidereactions")]
    pub hide_reactions: bool,
    /// Only channels matching one of these may be joined.
    #[serde(rename = "joinonly")]
    pub join_only: Vec<String>,
    /// Channels to join.
    #[serde(rename = "joininclude")]
    pub join_include: Vec<String>,
    /// Channels to skip.
    #[serde(rename = "joinexclude")]
    pub join_exclude: Vec<String>,
    /// Backend servers logins are restricted to.
    pub restrict: Vec<String>,
    /// `formatter:style` for code fences; empty disables highlighting.
    /// Takes effect only when the gateway is given a [`crate::Highlighter`].
    #[serde(rename = "syntaxhighlighting")]
    pub syntax_highlighting: String,
    /// Do not join backend groups at login.
    #[serde(rename = "skipjoinonstart")]
    pub skip_join_on_start: bool,
}

impl GatewayConfig {
    /// Read and parse a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse config text.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Settings for `protocol`; defaults when the table is absent.
    pub fn bridge(&self, protocol: &str) -> BridgeConfig {
        self.protocols.get(protocol).cloned().unwrap_or_default()
    }
}

/// Compiled per-protocol settings.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Channel join filter.
    pub policy: AccessPolicy,
    /// Allowed login servers.
    pub restriction: ServerRestriction,
    /// Thread tag presentation.
    pub context: ContextStyle,
    /// Highlighter style; `None` disables highlighting.
    pub syntax: Option<SyntaxStyle>,
    /// Mark mentions of the principal.
    pub show_mentions: bool,
    /// Drop reaction events.
    pub hide_reactions: bool,
    /// Skip channel sync during bootstrap.
    pub skip_join_on_start: bool,
}

impl Settings {
    /// Compile a protocol table.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Pattern`] when a join pattern is not a valid regex.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            policy: AccessPolicy::new(
                &config.join_only,
                &config.join_include,
                &config.join_exclude,
            )?,
            restriction: ServerRestriction::new(config.restrict.clone()),
            context: ContextStyle::from_flags(
                config.prefix_context,
                config.suffix_context,
                config.show_context_multi,
            ),
            syntax: SyntaxStyle::parse(&config.syntax_highlighting),
            show_mentions: config.show_mentions,
            hide_reactions: config.hide_reactions,
            skip_join_on_start: config.skip_join_on_start,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::context::Placement;

    #[test]
    fn empty_config_uses_defaults() {
        let config = GatewayConfig::parse("").unwrap();
        assert_eq!(config.gateway.service_nick, "ghostgate");
        assert_eq!(config.gateway.queue_capacity, 1000);
        assert_eq!(config.bridge("deltachat"), BridgeConfig::default());
    }

    #[test]
    fn protocol_tables_use_lowercase_keys() {
        let config = GatewayConfig::parse(
            r#"
            [gateway]
            service_nick = "gw"

            [deltachat]
            prefixcontext = true
            showcontextmulti = true
            hidereactions = true
            joinexclude = ["^#random"]
            restrict = ["nine.testrun.org"]
            syntaxhighlighting = "terminal16m:monokai"
            skipjoinonstart = true
            "#,
        )
        .unwrap();

        assert_eq!(config.gateway.service_nick, "gw");
        let bridge = config.bridge("deltachat");
        assert!(bridge.prefix_context);
        assert!(bridge.hide_reactions);
        assert_eq!(bridge.join_exclude, ["^#random"]);

        let settings = Settings::from_config(&bridge).unwrap();
        assert_eq!(settings.context.placement, Placement::Prefix);
        assert!(settings.context.multi_line);
        assert!(!settings.policy.may_join("#random|1"));
        assert!(settings.restriction.permits("nine.testrun.org"));
        assert_eq!(settings.syntax.map(|s| s.style), Some("monokai".to_string()));
        assert!(settings.skip_join_on_start);
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let bridge = BridgeConfig { join_include: vec!["[".into()], ..BridgeConfig::default() };
        assert!(matches!(Settings::from_config(&bridge), Err(ConfigError::Pattern { .. })));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(GatewayConfig::parse("[gateway"), Err(ConfigError::Parse(_))));
    }
}
