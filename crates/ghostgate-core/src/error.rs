//! Error types for the gateway core.
//!
//! Strongly-typed errors for the three places the core can fail on its own:
//! malformed service commands, backend adapter calls, and configuration.

use thiserror::Error;

/// A service account command line could not be tokenized.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// Input ended right after a `\`.
    #[error("input ends with a dangling escape")]
    DanglingEscape,

    /// Input ended inside a `"..."` section.
    #[error("unclosed double quote")]
    UnclosedDoubleQuote,

    /// Input ended inside a `'...'` section.
    #[error("unclosed single quote")]
    UnclosedSingleQuote,
}

/// Errors surfaced by a backend adapter.
///
/// Every backend operation may fail; adapters report the failure as a value
/// and never abort the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Bad or missing credentials, or the account could not be configured.
    ///
    /// Always shown verbatim to the user who started the login.
    #[error("{0}")]
    Authentication(String),

    /// The referenced user, channel or message does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The reference could not be parsed as a backend identifier.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The backend does not support this operation.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Any other failed call.
    #[error("backend call failed: {0}")]
    Call(String),
}

impl BackendError {
    /// Returns true for soft not-found errors.
    ///
    /// Reference errors degrade to an empty result instead of being reported.
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidReference(_))
    }
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for the expected schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A channel pattern is not a valid regular expression.
    #[error("invalid channel pattern {pattern:?}: {source}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// Regex compiler error.
        source: regex::Error,
    },
}
