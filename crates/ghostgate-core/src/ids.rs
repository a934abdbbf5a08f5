//! Backend identifiers.
//!
//! Backends disagree on identifier shape (numeric chat ids, opaque strings),
//! so every identifier is carried as a string newtype. The newtypes keep user,
//! channel and message ids from being mixed up at call sites.

use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw backend identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Raw identifier string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True for the empty identifier.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Backend user (contact) identifier.
    UserId
);

string_id!(
    /// Backend group or direct-chat identifier.
    ChannelId
);

string_id!(
    /// Backend message identifier.
    MessageId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_raw_id() {
        assert_eq!(UserId::new("42").to_string(), "42");
        assert_eq!(ChannelId::from("10").as_str(), "10");
        assert!(MessageId::default().is_empty());
    }
}
