//! Outbound protocol messages.
//!
//! Everything the gateway shows a client is one of these. The framing layer
//! serializes them; `Display` renders the conventional IRC line (without
//! the trailing CRLF).

use std::fmt;

/// Server name used as prefix for numeric replies.
pub const SERVER_NAME: &str = "ghostgate";

/// Source of a message: `nick!user@host`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Prefix {
    /// Nickname.
    pub nick: String,
    /// User name. Ghosts use their nick.
    pub user: String,
    /// Host.
    pub host: String,
}

impl Prefix {
    /// Prefix with `user` equal to `nick`. An empty host becomes
    /// [`SERVER_NAME`].
    pub fn new(nick: impl Into<String>, host: impl Into<String>) -> Self {
        let nick = nick.into();
        let host = host.into();
        let host = if host.is_empty() { SERVER_NAME.to_string() } else { host };
        Self { user: nick.clone(), nick, host }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}@{}", self.nick, self.user, self.host)
    }
}

/// Numeric replies the gateway sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Numeric {
    /// 305
    UnAway,
    /// 306
    NowAway,
}

impl Numeric {
    /// Numeric code.
    pub fn code(self) -> u16 {
        match self {
            Self::UnAway => 305,
            Self::NowAway => 306,
        }
    }

    /// Human readable trailing text.
    pub fn text(self) -> &'static str {
        match self {
            Self::UnAway => "You are no longer marked as being away",
            Self::NowAway => "You have been marked as being away",
        }
    }
}

/// A message for the protocol client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Channel or private message.
    Privmsg {
        /// Sender.
        from: Prefix,
        /// Channel name or recipient nick.
        target: String,
        /// One line of text.
        text: String,
    },

    /// Notice.
    Notice {
        /// Sender.
        from: Prefix,
        /// Channel name or recipient nick.
        target: String,
        /// One line of text.
        text: String,
    },

    /// Someone joined a channel.
    Join {
        /// Who joined.
        who: Prefix,
        /// Channel name.
        channel: String,
    },

    /// Someone left a channel.
    Part {
        /// Who left.
        who: Prefix,
        /// Channel name.
        channel: String,
    },

    /// Channel topic set.
    Topic {
        /// Who set it.
        setter: Prefix,
        /// Channel name.
        channel: String,
        /// New topic.
        topic: String,
    },

    /// Nick change.
    Nick {
        /// Identity before the change.
        old: Prefix,
        /// New nickname.
        new_nick: String,
    },

    /// Channel member list, sent after the principal joins.
    Names {
        /// Recipient nick.
        nick: String,
        /// Channel name.
        channel: String,
        /// Member nicks.
        names: Vec<String>,
    },

    /// Numeric reply.
    Reply {
        /// Which reply.
        numeric: Numeric,
        /// Recipient nick.
        nick: String,
    },
}

impl Outbound {
    /// Text line carried by a message or notice.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Privmsg { text, .. } | Self::Notice { text, .. } => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Privmsg { from, target, text } => write!(f, ":{from} PRIVMSG {target} :{text}"),
            Self::Notice { from, target, text } => write!(f, ":{from} NOTICE {target} :{text}"),
            Self::Join { who, channel } => write!(f, ":{who} JOIN {channel}"),
            Self::Part { who, channel } => write!(f, ":{who} PART {channel}"),
            Self::Topic { setter, channel, topic } => {
                write!(f, ":{setter} TOPIC {channel} :{topic}")
            },
            Self::Nick { old, new_nick } => write!(f, ":{old} NICK {new_nick}"),
            Self::Names { nick, channel, names } => {
                write!(f, ":{SERVER_NAME} 353 {nick} = {channel} :{}", names.join(" "))
            },
            Self::Reply { numeric, nick } => {
                write!(f, ":{SERVER_NAME} {} {nick} :{}", numeric.code(), numeric.text())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_defaults_host() {
        assert_eq!(Prefix::new("bob", "").to_string(), "bob!bob@ghostgate");
        assert_eq!(Prefix::new("bob", "b.org").to_string(), "bob!bob@b.org");
    }

    #[test]
    fn renders_lines() {
        let bob = Prefix::new("bob", "h");
        let msg = Outbound::Privmsg { from: bob.clone(), target: "#dev|1".into(), text: "hi".into() };
        assert_eq!(msg.to_string(), ":bob!bob@h PRIVMSG #dev|1 :hi");
        assert_eq!(msg.text(), Some("hi"));

        let nick = Outbound::Nick { old: bob, new_nick: "robert".into() };
        assert_eq!(nick.to_string(), ":bob!bob@h NICK robert");
        assert_eq!(nick.text(), None);
    }

    #[test]
    fn renders_numerics() {
        let reply = Outbound::Reply { numeric: Numeric::NowAway, nick: "me".into() };
        assert_eq!(reply.to_string(), ":ghostgate 306 me :You have been marked as being away");
        let names = Outbound::Names {
            nick: "me".into(),
            channel: "&users".into(),
            names: vec!["a".into(), "b".into()],
        };
        assert_eq!(names.to_string(), ":ghostgate 353 me = &users :a b");
    }
}
