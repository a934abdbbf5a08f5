//! Service account command router.
//!
//! Lines a client sends to a service account are tokenized, looked up in a
//! fixed command table and checked for login state and argument count
//! before the handler runs. Every reply is a private message from the
//! service account to the principal.

use chrono::{DateTime, Utc};
use ghostgate_core::{
    Backend, ChannelId, Credentials, HistoryMessage, MessageKind, Placement, naming::SYSTEM_NICK,
    tokenize,
};
use tracing::{debug, warn};

use crate::{
    error::GatewayError,
    message::{Outbound, Prefix},
    registry::ChannelKey,
    session::Session,
};

const SCROLLBACK_USAGE: [&str; 2] = [
    "need SCROLLBACK (#<channel>|<user>) <lines>",
    "e.g. SCROLLBACK #bugs 10 (show last 10 lines from #bugs)",
];

/// Thread tag namespace for replayed history.
const SCROLLBACK_THREADS: &str = "&scrollback";

/// Commands understood by the service accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `LOGIN [email] [password]`
    Login,
    /// `LOGOUT`
    Logout,
    /// `SEARCH <terms>`
    Search,
    /// `SEARCHUSERS <terms>`
    SearchUsers,
    /// `SCROLLBACK (#<channel>|<nick>) <lines>`
    Scrollback,
}

/// Command table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Handler selector.
    pub command: Command,
    /// Lowercase command name.
    pub name: &'static str,
    /// Whether a bound backend is required.
    pub requires_login: bool,
    /// Maximum number of arguments; `None` is unbounded.
    pub max_args: Option<usize>,
}

/// Every command, sorted by name.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec { command: Command::Login, name: "login", requires_login: false, max_args: Some(2) },
    CommandSpec { command: Command::Logout, name: "logout", requires_login: true, max_args: Some(0) },
    CommandSpec { command: Command::Scrollback, name: "scrollback", requires_login: true, max_args: Some(2) },
    CommandSpec { command: Command::Search, name: "search", requires_login: true, max_args: None },
    CommandSpec {
        command: Command::SearchUsers,
        name: "searchusers",
        requires_login: true,
        max_args: None,
    },
];

/// Find a command by name, ignoring case.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name.eq_ignore_ascii_case(name))
}

/// Routes service account lines to command handlers.
pub struct ServiceCommandRouter<'a> {
    session: &'a Session,
    service: &'a Prefix,
}

impl<'a> ServiceCommandRouter<'a> {
    /// Router answering as `service` on behalf of `session`.
    pub fn new(session: &'a Session, service: &'a Prefix) -> Self {
        Self { session, service }
    }

    fn reply(&self, text: impl Into<String>) {
        let principal = &self.session.context().principal;
        principal.send(Outbound::Privmsg {
            from: self.service.clone(),
            target: principal.nick(),
            text: text.into(),
        });
    }

    /// Handle one line sent to the service account.
    pub async fn dispatch(&self, line: &str) {
        let tokens = match tokenize(line) {
            Ok(tokens) => tokens,
            Err(err) => {
                debug!(error = %err, "rejecting service line");
                self.reply(format!("\"{line}\" is improperly formatted"));
                return;
            },
        };

        let Some((name, args)) = tokens.split_first() else {
            self.list_commands();
            return;
        };
        let Some(spec) = lookup(name) else {
            self.list_commands();
            return;
        };

        if spec.requires_login && !self.session.context().principal.is_logged_in() {
            self.reply(GatewayError::NotLoggedIn.to_string());
            return;
        }
        if let Some(max) = spec.max_args.filter(|max| args.len() > *max) {
            self.reply(format!("{name} takes at most {max} arguments"));
            return;
        }

        let result = match spec.command {
            Command::Login => self.login(args).await,
            Command::Logout => self.session.logout().await,
            Command::Search => self.search(args).await,
            Command::SearchUsers => self.search_users(args).await,
            Command::Scrollback => self.scrollback(args).await,
        };

        if let Err(err) = result {
            if err.is_user_visible() {
                self.reply(err.to_string());
            } else {
                warn!(command = spec.name, error = %err, "service command failed");
            }
        }
    }

    fn list_commands(&self) {
        let names: Vec<&str> = COMMANDS.iter().map(|spec| spec.name).collect();
        self.reply(format!("possible commands: {}", names.join(", ")));
        self.reply("<command> help for more info");
    }

    fn backend(&self) -> Result<std::sync::Arc<dyn Backend>, GatewayError> {
        self.session.context().principal.backend().ok_or(GatewayError::NotLoggedIn)
    }

    async fn login(&self, args: &[String]) -> Result<(), GatewayError> {
        let credentials = match args {
            [login, password] => Credentials::new(login.as_str(), password.as_str()),
            [login] => Credentials::new(login.as_str(), ""),
            _ => Credentials::default(),
        };
        self.session.login(credentials).await?;
        self.reply("login OK");
        Ok(())
    }

    async fn search(&self, args: &[String]) -> Result<(), GatewayError> {
        let hits = self.backend()?.search_messages(&args.join(" ")).await?;
        if hits.is_empty() {
            self.reply("no results");
            return Ok(());
        }

        // Backends return newest first
        for hit in hits.iter().rev() {
            let header = format!("<{}> {}", hit.author, hit.timestamp.format("%B %d, %Y %H:%M"));
            let underline = "=".repeat(header.chars().count());
            self.reply(header);
            self.reply(underline);
            for line in hit.text.split('\n').filter(|line| !line.is_empty()) {
                self.reply(line);
            }
            self.reply("");
            self.reply("");
        }
        Ok(())
    }

    async fn search_users(&self, args: &[String]) -> Result<(), GatewayError> {
        let users = match self.backend()?.search_users(&args.join(" ")).await {
            Ok(users) => users,
            Err(err) => {
                self.reply(format!("Error {err}"));
                return Ok(());
            },
        };
        for user in users {
            self.reply(format!("{} {}", user.nick, user.real_name).trim_end().to_string());
        }
        Ok(())
    }

    async fn scrollback(&self, args: &[String]) -> Result<(), GatewayError> {
        let [reference, count] = args else {
            return self.scrollback_usage();
        };
        let Ok(limit) = count.parse::<usize>() else {
            return self.scrollback_usage();
        };

        let ctx = self.session.context();
        let backend = self.backend()?;
        let team_id = ctx.principal.me().map(|me| me.team_id).unwrap_or_default();

        let replay = if reference.starts_with('#') {
            let channel_id = backend.channel_id_for(&reference.replace('#', ""), &team_id);
            let key = ChannelKey::backend(&channel_id);
            let name = match ctx.registry.channel(&key) {
                Some(channel) => channel.name,
                None => backend.channel_name(&channel_id).await,
            };
            Replay::Channel { channel_id, name }
        } else if let Some(ghost) = ctx.registry.ghost_by_nick(reference) {
            let channel_id = backend.direct_channel_id(ghost.id(), &team_id).await?;
            Replay::Direct { channel_id, ghost: ghost.prefix() }
        } else {
            return self.scrollback_usage();
        };

        let history = match backend.history(replay.channel_id(), limit).await {
            Ok(history) => history,
            Err(err) if err.is_reference() => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        if history.is_empty() {
            self.reply("no results");
            return Ok(());
        }

        for message in &history {
            self.replay(&replay, message);
        }
        Ok(())
    }

    fn scrollback_usage(&self) -> Result<(), GatewayError> {
        for line in SCROLLBACK_USAGE {
            self.reply(line);
        }
        Ok(())
    }

    fn replay(&self, replay: &Replay, message: &HistoryMessage) {
        let ctx = self.session.context();
        let principal = &ctx.principal;

        let author = if message.is_info {
            Prefix::new(SYSTEM_NICK, "")
        } else if message.sender.me {
            principal.prefix()
        } else {
            ctx.registry.get_or_create_ghost(&message.sender).prefix()
        };

        let style = ctx.settings.context;
        // History is only tagged with prefix context
        let tagged = style.placement == Placement::Prefix
            && (author.nick != SYSTEM_NICK || replay.is_direct());
        let tag = tagged.then(|| {
            principal.with_threads(|threads| {
                threads.tag_for(
                    &ChannelId::new(SCROLLBACK_THREADS),
                    &message.id,
                    message.parent_id.as_ref(),
                    MessageKind::Posted,
                )
            })
        });
        let timestamp = history_timestamp(&message.timestamp);

        for line in message.rendered_text().split('\n') {
            let (from, target, text) = match (replay, &tag) {
                (Replay::Channel { name, .. }, Some(tag)) => {
                    (author.clone(), name.clone(), style.format_history(&timestamp, tag, line))
                },
                (Replay::Channel { name, .. }, None) => {
                    (author.clone(), name.clone(), format!("[{timestamp}] {line}"))
                },
                (Replay::Direct { ghost, .. }, Some(tag)) => {
                    (ghost.clone(), principal.nick(), style.format_history(&timestamp, tag, line))
                },
                (Replay::Direct { ghost, .. }, None) => (
                    ghost.clone(),
                    principal.nick(),
                    format!("[{timestamp}] <{}> {line}", author.nick),
                ),
            };
            principal.send(Outbound::Privmsg { from, target, text });
        }
    }
}

fn history_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M").to_string()
}

/// Where replayed history goes.
enum Replay {
    /// Into a protocol channel, spoken by each message's author.
    Channel { channel_id: ChannelId, name: String },
    /// As private messages from a ghost.
    Direct { channel_id: ChannelId, ghost: Prefix },
}

impl Replay {
    fn channel_id(&self) -> &ChannelId {
        match self {
            Self::Channel { channel_id, .. } | Self::Direct { channel_id, .. } => channel_id,
        }
    }

    fn is_direct(&self) -> bool {
        matches!(self, Self::Direct { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_sorted_and_unique() {
        let names: Vec<&str> = COMMANDS.iter().map(|spec| spec.name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(names, sorted);
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(lookup("LOGIN").map(|spec| spec.command), Some(Command::Login));
        assert_eq!(lookup("SearchUsers").map(|spec| spec.command), Some(Command::SearchUsers));
        assert!(lookup("help").is_none());
    }

    #[test]
    fn only_login_works_logged_out() {
        for spec in COMMANDS {
            assert_eq!(spec.requires_login, spec.command != Command::Login, "{}", spec.name);
        }
    }

    #[test]
    fn history_timestamps() {
        use chrono::TimeZone;
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).single().unwrap_or_default();
        assert_eq!(history_timestamp(&ts), "2024-03-09 07:05");
    }
}
