//! Message text pipeline: mentions, thread tag, wrap, code fences.

use ghostgate_core::{ChannelId, CodeFence, ContextStyle, MessageId, MessageKind, wrap::wrap};

use crate::context::SessionContext;

/// A backend message about to be rendered.
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    /// Thread tag namespace (channel id, or peer id for direct chats).
    pub thread_key: &'a ChannelId,
    /// Message id.
    pub message_id: &'a MessageId,
    /// Parent message id.
    pub parent_id: Option<&'a MessageId>,
    /// Event kind.
    pub kind: MessageKind,
    /// Raw text.
    pub text: &'a str,
    /// Whether to render a thread tag.
    pub tagged: bool,
}

/// Turn one backend message into the protocol lines to send.
///
/// Empty lines outside code fences are dropped.
pub fn render_lines(ctx: &SessionContext, input: RenderInput<'_>) -> Vec<String> {
    let principal = &ctx.principal;
    let mut text = input.text.to_string();

    if ctx.settings.show_mentions {
        let nick = principal.nick();
        let keys = principal.me().map(|me| me.mention_keys).unwrap_or_default();
        for key in keys.iter().filter(|key| **key != nick && !key.is_empty()) {
            if input.text.contains(key.as_str()) {
                text.push_str(&format!(" (mention {nick})"));
            }
        }
    }

    let style = if input.tagged { ctx.settings.context } else { ContextStyle::default() };
    let contextual = style.apply(&text, || {
        principal.with_threads(|threads| {
            threads.tag_for(input.thread_key, input.message_id, input.parent_id, input.kind)
        })
    });

    let highlighter = match (&ctx.highlighter, &ctx.settings.syntax) {
        (Some(engine), Some(syntax)) => Some((engine.as_ref(), syntax)),
        _ => None,
    };
    let fence_prefix = style.fence_prefix(&contextual);

    let mut fence = CodeFence::new();
    wrap(&contextual.text, contextual.width)
        .split('\n')
        .map(|line| fence.format_line(line, fence_prefix, highlighter))
        .filter(|line| !line.is_empty())
        .map(|line| contextual.decorate(&line))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ghostgate_core::{Highlighter, Settings, SyntaxStyle};
    use tokio::sync::mpsc;

    use super::*;
    use crate::{message::Prefix, principal::Principal, registry::Registry};

    struct Shout;

    impl Highlighter for Shout {
        fn highlight(&self, line: &str, _lexer: &str, _style: &SyntaxStyle) -> Option<String> {
            Some(line.to_uppercase())
        }
    }

    fn context(settings: Settings) -> SessionContext {
        let (tx, _rx) = mpsc::unbounded_channel();
        SessionContext {
            registry: Registry::new(),
            principal: Arc::new(Principal::new(1, "alice", tx)),
            settings: Arc::new(settings),
            highlighter: Some(Arc::new(Shout)),
            login_service: Prefix::new("memory", ""),
            system_service: Prefix::new("ghostgate", ""),
            queue_capacity: 8,
        }
    }

    fn input<'a>(key: &'a ChannelId, id: &'a MessageId, text: &'a str) -> RenderInput<'a> {
        RenderInput {
            thread_key: key,
            message_id: id,
            parent_id: None,
            kind: MessageKind::Posted,
            text,
            tagged: true,
        }
    }

    #[test]
    fn plain_text_drops_blank_lines() {
        let ctx = context(Settings::default());
        let (key, id) = (ChannelId::new("c"), MessageId::new("m"));
        assert_eq!(render_lines(&ctx, input(&key, &id, "a\n\nb")), ["a", "b"]);
    }

    #[test]
    fn prefix_tag_first_line_only() {
        let settings = Settings {
            context: ContextStyle::from_flags(true, false, false),
            ..Settings::default()
        };
        let ctx = context(settings);
        let (key, id) = (ChannelId::new("c"), MessageId::new("m"));
        assert_eq!(render_lines(&ctx, input(&key, &id, "a\nb")), ["[000] a", "b"]);
    }

    #[test]
    fn multi_line_tags_every_line() {
        let settings = Settings {
            context: ContextStyle::from_flags(false, true, true),
            ..Settings::default()
        };
        let ctx = context(settings);
        let (key, id) = (ChannelId::new("c"), MessageId::new("m"));
        assert_eq!(render_lines(&ctx, input(&key, &id, "a\nb")), ["a [000]", "b [000]"]);
    }

    #[test]
    fn untagged_does_not_advance_counter() {
        let settings = Settings {
            context: ContextStyle::from_flags(true, false, false),
            ..Settings::default()
        };
        let ctx = context(settings);
        let (key, id) = (ChannelId::new("c"), MessageId::new("m"));
        let untagged = RenderInput { tagged: false, ..input(&key, &id, "x") };
        assert_eq!(render_lines(&ctx, untagged), ["x"]);
        assert_eq!(ctx.principal.with_threads(|t| t.tracked(&key)), 0);
    }

    #[test]
    fn syntax_setting_without_engine_passes_code_through() {
        let settings = Settings { syntax: SyntaxStyle::parse("terminal256"), ..Settings::default() };
        let ctx = SessionContext { highlighter: None, ..context(settings) };
        let (key, id) = (ChannelId::new("c"), MessageId::new("m"));
        let out = render_lines(&ctx, input(&key, &id, "```rust\nlet x;\n```"));
        assert_eq!(out, ["```rust", "let x;", "```"]);
    }

    #[test]
    fn fenced_code_is_highlighted() {
        let settings = Settings { syntax: SyntaxStyle::parse("terminal256"), ..Settings::default() };
        let ctx = context(settings);
        let (key, id) = (ChannelId::new("c"), MessageId::new("m"));
        let out = render_lines(&ctx, input(&key, &id, "```rust\nlet x;\n\n```"));
        assert_eq!(out, ["```rust", "LET X;", " ", "```"]);
    }
}
