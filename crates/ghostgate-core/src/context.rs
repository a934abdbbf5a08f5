//! Placement of thread tags around message text.
//!
//! A tag can be placed in front of or behind the message. CTCP `ACTION`
//! messages keep their framing bytes outermost, and multi-line mode repeats
//! the tag on every output line instead of only the first/last.

/// Default maximum line width before wrapping.
pub const DEFAULT_WIDTH: usize = 440;

const ACTION_START: &str = "\x01ACTION ";
const CTCP_END: &str = " \x01";

/// Where the thread tag goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// No tags.
    #[default]
    None,
    /// Tag before the text.
    Prefix,
    /// Tag after the text.
    Suffix,
}

/// Thread tag presentation for one backend protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextStyle {
    /// Tag placement.
    pub placement: Placement,
    /// Repeat the tag on every line of a multi-line message.
    pub multi_line: bool,
}

/// Message text with its tag applied, ready for wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextualText {
    /// Text to wrap and send.
    pub text: String,
    /// Per-line prefix (empty unless `per_line`).
    pub prefix: String,
    /// Per-line suffix (empty unless `per_line`).
    pub suffix: String,
    /// Add `prefix` and `suffix` to every output line.
    pub per_line: bool,
    /// Wrap width.
    pub width: usize,
}

impl ContextualText {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            prefix: String::new(),
            suffix: String::new(),
            per_line: false,
            width: DEFAULT_WIDTH,
        }
    }

    /// Decorate one output line.
    pub fn decorate(&self, line: &str) -> String {
        if self.per_line {
            format!("{}{line}{}", self.prefix, self.suffix)
        } else {
            line.to_string()
        }
    }
}

impl ContextStyle {
    /// Build from the config flags. Prefix wins when both are set.
    pub fn from_flags(prefix: bool, suffix: bool, multi_line: bool) -> Self {
        let placement = match (prefix, suffix) {
            (true, _) => Placement::Prefix,
            (false, true) => Placement::Suffix,
            (false, false) => Placement::None,
        };
        Self { placement, multi_line }
    }

    /// True when tags are rendered at all.
    pub fn enabled(&self) -> bool {
        self.placement != Placement::None
    }

    /// Apply the tag to `text`.
    ///
    /// `tag` is only called when a tag is actually rendered, so disabled
    /// styles never advance a thread counter.
    pub fn apply(&self, text: &str, tag: impl FnOnce() -> String) -> ContextualText {
        match self.placement {
            Placement::None => ContextualText::plain(text),
            Placement::Prefix => {
                let prefix = format!("{} ", tag());
                if text.starts_with('\x01') {
                    let text = text.replacen(ACTION_START, &format!("{ACTION_START}{prefix}"), 1);
                    let width = text.chars().count();
                    ContextualText { text, prefix, suffix: String::new(), per_line: false, width }
                } else if self.multi_line {
                    let width = DEFAULT_WIDTH.saturating_sub(prefix.chars().count());
                    ContextualText {
                        text: text.to_string(),
                        prefix,
                        suffix: String::new(),
                        per_line: true,
                        width,
                    }
                } else {
                    ContextualText {
                        text: format!("{prefix}{text}"),
                        prefix,
                        suffix: String::new(),
                        per_line: false,
                        width: DEFAULT_WIDTH,
                    }
                }
            },
            Placement::Suffix => {
                let suffix = format!(" {}", tag());
                if text.ends_with('\x01') {
                    let text = text.replacen(CTCP_END, &format!("{suffix}{CTCP_END}"), 1);
                    let width = text.chars().count();
                    ContextualText { text, prefix: String::new(), suffix, per_line: false, width }
                } else if self.multi_line {
                    let width = DEFAULT_WIDTH.saturating_sub(suffix.chars().count());
                    ContextualText {
                        text: text.to_string(),
                        prefix: String::new(),
                        suffix,
                        per_line: true,
                        width,
                    }
                } else {
                    ContextualText {
                        text: format!("{}{suffix}", text.trim_end_matches('\n')),
                        prefix: String::new(),
                        suffix,
                        per_line: false,
                        width: DEFAULT_WIDTH,
                    }
                }
            },
        }
    }

    /// Prefix text for fence detection on tagged lines.
    pub fn fence_prefix<'a>(&self, contextual: &'a ContextualText) -> &'a str {
        match self.placement {
            Placement::Prefix => &contextual.prefix,
            _ => "",
        }
    }

    /// Format one replayed history line.
    ///
    /// `[ts] tag line` or `[ts] line tag` depending on placement; without a
    /// placement the tag is dropped.
    pub fn format_history(&self, timestamp: &str, tag: &str, line: &str) -> String {
        match self.placement {
            Placement::Prefix => format!("[{timestamp}] {tag} {line}"),
            Placement::Suffix => format!("[{timestamp}] {line} {tag}"),
            Placement::None => format!("[{timestamp}] {line}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag() -> String {
        "[001]".to_string()
    }

    #[test]
    fn none_never_calls_tag() {
        let style = ContextStyle::default();
        let out = style.apply("hello", || unreachable!("tag rendered"));
        assert_eq!(out, ContextualText::plain("hello"));
        assert_eq!(out.width, DEFAULT_WIDTH);
    }

    #[test]
    fn prefix_wins_over_suffix() {
        assert_eq!(ContextStyle::from_flags(true, true, false).placement, Placement::Prefix);
        assert_eq!(ContextStyle::from_flags(false, true, false).placement, Placement::Suffix);
        assert!(!ContextStyle::from_flags(false, false, true).enabled());
    }

    #[test]
    fn prefix_single_line() {
        let out = ContextStyle::from_flags(true, false, false).apply("hello", tag);
        assert_eq!(out.text, "[001] hello");
        assert!(!out.per_line);
        assert_eq!(out.decorate("x"), "x");
    }

    #[test]
    fn prefix_action() {
        let out = ContextStyle::from_flags(true, false, false).apply("\x01ACTION waves \x01", tag);
        assert_eq!(out.text, "\x01ACTION [001] waves \x01");
        assert_eq!(out.width, out.text.chars().count());
    }

    #[test]
    fn prefix_multi_line() {
        let out = ContextStyle::from_flags(true, false, true).apply("a\nb", tag);
        assert_eq!(out.text, "a\nb");
        assert!(out.per_line);
        assert_eq!(out.width, DEFAULT_WIDTH - 6);
        assert_eq!(out.decorate("b"), "[001] b");
    }

    #[test]
    fn suffix_single_line_trims_newlines() {
        let out = ContextStyle::from_flags(false, true, false).apply("hello\n\n", tag);
        assert_eq!(out.text, "hello [001]");
    }

    #[test]
    fn suffix_action() {
        let out = ContextStyle::from_flags(false, true, false).apply("\x01ACTION waves \x01", tag);
        assert_eq!(out.text, "\x01ACTION waves [001] \x01");
    }

    #[test]
    fn suffix_multi_line() {
        let out = ContextStyle::from_flags(false, true, true).apply("a\nb", tag);
        assert_eq!(out.decorate("a"), "a [001]");
        assert_eq!(out.width, DEFAULT_WIDTH - 6);
    }

    #[test]
    fn history_lines() {
        let prefix = ContextStyle::from_flags(true, false, false);
        let suffix = ContextStyle::from_flags(false, true, false);
        assert_eq!(prefix.format_history("2024-01-02 03:04", "[000]", "hi"), "[2024-01-02 03:04] [000] hi");
        assert_eq!(suffix.format_history("2024-01-02 03:04", "[000]", "hi"), "[2024-01-02 03:04] hi [000]");
    }
}
