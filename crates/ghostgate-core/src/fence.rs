//! Stateful code fence formatter.
//!
//! Messages are rendered line by line. [`CodeFence`] tracks whether the
//! current line is inside a ```` ``` ```` or `~~~` fence so that blank lines
//! inside code survive and code lines can be syntax highlighted.

/// Fence delimiter currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceKind {
    /// ```` ``` ````
    Backtick,
    /// `~~~`
    Tilde,
}

impl FenceKind {
    fn marker(self) -> &'static str {
        match self {
            Self::Backtick => "```",
            Self::Tilde => "~~~",
        }
    }
}

/// Highlighter output format and color style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxStyle {
    /// Output formatter, e.g. `terminal256`.
    pub formatter: String,
    /// Color style, e.g. `pygments`.
    pub style: String,
}

impl Default for SyntaxStyle {
    fn default() -> Self {
        Self { formatter: "terminal256".to_string(), style: "pygments".to_string() }
    }
}

impl SyntaxStyle {
    /// Parse a `formatter:style` setting.
    ///
    /// Empty disables highlighting. A value without `:` keeps the defaults.
    pub fn parse(setting: &str) -> Option<Self> {
        if setting.is_empty() {
            return None;
        }
        match setting.split_once(':') {
            Some((formatter, style)) => {
                Some(Self { formatter: formatter.to_string(), style: style.to_string() })
            },
            None => Some(Self::default()),
        }
    }
}

/// Syntax highlighting engine.
///
/// Ghostgate ships no engine of its own. Embedders pass one to the gateway;
/// without it `syntaxhighlighting` only parses and fenced code is sent as
/// is.
pub trait Highlighter: Send + Sync {
    /// Highlight one line of code. `None` leaves the line untouched.
    fn highlight(&self, line: &str, lexer: &str, style: &SyntaxStyle) -> Option<String>;
}

/// Fence state for one message being rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeFence {
    open: Option<FenceKind>,
    lexer: String,
}

impl CodeFence {
    /// Fresh state: no fence open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently open fence.
    pub fn open(&self) -> Option<FenceKind> {
        self.open
    }

    /// Lexer hint of the open fence.
    pub fn lexer(&self) -> &str {
        &self.lexer
    }

    /// Format one line and advance the fence state.
    ///
    /// `prefix` is the context prefix that may precede a fence marker.
    /// Returns an empty string for lines that should not be sent.
    pub fn format_line(
        &mut self,
        line: &str,
        prefix: &str,
        highlighter: Option<(&dyn Highlighter, &SyntaxStyle)>,
    ) -> String {
        if line.is_empty() {
            return if self.open.is_some() { " ".to_string() } else { String::new() };
        }

        for kind in [FenceKind::Backtick, FenceKind::Tilde] {
            if self.open.is_some_and(|open| open != kind) {
                continue;
            }
            if let Some(rest) = strip_marker(line, prefix, kind.marker()) {
                if self.open.is_some() {
                    self.open = None;
                } else {
                    self.open = Some(kind);
                    self.lexer = rest.trim().to_string();
                }
                return line.to_string();
            }
        }

        match highlighter {
            Some((engine, style)) if self.open.is_some() && !self.lexer.is_empty() => engine
                .highlight(line, &self.lexer, style)
                .map_or_else(|| line.to_string(), |out| out.replace('\n', "")),
            _ => line.to_string(),
        }
    }
}

fn strip_marker<'a>(line: &'a str, prefix: &str, marker: &str) -> Option<&'a str> {
    if let Some(rest) = line.strip_prefix(marker) {
        return Some(rest);
    }
    line.strip_prefix(prefix).and_then(|rest| rest.strip_prefix(marker))
}
