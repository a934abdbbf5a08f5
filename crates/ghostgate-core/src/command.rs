//! Shell-style tokenizer for service account commands.
//!
//! Splits on unquoted whitespace. `"` and `'` toggle mutually exclusive
//! quoting modes. A backslash escapes the next character except inside single
//! quotes, where it is copied as-is and leaves the following character alone.

use crate::FormatError;

/// Split a command line into tokens.
///
/// Quotes are removed from the output. An empty quoted string does not produce
/// a token by itself.
///
/// # Errors
///
/// Returns [`FormatError`] if the line ends while escaped or inside quotes.
pub fn tokenize(line: &str) -> Result<Vec<String>, FormatError> {
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut escaped = false;
    let mut double_quoted = false;
    let mut single_quoted = false;
    let mut got = false;

    for c in line.chars() {
        if escaped {
            buf.push(c);
            escaped = false;
            continue;
        }

        if c == '\\' {
            if single_quoted {
                buf.push(c);
            } else {
                escaped = true;
            }
            continue;
        }

        if c.is_whitespace() {
            if single_quoted || double_quoted {
                buf.push(c);
            } else if got {
                tokens.push(std::mem::take(&mut buf));
                got = false;
            }
            continue;
        }

        match c {
            '"' if !single_quoted => {
                double_quoted = !double_quoted;
                continue;
            },
            '\'' if !double_quoted => {
                single_quoted = !single_quoted;
                continue;
            },
            _ => {},
        }

        got = true;
        buf.push(c);
    }

    if got {
        tokens.push(buf);
    }

    if escaped {
        return Err(FormatError::DanglingEscape);
    }
    if double_quoted {
        return Err(FormatError::UnclosedDoubleQuote);
    }
    if single_quoted {
        return Err(FormatError::UnclosedSingleQuote);
    }

    Ok(tokens)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn toks(line: &str) -> Vec<String> {
        tokenize(line).unwrap()
    }

    #[test]
    fn plain_words() {
        assert_eq!(toks("login a@b.org secret"), ["login", "a@b.org", "secret"]);
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(toks("  search\t foo   bar  "), ["search", "foo", "bar"]);
        assert!(toks("").is_empty());
        assert!(toks("   ").is_empty());
    }

    #[test]
    fn double_quotes_group() {
        assert_eq!(toks("search foo \"bar baz\""), ["search", "foo", "bar baz"]);
    }

    #[test]
    fn single_quotes_group() {
        assert_eq!(toks("say 'a \"b\" c'"), ["say", "a \"b\" c"]);
    }

    #[test]
    fn double_quotes_keep_single_quote() {
        assert_eq!(toks("say \"it's\""), ["say", "it's"]);
    }

    #[test]
    fn backslash_escapes_outside_single_quotes() {
        assert_eq!(toks(r"a\ b c"), ["a b", "c"]);
        assert_eq!(toks(r#""a\"b""#), ["a\"b"]);
    }

    #[test]
    fn backslash_is_literal_in_single_quotes() {
        assert_eq!(toks(r"'a\b'"), [r"a\b"]);
        // The backslash does not consume the closing quote.
        assert_eq!(toks(r"'a\' b"), [r"a\", "b"]);
    }

    #[test]
    fn quotes_join_adjacent_text() {
        assert_eq!(toks("ab\"cd ef\"gh"), ["abcd efgh"]);
    }

    #[test]
    fn errors() {
        assert_eq!(tokenize("search \"foo"), Err(FormatError::UnclosedDoubleQuote));
        assert_eq!(tokenize("search 'foo"), Err(FormatError::UnclosedSingleQuote));
        assert_eq!(tokenize("search foo\\"), Err(FormatError::DanglingEscape));
    }
}
