//! Property-based tests for the command tokenizer

use ghostgate_core::{FormatError, tokenize};
use proptest::prelude::*;

fn plain_token() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9@._-]{1,12}"
}

/// Property: Tokens without quoting characters survive a join/split cycle
#[test]
fn prop_plain_tokens_rejoin() {
    proptest!(|(tokens in prop::collection::vec(plain_token(), 0..8))| {
        let line = tokens.join(" ");
        prop_assert_eq!(tokenize(&line)?, tokens);
    });
}

/// Property: Double quoting any token without `"` or `\` yields it verbatim
#[test]
fn prop_double_quoted_token_is_verbatim() {
    proptest!(|(inner in "[a-z][a-z ']{0,19}", head in plain_token())| {
        let line = format!("{head} \"{inner}\"");
        prop_assert_eq!(tokenize(&line)?, vec![head, inner]);
    });
}

/// Property: Whitespace runs never produce empty tokens
#[test]
fn prop_no_empty_tokens() {
    proptest!(|(line in "[a-z \t]{0,40}")| {
        let tokens = tokenize(&line)?;
        prop_assert!(tokens.iter().all(|t| !t.is_empty()));
        prop_assert_eq!(tokens.len(), line.split_whitespace().count());
    });
}

/// Property: A trailing unmatched double quote is always reported
#[test]
fn prop_unclosed_double_quote() {
    proptest!(|(tokens in prop::collection::vec(plain_token(), 0..5))| {
        let line = format!("{} \"tail", tokens.join(" "));
        prop_assert_eq!(tokenize(&line), Err(FormatError::UnclosedDoubleQuote));
    });
}

/// Property: The tokenizer never panics
#[test]
fn prop_total_on_arbitrary_input() {
    proptest!(|(line in any::<String>())| {
        let _ = tokenize(&line);
    });
}
