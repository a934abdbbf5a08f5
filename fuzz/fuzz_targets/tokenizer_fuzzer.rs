//! Fuzz target for the service command tokenizer
//!
//! Arbitrary command lines must either tokenize or return a format error.
//!
//! # Invariants
//!
//! - Never panics
//! - Lines without quotes or escapes split exactly on whitespace

#![no_main]

use ghostgate_core::tokenize;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|line: &str| {
    let Ok(tokens) = tokenize(line) else {
        return;
    };

    let plain = !line.contains(['"', '\'', '\\']);
    if plain {
        let expected: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(tokens, expected, "plain line must split on whitespace");
    }
});
