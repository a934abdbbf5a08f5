//! Fuzz target for the code fence formatter
//!
//! Feeds wrapped message text through [`CodeFence`] line by line, the way
//! the dispatcher renders incoming messages.
//!
//! # Invariants
//!
//! - Never panics
//! - Output lines never contain a newline
//! - Blank input lines map to "" outside a fence and " " inside one

#![no_main]

use arbitrary::Arbitrary;
use ghostgate_core::{CodeFence, wrap::wrap};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Message {
    text: String,
    prefix: String,
    width: u8,
}

fuzz_target!(|message: Message| {
    let wrapped = wrap(&message.text, usize::from(message.width));
    let mut fence = CodeFence::new();

    for line in wrapped.split('\n') {
        let was_open = fence.open().is_some();
        let out = fence.format_line(line, &message.prefix, None);

        assert!(!out.contains('\n'));
        if line.is_empty() {
            assert_eq!(out, if was_open { " " } else { "" });
        } else {
            assert_eq!(out, line);
        }
    }
});
