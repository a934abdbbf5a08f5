//! Fuzz target for thread tag assignment
//!
//! Replays arbitrary sequences of new messages, replies and edits across a
//! handful of channels.
//!
//! # Invariants
//!
//! - Never panics
//! - Remembered ids per channel stay bounded
//! - Edits reuse the tag already assigned to a message

#![no_main]

use arbitrary::Arbitrary;
use ghostgate_core::{ChannelId, MessageId, MessageKind, ThreadContext};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Post { channel: u8, message: u16 },
    Reply { channel: u8, message: u16, parent: u16 },
    Edit { channel: u8, message: u16 },
}

fuzz_target!(|ops: Vec<Op>| {
    let mut threads = ThreadContext::new();

    for op in ops {
        match op {
            Op::Post { channel, message } => {
                let channel = ChannelId::new(format!("c{}", channel % 4));
                let message = MessageId::new(message.to_string());
                threads.tag_for(&channel, &message, None, MessageKind::Posted);
            },
            Op::Reply { channel, message, parent } => {
                let channel = ChannelId::new(format!("c{}", channel % 4));
                let parent = MessageId::new(parent.to_string());
                let tag = threads.tag_for(
                    &channel,
                    &MessageId::new(message.to_string()),
                    Some(&parent),
                    MessageKind::Posted,
                );
                assert!(tag.contains("->"));
            },
            Op::Edit { channel, message } => {
                let channel = ChannelId::new(format!("c{}", channel % 4));
                let message = MessageId::new(message.to_string());
                let before = threads.get(&channel, &message);
                let tag = threads.tag_for(&channel, &message, None, MessageKind::Edited);
                if let Some(before) = before {
                    assert_eq!(tag, format!("[{before}]"));
                }
            },
        }
        for channel in 0..4 {
            let channel = ChannelId::new(format!("c{channel}"));
            assert!(threads.tracked(&channel) <= ThreadContext::RETAINED_PER_CHANNEL);
        }
    }
});
