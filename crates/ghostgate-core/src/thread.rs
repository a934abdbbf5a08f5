//! Thread context tags.
//!
//! The line protocol has no reply threads, edits or reactions. Each message
//! gets a short hex tag per channel instead; replies render as `[ccc->ppp]`
//! and edits, deletions and reactions reuse the original message's tag.
//!
//! Tags are meaningful only to the viewer they were rendered for, so every
//! principal owns its own [`ThreadContext`].
//!
//! # Invariants
//!
//! - Tags live in `0..4096` and render as three lowercase hex digits.
//! - Within a channel, fresh tags increase by one and wrap from `fff` to
//!   `000`.
//! - A channel remembers at most [`ThreadContext::RETAINED_PER_CHANNEL`]
//!   message ids; the oldest assignments are forgotten first.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
};

use crate::{ChannelId, MessageId, MessageKind};

/// Number of distinct tags per channel.
const TAG_SPACE: u16 = 4096;

/// A per-channel message tag in `0..4096`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadTag(u16);

impl ThreadTag {
    /// Numeric value.
    pub fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ThreadTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03x}", self.0)
    }
}

#[derive(Debug, Default)]
struct ChannelThreads {
    /// Next tag to hand out.
    next: u16,
    /// Message id -> (tag, assignment sequence).
    tags: HashMap<MessageId, (ThreadTag, u64)>,
    /// Assignment order for eviction. May hold stale entries for ids that
    /// were reassigned; those are skipped by sequence number and compacted
    /// away once they outnumber the live ones.
    order: VecDeque<(MessageId, u64)>,
    /// Monotonic assignment sequence.
    seq: u64,
}

impl ChannelThreads {
    fn lookup(&self, message: &MessageId) -> Option<ThreadTag> {
        self.tags.get(message).map(|(tag, _)| *tag)
    }

    fn assign_fresh(&mut self, message: &MessageId) -> ThreadTag {
        let tag = ThreadTag(self.next);
        self.next = (self.next + 1) % TAG_SPACE;
        self.seq += 1;

        self.tags.insert(message.clone(), (tag, self.seq));
        self.order.push_back((message.clone(), self.seq));
        self.evict();

        debug_assert!(tag.0 < TAG_SPACE);
        tag
    }

    fn evict(&mut self) {
        while self.tags.len() > ThreadContext::RETAINED_PER_CHANNEL {
            let Some((oldest, seq)) = self.order.pop_front() else {
                break;
            };
            if self.tags.get(&oldest).is_some_and(|(_, current)| *current == seq) {
                self.tags.remove(&oldest);
            }
        }
        // Reassigned ids leave stale entries anywhere in the queue
        if self.order.len() > 2 * ThreadContext::RETAINED_PER_CHANNEL {
            let tags = &self.tags;
            self.order.retain(|(id, seq)| tags.get(id).is_some_and(|(_, current)| current == seq));
        }
    }
}

/// Per-principal thread tag state for every channel it sees.
#[derive(Debug, Default)]
pub struct ThreadContext {
    channels: HashMap<ChannelId, ChannelThreads>,
}

impl ThreadContext {
    /// Maximum remembered message ids per channel.
    pub const RETAINED_PER_CHANNEL: usize = TAG_SPACE as usize;

    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag for `message`, assigning the next one if it has none yet.
    pub fn assign(&mut self, channel: &ChannelId, message: &MessageId) -> ThreadTag {
        let threads = self.channels.entry(channel.clone()).or_default();
        match threads.lookup(message) {
            Some(tag) => tag,
            None => threads.assign_fresh(message),
        }
    }

    /// Existing tag for `message`, if any.
    pub fn get(&self, channel: &ChannelId, message: &MessageId) -> Option<ThreadTag> {
        self.channels.get(channel).and_then(|threads| threads.lookup(message))
    }

    /// Render the bracketed tag for a message event.
    ///
    /// Edits, deletions and reactions reuse the message's tag. Other events
    /// always get a fresh tag, linked to the parent's tag when there is one.
    pub fn tag_for(
        &mut self,
        channel: &ChannelId,
        message: &MessageId,
        parent: Option<&MessageId>,
        kind: MessageKind,
    ) -> String {
        if kind.modifies_existing() {
            return format!("[{}]", self.assign(channel, message));
        }

        let parent_tag = parent.map(|parent| self.assign(channel, parent));
        let threads = self.channels.entry(channel.clone()).or_default();
        let tag = threads.assign_fresh(message);

        match parent_tag {
            Some(parent_tag) => format!("[{tag}->{parent_tag}]"),
            None => format!("[{tag}]"),
        }
    }

    /// Number of remembered message ids in a channel.
    pub fn tracked(&self, channel: &ChannelId) -> usize {
        self.channels.get(channel).map_or(0, |threads| threads.tags.len())
    }

    /// Forget everything (used on logout).
    pub fn clear(&mut self) {
        self.channels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(id: &str) -> ChannelId {
        ChannelId::new(id)
    }

    fn msg(id: impl ToString) -> MessageId {
        MessageId::new(id.to_string())
    }

    #[test]
    fn first_tag_is_zero() {
        let mut ctx = ThreadContext::new();
        assert_eq!(ctx.tag_for(&ch("c"), &msg(1), None, MessageKind::Posted), "[000]");
        assert_eq!(ctx.tag_for(&ch("c"), &msg(2), None, MessageKind::Posted), "[001]");
    }

    #[test]
    fn channels_are_independent() {
        let mut ctx = ThreadContext::new();
        ctx.tag_for(&ch("a"), &msg(1), None, MessageKind::Posted);
        assert_eq!(ctx.tag_for(&ch("b"), &msg(1), None, MessageKind::Posted), "[000]");
    }

    #[test]
    fn reply_links_to_parent() {
        let mut ctx = ThreadContext::new();
        ctx.tag_for(&ch("c"), &msg(10), None, MessageKind::Posted);
        ctx.tag_for(&ch("c"), &msg(11), None, MessageKind::Posted);
        let tag = ctx.tag_for(&ch("c"), &msg(12), Some(&msg(10)), MessageKind::Posted);
        assert_eq!(tag, "[002->000]");
    }

    #[test]
    fn unknown_parent_is_assigned_first() {
        let mut ctx = ThreadContext::new();
        let tag = ctx.tag_for(&ch("c"), &msg(2), Some(&msg(1)), MessageKind::Posted);
        assert_eq!(tag, "[001->000]");
        assert_eq!(ctx.get(&ch("c"), &msg(1)).map(ThreadTag::value), Some(0));
    }

    #[test]
    fn edits_reuse_tag_without_advancing() {
        let mut ctx = ThreadContext::new();
        ctx.tag_for(&ch("c"), &msg(1), None, MessageKind::Posted);
        ctx.tag_for(&ch("c"), &msg(2), None, MessageKind::Posted);

        assert_eq!(ctx.tag_for(&ch("c"), &msg(1), None, MessageKind::Edited), "[000]");
        assert_eq!(ctx.tag_for(&ch("c"), &msg(1), Some(&msg(1)), MessageKind::Reaction), "[000]");
        assert_eq!(ctx.tag_for(&ch("c"), &msg(3), None, MessageKind::Posted), "[002]");
    }

    #[test]
    fn reaction_on_unknown_message_assigns_lazily() {
        let mut ctx = ThreadContext::new();
        assert_eq!(ctx.tag_for(&ch("c"), &msg(9), None, MessageKind::Deleted), "[000]");
        assert_eq!(ctx.tag_for(&ch("c"), &msg(9), None, MessageKind::Deleted), "[000]");
    }

    #[test]
    fn posted_again_gets_fresh_tag() {
        let mut ctx = ThreadContext::new();
        ctx.tag_for(&ch("c"), &msg(1), None, MessageKind::Posted);
        assert_eq!(ctx.tag_for(&ch("c"), &msg(1), None, MessageKind::Posted), "[001]");
        assert_eq!(ctx.tracked(&ch("c")), 1);
    }

    #[test]
    fn wraps_after_fff() {
        let mut ctx = ThreadContext::new();
        let mut last = String::new();
        for id in 1..=4097 {
            last = ctx.tag_for(&ch("c"), &msg(id), None, MessageKind::Posted);
            if id == 4096 {
                assert_eq!(last, "[fff]");
            }
        }
        assert_eq!(last, "[000]");
        assert_eq!(ctx.tag_for(&ch("c"), &msg(4098), None, MessageKind::Posted), "[001]");
    }

    #[test]
    fn retention_is_bounded() {
        let mut ctx = ThreadContext::new();
        for id in 0..(ThreadContext::RETAINED_PER_CHANNEL + 10) {
            ctx.assign(&ch("c"), &msg(id));
        }
        assert_eq!(ctx.tracked(&ch("c")), ThreadContext::RETAINED_PER_CHANNEL);
        assert!(ctx.get(&ch("c"), &msg(0)).is_none());
        assert!(ctx.get(&ch("c"), &msg(ThreadContext::RETAINED_PER_CHANNEL + 9)).is_some());
    }

    #[test]
    fn reposted_ids_do_not_grow_the_queue() {
        let mut ctx = ThreadContext::new();
        ctx.tag_for(&ch("c"), &msg("pinned"), None, MessageKind::Posted);
        for _ in 0..(5 * ThreadContext::RETAINED_PER_CHANNEL) {
            ctx.tag_for(&ch("c"), &msg("busy"), None, MessageKind::Posted);
        }

        let threads = &ctx.channels[&ch("c")];
        assert!(threads.order.len() <= 2 * ThreadContext::RETAINED_PER_CHANNEL + 1);
        assert_eq!(ctx.tracked(&ch("c")), 2);
        assert!(ctx.get(&ch("c"), &msg("pinned")).is_some());
    }
}
