//! Event dispatcher behavior tests
//!
//! Each test logs in to the sample world, drains the bootstrap output and
//! then checks what one or more backend events turn into.

#![allow(clippy::unwrap_used)]

use ghostgate_core::{
    BackendEvent, ChannelId, ChannelKind, ChannelMessage, DirectMessage, FileInfo, MessageId,
    MessageKind, MessageStyle, Presence, UserId, UserInfo,
};
use ghostgate_harness::{Fixture, MemoryWorld};

fn user(id: &str, nick: &str) -> UserInfo {
    UserInfo::new(id, nick)
}

fn me() -> UserInfo {
    user("u0", "alice").as_me()
}

fn bob() -> UserInfo {
    user("u1", "bob")
}

fn carol() -> UserInfo {
    user("u2", "carol")
}

fn post(channel: &str, sender: UserInfo, id: &str, text: &str) -> BackendEvent {
    BackendEvent::ChannelMessage(ChannelMessage {
        channel_id: ChannelId::new(channel),
        sender,
        message_id: MessageId::new(id),
        text: text.to_string(),
        ..ChannelMessage::default()
    })
}

async fn logged_in(config: &str) -> Fixture {
    let mut fx = Fixture::with_config(MemoryWorld::sample(), config).unwrap();
    fx.login("alice@example.org", "").await.unwrap();
    fx.drain();
    fx
}

fn rendered(messages: &[ghostgate_bridge::Outbound]) -> Vec<String> {
    messages.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn message_in_joined_channel() {
    let mut fx = logged_in("").await;
    let out = fx.emit(post("c1", bob(), "m1", "hello")).await;
    assert_eq!(rendered(&out), [":bob!bob@ghostgate PRIVMSG #general|c1 :hello"]);
}

#[tokio::test]
async fn notices_keep_their_style() {
    let mut fx = logged_in("").await;
    let event = BackendEvent::ChannelMessage(ChannelMessage {
        channel_id: ChannelId::new("c1"),
        sender: bob(),
        message_id: MessageId::new("m1"),
        style: MessageStyle::Notice,
        text: "heads up".into(),
        ..ChannelMessage::default()
    });
    let out = fx.emit(event).await;
    assert_eq!(rendered(&out), [":bob!bob@ghostgate NOTICE #general|c1 :heads up"]);
}

#[tokio::test]
async fn unmapped_channel_is_synced_exactly_once() {
    let mut fx = logged_in("").await;
    fx.world.add_group("c3", "Ops", &["u1"]);
    let before = fx.world.calls("channel_members");

    let first = fx.emit(post("c3", bob(), "m1", "hi")).await;
    let second = fx.emit(post("c3", bob(), "m2", "again")).await;

    assert_eq!(rendered(&first), [
        ":alice!alice@ghostgate JOIN #ops|c3",
        ":ghostgate 353 alice = #ops|c3 :alice bob",
        ":memory!memory@ghostgate TOPIC #ops|c3 :Ops",
        ":bob!bob@ghostgate PRIVMSG #ops|c3 :hi",
    ]);
    assert_eq!(rendered(&second), [":bob!bob@ghostgate PRIVMSG #ops|c3 :again"]);
    assert_eq!(fx.world.calls("channel_members"), before + 1);
}

#[tokio::test]
async fn new_sender_joins_before_speaking() {
    let mut fx = logged_in("").await;
    let dave = user("u3", "dave");
    let out = fx.emit(post("c1", dave, "m1", "hey")).await;
    assert_eq!(rendered(&out), [
        ":dave!dave@ghostgate JOIN #general|c1",
        ":dave!dave@ghostgate PRIVMSG #general|c1 :hey",
    ]);
}

#[tokio::test]
async fn excluded_channel_goes_to_messages() {
    let mut fx = logged_in("[memory]\njoinexclude = [\"^#random\"]\n").await;
    let out = fx.emit(post("c2", carol(), "m1", "yo")).await;
    assert_eq!(rendered(&out), [":carol/#random|c2!carol@ghostgate PRIVMSG &messages :yo"]);
}

#[tokio::test]
async fn own_messages_come_from_the_principal() {
    let mut fx = logged_in("").await;
    let out = fx.emit(post("c1", me(), "m1", "from my phone")).await;
    assert_eq!(rendered(&out), [":alice!alice@ghostgate PRIVMSG #general|c1 :from my phone"]);
}

#[tokio::test]
async fn direct_messages_both_ways() {
    let mut fx = logged_in("").await;

    let incoming = BackendEvent::DirectMessage(DirectMessage {
        channel_id: ChannelId::new("d1"),
        sender: bob(),
        receiver: me(),
        message_id: MessageId::new("m1"),
        text: "psst".into(),
        ..DirectMessage::default()
    });
    let out = fx.emit(incoming).await;
    assert_eq!(rendered(&out), [":bob!bob@ghostgate PRIVMSG alice :psst"]);

    let outgoing = BackendEvent::DirectMessage(DirectMessage {
        channel_id: ChannelId::new("d1"),
        sender: me(),
        receiver: bob(),
        message_id: MessageId::new("m2"),
        text: "hey".into(),
        ..DirectMessage::default()
    });
    let out = fx.emit(outgoing).await;
    assert_eq!(rendered(&out), [":alice!alice@ghostgate PRIVMSG bob :hey"]);
}

#[tokio::test]
async fn thread_tags_link_replies_and_reactions() {
    let mut fx = logged_in("[memory]\nprefixcontext = true\n").await;

    let out = fx.emit(post("c1", bob(), "m1", "question")).await;
    assert_eq!(out[0].text(), Some("[000] question"));

    let reply = BackendEvent::ChannelMessage(ChannelMessage {
        channel_id: ChannelId::new("c1"),
        sender: carol(),
        message_id: MessageId::new("m2"),
        parent_id: Some(MessageId::new("m1")),
        text: "answer".into(),
        ..ChannelMessage::default()
    });
    let out = fx.emit(reply).await;
    assert_eq!(out[0].text(), Some("[001->000] answer"));

    let reaction = BackendEvent::ReactionAdd {
        channel_id: ChannelId::new("c1"),
        channel_kind: ChannelKind::Group,
        message_id: MessageId::new("m1"),
        sender: carol(),
        reaction: "+1".into(),
        message: String::new(),
    };
    let out = fx.emit(reaction).await;
    assert_eq!(rendered(&out), [
        ":carol!carol@ghostgate PRIVMSG #general|c1 :[000] reaction changed +1",
    ]);
}

#[tokio::test]
async fn edits_reuse_the_original_tag() {
    let mut fx = logged_in("[memory]\nsuffixcontext = true\n").await;
    fx.emit(post("c1", bob(), "m1", "typo")).await;

    let edit = BackendEvent::ChannelMessage(ChannelMessage {
        channel_id: ChannelId::new("c1"),
        sender: bob(),
        message_id: MessageId::new("m1"),
        kind: MessageKind::Edited,
        text: "fixed".into(),
        ..ChannelMessage::default()
    });
    let out = fx.emit(edit).await;
    assert_eq!(out[0].text(), Some("fixed [000]"));
}

#[tokio::test]
async fn hidden_reactions_produce_nothing() {
    let mut fx = logged_in("[memory]\nhidereactions = true\n").await;
    let reaction = BackendEvent::ReactionAdd {
        channel_id: ChannelId::new("d1"),
        channel_kind: ChannelKind::Direct,
        message_id: MessageId::new("m1"),
        sender: bob(),
        reaction: "+1".into(),
        message: String::new(),
    };
    assert!(fx.emit(reaction).await.is_empty());
}

#[tokio::test]
async fn direct_reaction_is_a_private_message() {
    let mut fx = logged_in("").await;
    let reaction = BackendEvent::ReactionAdd {
        channel_id: ChannelId::new("d1"),
        channel_kind: ChannelKind::Direct,
        message_id: MessageId::new("m1"),
        sender: bob(),
        reaction: "+1".into(),
        message: String::new(),
    };
    let out = fx.emit(reaction).await;
    assert_eq!(rendered(&out), [":bob!bob@ghostgate PRIVMSG alice :reaction changed +1"]);
}

#[tokio::test]
async fn mentions_are_marked() {
    let mut fx = logged_in("[memory]\nshowmentions = true\n").await;
    let out = fx.emit(post("c1", bob(), "m1", "ping boss")).await;
    assert_eq!(out[0].text(), Some("ping boss (mention alice)"));

    // The nick itself is left to the client
    let out = fx.emit(post("c1", bob(), "m2", "hi alice")).await;
    assert_eq!(out[0].text(), Some("hi alice"));
}

#[tokio::test]
async fn status_changes_of_the_principal() {
    let mut fx = logged_in("").await;
    let status = |status| BackendEvent::StatusChange { user_id: UserId::new("u0"), status };

    let out = fx.emit(status(Presence::Away)).await;
    assert_eq!(rendered(&out), [":ghostgate 306 alice :You have been marked as being away"]);
    assert!(fx.emit(status(Presence::Away)).await.is_empty());

    // Offline is ignored, the principal stays away
    assert!(fx.emit(status(Presence::Offline)).await.is_empty());
    assert!(fx.session.context().principal.is_away());

    let out = fx.emit(status(Presence::Online)).await;
    assert_eq!(rendered(&out), [":ghostgate 305 alice :You are no longer marked as being away"]);
}

#[tokio::test]
async fn status_of_others_is_ignored() {
    let mut fx = logged_in("").await;
    let event = BackendEvent::StatusChange { user_id: UserId::new("u1"), status: Presence::Away };
    assert!(fx.emit(event).await.is_empty());
}

#[tokio::test]
async fn topic_changes() {
    let mut fx = logged_in("").await;
    let topic = |user: &str| BackendEvent::ChannelTopic {
        channel_id: ChannelId::new("c1"),
        user_id: UserId::new(user),
        text: "release day".into(),
    };

    let out = fx.emit(topic("u1")).await;
    assert_eq!(rendered(&out), [":bob!bob@ghostgate TOPIC #general|c1 :release day"]);

    // Unknown setter
    assert!(fx.emit(topic("u9")).await.is_empty());
}

#[tokio::test]
async fn members_added_and_removed() {
    let mut fx = logged_in("").await;

    let added = BackendEvent::ChannelAdd {
        channel_id: ChannelId::new("c1"),
        added: vec![user("u3", "dave")],
        adder: Some(bob()),
    };
    let out = fx.emit(added).await;
    assert_eq!(rendered(&out), [
        ":dave!dave@ghostgate JOIN #general|c1",
        ":system!system@ghostgate PRIVMSG #general|c1 :added dave to the channel by bob",
    ]);

    let removed = BackendEvent::ChannelRemove {
        channel_id: ChannelId::new("c1"),
        removed: vec![carol()],
        remover: Some(bob()),
    };
    let out = fx.emit(removed).await;
    assert_eq!(rendered(&out), [
        ":carol!carol@ghostgate PART #general|c1",
        ":system!system@ghostgate PRIVMSG #general|c1 :removed carol from the channel by bob",
    ]);
}

#[tokio::test]
async fn self_removal_parts_the_principal() {
    let mut fx = logged_in("").await;
    let removed = BackendEvent::ChannelRemove {
        channel_id: ChannelId::new("c2"),
        removed: vec![me()],
        remover: Some(carol()),
    };
    let out = fx.emit(removed).await;
    assert_eq!(rendered(&out), [
        ":system!system@ghostgate PRIVMSG #random|c2 :removed alice from the channel by carol",
        ":alice!alice@ghostgate PART #random|c2",
    ]);
}

#[tokio::test]
async fn created_channel_is_synced() {
    let mut fx = logged_in("").await;
    fx.world.add_group("c4", "New", &["u2"]);

    let out = fx.emit(BackendEvent::ChannelCreate { channel_id: ChannelId::new("c4") }).await;
    assert_eq!(rendered(&out), [
        ":alice!alice@ghostgate JOIN #new|c4",
        ":ghostgate 353 alice = #new|c4 :alice carol",
        ":memory!memory@ghostgate TOPIC #new|c4 :New",
    ]);
    assert_eq!(fx.world.calls("update_channels"), 1);
}

#[tokio::test]
async fn deleted_channel_is_parted_once_gone() {
    let mut fx = logged_in("").await;
    let delete = || BackendEvent::ChannelDelete { channel_id: ChannelId::new("c2") };

    // Still listed by the backend
    assert!(fx.emit(delete()).await.is_empty());

    fx.world.remove_group("c2");
    let out = fx.emit(delete()).await;
    assert_eq!(rendered(&out), [":alice!alice@ghostgate PART #random|c2"]);
}

#[tokio::test]
async fn profile_update_renames_ghost() {
    let mut fx = logged_in("").await;
    let out = fx.emit(BackendEvent::UserUpdate { user: user("u1", "robert") }).await;
    assert_eq!(rendered(&out), [":bob!bob@ghostgate NICK robert"]);

    // Same sanitized nick, nothing to announce
    assert!(fx.emit(BackendEvent::UserUpdate { user: user("u1", "robert") }).await.is_empty());
    assert!(fx.emit(BackendEvent::UserUpdate { user: me() }).await.is_empty());
}

#[tokio::test]
async fn files_are_announced() {
    let mut fx = logged_in("").await;
    let event = BackendEvent::File {
        channel_id: ChannelId::new("c1"),
        channel_kind: ChannelKind::Group,
        sender: bob(),
        receiver: None,
        files: vec![FileInfo { name: "plan.pdf".into() }, FileInfo { name: "a.png".into() }],
    };
    let out = fx.emit(event).await;
    assert_eq!(rendered(&out), [
        ":bob!bob@ghostgate PRIVMSG #general|c1 :download file - plan.pdf",
        ":bob!bob@ghostgate PRIVMSG #general|c1 :download file - a.png",
    ]);
}

#[tokio::test]
async fn long_messages_are_wrapped_and_blank_lines_dropped() {
    let mut fx = logged_in("").await;
    let long = "word ".repeat(120);
    let out = fx.emit(post("c1", bob(), "m1", &format!("{long}\n\nend"))).await;

    assert!(out.len() >= 3);
    assert!(out.iter().all(|message| message.text().is_some_and(|text| !text.is_empty())));
    assert_eq!(out.last().and_then(|message| message.text()), Some("end"));
}
