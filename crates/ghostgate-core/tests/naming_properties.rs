//! Property-based tests for protocol naming and the access policy

use ghostgate_core::{
    AccessPolicy, ChannelId,
    naming::{MAX_CHANNEL_NAME, channel_name, sanitize_nick},
};
use proptest::prelude::*;

const UNSAFE: &str = "!+%@&#$:'\"?*, ";

/// Property: Sanitized nicks never contain unsafe characters
#[test]
fn prop_sanitized_nick_is_safe() {
    proptest!(|(nick in any::<String>())| {
        let safe = sanitize_nick(&nick);
        prop_assert!(!safe.chars().any(|c| UNSAFE.contains(c)));
        prop_assert_eq!(safe.chars().count(), nick.chars().count());
    });
}

/// Property: Channel names are bounded and keep the id suffix
#[test]
fn prop_channel_name_bounded() {
    proptest!(|(name in any::<String>(), id in any::<u32>())| {
        let channel = channel_name(&ChannelId::new(id.to_string()), &name);
        prop_assert!(channel.chars().count() <= MAX_CHANNEL_NAME);
        prop_assert!(channel.starts_with('#'));
        let suffix = format!("|{id}");
        prop_assert!(channel.ends_with(&suffix));
    });
}

/// Property: Without lists every channel may be joined
#[test]
fn prop_empty_policy_allows_all() {
    proptest!(|(name in any::<String>())| {
        prop_assert!(AccessPolicy::allow_all().may_join(&name));
    });
}

/// Property: An include list overrides any exclude list
#[test]
fn prop_include_overrides_exclude() {
    proptest!(|(name in "#[a-z]{1,10}\\|[0-9]{1,4}")| {
        let everything = vec![".*".to_string()];
        let policy = AccessPolicy::new(&[], &everything, &everything)?;
        prop_assert!(policy.may_join(&name));
    });
}

/// Property: Allow-only denies names that match none of its patterns
#[test]
fn prop_allow_only_denies_unmatched() {
    proptest!(|(name in "#[a-z]{1,10}")| {
        let only = vec!["^&nothing$".to_string()];
        let policy = AccessPolicy::new(&only, &[], &[])?;
        prop_assert!(!policy.may_join(&name));
    });
}
