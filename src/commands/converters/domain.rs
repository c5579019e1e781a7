//! Domain-object converters.
//!
//! Resolution order is fixed: a bare numeric id, then a mention, then an
//! exact name, then a case-insensitive name, then a unique case-insensitive
//! name prefix. An id or mention that names nothing visible fails outright
//! rather than falling through to name matching.

use super::{ConvertError, Converter};
use crate::commands::context::Context;
use crate::commands::value::Value;
use crate::directory::Snowflake;
use crate::error::UserInputError;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

static ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([0-9]{15,20})$").expect("valid id pattern"));
static USER_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<@!?([0-9]{15,20})>$").expect("valid id pattern"));
static CHANNEL_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<#([0-9]{15,20})>$").expect("valid id pattern"));
static ROLE_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<@&([0-9]{15,20})>$").expect("valid id pattern"));

/// Extract an id from a bare id or a mention matching `mention`.
fn parse_id(argument: &str, mention: &Regex) -> Option<Snowflake> {
    ID_RE
        .captures(argument)
        .or_else(|| mention.captures(argument))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Pick the candidate whose names match `argument`, tier by tier.
///
/// Exact and case-insensitive ties go to the first candidate. Prefix matches
/// must be unique.
fn match_name<'a, T>(
    candidates: &'a [T],
    argument: &str,
    names: impl Fn(&'a T) -> Vec<&'a str>,
) -> Option<&'a T> {
    if argument.is_empty() {
        return None;
    }

    if let Some(found) = candidates.iter().find(|c| names(*c).contains(&argument)) {
        return Some(found);
    }

    let lowered = argument.to_lowercase();
    if let Some(found) = candidates
        .iter()
        .find(|c| names(*c).iter().any(|n| n.to_lowercase() == lowered))
    {
        return Some(found);
    }

    let mut prefixed = candidates
        .iter()
        .filter(|c| names(*c).iter().any(|n| n.to_lowercase().starts_with(&lowered)));
    match (prefixed.next(), prefixed.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

pub struct UserConverter;

#[async_trait]
impl Converter for UserConverter {
    async fn convert(&self, ctx: &Context, argument: &str) -> Result<Value, ConvertError> {
        let not_found = || UserInputError::UserNotFound {
            argument: argument.to_string(),
        };

        if let Some(id) = parse_id(argument, &USER_MENTION_RE) {
            return ctx
                .directory
                .user(id)
                .await
                .map(Value::User)
                .ok_or_else(|| not_found().into());
        }

        let users = ctx.directory.users().await;
        match_name(&users, argument, |u| {
            let mut names = vec![u.name.as_str()];
            names.extend(u.global_name.as_deref());
            names
        })
        .cloned()
        .map(Value::User)
        .ok_or_else(|| not_found().into())
    }
}

pub struct MemberConverter;

#[async_trait]
impl Converter for MemberConverter {
    async fn convert(&self, ctx: &Context, argument: &str) -> Result<Value, ConvertError> {
        let not_found = || UserInputError::MemberNotFound {
            argument: argument.to_string(),
        };
        // Members only exist inside a scope
        let Some(scope_id) = ctx.origin.scope_id else {
            return Err(not_found().into());
        };

        if let Some(id) = parse_id(argument, &USER_MENTION_RE) {
            return ctx
                .directory
                .member(scope_id, id)
                .await
                .map(Value::Member)
                .ok_or_else(|| not_found().into());
        }

        let members = ctx.directory.members(scope_id).await;
        match_name(&members, argument, |m| {
            let mut names = vec![m.user.name.as_str()];
            names.extend(m.nick.as_deref());
            names.extend(m.user.global_name.as_deref());
            names
        })
        .cloned()
        .map(Value::Member)
        .ok_or_else(|| not_found().into())
    }
}

pub struct ChannelConverter;

#[async_trait]
impl Converter for ChannelConverter {
    async fn convert(&self, ctx: &Context, argument: &str) -> Result<Value, ConvertError> {
        let not_found = || UserInputError::ChannelNotFound {
            argument: argument.to_string(),
        };
        let origin = &ctx.origin.channel;

        let Some(scope_id) = ctx.origin.scope_id else {
            // A private conversation can only name itself
            let names_origin = parse_id(argument, &CHANNEL_MENTION_RE) == Some(origin.id);
            return if names_origin {
                Ok(Value::Channel(origin.clone()))
            } else {
                Err(not_found().into())
            };
        };

        if let Some(id) = parse_id(argument, &CHANNEL_MENTION_RE) {
            return ctx
                .directory
                .channel(scope_id, id)
                .await
                .map(Value::Channel)
                .ok_or_else(|| not_found().into());
        }

        let name = argument.strip_prefix('#').unwrap_or(argument);
        let channels = ctx.directory.channels(scope_id).await;
        match_name(&channels, name, |c| vec![c.name.as_str()])
            .cloned()
            .map(Value::Channel)
            .ok_or_else(|| not_found().into())
    }
}

pub struct RoleConverter;

#[async_trait]
impl Converter for RoleConverter {
    async fn convert(&self, ctx: &Context, argument: &str) -> Result<Value, ConvertError> {
        let not_found = || UserInputError::RoleNotFound {
            argument: argument.to_string(),
        };
        let Some(scope_id) = ctx.origin.scope_id else {
            return Err(not_found().into());
        };

        if let Some(id) = parse_id(argument, &ROLE_MENTION_RE) {
            return ctx
                .directory
                .role(scope_id, id)
                .await
                .map(Value::Role)
                .ok_or_else(|| not_found().into());
        }

        let roles = ctx.directory.roles(scope_id).await;
        match_name(&roles, argument, |r| vec![r.name.as_str()])
            .cloned()
            .map(Value::Role)
            .ok_or_else(|| not_found().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{
        ALICE, BOB, GENERAL, SCOPE, context_with_directory, private_context, sample_directory,
    };
    use std::sync::Arc;

    fn ctx() -> Context {
        context_with_directory(Arc::new(sample_directory()))
    }

    async fn user_name(argument: &str) -> Option<String> {
        UserConverter
            .convert(&ctx(), argument)
            .await
            .ok()
            .and_then(|v| v.as_user().map(|u| u.name.clone()))
    }

    #[tokio::test]
    async fn user_by_id_and_mention() {
        assert_eq!(user_name(&ALICE.to_string()).await.as_deref(), Some("alice"));
        assert_eq!(user_name(&format!("<@{BOB}>")).await.as_deref(), Some("bob"));
        assert_eq!(user_name(&format!("<@!{BOB}>")).await.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn unknown_id_does_not_fall_through_to_names() {
        let err = UserConverter.convert(&ctx(), "999999999999999999").await.unwrap_err();
        assert!(matches!(err, ConvertError::Input(UserInputError::UserNotFound { .. })));
    }

    #[tokio::test]
    async fn name_tiers_are_tried_in_order() {
        // Exact, then case-insensitive, then unique prefix
        assert_eq!(user_name("alice").await.as_deref(), Some("alice"));
        assert_eq!(user_name("ALICE").await.as_deref(), Some("alice"));
        assert_eq!(user_name("Bobby Tables").await.as_deref(), Some("bob"));
        assert_eq!(user_name("car").await.as_deref(), Some("carol"));
        // "al" prefixes both alice and alan
        assert_eq!(user_name("al").await, None);
    }

    #[tokio::test]
    async fn member_matches_nick_within_scope() {
        let value = MemberConverter.convert(&ctx(), "ally").await.unwrap();
        let member = value.as_member().unwrap();
        assert_eq!(member.user.id, ALICE);
        assert_eq!(member.scope_id, SCOPE);
    }

    #[tokio::test]
    async fn member_needs_a_scope() {
        let ctx = private_context(ALICE, 5);
        let err = MemberConverter.convert(&ctx, "alice").await.unwrap_err();
        assert!(matches!(err, ConvertError::Input(UserInputError::MemberNotFound { .. })));
    }

    #[tokio::test]
    async fn channel_by_mention_and_hash_name() {
        let by_mention = ChannelConverter.convert(&ctx(), &format!("<#{GENERAL}>")).await.unwrap();
        assert_eq!(by_mention.as_channel().unwrap().name, "general");
        let by_name = ChannelConverter.convert(&ctx(), "#General").await.unwrap();
        assert_eq!(by_name.as_channel().unwrap().id, GENERAL);
    }

    #[tokio::test]
    async fn role_by_name() {
        let value = RoleConverter.convert(&ctx(), "mods").await.unwrap();
        assert_eq!(value.as_role().unwrap().name, "Mods");
        let err = RoleConverter.convert(&ctx(), "admins").await.unwrap_err();
        assert!(matches!(err, ConvertError::Input(UserInputError::RoleNotFound { .. })));
    }
}
