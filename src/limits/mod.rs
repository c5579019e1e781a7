//! Resource gates: cooldowns and concurrency limits.
//!
//! Both gates partition their state by a [`BucketKey`] derived from the
//! invocation context through a [`BucketType`].

pub mod concurrency;
pub mod cooldown;

pub use concurrency::{Admission, ConcurrencyManager, MaxConcurrency, Saturated};
pub use cooldown::{Cooldown, CooldownDenied, CooldownManager};

use crate::commands::{Context, ScopeKind};
use crate::directory::Snowflake;
use std::fmt;
use std::sync::Arc;

/// Derives a custom bucket key from an invocation.
pub type KeyFn = Arc<dyn Fn(&Context) -> String + Send + Sync>;

/// How invocations are partitioned into buckets.
#[derive(Clone)]
pub enum BucketType {
    /// One shared bucket for every invocation.
    Default,
    /// Per author.
    User,
    /// Per shared scope; private invocations fall back to the author.
    Scope,
    /// Per channel.
    Channel,
    /// Per author within a scope.
    Member,
    /// Per channel category, falling back to the channel.
    Category,
    /// Per author's highest role; private invocations fall back to the channel.
    Role,
    /// Named custom key function.
    Custom(String, KeyFn),
}

impl BucketType {
    /// Custom bucket type from a key function.
    pub fn custom<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context) -> String + Send + Sync + 'static,
    {
        Self::Custom(name.into(), Arc::new(f))
    }

    /// Derive the bucket key for an invocation.
    pub fn key(&self, ctx: &Context) -> BucketKey {
        let origin = &ctx.origin;
        let private = origin.kind == ScopeKind::Private;
        match self {
            Self::Default => BucketKey::Global,
            Self::User => BucketKey::User(ctx.author.id),
            Self::Scope => match origin.scope_id {
                Some(scope) if !private => BucketKey::Scope(scope),
                _ => BucketKey::User(ctx.author.id),
            },
            Self::Channel => BucketKey::Channel(origin.channel.id),
            Self::Member => BucketKey::Member(origin.scope_id, ctx.author.id),
            Self::Category => {
                BucketKey::Category(origin.channel.category_id.unwrap_or(origin.channel.id))
            }
            Self::Role => {
                if private {
                    return BucketKey::Channel(origin.channel.id);
                }
                // The scope id doubles as its implicit everyone-role
                let role = ctx
                    .author
                    .roles
                    .first()
                    .copied()
                    .or(origin.scope_id)
                    .unwrap_or(origin.channel.id);
                BucketKey::Role(role)
            }
            Self::Custom(_, f) => BucketKey::Custom(f(ctx)),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Default => "default",
            Self::User => "user",
            Self::Scope => "scope",
            Self::Channel => "channel",
            Self::Member => "member",
            Self::Category => "category",
            Self::Role => "role",
            Self::Custom(name, _) => name,
        }
    }
}

impl fmt::Display for BucketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for BucketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(name, _) => f.debug_tuple("Custom").field(name).finish(),
            _ => f.write_str(self.name()),
        }
    }
}

/// A derived bucket identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketKey {
    Global,
    User(Snowflake),
    Scope(Snowflake),
    Channel(Snowflake),
    Member(Option<Snowflake>, Snowflake),
    Category(Snowflake),
    Role(Snowflake),
    Custom(String),
}
