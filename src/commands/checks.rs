//! Check predicates.
//!
//! A [`Check`] is either a single predicate or an any-of group. Checks run
//! in registration order and stop at the first failure.

use super::context::{Context, Permissions, ScopeKind};
use crate::directory::Snowflake;
use crate::error::CheckFailure;
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// A precondition over an invocation.
#[async_trait]
pub trait Predicate: Send + Sync {
    async fn check(&self, ctx: &Context) -> Result<(), CheckFailure>;
}

/// An attached check.
#[derive(Clone)]
pub enum Check {
    One(Arc<dyn Predicate>),
    /// Passes if any member passes.
    Any(Vec<Check>),
}

impl Check {
    pub fn new(predicate: impl Predicate + 'static) -> Self {
        Self::One(Arc::new(predicate))
    }

    pub fn evaluate<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, Result<(), CheckFailure>> {
        async move {
            match self {
                Self::One(predicate) => predicate.check(ctx).await,
                Self::Any(checks) => {
                    let mut errors = Vec::with_capacity(checks.len());
                    for check in checks {
                        match check.evaluate(ctx).await {
                            Ok(()) => return Ok(()),
                            Err(e) => errors.push(e),
                        }
                    }
                    Err(CheckFailure::CheckAny { errors })
                }
            }
        }
        .boxed()
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(_) => f.write_str("Check(..)"),
            Self::Any(checks) => f.debug_tuple("Any").field(checks).finish(),
        }
    }
}

/// Run `checks` in order, stopping at the first failure.
pub async fn run_checks(checks: &[Check], ctx: &Context) -> Result<(), CheckFailure> {
    for check in checks {
        check.evaluate(ctx).await?;
    }
    Ok(())
}

/// Passes if any of `checks` passes.
pub fn check_any(checks: impl IntoIterator<Item = Check>) -> Check {
    Check::Any(checks.into_iter().collect())
}

struct FnPredicate<F>(F);

#[async_trait]
impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&Context) -> bool + Send + Sync,
{
    async fn check(&self, ctx: &Context) -> Result<(), CheckFailure> {
        if (self.0)(ctx) {
            Ok(())
        } else {
            Err(CheckFailure::failed())
        }
    }
}

/// A check from a synchronous closure; `false` fails with a generic message.
pub fn check_fn<F>(f: F) -> Check
where
    F: Fn(&Context) -> bool + Send + Sync + 'static,
{
    Check::new(FnPredicate(f))
}

struct IsOwner;

#[async_trait]
impl Predicate for IsOwner {
    async fn check(&self, ctx: &Context) -> Result<(), CheckFailure> {
        if ctx.is_owner() {
            Ok(())
        } else {
            Err(CheckFailure::NotOwner)
        }
    }
}

/// The author is a configured owner.
pub fn is_owner() -> Check {
    Check::new(IsOwner)
}

/// A role named by id or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRef {
    Id(Snowflake),
    Name(String),
}

impl From<Snowflake> for RoleRef {
    fn from(id: Snowflake) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for RoleRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl fmt::Display for RoleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Whether the author holds `role` in the origin scope.
async fn holds(ctx: &Context, scope_id: Snowflake, role: &RoleRef) -> bool {
    match role {
        RoleRef::Id(id) => ctx.author.roles.contains(id),
        RoleRef::Name(name) => ctx
            .directory
            .roles(scope_id)
            .await
            .iter()
            .any(|r| r.name == *name && ctx.author.roles.contains(&r.id)),
    }
}

struct HasRole(RoleRef);

#[async_trait]
impl Predicate for HasRole {
    async fn check(&self, ctx: &Context) -> Result<(), CheckFailure> {
        let Some(scope_id) = ctx.origin.scope_id else {
            return Err(CheckFailure::NoPrivateMessage);
        };
        if holds(ctx, scope_id, &self.0).await {
            Ok(())
        } else {
            Err(CheckFailure::MissingRole {
                role: self.0.to_string(),
            })
        }
    }
}

/// The author holds `role`. Fails in private scope.
pub fn has_role(role: impl Into<RoleRef>) -> Check {
    Check::new(HasRole(role.into()))
}

struct HasAnyRole(Vec<RoleRef>);

#[async_trait]
impl Predicate for HasAnyRole {
    async fn check(&self, ctx: &Context) -> Result<(), CheckFailure> {
        let Some(scope_id) = ctx.origin.scope_id else {
            return Err(CheckFailure::NoPrivateMessage);
        };
        for role in &self.0 {
            if holds(ctx, scope_id, role).await {
                return Ok(());
            }
        }
        Err(CheckFailure::MissingAnyRole {
            roles: self.0.iter().map(ToString::to_string).collect(),
        })
    }
}

/// The author holds at least one of `roles`. Fails in private scope.
pub fn has_any_role<R: Into<RoleRef>>(roles: impl IntoIterator<Item = R>) -> Check {
    Check::new(HasAnyRole(roles.into_iter().map(Into::into).collect()))
}

struct HasPermissions(Permissions);

#[async_trait]
impl Predicate for HasPermissions {
    async fn check(&self, ctx: &Context) -> Result<(), CheckFailure> {
        let missing = ctx.author.permissions.missing(self.0);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CheckFailure::MissingPermissions { missing })
        }
    }
}

/// The author has every permission in `required` in the origin channel.
pub fn has_permissions(required: Permissions) -> Check {
    Check::new(HasPermissions(required))
}

struct ScopeOnly(ScopeKind);

#[async_trait]
impl Predicate for ScopeOnly {
    async fn check(&self, ctx: &Context) -> Result<(), CheckFailure> {
        match (self.0, ctx.origin.kind) {
            (wanted, actual) if wanted == actual => Ok(()),
            (ScopeKind::Private, _) => Err(CheckFailure::PrivateMessageOnly),
            _ => Err(CheckFailure::NoPrivateMessage),
        }
    }
}

/// Only in a generic shared scope.
pub fn guild_only() -> Check {
    Check::new(ScopeOnly(ScopeKind::Generic))
}

/// Only in a private conversation.
pub fn dm_only() -> Check {
    Check::new(ScopeOnly(ScopeKind::Private))
}

struct IsNsfw;

#[async_trait]
impl Predicate for IsNsfw {
    async fn check(&self, ctx: &Context) -> Result<(), CheckFailure> {
        let channel = &ctx.origin.channel;
        if ctx.origin.kind == ScopeKind::Private || channel.nsfw {
            Ok(())
        } else {
            Err(CheckFailure::NsfwChannelRequired {
                channel: channel.name.clone(),
            })
        }
    }
}

/// The origin channel is marked NSFW. Private conversations pass.
pub fn is_nsfw() -> Check {
    Check::new(IsNsfw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{
        SCOPE, context_for, context_with_directory, private_context, sample_directory,
    };
    use crate::directory::Directory;

    #[tokio::test]
    async fn checks_short_circuit_in_order() {
        let ctx = context_for(1);
        let checks = [
            check_fn(|_| true),
            Check::new(FnPredicate(|_: &Context| false)),
            is_owner(),
        ];
        let err = run_checks(&checks, &ctx).await.unwrap_err();
        assert_eq!(err.error_code(), "check_failure");
    }

    #[tokio::test]
    async fn any_collects_every_failure() {
        let ctx = context_for(1);
        let err = check_any([is_owner(), dm_only()]).evaluate(&ctx).await.unwrap_err();
        match err {
            CheckFailure::CheckAny { errors } => {
                assert_eq!(errors, vec![CheckFailure::NotOwner, CheckFailure::PrivateMessageOnly]);
            }
            other => panic!("unexpected failure: {other:?}"),
        }

        assert!(check_any([is_owner(), guild_only()]).evaluate(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn owner_check_uses_configured_owners() {
        let mut ctx = context_for(1);
        assert_eq!(is_owner().evaluate(&ctx).await, Err(CheckFailure::NotOwner));
        ctx.owners = Arc::new([1].into_iter().collect());
        assert!(is_owner().evaluate(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn roles_by_id_and_name() {
        let directory = Arc::new(sample_directory());
        let mut ctx = context_with_directory(directory.clone());
        let mods = directory.roles(SCOPE).await[0].id;

        assert!(matches!(
            has_role("Mods").evaluate(&ctx).await,
            Err(CheckFailure::MissingRole { .. })
        ));
        ctx.author.roles.push(mods);
        assert!(has_role("Mods").evaluate(&ctx).await.is_ok());
        assert!(has_role(mods).evaluate(&ctx).await.is_ok());
        assert!(has_any_role(["Admins", "Mods"]).evaluate(&ctx).await.is_ok());
        assert!(matches!(
            has_any_role(["Admins"]).evaluate(&ctx).await,
            Err(CheckFailure::MissingAnyRole { roles }) if roles == vec!["Admins"]
        ));
    }

    #[tokio::test]
    async fn roles_fail_in_private() {
        let ctx = private_context(1, 5);
        assert_eq!(has_role(1u64).evaluate(&ctx).await, Err(CheckFailure::NoPrivateMessage));
        assert_eq!(guild_only().evaluate(&ctx).await, Err(CheckFailure::NoPrivateMessage));
        assert!(dm_only().evaluate(&ctx).await.is_ok());
        assert!(is_nsfw().evaluate(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn permissions_report_missing_names() {
        let mut ctx = context_for(1);
        ctx.author.permissions = Permissions::KICK_MEMBERS;
        let err = has_permissions(Permissions::KICK_MEMBERS | Permissions::BAN_MEMBERS)
            .evaluate(&ctx)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CheckFailure::MissingPermissions {
                missing: vec!["ban_members".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn nsfw_requires_flagged_channel() {
        let mut ctx = context_for(1);
        assert!(matches!(
            is_nsfw().evaluate(&ctx).await,
            Err(CheckFailure::NsfwChannelRequired { .. })
        ));
        ctx.origin.channel.nsfw = true;
        assert!(is_nsfw().evaluate(&ctx).await.is_ok());
    }
}
