//! Command bodies, invoke hooks, error handlers and global lifecycle hooks.

use super::context::Context;
use super::value::Args;
use crate::error::{BoxError, CommandError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Result type for bodies, hooks and error handlers.
pub type HandlerResult = Result<(), BoxError>;

/// A command body.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn invoke(&self, ctx: Arc<Context>, args: Args) -> HandlerResult;
}

/// Handler wrapping an async closure.
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Arc<Context>, Args) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn invoke(&self, ctx: Arc<Context>, args: Args) -> HandlerResult {
        (self.0)(ctx, args).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Arc<Context>, Args) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler(f)
}

/// A before- or after-invoke hook.
#[async_trait]
pub trait InvokeHook: Send + Sync {
    async fn call(&self, ctx: Arc<Context>) -> HandlerResult;
}

pub struct FnHook<F>(F);

#[async_trait]
impl<F, Fut> InvokeHook for FnHook<F>
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, ctx: Arc<Context>) -> HandlerResult {
        (self.0)(ctx).await
    }
}

pub fn hook_fn<F, Fut>(f: F) -> FnHook<F>
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHook(f)
}

/// A command- or module-level error handler.
///
/// Returning `Ok` marks the error as handled; later handlers are skipped.
/// An `Err` goes to the fallback log and routing continues.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    async fn on_error(&self, ctx: Arc<Context>, error: Arc<CommandError>) -> HandlerResult;
}

pub struct FnErrorHandler<F>(F);

#[async_trait]
impl<F, Fut> ErrorHandler for FnErrorHandler<F>
where
    F: Fn(Arc<Context>, Arc<CommandError>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn on_error(&self, ctx: Arc<Context>, error: Arc<CommandError>) -> HandlerResult {
        (self.0)(ctx, error).await
    }
}

pub fn error_handler_fn<F, Fut>(f: F) -> FnErrorHandler<F>
where
    F: Fn(Arc<Context>, Arc<CommandError>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnErrorHandler(f)
}

/// Dispatcher-wide lifecycle hooks.
///
/// Every method has a default; the default error hook logs.
#[async_trait]
pub trait Hooks: Send + Sync {
    /// After checks pass, before cooldowns.
    async fn on_command(&self, _ctx: &Context) {}

    /// The body and after-invoke hooks succeeded.
    async fn on_command_completion(&self, _ctx: &Context) {}

    /// Last stop for unhandled errors.
    async fn on_command_error(&self, ctx: &Context, error: &CommandError) -> HandlerResult {
        log_command_error(ctx, error);
        Ok(())
    }

    /// Right before every command body.
    async fn before_invoke(&self, _ctx: &Context) -> HandlerResult {
        Ok(())
    }

    /// On the way out of every command body that reached before-invoke.
    async fn after_invoke(&self, _ctx: &Context) -> HandlerResult {
        Ok(())
    }
}

/// Hooks with only the default behavior.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl Hooks for DefaultHooks {}

/// Log an unhandled command error at a level fitting its kind.
pub fn log_command_error(ctx: &Context, error: &CommandError) {
    let command = ctx.command_name().unwrap_or("-");
    match error {
        CommandError::Invoke { .. } | CommandError::Conversion { .. } => {
            error!(
                command = %command,
                invocation = %ctx.id,
                kind = error.error_code(),
                chain = %cause_chain(error),
                "Command raised an exception"
            );
        }
        CommandError::CommandNotFound { name } => {
            trace!(name = %name, "Command not found");
        }
        _ => {
            debug!(command = %command, kind = error.error_code(), error = %error, "Command rejected");
        }
    }
}

/// Render an error and its sources as `outer: inner: root`.
pub fn cause_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}
