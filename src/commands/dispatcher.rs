//! Invocation pipeline.
//!
//! `dispatch` takes one inbound event through resolution, checks, cooldowns,
//! concurrency admission, binding and the command body, then routes the
//! outcome to the completion hook or down the error handler chain. Nothing
//! escapes `dispatch`: every failure ends up in a handler or a log line.

use super::binding::bind;
use super::checks::{Check, run_checks};
use super::command::Command;
use super::context::{Context, InvocationEvent};
use super::converters::{Converter, ConverterRegistry, FlagSyntax};
use super::hooks::{DefaultHooks, HandlerResult, Hooks, InvokeHook, cause_chain};
use super::module::{LoadedModule, Module};
use super::params::TypeKey;
use super::registry::Registry;
use crate::config::{Config, DispatchConfig, LimitsConfig};
use crate::directory::{Directory, Snowflake};
use crate::error::{BoxError, CommandError, ExtensionError};
use crate::limits::{ConcurrencyManager, CooldownManager};
use crate::metrics;
use crate::telemetry::{CommandTimer, spans};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use slirc_argv::QuoteSet;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, error, info, trace, warn};

/// Routes invocation events to registered commands.
pub struct Dispatcher {
    config: DispatchConfig,
    registry: Arc<Registry>,
    converters: ConverterRegistry,
    cooldowns: CooldownManager,
    concurrency: ConcurrencyManager,
    hooks: Arc<dyn Hooks>,
    global_checks: Vec<Check>,
    directory: Arc<dyn Directory>,
    quotes: QuoteSet,
    limits: LimitsConfig,
    modules: DashMap<String, LoadedModule>,
    owners: Arc<HashSet<Snowflake>>,
    /// Longest first, so `!!` wins over `!`.
    prefixes: Vec<String>,
}

impl Dispatcher {
    pub fn new(config: &Config, directory: Arc<dyn Directory>) -> Self {
        let mut converters = ConverterRegistry::new();
        converters.set_flag_syntax(FlagSyntax::from(&config.flags));

        let mut prefixes = config.dispatch.prefixes.clone();
        prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));

        Self {
            config: config.dispatch.clone(),
            registry: Arc::new(Registry::new(config.dispatch.case_insensitive)),
            converters,
            cooldowns: CooldownManager::new(),
            concurrency: ConcurrencyManager::new(),
            hooks: Arc::new(DefaultHooks),
            global_checks: Vec::new(),
            directory,
            quotes: config.tokenizer.quote_set(),
            limits: config.limits.clone(),
            modules: DashMap::new(),
            owners: Arc::new(config.dispatch.owners.iter().copied().collect()),
            prefixes,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn cooldowns(&self) -> &CooldownManager {
        &self.cooldowns
    }

    pub fn concurrency(&self) -> &ConcurrencyManager {
        &self.concurrency
    }

    /// Replace the global lifecycle hooks.
    pub fn set_hooks(&mut self, hooks: impl Hooks + 'static) {
        self.hooks = Arc::new(hooks);
    }

    /// Add a check that runs before every command's own checks.
    pub fn add_check(&mut self, check: Check) {
        self.global_checks.push(check);
    }

    /// Register a converter, returning the one it replaces.
    pub fn register_converter(
        &mut self,
        key: TypeKey,
        converter: impl Converter + 'static,
    ) -> Option<Arc<dyn Converter>> {
        self.converters.register(key, converter)
    }

    pub fn register(&self, command: Command) -> Result<Arc<Command>, ExtensionError> {
        let command = self.registry.register(command)?;
        debug!(command = %command.qualified_name(), "Command registered");
        Ok(command)
    }

    pub fn register_group(&self, group: Command) -> Result<Arc<Command>, ExtensionError> {
        let group = self.registry.register_group(group)?;
        debug!(command = %group.qualified_name(), children = group.children().len(), "Group registered");
        Ok(group)
    }

    /// Register every command of `module`, or none of them.
    pub fn add_module(&self, module: Module) -> Result<(), ExtensionError> {
        match self.modules.entry(module.name().to_string()) {
            Entry::Occupied(entry) => Err(ExtensionError::ModuleAlreadyLoaded(entry.key().clone())),
            Entry::Vacant(entry) => {
                let (loaded, commands) = module.into_parts();
                self.registry.register_many(commands)?;
                info!(module = %loaded.name, commands = loaded.commands.len(), "Module loaded");
                entry.insert(loaded);
                Ok(())
            }
        }
    }

    /// Unregister every command `name` added.
    pub fn remove_module(&self, name: &str) -> Result<(), ExtensionError> {
        let (_, loaded) = self
            .modules
            .remove(name)
            .ok_or_else(|| ExtensionError::ModuleNotLoaded(name.to_string()))?;
        for command in &loaded.commands {
            let owned = self
                .registry
                .get(command)
                .is_some_and(|c| c.module() == Some(loaded.name.as_str()));
            if !owned {
                continue;
            }
            if let Some(removed) = self.registry.remove(command) {
                self.cooldowns.clear_command(removed.qualified_name());
            }
        }
        info!(module = %name, "Module unloaded");
        Ok(())
    }

    /// Names of loaded modules.
    pub fn modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.iter().map(|m| m.key().clone()).collect();
        names.sort();
        names
    }

    /// Forget the cooldown windows `ctx` falls into for `command`.
    pub fn reset_cooldown(&self, command: &Command, ctx: &Context) {
        self.cooldowns.reset(command.qualified_name(), command.cooldowns(), ctx);
    }

    /// Handle one inbound event. Never fails.
    pub async fn dispatch(&self, event: InvocationEvent) {
        metrics::record_event();

        if self.config.ignore_bots && event.author.bot {
            trace!(author = event.author.id, "Ignoring bot author");
            return;
        }
        let Some((prefix, line)) = self.strip_prefix(&event.content) else {
            return;
        };
        let (prefix, line) = (prefix.to_string(), line.to_string());

        let mut ctx = Context::new(event, Arc::clone(&self.directory), Arc::clone(&self.owners));
        ctx.prefix = prefix;
        let span = spans::command(&ctx.id, ctx.author.id, ctx.origin.kind.as_str());
        self.run(ctx, line).instrument(span).await;
    }

    /// Run `dispatch` on its own task.
    pub fn spawn(self: &Arc<Self>, event: InvocationEvent) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.dispatch(event).await })
    }

    /// Periodically evict idle cooldown windows and concurrency buckets.
    ///
    /// The task stops once the dispatcher is dropped.
    pub fn spawn_maintenance(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.limits.maintenance_interval();
        let retention = self.limits.cooldown_retention();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(dispatcher) = weak.upgrade() else {
                    break;
                };
                let windows = dispatcher.cooldowns.cleanup(retention);
                let buckets = dispatcher.concurrency.cleanup();
                if windows + buckets > 0 {
                    debug!(windows, buckets, "Evicted idle limiter state");
                }
            }
        })
    }

    /// Split off a configured prefix. `None` if the text is not addressed
    /// to the agent.
    fn strip_prefix<'a>(&self, content: &'a str) -> Option<(&'a str, &'a str)> {
        let (prefix, rest) = if self.prefixes.is_empty() {
            ("", content)
        } else {
            self.prefixes
                .iter()
                .find_map(|p| content.strip_prefix(p.as_str()).map(|rest| (&content[..p.len()], rest)))?
        };

        if rest.starts_with(char::is_whitespace) && !self.config.strip_after_prefix {
            return None;
        }
        Some((prefix, rest.trim_start()))
    }

    async fn run(&self, mut ctx: Context, line: String) {
        let resolved = match self.registry.resolve(&line) {
            Ok(resolved) => resolved,
            Err(e) => {
                trace!(error = %e, "No command matched");
                metrics::record_command_error("unknown", e.error_code());
                if self.config.report_not_found {
                    let ctx = Arc::new(ctx);
                    self.report_global(&ctx, &e).await;
                }
                return;
            }
        };

        let command = resolved.command;
        let parents = resolved.parents;
        Span::current().record("command", command.qualified_name());
        ctx.command = Some(Arc::clone(&command));
        ctx.invoked_with = Some(resolved.invoked_with);
        ctx.invoked_parents = resolved.invoked_parents;
        ctx.remaining = resolved.remaining;
        let ctx = Arc::new(ctx);

        let result = {
            let _release = ReleaseGuard(&ctx);
            self.invoke(&ctx, &command, &parents).await
        };

        match result {
            Ok(()) => {
                debug!("Command completed");
                self.hooks.on_command_completion(&ctx).await;
            }
            Err(e) => {
                metrics::record_command_error(command.qualified_name(), e.error_code());
                self.report(&ctx, &command, &parents, e).await;
            }
        }
    }

    /// Everything from the enabled check to the after-invoke hooks.
    async fn invoke(&self, ctx: &Arc<Context>, command: &Arc<Command>, parents: &[Arc<Command>]) -> Result<(), CommandError> {
        let name = command.qualified_name();

        if let Some(disabled) = parents.iter().chain(Some(command)).find(|c| !c.is_enabled()) {
            return Err(CommandError::DisabledCommand {
                command: disabled.qualified_name().to_string(),
            });
        }

        // Checks: global, module, each parent, then the command itself
        run_checks(&self.global_checks, ctx).await?;
        let root = parents.first().unwrap_or(command);
        if let Some(check) = root
            .module()
            .and_then(|m| self.modules.get(m).and_then(|loaded| loaded.check.clone()))
        {
            check.evaluate(ctx).await?;
        }
        for parent in parents {
            run_checks(&parent.checks(), ctx).await?;
        }
        run_checks(&command.checks(), ctx).await?;

        self.hooks.on_command(ctx).await;

        if let Err(denied) = self.cooldowns.acquire(name, command.cooldowns(), ctx) {
            metrics::record_cooldown_denied(name);
            return Err(CommandError::OnCooldown {
                command: name.to_string(),
                cooldown: denied.cooldown,
                retry_after: denied.retry_after,
            });
        }

        if let Some(rule) = command.concurrency() {
            match self.concurrency.enter(name, rule, ctx).await {
                Ok(admission) => ctx.hold(admission),
                Err(_) => {
                    metrics::record_concurrency_rejected(name);
                    return Err(CommandError::MaxConcurrencyReached {
                        command: name.to_string(),
                        number: rule.number,
                        per: rule.per.clone(),
                    });
                }
            }
        }

        let args = bind(ctx, command, &self.converters, &self.quotes).await?;
        command.record_use();

        let Some(handler) = command.handler().cloned() else {
            return Err(CommandError::CommandNotFound { name: name.to_string() });
        };

        let _timer = CommandTimer::new(name);
        let after = AfterInvoke::arm(Arc::clone(ctx), command.after_invoke().cloned(), Arc::clone(&self.hooks));

        let body = match self.before_invoke(ctx, command).await {
            Ok(()) => {
                let outcome = AssertUnwindSafe(handler.invoke(Arc::clone(ctx), args))
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(result) => result,
                    Err(panic) => Err(panic_message(panic)),
                }
            }
            Err(e) => Err(e),
        };
        let after = after.run().await;

        // An after-invoke failure only surfaces when the body succeeded
        body.and(after).map_err(|source| CommandError::Invoke {
            command: name.to_string(),
            source,
        })
    }

    async fn before_invoke(&self, ctx: &Arc<Context>, command: &Command) -> HandlerResult {
        if let Some(hook) = command.before_invoke() {
            hook.call(Arc::clone(ctx)).await?;
        }
        self.hooks.before_invoke(ctx).await
    }

    /// Command handler, then module handler, then the global hook. The first
    /// handler that returns `Ok` ends routing.
    async fn report(&self, ctx: &Arc<Context>, command: &Command, parents: &[Arc<Command>], error: CommandError) {
        let error = Arc::new(error);

        if let Some(handler) = command.error_handler() {
            match handler.on_error(Arc::clone(ctx), Arc::clone(&error)).await {
                Ok(()) => return,
                Err(failure) => fallback(ctx, &error, failure),
            }
        }

        let root = parents.first().map_or(command, |p| &**p);
        let module_handler = root
            .module()
            .and_then(|m| self.modules.get(m).and_then(|loaded| loaded.error_handler.clone()));
        if let Some(handler) = module_handler {
            match handler.on_error(Arc::clone(ctx), Arc::clone(&error)).await {
                Ok(()) => return,
                Err(failure) => fallback(ctx, &error, failure),
            }
        }

        self.report_global(ctx, &error).await;
    }

    async fn report_global(&self, ctx: &Arc<Context>, error: &CommandError) {
        if let Err(failure) = self.hooks.on_command_error(ctx, error).await {
            fallback(ctx, error, failure);
        }
    }
}

/// Releases concurrency admissions however the invocation ends.
struct ReleaseGuard<'a>(&'a Context);

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        self.0.release_held();
    }
}

/// Runs after-invoke hooks exactly once: inline via [`AfterInvoke::run`], or
/// on a fresh task if the invocation is cancelled first.
struct AfterInvoke {
    ctx: Arc<Context>,
    command_hook: Option<Arc<dyn InvokeHook>>,
    hooks: Arc<dyn Hooks>,
    armed: bool,
}

impl AfterInvoke {
    fn arm(ctx: Arc<Context>, command_hook: Option<Arc<dyn InvokeHook>>, hooks: Arc<dyn Hooks>) -> Self {
        Self {
            ctx,
            command_hook,
            hooks,
            armed: true,
        }
    }

    async fn run(mut self) -> HandlerResult {
        self.armed = false;
        run_after_hooks(&self.ctx, self.command_hook.as_ref(), self.hooks.as_ref()).await
    }
}

impl Drop for AfterInvoke {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("After-invoke hooks skipped: no runtime");
            return;
        };
        let ctx = Arc::clone(&self.ctx);
        let command_hook = self.command_hook.take();
        let hooks = Arc::clone(&self.hooks);
        runtime.spawn(async move {
            if let Err(e) = run_after_hooks(&ctx, command_hook.as_ref(), hooks.as_ref()).await {
                warn!(error = %e, "After-invoke hook failed on a cancelled invocation");
            }
        });
    }
}

/// Command hook then global hook; both run even if the first fails.
async fn run_after_hooks(ctx: &Arc<Context>, command_hook: Option<&Arc<dyn InvokeHook>>, hooks: &dyn Hooks) -> HandlerResult {
    let first = match command_hook {
        Some(hook) => hook.call(Arc::clone(ctx)).await,
        None => Ok(()),
    };
    let second = hooks.after_invoke(ctx).await;
    first.and(second)
}

fn panic_message(panic: Box<dyn Any + Send>) -> BoxError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "command panicked".to_string());
    format!("panicked: {message}").into()
}

/// Log a failure raised by an error handler. Never routed back through the
/// handler chain.
fn fallback(ctx: &Context, original: &CommandError, failure: BoxError) {
    metrics::record_handler_failure();
    error!(
        target: "slirc_dispatch::fallback",
        command = ctx.command_name().unwrap_or("-"),
        invocation = %ctx.id,
        original = %original,
        failure = %cause_chain(failure.as_ref()),
        "Error handler failed"
    );
}
