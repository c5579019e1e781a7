//! Commands, groups and their builder.
//!
//! A group is a command with a child map. The structure of a built command
//! is fixed; only its enabled flag, its dynamic checks and its usage counter
//! change afterwards.

use super::checks::Check;
use super::hooks::{ErrorHandler, Handler, InvokeHook};
use super::params::{Parameter, Shape};
use crate::error::ExtensionError;
use crate::limits::{Cooldown, MaxConcurrency};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A registered command or group.
pub struct Command {
    name: String,
    qualified_name: String,
    aliases: Vec<String>,
    description: Option<String>,
    params: Vec<Parameter>,
    checks: Vec<Check>,
    extra_checks: RwLock<Vec<Check>>,
    cooldowns: Vec<Cooldown>,
    concurrency: Option<MaxConcurrency>,
    handler: Option<Arc<dyn Handler>>,
    enabled: AtomicBool,
    ignore_extra: bool,
    module: Option<String>,
    before_invoke: Option<Arc<dyn InvokeHook>>,
    after_invoke: Option<Arc<dyn InvokeHook>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    children: Option<CommandMap>,
    uses: AtomicU64,
}

impl Command {
    /// Start declaring a command.
    pub fn builder(name: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(name.into(), false)
    }

    /// Start declaring a group.
    pub fn group(name: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(name.into(), true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Space-separated path from the root, e.g. `tag set`.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Declared checks followed by checks added after registration.
    pub fn checks(&self) -> Vec<Check> {
        let mut checks = self.checks.clone();
        checks.extend(self.extra_checks.read().iter().cloned());
        checks
    }

    /// Attach a check to a registered command.
    pub fn add_check(&self, check: Check) {
        self.extra_checks.write().push(check);
    }

    pub fn cooldowns(&self) -> &[Cooldown] {
        &self.cooldowns
    }

    pub fn concurrency(&self) -> Option<&MaxConcurrency> {
        self.concurrency.as_ref()
    }

    pub fn handler(&self) -> Option<&Arc<dyn Handler>> {
        self.handler.as_ref()
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    pub fn ignore_extra(&self) -> bool {
        self.ignore_extra
    }

    /// Name of the module that registered this command, for root commands.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub(crate) fn set_module(&mut self, module: &str) {
        self.module = Some(module.to_string());
    }

    pub fn before_invoke(&self) -> Option<&Arc<dyn InvokeHook>> {
        self.before_invoke.as_ref()
    }

    pub fn after_invoke(&self) -> Option<&Arc<dyn InvokeHook>> {
        self.after_invoke.as_ref()
    }

    pub fn error_handler(&self) -> Option<&Arc<dyn ErrorHandler>> {
        self.error_handler.as_ref()
    }

    #[inline]
    pub fn is_group(&self) -> bool {
        self.children.is_some()
    }

    /// Direct children in registration order.
    pub fn children(&self) -> &[Arc<Command>] {
        match &self.children {
            Some(map) => map.as_slice(),
            None => &[],
        }
    }

    /// Look up a direct child by name or alias.
    pub fn child(&self, name: &str, case_insensitive: bool) -> Option<&Arc<Command>> {
        self.children.as_ref()?.get(name, case_insensitive)
    }

    /// Name followed by aliases.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Successful bindings so far.
    pub fn uses(&self) -> u64 {
        self.uses.load(Ordering::Relaxed)
    }

    pub(crate) fn record_use(&self) {
        self.uses.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("qualified_name", &self.qualified_name)
            .field("aliases", &self.aliases)
            .field("params", &self.params.len())
            .field("enabled", &self.is_enabled())
            .field("children", &self.children().len())
            .finish_non_exhaustive()
    }
}

/// Sibling commands indexed by name and alias.
#[derive(Debug, Clone, Default)]
pub struct CommandMap {
    by_name: HashMap<String, Arc<Command>>,
    ordered: Vec<Arc<Command>>,
}

impl CommandMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact match first, then a case-insensitive scan when enabled.
    pub fn get(&self, name: &str, case_insensitive: bool) -> Option<&Arc<Command>> {
        if let Some(found) = self.by_name.get(name) {
            return Some(found);
        }
        if !case_insensitive {
            return None;
        }
        let lowered = name.to_lowercase();
        self.ordered
            .iter()
            .find(|c| c.names().any(|n| n.to_lowercase() == lowered))
    }

    /// The first of `command`'s names already taken by a sibling.
    pub fn conflict(&self, command: &Command, case_insensitive: bool) -> Option<ExtensionError> {
        command.names().find_map(|name| {
            self.get(name, case_insensitive)
                .map(|_| ExtensionError::CommandRegistration {
                    name: name.to_string(),
                    alias_conflict: name != command.name,
                })
        })
    }

    pub fn insert(&mut self, command: Arc<Command>, case_insensitive: bool) -> Result<(), ExtensionError> {
        if let Some(conflict) = self.conflict(&command, case_insensitive) {
            return Err(conflict);
        }
        for name in command.names() {
            self.by_name.insert(name.to_string(), Arc::clone(&command));
        }
        self.ordered.push(command);
        Ok(())
    }

    /// Remove a command by name or alias, along with its other names.
    pub fn remove(&mut self, name: &str, case_insensitive: bool) -> Option<Arc<Command>> {
        let command = Arc::clone(self.get(name, case_insensitive)?);
        self.by_name.retain(|_, c| !Arc::ptr_eq(c, &command));
        self.ordered.retain(|c| !Arc::ptr_eq(c, &command));
        Some(command)
    }

    pub fn as_slice(&self) -> &[Arc<Command>] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// Check that no two siblings anywhere under `command` differ only by case.
pub(crate) fn check_case_conflicts(command: &Command) -> Result<(), ExtensionError> {
    let mut seen = HashSet::new();
    for child in command.children() {
        for name in child.names() {
            if !seen.insert(name.to_lowercase()) {
                return Err(ExtensionError::CommandRegistration {
                    name: name.to_string(),
                    alias_conflict: name != child.name,
                });
            }
        }
        check_case_conflicts(child)?;
    }
    Ok(())
}

/// Declares a [`Command`].
pub struct CommandBuilder {
    name: String,
    aliases: Vec<String>,
    description: Option<String>,
    params: Vec<Parameter>,
    checks: Vec<Check>,
    cooldowns: Vec<Cooldown>,
    concurrency: Option<MaxConcurrency>,
    handler: Option<Arc<dyn Handler>>,
    enabled: bool,
    ignore_extra: bool,
    before_invoke: Option<Arc<dyn InvokeHook>>,
    after_invoke: Option<Arc<dyn InvokeHook>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    group: bool,
    children: Vec<CommandBuilder>,
}

impl CommandBuilder {
    fn new(name: String, group: bool) -> Self {
        Self {
            name,
            aliases: Vec::new(),
            description: None,
            params: Vec::new(),
            checks: Vec::new(),
            cooldowns: Vec::new(),
            concurrency: None,
            handler: None,
            enabled: true,
            ignore_extra: false,
            before_invoke: None,
            after_invoke: None,
            error_handler: None,
            group,
            children: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Add a cooldown rule. Every rule must allow an invocation.
    pub fn cooldown(mut self, cooldown: Cooldown) -> Self {
        self.cooldowns.push(cooldown);
        self
    }

    pub fn max_concurrency(mut self, rule: MaxConcurrency) -> Self {
        self.concurrency = Some(rule);
        self
    }

    pub fn handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Ignore leftover tokens instead of failing.
    pub fn ignore_extra(mut self) -> Self {
        self.ignore_extra = true;
        self
    }

    pub fn before_invoke(mut self, hook: impl InvokeHook + 'static) -> Self {
        self.before_invoke = Some(Arc::new(hook));
        self
    }

    pub fn after_invoke(mut self, hook: impl InvokeHook + 'static) -> Self {
        self.after_invoke = Some(Arc::new(hook));
        self
    }

    pub fn on_error(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Add a child; the command becomes a group.
    pub fn subcommand(mut self, child: CommandBuilder) -> Self {
        self.group = true;
        self.children.push(child);
        self
    }

    pub fn build(self) -> Result<Command, ExtensionError> {
        self.build_under(None)
    }

    fn build_under(self, parent: Option<&str>) -> Result<Command, ExtensionError> {
        let qualified_name = match parent {
            Some(parent) => format!("{parent} {}", self.name),
            None => self.name.clone(),
        };
        let invalid = |reason: &str| ExtensionError::InvalidCommand {
            command: qualified_name.clone(),
            reason: reason.to_string(),
        };

        for name in std::iter::once(&self.name).chain(&self.aliases) {
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(invalid(&format!("name {name:?} must be a single word")));
            }
        }
        if let Some(alias) = self.aliases.iter().find(|a| **a == self.name) {
            return Err(ExtensionError::CommandRegistration {
                name: alias.clone(),
                alias_conflict: true,
            });
        }
        if self.handler.is_none() && !self.group {
            return Err(invalid("a command needs a body"));
        }
        validate_params(&qualified_name, &self.params)?;

        let children = if self.group {
            let mut map = CommandMap::new();
            for child in self.children {
                let child = child.build_under(Some(&qualified_name))?;
                map.insert(Arc::new(child), false)?;
            }
            Some(map)
        } else {
            None
        };

        Ok(Command {
            name: self.name,
            qualified_name,
            aliases: self.aliases,
            description: self.description,
            params: self.params,
            checks: self.checks,
            extra_checks: RwLock::new(Vec::new()),
            cooldowns: self.cooldowns,
            concurrency: self.concurrency,
            handler: self.handler,
            enabled: AtomicBool::new(self.enabled),
            ignore_extra: self.ignore_extra,
            module: None,
            before_invoke: self.before_invoke,
            after_invoke: self.after_invoke,
            error_handler: self.error_handler,
            children,
            uses: AtomicU64::new(0),
        })
    }
}

fn validate_params(command: &str, params: &[Parameter]) -> Result<(), ExtensionError> {
    let invalid = |param: &Parameter, reason: &str| ExtensionError::InvalidParameter {
        command: command.to_string(),
        param: param.name.clone(),
        reason: reason.to_string(),
    };

    let mut names = HashSet::new();
    for (index, param) in params.iter().enumerate() {
        if !names.insert(param.name.as_str()) {
            return Err(invalid(param, "declared twice"));
        }
        let last = index + 1 == params.len();
        if param.consume_rest && !last {
            return Err(invalid(param, "only the last parameter can take the rest of the line"));
        }
        match &param.shape {
            Shape::Flags(group) => {
                if !last {
                    return Err(invalid(param, "flags must be the last parameter"));
                }
                group.validate().map_err(|reason| invalid(param, &reason))?;
            }
            Shape::Greedy(inner) if matches!(**inner, Shape::Optional(_) | Shape::Greedy(_) | Shape::Flags(_)) => {
                return Err(invalid(param, "greedy cannot wrap optional, greedy or flags"));
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::converters::{Flag, FlagGroup};
    use crate::commands::hooks::handler_fn;
    use crate::commands::params::TypeKey;

    fn leaf(name: &str) -> CommandBuilder {
        Command::builder(name).handler(handler_fn(|_, _| async { Ok(()) }))
    }

    #[test]
    fn children_get_qualified_names() {
        let tag = Command::group("tag")
            .subcommand(leaf("get").alias("g"))
            .subcommand(Command::group("admin").subcommand(leaf("purge")))
            .build()
            .unwrap();

        assert!(tag.is_group());
        assert_eq!(tag.child("g", false).unwrap().qualified_name(), "tag get");
        let admin = tag.child("admin", false).unwrap();
        assert_eq!(admin.child("purge", false).unwrap().qualified_name(), "tag admin purge");
    }

    #[test]
    fn sibling_conflicts_are_rejected() {
        let err = Command::group("g")
            .subcommand(leaf("a"))
            .subcommand(leaf("b").alias("a"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ExtensionError::CommandRegistration {
                name: "a".into(),
                alias_conflict: true
            }
        );
    }

    #[test]
    fn case_conflicts_only_matter_when_folding() {
        let g = Command::group("g").subcommand(leaf("a")).subcommand(leaf("A")).build().unwrap();
        assert!(check_case_conflicts(&g).is_err());
        assert!(g.child("A", false).is_some());
    }

    #[test]
    fn commands_need_a_body() {
        let err = Command::builder("x").build().unwrap_err();
        assert!(matches!(err, ExtensionError::InvalidCommand { .. }));
        assert!(Command::group("x").build().is_ok());
    }

    #[test]
    fn parameter_layout_is_validated() {
        let rest_first = leaf("x")
            .param(Parameter::new("a", TypeKey::Str).rest())
            .param(Parameter::new("b", TypeKey::Str))
            .build();
        assert!(matches!(rest_first, Err(ExtensionError::InvalidParameter { ref param, .. }) if param == "a"));

        let nested = leaf("x")
            .param(Parameter::new("a", Shape::greedy(Shape::optional(TypeKey::Int.into()))))
            .build();
        assert!(nested.is_err());

        let flags = FlagGroup::new().flag(Flag::new("n", TypeKey::Int)).flag(Flag::new("n", TypeKey::Int));
        let bad_flags = leaf("x").param(Parameter::new("f", Shape::flags(flags))).build();
        assert!(bad_flags.is_err());
    }

    #[test]
    fn dynamic_checks_and_enabled_flag() {
        let cmd = leaf("x").check(crate::commands::checks::is_owner()).build().unwrap();
        cmd.add_check(crate::commands::checks::guild_only());
        assert_eq!(cmd.checks().len(), 2);
        cmd.set_enabled(false);
        assert!(!cmd.is_enabled());
    }

    #[test]
    fn map_remove_drops_aliases() {
        let mut map = CommandMap::new();
        map.insert(Arc::new(leaf("ping").alias("p").build().unwrap()), false).unwrap();
        assert!(map.get("P", true).is_some());
        assert!(map.get("P", false).is_none());
        let removed = map.remove("p", false).unwrap();
        assert_eq!(removed.name(), "ping");
        assert!(map.get("ping", false).is_none());
        assert!(map.is_empty());
    }
}
