//! Command modules: named bundles of commands loaded and unloaded together.

use super::checks::Check;
use super::command::Command;
use super::hooks::ErrorHandler;
use std::sync::Arc;

/// A named set of root commands with an optional shared check and error
/// handler.
pub struct Module {
    name: String,
    description: Option<String>,
    commands: Vec<Command>,
    check: Option<Check>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            commands: Vec::new(),
            check: None,
            error_handler: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Runs before the checks of every command in the module.
    pub fn check(mut self, check: Check) -> Self {
        self.check = Some(check);
        self
    }

    /// Tried after a command's own error handler and before the global hook.
    pub fn on_error(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Split into the parts kept by the dispatcher and the commands to
    /// register, each tagged with the module name.
    pub(crate) fn into_parts(self) -> (LoadedModule, Vec<Command>) {
        let Self {
            name,
            description,
            mut commands,
            check,
            error_handler,
        } = self;
        for command in &mut commands {
            command.set_module(&name);
        }
        let names = commands.iter().map(|c| c.name().to_string()).collect();
        let loaded = LoadedModule {
            name,
            description,
            check,
            error_handler,
            commands: names,
        };
        (loaded, commands)
    }
}

/// A module after registration.
pub struct LoadedModule {
    pub name: String,
    pub description: Option<String>,
    pub check: Option<Check>,
    pub error_handler: Option<Arc<dyn ErrorHandler>>,
    /// Root command names registered by the module.
    pub commands: Vec<String>,
}
