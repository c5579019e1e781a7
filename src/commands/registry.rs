//! Command registry and resolution.
//!
//! The `Registry` owns the root command map, resolves input lines through
//! nested groups, and provides command usage statistics.

use super::command::{Command, CommandMap, check_case_conflicts};
use crate::error::{CommandError, ExtensionError};
use parking_lot::RwLock;
use slirc_argv::StringView;
use std::sync::Arc;

/// A resolved input line.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub command: Arc<Command>,
    /// Ancestor groups, outermost first.
    pub parents: Vec<Arc<Command>>,
    /// The word that matched `command`.
    pub invoked_with: String,
    /// The words that matched each parent.
    pub invoked_parents: Vec<String>,
    /// Argument text after the last matched word.
    pub remaining: String,
}

/// Root of the command trie.
#[derive(Debug)]
pub struct Registry {
    root: RwLock<CommandMap>,
    case_insensitive: bool,
}

impl Registry {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            root: RwLock::new(CommandMap::new()),
            case_insensitive,
        }
    }

    #[inline]
    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Register a root command or group.
    pub fn register(&self, command: Command) -> Result<Arc<Command>, ExtensionError> {
        if self.case_insensitive {
            check_case_conflicts(&command)?;
        }
        let command = Arc::new(command);
        self.root.write().insert(Arc::clone(&command), self.case_insensitive)?;
        Ok(command)
    }

    /// Register a root group. Fails if `group` has no child map.
    pub fn register_group(&self, group: Command) -> Result<Arc<Command>, ExtensionError> {
        if !group.is_group() {
            return Err(ExtensionError::InvalidCommand {
                command: group.qualified_name().to_string(),
                reason: "not a group".to_string(),
            });
        }
        self.register(group)
    }

    /// Register several commands; either all of them or none are added.
    pub fn register_many(&self, commands: Vec<Command>) -> Result<Vec<Arc<Command>>, ExtensionError> {
        if self.case_insensitive {
            for command in &commands {
                check_case_conflicts(command)?;
            }
        }

        let mut root = self.root.write();
        let mut staged = root.clone();
        let mut added = Vec::with_capacity(commands.len());
        for command in commands {
            let command = Arc::new(command);
            staged.insert(Arc::clone(&command), self.case_insensitive)?;
            added.push(command);
        }
        *root = staged;
        Ok(added)
    }

    /// Unregister a root command by name or alias.
    pub fn remove(&self, name: &str) -> Option<Arc<Command>> {
        self.root.write().remove(name, self.case_insensitive)
    }

    /// Look up a command by qualified name, e.g. `tag set`.
    pub fn get(&self, qualified_name: &str) -> Option<Arc<Command>> {
        let mut words = qualified_name.split_whitespace();
        let mut current = Arc::clone(self.root.read().get(words.next()?, self.case_insensitive)?);
        for word in words {
            let next = Arc::clone(current.child(word, self.case_insensitive)?);
            current = next;
        }
        Some(current)
    }

    /// Root commands in registration order.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        self.root.read().as_slice().to_vec()
    }

    /// Every command, depth first.
    pub fn walk_commands(&self) -> Vec<Arc<Command>> {
        fn walk(command: &Arc<Command>, out: &mut Vec<Arc<Command>>) {
            out.push(Arc::clone(command));
            for child in command.children() {
                walk(child, out);
            }
        }

        let mut out = Vec::new();
        for command in self.root.read().as_slice() {
            walk(command, &mut out);
        }
        out
    }

    /// Get command usage statistics, busiest first.
    pub fn command_stats(&self) -> Vec<(String, u64)> {
        let mut stats: Vec<_> = self
            .walk_commands()
            .iter()
            .map(|cmd| (cmd.qualified_name().to_string(), cmd.uses()))
            .filter(|(_, count)| *count > 0) // Only include used commands
            .collect();

        stats.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        stats
    }

    /// Resolve `text` to a command and its argument text.
    ///
    /// Descends into groups word by word. A group whose next word names no
    /// child is itself the target if it has a body.
    pub fn resolve(&self, text: &str) -> Result<Resolved, CommandError> {
        let mut view = StringView::new(text);
        let first = view.get_word();
        let not_found = |name: String| CommandError::CommandNotFound { name };

        let mut command = match self.root.read().get(first, self.case_insensitive) {
            Some(found) => Arc::clone(found),
            None => return Err(not_found(first.to_string())),
        };
        let mut invoked_with = first.to_string();
        let mut parents = Vec::new();
        let mut invoked_parents = Vec::new();

        while command.is_group() {
            let word = view.get_word();
            match command.child(word, self.case_insensitive).cloned() {
                Some(child) => {
                    parents.push(std::mem::replace(&mut command, child));
                    invoked_parents.push(std::mem::replace(&mut invoked_with, word.to_string()));
                }
                None => {
                    view.undo();
                    if command.handler().is_none() {
                        let mut path = invoked_parents.clone();
                        path.push(invoked_with);
                        if !word.is_empty() {
                            path.push(word.to_string());
                        }
                        return Err(not_found(path.join(" ")));
                    }
                    break;
                }
            }
        }

        view.skip_ws();
        Ok(Resolved {
            command,
            parents,
            invoked_with,
            invoked_parents,
            remaining: view.remaining().to_string(),
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(false)
    }
}
