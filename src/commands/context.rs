//! Invocation events and the per-invocation context.

use super::command::Command;
use super::responder::{Reply, Responder};
use crate::directory::{Channel, Directory, Snowflake};
use crate::error::ReplyError;
use crate::limits::Admission;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Where an invocation happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// A shared space with members, channels and roles.
    Generic,
    /// A one-to-one conversation.
    Private,
    /// A shared space with limited visibility (threads, group chats).
    Restricted,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Private => "private",
            Self::Restricted => "restricted",
        }
    }
}

bitflags::bitflags! {
    /// Permission bits of an author in the invoking channel.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Permissions: u64 {
        const KICK_MEMBERS      = 1 << 1;
        const BAN_MEMBERS       = 1 << 2;
        /// Implies every other permission.
        const ADMINISTRATOR     = 1 << 3;
        const MANAGE_CHANNELS   = 1 << 4;
        const MANAGE_SCOPE      = 1 << 5;
        const SEND_MESSAGES     = 1 << 11;
        const MANAGE_MESSAGES   = 1 << 13;
        const MENTION_EVERYONE  = 1 << 17;
        const MANAGE_NICKNAMES  = 1 << 27;
        const MANAGE_ROLES      = 1 << 28;
    }
}

impl Permissions {
    /// Whether every bit of `required` is granted. Administrators hold all.
    pub fn grants(&self, required: Self) -> bool {
        self.contains(Self::ADMINISTRATOR) || self.contains(required)
    }

    /// Lowercase names of the bits of `required` that are not granted.
    pub fn missing(&self, required: Self) -> Vec<String> {
        if self.grants(required) {
            return Vec::new();
        }
        (required - *self)
            .iter_names()
            .map(|(name, _)| name.to_ascii_lowercase())
            .collect()
    }
}

/// Who sent an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: Snowflake,
    pub name: String,
    pub bot: bool,
    /// Role ids in the origin scope, highest first.
    pub roles: Vec<Snowflake>,
    /// Effective permissions in the origin channel.
    pub permissions: Permissions,
}

impl Author {
    pub fn new(id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            bot: false,
            roles: Vec::new(),
            permissions: Permissions::empty(),
        }
    }
}

/// The scope and channel an invocation came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub kind: ScopeKind,
    /// `None` for private conversations.
    pub scope_id: Option<Snowflake>,
    pub channel: Channel,
}

impl Origin {
    pub fn scoped(scope_id: Snowflake, channel: Channel) -> Self {
        Self {
            kind: ScopeKind::Generic,
            scope_id: Some(scope_id),
            channel,
        }
    }

    pub fn private(channel: Channel) -> Self {
        Self {
            kind: ScopeKind::Private,
            scope_id: None,
            channel,
        }
    }
}

/// A raw inbound message handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct InvocationEvent {
    pub author: Author,
    pub origin: Origin,
    pub content: String,
    pub responder: Responder,
}

/// State of one invocation, shared with checks, converters, hooks and the
/// command body.
pub struct Context {
    /// Correlation id for logs.
    pub id: Uuid,
    pub author: Author,
    pub origin: Origin,
    /// The full message text.
    pub content: String,
    /// The prefix that addressed the agent.
    pub prefix: String,
    /// The name or alias the command was invoked with.
    pub invoked_with: Option<String>,
    /// Names the ancestor groups were invoked with, outermost first.
    pub invoked_parents: Vec<String>,
    /// The resolved command.
    pub command: Option<Arc<Command>>,
    /// Argument text after the command name.
    pub remaining: String,
    pub responder: Responder,
    pub directory: Arc<dyn Directory>,
    pub(crate) owners: Arc<HashSet<Snowflake>>,
    held: Mutex<Vec<Admission>>,
}

impl Context {
    pub fn new(
        event: InvocationEvent,
        directory: Arc<dyn Directory>,
        owners: Arc<HashSet<Snowflake>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            author: event.author,
            origin: event.origin,
            content: event.content,
            prefix: String::new(),
            invoked_with: None,
            invoked_parents: Vec::new(),
            command: None,
            remaining: String::new(),
            responder: event.responder,
            directory,
            owners,
            held: Mutex::new(Vec::new()),
        }
    }

    /// Qualified name of the resolved command, if any.
    pub fn command_name(&self) -> Option<&str> {
        self.command.as_deref().map(Command::qualified_name)
    }

    /// Whether the author is a configured owner.
    pub fn is_owner(&self) -> bool {
        self.owners.contains(&self.author.id)
    }

    /// Reply in the originating channel.
    pub async fn reply(&self, content: impl Into<String>) -> Result<(), ReplyError> {
        self.responder
            .send(Reply {
                channel_id: self.origin.channel.id,
                content: content.into(),
            })
            .await
    }

    /// Keep a concurrency admission until the invocation finishes.
    pub(crate) fn hold(&self, admission: Admission) {
        self.held.lock().push(admission);
    }

    /// Release every held admission. Safe to call more than once.
    pub(crate) fn release_held(&self) {
        let held = std::mem::take(&mut *self.held.lock());
        drop(held);
    }

    pub(crate) fn held_count(&self) -> usize {
        self.held.lock().len()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("author", &self.author.id)
            .field("scope", &self.origin.kind)
            .field("command", &self.command_name())
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn administrator_implies_everything() {
        let perms = Permissions::ADMINISTRATOR;
        assert!(perms.grants(Permissions::BAN_MEMBERS | Permissions::MANAGE_ROLES));
        assert!(!perms.contains(Permissions::BAN_MEMBERS));
        assert!(perms.missing(Permissions::KICK_MEMBERS).is_empty());
    }

    #[test]
    fn missing_lists_names() {
        let perms = Permissions::KICK_MEMBERS;
        let missing = perms.missing(Permissions::KICK_MEMBERS | Permissions::BAN_MEMBERS);
        assert_eq!(missing, vec!["ban_members"]);
    }

    #[test]
    fn missing_names_follow_declaration_order() {
        let perms = Permissions::SEND_MESSAGES;
        let required = Permissions::MANAGE_ROLES | Permissions::SEND_MESSAGES | Permissions::KICK_MEMBERS;
        assert!(!perms.grants(required));
        assert_eq!(perms.missing(required), vec!["kick_members", "manage_roles"]);
    }

    #[tokio::test]
    async fn reply_goes_to_origin_channel() {
        let (responder, buf) = Responder::capturing();
        let mut ctx = super::super::test_support::context_in(1, 10, 20);
        ctx.responder = responder;
        ctx.reply("pong").await.unwrap();
        let replies = buf.lock().await;
        assert_eq!(replies[0].channel_id, 20);
        assert_eq!(replies[0].content, "pong");
    }
}
