//! Integration test common infrastructure.
//!
//! Provides a dispatcher wired to a recording hook set and a small sample
//! directory, plus helpers for sending messages and reading replies.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use slirc_dispatch::commands::{
    Author, Context, HandlerResult, Hooks, InvocationEvent, Origin, Responder, cause_chain,
};
use slirc_dispatch::directory::{Channel, Member, MemoryDirectory, Role, Snowflake, User};
use slirc_dispatch::{CommandError, Config, Dispatcher};
use std::sync::Arc;
use std::time::Duration;

pub const ALICE: Snowflake = 80351110224678912;
pub const BOB: Snowflake = 80088516616269824;
pub const OWNER: Snowflake = 175928847299117063;
pub const SCOPE: Snowflake = 81384788765712384;
pub const GENERAL: Snowflake = 81384788765712385;
pub const MODS: Snowflake = 175643578071121920;

/// An error as seen by the global error hook.
#[derive(Debug, Clone)]
pub struct RecordedError {
    pub command: Option<String>,
    pub code: &'static str,
    pub message: String,
    pub retry_after: Option<Duration>,
}

/// Global hooks that record completions and errors.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    completions: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<RecordedError>>>,
}

impl Recorder {
    pub fn completions(&self) -> Vec<String> {
        self.completions.lock().clone()
    }

    pub fn errors(&self) -> Vec<RecordedError> {
        self.errors.lock().clone()
    }

    pub fn error_codes(&self) -> Vec<&'static str> {
        self.errors.lock().iter().map(|e| e.code).collect()
    }
}

#[async_trait]
impl Hooks for Recorder {
    async fn on_command_completion(&self, ctx: &Context) {
        self.completions
            .lock()
            .push(ctx.command_name().unwrap_or("-").to_string());
    }

    async fn on_command_error(&self, ctx: &Context, error: &CommandError) -> HandlerResult {
        self.errors.lock().push(RecordedError {
            command: ctx.command_name().map(str::to_string),
            code: error.error_code(),
            message: cause_chain(error),
            retry_after: error.retry_after(),
        });
        Ok(())
    }
}

/// A dispatcher under test.
pub struct TestBot {
    pub dispatcher: Arc<Dispatcher>,
    pub recorder: Recorder,
}

impl TestBot {
    /// Build a bot with default configuration; `setup` registers commands.
    pub fn new(setup: impl FnOnce(&mut Dispatcher)) -> Self {
        Self::with_config(test_config(), setup)
    }

    pub fn with_config(config: Config, setup: impl FnOnce(&mut Dispatcher)) -> Self {
        let recorder = Recorder::default();
        let mut dispatcher = Dispatcher::new(&config, Arc::new(sample_directory()));
        dispatcher.set_hooks(recorder.clone());
        setup(&mut dispatcher);
        Self {
            dispatcher: Arc::new(dispatcher),
            recorder,
        }
    }

    /// Send `content` as `author` in #general and collect the replies.
    pub async fn send(&self, author: Snowflake, content: &str) -> Vec<String> {
        self.send_event(event(author, content)).await
    }

    pub async fn send_event(&self, mut event: InvocationEvent) -> Vec<String> {
        let (responder, buf) = Responder::capturing();
        event.responder = responder;
        self.dispatcher.dispatch(event).await;
        let replies = buf.lock().await.iter().map(|r| r.content.clone()).collect();
        replies
    }
}

/// Default configuration with [`OWNER`] as the only owner.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.dispatch.owners = vec![OWNER];
    config
}

/// An event from `author` in #general with replies discarded.
pub fn event(author: Snowflake, content: &str) -> InvocationEvent {
    InvocationEvent {
        author: Author::new(author, format!("user{author}")),
        origin: Origin::scoped(SCOPE, Channel::new(GENERAL, "general", Some(SCOPE))),
        content: content.to_string(),
        responder: Responder::Discard,
    }
}

/// An event from `author` in a private conversation.
pub fn private_event(author: Snowflake, content: &str) -> InvocationEvent {
    InvocationEvent {
        author: Author::new(author, format!("user{author}")),
        origin: Origin::private(Channel::new(author + 1, "dm", None)),
        content: content.to_string(),
        responder: Responder::Discard,
    }
}

pub fn sample_directory() -> MemoryDirectory {
    let directory = MemoryDirectory::new();
    let mut alice = Member::new(User::new(ALICE, "alice"), SCOPE);
    alice.nick = Some("ally".to_string());
    alice.roles.push(MODS);
    directory.add_member(alice);
    directory.add_member(Member::new(User::new(BOB, "bob"), SCOPE));
    directory.add_member(Member::new(User::new(OWNER, "owner"), SCOPE));
    directory.add_channel(Channel::new(GENERAL, "general", Some(SCOPE)));
    directory.add_role(Role::new(MODS, "Mods", SCOPE));
    directory
}
