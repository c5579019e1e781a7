//! slirc-dispatch - Straylight command dispatch core.
//!
//! Turns raw chat text into typed command invocations: prefix matching,
//! group resolution, quote-aware argument binding, checks, cooldowns and
//! concurrency limits, with error routing through command, module and
//! global handlers.
//!
//! The transport is not part of this crate. An embedder builds an
//! [`InvocationEvent`] per inbound message and hands it to
//! [`Dispatcher::dispatch`]; replies come back through the event's
//! [`Responder`].

pub mod commands;
pub mod config;
pub mod directory;
pub mod error;
pub mod limits;
pub mod metrics;
pub mod telemetry;

pub use commands::{
    Args, Command, CommandBuilder, Context, Dispatcher, InvocationEvent, Module, Parameter,
    Responder, Shape, TypeKey, Value,
};
pub use config::Config;
pub use error::{CheckFailure, CommandError, ExtensionError, UserInputError};
