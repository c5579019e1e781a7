//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Root config struct and loading (Config, ConfigError)
//! - [`dispatch`]: Prefixes, name matching and owners (DispatchConfig)
//! - [`tokenizer`]: Quote pairs and escape character (TokenizerConfig)
//! - [`limits`]: Bucket retention and maintenance (LimitsConfig)
//! - [`flags`]: Default flag-group syntax (FlagConfig)
//! - [`validation`]: Startup checks (ValidationError)

mod dispatch;
mod flags;
mod limits;
mod tokenizer;
mod types;
mod validation;

pub use dispatch::DispatchConfig;
pub use flags::{FlagConfig, UnknownFlags};
pub use limits::LimitsConfig;
pub use tokenizer::TokenizerConfig;
pub use types::{Config, ConfigError};
pub use validation::{ValidationError, validate};
