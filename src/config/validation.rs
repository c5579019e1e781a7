//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("dispatch.prefixes must not contain an empty prefix")]
    EmptyPrefix,
    #[error("tokenizer.escape must not be whitespace")]
    WhitespaceEscape,
    #[error("tokenizer.extra_quotes pair {0:?} uses whitespace or the escape character")]
    InvalidQuotePair((char, char)),
    #[error("flags.delimiter must not be empty")]
    EmptyFlagDelimiter,
    #[error("flags.prefix and flags.delimiter cannot both be blank")]
    AmbiguousFlagSyntax,
    #[error("limits.maintenance_interval_secs must be greater than zero")]
    ZeroMaintenanceInterval,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.dispatch.prefixes.iter().any(|p| p.is_empty()) {
        errors.push(ValidationError::EmptyPrefix);
    }

    let escape = config.tokenizer.escape;
    if escape.is_whitespace() {
        errors.push(ValidationError::WhitespaceEscape);
    }
    for &(open, close) in &config.tokenizer.extra_quotes {
        if open.is_whitespace() || close.is_whitespace() || open == escape || close == escape {
            errors.push(ValidationError::InvalidQuotePair((open, close)));
        }
    }

    let flags = &config.flags;
    if flags.delimiter.is_empty() {
        errors.push(ValidationError::EmptyFlagDelimiter);
    } else if flags.prefix.trim().is_empty() && flags.delimiter.trim().is_empty() {
        // Every word would be a flag name
        errors.push(ValidationError::AmbiguousFlagSyntax);
    }

    if config.limits.maintenance_interval_secs == 0 {
        errors.push(ValidationError::ZeroMaintenanceInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
