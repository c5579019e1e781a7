//! Unified error handling for slirc-dispatch.
//!
//! Every failure raised while resolving, gating, binding or running a command
//! is a [`CommandError`]. The variants form the taxonomy error handlers match
//! on: user input problems, check failures, resolution failures, resource
//! gate denials and failures of the command body itself. Registration-time
//! failures live in the separate [`ExtensionError`] family.

use crate::limits::{BucketType, Cooldown};
use slirc_argv::ArgumentParsingError;
use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by command bodies, hooks and custom converters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ============================================================================
// Command Errors (per-invocation)
// ============================================================================

/// Root of the per-invocation error taxonomy.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Bad, missing or malformed arguments. Never a bug.
    #[error(transparent)]
    UserInput(#[from] UserInputError),

    /// An authorization or environment precondition was not met.
    #[error(transparent)]
    Check(#[from] CheckFailure),

    #[error("command {name:?} is not found")]
    CommandNotFound { name: String },

    #[error("{command} command is disabled")]
    DisabledCommand { command: String },

    /// A converter failed with something other than a user input error.
    #[error("converting to {converter:?} failed for parameter {param:?}")]
    Conversion {
        param: String,
        converter: String,
        #[source]
        source: BoxError,
    },

    /// The command body (or one of its invoke hooks) failed.
    #[error("command {command} raised an error")]
    Invoke {
        command: String,
        #[source]
        source: BoxError,
    },

    #[error("you are on cooldown, try again in {:.2}s", .retry_after.as_secs_f64())]
    OnCooldown {
        command: String,
        cooldown: Cooldown,
        retry_after: Duration,
    },

    #[error("too many people are using this command, it can only be used {number} time(s) per {per} concurrently")]
    MaxConcurrencyReached {
        command: String,
        number: usize,
        per: BucketType,
    },
}

impl CommandError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UserInput(e) => e.error_code(),
            Self::Check(e) => e.error_code(),
            Self::CommandNotFound { .. } => "command_not_found",
            Self::DisabledCommand { .. } => "disabled_command",
            Self::Conversion { .. } => "conversion_error",
            Self::Invoke { .. } => "command_invoke_error",
            Self::OnCooldown { .. } => "command_on_cooldown",
            Self::MaxConcurrencyReached { .. } => "max_concurrency_reached",
        }
    }

    /// Whether this is a user input error.
    #[inline]
    pub fn is_user_input(&self) -> bool {
        matches!(self, Self::UserInput(_))
    }

    /// Whether this is a check failure.
    #[inline]
    pub fn is_check_failure(&self) -> bool {
        matches!(self, Self::Check(_))
    }

    /// Whether this is a tokenizer-level failure. These are never swallowed
    /// by optional or union conversion.
    #[inline]
    pub fn is_hard_parse_error(&self) -> bool {
        matches!(self, Self::UserInput(UserInputError::ArgumentParsing(_)))
    }

    /// Seconds until a cooldown denial clears.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::OnCooldown { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<ArgumentParsingError> for CommandError {
    fn from(e: ArgumentParsingError) -> Self {
        Self::UserInput(UserInputError::ArgumentParsing(e))
    }
}

// ============================================================================
// User Input Errors
// ============================================================================

/// Errors caused by what the user typed.
#[derive(Debug, Error)]
pub enum UserInputError {
    #[error("{param} is a required argument that is missing")]
    MissingRequiredArgument { param: String },

    #[error("too many arguments passed to {command}")]
    TooManyArguments { command: String },

    #[error(transparent)]
    ArgumentParsing(#[from] ArgumentParsingError),

    #[error("{0}")]
    BadArgument(String),

    #[error("{argument:?} is not a recognised boolean option")]
    BadBoolArgument { argument: String },

    #[error("could not convert {param:?} into {}", .literals.join(", "))]
    BadLiteralArgument {
        param: String,
        argument: String,
        literals: Vec<String>,
    },

    #[error("could not convert {param:?} into {}", .converters.join(", "))]
    BadUnionArgument {
        param: String,
        converters: Vec<String>,
        errors: Vec<CommandError>,
    },

    #[error("member {argument:?} not found")]
    MemberNotFound { argument: String },

    #[error("user {argument:?} not found")]
    UserNotFound { argument: String },

    #[error("channel {argument:?} not found")]
    ChannelNotFound { argument: String },

    #[error("role {argument:?} not found")]
    RoleNotFound { argument: String },

    #[error("flag {flag:?} is required and missing")]
    MissingRequiredFlag { flag: String },

    #[error("flag {flag:?} does not have an argument")]
    MissingFlagArgument { flag: String },

    #[error("too many flag values, flag {flag:?} received {}", .values.len())]
    TooManyFlags { flag: String, values: Vec<String> },

    #[error("could not convert value of flag {flag:?}")]
    BadFlagArgument {
        flag: String,
        #[source]
        source: BoxError,
    },
}

impl UserInputError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingRequiredArgument { .. } => "missing_required_argument",
            Self::TooManyArguments { .. } => "too_many_arguments",
            Self::ArgumentParsing(_) => "argument_parsing_error",
            Self::BadArgument(_) => "bad_argument",
            Self::BadBoolArgument { .. } => "bad_bool_argument",
            Self::BadLiteralArgument { .. } => "bad_literal_argument",
            Self::BadUnionArgument { .. } => "bad_union_argument",
            Self::MemberNotFound { .. } => "member_not_found",
            Self::UserNotFound { .. } => "user_not_found",
            Self::ChannelNotFound { .. } => "channel_not_found",
            Self::RoleNotFound { .. } => "role_not_found",
            Self::MissingRequiredFlag { .. } => "missing_required_flag",
            Self::MissingFlagArgument { .. } => "missing_flag_argument",
            Self::TooManyFlags { .. } => "too_many_flags",
            Self::BadFlagArgument { .. } => "bad_flag_argument",
        }
    }
}

// ============================================================================
// Check Failures
// ============================================================================

/// A check predicate did not pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckFailure {
    #[error("{message}")]
    Failed { message: String },

    /// Every predicate of an any-of group failed.
    #[error("you do not have permission to run this command")]
    CheckAny { errors: Vec<CheckFailure> },

    #[error("you do not own this bot")]
    NotOwner,

    #[error("you are missing {} permission(s) to run this command", .missing.join(", "))]
    MissingPermissions { missing: Vec<String> },

    #[error("role {role:?} is required to run this command")]
    MissingRole { role: String },

    #[error("you are missing at least one of the required roles: {}", .roles.join(", "))]
    MissingAnyRole { roles: Vec<String> },

    #[error("this command cannot be used in private messages")]
    NoPrivateMessage,

    #[error("this command can only be used in private messages")]
    PrivateMessageOnly,

    #[error("channel {channel:?} needs to be NSFW for this command to work")]
    NsfwChannelRequired { channel: String },
}

impl CheckFailure {
    /// A generic failure with the default message.
    pub fn failed() -> Self {
        Self::Failed {
            message: "the check functions for this command failed".to_string(),
        }
    }

    /// A generic failure with a custom message.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self::Failed { message: message.into() }
    }

    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "check_failure",
            Self::CheckAny { .. } => "check_any_failure",
            Self::NotOwner => "not_owner",
            Self::MissingPermissions { .. } => "missing_permissions",
            Self::MissingRole { .. } => "missing_role",
            Self::MissingAnyRole { .. } => "missing_any_role",
            Self::NoPrivateMessage => "no_private_message",
            Self::PrivateMessageOnly => "private_message_only",
            Self::NsfwChannelRequired { .. } => "nsfw_channel_required",
        }
    }
}

// ============================================================================
// Extension Errors (registration and module loading)
// ============================================================================

/// Registration and module-loading failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtensionError {
    /// A name or alias collides with a sibling in the same parent scope.
    #[error("the {} {name:?} is already an existing command or alias", if *.alias_conflict { "alias" } else { "command" })]
    CommandRegistration { name: String, alias_conflict: bool },

    #[error("parameter {param:?} of command {command} is invalid: {reason}")]
    InvalidParameter {
        command: String,
        param: String,
        reason: String,
    },

    #[error("command {command} is invalid: {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("module {0:?} is already loaded")]
    ModuleAlreadyLoaded(String),

    #[error("module {0:?} has not been loaded")]
    ModuleNotLoaded(String),
}

// ============================================================================
// Reply Errors
// ============================================================================

/// Failure to deliver a reply through the invocation's responder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("reply channel closed")]
    Closed,

    #[error("reply timed out after {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_follow_variant() {
        let missing: CommandError = UserInputError::MissingRequiredArgument {
            param: "n".into(),
        }
        .into();
        assert_eq!(missing.error_code(), "missing_required_argument");
        assert!(missing.is_user_input());

        let check: CommandError = CheckFailure::NotOwner.into();
        assert_eq!(check.error_code(), "not_owner");
        assert!(check.is_check_failure());
    }

    #[test]
    fn parse_errors_are_hard() {
        let err: CommandError = ArgumentParsingError::ExpectedClosingQuote { close_quote: '"' }.into();
        assert!(err.is_hard_parse_error());
        assert_eq!(err.error_code(), "argument_parsing_error");

        let soft: CommandError = UserInputError::BadArgument("nope".into()).into();
        assert!(!soft.is_hard_parse_error());
    }

    #[test]
    fn messages_are_human_readable() {
        let err = ExtensionError::CommandRegistration {
            name: "p".into(),
            alias_conflict: true,
        };
        assert_eq!(err.to_string(), "the alias \"p\" is already an existing command or alias");

        let literal = UserInputError::BadLiteralArgument {
            param: "mode".into(),
            argument: "c".into(),
            literals: vec!["a".into(), "b".into()],
        };
        assert_eq!(literal.to_string(), "could not convert \"mode\" into a, b");
    }

    #[test]
    fn retry_after_only_for_cooldowns() {
        let err = CommandError::DisabledCommand { command: "x".into() };
        assert_eq!(err.retry_after(), None);
    }
}
