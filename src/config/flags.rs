//! Default flag-group syntax.

use serde::Deserialize;

/// What to do with flags a flag group does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFlags {
    /// Fail with `TooManyFlags`.
    #[default]
    Reject,
    /// Treat them as part of the previous value.
    Ignore,
}

/// Syntax of `name: value` / `--name value` flag groups.
#[derive(Debug, Clone, Deserialize)]
pub struct FlagConfig {
    /// Text before every flag name (default: empty).
    #[serde(default)]
    pub prefix: String,
    /// Text between name and value (default: `:`). Whitespace-only means
    /// the name is followed by a space.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Handling of undeclared flags (default: reject).
    #[serde(default)]
    pub unknown: UnknownFlags,
    /// Match flag names case-insensitively (default: false).
    #[serde(default)]
    pub case_insensitive: bool,
}

impl Default for FlagConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            delimiter: default_delimiter(),
            unknown: UnknownFlags::default(),
            case_insensitive: false,
        }
    }
}

fn default_delimiter() -> String {
    ":".to_string()
}
