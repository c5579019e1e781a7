//! Prefix and name matching configuration.

use serde::Deserialize;

/// How inbound text is recognised as a command.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Prefixes that address the agent (default: `["!"]`).
    /// An empty list treats the whole text as the command line.
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,
    /// Match command names and aliases case-insensitively (default: false).
    #[serde(default)]
    pub case_insensitive: bool,
    /// Drop events sent by bots (default: true).
    #[serde(default = "default_ignore_bots")]
    pub ignore_bots: bool,
    /// Allow whitespace between the prefix and the command (default: false).
    #[serde(default)]
    pub strip_after_prefix: bool,
    /// Route unknown commands to the global error hook (default: false).
    #[serde(default)]
    pub report_not_found: bool,
    /// User ids that pass the owner check.
    #[serde(default)]
    pub owners: Vec<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            case_insensitive: false,
            ignore_bots: default_ignore_bots(),
            strip_after_prefix: false,
            report_not_found: false,
            owners: Vec::new(),
        }
    }
}

fn default_prefixes() -> Vec<String> {
    vec!["!".to_string()]
}

fn default_ignore_bots() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_correct() {
        let config = DispatchConfig::default();
        assert_eq!(config.prefixes, vec!["!"]);
        assert!(!config.case_insensitive);
        assert!(config.ignore_bots);
        assert!(!config.strip_after_prefix);
        assert!(!config.report_not_found);
        assert!(config.owners.is_empty());
    }

    #[test]
    fn empty_prefix_list_is_kept() {
        let config: DispatchConfig = toml::from_str("prefixes = []").unwrap();
        assert!(config.prefixes.is_empty());
        assert!(config.ignore_bots);
    }
}
