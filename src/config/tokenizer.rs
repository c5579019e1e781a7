//! Tokenizer configuration.

use serde::Deserialize;
use slirc_argv::QuoteSet;

/// Quote pairs and escape character used to split arguments.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenizerConfig {
    /// Escape character (default: `\`).
    #[serde(default = "default_escape")]
    pub escape: char,
    /// Extra `[open, close]` quote pairs on top of the standard set.
    #[serde(default)]
    pub extra_quotes: Vec<(char, char)>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            escape: default_escape(),
            extra_quotes: Vec::new(),
        }
    }
}

impl TokenizerConfig {
    /// Build the quote set this configuration describes.
    pub fn quote_set(&self) -> QuoteSet {
        self.extra_quotes
            .iter()
            .fold(QuoteSet::standard(), |set, &(open, close)| set.with_pair(open, close))
            .with_escape(self.escape)
    }
}

fn default_escape() -> char {
    slirc_argv::quotes::DEFAULT_ESCAPE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_standard_set() {
        assert_eq!(TokenizerConfig::default().quote_set(), QuoteSet::standard());
    }

    #[test]
    fn extra_pairs_are_added() {
        let config = TokenizerConfig {
            escape: '^',
            extra_quotes: vec![('<', '>')],
        };
        let quotes = config.quote_set();
        assert_eq!(quotes.closing_for('<'), Some('>'));
        assert_eq!(quotes.closing_for('"'), Some('"'));
        assert_eq!(quotes.escape(), '^');
    }
}
