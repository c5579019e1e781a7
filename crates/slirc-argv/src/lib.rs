//! # slirc-argv
//!
//! Argument tokenizer for chat command lines.
//!
//! Splits the text that follows a command name into whitespace-delimited
//! tokens. A token may be wrapped in any configured pair of quote marks
//! (including the typographic "smart quote" variants that mobile keyboards
//! insert), in which case inner whitespace is kept verbatim. The escape
//! character (a backslash by default) makes the next character literal, so a
//! quoted span can contain its own closing quote.
//!
//! ## Quick Start
//!
//! ```rust
//! use slirc_argv::tokenize;
//!
//! let tokens = tokenize(r#"add "two words" \"raw\""#).unwrap();
//! assert_eq!(tokens, vec!["add", "two words", "\"raw\""]);
//! ```
//!
//! The [`StringView`] cursor underlies [`tokenize`] and is what the
//! argument binder uses directly: it can be rewound to any earlier position,
//! and can hand over the untouched remainder of the line for parameters that
//! consume the rest of the input.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod quotes;
pub mod view;

pub use error::ArgumentParsingError;
pub use quotes::{QuoteSet, quote, quote_with};
pub use view::{StringView, Tokenizer};

/// Tokenize `text` with the standard quote set.
pub fn tokenize(text: &str) -> Result<Vec<String>, ArgumentParsingError> {
    Tokenizer::new(StringView::new(text)).collect()
}

/// Tokenize `text` with a custom quote set.
pub fn tokenize_with(text: &str, quotes: &QuoteSet) -> Result<Vec<String>, ArgumentParsingError> {
    Tokenizer::new(StringView::with_quotes(text, quotes)).collect()
}
