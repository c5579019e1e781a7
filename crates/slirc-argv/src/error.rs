//! Tokenizer errors.

use thiserror::Error;

/// Hard parse failures raised while splitting a command line.
///
/// These are never recoverable by trying another converter: the input itself
/// is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ArgumentParsingError {
    /// A quote mark appeared inside a word that was not opened with a quote.
    #[error("unexpected quote mark, {quote:?}, in non-quoted string")]
    UnexpectedQuote {
        /// The offending quote character.
        quote: char,
    },

    /// A closing quote was followed by something other than whitespace.
    #[error("expected space after closing quotation but received {found:?}")]
    InvalidEndOfQuotedString {
        /// The character found directly after the closing quote.
        found: char,
    },

    /// Input ended while a quoted span was still open.
    #[error("expected closing {close_quote}")]
    ExpectedClosingQuote {
        /// The quote character that would have closed the span.
        close_quote: char,
    },
}
