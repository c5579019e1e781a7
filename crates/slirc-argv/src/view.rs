//! Rewindable cursor over a command line.

use crate::error::ArgumentParsingError;
use crate::quotes::QuoteSet;

/// A cursor over the argument text of a single invocation.
///
/// The cursor only moves forward while reading, but its position can be saved
/// with [`StringView::index`] and restored with [`StringView::set_index`], so
/// a failed conversion can give its token back to the next parameter.
#[derive(Debug, Clone)]
pub struct StringView<'a> {
    buffer: &'a str,
    quotes: &'a QuoteSet,
    index: usize,
    previous: usize,
}

impl<'a> StringView<'a> {
    /// A view over `buffer` using the standard quote set.
    pub fn new(buffer: &'a str) -> Self {
        Self::with_quotes(buffer, QuoteSet::standard_ref())
    }

    /// A view over `buffer` using a custom quote set.
    pub fn with_quotes(buffer: &'a str, quotes: &'a QuoteSet) -> Self {
        Self {
            buffer,
            quotes,
            index: 0,
            previous: 0,
        }
    }

    /// The whole underlying text.
    #[inline]
    pub fn buffer(&self) -> &'a str {
        self.buffer
    }

    /// Current byte offset.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Rewind (or fast-forward) to a byte offset previously returned by
    /// [`StringView::index`].
    #[inline]
    pub fn set_index(&mut self, index: usize) {
        debug_assert!(self.buffer.is_char_boundary(index));
        self.index = index.min(self.buffer.len());
    }

    /// Rewind to where the last word started.
    #[inline]
    pub fn undo(&mut self) {
        self.index = self.previous;
    }

    /// Whether nothing is left to read.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.index >= self.buffer.len()
    }

    /// The unread text, without moving the cursor.
    #[inline]
    pub fn remaining(&self) -> &'a str {
        &self.buffer[self.index..]
    }

    /// Skip whitespace. Returns `true` if anything was skipped.
    pub fn skip_ws(&mut self) -> bool {
        let rest = self.remaining();
        let trimmed = rest.trim_start();
        let skipped = rest.len() - trimmed.len();
        self.index += skipped;
        skipped > 0
    }

    /// Consume and return all unread text verbatim, quotes included.
    pub fn read_rest(&mut self) -> &'a str {
        let rest = self.remaining();
        self.previous = self.index;
        self.index = self.buffer.len();
        rest
    }

    /// Read the next whitespace-delimited word without interpreting quotes.
    pub fn get_word(&mut self) -> &'a str {
        self.skip_ws();
        self.previous = self.index;
        let rest = self.remaining();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        self.index += end;
        &rest[..end]
    }

    /// Read the next token, honouring quotes and escapes.
    ///
    /// Returns `Ok(None)` when the view is exhausted.
    pub fn get_quoted_word(&mut self) -> Result<Option<String>, ArgumentParsingError> {
        self.skip_ws();
        self.previous = self.index;

        let Some(first) = self.peek_char() else {
            return Ok(None);
        };

        let close = self.quotes.closing_for(first);
        if close.is_some() {
            self.bump(first);
        }

        let escape = self.quotes.escape();
        let mut out = String::new();

        loop {
            let Some(c) = self.next_char() else {
                return match close {
                    Some(close_quote) => Err(ArgumentParsingError::ExpectedClosingQuote { close_quote }),
                    None => Ok(Some(out)),
                };
            };

            if c == escape {
                match self.next_char() {
                    Some(escaped) => out.push(escaped),
                    None => match close {
                        Some(close_quote) => {
                            return Err(ArgumentParsingError::ExpectedClosingQuote { close_quote });
                        }
                        // A trailing escape outside quotes is kept literally
                        None => {
                            out.push(c);
                            return Ok(Some(out));
                        }
                    },
                }
                continue;
            }

            match close {
                Some(close_quote) if c == close_quote => {
                    return match self.peek_char() {
                        Some(found) if !found.is_whitespace() => {
                            Err(ArgumentParsingError::InvalidEndOfQuotedString { found })
                        }
                        _ => Ok(Some(out)),
                    };
                }
                Some(_) => out.push(c),
                None if c.is_whitespace() => {
                    // Leave the separator for the next read
                    self.index -= c.len_utf8();
                    return Ok(Some(out));
                }
                None if self.quotes.is_quote(c) => {
                    return Err(ArgumentParsingError::UnexpectedQuote { quote: c });
                }
                None => out.push(c),
            }
        }
    }

    #[inline]
    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    #[inline]
    fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.bump(c);
        Some(c)
    }

    #[inline]
    fn bump(&mut self, c: char) {
        self.index += c.len_utf8();
    }
}

/// Lazy iterator of tokens over a [`StringView`].
///
/// Yields at most one error, after which it is exhausted. Restart it by
/// building a new tokenizer over a view rewound with
/// [`StringView::set_index`].
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    view: StringView<'a>,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    /// Tokenize from the view's current position.
    pub fn new(view: StringView<'a>) -> Self {
        Self { view, failed: false }
    }

    /// Give back the underlying view.
    pub fn into_view(self) -> StringView<'a> {
        self.view
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<String, ArgumentParsingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.view.get_quoted_word() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
