//! Quote pairs and the escape character.

use std::sync::OnceLock;

/// Opening and closing quote marks recognised by default.
///
/// ASCII double quotes plus the typographic and CJK variants that phone
/// keyboards and IMEs substitute automatically.
const STANDARD_PAIRS: &[(char, char)] = &[
    ('"', '"'),
    ('\u{2018}', '\u{2019}'), // ‘ ’
    ('\u{201A}', '\u{201B}'), // ‚ ‛
    ('\u{201C}', '\u{201D}'), // “ ”
    ('\u{201E}', '\u{201F}'), // „ ‟
    ('\u{2E42}', '\u{2E42}'), // ⹂ ⹂
    ('\u{300C}', '\u{300D}'), // 「 」
    ('\u{300E}', '\u{300F}'), // 『 』
    ('\u{301D}', '\u{301E}'), // 〝 〞
    ('\u{FE41}', '\u{FE42}'), // ﹁ ﹂
    ('\u{FE43}', '\u{FE44}'), // ﹃ ﹄
    ('\u{FF02}', '\u{FF02}'), // ＂ ＂
    ('\u{FF62}', '\u{FF63}'), // ｢ ｣
    ('\u{00AB}', '\u{00BB}'), // « »
    ('\u{2039}', '\u{203A}'), // ‹ ›
    ('\u{300A}', '\u{300B}'), // 《 》
    ('\u{3008}', '\u{3009}'), // 〈 〉
];

/// Default escape character.
pub const DEFAULT_ESCAPE: char = '\\';

/// The set of quote pairs and the escape character used by a tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteSet {
    pairs: Vec<(char, char)>,
    escape: char,
}

impl QuoteSet {
    /// The standard set: ASCII and smart quotes, backslash escape.
    pub fn standard() -> Self {
        Self {
            pairs: STANDARD_PAIRS.to_vec(),
            escape: DEFAULT_ESCAPE,
        }
    }

    /// A shared instance of [`QuoteSet::standard`].
    pub fn standard_ref() -> &'static QuoteSet {
        static STANDARD: OnceLock<QuoteSet> = OnceLock::new();
        STANDARD.get_or_init(QuoteSet::standard)
    }

    /// A set made of exactly `pairs`, with `escape` as the escape character.
    pub fn new(pairs: impl IntoIterator<Item = (char, char)>, escape: char) -> Self {
        pairs
            .into_iter()
            .fold(Self { pairs: Vec::new(), escape }, |set, (open, close)| set.with_pair(open, close))
    }

    /// Only ASCII double quotes, backslash escape.
    pub fn ascii() -> Self {
        Self {
            pairs: vec![('"', '"')],
            escape: DEFAULT_ESCAPE,
        }
    }

    /// Add an extra quote pair. A pair whose opening mark is already known
    /// replaces the previous closing mark.
    pub fn with_pair(mut self, open: char, close: char) -> Self {
        match self.pairs.iter_mut().find(|(o, _)| *o == open) {
            Some(pair) => pair.1 = close,
            None => self.pairs.push((open, close)),
        }
        self
    }

    /// Replace the escape character.
    pub fn with_escape(mut self, escape: char) -> Self {
        self.escape = escape;
        self
    }

    /// The escape character.
    #[inline]
    pub fn escape(&self) -> char {
        self.escape
    }

    /// The closing mark for `open`, if `open` starts a quoted span.
    #[inline]
    pub fn closing_for(&self, open: char) -> Option<char> {
        self.pairs
            .iter()
            .find_map(|&(o, c)| (o == open).then_some(c))
    }

    /// Whether `c` is any opening or closing quote mark.
    #[inline]
    pub fn is_quote(&self, c: char) -> bool {
        self.pairs.iter().any(|&(o, cl)| o == c || cl == c)
    }
}

impl Default for QuoteSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// Quote `token` so that it tokenizes back to itself with the standard set.
///
/// Tokens that need no quoting are returned unchanged; everything else is
/// wrapped in ASCII double quotes with inner `"` and escape characters
/// escaped.
///
/// ```rust
/// use slirc_argv::{quote, tokenize};
///
/// let line = ["plain", "two words", "say \"hi\""].map(quote).join(" ");
/// assert_eq!(tokenize(&line).unwrap(), vec!["plain", "two words", "say \"hi\""]);
/// ```
pub fn quote(token: &str) -> String {
    quote_with(token, QuoteSet::standard_ref())
}

/// Quote `token` for the given quote set.
///
/// The token is wrapped in the first pair of the set. A set without pairs
/// escapes each whitespace, quote and escape character in place; an empty
/// token cannot be expressed there and comes back empty.
pub fn quote_with(token: &str, quotes: &QuoteSet) -> String {
    let escape = quotes.escape();
    let needs_quoting = token.is_empty()
        || token
            .chars()
            .any(|c| c.is_whitespace() || c == escape || quotes.is_quote(c));

    if !needs_quoting {
        return token.to_string();
    }

    let mut out = String::with_capacity(token.len() + 2);
    let Some(&(open, close)) = quotes.pairs.first() else {
        for c in token.chars() {
            if c.is_whitespace() || c == escape || quotes.is_quote(c) {
                out.push(escape);
            }
            out.push(c);
        }
        return out;
    };

    out.push(open);
    for c in token.chars() {
        if c == escape || c == close {
            out.push(escape);
        }
        out.push(c);
    }
    out.push(close);
    out
}
