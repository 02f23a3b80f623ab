//! # Query Lexeme
//!
//! Defines the untyped spans produced by lexing a search query string.
use std::fmt::Display;

/// Represents a span of a raw search query.
///
/// NOTE: all positions are byte offsets into the input string. Ranges are
/// half-open (`start..end`) so they can be used to slice the input directly.
#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub enum Lexeme {
    /// Opening parenthesis at a token boundary
    LParen(usize),

    /// Closing parenthesis that does not close a paren opened inside a word
    RParen(usize),

    /// Whitespace-delimited word, quote/bracket aware
    Word(usize, usize),

    /// Word containing a `"` that is never closed; always runs to the end of
    /// the input
    Unterminated(usize, usize),

    /// End of input
    Eof,
}

impl Lexeme {
    /// Returns the byte range covered by the lexeme, if any.
    #[must_use]
    pub const fn range(&self) -> Option<(usize, usize)> {
        match *self {
            Self::LParen(pos) | Self::RParen(pos) => Some((pos, pos + 1)),
            Self::Word(start, end) | Self::Unterminated(start, end) => {
                Some((start, end))
            }
            Self::Eof => None,
        }
    }

    /// Returns the text covered by the lexeme in `input`.
    #[must_use]
    pub fn text<'a>(&self, input: &'a str) -> &'a str {
        self.range().map_or("", |(start, end)| &input[start..end])
    }
}

impl Display for Lexeme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LParen(_) => write!(f, "("),
            Self::RParen(_) => write!(f, ")"),
            Self::Word(start, end) => write!(f, "[{start}..{end}]"),
            Self::Unterminated(start, end) => {
                write!(f, "unterminated[{start}..{end}]")
            }
            Self::Eof => write!(f, ""),
        }
    }
}
