//! # Query Lexer
//!
//! Splits a search query string into [`Lexeme`]s. Words are separated by
//! unescaped whitespace; a `"` starts a quoted run that honors backslash
//! escapes, and a `[` directly after a `:` starts a value list in which
//! whitespace does not split. Parentheses at a token boundary are emitted as
//! their own lexemes, while parentheses opened inside a word (function keys
//! such as `count_if(a,b)`) stay part of that word.
use crate::tokenizer::Lexeme;

/// A lexer over the bytes of a search query.
///
/// Every delimiter the lexer cares about is ASCII, so byte offsets taken at
/// delimiters are always valid `char` boundaries of the input `str`.
struct Lexer<'a> {
    /// The input sequence of bytes to tokenize
    input: &'a [u8],
    /// Current position (current byte)
    position: usize,
    /// Current reading position (after current byte)
    read_position: usize,
    /// Current byte under examination
    byte: u8,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        let mut lexer = Self {
            input: input.as_bytes(),
            position: 0,
            read_position: 0,
            byte: 0,
        };
        // put the lexer in an initial working state
        lexer.read_byte();
        lexer
    }

    /// Reads and consumes the next byte in the input sequence.
    fn read_byte(&mut self) {
        if self.read_position >= self.input.len() {
            self.byte = 0;
        } else {
            self.byte = self.input[self.read_position];
        }
        // Advance the positions
        self.position = self.read_position;
        self.read_position += 1;
    }

    /// Returns `true` once every byte of the input has been consumed.
    const fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Returns the byte before the current one, if any.
    fn previous_byte(&self) -> Option<u8> {
        self.position
            .checked_sub(1)
            .and_then(|idx| self.input.get(idx).copied())
    }

    /// Consume whitespace byte(s) starting from the current position.
    fn skip_whitespace(&mut self) {
        while !self.at_end() && self.byte.is_ascii_whitespace() {
            self.read_byte();
        }
    }

    /// Returns the next lexeme in the input sequence from the current
    /// position.
    fn next_lexeme(&mut self) -> Lexeme {
        self.skip_whitespace();

        if self.at_end() {
            return Lexeme::Eof;
        }

        match self.byte {
            b'(' => {
                let pos = self.position;
                self.read_byte();
                Lexeme::LParen(pos)
            }
            b')' => {
                let pos = self.position;
                self.read_byte();
                Lexeme::RParen(pos)
            }
            _ => self.read_word(),
        }
    }

    /// Reads a word up to the next unescaped whitespace (outside of quotes
    /// and value lists) or an unmatched closing parenthesis.
    fn read_word(&mut self) -> Lexeme {
        let start = self.position;
        let mut paren_depth = 0usize;
        let mut bracket_depth = 0usize;

        while !self.at_end() {
            match self.byte {
                b if b.is_ascii_whitespace() && bracket_depth == 0 => break,
                b'(' => paren_depth += 1,
                b')' => {
                    if paren_depth == 0 {
                        break;
                    }
                    paren_depth -= 1;
                }
                b'[' if self.previous_byte() == Some(b':')
                    || bracket_depth > 0 =>
                {
                    bracket_depth += 1;
                }
                b']' if bracket_depth > 0 => bracket_depth -= 1,
                b'"' => {
                    if !self.skip_quoted() {
                        log::trace!("unterminated quote in word at {start}");
                        return Lexeme::Unterminated(start, self.input.len());
                    }
                }
                b'\\' => {
                    // skip the escaped byte so an escaped space or quote
                    // does not end the word
                    self.read_byte();
                    if self.at_end() {
                        break;
                    }
                }
                _ => {}
            }
            self.read_byte();
        }

        Lexeme::Word(start, self.position)
    }

    /// Skips over a quoted run starting at the current `"`. Leaves the lexer
    /// on the closing quote and returns `false` if the quote never closes.
    fn skip_quoted(&mut self) -> bool {
        // Skip opening quote
        self.read_byte();
        while !self.at_end() && self.byte != b'"' {
            // escape sequence with backslash literal
            if self.byte == b'\\' {
                // skip the escaped character to avoid premature termination
                // with `\"`
                self.read_byte();
            }
            self.read_byte();
        }
        !self.at_end()
    }
}

/// Tokenize a search query string into lexemes, terminated by
/// [`Lexeme::Eof`].
#[must_use]
pub fn tokenize(text: &str) -> Vec<Lexeme> {
    let mut lexer = Lexer::new(text);
    let mut lexemes: Vec<Lexeme> = vec![];

    loop {
        let lexeme = lexer.next_lexeme();
        let is_eof = matches!(lexeme, Lexeme::Eof);

        lexemes.push(lexeme);

        if is_eof {
            break;
        }
    }

    lexemes
}
