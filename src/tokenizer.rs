//! # Tokenizer/ Lexer
//!
//! Splits a raw search query string into a flat sequence of untyped spans
//! (words, parentheses) that the query parser later classifies.
pub mod lexer;
pub mod token;

// Re-exports
pub use lexer::tokenize;
pub use token::Lexeme;
