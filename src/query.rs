//! # Search Query Language
//!
//! A structured search query language with support for:
//! - `key:value` filters, negation (`!key:value`) and value lists
//!   (`key:[a,b]`)
//! - Comparison prefixes (`key:>value`, `>=`, `<`, `<=`)
//! - Function-like keys with parameters (`count_if(col,op,val):>5`)
//! - `AND` / `OR` keywords, parenthesized groups and free text
//! - Per-token validity annotations driven by a filter-key dictionary

pub mod ast;
pub(crate) mod common;
pub mod operators;
pub mod parser;
pub mod validity;
pub mod values;

// Re-exports
pub use ast::*;
pub use common::{Position, decode_value, escape_value, unescape_quoted};
pub use operators::*;
pub use parser::*;
pub use validity::*;
pub use values::*;
