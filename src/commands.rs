//! Subcommands of the `sqb` binary.
pub mod generate;
pub mod parse;
pub mod script;
pub mod suggest;
