//! `parse` and `format` subcommands.
use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use crate::query::{
    QueryState, ValidityConfig, layout_tokens, parse_query, validate,
};
use crate::schema::FilterKeys;
use crate::utils::write_colored_query;

/// JSON output of `parse --json`.
#[derive(Serialize)]
struct ParseReport<'a> {
    query: &'a str,
    #[serde(flatten)]
    state: &'a QueryState,
}

/// Parse and validate `query`, then write its canonical form with the
/// invalid tokens (or the whole annotated token list as JSON). Returns
/// whether the query is valid.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn parse<W: Write>(
    writer: &mut W,
    query: &str,
    keys: &FilterKeys,
    config: &ValidityConfig,
    json: bool,
) -> Result<bool> {
    let mut tokens = parse_query(query);
    let canonical = layout_tokens(&mut tokens);
    let query_is_valid = validate(&mut tokens, keys, config);
    log::debug!("{canonical:?} is {}", if query_is_valid { "valid" } else { "invalid" });

    if json {
        let state = QueryState { parsed_query: tokens, query_is_valid };
        let report = ParseReport { query: &canonical, state: &state };
        serde_json::to_writer_pretty(&mut *writer, &report)?;
        writeln!(writer)?;
    } else {
        write_colored_query(writer, &tokens)?;
    }
    Ok(query_is_valid)
}

/// Write the canonical form of `query`.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn format<W: Write>(writer: &mut W, query: &str) -> Result<()> {
    let mut tokens = parse_query(query);
    writeln!(writer, "{}", layout_tokens(&mut tokens))?;
    Ok(())
}
