//! Miscellaneous utility functions.

use anyhow::Context as _;
use colored::{ColoredString, Colorize};
use std::io::Write;
use std::io::{self, ErrorKind};

use crate::query::{Filter, Token, TokenKind};
use crate::suggest::Suggestions;

// ==============================================================================
// Colorized Query Output
// ==============================================================================

/// Write the canonical query with syntax highlighting, followed by one line
/// per invalid token. Silently returns `Ok(())` on broken pipe so that
/// piping to tools like `less` or `head` exits cleanly.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn write_colored_query<W: Write>(
    writer: &mut W,
    tokens: &[Token],
) -> anyhow::Result<()> {
    let result = (|| -> io::Result<()> {
        write_tokens(writer, tokens)?;
        writeln!(writer)?;
        for token in tokens {
            if let Some(invalid) = &token.invalid {
                writeln!(
                    writer,
                    "  {} {}: {}",
                    format!(
                        "{}..{}",
                        token.position.start, token.position.end
                    )
                    .dimmed(),
                    token.to_string().red(),
                    invalid.message
                )?;
            }
        }
        Ok(())
    })();
    ignore_broken_pipe(result).context("write colorized query to stdout")
}

/// Write a suggestion menu, one item per line under its section header.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn write_suggestions<W: Write>(
    writer: &mut W,
    suggestions: &Suggestions,
) -> anyhow::Result<()> {
    let result = (|| -> io::Result<()> {
        for section in &suggestions.sections {
            if let Some(label) = &section.label {
                writeln!(writer, "{}", label.bold().magenta())?;
            }
            for item in &section.items {
                write!(writer, "  {}", item.value.green())?;
                if item.label != item.value {
                    write!(writer, " {}", item.label.dimmed())?;
                }
                if let Some(description) = &item.description {
                    write!(writer, " {}", description.dimmed())?;
                }
                writeln!(writer)?;
            }
        }
        Ok(())
    })();
    ignore_broken_pipe(result).context("write suggestions to stdout")
}

fn ignore_broken_pipe(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// Write tokens separated the way the canonical query separates them.
fn write_tokens<W: Write>(writer: &mut W, tokens: &[Token]) -> io::Result<()> {
    let mut end = 0;
    for token in tokens {
        // positions come from the canonical layout, so gaps are spaces
        if token.position.start > end {
            write!(writer, "{:width$}", "", width = token.position.start - end)?;
        }
        let colored = colorize(token);
        if token.is_valid() {
            write!(writer, "{colored}")?;
        } else {
            write!(writer, "{}", colored.underline())?;
        }
        end = token.position.end;
    }
    Ok(())
}

fn colorize(token: &Token) -> ColoredString {
    match &token.kind {
        TokenKind::FreeText { text } => text.normal(),
        TokenKind::Filter(filter) => colorize_filter(filter),
        TokenKind::LogicalOp { text, .. } => text.magenta().bold(),
        TokenKind::Paren { .. } => token.to_string().dimmed(),
    }
}

fn colorize_filter(filter: &Filter) -> ColoredString {
    let negation = if filter.negated { "!".red().to_string() } else { String::new() };
    format!(
        "{negation}{}:{}{}",
        filter.key.to_string().cyan(),
        filter.comparison.symbol().yellow(),
        filter.value_text().green()
    )
    .normal()
}
