//! `suggest` subcommand.
use anyhow::Result;
use std::io::Write;

use crate::session::{EditSession, Focus};
use crate::utils::write_suggestions;

/// Focus `focus` in `session`, type `partial` there and write the menu
/// that results, as text or JSON.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn suggest<W: Write>(
    writer: &mut W,
    session: &mut EditSession,
    focus: Focus,
    partial: &str,
    json: bool,
) -> Result<()> {
    session.set_focus(focus);
    if !partial.is_empty() {
        session.insert_text(partial);
    }
    log::debug!("suggesting at {:?} for {partial:?}", session.focus());

    let suggestions = session.suggestions();
    if json {
        serde_json::to_writer_pretty(&mut *writer, &suggestions)?;
        writeln!(writer)?;
    } else {
        write_suggestions(writer, &suggestions)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ValidityConfig;
    use crate::schema::{FilterKeyDescriptor, FilterKeys, ValueType};
    use crate::session::TokenPart;

    #[test]
    fn value_menu_as_json() {
        let mut keys = FilterKeys::default();
        keys.insert(
            "transaction.duration",
            FilterKeyDescriptor {
                value_type: Some(ValueType::Duration),
                ..Default::default()
            },
        );
        let mut session = EditSession::new(keys, ValidityConfig::default())
            .with_query("transaction.duration:>10ms");

        let mut out = Vec::new();
        suggest(
            &mut out,
            &mut session,
            Focus::Token { index: 0, part: TokenPart::Value },
            "3",
            true,
        )
        .expect("suggest");

        let menu: serde_json::Value =
            serde_json::from_slice(&out).expect("valid JSON");
        let items = &menu["sections"][0]["items"];
        assert_eq!(items[0]["value"], "3ms");
        assert_eq!(items[0]["label"], "3 milliseconds");
        assert_eq!(items[0]["kind"], "value");
    }
}
