/*!
`session` subcommand: replays an edit script against an [`EditSession`].

One command per line; blank lines and lines starting with `#` are skipped.

| Command                         | Effect                                      |
|---------------------------------|---------------------------------------------|
| `type <text>`                   | types text (trailing spaces are kept)       |
| `space`                         | types a single space                        |
| `paste <text>`                  | pastes text                                 |
| `enter`, `blur`                 | confirms pending text / leaves the bar      |
| `backspace`, `delete`           | deletes backwards / forwards                |
| `left`, `right`                 | moves focus one position                    |
| `word-left`, `word-right`       | moves focus one token                       |
| `shift-left`, `shift-right`     | extends the selection                       |
| `select <from> <to>`            | selects a token range                       |
| `select-all`, `copy`, `cut`     | selection and clipboard                     |
| `undo`, `clear`                 | undoes the last commit / clears the query   |
| `focus input <i>`               | focuses the input before token `i`          |
| `focus <i> <part>`              | focuses `key`, `operator`, `value`, ... of token `i` |
| `operator <i> <label>`          | applies an operator (`is not`, `>=`, ...)   |
| `value <i> <text>`              | sets a filter value                         |
| `toggle <i> <value>`            | adds or removes one value of a filter       |
| `key <i> <key>`                 | replaces a filter key                       |
| `params <i> <text>`             | replaces function parameters                |
| `query <text>`                  | replaces the query without events           |
| `suggest`                       | prints the current menu                     |
| `apply <n>`                     | applies the `n`th item of the current menu  |
| `show`                          | prints the query and its invalid tokens     |

Every change, search and blur is printed as `change: <query>`,
`search: <query>` or `blur: <query>`; refused edits as
`rejected: <reason>`.
*/
use anyhow::{Context, Result, anyhow, bail};
use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::rc::Rc;

use crate::query::{OperatorChoice, QueryState};
use crate::session::{
    EditOutcome, EditSession, Focus, QueryObserver, TokenPart,
};
use crate::utils::{write_colored_query, write_suggestions};

/// Collects query events for printing.
#[derive(Clone, Default)]
struct EventLog(Rc<RefCell<Vec<String>>>);

impl EventLog {
    fn drain(&self) -> Vec<String> {
        self.0.borrow_mut().drain(..).collect()
    }
}

impl QueryObserver for EventLog {
    fn on_change(&mut self, query: &str, _state: &QueryState) {
        self.0.borrow_mut().push(format!("change: {query}"));
    }

    fn on_search(&mut self, query: &str, _state: &QueryState) {
        self.0.borrow_mut().push(format!("search: {query}"));
    }

    fn on_blur(&mut self, query: &str, _state: &QueryState) {
        self.0.borrow_mut().push(format!("blur: {query}"));
    }
}

/// One parsed script line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Type(String),
    Paste(String),
    Enter,
    Blur,
    Backspace,
    Delete,
    Left,
    Right,
    WordLeft,
    WordRight,
    ShiftLeft,
    ShiftRight,
    Select(usize, usize),
    SelectAll,
    Copy,
    Cut,
    Undo,
    Clear,
    Focus(Focus),
    Operator(usize, OperatorChoice),
    Value(usize, String),
    Toggle(usize, String),
    Key(usize, String),
    Params(usize, String),
    Query(String),
    Suggest,
    Apply(usize),
    Show,
}

fn parse_index(text: &str) -> Result<usize> {
    text.trim()
        .parse()
        .with_context(|| format!("expected a token index, got {text:?}"))
}

/// Split `<index> <rest>`.
fn indexed(args: &str) -> Result<(usize, String)> {
    let (index, rest) = args
        .trim_start()
        .split_once(' ')
        .ok_or_else(|| anyhow!("expected `<index> <text>`"))?;
    Ok((parse_index(index)?, rest.to_string()))
}

fn parse_part(text: &str) -> Result<TokenPart> {
    Ok(match text.trim() {
        "key" => TokenPart::Key,
        "operator" => TokenPart::Operator,
        "value" => TokenPart::Value,
        "params" | "parameters" => TokenPart::Parameters,
        "remove" => TokenPart::Remove,
        "token" | "whole" => TokenPart::Whole,
        other => bail!("unknown token part {other:?}"),
    })
}

fn parse_step(line: &str) -> Result<Step> {
    let (name, args) = line.split_once(' ').unwrap_or((line, ""));
    Ok(match name {
        "type" => Step::Type(args.to_string()),
        "space" => Step::Type(" ".into()),
        "paste" => Step::Paste(args.to_string()),
        "enter" => Step::Enter,
        "blur" => Step::Blur,
        "backspace" => Step::Backspace,
        "delete" => Step::Delete,
        "left" => Step::Left,
        "right" => Step::Right,
        "word-left" => Step::WordLeft,
        "word-right" => Step::WordRight,
        "shift-left" => Step::ShiftLeft,
        "shift-right" => Step::ShiftRight,
        "select" => {
            let (from, to) = indexed(args)?;
            Step::Select(from, parse_index(&to)?)
        }
        "select-all" => Step::SelectAll,
        "copy" => Step::Copy,
        "cut" => Step::Cut,
        "undo" => Step::Undo,
        "clear" => Step::Clear,
        "focus" => match args.trim().split_once(' ') {
            Some(("input", index)) => Step::Focus(Focus::Input(parse_index(index)?)),
            Some((index, part)) => Step::Focus(Focus::Token {
                index: parse_index(index)?,
                part: parse_part(part)?,
            }),
            None => bail!("expected `focus input <i>` or `focus <i> <part>`"),
        },
        "operator" => {
            let (index, label) = indexed(args)?;
            let choice = OperatorChoice::from_label(&label)
                .ok_or_else(|| anyhow!("unknown operator {label:?}"))?;
            Step::Operator(index, choice)
        }
        "value" => {
            let (index, text) = indexed(args)?;
            Step::Value(index, text)
        }
        "toggle" => {
            let (index, text) = indexed(args)?;
            Step::Toggle(index, text)
        }
        "key" => {
            let (index, text) = indexed(args)?;
            Step::Key(index, text)
        }
        "params" => {
            let (index, text) = indexed(args)?;
            Step::Params(index, text)
        }
        "query" => Step::Query(args.to_string()),
        "suggest" => Step::Suggest,
        "apply" => Step::Apply(parse_index(args)?),
        "show" => Step::Show,
        other => bail!("unknown command {other:?}"),
    })
}

fn run_step<W: Write>(
    session: &mut EditSession,
    step: Step,
    writer: &mut W,
) -> Result<EditOutcome> {
    Ok(match step {
        Step::Type(text) => session.insert_text(&text),
        Step::Paste(text) => session.paste(&text),
        Step::Enter => session.enter(),
        Step::Blur => session.blur(),
        Step::Backspace => session.backspace(),
        Step::Delete => session.delete(),
        Step::Left => session.arrow_left(),
        Step::Right => session.arrow_right(),
        Step::WordLeft => session.word_left(),
        Step::WordRight => session.word_right(),
        Step::ShiftLeft => session.extend_selection_left(),
        Step::ShiftRight => session.extend_selection_right(),
        Step::Select(from, to) => session.select_range(from, to),
        Step::SelectAll => session.select_all(),
        Step::Copy | Step::Cut => {
            let text = if step == Step::Copy {
                session.copy_selection()
            } else {
                session.cut_selection()
            };
            if let Some(text) = text {
                writeln!(writer, "copied: {text}")?;
            }
            EditOutcome::Unchanged
        }
        Step::Undo => session.undo(),
        Step::Clear => session.clear(),
        Step::Focus(focus) => session.set_focus(focus),
        Step::Operator(index, choice) => session.set_filter_operator(index, choice),
        Step::Value(index, text) => session.set_filter_value(index, &text),
        Step::Toggle(index, value) => session.toggle_filter_value(index, &value),
        Step::Key(index, key) => session.set_filter_key(index, &key),
        Step::Params(index, text) => session.set_filter_parameters(index, &text),
        Step::Query(text) => {
            session.set_query(&text);
            EditOutcome::Unchanged
        }
        Step::Suggest => {
            write_suggestions(writer, &session.suggestions())?;
            EditOutcome::Unchanged
        }
        Step::Apply(n) => {
            let suggestion = session
                .suggestions()
                .get(n)
                .cloned()
                .ok_or_else(|| anyhow!("no suggestion #{n}"))?;
            session.apply_suggestion(&suggestion)
        }
        Step::Show => {
            write_colored_query(writer, session.tokens())?;
            EditOutcome::Unchanged
        }
    })
}

/// Replay every line of `script` against `session`, writing events and
/// command output to `writer`.
///
/// # Errors
///
/// Returns an error naming the line if a command cannot be parsed or
/// applied, or if reading or writing fails.
pub fn run_script<R: BufRead, W: Write>(
    session: &mut EditSession,
    script: R,
    writer: &mut W,
) -> Result<()> {
    let events = EventLog::default();
    session.subscribe(events.clone());

    for (number, line) in script.lines().enumerate() {
        let line = line.context("read script")?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let step = parse_step(line.trim_start())
            .with_context(|| format!("line {}: {line:?}", number + 1))?;
        log::trace!("step {step:?}");
        let outcome = run_step(session, step, writer)
            .with_context(|| format!("line {}: {line:?}", number + 1))?;

        for event in events.drain() {
            writeln!(writer, "{event}")?;
        }
        if let EditOutcome::Rejected(reason) = outcome {
            writeln!(writer, "rejected: {reason:?}")?;
        }
    }
    Ok(())
}
