/*!
# Edit Session

An [`EditSession`] owns the token sequence of one search bar and applies
user edits to it. Each edit works on a copy of the tokens; committing the
copy re-serializes it, re-validates it, pushes the previous tokens onto a
bounded undo stack and notifies [`QueryObserver`]s, but only when the
serialized query actually changed. A single user action commits at most
once.

Focus is either on the free-text input between two tokens or on one part of
a token. Text typed into an input or into a token part accumulates in a
pending buffer until it is confirmed:

```
use sqb::query::ValidityConfig;
use sqb::schema::{FilterKeyDescriptor, FilterKeys};
use sqb::session::EditSession;

let mut keys = FilterKeys::default();
keys.insert(
    "is",
    FilterKeyDescriptor {
        default_value: Some("unresolved".into()),
        ..Default::default()
    },
);

let mut session = EditSession::new(keys, ValidityConfig::default());
session.insert_text("is:");
session.enter();
assert_eq!(session.query(), "is:unresolved");
```
*/
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt::Display;
use std::ops::RangeInclusive;

use crate::config::SearchConfig;
use crate::query::{
    Comparison, Filter, FilterKey, InvalidReason, OperatorChoice, QueryState,
    Token, ValidityConfig, allowed_operators, apply_date_value,
    apply_operator, decode_value, default_comparison, default_filter,
    layout_tokens, normalize_value, parse_date, parse_filter, parse_query,
    serialize_tokens, validate,
};
use crate::recent::{KeyValueStore, MAX_RECENT_SEARCHES, RecentSearches};
use crate::schema::{FilterKeys, HAS_KEY, ValueType};
use crate::suggest::{
    FetchTicket, FetchTracker, Suggestion, SuggestionKind, SuggestionProvider,
    Suggestions, TagValueSource,
};
use crate::tokenizer::{Lexeme, tokenize};

/// Maximum number of snapshots kept for undo.
pub const MAX_UNDO_DEPTH: usize = 100;

/// Part of a token that can hold focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenPart {
    /// Filter key
    Key,
    /// Filter operator
    Operator,
    /// Filter value
    Value,
    /// Parameters of a function key
    Parameters,
    /// Remove button of a filter
    Remove,
    /// The token as a whole (free text, operators, parentheses, or a
    /// filter selected for deletion)
    Whole,
}

/// Where the caret is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Free-text input before the token at this index (or after the last
    /// token when equal to the token count)
    Input(usize),
    /// A part of the token at `index`
    Token {
        /// Token index
        index: usize,
        /// Focused part
        part: TokenPart,
    },
}

/// A contiguous run of selected tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Token the selection started at
    pub anchor: usize,
    /// Token the selection extends to
    pub head: usize,
}

impl Selection {
    /// Selected token indices.
    #[must_use]
    pub fn range(&self) -> RangeInclusive<usize> {
        self.anchor.min(self.head)..=self.anchor.max(self.head)
    }
}

/// Result of an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The query changed and observers were notified
    Committed,
    /// The query did not change; focus, selection or pending text may have
    Unchanged,
    /// The edit was refused and the query keeps its previous value
    Rejected(InvalidReason),
}

/// Receives query events. Every method defaults to doing nothing.
pub trait QueryObserver {
    /// The committed query changed.
    fn on_change(&mut self, _query: &str, _state: &QueryState) {}

    /// The user confirmed the query.
    fn on_search(&mut self, _query: &str, _state: &QueryState) {}

    /// The search bar lost focus.
    fn on_blur(&mut self, _query: &str, _state: &QueryState) {}
}

impl<S: KeyValueStore> QueryObserver for RecentSearches<S> {
    fn on_search(&mut self, query: &str, _state: &QueryState) {
        if let Err(err) = self.record(query) {
            log::warn!("could not record recent search: {err}");
        }
    }
}

/// Destination of copied tokens.
pub trait Clipboard {
    /// Replaces the clipboard contents.
    fn write_text(&mut self, text: &str);
}

/// Source of the current time, used to resolve relative dates.
pub trait Clock {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] reading the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A fixed point in time is a clock that never moves.
impl Clock for DateTime<Utc> {
    fn now(&self) -> DateTime<Utc> {
        *self
    }
}

/// Editing state of one search query.
pub struct EditSession {
    keys: FilterKeys,
    config: ValidityConfig,
    tokens: Vec<Token>,
    query: String,
    valid: bool,
    focus: Focus,
    selection: Option<Selection>,
    pending: String,
    undo: VecDeque<Vec<Token>>,
    observers: Vec<Box<dyn QueryObserver>>,
    clipboard: Option<Box<dyn Clipboard>>,
    clock: Box<dyn Clock>,
    fetches: FetchTracker,
    recent: Vec<String>,
}

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("query", &self.query)
            .field("valid", &self.valid)
            .field("focus", &self.focus)
            .field("selection", &self.selection)
            .field("pending", &self.pending)
            .field("undo_depth", &self.undo.len())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl EditSession {
    /// Empty session over a filter-key dictionary.
    #[must_use]
    pub fn new(keys: FilterKeys, config: ValidityConfig) -> Self {
        Self {
            keys,
            config,
            tokens: vec![],
            query: String::new(),
            valid: true,
            focus: Focus::Input(0),
            selection: None,
            pending: String::new(),
            undo: VecDeque::new(),
            observers: vec![],
            clipboard: None,
            clock: Box::new(SystemClock),
            fetches: FetchTracker::default(),
            recent: vec![],
        }
    }

    /// Empty session configured by a [`SearchConfig`].
    #[must_use]
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.filter_keys(), config.validity.clone())
    }

    /// Starts from `query` without notifying anyone.
    #[must_use]
    pub fn with_query(mut self, query: &str) -> Self {
        self.set_query(query);
        self
    }

    /// Uses `clock` to resolve relative dates.
    #[must_use]
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Copies selected tokens to `clipboard`.
    #[must_use]
    pub fn with_clipboard<C: Clipboard + 'static>(mut self, clipboard: C) -> Self {
        self.clipboard = Some(Box::new(clipboard));
        self
    }

    /// Registers an observer.
    pub fn subscribe<O: QueryObserver + 'static>(&mut self, observer: O) {
        self.observers.push(Box::new(observer));
    }

    /// Recent searches offered with the key suggestions, most recent first.
    pub fn set_recent_searches(&mut self, recent: Vec<String>) {
        self.recent = recent;
    }

    // =========================================================================
    // State
    // =========================================================================

    /// The committed query.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The committed tokens with their validity annotations.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// The filter at `index`, if that token is a filter.
    #[must_use]
    pub fn filter(&self, index: usize) -> Option<&Filter> {
        self.tokens.get(index).and_then(Token::as_filter)
    }

    /// Returns `true` if every token is valid.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Snapshot of the parsed query and its validity.
    #[must_use]
    pub fn state(&self) -> QueryState {
        QueryState {
            parsed_query: self.tokens.clone(),
            query_is_valid: self.valid,
        }
    }

    /// Current focus.
    #[must_use]
    pub const fn focus(&self) -> Focus {
        self.focus
    }

    /// Current selection.
    #[must_use]
    pub const fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Text typed but not yet confirmed.
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Returns `true` if there is something to undo.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// The filter-key dictionary.
    #[must_use]
    pub const fn keys(&self) -> &FilterKeys {
        &self.keys
    }

    fn selected_range(&self) -> Option<RangeInclusive<usize>> {
        self.selection.map(|s| s.range())
    }

    // =========================================================================
    // Committing
    // =========================================================================

    fn commit(&mut self, mut tokens: Vec<Token>) -> EditOutcome {
        let query = layout_tokens(&mut tokens);
        if query == self.query {
            return EditOutcome::Unchanged;
        }
        let previous = std::mem::replace(&mut self.tokens, tokens);
        self.undo.push_back(previous);
        if self.undo.len() > MAX_UNDO_DEPTH {
            self.undo.pop_front();
        }
        self.query = query;
        self.revalidate();
        log::debug!("committed {:?} (valid: {})", self.query, self.valid);
        self.notify_change();
        EditOutcome::Committed
    }

    fn revalidate(&mut self) {
        self.valid = validate(&mut self.tokens, &self.keys, &self.config);
    }

    fn notify_change(&mut self) {
        let state = self.state();
        for observer in &mut self.observers {
            observer.on_change(&self.query, &state);
        }
    }

    fn reject(reason: InvalidReason) -> EditOutcome {
        log::debug!("rejected edit: {reason:?}");
        EditOutcome::Rejected(reason)
    }

    fn update_filter<F>(&mut self, index: usize, edit: F) -> EditOutcome
    where
        F: FnOnce(&mut Filter),
    {
        let mut tokens = self.tokens.clone();
        let Some(filter) = tokens.get_mut(index).and_then(Token::as_filter_mut)
        else {
            return EditOutcome::Unchanged;
        };
        edit(filter);
        self.commit(tokens)
    }

    /// Moves focus without committing, keeping it inside the token range.
    fn place_focus(&mut self, focus: Focus) {
        let len = self.tokens.len();
        let focus = match focus {
            Focus::Input(index) => Focus::Input(index.min(len)),
            Focus::Token { index, .. } if index >= len => Focus::Input(len),
            focus => focus,
        };
        if focus != self.focus {
            self.fetches.invalidate();
        }
        self.focus = focus;
    }

    // =========================================================================
    // Typing
    // =========================================================================

    /// Types `text` at the caret.
    ///
    /// In a free-text input, `key:` immediately starts a filter on that key
    /// with its default value and moves focus to the value, and whitespace
    /// after a complete word confirms the typed text.
    pub fn insert_text(&mut self, text: &str) -> EditOutcome {
        if self.selection.is_some() {
            return self.replace_selection(text);
        }
        match self.focus {
            Focus::Input(index) => {
                self.pending.push_str(text);
                self.settle_input(index)
            }
            Focus::Token {
                part: TokenPart::Key | TokenPart::Value | TokenPart::Parameters,
                ..
            } => {
                self.pending.push_str(text);
                EditOutcome::Unchanged
            }
            Focus::Token { index, .. } => {
                self.place_focus(Focus::Input(index + 1));
                self.pending = text.to_string();
                self.settle_input(index + 1)
            }
        }
    }

    fn settle_input(&mut self, index: usize) -> EditOutcome {
        if let Some(filter) = self.started_filter() {
            self.pending.clear();
            let index = index.min(self.tokens.len());
            let mut tokens = self.tokens.clone();
            tokens.insert(index, Token::filter(filter));
            let outcome = self.commit(tokens);
            self.place_focus(Focus::Token { index, part: TokenPart::Value });
            return outcome;
        }
        if self.pending.ends_with(char::is_whitespace)
            && ends_outside_word(&self.pending)
        {
            return self.commit_input(index);
        }
        EditOutcome::Unchanged
    }

    /// A filter started by typing `key:` into an input.
    fn started_filter(&self) -> Option<Filter> {
        let text = self.pending.trim_start();
        if !text.ends_with(':') || text.contains(char::is_whitespace) {
            return None;
        }
        let typed = parse_filter(text)?;
        if !typed.is_missing_value() || typed.comparison != Comparison::Default
        {
            return None;
        }
        let mut filter = default_filter(&self.keys, typed.key);
        filter.negated = typed.negated;
        Some(filter)
    }

    fn commit_input(&mut self, index: usize) -> EditOutcome {
        let text = std::mem::take(&mut self.pending);
        if text.trim().is_empty() {
            return EditOutcome::Unchanged;
        }
        let mut inserted = parse_query(&text);
        for token in &mut inserted {
            if let Some(filter) = token.as_filter_mut()
                && filter.is_missing_value()
            {
                let value = self.keys.default_value(&filter.key);
                filter.set_values(vec![value]);
            }
        }
        let index = index.min(self.tokens.len());
        let count = inserted.len();
        let mut tokens = self.tokens.clone();
        tokens.splice(index..index, inserted);
        let outcome = self.commit(tokens);
        self.place_focus(Focus::Input(index + count));
        outcome
    }

    /// Confirms the pending text of the focused input or token part.
    ///
    /// Confirming an empty value leaves a filter that already has a value
    /// untouched.
    pub fn commit_pending(&mut self) -> EditOutcome {
        match self.focus {
            Focus::Input(index) => self.commit_input(index),
            Focus::Token { index, part: TokenPart::Value } => {
                let text = std::mem::take(&mut self.pending);
                let outcome = self.set_filter_value(index, &text);
                if outcome == EditOutcome::Committed {
                    self.place_focus(Focus::Input(index + 1));
                }
                outcome
            }
            Focus::Token { index, part: TokenPart::Key } => {
                let text = std::mem::take(&mut self.pending);
                if text.trim().is_empty() {
                    return EditOutcome::Unchanged;
                }
                self.set_filter_key(index, &text)
            }
            Focus::Token { index, part: TokenPart::Parameters } => {
                let text = std::mem::take(&mut self.pending);
                if text.trim().is_empty() {
                    return EditOutcome::Unchanged;
                }
                self.set_filter_parameters(index, &text)
            }
            Focus::Token { .. } => EditOutcome::Unchanged,
        }
    }

    // =========================================================================
    // Filter edits
    // =========================================================================

    /// Sets the value of the filter at `index` from typed text.
    ///
    /// Comma separated text becomes a value list. Typed values are checked
    /// and normalized against the key's type (`7` becomes `7ms` for a
    /// duration, `70%` becomes `0.7` for a percentage); a value that does
    /// not parse is rejected. Empty text fills in the key's default value
    /// when the filter has none and is ignored otherwise.
    pub fn set_filter_value(&mut self, index: usize, text: &str) -> EditOutcome {
        let Some(filter) = self.filter(index) else {
            return EditOutcome::Unchanged;
        };
        let text = text.trim();
        if text.is_empty() {
            if !filter.is_missing_value() {
                log::debug!("ignoring empty value for {}", filter.key);
                return EditOutcome::Unchanged;
            }
            let value = self.keys.default_value(&filter.key);
            return self.update_filter(index, |f| f.set_values(vec![value]));
        }

        if filter.key.name() == HAS_KEY {
            let value = decode_value(text);
            return self.update_filter(index, |f| f.set_values(vec![value]));
        }

        let value_type = self.keys.value_type(&filter.key);
        if value_type == ValueType::Date {
            let Some(date) = parse_date(text) else {
                return Self::reject(InvalidReason::InvalidDate);
            };
            return self.update_filter(index, |f| apply_date_value(f, date));
        }

        let mut values = split_values(text);
        if value_type != ValueType::String {
            match values
                .iter()
                .map(|v| normalize_value(value_type, v))
                .collect::<Result<Vec<_>, _>>()
            {
                Ok(normalized) => values = normalized,
                Err(reason) => return Self::reject(reason),
            }
        }
        self.update_filter(index, |f| f.set_values(values))
    }

    /// Adds `value` to the values of the filter at `index`, or removes it
    /// if present. The last value is never removed.
    pub fn toggle_filter_value(&mut self, index: usize, value: &str) -> EditOutcome {
        self.update_filter(index, |f| {
            let mut values: Vec<String> = f
                .values
                .iter()
                .filter(|v| !v.is_empty())
                .cloned()
                .collect();
            if let Some(position) = values.iter().position(|v| v == value) {
                if values.len() > 1 {
                    values.remove(position);
                }
            } else {
                values.push(value.to_string());
            }
            f.set_values(values);
        })
    }

    /// Applies an operator to the filter at `index`.
    pub fn set_filter_operator(
        &mut self,
        index: usize,
        choice: OperatorChoice,
    ) -> EditOutcome {
        let Some(filter) = self.filter(index) else {
            return EditOutcome::Unchanged;
        };
        if !allowed_operators(&self.keys, &filter.key).contains(&choice) {
            return Self::reject(InvalidReason::OperatorNotAllowed);
        }
        let value_type = self.keys.value_type(&filter.key);
        let now = self.clock.now();
        self.update_filter(index, |f| apply_operator(f, choice, value_type, now))
    }

    /// Replaces the key of the filter at `index`. A key of a different
    /// type resets the operator and value to that type's defaults.
    pub fn set_filter_key(&mut self, index: usize, text: &str) -> EditOutcome {
        let Some(filter) = self.filter(index) else {
            return EditOutcome::Unchanged;
        };
        let Some(key) = parse_filter(&format!("{}:", text.trim()))
            .filter(|f| !f.negated && f.is_missing_value())
            .map(|f| f.key)
        else {
            return Self::reject(InvalidReason::UnsupportedKey);
        };
        if self.config.disallow_unsupported_filters
            && !self.keys.contains(key.name())
        {
            return Self::reject(InvalidReason::UnsupportedKey);
        }

        let same_type =
            self.keys.value_type(&filter.key) == self.keys.value_type(&key);
        self.fetches.invalidate();
        if same_type {
            return self.update_filter(index, |f| f.key = key);
        }
        let fresh = default_filter(&self.keys, key);
        self.update_filter(index, |f| *f = fresh)
    }

    /// Replaces the parameters of the function filter at `index` with the
    /// comma separated `text`. Parameters that change the function's
    /// result type reset the operator and value to that type's defaults.
    pub fn set_filter_parameters(&mut self, index: usize, text: &str) -> EditOutcome {
        let Some(filter) = self.filter(index) else {
            return EditOutcome::Unchanged;
        };
        let FilterKey::Function { name, .. } = &filter.key else {
            return EditOutcome::Unchanged;
        };
        let parameters = if text.trim().is_empty() {
            vec![]
        } else {
            text.split(',').map(|p| p.trim().to_string()).collect()
        };
        let key = FilterKey::function(name.clone(), parameters);
        let before = self.keys.value_type(&filter.key);
        let after = self.keys.value_type(&key);
        if before == after {
            return self.update_filter(index, |f| f.key = key);
        }
        let value = self.keys.default_value(&key);
        self.update_filter(index, |f| {
            f.key = key;
            f.negated = false;
            f.comparison = default_comparison(after);
            f.set_values(vec![value]);
        })
    }

    /// Removes the token at `index` and focuses the input in its place.
    pub fn delete_token(&mut self, index: usize) -> EditOutcome {
        if index >= self.tokens.len() {
            return EditOutcome::Unchanged;
        }
        let mut tokens = self.tokens.clone();
        tokens.remove(index);
        self.selection = None;
        self.pending.clear();
        let outcome = self.commit(tokens);
        self.place_focus(Focus::Input(index));
        outcome
    }

    // =========================================================================
    // Keys
    // =========================================================================

    /// Backspace: deletes the last pending character, or the selection, or
    /// the focused token. In an empty input it focuses the previous token,
    /// so a second backspace deletes it.
    pub fn backspace(&mut self) -> EditOutcome {
        if self.selection.is_some() {
            return self.delete_selection();
        }
        match self.focus {
            Focus::Input(index) => {
                if self.pending.pop().is_none() && index > 0 {
                    self.place_focus(Focus::Token {
                        index: index - 1,
                        part: TokenPart::Whole,
                    });
                }
                EditOutcome::Unchanged
            }
            Focus::Token {
                part: TokenPart::Key | TokenPart::Value | TokenPart::Parameters,
                ..
            } => {
                self.pending.pop();
                EditOutcome::Unchanged
            }
            Focus::Token { index, .. } => self.delete_token(index),
        }
    }

    /// Forward delete: the mirror of [`backspace`](Self::backspace). In an
    /// empty input it focuses the next token.
    pub fn delete(&mut self) -> EditOutcome {
        if self.selection.is_some() {
            return self.delete_selection();
        }
        match self.focus {
            Focus::Input(index) => {
                if self.pending.is_empty() && index < self.tokens.len() {
                    self.place_focus(Focus::Token {
                        index,
                        part: TokenPart::Whole,
                    });
                }
                EditOutcome::Unchanged
            }
            Focus::Token {
                part: TokenPart::Key | TokenPart::Value | TokenPart::Parameters,
                ..
            } => EditOutcome::Unchanged,
            Focus::Token { index, .. } => self.delete_token(index),
        }
    }

    /// Enter: confirms pending text and reports a search.
    pub fn enter(&mut self) -> EditOutcome {
        let outcome = self.commit_pending();
        self.selection = None;

        let query = self.query.trim().to_string();
        if !query.is_empty() {
            self.recent.retain(|q| *q != query);
            self.recent.insert(0, query);
            self.recent.truncate(MAX_RECENT_SEARCHES);
        }
        let state = self.state();
        for observer in &mut self.observers {
            observer.on_search(&self.query, &state);
        }
        outcome
    }

    /// Focus leaves the search bar: confirms pending text and reports a
    /// blur.
    pub fn blur(&mut self) -> EditOutcome {
        let outcome = self.commit_pending();
        self.selection = None;
        let state = self.state();
        for observer in &mut self.observers {
            observer.on_blur(&self.query, &state);
        }
        outcome
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Every focusable position in order: the input before each token,
    /// then the token's parts, and the trailing input.
    fn cells(&self) -> Vec<Focus> {
        let mut cells = vec![];
        for (index, token) in self.tokens.iter().enumerate() {
            cells.push(Focus::Input(index));
            if let Some(filter) = token.as_filter() {
                let mut parts =
                    vec![TokenPart::Key, TokenPart::Operator, TokenPart::Value];
                if matches!(filter.key, FilterKey::Function { .. }) {
                    parts.push(TokenPart::Parameters);
                }
                parts.push(TokenPart::Remove);
                cells.extend(parts.into_iter().map(|part| Focus::Token { index, part }));
            } else {
                cells.push(Focus::Token { index, part: TokenPart::Whole });
            }
        }
        cells.push(Focus::Input(self.tokens.len()));
        cells
    }

    fn move_focus(&mut self, forward: bool) -> EditOutcome {
        let outcome = self.commit_pending();
        self.selection = None;

        let cells = self.cells();
        let current = cells
            .iter()
            .position(|cell| *cell == self.focus)
            .or_else(|| match self.focus {
                Focus::Token { index, .. } => cells.iter().position(|cell| {
                    matches!(cell, Focus::Token { index: i, .. } if *i == index)
                }),
                Focus::Input(_) => None,
            })
            .unwrap_or(cells.len() - 1);
        let next = if forward {
            (current + 1).min(cells.len() - 1)
        } else {
            current.saturating_sub(1)
        };
        self.place_focus(cells[next]);
        outcome
    }

    /// Arrow left: moves focus to the previous input or token part.
    pub fn arrow_left(&mut self) -> EditOutcome {
        self.move_focus(false)
    }

    /// Arrow right: moves focus to the next input or token part.
    pub fn arrow_right(&mut self) -> EditOutcome {
        self.move_focus(true)
    }

    fn move_by_token(&mut self, forward: bool) -> EditOutcome {
        let outcome = self.commit_pending();
        self.selection = None;
        let index = match (self.focus, forward) {
            (Focus::Input(index), true) | (Focus::Token { index, .. }, true) => {
                index + 1
            }
            (Focus::Input(index), false) => index.saturating_sub(1),
            (Focus::Token { index, .. }, false) => index,
        };
        self.place_focus(Focus::Input(index));
        outcome
    }

    /// Word-wise left: jumps to the input before the previous token.
    pub fn word_left(&mut self) -> EditOutcome {
        self.move_by_token(false)
    }

    /// Word-wise right: jumps to the input after the next token.
    pub fn word_right(&mut self) -> EditOutcome {
        self.move_by_token(true)
    }

    /// Moves focus, confirming pending text first.
    pub fn set_focus(&mut self, focus: Focus) -> EditOutcome {
        let outcome = self.commit_pending();
        self.selection = None;
        self.place_focus(focus);
        outcome
    }

    // =========================================================================
    // Selection and clipboard
    // =========================================================================

    /// Selects the tokens between `anchor` and `head`, inclusive.
    pub fn select_range(&mut self, anchor: usize, head: usize) -> EditOutcome {
        let outcome = self.commit_pending();
        let Some(last) = self.tokens.len().checked_sub(1) else {
            return outcome;
        };
        self.selection =
            Some(Selection { anchor: anchor.min(last), head: head.min(last) });
        outcome
    }

    /// Selects every token.
    pub fn select_all(&mut self) -> EditOutcome {
        let last = self.tokens.len().saturating_sub(1);
        self.select_range(0, last)
    }

    /// Drops the selection.
    pub const fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn extend_selection(&mut self, forward: bool) -> EditOutcome {
        let outcome = self.commit_pending();
        let Some(last) = self.tokens.len().checked_sub(1) else {
            return outcome;
        };
        let selection = match self.selection {
            Some(Selection { anchor, head }) => Selection {
                anchor,
                head: if forward { (head + 1).min(last) } else { head.saturating_sub(1) },
            },
            None => {
                let start = match (self.focus, forward) {
                    (Focus::Input(index), true) if index <= last => index,
                    (Focus::Input(index), false) if index > 0 => index - 1,
                    (Focus::Token { index, .. }, _) => index,
                    (Focus::Input(_), _) => return outcome,
                };
                Selection { anchor: start, head: start }
            }
        };
        self.selection = Some(selection);
        outcome
    }

    /// Shift + arrow left.
    pub fn extend_selection_left(&mut self) -> EditOutcome {
        self.extend_selection(false)
    }

    /// Shift + arrow right.
    pub fn extend_selection_right(&mut self) -> EditOutcome {
        self.extend_selection(true)
    }

    /// Removes the selected tokens and leaves `text` pending in their
    /// place. Without a selection this types `text`.
    pub fn replace_selection(&mut self, text: &str) -> EditOutcome {
        let Some(range) = self.selected_range() else {
            return self.insert_text(text);
        };
        let start = *range.start();
        let mut tokens = self.tokens.clone();
        tokens.drain(range);
        self.selection = None;
        self.pending = text.to_string();
        let outcome = self.commit(tokens);
        self.place_focus(Focus::Input(start));
        outcome
    }

    /// Removes the selected tokens.
    pub fn delete_selection(&mut self) -> EditOutcome {
        self.replace_selection("")
    }

    /// Inserts `text` parsed as a query at the caret, replacing the
    /// selection. Inside a token part the text is typed instead.
    pub fn paste(&mut self, text: &str) -> EditOutcome {
        if self.selection.is_none()
            && let Focus::Token {
                part: TokenPart::Key | TokenPart::Value | TokenPart::Parameters,
                ..
            } = self.focus
        {
            self.pending.push_str(text);
            return EditOutcome::Unchanged;
        }

        let mut tokens = self.tokens.clone();
        let index = match (self.selected_range(), self.focus) {
            (Some(range), _) => {
                let start = *range.start();
                tokens.drain(range);
                start
            }
            (None, Focus::Input(index)) => index.min(tokens.len()),
            (None, Focus::Token { index, .. }) => index + 1,
        };
        let text = format!("{}{text}", std::mem::take(&mut self.pending));
        let inserted = parse_query(&text);
        let count = inserted.len();
        tokens.splice(index..index, inserted);
        self.selection = None;
        let outcome = self.commit(tokens);
        self.place_focus(Focus::Input(index + count));
        outcome
    }

    /// Serializes the selected tokens and writes them to the clipboard.
    pub fn copy_selection(&mut self) -> Option<String> {
        let range = self.selected_range()?;
        let text = serialize_tokens(&self.tokens[range]);
        if let Some(clipboard) = self.clipboard.as_mut() {
            clipboard.write_text(&text);
        }
        Some(text)
    }

    /// Copies the selected tokens, then removes them.
    pub fn cut_selection(&mut self) -> Option<String> {
        let text = self.copy_selection()?;
        self.delete_selection();
        Some(text)
    }

    // =========================================================================
    // Whole query
    // =========================================================================

    /// Removes every token. Undoable.
    pub fn clear(&mut self) -> EditOutcome {
        self.pending.clear();
        self.selection = None;
        let outcome = self.commit(vec![]);
        self.place_focus(Focus::Input(0));
        outcome
    }

    /// Restores the tokens before the last commit. Undo itself cannot be
    /// undone.
    pub fn undo(&mut self) -> EditOutcome {
        let Some(previous) = self.undo.pop_back() else {
            log::debug!("nothing to undo");
            return EditOutcome::Unchanged;
        };
        self.tokens = previous;
        self.query = layout_tokens(&mut self.tokens);
        self.revalidate();
        self.pending.clear();
        self.selection = None;
        let focus = self.focus;
        self.place_focus(focus);
        log::debug!("undo to {:?}", self.query);
        self.notify_change();
        EditOutcome::Committed
    }

    /// Replaces the query from outside, without notifying observers and
    /// dropping the undo history.
    pub fn set_query(&mut self, query: &str) {
        self.tokens = parse_query(query);
        self.query = layout_tokens(&mut self.tokens);
        self.revalidate();
        self.undo.clear();
        self.pending.clear();
        self.selection = None;
        let end = self.tokens.len();
        self.place_focus(Focus::Input(end));
    }

    // =========================================================================
    // Suggestions
    // =========================================================================

    /// Menu for the focused position and pending text.
    #[must_use]
    pub fn suggestions(&self) -> Suggestions {
        match self.focus {
            Focus::Input(_) => {
                SuggestionProvider::new(&self.keys, &self.recent).keys(&self.pending)
            }
            Focus::Token { index, part } => {
                let provider = SuggestionProvider::new(&self.keys, &[]);
                let Some(filter) = self.filter(index) else {
                    return Suggestions::default();
                };
                match part {
                    TokenPart::Key => provider.keys(&self.pending),
                    TokenPart::Operator => provider.operators(filter),
                    TokenPart::Value => provider.values(
                        filter,
                        &self.pending,
                        self.fetches.values_for(filter.key.name()),
                    ),
                    TokenPart::Parameters => {
                        provider.parameters(filter, &self.pending)
                    }
                    TokenPart::Remove | TokenPart::Whole => {
                        Suggestions::default()
                    }
                }
            }
        }
    }

    /// Applies a menu item at the focused position.
    pub fn apply_suggestion(&mut self, suggestion: &Suggestion) -> EditOutcome {
        match (suggestion.kind, self.focus) {
            (SuggestionKind::RecentSearch, _) => {
                self.pending.clear();
                self.selection = None;
                let outcome = self.commit(parse_query(&suggestion.value));
                let end = self.tokens.len();
                self.place_focus(Focus::Input(end));
                outcome
            }
            (SuggestionKind::Key, Focus::Input(index)) => {
                self.pending = format!("{}:", suggestion.value);
                self.settle_input(index)
            }
            (
                SuggestionKind::Key,
                Focus::Token { index, part: TokenPart::Key },
            ) => {
                self.pending.clear();
                self.set_filter_key(index, &suggestion.value)
            }
            (SuggestionKind::Operator(choice), Focus::Token { index, .. }) => {
                let outcome = self.set_filter_operator(index, choice);
                if !matches!(outcome, EditOutcome::Rejected(_)) {
                    self.place_focus(Focus::Token {
                        index,
                        part: TokenPart::Value,
                    });
                }
                outcome
            }
            (
                SuggestionKind::Value,
                Focus::Token { index, part: TokenPart::Value },
            ) => {
                self.pending.clear();
                let value = suggestion.value.clone();
                let outcome = match parse_date(&value) {
                    Some(date)
                        if self.filter(index).is_some_and(|f| {
                            self.keys.value_type(&f.key) == ValueType::Date
                        }) =>
                    {
                        self.update_filter(index, |f| apply_date_value(f, date))
                    }
                    _ => self.update_filter(index, |f| f.set_values(vec![value])),
                };
                self.place_focus(Focus::Input(index + 1));
                outcome
            }
            (
                SuggestionKind::Parameter,
                Focus::Token { index, part: TokenPart::Parameters },
            ) => {
                self.pending.clear();
                self.set_filter_parameters(index, &suggestion.value)
            }
            _ => EditOutcome::Unchanged,
        }
    }

    /// Starts a tag-value request for the focused string value, superseding
    /// any outstanding one. Returns `None` when the focused position takes
    /// no fetched values.
    pub fn request_tag_values(&mut self) -> Option<FetchTicket> {
        let Focus::Token { index, part: TokenPart::Value } = self.focus else {
            return None;
        };
        let filter = self.filter(index)?;
        let name = filter.key.name();
        if name == HAS_KEY
            || self.keys.value_type(&filter.key) != ValueType::String
            || self.keys.get(name).is_some_and(|d| d.has_predefined_values())
        {
            return None;
        }
        let name = name.to_string();
        Some(self.fetches.begin(name, self.pending.clone()))
    }

    /// Applies the result of a tag-value request. Returns `false` if the
    /// request was superseded.
    pub fn resolve_tag_values<E: Display>(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<String>, E>,
    ) -> bool {
        self.fetches.resolve(ticket, result)
    }

    /// Requests and resolves tag values from `source` in one step.
    pub fn load_tag_values(&mut self, source: &dyn TagValueSource) -> bool {
        let Some(ticket) = self.request_tag_values() else {
            return false;
        };
        let result = source.tag_values(&ticket.key, &ticket.partial);
        self.resolve_tag_values(&ticket, result)
    }
}

/// Returns `true` if `text` ends with whitespace that is not inside a
/// quoted or bracketed word.
fn ends_outside_word(text: &str) -> bool {
    tokenize(text)
        .iter()
        .rev()
        .find_map(Lexeme::range)
        .is_none_or(|(_, end)| end < text.len())
}

/// Splits typed value text on commas outside quotes. Surrounding list
/// brackets are dropped; brackets inside an item are part of the item.
fn split_values(text: &str) -> Vec<String> {
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(text);

    let mut items = vec![];
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in inner.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                items.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&inner[start..]);

    let values: Vec<String> = items
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(decode_value)
        .collect();
    if values.is_empty() {
        vec![decode_value(inner.trim())]
    } else {
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recent::JsonFileStore;
    use crate::recent::SavedSearchType;
    use crate::schema::{
        FilterKeyDescriptor, FilterKeyKind, FunctionParameter, ParameterKind,
    };
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Change(String),
        Search(String),
        Blur(String),
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<Event>>>);

    impl Recorder {
        fn events(&self) -> Vec<Event> {
            self.0.borrow().clone()
        }

        fn changes(&self) -> usize {
            self.events()
                .iter()
                .filter(|e| matches!(e, Event::Change(_)))
                .count()
        }
    }

    impl QueryObserver for Recorder {
        fn on_change(&mut self, query: &str, _state: &QueryState) {
            self.0.borrow_mut().push(Event::Change(query.to_string()));
        }

        fn on_search(&mut self, query: &str, _state: &QueryState) {
            self.0.borrow_mut().push(Event::Search(query.to_string()));
        }

        fn on_blur(&mut self, query: &str, _state: &QueryState) {
            self.0.borrow_mut().push(Event::Blur(query.to_string()));
        }
    }

    #[derive(Clone, Default)]
    struct MemoryClipboard(Rc<RefCell<String>>);

    impl Clipboard for MemoryClipboard {
        fn write_text(&mut self, text: &str) {
            *self.0.borrow_mut() = text.to_string();
        }
    }

    fn keys() -> FilterKeys {
        let mut keys = FilterKeys::default();
        keys.insert(
            "is",
            FilterKeyDescriptor {
                default_value: Some("unresolved".into()),
                values: vec!["resolved".into(), "unresolved".into()],
                ..Default::default()
            },
        );
        keys.insert(
            "browser.name",
            FilterKeyDescriptor {
                kind: FilterKeyKind::Tag,
                ..Default::default()
            },
        );
        for (name, value_type) in [
            ("transaction.duration", ValueType::Duration),
            ("measurements.cls", ValueType::Number),
            ("failure_rate", ValueType::Percentage),
            ("age", ValueType::Date),
        ] {
            keys.insert(
                name,
                FilterKeyDescriptor {
                    value_type: Some(value_type),
                    ..Default::default()
                },
            );
        }
        keys.insert(
            "p95",
            FilterKeyDescriptor {
                kind: FilterKeyKind::Function,
                parameters: vec![FunctionParameter {
                    name: "column".into(),
                    kind: ParameterKind::Column,
                    column_types: vec![ValueType::Duration, ValueType::Number],
                    options: vec![],
                    default_value: Some("transaction.duration".into()),
                    required: true,
                }],
                parameter_dependent_value_type: Some(0),
                ..Default::default()
            },
        );
        keys
    }

    fn session(query: &str) -> (EditSession, Recorder) {
        let recorder = Recorder::default();
        let mut session = EditSession::new(keys(), ValidityConfig::default())
            .with_query(query)
            .with_clock(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        session.subscribe(recorder.clone());
        (session, recorder)
    }

    fn focus_value(session: &mut EditSession, index: usize) {
        session.set_focus(Focus::Token { index, part: TokenPart::Value });
    }

    #[test]
    fn typing_key_starts_filter_with_default() {
        let (mut session, events) = session("");
        session.insert_text("is:");
        assert_eq!(
            session.focus(),
            Focus::Token { index: 0, part: TokenPart::Value }
        );
        assert_eq!(session.enter(), EditOutcome::Unchanged);
        assert_eq!(session.query(), "is:unresolved");
        assert_eq!(
            events.events(),
            vec![
                Event::Change("is:unresolved".into()),
                Event::Search("is:unresolved".into())
            ]
        );
    }

    #[test]
    fn typed_characters_accumulate_until_whitespace() {
        let (mut session, events) = session("");
        for c in "foo bar".chars() {
            session.insert_text(&c.to_string());
        }
        assert_eq!(session.query(), "foo");
        assert_eq!(session.pending(), "bar");
        assert_eq!(session.focus(), Focus::Input(1));
        session.enter();
        assert_eq!(session.query(), "foo bar");
        assert_eq!(events.changes(), 2);
    }

    #[test]
    fn quoted_text_is_not_split() {
        let (mut session, _) = session("");
        session.insert_text("\"a b ");
        assert_eq!(session.query(), "");
        session.insert_text("c\" ");
        assert_eq!(session.query(), "\"a b c\"");
    }

    #[test]
    fn empty_value_confirm_is_a_no_op() {
        let (mut session, events) = session("browser.name:firefox");
        focus_value(&mut session, 0);
        assert_eq!(session.enter(), EditOutcome::Unchanged);
        assert_eq!(session.query(), "browser.name:firefox");
        assert_eq!(events.changes(), 0);
    }

    #[test]
    fn durations_are_normalized() {
        let (mut session, _) = session("transaction.duration:>10ms");
        focus_value(&mut session, 0);
        session.insert_text("7");
        assert_eq!(session.commit_pending(), EditOutcome::Committed);
        assert_eq!(session.query(), "transaction.duration:>7ms");

        assert_eq!(session.set_filter_value(0, "100s"), EditOutcome::Committed);
        assert_eq!(session.query(), "transaction.duration:>100s");

        assert_eq!(
            session.set_filter_value(0, "abc"),
            EditOutcome::Rejected(InvalidReason::InvalidDuration)
        );
        assert_eq!(session.query(), "transaction.duration:>100s");
    }

    #[test]
    fn percentages_are_normalized() {
        let (mut session, _) = session("failure_rate:>0.5");
        session.set_filter_value(0, "70%");
        assert_eq!(session.query(), "failure_rate:>0.7");
    }

    #[test]
    fn comma_separated_values_become_a_list() {
        let (mut session, _) = session("browser.name:firefox");
        session.set_filter_value(0, "one,two,three,four");
        assert_eq!(session.query(), "browser.name:[one,two,three,four]");
        let summary = session.filter(0).map(Filter::value_summary);
        assert_eq!(
            summary.map(|s| s.to_string()).as_deref(),
            Some("one, two, three +1")
        );

        session.toggle_filter_value(0, "two");
        assert_eq!(session.query(), "browser.name:[one,three,four]");
        session.toggle_filter_value(0, "five");
        assert_eq!(session.query(), "browser.name:[one,three,four,five]");
    }

    #[test]
    fn is_not_negates_filter() {
        let (mut session, events) = session("browser.name:firefox");
        assert_eq!(
            session.set_filter_operator(0, OperatorChoice::IsNot),
            EditOutcome::Committed
        );
        assert_eq!(session.query(), "!browser.name:firefox");

        // same operator again changes nothing
        session.set_filter_operator(0, OperatorChoice::IsNot);
        assert_eq!(events.changes(), 1);

        assert_eq!(
            session.set_filter_operator(0, OperatorChoice::GreaterThan),
            EditOutcome::Rejected(InvalidReason::OperatorNotAllowed)
        );
    }

    #[test]
    fn date_operators_use_clock() {
        let (mut session, _) = session("age:-24h");
        session.set_filter_operator(0, OperatorChoice::IsOnOrAfter);
        assert_eq!(session.query(), "age:>=2024-01-01T00:00:00Z");

        session.set_filter_value(0, "-7d");
        assert_eq!(session.query(), "age:-7d");

        assert_eq!(
            session.set_filter_value(0, "yesterday"),
            EditOutcome::Rejected(InvalidReason::InvalidDate)
        );
    }

    #[test]
    fn undo_after_clear() {
        let (mut session, events) = session("is:unresolved browser.name:firefox");
        session.clear();
        assert_eq!(session.query(), "");
        assert_eq!(session.undo(), EditOutcome::Committed);
        assert_eq!(session.query(), "is:unresolved browser.name:firefox");
        assert_eq!(session.undo(), EditOutcome::Unchanged);
        assert_eq!(events.changes(), 2);
    }

    #[test]
    fn undo_depth_is_bounded() {
        let (mut session, _) = session("measurements.cls:>0");
        for i in 1..=MAX_UNDO_DEPTH + 5 {
            session.set_filter_value(0, &i.to_string());
        }
        let mut undone = 0;
        while session.undo() == EditOutcome::Committed {
            undone += 1;
        }
        assert_eq!(undone, MAX_UNDO_DEPTH);
        assert_eq!(session.query(), "measurements.cls:>5");
    }

    #[test]
    fn set_query_is_silent() {
        let (mut session, events) = session("");
        session.set_query("is:resolved  (a  OR b )");
        assert_eq!(session.query(), "is:resolved (a OR b)");
        assert!(events.events().is_empty());
        assert!(!session.can_undo());
    }

    #[test]
    fn backspace_focuses_then_deletes() {
        let (mut session, _) = session("foo bar");
        assert_eq!(session.focus(), Focus::Input(2));
        session.backspace();
        assert_eq!(
            session.focus(),
            Focus::Token { index: 1, part: TokenPart::Whole }
        );
        assert_eq!(session.backspace(), EditOutcome::Committed);
        assert_eq!(session.query(), "foo");
        assert_eq!(session.focus(), Focus::Input(1));
    }

    #[test]
    fn delete_focuses_next_token() {
        let (mut session, _) = session("foo bar");
        session.set_focus(Focus::Input(0));
        session.delete();
        assert_eq!(session.delete(), EditOutcome::Committed);
        assert_eq!(session.query(), "bar");
    }

    #[test]
    fn arrows_walk_token_parts() {
        let (mut session, _) = session("p95(transaction.duration):>10ms x");
        session.set_focus(Focus::Input(0));
        let mut visited = vec![];
        for _ in 0..8 {
            session.arrow_right();
            visited.push(session.focus());
        }
        let part = |part| Focus::Token { index: 0, part };
        assert_eq!(
            visited,
            vec![
                part(TokenPart::Key),
                part(TokenPart::Operator),
                part(TokenPart::Value),
                part(TokenPart::Parameters),
                part(TokenPart::Remove),
                Focus::Input(1),
                Focus::Token { index: 1, part: TokenPart::Whole },
                Focus::Input(2),
            ]
        );
        session.word_left();
        assert_eq!(session.focus(), Focus::Input(1));
        session.arrow_left();
        assert_eq!(session.focus(), part(TokenPart::Remove));
    }

    #[test]
    fn selection_replace_and_clipboard() {
        let clipboard = MemoryClipboard::default();
        let (session, _) = session("a b c");
        let mut session = session.with_clipboard(clipboard.clone());

        session.set_focus(Focus::Input(1));
        session.extend_selection_right();
        session.extend_selection_right();
        assert_eq!(session.selection().map(|s| s.range()), Some(1..=2));
        assert_eq!(session.copy_selection().as_deref(), Some("b c"));
        assert_eq!(*clipboard.0.borrow(), "b c");

        assert_eq!(session.replace_selection("d"), EditOutcome::Committed);
        assert_eq!(session.query(), "a");
        assert_eq!(session.pending(), "d");
        session.enter();
        assert_eq!(session.query(), "a d");

        session.select_all();
        assert_eq!(session.cut_selection().as_deref(), Some("a d"));
        assert_eq!(session.query(), "");
    }

    #[test]
    fn paste_inserts_parsed_tokens() {
        let (mut session, events) = session("a");
        session.set_focus(Focus::Input(0));
        assert_eq!(
            session.paste("is:resolved OR (b"),
            EditOutcome::Committed
        );
        assert_eq!(session.query(), "is:resolved OR (b a");
        assert!(!session.is_valid());
        assert_eq!(session.focus(), Focus::Input(4));
        assert_eq!(events.changes(), 1);
    }

    #[test]
    fn function_parameters_change_type() {
        let (mut session, _) = session("p95(transaction.duration):>10ms");
        session.set_filter_parameters(0, "measurements.cls");
        assert_eq!(session.query(), "p95(measurements.cls):>100");
    }

    #[test]
    fn key_change_resets_on_type_change() {
        let (mut session, _) = session("!browser.name:firefox");
        session.set_filter_key(0, "is");
        assert_eq!(session.query(), "!is:firefox");
        session.set_filter_key(0, "transaction.duration");
        assert_eq!(session.query(), "transaction.duration:>10ms");
        assert_eq!(
            session.set_filter_key(0, "bad key"),
            EditOutcome::Rejected(InvalidReason::UnsupportedKey)
        );
    }

    #[test]
    fn suggestions_follow_focus() {
        let (mut session, _) = session("is:unresolved");
        session.set_focus(Focus::Token { index: 0, part: TokenPart::Value });
        assert_eq!(session.suggestions().values(), vec!["resolved", "unresolved"]);

        let resolved = session
            .suggestions()
            .iter()
            .find(|s| s.value == "resolved")
            .cloned()
            .expect("suggested");
        session.apply_suggestion(&resolved);
        assert_eq!(session.query(), "is:resolved");
        assert_eq!(session.focus(), Focus::Input(1));

        session.insert_text("brow");
        let key = session.suggestions().get(0).cloned().expect("key");
        assert_eq!(key.value, "browser.name");
        session.apply_suggestion(&key);
        assert_eq!(session.query(), r#"is:resolved browser.name:"""#);
        assert_eq!(
            session.focus(),
            Focus::Token { index: 1, part: TokenPart::Value }
        );
    }

    #[test]
    fn stale_tag_values_are_ignored() {
        let (mut session, _) = session("browser.name:");
        focus_value(&mut session, 0);
        let first = session.request_tag_values().expect("string key");
        session.insert_text("fi");
        let second = session.request_tag_values().expect("string key");

        assert!(!session.resolve_tag_values(&first, Ok::<_, String>(vec!["Safari".into()])));
        assert!(session.resolve_tag_values(&second, Ok::<_, String>(vec!["Firefox".into()])));
        assert_eq!(session.suggestions().values(), vec!["Firefox"]);

        let source = |_: &str, _: &str| -> anyhow::Result<Vec<String>> {
            anyhow::bail!("offline")
        };
        assert!(session.load_tag_values(&source));
        assert!(session.suggestions().is_empty());
    }

    #[test]
    fn searches_are_recorded() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("recent.json");

        let (mut session, events) = session("is:unresolved");
        session.subscribe(RecentSearches::new(
            JsonFileStore::new(&path),
            SavedSearchType::Issue,
        ));
        session.enter();
        session.blur();
        assert_eq!(
            events.events(),
            vec![
                Event::Search("is:unresolved".into()),
                Event::Blur("is:unresolved".into())
            ]
        );

        let recent =
            RecentSearches::new(JsonFileStore::new(&path), SavedSearchType::Issue);
        assert_eq!(recent.list(), vec!["is:unresolved"]);

        session.set_query("");
        let suggestions = session.suggestions();
        assert_eq!(
            suggestions.get(0).map(|s| s.kind),
            Some(SuggestionKind::RecentSearch)
        );
    }

    #[test]
    fn trailing_backslash_value_keeps_next_token() {
        let (mut session, _) = session("path:x other:y");
        assert_eq!(session.set_filter_value(0, r"C:\dir\"), EditOutcome::Committed);
        assert_eq!(session.query(), r#"path:"C:\\dir\\" other:y"#);

        let reparsed = parse_query(session.query());
        assert_eq!(reparsed.len(), 2);
        assert_eq!(
            reparsed[0].as_filter().map(|f| f.values.clone()),
            Some(vec![r"C:\dir\".to_string()])
        );
    }

    #[test]
    fn closing_bracket_inside_list_value() {
        let (mut session, _) = session("browser.name:firefox");
        session.set_filter_value(0, "a]b,c");
        assert_eq!(session.query(), r#"browser.name:["a]b",c]"#);
        assert_eq!(
            session.filter(0).map(|f| f.values.clone()),
            Some(vec!["a]b".to_string(), "c".to_string()])
        );
        assert_eq!(session.tokens().len(), 1);
    }

    #[test]
    fn out_of_range_relative_date() {
        let (mut session, _) = session("age:-4000000000w");
        assert!(!session.state().query_is_valid);
        assert_eq!(
            session.set_filter_value(0, "-99999999999999w"),
            EditOutcome::Rejected(InvalidReason::InvalidDate)
        );

        session.set_filter_operator(0, OperatorChoice::IsOnOrAfter);
        assert_eq!(session.query(), "age:>=2024-01-02T00:00:00Z");
        assert!(session.state().query_is_valid);
    }

    #[test]
    fn search_and_blur_carry_state() {
        #[derive(Clone, Default)]
        struct Validity(Rc<RefCell<Vec<(&'static str, bool, usize)>>>);

        impl QueryObserver for Validity {
            fn on_search(&mut self, _query: &str, state: &QueryState) {
                self.0.borrow_mut().push((
                    "search",
                    state.query_is_valid,
                    state.parsed_query.len(),
                ));
            }

            fn on_blur(&mut self, _query: &str, state: &QueryState) {
                self.0.borrow_mut().push((
                    "blur",
                    state.query_is_valid,
                    state.parsed_query.len(),
                ));
            }
        }

        let (mut session, _) = session("age:yesterday is:resolved");
        let log = Validity::default();
        session.subscribe(log.clone());
        session.enter();
        session.set_query("is:resolved");
        session.blur();
        assert_eq!(
            *log.0.borrow(),
            vec![("search", false, 2), ("blur", true, 1)]
        );
    }

    #[test]
    fn typed_percentage_matches_first_suggestion() {
        let (mut session, _) = session("failure_rate:>0.5");
        focus_value(&mut session, 0);
        session.insert_text("70");
        let first = session.suggestions().get(0).map(|s| s.value.clone());
        assert_eq!(first.as_deref(), Some("70"));

        assert_eq!(session.commit_pending(), EditOutcome::Committed);
        assert_eq!(session.query(), "failure_rate:>70");

        assert_eq!(session.set_filter_value(0, "70%"), EditOutcome::Committed);
        assert_eq!(session.query(), "failure_rate:>0.7");
    }
}
