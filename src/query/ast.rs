/*!
# Query Token Model

Defines the in-memory representation of a parsed search query: a flat,
ordered list of [`Token`]s (free text, filters, logical operators and
parentheses), each carrying its position in the canonical query string and
its validity annotation.

# Examples

Tokens serialize back into query text through [`Display`]:

```
use sqb::query::{Comparison, Filter, Token};
let filter = Filter::new("browser.name").negated().value("firefox");
assert_eq!(Token::filter(filter).to_string(), "!browser.name:firefox");

let filter = Filter::new("transaction.duration")
    .comparison(Comparison::GreaterThan)
    .value("100ms");
assert_eq!(filter.to_string(), "transaction.duration:>100ms");
```

A whole query can be parsed from a raw string and printed in canonical form:

```
use sqb::query::ParsedQuery;
let query: ParsedQuery = "(a:b   OR  c)  free".parse().unwrap();
assert_eq!(query.to_string(), "(a:b OR c) free");
```
*/
use serde::Serialize;
use std::{convert::Infallible, fmt::Display, str::FromStr};

use super::{InvalidReason, Position, escape_value, parse_query};

/// Number of values rendered by [`Filter::value_summary`] before collapsing
/// the rest into a `+N` indicator.
pub const MAX_SUMMARY_VALUES: usize = 3;

/// Comparison prefix written between the `:` and the value of a filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Plain `key:value`
    #[default]
    Default,
    /// `key:>value`
    GreaterThan,
    /// `key:>=value`
    GreaterThanOrEqual,
    /// `key:<value`
    LessThan,
    /// `key:<=value`
    LessThanOrEqual,
}

impl Comparison {
    /// Query-string prefix of the comparison.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Default => "",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
        }
    }

    /// Parses a comparison prefix, returning `None` for unknown symbols.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "" => Some(Self::Default),
            ">" => Some(Self::GreaterThan),
            ">=" => Some(Self::GreaterThanOrEqual),
            "<" => Some(Self::LessThan),
            "<=" => Some(Self::LessThanOrEqual),
            _ => None,
        }
    }
}

/// Key of a filter: either a plain key (`browser.name`) or a function call
/// with parameters (`count_if(transaction.duration,greater,300)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterKey {
    /// Plain key
    Simple {
        /// Key name
        name: String,
    },
    /// Function-like key carrying an ordered parameter list
    Function {
        /// Function name
        name: String,
        /// Parameters, in order
        parameters: Vec<String>,
    },
}

impl FilterKey {
    /// Helper for ergonomic construction of plain keys
    pub fn simple<T: Into<String>>(name: T) -> Self {
        Self::Simple { name: name.into() }
    }

    /// Helper for ergonomic construction of function keys
    pub fn function<T: Into<String>>(name: T, parameters: Vec<String>) -> Self {
        Self::Function { name: name.into(), parameters }
    }

    /// Name used to look the key up in the filter-key dictionary.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Simple { name } | Self::Function { name, .. } => name,
        }
    }

    /// Function parameters; empty for plain keys.
    #[must_use]
    pub fn parameters(&self) -> &[String] {
        match self {
            Self::Simple { .. } => &[],
            Self::Function { parameters, .. } => parameters,
        }
    }

    /// Parameters joined the way they are edited: `a,b,c`.
    #[must_use]
    pub fn parameters_text(&self) -> String {
        self.parameters().join(",")
    }
}

impl Display for FilterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple { name } => write!(f, "{name}"),
            Self::Function { name, parameters } => {
                write!(f, "{name}({})", parameters.join(","))
            }
        }
    }
}

/// A `key:value` shaped token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    /// Key (plain or function)
    pub key: FilterKey,
    /// Leading `!`
    pub negated: bool,
    /// Comparison prefix of the value
    pub comparison: Comparison,
    /// Decoded values. Empty means the value is missing (`key:`); an
    /// explicit empty string literal (`key:""`) is `[""]`.
    pub values: Vec<String>,
    /// Whether the values are written as a `[a,b]` list
    pub list: bool,
}

impl Filter {
    /// Creates a filter with a plain key and no value.
    pub fn new<T: Into<String>>(key: T) -> Self {
        Self::with_key(FilterKey::simple(key))
    }

    /// Creates a filter with the given key and no value.
    #[must_use]
    pub const fn with_key(key: FilterKey) -> Self {
        Self {
            key,
            negated: false,
            comparison: Comparison::Default,
            values: Vec::new(),
            list: false,
        }
    }

    /// Marks the filter as negated.
    #[must_use]
    pub const fn negated(mut self) -> Self {
        self.negated = true;
        self
    }

    /// Sets the comparison prefix.
    #[must_use]
    pub const fn comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = comparison;
        self
    }

    /// Appends a value; more than one value turns the filter into a list.
    #[must_use]
    pub fn value<T: Into<String>>(mut self, value: T) -> Self {
        self.values.push(value.into());
        self.list = self.values.len() > 1;
        self
    }

    /// Replaces all values.
    pub fn set_values(&mut self, values: Vec<String>) {
        self.list = values.len() > 1;
        self.values = values;
    }

    /// Returns `true` if the filter has no value at all.
    #[must_use]
    pub fn is_missing_value(&self) -> bool {
        self.values.is_empty()
    }

    /// The first value, if any.
    #[must_use]
    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// Escaped value text as it appears after the operator.
    #[must_use]
    pub fn value_text(&self) -> String {
        if self.list || self.values.len() > 1 {
            let items = self
                .values
                .iter()
                .map(|v| escape_value(v))
                .collect::<Vec<_>>()
                .join(",");
            format!("[{items}]")
        } else {
            self.values.first().map(|v| escape_value(v)).unwrap_or_default()
        }
    }

    /// Collapsed rendering of the values: the first
    /// [`MAX_SUMMARY_VALUES`] values, then a count of the hidden ones.
    #[must_use]
    pub fn value_summary(&self) -> ValueSummary {
        let shown: Vec<String> =
            self.values.iter().take(MAX_SUMMARY_VALUES).cloned().collect();
        let hidden = self.values.len() - shown.len();
        ValueSummary { shown, hidden }
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            write!(f, "!")?;
        }
        write!(
            f,
            "{}:{}{}",
            self.key,
            self.comparison.symbol(),
            self.value_text()
        )
    }
}

/// Collapsed view of a multi-value filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueSummary {
    /// Values rendered directly
    pub shown: Vec<String>,
    /// Number of values folded into the `+N` indicator
    pub hidden: usize,
}

impl Display for ValueSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.shown.join(", "))?;
        if self.hidden > 0 {
            write!(f, " +{}", self.hidden)?;
        }
        Ok(())
    }
}

/// Boolean keyword between terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BooleanOperator {
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl BooleanOperator {
    /// Matches a keyword case-insensitively.
    #[must_use]
    pub fn from_keyword(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("and") {
            Some(Self::And)
        } else if word.eq_ignore_ascii_case("or") {
            Some(Self::Or)
        } else {
            None
        }
    }

    /// Canonical keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Parenthesis direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParenKind {
    /// `(`
    Open,
    /// `)`
    Close,
}

/// The different units a query is made of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenKind {
    /// Free text search term, kept exactly as written
    FreeText {
        /// Raw text, including any quotes
        text: String,
    },
    /// `key:value` filter
    Filter(Filter),
    /// `AND` / `OR`
    LogicalOp {
        /// Operator kind
        operator: BooleanOperator,
        /// Keyword as written (case preserved)
        text: String,
    },
    /// `(` / `)`
    Paren {
        /// Paren direction
        paren: ParenKind,
    },
}

/// Validity annotation attached to a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invalid {
    /// Why the token is invalid
    pub reason: InvalidReason,
    /// Displayable message (possibly overridden by the host)
    pub message: String,
}

/// A single parsed unit of the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    /// What the token is
    #[serde(flatten)]
    pub kind: TokenKind,
    /// Span in the canonical query string
    pub position: Position,
    /// Validity annotation, `None` when valid
    pub invalid: Option<Invalid>,
}

impl Token {
    /// Wraps a token kind with an empty position and no annotation.
    #[must_use]
    pub const fn new(kind: TokenKind) -> Self {
        Self { kind, position: Position::new(0, 0), invalid: None }
    }

    /// Free text token.
    pub fn free_text<T: Into<String>>(text: T) -> Self {
        Self::new(TokenKind::FreeText { text: text.into() })
    }

    /// Filter token.
    #[must_use]
    pub const fn filter(filter: Filter) -> Self {
        Self::new(TokenKind::Filter(filter))
    }

    /// Logical operator token using the canonical keyword.
    #[must_use]
    pub fn logical(operator: BooleanOperator) -> Self {
        Self::new(TokenKind::LogicalOp {
            operator,
            text: operator.keyword().to_string(),
        })
    }

    /// Parenthesis token.
    #[must_use]
    pub const fn paren(paren: ParenKind) -> Self {
        Self::new(TokenKind::Paren { paren })
    }

    /// The filter, if this token is one.
    #[must_use]
    pub const fn as_filter(&self) -> Option<&Filter> {
        match &self.kind {
            TokenKind::Filter(filter) => Some(filter),
            _ => None,
        }
    }

    /// Mutable access to the filter, if this token is one.
    pub const fn as_filter_mut(&mut self) -> Option<&mut Filter> {
        match &mut self.kind {
            TokenKind::Filter(filter) => Some(filter),
            _ => None,
        }
    }

    /// Returns `true` if no validity check failed for this token.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.invalid.is_none()
    }

    fn is_paren(&self, kind: ParenKind) -> bool {
        matches!(&self.kind, TokenKind::Paren { paren } if *paren == kind)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TokenKind::FreeText { text } => write!(f, "{text}"),
            TokenKind::Filter(filter) => write!(f, "{filter}"),
            TokenKind::LogicalOp { text, .. } => write!(f, "{text}"),
            TokenKind::Paren { paren: ParenKind::Open } => write!(f, "("),
            TokenKind::Paren { paren: ParenKind::Close } => write!(f, ")"),
        }
    }
}

/// Returns `true` if a space separates `prev` and `next` in the canonical
/// query string. No space follows an opening paren or precedes a closing
/// one.
fn needs_separator(prev: &Token, next: &Token) -> bool {
    !prev.is_paren(ParenKind::Open) && !next.is_paren(ParenKind::Close)
}

/// Serialize tokens into the canonical query string.
#[must_use]
pub fn serialize_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && needs_separator(&tokens[i - 1], token) {
            out.push(' ');
        }
        out.push_str(&token.to_string());
    }
    out
}

/// Serialize tokens into the canonical query string and update every
/// token's position to its span in that string.
pub fn layout_tokens(tokens: &mut [Token]) -> String {
    let mut out = String::new();
    for i in 0..tokens.len() {
        if i > 0 && needs_separator(&tokens[i - 1], &tokens[i]) {
            out.push(' ');
        }
        let text = tokens[i].to_string();
        let start = out.len();
        out.push_str(&text);
        tokens[i].position = Position::new(start, out.len());
    }
    out
}

/// A parsed query: the token sequence of a raw query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedQuery {
    /// Tokens in query order
    pub tokens: Vec<Token>,
}

impl ParsedQuery {
    /// Filters of the query, in order.
    pub fn filters(&self) -> impl Iterator<Item = &Filter> {
        self.tokens.iter().filter_map(Token::as_filter)
    }

    /// Returns `true` if the query has no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Display for ParsedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", serialize_tokens(&self.tokens))
    }
}

impl FromStr for ParsedQuery {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { tokens: parse_query(s) })
    }
}
