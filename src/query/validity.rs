/*!
# Validity Engine

Annotates every token of a query with an [`Invalid`] reason, or none.
Nothing here fails: structural problems (unbalanced parentheses, dangling
logical operators), value problems (a value that does not parse as its
key's type) and policy problems (wildcards, free text or logical operators
disallowed by the host) are all reported the same way, distinguished by
[`InvalidReason`]. The host decides what an invalid query means for it.

```
use sqb::query::{InvalidReason, ValidityConfig, parse_query, validate};
use sqb::schema::FilterKeys;

let config = ValidityConfig {
    disallow_logical_operators: true,
    ..Default::default()
};
let mut tokens = parse_query("and");
let valid = validate(&mut tokens, &FilterKeys::default(), &config);
assert!(!valid);
let invalid = tokens[0].invalid.as_ref().expect("flagged");
assert_eq!(invalid.reason, InvalidReason::LogicalOpNotAllowed);
assert_eq!(invalid.message, "The AND operator is not allowed in this search");
```
*/
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::query::{
    BooleanOperator, Comparison, Filter, Invalid, ParenKind, QueryNode,
    Token, TokenKind, build_tree, check_value,
};
use crate::schema::{FilterKeys, HAS_KEY, ValueType};

/// Why a token is invalid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidReason {
    /// `key:` with nothing after the operator
    FilterMustHaveValue,
    /// Value contains `*` while wildcards are disallowed
    WildcardNotAllowed,
    /// `AND`/`OR` while logical operators are disallowed
    LogicalOpNotAllowed,
    /// `AND`/`OR` at the edge of a group or next to another operator
    DanglingLogicalOperator,
    /// Parenthesis while parentheses are disallowed
    ParenNotAllowed,
    /// Free text while free text is disallowed
    FreeTextNotAllowed,
    /// Key missing from the dictionary while unsupported keys are disallowed
    UnsupportedKey,
    /// Parenthesis without a partner
    MissingParen,
    /// Comparison operator on a key that only supports is / is not
    OperatorNotAllowed,
    /// Value is not a number
    InvalidNumber,
    /// Value is not a duration
    InvalidDuration,
    /// Value is not a percentage
    InvalidPercentage,
    /// Value is not a relative or ISO-8601 date
    InvalidDate,
    /// Value is not a boolean
    InvalidBoolean,
    /// Function key parameters do not fit the parameter schema
    InvalidParameters,
}

/// Host toggles and message overrides for the validity engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidityConfig {
    /// Flag `AND` / `OR`
    pub disallow_logical_operators: bool,
    /// Flag values containing `*`
    pub disallow_wildcard: bool,
    /// Flag free text
    pub disallow_free_text: bool,
    /// Flag keys missing from the dictionary
    pub disallow_unsupported_filters: bool,
    /// Flag parentheses
    pub disallow_parens: bool,
    /// Messages replacing the default text of a reason
    pub invalid_messages: HashMap<InvalidReason, String>,
}

impl ValidityConfig {
    fn invalid(&self, reason: InvalidReason, default: String) -> Invalid {
        let message = self
            .invalid_messages
            .get(&reason)
            .cloned()
            .unwrap_or(default);
        Invalid { reason, message }
    }
}

/// Parsed tokens plus the overall validity, as reported to the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryState {
    /// Annotated tokens
    pub parsed_query: Vec<Token>,
    /// `true` iff every token is valid
    pub query_is_valid: bool,
}

impl QueryState {
    /// Invalid tokens with their annotation.
    pub fn invalid_tokens(&self) -> impl Iterator<Item = (&Token, &Invalid)> {
        self.parsed_query
            .iter()
            .filter_map(|t| t.invalid.as_ref().map(|i| (t, i)))
    }
}

/// Annotate every token with its validity and return whether the whole
/// query is valid. Previous annotations are replaced.
pub fn validate(
    tokens: &mut [Token],
    keys: &FilterKeys,
    config: &ValidityConfig,
) -> bool {
    for token in tokens.iter_mut() {
        token.invalid = check_token(token, keys, config);
    }

    // structural checks only fill in tokens that are otherwise valid
    let tree = build_tree(tokens);
    let mut structural: Vec<(usize, Invalid)> = vec![];
    check_nodes(&tree, tokens, config, &mut structural);
    for (idx, invalid) in structural {
        if tokens[idx].invalid.is_none() {
            tokens[idx].invalid = Some(invalid);
        }
    }

    let valid = tokens.iter().all(Token::is_valid);
    log::debug!(
        "validated {} token(s): {}",
        tokens.len(),
        if valid { "valid" } else { "invalid" }
    );
    valid
}

/// Per-token checks: policy toggles and filter values.
fn check_token(
    token: &Token,
    keys: &FilterKeys,
    config: &ValidityConfig,
) -> Option<Invalid> {
    match &token.kind {
        TokenKind::FreeText { .. } => config.disallow_free_text.then(|| {
            config.invalid(
                InvalidReason::FreeTextNotAllowed,
                "Free text is not supported in this search".to_string(),
            )
        }),
        TokenKind::LogicalOp { operator, .. } => {
            config.disallow_logical_operators.then(|| {
                config.invalid(
                    InvalidReason::LogicalOpNotAllowed,
                    format!(
                        "The {} operator is not allowed in this search",
                        operator.keyword()
                    ),
                )
            })
        }
        TokenKind::Paren { .. } => config.disallow_parens.then(|| {
            config.invalid(
                InvalidReason::ParenNotAllowed,
                "Parentheses are not supported in this search".to_string(),
            )
        }),
        TokenKind::Filter(filter) => check_filter(filter, keys, config),
    }
}

/// Checks of a single filter, first failure wins.
fn check_filter(
    filter: &Filter,
    keys: &FilterKeys,
    config: &ValidityConfig,
) -> Option<Invalid> {
    let name = filter.key.name();

    if filter.is_missing_value() {
        return Some(config.invalid(
            InvalidReason::FilterMustHaveValue,
            "Filter must have a value".to_string(),
        ));
    }

    if config.disallow_unsupported_filters && !keys.contains(name) {
        return Some(config.invalid(
            InvalidReason::UnsupportedKey,
            format!("Invalid key. \"{name}\" is not a supported search key."),
        ));
    }

    if config.disallow_wildcard && filter.values.iter().any(|v| v.contains('*'))
    {
        return Some(config.invalid(
            InvalidReason::WildcardNotAllowed,
            "Wildcards not supported in search".to_string(),
        ));
    }

    let value_type = keys.value_type(&filter.key);
    if filter.comparison != Comparison::Default
        && !comparison_allowed(value_type, name, keys)
    {
        return Some(config.invalid(
            InvalidReason::OperatorNotAllowed,
            format!(
                "Operator \"{}\" is not supported for \"{name}\"",
                filter.comparison.symbol()
            ),
        ));
    }

    if let Some(invalid) = check_parameters(filter, keys, config) {
        return Some(invalid);
    }

    if name == HAS_KEY {
        return None;
    }
    filter
        .values
        .iter()
        .find_map(|value| check_value(value_type, value))
        .map(|reason| config.invalid(reason, value_message(reason, value_type)))
}

/// Whether a comparison prefix may be used on a key of `value_type`.
fn comparison_allowed(value_type: ValueType, key: &str, keys: &FilterKeys) -> bool {
    match value_type {
        ValueType::Boolean => false,
        ValueType::String => key != HAS_KEY && keys.allows_all_operators(key),
        _ => true,
    }
}

/// Parameter count and required-parameter checks of function keys.
fn check_parameters(
    filter: &Filter,
    keys: &FilterKeys,
    config: &ValidityConfig,
) -> Option<Invalid> {
    let descriptor = keys.get(filter.key.name())?;
    if descriptor.parameters.is_empty() {
        return None;
    }
    let given = filter.key.parameters();
    if given.len() > descriptor.parameters.len() {
        return Some(config.invalid(
            InvalidReason::InvalidParameters,
            format!(
                "Too many parameters, expected at most {}",
                descriptor.parameters.len()
            ),
        ));
    }
    descriptor
        .parameters
        .iter()
        .enumerate()
        .find(|(idx, param)| {
            param.required && given.get(*idx).is_none_or(String::is_empty)
        })
        .map(|(_, param)| {
            config.invalid(
                InvalidReason::InvalidParameters,
                format!("Missing required parameter \"{}\"", param.name),
            )
        })
}

/// Default message of a value-type failure.
fn value_message(reason: InvalidReason, value_type: ValueType) -> String {
    match reason {
        InvalidReason::InvalidDuration => {
            "Invalid duration. Expected number followed by duration unit suffix"
                .to_string()
        }
        InvalidReason::InvalidPercentage => {
            "Invalid percentage. Expected a number or a number followed by %"
                .to_string()
        }
        InvalidReason::InvalidDate => {
            "Invalid date. Expected relative date (e.g. -24h) or ISO-8601 timestamp"
                .to_string()
        }
        InvalidReason::InvalidBoolean => {
            "Invalid boolean. Expected true, 1, false, or 0.".to_string()
        }
        _ if value_type == ValueType::Integer => {
            "Invalid integer. Expected whole number then optional k, m, or b suffix"
                .to_string()
        }
        _ => "Invalid number. Expected number then optional k, m, or b suffix (e.g. 500k)"
            .to_string(),
    }
}

/// Structural checks over the paren tree.
fn check_nodes(
    nodes: &[QueryNode],
    tokens: &[Token],
    config: &ValidityConfig,
    out: &mut Vec<(usize, Invalid)>,
) {
    let is_logical = |node: &QueryNode| {
        matches!(node, QueryNode::Token(idx)
            if matches!(tokens[*idx].kind, TokenKind::LogicalOp { .. }))
    };

    for (pos, node) in nodes.iter().enumerate() {
        match node {
            QueryNode::Token(idx) => match &tokens[*idx].kind {
                TokenKind::Paren { paren: ParenKind::Close } => out.push((
                    *idx,
                    config.invalid(
                        InvalidReason::MissingParen,
                        "Missing opening parenthesis".to_string(),
                    ),
                )),
                TokenKind::LogicalOp { operator, .. } => {
                    let at_edge = pos == 0 || pos + 1 == nodes.len();
                    let after_operator = pos > 0 && is_logical(&nodes[pos - 1]);
                    if at_edge || after_operator {
                        out.push((*idx, dangling(*operator, config)));
                    }
                }
                _ => {}
            },
            QueryNode::Group { open, close, children } => {
                if close.is_none() {
                    out.push((
                        *open,
                        config.invalid(
                            InvalidReason::MissingParen,
                            "Missing closing parenthesis".to_string(),
                        ),
                    ));
                }
                check_nodes(children, tokens, config, out);
            }
        }
    }
}

fn dangling(operator: BooleanOperator, config: &ValidityConfig) -> Invalid {
    config.invalid(
        InvalidReason::DanglingLogicalOperator,
        format!(
            "The {} operator must be placed between two search terms",
            operator.keyword()
        ),
    )
}
