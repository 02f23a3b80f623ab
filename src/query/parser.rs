/*!
# Query Parser

Turns raw search query strings into a [`Token`] sequence and groups that
sequence into a tree following parenthesis nesting.

## Examples

Parsing never fails: text that is not a well-formed filter, operator or
parenthesis becomes free text, and structural problems such as unbalanced
parentheses are reported later as validity annotations.

```rust
use sqb::query::{TokenKind, parse_query};

let tokens = parse_query("browser.name:[Chrome,Firefox] (is:unresolved OR crash");
assert_eq!(tokens.len(), 5);
assert!(matches!(tokens[0].kind, TokenKind::Filter(_)));
assert!(matches!(tokens[4].kind, TokenKind::FreeText { .. }));
```

Single filter words can be parsed on their own with [`parse_filter`]:

```rust
use sqb::query::{Comparison, parse_filter};

let filter = parse_filter("!transaction.duration:>=100ms").expect("a filter");
assert!(filter.negated);
assert_eq!(filter.comparison, Comparison::GreaterThanOrEqual);
assert_eq!(filter.values, vec!["100ms".to_string()]);
assert!(parse_filter("just-text").is_none());
```
*/

use pest::Parser;
use pest_derive::Parser;

use crate::query::{
    BooleanOperator, Comparison, Filter, FilterKey, ParenKind, Position,
    Token, TokenKind, decode_value,
};
use crate::tokenizer::{Lexeme, tokenize};

/// Parser for single filter words.
#[derive(Parser)]
#[grammar = "query/grammar/filter.pest"]
pub struct FilterParser;

/// Parse an input query string into its token sequence.
///
/// Token positions refer to byte offsets in `input`.
#[must_use]
pub fn parse_query(input: &str) -> Vec<Token> {
    let tokens: Vec<Token> = tokenize(input)
        .into_iter()
        .filter_map(|lexeme| classify(lexeme, input))
        .collect();

    log::trace!("parsed {} token(s) from {input:?}", tokens.len());
    tokens
}

/// Classify a lexeme into a token.
fn classify(lexeme: Lexeme, input: &str) -> Option<Token> {
    let (start, end) = lexeme.range()?;
    let text = &input[start..end];

    let kind = match lexeme {
        Lexeme::Eof => return None,
        Lexeme::LParen(_) => TokenKind::Paren { paren: ParenKind::Open },
        Lexeme::RParen(_) => TokenKind::Paren { paren: ParenKind::Close },
        Lexeme::Unterminated(..) => {
            TokenKind::FreeText { text: text.to_string() }
        }
        Lexeme::Word(..) => {
            if let Some(operator) = BooleanOperator::from_keyword(text) {
                TokenKind::LogicalOp { operator, text: text.to_string() }
            } else if let Some(filter) = parse_filter(text) {
                TokenKind::Filter(filter)
            } else {
                TokenKind::FreeText { text: text.to_string() }
            }
        }
    };

    Some(Token {
        kind,
        position: Position::new(start, end),
        invalid: None,
    })
}

/// Parse a single word into a [`Filter`], returning `None` if the word is
/// not `key:value` shaped.
#[must_use]
pub fn parse_filter(word: &str) -> Option<Filter> {
    let mut pairs = FilterParser::parse(Rule::filter, word).ok()?;
    let filter_pair = pairs.next()?;

    let mut negated = false;
    let mut key: Option<FilterKey> = None;
    let mut comparison = Comparison::Default;
    let mut values: Vec<String> = vec![];
    let mut list = false;

    for pair in filter_pair.into_inner() {
        match pair.as_rule() {
            Rule::negation => negated = true,
            Rule::key => key = parse_key(pair),
            Rule::operator => {
                comparison = Comparison::from_symbol(pair.as_str())?;
            }
            Rule::value_list => {
                list = true;
                values = pair
                    .into_inner()
                    .map(|item| match item.as_rule() {
                        Rule::quoted_value => decode_value(item.as_str()),
                        _ => item.as_str().to_string(),
                    })
                    .collect();
            }
            Rule::quoted_value => values = vec![decode_value(pair.as_str())],
            Rule::bare_value => {
                if !pair.as_str().is_empty() {
                    values = vec![pair.as_str().to_string()];
                }
            }
            _ => {}
        }
    }

    Some(Filter { key: key?, negated, comparison, values, list })
}

/// Parse a key rule into a [`FilterKey`].
fn parse_key(pair: pest::iterators::Pair<Rule>) -> Option<FilterKey> {
    let inner = pair.into_inner().next()?;
    match inner.as_rule() {
        Rule::simple_key => Some(FilterKey::simple(inner.as_str())),
        Rule::function_key => {
            let mut parts = inner.into_inner();
            let name = parts.next()?.as_str().to_string();
            let mut parameters: Vec<String> = parts
                .next()
                .map(|args| {
                    args.into_inner()
                        .map(|arg| arg.as_str().trim().to_string())
                        .collect()
                })
                .unwrap_or_default();
            // `count()` has no parameters rather than one empty one
            if parameters.len() == 1 && parameters[0].is_empty() {
                parameters.clear();
            }
            Some(FilterKey::Function { name, parameters })
        }
        _ => None,
    }
}

/// Node of the parenthesis tree of a token sequence. Nodes refer to tokens
/// by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    /// A non-grouping token (or an unmatched closing paren)
    Token(usize),
    /// A parenthesized group
    Group {
        /// Index of the opening paren
        open: usize,
        /// Index of the matching closing paren, `None` if never closed
        close: Option<usize>,
        /// Nodes inside the group
        children: Vec<Self>,
    },
}

/// Group a token sequence into a tree following parenthesis nesting.
///
/// Unbalanced parentheses never fail: an opening paren without a match
/// yields a group with `close: None` that runs to the end of the sequence,
/// and a closing paren without a match stays a plain [`QueryNode::Token`].
#[must_use]
pub fn build_tree(tokens: &[Token]) -> Vec<QueryNode> {
    let mut root: Vec<QueryNode> = vec![];
    let mut stack: Vec<(usize, Vec<QueryNode>)> = vec![];

    for (idx, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Paren { paren: ParenKind::Open } => {
                stack.push((idx, vec![]));
            }
            TokenKind::Paren { paren: ParenKind::Close } => {
                let node = match stack.pop() {
                    Some((open, children)) => {
                        QueryNode::Group { open, close: Some(idx), children }
                    }
                    None => QueryNode::Token(idx),
                };
                match stack.last_mut() {
                    Some((_, children)) => children.push(node),
                    None => root.push(node),
                }
            }
            _ => match stack.last_mut() {
                Some((_, children)) => children.push(QueryNode::Token(idx)),
                None => root.push(QueryNode::Token(idx)),
            },
        }
    }

    // close whatever is still open, innermost first
    while let Some((open, children)) = stack.pop() {
        let node = QueryNode::Group { open, close: None, children };
        match stack.last_mut() {
            Some((_, parent)) => parent.push(node),
            None => root.push(node),
        }
    }

    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::serialize_tokens;

    fn filter(word: &str) -> Filter {
        parse_filter(word).unwrap_or_else(|| panic!("{word} is a filter"))
    }

    #[test]
    fn parse_simple_filter() {
        let f = filter("browser.name:firefox");
        assert_eq!(f.key, FilterKey::simple("browser.name"));
        assert!(!f.negated);
        assert_eq!(f.comparison, Comparison::Default);
        assert_eq!(f.values, vec!["firefox"]);
        assert!(!f.list);
    }

    #[test]
    fn parse_negated_comparison() {
        let f = filter("!count:<=10k");
        assert!(f.negated);
        assert_eq!(f.comparison, Comparison::LessThanOrEqual);
        assert_eq!(f.values, vec!["10k"]);
    }

    #[test]
    fn parse_value_list() {
        let f = filter(r#"browser.name:[Chrome, "Mobile Safari",Edge]"#);
        assert!(f.list);
        assert_eq!(f.values, vec!["Chrome", "Mobile Safari", "Edge"]);
    }

    #[test]
    fn parse_quoted_value() {
        let f = filter(r#"message:"a \"quoted\" (thing)""#);
        assert_eq!(f.values, vec![r#"a "quoted" (thing)"#]);
        let f = filter(r#"message:"""#);
        assert_eq!(f.values, vec![""]);
    }

    #[test]
    fn parse_missing_value() {
        let f = filter("is:");
        assert!(f.is_missing_value());
        let f = filter("count:>");
        assert!(f.is_missing_value());
        assert_eq!(f.comparison, Comparison::GreaterThan);
    }

    #[test]
    fn parse_function_key() {
        let f = filter("count_if(transaction.duration,greater,300):>5");
        assert_eq!(
            f.key,
            FilterKey::function(
                "count_if",
                vec![
                    "transaction.duration".into(),
                    "greater".into(),
                    "300".into()
                ]
            )
        );
        assert_eq!(f.values, vec!["5"]);
        let f = filter("count():>100");
        assert_eq!(f.key, FilterKey::function("count", vec![]));
    }

    #[test]
    fn parse_unclosed_list_is_bare_value() {
        let f = filter("a:[b");
        assert!(!f.list);
        assert_eq!(f.values, vec!["[b"]);
    }

    #[test]
    fn non_filters_are_rejected() {
        for word in ["foo", ":value", r#""quoted:text""#, "a b:c", "(x):y"] {
            assert!(parse_filter(word).is_none(), "{word}");
        }
    }

    #[test]
    fn parse_full_query() {
        let tokens = parse_query("(a:b or c) AND !d:[1,2] free \"x y");
        let kinds: Vec<&str> = tokens
            .iter()
            .map(|t| match &t.kind {
                TokenKind::FreeText { .. } => "text",
                TokenKind::Filter(_) => "filter",
                TokenKind::LogicalOp { .. } => "op",
                TokenKind::Paren { .. } => "paren",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "paren", "filter", "op", "text", "paren", "op", "filter",
                "text", "text"
            ]
        );
        assert_eq!(tokens[2].position, Position::new(5, 7));
        assert!(matches!(
            &tokens[2].kind,
            TokenKind::LogicalOp { operator: BooleanOperator::Or, text } if text == "or"
        ));
    }

    #[test]
    fn logical_keyword_with_colon_is_a_filter() {
        let tokens = parse_query("OR:value");
        assert!(matches!(tokens[0].kind, TokenKind::Filter(_)));
    }

    #[test]
    fn tokenize_serialize_tokenize_is_stable() {
        let cases = [
            "browser.name:firefox",
            "!browser.name:[Chrome,\"Mobile Safari\"]",
            "(a:b OR c:d) AND e",
            "message:\"a \\\"b\\\" c\"",
            "count_if(transaction.duration,greater,300):>5 text",
            "is: unterminated \"quote here",
            "((nested)) ) (",
            "path:a\\ b",
        ];
        for case in cases {
            let first = parse_query(case);
            let text = serialize_tokens(&first);
            let second = parse_query(&text);
            assert_eq!(
                first.iter().map(|t| &t.kind).collect::<Vec<_>>(),
                second.iter().map(|t| &t.kind).collect::<Vec<_>>(),
                "{case} -> {text}"
            );
        }
    }

    #[test]
    fn edited_values_survive_reparse() {
        let values = [
            r"C:\dir\",
            r"\",
            "a]b",
            "[x",
            "a,b",
            r#"say "hi""#,
            "",
            " padded ",
            ">5",
            "(x)",
            "plain",
            "tab\there",
            "é ü",
        ];
        for value in values {
            let single = Filter::new("key").value(value);
            let list = Filter::new("key").value(value).value("c");
            for f in [single, list] {
                let text = serialize_tokens(&[
                    Token::filter(f.clone()),
                    Token::filter(Filter::new("other").value("y")),
                ]);
                let reparsed = parse_query(&text);
                assert_eq!(reparsed.len(), 2, "{value:?} -> {text}");
                assert_eq!(reparsed[0].as_filter(), Some(&f), "{value:?} -> {text}");
            }
        }
    }

    #[test]
    fn escaped_value_round_trips() {
        let f = Filter::new("message").value(r#"a"b"#);
        let text = f.to_string();
        assert_eq!(text, r#"message:"a\"b""#);
        assert_eq!(filter(&text).values, vec![r#"a"b"#]);
    }

    #[test]
    fn tree_groups_parens() {
        let tokens = parse_query("a (b (c) d) e");
        let tree = build_tree(&tokens);
        assert_eq!(
            tree,
            vec![
                QueryNode::Token(0),
                QueryNode::Group {
                    open: 1,
                    close: Some(7),
                    children: vec![
                        QueryNode::Token(2),
                        QueryNode::Group {
                            open: 3,
                            close: Some(5),
                            children: vec![QueryNode::Token(4)]
                        },
                        QueryNode::Token(6),
                    ]
                },
                QueryNode::Token(8),
            ]
        );
    }

    #[test]
    fn tree_tolerates_imbalance() {
        let tokens = parse_query(") (a");
        let tree = build_tree(&tokens);
        assert_eq!(
            tree,
            vec![
                QueryNode::Token(0),
                QueryNode::Group {
                    open: 1,
                    close: None,
                    children: vec![QueryNode::Token(2)]
                },
            ]
        );
    }
}
