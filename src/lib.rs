/*!
# `sqb` Library

A tokenizing search query builder: parses `key:value` filter queries with
boolean operators and parentheses into annotated tokens, validates them
against a filter-key dictionary, and drives an editable search bar with
undo, clipboard and contextual suggestions.

```
use sqb::query::{ValidityConfig, layout_tokens, parse_query, validate};
use sqb::schema::FilterKeys;

let mut tokens = parse_query("is:unresolved  (browser:chrome OR os:linux)");
assert_eq!(
    layout_tokens(&mut tokens),
    "is:unresolved (browser:chrome OR os:linux)"
);
assert!(validate(&mut tokens, &FilterKeys::default(), &ValidityConfig::default()));
```
*/

pub mod commands;
pub mod config;
pub mod query;
pub mod recent;
pub mod schema;
pub mod session;
pub mod suggest;
pub mod tokenizer;
pub mod utils;
