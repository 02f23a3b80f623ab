/*!
# Suggestions

Builds the menus shown while editing: filter keys (with recent searches),
operators, values and function parameters. Every list is recomputed from
the current partial text; nothing here keeps state except the
[`FetchTracker`], which discards tag-value fetches that were superseded by
a newer request before they resolved.
*/
use serde::Serialize;

use crate::query::{
    DurationUnit, Filter, FilterKey, OperatorChoice, RelativeUnit,
    allowed_operators, current_operator, parse_date, parse_number,
    parse_percentage,
};
use crate::schema::{FilterKeys, HAS_KEY, ParameterKind, ValueType};

/// Label of the recent-searches section.
pub const RECENT_SEARCHES_LABEL: &str = "Recent Searches";

/// Maximum number of recent searches offered with the keys.
pub const MAX_RECENT_SUGGESTIONS: usize = 3;

const DEFAULT_NUMBERS: [&str; 4] = ["100", "1k", "10k", "100k"];
const DEFAULT_DURATION_AMOUNT: &str = "10";
const DEFAULT_PERCENTAGES: [&str; 3] = ["0.25", "0.5", "0.75"];
const DEFAULT_RELATIVE_DATES: [&str; 5] = ["-1h", "-24h", "-7d", "-14d", "-30d"];

/// What selecting a suggestion does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Starts a filter on the key
    Key,
    /// Replaces the whole query
    RecentSearch,
    /// Sets the operator
    Operator(OperatorChoice),
    /// Sets the value
    Value,
    /// Sets the parameters of a function key
    Parameter,
}

/// One menu item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// Text applied when selected
    pub value: String,
    /// Text shown
    pub label: String,
    /// Secondary text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Effect of selecting the item
    pub kind: SuggestionKind,
}

impl Suggestion {
    fn new<V: Into<String>>(value: V, kind: SuggestionKind) -> Self {
        let value = value.into();
        Self { label: value.clone(), value, description: None, kind }
    }

    fn label<L: Into<String>>(mut self, label: L) -> Self {
        self.label = label.into();
        self
    }

    fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// A group of menu items under an optional header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionSection {
    /// Header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Items in display order
    pub items: Vec<Suggestion>,
}

/// A complete menu.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Suggestions {
    /// Non-empty sections in display order
    pub sections: Vec<SuggestionSection>,
}

impl Suggestions {
    fn push(&mut self, label: Option<&str>, items: Vec<Suggestion>) {
        if !items.is_empty() {
            self.sections.push(SuggestionSection {
                label: label.map(str::to_string),
                items,
            });
        }
    }

    fn single(items: Vec<Suggestion>) -> Self {
        let mut suggestions = Self::default();
        suggestions.push(None, items);
        suggestions
    }

    /// All items, in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Suggestion> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    /// Values of all items, in display order.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        self.iter().map(|s| s.value.as_str()).collect()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    /// Returns `true` if there is nothing to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// The item at `index` in display order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Suggestion> {
        self.iter().nth(index)
    }
}

/// Case-insensitive match rank of `name` against `partial`: exact, prefix,
/// substring, then a match in the description only.
fn rank(name: &str, description: Option<&str>, partial: &str) -> Option<u8> {
    if partial.is_empty() {
        return Some(0);
    }
    let name = name.to_lowercase();
    if name == partial {
        Some(0)
    } else if name.starts_with(partial) {
        Some(1)
    } else if name.contains(partial) {
        Some(2)
    } else if description.is_some_and(|d| d.to_lowercase().contains(partial)) {
        Some(3)
    } else {
        None
    }
}

fn matches(value: &str, partial: &str) -> bool {
    value.to_lowercase().contains(&partial.trim().to_lowercase())
}

fn format_percent(ratio: f64) -> String {
    let percent = (ratio * 100.0 * 1e6).round() / 1e6;
    format!("{percent}%")
}

/// Menus for one filter-key dictionary.
#[derive(Debug, Clone, Copy)]
pub struct SuggestionProvider<'a> {
    keys: &'a FilterKeys,
    recent: &'a [String],
}

impl<'a> SuggestionProvider<'a> {
    /// Provider over `keys`, offering `recent` searches with the keys.
    #[must_use]
    pub const fn new(keys: &'a FilterKeys, recent: &'a [String]) -> Self {
        Self { keys, recent }
    }

    /// Keys matching `partial`.
    ///
    /// Without partial text keys are grouped by the dictionary's sections
    /// (keys outside every section are listed under "Other"); with partial
    /// text they are ranked by how well they match. Matching recent
    /// searches come first either way.
    #[must_use]
    pub fn keys(&self, partial: &str) -> Suggestions {
        let partial = partial.trim().to_lowercase();
        let mut suggestions = Suggestions::default();

        let recent = self
            .recent
            .iter()
            .filter(|q| partial.is_empty() || q.to_lowercase().contains(&partial))
            .take(MAX_RECENT_SUGGESTIONS)
            .map(|q| Suggestion::new(q.as_str(), SuggestionKind::RecentSearch))
            .collect();
        suggestions.push(Some(RECENT_SEARCHES_LABEL), recent);

        let key_item = |name: &str| {
            Suggestion::new(name, SuggestionKind::Key).description(
                self.keys.get(name).and_then(|d| d.description.clone()),
            )
        };

        if partial.is_empty() && !self.keys.sections().is_empty() {
            for section in self.keys.sections() {
                let items = section
                    .keys
                    .iter()
                    .filter(|k| self.keys.get(k).is_some())
                    .map(|k| key_item(k.as_str()))
                    .collect();
                suggestions.push(Some(&section.label), items);
            }
            let other = self
                .keys
                .iter()
                .filter(|(name, _)| {
                    !self
                        .keys
                        .sections()
                        .iter()
                        .any(|s| s.keys.iter().any(|k| k == *name))
                })
                .map(|(name, _)| key_item(name.as_str()))
                .collect();
            suggestions.push(Some("Other"), other);
            return suggestions;
        }

        let mut ranked: Vec<(u8, &str)> = self
            .keys
            .iter()
            .filter_map(|(name, d)| {
                rank(name, d.description.as_deref(), &partial)
                    .map(|r| (r, name.as_str()))
            })
            .collect();
        ranked.sort_unstable();
        suggestions.push(
            None,
            ranked.into_iter().map(|(_, name)| key_item(name)).collect(),
        );
        suggestions
    }

    /// Operators offered for `filter`. The operator the filter currently
    /// expresses is described as `current`.
    #[must_use]
    pub fn operators(&self, filter: &Filter) -> Suggestions {
        let current = current_operator(filter, self.keys.value_type(&filter.key));
        Suggestions::single(
            allowed_operators(self.keys, &filter.key)
                .into_iter()
                .map(|op| {
                    Suggestion::new(op.label(), SuggestionKind::Operator(op))
                        .description((op == current).then(|| "current".to_string()))
                })
                .collect(),
        )
    }

    /// Values offered for `filter` given the typed `partial` text.
    /// `fetched` holds tag values retrieved for the filter's key, used
    /// for string keys without predefined values.
    #[must_use]
    pub fn values(
        &self,
        filter: &Filter,
        partial: &str,
        fetched: Option<&[String]>,
    ) -> Suggestions {
        let partial = partial.trim();
        let value = |v: &str| Suggestion::new(v, SuggestionKind::Value);

        if filter.key.name() == HAS_KEY {
            let partial = partial.to_lowercase();
            let mut ranked: Vec<(u8, &str)> = self
                .keys
                .iter()
                .filter_map(|(name, _)| {
                    rank(name, None, &partial).map(|r| (r, name.as_str()))
                })
                .collect();
            ranked.sort_unstable();
            return Suggestions::single(
                ranked.into_iter().map(|(_, name)| value(name)).collect(),
            );
        }

        if let Some(descriptor) = self
            .keys
            .get(filter.key.name())
            .filter(|d| d.has_predefined_values())
        {
            let mut suggestions = Suggestions::default();
            for section in &descriptor.value_sections {
                let items = section
                    .values
                    .iter()
                    .filter(|v| matches(v, partial))
                    .map(|v| value(v.as_str()))
                    .collect();
                suggestions.push(Some(&section.title), items);
            }
            let items = descriptor
                .values
                .iter()
                .filter(|v| matches(v, partial))
                .map(|v| value(v.as_str()))
                .collect();
            suggestions.push(Some("Suggested"), items);
            return suggestions;
        }

        let items = match self.keys.value_type(&filter.key) {
            ValueType::String => fetched
                .unwrap_or_default()
                .iter()
                .filter(|v| matches(v, partial))
                .map(|v| value(v.as_str()))
                .collect(),
            ValueType::Boolean => ["true", "false"]
                .into_iter()
                .filter(|v| v.starts_with(&partial.to_lowercase()))
                .map(value)
                .collect(),
            ValueType::Number | ValueType::Integer => number_values(partial),
            ValueType::Duration => duration_values(partial),
            ValueType::Percentage => percentage_values(partial),
            ValueType::Date => date_values(partial),
        };
        Suggestions::single(items)
    }

    /// Parameter lists offered for a function filter while `partial` (the
    /// comma separated parameter text) is typed. Suggestions complete the
    /// parameter after the last comma.
    #[must_use]
    pub fn parameters(&self, filter: &Filter, partial: &str) -> Suggestions {
        let FilterKey::Function { name, .. } = &filter.key else {
            return Suggestions::default();
        };
        let Some(descriptor) = self.keys.get(name) else {
            return Suggestions::default();
        };
        let (done, current) = match partial.rsplit_once(',') {
            Some((done, current)) => (Some(done), current),
            None => (None, partial),
        };
        let index = done.map_or(0, |d| d.split(',').count());
        let Some(parameter) = descriptor.parameters.get(index) else {
            return Suggestions::default();
        };

        let options: Vec<String> = match parameter.kind {
            ParameterKind::Column => self
                .keys
                .columns_of_type(&parameter.column_types)
                .into_iter()
                .map(str::to_string)
                .collect(),
            ParameterKind::Value => parameter.options.clone(),
        };
        Suggestions::single(
            options
                .into_iter()
                .filter(|o| matches(o, current))
                .map(|option| {
                    let value = done.map_or_else(
                        || option.clone(),
                        |done| format!("{done},{option}"),
                    );
                    Suggestion::new(value, SuggestionKind::Parameter)
                        .label(option)
                        .description(Some(parameter.name.clone()))
                })
                .collect(),
        )
    }
}

fn number_values(partial: &str) -> Vec<Suggestion> {
    let value = |v: String| Suggestion::new(v, SuggestionKind::Value);
    if partial.is_empty() {
        return DEFAULT_NUMBERS.into_iter().map(|v| value(v.into())).collect();
    }
    if partial.parse::<f64>().is_ok() {
        return ["", "k", "m", "b"]
            .into_iter()
            .map(|suffix| value(format!("{partial}{suffix}")))
            .collect();
    }
    parse_number(partial)
        .map(|_| vec![value(partial.to_string())])
        .unwrap_or_default()
}

fn duration_values(partial: &str) -> Vec<Suggestion> {
    let unit_text = partial.trim_start_matches(|c: char| {
        c.is_ascii_digit() || c == '.' || c == '-'
    });
    let amount = &partial[..partial.len() - unit_text.len()];
    let amount = if amount.is_empty() {
        if !unit_text.is_empty() {
            return vec![];
        }
        DEFAULT_DURATION_AMOUNT
    } else {
        amount
    };
    if amount.parse::<f64>().is_err() {
        return vec![];
    }
    DurationUnit::ALL
        .into_iter()
        .filter(|unit| unit.suffix().starts_with(unit_text))
        .map(|unit| {
            Suggestion::new(format!("{amount}{}", unit.suffix()), SuggestionKind::Value)
                .label(format!("{amount} {}", unit.label()))
        })
        .collect()
}

fn percentage_values(partial: &str) -> Vec<Suggestion> {
    let item = |ratio: f64| {
        Suggestion::new(ratio.to_string(), SuggestionKind::Value)
            .label(format_percent(ratio))
    };
    if partial.is_empty() {
        return DEFAULT_PERCENTAGES
            .into_iter()
            .filter_map(|v| v.parse().ok())
            .map(item)
            .collect();
    }
    let Some(ratio) = parse_percentage(partial) else {
        return vec![];
    };
    // the typed reading comes first so applying it matches a commit
    if !partial.ends_with('%') && ratio > 1.0 {
        return vec![item(ratio), item(ratio / 100.0)];
    }
    vec![item(ratio)]
}

fn date_values(partial: &str) -> Vec<Suggestion> {
    let item = |value: String, label: String| {
        Suggestion::new(value, SuggestionKind::Value).label(label)
    };
    let relative_label = |sign: char, amount: &str, unit: RelativeUnit| {
        if sign == '+' {
            format!("more than {amount} {} ago", unit.label())
        } else {
            format!("last {amount} {}", unit.label())
        }
    };

    if partial.is_empty() {
        return DEFAULT_RELATIVE_DATES
            .into_iter()
            .filter_map(|v| {
                let rest = &v[1..];
                let (amount, unit) = rest.split_at(rest.len() - 1);
                let unit = RelativeUnit::ALL
                    .into_iter()
                    .find(|u| unit.starts_with(u.suffix()))?;
                Some(item(v.to_string(), relative_label('-', amount, unit)))
            })
            .collect();
    }

    let (sign, rest) = match partial.chars().next() {
        Some(sign @ ('-' | '+')) => (sign, &partial[1..]),
        _ => ('-', partial),
    };
    let unit_text = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    let amount = &rest[..rest.len() - unit_text.len()];
    if !amount.is_empty() && unit_text.len() <= 1 {
        return RelativeUnit::ALL
            .into_iter()
            .filter(|unit| unit_text.is_empty() || unit_text.starts_with(unit.suffix()))
            .map(|unit| {
                item(
                    format!("{sign}{amount}{}", unit.suffix()),
                    relative_label(sign, amount, unit),
                )
            })
            .collect();
    }

    parse_date(partial)
        .filter(|d| !d.is_relative())
        .map(|d| {
            let ts = d.to_string();
            vec![item(ts.clone(), ts)]
        })
        .unwrap_or_default()
}

/// Source of tag values for string keys without predefined values.
pub trait TagValueSource {
    /// Values of `key` matching `partial`.
    ///
    /// # Errors
    ///
    /// Returns an error if the values cannot be retrieved; the menu then
    /// shows no fetched values.
    fn tag_values(&self, key: &str, partial: &str) -> anyhow::Result<Vec<String>>;
}

impl<F> TagValueSource for F
where
    F: Fn(&str, &str) -> anyhow::Result<Vec<String>>,
{
    fn tag_values(&self, key: &str, partial: &str) -> anyhow::Result<Vec<String>> {
        self(key, partial)
    }
}

/// Identifies one tag-value request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    /// Generation the request was issued in
    pub generation: u64,
    /// Key whose values are requested
    pub key: String,
    /// Partial text the values are requested for
    pub partial: String,
}

/// Tracks tag-value requests so that only the latest one is applied.
///
/// Every request and every change of focus bumps the generation; a result
/// whose ticket carries an older generation is discarded.
#[derive(Debug, Default)]
pub struct FetchTracker {
    generation: u64,
    loaded: Option<(String, Vec<String>)>,
}

impl FetchTracker {
    /// Starts a request, superseding every outstanding one.
    pub fn begin<K: Into<String>, P: Into<String>>(
        &mut self,
        key: K,
        partial: P,
    ) -> FetchTicket {
        self.generation += 1;
        FetchTicket {
            generation: self.generation,
            key: key.into(),
            partial: partial.into(),
        }
    }

    /// Supersedes outstanding requests and drops loaded values.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.loaded = None;
    }

    /// Applies the result of a request. Returns `false` if the request was
    /// superseded. Failures load an empty list.
    pub fn resolve<E: std::fmt::Display>(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<String>, E>,
    ) -> bool {
        if ticket.generation != self.generation {
            log::debug!(
                "discarding stale values for {:?} (generation {} < {})",
                ticket.key,
                ticket.generation,
                self.generation
            );
            return false;
        }
        let values = result.unwrap_or_else(|err| {
            log::warn!("failed to fetch values for {:?}: {err}", ticket.key);
            vec![]
        });
        self.loaded = Some((ticket.key.clone(), values));
        true
    }

    /// Values loaded for `key`.
    #[must_use]
    pub fn values_for(&self, key: &str) -> Option<&[String]> {
        self.loaded
            .as_ref()
            .filter(|(loaded, _)| loaded == key)
            .map(|(_, values)| values.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_filter;
    use crate::schema::{
        FilterKeyDescriptor, FilterKeyKind, FilterKeySection,
        FunctionParameter, ValueSection,
    };

    fn keys() -> FilterKeys {
        let mut keys = FilterKeys::default();
        keys.insert(
            "browser.name",
            FilterKeyDescriptor {
                kind: FilterKeyKind::Tag,
                description: Some("Name of the browser".into()),
                ..Default::default()
            },
        );
        keys.insert(
            "is",
            FilterKeyDescriptor {
                values: vec!["resolved".into(), "unresolved".into()],
                ..Default::default()
            },
        );
        keys.insert(
            "level",
            FilterKeyDescriptor {
                value_sections: vec![ValueSection {
                    title: "Severity".into(),
                    values: vec!["error".into(), "warning".into()],
                }],
                ..Default::default()
            },
        );
        for (name, value_type) in [
            ("transaction.duration", ValueType::Duration),
            ("measurements.cls", ValueType::Number),
            ("age", ValueType::Date),
            ("rate", ValueType::Percentage),
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
            "count_if",
            FilterKeyDescriptor {
                kind: FilterKeyKind::Function,
                parameters: vec![
                    FunctionParameter {
                        name: "column".into(),
                        kind: ParameterKind::Column,
                        column_types: vec![ValueType::Duration],
                        options: vec![],
                        default_value: None,
                        required: true,
                    },
                    FunctionParameter {
                        name: "operator".into(),
                        kind: ParameterKind::Value,
                        column_types: vec![],
                        options: vec!["equals".into(), "less".into()],
                        default_value: None,
                        required: true,
                    },
                ],
                ..Default::default()
            },
        );
        keys
    }

    fn filter(word: &str) -> Filter {
        parse_filter(word).unwrap_or_else(|| panic!("{word}"))
    }

    #[test]
    fn keys_ranked_by_match() {
        let keys = keys();
        let provider = SuggestionProvider::new(&keys, &[]);
        let menu = provider.keys("is");
        let values = menu.keys_values();
        assert_eq!(values.first(), Some(&"is"));

        let menu = provider.keys("dur");
        assert_eq!(menu.keys_values(), vec!["transaction.duration"]);

        // matched through the description
        let menu = provider.keys("name of");
        assert_eq!(menu.keys_values(), vec!["browser.name"]);
    }

    trait KeysValues {
        fn keys_values(&self) -> Vec<&str>;
    }

    impl KeysValues for Suggestions {
        fn keys_values(&self) -> Vec<&str> {
            self.iter()
                .filter(|s| s.kind == SuggestionKind::Key)
                .map(|s| s.value.as_str())
                .collect()
        }
    }

    #[test]
    fn keys_grouped_by_section() {
        let keys = keys().with_sections(vec![FilterKeySection {
            label: "Issue".into(),
            keys: vec!["is".into(), "missing".into()],
        }]);
        let recent = vec!["is:unresolved".to_string()];
        let provider = SuggestionProvider::new(&keys, &recent);
        let suggestions = provider.keys("");
        let labels: Vec<_> = suggestions
            .sections
            .iter()
            .map(|s| s.label.as_deref())
            .collect();
        assert_eq!(
            labels,
            vec![Some(RECENT_SEARCHES_LABEL), Some("Issue"), Some("Other")]
        );
        assert_eq!(suggestions.sections[1].items.len(), 1);
        assert_eq!(suggestions.get(0).map(|s| s.kind), Some(SuggestionKind::RecentSearch));
    }

    #[test]
    fn operators_by_type() {
        let keys = keys();
        let provider = SuggestionProvider::new(&keys, &[]);
        let ops = provider.operators(&filter("browser.name:firefox"));
        assert_eq!(ops.values(), vec!["is", "is not"]);
        let ops = provider.operators(&filter("age:-24h"));
        assert!(ops.values().contains(&"is on or before"));

        let marked: Vec<_> = ops
            .iter()
            .filter(|s| s.description.as_deref() == Some("current"))
            .map(|s| s.value.as_str())
            .collect();
        assert_eq!(marked, vec!["is after"]);
        let ops = provider.operators(&filter("!browser.name:firefox"));
        assert_eq!(ops.get(1).and_then(|s| s.description.as_deref()), Some("current"));
        assert_eq!(ops.get(0).and_then(|s| s.description.as_deref()), None);
    }

    #[test]
    fn predefined_values() {
        let keys = keys();
        let provider = SuggestionProvider::new(&keys, &[]);
        let values = provider.values(&filter("is:"), "un", None);
        assert_eq!(values.values(), vec!["unresolved"]);
        assert_eq!(values.sections[0].label.as_deref(), Some("Suggested"));

        let values = provider.values(&filter("level:"), "", None);
        assert_eq!(values.sections[0].label.as_deref(), Some("Severity"));
        assert_eq!(values.values(), vec!["error", "warning"]);
    }

    #[test]
    fn typed_values() {
        let keys = keys();
        let provider = SuggestionProvider::new(&keys, &[]);
        assert_eq!(
            provider.values(&filter("measurements.cls:"), "5", None).values(),
            vec!["5", "5k", "5m", "5b"]
        );
        assert_eq!(
            provider
                .values(&filter("transaction.duration:"), "7", None)
                .values(),
            vec!["7ms", "7s", "7m", "7h", "7d", "7w"]
        );
        assert_eq!(
            provider
                .values(&filter("transaction.duration:"), "7m", None)
                .values(),
            vec!["7ms", "7m"]
        );
        let rates = provider.values(&filter("rate:"), "70%", None);
        assert_eq!(rates.values(), vec!["0.7"]);
        assert_eq!(rates.get(0).map(|s| s.label.as_str()), Some("70%"));
    }

    #[test]
    fn date_values() {
        let keys = keys();
        let provider = SuggestionProvider::new(&keys, &[]);
        assert_eq!(
            provider.values(&filter("age:"), "", None).values(),
            vec!["-1h", "-24h", "-7d", "-14d", "-30d"]
        );
        assert_eq!(
            provider.values(&filter("age:"), "3", None).values(),
            vec!["-3m", "-3h", "-3d", "-3w"]
        );
        assert_eq!(
            provider.values(&filter("age:"), "+2d", None).values(),
            vec!["+2d"]
        );
        assert_eq!(
            provider.values(&filter("age:"), "2024-01-02", None).values(),
            vec!["2024-01-02T00:00:00Z"]
        );
    }

    #[test]
    fn has_values_are_keys() {
        let keys = keys();
        let provider = SuggestionProvider::new(&keys, &[]);
        assert_eq!(
            provider.values(&filter("has:"), "brow", None).values(),
            vec!["browser.name"]
        );
    }

    #[test]
    fn fetched_tag_values() {
        let keys = keys();
        let provider = SuggestionProvider::new(&keys, &[]);
        let fetched = vec!["Chrome".to_string(), "Firefox".to_string()];
        assert_eq!(
            provider
                .values(&filter("browser.name:"), "fire", Some(&fetched))
                .values(),
            vec!["Firefox"]
        );
        assert!(provider.values(&filter("browser.name:"), "", None).is_empty());
    }

    #[test]
    fn parameters() {
        let keys = keys();
        let provider = SuggestionProvider::new(&keys, &[]);
        let f = filter("count_if():>5");
        assert_eq!(
            provider.parameters(&f, "trans").values(),
            vec!["transaction.duration"]
        );
        assert_eq!(
            provider.parameters(&f, "transaction.duration,le").values(),
            vec!["transaction.duration,less"]
        );
        assert!(provider.parameters(&f, "a,b,c").is_empty());
    }

    #[test]
    fn stale_fetches_are_discarded() {
        let mut tracker = FetchTracker::default();
        let first = tracker.begin("browser.name", "f");
        let second = tracker.begin("browser.name", "fi");

        assert!(!tracker.resolve(&first, Ok::<_, String>(vec!["Safari".into()])));
        assert!(tracker.values_for("browser.name").is_none());

        assert!(tracker.resolve(&second, Ok::<_, String>(vec!["Firefox".into()])));
        assert_eq!(
            tracker.values_for("browser.name"),
            Some(&["Firefox".to_string()][..])
        );

        let third = tracker.begin("browser.name", "x");
        tracker.invalidate();
        assert!(!tracker.resolve(&third, Err("timeout")));
        assert!(tracker.values_for("browser.name").is_none());
    }

    #[test]
    fn failed_fetch_loads_nothing() {
        let mut tracker = FetchTracker::default();
        let ticket = tracker.begin("release", "");
        assert!(tracker.resolve(&ticket, Err("boom")));
        assert_eq!(tracker.values_for("release"), Some(&[][..]));
    }
}
