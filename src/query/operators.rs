/*!
# Filter Operators

The operators offered for a filter depend on the type of its key. They map
onto the query string through a negation flag, a comparison prefix and,
for relative dates, the sign of the value:

| Operator          | String     | Numeric    | Date (relative) | Date (absolute) |
|-------------------|------------|------------|-----------------|-----------------|
| is                | `k:v`      | `k:v`      | -               | `k:v`           |
| is not            | `!k:v`     | `!k:v`     | -               | `!k:v`          |
| `>` `>=` `<` `<=` | if allowed | `k:>v` ... | -               | -               |
| is after          | -          | -          | `k:-24h`        | `k:>v`          |
| is before         | -          | -          | `k:+24h`        | `k:<v`          |
| is on or after    | -          | -          | -               | `k:>=v`         |
| is on or before   | -          | -          | -               | `k:<=v`         |
*/
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Display;

use crate::query::{
    Comparison, DateValue, Filter, FilterKey, RelativeSign, format_timestamp,
    parse_date,
};
use crate::schema::{FilterKeys, HAS_KEY, ValueType};

/// An operator as offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorChoice {
    /// is
    Is,
    /// is not
    IsNot,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// is after
    IsAfter,
    /// is before
    IsBefore,
    /// is on or after
    IsOnOrAfter,
    /// is on or before
    IsOnOrBefore,
    /// has
    Has,
    /// does not have
    DoesNotHave,
}

impl OperatorChoice {
    /// Label shown in operator menus.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::IsAfter => "is after",
            Self::IsBefore => "is before",
            Self::IsOnOrAfter => "is on or after",
            Self::IsOnOrBefore => "is on or before",
            Self::Has => "has",
            Self::DoesNotHave => "does not have",
        }
    }

    /// Parses a menu label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        [
            Self::Is,
            Self::IsNot,
            Self::GreaterThan,
            Self::GreaterThanOrEqual,
            Self::LessThan,
            Self::LessThanOrEqual,
            Self::IsAfter,
            Self::IsBefore,
            Self::IsOnOrAfter,
            Self::IsOnOrBefore,
            Self::Has,
            Self::DoesNotHave,
        ]
        .into_iter()
        .find(|op| op.label().eq_ignore_ascii_case(label.trim()))
    }

    const fn comparison(self) -> Option<Comparison> {
        match self {
            Self::GreaterThan => Some(Comparison::GreaterThan),
            Self::GreaterThanOrEqual => Some(Comparison::GreaterThanOrEqual),
            Self::LessThan => Some(Comparison::LessThan),
            Self::LessThanOrEqual => Some(Comparison::LessThanOrEqual),
            _ => None,
        }
    }
}

impl Display for OperatorChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Operators offered for a filter on `key`.
#[must_use]
pub fn allowed_operators(keys: &FilterKeys, key: &FilterKey) -> Vec<OperatorChoice> {
    use OperatorChoice::{
        DoesNotHave, GreaterThan, GreaterThanOrEqual, Has, Is, IsAfter,
        IsBefore, IsNot, IsOnOrAfter, IsOnOrBefore, LessThan, LessThanOrEqual,
    };

    if key.name() == HAS_KEY {
        return vec![Has, DoesNotHave];
    }
    match keys.value_type(key) {
        ValueType::String if keys.allows_all_operators(key.name()) => vec![
            Is,
            IsNot,
            GreaterThan,
            GreaterThanOrEqual,
            LessThan,
            LessThanOrEqual,
        ],
        ValueType::String | ValueType::Boolean => vec![Is, IsNot],
        ValueType::Date => {
            vec![Is, IsNot, IsAfter, IsBefore, IsOnOrAfter, IsOnOrBefore]
        }
        ValueType::Number
        | ValueType::Integer
        | ValueType::Duration
        | ValueType::Percentage => vec![
            Is,
            IsNot,
            GreaterThan,
            GreaterThanOrEqual,
            LessThan,
            LessThanOrEqual,
        ],
    }
}

/// The operator a filter currently expresses.
#[must_use]
pub fn current_operator(filter: &Filter, value_type: ValueType) -> OperatorChoice {
    if filter.key.name() == HAS_KEY {
        return if filter.negated {
            OperatorChoice::DoesNotHave
        } else {
            OperatorChoice::Has
        };
    }

    if value_type == ValueType::Date {
        if let Some(DateValue::Relative { sign, .. }) =
            filter.first_value().and_then(parse_date)
            && !filter.negated
        {
            return match sign {
                RelativeSign::Past => OperatorChoice::IsAfter,
                RelativeSign::Older => OperatorChoice::IsBefore,
            };
        }
        return match filter.comparison {
            Comparison::Default if filter.negated => OperatorChoice::IsNot,
            Comparison::Default => OperatorChoice::Is,
            Comparison::GreaterThan => OperatorChoice::IsAfter,
            Comparison::GreaterThanOrEqual => OperatorChoice::IsOnOrAfter,
            Comparison::LessThan => OperatorChoice::IsBefore,
            Comparison::LessThanOrEqual => OperatorChoice::IsOnOrBefore,
        };
    }

    match filter.comparison {
        Comparison::Default if filter.negated => OperatorChoice::IsNot,
        Comparison::Default => OperatorChoice::Is,
        Comparison::GreaterThan => OperatorChoice::GreaterThan,
        Comparison::GreaterThanOrEqual => OperatorChoice::GreaterThanOrEqual,
        Comparison::LessThan => OperatorChoice::LessThan,
        Comparison::LessThanOrEqual => OperatorChoice::LessThanOrEqual,
    }
}

/// Comparison a new filter of `value_type` starts with.
#[must_use]
pub const fn default_comparison(value_type: ValueType) -> Comparison {
    match value_type {
        ValueType::Number
        | ValueType::Integer
        | ValueType::Duration
        | ValueType::Percentage => Comparison::GreaterThan,
        ValueType::String | ValueType::Date | ValueType::Boolean => {
            Comparison::Default
        }
    }
}

/// A new filter on `key` with its default operator and value. Function keys
/// without parameters get the parameter defaults of their schema.
#[must_use]
pub fn default_filter(keys: &FilterKeys, key: FilterKey) -> Filter {
    let key = match key {
        FilterKey::Function { name, parameters } if parameters.is_empty() => {
            let parameters = keys
                .get(&name)
                .map(|d| {
                    d.parameters
                        .iter()
                        .map(|p| p.default_value.clone().unwrap_or_default())
                        .collect()
                })
                .unwrap_or_default();
            FilterKey::Function { name, parameters }
        }
        key => key,
    };
    let value_type = keys.value_type(&key);
    let value = keys.default_value(&key);
    let comparison = if key.name() == HAS_KEY {
        Comparison::Default
    } else {
        default_comparison(value_type)
    };
    Filter::with_key(key).comparison(comparison).value(value)
}

/// Apply an operator to a filter.
///
/// Date filters keep relative values relative for "is after" / "is before"
/// by flipping the value's sign, and convert them to an absolute timestamp
/// for every other operator since relative dates only express those two.
/// A date filter without a usable value becomes `now`.
pub fn apply_operator(
    filter: &mut Filter,
    choice: OperatorChoice,
    value_type: ValueType,
    now: DateTime<Utc>,
) {
    match choice {
        OperatorChoice::Has | OperatorChoice::DoesNotHave => {
            filter.negated = choice == OperatorChoice::DoesNotHave;
            filter.comparison = Comparison::Default;
        }
        _ if value_type == ValueType::Date => {
            apply_date_operator(filter, choice, now);
        }
        OperatorChoice::Is | OperatorChoice::IsNot => {
            filter.negated = choice == OperatorChoice::IsNot;
            filter.comparison = Comparison::Default;
        }
        _ => {
            filter.negated = false;
            filter.comparison = choice.comparison().unwrap_or_default();
        }
    }
}

fn apply_date_operator(
    filter: &mut Filter,
    choice: OperatorChoice,
    now: DateTime<Utc>,
) {
    let current = filter.first_value().and_then(parse_date);
    filter.negated = choice == OperatorChoice::IsNot;

    match (choice, current) {
        (OperatorChoice::IsAfter, Some(date @ DateValue::Relative { .. })) => {
            filter.comparison = Comparison::Default;
            filter.set_values(vec![date.with_sign(RelativeSign::Past).to_string()]);
        }
        (OperatorChoice::IsBefore, Some(date @ DateValue::Relative { .. })) => {
            filter.comparison = Comparison::Default;
            filter.set_values(vec![date.with_sign(RelativeSign::Older).to_string()]);
        }
        (_, current) => {
            let absolute = current
                .and_then(|date| date.resolve(now))
                .unwrap_or(now);
            filter.comparison = match choice {
                OperatorChoice::IsAfter => Comparison::GreaterThan,
                OperatorChoice::IsBefore => Comparison::LessThan,
                OperatorChoice::IsOnOrAfter => Comparison::GreaterThanOrEqual,
                OperatorChoice::IsOnOrBefore => Comparison::LessThanOrEqual,
                _ => Comparison::Default,
            };
            if !matches!(current, Some(DateValue::Absolute(_))) {
                filter.set_values(vec![format_timestamp(absolute)]);
            }
        }
    }
}

/// Set a date value, keeping the operator meaningful: a relative value
/// drops any comparison prefix, and its sign follows the direction the
/// operator had ("before" operators make it `+`, everything else `-`).
pub fn apply_date_value(filter: &mut Filter, date: DateValue) {
    match date {
        DateValue::Relative { .. } => {
            let sign = match filter.comparison {
                Comparison::LessThan | Comparison::LessThanOrEqual => {
                    Some(RelativeSign::Older)
                }
                Comparison::GreaterThan | Comparison::GreaterThanOrEqual => {
                    Some(RelativeSign::Past)
                }
                Comparison::Default => None,
            };
            let date = sign.map_or(date, |sign| date.with_sign(sign));
            filter.comparison = Comparison::Default;
            filter.set_values(vec![date.to_string()]);
        }
        DateValue::Absolute(ts) => {
            if filter.comparison == Comparison::Default
                && let Some(DateValue::Relative { sign, .. }) =
                    filter.first_value().and_then(parse_date)
            {
                // keep the direction the relative value expressed
                filter.comparison = match sign {
                    RelativeSign::Past => Comparison::GreaterThan,
                    RelativeSign::Older => Comparison::LessThan,
                };
            }
            filter.set_values(vec![format_timestamp(ts)]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_filter;
    use crate::schema::FilterKeyDescriptor;
    use chrono::TimeZone;

    fn keys() -> FilterKeys {
        let mut keys = FilterKeys::default();
        keys.insert("browser.name", FilterKeyDescriptor::default());
        for (name, value_type) in [
            ("age", ValueType::Date),
            ("count", ValueType::Number),
            ("duration", ValueType::Duration),
            ("rate", ValueType::Percentage),
            ("flag", ValueType::Boolean),
        ] {
            keys.insert(
                name,
                FilterKeyDescriptor {
                    value_type: Some(value_type),
                    ..Default::default()
                },
            );
        }
        keys
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
    }

    fn filter(word: &str) -> Filter {
        parse_filter(word).unwrap_or_else(|| panic!("{word}"))
    }

    #[test]
    fn operator_sets() {
        let keys = keys();
        assert_eq!(
            allowed_operators(&keys, &FilterKey::simple("browser.name")),
            vec![OperatorChoice::Is, OperatorChoice::IsNot]
        );
        assert_eq!(
            allowed_operators(&keys, &FilterKey::simple("count")).len(),
            6
        );
        assert!(
            allowed_operators(&keys, &FilterKey::simple("age"))
                .contains(&OperatorChoice::IsOnOrAfter)
        );
        assert_eq!(
            allowed_operators(&keys, &FilterKey::simple("has")),
            vec![OperatorChoice::Has, OperatorChoice::DoesNotHave]
        );
    }

    #[test]
    fn is_not_negates() {
        let mut f = filter("browser.name:firefox");
        apply_operator(&mut f, OperatorChoice::IsNot, ValueType::String, now());
        assert_eq!(f.to_string(), "!browser.name:firefox");
        assert_eq!(current_operator(&f, ValueType::String), OperatorChoice::IsNot);
        apply_operator(&mut f, OperatorChoice::Is, ValueType::String, now());
        assert_eq!(f.to_string(), "browser.name:firefox");
    }

    #[test]
    fn numeric_comparisons() {
        let mut f = filter("!count:5");
        apply_operator(&mut f, OperatorChoice::LessThanOrEqual, ValueType::Number, now());
        assert_eq!(f.to_string(), "count:<=5");
        assert_eq!(
            current_operator(&f, ValueType::Number),
            OperatorChoice::LessThanOrEqual
        );
    }

    #[test]
    fn relative_dates_flip_sign() {
        let mut f = filter("age:-24h");
        assert_eq!(current_operator(&f, ValueType::Date), OperatorChoice::IsAfter);
        apply_operator(&mut f, OperatorChoice::IsBefore, ValueType::Date, now());
        assert_eq!(f.to_string(), "age:+24h");
        assert_eq!(current_operator(&f, ValueType::Date), OperatorChoice::IsBefore);
    }

    #[test]
    fn inclusive_operators_force_absolute_dates() {
        let mut f = filter("age:-24h");
        apply_operator(&mut f, OperatorChoice::IsOnOrAfter, ValueType::Date, now());
        assert_eq!(f.to_string(), "age:>=2024-01-01T00:00:00Z");
        assert_eq!(
            current_operator(&f, ValueType::Date),
            OperatorChoice::IsOnOrAfter
        );

        let mut f = filter("age:");
        apply_operator(&mut f, OperatorChoice::IsOnOrBefore, ValueType::Date, now());
        assert_eq!(f.to_string(), "age:<=2024-01-02T00:00:00Z");
    }

    #[test]
    fn absolute_dates_use_comparisons() {
        let mut f = filter("age:>=2024-01-01T00:00:00Z");
        apply_operator(&mut f, OperatorChoice::IsBefore, ValueType::Date, now());
        assert_eq!(f.to_string(), "age:<2024-01-01T00:00:00Z");
    }

    #[test]
    fn relative_value_after_absolute_operator() {
        let mut f = filter("age:<=2024-01-01T00:00:00Z");
        let date = parse_date("-7d").unwrap_or_else(|| panic!("date"));
        apply_date_value(&mut f, date);
        assert_eq!(f.to_string(), "age:+7d");
        assert_eq!(current_operator(&f, ValueType::Date), OperatorChoice::IsBefore);

        let mut f = filter("age:>2024-01-01T00:00:00Z");
        apply_date_value(&mut f, date);
        assert_eq!(f.to_string(), "age:-7d");
        assert_eq!(current_operator(&f, ValueType::Date), OperatorChoice::IsAfter);
    }

    #[test]
    fn has_operators() {
        let mut f = filter("has:user.email");
        assert_eq!(current_operator(&f, ValueType::String), OperatorChoice::Has);
        apply_operator(&mut f, OperatorChoice::DoesNotHave, ValueType::String, now());
        assert_eq!(f.to_string(), "!has:user.email");
    }

    #[test]
    fn default_filters() {
        let keys = keys();
        assert_eq!(
            default_filter(&keys, FilterKey::simple("count")).to_string(),
            "count:>100"
        );
        assert_eq!(
            default_filter(&keys, FilterKey::simple("rate")).to_string(),
            "rate:>0.5"
        );
        assert_eq!(
            default_filter(&keys, FilterKey::simple("age")).to_string(),
            "age:-24h"
        );
        assert_eq!(
            default_filter(&keys, FilterKey::simple("browser.name")).to_string(),
            r#"browser.name:"""#
        );
        assert_eq!(
            default_filter(&keys, FilterKey::simple("flag")).to_string(),
            "flag:true"
        );
    }

    #[test]
    fn labels_round_trip() {
        assert_eq!(
            OperatorChoice::from_label("is on or after"),
            Some(OperatorChoice::IsOnOrAfter)
        );
        assert_eq!(OperatorChoice::from_label("IS NOT"), Some(OperatorChoice::IsNot));
        assert_eq!(OperatorChoice::from_label("nope"), None);
    }
}
