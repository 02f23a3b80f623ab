/*!
# Filter Key Dictionary

Describes the keys a search query may filter on: what kind of key each one
is, which values it offers, which parameters function-like keys take and
what type of value a key compares against. The dictionary is supplied by
the host and is read-only for the query builder.
*/
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::query::FilterKey;

/// Key that checks for the existence of another key (`has:user.email`).
pub const HAS_KEY: &str = "has";

/// Kind of a filter key.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FilterKeyKind {
    /// Built-in event field
    #[default]
    Field,
    /// Free-form tag
    Tag,
    /// Aggregate function such as `count_if(...)`
    Function,
}

/// Type of the values a key compares against.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Text
    #[default]
    String,
    /// Number with optional magnitude suffix
    Number,
    /// Whole number with optional magnitude suffix
    Integer,
    /// Number with a duration unit
    Duration,
    /// Ratio, or number with a trailing `%`
    Percentage,
    /// Relative or absolute date
    Date,
    /// `true` / `false`
    Boolean,
}

impl ValueType {
    /// Value a new filter of this type starts with.
    #[must_use]
    pub const fn default_value(self) -> &'static str {
        match self {
            Self::String => "",
            Self::Number | Self::Integer => "100",
            Self::Duration => "10ms",
            Self::Percentage => "0.5",
            Self::Date => "-24h",
            Self::Boolean => "true",
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Duration => "duration",
            Self::Percentage => "percentage",
            Self::Date => "date",
            Self::Boolean => "boolean",
        };
        write!(f, "{name}")
    }
}

/// Kind of a function parameter.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Name of another key (column)
    Column,
    /// Free value
    #[default]
    Value,
}

/// Schema of one parameter of a function-like key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionParameter {
    /// Parameter name, used in messages
    pub name: String,
    /// Column or value parameter
    #[serde(default)]
    pub kind: ParameterKind,
    /// For column parameters: value types of the columns accepted
    #[serde(default)]
    pub column_types: Vec<ValueType>,
    /// For value parameters: predefined options
    #[serde(default)]
    pub options: Vec<String>,
    /// Value a new filter starts with
    #[serde(default)]
    pub default_value: Option<String>,
    /// Whether the parameter must be set
    #[serde(default)]
    pub required: bool,
}

/// A titled group of predefined values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSection {
    /// Header shown above the values
    pub title: String,
    /// Values in the section
    pub values: Vec<String>,
}

/// Type information of a key, as returned by a [`FieldDefinitionGetter`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Type of the values the key compares against
    pub value_type: ValueType,
    /// Value a new filter starts with, overriding the type's default
    #[serde(default)]
    pub default_value: Option<String>,
    /// Short description
    #[serde(default)]
    pub description: Option<String>,
}

/// Description of a single filterable key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterKeyDescriptor {
    /// Kind of key
    #[serde(default)]
    pub kind: FilterKeyKind,
    /// Inline type information
    #[serde(default)]
    pub value_type: Option<ValueType>,
    /// Value a new filter starts with
    #[serde(default)]
    pub default_value: Option<String>,
    /// Short description
    #[serde(default)]
    pub description: Option<String>,
    /// Flat list of predefined values
    #[serde(default)]
    pub values: Vec<String>,
    /// Predefined values grouped under headers
    #[serde(default)]
    pub value_sections: Vec<ValueSection>,
    /// Parameters of function-like keys, in order
    #[serde(default)]
    pub parameters: Vec<FunctionParameter>,
    /// Index of the column parameter whose type becomes the result type of
    /// the function (`p95(transaction.duration)` is a duration)
    #[serde(default)]
    pub parameter_dependent_value_type: Option<usize>,
    /// Whether comparison operators are offered for string values
    #[serde(default)]
    pub allow_all_operators: bool,
}

impl FilterKeyDescriptor {
    /// Returns `true` if the key offers predefined values.
    #[must_use]
    pub fn has_predefined_values(&self) -> bool {
        !self.values.is_empty() || !self.value_sections.is_empty()
    }
}

/// An ordered group of keys used for menu grouping only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterKeySection {
    /// Section label
    pub label: String,
    /// Keys listed in the section
    pub keys: Vec<String>,
}

/// Source of [`FieldDefinition`]s for keys, supplied by the host.
pub trait FieldDefinitionGetter {
    /// Returns the definition of `key`, if the host knows it.
    fn field_definition(&self, key: &str) -> Option<FieldDefinition>;
}

impl<F> FieldDefinitionGetter for F
where
    F: Fn(&str) -> Option<FieldDefinition>,
{
    fn field_definition(&self, key: &str) -> Option<FieldDefinition> {
        self(key)
    }
}

/// The filter-key dictionary.
#[derive(Default)]
pub struct FilterKeys {
    keys: BTreeMap<String, FilterKeyDescriptor>,
    sections: Vec<FilterKeySection>,
    definitions: Option<Box<dyn FieldDefinitionGetter>>,
}

impl std::fmt::Debug for FilterKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterKeys")
            .field("keys", &self.keys)
            .field("sections", &self.sections)
            .field("definitions", &self.definitions.is_some())
            .finish()
    }
}

impl FilterKeys {
    /// Creates a dictionary from descriptors keyed by key name.
    #[must_use]
    pub const fn new(keys: BTreeMap<String, FilterKeyDescriptor>) -> Self {
        Self { keys, sections: Vec::new(), definitions: None }
    }

    /// Sets the menu sections.
    #[must_use]
    pub fn with_sections(mut self, sections: Vec<FilterKeySection>) -> Self {
        self.sections = sections;
        self
    }

    /// Sets a host field-definition lookup that takes precedence over the
    /// types declared inline in descriptors.
    #[must_use]
    pub fn with_field_definitions<G>(mut self, getter: G) -> Self
    where
        G: FieldDefinitionGetter + 'static,
    {
        self.definitions = Some(Box::new(getter));
        self
    }

    /// Adds or replaces a key.
    pub fn insert<T: Into<String>>(
        &mut self,
        key: T,
        descriptor: FilterKeyDescriptor,
    ) {
        self.keys.insert(key.into(), descriptor);
    }

    /// Descriptor of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FilterKeyDescriptor> {
        self.keys.get(key)
    }

    /// Returns `true` if `key` is known. `has` is always known.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        key == HAS_KEY || self.keys.contains_key(key)
    }

    /// All keys with their descriptors, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterKeyDescriptor)> {
        self.keys.iter()
    }

    /// Menu sections.
    #[must_use]
    pub fn sections(&self) -> &[FilterKeySection] {
        &self.sections
    }

    /// Returns `true` if the dictionary has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Type information of a plain key name.
    #[must_use]
    pub fn field_definition(&self, key: &str) -> Option<FieldDefinition> {
        if let Some(definition) = self
            .definitions
            .as_ref()
            .and_then(|getter| getter.field_definition(key))
        {
            return Some(definition);
        }
        let descriptor = self.keys.get(key)?;
        let value_type = descriptor.value_type.unwrap_or(
            if descriptor.kind == FilterKeyKind::Function {
                ValueType::Number
            } else {
                ValueType::String
            },
        );
        Some(FieldDefinition {
            value_type,
            default_value: descriptor.default_value.clone(),
            description: descriptor.description.clone(),
        })
    }

    /// Effective value type of a filter key.
    ///
    /// Function keys whose result depends on a column parameter take that
    /// column's type; unknown function keys are numeric and unknown plain
    /// keys are strings.
    #[must_use]
    pub fn value_type(&self, key: &FilterKey) -> ValueType {
        if key.name() == HAS_KEY {
            return ValueType::String;
        }
        if let FilterKey::Function { name, parameters } = key {
            if let Some(column) = self
                .keys
                .get(name)
                .and_then(|d| d.parameter_dependent_value_type)
                .and_then(|idx| parameters.get(idx))
                && let Some(definition) = self.field_definition(column)
            {
                return definition.value_type;
            }
            return self
                .field_definition(name)
                .map_or(ValueType::Number, |d| d.value_type);
        }
        self.field_definition(key.name())
            .map_or(ValueType::String, |d| d.value_type)
    }

    /// Whether comparison operators are allowed on string values of `key`.
    #[must_use]
    pub fn allows_all_operators(&self, key: &str) -> bool {
        self.keys.get(key).is_some_and(|d| d.allow_all_operators)
    }

    /// Value a new filter on `key` starts with.
    #[must_use]
    pub fn default_value(&self, key: &FilterKey) -> String {
        let value_type = self.value_type(key);
        // a function whose type comes from a parameter uses the type default
        if !key.parameters().is_empty()
            && self
                .keys
                .get(key.name())
                .is_some_and(|d| d.parameter_dependent_value_type.is_some())
        {
            return value_type.default_value().to_string();
        }
        self.field_definition(key.name())
            .and_then(|d| d.default_value)
            .unwrap_or_else(|| value_type.default_value().to_string())
    }

    /// Keys whose value type is one of `types`, used to suggest column
    /// parameters.
    #[must_use]
    pub fn columns_of_type(&self, types: &[ValueType]) -> Vec<&str> {
        self.keys
            .iter()
            .filter(|(_, d)| d.kind != FilterKeyKind::Function)
            .filter(|(name, _)| {
                types.is_empty()
                    || self
                        .field_definition(name)
                        .is_some_and(|d| types.contains(&d.value_type))
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> FilterKeys {
        let mut keys = FilterKeys::default();
        keys.insert(
            "browser.name",
            FilterKeyDescriptor {
                kind: FilterKeyKind::Tag,
                values: vec!["Chrome".into(), "Firefox".into()],
                ..Default::default()
            },
        );
        keys.insert(
            "transaction.duration",
            FilterKeyDescriptor {
                value_type: Some(ValueType::Duration),
                ..Default::default()
            },
        );
        keys.insert(
            "measurements.cls",
            FilterKeyDescriptor {
                value_type: Some(ValueType::Number),
                ..Default::default()
            },
        );
        keys.insert(
            "is",
            FilterKeyDescriptor {
                default_value: Some("unresolved".into()),
                values: vec!["resolved".into(), "unresolved".into()],
                ..Default::default()
            },
        );
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

    #[test]
    fn value_types() {
        let keys = keys();
        assert_eq!(
            keys.value_type(&FilterKey::simple("browser.name")),
            ValueType::String
        );
        assert_eq!(
            keys.value_type(&FilterKey::simple("transaction.duration")),
            ValueType::Duration
        );
        assert_eq!(
            keys.value_type(&FilterKey::simple("unknown")),
            ValueType::String
        );
        assert_eq!(
            keys.value_type(&FilterKey::function("count", vec![])),
            ValueType::Number
        );
    }

    #[test]
    fn parameter_dependent_types() {
        let keys = keys();
        let duration =
            FilterKey::function("p95", vec!["transaction.duration".into()]);
        let number =
            FilterKey::function("p95", vec!["measurements.cls".into()]);
        assert_eq!(keys.value_type(&duration), ValueType::Duration);
        assert_eq!(keys.value_type(&number), ValueType::Number);
        assert_eq!(keys.default_value(&duration), "10ms");
        assert_eq!(keys.default_value(&number), "100");
    }

    #[test]
    fn default_values() {
        let keys = keys();
        assert_eq!(keys.default_value(&FilterKey::simple("is")), "unresolved");
        assert_eq!(keys.default_value(&FilterKey::simple("browser.name")), "");
    }

    #[test]
    fn host_definitions_take_precedence() {
        let keys = keys().with_field_definitions(|key: &str| {
            (key == "browser.name").then(|| FieldDefinition {
                value_type: ValueType::Boolean,
                ..Default::default()
            })
        });
        assert_eq!(
            keys.value_type(&FilterKey::simple("browser.name")),
            ValueType::Boolean
        );
    }

    #[test]
    fn columns_filtered_by_type() {
        let keys = keys();
        assert_eq!(
            keys.columns_of_type(&[ValueType::Duration, ValueType::Number]),
            vec!["measurements.cls", "transaction.duration"]
        );
        assert!(keys.contains("has"));
        assert!(!keys.contains("nope"));
    }
}
