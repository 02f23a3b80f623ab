/*!
# Search Configuration

A [`SearchConfig`] bundles everything a host hands to the query builder:
the filter-key dictionary, menu sections, the validity toggles and message
overrides, and the scope recent searches are stored under.

Configurations are read from JSON, YAML (`yaml` feature) or TOML (`toml`
feature) files, chosen by file extension:

```json
{
  "filter_keys": {
    "is": { "values": ["resolved", "unresolved"], "default_value": "unresolved" },
    "transaction.duration": { "value_type": "duration" }
  },
  "validity": { "disallow_wildcard": true },
  "saved_search_type": "issue"
}
```
*/
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use crate::query::ValidityConfig;
use crate::recent::SavedSearchType;
use crate::schema::{FilterKeyDescriptor, FilterKeySection, FilterKeys};

/// Host configuration of a search bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Filter-key dictionary
    pub filter_keys: BTreeMap<String, FilterKeyDescriptor>,
    /// Menu grouping of the keys
    pub filter_key_sections: Vec<FilterKeySection>,
    /// Validity toggles and message overrides
    pub validity: ValidityConfig,
    /// Scope for recent searches; `None` disables them
    pub saved_search_type: Option<SavedSearchType>,
}

impl SearchConfig {
    /// Reads a configuration file, picking the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, its format is
    /// not supported, or its contents do not describe a configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let text = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::Io { path: path.to_path_buf(), source }
        })?;
        log::debug!("loading {format:?} config from {}", path.display());
        Self::from_str_with(&text, format).map_err(|message| {
            ConfigError::Parse { path: path.to_path_buf(), message }
        })
    }

    /// Parses configuration text in the given format.
    ///
    /// # Errors
    ///
    /// Returns the deserializer's message if `text` is not a valid
    /// configuration.
    pub fn from_str_with(
        text: &str,
        format: ConfigFormat,
    ) -> Result<Self, String> {
        match format {
            ConfigFormat::Json => {
                serde_json::from_str(text).map_err(|e| e.to_string())
            }
            #[cfg(feature = "yaml")]
            ConfigFormat::Yaml => {
                serde_yaml::from_str(text).map_err(|e| e.to_string())
            }
            #[cfg(feature = "toml")]
            ConfigFormat::Toml => toml::from_str(text).map_err(|e| e.to_string()),
        }
    }

    /// Builds the filter-key dictionary.
    #[must_use]
    pub fn filter_keys(&self) -> FilterKeys {
        FilterKeys::new(self.filter_keys.clone())
            .with_sections(self.filter_key_sections.clone())
    }
}

/// File formats a configuration can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    #[cfg(feature = "yaml")]
    Yaml,
    /// `.toml`
    #[cfg(feature = "toml")]
    Toml,
}

impl ConfigFormat {
    /// Picks the format from a file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedFormat`] for unknown extensions and
    /// for formats whose cargo feature is disabled.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "json" => Ok(Self::Json),
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Ok(Self::Yaml),
            #[cfg(feature = "toml")]
            "toml" => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Errors raised while loading a [`SearchConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read
    Io {
        /// Path of the file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The file's contents are not a valid configuration
    Parse {
        /// Path of the file
        path: PathBuf,
        /// Deserializer message
        message: String,
    },
    /// The file extension names no supported format
    UnsupportedFormat(PathBuf),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Failed to read {}: {source}", path.display())
            }
            Self::Parse { path, message } => {
                write!(f, "Invalid configuration in {}: {message}", path.display())
            }
            Self::UnsupportedFormat(path) => {
                write!(
                    f,
                    "Unsupported configuration format: {}",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::InvalidReason;
    use crate::schema::ValueType;
    use std::io::Write;

    const JSON: &str = r#"{
        "filter_keys": {
            "is": { "values": ["resolved", "unresolved"], "default_value": "unresolved" },
            "transaction.duration": { "value_type": "duration" }
        },
        "filter_key_sections": [
            { "label": "Issue", "keys": ["is"] }
        ],
        "validity": {
            "disallow_wildcard": true,
            "invalid_messages": { "WILDCARD_NOT_ALLOWED": "No wildcards here" }
        },
        "saved_search_type": "issue"
    }"#;

    #[test]
    fn json_config() {
        let config = SearchConfig::from_str_with(JSON, ConfigFormat::Json)
            .expect("valid config");
        assert!(config.validity.disallow_wildcard);
        assert!(!config.validity.disallow_free_text);
        assert_eq!(
            config
                .validity
                .invalid_messages
                .get(&InvalidReason::WildcardNotAllowed)
                .map(String::as_str),
            Some("No wildcards here")
        );
        assert_eq!(config.saved_search_type, Some(SavedSearchType::Issue));

        let keys = config.filter_keys();
        assert_eq!(keys.sections().len(), 1);
        assert_eq!(
            keys.value_type(&crate::query::FilterKey::simple(
                "transaction.duration"
            )),
            ValueType::Duration
        );
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = SearchConfig::from_str_with("{}", ConfigFormat::Json)
            .expect("valid config");
        assert_eq!(config, SearchConfig::default());
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn yaml_config() {
        let yaml = "filter_keys:\n  is:\n    values: [resolved]\nvalidity:\n  disallow_free_text: true\n";
        let config = SearchConfig::from_str_with(yaml, ConfigFormat::Yaml)
            .expect("valid config");
        assert!(config.validity.disallow_free_text);
        assert!(config.filter_keys.contains_key("is"));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn toml_config() {
        let toml = "[validity]\ndisallow_parens = true\n\n[filter_keys.\"release\"]\nkind = \"tag\"\n";
        let config = SearchConfig::from_str_with(toml, ConfigFormat::Toml)
            .expect("valid config");
        assert!(config.validity.disallow_parens);
        assert!(config.filter_keys.contains_key("release"));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("temp file");
        file.write_all(JSON.as_bytes()).expect("write config");
        let config = SearchConfig::load(file.path()).expect("load config");
        assert!(config.filter_keys.contains_key("is"));
    }

    #[test]
    fn load_errors() {
        let err = SearchConfig::load("missing.json").expect_err("no file");
        assert!(matches!(err, ConfigError::Io { .. }));

        let err = SearchConfig::load("config.ini").expect_err("bad format");
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
        assert!(err.to_string().contains("config.ini"));
    }
}
