/*!
# Recent Searches

Searches confirmed by the user are remembered per [`SavedSearchType`] and
offered back as key suggestions. Storage goes through the
[`KeyValueStore`] seam: [`MemoryStore`] keeps entries for the lifetime of
the process and [`JsonFileStore`] persists them as a JSON object on disk.
*/
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Maximum number of searches remembered per scope.
pub const MAX_RECENT_SEARCHES: usize = 10;

/// Scope recent searches are stored under.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SavedSearchType {
    /// Issue stream
    Issue,
    /// Event list
    Event,
    /// Session list
    Session,
    /// Replay list
    Replay,
    /// Metric explorer
    Metric,
    /// Span explorer
    Span,
}

impl SavedSearchType {
    /// Storage key of the scope.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::Issue => "recent-searches:issue",
            Self::Event => "recent-searches:event",
            Self::Session => "recent-searches:session",
            Self::Replay => "recent-searches:replay",
            Self::Metric => "recent-searches:metric",
            Self::Span => "recent-searches:span",
        }
    }
}

/// Errors raised by a [`KeyValueStore`].
#[derive(Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    Io(std::io::Error),
    /// Stored data is not in the expected shape
    Format(serde_json::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "Store I/O error: {err}"),
            Self::Format(err) => write!(f, "Malformed store data: {err}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Format(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(err)
    }
}

/// String key-value storage.
pub trait KeyValueStore {
    /// Value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backing storage cannot be written.
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;
}

/// In-memory [`KeyValueStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// [`KeyValueStore`] backed by a JSON object in a file. A missing file is
/// an empty store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `path`; the file is created on first write.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(BTreeMap::new())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value);
        let text = serde_json::to_string_pretty(&entries)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

/// Recent searches of one scope, most recent first.
#[derive(Debug)]
pub struct RecentSearches<S> {
    store: S,
    scope: SavedSearchType,
}

impl<S: KeyValueStore> RecentSearches<S> {
    /// Recent searches of `scope` kept in `store`.
    pub const fn new(store: S, scope: SavedSearchType) -> Self {
        Self { store, scope }
    }

    /// The scope searches are recorded under.
    pub const fn scope(&self) -> SavedSearchType {
        self.scope
    }

    /// Remembered searches, most recent first. Storage errors are logged
    /// and read as an empty list.
    pub fn list(&self) -> Vec<String> {
        let stored = match self.store.get(self.scope.storage_key()) {
            Ok(stored) => stored,
            Err(err) => {
                log::warn!("could not read recent searches: {err}");
                return vec![];
            }
        };
        stored
            .map(|text| {
                serde_json::from_str::<Vec<String>>(&text).unwrap_or_else(
                    |err| {
                        log::warn!("discarding malformed recent searches: {err}");
                        vec![]
                    },
                )
            })
            .unwrap_or_default()
    }

    /// Remembers `query` as the most recent search. Blank queries are
    /// ignored and a repeated query moves to the front.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be written.
    pub fn record(&mut self, query: &str) -> Result<(), StoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(());
        }
        let mut searches = self.list();
        searches.retain(|q| q != query);
        searches.insert(0, query.to_string());
        searches.truncate(MAX_RECENT_SEARCHES);
        log::debug!("recording recent search {query:?} ({:?})", self.scope);
        self.store.set(
            self.scope.storage_key(),
            serde_json::to_string(&searches)?,
        )
    }

    /// Remembered searches containing `partial`, case-insensitively.
    pub fn matching(&self, partial: &str) -> Vec<String> {
        let partial = partial.trim().to_lowercase();
        self.list()
            .into_iter()
            .filter(|q| q.to_lowercase().contains(&partial))
            .collect()
    }

    /// Consumes the list, returning the store.
    pub fn into_store(self) -> S {
        self.store
    }
}
