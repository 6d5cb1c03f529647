//! Storage layer for keyword replies
//!
//! Keeps the keyword → response mapping in memory and mirrors every change
//! into a JSON snapshot on disk. The snapshot is rewritten wholesale through a
//! temporary file and a rename, so a crash mid-write never leaves a torn file.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Keyword is empty after trimming whitespace
    #[error("Keyword cannot be empty")]
    InvalidKeyword,
    /// Snapshot could not be read or written
    #[error("Storage unavailable: IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Snapshot could not be parsed or serialized
    #[error("Storage unavailable: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    /// Returns `true` for persistence failures (as opposed to bad input)
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Json(_))
    }
}

/// Normalizes a keyword for storage and lookup: trims and lowercases it.
///
/// # Examples
///
/// ```
/// use keyword_reply_bot::storage::normalize_keyword;
///
/// assert_eq!(normalize_keyword("  Promo \n"), "promo");
/// ```
#[must_use]
pub fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// A stored keyword and the response sent when it matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordEntry {
    /// Normalized trigger text
    pub keyword: String,
    /// Response text, sent verbatim
    pub response: String,
}

/// Result of a successful [`KeywordStore::set`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The keyword did not exist before
    Added,
    /// The keyword existed and its response was overwritten
    Replaced,
}

/// Insertion-ordered keyword list. Serialized as a single JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Entries(Vec<KeywordEntry>);

impl Entries {
    fn position(&self, keyword: &str) -> Option<usize> {
        self.0.iter().position(|entry| entry.keyword == keyword)
    }

    fn get(&self, keyword: &str) -> Option<&str> {
        self.position(keyword)
            .map(|index| self.0[index].response.as_str())
    }

    fn upsert(&mut self, keyword: String, response: String) -> SetOutcome {
        if let Some(index) = self.position(&keyword) {
            self.0[index].response = response;
            SetOutcome::Replaced
        } else {
            self.0.push(KeywordEntry { keyword, response });
            SetOutcome::Added
        }
    }

    fn remove(&mut self, keyword: &str) -> bool {
        match self.position(keyword) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }
}

impl Serialize for Entries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.keyword, &entry.response)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Entries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Entries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping keywords to responses")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Entries, A::Error> {
                let mut entries = Entries::default();
                while let Some((keyword, response)) = access.next_entry::<String, String>()? {
                    let normalized = normalize_keyword(&keyword);
                    if normalized.is_empty() {
                        warn!("Skipping empty keyword in snapshot");
                        continue;
                    }
                    // Later duplicates win, same as repeated `set` calls.
                    entries.upsert(normalized, response);
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Keyword → response store backed by a JSON file.
///
/// Reads share a lock and always see a complete mapping. Mutations are
/// serialized, written to disk first and only then published to readers, so a
/// failed save leaves the in-memory mapping untouched.
pub struct KeywordStore {
    path: PathBuf,
    entries: RwLock<Entries>,
    write_lock: Mutex<()>,
}

impl KeywordStore {
    /// Loads the store from `path`.
    ///
    /// A missing file yields an empty store; the file is created on the first
    /// mutation.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] or [`StorageError::Json`] if the file
    /// exists but cannot be read or parsed. Callers must not fall back to an
    /// empty store in that case: the next save would overwrite the file.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str::<Entries>(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No keyword snapshot at {}, starting empty.", path.display());
                Entries::default()
            }
            Err(e) => return Err(e.into()),
        };

        debug!("Keyword snapshot {} loaded.", path.display());

        Ok(Self {
            path,
            entries: RwLock::new(entries),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the backing snapshot
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stores `response` under the normalized `keyword`, overwriting any
    /// previous response, and persists the whole mapping.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKeyword`] for a blank keyword, or a
    /// persistence error if the snapshot cannot be written.
    pub async fn set(&self, keyword: &str, response: &str) -> Result<SetOutcome, StorageError> {
        let keyword = normalize_keyword(keyword);
        if keyword.is_empty() {
            return Err(StorageError::InvalidKeyword);
        }

        let _guard = self.write_lock.lock().await;
        let mut next = self.entries.read().await.clone();
        let outcome = next.upsert(keyword.clone(), response.to_string());

        self.persist(&next).await?;
        *self.entries.write().await = next;

        info!("Keyword '{keyword}' saved ({outcome:?}).");
        Ok(outcome)
    }

    /// Removes the normalized `keyword`. Returns whether it existed.
    ///
    /// Nothing is written when the keyword is absent.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the snapshot cannot be written.
    pub async fn delete(&self, keyword: &str) -> Result<bool, StorageError> {
        let keyword = normalize_keyword(keyword);

        let _guard = self.write_lock.lock().await;
        let mut next = self.entries.read().await.clone();
        if !next.remove(&keyword) {
            debug!("Keyword '{keyword}' not found for deletion.");
            return Ok(false);
        }

        self.persist(&next).await?;
        *self.entries.write().await = next;

        info!("Keyword '{keyword}' removed.");
        Ok(true)
    }

    /// Looks up the response for the normalized `keyword`
    pub async fn get(&self, keyword: &str) -> Option<String> {
        let keyword = normalize_keyword(keyword);
        self.entries.read().await.get(&keyword).map(str::to_string)
    }

    /// Snapshot of all entries in insertion order
    pub async fn list(&self) -> Vec<KeywordEntry> {
        self.entries.read().await.0.clone()
    }

    /// Number of stored keywords
    pub async fn len(&self) -> usize {
        self.entries.read().await.0.len()
    }

    /// Returns `true` if no keywords are stored
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.0.is_empty()
    }

    async fn persist(&self, entries: &Entries) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.tmp_path();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(json.as_bytes()).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp_path, &self.path).await
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        debug!(
            "Keyword snapshot written to {} ({} bytes)",
            self.path.display(),
            json.len()
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_else(|| "keywords".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
