//! Durable per-adapter records. The daemon persists peer metadata (names,
//! link keys, classes, aliases, timestamps) and a handful of local settings
//! through this interface; the on-disk representation belongs to the
//! embedder. Keys are matched case-insensitively, like the text files the
//! original storage used.

pub use records::*;

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

mod records;

/// Record categories, one per storage file in the classic layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Category {
    /// `<compid> <version> <subversion>` per peer.
    Manufacturers,
    /// 16 hex characters of remote feature bits per peer.
    Features,
    /// Cached remote device names.
    Names,
    /// User-assigned aliases.
    Aliases,
    /// Timestamp a peer was last seen in an inquiry.
    LastSeen,
    /// Timestamp a peer connection was last set up.
    LastUsed,
    /// `<key> <type> <pin length>` per bonded peer.
    LinkKeys,
    /// Remote class-of-device values.
    Classes,
    /// Local adapter settings (scan mode, timeout, name, class).
    Config,
}

pub const CONFIG_MODE: &str = "mode";
pub const CONFIG_DISCOVERABLE_TIMEOUT: &str = "discovto";
pub const CONFIG_NAME: &str = "name";
pub const CONFIG_CLASS: &str = "class";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {:?}.", source)]
    Io {
        #[source]
        source: std::io::Error,
    },
}

impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        let code = match err {
            StoreError::Io { source } => source.raw_os_error().unwrap_or(libc::EIO),
        };
        crate::Error::Failed { code }
    }
}

/// Key-value record store scoped to one local adapter.
pub trait DeviceStore: Send + Sync {
    fn get(&self, category: Category, key: &str) -> Option<String>;

    fn put(&self, category: Category, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing an absent record is not an error.
    fn remove(&self, category: Category, key: &str) -> Result<(), StoreError>;

    /// All keys in a category, in stable (sorted) order.
    fn keys(&self, category: Category) -> Vec<String>;
}

/// In-memory [`DeviceStore`]. The reference implementation used by embedders
/// that bring their own persistence, and by the test suite. Keys keep the
/// spelling they were stored under but match case-insensitively.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Category, BTreeMap<String, (String, String)>>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn normalize(key: &str) -> String {
        key.to_ascii_lowercase()
    }
}

impl DeviceStore for MemoryStore {
    fn get(&self, category: Category, key: &str) -> Option<String> {
        let records = self.records.lock().unwrap();
        records
            .get(&category)
            .and_then(|map| map.get(&Self::normalize(key)))
            .map(|(_, value)| value.clone())
    }

    fn put(&self, category: Category, key: &str, value: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        records.entry(category).or_insert_with(BTreeMap::new).insert(
            Self::normalize(key),
            (key.to_owned(), value.to_owned()),
        );
        Ok(())
    }

    fn remove(&self, category: Category, key: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        if let Some(map) = records.get_mut(&category) {
            map.remove(&Self::normalize(key));
        }
        Ok(())
    }

    fn keys(&self, category: Category) -> Vec<String> {
        let records = self.records.lock().unwrap();
        records
            .get(&category)
            .map(|map| map.values().map(|(key, _)| key.clone()).collect())
            .unwrap_or_default()
    }
}
