//! Readers for `localStorage`, `sessionStorage` and `document.cookie`.
//!
//! In WASM these read the live page stores. Elsewhere they read a fixed
//! in-memory map so snapshot code can be exercised natively. Nothing here
//! writes to the page.
//!
//! # Example
//!
//! ```ignore
//! use pageprobe::browser::storage::{Storage, StorageType};
//!
//! let local = Storage::new(StorageType::Local);
//! let pairs = local.entries();
//! ```

use pageprobe_core::snapshot::{CookieSource, KeyValueArea};
#[cfg(not(target_arch = "wasm32"))]
use std::collections::BTreeMap;

/// Which page store to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageType {
    /// localStorage
    #[default]
    Local,
    /// sessionStorage
    Session,
}

impl StorageType {
    /// Window property name of the store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "localStorage",
            Self::Session => "sessionStorage",
        }
    }
}

/// Read-only view of one key/value page store.
///
/// A missing or blocked store (opaque origins, privacy modes) reads as empty.
#[derive(Debug)]
pub struct Storage {
    storage_type: StorageType,
    #[cfg(not(target_arch = "wasm32"))]
    memory: BTreeMap<String, String>,
}

impl Default for Storage {
    fn default() -> Self {
        Self::new(StorageType::Local)
    }
}

impl Storage {
    /// Reader for `storage_type`.
    #[must_use]
    pub fn new(storage_type: StorageType) -> Self {
        Self {
            storage_type,
            #[cfg(not(target_arch = "wasm32"))]
            memory: BTreeMap::new(),
        }
    }

    /// Reader over fixed `entries`.
    #[cfg(not(target_arch = "wasm32"))]
    #[must_use]
    pub fn with_entries<K, V>(storage_type: StorageType, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            storage_type,
            memory: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// localStorage reader.
    #[must_use]
    pub fn local() -> Self {
        Self::new(StorageType::Local)
    }

    /// sessionStorage reader.
    #[must_use]
    pub fn session() -> Self {
        Self::new(StorageType::Session)
    }

    /// Which store this reads.
    #[must_use]
    pub const fn storage_type(&self) -> StorageType {
        self.storage_type
    }

    /// Value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        #[cfg(target_arch = "wasm32")]
        {
            self.web_storage()?.get_item(key).ok()?
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.memory.get(key).cloned()
        }
    }

    /// Number of stored items; 0 when the store is unavailable.
    #[must_use]
    pub fn len(&self) -> usize {
        #[cfg(target_arch = "wasm32")]
        {
            self.web_storage().and_then(|s| s.length().ok()).unwrap_or(0) as usize
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.memory.len()
        }
    }

    /// Check if the store holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key at `index`.
    #[must_use]
    pub fn key(&self, index: usize) -> Option<String> {
        #[cfg(target_arch = "wasm32")]
        {
            let index = u32::try_from(index).ok()?;
            self.web_storage()?.key(index).ok()?
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.memory.keys().nth(index).cloned()
        }
    }

    /// Every key, in store order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        (0..self.len()).filter_map(|i| self.key(i)).collect()
    }

    #[cfg(target_arch = "wasm32")]
    fn web_storage(&self) -> Option<web_sys::Storage> {
        let window = web_sys::window()?;
        match self.storage_type {
            StorageType::Local => window.local_storage().ok()?,
            StorageType::Session => window.session_storage().ok()?,
        }
    }
}

impl KeyValueArea for Storage {
    fn entries(&self) -> Vec<(String, String)> {
        self.keys()
            .into_iter()
            .filter_map(|key| {
                let value = self.get(&key)?;
                Some((key, value))
            })
            .collect()
    }
}

/// The document's cookie string.
#[derive(Debug, Default)]
pub struct Cookies {
    #[cfg(not(target_arch = "wasm32"))]
    raw: String,
}

impl Cookies {
    /// Reader for the current document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader over a fixed cookie string.
    #[cfg(not(target_arch = "wasm32"))]
    #[must_use]
    pub fn with(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

impl CookieSource for Cookies {
    fn cookie_string(&self) -> String {
        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            web_sys::window()
                .and_then(|w| w.document())
                .and_then(|d| d.dyn_into::<web_sys::HtmlDocument>().ok())
                .and_then(|d| d.cookie().ok())
                .unwrap_or_default()
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.raw.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageprobe_core::{ManualClock, StorageInspector};
    use std::rc::Rc;

    #[test]
    fn test_storage_type_default() {
        assert_eq!(StorageType::default(), StorageType::Local);
        assert_eq!(StorageType::Session.as_str(), "sessionStorage");
    }

    #[test]
    fn test_storage_get() {
        let storage = Storage::with_entries(StorageType::Local, [("theme", "dark")]);
        assert_eq!(storage.get("theme"), Some("dark".to_string()));
        assert_eq!(storage.get("missing"), None);
        assert_eq!(storage.storage_type(), StorageType::Local);
    }

    #[test]
    fn test_storage_len_and_keys() {
        assert!(Storage::session().is_empty());
        let storage = Storage::with_entries(StorageType::Session, [("b", "2"), ("a", "1")]);
        assert_eq!(storage.len(), 2);
        assert_eq!(storage.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(storage.key(5), None);
    }

    #[test]
    fn test_storage_entries() {
        let storage = Storage::with_entries(StorageType::Local, [("token", "abc")]);
        assert_eq!(KeyValueArea::entries(&storage), vec![("token".to_string(), "abc".to_string())]);
    }

    #[test]
    fn test_cookies() {
        assert_eq!(Cookies::new().cookie_string(), "");
        assert_eq!(Cookies::with("a=1; b=2").cookie_string(), "a=1; b=2");
    }

    #[test]
    fn test_snapshot_from_stores() {
        let local = Storage::with_entries(StorageType::Local, [("user", "ada")]);
        let session = Storage::session();
        let cookies = Cookies::with("sid=42; flag");

        let inspector = StorageInspector::new(Rc::new(ManualClock::new(1_000.0)));
        let snapshot = inspector.capture(&local, &session, &cookies);

        assert_eq!(snapshot.local, vec![("user".to_string(), "ada".to_string())]);
        assert!(snapshot.session.is_empty());
        assert_eq!(
            snapshot.parsed_cookies(),
            vec![
                ("sid".to_string(), "42".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
        assert_eq!(snapshot.captured_at, 1_000.0);
    }
}
