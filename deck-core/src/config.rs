//! # Configuration
//!
//! A string key/value store mirroring Feathers' `app.set()` / `app.get()`.
//! Hooks read a [`DeckConfigSnapshot`] taken when the call starts, so a
//! single call sees one consistent view.
//!
//! ```rust
//! use deck_core::DeckApp;
//! let app = DeckApp::<(), ()>::new();
//!
//! app.set("designs.onDelete", "orphan");
//! assert_eq!(app.get("designs.onDelete"), Some("orphan".to_string()));
//! ```

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct DeckConfig {
    values: HashMap<String, String>,
}

impl DeckConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn snapshot(&self) -> DeckConfigSnapshot {
        DeckConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeckConfigSnapshot {
    map: HashMap<String, String>,
}

impl DeckConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| match v.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        })
    }
}
