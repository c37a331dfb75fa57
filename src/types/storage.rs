use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The two storage areas the extension uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    /// Durable area holding site records and globals.
    Local,
    /// Non-persistent area holding per-host session flags.
    Session,
}

impl StorageArea {
    pub fn table(&self) -> &'static str {
        match self {
            StorageArea::Local => "storage_local",
            StorageArea::Session => "storage_session",
        }
    }
}

/// Which keys a `get` should return.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySelector {
    All,
    One(String),
    Many(Vec<String>),
}

impl From<&str> for KeySelector {
    fn from(key: &str) -> Self {
        KeySelector::One(key.to_string())
    }
}

/// Old and new value of one key. `None` means absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// One change event: every key touched by a single store call.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub area: StorageArea,
    pub changes: BTreeMap<String, ValueChange>,
}

impl StorageChange {
    pub fn get(&self, key: &str) -> Option<&ValueChange> {
        self.changes.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }
}
