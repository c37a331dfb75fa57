//! Settings Store for Typeset.
//!
//! A key-value map with two areas backed by SQLite. Every call that changes
//! something emits one [`StorageChange`] carrying all keys it touched, delivered
//! in order to each subscriber's channel.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::database::connection::Database;
use crate::types::errors::StorageError;
use crate::types::settings::{
    is_site_key, GlobalSettings, SessionFlag, SiteSettings, GLOBAL_KEYS,
};
use crate::types::storage::{KeySelector, StorageArea, StorageChange, ValueChange};

/// Largest serialized size of one key plus its value.
pub const QUOTA_BYTES_PER_ITEM: usize = 8192;

/// Trait defining the settings store interface.
pub trait SettingsStoreTrait {
    fn get(&self, area: StorageArea, keys: KeySelector) -> Result<Map<String, Value>, StorageError>;
    fn set(&self, area: StorageArea, items: Map<String, Value>) -> Result<(), StorageError>;
    fn remove(&self, area: StorageArea, key: &str) -> Result<(), StorageError>;
    fn clear(&self, area: StorageArea) -> Result<(), StorageError>;
    /// Returns a channel that receives every subsequent change event.
    fn subscribe(&self) -> Receiver<StorageChange>;

    /// Reads one site record. Missing and all-empty records both return `None`.
    fn get_site(&self, host: &str) -> Result<Option<SiteSettings>, StorageError> {
        let map = self.get(StorageArea::Local, KeySelector::from(host))?;
        Ok(map
            .get(host)
            .map(SiteSettings::from_value)
            .filter(|record| !record.is_empty()))
    }

    /// Writes one site record under its host key.
    fn set_site(&self, record: &SiteSettings) -> Result<(), StorageError> {
        let mut items = Map::new();
        items.insert(record.host.clone(), record.to_value());
        self.set(StorageArea::Local, items)
    }

    /// Lists every site key, sorted by hostname.
    fn site_keys(&self) -> Result<Vec<String>, StorageError> {
        let map = self.get(StorageArea::Local, KeySelector::All)?;
        let mut keys: Vec<String> = map.keys().filter(|k| is_site_key(k)).cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn get_globals(&self) -> Result<GlobalSettings, StorageError> {
        let keys = GLOBAL_KEYS.iter().map(|k| k.to_string()).collect();
        let map = self.get(StorageArea::Local, KeySelector::Many(keys))?;
        Ok(GlobalSettings::from_map(&map))
    }

    fn session_flag(&self, host: &str) -> Result<Option<SessionFlag>, StorageError> {
        let map = self.get(StorageArea::Session, KeySelector::from(host))?;
        Ok(map
            .get(host)
            .and_then(|v| serde_json::from_value(v.clone()).ok()))
    }

    fn set_session_flag(&self, host: &str, flag: SessionFlag) -> Result<(), StorageError> {
        let value = serde_json::to_value(flag)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        let mut items = Map::new();
        items.insert(host.to_string(), value);
        self.set(StorageArea::Session, items)
    }

    fn clear_session_flag(&self, host: &str) -> Result<(), StorageError> {
        self.remove(StorageArea::Session, host)
    }
}

/// SQLite-backed store handle. Clones share the same database and subscribers.
#[derive(Clone)]
pub struct SettingsStore {
    db: Arc<Database>,
    listeners: Arc<Mutex<Vec<Sender<StorageChange>>>>,
    connected: Arc<AtomicBool>,
}

impl SettingsStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            listeners: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Opens a store over a fresh in-memory database.
    pub fn in_memory() -> Result<Self, StorageError> {
        let db = Database::open_in_memory()?;
        Ok(Self::new(Arc::new(db)))
    }

    /// Simulates the owning context going away; every later call fails.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn ensure_connected(&self) -> Result<(), StorageError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Disconnected("settings store context is gone".to_string()))
        }
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn decode(key: &str, text: &str) -> Result<Value, StorageError> {
        serde_json::from_str(text)
            .map_err(|e| StorageError::SerializationError(format!("{}: {}", key, e)))
    }

    fn read_one(conn: &Connection, area: StorageArea, key: &str) -> Result<Option<Value>, StorageError> {
        let sql = format!("SELECT value FROM {} WHERE key = ?1", area.table());
        let text: Option<String> = conn
            .query_row(&sql, params![key], |row| row.get(0))
            .optional()?;
        text.map(|t| Self::decode(key, &t)).transpose()
    }

    fn read_all(conn: &Connection, area: StorageArea) -> Result<Map<String, Value>, StorageError> {
        let sql = format!("SELECT key, value FROM {} ORDER BY key", area.table());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut map = Map::new();
        for row in rows {
            let (key, text) = row?;
            let value = Self::decode(&key, &text)?;
            map.insert(key, value);
        }
        Ok(map)
    }

    fn write_one(conn: &Connection, area: StorageArea, key: &str, text: &str) -> Result<(), StorageError> {
        match area {
            StorageArea::Local => {
                conn.execute(
                    "INSERT INTO storage_local (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key, text, Self::now()],
                )?;
            }
            StorageArea::Session => {
                conn.execute(
                    "INSERT OR REPLACE INTO storage_session (key, value) VALUES (?1, ?2)",
                    params![key, text],
                )?;
            }
        }
        Ok(())
    }

    fn emit(&self, area: StorageArea, changes: BTreeMap<String, ValueChange>) {
        if changes.is_empty() {
            return;
        }
        tracing::debug!(?area, keys = ?changes.keys().collect::<Vec<_>>(), "store changed");
        let event = StorageChange { area, changes };
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl SettingsStoreTrait for SettingsStore {
    fn get(&self, area: StorageArea, keys: KeySelector) -> Result<Map<String, Value>, StorageError> {
        self.ensure_connected()?;
        let conn = self.db.connection();
        match keys {
            KeySelector::All => Self::read_all(conn, area),
            KeySelector::One(key) => {
                let mut map = Map::new();
                if let Some(value) = Self::read_one(conn, area, &key)? {
                    map.insert(key, value);
                }
                Ok(map)
            }
            KeySelector::Many(keys) => {
                let mut map = Map::new();
                for key in keys {
                    if let Some(value) = Self::read_one(conn, area, &key)? {
                        map.insert(key, value);
                    }
                }
                Ok(map)
            }
        }
    }

    /// Writes every item in one transaction. A quota violation on any item
    /// rejects the whole call before anything is written.
    fn set(&self, area: StorageArea, items: Map<String, Value>) -> Result<(), StorageError> {
        self.ensure_connected()?;

        let mut encoded = Vec::with_capacity(items.len());
        for (key, value) in items {
            let text = serde_json::to_string(&value)
                .map_err(|e| StorageError::SerializationError(e.to_string()))?;
            if key.len() + text.len() > QUOTA_BYTES_PER_ITEM {
                return Err(StorageError::QuotaExceeded(key));
            }
            encoded.push((key, text, value));
        }

        let conn = self.db.connection();
        let tx = conn.unchecked_transaction()?;
        let mut changes = BTreeMap::new();
        for (key, text, value) in encoded {
            let old_value = Self::read_one(&tx, area, &key)?;
            if old_value.as_ref() == Some(&value) {
                continue;
            }
            Self::write_one(&tx, area, &key, &text)?;
            changes.insert(
                key,
                ValueChange {
                    old_value,
                    new_value: Some(value),
                },
            );
        }
        tx.commit()?;

        self.emit(area, changes);
        Ok(())
    }

    fn remove(&self, area: StorageArea, key: &str) -> Result<(), StorageError> {
        self.ensure_connected()?;
        let conn = self.db.connection();
        let old_value = Self::read_one(conn, area, key)?;
        if old_value.is_none() {
            return Ok(());
        }
        let sql = format!("DELETE FROM {} WHERE key = ?1", area.table());
        conn.execute(&sql, params![key])?;

        let mut changes = BTreeMap::new();
        changes.insert(
            key.to_string(),
            ValueChange {
                old_value,
                new_value: None,
            },
        );
        self.emit(area, changes);
        Ok(())
    }

    fn clear(&self, area: StorageArea) -> Result<(), StorageError> {
        self.ensure_connected()?;
        let conn = self.db.connection();
        let tx = conn.unchecked_transaction()?;
        let existing = Self::read_all(&tx, area)?;
        let sql = format!("DELETE FROM {}", area.table());
        tx.execute(&sql, [])?;
        tx.commit()?;

        let changes = existing
            .into_iter()
            .map(|(key, old)| {
                (
                    key,
                    ValueChange {
                        old_value: Some(old),
                        new_value: None,
                    },
                )
            })
            .collect();
        self.emit(area, changes);
        Ok(())
    }

    fn subscribe(&self) -> Receiver<StorageChange> {
        let (tx, rx) = mpsc::channel();
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }
}
