//! Unit tests for the Typeset database layer (connection + migrations).

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use typeset::database::migrations::{get_schema_version, run_all, CURRENT_SCHEMA_VERSION};
use typeset::database::Database;
use typeset::services::settings_store::{SettingsStore, SettingsStoreTrait};
use typeset::types::settings::SessionFlag;
use typeset::types::storage::{KeySelector, StorageArea};

fn table_exists(db: &Database, table: &str) -> bool {
    db.connection()
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
            [table],
            |row| row.get(0),
        )
        .unwrap_or(false)
}

#[test]
fn test_open_in_memory_succeeds() {
    assert!(Database::open_in_memory().is_ok());
}

#[test]
fn test_migrations_create_storage_areas() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    for table in ["storage_local", "storage_session", "schema_version"] {
        assert!(table_exists(&db, table), "Table '{}' should exist", table);
    }
}

#[test]
fn test_schema_version_is_current() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_migrations_are_idempotent() {
    let db = Database::open_in_memory().unwrap();
    run_all(db.connection()).unwrap();
    run_all(db.connection()).unwrap();
    assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_local_area_persists_and_session_area_resets() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("typeset.db");

    {
        let store = SettingsStore::new(Arc::new(Database::open(&path).unwrap()));
        let mut items = serde_json::Map::new();
        items.insert("example.com".to_string(), json!({"font": "Vazirmatn"}));
        store.set(StorageArea::Local, items).unwrap();
        store
            .set_session_flag("example.com", SessionFlag { csp_blocked: true })
            .unwrap();
    }

    let store = SettingsStore::new(Arc::new(Database::open(&path).unwrap()));
    let local = store.get(StorageArea::Local, KeySelector::All).unwrap();
    assert_eq!(local.get("example.com"), Some(&json!({"font": "Vazirmatn"})));
    assert!(store
        .get(StorageArea::Session, KeySelector::All)
        .unwrap()
        .is_empty());
}

#[test]
fn test_updated_at_is_recorded() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store = SettingsStore::new(db.clone());
    let mut items = serde_json::Map::new();
    items.insert("theme".to_string(), json!("dark"));
    store.set(StorageArea::Local, items).unwrap();
    let updated: i64 = db
        .connection()
        .query_row(
            "SELECT updated_at FROM storage_local WHERE key = 'theme'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(updated > 0);
}
