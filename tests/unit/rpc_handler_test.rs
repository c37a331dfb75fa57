//! Unit tests for the JSON-RPC method handler.

use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use tempfile::TempDir;

use typeset::app::App;
use typeset::rpc_handler::handle_method;
use typeset::services::config_engine::{ConfigEngine, ConfigEngineTrait};

fn setup() -> (TempDir, Mutex<App>) {
    let dir = TempDir::new().unwrap();
    let mut engine = ConfigEngine::new(Some(
        dir.path().join("config.json").to_string_lossy().to_string(),
    ));
    let db_path = dir.path().join("typeset.db").to_string_lossy().to_string();
    engine
        .set_value("storage.database_path", json!(db_path))
        .unwrap();
    let app = App::new(engine).expect("app");
    (dir, Mutex::new(app))
}

fn call(app: &Mutex<App>, method: &str, params: Value) -> Value {
    handle_method(app, method, &params)
        .unwrap_or_else(|e| panic!("{} failed: {}", method, e))
}

fn open_tab(app: &Mutex<App>, url: &str) -> String {
    call(app, "tab.open", json!({"url": url}))["id"]
        .as_str()
        .unwrap()
        .to_string()
}

// ─── Basics ───

#[test]
fn test_ping() {
    let (_dir, app) = setup();
    let result = call(&app, "ping", json!({}));
    assert_eq!(result["pong"], json!(true));
    assert!(result["version"].is_string());
}

#[test]
fn test_unknown_method() {
    let (_dir, app) = setup();
    assert_eq!(
        handle_method(&app, "nope", &json!({})),
        Err("unknown method: nope".to_string())
    );
}

#[test]
fn test_missing_parameter() {
    let (_dir, app) = setup();
    assert_eq!(
        handle_method(&app, "tab.open", &json!({})),
        Err("missing url".to_string())
    );
}

// ─── Tabs and pages ───

#[test]
fn test_tab_lifecycle() {
    let (_dir, app) = setup();
    let info = call(&app, "tab.open", json!({"url": "https://example.com/"}));
    assert_eq!(info["host"], json!("example.com"));
    assert_eq!(info["scriptable"], json!(true));
    let id = info["id"].as_str().unwrap().to_string();

    call(&app, "tab.navigate", json!({"id": id, "url": "about:blank"}));
    let tabs = call(&app, "tab.list", json!({}));
    assert_eq!(tabs[0]["scriptable"], json!(false));

    call(&app, "tab.close", json!({"id": id}));
    assert_eq!(call(&app, "tab.list", json!({})), json!([]));
    assert!(handle_method(&app, "tab.close", &json!({"id": id})).is_err());
}

#[test]
fn test_popup_edit_shows_in_dom() {
    let (_dir, app) = setup();
    let id = open_tab(&app, "https://example.com/");
    let state = call(&app, "popup.open", json!({"tab": id}));
    assert_eq!(state["host"], json!("example.com"));
    assert_eq!(state["form"]["fontSize"], json!(""));

    let tuple = call(&app, "popup.edit", json!({"control": "fontSize", "value": "99"}));
    assert_eq!(tuple["fontSize"], json!(72));

    let dom = call(&app, "tab.dom", json!({"id": id}));
    assert_eq!(dom["state"], json!("styled"));
    assert!(dom["html"].as_str().unwrap().contains("font-size: 72px !important;"));

    call(&app, "popup.reset", json!({}));
    let dom = call(&app, "tab.dom", json!({"id": id}));
    assert_eq!(dom["state"], json!("idle"));
    assert!(!dom["html"].as_str().unwrap().contains("typeset-style-document"));
}

#[test]
fn test_unknown_control_is_reported() {
    let (_dir, app) = setup();
    let id = open_tab(&app, "https://example.com/");
    call(&app, "popup.open", json!({"tab": id}));
    let err = handle_method(&app, "popup.edit", &json!({"control": "colour", "value": "red"}))
        .unwrap_err();
    assert_eq!(err, "Unknown control: colour");
}

#[test]
fn test_page_mutation_and_reapply() {
    let (_dir, app) = setup();
    let id = open_tab(&app, "https://example.com/");
    call(&app, "popup.open", json!({"tab": id}));
    call(&app, "popup.edit", json!({"control": "direction", "value": "rtl"}));

    let host = call(&app, "page.mutate", json!({"id": id, "op": "append", "node": "body", "tag": "my-card"}));
    let host_id = host["node"].clone();
    call(&app, "page.mutate", json!({"id": id, "op": "attach_shadow", "node": host_id}));

    let t0 = std::time::Instant::now();
    {
        let mut a = app.lock().unwrap();
        a.tick(t0);
        a.tick(t0 + std::time::Duration::from_millis(300));
    }
    let dom = call(&app, "tab.dom", json!({"id": id}));
    assert_eq!(dom["reapplyCount"], json!(1));
    assert!(dom["html"].as_str().unwrap().contains("typeset-style-my-card"));
}

#[test]
fn test_page_mutation_rejects_bad_node() {
    let (_dir, app) = setup();
    let id = open_tab(&app, "https://example.com/");
    let err = handle_method(
        &app,
        "page.mutate",
        &json!({"id": id, "op": "remove", "node": 9999}),
    )
    .unwrap_err();
    assert_eq!(err, "unknown node: 9999");
}

#[test]
fn test_font_blocked_flag() {
    let (_dir, app) = setup();
    let id = open_tab(&app, "https://example.com/");
    call(&app, "popup.open", json!({"tab": id}));
    call(&app, "popup.edit", json!({"control": "font", "value": "Vazirmatn"}));
    let result = call(&app, "tab.font_loaded", json!({"id": id, "loaded": false}));
    assert_eq!(result["delivered"], json!(true));

    assert_eq!(call(&app, "popup.state", json!({}))["cspWarning"], json!(true));
    let session = call(&app, "store.get", json!({"area": "session", "keys": "example.com"}));
    assert_eq!(session["example.com"]["cspBlocked"], json!(true));
}

// ─── Settings manager ───

#[test]
fn test_export_import_roundtrip() {
    let (_dir, app) = setup();
    let id = open_tab(&app, "https://example.com/");
    call(&app, "popup.open", json!({"tab": id}));
    call(&app, "popup.edit", json!({"control": "font", "value": "Vazirmatn"}));
    call(&app, "manager.open", json!({}));

    let export = call(&app, "manager.export", json!({}));
    let encoded = export["downloadUrl"]
        .as_str()
        .unwrap()
        .trim_start_matches("data:application/json;base64,");
    let decoded = STANDARD.decode(encoded).unwrap();
    assert_eq!(decoded, export["json"].as_str().unwrap().as_bytes());

    call(&app, "manager.reset_all", json!({}));
    assert_eq!(call(&app, "manager.sites", json!({}))["sites"], json!([]));

    let imported = call(&app, "manager.import", json!({"json": export["json"]}));
    assert_eq!(imported["count"], json!(4));
    assert_eq!(imported["responses"], json!([{"status": "ok"}]));
    let sites = call(&app, "manager.sites", json!({}));
    assert_eq!(sites["sites"][0]["host"], json!("example.com"));
    assert_eq!(sites["status"], json!("Settings imported (4 entries)"));
}

#[test]
fn test_import_of_non_object_fails() {
    let (_dir, app) = setup();
    call(&app, "manager.open", json!({}));
    let err = handle_method(&app, "manager.import", &json!({"json": "[]"})).unwrap_err();
    assert_eq!(err, "Import document must be a JSON object");
}

#[test]
fn test_manager_requires_open() {
    let (_dir, app) = setup();
    assert_eq!(
        handle_method(&app, "manager.export", &json!({})),
        Err("settings manager is not open".to_string())
    );
}

// ─── Store and bus ───

#[test]
fn test_store_get_selectors() {
    let (_dir, app) = setup();
    let all = call(&app, "store.get", json!({}));
    assert_eq!(all["uiFont"], json!("Vazirmatn"));
    let some = call(&app, "store.get", json!({"keys": ["theme", "missing"]}));
    assert_eq!(some, json!({"theme": "system"}));
    assert!(handle_method(&app, "store.get", &json!({"area": "sync"})).is_err());
}

#[test]
fn test_message_send_relays_theme() {
    let (_dir, app) = setup();
    call(&app, "manager.open", json!({}));
    let responses = call(
        &app,
        "message.send",
        json!({"from": "popup", "message": {"type": "USER_CHANGED_THEME_PREFERENCE", "theme": "dark"}}),
    );
    assert_eq!(responses, json!([]));
    assert_eq!(call(&app, "manager.sites", json!({}))["theme"], json!("dark"));
}

#[test]
fn test_message_send_rejects_page_commands() {
    let (_dir, app) = setup();
    let err = handle_method(
        &app,
        "message.send",
        &json!({"message": {"action": "resetStyles"}}),
    )
    .unwrap_err();
    assert_eq!(err, "resetStyles must be sent to a tab");
}

// ─── Host config ───

#[test]
fn test_config_get_reports_path_and_values() {
    let (dir, app) = setup();
    let reply = call(&app, "config.get", json!({}));
    let expected_path = dir.path().join("config.json").to_string_lossy().to_string();
    assert_eq!(reply["path"], json!(expected_path));
    assert_eq!(reply["config"]["page"]["mutation_debounce_ms"], json!(300));
    assert_eq!(reply["config"]["runtime"]["tick_interval_ms"], json!(50));
}

#[test]
fn test_config_set_persists_for_next_start() {
    let (dir, app) = setup();
    let reply = call(
        &app,
        "config.set",
        json!({"key": "page.mutation_debounce_ms", "value": 500}),
    );
    assert_eq!(reply["restartRequired"], json!(true));
    assert_eq!(
        call(&app, "config.get", json!({}))["config"]["page"]["mutation_debounce_ms"],
        json!(500)
    );

    let mut reopened = ConfigEngine::new(Some(
        dir.path().join("config.json").to_string_lossy().to_string(),
    ));
    assert_eq!(reopened.load().unwrap().page.mutation_debounce_ms, 500);
}

#[test]
fn test_config_set_rejects_bad_input() {
    let (_dir, app) = setup();
    assert!(handle_method(&app, "config.set", &json!({"key": "page.nope", "value": 1})).is_err());
    assert!(handle_method(
        &app,
        "config.set",
        &json!({"key": "logging.debug", "value": "yes"})
    )
    .is_err());
    assert_eq!(
        handle_method(&app, "config.set", &json!({"key": "logging.debug"})).unwrap_err(),
        "missing value"
    );
}

#[test]
fn test_config_reset_restores_defaults() {
    let (_dir, app) = setup();
    call(&app, "config.set", json!({"key": "runtime.tick_interval_ms", "value": 10}));
    call(&app, "config.reset", json!({}));
    let config = call(&app, "config.get", json!({}))["config"].clone();
    assert_eq!(config["runtime"]["tick_interval_ms"], json!(50));
    assert_eq!(config["storage"]["database_path"], Value::Null);
}

// ─── Localization ───

#[test]
fn test_i18n_locales() {
    let (_dir, app) = setup();
    assert_eq!(call(&app, "i18n.locales", json!({})), json!(["en", "fa"]));
}

#[test]
fn test_i18n_follows_extension_language() {
    let (_dir, app) = setup();
    let params = json!({"key": "status.site_removed", "params": {"host": "b.com"}});
    assert_eq!(
        call(&app, "i18n.t", params.clone())["text"],
        json!("Removed settings for b.com")
    );

    let tab = open_tab(&app, "https://example.com/");
    call(&app, "popup.open", json!({"tab": tab}));
    call(&app, "popup.language", json!({"language": "fa"}));
    assert_eq!(call(&app, "i18n.t", params)["text"], json!("تنظیمات b.com حذف شد"));
}

#[test]
fn test_i18n_missing_key_is_an_error() {
    let (_dir, app) = setup();
    let err = handle_method(&app, "i18n.t", &json!({"key": "status.nope"})).unwrap_err();
    assert_eq!(err, "Missing locale key: status.nope");
}
