//! Unit tests for the app core: context wiring and runtime message routing.

use std::time::{Duration, Instant};

use serde_json::json;
use tempfile::TempDir;

use typeset::app::App;
use typeset::services::editor_form::Control;
use typeset::services::settings_store::SettingsStoreTrait;
use typeset::services::config_engine::{ConfigEngine, ConfigEngineTrait};
use typeset::types::errors::AppError;
use typeset::types::message::{ContextKind, Message, Response};
use typeset::types::settings::{GlobalSettings, SessionFlag, StyleTuple, ThemeMode};
use typeset::types::storage::{KeySelector, StorageArea};

fn app() -> App {
    App::in_memory().expect("in-memory app")
}

fn config_at(dir: &TempDir) -> ConfigEngine {
    let mut engine = ConfigEngine::new(Some(
        dir.path().join("config.json").to_string_lossy().to_string(),
    ));
    let db_path = dir.path().join("typeset.db").to_string_lossy().to_string();
    engine
        .set_value("storage.database_path", json!(db_path))
        .unwrap();
    engine
}

// ─── Startup ───

#[test]
fn test_startup_seeds_globals() {
    let a = app();
    let all = a.store.get(StorageArea::Local, KeySelector::All).unwrap();
    assert_eq!(all, GlobalSettings::default().to_map());
}

#[test]
fn test_startup_keeps_existing_globals() {
    let dir = TempDir::new().unwrap();
    {
        let mut a = App::new(config_at(&dir)).unwrap();
        let id = a.open_tab("https://example.com/").unwrap();
        a.open_popup(&id).unwrap();
        a.popup_set_language("fa").unwrap();
        a.popup_edit(Control::FontSize, "20").unwrap();
        a.store
            .set_session_flag("example.com", SessionFlag { csp_blocked: true })
            .unwrap();
    }
    let a = App::new(config_at(&dir)).unwrap();
    let globals = a.store.get_globals().unwrap();
    assert_eq!(globals.extension_language, "fa");
    assert_eq!(globals.theme, ThemeMode::System);
    assert_eq!(
        a.store.get_site("example.com").unwrap().unwrap().style.font_size,
        Some(20.0)
    );
    assert_eq!(a.store.session_flag("example.com").unwrap(), None);
}

// ─── Tabs ───

#[test]
fn test_popup_edit_reaches_every_tab_of_host() {
    let mut a = app();
    let first = a.open_tab("https://example.com/1").unwrap();
    let second = a.open_tab("https://example.com/2").unwrap();
    a.open_popup(&first).unwrap();
    let tuple = a.popup_edit(Control::Font, "Vazirmatn").unwrap();

    assert_eq!(a.injector(&first).unwrap().applied(), Some(&tuple));
    assert_eq!(a.injector(&second).unwrap().applied(), Some(&tuple));
}

#[test]
fn test_navigation_restyles_from_store() {
    let mut a = app();
    let id = a.open_tab("https://example.com/").unwrap();
    a.open_popup(&id).unwrap();
    let tuple = a.popup_edit(Control::LineHeight, "2").unwrap();

    a.navigate(&id, "https://other.org/").unwrap();
    assert!(a.popup.is_none());
    assert_eq!(a.injector(&id).unwrap().applied(), None);

    a.navigate(&id, "https://example.com/again").unwrap();
    assert_eq!(a.injector(&id).unwrap().applied(), Some(&tuple));
}

#[test]
fn test_closing_popup_tab_closes_popup() {
    let mut a = app();
    let id = a.open_tab("https://example.com/").unwrap();
    a.open_popup(&id).unwrap();
    a.close_tab(&id).unwrap();
    assert!(a.popup.is_none());
    assert!(matches!(
        a.popup_edit(Control::Font, "Inter"),
        Err(AppError::NotOpen(_))
    ));
}

#[test]
fn test_tick_reapplies_after_page_changes() {
    let mut a = app();
    let id = a.open_tab("https://example.com/").unwrap();
    a.open_popup(&id).unwrap();
    a.popup_edit(Control::Direction, "rtl").unwrap();

    let doc = a.document_mut(&id).unwrap();
    let body = doc.body();
    let host = doc.append_element(body, "x-card");
    doc.attach_shadow(host);

    let t0 = Instant::now();
    a.tick(t0);
    a.tick(t0 + Duration::from_millis(300));
    let doc = a.document(&id).unwrap();
    assert_eq!(doc.get_attribute(host, "dir"), Some("rtl"));
    assert_eq!(a.injector(&id).unwrap().reapply_count(), 1);
}

#[test]
fn test_blocked_font_warns_popup() {
    let mut a = app();
    let id = a.open_tab("https://example.com/").unwrap();
    a.open_popup(&id).unwrap();
    a.popup_edit(Control::Font, "Vazirmatn").unwrap();
    assert!(a.complete_font_load(&id, false).unwrap());
    assert!(a.popup.as_ref().unwrap().csp_warning());
}

// ─── Routing ───

#[test]
fn test_theme_change_reaches_manager() {
    let mut a = app();
    let id = a.open_tab("https://example.com/").unwrap();
    a.open_popup(&id).unwrap();
    a.open_settings_manager().unwrap();

    let responses = a.popup_set_theme(ThemeMode::Dark).unwrap();
    assert!(responses.is_empty());
    let manager = a.settings_manager.as_ref().unwrap();
    assert_eq!(manager.globals().theme, ThemeMode::Dark);
    assert_eq!(a.popup.as_ref().unwrap().theme(), ThemeMode::Dark);
}

#[test]
fn test_import_reloads_popup_and_replies() {
    let mut a = app();
    let id = a.open_tab("https://example.com/").unwrap();
    a.open_popup(&id).unwrap();
    a.open_settings_manager().unwrap();

    let backup = json!({"example.com": {"font": "Rubik", "fontSize": 17}}).to_string();
    let (count, responses) = a.manager_import(&backup).unwrap();

    assert_eq!(count, 1);
    assert_eq!(responses, vec![Response::ok()]);
    let popup = a.popup.as_ref().unwrap();
    assert_eq!(popup.form().value(Control::Font), "Rubik");
    assert_eq!(popup.form().value(Control::FontSize), "17");
    assert_eq!(a.injector(&id).unwrap().applied().unwrap().font, "Rubik");
}

#[test]
fn test_popup_edit_refreshes_manager_list() {
    let mut a = app();
    let id = a.open_tab("https://example.com/").unwrap();
    a.open_settings_manager().unwrap();
    a.open_popup(&id).unwrap();
    a.popup_edit(Control::WordSpacing, "3").unwrap();

    let manager = a.settings_manager.as_ref().unwrap();
    assert_eq!(manager.site("example.com").unwrap().style.word_spacing, Some(3.0));
}

#[test]
fn test_manager_remove_clears_popup_and_page() {
    let mut a = app();
    let id = a.open_tab("https://example.com/").unwrap();
    a.open_popup(&id).unwrap();
    a.popup_edit(Control::FontSize, "21").unwrap();
    a.open_settings_manager().unwrap();

    a.manager_remove("example.com").unwrap();
    assert!(a.settings_manager.as_ref().unwrap().sites().is_empty());
    assert_eq!(a.popup.as_ref().unwrap().form().value(Control::FontSize), "");
    assert_eq!(a.injector(&id).unwrap().applied(), None);
}

#[test]
fn test_manager_edit_styles_open_tab() {
    let mut a = app();
    let id = a.open_tab("https://blog.example.net/post").unwrap();
    a.open_settings_manager().unwrap();
    let tuple = a
        .manager_edit("blog.example.net", Control::LetterSpacing, "1.25")
        .unwrap();
    assert_eq!(tuple.letter_spacing, Some(1.25));
    assert_eq!(a.injector(&id).unwrap().applied(), Some(&tuple));
}

#[test]
fn test_page_commands_are_not_broadcast() {
    let mut a = app();
    let id = a.open_tab("https://example.com/").unwrap();
    let responses = a.send_message(
        ContextKind::Popup,
        Message::ApplyStyles(StyleTuple {
            font_size: Some(40.0),
            ..Default::default()
        }),
    );
    assert!(responses.is_empty());
    assert_eq!(a.injector(&id).unwrap().applied(), None);
}

#[test]
fn test_sender_does_not_hear_itself() {
    let mut a = app();
    a.open_settings_manager().unwrap();
    // Only the dispatcher answers the import notification; the manager sent it.
    let responses = a.send_message(ContextKind::SettingsManager, Message::SettingsImportedSuccessfully);
    assert_eq!(responses, vec![Response::ok()]);

    let responses = a.send_message(ContextKind::Dispatcher, Message::SettingsImportedSuccessfully);
    assert!(responses.is_empty());
}

#[test]
fn test_closed_editors_report_not_open() {
    let mut a = app();
    assert!(matches!(a.manager_export(), Err(AppError::NotOpen(_))));
    assert!(matches!(a.popup_reset(), Err(AppError::NotOpen(_))));
    assert_eq!(
        AppError::NotOpen("popup".into()).to_string(),
        "popup is not open"
    );
}

#[test]
fn test_reset_all_unstyles_pages() {
    let mut a = app();
    let id = a.open_tab("https://example.com/").unwrap();
    a.open_popup(&id).unwrap();
    a.popup_edit(Control::Font, "Inter").unwrap();
    a.open_settings_manager().unwrap();
    a.manager_reset_all().unwrap();

    assert_eq!(a.injector(&id).unwrap().applied(), None);
    assert_eq!(
        a.store.get(StorageArea::Local, KeySelector::All).unwrap(),
        GlobalSettings::default().to_map()
    );
}
