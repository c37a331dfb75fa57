//! Unit tests for the editor form, the popup editor and the settings
//! manager, wired to a live tab registry.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rstest::rstest;
use serde_json::{json, Value};

use typeset::managers::tab_manager::{TabManager, TabManagerTrait};
use typeset::services::editor_form::{commit_numeric, Control, EditorForm};
use typeset::services::popup_editor::PopupEditor;
use typeset::services::settings_manager::SettingsManager;
use typeset::services::settings_store::{SettingsStore, SettingsStoreTrait};
use typeset::types::errors::{EditorError, ImportError};
use typeset::types::message::{Message, Outbox};
use typeset::types::settings::{Direction, GlobalSettings, SiteSettings, StyleTuple, ThemeMode};
use typeset::types::storage::{KeySelector, StorageArea};

fn setup() -> (SettingsStore, TabManager) {
    let store = SettingsStore::in_memory().expect("store");
    store
        .set(StorageArea::Local, GlobalSettings::default().to_map())
        .unwrap();
    let tabs = TabManager::new(store.clone(), Duration::from_millis(300));
    (store, tabs)
}

// ─── Form ───

#[rstest]
#[case(Control::FontSize, "7", Some(8.0))]
#[case(Control::FontSize, "73", Some(72.0))]
#[case(Control::FontSize, "16.4", Some(16.0))]
#[case(Control::LineHeight, "4.5", Some(4.0))]
#[case(Control::LineHeight, "1.234", Some(1.23))]
#[case(Control::LetterSpacing, "-6", Some(-5.0))]
#[case(Control::WordSpacing, "51", Some(50.0))]
#[case(Control::WordSpacing, "  ", None)]
#[case(Control::FontSize, "big", None)]
fn test_numeric_commit(#[case] control: Control, #[case] raw: &str, #[case] expected: Option<f64>) {
    assert_eq!(commit_numeric(control, raw), expected);
}

#[rstest]
#[case("font")]
#[case("fontWeight")]
#[case("fontSize")]
#[case("lineHeight")]
#[case("letterSpacing")]
#[case("wordSpacing")]
#[case("direction")]
fn test_control_names_parse(#[case] name: &str) {
    assert_eq!(Control::parse(name).unwrap().name(), name);
}

#[test]
fn test_unknown_control_is_rejected() {
    assert!(matches!(
        Control::parse("color"),
        Err(EditorError::UnknownControl(name)) if name == "color"
    ));
}

#[test]
fn test_form_shows_committed_values() {
    let mut form = EditorForm::default();
    form.set(Control::FontSize, "200");
    form.set(Control::LineHeight, "abc");
    form.commit();
    assert_eq!(form.value(Control::FontSize), "72");
    assert_eq!(form.value(Control::LineHeight), "");
}

// ─── Popup ───

#[test]
fn test_popup_edit_styles_active_tab() {
    let (store, mut tabs) = setup();
    let id = tabs.open_tab("https://example.com/").unwrap();
    let mut popup = PopupEditor::open(store.clone(), &id, "https://example.com/").unwrap();

    popup.edit(Control::Font, "Vazirmatn", &mut tabs).unwrap();
    let tuple = popup.edit(Control::Direction, "rtl", &mut tabs).unwrap();

    assert_eq!(tuple.font, "Vazirmatn");
    assert_eq!(tuple.direction, Direction::Rtl);
    assert_eq!(store.get_site("example.com").unwrap().unwrap().style, tuple);
    let injector = tabs.get_tab(&id).unwrap().injector.as_ref().unwrap();
    assert_eq!(injector.applied(), Some(&tuple));
}

#[test]
fn test_popup_loads_existing_record() {
    let (store, _tabs) = setup();
    let tuple = StyleTuple {
        font_size: Some(20.0),
        letter_spacing: Some(0.5),
        ..Default::default()
    };
    store
        .set_site(&SiteSettings::new("example.com", tuple))
        .unwrap();
    let popup = PopupEditor::open(store, "t", "https://EXAMPLE.com/path").unwrap();
    assert_eq!(popup.host(), "example.com");
    assert_eq!(popup.form().value(Control::FontSize), "20");
    assert_eq!(popup.form().value(Control::LetterSpacing), "0.5");
}

#[test]
fn test_popup_reset_clears_page() {
    let (store, mut tabs) = setup();
    let id = tabs.open_tab("https://example.com/").unwrap();
    let mut popup = PopupEditor::open(store.clone(), &id, "https://example.com/").unwrap();
    popup.edit(Control::FontSize, "22", &mut tabs).unwrap();
    popup.reset_site(&mut tabs).unwrap();

    assert_eq!(store.get_site("example.com").unwrap(), None);
    let tab = tabs.get_tab(&id).unwrap();
    assert_eq!(tab.injector.as_ref().unwrap().applied(), None);
    let html = tab.document.document_element();
    assert!(tab.document.elements_by_tag(html, "style").is_empty());
}

#[test]
fn test_popup_on_internal_page_has_no_host() {
    let (store, mut tabs) = setup();
    let id = tabs.open_tab("chrome://newtab").unwrap();
    let mut popup = PopupEditor::open(store, &id, "chrome://newtab").unwrap();
    assert_eq!(popup.host(), "");
    assert!(matches!(
        popup.reset_site(&mut tabs),
        Err(EditorError::NoHost(_))
    ));
}

#[test]
fn test_popup_follows_theme_broadcast() {
    let (store, _tabs) = setup();
    let mut popup = PopupEditor::open(store, "t", "https://example.com/").unwrap();
    popup.handle_message(&Message::ThemeChanged {
        theme: ThemeMode::Light,
    });
    assert_eq!(popup.theme(), ThemeMode::Light);
}

#[test]
fn test_popup_global_settings_persist() {
    let (store, _tabs) = setup();
    let mut popup = PopupEditor::open(store.clone(), "t", "https://example.com/").unwrap();
    popup.set_ui_font(" Tahoma ").unwrap();
    popup.set_language("fa").unwrap();
    let globals = store.get_globals().unwrap();
    assert_eq!(globals.ui_font, "Tahoma");
    assert_eq!(globals.extension_language, "fa");
}

#[test]
fn test_popup_reload_picks_up_import() {
    let (store, _tabs) = setup();
    let mut popup = PopupEditor::open(store.clone(), "t", "https://example.com/").unwrap();
    let mut items = serde_json::Map::new();
    items.insert("example.com".into(), json!({"font": "Rubik", "fontSize": 15}));
    store.set(StorageArea::Local, items).unwrap();

    popup.handle_message(&Message::ReloadPopupSettings);
    assert_eq!(popup.form().value(Control::Font), "Rubik");
    assert_eq!(popup.form().value(Control::FontSize), "15");
}

// ─── Settings manager ───

#[test]
fn test_manager_edit_pushes_to_every_tab_of_host() {
    let (store, mut tabs) = setup();
    let a = tabs.open_tab("https://example.com/a").unwrap();
    let b = tabs.open_tab("https://example.com/b").unwrap();
    let other = tabs.open_tab("https://other.org/").unwrap();
    let mut manager = SettingsManager::open(store).unwrap();

    let tuple = manager
        .edit_site(" Example.com ", Control::LineHeight, "1.8", &mut tabs)
        .unwrap();
    assert_eq!(tuple.line_height, Some(1.8));
    for id in [&a, &b] {
        let injector = tabs.get_tab(id).unwrap().injector.as_ref().unwrap();
        assert_eq!(injector.applied(), Some(&tuple));
    }
    let untouched = tabs.get_tab(&other).unwrap().injector.as_ref().unwrap();
    assert_eq!(untouched.applied(), None);
    assert_eq!(manager.site("example.com").unwrap().style, tuple);
}

#[test]
fn test_manager_remove_notifies() {
    let (store, _tabs) = setup();
    store
        .set_site(&SiteSettings::new(
            "a.com",
            StyleTuple {
                font: "Inter".into(),
                ..Default::default()
            },
        ))
        .unwrap();
    let mut manager = SettingsManager::open(store).unwrap();
    let mut out = Outbox::new();
    manager.remove_site("a.com", &mut out).unwrap();
    assert_eq!(out.messages(), &[Message::SiteDataDidChange]);
    assert!(manager.sites().is_empty());
    assert_eq!(manager.status(), Some("Removed settings for a.com"));
}

#[test]
fn test_export_download_url_carries_json() {
    let (store, _tabs) = setup();
    store
        .set_site(&SiteSettings::new(
            "news.example.com",
            StyleTuple {
                direction: Direction::Ltr,
                ..Default::default()
            },
        ))
        .unwrap();
    let mut manager = SettingsManager::open(store).unwrap();
    let file = manager.export().unwrap();

    assert!(file.file_name.starts_with("typeset-backup-"));
    assert!(file.file_name.ends_with(".json"));
    let encoded = file
        .download_url
        .strip_prefix("data:application/json;base64,")
        .unwrap();
    let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
    assert_eq!(decoded, file.json);

    let doc: Value = serde_json::from_str(&file.json).unwrap();
    assert_eq!(doc["news.example.com"]["direction"], json!("ltr"));
    assert_eq!(doc["theme"], json!("system"));
    assert_eq!(doc["uiFont"], json!("Vazirmatn"));
    assert_eq!(doc["extensionLanguage"], json!("en"));
    assert!(manager.status().unwrap().contains(&file.file_name));
}

#[rstest]
#[case("{not json", "parse")]
#[case("[1, 2, 3]", "object")]
#[case("\"text\"", "object")]
fn test_bad_import_leaves_store_untouched(#[case] text: &str, #[case] kind: &str) {
    let (store, _tabs) = setup();
    let before = store.get(StorageArea::Local, KeySelector::All).unwrap();
    let mut manager = SettingsManager::open(store.clone()).unwrap();
    let mut out = Outbox::new();

    let err = manager.import(text, &mut out).unwrap_err();
    match kind {
        "parse" => assert!(matches!(err, ImportError::ParseError(_))),
        _ => assert_eq!(err, ImportError::NotAnObject),
    }
    assert!(out.is_empty());
    assert_eq!(store.get(StorageArea::Local, KeySelector::All).unwrap(), before);
    assert!(manager.status().unwrap().starts_with("Import failed: "));
}

#[test]
fn test_import_is_written_without_validation() {
    let (store, _tabs) = setup();
    let mut manager = SettingsManager::open(store.clone()).unwrap();
    let mut out = Outbox::new();
    let count = manager
        .import(r#"{"odd.net": {"fontSize": "huge"}, "theme": "dark"}"#, &mut out)
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(out.messages(), &[Message::SettingsImportedSuccessfully]);
    let raw = store
        .get(StorageArea::Local, KeySelector::from("odd.net"))
        .unwrap();
    assert_eq!(raw["odd.net"], json!({"fontSize": "huge"}));
    assert_eq!(manager.globals().theme, ThemeMode::Dark);
    assert_eq!(manager.status(), Some("Settings imported (2 entries)"));
}

#[test]
fn test_reset_all_leaves_only_defaults() {
    let (store, _tabs) = setup();
    store
        .set_site(&SiteSettings::new(
            "a.com",
            StyleTuple {
                font: "Inter".into(),
                ..Default::default()
            },
        ))
        .unwrap();
    let mut manager = SettingsManager::open(store.clone()).unwrap();
    manager.reset_all().unwrap();

    let all = store.get(StorageArea::Local, KeySelector::All).unwrap();
    assert_eq!(all, GlobalSettings::default().to_map());
    assert!(manager.sites().is_empty());
}

#[test]
fn test_manager_follows_language_change() {
    let (store, _tabs) = setup();
    store
        .set_site(&SiteSettings::new(
            "b.com",
            StyleTuple {
                font: "Inter".into(),
                ..Default::default()
            },
        ))
        .unwrap();
    let mut manager = SettingsManager::open(store.clone()).unwrap();
    let mut popup = PopupEditor::open(store, "t", "https://b.com/").unwrap();
    popup.set_language("fa").unwrap();
    manager.poll_storage();
    assert_eq!(manager.globals().extension_language, "fa");

    let mut out = Outbox::new();
    manager.remove_site("b.com", &mut out).unwrap();
    assert_eq!(manager.status(), Some("تنظیمات b.com حذف شد"));
}
