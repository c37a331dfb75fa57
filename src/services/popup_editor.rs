//! Popup editor: edits the record of the active tab's host.

use std::sync::mpsc::Receiver;

use serde_json::{Map, Value};

use crate::managers::tab_manager::{page_host, send_quietly, TabChannel};
use crate::services::editor_form::{Control, EditorForm};
use crate::services::settings_store::{SettingsStore, SettingsStoreTrait};
use crate::types::errors::EditorError;
use crate::types::message::{Message, Outbox, Response};
use crate::types::settings::{
    GlobalSettings, SessionFlag, SiteSettings, StyleTuple, ThemeMode, LANGUAGE_KEY, THEME_KEY,
    UI_FONT_KEY,
};
use crate::types::storage::{StorageArea, StorageChange};

pub struct PopupEditor {
    store: SettingsStore,
    store_events: Receiver<StorageChange>,
    tab_id: String,
    url: String,
    host: String,
    form: EditorForm,
    globals: GlobalSettings,
    csp_warning: bool,
}

impl PopupEditor {
    /// Opens the popup for the tab showing `url` and loads its state.
    pub fn open(store: SettingsStore, tab_id: &str, url: &str) -> Result<Self, EditorError> {
        let store_events = store.subscribe();
        let mut popup = Self {
            store,
            store_events,
            tab_id: tab_id.to_string(),
            url: url.to_string(),
            host: page_host(url),
            form: EditorForm::default(),
            globals: GlobalSettings::default(),
            csp_warning: false,
        };
        popup.load()?;
        Ok(popup)
    }

    /// Rereads the host's record, the globals and the font flag.
    pub fn load(&mut self) -> Result<(), EditorError> {
        self.globals = self.store.get_globals()?;
        if self.host.is_empty() {
            self.form = EditorForm::default();
            self.csp_warning = false;
            return Ok(());
        }
        let tuple = self
            .store
            .get_site(&self.host)?
            .map(|record| record.style)
            .unwrap_or_default();
        self.form = EditorForm::from_tuple(&tuple);
        self.csp_warning = self
            .store
            .session_flag(&self.host)?
            .map(|flag| flag.csp_blocked)
            .unwrap_or(false);
        Ok(())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    pub fn form(&self) -> &EditorForm {
        &self.form
    }

    pub fn globals(&self) -> &GlobalSettings {
        &self.globals
    }

    pub fn theme(&self) -> ThemeMode {
        self.globals.theme
    }

    /// True while the page reported that its remote font was blocked.
    pub fn csp_warning(&self) -> bool {
        self.csp_warning
    }

    fn require_host(&self) -> Result<&str, EditorError> {
        if self.host.is_empty() {
            Err(EditorError::NoHost(self.url.clone()))
        } else {
            Ok(&self.host)
        }
    }

    /// Applies one control change: recomputes the tuple from all controls,
    /// writes it and pushes it to the page.
    pub fn edit(
        &mut self,
        control: Control,
        value: &str,
        tabs: &mut dyn TabChannel,
    ) -> Result<StyleTuple, EditorError> {
        let host = self.require_host()?.to_string();
        self.form.set(control, value);
        let tuple = self.form.commit();
        self.store.set_site(&SiteSettings::new(&host, tuple.clone()))?;
        send_quietly(tabs, &self.tab_id, &Message::ApplyStyles(tuple.clone()));
        Ok(tuple)
    }

    /// Deletes the host's record and clears the page.
    pub fn reset_site(&mut self, tabs: &mut dyn TabChannel) -> Result<(), EditorError> {
        let host = self.require_host()?.to_string();
        self.store.remove(StorageArea::Local, &host)?;
        self.form = EditorForm::default();
        send_quietly(tabs, &self.tab_id, &Message::ResetStyles);
        Ok(())
    }

    pub fn set_theme(&mut self, theme: ThemeMode, out: &mut Outbox) -> Result<(), EditorError> {
        self.write_global(THEME_KEY, Value::String(theme.as_str().to_string()))?;
        self.globals.theme = theme;
        out.post(Message::UserChangedThemePreference { theme });
        Ok(())
    }

    pub fn set_ui_font(&mut self, font: &str) -> Result<(), EditorError> {
        self.write_global(UI_FONT_KEY, Value::String(font.trim().to_string()))?;
        self.globals.ui_font = font.trim().to_string();
        Ok(())
    }

    pub fn set_language(&mut self, language: &str) -> Result<(), EditorError> {
        self.write_global(LANGUAGE_KEY, Value::String(language.trim().to_string()))?;
        self.globals.extension_language = language.trim().to_string();
        Ok(())
    }

    fn write_global(&self, key: &str, value: Value) -> Result<(), EditorError> {
        let mut items = Map::new();
        items.insert(key.to_string(), value);
        self.store.set(StorageArea::Local, items)?;
        Ok(())
    }

    /// Single dispatch point for runtime messages reaching the popup.
    pub fn handle_message(&mut self, message: &Message) -> Option<Response> {
        match message {
            Message::ReloadPopupSettings => {
                if let Err(e) = self.load() {
                    tracing::warn!(host = %self.host, error = %e, "popup reload failed");
                }
                None
            }
            Message::ThemeChanged { theme } => {
                self.globals.theme = *theme;
                None
            }
            Message::UserChangedThemePreference { .. }
            | Message::SiteDataDidChange
            | Message::SiteDataDidChangeForwarded
            | Message::SettingsImportedSuccessfully
            | Message::ApplyStyles(_)
            | Message::ResetStyles => None,
        }
    }

    /// Follows writes made elsewhere so the form converges on the store.
    pub fn poll_storage(&mut self) {
        while let Ok(event) = self.store_events.try_recv() {
            match event.area {
                StorageArea::Local => {
                    if !self.host.is_empty() {
                        if let Some(change) = event.get(&self.host) {
                            let tuple = change
                                .new_value
                                .as_ref()
                                .map(|v| SiteSettings::from_value(v).style)
                                .unwrap_or_default();
                            self.form = EditorForm::from_tuple(&tuple);
                        }
                    }
                    if event.keys().any(|k| k == THEME_KEY || k == UI_FONT_KEY || k == LANGUAGE_KEY) {
                        match self.store.get_globals() {
                            Ok(globals) => self.globals = globals,
                            Err(e) => tracing::warn!(error = %e, "could not reread globals"),
                        }
                    }
                }
                StorageArea::Session => {
                    if self.host.is_empty() {
                        continue;
                    }
                    if let Some(change) = event.get(&self.host) {
                        self.csp_warning = change
                            .new_value
                            .as_ref()
                            .and_then(|v| serde_json::from_value::<SessionFlag>(v.clone()).ok())
                            .map(|flag| flag.csp_blocked)
                            .unwrap_or(false);
                    }
                }
            }
        }
    }
}
