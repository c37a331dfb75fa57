//! Settings manager page: every site record, backup and restore.

use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Value};

use crate::managers::tab_manager::{send_quietly, TabChannel};
use crate::services::editor_form::{Control, EditorForm};
use crate::services::localization_engine::{param, LocalizationEngine, LocalizationEngineTrait};
use crate::services::settings_store::{SettingsStore, SettingsStoreTrait};
use crate::types::errors::{EditorError, ImportError, StorageError};
use crate::types::message::{Message, Outbox, Response};
use crate::types::settings::{GlobalSettings, SiteSettings, StyleTuple, GLOBAL_KEYS};
use crate::types::storage::{KeySelector, StorageArea, StorageChange};

/// A backup ready to be downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub file_name: String,
    pub json: String,
    /// `data:` URL carrying the JSON, base64-encoded.
    pub download_url: String,
}

pub struct SettingsManager {
    store: SettingsStore,
    store_events: Receiver<StorageChange>,
    sites: Vec<SiteSettings>,
    globals: GlobalSettings,
    strings: LocalizationEngine,
    status: Option<String>,
}

impl SettingsManager {
    pub fn open(store: SettingsStore) -> Result<Self, EditorError> {
        let store_events = store.subscribe();
        let strings = LocalizationEngine::new()?;
        let mut manager = Self {
            store,
            store_events,
            sites: Vec::new(),
            globals: GlobalSettings::default(),
            strings,
            status: None,
        };
        manager.reload()?;
        Ok(manager)
    }

    /// Rereads the site list and the globals.
    pub fn reload(&mut self) -> Result<(), StorageError> {
        let all = self.store.get(StorageArea::Local, KeySelector::All)?;
        self.globals = GlobalSettings::from_map(&all);
        self.strings.set_locale_or_default(&self.globals.extension_language);
        let keys = self.store.site_keys()?;
        self.sites = keys
            .iter()
            .filter_map(|key| all.get(key).map(|v| (key, v)))
            .map(|(key, value)| SiteSettings::new(key, SiteSettings::from_value(value).style))
            .collect();
        Ok(())
    }

    /// Site records sorted by hostname.
    pub fn sites(&self) -> &[SiteSettings] {
        &self.sites
    }

    pub fn site(&self, host: &str) -> Option<&SiteSettings> {
        self.sites.iter().find(|s| s.host == host)
    }

    pub fn globals(&self) -> &GlobalSettings {
        &self.globals
    }

    /// Last localized outcome of an export, import, reset or removal.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn set_status(&mut self, key: &str, params: Option<&HashMap<String, String>>) {
        self.status = Some(self.strings.t(key, params));
    }

    /// Edits one field of a listed site and pushes the result to its open tabs.
    pub fn edit_site(
        &mut self,
        host: &str,
        control: Control,
        value: &str,
        tabs: &mut dyn TabChannel,
    ) -> Result<StyleTuple, EditorError> {
        let host = host.trim().to_ascii_lowercase();
        if host.is_empty() {
            return Err(EditorError::NoHost(host));
        }
        let current = self
            .store
            .get_site(&host)?
            .map(|record| record.style)
            .unwrap_or_default();
        let mut form = EditorForm::from_tuple(&current);
        form.set(control, value);
        let tuple = form.commit();
        self.store.set_site(&SiteSettings::new(&host, tuple.clone()))?;
        for tab_id in tabs.tabs_for_host(&host) {
            send_quietly(tabs, &tab_id, &Message::ApplyStyles(tuple.clone()));
        }
        self.reload()?;
        Ok(tuple)
    }

    /// Deletes a site record and tells the other pages.
    pub fn remove_site(&mut self, host: &str, out: &mut Outbox) -> Result<(), StorageError> {
        match self.store.remove(StorageArea::Local, host) {
            Ok(()) => {
                out.post(Message::SiteDataDidChange);
                self.set_status("status.site_removed", Some(&param("host", host)));
                self.reload()
            }
            Err(e) => {
                let mut params = param("host", host);
                params.insert("error".to_string(), e.to_string());
                self.set_status("status.remove_failed", Some(&params));
                Err(e)
            }
        }
    }

    /// Builds a backup of every site record and the three globals, with
    /// defaults filled in for missing globals.
    pub fn export(&mut self) -> Result<ExportFile, StorageError> {
        match self.build_export() {
            Ok(file) => {
                self.set_status("status.export_ok", Some(&param("file", &file.file_name)));
                Ok(file)
            }
            Err(e) => {
                self.set_status("status.export_failed", Some(&param("error", &e)));
                Err(e)
            }
        }
    }

    fn build_export(&self) -> Result<ExportFile, StorageError> {
        let all = self.store.get(StorageArea::Local, KeySelector::All)?;
        let mut document = Map::new();
        for key in self.store.site_keys()? {
            if let Some(value) = all.get(&key) {
                document.insert(key, value.clone());
            }
        }
        let globals = GlobalSettings::from_map(&all).to_map();
        for key in GLOBAL_KEYS {
            if let Some(value) = globals.get(key) {
                document.insert(key.to_string(), value.clone());
            }
        }

        let json = serde_json::to_string_pretty(&Value::Object(document))
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Ok(ExportFile {
            file_name: format!("typeset-backup-{}.json", stamp),
            download_url: format!("data:application/json;base64,{}", STANDARD.encode(json.as_bytes())),
            json,
        })
    }

    /// Restores a backup. The parsed object is written wholesale in one `set`;
    /// values are not validated. Returns the number of keys written.
    pub fn import(&mut self, text: &str, out: &mut Outbox) -> Result<usize, ImportError> {
        match self.apply_import(text) {
            Ok(count) => {
                out.post(Message::SettingsImportedSuccessfully);
                self.set_status("status.import_ok", Some(&param("count", count)));
                if let Err(e) = self.reload() {
                    tracing::warn!(error = %e, "reload after import failed");
                }
                Ok(count)
            }
            Err(e) => {
                tracing::debug!(error = %e, "import rejected");
                self.set_status("status.import_failed", Some(&param("error", &e)));
                Err(e)
            }
        }
    }

    fn apply_import(&self, text: &str) -> Result<usize, ImportError> {
        let parsed: Value =
            serde_json::from_str(text).map_err(|e| ImportError::ParseError(e.to_string()))?;
        let Value::Object(items) = parsed else {
            return Err(ImportError::NotAnObject);
        };
        let count = items.len();
        self.store.set(StorageArea::Local, items)?;
        Ok(count)
    }

    /// Clears the local area and reseeds the three globals with defaults.
    pub fn reset_all(&mut self) -> Result<(), StorageError> {
        let result = self
            .store
            .clear(StorageArea::Local)
            .and_then(|_| self.store.set(StorageArea::Local, GlobalSettings::default().to_map()));
        match result {
            Ok(()) => {
                self.reload()?;
                self.set_status("status.reset_ok", None);
                Ok(())
            }
            Err(e) => {
                self.set_status("status.reset_failed", Some(&param("error", &e)));
                Err(e)
            }
        }
    }

    /// Single dispatch point for runtime messages reaching the manager.
    pub fn handle_message(&mut self, message: &Message) -> Option<Response> {
        match message {
            Message::SiteDataDidChangeForwarded => {
                if let Err(e) = self.reload() {
                    tracing::warn!(error = %e, "site list reload failed");
                }
                None
            }
            Message::ThemeChanged { theme } => {
                self.globals.theme = *theme;
                None
            }
            Message::UserChangedThemePreference { .. }
            | Message::SiteDataDidChange
            | Message::SettingsImportedSuccessfully
            | Message::ReloadPopupSettings
            | Message::ApplyStyles(_)
            | Message::ResetStyles => None,
        }
    }

    /// Picks up global changes made elsewhere (language, UI font).
    pub fn poll_storage(&mut self) {
        let mut globals_changed = false;
        while let Ok(event) = self.store_events.try_recv() {
            if event.area == StorageArea::Local && event.keys().any(|k| GLOBAL_KEYS.contains(&k)) {
                globals_changed = true;
            }
        }
        if !globals_changed {
            return;
        }
        match self.store.get_globals() {
            Ok(globals) => {
                self.strings.set_locale_or_default(&globals.extension_language);
                self.globals = globals;
            }
            Err(e) => tracing::warn!(error = %e, "could not reread globals"),
        }
    }
}
