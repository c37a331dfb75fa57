//! App Core for Typeset.
//!
//! Owns the store and every context (dispatcher, open pages with their
//! injectors, popup, settings manager) and routes runtime messages between
//! them.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::database::connection::Database;
use crate::managers::tab_manager::{TabManager, TabManagerTrait};
use crate::page::dom::Document;
use crate::platform;
use crate::services::config_engine::{ConfigEngine, ConfigEngineTrait};
use crate::services::dispatcher::Dispatcher;
use crate::services::editor_form::Control;
use crate::services::localization_engine::{LocalizationEngine, LocalizationEngineTrait};
use crate::services::popup_editor::PopupEditor;
use crate::services::settings_manager::{ExportFile, SettingsManager};
use crate::services::settings_store::{SettingsStore, SettingsStoreTrait};
use crate::services::style_injector::StyleInjector;
use crate::types::config::HostConfig;
use crate::types::errors::{AppError, TabError};
use crate::types::message::{ContextKind, Message, Outbox, Response};
use crate::types::settings::{GlobalSettings, StyleTuple, ThemeMode, GLOBAL_KEYS};
use crate::types::storage::{KeySelector, StorageArea};

pub struct App {
    pub db: Arc<Database>,
    pub config_engine: ConfigEngine,
    pub strings: LocalizationEngine,
    pub store: SettingsStore,
    pub tab_manager: TabManager,
    pub dispatcher: Dispatcher,
    pub popup: Option<PopupEditor>,
    pub settings_manager: Option<SettingsManager>,
}

impl App {
    /// Opens the database named by the engine's loaded config (or the
    /// platform default) and seeds missing globals.
    pub fn new(config_engine: ConfigEngine) -> Result<Self, Box<dyn std::error::Error>> {
        let path = config_engine
            .get_config()
            .storage
            .database_path
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(platform::default_database_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Arc::new(Database::open(&path)?);
        tracing::info!(path = %path.display(), "settings database opened");
        Ok(Self::with_database(db, config_engine)?)
    }

    /// An app over a throwaway in-memory database with default config.
    pub fn in_memory() -> Result<Self, Box<dyn std::error::Error>> {
        let db = Arc::new(Database::open_in_memory()?);
        Ok(Self::with_database(db, ConfigEngine::new(None))?)
    }

    fn with_database(db: Arc<Database>, config_engine: ConfigEngine) -> Result<Self, AppError> {
        let store = SettingsStore::new(db.clone());
        let debounce = Duration::from_millis(config_engine.get_config().page.mutation_debounce_ms);
        let mut app = Self {
            tab_manager: TabManager::new(store.clone(), debounce),
            dispatcher: Dispatcher::new(store.clone()),
            db,
            config_engine,
            strings: LocalizationEngine::new()?,
            store,
            popup: None,
            settings_manager: None,
        };
        app.seed_globals()?;
        app.pump();
        Ok(app)
    }

    /// Writes defaults for any global key that is missing.
    fn seed_globals(&mut self) -> Result<(), AppError> {
        let keys = GLOBAL_KEYS.iter().map(|k| k.to_string()).collect();
        let present = self.store.get(StorageArea::Local, KeySelector::Many(keys))?;
        let missing: Map<_, _> = GlobalSettings::default()
            .to_map()
            .into_iter()
            .filter(|(key, _)| !present.contains_key(key))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Ok(self.store.set(StorageArea::Local, missing)?)
    }

    // --- host config ---

    pub fn config(&self) -> &HostConfig {
        self.config_engine.get_config()
    }

    /// Updates and saves one config value. Takes effect on the next start.
    pub fn set_config_value(&mut self, key: &str, value: Value) -> Result<(), AppError> {
        self.config_engine.set_value(key, value)?;
        tracing::info!(key, "config updated");
        Ok(())
    }

    pub fn reset_config(&mut self) -> Result<(), AppError> {
        Ok(self.config_engine.reset()?)
    }

    // --- strings ---

    /// Looks up a status string in the stored `extensionLanguage`.
    pub fn translate(
        &mut self,
        key: &str,
        params: Option<&HashMap<String, String>>,
    ) -> Result<String, AppError> {
        let language = self.store.get_globals()?.extension_language;
        self.strings.set_locale_or_default(&language);
        Ok(self.strings.try_t(key, params)?)
    }

    pub fn available_locales(&self) -> Vec<String> {
        self.strings.get_available_locales()
    }

    // --- tabs ---

    pub fn open_tab(&mut self, url: &str) -> Result<String, AppError> {
        let id = self.tab_manager.open_tab(url)?;
        self.navigation_completed(&id);
        Ok(id)
    }

    pub fn navigate(&mut self, tab_id: &str, url: &str) -> Result<(), AppError> {
        self.tab_manager.navigate(tab_id, url)?;
        if self.popup.as_ref().map(|p| p.tab_id() == tab_id).unwrap_or(false) {
            self.popup = None;
        }
        self.navigation_completed(tab_id);
        Ok(())
    }

    pub fn close_tab(&mut self, tab_id: &str) -> Result<(), AppError> {
        self.tab_manager.close_tab(tab_id)?;
        if self.popup.as_ref().map(|p| p.tab_id() == tab_id).unwrap_or(false) {
            self.popup = None;
        }
        Ok(())
    }

    fn navigation_completed(&mut self, tab_id: &str) {
        let Some(url) = self.tab_manager.get_tab(tab_id).map(|t| t.info.url.clone()) else {
            return;
        };
        self.dispatcher
            .on_navigation_completed(tab_id, &url, &mut self.tab_manager);
        self.pump();
    }

    pub fn document(&self, tab_id: &str) -> Option<&Document> {
        self.tab_manager.get_tab(tab_id).map(|t| &t.document)
    }

    /// Mutable access to a page, standing in for the page's own scripts.
    pub fn document_mut(&mut self, tab_id: &str) -> Option<&mut Document> {
        self.tab_manager.get_tab_mut(tab_id).map(|t| &mut t.document)
    }

    pub fn injector(&self, tab_id: &str) -> Option<&StyleInjector> {
        self.tab_manager
            .get_tab(tab_id)
            .and_then(|t| t.injector.as_ref())
    }

    pub fn complete_font_load(&mut self, tab_id: &str, loaded: bool) -> Result<bool, AppError> {
        let delivered = self.tab_manager.complete_font_load(tab_id, loaded)?;
        self.pump();
        Ok(delivered)
    }

    // --- popup ---

    pub fn open_popup(&mut self, tab_id: &str) -> Result<&PopupEditor, AppError> {
        let url = self
            .tab_manager
            .get_tab(tab_id)
            .map(|t| t.info.url.clone())
            .ok_or_else(|| TabError::NotFound(tab_id.to_string()))?;
        let popup = PopupEditor::open(self.store.clone(), tab_id, &url)?;
        Ok(self.popup.insert(popup))
    }

    pub fn close_popup(&mut self) {
        self.popup = None;
    }

    fn popup_mut(&mut self) -> Result<&mut PopupEditor, AppError> {
        self.popup
            .as_mut()
            .ok_or_else(|| AppError::NotOpen("popup".to_string()))
    }

    pub fn popup_edit(&mut self, control: Control, value: &str) -> Result<StyleTuple, AppError> {
        let popup = self
            .popup
            .as_mut()
            .ok_or_else(|| AppError::NotOpen("popup".to_string()))?;
        let tuple = popup.edit(control, value, &mut self.tab_manager)?;
        self.pump();
        Ok(tuple)
    }

    pub fn popup_reset(&mut self) -> Result<(), AppError> {
        let popup = self
            .popup
            .as_mut()
            .ok_or_else(|| AppError::NotOpen("popup".to_string()))?;
        popup.reset_site(&mut self.tab_manager)?;
        self.pump();
        Ok(())
    }

    pub fn popup_set_theme(&mut self, theme: ThemeMode) -> Result<Vec<Response>, AppError> {
        let mut out = Outbox::new();
        self.popup_mut()?.set_theme(theme, &mut out)?;
        let responses = self.route(ContextKind::Popup, out);
        self.pump();
        Ok(responses)
    }

    pub fn popup_set_ui_font(&mut self, font: &str) -> Result<(), AppError> {
        self.popup_mut()?.set_ui_font(font)?;
        self.pump();
        Ok(())
    }

    pub fn popup_set_language(&mut self, language: &str) -> Result<(), AppError> {
        self.popup_mut()?.set_language(language)?;
        self.pump();
        Ok(())
    }

    // --- settings manager ---

    pub fn open_settings_manager(&mut self) -> Result<&SettingsManager, AppError> {
        let manager = SettingsManager::open(self.store.clone())?;
        Ok(self.settings_manager.insert(manager))
    }

    pub fn close_settings_manager(&mut self) {
        self.settings_manager = None;
    }

    fn manager_mut(&mut self) -> Result<&mut SettingsManager, AppError> {
        self.settings_manager
            .as_mut()
            .ok_or_else(|| AppError::NotOpen("settings manager".to_string()))
    }

    pub fn manager_edit(
        &mut self,
        host: &str,
        control: Control,
        value: &str,
    ) -> Result<StyleTuple, AppError> {
        let manager = self
            .settings_manager
            .as_mut()
            .ok_or_else(|| AppError::NotOpen("settings manager".to_string()))?;
        let tuple = manager.edit_site(host, control, value, &mut self.tab_manager)?;
        self.pump();
        Ok(tuple)
    }

    pub fn manager_remove(&mut self, host: &str) -> Result<(), AppError> {
        let mut out = Outbox::new();
        self.manager_mut()?.remove_site(host, &mut out)?;
        self.route(ContextKind::SettingsManager, out);
        self.pump();
        Ok(())
    }

    pub fn manager_export(&mut self) -> Result<ExportFile, AppError> {
        Ok(self.manager_mut()?.export()?)
    }

    /// Imports a backup; returns the number of keys written and the replies
    /// the import notification collected.
    pub fn manager_import(&mut self, text: &str) -> Result<(usize, Vec<Response>), AppError> {
        let mut out = Outbox::new();
        let count = self.manager_mut()?.import(text, &mut out)?;
        let responses = self.route(ContextKind::SettingsManager, out);
        self.pump();
        Ok((count, responses))
    }

    pub fn manager_reset_all(&mut self) -> Result<(), AppError> {
        self.manager_mut()?.reset_all()?;
        self.pump();
        Ok(())
    }

    // --- messaging ---

    /// Broadcasts a runtime message from `from` to every other context.
    pub fn send_message(&mut self, from: ContextKind, message: Message) -> Vec<Response> {
        let mut out = Outbox::new();
        out.post(message);
        let responses = self.route(from, out);
        self.pump();
        responses
    }

    /// Delivers queued runtime messages, including any the receivers post in
    /// turn, to every context except the sender. Returns all replies.
    fn route(&mut self, from: ContextKind, mut out: Outbox) -> Vec<Response> {
        let mut queue: VecDeque<(ContextKind, Message)> =
            out.drain().into_iter().map(|m| (from, m)).collect();
        let mut responses = Vec::new();

        while let Some((sender, message)) = queue.pop_front() {
            if message.is_page_command() {
                tracing::warn!(message = message.name(), "page command on the runtime bus dropped");
                continue;
            }
            tracing::debug!(from = ?sender, message = message.name(), "runtime message");

            if sender != ContextKind::Dispatcher {
                let mut posted = Outbox::new();
                responses.extend(self.dispatcher.handle_message(&message, &mut posted));
                queue.extend(posted.drain().into_iter().map(|m| (ContextKind::Dispatcher, m)));
            }
            if sender != ContextKind::Popup {
                if let Some(popup) = self.popup.as_mut() {
                    responses.extend(popup.handle_message(&message));
                }
            }
            if sender != ContextKind::SettingsManager {
                if let Some(manager) = self.settings_manager.as_mut() {
                    responses.extend(manager.handle_message(&message));
                }
            }
        }
        responses
    }

    /// Drains store change events in every context and routes whatever the
    /// dispatcher relays.
    pub fn pump(&mut self) {
        self.tab_manager.poll_storage();
        let mut out = Outbox::new();
        self.dispatcher.poll_storage(&mut out);
        if let Some(popup) = self.popup.as_mut() {
            popup.poll_storage();
        }
        if let Some(manager) = self.settings_manager.as_mut() {
            manager.poll_storage();
        }
        if !out.is_empty() {
            self.route(ContextKind::Dispatcher, out);
        }
    }

    /// One turn of the host event loop: page timers, then store events.
    pub fn tick(&mut self, now: Instant) {
        self.tab_manager.tick(now);
        self.pump();
    }
}
