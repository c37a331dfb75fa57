use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use url::Url;
use uuid::Uuid;

use crate::page::dom::Document;
use crate::services::settings_store::SettingsStore;
use crate::services::style_injector::StyleInjector;
use crate::types::errors::{MessagingError, TabError};
use crate::types::message::{Message, Response};
use crate::types::tab::TabInfo;

/// Delivery of page commands to a tab's style injector.
pub trait TabChannel {
    fn send_to_tab(&mut self, tab_id: &str, message: &Message) -> Result<Response, MessagingError>;
    /// Ids of every open tab showing `host`.
    fn tabs_for_host(&self, host: &str) -> Vec<String>;
}

/// Sends a page command, logging and swallowing any failure.
/// Routine failures (no injector on the page) are only logged at debug level.
pub fn send_quietly(tabs: &mut dyn TabChannel, tab_id: &str, message: &Message) -> bool {
    match tabs.send_to_tab(tab_id, message) {
        Ok(_) => true,
        Err(e) if e.is_routine() => {
            tracing::debug!(tab = tab_id, message = message.name(), error = %e, "page not listening");
            false
        }
        Err(e) => {
            tracing::warn!(tab = tab_id, message = message.name(), error = %e, "page command failed");
            false
        }
    }
}

/// Schemes the injector runs on.
const SCRIPTABLE_SCHEMES: &[&str] = &["http", "https", "file"];

/// True for http(s) and file URLs; internal browser pages are excluded.
pub fn is_scriptable(url: &str) -> bool {
    Url::parse(url)
        .map(|u| SCRIPTABLE_SCHEMES.contains(&u.scheme()))
        .unwrap_or(false)
}

/// The settings key for a page: its lowercase hostname. Empty for pages
/// without one and for internal browser pages.
pub fn page_host(url: &str) -> String {
    Url::parse(url)
        .ok()
        .filter(|u| SCRIPTABLE_SCHEMES.contains(&u.scheme()))
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// A tab with its live document and, on scriptable pages, its injector.
pub struct PageTab {
    pub info: TabInfo,
    pub document: Document,
    pub injector: Option<StyleInjector>,
}

/// Trait defining the tab registry interface.
pub trait TabManagerTrait {
    fn open_tab(&mut self, url: &str) -> Result<String, TabError>;
    fn navigate(&mut self, tab_id: &str, url: &str) -> Result<(), TabError>;
    fn close_tab(&mut self, tab_id: &str) -> Result<(), TabError>;
    fn get_tab(&self, tab_id: &str) -> Option<&PageTab>;
    fn get_tab_mut(&mut self, tab_id: &str) -> Option<&mut PageTab>;
    fn list_tabs(&self) -> Vec<&TabInfo>;
    fn tab_count(&self) -> usize;
}

/// In-memory registry of open tabs. Every page load gets a fresh document and
/// a fresh injector, mirroring a content script that runs once per document.
pub struct TabManager {
    store: SettingsStore,
    debounce: Duration,
    tabs: HashMap<String, PageTab>,
    tab_order: Vec<String>,
}

impl TabManager {
    pub fn new(store: SettingsStore, debounce: Duration) -> Self {
        Self {
            store,
            debounce,
            tabs: HashMap::new(),
            tab_order: Vec::new(),
        }
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Builds the document for a fresh page load and runs the injector's
    /// initial evaluation on it.
    fn load_page(&self, url: &str) -> (Document, Option<StyleInjector>) {
        let mut document = Document::new(url);
        let injector = if is_scriptable(url) {
            let mut injector = StyleInjector::new(&page_host(url), self.store.clone(), self.debounce);
            injector.initialize(&mut document);
            Some(injector)
        } else {
            None
        };
        (document, injector)
    }

    /// Delivers a page load result for the tab's current font link.
    pub fn complete_font_load(&mut self, tab_id: &str, loaded: bool) -> Result<bool, TabError> {
        let tab = self
            .tabs
            .get_mut(tab_id)
            .ok_or_else(|| TabError::NotFound(tab_id.to_string()))?;
        let Some(injector) = tab.injector.as_mut() else {
            return Ok(false);
        };
        match injector.font_link() {
            Some(link) => {
                injector.on_font_load(link, loaded);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Runs pending store reactions on every page.
    pub fn poll_storage(&mut self) {
        for tab in self.tabs.values_mut() {
            if let Some(injector) = tab.injector.as_mut() {
                injector.poll_storage(&mut tab.document);
            }
        }
    }

    /// One event-loop turn for every page: store reactions, mutation
    /// observation and debounced re-application.
    pub fn tick(&mut self, now: Instant) {
        for tab in self.tabs.values_mut() {
            if let Some(injector) = tab.injector.as_mut() {
                injector.tick(&mut tab.document, now);
            }
        }
    }
}

impl TabManagerTrait for TabManager {
    fn open_tab(&mut self, url: &str) -> Result<String, TabError> {
        Url::parse(url).map_err(|_| TabError::InvalidUrl(url.to_string()))?;
        let id = Uuid::new_v4().to_string();
        let (document, injector) = self.load_page(url);
        let info = TabInfo {
            id: id.clone(),
            url: url.to_string(),
            host: page_host(url),
            scriptable: injector.is_some(),
            created_at: Self::now(),
        };
        self.tabs.insert(
            id.clone(),
            PageTab {
                info,
                document,
                injector,
            },
        );
        self.tab_order.push(id.clone());
        Ok(id)
    }

    fn navigate(&mut self, tab_id: &str, url: &str) -> Result<(), TabError> {
        Url::parse(url).map_err(|_| TabError::InvalidUrl(url.to_string()))?;
        if !self.tabs.contains_key(tab_id) {
            return Err(TabError::NotFound(tab_id.to_string()));
        }
        let (document, injector) = self.load_page(url);
        let tab = self
            .tabs
            .get_mut(tab_id)
            .ok_or_else(|| TabError::NotFound(tab_id.to_string()))?;
        tab.info.url = url.to_string();
        tab.info.host = page_host(url);
        tab.info.scriptable = injector.is_some();
        tab.document = document;
        tab.injector = injector;
        Ok(())
    }

    fn close_tab(&mut self, tab_id: &str) -> Result<(), TabError> {
        self.tabs
            .remove(tab_id)
            .ok_or_else(|| TabError::NotFound(tab_id.to_string()))?;
        self.tab_order.retain(|id| id != tab_id);
        Ok(())
    }

    fn get_tab(&self, tab_id: &str) -> Option<&PageTab> {
        self.tabs.get(tab_id)
    }

    fn get_tab_mut(&mut self, tab_id: &str) -> Option<&mut PageTab> {
        self.tabs.get_mut(tab_id)
    }

    fn list_tabs(&self) -> Vec<&TabInfo> {
        self.tab_order
            .iter()
            .filter_map(|id| self.tabs.get(id))
            .map(|t| &t.info)
            .collect()
    }

    fn tab_count(&self) -> usize {
        self.tabs.len()
    }
}

impl TabChannel for TabManager {
    fn send_to_tab(&mut self, tab_id: &str, message: &Message) -> Result<Response, MessagingError> {
        let tab = self
            .tabs
            .get_mut(tab_id)
            .ok_or_else(|| MessagingError::NoReceiver(format!("tab {}", tab_id)))?;
        let url = tab.info.url.clone();
        let injector = tab
            .injector
            .as_mut()
            .ok_or_else(|| MessagingError::NoReceiver(url.clone()))?;
        injector
            .handle_message(&mut tab.document, message)
            .ok_or(MessagingError::NoReceiver(url))
    }

    fn tabs_for_host(&self, host: &str) -> Vec<String> {
        self.tab_order
            .iter()
            .filter(|id| self.tabs.get(*id).map(|t| t.info.host == host).unwrap_or(false))
            .cloned()
            .collect()
    }
}
