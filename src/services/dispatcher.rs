//! Background dispatcher: relays notifications between extension pages and
//! pushes a page's stored tuple when navigation completes.

use std::sync::mpsc::Receiver;

use crate::managers::tab_manager::{is_scriptable, page_host, TabChannel};
use crate::services::settings_store::{SettingsStore, SettingsStoreTrait};
use crate::types::errors::MessagingError;
use crate::types::message::{Message, Outbox, Response};
use crate::types::settings::is_site_key;
use crate::types::storage::{StorageArea, StorageChange};

pub struct Dispatcher {
    store: SettingsStore,
    store_events: Receiver<StorageChange>,
    delivery_failure_logged: bool,
}

impl Dispatcher {
    pub fn new(store: SettingsStore) -> Self {
        let store_events = store.subscribe();
        Self {
            store,
            store_events,
            delivery_failure_logged: false,
        }
    }

    /// Single dispatch point for runtime messages reaching the background.
    pub fn handle_message(&mut self, message: &Message, out: &mut Outbox) -> Option<Response> {
        match message {
            Message::UserChangedThemePreference { theme } => {
                out.post(Message::ThemeChanged { theme: *theme });
                None
            }
            Message::SiteDataDidChange => {
                out.post(Message::SiteDataDidChangeForwarded);
                None
            }
            Message::SettingsImportedSuccessfully => {
                out.post(Message::ReloadPopupSettings);
                Some(Response::ok())
            }
            Message::ThemeChanged { .. }
            | Message::SiteDataDidChangeForwarded
            | Message::ReloadPopupSettings
            | Message::ApplyStyles(_)
            | Message::ResetStyles => None,
        }
    }

    /// Relays local-store writes that touched site records.
    pub fn poll_storage(&mut self, out: &mut Outbox) {
        while let Ok(event) = self.store_events.try_recv() {
            if event.area == StorageArea::Local && event.keys().any(is_site_key) {
                tracing::debug!("site records changed, notifying editors");
                out.post(Message::SiteDataDidChangeForwarded);
            }
        }
    }

    /// Pushes the page's record once a top-level navigation has finished.
    /// Returns true when the page acknowledged the command.
    pub fn on_navigation_completed(
        &mut self,
        tab_id: &str,
        url: &str,
        tabs: &mut dyn TabChannel,
    ) -> bool {
        if !is_scriptable(url) {
            return false;
        }
        let host = page_host(url);
        if host.is_empty() {
            return false;
        }
        let record = match self.store.get_site(&host) {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "could not read site settings");
                return false;
            }
        };
        match tabs.send_to_tab(tab_id, &Message::ApplyStyles(record.style)) {
            Ok(_) => true,
            Err(e) => {
                self.report_delivery_failure(tab_id, &e);
                false
            }
        }
    }

    fn report_delivery_failure(&mut self, tab_id: &str, error: &MessagingError) {
        if error.is_routine() || self.delivery_failure_logged {
            tracing::debug!(tab = tab_id, error = %error, "apply on navigation not delivered");
            return;
        }
        self.delivery_failure_logged = true;
        tracing::warn!(tab = tab_id, error = %error, "apply on navigation failed");
    }

    pub fn has_logged_delivery_failure(&self) -> bool {
        self.delivery_failure_logged
    }
}
