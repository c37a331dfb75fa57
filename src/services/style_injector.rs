//! Style Injector for Typeset.
//!
//! One instance per page load. Materializes a [`StyleTuple`] into the page:
//! a remote font link, one scoped `<style>` per root (document and every
//! shadow root), and `dir` attributes. Keeps that state correct as the page
//! mutates and as the page's site record changes in the store.

use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use crate::page::debounce::Debouncer;
use crate::page::dom::{Document, NodeId};
use crate::services::font_catalog::{font_stylesheet_url, is_system_font};
use crate::services::settings_store::{SettingsStore, SettingsStoreTrait};
use crate::services::style_rules::{build_ruleset, style_element_id, RuleScope, STYLE_ID_PREFIX};
use crate::types::message::{Message, Response};
use crate::types::settings::{Direction, SessionFlag, SiteSettings, StyleTuple};
use crate::types::storage::{StorageArea, StorageChange};

/// Quiet period after the last page mutation before styles are re-applied.
pub const DEFAULT_MUTATION_DEBOUNCE: Duration = Duration::from_millis(300);

/// Id of the injected web-font `<link>`.
pub const FONT_LINK_ID: &str = "typeset-font-link";

/// Lifecycle of the injector on its page.
#[derive(Debug, Clone, PartialEq)]
pub enum InjectorState {
    Uninitialized,
    LoadingSettings,
    Idle,
    Styled(StyleTuple),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyReason {
    Command,
    Reapply,
}

pub struct StyleInjector {
    host: String,
    store: SettingsStore,
    store_events: Receiver<StorageChange>,
    state: InjectorState,
    debounce: Debouncer,
    font_link: Option<NodeId>,
    /// `dir` values the page had before the first override, restored on reset.
    original_dir: HashMap<NodeId, Option<String>>,
    apply_count: u64,
    reapply_count: u64,
}

impl StyleInjector {
    pub fn new(host: &str, store: SettingsStore, debounce: Duration) -> Self {
        let store_events = store.subscribe();
        Self {
            host: host.to_string(),
            store,
            store_events,
            state: InjectorState::Uninitialized,
            debounce: Debouncer::new(debounce),
            font_link: None,
            original_dir: HashMap::new(),
            apply_count: 0,
            reapply_count: 0,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn state(&self) -> &InjectorState {
        &self.state
    }

    /// The tuple currently materialized, if any.
    pub fn applied(&self) -> Option<&StyleTuple> {
        match &self.state {
            InjectorState::Styled(tuple) => Some(tuple),
            _ => None,
        }
    }

    pub fn font_link(&self) -> Option<NodeId> {
        self.font_link
    }

    pub fn apply_count(&self) -> u64 {
        self.apply_count
    }

    /// Number of mutation-triggered re-applications.
    pub fn reapply_count(&self) -> u64 {
        self.reapply_count
    }

    pub fn is_reapply_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Reads the page's own record and applies it if there is one.
    pub fn initialize(&mut self, doc: &mut Document) {
        self.state = InjectorState::LoadingSettings;
        if self.host.is_empty() {
            self.state = InjectorState::Idle;
            return;
        }
        match self.store.get_site(&self.host) {
            Ok(Some(record)) => self.apply(doc, record.style),
            Ok(None) => self.state = InjectorState::Idle,
            Err(e) => {
                tracing::warn!(host = %self.host, error = %e, "could not read site settings");
                self.state = InjectorState::Idle;
            }
        }
    }

    /// Single dispatch point for page commands. Other kinds have no handler here.
    pub fn handle_message(&mut self, doc: &mut Document, message: &Message) -> Option<Response> {
        match message {
            Message::ApplyStyles(tuple) => {
                self.apply(doc, tuple.clone());
                Some(Response::ok())
            }
            Message::ResetStyles => {
                self.apply(doc, StyleTuple::default());
                Some(Response::ok())
            }
            Message::UserChangedThemePreference { .. }
            | Message::ThemeChanged { .. }
            | Message::SiteDataDidChange
            | Message::SiteDataDidChangeForwarded
            | Message::SettingsImportedSuccessfully
            | Message::ReloadPopupSettings => None,
        }
    }

    /// Applies `tuple`, replacing whatever was applied before. An empty tuple
    /// removes every injected artifact.
    pub fn apply(&mut self, doc: &mut Document, tuple: StyleTuple) {
        self.materialize(doc, &tuple, ApplyReason::Command);
        self.apply_count += 1;
        self.state = if tuple.is_empty() {
            self.debounce.cancel();
            InjectorState::Idle
        } else {
            InjectorState::Styled(tuple)
        };
    }

    fn materialize(&mut self, doc: &mut Document, tuple: &StyleTuple, reason: ApplyReason) {
        self.sync_font_link(doc, tuple, reason);
        self.sync_style_rules(doc, tuple);
        self.sync_direction_attributes(doc, tuple.direction);
        // Our own writes must not look like page activity.
        doc.take_mutations();
    }

    fn sync_font_link(&mut self, doc: &mut Document, tuple: &StyleTuple, reason: ApplyReason) {
        if is_system_font(&tuple.font) {
            self.remove_font_link(doc);
            self.clear_session_flag();
            return;
        }

        let href = font_stylesheet_url(&tuple.font, &tuple.font_weight);
        if reason == ApplyReason::Reapply {
            if let Some(link) = self.font_link {
                if doc.is_connected(link) && doc.get_attribute(link, "href") == Some(href.as_str()) {
                    return;
                }
            }
        }

        self.remove_font_link(doc);
        self.clear_session_flag();
        let link = doc.create_element("link");
        doc.set_attribute(link, "id", FONT_LINK_ID);
        doc.set_attribute(link, "rel", "stylesheet");
        doc.set_attribute(link, "href", &href);
        let container = head_or_root(doc);
        doc.append_child(container, link);
        self.font_link = Some(link);
    }

    fn remove_font_link(&mut self, doc: &mut Document) {
        if let Some(link) = self.font_link.take() {
            doc.remove(link);
        }
        let root = doc.document_element();
        while let Some(stray) = doc.find_by_id(root, FONT_LINK_ID) {
            doc.remove(stray);
        }
    }

    fn sync_style_rules(&mut self, doc: &mut Document, tuple: &StyleTuple) {
        let mut roots = vec![doc.document_element()];
        roots.extend(doc.shadow_roots());

        for root in roots {
            let scope = if doc.is_shadow_root(root) {
                RuleScope::ShadowRoot
            } else {
                RuleScope::Document
            };
            let css = build_ruleset(tuple, scope);
            let id = style_element_id(doc, root);
            // A renamed shadow host leaves its old style behind under a stale id.
            for stale in doc.elements_by_tag(root, "style") {
                let stale_id = doc.get_attribute(stale, "id").unwrap_or_default();
                if stale_id.starts_with(STYLE_ID_PREFIX) && stale_id != id {
                    doc.remove(stale);
                }
            }
            let existing = doc.find_by_id(root, &id);

            match (existing, css.is_empty()) {
                (Some(style), true) => {
                    doc.remove(style);
                }
                (None, true) => {}
                (Some(style), false) => doc.set_text(style, &css),
                (None, false) => {
                    let style = doc.create_element("style");
                    doc.set_attribute(style, "id", &id);
                    doc.set_text(style, &css);
                    let container = match scope {
                        RuleScope::Document => head_or_root(doc),
                        RuleScope::ShadowRoot => root,
                    };
                    doc.append_child(container, style);
                }
            }
        }
    }

    fn sync_direction_attributes(&mut self, doc: &mut Document, direction: Direction) {
        if direction == Direction::Default {
            // Only nodes we forced are touched; the page's own `dir` stays.
            for (node, original) in self.original_dir.drain() {
                match original {
                    Some(value) => doc.set_attribute(node, "dir", &value),
                    None => doc.remove_attribute(node, "dir"),
                }
            }
            return;
        }

        let mut targets = vec![doc.document_element(), doc.body()];
        targets.extend(doc.shadow_roots().into_iter().filter_map(|r| doc.host_of(r)));
        for node in targets {
            self.original_dir
                .entry(node)
                .or_insert_with(|| doc.get_attribute(node, "dir").map(str::to_string));
            doc.set_attribute(node, "dir", direction.as_str());
        }
    }

    fn clear_session_flag(&self) {
        if self.host.is_empty() {
            return;
        }
        if let Err(e) = self.store.clear_session_flag(&self.host) {
            tracing::warn!(host = %self.host, error = %e, "could not clear font flag");
        }
    }

    /// Records the outcome of loading `link`. Outcomes for replaced links are ignored.
    pub fn on_font_load(&mut self, link: NodeId, loaded: bool) {
        if self.font_link != Some(link) || self.host.is_empty() {
            return;
        }
        if loaded {
            self.clear_session_flag();
            return;
        }
        tracing::debug!(host = %self.host, "remote font blocked");
        if let Err(e) = self
            .store
            .set_session_flag(&self.host, SessionFlag { csp_blocked: true })
        {
            tracing::warn!(host = %self.host, error = %e, "could not record font flag");
        }
    }

    /// Consumes page mutations; any activity restarts the re-apply window.
    pub fn observe_mutations(&mut self, doc: &mut Document, now: Instant) {
        let records = doc.take_mutations();
        if !records.is_empty() && self.applied().is_some() {
            self.debounce.trigger(now);
        }
    }

    /// Re-applies the last tuple once the page has been quiet for the window.
    pub fn poll_debounce(&mut self, doc: &mut Document, now: Instant) -> bool {
        if !self.debounce.poll(now, || {}) {
            return false;
        }
        let Some(tuple) = self.applied().cloned() else {
            return false;
        };
        self.materialize(doc, &tuple, ApplyReason::Reapply);
        self.reapply_count += 1;
        true
    }

    /// Handles store changes to this page's record, in delivery order.
    pub fn poll_storage(&mut self, doc: &mut Document) {
        while let Ok(event) = self.store_events.try_recv() {
            if event.area != StorageArea::Local || self.host.is_empty() {
                continue;
            }
            let Some(change) = event.get(&self.host) else {
                continue;
            };
            let tuple = change
                .new_value
                .as_ref()
                .map(|v| SiteSettings::from_value(v).style)
                .unwrap_or_default();
            if self.applied() == Some(&tuple) {
                continue;
            }
            self.apply(doc, tuple);
        }
    }

    /// One turn of the page's event loop.
    pub fn tick(&mut self, doc: &mut Document, now: Instant) {
        self.poll_storage(doc);
        self.observe_mutations(doc, now);
        self.poll_debounce(doc, now);
    }
}

/// Where injected head content goes: `<head>`, or the document element once
/// a page script has detached it.
fn head_or_root(doc: &Document) -> NodeId {
    let head = doc.head();
    if doc.is_connected(head) {
        head
    } else {
        doc.document_element()
    }
}
