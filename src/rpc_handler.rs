//! RPC method handler for the Typeset JSON-RPC host.
//!
//! Kept apart from `rpc_server.rs` so it can be unit-tested. `handle_method`
//! dispatches each call to the `App`.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{json, Value};

use crate::app::App;
use crate::managers::tab_manager::TabManagerTrait;
use crate::page::dom::{Document, NodeId};
use crate::services::config_engine::ConfigEngineTrait;
use crate::services::editor_form::{Control, EditorForm};
use crate::services::popup_editor::PopupEditor;
use crate::services::settings_manager::SettingsManager;
use crate::services::settings_store::SettingsStoreTrait;
use crate::services::style_injector::InjectorState;
use crate::types::message::{ContextKind, Message, Response};
use crate::types::settings::ThemeMode;
use crate::types::storage::{KeySelector, StorageArea};

fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str, String> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", name))
}

fn form_json(form: &EditorForm) -> Value {
    let mut map = serde_json::Map::new();
    for control in Control::ALL {
        map.insert(control.name().to_string(), json!(form.value(control)));
    }
    Value::Object(map)
}

fn popup_json(popup: &PopupEditor) -> Value {
    json!({
        "tab": popup.tab_id(),
        "host": popup.host(),
        "form": form_json(popup.form()),
        "theme": popup.theme().as_str(),
        "uiFont": popup.globals().ui_font,
        "extensionLanguage": popup.globals().extension_language,
        "cspWarning": popup.csp_warning(),
    })
}

fn sites_json(manager: &SettingsManager) -> Value {
    let sites: Vec<Value> = manager.sites().iter().map(|s| s.to_value()).collect();
    json!({
        "sites": sites,
        "theme": manager.globals().theme.as_str(),
        "status": manager.status(),
    })
}

fn responses_json(responses: &[Response]) -> Value {
    json!(responses)
}

fn parse_context(name: &str) -> Result<ContextKind, String> {
    match name {
        "dispatcher" => Ok(ContextKind::Dispatcher),
        "popup" => Ok(ContextKind::Popup),
        "manager" | "settings_manager" => Ok(ContextKind::SettingsManager),
        other => Err(format!("unknown context: {}", other)),
    }
}

fn parse_area(name: Option<&str>) -> Result<StorageArea, String> {
    match name.unwrap_or("local") {
        "local" => Ok(StorageArea::Local),
        "session" => Ok(StorageArea::Session),
        other => Err(format!("unknown area: {}", other)),
    }
}

fn parse_keys(value: Option<&Value>) -> KeySelector {
    match value {
        Some(Value::String(key)) => KeySelector::One(key.clone()),
        Some(Value::Array(keys)) => KeySelector::Many(
            keys.iter()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect(),
        ),
        _ => KeySelector::All,
    }
}

/// Resolves a node reference: `"html"`, `"head"`, `"body"` or a numeric id.
fn resolve_node(doc: &Document, value: Option<&Value>) -> Result<NodeId, String> {
    let node = match value {
        Some(Value::String(name)) if name == "html" => doc.document_element(),
        Some(Value::String(name)) if name == "head" => doc.head(),
        Some(Value::String(name)) if name == "body" || name.is_empty() => doc.body(),
        Some(Value::Number(n)) => n.as_u64().ok_or("invalid node id")? as NodeId,
        None => doc.body(),
        Some(other) => return Err(format!("invalid node: {}", other)),
    };
    if doc.contains(node) {
        Ok(node)
    } else {
        Err(format!("unknown node: {}", node))
    }
}

/// Applies one page-script mutation to a document.
fn mutate_document(doc: &mut Document, params: &Value) -> Result<Value, String> {
    let op = str_param(params, "op")?;
    let target = resolve_node(doc, params.get("node"))?;
    match op {
        "append" => {
            let tag = str_param(params, "tag")?;
            let node = doc.append_element(target, tag);
            Ok(json!({"node": node}))
        }
        "remove" => Ok(json!({"removed": doc.remove(target)})),
        "set_attribute" => {
            let name = str_param(params, "name")?;
            let value = str_param(params, "value")?;
            doc.set_attribute(target, name, value);
            Ok(json!({"node": target}))
        }
        "remove_attribute" => {
            let name = str_param(params, "name")?;
            doc.remove_attribute(target, name);
            Ok(json!({"node": target}))
        }
        "set_text" => {
            let text = str_param(params, "text")?;
            doc.set_text(target, text);
            Ok(json!({"node": target}))
        }
        "attach_shadow" => {
            let root = doc.attach_shadow(target);
            Ok(json!({"node": root}))
        }
        other => Err(format!("unknown op: {}", other)),
    }
}

/// Dispatch a JSON-RPC method call to the appropriate handler.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub fn handle_method(app: &Mutex<App>, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true, "version": env!("CARGO_PKG_VERSION")})),

        // ─── Tabs ───
        "tab.open" => {
            let url = str_param(params, "url")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let id = a.open_tab(url).map_err(|e| e.to_string())?;
            let info = a
                .tab_manager
                .get_tab(&id)
                .map(|t| json!(t.info))
                .unwrap_or(Value::Null);
            Ok(info)
        }
        "tab.navigate" => {
            let id = str_param(params, "id")?;
            let url = str_param(params, "url")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.navigate(id, url).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "tab.close" => {
            let id = str_param(params, "id")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.close_tab(id).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "tab.list" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            Ok(json!(a.tab_manager.list_tabs()))
        }
        "tab.dom" => {
            let id = str_param(params, "id")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let doc = a.document(id).ok_or_else(|| format!("tab not found: {}", id))?;
            let injector = a.injector(id);
            let state = match injector.map(|i| i.state()) {
                None => "none",
                Some(InjectorState::Uninitialized) => "uninitialized",
                Some(InjectorState::LoadingSettings) => "loading",
                Some(InjectorState::Idle) => "idle",
                Some(InjectorState::Styled(_)) => "styled",
            };
            Ok(json!({
                "html": doc.to_html(),
                "state": state,
                "applyCount": injector.map(|i| i.apply_count()).unwrap_or(0),
                "reapplyCount": injector.map(|i| i.reapply_count()).unwrap_or(0),
            }))
        }
        "tab.font_loaded" => {
            let id = str_param(params, "id")?;
            let loaded = params.get("loaded").and_then(|v| v.as_bool()).unwrap_or(true);
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let delivered = a.complete_font_load(id, loaded).map_err(|e| e.to_string())?;
            Ok(json!({"delivered": delivered}))
        }
        "page.mutate" => {
            let id = str_param(params, "id")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let doc = a
                .document_mut(id)
                .ok_or_else(|| format!("tab not found: {}", id))?;
            mutate_document(doc, params)
        }

        // ─── Popup ───
        "popup.open" => {
            let tab = str_param(params, "tab")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let popup = a.open_popup(tab).map_err(|e| e.to_string())?;
            Ok(popup_json(popup))
        }
        "popup.state" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let popup = a.popup.as_ref().ok_or("popup is not open")?;
            Ok(popup_json(popup))
        }
        "popup.edit" => {
            let control = Control::parse(str_param(params, "control")?).map_err(|e| e.to_string())?;
            let value = str_param(params, "value")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let tuple = a.popup_edit(control, value).map_err(|e| e.to_string())?;
            Ok(json!(tuple))
        }
        "popup.reset" => {
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.popup_reset().map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "popup.theme" => {
            let theme = ThemeMode::parse(str_param(params, "theme")?);
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let responses = a.popup_set_theme(theme).map_err(|e| e.to_string())?;
            Ok(responses_json(&responses))
        }
        "popup.ui_font" => {
            let font = str_param(params, "font")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.popup_set_ui_font(font).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "popup.language" => {
            let language = str_param(params, "language")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.popup_set_language(language).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "popup.close" => {
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.close_popup();
            Ok(json!({"ok": true}))
        }

        // ─── Settings manager ───
        "manager.open" => {
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let manager = a.open_settings_manager().map_err(|e| e.to_string())?;
            Ok(sites_json(manager))
        }
        "manager.sites" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let manager = a.settings_manager.as_ref().ok_or("settings manager is not open")?;
            Ok(sites_json(manager))
        }
        "manager.edit" => {
            let host = str_param(params, "host")?;
            let control = Control::parse(str_param(params, "control")?).map_err(|e| e.to_string())?;
            let value = str_param(params, "value")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let tuple = a.manager_edit(host, control, value).map_err(|e| e.to_string())?;
            Ok(json!(tuple))
        }
        "manager.remove" => {
            let host = str_param(params, "host")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.manager_remove(host).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "manager.export" => {
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let file = a.manager_export().map_err(|e| e.to_string())?;
            Ok(json!({
                "fileName": file.file_name,
                "downloadUrl": file.download_url,
                "json": file.json,
            }))
        }
        "manager.import" => {
            let text = str_param(params, "json")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let (count, responses) = a.manager_import(text).map_err(|e| e.to_string())?;
            Ok(json!({"count": count, "responses": responses_json(&responses)}))
        }
        "manager.reset_all" => {
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.manager_reset_all().map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "manager.close" => {
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.close_settings_manager();
            Ok(json!({"ok": true}))
        }

        // ─── Store and bus ───
        "store.get" => {
            let area = parse_area(params.get("area").and_then(|v| v.as_str()))?;
            let keys = parse_keys(params.get("keys"));
            let a = app.lock().map_err(|e| e.to_string())?;
            let map = a.store.get(area, keys).map_err(|e| e.to_string())?;
            Ok(Value::Object(map))
        }
        "message.send" => {
            let from = parse_context(params.get("from").and_then(|v| v.as_str()).unwrap_or("popup"))?;
            let message = params.get("message").ok_or("missing message")?;
            let message = Message::from_value(message).map_err(|e| e.to_string())?;
            if message.is_page_command() {
                return Err(format!("{} must be sent to a tab", message.name()));
            }
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let responses = a.send_message(from, message);
            Ok(responses_json(&responses))
        }

        // ─── Host config ───
        "config.get" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let config = serde_json::to_value(a.config()).map_err(|e| e.to_string())?;
            Ok(json!({"path": a.config_engine.get_config_path(), "config": config}))
        }
        "config.set" => {
            let key = str_param(params, "key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.set_config_value(key, value).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true, "restartRequired": true}))
        }
        "config.reset" => {
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.reset_config().map_err(|e| e.to_string())?;
            Ok(json!({"ok": true, "restartRequired": true}))
        }

        // ─── Localization ───
        "i18n.t" => {
            let key = str_param(params, "key")?;
            let values: Option<HashMap<String, String>> =
                params.get("params").and_then(|v| v.as_object()).map(|map| {
                    map.iter()
                        .map(|(k, v)| {
                            let text = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                            (k.clone(), text)
                        })
                        .collect()
                });
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let text = a.translate(key, values.as_ref()).map_err(|e| e.to_string())?;
            Ok(json!({"text": text}))
        }
        "i18n.locales" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            Ok(json!(a.available_locales()))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
