use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::errors::MessagingError;
use super::settings::{StyleTuple, ThemeMode};

/// Every message that crosses a context boundary.
///
/// Notifications between extension pages carry a `type` field on the wire;
/// commands for a page's style injector carry an `action` field.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    UserChangedThemePreference { theme: ThemeMode },
    ThemeChanged { theme: ThemeMode },
    SiteDataDidChange,
    SiteDataDidChangeForwarded,
    SettingsImportedSuccessfully,
    ReloadPopupSettings,
    ApplyStyles(StyleTuple),
    ResetStyles,
}

impl Message {
    /// The wire name of this message.
    pub fn name(&self) -> &'static str {
        match self {
            Message::UserChangedThemePreference { .. } => "USER_CHANGED_THEME_PREFERENCE",
            Message::ThemeChanged { .. } => "THEME_CHANGED",
            Message::SiteDataDidChange => "SITE_DATA_DID_CHANGE",
            Message::SiteDataDidChangeForwarded => "SITE_DATA_DID_CHANGE_FORWARDED",
            Message::SettingsImportedSuccessfully => "SETTINGS_IMPORTED_SUCCESSFULLY",
            Message::ReloadPopupSettings => "RELOAD_POPUP_SETTINGS",
            Message::ApplyStyles(_) => "applyStyles",
            Message::ResetStyles => "resetStyles",
        }
    }

    /// Page commands go to a tab; everything else is broadcast between extension pages.
    pub fn is_page_command(&self) -> bool {
        matches!(self, Message::ApplyStyles(_) | Message::ResetStyles)
    }

    pub fn to_value(&self) -> Value {
        match self {
            Message::UserChangedThemePreference { theme } | Message::ThemeChanged { theme } => {
                json!({"type": self.name(), "theme": theme.as_str()})
            }
            Message::ApplyStyles(tuple) => {
                let mut map = match serde_json::to_value(tuple) {
                    Ok(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                map.insert("action".to_string(), Value::String(self.name().to_string()));
                Value::Object(map)
            }
            Message::ResetStyles => json!({"action": self.name()}),
            _ => json!({"type": self.name()}),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, MessagingError> {
        if let Some(action) = value.get("action").and_then(|v| v.as_str()) {
            return match action {
                "applyStyles" => Ok(Message::ApplyStyles(StyleTuple::from_value(value))),
                "resetStyles" => Ok(Message::ResetStyles),
                other => Err(MessagingError::InvalidMessage(format!("unknown action: {}", other))),
            };
        }

        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| MessagingError::InvalidMessage("missing type or action".to_string()))?;
        let theme = || {
            value
                .get("theme")
                .and_then(|v| v.as_str())
                .map(ThemeMode::parse)
                .unwrap_or_default()
        };

        match kind {
            "USER_CHANGED_THEME_PREFERENCE" => {
                Ok(Message::UserChangedThemePreference { theme: theme() })
            }
            "THEME_CHANGED" => Ok(Message::ThemeChanged { theme: theme() }),
            "SITE_DATA_DID_CHANGE" => Ok(Message::SiteDataDidChange),
            "SITE_DATA_DID_CHANGE_FORWARDED" => Ok(Message::SiteDataDidChangeForwarded),
            "SETTINGS_IMPORTED_SUCCESSFULLY" => Ok(Message::SettingsImportedSuccessfully),
            "RELOAD_POPUP_SETTINGS" => Ok(Message::ReloadPopupSettings),
            other => Err(MessagingError::InvalidMessage(format!("unknown type: {}", other))),
        }
    }
}

/// Acknowledgement returned by a handler that replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: String,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// The extension contexts that exchange runtime messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Dispatcher,
    Popup,
    SettingsManager,
}

/// Fire-and-forget runtime messages queued by a context during one handler run.
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<Message>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn drain(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }
}
