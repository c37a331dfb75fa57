use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Store key holding the editor colour scheme.
pub const THEME_KEY: &str = "theme";
/// Store key holding the font used by the editor UIs themselves.
pub const UI_FONT_KEY: &str = "uiFont";
/// Store key holding the editor UI language.
pub const LANGUAGE_KEY: &str = "extensionLanguage";
/// Reserved name of the backup artifact. Never written during normal operation.
pub const BACKUP_KEY: &str = "allSettingsBackup";

/// The three global keys, in export order.
pub const GLOBAL_KEYS: [&str; 3] = [THEME_KEY, UI_FONT_KEY, LANGUAGE_KEY];

pub const DEFAULT_UI_FONT: &str = "Vazirmatn";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Returns true when `key` names a site record rather than a global key.
pub fn is_site_key(key: &str) -> bool {
    !GLOBAL_KEYS.contains(&key) && key != BACKUP_KEY && key.contains('.')
}

/// Forced text direction for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Direction {
    #[default]
    Default,
    Rtl,
    Ltr,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Default => "",
            Direction::Rtl => "rtl",
            Direction::Ltr => "ltr",
        }
    }

    /// Parses a stored direction; anything unrecognised means "page default".
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "rtl" => Direction::Rtl,
            "ltr" => Direction::Ltr,
            _ => Direction::Default,
        }
    }

    /// The `text-align` value forced alongside this direction.
    pub fn text_align(&self) -> Option<&'static str> {
        match self {
            Direction::Default => None,
            Direction::Rtl => Some("right"),
            Direction::Ltr => Some("left"),
        }
    }
}

impl Serialize for Direction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().map(Direction::parse).unwrap_or_default())
    }
}

/// Lenient field codecs: stored records are never validated on import, so
/// reading must tolerate whatever shape ended up in the store.
mod lenient {
    use super::*;

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        })
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        })
    }

    /// Empty numbers are written as `""`; integral values without a fraction.
    pub fn serialize_number<S: Serializer>(
        value: &Option<f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            None => serializer.serialize_str(""),
            Some(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
                serializer.serialize_i64(*v as i64)
            }
            Some(v) => serializer.serialize_f64(*v),
        }
    }
}

/// The seven overrides applied to one page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleTuple {
    #[serde(default, deserialize_with = "lenient::string")]
    pub font: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(
        default,
        deserialize_with = "lenient::number",
        serialize_with = "lenient::serialize_number"
    )]
    pub font_size: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::number",
        serialize_with = "lenient::serialize_number"
    )]
    pub line_height: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub font_weight: String,
    #[serde(
        default,
        deserialize_with = "lenient::number",
        serialize_with = "lenient::serialize_number"
    )]
    pub letter_spacing: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::number",
        serialize_with = "lenient::serialize_number"
    )]
    pub word_spacing: Option<f64>,
}

impl StyleTuple {
    /// An all-empty tuple means "no override".
    pub fn is_empty(&self) -> bool {
        self.font.trim().is_empty()
            && self.direction == Direction::Default
            && self.font_size.is_none()
            && self.line_height.is_none()
            && self.font_weight.trim().is_empty()
            && self.letter_spacing.is_none()
            && self.word_spacing.is_none()
    }

    /// Reads a tuple out of an arbitrary JSON value, defaulting on any shape mismatch.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

/// Persisted override settings for one hostname.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(default, deserialize_with = "lenient::string")]
    pub host: String,
    #[serde(flatten)]
    pub style: StyleTuple,
}

impl SiteSettings {
    pub fn new(host: &str, style: StyleTuple) -> Self {
        Self {
            host: host.to_string(),
            style,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.style.is_empty()
    }

    /// Reads a record out of a stored value. Non-object values read as empty.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Editor colour scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeMode {
    #[default]
    System,
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeMode::System => "system",
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => ThemeMode::Light,
            "dark" => ThemeMode::Dark,
            _ => ThemeMode::System,
        }
    }
}

impl Serialize for ThemeMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ThemeMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().map(ThemeMode::parse).unwrap_or_default())
    }
}

/// Singleton settings that are not keyed by hostname.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSettings {
    pub theme: ThemeMode,
    pub ui_font: String,
    pub extension_language: String,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            theme: ThemeMode::System,
            ui_font: DEFAULT_UI_FONT.to_string(),
            extension_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl GlobalSettings {
    /// Builds globals from a store snapshot, filling gaps with defaults.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| {
            map.get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };
        Self {
            theme: map
                .get(THEME_KEY)
                .and_then(|v| v.as_str())
                .map(ThemeMode::parse)
                .unwrap_or(defaults.theme),
            ui_font: non_empty(UI_FONT_KEY).unwrap_or(defaults.ui_font),
            extension_language: non_empty(LANGUAGE_KEY).unwrap_or(defaults.extension_language),
        }
    }

    /// The three global keys as store entries.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(THEME_KEY.to_string(), Value::String(self.theme.as_str().to_string()));
        map.insert(UI_FONT_KEY.to_string(), Value::String(self.ui_font.clone()));
        map.insert(
            LANGUAGE_KEY.to_string(),
            Value::String(self.extension_language.clone()),
        );
        map
    }
}

/// Ephemeral per-host marker kept in the session area.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFlag {
    #[serde(default)]
    pub csp_blocked: bool,
}
