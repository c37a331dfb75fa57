use std::collections::HashMap;

use serde_json::Value;

use crate::types::errors::LocaleError;

/// Supported locales and their built-in string tables.
const BUILTIN_TABLES: &[(&str, &str)] = &[
    ("en", include_str!("../../locales/en.json")),
    ("fa", include_str!("../../locales/fa.json")),
];

/// Locale used when the configured language has no table.
const DEFAULT_LOCALE: &str = "en";

/// Trait defining the localization engine interface.
pub trait LocalizationEngineTrait {
    fn set_locale(&mut self, lang: &str) -> Result<(), LocaleError>;
    fn get_locale(&self) -> &str;
    fn t(&self, key: &str, params: Option<&HashMap<String, String>>) -> String;
    fn try_t(&self, key: &str, params: Option<&HashMap<String, String>>) -> Result<String, LocaleError>;
    fn get_available_locales(&self) -> Vec<String>;
}

/// Status-string lookup for the editors, keyed by `extensionLanguage`.
pub struct LocalizationEngine {
    current_locale: String,
    locales: HashMap<String, Value>,
}

impl LocalizationEngine {
    /// Parses the built-in tables.
    pub fn new() -> Result<Self, LocaleError> {
        let mut locales = HashMap::new();
        for (locale, text) in BUILTIN_TABLES {
            let data: Value = serde_json::from_str(text)
                .map_err(|e| LocaleError::InvalidTable(format!("{}: {}", locale, e)))?;
            locales.insert(locale.to_string(), data);
        }
        Ok(Self {
            current_locale: DEFAULT_LOCALE.to_string(),
            locales,
        })
    }

    /// Selects `lang`, falling back to English for unsupported languages.
    pub fn set_locale_or_default(&mut self, lang: &str) {
        if self.set_locale(lang).is_err() {
            tracing::debug!(lang, "no string table, using {}", DEFAULT_LOCALE);
            self.current_locale = DEFAULT_LOCALE.to_string();
        }
    }

    /// Looks up a nested key in a JSON value using dot notation.
    /// For example, "status.import_ok" looks up `value["status"]["import_ok"]`.
    fn lookup_key<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
        let mut current = data;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn lookup_in(&self, locale: &str, key: &str) -> Option<String> {
        self.locales
            .get(locale)
            .and_then(|data| Self::lookup_key(data, key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// Replaces `{param_name}` placeholders in a string with values from the params map.
    pub fn interpolate(template: &str, params: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in params {
            let placeholder = format!("{{{}}}", key);
            result = result.replace(&placeholder, value);
        }
        result
    }
}

impl LocalizationEngineTrait for LocalizationEngine {
    fn set_locale(&mut self, lang: &str) -> Result<(), LocaleError> {
        let lang = lang.trim().to_ascii_lowercase();
        if !self.locales.contains_key(&lang) {
            return Err(LocaleError::UnsupportedLocale(lang));
        }
        self.current_locale = lang;
        Ok(())
    }

    fn get_locale(&self) -> &str {
        &self.current_locale
    }

    /// Like [`try_t`](Self::try_t) but returns the key itself when nothing is found.
    fn t(&self, key: &str, params: Option<&HashMap<String, String>>) -> String {
        self.try_t(key, params).unwrap_or_else(|_| key.to_string())
    }

    /// Looks up `key` in the current locale, then in English.
    fn try_t(&self, key: &str, params: Option<&HashMap<String, String>>) -> Result<String, LocaleError> {
        let text = self
            .lookup_in(&self.current_locale, key)
            .or_else(|| self.lookup_in(DEFAULT_LOCALE, key))
            .ok_or_else(|| LocaleError::MissingKey(key.to_string()))?;
        Ok(match params {
            Some(p) => Self::interpolate(&text, p),
            None => text,
        })
    }

    fn get_available_locales(&self) -> Vec<String> {
        let mut locales: Vec<String> = self.locales.keys().cloned().collect();
        locales.sort();
        locales
    }
}

/// Builds a one-entry params map.
pub fn param(name: &str, value: impl ToString) -> HashMap<String, String> {
    let mut params = HashMap::new();
    params.insert(name.to_string(), value.to_string());
    params
}
