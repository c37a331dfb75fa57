// Typeset Config Engine
// Loads, saves and edits the host configuration stored as JSON at the
// platform-specific config path.

use std::fs;
use std::path::Path;

use crate::platform;
use crate::types::config::HostConfig;
use crate::types::errors::ConfigError;

/// Trait defining the config engine interface.
pub trait ConfigEngineTrait {
    fn load(&mut self) -> Result<HostConfig, ConfigError>;
    fn save(&self) -> Result<(), ConfigError>;
    fn get_config(&self) -> &HostConfig;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), ConfigError>;
    fn reset(&mut self) -> Result<(), ConfigError>;
    fn get_config_path(&self) -> &str;
}

pub struct ConfigEngine {
    config_path: String,
    config: HostConfig,
}

impl ConfigEngine {
    /// Uses `path_override` when given, otherwise `config.json` in the
    /// platform config directory.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = path_override.unwrap_or_else(|| {
            platform::get_config_dir()
                .join("config.json")
                .to_string_lossy()
                .to_string()
        });
        Self {
            config_path,
            config: HostConfig::default(),
        }
    }
}

impl ConfigEngineTrait for ConfigEngine {
    /// Missing file means defaults; a malformed file is an error.
    fn load(&mut self) -> Result<HostConfig, ConfigError> {
        let path = Path::new(&self.config_path);
        if !path.exists() {
            self.config = HostConfig::default();
            return Ok(self.config.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("Failed to read config file: {}", e)))?;
        self.config = serde_json::from_str(&content).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;
        Ok(self.config.clone())
    }

    fn save(&self) -> Result<(), ConfigError> {
        let path = Path::new(&self.config_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.config).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to serialize config: {}", e))
        })?;
        fs::write(path, json)
            .map_err(|e| ConfigError::IoError(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    fn get_config(&self) -> &HostConfig {
        &self.config
    }

    /// Updates one value by dot path (`page.mutation_debounce_ms`), validates
    /// the result by deserializing it, then saves.
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), ConfigError> {
        if key.is_empty() {
            return Err(ConfigError::InvalidKey("Key cannot be empty".to_string()));
        }
        let parts: Vec<&str> = key.split('.').collect();

        let mut json_value = serde_json::to_value(&self.config).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to serialize config: {}", e))
        })?;

        {
            let (last, path) = parts
                .split_last()
                .ok_or_else(|| ConfigError::InvalidKey(key.to_string()))?;
            let mut current = &mut json_value;
            for part in path {
                current = current
                    .get_mut(*part)
                    .ok_or_else(|| ConfigError::InvalidKey(format!("Key '{}' not found", key)))?;
            }
            match current {
                serde_json::Value::Object(map) if map.contains_key(*last) => {
                    map.insert(last.to_string(), value);
                }
                _ => return Err(ConfigError::InvalidKey(format!("Key '{}' not found", key))),
            }
        }

        self.config = serde_json::from_value(json_value).map_err(|e| {
            ConfigError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;
        self.save()
    }

    fn reset(&mut self) -> Result<(), ConfigError> {
        self.config = HostConfig::default();
        self.save()
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}
