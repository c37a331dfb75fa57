use serde::{Deserialize, Serialize};

/// Host process configuration, persisted as `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct HostConfig {
    pub storage: StorageConfig,
    pub page: PageConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file; `None` means `typeset.db` in the platform data dir.
    pub database_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PageConfig {
    /// Quiet period before styles are re-applied after page mutations.
    pub mutation_debounce_ms: u64,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            mutation_debounce_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Period of the event pump in the RPC host.
    pub tick_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub debug: bool,
}
