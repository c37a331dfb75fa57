use serde::{Deserialize, Serialize};

/// Snapshot of a browser tab as seen by the extension contexts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabInfo {
    pub id: String,
    pub url: String,
    /// Hostname used as the settings key; empty for pages without one.
    pub host: String,
    /// Whether a style injector is attached (false on restricted pages).
    pub scriptable: bool,
    pub created_at: i64,
}
