use std::fmt;

/// Substring carried by messaging failures when the target context has no listener.
pub const NO_RECEIVER_MESSAGE: &str = "Receiving end does not exist";

/// Substring carried by messaging failures when the sending context was torn down.
pub const CONTEXT_INVALIDATED_MESSAGE: &str = "Extension context invalidated";

// === StorageError ===

/// Errors related to settings store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// A value exceeded the per-item quota.
    QuotaExceeded(String),
    /// The store's backing context is gone.
    Disconnected(String),
    /// Database operation failed.
    DatabaseError(String),
    /// Failed to serialize or deserialize a stored value.
    SerializationError(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::QuotaExceeded(key) => write!(f, "Storage quota exceeded: {}", key),
            StorageError::Disconnected(msg) => write!(f, "Storage disconnected: {}", msg),
            StorageError::DatabaseError(msg) => write!(f, "Storage database error: {}", msg),
            StorageError::SerializationError(msg) => {
                write!(f, "Storage serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::DatabaseError(e.to_string())
    }
}

// === MessagingError ===

/// Errors related to message delivery between contexts.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagingError {
    /// No context is listening at the target (page without an injector, closed editor).
    NoReceiver(String),
    /// The sending or receiving context has been torn down.
    ContextInvalidated(String),
    /// The message payload could not be decoded.
    InvalidMessage(String),
    /// Any other delivery failure.
    Other(String),
}

impl MessagingError {
    /// Returns true for failures that happen routinely when a target page
    /// cannot run scripts or has not loaded yet.
    pub fn is_routine(&self) -> bool {
        let text = self.to_string();
        text.contains(NO_RECEIVER_MESSAGE) || text.contains(CONTEXT_INVALIDATED_MESSAGE)
    }
}

impl fmt::Display for MessagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessagingError::NoReceiver(target) => {
                write!(f, "Could not establish connection. {}: {}", NO_RECEIVER_MESSAGE, target)
            }
            MessagingError::ContextInvalidated(msg) => {
                write!(f, "{}: {}", CONTEXT_INVALIDATED_MESSAGE, msg)
            }
            MessagingError::InvalidMessage(msg) => write!(f, "Invalid message: {}", msg),
            MessagingError::Other(msg) => write!(f, "Messaging error: {}", msg),
        }
    }
}

impl std::error::Error for MessagingError {}

// === ImportError ===

/// Errors related to importing a settings backup.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportError {
    /// The document is not valid JSON.
    ParseError(String),
    /// The document parsed but its top level is not an object.
    NotAnObject,
    /// Writing the imported keys failed.
    StorageError(String),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::ParseError(msg) => write!(f, "Import parse error: {}", msg),
            ImportError::NotAnObject => write!(f, "Import document must be a JSON object"),
            ImportError::StorageError(msg) => write!(f, "Import storage error: {}", msg),
        }
    }
}

impl std::error::Error for ImportError {}

impl From<StorageError> for ImportError {
    fn from(e: StorageError) -> Self {
        ImportError::StorageError(e.to_string())
    }
}

// === EditorError ===

/// Errors related to popup and settings manager operations.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorError {
    /// The active page has no hostname to key settings by.
    NoHost(String),
    /// The named control does not exist.
    UnknownControl(String),
    /// The store rejected the operation.
    StorageError(String),
    /// Status strings could not be loaded.
    LocaleError(String),
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorError::NoHost(url) => write!(f, "Page has no editable host: {}", url),
            EditorError::UnknownControl(name) => write!(f, "Unknown control: {}", name),
            EditorError::StorageError(msg) => write!(f, "Editor storage error: {}", msg),
            EditorError::LocaleError(msg) => write!(f, "Editor locale error: {}", msg),
        }
    }
}

impl std::error::Error for EditorError {}

impl From<StorageError> for EditorError {
    fn from(e: StorageError) -> Self {
        EditorError::StorageError(e.to_string())
    }
}

impl From<LocaleError> for EditorError {
    fn from(e: LocaleError) -> Self {
        EditorError::LocaleError(e.to_string())
    }
}

// === TabError ===

/// Errors related to tab registry operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TabError {
    /// Tab with the given ID was not found.
    NotFound(String),
    /// The URL could not be parsed.
    InvalidUrl(String),
}

impl fmt::Display for TabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabError::NotFound(id) => write!(f, "Tab not found: {}", id),
            TabError::InvalidUrl(url) => write!(f, "Invalid tab URL: {}", url),
        }
    }
}

impl std::error::Error for TabError {}

// === ConfigError ===

/// Errors related to host configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// An I/O error occurred while reading or writing the config file.
    IoError(String),
    /// Failed to serialize or deserialize the config.
    SerializationError(String),
    /// The provided config key is invalid.
    InvalidKey(String),
    /// The provided config value is invalid.
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "Config I/O error: {}", msg),
            ConfigError::SerializationError(msg) => {
                write!(f, "Config serialization error: {}", msg)
            }
            ConfigError::InvalidKey(key) => write!(f, "Invalid config key: {}", key),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// === LocaleError ===

/// Errors related to status-string lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LocaleError {
    /// The requested locale is not supported.
    UnsupportedLocale(String),
    /// A string key is missing from the table.
    MissingKey(String),
    /// A built-in string table failed to parse.
    InvalidTable(String),
}

impl fmt::Display for LocaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocaleError::UnsupportedLocale(locale) => {
                write!(f, "Unsupported locale: {}", locale)
            }
            LocaleError::MissingKey(key) => write!(f, "Missing locale key: {}", key),
            LocaleError::InvalidTable(msg) => write!(f, "Invalid locale table: {}", msg),
        }
    }
}

impl std::error::Error for LocaleError {}

// === AppError ===

/// Errors surfaced by host-level operations that span several contexts.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// The named editor page is not open.
    NotOpen(String),
    Tab(TabError),
    Editor(EditorError),
    Import(ImportError),
    Storage(StorageError),
    Config(ConfigError),
    Locale(LocaleError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotOpen(page) => write!(f, "{} is not open", page),
            AppError::Tab(e) => write!(f, "{}", e),
            AppError::Editor(e) => write!(f, "{}", e),
            AppError::Import(e) => write!(f, "{}", e),
            AppError::Storage(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Locale(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AppError {}

impl From<TabError> for AppError {
    fn from(e: TabError) -> Self {
        AppError::Tab(e)
    }
}

impl From<EditorError> for AppError {
    fn from(e: EditorError) -> Self {
        AppError::Editor(e)
    }
}

impl From<ImportError> for AppError {
    fn from(e: ImportError) -> Self {
        AppError::Import(e)
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        AppError::Storage(e)
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

impl From<LocaleError> for AppError {
    fn from(e: LocaleError) -> Self {
        AppError::Locale(e)
    }
}
