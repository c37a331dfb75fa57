// Typeset platform paths
// Where the host keeps its config file and its settings database.
//
// Linux:   $XDG_CONFIG_HOME/typeset, $XDG_DATA_HOME/typeset
// macOS:   ~/Library/Application Support/Typeset (both)
// Windows: %APPDATA%/Typeset (both)

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

/// Overrides the data directory when set.
pub const DATA_DIR_ENV: &str = "TYPESET_DATA_DIR";

fn home_dir() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
}

#[cfg(target_os = "linux")]
fn xdg_dir(var: &str, fallback: &[&str]) -> PathBuf {
    match env::var(var) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir).join("typeset"),
        _ => fallback
            .iter()
            .fold(home_dir(), |path, part| path.join(part))
            .join("typeset"),
    }
}

#[cfg(target_os = "windows")]
fn app_data_dir() -> PathBuf {
    let appdata = env::var("APPDATA")
        .unwrap_or_else(|_| String::from("C:\\Users\\Default\\AppData\\Roaming"));
    PathBuf::from(appdata).join("Typeset")
}

/// Directory holding `config.json`.
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        xdg_dir("XDG_CONFIG_HOME", &[".config"])
    }
    #[cfg(target_os = "macos")]
    {
        home_dir()
            .join("Library")
            .join("Application Support")
            .join("Typeset")
    }
    #[cfg(target_os = "windows")]
    {
        app_data_dir()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        home_dir().join(".typeset")
    }
}

/// Directory holding the settings database, honouring `TYPESET_DATA_DIR`.
pub fn get_data_dir() -> PathBuf {
    data_dir_from(env::var_os(DATA_DIR_ENV))
}

fn data_dir_from(override_dir: Option<OsString>) -> PathBuf {
    if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    #[cfg(target_os = "linux")]
    {
        xdg_dir("XDG_DATA_HOME", &[".local", "share"])
    }
    #[cfg(target_os = "macos")]
    {
        home_dir()
            .join("Library")
            .join("Application Support")
            .join("Typeset")
    }
    #[cfg(target_os = "windows")]
    {
        app_data_dir()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        home_dir().join(".typeset")
    }
}

/// Default location of the settings database.
pub fn default_database_path() -> PathBuf {
    get_data_dir().join("typeset.db")
}
