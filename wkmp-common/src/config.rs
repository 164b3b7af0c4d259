//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "wkmp.db";

/// Default wkmp-sc listen port
pub const DEFAULT_SC_PORT: u16 = 5726;

/// Contents of the optional TOML config file
///
/// Every field is optional; a missing file yields `TomlConfig::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub subsonic: SubsonicConfig,
}

/// `[subsonic]` table: settings for the Subsonic compatibility module
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubsonicConfig {
    pub bind: String,
    pub port: u16,
    /// Folder song paths are relative to; defaults to the root folder
    pub music_folder: Option<PathBuf>,
    /// Lifetime of issued bearer tokens
    pub token_ttl_seconds: i64,
}

impl Default for SubsonicConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_SC_PORT,
            music_folder: None,
            token_ttl_seconds: 86_400,
        }
    }
}

/// Root folder resolution following ARCH-INIT-005 priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    get_default_root_folder()
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

/// Load the TOML config file
///
/// An explicit path must exist and parse. Without one, the platform config
/// locations are searched; a missing or malformed file there is logged and
/// defaults are used.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return parse_toml_file(path);
    }

    let Some(path) = find_config_file() else {
        return Ok(TomlConfig::default());
    };

    match parse_toml_file(&path) {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!("Ignoring config file {}: {}", path.display(), e);
            Ok(TomlConfig::default())
        }
    }
}

/// Parse a TOML config file
pub fn parse_toml_file(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
}

/// First existing config file among the platform locations
///
/// Linux checks `~/.config/wkmp/config.toml` then `/etc/wkmp/config.toml`;
/// macOS and Windows check only the user config directory.
fn find_config_file() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = dirs::config_dir()
        .map(|d| d.join("wkmp").join("config.toml"))
        .into_iter()
        .collect();
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc/wkmp/config.toml"));
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/wkmp (or /var/lib/wkmp for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("wkmp"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/wkmp"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/wkmp
        dirs::data_dir()
            .map(|d| d.join("wkmp"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/wkmp"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\wkmp
        dirs::data_local_dir()
            .map(|d| d.join("wkmp"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\wkmp"))
    } else {
        PathBuf::from("./wkmp_data")
    }
}
