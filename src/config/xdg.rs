//! Platform-aware path resolution for hotspot-monitor.
//!
//! Config: `$XDG_CONFIG_HOME/hotspot-monitor` when set, otherwise
//! `~/.config/hotspot-monitor` on Linux and the platform config directory
//! (`~/Library/Application Support`, `%APPDATA%`) on macOS and Windows.

use std::fs;
use std::path::{Path, PathBuf};

/// Directory name under the config base.
pub const APP_NAME: &str = "hotspot-monitor";

/// Returns the configuration directory for hotspot-monitor.
///
/// Resolution order:
/// 1. `$XDG_CONFIG_HOME/hotspot-monitor` (if env var set, any platform)
/// 2. Platform default
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join(APP_NAME);
        }
    }
    platform_config_dir().join(APP_NAME)
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Platform-native config base directory (without XDG override).
fn platform_config_dir() -> PathBuf {
    #[cfg(any(target_os = "macos", windows))]
    {
        dirs::config_dir().unwrap_or_else(home_dir)
    }
    #[cfg(not(any(target_os = "macos", windows)))]
    {
        home_dir().join(".config")
    }
}

/// Returns the path to the main configuration file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Expands a leading `~` in a path string to the user's home directory.
///
/// If the path does not start with `~`, it is returned as-is.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        home_dir().join(rest)
    } else if path == "~" {
        home_dir()
    } else {
        PathBuf::from(path)
    }
}

/// Creates a directory and all parent directories with mode 0700.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Creates the configuration directory if it does not exist, returning its path.
pub fn ensure_config_dir() -> std::io::Result<PathBuf> {
    let dir = config_dir();
    ensure_dir(&dir)?;
    Ok(dir)
}
