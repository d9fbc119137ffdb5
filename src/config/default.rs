//! Default configuration template and file creation utilities.
//!
//! Provides a well-commented TOML template that matches `Config::default()`
//! and a function to write it to the XDG config path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::error::ConfigError;
use crate::config::xdg;

// ---------------------------------------------------------------------------
// Default TOML template
// ---------------------------------------------------------------------------

/// A well-commented TOML template with all default values.
///
/// Every value here must match `Config::default()` from `schema.rs`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Hotspot Monitor Configuration
#
# This file was auto-generated with default values.
# All values shown below are the built-in defaults.
#
# Location: $XDG_CONFIG_HOME/hotspot-monitor/config.toml

# ==============================================================================
# Monitor
# ==============================================================================

[monitor]

# Sleep between two reconciliation iterations.
# Format: humantime duration ("5s", "1m", "500ms")
poll_interval = "5s"

# Hard bound on a single command. A command that runs longer is killed
# and reported as failed for that iteration.
command_timeout = "30s"

# The status query must print this on its first line (case-insensitive)
# for the hotspot to count as healthy. Anything else triggers a restart.
expected_status = "Up"

# Shell dialect of the interpreters below and of the built-in commands.
# Options: "powershell", "posix"
#   powershell - Windows mobile hotspot through the tethering manager
#   posix      - NetworkManager connection named "Hotspot"
dialect = "powershell"

# ==============================================================================
# Resident interpreter (reused across commands)
# ==============================================================================

[resident]

# Interpreter executable. Empty means the dialect default:
#   powershell - pwsh -NoLogo -NoProfile -NonInteractive -Command -
#   posix      - sh -s
program = ""

# Arguments that make the interpreter read commands from stdin.
# Only used when program is set, or to replace the default arguments.
args = []

# ==============================================================================
# Process interpreter (fresh process per command)
# ==============================================================================

[process]

# Interpreter executable. Empty means the dialect default:
#   powershell - powershell.exe -NoLogo -NoProfile -NonInteractive -ExecutionPolicy Bypass -File
#   posix      - sh
program = ""

# Arguments placed before the scratch script path.
args = []

# Scratch script extension, without the dot. Empty means "ps1" or "sh".
script_extension = ""

# Directory for scratch scripts. Empty means the system temp directory.
scratch_dir = ""

# ==============================================================================
# Command overrides
# ==============================================================================

[commands]

# Replace a built-in command. Empty keeps the dialect default.
# Output contract:
#   status        - first line is the adapter status
#   count_clients - first line is an integer
#   list_clients  - one "MAC|Name|IPs" line per client
status = ""
start = ""
stop = ""
list_clients = ""
count_clients = ""

# ==============================================================================
# Logging
# ==============================================================================

[daemon]

# Log verbosity. The HOTSPOT_LOG environment variable takes precedence.
# Options: "error", "warn", "info", "debug", "trace"
log_level = "info"

# Path to log file. Empty string means log to stderr.
log_file = ""
"#;

// ---------------------------------------------------------------------------
// File creation
// ---------------------------------------------------------------------------

/// Creates (or force-overwrites) the default config file at the XDG path.
///
/// See [`create_default_config_at`].
pub fn create_default_config(force: bool) -> Result<PathBuf, ConfigError> {
    let path = xdg::config_path();
    xdg::ensure_config_dir().map_err(|source| ConfigError::WriteError {
        path: path.clone(),
        source,
    })?;
    create_default_config_at(&path, force)
}

/// Creates (or force-overwrites) a default config file at `path`.
///
/// - If the file exists and `force` is `false`, returns `ConfigError::AlreadyExists`.
/// - If the file exists and `force` is `true`, backs it up to `<name>.backup` first.
/// - Returns the path where the config was written.
pub fn create_default_config_at(path: &Path, force: bool) -> Result<PathBuf, ConfigError> {
    let path = path.to_path_buf();

    if path.exists() {
        if !force {
            return Err(ConfigError::AlreadyExists { path });
        }
        let backup_path = backup_path(&path);
        fs::rename(&path, &backup_path).map_err(|e| ConfigError::WriteError {
            path: backup_path.clone(),
            source: e,
        })?;
        tracing::info!("Backed up existing config to {}", backup_path.display());
    }

    write_default_config(&path)?;
    tracing::info!("Created default configuration at {}", path.display());
    Ok(path)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".backup");
    PathBuf::from(name)
}

/// Writes the default template to `path`, creating missing parent dirs and setting 0600 permissions.
fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let write_err = |source: std::io::Error| ConfigError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, DEFAULT_CONFIG_TEMPLATE).map_err(write_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(write_err)?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
