//! TOML config files shared by the controller and the key.
//!
//! Both binaries keep their settings in one TOML file under the same
//! platform directory:
//! - Windows:  `%APPDATA%\Keyless\`
//! - Linux:    `$XDG_CONFIG_HOME/keyless/` (or `~/.config/keyless/`)
//! - macOS:    `~/Library/Application Support/Keyless/`
//!
//! Each crate owns its schema and validation; this module only locates,
//! reads and writes the file.  A missing file is not an error: the schema's
//! `Default` is used instead, so a fresh install runs without any setup.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Error type for reading and writing config files.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Resolves `file_name` inside the platform config directory.
///
/// # Errors
///
/// Returns [`ConfigFileError::NoPlatformConfigDir`] when the base directory
/// cannot be determined from the environment.
pub fn default_path(file_name: &str) -> Result<PathBuf, ConfigFileError> {
    platform_config_dir()
        .map(|dir| dir.join(file_name))
        .ok_or(ConfigFileError::NoPlatformConfigDir)
}

/// Loads a config from `path`, returning `T::default()` if the file does not
/// exist yet.
///
/// # Errors
///
/// Returns [`ConfigFileError::Io`] for file-system errors other than
/// "not found", and [`ConfigFileError::Parse`] if the TOML is malformed.
pub fn load_or_default<T>(path: &Path) -> Result<T, ConfigFileError>
where
    T: DeserializeOwned + Default,
{
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(source) => Err(ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigFileError::Io`] if a directory or the file cannot be
/// written.
pub fn save<T: Serialize>(config: &T, path: &Path) -> Result<(), ConfigFileError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigFileError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigFileError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config base directory including the `keyless` subdirectory.
pub fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Keyless"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("keyless"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Keyless")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
