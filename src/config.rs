//! User settings read from `<config dir>/segfetch/config.toml`.
//!
//! Every field is optional; command-line flags take precedence, and built-in
//! defaults fill in whatever neither provides.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Parallel workers per download.
    pub threads: Option<usize>,
    /// Byte-range fragment size in bytes.
    pub fragment_size: Option<u64>,
    /// Where fragment scratch files live.
    pub scratch_dir: Option<PathBuf>,
    /// Directory finished downloads are written to.
    pub default_dir: Option<String>,
    /// HTTP client timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl Settings {
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("segfetch").join("config.toml"))
    }

    /// Loads settings from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid settings in {}", path.display()))
    }
}
