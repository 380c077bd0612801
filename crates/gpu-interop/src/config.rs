//! Backend configuration.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::TextureFormat;

/// Environment variable overriding [`BackendConfig::max_senders`].
pub const ENV_MAX_SENDERS: &str = "LIRU_MAX_SENDERS";
/// Environment variable overriding [`BackendConfig::library_path`].
pub const ENV_SPOUT_LIBRARY: &str = "LIRU_SPOUT_LIBRARY";

/// Settings shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// How many publishers one backend may hold open at once.
    pub max_senders: usize,
    /// Format of textures created by publishers.
    pub format: TextureFormat,
    /// Where to load `SpoutLibrary.dll` from. `None` searches the usual DLL
    /// locations. Only the first backend in a process loads the library.
    pub library_path: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            max_senders: 10,
            format: TextureFormat::default(),
            library_path: None,
        }
    }
}

impl BackendConfig {
    /// Defaults with `LIRU_MAX_SENDERS` / `LIRU_SPOUT_LIBRARY` applied on top.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(ENV_MAX_SENDERS) {
            let max = value
                .trim()
                .parse::<usize>()
                .with_context(|| format!("{ENV_MAX_SENDERS}={value:?} is not a number"))?;
            self = self.with_max_senders(max);
        }
        if let Some(value) = lookup(ENV_SPOUT_LIBRARY).filter(|v| !v.trim().is_empty()) {
            self = self.with_library_path(value.trim());
        }
        self.validate()?;
        Ok(self)
    }

    pub fn with_max_senders(mut self, max_senders: usize) -> Self {
        self.max_senders = max_senders;
        self
    }

    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_senders == 0 {
            bail!("max_senders must be at least 1");
        }
        Ok(())
    }
}
