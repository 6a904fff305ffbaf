//! ==============================================================================
//! settings.rs - persisted controller settings (the settings file)
//! ==============================================================================
//!
//! purpose:
//!     the one place that touches the settings json. request handlers and
//!     the sampler go through ConfigStore instead of opening the file.
//!
//! atomicity:
//!     writes go to a temp file in the same directory which is then renamed
//!     over the target. a concurrent reader sees the old document or the new
//!     one, never a torn mix. concurrent writers are not coordinated beyond
//!     that: last rename wins.
//!
//! relationships:
//!     - used by: sampler.rs (read every tick)
//!     - used by: server.rs (control endpoint update, current config)
//!     - used by: main.rs (load_or_init at startup)
//!
//! ==============================================================================

use std::fs::Permissions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::domain::{Configuration, PartialConfiguration};
use crate::error::{FridgeError, Result};

/// repository for the settings file at one well-known path
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// load and parse the settings
    ///
    /// `NotFound` if the file is absent, `CorruptData` if it is not a
    /// settings document.
    pub fn read(&self) -> Result<Configuration> {
        let raw = std::fs::read(&self.path).map_err(|e| FridgeError::from_io(&self.path, e))?;
        serde_json::from_slice(&raw).map_err(|e| FridgeError::corrupt(&self.path, e.to_string()))
    }

    /// replace the persisted settings with `config`
    pub fn write(&self, config: &Configuration) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| FridgeError::from_io(dir, e))?;
        // temp files start out 0600; keep the mode other readers rely on
        if let Some(permissions) = self.target_permissions() {
            tmp.as_file()
                .set_permissions(permissions)
                .map_err(|e| FridgeError::from_io(tmp.path(), e))?;
        }
        serde_json::to_writer_pretty(&mut tmp, config)
            .map_err(|e| FridgeError::Io { path: tmp.path().to_path_buf(), source: e.into() })?;
        tmp.write_all(b"\n")
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| FridgeError::from_io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| FridgeError::from_io(&self.path, e.error))?;

        debug!(path = %self.path.display(), ?config, "settings written");
        Ok(())
    }

    /// mode of the current settings file, or 0644 for a new one
    fn target_permissions(&self) -> Option<Permissions> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Some(meta.permissions()),
            Err(_) => default_permissions(),
        }
    }

    /// overlay `partial` onto the stored settings and persist the result
    ///
    /// returns the settings as written.
    pub fn update(&self, partial: &PartialConfiguration) -> Result<Configuration> {
        let current = self.read()?;
        let merged = current.merge(partial);
        self.write(&merged)?;
        info!(?partial, ?merged, "settings updated");
        Ok(merged)
    }

    /// read the settings, writing the defaults first if none exist yet
    pub fn load_or_init(&self) -> Result<Configuration> {
        match self.read() {
            Ok(config) => Ok(config),
            Err(e) if e.is_not_found() => {
                let config = Configuration::default();
                self.write(&config)?;
                info!(path = %self.path.display(), "no settings found, wrote defaults");
                Ok(config)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<Permissions> {
    None
}
