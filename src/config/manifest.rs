use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::foundation::core::Resolution;
use crate::foundation::error::{LedError, LedResult};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Descriptor written by the app manager next to each installed app.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppManifest {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Executable path relative to the app directory.
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,
    #[serde(default)]
    pub frame_size: Option<Resolution>,
}

fn default_entrypoint() -> String {
    "app".to_string()
}

impl AppManifest {
    pub fn validate(&self) -> LedResult<()> {
        if self.id.trim().is_empty() {
            return Err(LedError::config("app manifest id must be non-empty"));
        }
        if !is_relative_inside(Path::new(&self.entrypoint)) {
            return Err(LedError::config(format!(
                "app '{}' entrypoint '{}' must be a relative path inside the app directory",
                self.id, self.entrypoint
            )));
        }
        Ok(())
    }
}

/// An app resolved to its directory on disk.
#[derive(Clone, Debug)]
pub struct InstalledApp {
    pub dir: PathBuf,
    pub manifest: AppManifest,
}

impl InstalledApp {
    pub fn entrypoint(&self) -> PathBuf {
        self.dir.join(&self.manifest.entrypoint)
    }
}

/// Read-only view of the apps directory.
#[derive(Clone, Debug)]
pub struct AppCatalog {
    root: PathBuf,
}

impl AppCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory an app id maps to, or `None` when the id could escape the root.
    pub fn app_dir(&self, app_id: &str) -> Option<PathBuf> {
        let rel = Path::new(app_id);
        let single = rel.components().count() == 1;
        (single && is_relative_inside(rel)).then(|| self.root.join(rel))
    }

    /// Resolve an app id.
    ///
    /// `Ok(None)` means the app is not installed. A directory with a missing
    /// or invalid manifest is an error.
    pub fn resolve(&self, app_id: &str) -> LedResult<Option<InstalledApp>> {
        let Some(dir) = self.app_dir(app_id) else {
            return Ok(None);
        };
        if !dir.is_dir() {
            return Ok(None);
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        let bytes = std::fs::read(&manifest_path).map_err(|e| {
            LedError::config(format!(
                "read manifest '{}': {e}",
                manifest_path.display()
            ))
        })?;
        let manifest: AppManifest = serde_json::from_slice(&bytes).map_err(|e| {
            LedError::config(format!(
                "invalid manifest '{}': {e}",
                manifest_path.display()
            ))
        })?;
        manifest.validate()?;
        if manifest.id != app_id {
            tracing::warn!(
                app_id,
                manifest_id = %manifest.id,
                "manifest id differs from its directory name"
            );
        }

        // Absolute, so the entrypoint stays valid once the child's working
        // directory is switched to the app directory.
        let dir = std::path::absolute(&dir)?;
        Ok(Some(InstalledApp { dir, manifest }))
    }
}

fn is_relative_inside(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
#[path = "../../tests/unit/config/manifest.rs"]
mod tests;
