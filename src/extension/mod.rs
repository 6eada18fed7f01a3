//! Extension discovery for Spacehost.
//!
//! Every directory under the extensions directory containing an
//! `extension.toml` is an extension. Extensions with a `[space]` section
//! are spaces.

pub mod manifest;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

pub use manifest::{ExtensionManifest, ProcessConfig, SpaceMeta, load_manifest};

use crate::space::SpaceError;

/// Returns the path to the spacehost data directory.
#[must_use]
pub fn spacehost_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".spacehost"))
}

/// Returns the default extensions directory.
#[must_use]
pub fn extensions_dir() -> Option<PathBuf> {
    spacehost_dir().map(|d| d.join("extensions"))
}

/// An extension found on disk.
#[derive(Debug, Clone)]
pub struct Extension {
    /// Extension name.
    pub name: String,
    /// Path to extension directory.
    pub path: PathBuf,
    /// Whether the extension is enabled.
    pub enabled: bool,
    /// Manifest data.
    pub manifest: ExtensionManifest,
}

impl Extension {
    /// Loads an extension from a directory.
    pub fn load(path: &Path) -> Result<Self, SpaceError> {
        let manifest_path = path.join(manifest::MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(SpaceError::Manifest(format!(
                "No {} found in {}",
                manifest::MANIFEST_FILE,
                path.display()
            )));
        }

        let manifest = load_manifest(&manifest_path)?;

        Ok(Self {
            name: manifest.extension.name.clone(),
            path: path.to_path_buf(),
            enabled: manifest.extension.enabled,
            manifest,
        })
    }

    /// Returns true if this extension declares a space.
    #[must_use]
    pub fn is_space(&self) -> bool {
        self.manifest.space.is_some()
    }

    /// Returns the space metadata.
    #[must_use]
    pub fn space_meta(&self) -> Option<&SpaceMeta> {
        self.manifest.space.as_ref()
    }
}

/// Discovers every extension under `dir`, sorted by directory name.
///
/// Directories that fail to load are skipped with a warning. A missing
/// `dir` yields no extensions.
pub fn discover_extensions(dir: &Path) -> Result<Vec<Extension>, SpaceError> {
    if !dir.exists() {
        debug!("[EXT] Extensions directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    paths.sort();

    let mut extensions = Vec::with_capacity(paths.len());
    for path in paths {
        match Extension::load(&path) {
            Ok(ext) => extensions.push(ext),
            Err(e) => warn!("[EXT] Failed to load extension at {}: {}", path.display(), e),
        }
    }

    debug!("[EXT] Discovered {} extension(s)", extensions.len());
    Ok(extensions)
}
