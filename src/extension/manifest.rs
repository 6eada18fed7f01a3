//! Extension manifest parsing.
//!
//! Parses `extension.toml` files. A `[space]` section marks the extension
//! as a space and carries its display and repository metadata.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::space::SpaceError;
use crate::space::hub::{RepoCoordinates, RepoType};
use crate::space::loader::DEFAULT_ENTRY;

/// Manifest file name inside an extension directory.
pub const MANIFEST_FILE: &str = "extension.toml";

/// Seconds a process space gets to open its port by default.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 60;

/// Extension manifest from extension.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionManifest {
    /// Extension metadata.
    pub extension: ExtensionMetadata,
    /// Space metadata, present only for space extensions.
    #[serde(default)]
    pub space: Option<SpaceMeta>,
}

/// Extension metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionMetadata {
    /// Extension name (unique identifier).
    pub name: String,
    /// Semantic version.
    #[serde(default)]
    pub version: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Whether the extension is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Space metadata from the `[space]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SpaceMeta {
    /// Category tag spaces are grouped under.
    pub tag: String,
    /// Display title; defaults to the extension name.
    #[serde(default)]
    pub title: Option<String>,
    /// Remote repository id (`owner/name`).
    #[serde(default)]
    pub repo_id: Option<String>,
    /// Remote repository type.
    #[serde(default)]
    pub repo_type: RepoType,
    /// Remote revision.
    #[serde(default)]
    pub revision: Option<String>,
    /// Loader kind used to start the space.
    #[serde(default = "default_entry")]
    pub entry: String,
    /// Settings for `process` entries.
    #[serde(default)]
    pub process: Option<ProcessConfig>,
}

fn default_entry() -> String {
    DEFAULT_ENTRY.to_string()
}

impl SpaceMeta {
    /// Returns the repository coordinates, if a remote repository is set.
    #[must_use]
    pub fn repo(&self) -> Option<RepoCoordinates> {
        self.repo_id.as_ref().map(|repo_id| RepoCoordinates {
            repo_id: repo_id.clone(),
            repo_type: self.repo_type,
            revision: self.revision.clone(),
        })
    }
}

/// Process configuration for `process` spaces.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProcessConfig {
    /// Program to run.
    pub command: String,
    /// Arguments; `{host}`, `{port}`, `{mirror_dir}` and `{root}` are expanded.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory; defaults to the mirror directory.
    #[serde(default)]
    pub cwd: Option<String>,
    /// Seconds to wait for the port to open.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
}

fn default_ready_timeout() -> u64 {
    DEFAULT_READY_TIMEOUT_SECS
}

/// Parses manifest content.
pub fn parse_manifest(content: &str) -> Result<ExtensionManifest, SpaceError> {
    let manifest: ExtensionManifest = toml::from_str(content)
        .map_err(|e| SpaceError::Manifest(format!("Failed to parse manifest: {}", e)))?;

    validate_manifest(&manifest)?;

    Ok(manifest)
}

/// Loads an extension manifest from a file.
pub fn load_manifest(path: &Path) -> Result<ExtensionManifest, SpaceError> {
    let content = fs::read_to_string(path)
        .map_err(|e| SpaceError::Manifest(format!("Failed to read manifest: {}", e)))?;

    parse_manifest(&content)
}

/// Validates a manifest for required fields and consistency.
fn validate_manifest(manifest: &ExtensionManifest) -> Result<(), SpaceError> {
    if manifest.extension.name.is_empty() {
        return Err(SpaceError::Manifest(
            "Extension name is required".to_string(),
        ));
    }

    let Some(space) = &manifest.space else {
        return Ok(());
    };

    if space.tag.trim().is_empty() {
        return Err(SpaceError::Manifest(
            "Space extensions require a non-empty 'tag'".to_string(),
        ));
    }

    if space.repo_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        return Err(SpaceError::Manifest("'repo_id' must not be empty".to_string()));
    }

    if space.entry == "process" && space.process.is_none() {
        return Err(SpaceError::Manifest(
            "Process spaces require a [space.process] section".to_string(),
        ));
    }

    Ok(())
}
