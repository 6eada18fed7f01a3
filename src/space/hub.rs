//! Artifact downloads into a space's mirror directory.
//!
//! `HubClient` snapshots a repository from a Hugging Face compatible hub.
//! `LocalMirror` copies a directory tree and serves offline installs.

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use super::SpaceError;

/// Default hub endpoint.
pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";

/// Revision used when none is configured.
pub const DEFAULT_REVISION: &str = "main";

/// Kind of hub repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    /// Space repository.
    #[default]
    Space,
    /// Model repository.
    Model,
    /// Dataset repository.
    Dataset,
}

impl RepoType {
    /// Path segment used by the hub's metadata API.
    #[must_use]
    pub fn api_segment(self) -> &'static str {
        match self {
            RepoType::Space => "spaces",
            RepoType::Model => "models",
            RepoType::Dataset => "datasets",
        }
    }

    /// Prefix in front of the repo id in file URLs.
    #[must_use]
    pub fn url_prefix(self) -> &'static str {
        match self {
            RepoType::Space => "spaces/",
            RepoType::Model => "",
            RepoType::Dataset => "datasets/",
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoType::Space => write!(f, "space"),
            RepoType::Model => write!(f, "model"),
            RepoType::Dataset => write!(f, "dataset"),
        }
    }
}

/// Remote repository backing a space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    /// Repository id (`owner/name`).
    pub repo_id: String,
    /// Repository type.
    pub repo_type: RepoType,
    /// Revision (branch, tag or commit); `None` means the default branch.
    pub revision: Option<String>,
}

impl RepoCoordinates {
    /// Creates coordinates for a space repository on the default branch.
    #[must_use]
    pub fn space(repo_id: &str) -> Self {
        Self {
            repo_id: repo_id.to_string(),
            repo_type: RepoType::Space,
            revision: None,
        }
    }

    /// Returns the revision to fetch.
    #[must_use]
    pub fn revision(&self) -> &str {
        self.revision.as_deref().unwrap_or(DEFAULT_REVISION)
    }
}

/// Source of space artifacts.
pub trait ArtifactSource: Send + Sync {
    /// Mirrors `repo` into `local_dir` and returns the local path.
    ///
    /// With `force`, files already present are downloaded again and overwritten.
    fn snapshot(
        &self,
        repo: &RepoCoordinates,
        local_dir: &Path,
        force: bool,
    ) -> Result<PathBuf, SpaceError>;
}

/// Repository metadata returned by the hub.
#[derive(Debug, Deserialize)]
struct RepoInfo {
    #[serde(default)]
    siblings: Vec<RepoSibling>,
}

/// One file in a hub repository.
#[derive(Debug, Deserialize)]
struct RepoSibling {
    rfilename: String,
}

/// Hub client downloading whole repository snapshots.
pub struct HubClient {
    /// HTTP client for API requests.
    client: reqwest::blocking::Client,
    /// Base URL of the hub.
    endpoint: String,
    /// Optional bearer token.
    token: Option<String>,
}

impl Default for HubClient {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_ENDPOINT, None)
    }
}

impl HubClient {
    /// Creates a hub client for `endpoint`.
    #[must_use]
    pub fn new(endpoint: &str, token: Option<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent("spacehost")
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Returns the metadata URL for a repository revision.
    #[must_use]
    pub fn info_url(&self, repo: &RepoCoordinates) -> String {
        format!(
            "{}/api/{}/{}/revision/{}",
            self.endpoint,
            repo.repo_type.api_segment(),
            repo.repo_id,
            repo.revision()
        )
    }

    /// Returns the download URL for one file of a repository revision.
    #[must_use]
    pub fn file_url(&self, repo: &RepoCoordinates, filename: &str) -> String {
        format!(
            "{}/{}{}/resolve/{}/{}",
            self.endpoint,
            repo.repo_type.url_prefix(),
            repo.repo_id,
            repo.revision(),
            filename
        )
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, SpaceError> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| SpaceError::Download(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SpaceError::Download(format!(
                "Hub returned {} for {}",
                response.status(),
                url
            )));
        }

        Ok(response)
    }

    /// Lists the files of a repository revision.
    pub fn list_files(&self, repo: &RepoCoordinates) -> Result<Vec<String>, SpaceError> {
        let info: RepoInfo = self
            .get(&self.info_url(repo))?
            .json()
            .map_err(|e| SpaceError::Download(format!("Failed to parse response: {}", e)))?;

        Ok(info.siblings.into_iter().map(|s| s.rfilename).collect())
    }

    /// Streams one file to disk.
    ///
    /// The body goes to a `.part` file beside `dest` that is renamed into
    /// place once complete, so `dest` never holds a truncated download.
    fn download_file(&self, url: &str, dest: &Path) -> Result<(), SpaceError> {
        let mut response = self.get(url)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let partial = partial_path(dest);
        let written = File::create(&partial)
            .map_err(SpaceError::from)
            .and_then(|mut file| {
                let size = response.copy_to(&mut file).map_err(|e| {
                    SpaceError::Download(format!("Failed to read response: {}", e))
                })?;
                file.sync_all()?;
                Ok(size)
            })
            .and_then(|size| {
                fs::rename(&partial, dest)?;
                Ok(size)
            });

        match written {
            Ok(size) => {
                debug!("[HUB] Wrote {} bytes to {}", size, dest.display());
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }
}

/// Sibling path a download is streamed into.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

impl ArtifactSource for HubClient {
    fn snapshot(
        &self,
        repo: &RepoCoordinates,
        local_dir: &Path,
        force: bool,
    ) -> Result<PathBuf, SpaceError> {
        info!(
            "[HUB] Snapshot {} {}@{} into {}",
            repo.repo_type,
            repo.repo_id,
            repo.revision(),
            local_dir.display()
        );

        fs::create_dir_all(local_dir)?;
        let files = self.list_files(repo)?;

        for filename in &files {
            let relative = safe_relative_path(filename)?;
            let dest = local_dir.join(relative);

            if !force && dest.exists() {
                debug!("[HUB] Keeping {}", dest.display());
                continue;
            }

            debug!("[HUB] Fetching {}", filename);
            self.download_file(&self.file_url(repo, filename), &dest)?;
        }

        info!("[HUB] Fetched {} file(s) for {}", files.len(), repo.repo_id);
        Ok(local_dir.to_path_buf())
    }
}

/// Rejects hub filenames that would escape the mirror directory.
fn safe_relative_path(filename: &str) -> Result<PathBuf, SpaceError> {
    let path = Path::new(filename);
    let is_plain = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));

    if filename.is_empty() || !is_plain {
        return Err(SpaceError::Download(format!(
            "Refusing unsafe file path from hub: {}",
            filename
        )));
    }

    Ok(path.to_path_buf())
}

/// Artifact source that copies repositories from a local directory.
///
/// A repository `owner/name` is read from `<base>/owner/name`.
#[derive(Debug, Clone)]
pub struct LocalMirror {
    base: PathBuf,
}

impl LocalMirror {
    /// Creates a local mirror rooted at `base`.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl ArtifactSource for LocalMirror {
    fn snapshot(
        &self,
        repo: &RepoCoordinates,
        local_dir: &Path,
        force: bool,
    ) -> Result<PathBuf, SpaceError> {
        let source = self.base.join(&repo.repo_id);
        if !source.is_dir() {
            return Err(SpaceError::Download(format!(
                "Local mirror has no repository {}",
                repo.repo_id
            )));
        }

        copy_dir_recursive(&source, local_dir, force)?;
        Ok(local_dir.to_path_buf())
    }
}

/// Recursively copies a directory.
fn copy_dir_recursive(src: &Path, dst: &Path, overwrite: bool) -> io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path, overwrite)?;
        } else if overwrite || !dst_path.exists() {
            fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_urls_for_space() {
        let client = HubClient::new("https://hub.example/", None);
        let repo = RepoCoordinates::space("owner/sketch");

        assert_eq!(
            client.info_url(&repo),
            "https://hub.example/api/spaces/owner/sketch/revision/main"
        );
        assert_eq!(
            client.file_url(&repo, "app/index.html"),
            "https://hub.example/spaces/owner/sketch/resolve/main/app/index.html"
        );
    }

    #[test]
    fn test_urls_for_model_and_dataset() {
        let client = HubClient::default();
        let model = RepoCoordinates {
            repo_id: "owner/weights".to_string(),
            repo_type: RepoType::Model,
            revision: Some("v2".to_string()),
        };
        assert_eq!(
            client.file_url(&model, "config.json"),
            "https://huggingface.co/owner/weights/resolve/v2/config.json"
        );

        let dataset = RepoCoordinates {
            repo_type: RepoType::Dataset,
            ..model
        };
        assert_eq!(
            client.info_url(&dataset),
            "https://huggingface.co/api/datasets/owner/weights/revision/v2"
        );
    }

    #[test]
    fn test_partial_path_sits_beside_dest() {
        assert_eq!(
            partial_path(Path::new("/m/static/model.bin")),
            PathBuf::from("/m/static/model.bin.part")
        );
    }

    #[test]
    fn test_safe_relative_path() {
        assert!(safe_relative_path("a/b.txt").is_ok());
        assert!(safe_relative_path("../etc/passwd").is_err());
        assert!(safe_relative_path("/abs").is_err());
        assert!(safe_relative_path("").is_err());
    }

    #[test]
    fn test_local_mirror_overwrites_with_force() {
        let base = TempDir::new().expect("temp dir");
        let repo_dir = base.path().join("owner/sketch");
        fs::create_dir_all(repo_dir.join("assets")).expect("mkdir");
        fs::write(repo_dir.join("index.html"), "new").expect("write");
        fs::write(repo_dir.join("assets/app.js"), "js").expect("write");

        let target = TempDir::new().expect("temp dir");
        fs::write(target.path().join("index.html"), "old").expect("write");

        let mirror = LocalMirror::new(base.path());
        let repo = RepoCoordinates::space("owner/sketch");

        mirror
            .snapshot(&repo, target.path(), false)
            .expect("snapshot");
        assert_eq!(
            fs::read_to_string(target.path().join("index.html")).expect("read"),
            "old"
        );

        mirror.snapshot(&repo, target.path(), true).expect("snapshot");
        assert_eq!(
            fs::read_to_string(target.path().join("index.html")).expect("read"),
            "new"
        );
        assert!(target.path().join("assets/app.js").exists());
    }

    #[test]
    fn test_local_mirror_missing_repo() {
        let base = TempDir::new().expect("temp dir");
        let mirror = LocalMirror::new(base.path());
        let result = mirror.snapshot(
            &RepoCoordinates::space("owner/absent"),
            &base.path().join("out"),
            true,
        );
        assert!(matches!(result, Err(SpaceError::Download(_))));
    }
}
