//! Space controller: install, uninstall, launch and terminate one space.
//!
//! Installed state is read from disk on every refresh. Running state is
//! owned by the controller and only changes once the worker has confirmed
//! the transition. A worker that misses its stop timeout keeps the space in
//! a stopping state: only Terminate stays enabled until the worker is gone.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::cleanup::{FsRemover, Remover, remove_tree_with};
use super::host::HostContext;
use super::hub::{ArtifactSource, HubClient, LocalMirror, RepoCoordinates};
use super::label::{SpaceLabel, build_label};
use super::loader::{DEFAULT_ENTRY, LoadContext, ServerInfo, SpaceCatalog};
use super::requirements::{PackageInstaller, PipInstaller};
use super::worker::{self, WorkerHandle, WorkerSpec};
use super::{MIRROR_DIR_NAME, REQUIREMENTS_FILE, SpaceError};
use crate::config::Config;
use crate::extension::manifest::{ProcessConfig, SpaceMeta};

/// Identity of a space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceIdentity {
    /// Extension root directory.
    pub root: PathBuf,
    /// Display title.
    pub title: String,
    /// Remote repository, if any.
    pub repo: Option<RepoCoordinates>,
    /// Loader kind.
    pub entry: String,
    /// Process settings for `process` entries.
    pub process: Option<ProcessConfig>,
}

impl SpaceIdentity {
    /// Creates an identity for a `static` space without a remote repository.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, title: &str) -> Self {
        Self {
            root: root.into(),
            title: title.to_string(),
            repo: None,
            entry: DEFAULT_ENTRY.to_string(),
            process: None,
        }
    }

    /// Builds an identity from an extension's space metadata.
    #[must_use]
    pub fn from_meta(root: &Path, fallback_title: &str, meta: &SpaceMeta) -> Self {
        Self {
            root: root.to_path_buf(),
            title: meta
                .title
                .clone()
                .unwrap_or_else(|| fallback_title.to_string()),
            repo: meta.repo(),
            entry: meta.entry.clone(),
            process: meta.process.clone(),
        }
    }

    /// Sets the remote repository.
    #[must_use]
    pub fn with_repo(mut self, repo: RepoCoordinates) -> Self {
        self.repo = Some(repo);
        self
    }

    /// Sets the loader kind.
    #[must_use]
    pub fn with_entry(mut self, entry: &str) -> Self {
        self.entry = entry.to_string();
        self
    }
}

/// Collaborators shared by all controllers.
#[derive(Clone)]
pub struct SpaceServices {
    /// Host settings and hooks.
    pub host: HostContext,
    /// Loaders by entry kind.
    pub catalog: Arc<SpaceCatalog>,
    /// Artifact download source.
    pub source: Arc<dyn ArtifactSource>,
    /// Requirements installer.
    pub installer: Arc<dyn PackageInstaller>,
    /// Deletes mirror entries on uninstall.
    pub remover: Arc<dyn Remover>,
}

impl Default for SpaceServices {
    fn default() -> Self {
        Self {
            host: HostContext::default(),
            catalog: Arc::new(SpaceCatalog::with_defaults()),
            source: Arc::new(HubClient::default()),
            installer: Arc::new(PipInstaller::default()),
            remover: Arc::new(FsRemover),
        }
    }
}

impl SpaceServices {
    /// Builds the services described by `config`.
    ///
    /// A configured `mirror_source` replaces the hub.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let source: Arc<dyn ArtifactSource> = match &config.mirror_source {
            Some(base) => {
                info!("[SPACE] Using local mirror {}", base.display());
                Arc::new(LocalMirror::new(base.clone()))
            }
            None => Arc::new(HubClient::new(
                &config.hub_endpoint,
                config.hub_token.clone(),
            )),
        };

        Self {
            host: HostContext::from_config(config),
            catalog: Arc::new(SpaceCatalog::with_defaults()),
            source,
            installer: Arc::new(PipInstaller::new(&config.python)),
            remover: Arc::new(FsRemover),
        }
    }
}

/// Visible state of a space row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceView {
    /// Label next to the title.
    pub label: SpaceLabel,
    /// Install button enabled.
    pub install: bool,
    /// Uninstall button enabled.
    pub uninstall: bool,
    /// Launch button enabled.
    pub launch: bool,
    /// Terminate button enabled.
    pub terminate: bool,
}

impl SpaceView {
    /// Computes the view for an installed/running combination.
    #[must_use]
    pub fn compute(title: &str, installed: bool, running: bool, url: Option<&str>) -> Self {
        Self {
            label: build_label(title, installed, url),
            install: !running && !installed,
            uninstall: !running && installed,
            launch: installed && !running,
            terminate: installed && running,
        }
    }
}

/// Lifecycle controller for one space.
pub struct SpaceController {
    identity: SpaceIdentity,
    mirror_dir: PathBuf,
    services: SpaceServices,
    is_running: bool,
    server: Option<ServerInfo>,
    worker: Option<WorkerHandle>,
}

impl SpaceController {
    /// Creates a controller for `identity`.
    #[must_use]
    pub fn new(identity: SpaceIdentity, services: SpaceServices) -> Self {
        let mirror_dir = identity.root.join(MIRROR_DIR_NAME);
        Self {
            identity,
            mirror_dir,
            services,
            is_running: false,
            server: None,
            worker: None,
        }
    }

    /// Returns the space identity.
    #[must_use]
    pub fn identity(&self) -> &SpaceIdentity {
        &self.identity
    }

    /// Returns the display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.identity.title
    }

    /// Returns the installed-artifact directory.
    #[must_use]
    pub fn mirror_dir(&self) -> &Path {
        &self.mirror_dir
    }

    /// Returns true if the mirror directory exists.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.mirror_dir.exists()
    }

    /// Returns true while a server is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Returns true while a worker thread exists, running or stopping.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.worker.is_some()
    }

    /// Returns true while a terminated worker is still shutting down.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        !self.is_running && self.worker.is_some()
    }

    /// Returns the running server, if any.
    #[must_use]
    pub fn server(&self) -> Option<&ServerInfo> {
        self.server.as_ref()
    }

    /// Recomputes the visible state.
    ///
    /// A stopping space shows as running, so only Terminate is enabled.
    #[must_use]
    pub fn refresh(&self) -> SpaceView {
        let url = self.server.as_ref().map(|s| s.url.as_str());
        SpaceView::compute(self.title(), self.is_installed(), self.is_active(), url)
    }

    /// Releases a stopping worker that has finished.
    ///
    /// Returns true if the state changed. Never blocks.
    pub fn reap(&mut self) -> bool {
        if !self.is_stopping() {
            return false;
        }
        let finished = self
            .worker
            .as_mut()
            .is_some_and(WorkerHandle::poll_stopped);
        if finished {
            info!("[SPACE] {} finished stopping", self.title());
            self.worker = None;
            self.server = None;
        }
        finished
    }

    /// Rejects install and uninstall while a worker exists.
    fn ensure_idle(&mut self) -> Result<(), SpaceError> {
        self.reap();
        if self.is_active() {
            return Err(SpaceError::Busy(self.identity.title.clone()));
        }
        Ok(())
    }

    /// Downloads the space's artifact and installs its requirements.
    ///
    /// Without a remote repository only the mirror directory is created.
    pub fn install(&mut self) -> Result<SpaceView, SpaceError> {
        self.ensure_idle()?;

        fs::create_dir_all(&self.mirror_dir)?;

        let Some(repo) = self.identity.repo.clone() else {
            info!(
                "[SPACE] {} has no remote repository, using {} as is",
                self.title(),
                self.mirror_dir.display()
            );
            return Ok(self.refresh());
        };

        let downloaded = self
            .services
            .source
            .snapshot(&repo, &self.mirror_dir, true)?;
        info!("[SPACE] Downloaded: {}", downloaded.display());

        let requirements = self.identity.root.join(REQUIREMENTS_FILE);
        if requirements.exists() {
            let requirements = fs::canonicalize(&requirements)?;
            let desc = format!("space requirements for [{}]", self.title());
            self.services
                .installer
                .install_requirements(&requirements, &desc)?;
        }

        Ok(self.refresh())
    }

    /// Deletes the mirror directory, continuing past per-entry failures.
    pub fn uninstall(&mut self) -> Result<SpaceView, SpaceError> {
        self.ensure_idle()?;

        let report = remove_tree_with(&self.mirror_dir, self.services.remover.as_ref());
        if report.is_complete() {
            info!("[SPACE] Deleted: {}", self.mirror_dir.display());
        } else {
            warn!(
                "[SPACE] {} entries could not be deleted. You may try to manually delete the folder [{}].",
                report.failed.len(),
                self.mirror_dir.display()
            );
        }

        Ok(self.refresh())
    }

    /// Starts the space and returns once its server is serving.
    ///
    /// # Errors
    /// Fails if the space is running, stopping or not installed, if the
    /// entry kind is unknown, if the worker fails, or after the host's launch
    /// timeout. A timed out worker is told to stop and kept until it has.
    pub fn run(&mut self) -> Result<SpaceView, SpaceError> {
        if self.is_running {
            return Err(SpaceError::AlreadyRunning(self.identity.title.clone()));
        }
        self.reap();
        if self.is_stopping() {
            return Err(SpaceError::Busy(self.identity.title.clone()));
        }
        if !self.is_installed() {
            return Err(SpaceError::NotInstalled(self.mirror_dir.clone()));
        }

        let loader = self.services.catalog.get(&self.identity.entry)?;
        let ctx = LoadContext::new(
            &self.identity.title,
            self.identity.root.clone(),
            self.mirror_dir.clone(),
        )
        .with_process(self.identity.process.clone());

        self.is_running = true;
        let spawned = worker::spawn(WorkerSpec {
            loader,
            ctx,
            host: self.services.host.clone(),
        });

        let mut handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.is_running = false;
                return Err(e);
            }
        };

        match handle.wait_serving(self.services.host.launch_timeout) {
            Ok(server) => {
                info!("[SPACE] {} is running at {}", self.title(), server.url);
                if self.services.host.open_browser {
                    self.services.host.hooks.open_in_browser(&server.url);
                }
                self.server = Some(server);
                self.worker = Some(handle);
                Ok(self.refresh())
            }
            Err(e) => {
                warn!("[SPACE] {} failed to start: {}", self.title(), e);
                self.is_running = false;
                if matches!(e, SpaceError::LaunchTimeout(_)) {
                    // The worker may still bind; keep it until it reports back.
                    handle.request_stop();
                    self.worker = Some(handle);
                }
                Err(e)
            }
        }
    }

    /// Stops the space and returns once its server has shut down.
    ///
    /// Calling it again on a stopping space waits for the same worker.
    ///
    /// # Errors
    /// Fails if no worker exists, or after the host's stop timeout. On
    /// timeout the worker and its server are kept and the space is stopping.
    pub fn terminate(&mut self) -> Result<SpaceView, SpaceError> {
        let timeout = self.services.host.stop_timeout;
        let Some(handle) = self.worker.as_mut() else {
            return Err(SpaceError::NotRunning(self.identity.title.clone()));
        };

        self.is_running = false;
        match handle.stop(timeout) {
            Ok(()) => {
                self.worker = None;
                self.server = None;
                info!("[SPACE] {} terminated", self.title());
                Ok(self.refresh())
            }
            Err(e) => {
                warn!("[SPACE] {} is still stopping: {}", self.title(), e);
                Err(e)
            }
        }
    }
}

impl Drop for SpaceController {
    fn drop(&mut self) {
        if self.is_active() {
            let _ = self.terminate();
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn view(install: bool, uninstall: bool, launch: bool, terminate: bool) -> [bool; 4] {
        [install, uninstall, launch, terminate]
    }

    fn buttons(v: &SpaceView) -> [bool; 4] {
        [v.install, v.uninstall, v.launch, v.terminate]
    }

    #[test]
    fn test_not_installed_row() {
        let v = SpaceView::compute("S", false, false, None);
        assert_eq!(buttons(&v), view(true, false, false, false));
        assert!(matches!(v.label, SpaceLabel::NotInstalled { .. }));
    }

    #[test]
    fn test_ready_row() {
        let v = SpaceView::compute("S", true, false, None);
        assert_eq!(buttons(&v), view(false, true, true, false));
        assert!(matches!(v.label, SpaceLabel::Ready { .. }));
    }

    #[test]
    fn test_running_row() {
        let v = SpaceView::compute("S", true, true, Some("http://127.0.0.1:7860/"));
        assert_eq!(buttons(&v), view(false, false, false, true));
        assert_eq!(v.label.url(), Some("http://127.0.0.1:7860/"));
    }

    #[test]
    fn test_identity_from_meta_falls_back_to_name() {
        let meta: SpaceMeta =
            toml::from_str("tag = \"T\"\nrepo_id = \"o/r\"").expect("parse meta");
        let identity = SpaceIdentity::from_meta(Path::new("/ext/x"), "x-name", &meta);

        assert_eq!(identity.title, "x-name");
        assert_eq!(identity.entry, "static");
        assert_eq!(identity.repo, Some(RepoCoordinates::space("o/r")));
    }

    #[test]
    fn test_services_from_config() {
        let config = Config {
            port: Some(9100),
            ..Config::default()
        };
        let services = SpaceServices::from_config(&config);

        assert_eq!(services.host.preferred_port, Some(9100));
        assert_eq!(services.catalog.kinds(), vec!["process", "static"]);
    }

    #[test]
    fn test_mirror_dir_under_root() {
        let controller =
            SpaceController::new(SpaceIdentity::new("/ext/x", "X"), SpaceServices::default());
        assert_eq!(
            controller.mirror_dir(),
            Path::new("/ext/x").join(MIRROR_DIR_NAME)
        );
        assert!(!controller.is_running());
        assert!(!controller.is_active());
    }
}
