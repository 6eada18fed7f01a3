//! Spaces: optional sub-applications contributed by extensions.
//!
//! Each space is backed by a mirror directory on disk and runs its own
//! embedded web server on a background worker thread.
//!
//! - **label**: display state for a space row
//! - **controller**: install/uninstall/launch/terminate lifecycle
//! - **worker**: background thread owning the running server
//! - **loader**: plugin interface and catalog of loader kinds
//! - **hub**: artifact downloads into the mirror directory
//! - **requirements**: package installation for a space's requirements file
//! - **cleanup**: best-effort recursive removal
//! - **host**: host collaborators consumed by the worker

pub mod cleanup;
pub mod controller;
pub mod host;
pub mod hub;
pub mod label;
pub mod loader;
pub mod process;
pub mod requirements;
pub mod static_site;
pub mod worker;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use controller::{SpaceController, SpaceIdentity, SpaceServices, SpaceView};
pub use host::{HostContext, HostHooks};
pub use hub::{ArtifactSource, HubClient, LocalMirror, RepoCoordinates, RepoType};
pub use label::{SpaceLabel, build_label};
pub use loader::{LoadContext, RouterApp, ServerInfo, SpaceApp, SpaceCatalog, SpaceLoader};
pub use requirements::{PackageInstaller, PipInstaller};

/// Subdirectory of the extension root holding the downloaded artifact.
pub const MIRROR_DIR_NAME: &str = "huggingface_space_mirror";

/// Requirements manifest looked up in the extension root.
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

/// Errors raised while managing spaces.
#[derive(Debug, Error)]
pub enum SpaceError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Extension manifest could not be read or is invalid.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Artifact download failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// Requirements installation failed.
    #[error("Requirements install failed: {0}")]
    Requirements(String),

    /// The space's application could not be loaded.
    #[error("Failed to load space: {0}")]
    Load(String),

    /// The space's server could not be started.
    #[error("Failed to launch space: {0}")]
    Launch(String),

    /// No loader is registered for the requested entry kind.
    #[error("Unknown space entry kind: {0}")]
    UnknownEntry(String),

    /// The worker did not report a running server in time.
    #[error("Space did not start within {0} seconds")]
    LaunchTimeout(u64),

    /// The worker did not shut the server down in time.
    #[error("Space did not stop within {0} seconds")]
    StopTimeout(u64),

    /// Every port from the start port upwards is taken.
    #[error("No free port on {host} at or above {start}")]
    PortsExhausted {
        /// Bind host that was probed.
        host: String,
        /// First port tried.
        start: u16,
    },

    /// The space is already running.
    #[error("Space is already running: {0}")]
    AlreadyRunning(String),

    /// The space is not running.
    #[error("Space is not running: {0}")]
    NotRunning(String),

    /// The space has no mirror directory.
    #[error("Space is not installed: {0}")]
    NotInstalled(PathBuf),

    /// The operation is not allowed while the space runs.
    #[error("Space is busy: {0}")]
    Busy(String),
}
