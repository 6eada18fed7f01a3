//! Host collaborators consumed by space workers.

use std::fmt;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::port::DEFAULT_HOST;

/// Default time `run()` waits for a server to come up.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Default time `terminate()` waits for a server to shut down.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Hooks into the host application.
pub trait HostHooks: Send + Sync {
    /// Releases resources held by the host before a space starts.
    ///
    /// Spaces often compete for the same accelerator memory as the host.
    fn unload_all_models(&self) {
        debug!("[HOST] No models to unload");
    }

    /// Shows a freshly launched space to the user.
    ///
    /// Only called when `open_browser` is set. Failures are logged.
    fn open_in_browser(&self, url: &str) {
        match browser_command(url).spawn() {
            Ok(_) => info!("[HOST] Opened {} in browser", url),
            Err(e) => warn!("[HOST] Could not open browser for {}: {}", url, e),
        }
    }
}

/// Builds the platform command opening `url` in the default browser.
#[must_use]
pub fn browser_command(url: &str) -> Command {
    #[cfg(target_os = "windows")]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "", url]);
        cmd
    }

    #[cfg(target_os = "macos")]
    {
        let mut cmd = Command::new("open");
        cmd.arg(url);
        cmd
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(url);
        cmd
    }
}

/// Host hooks that do nothing.
#[derive(Debug, Default)]
pub struct NoopHooks;

impl HostHooks for NoopHooks {}

/// Host settings shared by every space controller.
#[derive(Clone)]
pub struct HostContext {
    /// Interface space servers bind to.
    pub server_name: Option<String>,
    /// Port the free port probe starts from.
    pub preferred_port: Option<u16>,
    /// How long `run()` waits for a server.
    pub launch_timeout: Duration,
    /// How long `terminate()` waits for shutdown.
    pub stop_timeout: Duration,
    /// Open each launched space in the browser.
    pub open_browser: bool,
    /// Host hooks.
    pub hooks: Arc<dyn HostHooks>,
}

impl Default for HostContext {
    fn default() -> Self {
        Self {
            server_name: None,
            preferred_port: None,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            open_browser: false,
            hooks: Arc::new(NoopHooks),
        }
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("server_name", &self.server_name)
            .field("preferred_port", &self.preferred_port)
            .field("launch_timeout", &self.launch_timeout)
            .field("stop_timeout", &self.stop_timeout)
            .field("open_browser", &self.open_browser)
            .finish_non_exhaustive()
    }
}

impl HostContext {
    /// Builds the host context from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            server_name: config.server_name.clone(),
            preferred_port: config.port,
            launch_timeout: config.launch_timeout,
            stop_timeout: config.stop_timeout,
            open_browser: config.open_browser,
            ..Self::default()
        }
    }

    /// Replaces the host hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn HostHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Returns the interface servers bind to.
    #[must_use]
    pub fn bind_host(&self) -> &str {
        self.server_name.as_deref().unwrap_or(DEFAULT_HOST)
    }
}
