//! Plugin interface for space applications.
//!
//! A space's entry kind names a loader in the [`SpaceCatalog`]. The loader
//! receives a [`LoadContext`] by value and returns a [`SpaceApp`], which the
//! worker launches on a free port and closes on terminate. No process-wide
//! state (working directory, search paths) is touched.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::SpaceError;
use super::process::ProcessLoader;
use super::static_site::StaticSiteLoader;
use crate::extension::manifest::ProcessConfig;
use crate::port::connectable;

/// Entry kind used when a manifest names none.
pub const DEFAULT_ENTRY: &str = "static";

/// How long a router server gets to drain connections on close.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Everything a loader may know about the space it loads.
#[derive(Debug, Clone)]
pub struct LoadContext {
    /// Display title of the space.
    pub space_name: String,
    /// Extension root directory.
    pub root: PathBuf,
    /// Installed mirror directory; the app's working directory.
    pub mirror_dir: PathBuf,
    /// Directories searched for the app's own files, mirror first.
    pub search_paths: Vec<PathBuf>,
    /// Unique id for this load.
    pub module_id: String,
    /// Process settings for `process` entries.
    pub process: Option<ProcessConfig>,
}

impl LoadContext {
    /// Creates a context with a freshly generated module id.
    #[must_use]
    pub fn new(space_name: &str, root: PathBuf, mirror_dir: PathBuf) -> Self {
        let module_id = format!("space_{}", uuid::Uuid::new_v4().simple());
        Self {
            space_name: space_name.to_string(),
            search_paths: vec![mirror_dir.clone(), root.clone()],
            root,
            mirror_dir,
            module_id,
            process: None,
        }
    }

    /// Attaches process settings.
    #[must_use]
    pub fn with_process(mut self, process: Option<ProcessConfig>) -> Self {
        self.process = process;
        self
    }
}

/// Address of a running space server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Bound socket address.
    pub addr: SocketAddr,
    /// URL shown to the user.
    pub url: String,
}

impl ServerInfo {
    /// Creates server info for `addr`, showing `host` in the URL.
    ///
    /// Wildcard hosts are shown as their loopback address.
    #[must_use]
    pub fn new(host: &str, addr: SocketAddr) -> Self {
        let shown = match host.parse::<IpAddr>() {
            Ok(ip) if ip.is_unspecified() => connectable(SocketAddr::new(ip, addr.port()))
                .ip()
                .to_string(),
            _ => host.to_string(),
        };
        let url = if shown.contains(':') {
            format!("http://[{}]:{}/", shown, addr.port())
        } else {
            format!("http://{}:{}/", shown, addr.port())
        };
        Self { addr, url }
    }
}

/// A loaded space application.
pub trait SpaceApp: Send {
    /// Starts serving on `addr` and returns once the server accepts connections.
    fn launch(&mut self, host: &str, addr: SocketAddr) -> Result<ServerInfo, SpaceError>;

    /// Stops the server. Must be safe to call when nothing is running.
    fn close(&mut self);
}

/// Creates space applications of one entry kind.
pub trait SpaceLoader: Send + Sync {
    /// Loads the application described by `ctx`.
    fn load(&self, ctx: LoadContext) -> Result<Box<dyn SpaceApp>, SpaceError>;
}

impl<F> SpaceLoader for F
where
    F: Fn(LoadContext) -> Result<Box<dyn SpaceApp>, SpaceError> + Send + Sync,
{
    fn load(&self, ctx: LoadContext) -> Result<Box<dyn SpaceApp>, SpaceError> {
        self(ctx)
    }
}

/// Registered loaders by entry kind.
#[derive(Clone, Default)]
pub struct SpaceCatalog {
    loaders: HashMap<String, Arc<dyn SpaceLoader>>,
}

impl fmt::Debug for SpaceCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpaceCatalog")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl SpaceCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog with the built-in `static` and `process` loaders.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.register("static", Arc::new(StaticSiteLoader));
        catalog.register("process", Arc::new(ProcessLoader));
        catalog
    }

    /// Registers a loader, returning the one it replaced.
    pub fn register(
        &mut self,
        kind: &str,
        loader: Arc<dyn SpaceLoader>,
    ) -> Option<Arc<dyn SpaceLoader>> {
        self.loaders.insert(kind.to_string(), loader)
    }

    /// Removes a loader.
    pub fn unregister(&mut self, kind: &str) -> Option<Arc<dyn SpaceLoader>> {
        self.loaders.remove(kind)
    }

    /// Looks up the loader for `kind`.
    pub fn get(&self, kind: &str) -> Result<Arc<dyn SpaceLoader>, SpaceError> {
        self.loaders
            .get(kind)
            .cloned()
            .ok_or_else(|| SpaceError::UnknownEntry(kind.to_string()))
    }

    /// Returns the registered entry kinds.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.loaders.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

/// A running router server.
struct RunningRouter {
    runtime: Runtime,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

/// Space application serving an axum router on its own runtime.
pub struct RouterApp {
    name: String,
    router: Router,
    running: Option<RunningRouter>,
}

impl RouterApp {
    /// Wraps `router` as a space application.
    #[must_use]
    pub fn new(name: &str, router: Router) -> Self {
        Self {
            name: name.to_string(),
            router,
            running: None,
        }
    }
}

impl SpaceApp for RouterApp {
    fn launch(&mut self, host: &str, addr: SocketAddr) -> Result<ServerInfo, SpaceError> {
        if self.running.is_some() {
            return Err(SpaceError::AlreadyRunning(self.name.clone()));
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("space-server")
            .enable_all()
            .build()
            .map_err(|e| SpaceError::Launch(format!("Failed to build runtime: {}", e)))?;

        let listener = runtime
            .block_on(tokio::net::TcpListener::bind(addr))
            .map_err(|e| SpaceError::Launch(format!("Failed to bind {}: {}", addr, e)))?;
        let actual_addr = listener.local_addr()?;

        let router = self.router.clone().layer(TraceLayer::new_for_http());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = runtime.spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!("[SPACE] {} serving on http://{}", self.name, actual_addr);

        self.running = Some(RunningRouter {
            runtime,
            shutdown_tx: Some(shutdown_tx),
            task,
        });

        Ok(ServerInfo::new(host, actual_addr))
    }

    fn close(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };

        if let Some(tx) = running.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let task = running.task;
        let outcome = running
            .runtime
            .block_on(async { tokio::time::timeout(SHUTDOWN_GRACE, task).await });

        match outcome {
            Ok(Ok(Ok(()))) => info!("[SPACE] {} server closed", self.name),
            Ok(Ok(Err(e))) => warn!("[SPACE] {} server error: {}", self.name, e),
            Ok(Err(e)) => warn!("[SPACE] {} server task failed: {}", self.name, e),
            Err(_) => warn!(
                "[SPACE] {} server did not drain within {:?}, dropping connections",
                self.name, SHUTDOWN_GRACE
            ),
        }

        running.runtime.shutdown_timeout(Duration::from_secs(1));
    }
}

impl Drop for RouterApp {
    fn drop(&mut self) {
        self.close();
    }
}
