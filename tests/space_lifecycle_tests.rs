//! Integration tests for the space lifecycle.
//!
//! These tests drive a `SpaceController` end to end against a local mirror:
//! - install / uninstall of the mirror directory
//! - launch and terminate of the embedded server
//! - mutual exclusion between lifecycle operations
//! - loader failures and launch timeouts
//! - servers that are slow to shut down

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use spacehost::space::cleanup::{FsRemover, Remover};
use spacehost::space::requirements::PackageInstaller;
use spacehost::space::{
    HostContext, HostHooks, LoadContext, LocalMirror, RepoCoordinates, RouterApp, ServerInfo,
    SpaceApp, SpaceCatalog, SpaceController, SpaceError, SpaceIdentity, SpaceLabel,
    SpaceServices,
};

const REPO_ID: &str = "demo/site";
const INDEX_HTML: &str = "<h1>hello space</h1>";

// ============================================================================
// Fixtures
// ============================================================================

/// Records every requirements install instead of running pip.
#[derive(Default)]
struct RecordingInstaller {
    calls: Mutex<Vec<(PathBuf, String)>>,
}

impl PackageInstaller for RecordingInstaller {
    fn install_requirements(&self, requirements: &Path, desc: &str) -> Result<(), SpaceError> {
        self.calls
            .lock()
            .unwrap()
            .push((requirements.to_path_buf(), desc.to_string()));
        Ok(())
    }
}

/// Counts model unload requests and records opened URLs.
#[derive(Default)]
struct CountingHooks {
    unloads: AtomicUsize,
    opened: Mutex<Vec<String>>,
}

impl HostHooks for CountingHooks {
    fn unload_all_models(&self) {
        self.unloads.fetch_add(1, Ordering::SeqCst);
    }

    fn open_in_browser(&self, url: &str) {
        self.opened.lock().unwrap().push(url.to_string());
    }
}

/// Refuses to delete files with a given name.
struct PinnedRemover(&'static str);

impl Remover for PinnedRemover {
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        if path.file_name().is_some_and(|n| n == self.0) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "pinned"));
        }
        FsRemover.remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        FsRemover.remove_dir(path)
    }
}

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    installer: Arc<RecordingInstaller>,
    services: SpaceServices,
}

/// Builds an extension root and a local mirror holding `demo/site`.
fn fixture(port: u16) -> Fixture {
    let dir = TempDir::new().expect("temp dir");
    let mirror = dir.path().join("mirror");
    let repo = mirror.join(REPO_ID);
    fs::create_dir_all(repo.join("assets")).expect("mkdir repo");
    fs::write(repo.join("index.html"), INDEX_HTML).expect("write index");
    fs::write(repo.join("assets").join("app.js"), "console.log(1);").expect("write js");

    let root = dir.path().join("extensions").join("demo");
    fs::create_dir_all(&root).expect("mkdir root");

    let installer = Arc::new(RecordingInstaller::default());
    let services = SpaceServices {
        host: host(port, Duration::from_secs(10)),
        catalog: Arc::new(SpaceCatalog::with_defaults()),
        source: Arc::new(LocalMirror::new(mirror)),
        installer: installer.clone(),
        remover: Arc::new(FsRemover),
    };

    Fixture {
        _dir: dir,
        root,
        installer,
        services,
    }
}

fn host(port: u16, launch_timeout: Duration) -> HostContext {
    HostContext {
        preferred_port: Some(port),
        launch_timeout,
        stop_timeout: Duration::from_secs(10),
        ..HostContext::default()
    }
}

fn controller(fx: &Fixture) -> SpaceController {
    let identity =
        SpaceIdentity::new(&fx.root, "Demo").with_repo(RepoCoordinates::space(REPO_ID));
    SpaceController::new(identity, fx.services.clone())
}

/// Minimal HTTP GET returning the raw response.
fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout");
    write!(
        stream,
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        path
    )
    .expect("write request");
    let mut response = String::new();
    stream.read_to_string(&mut response).expect("read response");
    response
}

/// Calls `reap` until the stopping worker is released, for up to 10 seconds.
fn wait_reaped(space: &mut SpaceController) -> bool {
    for _ in 0..100 {
        if space.reap() {
            return true;
        }
        thread::sleep(Duration::from_millis(100));
    }
    false
}

/// Loader serving a fixed body, optionally after a delay.
fn router_loader(
    delay: Duration,
) -> impl Fn(LoadContext) -> Result<Box<dyn SpaceApp>, SpaceError> + Send + Sync {
    move |ctx: LoadContext| {
        thread::sleep(delay);
        let router = Router::new().route("/", get(|| async { "custom" }));
        Ok(Box::new(RouterApp::new(&ctx.space_name, router)) as Box<dyn SpaceApp>)
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

mod lifecycle_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_initial_state_not_installed() {
        let fx = fixture(22_000);
        let space = controller(&fx);

        let view = space.refresh();
        assert_eq!(
            view.label,
            SpaceLabel::NotInstalled {
                title: "Demo".to_string()
            }
        );
        assert!(view.install);
        assert!(!view.uninstall && !view.launch && !view.terminate);
    }

    #[test]
    fn test_full_lifecycle() {
        let fx = fixture(22_100);
        let mut space = controller(&fx);

        // Install
        let view = space.install().expect("install");
        assert!(matches!(view.label, SpaceLabel::Ready { .. }));
        assert!(view.launch && view.uninstall);
        assert!(space.mirror_dir().join("index.html").exists());
        assert!(space.mirror_dir().join("assets").join("app.js").exists());

        // Launch
        let view = space.run().expect("run");
        assert!(view.terminate);
        assert!(!view.install && !view.uninstall && !view.launch);
        let server = space.server().cloned().expect("server info");
        assert!(server.addr.port() >= 22_100);
        assert_eq!(view.label.url(), Some(server.url.as_str()));
        assert!(server.url.starts_with("http://127.0.0.1:"));

        let response = http_get(server.addr, "/index.html");
        assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
        assert!(response.contains(INDEX_HTML));

        // Terminate
        let view = space.terminate().expect("terminate");
        assert!(matches!(view.label, SpaceLabel::Ready { .. }));
        assert!(!space.is_running());
        assert!(space.server().is_none());
        assert!(TcpStream::connect(server.addr).is_err());

        // Uninstall
        let view = space.uninstall().expect("uninstall");
        assert!(view.install);
        assert!(!space.mirror_dir().exists());
    }

    #[test]
    fn test_install_twice_is_idempotent() {
        let fx = fixture(22_200);
        let mut space = controller(&fx);

        space.install().expect("first install");
        fs::write(space.mirror_dir().join("index.html"), "stale").expect("overwrite");

        let view = space.install().expect("second install");
        assert!(matches!(view.label, SpaceLabel::Ready { .. }));
        assert_eq!(
            fs::read_to_string(space.mirror_dir().join("index.html")).expect("read"),
            INDEX_HTML
        );
    }

    #[test]
    fn test_install_without_repo_only_creates_mirror() {
        let fx = fixture(22_300);
        let mut space = SpaceController::new(
            SpaceIdentity::new(&fx.root, "Local"),
            fx.services.clone(),
        );

        let view = space.install().expect("install");
        assert!(view.launch);
        assert!(space.mirror_dir().is_dir());
        assert_eq!(fs::read_dir(space.mirror_dir()).expect("read").count(), 0);
    }

    #[test]
    fn test_uninstall_when_not_installed_succeeds() {
        let fx = fixture(22_400);
        let mut space = controller(&fx);

        let view = space.uninstall().expect("uninstall");
        assert!(view.install);
    }

    #[test]
    fn test_dropping_running_controller_stops_server() {
        let fx = fixture(22_500);
        let mut space = controller(&fx);
        space.install().expect("install");
        space.run().expect("run");
        let addr = space.server().expect("server").addr;

        drop(space);

        assert!(TcpStream::connect(addr).is_err());
    }

    #[test]
    fn test_host_hooks_run_before_launch() {
        let mut fx = fixture(22_600);
        let hooks = Arc::new(CountingHooks::default());
        fx.services.host = fx.services.host.clone().with_hooks(hooks.clone());
        let mut space = controller(&fx);

        space.install().expect("install");
        space.run().expect("run");
        assert_eq!(hooks.unloads.load(Ordering::SeqCst), 1);
        assert!(hooks.opened.lock().unwrap().is_empty());
        space.terminate().expect("terminate");
    }

    #[test]
    fn test_open_browser_receives_server_url() {
        let mut fx = fixture(24_300);
        let hooks = Arc::new(CountingHooks::default());
        fx.services.host = HostContext {
            open_browser: true,
            ..fx.services.host.clone().with_hooks(hooks.clone())
        };
        let mut space = controller(&fx);

        space.install().expect("install");
        space.run().expect("run");

        let url = space.server().expect("server").url.clone();
        assert_eq!(*hooks.opened.lock().unwrap(), vec![url]);
        space.terminate().expect("terminate");
    }

    #[test]
    fn test_uninstall_continues_past_undeletable_entry() {
        let mut fx = fixture(24_400);
        fx.services.remover = Arc::new(PinnedRemover("app.js"));
        let mut space = controller(&fx);
        space.install().expect("install");
        let mirror = space.mirror_dir().to_path_buf();

        let view = space.uninstall().expect("uninstall");

        assert!(!mirror.join("index.html").exists());
        assert!(mirror.join("assets").join("app.js").exists());
        assert!(space.is_installed());
        assert!(matches!(view.label, SpaceLabel::Ready { .. }));
        assert!(view.uninstall);
    }
}

// ============================================================================
// Requirements
// ============================================================================

mod requirements_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_requirements_installed_after_download() {
        let fx = fixture(22_700);
        fs::write(fx.root.join("requirements.txt"), "numpy\n").expect("write requirements");
        let mut space = controller(&fx);

        space.install().expect("install");

        let calls = fx.installer.calls.lock().expect("lock");
        assert_eq!(calls.len(), 1);
        let (path, desc) = &calls[0];
        assert!(path.is_absolute());
        assert!(path.ends_with("requirements.txt"));
        assert_eq!(desc, "space requirements for [Demo]");
    }

    #[test]
    fn test_no_requirements_file_skips_installer() {
        let fx = fixture(22_800);
        let mut space = controller(&fx);

        space.install().expect("install");

        assert!(fx.installer.calls.lock().expect("lock").is_empty());
    }

    #[test]
    fn test_failed_download_leaves_mirror_dir() {
        let fx = fixture(22_900);
        let identity = SpaceIdentity::new(&fx.root, "Missing")
            .with_repo(RepoCoordinates::space("nobody/nothing"));
        let mut space = SpaceController::new(identity, fx.services.clone());

        let result = space.install();

        assert!(matches!(result, Err(SpaceError::Download(_))));
        assert!(space.is_installed());
        assert!(fx.installer.calls.lock().expect("lock").is_empty());
    }
}

// ============================================================================
// Mutual exclusion
// ============================================================================

mod exclusion_tests {
    use super::*;

    #[test]
    fn test_run_requires_install() {
        let fx = fixture(23_000);
        let mut space = controller(&fx);

        assert!(matches!(space.run(), Err(SpaceError::NotInstalled(_))));
        assert!(!space.is_running());
    }

    #[test]
    fn test_terminate_requires_running() {
        let fx = fixture(23_100);
        let mut space = controller(&fx);
        space.install().expect("install");

        assert!(matches!(space.terminate(), Err(SpaceError::NotRunning(_))));
    }

    #[test]
    fn test_running_space_rejects_other_operations() {
        let fx = fixture(23_200);
        let mut space = controller(&fx);
        space.install().expect("install");
        space.run().expect("run");

        assert!(matches!(space.run(), Err(SpaceError::AlreadyRunning(_))));
        assert!(matches!(space.install(), Err(SpaceError::Busy(_))));
        assert!(matches!(space.uninstall(), Err(SpaceError::Busy(_))));
        assert!(space.mirror_dir().exists());
        assert!(space.is_running());

        space.terminate().expect("terminate");
    }

    #[test]
    fn test_relaunch_after_terminate() {
        let fx = fixture(23_300);
        let mut space = controller(&fx);
        space.install().expect("install");

        space.run().expect("first run");
        space.terminate().expect("first terminate");
        let view = space.run().expect("second run");

        assert!(view.terminate);
        let addr = space.server().expect("server").addr;
        assert!(http_get(addr, "/").contains(INDEX_HTML));
        space.terminate().expect("second terminate");
    }
}

// ============================================================================
// Loader failures
// ============================================================================

mod loader_tests {
    use super::*;

    fn with_entry(fx: &mut Fixture, entry: &str, catalog: SpaceCatalog) -> SpaceController {
        fx.services.catalog = Arc::new(catalog);
        let identity = SpaceIdentity::new(&fx.root, "Custom").with_entry(entry);
        SpaceController::new(identity, fx.services.clone())
    }

    #[test]
    fn test_unknown_entry_kind() {
        let mut fx = fixture(23_400);
        let mut space = with_entry(&mut fx, "gradio", SpaceCatalog::with_defaults());
        space.install().expect("install");

        assert!(matches!(space.run(), Err(SpaceError::UnknownEntry(kind)) if kind == "gradio"));
        assert!(!space.is_running());
    }

    #[test]
    fn test_failing_loader_reports_error() {
        let mut fx = fixture(23_500);
        let mut catalog = SpaceCatalog::with_defaults();
        catalog.register(
            "broken",
            Arc::new(|_ctx: LoadContext| -> Result<Box<dyn SpaceApp>, SpaceError> {
                Err(SpaceError::Load("no entry point".to_string()))
            }),
        );
        let mut space = with_entry(&mut fx, "broken", catalog);
        space.install().expect("install");

        let result = space.run();

        assert!(matches!(result, Err(SpaceError::Load(_))));
        assert!(!space.is_running());
        assert!(space.refresh().launch);
    }

    #[test]
    fn test_custom_loader_serves() {
        let mut fx = fixture(23_600);
        let mut catalog = SpaceCatalog::new();
        catalog.register("custom", Arc::new(router_loader(Duration::ZERO)));
        let mut space = with_entry(&mut fx, "custom", catalog);
        space.install().expect("install");

        space.run().expect("run");
        let addr = space.server().expect("server").addr;
        assert!(http_get(addr, "/").ends_with("custom"));
        space.terminate().expect("terminate");
    }

    #[test]
    fn test_slow_loader_times_out() {
        let mut fx = fixture(23_700);
        fx.services.host = host(23_700, Duration::from_secs(1));
        let mut catalog = SpaceCatalog::new();
        catalog.register("slow", Arc::new(router_loader(Duration::from_secs(3))));
        let mut space = with_entry(&mut fx, "slow", catalog);
        space.install().expect("install");

        let result = space.run();

        assert!(matches!(result, Err(SpaceError::LaunchTimeout(1))));
        assert!(!space.is_running());
        assert!(space.server().is_none());

        // The worker is still loading and may yet bind a server.
        assert!(space.is_stopping());
        assert!(!space.refresh().launch);
        assert!(matches!(space.run(), Err(SpaceError::Busy(_))));

        assert!(wait_reaped(&mut space));
        assert!(!space.is_active());
        assert!(space.refresh().launch);
    }

    #[test]
    fn test_unregistered_kind_is_unknown() {
        let mut fx = fixture(23_800);
        let mut catalog = SpaceCatalog::with_defaults();
        assert!(catalog.unregister("static").is_some());
        let mut space = with_entry(&mut fx, "static", catalog);
        space.install().expect("install");

        assert!(matches!(space.run(), Err(SpaceError::UnknownEntry(_))));
    }
}

// ============================================================================
// Slow shutdown
// ============================================================================

mod stopping_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Router app whose close blocks before shutting the server down.
    struct SlowClose {
        inner: RouterApp,
        delay: Duration,
    }

    impl SpaceApp for SlowClose {
        fn launch(&mut self, host: &str, addr: SocketAddr) -> Result<ServerInfo, SpaceError> {
            self.inner.launch(host, addr)
        }

        fn close(&mut self) {
            thread::sleep(self.delay);
            self.inner.close();
        }
    }

    /// Builds a space whose server takes `delay` to close, with a 1s stop timeout.
    fn slow_close_space(fx: &mut Fixture, port: u16, delay: Duration) -> SpaceController {
        fx.services.host = HostContext {
            stop_timeout: Duration::from_secs(1),
            ..host(port, Duration::from_secs(10))
        };
        let mut catalog = SpaceCatalog::new();
        catalog.register(
            "slow-close",
            Arc::new(
                move |ctx: LoadContext| -> Result<Box<dyn SpaceApp>, SpaceError> {
                    let router = Router::new().route("/", get(|| async { "custom" }));
                    Ok(Box::new(SlowClose {
                        inner: RouterApp::new(&ctx.space_name, router),
                        delay,
                    }))
                },
            ),
        );
        fx.services.catalog = Arc::new(catalog);
        let identity = SpaceIdentity::new(&fx.root, "Slow").with_entry("slow-close");
        SpaceController::new(identity, fx.services.clone())
    }

    #[test]
    fn test_stop_timeout_keeps_space_stopping() {
        let mut fx = fixture(24_000);
        let mut space = slow_close_space(&mut fx, 24_000, Duration::from_secs(3));
        space.install().expect("install");
        space.run().expect("run");
        let addr = space.server().expect("server").addr;

        let result = space.terminate();

        assert!(matches!(result, Err(SpaceError::StopTimeout(1))));
        assert!(!space.is_running());
        assert!(space.is_stopping());
        assert_eq!(space.server().map(|s| s.addr), Some(addr));
        assert!(TcpStream::connect(addr).is_ok());

        let view = space.refresh();
        assert!(!view.install && !view.uninstall && !view.launch);
        assert!(view.terminate);

        assert!(matches!(space.run(), Err(SpaceError::Busy(_))));
        assert!(matches!(space.uninstall(), Err(SpaceError::Busy(_))));
        assert!(matches!(space.install(), Err(SpaceError::Busy(_))));
        assert!(space.mirror_dir().exists());

        // Terminate again waits on the same worker.
        let mut retried = space.terminate();
        for _ in 0..10 {
            if retried.is_ok() {
                break;
            }
            assert!(matches!(retried, Err(SpaceError::StopTimeout(1))));
            retried = space.terminate();
        }

        let view = retried.expect("terminate after retry");
        assert!(view.launch && view.uninstall);
        assert!(!space.is_active());
        assert!(space.server().is_none());
        assert!(TcpStream::connect(addr).is_err());
    }

    #[test]
    fn test_stopping_space_is_released_once_worker_exits() {
        let mut fx = fixture(24_100);
        let mut space = slow_close_space(&mut fx, 24_100, Duration::from_secs(2));
        space.install().expect("install");
        space.run().expect("run");
        let addr = space.server().expect("server").addr;

        assert!(matches!(space.terminate(), Err(SpaceError::StopTimeout(1))));
        assert!(!space.reap());

        assert!(wait_reaped(&mut space));
        assert!(!space.is_active());
        assert!(TcpStream::connect(addr).is_err());

        let view = space.uninstall().expect("uninstall");
        assert!(view.install);
        assert!(matches!(space.terminate(), Err(SpaceError::NotRunning(_))));
    }

    #[test]
    fn test_terminate_on_idle_space_is_not_running() {
        let mut fx = fixture(24_200);
        let mut space = slow_close_space(&mut fx, 24_200, Duration::ZERO);
        space.install().expect("install");

        assert!(matches!(space.terminate(), Err(SpaceError::NotRunning(_))));
        assert!(!space.is_stopping());
    }
}
