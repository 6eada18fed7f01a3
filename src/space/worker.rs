//! Background worker running one space's server.
//!
//! The worker loads the space through its loader, picks a free port,
//! launches the server and reports back over a channel. It then blocks until
//! asked to stop (or until its handle is dropped), closes the server and
//! reports that too.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::SpaceError;
use super::host::HostContext;
use super::loader::{LoadContext, ServerInfo, SpaceLoader};
use crate::port::find_free_addr;

/// What the worker reports to its controller.
#[derive(Debug)]
pub enum WorkerEvent {
    /// The server is bound and serving.
    Serving(ServerInfo),
    /// Loading or launching failed; the worker has exited.
    Failed(SpaceError),
    /// The server was closed; the worker is exiting.
    Stopped,
}

/// Everything a worker needs to run a space.
pub struct WorkerSpec {
    /// Loader for the space's entry kind.
    pub loader: Arc<dyn SpaceLoader>,
    /// Load context for the space.
    pub ctx: LoadContext,
    /// Host settings.
    pub host: HostContext,
}

/// Controller side of a running worker.
pub struct WorkerHandle {
    name: String,
    stop_tx: Option<Sender<()>>,
    events: Receiver<WorkerEvent>,
    thread: Option<JoinHandle<()>>,
}

/// Starts a worker thread for `spec`.
pub fn spawn(spec: WorkerSpec) -> Result<WorkerHandle, SpaceError> {
    let name = spec.ctx.space_name.clone();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let (event_tx, event_rx) = mpsc::channel::<WorkerEvent>();

    let thread = thread::Builder::new()
        .name(format!("space-{}", spec.ctx.module_id))
        .spawn(move || run_worker(spec, &stop_rx, &event_tx))?;

    Ok(WorkerHandle {
        name,
        stop_tx: Some(stop_tx),
        events: event_rx,
        thread: Some(thread),
    })
}

fn run_worker(spec: WorkerSpec, stop_rx: &Receiver<()>, events: &Sender<WorkerEvent>) {
    let WorkerSpec { loader, ctx, host } = spec;
    let name = ctx.space_name.clone();
    info!("[WORKER] Starting {} ({})", name, ctx.module_id);

    host.hooks.unload_all_models();

    let mut app = match loader.load(ctx) {
        Ok(app) => app,
        Err(e) => {
            warn!("[WORKER] Failed to load {}: {}", name, e);
            let _ = events.send(WorkerEvent::Failed(e));
            return;
        }
    };

    let bind_host = host.bind_host().to_string();
    let launched = find_free_addr(Some(&bind_host), host.preferred_port)
        .and_then(|addr| app.launch(&bind_host, addr));

    let info = match launched {
        Ok(info) => info,
        Err(e) => {
            warn!("[WORKER] Failed to launch {}: {}", name, e);
            app.close();
            let _ = events.send(WorkerEvent::Failed(e));
            return;
        }
    };

    info!("[WORKER] {} running at {}", name, info.url);
    if events.send(WorkerEvent::Serving(info)).is_err() {
        debug!("[WORKER] Controller for {} went away", name);
    }

    // A dropped sender counts as a stop request.
    let _ = stop_rx.recv();

    app.close();
    drop(app);
    info!("[WORKER] {} stopped", name);
    let _ = events.send(WorkerEvent::Stopped);
}

impl WorkerHandle {
    /// Waits until the worker reports a serving server.
    ///
    /// # Errors
    /// Returns the worker's failure, or `LaunchTimeout` if nothing arrives
    /// within `timeout`.
    pub fn wait_serving(&mut self, timeout: Duration) -> Result<ServerInfo, SpaceError> {
        match self.events.recv_timeout(timeout) {
            Ok(WorkerEvent::Serving(info)) => Ok(info),
            Ok(WorkerEvent::Failed(e)) => {
                self.join();
                Err(e)
            }
            Ok(WorkerEvent::Stopped) => {
                self.join();
                Err(SpaceError::Launch(format!(
                    "{} stopped before serving",
                    self.name
                )))
            }
            Err(RecvTimeoutError::Timeout) => Err(SpaceError::LaunchTimeout(timeout.as_secs())),
            Err(RecvTimeoutError::Disconnected) => {
                self.join();
                Err(SpaceError::Launch(format!(
                    "Worker for {} exited unexpectedly",
                    self.name
                )))
            }
        }
    }

    /// Sends the stop request without waiting for it.
    pub fn request_stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Asks the worker to stop and waits until it has closed the server.
    ///
    /// On timeout the handle stays valid, so the caller can wait again.
    ///
    /// # Errors
    /// Returns `StopTimeout` if the worker does not finish within `timeout`.
    pub fn stop(&mut self, timeout: Duration) -> Result<(), SpaceError> {
        self.request_stop();

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(WorkerEvent::Stopped) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(other) => debug!("[WORKER] Ignoring {:?} while stopping", other),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(SpaceError::StopTimeout(timeout.as_secs()));
                }
            }
        }

        self.join();
        Ok(())
    }

    /// Returns true once the worker has reported `Stopped` or gone away.
    ///
    /// Never blocks.
    pub fn poll_stopped(&mut self) -> bool {
        loop {
            match self.events.try_recv() {
                Ok(WorkerEvent::Stopped) | Err(TryRecvError::Disconnected) => {
                    self.join();
                    return true;
                }
                Ok(other) => debug!("[WORKER] Ignoring {:?} while stopping", other),
                Err(TryRecvError::Empty) => return false,
            }
        }
    }

    /// Returns true if the worker thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("[WORKER] Worker for {} panicked", self.name);
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Dropping the sender stops a worker that is still serving; the
        // thread is left to finish on its own.
        self.stop_tx.take();
    }
}
