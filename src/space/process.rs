//! Built-in loader running a space as a child process.
//!
//! The child gets the bind address through `{host}`/`{port}` placeholders
//! and `SPACE_*` environment variables. It counts as serving once its
//! port accepts TCP connections.

use std::fs::{File, OpenOptions};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::SpaceError;
use super::loader::{LoadContext, ServerInfo, SpaceApp, SpaceLoader};
use crate::extension::manifest::ProcessConfig;
use crate::port::connectable;

/// File in the extension root receiving the child's output.
pub const PROCESS_LOG_FILE: &str = "space.log";

/// Interval between readiness probes.
const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Loader for `process` entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLoader;

impl SpaceLoader for ProcessLoader {
    fn load(&self, ctx: LoadContext) -> Result<Box<dyn SpaceApp>, SpaceError> {
        let Some(config) = ctx.process.clone() else {
            return Err(SpaceError::Load(format!(
                "{} has no [space.process] section",
                ctx.space_name
            )));
        };

        if config.command.trim().is_empty() {
            return Err(SpaceError::Load(format!(
                "{} has an empty process command",
                ctx.space_name
            )));
        }

        if !ctx.mirror_dir.is_dir() {
            return Err(SpaceError::NotInstalled(ctx.mirror_dir));
        }

        Ok(Box::new(ProcessApp {
            ctx,
            config,
            child: None,
        }))
    }
}

/// A space running as a child process.
pub struct ProcessApp {
    ctx: LoadContext,
    config: ProcessConfig,
    child: Option<Child>,
}

impl ProcessApp {
    /// Expands `{host}`, `{port}`, `{mirror_dir}` and `{root}` in `value`.
    fn expand(&self, value: &str, host: &str, port: u16) -> String {
        value
            .replace("{host}", host)
            .replace("{port}", &port.to_string())
            .replace("{mirror_dir}", &self.ctx.mirror_dir.to_string_lossy())
            .replace("{root}", &self.ctx.root.to_string_lossy())
    }

    fn build_command(&self, host: &str, port: u16) -> Result<Command, SpaceError> {
        let mut cmd = Command::new(self.expand(&self.config.command, host, port));
        cmd.args(self.config.args.iter().map(|a| self.expand(a, host, port)));

        let cwd = self
            .config
            .cwd
            .as_ref()
            .map(|c| PathBuf::from(self.expand(c, host, port)))
            .unwrap_or_else(|| self.ctx.mirror_dir.clone());
        cmd.current_dir(cwd);

        cmd.env("SPACE_HOST", host);
        cmd.env("SPACE_PORT", port.to_string());
        cmd.env("SPACE_MIRROR_DIR", &self.ctx.mirror_dir);
        cmd.env("SPACE_ROOT", &self.ctx.root);
        cmd.env("SPACE_MODULE_ID", &self.ctx.module_id);
        for (key, value) in &self.config.env {
            cmd.env(key, self.expand(value, host, port));
        }

        let log = open_log(&self.ctx.root.join(PROCESS_LOG_FILE))?;
        cmd.stdin(Stdio::null());
        cmd.stdout(log.try_clone()?);
        cmd.stderr(log);

        Ok(cmd)
    }

    /// Waits until `addr` accepts connections or the child exits.
    fn wait_until_serving(&mut self, addr: SocketAddr) -> Result<(), SpaceError> {
        let timeout = Duration::from_secs(self.config.ready_timeout_secs);
        let deadline = Instant::now() + timeout;
        let probe = connectable(addr);

        loop {
            if let Some(child) = self.child.as_mut() {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        self.child = None;
                        return Err(SpaceError::Launch(format!(
                            "{} exited before serving ({})",
                            self.ctx.space_name, status
                        )));
                    }
                    Ok(None) => {}
                    Err(e) => return Err(SpaceError::Launch(e.to_string())),
                }
            }

            if TcpStream::connect_timeout(&probe, PROBE_INTERVAL).is_ok() {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(SpaceError::Launch(format!(
                    "{} did not open port {} within {} seconds",
                    self.ctx.space_name,
                    addr.port(),
                    timeout.as_secs()
                )));
            }

            thread::sleep(PROBE_INTERVAL);
        }
    }
}

impl SpaceApp for ProcessApp {
    fn launch(&mut self, host: &str, addr: SocketAddr) -> Result<ServerInfo, SpaceError> {
        if self.child.is_some() {
            return Err(SpaceError::AlreadyRunning(self.ctx.space_name.clone()));
        }

        let mut cmd = self.build_command(host, addr.port())?;
        debug!("[SPACE] Spawning {:?}", cmd);

        let child = cmd
            .spawn()
            .map_err(|e| SpaceError::Launch(format!("Failed to start process: {}", e)))?;
        info!(
            "[SPACE] Started process {} for {}",
            child.id(),
            self.ctx.space_name
        );
        self.child = Some(child);

        if let Err(e) = self.wait_until_serving(addr) {
            self.close();
            return Err(e);
        }

        Ok(ServerInfo::new(host, addr))
    }

    fn close(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!("[SPACE] Failed to kill {}: {}", self.ctx.space_name, e);
            }
            let _ = child.wait();
            info!("[SPACE] Stopped process for {}", self.ctx.space_name);
        }
    }
}

impl Drop for ProcessApp {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_log(path: &Path) -> Result<File, SpaceError> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}
