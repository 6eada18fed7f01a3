//! Installation of a space's Python requirements.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{info, warn};

use super::SpaceError;

/// Interpreter used when none is configured.
pub const DEFAULT_PYTHON: &str = "python3";

/// Installs the packages listed in a requirements file.
pub trait PackageInstaller: Send + Sync {
    /// Installs everything listed in `requirements`.
    ///
    /// `desc` names the install in logs.
    fn install_requirements(&self, requirements: &Path, desc: &str) -> Result<(), SpaceError>;
}

/// Installs requirements with `python -m pip`.
#[derive(Debug, Clone)]
pub struct PipInstaller {
    python: String,
}

impl Default for PipInstaller {
    fn default() -> Self {
        Self::new(DEFAULT_PYTHON)
    }
}

impl PipInstaller {
    /// Creates an installer that runs pip through `python`.
    #[must_use]
    pub fn new(python: &str) -> Self {
        Self {
            python: python.to_string(),
        }
    }

    /// Builds the pip command for a requirements file.
    #[must_use]
    pub fn command(&self, requirements: &Path) -> Command {
        let mut cmd = Command::new(&self.python);
        cmd.args(["-m", "pip", "install", "-r"]);
        cmd.arg(requirements);
        cmd.stdin(Stdio::null());
        cmd
    }
}

impl PackageInstaller for PipInstaller {
    fn install_requirements(&self, requirements: &Path, desc: &str) -> Result<(), SpaceError> {
        info!("[PIP] Installing {}", desc);

        let output = self.command(requirements).output().map_err(|e| {
            SpaceError::Requirements(format!("Failed to run {}: {}", self.python, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("[PIP] Install of {} failed: {}", desc, stderr.trim());
            return Err(SpaceError::Requirements(format!(
                "pip exited with {} while installing {}",
                output.status, desc
            )));
        }

        info!("[PIP] Installed {}", desc);
        Ok(())
    }
}
