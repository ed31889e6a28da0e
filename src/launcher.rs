//! Starting the external simulator when its log file is missing.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::info;

use crate::error::{NoiseError, Result};

/// Starts a simulator on a circuit file.
pub trait SimulatorLauncher {
    /// Human-readable name used in diagnostics.
    fn describe(&self) -> String;

    /// Spawn the simulator without waiting for it to exit.
    fn launch(&self, circuit: &Path) -> Result<()>;
}

/// How LTspice is started on the current platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LtspiceLauncher {
    /// Run the executable directly with `-Run <circuit>`.
    Executable(PathBuf),
    /// macOS: `open -a LTspice <circuit>`.
    MacOpen,
}

#[cfg(target_os = "windows")]
const WINDOWS_INSTALLS: &[&str] = &[
    r"C:\Program Files\ADI\LTspice\LTspice.exe",
    r"C:\Program Files\LTC\LTspiceXVII\XVIIx64.exe",
];

impl LtspiceLauncher {
    /// The launcher for this platform, if an automated launch path is known.
    /// An explicit executable always wins.
    pub fn detect(explicit: Option<PathBuf>) -> Option<Self> {
        if let Some(exe) = explicit {
            return Some(LtspiceLauncher::Executable(exe));
        }
        Self::platform_default()
    }

    #[cfg(target_os = "windows")]
    fn platform_default() -> Option<Self> {
        WINDOWS_INSTALLS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .map(LtspiceLauncher::Executable)
    }

    #[cfg(target_os = "macos")]
    fn platform_default() -> Option<Self> {
        Some(LtspiceLauncher::MacOpen)
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    fn platform_default() -> Option<Self> {
        None
    }

    fn command(&self, circuit: &Path) -> Command {
        match self {
            LtspiceLauncher::Executable(exe) => {
                let mut cmd = Command::new(exe);
                cmd.arg("-Run").arg(circuit);
                cmd
            }
            LtspiceLauncher::MacOpen => {
                let mut cmd = Command::new("open");
                cmd.arg("-a").arg("LTspice").arg(circuit);
                cmd
            }
        }
    }
}

impl SimulatorLauncher for LtspiceLauncher {
    fn describe(&self) -> String {
        match self {
            LtspiceLauncher::Executable(exe) => exe.display().to_string(),
            LtspiceLauncher::MacOpen => "open -a LTspice".to_string(),
        }
    }

    fn launch(&self, circuit: &Path) -> Result<()> {
        info!(simulator = %self.describe(), circuit = %circuit.display(), "launching simulator");
        self.command(circuit)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_child| ())
            .map_err(|source| NoiseError::Launch {
                program: self.describe(),
                source,
            })
    }
}

/// The simulator writes `<circuit>.log` next to the circuit.
pub fn log_path_for(circuit: &Path) -> PathBuf {
    circuit.with_extension("log")
}
