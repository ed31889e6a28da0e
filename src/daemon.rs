//! Regeneration daemon
//!
//! Polls the simulator log and the noise configuration once per
//! [`POLL_INTERVAL`] and rewrites every noise source whenever either file's
//! modification time moves forward. The loop is single threaded; the only
//! suspension point is the pause between ticks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::config::NoiseConfig;
use crate::error::{NoiseError, Result};
use crate::launcher::SimulatorLauncher;
use crate::output::NoiseSink;
use crate::synth::synthesize;

/// Fixed delay between poll ticks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Ticks to wait for the log file to appear after launching the simulator.
pub const LAUNCH_WAIT_TICKS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Idle,
    Watching,
    Regenerating,
    Stopped,
}

/// What a single poll tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing changed since the last regeneration.
    Unchanged,
    /// A full pass rewrote this many sources.
    Regenerated(usize),
    /// A pass started but a source had invalid parameters. Sources written
    /// earlier in the pass keep their new data.
    Aborted { written: usize, reason: String },
    /// A watched file vanished; the simulator has closed.
    Stopped,
}

/// Blocks between poll ticks.
pub trait Pause {
    fn pause(&mut self, interval: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&mut self, interval: Duration) {
        thread::sleep(interval);
    }
}

/// Runs a closure instead of sleeping. Lets callers drive file changes
/// between ticks.
pub struct PauseWith<F>(pub F);

impl<F: FnMut(Duration)> Pause for PauseWith<F> {
    fn pause(&mut self, interval: Duration) {
        (self.0)(interval)
    }
}

/// Last-seen modification times of the watched files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watched {
    pub log: SystemTime,
    pub config: SystemTime,
}

impl Watched {
    fn advanced_by(&self, live: &Watched) -> bool {
        live.log > self.log || live.config > self.config
    }
}

/// Modification time of a watched file. A missing file is reported as
/// [`NoiseError::ResourceVanished`].
pub fn modified_time(path: &Path) -> Result<SystemTime> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => NoiseError::ResourceVanished(path.to_path_buf()),
            _ => NoiseError::Io {
                path: path.to_path_buf(),
                source,
            },
        })
}

/// Synthesize and persist every source of `config`, in identifier order.
///
/// Returns the number of sources written. Stops at the first failing source;
/// earlier writes are not rolled back.
pub fn regenerate<S: NoiseSink + ?Sized>(config: &NoiseConfig, sink: &mut S) -> Result<usize> {
    let grid = config.grid().map_err(NoiseError::InvalidGrid)?;
    let times = grid.times();

    let mut written = 0;
    for (name, spec) in &config.sources {
        let descriptor = spec
            .noise
            .descriptor()
            .map_err(|reason| NoiseError::parameter(name, reason))?;
        let values = synthesize(&descriptor, &grid)
            .map_err(|e| NoiseError::parameter(name, e.to_string()))?;
        sink.write_noise(name, &times, &values)?;
        written += 1;
    }

    Ok(written)
}

/// Locations the daemon watches.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    pub log: PathBuf,
    pub config: PathBuf,
    /// Circuit to open when the log is missing at startup.
    pub circuit: Option<PathBuf>,
}

pub struct RegenerationDaemon<S, P> {
    paths: DaemonPaths,
    sink: S,
    pause: P,
    state: DaemonState,
    watched: Option<Watched>,
    passes: usize,
}

impl<S: NoiseSink, P: Pause> RegenerationDaemon<S, P> {
    pub fn new(paths: DaemonPaths, sink: S, pause: P) -> Self {
        Self {
            paths,
            sink,
            pause,
            state: DaemonState::Idle,
            watched: None,
            passes: 0,
        }
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Number of regeneration passes started so far.
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn watched(&self) -> Option<Watched> {
        self.watched
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Resolve the log file, capture baseline timestamps and enter
    /// [`DaemonState::Watching`].
    ///
    /// A missing log is recovered by launching the simulator when both a
    /// launcher and a circuit are available; otherwise it is fatal.
    pub fn start(&mut self, launcher: Option<&dyn SimulatorLauncher>) -> Result<()> {
        if !self.paths.log.exists() {
            self.recover_missing_log(launcher)?;
        }

        // Validate the document once before watching it.
        NoiseConfig::load(&self.paths.config)?;

        let watched = Watched {
            log: modified_time(&self.paths.log).map_err(|e| self.vanished_to_missing(e))?,
            config: modified_time(&self.paths.config)
                .map_err(|_| NoiseError::config(&self.paths.config, "file disappeared"))?,
        };

        info!(
            log = %self.paths.log.display(),
            config = %self.paths.config.display(),
            "watching for changes"
        );
        self.watched = Some(watched);
        self.state = DaemonState::Watching;
        Ok(())
    }

    fn recover_missing_log(&mut self, launcher: Option<&dyn SimulatorLauncher>) -> Result<()> {
        let (launcher, circuit) = match (launcher, self.paths.circuit.clone()) {
            (Some(launcher), Some(circuit)) => (launcher, circuit),
            (_, None) => {
                return Err(self.missing_log(
                    "run the simulation once so the log exists, or pass --circuit to launch the simulator",
                ))
            }
            (None, Some(_)) => {
                return Err(self.missing_log(
                    "no automated launch path on this platform; start the simulator manually or pass --simulator",
                ))
            }
        };

        warn!(log = %self.paths.log.display(), "simulator log missing, launching simulator");
        launcher.launch(&circuit)?;

        for _ in 0..LAUNCH_WAIT_TICKS {
            self.pause.pause(POLL_INTERVAL);
            if self.paths.log.exists() {
                return Ok(());
            }
        }

        Err(self.missing_log(&format!(
            "{} was launched but did not produce a log within {} s",
            launcher.describe(),
            LAUNCH_WAIT_TICKS as u64 * POLL_INTERVAL.as_secs()
        )))
    }

    fn missing_log(&self, hint: &str) -> NoiseError {
        NoiseError::MissingLogFile {
            path: self.paths.log.clone(),
            hint: hint.to_string(),
        }
    }

    fn vanished_to_missing(&self, err: NoiseError) -> NoiseError {
        match err {
            NoiseError::ResourceVanished(_) => self.missing_log("log disappeared during startup"),
            other => other,
        }
    }

    /// One poll step without the pause.
    ///
    /// Both watched timestamps are updated before a pass starts, so a change
    /// made while the pass runs is picked up by the next tick.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        let Some(last) = self.watched else {
            return Err(NoiseError::NotStarted);
        };
        if self.state == DaemonState::Stopped {
            return Ok(TickOutcome::Stopped);
        }

        let live = match self.live_timestamps() {
            Ok(live) => live,
            Err(NoiseError::ResourceVanished(path)) => {
                info!(path = %path.display(), "watched file vanished, simulator closed");
                self.state = DaemonState::Stopped;
                return Ok(TickOutcome::Stopped);
            }
            Err(e) => return Err(e),
        };

        let config = NoiseConfig::load(&self.paths.config)?;

        if !last.advanced_by(&live) {
            debug!("no change");
            return Ok(TickOutcome::Unchanged);
        }

        self.watched = Some(live);
        self.state = DaemonState::Regenerating;
        self.passes += 1;
        let sources = config.sources.len();
        info!(pass = self.passes, sources, "regenerating noise");

        let outcome = match regenerate(&config, &mut self.sink) {
            Ok(written) => TickOutcome::Regenerated(written),
            Err(e) if e.is_pass_local() => {
                warn!(error = %e, "regeneration pass aborted");
                TickOutcome::Aborted {
                    written: self.sink_progress(&config, &e),
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                self.state = DaemonState::Watching;
                return Err(e);
            }
        };

        self.state = DaemonState::Watching;
        Ok(outcome)
    }

    /// Sources written before the one named by a parameter error.
    fn sink_progress(&self, config: &NoiseConfig, err: &NoiseError) -> usize {
        match err {
            NoiseError::Parameter { source_name, .. } => config
                .sources
                .keys()
                .take_while(|name| *name != source_name)
                .count(),
            _ => 0,
        }
    }

    fn live_timestamps(&self) -> Result<Watched> {
        Ok(Watched {
            config: modified_time(&self.paths.config)?,
            log: modified_time(&self.paths.log)?,
        })
    }

    /// Poll until a watched file vanishes. Returns the number of
    /// regeneration passes run; fatal errors end the loop early.
    pub fn run(&mut self) -> Result<usize> {
        loop {
            self.pause.pause(POLL_INTERVAL);
            if self.tick()? == TickOutcome::Stopped {
                return Ok(self.passes);
            }
        }
    }
}
