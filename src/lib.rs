//! spice-noise - noise sources for SPICE transient simulations
//!
//! Synthesizes Gaussian, Poisson and power-law (1/f) noise as PWL data files
//! and keeps them fresh: a polling daemon rewrites every source whenever the
//! simulator log or the noise configuration changes, so each simulation run
//! sees a new noise realisation.

pub mod config;
pub mod daemon;
pub mod error;
pub mod grid;
pub mod launcher;
pub mod layout;
pub mod output;
pub mod synth;

// Re-export main types
pub use config::{NoiseConfig, SourceKind};
pub use daemon::{regenerate, DaemonPaths, DaemonState, RegenerationDaemon, TickOutcome};
pub use error::NoiseError;
pub use grid::SampleGrid;
pub use layout::ProjectLayout;
pub use output::{NoiseFileWriter, NoiseSink};
pub use synth::{synthesize, NoiseDescriptor};
