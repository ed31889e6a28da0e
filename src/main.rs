use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use spice_noise::config::Entropy;
use spice_noise::daemon::ThreadSleep;
use spice_noise::launcher::{log_path_for, LtspiceLauncher, SimulatorLauncher};
use spice_noise::output::{write_library, write_symbols};
use spice_noise::{
    regenerate, DaemonPaths, NoiseConfig, NoiseDescriptor, NoiseFileWriter, ProjectLayout,
    RegenerationDaemon, SourceKind,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Noise sources for SPICE PWL injection")]
struct Cli {
    /// Project root holding the schematic and the noise/ directory
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Noise configuration file (default: <root>/noise/noise_sources.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every poll tick
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a starter configuration with no sources
    Init {
        /// Total simulated time T in seconds
        #[arg(long, default_value_t = 1.0)]
        duration: f64,

        /// Samples per source
        #[arg(long, default_value_t = 1000)]
        steps: usize,

        /// Overwrite an existing configuration
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Add or replace a noise source in the configuration
    Add(AddArgs),
    /// Write the library, symbols and one set of noise data
    Generate,
    /// Regenerate noise every time the simulator log or configuration changes
    Watch {
        /// Simulator log file (default: the circuit path with a .log extension)
        #[arg(long)]
        log: Option<PathBuf>,

        /// Circuit to open if the log does not exist yet
        #[arg(long)]
        circuit: Option<PathBuf>,

        /// Simulator executable used to open the circuit
        #[arg(long)]
        simulator: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct AddArgs {
    /// Source identifier, also the subcircuit and symbol name
    name: String,

    /// Create a current source instead of a voltage source
    #[arg(short = 'i', long, default_value_t = false)]
    current: bool,

    /// Gaussian noise
    #[arg(short, long, num_args = 2, value_names = ["MEAN", "STD"], allow_negative_numbers = true)]
    gaussian: Option<Vec<f64>>,

    /// Poisson noise scaled by SCALE
    #[arg(short, long, num_args = 2, value_names = ["LAMBDA", "SCALE"], allow_negative_numbers = true)]
    poisson: Option<Vec<f64>>,

    /// Power-law noise with PSD ~ 1/f^EXPONENT
    #[arg(long, num_args = 3, value_names = ["EXPONENT", "SCALE", "FMIN"], allow_negative_numbers = true)]
    power_law: Option<Vec<f64>>,
}

impl AddArgs {
    fn descriptor(&self) -> Result<NoiseDescriptor> {
        let descriptor = match (&self.gaussian, &self.poisson, &self.power_law) {
            (Some(g), None, None) => NoiseDescriptor::Gaussian {
                mean: g[0],
                std: g[1],
            },
            (None, Some(p), None) => NoiseDescriptor::Poisson {
                lambda: p[0],
                scale: p[1],
            },
            (None, None, Some(w)) => NoiseDescriptor::PowerLawGaussian {
                power_exponent: w[0],
                scale: w[1],
                min_frequency: w[2],
            },
            _ => bail!("choose exactly one of --gaussian, --poisson or --power-law"),
        };
        descriptor
            .validate()
            .with_context(|| format!("invalid parameters for '{}'", self.name))?;
        Ok(descriptor)
    }

    fn kind(&self) -> SourceKind {
        if self.current {
            SourceKind::Current
        } else {
            SourceKind::Voltage
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(error) = try_main(cli) {
        eprintln!("spice-noise failed: {error:#}");
        std::process::exit(1);
    }
}

fn try_main(cli: Cli) -> Result<()> {
    let mut layout = ProjectLayout::new(&cli.root);
    if let Some(config) = cli.config {
        layout = layout.with_config(config);
    }

    match cli.command {
        Command::Init {
            duration,
            steps,
            force,
        } => init(&layout, Entropy { duration, steps }, force),
        Command::Add(args) => add(&layout, &args),
        Command::Generate => generate(&layout),
        Command::Watch {
            log,
            circuit,
            simulator,
        } => watch(&layout, log, circuit, simulator),
    }
}

fn init(layout: &ProjectLayout, entropy: Entropy, force: bool) -> Result<()> {
    let path = layout.config_path();
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let config = NoiseConfig {
        entropy,
        ..Default::default()
    };
    config.grid().map_err(anyhow::Error::msg)?;

    layout.ensure_noise_dir()?;
    config.save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn add(layout: &ProjectLayout, args: &AddArgs) -> Result<()> {
    let descriptor = args.descriptor()?;
    let path = layout.config_path();
    let config = if path.exists() {
        NoiseConfig::load(path)?
    } else {
        layout.ensure_noise_dir()?;
        NoiseConfig::default()
    };

    let replaced = config.sources.contains_key(&args.name);
    config
        .with_source(&args.name, args.kind(), descriptor)
        .save(path)?;

    let verb = if replaced { "Replaced" } else { "Added" };
    println!("{verb} {} {} source '{}'", descriptor.type_name(), args.kind(), args.name);
    Ok(())
}

fn generate(layout: &ProjectLayout) -> Result<()> {
    let config = NoiseConfig::load(layout.config_path())?;
    layout.ensure_noise_dir()?;

    let library = write_library(&config, layout)?;
    let symbols = write_symbols(&config, layout)?;
    let written = regenerate(&config, &mut NoiseFileWriter::new(layout.clone()))?;

    println!("Library: {}", library.display());
    for symbol in &symbols {
        println!("Symbol: {}", symbol.display());
    }
    println!("Noise data written for {written} source(s)");
    Ok(())
}

fn watch(
    layout: &ProjectLayout,
    log: Option<PathBuf>,
    circuit: Option<PathBuf>,
    simulator: Option<PathBuf>,
) -> Result<()> {
    let log = match (log, &circuit) {
        (Some(log), _) => log,
        (None, Some(circuit)) => log_path_for(circuit),
        (None, None) => bail!("pass --log or --circuit so the simulator log can be located"),
    };

    let paths = DaemonPaths {
        log,
        config: layout.config_path().to_path_buf(),
        circuit,
    };
    let launcher = LtspiceLauncher::detect(simulator);
    let mut daemon =
        RegenerationDaemon::new(paths, NoiseFileWriter::new(layout.clone()), ThreadSleep);

    daemon.start(launcher.as_ref().map(|l| l as &dyn SimulatorLauncher))?;
    let passes = daemon.run()?;

    println!("Simulator closed after {passes} regeneration pass(es)");
    Ok(())
}
