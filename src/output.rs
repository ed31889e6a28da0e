//! Writers for PWL noise data, the subcircuit library and schematic symbols.

use std::fs;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;

use crate::config::{NoiseConfig, SourceKind};
use crate::error::{NoiseError, Result};
use crate::layout::ProjectLayout;

/// Destination for synthesized noise sequences.
pub trait NoiseSink {
    /// Persist one source's samples, replacing anything written before.
    fn write_noise(&mut self, source: &str, times: &[f64], values: &[f64]) -> Result<()>;
}

/// Writes each source to `noise/noise_data_<name>.csv` as tab-separated
/// `time\tvalue` rows in scientific notation.
#[derive(Debug, Clone)]
pub struct NoiseFileWriter {
    layout: ProjectLayout,
}

impl NoiseFileWriter {
    pub fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }
}

impl NoiseSink for NoiseFileWriter {
    fn write_noise(&mut self, source: &str, times: &[f64], values: &[f64]) -> Result<()> {
        let path = self.layout.data_path(source);
        write_pwl(&path, times, values).map_err(|e| write_error(&path, e))
    }
}

fn write_error(path: &Path, err: csv::Error) -> NoiseError {
    NoiseError::Write {
        path: path.to_path_buf(),
        source: err.into(),
    }
}

/// Adjacent points of a fine grid must still print as distinct times.
fn fmt_time(t: f64) -> String {
    format!("{t:.9E}")
}

fn fmt_value(v: f64) -> String {
    format!("{v:.6E}")
}

fn write_pwl(path: &Path, times: &[f64], values: &[f64]) -> std::result::Result<(), csv::Error> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;

    for (t, v) in times.iter().zip(values) {
        wtr.write_record([fmt_time(*t), fmt_value(*v)])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Subcircuit library text for every configured source.
pub fn library_content(config: &NoiseConfig, layout: &ProjectLayout) -> String {
    let mut content = String::from("** NOISE_Library **\n\n");

    for (name, spec) in &config.sources {
        content.push_str(&format!(
            ".subckt {name} in out\n\n\
             ** NOISE SOURCE **\n\
             {prefix} out in PWL file={data}\n\n\
             .ends {name}\n\n",
            prefix = spec.source_type.spice_prefix(),
            data = layout.data_reference(name),
        ));
    }

    content
}

/// LTspice symbol for one source: a two-pin cell bound to its subcircuit.
pub fn symbol_content(name: &str, kind: SourceKind, layout: &ProjectLayout) -> String {
    format!(
        "Version 4\n\
         SymbolType CELL\n\
         LINE Normal 0 80 0 72\n\
         LINE Normal 0 0 0 8\n\
         CIRCLE Normal -32 8 32 72\n\
         TEXT 0 40 Center 0 {name}\n\
         SYMATTR Prefix X\n\
         SYMATTR Description {kind} noise source\n\
         SYMATTR SpiceModel {name}\n\
         SYMATTR ModelFile {library}\n\
         PIN 0 0 NONE 8\n\
         PINATTR PinName in\n\
         PINATTR SpiceOrder 1\n\
         PIN 0 80 NONE 8\n\
         PINATTR PinName out\n\
         PINATTR SpiceOrder 2\n",
        library = layout.library_reference(),
    )
}

fn write_text(path: PathBuf, content: &str) -> Result<PathBuf> {
    fs::write(&path, content).map_err(|source| NoiseError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Write the library file and return its path.
pub fn write_library(config: &NoiseConfig, layout: &ProjectLayout) -> Result<PathBuf> {
    write_text(layout.library_path(), &library_content(config, layout))
}

/// Write one symbol file per source and return their paths.
pub fn write_symbols(config: &NoiseConfig, layout: &ProjectLayout) -> Result<Vec<PathBuf>> {
    config
        .sources
        .iter()
        .map(|(name, spec)| {
            write_text(
                layout.symbol_path(name),
                &symbol_content(name, spec.source_type, layout),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::NoiseDescriptor;

    fn two_sources() -> NoiseConfig {
        NoiseConfig::default()
            .with_source(
                "vn",
                SourceKind::Voltage,
                NoiseDescriptor::Gaussian { mean: 0.0, std: 1.0 },
            )
            .with_source(
                "in",
                SourceKind::Current,
                NoiseDescriptor::Poisson { lambda: 2.0, scale: 1e-6 },
            )
    }

    #[test]
    fn test_library_uses_element_letter_per_kind() {
        let layout = ProjectLayout::new(".");
        let lib = library_content(&two_sources(), &layout);

        assert!(lib.starts_with("** NOISE_Library **\n\n"));
        assert!(lib.contains(".subckt vn in out\n"));
        assert!(lib.contains("V out in PWL file=noise/noise_data_vn.csv\n"));
        assert!(lib.contains("I out in PWL file=noise/noise_data_in.csv\n"));
        assert!(lib.contains(".ends in\n"));
    }

    #[test]
    fn test_symbol_references_library() {
        let layout = ProjectLayout::new(".");
        let asy = symbol_content("in", SourceKind::Current, &layout);

        assert!(asy.starts_with("Version 4\nSymbolType CELL\n"));
        assert!(asy.contains("SYMATTR Description current noise source\n"));
        assert!(asy.contains("SYMATTR SpiceModel in\n"));
        assert!(asy.contains("SYMATTR ModelFile noise/noise.lib\n"));
    }

    #[test]
    fn test_pwl_rows_are_tab_separated_scientific() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        write_pwl(&path, &[0.0, 0.5, 1.0], &[1e-7, -2.5e-3, 0.0]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(
            rows,
            [
                "0.000000000E0\t1.000000E-7",
                "5.000000000E-1\t-2.500000E-3",
                "1.000000000E0\t0.000000E0",
            ]
        );
    }

    #[test]
    fn test_fine_grid_times_stay_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fine.csv");
        let dt = 1.0 / 20_000_000.0;
        write_pwl(&path, &[1.0 - 2.0 * dt, 1.0 - dt, 1.0], &[0.0; 3]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let stamps: Vec<&str> = text.lines().map(|l| l.split('\t').next().unwrap()).collect();
        assert_eq!(stamps.len(), 3);
        assert!(stamps.windows(2).all(|w| w[0] != w[1]), "{stamps:?}");
        assert_eq!(stamps[2], "1.000000000E0");
    }

    #[test]
    fn test_missing_directory_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = NoiseFileWriter::new(ProjectLayout::new(dir.path()));

        let err = writer.write_noise("vn", &[0.0, 1.0], &[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, NoiseError::Write { .. }));
    }
}
