//! On-disk layout of a noise project.
//!
//! Everything lives under one root, normally the directory holding the
//! schematic:
//!
//! ```text
//! <root>/noise/noise_sources.yaml     configuration
//! <root>/noise/noise_data_<name>.csv  PWL data, one per source
//! <root>/noise/noise.lib              subcircuit library
//! <root>/<name>.asy                   schematic symbol, one per source
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{NoiseError, Result};

pub const NOISE_DIR: &str = "noise";
pub const CONFIG_FILE: &str = "noise_sources.yaml";
pub const LIBRARY_FILE: &str = "noise.lib";
pub const DATA_FILE_PREFIX: &str = "noise_data_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
    config: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config = root.join(NOISE_DIR).join(CONFIG_FILE);
        Self { root, config }
    }

    /// Use a configuration file outside the default location.
    pub fn with_config(mut self, config: impl Into<PathBuf>) -> Self {
        self.config = config.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config
    }

    pub fn noise_dir(&self) -> PathBuf {
        self.root.join(NOISE_DIR)
    }

    pub fn library_path(&self) -> PathBuf {
        self.noise_dir().join(LIBRARY_FILE)
    }

    pub fn data_path(&self, source: &str) -> PathBuf {
        self.root.join(self.data_reference(source))
    }

    pub fn symbol_path(&self, source: &str) -> PathBuf {
        self.root.join(format!("{source}.asy"))
    }

    /// Data file path as referenced from the library, relative to the root.
    pub fn data_reference(&self, source: &str) -> String {
        format!("{NOISE_DIR}/{DATA_FILE_PREFIX}{source}.csv")
    }

    /// Library path as referenced from symbols, relative to the root.
    pub fn library_reference(&self) -> String {
        format!("{NOISE_DIR}/{LIBRARY_FILE}")
    }

    /// Create the `noise/` directory. Only the explicit setup commands call
    /// this; the daemon expects it to exist already.
    pub fn ensure_noise_dir(&self) -> Result<PathBuf> {
        let dir = self.noise_dir();
        fs::create_dir_all(&dir).map_err(|source| NoiseError::Write {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_derive_from_root() {
        let layout = ProjectLayout::new("/proj");
        assert_eq!(layout.config_path(), Path::new("/proj/noise/noise_sources.yaml"));
        assert_eq!(layout.library_path(), PathBuf::from("/proj/noise/noise.lib"));
        assert_eq!(layout.data_path("vn1"), PathBuf::from("/proj/noise/noise_data_vn1.csv"));
        assert_eq!(layout.symbol_path("vn1"), PathBuf::from("/proj/vn1.asy"));
        assert_eq!(layout.data_reference("vn1"), "noise/noise_data_vn1.csv");
    }

    #[test]
    fn test_config_override() {
        let layout = ProjectLayout::new("/proj").with_config("/etc/noise.yaml");
        assert_eq!(layout.config_path(), Path::new("/etc/noise.yaml"));
        assert_eq!(layout.noise_dir(), PathBuf::from("/proj/noise"));
    }
}
