//! Noise configuration document
//!
//! YAML layout:
//!
//! ```yaml
//! entropy:
//!   T: 1.0
//!   STEPS: 1000
//! sources:
//!   vn1:
//!     source_type: voltage
//!     noise:
//!       type: gaussian
//!       mean: 0.0
//!       std: 1.0e-7
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;

use crate::error::{NoiseError, Result};
use crate::grid::SampleGrid;
use crate::synth::NoiseDescriptor;

/// Sample grid parameters as written in the file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Entropy {
    #[serde(rename = "T")]
    pub duration: f64,
    #[serde(rename = "STEPS")]
    pub steps: usize,
}

impl Default for Entropy {
    fn default() -> Self {
        Self {
            duration: 1.0,
            steps: 1000,
        }
    }
}

/// Whether a noise source drives a voltage or a current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Voltage,
    Current,
}

impl SourceKind {
    /// SPICE element letter
    pub fn spice_prefix(&self) -> char {
        match self {
            SourceKind::Voltage => 'V',
            SourceKind::Current => 'I',
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Voltage => write!(f, "voltage"),
            SourceKind::Current => write!(f, "current"),
        }
    }
}

/// A `noise` block as stored on disk: the `type` tag plus its parameters.
/// Values stay untyped until the block is converted to a [`NoiseDescriptor`]
/// at synthesis time, so one bad source does not prevent the document from
/// loading. Keys the noise type does not use are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

impl NoiseSpec {
    /// Resolve the stored block into a typed descriptor.
    pub fn descriptor(&self) -> std::result::Result<NoiseDescriptor, String> {
        match self.kind.to_ascii_lowercase().as_str() {
            "gaussian" | "normal" => Ok(NoiseDescriptor::Gaussian {
                mean: self.param("mean", &[])?,
                std: self.param("std", &["sigma"])?,
            }),
            "poisson" => Ok(NoiseDescriptor::Poisson {
                lambda: self.param("lambda", &[])?,
                scale: self.lookup("scale", &[])?.unwrap_or(1.0),
            }),
            "powerlaw" | "power_law" | "colored" => Ok(NoiseDescriptor::PowerLawGaussian {
                power_exponent: self.param("power_exponent", &["exponent", "beta"])?,
                scale: self.lookup("scale", &[])?.unwrap_or(1.0),
                min_frequency: self.lookup("min_frequency", &["fmin"])?.unwrap_or(0.0),
            }),
            other => Err(format!("unrecognized noise type '{other}'")),
        }
    }

    fn param(&self, key: &str, aliases: &[&str]) -> std::result::Result<f64, String> {
        self.lookup(key, aliases)?
            .ok_or_else(|| format!("{} noise is missing parameter '{key}'", self.kind))
    }

    /// First of `key` and its aliases present in the block, as a number.
    fn lookup(&self, key: &str, aliases: &[&str]) -> std::result::Result<Option<f64>, String> {
        let Some((name, value)) = std::iter::once(&key)
            .chain(aliases)
            .find_map(|k| self.params.get(*k).map(|v| (*k, v)))
        else {
            return Ok(None);
        };
        value
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("parameter '{name}' is not a number"))
    }
}

impl From<NoiseDescriptor> for NoiseSpec {
    fn from(descriptor: NoiseDescriptor) -> Self {
        let params = match descriptor {
            NoiseDescriptor::Gaussian { mean, std } => vec![("mean", mean), ("std", std)],
            NoiseDescriptor::Poisson { lambda, scale } => vec![("lambda", lambda), ("scale", scale)],
            NoiseDescriptor::PowerLawGaussian {
                power_exponent,
                scale,
                min_frequency,
            } => vec![
                ("power_exponent", power_exponent),
                ("scale", scale),
                ("min_frequency", min_frequency),
            ],
        };

        Self {
            kind: descriptor.type_name().to_string(),
            params: params
                .into_iter()
                .map(|(key, value)| (key.to_string(), Value::from(value)))
                .collect(),
        }
    }
}

/// One named noise source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    #[serde(default)]
    pub source_type: SourceKind,
    pub noise: NoiseSpec,
}

/// The whole configuration document. Sources are keyed by identifier, so
/// identifiers are unique and iterate in a stable order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NoiseConfig {
    pub entropy: Entropy,
    #[serde(default, deserialize_with = "unique_sources")]
    pub sources: BTreeMap<String, SourceSpec>,
}

fn unique_sources<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, SourceSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    struct UniqueSources;

    impl<'de> Visitor<'de> for UniqueSources {
        type Value = BTreeMap<String, SourceSpec>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping of uniquely named noise sources")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut sources = BTreeMap::new();
            while let Some((name, spec)) = map.next_entry::<String, SourceSpec>()? {
                if sources.contains_key(&name) {
                    return Err(de::Error::custom(format!("duplicate noise source '{name}'")));
                }
                sources.insert(name, spec);
            }
            Ok(sources)
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(BTreeMap::new())
        }

        fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(BTreeMap::new())
        }
    }

    deserializer.deserialize_map(UniqueSources)
}

impl NoiseConfig {
    /// Load and validate the document at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| NoiseError::config(path, e.to_string()))?;
        Self::parse(&content).map_err(|reason| NoiseError::config(path, reason))
    }

    /// Parse and validate a YAML document.
    pub fn parse(yaml: &str) -> std::result::Result<Self, String> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
        config.grid()?;
        Ok(config)
    }

    /// Write the document to `path`, replacing any previous content.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(|e| NoiseError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        fs::write(path, content).map_err(|source| NoiseError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Sample grid described by the `entropy` block.
    pub fn grid(&self) -> std::result::Result<SampleGrid, String> {
        SampleGrid::new(self.entropy.duration, self.entropy.steps)
    }

    /// A copy of this document with `name` inserted or replaced.
    pub fn with_source(&self, name: &str, kind: SourceKind, descriptor: NoiseDescriptor) -> Self {
        let mut next = self.clone();
        next.sources.insert(
            name.to_string(),
            SourceSpec {
                source_type: kind,
                noise: descriptor.into(),
            },
        );
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
entropy:
  T: 1.0e-3
  STEPS: 500
sources:
  vn1:
    source_type: voltage
    noise:
      type: gaussian
      mean: 0.0
      std: 1.0e-7
  in1:
    source_type: current
    noise:
      type: poisson
      lambda: 3.0
"#;

    #[test]
    fn test_parse_sample_document() {
        let config = NoiseConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.entropy.steps, 500);
        assert_eq!(config.sources.len(), 2);

        let names: Vec<&str> = config.sources.keys().map(String::as_str).collect();
        assert_eq!(names, ["in1", "vn1"]);

        let in1 = &config.sources["in1"];
        assert_eq!(in1.source_type, SourceKind::Current);
        assert_eq!(
            in1.noise.descriptor().unwrap(),
            NoiseDescriptor::Poisson { lambda: 3.0, scale: 1.0 }
        );
    }

    #[test]
    fn test_invalid_grid_fails_to_parse() {
        let yaml = "entropy:\n  T: 1.0\n  STEPS: 1\nsources: {}\n";
        assert!(NoiseConfig::parse(yaml).is_err());

        let yaml = "entropy:\n  T: -2.0\n  STEPS: 10\n";
        assert!(NoiseConfig::parse(yaml).is_err());
    }

    #[test]
    fn test_duplicate_source_names_are_rejected() {
        let yaml = r#"
entropy: { T: 1.0, STEPS: 10 }
sources:
  a: { noise: { type: gaussian, mean: 0.0, std: 1.0 } }
  a: { noise: { type: gaussian, mean: 1.0, std: 1.0 } }
"#;
        assert!(NoiseConfig::parse(yaml).is_err());
    }

    #[test]
    fn test_unknown_type_is_a_descriptor_error() {
        let yaml = r#"
entropy: { T: 1.0, STEPS: 10 }
sources:
  weird: { noise: { type: uniform, low: 0.0 } }
"#;
        let config = NoiseConfig::parse(yaml).unwrap();
        let err = config.sources["weird"].noise.descriptor().unwrap_err();
        assert!(err.contains("uniform"));
    }

    #[test]
    fn test_non_numeric_value_fails_only_its_source() {
        let yaml = r#"
entropy: { T: 1.0, STEPS: 10 }
sources:
  pink: { noise: { type: powerlaw, exponent: 1.0, note: flicker } }
  bad: { noise: { type: gaussian, mean: 0.0, std: wide } }
"#;
        let config = NoiseConfig::parse(yaml).unwrap();
        assert!(config.sources["pink"].noise.descriptor().is_ok());

        let err = config.sources["bad"].noise.descriptor().unwrap_err();
        assert!(err.contains("'std'"), "{err}");
    }

    #[test]
    fn test_power_law_aliases() {
        let yaml = r#"
entropy: { T: 1.0, STEPS: 10 }
sources:
  pink: { noise: { type: powerlaw, exponent: 1.0, scale: -2.0, fmin: 0.01 } }
"#;
        let config = NoiseConfig::parse(yaml).unwrap();
        assert_eq!(
            config.sources["pink"].noise.descriptor().unwrap(),
            NoiseDescriptor::PowerLawGaussian {
                power_exponent: 1.0,
                scale: -2.0,
                min_frequency: 0.01,
            }
        );
    }

    #[test]
    fn test_with_source_leaves_original_untouched() {
        let config = NoiseConfig::parse(SAMPLE).unwrap();
        let desc = NoiseDescriptor::PowerLawGaussian {
            power_exponent: 2.0,
            scale: 1e-3,
            min_frequency: 0.0,
        };
        let next = config.with_source("brown", SourceKind::Voltage, desc);

        assert_eq!(config.sources.len(), 2);
        assert_eq!(next.sources.len(), 3);
        assert_eq!(next.sources["brown"].noise.descriptor().unwrap(), desc);

        let reparsed = NoiseConfig::parse(&serde_yaml::to_string(&next).unwrap()).unwrap();
        assert_eq!(reparsed, next);
    }
}
