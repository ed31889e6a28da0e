//! Noise synthesizer
//!
//! Maps a noise descriptor and a sample grid to one value per grid point.
//! Gaussian and Poisson sources are independent draws; power-law sources are
//! a single correlated sequence shaped in the frequency domain.

use std::f64::consts::SQRT_2;

use rand::Rng;
use rand_distr::{Distribution, Normal, Poisson, StandardNormal};
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;
use thiserror::Error;

use crate::grid::SampleGrid;

/// Rejected noise parameters.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct InvalidParameter(pub String);

/// Statistical description of one noise source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseDescriptor {
    /// Independent normal draws
    Gaussian { mean: f64, std: f64 },
    /// Independent Poisson counts multiplied by `scale`
    Poisson { lambda: f64, scale: f64 },
    /// Gaussian noise with PSD proportional to `f^-power_exponent`.
    /// `min_frequency` is relative to the sample rate (0.5 is Nyquist).
    PowerLawGaussian {
        power_exponent: f64,
        scale: f64,
        min_frequency: f64,
    },
}

impl NoiseDescriptor {
    /// Name used for the `type` key in the configuration file
    pub fn type_name(&self) -> &'static str {
        match self {
            NoiseDescriptor::Gaussian { .. } => "gaussian",
            NoiseDescriptor::Poisson { .. } => "poisson",
            NoiseDescriptor::PowerLawGaussian { .. } => "powerlaw",
        }
    }

    /// Check every parameter against the range its distribution accepts.
    pub fn validate(&self) -> Result<(), InvalidParameter> {
        match *self {
            NoiseDescriptor::Gaussian { mean, std } => {
                ensure_finite("mean", mean)?;
                ensure_finite("std", std)?;
                if std < 0.0 {
                    return Err(InvalidParameter(format!("std must be >= 0, got {std}")));
                }
            }
            NoiseDescriptor::Poisson { lambda, scale } => {
                ensure_finite("lambda", lambda)?;
                ensure_finite("scale", scale)?;
                if lambda <= 0.0 {
                    return Err(InvalidParameter(format!("lambda must be > 0, got {lambda}")));
                }
            }
            NoiseDescriptor::PowerLawGaussian {
                power_exponent,
                scale,
                min_frequency,
            } => {
                ensure_finite("power_exponent", power_exponent)?;
                ensure_finite("scale", scale)?;
                ensure_finite("min_frequency", min_frequency)?;
                if !(0.0..=0.5).contains(&min_frequency) {
                    return Err(InvalidParameter(format!(
                        "min_frequency must be in [0, 0.5], got {min_frequency}"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn ensure_finite(name: &str, value: f64) -> Result<(), InvalidParameter> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InvalidParameter(format!("{name} must be finite, got {value}")))
    }
}

/// Synthesize one sample per grid point using the thread-local RNG.
pub fn synthesize(
    descriptor: &NoiseDescriptor,
    grid: &SampleGrid,
) -> Result<Vec<f64>, InvalidParameter> {
    synthesize_with(descriptor, grid, &mut rand::thread_rng())
}

/// Synthesize one sample per grid point from an explicit random source.
pub fn synthesize_with<R: Rng + ?Sized>(
    descriptor: &NoiseDescriptor,
    grid: &SampleGrid,
    rng: &mut R,
) -> Result<Vec<f64>, InvalidParameter> {
    descriptor.validate()?;
    let n = grid.steps();

    match *descriptor {
        NoiseDescriptor::Gaussian { mean, std } => {
            let dist = Normal::new(mean, std).map_err(|e| InvalidParameter(e.to_string()))?;
            Ok((0..n).map(|_| dist.sample(rng)).collect())
        }
        NoiseDescriptor::Poisson { lambda, scale } => {
            let dist: Poisson<f64> =
                Poisson::new(lambda).map_err(|e| InvalidParameter(e.to_string()))?;
            Ok((0..n).map(|_| scale * dist.sample(rng)).collect())
        }
        NoiseDescriptor::PowerLawGaussian {
            power_exponent,
            scale,
            min_frequency,
        } => {
            let noise = power_law_gaussian(power_exponent, min_frequency, n, rng);
            if noise.iter().any(|v| !v.is_finite()) {
                return Err(InvalidParameter(format!(
                    "power_exponent {power_exponent} produces a non-finite spectrum"
                )));
            }
            Ok(noise.into_iter().map(|v| scale * v).collect())
        }
    }
}

/// Unit-variance Gaussian noise with PSD `S(f) ~ f^-exponent`.
///
/// Random normal amplitudes for the real and imaginary part of every positive
/// frequency bin are weighted by `f^(-exponent/2)` and transformed back with
/// an inverse FFT. Bins below `max(min_frequency, 1/n)` are held at the
/// cutoff amplitude; a cutoff above the highest bin holds every bin there.
fn power_law_gaussian<R: Rng + ?Sized>(
    exponent: f64,
    min_frequency: f64,
    n: usize,
    rng: &mut R,
) -> Vec<f64> {
    let len = n as f64;
    let bins = n / 2 + 1;

    let mut freqs: Vec<f64> = (0..bins).map(|k| k as f64 / len).collect();
    // Odd n has no Nyquist bin, so the cutoff cannot exceed the top bin.
    let cutoff = min_frequency.max(1.0 / len).min(freqs[bins - 1]);
    let below = freqs.iter().take_while(|&&f| f < cutoff).count();
    if below > 0 {
        let floor = freqs[below];
        freqs[..below].fill(floor);
    }

    let amplitude: Vec<f64> = freqs.iter().map(|f| f.powf(-exponent / 2.0)).collect();

    // Standard deviation of the unnormalised output.
    let mut weights = amplitude[1..].to_vec();
    if let Some(last) = weights.last_mut() {
        *last *= (1 + n % 2) as f64 / 2.0;
    }
    let sigma = 2.0 * weights.iter().map(|w| w * w).sum::<f64>().sqrt() / len;

    let mut spectrum = vec![Complex64::new(0.0, 0.0); n];
    for (k, &a) in amplitude.iter().enumerate() {
        let re: f64 = StandardNormal.sample(rng);
        let im: f64 = StandardNormal.sample(rng);
        spectrum[k] = Complex64::new(re * a, im * a);
    }

    // DC and (for even n) Nyquist must be real.
    spectrum[0] = Complex64::new(spectrum[0].re * SQRT_2, 0.0);
    if n % 2 == 0 {
        let nyquist = bins - 1;
        spectrum[nyquist] = Complex64::new(spectrum[nyquist].re * SQRT_2, 0.0);
    }
    for k in bins..n {
        spectrum[k] = spectrum[n - k].conj();
    }

    let mut planner = FftPlanner::<f64>::new();
    let ifft = planner.plan_fft_inverse(n);
    ifft.process(&mut spectrum);

    spectrum.iter().map(|c| c.re / len / sigma).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn grid(steps: usize) -> SampleGrid {
        SampleGrid::new(1.0, steps).unwrap()
    }

    fn mean_and_std(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn test_gaussian_zero_std_is_constant() {
        let desc = NoiseDescriptor::Gaussian { mean: 2.5e-3, std: 0.0 };
        let values = synthesize(&desc, &grid(257)).unwrap();
        assert_eq!(values.len(), 257);
        assert!(values.iter().all(|&v| v == 2.5e-3));
    }

    #[test]
    fn test_gaussian_statistics() {
        let mut rng = StdRng::seed_from_u64(7);
        let desc = NoiseDescriptor::Gaussian { mean: 1.0, std: 0.5 };
        let values = synthesize_with(&desc, &grid(20_000), &mut rng).unwrap();
        let (mean, std) = mean_and_std(&values);
        assert!((mean - 1.0).abs() < 0.02);
        assert!((std - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_negative_std_is_rejected() {
        let desc = NoiseDescriptor::Gaussian { mean: 0.0, std: -1.0 };
        assert!(synthesize(&desc, &grid(10)).is_err());
    }

    #[test]
    fn test_poisson_rejects_non_positive_lambda() {
        for lambda in [0.0, -2.0, f64::NAN] {
            let desc = NoiseDescriptor::Poisson { lambda, scale: 1.0 };
            assert!(synthesize(&desc, &grid(10)).is_err());
        }
    }

    #[test]
    fn test_negative_scale_inverts_poisson() {
        let mut rng = StdRng::seed_from_u64(3);
        let desc = NoiseDescriptor::Poisson { lambda: 4.0, scale: -1.0 };
        let values = synthesize_with(&desc, &grid(500), &mut rng).unwrap();
        assert!(values.iter().all(|&v| v <= 0.0));
        assert!(values.iter().any(|&v| v < 0.0));
    }

    #[test]
    fn test_power_law_rejects_out_of_range_cutoff() {
        for min_frequency in [-0.1, 0.6, f64::INFINITY] {
            let desc = NoiseDescriptor::PowerLawGaussian {
                power_exponent: 1.0,
                scale: 1.0,
                min_frequency,
            };
            assert!(synthesize(&desc, &grid(64)).is_err());
        }
    }

    #[test]
    fn test_white_power_law_has_unit_variance() {
        let mut rng = StdRng::seed_from_u64(11);
        let desc = NoiseDescriptor::PowerLawGaussian {
            power_exponent: 0.0,
            scale: 1.0,
            min_frequency: 0.0,
        };
        let values = synthesize_with(&desc, &grid(16_384), &mut rng).unwrap();
        let (mean, std) = mean_and_std(&values);
        assert!(mean.abs() < 0.05);
        assert!((std - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_brown_noise_is_correlated() {
        let mut rng = StdRng::seed_from_u64(5);
        let desc = NoiseDescriptor::PowerLawGaussian {
            power_exponent: 2.0,
            scale: 1.0,
            min_frequency: 0.0,
        };
        let values = synthesize_with(&desc, &grid(4096), &mut rng).unwrap();
        let (mean, _) = mean_and_std(&values);
        let num: f64 = values.windows(2).map(|w| (w[0] - mean) * (w[1] - mean)).sum();
        let den: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        assert!(num / den > 0.9, "lag-1 autocorrelation {}", num / den);
    }

    #[test]
    fn test_power_law_cutoff_above_top_bin_is_finite() {
        let mut rng = StdRng::seed_from_u64(11);
        for (steps, min_frequency) in [(3, 0.5), (3, 0.4), (999, 0.5), (1001, 0.4996), (2, 0.5)] {
            let desc = NoiseDescriptor::PowerLawGaussian {
                power_exponent: 1.0,
                scale: 1.0,
                min_frequency,
            };
            let values = synthesize_with(&desc, &grid(steps), &mut rng).unwrap();
            assert_eq!(values.len(), steps);
            assert!(values.iter().all(|v| v.is_finite()), "steps {steps} fmin {min_frequency}");
        }
    }

    proptest! {
        #[test]
        fn poisson_samples_are_scaled_integers(
            lambda in 0.1f64..50.0,
            scale in prop_oneof![-5.0f64..-0.1, 0.1f64..5.0],
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let desc = NoiseDescriptor::Poisson { lambda, scale };
            let values = synthesize_with(&desc, &grid(64), &mut rng).unwrap();
            for v in values {
                let k = v / scale;
                prop_assert!(k >= -1e-9);
                prop_assert!((k - k.round()).abs() < 1e-9);
            }
        }

        #[test]
        fn power_law_length_matches_grid(
            steps in 2usize..700,
            power_exponent in -2.0f64..3.0,
            min_frequency in 0.0f64..=0.5,
            scale in -10.0f64..10.0,
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let desc = NoiseDescriptor::PowerLawGaussian { power_exponent, scale, min_frequency };
            let values = synthesize_with(&desc, &grid(steps), &mut rng).unwrap();
            prop_assert_eq!(values.len(), steps);
        }
    }
}
