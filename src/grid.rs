//! Sample-time grid
//!
//! Evenly spaced sample instants over `[0, T]`, shared by every noise source
//! of one configuration.

/// Sample grid derived from the `entropy` block of the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleGrid {
    duration: f64,
    steps: usize,
}

impl SampleGrid {
    /// Create a grid, rejecting non-finite or non-positive durations and
    /// fewer than two samples.
    pub fn new(duration: f64, steps: usize) -> Result<Self, String> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(format!("entropy.T must be a finite value > 0, got {duration}"));
        }
        if steps < 2 {
            return Err(format!("entropy.STEPS must be at least 2, got {steps}"));
        }
        Ok(Self { duration, steps })
    }

    /// Total duration T
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Number of samples
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Spacing between consecutive samples
    pub fn dt(&self) -> f64 {
        self.duration / (self.steps - 1) as f64
    }

    /// Sample instants. The first is exactly 0 and the last exactly T.
    pub fn times(&self) -> Vec<f64> {
        let denom = (self.steps - 1) as f64;
        let last = self.steps - 1;

        (0..self.steps)
            .map(|idx| {
                if idx == last {
                    self.duration
                } else {
                    self.duration * idx as f64 / denom
                }
            })
            .collect()
    }
}
