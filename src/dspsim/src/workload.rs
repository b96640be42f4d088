//! Input-rate curves consumed by source vertices.
//!
//! A curve is a sequence of `step + 1` multipliers, one per discrete time step.

use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Binomial, Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::Error;

pub const DEFAULT_STEP: usize = 900;

const TWOSTEP_LOW: f64 = 0.2;
const BINOMIAL_TRIALS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadShape {
    Constant,
    TwoStep,
    Binomial,
    Normal,
    Uniform,
}

impl Default for WorkloadShape {
    fn default() -> Self {
        WorkloadShape::TwoStep
    }
}

impl std::str::FromStr for WorkloadShape {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "constant" => Ok(WorkloadShape::Constant),
            "twostep" => Ok(WorkloadShape::TwoStep),
            "binomial" => Ok(WorkloadShape::Binomial),
            "normal" => Ok(WorkloadShape::Normal),
            "uniform" => Ok(WorkloadShape::Uniform),
            _ => Err(Error::UnknownWorkloadShape(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSetting {
    pub shape: WorkloadShape,
    /// Number of time steps, the curve has one more entry than this
    pub step: usize,
    /// Seed for the statistical shapes
    #[serde(default)]
    pub seed: u64,
}

impl Default for WorkloadSetting {
    fn default() -> Self {
        WorkloadSetting {
            shape: WorkloadShape::default(),
            step: DEFAULT_STEP,
            seed: 0,
        }
    }
}

pub fn generate(setting: &WorkloadSetting) -> Vec<f64> {
    let step = setting.step;
    match setting.shape {
        WorkloadShape::Constant => vec![1.0; step + 1],
        WorkloadShape::TwoStep => (0..=step)
            .map(|i| {
                if (i as f64) < step as f64 / 2.0 {
                    TWOSTEP_LOW
                } else {
                    1.0
                }
            })
            .collect(),
        WorkloadShape::Binomial => {
            let mut rng = StdRng::seed_from_u64(setting.seed);
            let dist = Binomial::new(BINOMIAL_TRIALS, 0.5).expect("valid binomial parameters");
            (0..=step)
                .map(|_| dist.sample(&mut rng) as f64 / BINOMIAL_TRIALS as f64)
                .collect()
        }
        WorkloadShape::Normal => {
            let mut rng = StdRng::seed_from_u64(setting.seed);
            let dist = Normal::new(0.6_f64, 0.15).expect("valid normal parameters");
            (0..=step)
                .map(|_| dist.sample(&mut rng).max(0.0).min(1.0))
                .collect()
        }
        WorkloadShape::Uniform => {
            let mut rng = StdRng::seed_from_u64(setting.seed);
            let dist = Uniform::new_inclusive(TWOSTEP_LOW, 1.0);
            (0..=step).map(|_| dist.sample(&mut rng)).collect()
        }
    }
}
