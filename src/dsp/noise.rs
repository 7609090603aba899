use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Excitation noise families for physical models and generated impulse
/// responses.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseKind {
    /// Zero-mean Gaussian, standard deviation = amplitude.
    #[default]
    Normal,
    /// Uniform in [-amplitude, amplitude].
    Uniform,
    /// Random choice of ±amplitude.
    TwoLevel,
}

impl NoiseKind {
    pub const NAMES: &'static [&'static str] = &["normal", "uniform", "two-level"];

    pub fn name(&self) -> &'static str {
        match self {
            NoiseKind::Normal => "normal",
            NoiseKind::Uniform => "uniform",
            NoiseKind::TwoLevel => "two-level",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "normal" => Some(NoiseKind::Normal),
            "uniform" => Some(NoiseKind::Uniform),
            "two-level" => Some(NoiseKind::TwoLevel),
            _ => None,
        }
    }

    pub fn fill<R: Rng + ?Sized>(&self, rng: &mut R, amplitude: f64, out: &mut [f64]) {
        match self {
            NoiseKind::Normal => {
                // std-dev must be finite and non-negative; fall back to silence otherwise
                let Ok(dist) = Normal::new(0.0, amplitude.abs()) else {
                    out.fill(0.0);
                    return;
                };
                for slot in out.iter_mut() {
                    *slot = dist.sample(rng);
                }
            }
            NoiseKind::Uniform => {
                for slot in out.iter_mut() {
                    *slot = amplitude * rng.gen_range(-1.0..=1.0);
                }
            }
            NoiseKind::TwoLevel => {
                for slot in out.iter_mut() {
                    *slot = if rng.gen_bool(0.5) { amplitude } else { -amplitude };
                }
            }
        }
    }
}

/// Deterministic generator when a seed is given, entropy-seeded otherwise.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
