//! Seeded Hamming-weight trace generator used by the CLI and benches.
//!
//! For trace `t` and sample `s`, the leakage is
//! `hw(value[t][s % value_width]) + u`, with `u` uniform in `[-noise, noise]`.

use ndarray::Array2;
use rand::{rngs::StdRng, Rng as _, SeedableRng};
use sctrace_core::{Result, TraceBatchContainer, TraceError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Shape and randomness of one synthetic container.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SynthParams {
    /// Number of traces.
    pub traces: usize,
    /// Points per leakage sample.
    pub samples: usize,
    /// Bytes per value.
    pub value_width: usize,
    /// Half-width of the uniform noise added to each point.
    pub noise: f32,
    /// RNG seed.
    pub seed: u64,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            traces: 16,
            samples: 32,
            value_width: 16,
            noise: 0.5,
            seed: 42,
        }
    }
}

/// Generate one container.
///
/// # Errors
/// [`TraceError::ArgumentKind`] when `value_width` is 0 or `noise` is
/// negative or not finite.
pub fn generate(params: &SynthParams) -> Result<TraceBatchContainer<f32, u8>> {
    if params.value_width == 0 {
        return Err(TraceError::ArgumentKind("value width must be positive".into()));
    }
    if !params.noise.is_finite() || params.noise < 0.0 {
        return Err(TraceError::ArgumentKind(format!(
            "noise must be a non-negative number, got {}",
            params.noise
        )));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let values = Array2::from_shape_simple_fn((params.traces, params.value_width), || {
        rng.random::<u8>()
    });
    let leakages = Array2::from_shape_fn((params.traces, params.samples), |(t, s)| {
        let hw = values[[t, s % params.value_width]].count_ones() as f32;
        if params.noise == 0.0 {
            hw
        } else {
            hw + rng.random_range(-params.noise..=params.noise)
        }
    });

    debug!(
        traces = params.traces,
        samples = params.samples,
        seed = params.seed,
        "generated synthetic container"
    );
    TraceBatchContainer::new(leakages.into_dyn(), values.into_dyn())
}

/// One container per entry of `lengths`, sharing `base` except for the trace
/// count and a per-container seed derived from `base.seed`.
///
/// # Errors
/// Same as [`generate`].
pub fn generate_many(
    lengths: &[usize],
    base: &SynthParams,
) -> Result<Vec<TraceBatchContainer<f32, u8>>> {
    lengths
        .iter()
        .enumerate()
        .map(|(i, &traces)| {
            generate(&SynthParams {
                traces,
                seed: derive_seed(base.seed, i),
                ..*base
            })
        })
        .collect()
}

/// Spread container seeds apart (golden-ratio increment).
const fn derive_seed(seed: u64, index: usize) -> u64 {
    seed.wrapping_add((index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}
