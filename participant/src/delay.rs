use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::config::DelaySpec;

/// Samples the simulated stalls of a slow or flaky participant.
#[derive(Debug)]
pub struct DelayPolicy {
    spec: DelaySpec,
    rng: StdRng,
}

impl DelayPolicy {
    /// Creates a new `DelayPolicy`.
    ///
    /// # Arguments
    /// * `spec` - The probability and upper bound of a stall, already validated.
    /// * `seed` - An optional seed for reproducible runs.
    pub fn new(spec: DelaySpec, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self { spec, rng }
    }

    /// Decides whether this round stalls and for how long.
    pub fn sample(&mut self) -> Option<Duration> {
        if self.spec.max_delay_ms == 0 || !self.rng.random_bool(self.spec.probability) {
            return None;
        }

        let ms = self.rng.random_range(0..=self.spec.max_delay_ms);
        Some(Duration::from_millis(ms))
    }
}
