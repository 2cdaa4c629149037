use std::{thread, time::Duration};

use coordinator::ParameterVector;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};

use crate::error::TrainErr;

/// What a local training pass produced.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// The post-training parameters, the same shape as the baseline.
    pub parameters: ParameterVector,
    /// How many samples were used, the weight of this update.
    pub samples: u64,
    /// A scalar quality metric, opaque to the coordinator.
    pub metric: f64,
}

/// The model computation collaborator of a participant.
///
/// Training is CPU bound and runs on the blocking pool, so it must be movable
/// across threads.
pub trait Trainer: Send + 'static {
    /// Trains locally starting from `baseline`.
    ///
    /// # Arguments
    /// * `round` - The global round `baseline` belongs to.
    /// * `baseline` - The starting point of the local training.
    ///
    /// # Returns
    /// The trained parameters, or a `TrainErr` on failure.
    fn train(&mut self, round: u64, baseline: &ParameterVector) -> Result<TrainOutcome, TrainErr>;
}

impl<F> Trainer for F
where
    F: FnMut(u64, &ParameterVector) -> Result<TrainOutcome, TrainErr> + Send + 'static,
{
    fn train(&mut self, round: u64, baseline: &ParameterVector) -> Result<TrainOutcome, TrainErr> {
        self(round, baseline)
    }
}

/// A stand in for a real model: gradient descent on a quadratic loss centered at
/// a participant specific optimum, so participants genuinely disagree.
#[derive(Debug)]
pub struct SyntheticTrainer {
    optimum: Vec<f64>,
    learning_rate: f64,
    local_steps: usize,
    samples: (u64, u64),
    work: Duration,
    rng: StdRng,
}

impl SyntheticTrainer {
    /// Creates a new `SyntheticTrainer`.
    ///
    /// # Arguments
    /// * `params` - The shape of the model.
    /// * `spread` - The standard deviation of the optimum around zero.
    /// * `seed` - Seeds both the optimum and the per round sample counts.
    pub fn new(params: usize, spread: f64, seed: u64) -> Result<Self, TrainErr> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0., spread)?;
        let optimum = (0..params).map(|_| normal.sample(&mut rng)).collect();

        Ok(Self {
            optimum,
            learning_rate: 0.1,
            local_steps: 5,
            samples: (32, 256),
            work: Duration::ZERO,
            rng,
        })
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_local_steps(mut self, local_steps: usize) -> Self {
        self.local_steps = local_steps;
        self
    }

    /// Makes every training pass take at least `work`, as a real model would.
    pub fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    pub fn optimum(&self) -> &[f64] {
        &self.optimum
    }

    fn loss(&self, params: &[f64]) -> f64 {
        let sq: f64 = params
            .iter()
            .zip(&self.optimum)
            .map(|(p, o)| (p - o) * (p - o))
            .sum();

        0.5 * sq / params.len().max(1) as f64
    }
}

impl Trainer for SyntheticTrainer {
    fn train(&mut self, _round: u64, baseline: &ParameterVector) -> Result<TrainOutcome, TrainErr> {
        if baseline.len() != self.optimum.len() {
            return Err(format!(
                "baseline holds {} parameters, the model has {}",
                baseline.len(),
                self.optimum.len()
            )
            .into());
        }

        if !self.work.is_zero() {
            thread::sleep(self.work);
        }

        let mut params = baseline.clone().into_vec();

        for _ in 0..self.local_steps {
            for (p, o) in params.iter_mut().zip(&self.optimum) {
                *p -= self.learning_rate * (*p - o);
            }
        }

        let (low, high) = self.samples;
        let samples = self.rng.random_range(low..=high);
        let metric = self.loss(&params);

        Ok(TrainOutcome {
            parameters: params.into(),
            samples,
            metric,
        })
    }
}
