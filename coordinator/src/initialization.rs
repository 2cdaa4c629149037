use std::{error::Error, fmt};

use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal, NormalError, Uniform, uniform::Error as UniformError};

use crate::{config::ParamGenSpec, parameters::ParameterVector};

/// Returned whenever a distribution can't be built from the configured bounds.
#[derive(Debug, Clone, PartialEq)]
pub enum InitErr {
    Uniform { low: f64, high: f64, cause: UniformError },
    Normal { std_dev: f64, cause: NormalError },
}

impl fmt::Display for InitErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform { low, high, cause } => {
                write!(f, "uniform over [{low}, {high}): {cause}")
            }
            Self::Normal { std_dev, cause } => {
                write!(f, "normal with standard deviation {std_dev}: {cause}")
            }
        }
    }
}

impl Error for InitErr {}

/// Builds the round zero global parameters following `spec`.
///
/// # Arguments
/// * `spec` - How to generate the values.
/// * `len` - The shape of the parameters.
/// * `seed` - An optional seed, the same seed always yields the same vector.
///
/// # Returns
/// The generated vector or an `InitErr` if the distribution bounds are invalid.
pub fn generate(spec: ParamGenSpec, len: usize, seed: Option<u64>) -> Result<ParameterVector, InitErr> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let params = match spec {
        ParamGenSpec::Const { value } => vec![value; len],
        ParamGenSpec::Uniform { low, high } => {
            let dist = Uniform::new(low, high).map_err(|cause| InitErr::Uniform { low, high, cause })?;
            sample(&mut rng, dist, len)
        }
        ParamGenSpec::Normal { mean, std_dev } => {
            let dist = Normal::new(mean, std_dev).map_err(|cause| InitErr::Normal { std_dev, cause })?;
            sample(&mut rng, dist, len)
        }
    };

    Ok(params.into())
}

fn sample<R: Rng, D: Distribution<f64>>(rng: &mut R, dist: D, len: usize) -> Vec<f64> {
    dist.sample_iter(rng).take(len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_generation_is_reproducible() {
        let spec = ParamGenSpec::Normal {
            mean: 0.,
            std_dev: 0.1,
        };

        let a = generate(spec, 16, Some(7)).unwrap();
        let b = generate(spec, 16, Some(7)).unwrap();

        assert_eq!(a.len(), 16);
        assert_eq!(a, b);
    }

    #[test]
    fn constant_fills_shape() {
        let params = generate(ParamGenSpec::Const { value: 0.5 }, 5, None).unwrap();
        assert_eq!(params.as_slice(), [0.5; 5]);
    }

    #[test]
    fn uniform_stays_in_range() {
        let spec = ParamGenSpec::Uniform { low: -0.5, high: 0.5 };
        let params = generate(spec, 100, Some(42)).unwrap();

        assert!(params.as_slice().iter().all(|x| (-0.5..0.5).contains(x)));
    }

    #[test]
    fn invalid_bounds() {
        let uniform = ParamGenSpec::Uniform { low: 1., high: -1. };
        assert!(matches!(generate(uniform, 1, None), Err(InitErr::Uniform { .. })));

        let normal = ParamGenSpec::Normal { mean: 0., std_dev: -1. };
        assert!(matches!(generate(normal, 1, None), Err(InitErr::Normal { .. })));
    }
}
