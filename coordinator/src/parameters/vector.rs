use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Amount of elements each rayon task processes at once.
const CHUNK_SIZE: usize = 4096;

/// A flat, fixed-shape model state.
///
/// The coordinator never looks inside it: it only adds vectors together and
/// scales them, which is all a weighted average needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterVector(Vec<f64>);

impl ParameterVector {
    /// Creates a vector of `len` zeros.
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.; len])
    }

    /// Returns the amount of elements in the vector, its shape.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }

    /// Performs `self += other * factor` element-wise.
    ///
    /// # Arguments
    /// * `other` - A slice of the same shape as `self`.
    /// * `factor` - The scalar to multiply `other` by.
    ///
    /// # Panics
    /// If `other` doesn't have the same length, callers check the shape first.
    pub fn add_scaled(&mut self, other: &[f64], factor: f64) {
        assert_eq!(self.len(), other.len(), "shape checked at the boundary");

        self.0
            .par_chunks_mut(CHUNK_SIZE)
            .zip(other.par_chunks(CHUNK_SIZE))
            .for_each(|(acc, chunk)| {
                acc.iter_mut()
                    .zip(chunk)
                    .for_each(|(a, x)| *a += x * factor);
            });
    }

    /// Multiplies every element by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.0
            .par_chunks_mut(CHUNK_SIZE)
            .for_each(|chunk| chunk.iter_mut().for_each(|x| *x *= factor));
    }

    /// Sets every element back to zero without reallocating.
    pub fn clear(&mut self) {
        self.0.fill(0.);
    }
}

impl From<Vec<f64>> for ParameterVector {
    fn from(value: Vec<f64>) -> Self {
        Self(value)
    }
}

impl From<&[f64]> for ParameterVector {
    fn from(value: &[f64]) -> Self {
        Self(value.to_vec())
    }
}
