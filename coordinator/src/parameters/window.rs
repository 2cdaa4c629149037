use super::ParameterVector;

/// The accumulator for the round currently being built.
///
/// `weighted_sum` and `total_weight` only ever change together inside
/// `accept`, so `weighted_sum / total_weight` is always the weighted average
/// of exactly the submissions accepted so far.
#[derive(Debug)]
pub struct AggregationWindow {
    weighted_sum: ParameterVector,
    total_weight: u64,
    accepted: usize,
    staleness_sum: u64,
}

/// What a window turns into once it closes.
#[derive(Debug)]
pub struct ClosedWindow {
    pub parameters: ParameterVector,
    pub aggregated_from: usize,
    pub total_weight: u64,
    pub avg_staleness: f64,
}

impl AggregationWindow {
    /// Creates a new empty `AggregationWindow`.
    ///
    /// # Arguments
    /// * `len` - The shape of the global parameters.
    pub fn new(len: usize) -> Self {
        Self {
            weighted_sum: ParameterVector::zeros(len),
            total_weight: 0,
            accepted: 0,
            staleness_sum: 0,
        }
    }

    /// Folds an accepted submission into the running sum.
    ///
    /// # Arguments
    /// * `params` - The participant's post-training parameters, already shape checked.
    /// * `weight` - The sample count of the submission, greater than zero.
    /// * `staleness` - How many rounds behind the submission was.
    ///
    /// # Returns
    /// `false` if `weight` would overflow the total weight, the window is left untouched then.
    #[must_use]
    pub fn accept(&mut self, params: &ParameterVector, weight: u64, staleness: u64) -> bool {
        let Some(total_weight) = self.total_weight.checked_add(weight) else {
            return false;
        };

        self.weighted_sum.add_scaled(params.as_slice(), weight as f64);
        self.total_weight = total_weight;
        self.accepted += 1;
        self.staleness_sum = self.staleness_sum.saturating_add(staleness);
        true
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn is_empty(&self) -> bool {
        self.accepted == 0
    }

    pub fn weighted_sum(&self) -> &ParameterVector {
        &self.weighted_sum
    }

    /// Computes the weighted average and resets the window to zero.
    ///
    /// # Returns
    /// `None` if nothing was accepted, there's nothing to average then.
    pub fn close(&mut self) -> Option<ClosedWindow> {
        if self.is_empty() {
            return None;
        }

        let len = self.weighted_sum.len();
        let mut parameters = std::mem::replace(&mut self.weighted_sum, ParameterVector::zeros(len));
        parameters.scale(1. / self.total_weight as f64);

        let closed = ClosedWindow {
            parameters,
            aggregated_from: self.accepted,
            total_weight: self.total_weight,
            avg_staleness: self.staleness_sum as f64 / self.accepted as f64,
        };

        self.total_weight = 0;
        self.accepted = 0;
        self.staleness_sum = 0;
        Some(closed)
    }
}
