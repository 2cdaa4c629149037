use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParticipantMetrics {
    pub train_time: Duration,
    pub submit_time: Duration,
    /// Time spent in simulated stalls.
    pub delayed: Duration,

    pub rounds: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub samples: u64,
    /// The quality metric of the most recent training pass.
    pub last_metric: Option<f64>,
}

impl ParticipantMetrics {
    #[inline]
    pub fn record_round(&mut self, samples: u64, metric: f64) {
        self.rounds += 1;
        self.samples = self.samples.saturating_add(samples);
        self.last_metric = Some(metric);
    }

    /// The share of submissions that made it into a window.
    pub fn acceptance_rate(&self) -> f64 {
        match self.accepted + self.rejected {
            0 => 0.,
            n => self.accepted as f64 / n as f64,
        }
    }
}
