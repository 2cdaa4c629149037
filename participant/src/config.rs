use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ParticipantErr, Result};

/// How likely and how long a participant stalls between training and submitting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelaySpec {
    /// Chance of stalling on a given round, in `[0, 1]`.
    pub probability: f64,
    /// Upper bound of a single stall.
    pub max_delay_ms: u64,
}

impl DelaySpec {
    pub fn new(probability: f64, max_delay_ms: u64) -> Self {
        Self {
            probability,
            max_delay_ms,
        }
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// A single participant's configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantConfig {
    pub id: u64,
    /// Stops after this many rounds, runs until cancelled otherwise.
    pub rounds: Option<u64>,
    pub delay: DelaySpec,
    /// Fetches once and never submits.
    pub offline: bool,
    pub seed: Option<u64>,
}

impl ParticipantConfig {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: DelaySpec) -> Self {
        self.delay = delay;
        self
    }

    /// Checks the configuration can build a working participant.
    pub fn validate(&self) -> Result<()> {
        let p = self.delay.probability;

        if !(0. ..=1.).contains(&p) {
            return Err(ParticipantErr::InvalidConfig(format!(
                "delay probability must be within [0, 1], got {p}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_probability() {
        let config = ParticipantConfig::new(1).with_delay(DelaySpec::new(1.5, 10));
        assert!(matches!(
            config.validate(),
            Err(ParticipantErr::InvalidConfig(_))
        ));
    }

    #[test]
    fn defaults_from_partial_json() {
        let config: ParticipantConfig =
            serde_json::from_str(r#"{ "id": 3, "delay": { "probability": 0.4 } }"#).unwrap();

        assert_eq!(config.id, 3);
        assert_eq!(config.delay.max_delay_ms, 0);
        assert!(!config.offline);
        config.validate().unwrap();
    }
}
