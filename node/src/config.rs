use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, bail};
use coordinator::{CoordinatorConfig, ParamGenSpec};
use participant::{DelaySpec, ParticipantConfig};
use serde::{Deserialize, Serialize};

/// How participants reach the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Straight calls into a shared `Coordinator`.
    #[default]
    InProcess,
    /// A `comms` connection per participant, against a coordinator listening at `addr`.
    Tcp { addr: String },
}

/// The synthetic model every participant trains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSpec {
    /// How far apart the participants' local optima are.
    pub spread: f64,
    pub learning_rate: f64,
    pub local_steps: usize,
    /// Simulated compute time of a training pass.
    pub work_ms: u64,
}

impl Default for TrainerSpec {
    fn default() -> Self {
        Self {
            spread: 1.,
            learning_rate: 0.1,
            local_steps: 5,
            work_ms: 100,
        }
    }
}

impl TrainerSpec {
    pub fn work(&self) -> Duration {
        Duration::from_millis(self.work_ms)
    }
}

/// A whole simulated run: one coordinator and its participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub coordinator: CoordinatorConfig,
    pub participants: Vec<ParticipantConfig>,
    pub transport: Transport,
    pub trainer: TrainerSpec,
}

impl Default for SimulationConfig {
    /// Four participants, one reliable and three increasingly flaky.
    fn default() -> Self {
        let coordinator = CoordinatorConfig {
            window_timeout_ms: Some(4_000),
            total_rounds: Some(10),
            params: 8,
            init: ParamGenSpec::Normal {
                mean: 0.,
                std_dev: 0.1,
            },
            seed: Some(42),
            ..Default::default()
        };

        let profile = [(0., 0), (0.4, 2_000), (0.6, 3_000), (0.3, 1_500)];
        let participants = profile
            .into_iter()
            .zip(0..)
            .map(|((probability, max_delay_ms), id)| ParticipantConfig {
                seed: Some(id),
                ..ParticipantConfig::new(id).with_delay(DelaySpec::new(probability, max_delay_ms))
            })
            .collect();

        Self {
            coordinator,
            participants,
            transport: Transport::InProcess,
            trainer: TrainerSpec::default(),
        }
    }
}

impl SimulationConfig {
    /// Reads a JSON run file, missing fields take their default values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.coordinator.validate()?;

        if self.participants.is_empty() {
            bail!("a run needs at least one participant");
        }

        for participant in &self.participants {
            participant.validate()?;
        }

        let mut ids: Vec<_> = self.participants.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        if ids.windows(2).any(|w| w[0] == w[1]) {
            bail!("participant ids must be unique");
        }

        Ok(())
    }
}
