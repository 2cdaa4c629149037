use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{CoordinatorErr, Result};

/// How the initial global parameters are generated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamGenSpec {
    Const { value: f64 },
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, std_dev: f64 },
}

impl Default for ParamGenSpec {
    fn default() -> Self {
        Self::Const { value: 0. }
    }
}

/// How many accepted submissions close a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinAccepted {
    /// As many as participants the coordinator has heard from so far.
    #[default]
    KnownParticipants,
    Fixed(NonZeroUsize),
}

/// The coordinator's configuration surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Maximum staleness, in rounds, an update may have and still be merged.
    pub staleness_threshold: u64,
    pub min_accepted: MinAccepted,
    /// Closes a non-empty window after this many milliseconds even if it isn't full.
    pub window_timeout_ms: Option<u64>,
    /// The round at which the run is over, enforced by whoever drives the run.
    pub total_rounds: Option<u64>,
    /// The shape of the global parameters.
    pub params: usize,
    pub init: ParamGenSpec,
    pub seed: Option<u64>,
    /// Where the global state is restored from, if present, and saved to at shutdown.
    pub checkpoint: Option<PathBuf>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            staleness_threshold: 2,
            min_accepted: MinAccepted::KnownParticipants,
            window_timeout_ms: None,
            total_rounds: None,
            params: 1,
            init: ParamGenSpec::default(),
            seed: None,
            checkpoint: None,
        }
    }
}

impl CoordinatorConfig {
    /// Reads a JSON configuration file, missing fields take their default values.
    ///
    /// # Arguments
    /// * `path` - The location of the file.
    ///
    /// # Returns
    /// The validated configuration.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read(path)?;
        let config: Self = serde_json::from_slice(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn window_timeout(&self) -> Option<Duration> {
        self.window_timeout_ms.map(Duration::from_millis)
    }

    /// Checks the configuration can build a working coordinator.
    pub fn validate(&self) -> Result<()> {
        if self.params == 0 {
            return Err(CoordinatorErr::InvalidConfig(
                "the parameter vector must hold at least one value".into(),
            ));
        }

        if self.window_timeout_ms == Some(0) {
            return Err(CoordinatorErr::InvalidConfig(
                "a zero window timeout would close every window on arrival".into(),
            ));
        }

        Ok(())
    }
}
