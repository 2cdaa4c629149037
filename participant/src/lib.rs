pub mod client;
pub mod config;
pub mod delay;
pub mod error;
pub mod metrics;
pub mod participant;
pub mod trainer;

pub use client::{CoordinatorClient, LocalClient, RemoteClient, SubmitReply};
pub use config::{DelaySpec, ParticipantConfig};
pub use error::{ParticipantErr, Result, TrainErr};
pub use metrics::ParticipantMetrics;
pub use participant::{Participant, Phase, RoundReport};
pub use trainer::{SyntheticTrainer, TrainOutcome, Trainer};
