pub mod config;
pub mod coordinator;
pub mod error;
pub mod handle;
pub mod initialization;
pub mod parameters;
pub mod registry;
pub mod service;
pub mod state;
pub mod stats;
mod timer;

pub use config::{CoordinatorConfig, MinAccepted, ParamGenSpec};
pub use coordinator::{Coordinator, SubmitOutcome, SubmitStatus, UpdateSubmission, WindowStatus};
pub use error::{CoordinatorErr, SubmitError};
pub use handle::CoordinatorHandle;
pub use parameters::ParameterVector;
pub use registry::{ClientState, ParticipantId};
pub use service::CoordinatorServer;
pub use state::GlobalModelState;
pub use stats::{CoordinatorStats, MergeTrigger, RoundSummary};
