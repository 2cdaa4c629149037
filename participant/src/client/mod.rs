mod local;
mod remote;

use std::sync::Arc;

use coordinator::{GlobalModelState, UpdateSubmission};

pub use local::LocalClient;
pub use remote::RemoteClient;

use crate::error::Result;

/// The coordinator's reply to a well formed submission.
#[derive(Debug, Clone)]
pub enum SubmitReply {
    Accepted { current_round: u64 },
    /// Too stale, `current` is the state to resync to.
    Rejected { current: Arc<GlobalModelState> },
}

/// A participant's view of the coordinator's two operations.
#[trait_variant::make(CoordinatorClient: Send)]
pub trait CoordinatorClientTemplate {
    /// Pulls the current global round and parameters.
    ///
    /// # Arguments
    /// * `participant_id` - Who is asking.
    async fn fetch(&mut self, participant_id: u64) -> Result<Arc<GlobalModelState>>;

    /// Hands an update to the coordinator.
    ///
    /// # Arguments
    /// * `update` - The post-training parameters tagged with the round they were trained against.
    ///
    /// # Returns
    /// The coordinator's decision, or `ParticipantErr::Refused` if it refused to evaluate it.
    async fn submit(&mut self, update: UpdateSubmission) -> Result<SubmitReply>;

    /// Ends the session with the coordinator.
    async fn disconnect(&mut self) -> Result<()>;
}
