use std::{ops::Deref, sync::Arc};

use tokio::task;

use crate::{
    coordinator::{Coordinator, SubmitOutcome, UpdateSubmission},
    error::SubmitError,
    registry::ParticipantId,
    state::GlobalModelState,
};

/// The async interface to interact with a `Coordinator`.
///
/// It bridges the async runtime with the blocking, lock based implementation of
/// the `Coordinator`, so it must be used from a multi threaded runtime.
#[derive(Clone)]
pub struct CoordinatorHandle(Coordinator);

impl Deref for CoordinatorHandle {
    type Target = Coordinator;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl CoordinatorHandle {
    /// Creates a new `CoordinatorHandle`.
    ///
    /// # Arguments
    /// * `coordinator` - The underlying coordinator.
    pub fn new(coordinator: Coordinator) -> Self {
        Self(coordinator)
    }

    /// Async call to the synchronous implementation of `Coordinator::fetch`.
    pub async fn fetch(&self, participant_id: ParticipantId) -> Arc<GlobalModelState> {
        task::block_in_place(|| self.0.fetch(participant_id))
    }

    /// Async call to the synchronous implementation of `Coordinator::submit`.
    ///
    /// # Arguments
    /// * `update` - The participant's submission.
    ///
    /// # Returns
    /// The coordinator's decision, or a `SubmitError` if it refused to evaluate it.
    pub async fn submit(&self, update: UpdateSubmission) -> Result<SubmitOutcome, SubmitError> {
        task::block_in_place(|| self.0.submit(update))
    }
}

impl From<Coordinator> for CoordinatorHandle {
    fn from(coordinator: Coordinator) -> Self {
        Self::new(coordinator)
    }
}
