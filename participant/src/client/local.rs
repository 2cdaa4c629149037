use std::sync::Arc;

use coordinator::{CoordinatorHandle, GlobalModelState, SubmitOutcome, UpdateSubmission};

use super::{CoordinatorClient, SubmitReply};
use crate::error::{ParticipantErr, Result};

/// Talks to a coordinator living in the same process.
///
/// It goes through a `CoordinatorHandle`, so it needs a multi threaded runtime.
#[derive(Clone)]
pub struct LocalClient {
    handle: CoordinatorHandle,
}

impl LocalClient {
    pub fn new(handle: CoordinatorHandle) -> Self {
        Self { handle }
    }
}

impl CoordinatorClient for LocalClient {
    async fn fetch(&mut self, participant_id: u64) -> Result<Arc<GlobalModelState>> {
        if self.handle.is_shut_down() {
            return Err(ParticipantErr::Disconnected);
        }

        Ok(self.handle.fetch(participant_id).await)
    }

    async fn submit(&mut self, update: UpdateSubmission) -> Result<SubmitReply> {
        if self.handle.is_shut_down() {
            return Err(ParticipantErr::Disconnected);
        }

        match self.handle.submit(update).await {
            Ok(SubmitOutcome::Accepted { current_round, .. }) => {
                Ok(SubmitReply::Accepted { current_round })
            }
            Ok(SubmitOutcome::Rejected { current, .. }) => Ok(SubmitReply::Rejected { current }),
            Err(e) => Err(ParticipantErr::Refused {
                kind: e.refusal_kind(),
                detail: e.to_string(),
            }),
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}
