use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

/// The identity of a participant.
pub type ParticipantId = u64;

/// Per participant bookkeeping, created on first contact and kept for the whole run.
///
/// Counters only ever increase, they're for diagnostics and never feed the merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientState {
    pub participant_id: ParticipantId,
    /// The round handed to this participant at its most recent pull.
    pub last_round_served: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub last_sample_count: u64,
    pub staleness_sum: u64,
    pub max_staleness: u64,
}

impl ClientState {
    fn new(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            ..Default::default()
        }
    }

    pub(crate) fn record_served(&mut self, round: u64) {
        self.last_round_served = self.last_round_served.max(round);
    }

    pub(crate) fn record_accepted(&mut self, staleness: u64, sample_count: u64) {
        self.accepted += 1;
        self.last_sample_count = sample_count;
        self.staleness_sum += staleness;
        self.max_staleness = self.max_staleness.max(staleness);
    }

    pub(crate) fn record_rejected(&mut self, staleness: u64) {
        self.rejected += 1;
        self.max_staleness = self.max_staleness.max(staleness);
    }

    /// The mean staleness of this participant's accepted submissions.
    pub fn avg_staleness(&self) -> f64 {
        match self.accepted {
            0 => 0.,
            n => self.staleness_sum as f64 / n as f64,
        }
    }
}

/// An arena of `ClientState`s keyed by participant.
///
/// Each entry has its own lock, the map lock is only taken for writing the
/// first time a participant shows up.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ParticipantId, Arc<Mutex<ClientState>>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `participant_id`, creating it on first contact.
    pub fn entry(&self, participant_id: ParticipantId) -> Arc<Mutex<ClientState>> {
        if let Some(client) = self.clients.read().get(&participant_id) {
            return Arc::clone(client);
        }

        let mut clients = self.clients.write();
        let client = clients
            .entry(participant_id)
            .or_insert_with(|| Arc::new(Mutex::new(ClientState::new(participant_id))));

        Arc::clone(client)
    }

    /// The amount of participants known so far.
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of a single participant's state, if it ever made contact.
    pub fn get(&self, participant_id: ParticipantId) -> Option<ClientState> {
        let clients = self.clients.read();
        clients.get(&participant_id).map(|client| client.lock().clone())
    }

    /// A copy of every participant's state, sorted by id.
    pub fn snapshot(&self) -> Vec<ClientState> {
        let mut states: Vec<_> = self
            .clients
            .read()
            .values()
            .map(|client| client.lock().clone())
            .collect();

        states.sort_by_key(|state| state.participant_id);
        states
    }
}
