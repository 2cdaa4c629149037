use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{CoordinatorConfig, MinAccepted},
    error::{CoordinatorErr, Result, SubmitError},
    initialization,
    parameters::{AggregationWindow, ParameterVector},
    registry::{ClientRegistry, ClientState, ParticipantId},
    state::GlobalModelState,
    stats::{CoordinatorStats, History, MergeTrigger, RoundSummary},
    timer::WindowTimer,
};

/// A participant's post-training parameters, consumed once by `Coordinator::submit`.
#[derive(Debug, Clone)]
pub struct UpdateSubmission {
    pub participant_id: ParticipantId,
    /// The global round the participant started training from.
    pub trained_against_round: u64,
    /// The full post-training vector, not a delta.
    pub parameters: ParameterVector,
    /// The weight of this update in the merge.
    pub sample_count: u64,
}

/// Whether a submission made it into the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Accepted,
    Rejected,
}

/// The regular outcome of a well formed submission.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Merged into the window, `merged` is set if this submission closed it.
    Accepted {
        current_round: u64,
        staleness: u64,
        merged: Option<RoundSummary>,
    },
    /// Too stale, discarded; `current` is what the participant must resync to.
    Rejected {
        staleness: u64,
        current: Arc<GlobalModelState>,
    },
}

impl SubmitOutcome {
    pub fn status(&self) -> SubmitStatus {
        match self {
            Self::Accepted { .. } => SubmitStatus::Accepted,
            Self::Rejected { .. } => SubmitStatus::Rejected,
        }
    }

    pub fn current_round(&self) -> u64 {
        match self {
            Self::Accepted { current_round, .. } => *current_round,
            Self::Rejected { current, .. } => current.round,
        }
    }

    /// The fused resync parameters, present iff the submission was rejected.
    pub fn current_parameters(&self) -> Option<&ParameterVector> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected { current, .. } => Some(&current.parameters),
        }
    }
}

/// A read-only copy of the window being built.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStatus {
    pub round: u64,
    pub accepted: usize,
    pub total_weight: u64,
    pub weighted_sum: ParameterVector,
}

/// Owns the authoritative global model and merges participants' updates into it.
///
/// Every mutation of the round, the parameters and the window happens under one
/// mutex. Readers go through `fetch`, which only clones the last published
/// `GlobalModelState` and never waits on a merge in progress for longer than the
/// pointer swap.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

struct Shared {
    staleness_threshold: u64,
    min_accepted: MinAccepted,
    published: RwLock<Arc<GlobalModelState>>,
    core: Mutex<Core>,
    clients: ClientRegistry,
    rounds: watch::Sender<u64>,
    timer: Option<WindowTimer>,
    shutdown: CancellationToken,
}

struct Core {
    state: Arc<GlobalModelState>,
    window: AggregationWindow,
    disarm: Option<CancellationToken>,
    history: History,
}

impl Coordinator {
    /// Creates a new `Coordinator` at round zero.
    ///
    /// # Arguments
    /// * `config` - The coordinator's configuration.
    ///
    /// # Returns
    /// An error if the configuration is invalid, or if it has a window timeout and
    /// this isn't called from within a tokio runtime.
    pub fn new(config: &CoordinatorConfig) -> Result<Self> {
        config.validate()?;
        let parameters = initialization::generate(config.init, config.params, config.seed)?;
        Self::with_state(config, GlobalModelState {
            round: 0,
            parameters,
        })
    }

    /// Creates a new `Coordinator` resuming from a checkpoint.
    ///
    /// # Arguments
    /// * `config` - The coordinator's configuration.
    /// * `checkpoint` - A previously saved global state.
    pub fn restore(config: &CoordinatorConfig, checkpoint: GlobalModelState) -> Result<Self> {
        config.validate()?;

        if checkpoint.parameters.len() != config.params {
            return Err(CoordinatorErr::Checkpoint {
                expected: config.params,
                got: checkpoint.parameters.len(),
            });
        }

        info!(round = checkpoint.round; "restoring coordinator from checkpoint");
        Self::with_state(config, checkpoint)
    }

    /// Restores from the configured checkpoint if it exists, otherwise starts fresh.
    pub fn from_config(config: &CoordinatorConfig) -> Result<Self> {
        match &config.checkpoint {
            Some(path) if path.exists() => Self::restore(config, GlobalModelState::load(path)?),
            _ => Self::new(config),
        }
    }

    fn with_state(config: &CoordinatorConfig, state: GlobalModelState) -> Result<Self> {
        let shutdown = CancellationToken::new();

        let timer = match config.window_timeout() {
            Some(timeout) => {
                Some(WindowTimer::new(timeout, shutdown.clone()).ok_or(CoordinatorErr::NoRuntime)?)
            }
            None => None,
        };

        let (rounds, _) = watch::channel(state.round);
        let window = AggregationWindow::new(state.parameters.len());
        let state = Arc::new(state);

        let shared = Shared {
            staleness_threshold: config.staleness_threshold,
            min_accepted: config.min_accepted,
            published: RwLock::new(Arc::clone(&state)),
            core: Mutex::new(Core {
                state,
                window,
                disarm: None,
                history: History::default(),
            }),
            clients: ClientRegistry::new(),
            rounds,
            timer,
            shutdown,
        };

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Hands out the current global state and records it as served to `participant_id`.
    ///
    /// # Arguments
    /// * `participant_id` - Who is asking.
    ///
    /// # Returns
    /// A consistent snapshot of the global model.
    pub fn fetch(&self, participant_id: ParticipantId) -> Arc<GlobalModelState> {
        let snapshot = self.snapshot();

        self.shared
            .clients
            .entry(participant_id)
            .lock()
            .record_served(snapshot.round);

        debug!(participant_id = participant_id, round = snapshot.round; "parameters served");
        snapshot
    }

    /// Evaluates a participant's update against the current round.
    ///
    /// Accepted updates are folded into the window, which closes and advances the
    /// round once it holds enough of them. Rejected updates are discarded and the
    /// outcome carries the global state the participant must resync to.
    ///
    /// # Arguments
    /// * `update` - The participant's submission.
    ///
    /// # Returns
    /// The outcome of the decision, or a `SubmitError` if the submission is
    /// malformed, in which case nothing changed.
    pub fn submit(&self, update: UpdateSubmission) -> std::result::Result<SubmitOutcome, SubmitError> {
        let shared = &*self.shared;
        let UpdateSubmission {
            participant_id,
            trained_against_round,
            parameters,
            sample_count,
        } = update;

        if sample_count == 0 {
            let err = SubmitError::InvalidWeight { got: 0 };
            error!(participant_id = participant_id; "refused submission: {err}");
            return Err(err);
        }

        let mut core = shared.core.lock();
        let expected = core.state.parameters.len();

        if parameters.len() != expected {
            let err = SubmitError::ShapeMismatch {
                expected,
                got: parameters.len(),
            };
            error!(participant_id = participant_id; "refused submission: {err}");
            return Err(err);
        }

        let current_round = core.state.round;
        let Some(staleness) = current_round.checked_sub(trained_against_round) else {
            let err = SubmitError::ProtocolViolation {
                trained_against: trained_against_round as i64,
                current: current_round,
            };
            error!(participant_id = participant_id; "refused submission: {err}");
            return Err(err);
        };

        if staleness > shared.staleness_threshold {
            let current = Arc::clone(&core.state);
            core.history.rejected();

            let client = shared.clients.entry(participant_id);
            let mut client = client.lock();
            client.record_rejected(staleness);
            client.record_served(current.round);

            warn!(
                participant_id = participant_id,
                staleness = staleness,
                round = current_round;
                "stale update rejected, resyncing participant"
            );

            return Ok(SubmitOutcome::Rejected { staleness, current });
        }

        if !core.window.accept(&parameters, sample_count, staleness) {
            let err = SubmitError::InvalidWeight {
                got: i64::try_from(sample_count).unwrap_or(i64::MAX),
            };
            error!(
                participant_id = participant_id,
                total_weight = core.window.total_weight();
                "refused submission: {err}"
            );
            return Err(err);
        }

        core.history.accepted();
        shared.clients.entry(participant_id).lock().record_accepted(staleness, sample_count);

        debug!(
            participant_id = participant_id,
            staleness = staleness,
            round = current_round,
            accepted = core.window.accepted();
            "update accepted into window"
        );

        let merged = if core.window.accepted() >= self.min_accepted() {
            self.merge(&mut core, MergeTrigger::Count)
        } else {
            if core.window.accepted() == 1 {
                self.arm_timer(&mut core);
            }

            None
        };

        Ok(SubmitOutcome::Accepted {
            current_round: core.state.round,
            staleness,
            merged,
        })
    }

    /// The amount of accepted submissions that close a window right now.
    fn min_accepted(&self) -> usize {
        match self.shared.min_accepted {
            MinAccepted::KnownParticipants => self.shared.clients.len().max(1),
            MinAccepted::Fixed(n) => n.get(),
        }
    }

    /// Publishes the window's weighted average as the next round and resets it.
    fn merge(&self, core: &mut Core, trigger: MergeTrigger) -> Option<RoundSummary> {
        let closed = core.window.close()?;

        if let Some(disarm) = core.disarm.take() {
            disarm.cancel();
        }

        let round = core.state.round + 1;
        let next = Arc::new(GlobalModelState {
            round,
            parameters: closed.parameters,
        });

        core.state = Arc::clone(&next);
        *self.shared.published.write() = next;
        self.shared.rounds.send_replace(round);

        let summary = RoundSummary {
            round,
            aggregated_from: closed.aggregated_from,
            total_weight: closed.total_weight,
            avg_staleness: closed.avg_staleness,
            trigger,
        };

        info!(
            round = round,
            aggregated_from = summary.aggregated_from,
            total_weight = summary.total_weight,
            avg_staleness = summary.avg_staleness;
            "round advanced ({trigger:?} trigger)"
        );

        core.history.merged(summary.clone());
        Some(summary)
    }

    /// Arms the timeout half of the trigger for the window that just opened.
    fn arm_timer(&self, core: &mut Core) {
        let Some(timer) = &self.shared.timer else {
            return;
        };

        let shared = Arc::downgrade(&self.shared);
        let armed_round = core.state.round;

        let disarm = timer.arm(move || {
            if let Some(shared) = shared.upgrade() {
                Coordinator { shared }.expire(armed_round);
            }
        });

        core.disarm = Some(disarm);
    }

    /// Closes the window armed at `armed_round` unless it already closed.
    fn expire(&self, armed_round: u64) {
        let mut core = self.shared.core.lock();

        if core.state.round != armed_round {
            return;
        }

        core.disarm = None;
        self.merge(&mut core, MergeTrigger::Timeout);
    }

    /// The last published global state, without recording it as served.
    pub fn snapshot(&self) -> Arc<GlobalModelState> {
        Arc::clone(&self.shared.published.read())
    }

    pub fn round(&self) -> u64 {
        self.shared.published.read().round
    }

    /// A copy of the window currently being built.
    pub fn window(&self) -> WindowStatus {
        let core = self.shared.core.lock();

        WindowStatus {
            round: core.state.round,
            accepted: core.window.accepted(),
            total_weight: core.window.total_weight(),
            weighted_sum: core.window.weighted_sum().clone(),
        }
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.shared.core.lock().history.stats()
    }

    /// The summaries of the most recent merges, oldest first.
    pub fn history(&self) -> Vec<RoundSummary> {
        self.shared.core.lock().history.rounds()
    }

    pub fn client(&self, participant_id: ParticipantId) -> Option<ClientState> {
        self.shared.clients.get(participant_id)
    }

    pub fn clients(&self) -> Vec<ClientState> {
        self.shared.clients.snapshot()
    }

    /// Subscribes to round advances.
    pub fn rounds(&self) -> watch::Receiver<u64> {
        self.shared.rounds.subscribe()
    }

    /// Waits until the global round reaches `round`.
    ///
    /// # Returns
    /// The round observed, or `ShutDown` if the coordinator was torn down first.
    pub async fn wait_for_round(&self, round: u64) -> Result<u64> {
        let mut rounds = self.rounds();

        tokio::select! {
            res = rounds.wait_for(|current| *current >= round) => {
                res.map(|current| *current).map_err(|_| CoordinatorErr::ShutDown)
            }
            _ = self.shared.shutdown.cancelled() => Err(CoordinatorErr::ShutDown),
        }
    }

    /// Tears the coordinator down, cancelling every pending window timeout.
    pub fn shutdown(&self) {
        info!(round = self.round(); "coordinator shutting down");
        self.shared.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Resolves once `shutdown` has been called.
    pub async fn cancelled(&self) {
        self.shared.shutdown.cancelled().await
    }
}
