use std::{io, sync::Arc, time::Instant};

use coordinator::{GlobalModelState, SubmitStatus, UpdateSubmission};
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::{task, time};
use tokio_util::sync::CancellationToken;

use crate::{
    client::{CoordinatorClient, SubmitReply},
    config::ParticipantConfig,
    delay::DelayPolicy,
    error::{ParticipantErr, Result},
    metrics::ParticipantMetrics,
    trainer::{TrainOutcome, Trainer},
};

/// Where a participant is within its round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Training,
    Submitting,
    Accepted,
    Resyncing,
}

/// What a single round of a participant amounted to.
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub trained_against_round: u64,
    pub status: SubmitStatus,
    /// The global round after the submission was evaluated.
    pub current_round: u64,
    pub samples: u64,
    pub metric: f64,
}

/// Drives local training against the global model and submits the results.
///
/// A rejected participant keeps the resync state the coordinator handed back as
/// the baseline of its next round instead of fetching again. A round dropped
/// halfway through leaves the participant ready for the next one.
pub struct Participant<C, T> {
    id: u64,
    client: C,
    trainer: Arc<Mutex<T>>,
    delay: DelayPolicy,
    phase: Phase,
    baseline: Option<Arc<GlobalModelState>>,
    metrics: ParticipantMetrics,
}

impl<C, T> Participant<C, T>
where
    C: CoordinatorClient,
    T: Trainer,
{
    /// Creates a new `Participant`.
    ///
    /// # Arguments
    /// * `config` - The participant's configuration.
    /// * `client` - The way to reach the coordinator.
    /// * `trainer` - The local model computation.
    ///
    /// # Returns
    /// An error if the configuration is invalid.
    pub fn new(config: &ParticipantConfig, client: C, trainer: T) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            id: config.id,
            client,
            trainer: Arc::new(Mutex::new(trainer)),
            delay: DelayPolicy::new(config.delay, config.seed),
            phase: Phase::Idle,
            baseline: None,
            metrics: ParticipantMetrics::default(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn metrics(&self) -> &ParticipantMetrics {
        &self.metrics
    }

    /// The state the next round will train from, if already known.
    pub fn baseline(&self) -> Option<&GlobalModelState> {
        self.baseline.as_deref()
    }

    fn transition(&mut self, phase: Phase) {
        debug!(participant_id = self.id; "{:?} -> {phase:?}", self.phase);
        self.phase = phase;
    }

    /// Runs a single fetch, train, submit round.
    ///
    /// # Returns
    /// What the coordinator made of this round's update, or an error if the
    /// coordinator couldn't be reached, refused the update or training failed.
    pub async fn run_round(&mut self) -> Result<RoundReport> {
        let baseline = match self.baseline.take() {
            Some(baseline) => baseline,
            None => self.client.fetch(self.id).await?,
        };

        let trained_against_round = baseline.round;
        self.transition(Phase::Training);

        let outcome = match self.train(Arc::clone(&baseline)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.transition(Phase::Idle);
                return Err(e);
            }
        };

        if outcome.parameters.len() != baseline.parameters.len() {
            self.transition(Phase::Idle);
            return Err(ParticipantErr::ShapeMismatch {
                got: outcome.parameters.len(),
                expected: baseline.parameters.len(),
            });
        }

        if let Some(delay) = self.delay.sample() {
            debug!(participant_id = self.id, delay_ms = delay.as_millis() as u64; "stalling before submit");
            time::sleep(delay).await;
            self.metrics.delayed += delay;
        }

        self.transition(Phase::Submitting);
        let TrainOutcome {
            parameters,
            samples,
            metric,
        } = outcome;

        let update = UpdateSubmission {
            participant_id: self.id,
            trained_against_round,
            parameters,
            sample_count: samples,
        };

        let start = Instant::now();
        let reply = self.client.submit(update).await;
        self.metrics.submit_time += start.elapsed();

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                self.transition(Phase::Idle);
                return Err(e);
            }
        };

        self.metrics.record_round(samples, metric);

        let (status, current_round) = match reply {
            SubmitReply::Accepted { current_round } => {
                self.transition(Phase::Accepted);
                self.metrics.accepted += 1;
                (SubmitStatus::Accepted, current_round)
            }
            SubmitReply::Rejected { current } => {
                self.transition(Phase::Resyncing);
                self.metrics.rejected += 1;

                warn!(
                    participant_id = self.id,
                    trained_against = trained_against_round,
                    current_round = current.round;
                    "update rejected as stale, resyncing"
                );

                let current_round = current.round;
                self.baseline = Some(current);
                (SubmitStatus::Rejected, current_round)
            }
        };

        self.transition(Phase::Idle);

        Ok(RoundReport {
            trained_against_round,
            status,
            current_round,
            samples,
            metric,
        })
    }

    /// Trains on the blocking pool.
    ///
    /// The trainer is shared with the blocking task, if this future is dropped
    /// the task finishes on its own and the next round waits for it.
    async fn train(&mut self, baseline: Arc<GlobalModelState>) -> Result<TrainOutcome> {
        let trainer = Arc::clone(&self.trainer);

        let start = Instant::now();
        let res = task::spawn_blocking(move || trainer.lock().train(baseline.round, &baseline.parameters))
            .await
            .map_err(|e| io::Error::other(format!("training join error: {e}")))?;

        self.metrics.train_time += start.elapsed();
        res.map_err(ParticipantErr::Train)
    }

    /// Keeps running rounds until `rounds` are done, `cancel` fires or the coordinator leaves.
    ///
    /// # Arguments
    /// * `rounds` - An optional limit of rounds to run.
    /// * `cancel` - Abandons the round in progress when cancelled.
    ///
    /// # Returns
    /// The participant's metrics.
    pub async fn run(mut self, rounds: Option<u64>, cancel: CancellationToken) -> Result<ParticipantMetrics> {
        info!(participant_id = self.id; "participant starting");

        while rounds.is_none_or(|limit| self.metrics.rounds < limit) {
            let res = tokio::select! {
                _ = cancel.cancelled() => break,
                res = self.run_round() => res,
            };

            match res {
                Ok(report) => debug!(
                    participant_id = self.id,
                    round = report.current_round,
                    samples = report.samples;
                    "round done ({:?})", report.status
                ),
                Err(ParticipantErr::Disconnected) => break,
                Err(ParticipantErr::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
        }

        self.finish().await
    }

    /// Fetches once and then stays silent until cancelled, an unresponsive participant.
    pub async fn run_offline(mut self, cancel: CancellationToken) -> Result<ParticipantMetrics> {
        let state = self.client.fetch(self.id).await?;
        info!(participant_id = self.id, round = state.round; "participant went offline");

        self.baseline = Some(state);
        cancel.cancelled().await;
        self.finish().await
    }

    async fn finish(mut self) -> Result<ParticipantMetrics> {
        if let Err(e) = self.client.disconnect().await {
            warn!(participant_id = self.id; "failed to disconnect cleanly: {e}");
        }

        let metrics = self.metrics;
        info!(
            participant_id = self.id,
            rounds = metrics.rounds,
            accepted = metrics.accepted,
            rejected = metrics.rejected;
            "participant done"
        );

        Ok(metrics)
    }
}
