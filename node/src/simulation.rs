use std::{future, io};

use anyhow::{Context, Result, anyhow};
use coordinator::{
    Coordinator, CoordinatorHandle, CoordinatorServer, CoordinatorStats, GlobalModelState,
    RoundSummary,
};
use log::{info, warn};
use participant::{
    CoordinatorClient, LocalClient, Participant, ParticipantConfig, ParticipantMetrics,
    RemoteClient, SyntheticTrainer,
};
use tokio::{
    net::{TcpListener, TcpStream},
    signal,
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;

use crate::config::{SimulationConfig, Transport};

type ParticipantTasks = JoinSet<(u64, participant::Result<ParticipantMetrics>)>;

/// What a finished run leaves behind.
#[derive(Debug)]
pub struct SimulationReport {
    pub final_state: GlobalModelState,
    pub stats: CoordinatorStats,
    pub history: Vec<RoundSummary>,
    /// Each participant's metrics, by id.
    pub participants: Vec<(u64, ParticipantMetrics)>,
}

impl SimulationReport {
    /// The sample weighted mean of the participants' last quality metric.
    pub fn weighted_metric(&self) -> Option<f64> {
        let (sum, weight) = self
            .participants
            .iter()
            .filter_map(|(_, m)| m.last_metric.map(|metric| (metric, m.samples)))
            .fold((0., 0u64), |(sum, weight), (metric, samples)| {
                (sum + metric * samples as f64, weight + samples)
            });

        (weight > 0).then(|| sum / weight as f64)
    }
}

/// Runs a coordinator and its participants until the target round, or until
/// every participant is done if there's no target.
///
/// # Arguments
/// * `config` - The whole run's configuration.
/// * `stop` - Ends the run early when cancelled.
///
/// # Returns
/// The report of the run.
pub async fn run(config: SimulationConfig, stop: CancellationToken) -> Result<SimulationReport> {
    config.validate()?;

    let coordinator = Coordinator::from_config(&config.coordinator)?;
    let handle = CoordinatorHandle::new(coordinator.clone());
    let cancel = CancellationToken::new();
    let mut participants = JoinSet::new();

    info!(
        participants = config.participants.len(),
        round = coordinator.round();
        "starting simulation ({:?})", config.transport
    );

    let server = match &config.transport {
        Transport::InProcess => {
            for pc in &config.participants {
                let client = LocalClient::new(handle.clone());
                spawn_participant(&mut participants, pc, &config, client, &cancel)?;
            }

            None
        }
        Transport::Tcp { addr } => {
            let list = TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            let local = list.local_addr()?;
            info!("coordinator listening at {local}");

            let server = tokio::spawn(serve(list, handle.clone()));

            for pc in &config.participants {
                let stream = TcpStream::connect(local).await?;
                let (rx, tx) = comms::tcp(stream);

                let client = RemoteClient::new(rx, tx);
                spawn_participant(&mut participants, pc, &config, client, &cancel)?;
            }

            Some(server)
        }
    };

    let mut reports = Vec::with_capacity(config.participants.len());
    let target = config.coordinator.total_rounds;

    let reached = async {
        match target {
            Some(total) => coordinator.wait_for_round(total).await.is_ok(),
            None => future::pending().await,
        }
    };

    tokio::select! {
        reached = reached => {
            if reached {
                info!(round = coordinator.round(); "target round reached");
            }
        }
        _ = drain(&mut participants, &mut reports) => {
            info!(round = coordinator.round(); "every participant is done");
        }
        _ = stop.cancelled() => info!("simulation stopped"),
    }

    cancel.cancel();
    drain(&mut participants, &mut reports).await;
    coordinator.shutdown();

    if let Some(server) = server {
        server.await??;
    }

    reports.sort_by_key(|(id, _)| *id);
    let report = SimulationReport {
        final_state: (*coordinator.snapshot()).clone(),
        stats: coordinator.stats(),
        history: coordinator.history(),
        participants: reports,
    };

    if let Some(path) = &config.coordinator.checkpoint {
        report
            .final_state
            .save(path)
            .with_context(|| format!("writing checkpoint {}", path.display()))?;
        info!("checkpoint written to {}", path.display());
    }

    Ok(report)
}

fn spawn_participant<C>(
    tasks: &mut ParticipantTasks,
    config: &ParticipantConfig,
    simulation: &SimulationConfig,
    client: C,
    cancel: &CancellationToken,
) -> Result<()>
where
    C: CoordinatorClient + Send + 'static,
{
    let spec = &simulation.trainer;
    let params = simulation.coordinator.params;

    let trainer = SyntheticTrainer::new(params, spec.spread, config.seed.unwrap_or(config.id))
        .map_err(|e| anyhow!("building the trainer of participant {}: {e}", config.id))?
        .with_learning_rate(spec.learning_rate)
        .with_local_steps(spec.local_steps)
        .with_work(spec.work());

    let participant = Participant::new(config, client, trainer)?;
    let id = config.id;
    let rounds = config.rounds;
    let cancel = cancel.clone();

    if config.offline {
        tasks.spawn(async move { (id, participant.run_offline(cancel).await) });
    } else {
        tasks.spawn(async move { (id, participant.run(rounds, cancel).await) });
    }

    Ok(())
}

/// Collects finished participants, a failed one is logged and doesn't stop the others.
async fn drain(tasks: &mut ParticipantTasks, reports: &mut Vec<(u64, ParticipantMetrics)>) {
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok((id, Ok(metrics))) => reports.push((id, metrics)),
            Ok((id, Err(e))) => warn!(participant_id = id; "participant failed: {e}"),
            Err(e) => warn!("participant task panicked: {e}"),
        }
    }
}

/// Accepts participant connections until the coordinator shuts down.
async fn serve(list: TcpListener, handle: CoordinatorHandle) -> io::Result<()> {
    let mut server = CoordinatorServer::new(handle.clone());

    loop {
        tokio::select! {
            res = list.accept() => {
                let (stream, peer) = res?;
                info!("participant connected from {peer}");

                let (rx, tx) = comms::tcp(stream);
                server.spawn(rx, tx);
            }
            _ = handle.cancelled() => break,
        }
    }

    server.run().await
}

/// Cancels `stop` on ctrl-c.
pub fn stop_on_signal(stop: CancellationToken) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("received SIGTERM");
            stop.cancel();
        }
    });
}
