use std::num::NonZeroUsize;

use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorHandle, MinAccepted, ParameterVector,
    SubmitStatus, UpdateSubmission,
};
use participant::{
    LocalClient, Participant, ParticipantConfig, SyntheticTrainer, TrainErr, TrainOutcome,
};
use tokio_util::sync::CancellationToken;

fn coordinator(min_accepted: usize, params: usize) -> Coordinator {
    let config = CoordinatorConfig {
        staleness_threshold: 2,
        min_accepted: MinAccepted::Fixed(NonZeroUsize::new(min_accepted).unwrap()),
        params,
        ..Default::default()
    };

    Coordinator::new(&config).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn overtaken_participant_resyncs_and_catches_up() {
    let coordinator = coordinator(1, 2);
    let client = LocalClient::new(CoordinatorHandle::new(coordinator.clone()));

    // while the first round trains, three other updates advance the global round to 3
    let others = coordinator.clone();
    let trainer = move |round: u64, baseline: &ParameterVector| -> Result<TrainOutcome, TrainErr> {
        if round == 0 {
            for id in 10..13 {
                others.submit(UpdateSubmission {
                    participant_id: id,
                    trained_against_round: others.round(),
                    parameters: vec![5., 5.].into(),
                    sample_count: 1,
                })?;
            }
        }

        Ok(TrainOutcome {
            parameters: baseline.clone(),
            samples: 4,
            metric: 0.,
        })
    };

    let mut participant = Participant::new(&ParticipantConfig::new(0), client, trainer).unwrap();

    let first = participant.run_round().await.unwrap();
    assert_eq!(first.trained_against_round, 0);
    assert_eq!(first.status, SubmitStatus::Rejected);
    assert_eq!(first.current_round, 3);

    let baseline = participant.baseline().unwrap();
    assert_eq!(baseline, &*coordinator.snapshot());

    let second = participant.run_round().await.unwrap();
    assert_eq!(second.trained_against_round, 3);
    assert_eq!(second.status, SubmitStatus::Accepted);
    assert_eq!(coordinator.round(), 4);

    let client = coordinator.client(0).unwrap();
    assert_eq!((client.accepted, client.rejected), (1, 1));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_participants_share_one_coordinator() {
    const PARTICIPANTS: u64 = 4;
    const ROUNDS: u64 = 6;
    const PARAMS: usize = 16;

    let coordinator = coordinator(1, PARAMS);
    let cancel = CancellationToken::new();

    let tasks: Vec<_> = (0..PARTICIPANTS)
        .map(|id| {
            let client = LocalClient::new(CoordinatorHandle::new(coordinator.clone()));
            let trainer = SyntheticTrainer::new(PARAMS, 1., id).unwrap();
            let participant =
                Participant::new(&ParticipantConfig::new(id), client, trainer).unwrap();

            tokio::spawn(participant.run(Some(ROUNDS), cancel.clone()))
        })
        .collect();

    let mut accepted = 0;
    for task in tasks {
        let metrics = task.await.unwrap().unwrap();
        assert_eq!(metrics.rounds, ROUNDS);
        assert_eq!(metrics.accepted + metrics.rejected, ROUNDS);
        accepted += metrics.accepted;
    }

    let stats = coordinator.stats();
    assert_eq!(stats.accepted, accepted);
    assert_eq!(stats.merges, accepted);
    assert_eq!(coordinator.round(), accepted);
    assert_eq!(coordinator.clients().len(), PARTICIPANTS as usize);
}
