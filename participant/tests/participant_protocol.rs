use std::io;

use comms::msg::{Command, Msg, Payload, RefusalKind};
use coordinator::{ParameterVector, SubmitStatus};
use participant::{
    Participant, ParticipantConfig, ParticipantErr, Phase, RemoteClient, TrainErr, TrainOutcome,
};
use tokio::io as tokio_io;

const BUF_SIZE: usize = 4096;

/// params + 1, 10 samples, metric = round
fn plus_one(round: u64, baseline: &ParameterVector) -> Result<TrainOutcome, TrainErr> {
    let params: Vec<f64> = baseline.as_slice().iter().map(|p| p + 1.).collect();

    Ok(TrainOutcome {
        parameters: params.into(),
        samples: 10,
        metric: round as f64,
    })
}

#[tokio::test]
async fn rejected_participant_trains_from_the_resync_state() -> io::Result<()> {
    let (sv_stream, pt_stream) = tokio_io::duplex(BUF_SIZE);

    let (sv_rx, sv_tx) = tokio_io::split(sv_stream);
    let (mut sv_rx, mut sv_tx) = comms::channel(sv_rx, sv_tx);

    let (pt_rx, pt_tx) = tokio_io::split(pt_stream);
    let (pt_rx, pt_tx) = comms::channel(pt_rx, pt_tx);
    let client = RemoteClient::new(pt_rx, pt_tx);

    let config = ParticipantConfig::new(4);
    let mut participant = Participant::new(&config, client, plus_one).unwrap();

    let participant_task = tokio::spawn(async move {
        let first = participant.run_round().await?;
        assert_eq!(participant.phase(), Phase::Idle);
        assert_eq!(participant.baseline().map(|b| b.round), Some(6));

        let second = participant.run_round().await?;
        Ok::<_, ParticipantErr>((first, second, participant.metrics().clone()))
    });

    // round 1: fetch, then a stale update
    let msg: Msg = sv_rx.recv().await?;
    assert!(matches!(msg, Msg::Control(Command::Fetch { participant_id: 4 })));

    sv_tx
        .send(&Msg::Data(Payload::Snapshot {
            round: 3,
            params: &[1., 2.],
        }))
        .await?;

    let msg: Msg = sv_rx.recv().await?;
    match msg {
        Msg::Data(Payload::Update {
            participant_id,
            trained_against_round,
            sample_count,
            params,
        }) => {
            assert_eq!(participant_id, 4);
            assert_eq!(trained_against_round, 3);
            assert_eq!(sample_count, 10);
            assert_eq!(params, [2., 3.]);
        }
        other => panic!("unexpected msg: {other:?}"),
    }

    sv_tx
        .send(&Msg::Data(Payload::Resync {
            current_round: 6,
            params: &[10., 20.],
        }))
        .await?;

    // round 2: no fetch, trains straight from the resync parameters
    let msg: Msg = sv_rx.recv().await?;
    match msg {
        Msg::Data(Payload::Update {
            trained_against_round,
            params,
            ..
        }) => {
            assert_eq!(trained_against_round, 6);
            assert_eq!(params, [11., 21.]);
        }
        other => panic!("unexpected msg: {other:?}"),
    }

    sv_tx
        .send(&Msg::Control(Command::Accepted { current_round: 6 }))
        .await?;

    let (first, second, metrics) = participant_task.await.unwrap().unwrap();

    assert_eq!(first.status, SubmitStatus::Rejected);
    assert_eq!(first.current_round, 6);
    assert_eq!(second.status, SubmitStatus::Accepted);
    assert_eq!(second.trained_against_round, 6);

    assert_eq!((metrics.rounds, metrics.accepted, metrics.rejected), (2, 1, 1));
    assert_eq!(metrics.samples, 20);
    assert_eq!(metrics.last_metric, Some(6.));

    Ok(())
}

#[tokio::test]
async fn refusal_is_surfaced_as_an_error() -> io::Result<()> {
    let (sv_stream, pt_stream) = tokio_io::duplex(BUF_SIZE);

    let (sv_rx, sv_tx) = tokio_io::split(sv_stream);
    let (mut sv_rx, mut sv_tx) = comms::channel(sv_rx, sv_tx);

    let (pt_rx, pt_tx) = tokio_io::split(pt_stream);
    let (pt_rx, pt_tx) = comms::channel(pt_rx, pt_tx);
    let client = RemoteClient::new(pt_rx, pt_tx);

    let mut participant = Participant::new(&ParticipantConfig::new(1), client, plus_one).unwrap();
    let participant_task = tokio::spawn(async move { participant.run_round().await });

    let _: Msg = sv_rx.recv().await?;
    sv_tx
        .send(&Msg::Data(Payload::Snapshot {
            round: 0,
            params: &[0.],
        }))
        .await?;

    let _: Msg = sv_rx.recv().await?;
    sv_tx
        .send(&Msg::Control(Command::Refused {
            kind: RefusalKind::ShapeMismatch,
            detail: "shape mismatch: got 1 parameters, expected 2".into(),
        }))
        .await?;

    let err = participant_task.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        ParticipantErr::Refused {
            kind: RefusalKind::ShapeMismatch,
            ..
        }
    ));

    Ok(())
}

#[tokio::test]
async fn coordinator_disconnect_ends_the_run() -> io::Result<()> {
    let (sv_stream, pt_stream) = tokio_io::duplex(BUF_SIZE);

    let (sv_rx, sv_tx) = tokio_io::split(sv_stream);
    let (mut sv_rx, mut sv_tx) = comms::channel(sv_rx, sv_tx);

    let (pt_rx, pt_tx) = tokio_io::split(pt_stream);
    let (pt_rx, pt_tx) = comms::channel(pt_rx, pt_tx);
    let client = RemoteClient::new(pt_rx, pt_tx);

    let participant = Participant::new(&ParticipantConfig::new(2), client, plus_one).unwrap();
    let cancel = tokio_util::sync::CancellationToken::new();
    let participant_task = tokio::spawn(participant.run(None, cancel));

    let _: Msg = sv_rx.recv().await?;
    sv_tx.send(&Msg::Control(Command::Disconnect)).await?;

    // the participant says goodbye on its way out
    let msg: Msg = sv_rx.recv().await?;
    assert!(matches!(msg, Msg::Control(Command::Disconnect)));
    sv_tx.send(&Msg::Control(Command::Disconnect)).await?;

    let metrics = participant_task.await.unwrap().unwrap();
    assert_eq!(metrics.rounds, 0);

    Ok(())
}

#[tokio::test]
async fn negative_accepted_round_is_invalid_data() -> io::Result<()> {
    let (sv_stream, pt_stream) = tokio_io::duplex(BUF_SIZE);

    let (sv_rx, sv_tx) = tokio_io::split(sv_stream);
    let (mut sv_rx, mut sv_tx) = comms::channel(sv_rx, sv_tx);

    let (pt_rx, pt_tx) = tokio_io::split(pt_stream);
    let (pt_rx, pt_tx) = comms::channel(pt_rx, pt_tx);
    let client = RemoteClient::new(pt_rx, pt_tx);

    let mut participant = Participant::new(&ParticipantConfig::new(6), client, plus_one).unwrap();
    let participant_task = tokio::spawn(async move {
        let res = participant.run_round().await;
        (res, participant.phase())
    });

    let _: Msg = sv_rx.recv().await?;
    sv_tx
        .send(&Msg::Data(Payload::Snapshot {
            round: 2,
            params: &[0.],
        }))
        .await?;

    let _: Msg = sv_rx.recv().await?;
    sv_tx
        .send(&Msg::Control(Command::Accepted { current_round: -1 }))
        .await?;

    let (res, phase) = participant_task.await.unwrap();
    match res {
        Err(ParticipantErr::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::InvalidData),
        other => panic!("expected invalid data, got {other:?}"),
    }
    assert_eq!(phase, Phase::Idle);

    Ok(())
}
