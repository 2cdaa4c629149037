use std::num::NonZeroUsize;

use comms::msg::{Command, Msg, Payload, RefusalKind};
use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorHandle, CoordinatorServer, GlobalModelState,
    MinAccepted,
};
use tokio::io;

const BUF_SIZE: usize = 4096;

fn restored(round: u64, params: Vec<f64>) -> Coordinator {
    let config = CoordinatorConfig {
        min_accepted: MinAccepted::Fixed(NonZeroUsize::new(2).unwrap()),
        params: params.len(),
        ..Default::default()
    };

    let checkpoint = GlobalModelState {
        round,
        parameters: params.into(),
    };

    Coordinator::restore(&config, checkpoint).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn serves_fetch_submit_and_disconnect() -> std::io::Result<()> {
    let coordinator = restored(4, vec![1., 2.]);
    let mut server = CoordinatorServer::new(CoordinatorHandle::new(coordinator.clone()));

    let (sv_stream, pt_stream) = io::duplex(BUF_SIZE);
    let (rx, tx) = io::split(sv_stream);
    let (rx, tx) = comms::channel(rx, tx);
    server.spawn(rx, tx);

    let (rx, tx) = io::split(pt_stream);
    let (mut rx, mut tx) = comms::channel(rx, tx);

    tx.send(&Msg::Control(Command::Fetch { participant_id: 9 }))
        .await?;
    match rx.recv().await? {
        Msg::Data(Payload::Snapshot { round, params }) => {
            assert_eq!(round, 4);
            assert_eq!(params, [1., 2.]);
        }
        other => panic!("unexpected msg: {other:?}"),
    }

    let msg = Msg::Data(Payload::Update {
        participant_id: 9,
        trained_against_round: 4,
        sample_count: 5,
        params: &[3., 3.],
    });
    tx.send(&msg).await?;
    match rx.recv().await? {
        Msg::Control(Command::Accepted { current_round }) => assert_eq!(current_round, 4),
        other => panic!("unexpected msg: {other:?}"),
    }

    let msg = Msg::Data(Payload::Update {
        participant_id: 9,
        trained_against_round: 1,
        sample_count: 5,
        params: &[3., 3.],
    });
    tx.send(&msg).await?;
    match rx.recv().await? {
        Msg::Data(Payload::Resync {
            current_round,
            params,
        }) => {
            assert_eq!(current_round, 4);
            assert_eq!(params, [1., 2.]);
        }
        other => panic!("unexpected msg: {other:?}"),
    }

    tx.send(&Msg::Control(Command::Disconnect)).await?;
    let msg: Msg = rx.recv().await?;
    assert!(matches!(msg, Msg::Control(Command::Disconnect)));

    server.run().await?;

    let client = coordinator.client(9).unwrap();
    assert_eq!((client.accepted, client.rejected), (1, 1));
    assert_eq!(coordinator.window().accepted, 1);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_updates_are_refused() -> std::io::Result<()> {
    let coordinator = restored(2, vec![0.; 3]);
    let mut server = CoordinatorServer::new(CoordinatorHandle::new(coordinator.clone()));

    let (sv_stream, pt_stream) = io::duplex(BUF_SIZE);
    let (rx, tx) = io::split(sv_stream);
    let (rx, tx) = comms::channel(rx, tx);
    server.spawn(rx, tx);

    let (rx, tx) = io::split(pt_stream);
    let (mut rx, mut tx) = comms::channel(rx, tx);

    let cases = [
        (2, 0, vec![1., 1., 1.], RefusalKind::InvalidWeight),
        (2, -3, vec![1., 1., 1.], RefusalKind::InvalidWeight),
        (-1, 4, vec![1., 1., 1.], RefusalKind::ProtocolViolation),
        (3, 4, vec![1., 1., 1.], RefusalKind::ProtocolViolation),
        (2, 4, vec![1., 1.], RefusalKind::ShapeMismatch),
    ];

    for (round, samples, params, expected) in cases {
        let msg = Msg::Data(Payload::Update {
            participant_id: 1,
            trained_against_round: round,
            sample_count: samples,
            params: &params,
        });
        tx.send(&msg).await?;

        match rx.recv().await? {
            Msg::Control(Command::Refused { kind, .. }) => assert_eq!(kind, expected),
            other => panic!("unexpected msg: {other:?}"),
        }
    }

    assert_eq!(coordinator.window().accepted, 0);
    assert_eq!(coordinator.stats().accepted + coordinator.stats().rejected, 0);

    // a reply-only message from a participant ends the connection
    tx.send(&Msg::Control(Command::Accepted { current_round: 0 }))
        .await?;
    let msg: Msg = rx.recv().await?;
    assert!(matches!(msg, Msg::Err(_)));

    assert!(server.run().await.is_ok());
    assert_eq!(server.connections(), 0);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_disconnects_participants() -> std::io::Result<()> {
    let coordinator = restored(0, vec![0.]);
    let mut server = CoordinatorServer::new(CoordinatorHandle::new(coordinator.clone()));

    let (sv_stream, pt_stream) = io::duplex(BUF_SIZE);
    let (rx, tx) = io::split(sv_stream);
    let (rx, tx) = comms::channel(rx, tx);
    server.spawn(rx, tx);

    let (rx, tx) = io::split(pt_stream);
    let (mut rx, _tx) = comms::channel(rx, tx);

    coordinator.shutdown();

    let msg: Msg = rx.recv().await?;
    assert!(matches!(msg, Msg::Control(Command::Disconnect)));
    server.run().await
}
