use std::{num::NonZeroUsize, time::Duration};

use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorErr, GlobalModelState, MergeTrigger, MinAccepted,
    SubmitOutcome, SubmitStatus, UpdateSubmission,
};
use tokio::time;

const TIMEOUT_MS: u64 = 500;

fn update(participant_id: u64, round: u64, params: Vec<f64>, samples: u64) -> UpdateSubmission {
    UpdateSubmission {
        participant_id,
        trained_against_round: round,
        parameters: params.into(),
        sample_count: samples,
    }
}

fn timed_config(min_accepted: MinAccepted, params: usize) -> CoordinatorConfig {
    CoordinatorConfig {
        staleness_threshold: 2,
        min_accepted,
        window_timeout_ms: Some(TIMEOUT_MS),
        params,
        ..Default::default()
    }
}

fn fixed(n: usize) -> MinAccepted {
    MinAccepted::Fixed(NonZeroUsize::new(n).unwrap())
}

#[tokio::test(start_paused = true)]
async fn offline_participant_does_not_stall_the_round() {
    let coordinator = Coordinator::new(&timed_config(MinAccepted::KnownParticipants, 2)).unwrap();

    // participant 2 fetches and never comes back
    for id in 0..3 {
        coordinator.fetch(id);
    }

    coordinator.submit(update(0, 0, vec![1., 1.], 1)).unwrap();
    coordinator.submit(update(1, 0, vec![3., 5.], 1)).unwrap();
    assert_eq!(coordinator.round(), 0);

    let round = time::timeout(Duration::from_secs(5), coordinator.wait_for_round(1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(round, 1);
    assert_eq!(coordinator.snapshot().parameters.as_slice(), [2., 3.]);

    let summary = &coordinator.history()[0];
    assert_eq!(summary.trigger, MergeTrigger::Timeout);
    assert_eq!(summary.aggregated_from, 2);
}

#[tokio::test(start_paused = true)]
async fn count_trigger_disarms_the_timeout() {
    let coordinator = Coordinator::new(&timed_config(fixed(2), 1)).unwrap();

    coordinator.submit(update(0, 0, vec![1.], 1)).unwrap();
    coordinator.submit(update(1, 0, vec![2.], 1)).unwrap();
    assert_eq!(coordinator.round(), 1);

    // a single submission of the next window has no timer of the previous one racing it
    time::sleep(Duration::from_millis(TIMEOUT_MS / 2)).await;
    coordinator.submit(update(0, 1, vec![4.], 1)).unwrap();
    time::sleep(Duration::from_millis(TIMEOUT_MS * 3 / 4)).await;
    assert_eq!(coordinator.round(), 1);

    time::sleep(Duration::from_millis(TIMEOUT_MS)).await;
    assert_eq!(coordinator.round(), 2);

    let stats = coordinator.stats();
    assert_eq!((stats.merges, stats.timeouts), (2, 1));
}

#[tokio::test(start_paused = true)]
async fn empty_window_never_times_out() {
    let coordinator = Coordinator::new(&timed_config(fixed(3), 1)).unwrap();

    time::sleep(Duration::from_millis(TIMEOUT_MS * 4)).await;

    assert_eq!(coordinator.round(), 0);
    assert_eq!(coordinator.stats().merges, 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_timeouts() {
    let coordinator = Coordinator::new(&timed_config(fixed(3), 1)).unwrap();

    coordinator.submit(update(0, 0, vec![1.], 1)).unwrap();
    coordinator.shutdown();

    time::sleep(Duration::from_millis(TIMEOUT_MS * 2)).await;
    assert_eq!(coordinator.round(), 0);

    assert!(matches!(
        coordinator.wait_for_round(1).await,
        Err(CoordinatorErr::ShutDown)
    ));
}

#[tokio::test(start_paused = true)]
async fn four_participants_one_stale() {
    let config = timed_config(fixed(4), 3);
    let checkpoint = GlobalModelState {
        round: 3,
        parameters: vec![0.5, 0.5, 0.5].into(),
    };
    let coordinator = Coordinator::restore(&config, checkpoint.clone()).unwrap();

    // C trained against round 0, staleness 3
    let outcome = coordinator.submit(update(2, 0, vec![50., 50., 50.], 100)).unwrap();
    let SubmitOutcome::Rejected { staleness, current } = outcome else {
        panic!("participant C should be rejected");
    };
    assert_eq!(staleness, 3);
    assert_eq!(*current, checkpoint);

    let contributions = [
        (0, 3, vec![1., 2., 3.], 10),
        (1, 2, vec![2., 4., 6.], 20),
        (3, 1, vec![4., 0., -4.], 30),
    ];

    for (id, round, params, samples) in contributions.clone() {
        let outcome = coordinator.submit(update(id, round, params, samples)).unwrap();
        assert_eq!(outcome.status(), SubmitStatus::Accepted);
    }

    assert_eq!(coordinator.window().accepted, 3);
    assert_eq!(coordinator.round(), 3);

    coordinator.wait_for_round(4).await.unwrap();

    let total: u64 = contributions.iter().map(|c| c.3).sum();
    let expected: Vec<f64> = (0..3)
        .map(|j| {
            contributions
                .iter()
                .map(|(_, _, p, w)| p[j] * *w as f64)
                .sum::<f64>()
                / total as f64
        })
        .collect();

    let snapshot = coordinator.fetch(2);
    assert_eq!(snapshot.round, 4);
    for (got, expected) in snapshot.parameters.as_slice().iter().zip(&expected) {
        assert!((got - expected).abs() < 1e-12);
    }

    let summary = &coordinator.history()[0];
    assert_eq!(summary.round, 4);
    assert_eq!(summary.aggregated_from, 3);
    assert_eq!(summary.total_weight, 60);
    assert_eq!(summary.avg_staleness, 1.);
    assert_eq!(coordinator.client(2).unwrap().rejected, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_merges_on_a_multi_threaded_runtime() {
    let config = CoordinatorConfig {
        window_timeout_ms: Some(50),
        ..timed_config(fixed(3), 2)
    };
    let coordinator = Coordinator::new(&config).unwrap();

    coordinator.submit(update(0, 0, vec![2., 4.], 2)).unwrap();

    let round = time::timeout(Duration::from_secs(5), coordinator.wait_for_round(1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(round, 1);
    assert_eq!(coordinator.snapshot().parameters.as_slice(), [2., 4.]);
    assert_eq!(coordinator.stats().timeouts, 1);
}
