// Full round lifecycle driven in-process against the in-memory ledger:
// submissions, penalties, aggregation and trust snapshots.

use fedtrust_core::{
    AggregationResult, AnomalyDetector, ClientUpdate, InMemoryLedger, RoundTracker, SubmitOutcome,
    TrustLedger,
};
use std::sync::Arc;

fn update(id: &str, addr: &str, weights: Vec<f64>) -> ClientUpdate {
    ClientUpdate { client_id: id.into(), client_address: addr.into(), weights }
}

async fn tracker_with_clients(
    initial_model: Vec<f64>,
    clients: &[(&str, &str)],
) -> (Arc<RoundTracker>, Arc<InMemoryLedger>) {
    let ledger = Arc::new(InMemoryLedger::new());
    for (_, addr) in clients {
        ledger.register_client(addr).await.unwrap();
    }
    let tracker = Arc::new(RoundTracker::new(
        initial_model,
        AnomalyDetector::default(),
        ledger.clone(),
    ));
    (tracker, ledger)
}

#[tokio::test]
async fn accepted_updates_stay_within_deviation_threshold() {
    let (tracker, _) =
        tracker_with_clients(vec![0.5, 0.5, 0.5], &[("c1", "0xa"), ("c2", "0xb")]).await;
    let honest = tracker.submit(update("c1", "0xa", vec![0.6, 0.55, 0.52])).await.unwrap();
    assert!(matches!(honest, SubmitOutcome::Accepted { trust: 100, round: 1 }));
    let hostile = tracker.submit(update("c2", "0xb", vec![50.5, 50.5, 50.5])).await.unwrap();
    assert!(matches!(hostile, SubmitOutcome::Penalized { new_trust: 80 }));
}

#[tokio::test]
async fn repeat_offender_drops_below_threshold_and_is_rejected() {
    let (tracker, ledger) =
        tracker_with_clients(vec![0.5, 0.5, 0.5], &[("mal", "0xm"), ("helper", "0xh")]).await;

    // Three penalized rounds: 100 -> 80 -> 60 -> 40. The honest helper keeps
    // the rounds advancing so the offender's submission record resets.
    for _ in 0..3 {
        let out = tracker.submit(update("mal", "0xm", vec![50.5, 50.5, 50.5])).await.unwrap();
        assert!(matches!(out, SubmitOutcome::Penalized { .. }));
        tracker.submit(update("helper", "0xh", vec![0.5, 0.5, 0.5])).await.unwrap();
        assert!(matches!(tracker.aggregate().await, AggregationResult::Complete { .. }));
    }

    assert_eq!(ledger.get_trust("0xm").await.unwrap(), 40);
    assert!(ledger.is_blacklisted("0xm"));
    let out = tracker.submit(update("mal", "0xm", vec![0.5, 0.5, 0.5])).await.unwrap();
    assert_eq!(out, SubmitOutcome::RejectedLowTrust { trust: 40 });
}

#[tokio::test]
async fn aggregation_means_buffer_and_resets_round_state() {
    let (tracker, _) =
        tracker_with_clients(vec![2.0, 2.0, 2.0], &[("a", "0xa"), ("b", "0xb")]).await;
    tracker.submit(update("a", "0xa", vec![1.0, 1.0, 1.0])).await.unwrap();
    tracker.submit(update("b", "0xb", vec![3.0, 3.0, 3.0])).await.unwrap();

    let result = tracker.aggregate().await;
    match result {
        AggregationResult::Complete { new_global_model, next_round, trust_snapshot } => {
            assert_eq!(new_global_model, vec![2.0, 2.0, 2.0]);
            assert_eq!(next_round, 2);
            assert_eq!(trust_snapshot.len(), 2);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    // Buffer and submission record are empty: aggregate is a no-op and the
    // same clients can submit again in the new round.
    assert_eq!(tracker.aggregate().await, AggregationResult::Empty);
    let (round, _) = tracker.current_round();
    assert_eq!(round, 2);
    let out = tracker.submit(update("a", "0xa", vec![2.1, 1.9, 2.0])).await.unwrap();
    assert!(matches!(out, SubmitOutcome::Accepted { round: 2, .. }));
}

#[tokio::test]
async fn trust_history_grows_once_per_participating_round() {
    let (tracker, _) = tracker_with_clients(vec![0.5, 0.5, 0.5], &[("c1", "0xa")]).await;
    for expected_len in 1..=3usize {
        let (_, model) = tracker.current_round();
        tracker.submit(update("c1", "0xa", model)).await.unwrap();
        tracker.aggregate().await;
        let history = tracker.trust_history();
        assert_eq!(history.get("c1").map(Vec::len), Some(expected_len));
    }
}

#[tokio::test]
async fn concurrent_duplicate_submissions_yield_one_outcome() {
    let (tracker, _) = tracker_with_clients(vec![0.5, 0.5, 0.5], &[("c1", "0xa")]).await;
    let (a, b) = tokio::join!(
        tracker.submit(update("c1", "0xa", vec![0.6, 0.55, 0.52])),
        tracker.submit(update("c1", "0xa", vec![0.6, 0.55, 0.52])),
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    assert_eq!(
        outcomes.iter().filter(|o| matches!(o, SubmitOutcome::Accepted { .. })).count(),
        1
    );
    assert_eq!(
        outcomes.iter().filter(|o| matches!(o, SubmitOutcome::AlreadySubmitted)).count(),
        1
    );
}
