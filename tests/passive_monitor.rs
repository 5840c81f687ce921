//! End-to-end scenarios for the passive durability monitor.

mod fixtures;

use std::sync::Arc;

use vbucket_durability::{
    DocKey, DurabilityError, ErrorKind, Level, PassiveDurabilityMonitor, Resolution, RollbackResult,
    SeqNo, StatSink,
};

use fixtures::{RecordingVBucket, prepare};

fn seqnos(values: &[u64]) -> Vec<SeqNo> {
    values.iter().copied().map(SeqNo::new).collect()
}

#[test]
fn majority_prepare_is_acked_once_its_snapshot_completes() {
    let vb = Arc::new(RecordingVBucket::new());
    let monitor = PassiveDurabilityMonitor::new(vb.clone());

    monitor
        .add_sync_write(prepare("a", 10, Level::Majority))
        .unwrap();
    assert_eq!(monitor.high_prepared_seqno(), SeqNo::ZERO);

    monitor.notify_snapshot_end_received(SeqNo::new(10));

    assert_eq!(monitor.high_prepared_seqno(), SeqNo::new(10));
    assert_eq!(monitor.high_completed_seqno(), SeqNo::ZERO);
    assert_eq!(monitor.num_tracked(), 1);
    assert_eq!(monitor.num_accepted(), 1);
    assert_eq!(vb.acks(), seqnos(&[10]));
}

#[test]
fn persist_to_majority_fences_the_hps_until_persisted() {
    let vb = Arc::new(RecordingVBucket::new());
    let monitor = PassiveDurabilityMonitor::new(vb.clone());

    monitor
        .add_sync_write(prepare("a", 10, Level::Majority))
        .unwrap();
    monitor
        .add_sync_write(prepare("b", 20, Level::PersistToMajority))
        .unwrap();

    monitor.notify_snapshot_end_received(SeqNo::new(20));
    assert_eq!(monitor.high_prepared_seqno(), SeqNo::new(10));
    assert_eq!(vb.acks(), seqnos(&[10]));

    vb.set_persistence_seqno(SeqNo::new(20));
    monitor.notify_local_persistence();
    assert_eq!(monitor.high_prepared_seqno(), SeqNo::new(20));
    assert_eq!(vb.acks(), seqnos(&[10, 20]));
}

#[test]
fn completions_apply_in_order_and_garbage_collect() {
    let vb = Arc::new(RecordingVBucket::new());
    let monitor = PassiveDurabilityMonitor::new(vb.clone());

    for (key, seqno) in [("a", 10), ("b", 20), ("c", 30)] {
        monitor
            .add_sync_write(prepare(key, seqno, Level::Majority))
            .unwrap();
    }
    monitor.notify_snapshot_end_received(SeqNo::new(30));
    assert_eq!(monitor.high_prepared_seqno(), SeqNo::new(30));

    monitor
        .complete_sync_write(&DocKey::from("a"), Resolution::Commit)
        .unwrap();
    assert_eq!(monitor.high_completed_seqno(), SeqNo::new(10));
    assert_eq!(monitor.num_tracked(), 2);

    monitor
        .complete_sync_write(&DocKey::from("b"), Resolution::Abort)
        .unwrap();
    assert_eq!(monitor.high_completed_seqno(), SeqNo::new(20));
    assert_eq!(monitor.num_committed(), 1);
    assert_eq!(monitor.num_aborted(), 1);

    monitor
        .complete_sync_write(&DocKey::from("c"), Resolution::Commit)
        .unwrap();
    assert_eq!(monitor.high_completed_seqno(), SeqNo::new(30));
    assert_eq!(monitor.num_tracked(), 0);
    assert_eq!(monitor.num_committed(), 2);
}

#[test]
fn out_of_order_completion_is_rejected_without_side_effects() {
    let vb = Arc::new(RecordingVBucket::new());
    let monitor = PassiveDurabilityMonitor::new(vb);

    for (key, seqno) in [("a", 10), ("b", 20), ("c", 30)] {
        monitor
            .add_sync_write(prepare(key, seqno, Level::Majority))
            .unwrap();
    }
    monitor.notify_snapshot_end_received(SeqNo::new(30));

    let err = monitor
        .complete_sync_write(&DocKey::from("b"), Resolution::Commit)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LogicError);
    assert!(matches!(
        err,
        DurabilityError::CompletionKeyMismatch { .. }
    ));

    assert_eq!(monitor.high_completed_seqno(), SeqNo::ZERO);
    assert_eq!(monitor.num_committed(), 0);
    assert_eq!(monitor.num_aborted(), 0);
    assert_eq!(monitor.num_tracked(), 3);
}

#[test]
fn completion_with_no_waiting_prepare_is_a_logic_error() {
    let vb = Arc::new(RecordingVBucket::new());
    let monitor = PassiveDurabilityMonitor::new(vb);

    // Completed before any snapshot end, so the prepare is still tracked
    // and the completed cursor already stands on the last element.
    monitor
        .add_sync_write(prepare("a", 10, Level::Majority))
        .unwrap();
    monitor
        .complete_sync_write(&DocKey::from("a"), Resolution::Commit)
        .unwrap();
    assert_eq!(monitor.num_tracked(), 1);

    let err = monitor
        .complete_sync_write(&DocKey::from("b"), Resolution::Commit)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LogicError);
    assert!(matches!(err, DurabilityError::NothingToComplete { .. }));
}

#[test]
fn deduped_completion_retires_without_counting() {
    let vb = Arc::new(RecordingVBucket::new());
    let monitor = PassiveDurabilityMonitor::new(vb);

    monitor
        .add_sync_write(prepare("a", 10, Level::Majority))
        .unwrap();
    monitor.notify_snapshot_end_received(SeqNo::new(10));

    monitor
        .complete_sync_write(&DocKey::from("a"), Resolution::CompletionWasDeduped)
        .unwrap();
    assert_eq!(monitor.high_completed_seqno(), SeqNo::new(10));
    assert_eq!(monitor.num_tracked(), 0);
    assert_eq!(monitor.num_committed(), 0);
    assert_eq!(monitor.num_aborted(), 0);
}

#[test]
fn rollback_truncates_and_forces_both_cursors() {
    let vb = Arc::new(RecordingVBucket::new());
    let monitor = PassiveDurabilityMonitor::new(vb);

    for (key, seqno) in [("a", 10), ("b", 20), ("c", 30)] {
        monitor
            .add_sync_write(prepare(key, seqno, Level::Majority))
            .unwrap();
    }
    monitor.notify_snapshot_end_received(SeqNo::new(30));
    assert_eq!(monitor.high_prepared_seqno(), SeqNo::new(30));

    let result = RollbackResult {
        high_seqno: SeqNo::new(15),
        high_prepared_seqno: SeqNo::new(15),
        high_completed_seqno: SeqNo::new(10),
        prepares_to_add: Vec::new(),
    };
    monitor.post_process_rollback(&result);

    assert_eq!(monitor.num_tracked(), 1);
    assert_eq!(monitor.high_prepared_seqno(), SeqNo::new(15));
    assert_eq!(monitor.high_completed_seqno(), SeqNo::new(10));
}

#[test]
fn rollback_replays_uncompleted_prepares_and_is_idempotent() {
    let vb = Arc::new(RecordingVBucket::new());
    let monitor = PassiveDurabilityMonitor::new(vb);

    for (key, seqno) in [("d", 40), ("e", 50)] {
        monitor
            .add_sync_write(prepare(key, seqno, Level::Majority))
            .unwrap();
    }

    // Commits for seqnos 20 and 30 were rolled away; 20 is at or below the
    // new high completed seqno and must not resurface.
    let result = RollbackResult {
        high_seqno: SeqNo::new(45),
        high_prepared_seqno: SeqNo::new(40),
        high_completed_seqno: SeqNo::new(20),
        prepares_to_add: vec![
            prepare("b", 20, Level::Majority),
            prepare("c", 30, Level::PersistToMajority),
        ],
    };

    monitor.post_process_rollback(&result);
    let first = monitor.status();
    assert_eq!(first.num_tracked, 2); // c@30 replayed, d@40 kept, e@50 gone
    assert_eq!(first.high_prepared_seqno, SeqNo::new(40));
    assert_eq!(first.high_completed_seqno, SeqNo::new(20));

    monitor.post_process_rollback(&result);
    assert_eq!(monitor.status(), first);
}

#[test]
fn acks_are_deduplicated_across_flushes() {
    let vb = Arc::new(RecordingVBucket::new());
    let monitor = PassiveDurabilityMonitor::new(vb.clone());

    monitor
        .add_sync_write(prepare("a", 10, Level::PersistToMajority))
        .unwrap();

    monitor.notify_snapshot_end_received(SeqNo::new(10));
    assert_eq!(monitor.high_prepared_seqno(), SeqNo::ZERO);
    assert_eq!(vb.acks(), Vec::<SeqNo>::new());

    vb.set_persistence_seqno(SeqNo::new(10));
    monitor.notify_local_persistence();
    assert_eq!(monitor.high_prepared_seqno(), SeqNo::new(10));
    assert_eq!(vb.acks(), seqnos(&[10]));

    monitor.notify_local_persistence();
    assert_eq!(vb.acks(), seqnos(&[10]));
}

#[test]
fn warmup_seeds_outstanding_prepares_in_order() {
    let vb = Arc::new(RecordingVBucket::new());
    let outstanding = vec![
        prepare("a", 10, Level::Majority),
        prepare("b", 20, Level::PersistToMajority),
        prepare("c", 30, Level::Majority),
    ];
    let monitor = PassiveDurabilityMonitor::with_outstanding_prepares(vb.clone(), outstanding);

    assert_eq!(monitor.num_tracked(), 3);
    // Warmup seeding bypasses the accepted counter: these prepares were
    // counted when they first arrived, before the restart.
    assert_eq!(monitor.num_accepted(), 0);
    assert_eq!(monitor.high_prepared_seqno(), SeqNo::ZERO);

    // The recovered prepares behave like freshly tracked ones.
    vb.set_persistence_seqno(SeqNo::new(30));
    monitor.notify_snapshot_end_received(SeqNo::new(30));
    assert_eq!(monitor.high_prepared_seqno(), SeqNo::new(30));
    assert_eq!(vb.acks(), seqnos(&[30]));
}

#[test]
fn stats_are_keyed_by_vbucket_id() {
    let vb = Arc::new(RecordingVBucket::new());
    let monitor = PassiveDurabilityMonitor::new(vb);

    monitor
        .add_sync_write(prepare("a", 10, Level::Majority))
        .unwrap();
    monitor.notify_snapshot_end_received(SeqNo::new(10));

    let mut sink: Vec<(String, String)> = Vec::new();
    monitor.add_stats(&mut sink);

    assert_eq!(
        sink,
        vec![
            ("vb_0:state".to_string(), "replica".to_string()),
            ("vb_0:high_prepared_seqno".to_string(), "10".to_string()),
            ("vb_0:high_completed_seqno".to_string(), "0".to_string()),
        ]
    );
}

#[test]
fn stat_sink_failures_are_absorbed() {
    use tracing_subscriber::util::SubscriberInitExt;

    struct FailingSink;

    impl StatSink for FailingSink {
        fn add_stat(&mut self, _key: &str, _value: &str) -> std::io::Result<()> {
            Err(std::io::Error::other("sink closed"))
        }
    }

    let _guard = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::WARN)
        .finish()
        .set_default();

    let vb = Arc::new(RecordingVBucket::new());
    let monitor = PassiveDurabilityMonitor::new(vb);
    monitor.add_stats(&mut FailingSink);
}

#[test]
fn status_snapshot_serializes_stably() {
    let vb = Arc::new(RecordingVBucket::new());
    let monitor = PassiveDurabilityMonitor::new(vb);

    monitor
        .add_sync_write(prepare("a", 10, Level::Majority))
        .unwrap();
    monitor.notify_snapshot_end_received(SeqNo::new(10));

    let rendered = serde_json::to_value(monitor.status()).unwrap();
    assert_eq!(
        rendered,
        serde_json::json!({
            "vbid": 0,
            "state": "replica",
            "high_prepared_seqno": 10,
            "high_completed_seqno": 0,
            "num_tracked": 1,
        })
    );
}
