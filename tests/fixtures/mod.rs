//! Shared test doubles for the durability monitor suite.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use vbucket_durability::{
    DocKey, Level, SeqNo, Timeout, TrackedWrite, VBucket, VBucketState, Vbid,
};

/// VBucket double that records outbound seqno acks and lets tests move the
/// persistence seqno by hand.
#[derive(Debug, Default)]
pub struct RecordingVBucket {
    persistence_seqno: AtomicU64,
    acks: Mutex<Vec<SeqNo>>,
}

impl RecordingVBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_persistence_seqno(&self, seqno: SeqNo) {
        self.persistence_seqno.store(seqno.get(), Ordering::SeqCst);
    }

    pub fn acks(&self) -> Vec<SeqNo> {
        self.acks.lock().expect("acks lock poisoned").clone()
    }
}

impl VBucket for RecordingVBucket {
    fn id(&self) -> Vbid {
        Vbid::new(0)
    }

    fn state(&self) -> VBucketState {
        VBucketState::Replica
    }

    fn persistence_seqno(&self) -> SeqNo {
        SeqNo::new(self.persistence_seqno.load(Ordering::SeqCst))
    }

    fn send_seqno_ack(&self, seqno: SeqNo) {
        self.acks.lock().expect("acks lock poisoned").push(seqno);
    }
}

pub fn prepare(key: &str, seqno: u64, level: Level) -> TrackedWrite {
    TrackedWrite::new(
        DocKey::from(key),
        SeqNo::new(seqno),
        level,
        Timeout::Millis(1000),
    )
}
