//! Sequence numbers and the strictly-monotonic cursor cell.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sequence number assigned by the active node's mutation stream.
///
/// `ZERO` is the "nothing observed yet" value used by the high prepared and
/// high completed seqnos before any cursor advance; prepares themselves
/// always carry a positive seqno.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeqNo(u64);

impl SeqNo {
    pub const ZERO: SeqNo = SeqNo(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> SeqNo {
        SeqNo(self.0.checked_add(1).expect("seqno overflow computing next"))
    }
}

impl fmt::Debug for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNo({})", self.0)
    }
}

impl fmt::Display for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SeqNo> for u64 {
    fn from(value: SeqNo) -> u64 {
        value.0
    }
}

/// Seqno cell that only moves strictly forward.
///
/// `advance_to` panics on a non-strict update: a cursor that fails to make
/// progress indicates a protocol bug, and the process must not limp on with
/// corrupted durability state. `reset` is the rollback escape hatch and the
/// single place the check is bypassed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MonotonicSeqno(SeqNo);

impl MonotonicSeqno {
    pub fn new(value: SeqNo) -> Self {
        Self(value)
    }

    pub fn get(self) -> SeqNo {
        self.0
    }

    pub fn advance_to(&mut self, next: SeqNo) {
        assert!(
            next > self.0,
            "non-monotonic seqno advance: {next} after {}",
            self.0
        );
        self.0 = next;
    }

    pub fn reset(&mut self, value: SeqNo) {
        self.0 = value;
    }
}
