//! Capabilities the owning vbucket supplies to its durability monitor.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::SeqNo;

/// Partition identifier. Stable for the lifetime of the bucket.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vbid(u16);

impl Vbid {
    pub fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Vbid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vb_{}", self.0)
    }
}

impl fmt::Debug for Vbid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vbid({})", self.0)
    }
}

/// Replication role of a vbucket, as rendered in stats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VBucketState {
    Active,
    Replica,
    Pending,
    Dead,
}

impl VBucketState {
    pub fn as_str(self) -> &'static str {
        match self {
            VBucketState::Active => "active",
            VBucketState::Replica => "replica",
            VBucketState::Pending => "pending",
            VBucketState::Dead => "dead",
        }
    }
}

impl fmt::Display for VBucketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a durability monitor needs from its owning vbucket.
///
/// `persistence_seqno` is the highest seqno durably on local storage and is
/// non-decreasing over time. `send_seqno_ack` is always invoked outside the
/// monitor's state lock, so the ack transport may take its own locks or do
/// I/O without deadlocking an observer.
pub trait VBucket: Send + Sync {
    fn id(&self) -> Vbid;
    fn state(&self) -> VBucketState;
    fn persistence_seqno(&self) -> SeqNo;
    fn send_seqno_ack(&self, seqno: SeqNo);
}
