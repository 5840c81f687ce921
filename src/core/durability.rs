//! Durability requirement vocabulary: levels, timeouts, resolutions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Durability level requested for a sync write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    /// No durability requirement. Part of the wire vocabulary, but never
    /// legal for a prepare tracked on a replica.
    None,
    /// Satisfied once the snapshot containing the prepare is fully received.
    Majority,
    /// Persistence is the active's concern; replicas treat this like
    /// `Majority`.
    MajorityAndPersistOnMaster,
    /// Satisfied only once the enclosing snapshot is durably persisted.
    PersistToMajority,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::None => "none",
            Level::Majority => "majority",
            Level::MajorityAndPersistOnMaster => "majorityAndPersistOnMaster",
            Level::PersistToMajority => "persistToMajority",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sync write timeout as sent by the active node.
///
/// The active replaces the bucket-wide default with an explicit value before
/// streaming a prepare; observing `BucketDefault` on a replica means the
/// caller skipped that step. Replicas never enforce the timeout themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeout {
    BucketDefault,
    Infinite,
    Millis(u64),
}

impl Timeout {
    pub fn is_default(self) -> bool {
        matches!(self, Timeout::BucketDefault)
    }
}

/// Terminal resolution of a prepare, decided by the active node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Commit,
    Abort,
    /// The active collapsed several resolutions for the same key into one
    /// that no longer names this prepare; the prepare is retired without
    /// counting as either commit or abort.
    CompletionWasDeduped,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Commit => "commit",
            Resolution::Abort => "abort",
            Resolution::CompletionWasDeduped => "completionWasDeduped",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
