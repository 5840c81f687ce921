#![forbid(unsafe_code)]

//! Replica-side durability tracking for a replicated key-value bucket.
//!
//! Each replica vbucket owns one [`PassiveDurabilityMonitor`]. Prepares
//! streamed from the active node are tracked until they become locally
//! satisfied (and thus ackable) and until the active resolves them; a
//! rollback rebuilds the tracked state from what survived on disk.

pub mod core;
pub mod monitor;
pub mod stats;
pub mod vbucket;

pub use crate::core::{
    DocKey, DurabilityError, ErrorKind, Level, MonotonicSeqno, Resolution, SeqNo, Timeout,
};
pub use crate::monitor::{
    DurabilityMonitor, MonitorStatus, PassiveDurabilityMonitor, RollbackResult, TrackedWrite,
};
pub use crate::stats::StatSink;
pub use crate::vbucket::{VBucket, VBucketState, Vbid};
