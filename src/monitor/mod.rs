//! Durability monitors.
//!
//! Only the replica-side (passive) monitor lives here. The active-side
//! monitor is owned by the active node; replicas see its decisions as
//! snapshot markers and completions, never the monitor itself.

use std::fmt;

use crate::core::SeqNo;
use crate::stats::StatSink;

pub mod passive;
mod state;
mod tracked;

pub use passive::{MonitorStatus, PassiveDurabilityMonitor, RollbackResult};
pub use tracked::TrackedWrite;

/// Observer surface common to durability monitors.
pub trait DurabilityMonitor: fmt::Display {
    fn high_prepared_seqno(&self) -> SeqNo;
    fn num_tracked(&self) -> usize;
    fn num_accepted(&self) -> u64;
    fn num_committed(&self) -> u64;
    fn num_aborted(&self) -> u64;
    fn add_stats(&self, sink: &mut dyn StatSink);
}

impl DurabilityMonitor for PassiveDurabilityMonitor {
    fn high_prepared_seqno(&self) -> SeqNo {
        PassiveDurabilityMonitor::high_prepared_seqno(self)
    }

    fn num_tracked(&self) -> usize {
        PassiveDurabilityMonitor::num_tracked(self)
    }

    fn num_accepted(&self) -> u64 {
        PassiveDurabilityMonitor::num_accepted(self)
    }

    fn num_committed(&self) -> u64 {
        PassiveDurabilityMonitor::num_committed(self)
    }

    fn num_aborted(&self) -> u64 {
        PassiveDurabilityMonitor::num_aborted(self)
    }

    fn add_stats(&self, sink: &mut dyn StatSink) {
        PassiveDurabilityMonitor::add_stats(self, sink)
    }
}
