//! Replica-side durability monitor.
//!
//! Tracks the prepares a replica has received from the active node, decides
//! when each is locally satisfied, acks progress back via the vbucket, and
//! retires prepares once the active resolves them. Commit/abort decisions
//! are never originated here; the monitor executes the resolutions it is
//! handed.

use std::cmp;
use std::fmt;
use std::io;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::core::{DocKey, DurabilityError, Level, Resolution, SeqNo};
use crate::stats::StatSink;
use crate::vbucket::{VBucket, VBucketState, Vbid};

use super::state::State;
use super::tracked::{Position, TrackedWrite};

/// Rebuilt local state handed over by the storage engine after a rollback.
#[derive(Clone, Debug)]
pub struct RollbackResult {
    /// Seqno the vbucket was truncated to.
    pub high_seqno: SeqNo,
    pub high_prepared_seqno: SeqNo,
    pub high_completed_seqno: SeqNo,
    /// Prepares whose commit or abort was rolled away, ascending by seqno.
    pub prepares_to_add: Vec<TrackedWrite>,
}

/// Introspection snapshot of a monitor, stable for serialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub vbid: Vbid,
    pub state: VBucketState,
    pub high_prepared_seqno: SeqNo,
    pub high_completed_seqno: SeqNo,
    pub num_tracked: usize,
}

pub struct PassiveDurabilityMonitor {
    vb: Arc<dyn VBucket>,
    state: RwLock<State>,
}

impl PassiveDurabilityMonitor {
    /// Empty monitor bound to a vbucket. Both cursors start at `End` with a
    /// zero last-write seqno.
    pub fn new(vb: Arc<dyn VBucket>) -> Self {
        Self {
            vb,
            state: RwLock::new(State::default()),
        }
    }

    /// Rebuild a monitor from the prepares still outstanding on disk at
    /// warmup, ascending by seqno.
    pub fn with_outstanding_prepares(
        vb: Arc<dyn VBucket>,
        outstanding_prepares: Vec<TrackedWrite>,
    ) -> Self {
        let monitor = Self::new(vb);
        {
            let mut state = monitor.state.write().expect("state lock poisoned");
            for prepare in outstanding_prepares {
                // Prepares grandfathered in from disk must already carry the
                // explicit timeout the active sent with them.
                assert!(
                    !prepare.timeout().is_default(),
                    "outstanding prepare for key {} has a default timeout",
                    prepare.key()
                );
                state.tracked_writes.push_back(prepare);
            }
        }
        monitor
    }

    /// Start tracking a prepare. The seqno must extend the container tail;
    /// the active guarantees strictly increasing seqnos per vbucket.
    ///
    /// The high prepared seqno never moves here: a prepare only becomes
    /// ackable once its snapshot is complete or persisted.
    pub fn add_sync_write(&self, write: TrackedWrite) -> Result<(), DurabilityError> {
        if write.level() == Level::None {
            return Err(DurabilityError::LevelNone {
                key: write.key().clone(),
            });
        }
        if write.timeout().is_default() {
            return Err(DurabilityError::DefaultTimeout {
                key: write.key().clone(),
            });
        }

        let mut state = self.state.write().expect("state lock poisoned");
        state.tracked_writes.push_back(write);
        state.total_accepted += 1;
        Ok(())
    }

    /// Record a snapshot-end marker. A complete snapshot may make tracked
    /// prepares locally satisfied, so the high prepared seqno is re-derived
    /// and, if it moved, acked back to the active.
    pub fn notify_snapshot_end_received(&self, snap_end: SeqNo) {
        let persisted = self.vb.persistence_seqno();
        let (prev, hps) = {
            let mut state = self.state.write().expect("state lock poisoned");
            state.snapshot_end = cmp::max(state.snapshot_end, snap_end);
            let prev = state.high_prepared_seqno.last_write_seqno();
            state.update_high_prepared_seqno(persisted);
            (prev, state.high_prepared_seqno.last_write_seqno())
        };
        self.ack_if_moved(prev, hps);
    }

    /// The flusher ran; local persistence may have moved the
    /// durability-fence and unblocked prepares behind it.
    pub fn notify_local_persistence(&self) {
        let persisted = self.vb.persistence_seqno();
        let (prev, hps) = {
            let mut state = self.state.write().expect("state lock poisoned");
            let prev = state.high_prepared_seqno.last_write_seqno();
            state.update_high_prepared_seqno(persisted);
            (prev, state.high_prepared_seqno.last_write_seqno())
        };
        self.ack_if_moved(prev, hps);
    }

    /// Apply the resolution the active decided for the oldest uncompleted
    /// prepare. Completions arrive in seqno order; the key equality check is
    /// the in-order-commit guard and fails loudly on any skew.
    pub fn complete_sync_write(
        &self,
        key: &DocKey,
        resolution: Resolution,
    ) -> Result<(), DurabilityError> {
        let mut guard = self.state.write().expect("state lock poisoned");
        let state = &mut *guard;

        if state.tracked_writes.is_empty() {
            return Err(DurabilityError::NothingTracked {
                resolution,
                key: key.clone(),
            });
        }

        let Some(next) = state
            .tracked_writes
            .next_after(state.high_completed_seqno.position())
        else {
            return Err(DurabilityError::NothingToComplete {
                resolution,
                key: key.clone(),
            });
        };

        if next.key() != key {
            return Err(DurabilityError::CompletionKeyMismatch {
                expected: next.key().clone(),
                resolution,
                key: key.clone(),
            });
        }

        // advance_to updates the last-write seqno before the position, so a
        // monotonicity failure cannot half-update the cursor.
        let seqno = next.seqno();
        state.high_completed_seqno.advance_to(seqno);

        // HCS moved; some prepares may now be eligible for removal.
        state.check_for_and_remove_prepares();

        match resolution {
            Resolution::Commit => state.total_committed += 1,
            Resolution::Abort => state.total_aborted += 1,
            Resolution::CompletionWasDeduped => {}
        }
        Ok(())
    }

    /// Atomically rebuild the monitor after a storage rollback.
    ///
    /// Post-condition: every surviving prepare sits at or below
    /// `result.high_seqno`, the high completed cursor is detached, and the
    /// high prepared cursor stands on the last survivor (everything left is
    /// on disk). Applying the same result twice is a no-op the second time.
    pub fn post_process_rollback(&self, result: &RollbackResult) {
        assert!(
            result.high_completed_seqno <= result.high_prepared_seqno,
            "rollback high completed seqno {} above high prepared seqno {}",
            result.high_completed_seqno,
            result.high_prepared_seqno
        );
        assert!(
            result.high_prepared_seqno <= result.high_seqno,
            "rollback high prepared seqno {} above high seqno {}",
            result.high_prepared_seqno,
            result.high_seqno
        );

        let mut guard = self.state.write().expect("state lock poisoned");
        let state = &mut *guard;

        // Completions rolled away by the storage engine resurface as their
        // original prepares, ascending by seqno. Reverse iteration keeps the
        // container ascending while prepending.
        for prepare in result.prepares_to_add.iter().rev() {
            if prepare.seqno() > result.high_completed_seqno {
                state.tracked_writes.push_front(prepare.clone());
            }
        }

        state.tracked_writes.truncate_after(result.high_seqno);

        // Nothing already completed is tracked post-rollback.
        state
            .high_completed_seqno
            .reset(Position::End, result.high_completed_seqno);

        // Every surviving prepare is on disk, so the high prepared cursor
        // lands on the last element.
        let hps_pos = state
            .tracked_writes
            .last_seqno()
            .map_or(Position::End, Position::At);
        state
            .high_prepared_seqno
            .reset(hps_pos, result.high_prepared_seqno);

        debug!(
            vb = %self.vb.id(),
            high_seqno = %result.high_seqno,
            high_prepared_seqno = %result.high_prepared_seqno,
            high_completed_seqno = %result.high_completed_seqno,
            num_tracked = state.tracked_writes.len(),
            "rebuilt durability state after rollback"
        );
    }

    pub fn high_prepared_seqno(&self) -> SeqNo {
        self.state
            .read()
            .expect("state lock poisoned")
            .high_prepared_seqno
            .last_write_seqno()
    }

    pub fn high_completed_seqno(&self) -> SeqNo {
        self.state
            .read()
            .expect("state lock poisoned")
            .high_completed_seqno
            .last_write_seqno()
    }

    pub fn num_tracked(&self) -> usize {
        self.state
            .read()
            .expect("state lock poisoned")
            .tracked_writes
            .len()
    }

    pub fn num_accepted(&self) -> u64 {
        self.state.read().expect("state lock poisoned").total_accepted
    }

    pub fn num_committed(&self) -> u64 {
        self.state.read().expect("state lock poisoned").total_committed
    }

    pub fn num_aborted(&self) -> u64 {
        self.state.read().expect("state lock poisoned").total_aborted
    }

    pub fn status(&self) -> MonitorStatus {
        let state = self.state.read().expect("state lock poisoned");
        MonitorStatus {
            vbid: self.vb.id(),
            state: self.vb.state(),
            high_prepared_seqno: state.high_prepared_seqno.last_write_seqno(),
            high_completed_seqno: state.high_completed_seqno.last_write_seqno(),
            num_tracked: state.tracked_writes.len(),
        }
    }

    /// Emit the monitor's stats keyed by vbucket id. Sink failures are
    /// logged and absorbed: observability must not take a bucket down.
    pub fn add_stats(&self, sink: &mut dyn StatSink) {
        if let Err(error) = self.try_add_stats(sink) {
            warn!(vb = %self.vb.id(), %error, "error building durability monitor stats");
        }
    }

    fn try_add_stats(&self, sink: &mut dyn StatSink) -> io::Result<()> {
        let status = self.status();
        let vbid = status.vbid;
        sink.add_stat(&format!("{vbid}:state"), status.state.as_str())?;
        sink.add_stat(
            &format!("{vbid}:high_prepared_seqno"),
            &status.high_prepared_seqno.to_string(),
        )?;
        sink.add_stat(
            &format!("{vbid}:high_completed_seqno"),
            &status.high_completed_seqno.to_string(),
        )?;
        Ok(())
    }

    // The HPS may not have moved (e.g. a still-unsatisfied PersistToMajority
    // prepare fences it), and re-acking an unchanged value is legal but
    // wasteful, so only strict increases go out. Called with the state lock
    // released: the ack transport may block without stalling observers.
    fn ack_if_moved(&self, prev: SeqNo, hps: SeqNo) {
        if hps == prev {
            return;
        }
        assert!(
            hps > prev,
            "high prepared seqno regressed from {prev} to {hps}"
        );
        trace!(vb = %self.vb.id(), seqno = %hps, "acking high prepared seqno");
        self.vb.send_seqno_ack(hps);
    }
}

impl fmt::Display for PassiveDurabilityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PassiveDurabilityMonitor[{:p}] high_prepared_seqno:{}",
            self,
            self.high_prepared_seqno()
        )
    }
}

impl fmt::Debug for PassiveDurabilityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassiveDurabilityMonitor")
            .field("vb", &self.vb.id())
            .field("high_prepared_seqno", &self.high_prepared_seqno())
            .field("high_completed_seqno", &self.high_completed_seqno())
            .field("num_tracked", &self.num_tracked())
            .finish()
    }
}
