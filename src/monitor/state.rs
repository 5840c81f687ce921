//! Trackable durability state: the container, both cursors, and the seqno
//! machinery that moves them.

use std::cmp;

use crate::core::{Level, SeqNo};

use super::tracked::{Cursor, Position, TrackedWrites};

/// Snapshot of everything the monitor tracks, guarded by one readers-writer
/// lock at the facade.
#[derive(Debug, Default)]
pub(crate) struct State {
    pub(crate) tracked_writes: TrackedWrites,
    pub(crate) high_prepared_seqno: Cursor,
    pub(crate) high_completed_seqno: Cursor,
    /// Highest snapshot-end marker received so far.
    pub(crate) snapshot_end: SeqNo,
    pub(crate) total_accepted: u64,
    pub(crate) total_committed: u64,
    pub(crate) total_aborted: u64,
}

impl State {
    /// Move the high prepared seqno as far as the snapshot and
    /// durability-fence rules allow.
    ///
    /// The HPS advances under four constraints:
    /// (1) nothing is acked before the complete snapshot is received;
    /// (2) majority-class prepares are satisfied as soon as the snapshot
    ///     containing them is fully received;
    /// (3) a `PersistToMajority` prepare is a durability-fence, blocking
    ///     everything at and beyond it;
    /// (4) the fence itself moves only once the complete snapshot is
    ///     persisted locally.
    ///
    /// Called on every snapshot-end marker and after every flusher run;
    /// `persisted` is the vbucket's persistence seqno observed by the caller.
    pub(crate) fn update_high_prepared_seqno(&mut self, persisted: SeqNo) {
        if self.tracked_writes.is_empty() {
            return;
        }

        let prev = self.high_prepared_seqno.last_write_seqno();

        // A fully persisted snapshot satisfies every prepare it contains,
        // whatever the level, so walk it blind. This is the only step that
        // moves a durability-fence out of the way.
        if persisted >= self.snapshot_end {
            while let Some(next) = self
                .tracked_writes
                .next_after(self.high_prepared_seqno.position())
            {
                if next.seqno() > self.snapshot_end {
                    break;
                }
                let seqno = next.seqno();
                self.high_prepared_seqno.advance_to(seqno);
            }
        }

        // Walk the received (not necessarily persisted) part of the latest
        // snapshot. Majority-class prepares that sat behind a fence the
        // previous step dissolved become satisfied here; the first
        // `PersistToMajority` prepare is the new fence.
        while let Some(next) = self
            .tracked_writes
            .next_after(self.high_prepared_seqno.position())
        {
            if next.seqno() > self.snapshot_end {
                break;
            }
            let level = next.level();
            assert!(
                level != Level::None,
                "tracked prepare for key {} has durability level none",
                next.key()
            );
            if level == Level::PersistToMajority {
                break;
            }
            let seqno = next.seqno();
            self.high_prepared_seqno.advance_to(seqno);
        }

        let hps = self.high_prepared_seqno.last_write_seqno();
        if hps != prev {
            assert!(hps > prev, "high prepared seqno regressed from {prev} to {hps}");
            self.check_for_and_remove_prepares();
        }
    }

    /// Drop prepares that are both locally satisfied and globally resolved.
    ///
    /// Everything at or below `min(HCS, HPS)` is fully accounted for;
    /// erasing it keeps the container bounded by the number of in-flight
    /// prepares. A cursor standing on an erased element is repositioned to
    /// `End` before the erase, its last-write seqno untouched.
    pub(crate) fn check_for_and_remove_prepares(&mut self) {
        let fence = cmp::min(
            self.high_completed_seqno.last_write_seqno(),
            self.high_prepared_seqno.last_write_seqno(),
        );

        while let Some(front) = self.tracked_writes.first_seqno() {
            if front > fence {
                break;
            }
            if self.high_completed_seqno.position() == Position::At(front) {
                self.high_completed_seqno.detach();
            }
            if self.high_prepared_seqno.position() == Position::At(front) {
                self.high_prepared_seqno.detach();
            }
            self.tracked_writes.pop_front();
        }
    }
}
