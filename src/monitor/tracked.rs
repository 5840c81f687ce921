//! Tracked prepares: the seqno-ordered container and the cursors that walk it.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::core::{DocKey, Level, MonotonicSeqno, SeqNo, Timeout};

/// One outstanding prepare streamed from the active node.
///
/// The timeout is informational on replicas: enforcement, and any abort that
/// falls out of it, lives on the active side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedWrite {
    key: DocKey,
    seqno: SeqNo,
    level: Level,
    timeout: Timeout,
}

impl TrackedWrite {
    pub fn new(key: DocKey, seqno: SeqNo, level: Level, timeout: Timeout) -> Self {
        assert!(
            seqno > SeqNo::ZERO,
            "prepare seqno must be positive, got {seqno}"
        );
        Self {
            key,
            seqno,
            level,
            timeout,
        }
    }

    pub fn key(&self) -> &DocKey {
        &self.key
    }

    pub fn seqno(&self) -> SeqNo {
        self.seqno
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn timeout(&self) -> Timeout {
        self.timeout
    }
}

/// Where a cursor stands in the container.
///
/// `End` doubles as the initial state and the reposition target when the
/// element underneath a cursor is erased; stepping from `End` resumes at the
/// first surviving element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Position {
    #[default]
    End,
    At(SeqNo),
}

/// Iterator-plus-last-seqno pair marking progress through the container.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Cursor {
    pos: Position,
    last_write_seqno: MonotonicSeqno,
}

impl Cursor {
    pub(crate) fn position(&self) -> Position {
        self.pos
    }

    pub(crate) fn last_write_seqno(&self) -> SeqNo {
        self.last_write_seqno.get()
    }

    /// Step onto the element at `seqno`. The last-write seqno is updated
    /// first, so a failed monotonicity check leaves the position untouched.
    pub(crate) fn advance_to(&mut self, seqno: SeqNo) {
        self.last_write_seqno.advance_to(seqno);
        self.pos = Position::At(seqno);
    }

    /// Drop the position back to `End` because the element underneath is
    /// about to be erased. The last-write seqno is deliberately untouched.
    pub(crate) fn detach(&mut self) {
        self.pos = Position::End;
    }

    /// Rollback-only: place the cursor without any monotonicity check.
    pub(crate) fn reset(&mut self, pos: Position, seqno: SeqNo) {
        self.last_write_seqno.reset(seqno);
        self.pos = pos;
    }
}

/// Seqno-ordered container of tracked prepares.
///
/// Keyed by seqno, so a cursor position stays meaningful however many
/// *other* elements are inserted or erased around it. Strict seqno
/// monotonicity across elements is structural: the map is ordered by key and
/// both insert paths assert they extend an end.
#[derive(Debug, Default)]
pub(crate) struct TrackedWrites {
    by_seqno: BTreeMap<SeqNo, TrackedWrite>,
}

impl TrackedWrites {
    pub(crate) fn len(&self) -> usize {
        self.by_seqno.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_seqno.is_empty()
    }

    pub(crate) fn first_seqno(&self) -> Option<SeqNo> {
        self.by_seqno.keys().next().copied()
    }

    pub(crate) fn last_seqno(&self) -> Option<SeqNo> {
        self.by_seqno.keys().next_back().copied()
    }

    /// Append in arrival order. Streamed seqnos are strictly increasing; a
    /// violation here is a protocol bug upstream of the monitor.
    pub(crate) fn push_back(&mut self, write: TrackedWrite) {
        debug_assert!(
            self.last_seqno().is_none_or(|last| write.seqno() > last),
            "appended prepare seqno {} does not extend the tail",
            write.seqno()
        );
        self.by_seqno.insert(write.seqno(), write);
    }

    /// Prepend during rollback replay. The caller feeds prepares in reverse
    /// seqno order, which keeps the container ascending; re-prepending the
    /// current front is a no-op so a replayed rollback stays idempotent.
    pub(crate) fn push_front(&mut self, write: TrackedWrite) {
        debug_assert!(
            self.first_seqno().is_none_or(|first| write.seqno() <= first),
            "prepended prepare seqno {} does not extend the front",
            write.seqno()
        );
        self.by_seqno.insert(write.seqno(), write);
    }

    /// The successor of `pos`. This is the only way to step a cursor
    /// forward: `End` wraps to the first element, so a cursor reset by an
    /// erase resumes scanning from the front.
    pub(crate) fn next_after(&self, pos: Position) -> Option<&TrackedWrite> {
        match pos {
            Position::End => self.by_seqno.values().next(),
            Position::At(seqno) => self
                .by_seqno
                .range((Bound::Excluded(seqno), Bound::Unbounded))
                .map(|(_, write)| write)
                .next(),
        }
    }

    pub(crate) fn pop_front(&mut self) -> Option<TrackedWrite> {
        self.by_seqno.pop_first().map(|(_, write)| write)
    }

    /// Erase every element with seqno strictly above `seqno`.
    pub(crate) fn truncate_after(&mut self, seqno: SeqNo) {
        let _ = self.by_seqno.split_off(&seqno.next());
    }

    #[cfg(test)]
    pub(crate) fn seqnos(&self) -> Vec<SeqNo> {
        self.by_seqno.keys().copied().collect()
    }
}
