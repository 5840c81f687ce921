//! Boundary errors surfaced by the durability monitor.
//!
//! Two categories surface as values: caller contract violations
//! (`InvalidArgument`) and replication protocol violations (`LogicError`).
//! Both leave monitor state untouched. Internal invariant breaches
//! (non-monotonic cursor advance, rollback precondition failure) panic
//! instead: they indicate bugs and must not be swallowed.

use thiserror::Error;

use super::durability::Resolution;
use super::key::DocKey;

/// Classification of a boundary error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller violated a precondition of the operation.
    InvalidArgument,
    /// The replication protocol was violated by the message stream.
    LogicError,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DurabilityError {
    #[error("sync write for key {key} has durability level none")]
    LevelNone { key: DocKey },

    #[error(
        "sync write for key {key} carries the default timeout (the active must send an explicit value)"
    )]
    DefaultTimeout { key: DocKey },

    #[error("no tracked writes, but received {resolution} for key {key}")]
    NothingTracked { resolution: Resolution, key: DocKey },

    #[error("no prepare waiting for completion, but received {resolution} for key {key}")]
    NothingToComplete { resolution: Resolution, key: DocKey },

    #[error("pending resolution for key {expected}, but received unexpected {resolution} for key {key}")]
    CompletionKeyMismatch {
        expected: DocKey,
        resolution: Resolution,
        key: DocKey,
    },
}

impl DurabilityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DurabilityError::LevelNone { .. } | DurabilityError::DefaultTimeout { .. } => {
                ErrorKind::InvalidArgument
            }
            DurabilityError::NothingTracked { .. }
            | DurabilityError::NothingToComplete { .. }
            | DurabilityError::CompletionKeyMismatch { .. } => ErrorKind::LogicError,
        }
    }
}
