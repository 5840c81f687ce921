//! Core vocabulary for durability tracking.
//!
//! Module order follows type dependency order:
//! - seqno: SeqNo and the monotonic cursor cell
//! - key: DocKey
//! - durability: Level, Timeout, Resolution
//! - error: boundary error taxonomy

pub mod durability;
pub mod error;
pub mod key;
pub mod seqno;

pub use durability::{Level, Resolution, Timeout};
pub use error::{DurabilityError, ErrorKind};
pub use key::DocKey;
pub use seqno::{MonotonicSeqno, SeqNo};
