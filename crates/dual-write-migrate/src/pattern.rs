//! Migration phase patterns and the shared atomic pattern flag.
//!
//! A migration moves through four phases, ordered by progress:
//!
//! `SourceOnly → SourceFirst → TargetFirst → TargetOnly`
//!
//! Exactly one pattern is active at any instant. The flag is a single
//! [`AtomicU8`] so that every statement pays one atomic load and a pattern
//! update is one atomic store; no lock ever spans a statement.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{DualWriteError, Result};

/// Which of the two stores a call is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The pre-migration system of record.
    Base,
    /// The post-migration destination store.
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Base => write!(f, "base"),
            Side::Target => write!(f, "target"),
        }
    }
}

/// Dual-write migration phase controlling read/write routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// All reads and writes go to base only.
    SourceOnly,
    /// Writes go to base (authoritative) then target (best-effort); reads from base.
    SourceFirst,
    /// Writes go to target (authoritative) then base (best-effort); reads from target.
    TargetFirst,
    /// All reads and writes go to target only.
    TargetOnly,
}

impl Pattern {
    /// The store whose result is returned to the caller.
    pub fn primary_side(self) -> Side {
        match self {
            Pattern::SourceOnly | Pattern::SourceFirst => Side::Base,
            Pattern::TargetFirst | Pattern::TargetOnly => Side::Target,
        }
    }

    /// The best-effort store, if this phase dual-writes.
    pub fn secondary_side(self) -> Option<Side> {
        match self {
            Pattern::SourceFirst => Some(Side::Target),
            Pattern::TargetFirst => Some(Side::Base),
            Pattern::SourceOnly | Pattern::TargetOnly => None,
        }
    }

    /// The store reads are served from. Always the primary side: the
    /// authoritative store is the one whose data the caller may trust.
    pub fn read_side(self) -> Side {
        self.primary_side()
    }

    /// Operational string form, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Pattern::SourceOnly => "source_only",
            Pattern::SourceFirst => "source_first",
            Pattern::TargetFirst => "target_first",
            Pattern::TargetOnly => "target_only",
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Pattern::SourceOnly => 0,
            Pattern::SourceFirst => 1,
            Pattern::TargetFirst => 2,
            Pattern::TargetOnly => 3,
        }
    }

    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Pattern::SourceOnly),
            1 => Some(Pattern::SourceFirst),
            2 => Some(Pattern::TargetFirst),
            3 => Some(Pattern::TargetOnly),
            _ => None,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pattern {
    type Err = DualWriteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "source_only" => Ok(Pattern::SourceOnly),
            "source_first" => Ok(Pattern::SourceFirst),
            "target_first" => Ok(Pattern::TargetFirst),
            "target_only" => Ok(Pattern::TargetOnly),
            other => Err(DualWriteError::UnknownPattern(other.to_string())),
        }
    }
}

/// Shared pattern flag read by every concurrent proxy call.
///
/// Relaxed ordering is sufficient: the flag carries no data dependency, each
/// call takes a self-consistent snapshot and transactions freeze their copy
/// at begin time.
#[derive(Debug)]
pub struct PatternCell(AtomicU8);

impl PatternCell {
    /// Create a cell holding the given initial pattern.
    pub fn new(pattern: Pattern) -> Self {
        PatternCell(AtomicU8::new(pattern.as_u8()))
    }

    /// Load the current pattern.
    ///
    /// Fails with [`DualWriteError::UnknownPattern`] if the raw flag does not
    /// decode to a known phase, rather than defaulting to either store.
    pub fn load(&self) -> Result<Pattern> {
        let raw = self.0.load(Ordering::Relaxed);
        Pattern::from_u8(raw)
            .ok_or_else(|| DualWriteError::UnknownPattern(format!("raw value {raw}")))
    }

    /// Atomically switch to a new pattern.
    pub fn store(&self, pattern: Pattern) {
        self.0.store(pattern.as_u8(), Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn store_raw(&self, raw: u8) {
        self.0.store(raw, Ordering::Relaxed);
    }
}
