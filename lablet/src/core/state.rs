//! Completion state of a script component.

use std::fmt;
use std::num::NonZeroU32;

/// Ordered completion state.
///
/// `Inactive < Ongoing < Done < Outcome(n)`. Anything at or above `Done` counts
/// as complete for gating. `Outcome(n)` is a completed state that routes the
/// active chain to the successor registered for branch `n` instead of the
/// ordinary next component (branch 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentState {
    #[default]
    Inactive,
    Ongoing,
    Done,
    Outcome(NonZeroU32),
}

impl ComponentState {
    const INACTIVE_CODE: i64 = -2;
    const ONGOING_CODE: i64 = -1;
    const DONE_CODE: i64 = 0;

    /// Completed state for branch `outcome`; branch 0 is plain `Done`.
    pub fn outcome(outcome: u32) -> Self {
        match NonZeroU32::new(outcome) {
            Some(n) => Self::Outcome(n),
            None => Self::Done,
        }
    }

    pub fn is_done(self) -> bool {
        self >= Self::Done
    }

    /// Successor slot selected by this state, if it is a completed state.
    pub fn branch(self) -> Option<u32> {
        match self {
            Self::Inactive | Self::Ongoing => None,
            Self::Done => Some(0),
            Self::Outcome(n) => Some(n.get()),
        }
    }

    /// Integer code used in persisted archives.
    pub fn code(self) -> i64 {
        match self {
            Self::Inactive => Self::INACTIVE_CODE,
            Self::Ongoing => Self::ONGOING_CODE,
            Self::Done => Self::DONE_CODE,
            Self::Outcome(n) => i64::from(n.get()),
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            Self::INACTIVE_CODE => Some(Self::Inactive),
            Self::ONGOING_CODE => Some(Self::Ongoing),
            Self::DONE_CODE => Some(Self::Done),
            n => u32::try_from(n)
                .ok()
                .and_then(NonZeroU32::new)
                .map(Self::Outcome),
        }
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => f.write_str("inactive"),
            Self::Ongoing => f.write_str("ongoing"),
            Self::Done => f.write_str("done"),
            Self::Outcome(n) => write!(f, "outcome {n}"),
        }
    }
}
