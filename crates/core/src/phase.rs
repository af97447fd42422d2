//! Lifecycle of a single import attempt.
//!
//! ```text
//! Requested -> Validating -> Materializing -> Loading -> Reconciling -> Committed
//!                   |              |             |            |
//!                   v              +-------------+------------+--> RolledBack
//!                Rejected
//! ```
//!
//! Query imports go straight from `Materializing` to `Committed`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Requested,
    Validating,
    Materializing,
    Loading,
    Reconciling,
    Committed,
    Rejected,
    RolledBack,
}

impl ImportPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Validating => "validating",
            Self::Materializing => "materializing",
            Self::Loading => "loading",
            Self::Reconciling => "reconciling",
            Self::Committed => "committed",
            Self::Rejected => "rejected",
            Self::RolledBack => "rolled_back",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Rejected | Self::RolledBack)
    }

    /// Whether a transaction is open while in this phase.
    pub fn in_transaction(&self) -> bool {
        matches!(self, Self::Materializing | Self::Loading | Self::Reconciling)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: ImportPhase) -> bool {
        use ImportPhase::*;
        matches!(
            (self, next),
            (Requested, Validating)
                | (Requested | Validating, Rejected)
                | (Validating, Materializing)
                | (Materializing, Loading)
                | (Materializing, Committed)
                | (Loading, Reconciling)
                | (Reconciling, Committed)
                | (Materializing | Loading | Reconciling, RolledBack)
        )
    }

    /// Terminal phase for a failure observed while in `self`.
    pub fn failure_phase(&self) -> ImportPhase {
        if self.in_transaction() {
            Self::RolledBack
        } else {
            Self::Rejected
        }
    }
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
