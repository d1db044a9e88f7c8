//! Installation state of a security profile
//!
//! The same five values describe a single node's progress and the aggregate
//! progress of the whole cluster. They carry two unrelated structures:
//!
//! - a total order ([`ProfileState::rank`]) used to fold many node states
//!   into one, where the lowest rank wins;
//! - a lifecycle ([`ProfileState::can_transition_to`]) that a node agent
//!   walks through for its own record.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub enum ProfileState {
    /// The profile is pending installation.
    #[default]
    Pending,
    /// The profile is being installed.
    InProgress,
    /// The profile was installed successfully.
    Installed,
    /// The profile is being removed and is currently terminating.
    Terminating,
    /// The profile couldn't be installed.
    Error,
}

impl ProfileState {
    /// Every state, in rank order.
    pub const ALL: [ProfileState; 5] = [
        ProfileState::Error,
        ProfileState::Pending,
        ProfileState::InProgress,
        ProfileState::Installed,
        ProfileState::Terminating,
    ];

    /// Aggregation rank. `Error` must always be the lowest.
    pub const fn rank(self) -> u8 {
        match self {
            ProfileState::Error => 0,
            ProfileState::Pending => 1,
            ProfileState::InProgress => 2,
            ProfileState::Installed => 3,
            ProfileState::Terminating => 4,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ProfileState::Pending => "Pending",
            ProfileState::InProgress => "InProgress",
            ProfileState::Installed => "Installed",
            ProfileState::Terminating => "Terminating",
            ProfileState::Error => "Error",
        }
    }

    /// The "lowest common state" of two states.
    ///
    /// If one of three nodes has installed a profile and the other two are
    /// still pending, the overall state is pending.
    pub fn lower_of(self, candidate: ProfileState) -> ProfileState {
        if candidate.rank() < self.rank() {
            candidate
        } else {
            self
        }
    }

    /// Whether a node record may move from `self` to `next`.
    ///
    /// Writing the current state again is always allowed.
    pub fn can_transition_to(self, next: ProfileState) -> bool {
        use ProfileState::*;

        if self == next {
            return true;
        }

        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Installed)
                | (Pending | InProgress | Installed, Terminating)
                | (_, Error)
                | (Error, Pending)
        )
    }
}

impl Ord for ProfileState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for ProfileState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ProfileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown profile state: {0}")]
pub struct ParseProfileStateError(pub String);

impl FromStr for ProfileState {
    type Err = ParseProfileStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProfileState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ParseProfileStateError(s.to_string()))
    }
}

/// Fold any number of states into the one with the lowest rank.
///
/// Returns `None` for an empty input; there is no default aggregate.
pub fn fold_states<I>(states: I) -> Option<ProfileState>
where
    I: IntoIterator<Item = ProfileState>,
{
    states.into_iter().reduce(ProfileState::lower_of)
}
