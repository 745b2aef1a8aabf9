use std::fmt;

use faceid_vecstore::SearchResult;
use serde::{Deserialize, Serialize};

/// Outcome of a single assignment decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Clear match; the face belongs to the suggested identity.
    AutoAssign,
    /// Plausible match that a human must confirm.
    Review,
    /// No identity is close enough. Not an error.
    Unknown,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoAssign => write!(f, "auto_assign"),
            Self::Review => write!(f, "review"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Output of [`crate::PrototypeAssigner::assign`].
///
/// Persisting it (review queue, rejection list, undo log) is up to the
/// caller; the assigner keeps no record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,

    /// Assigned identity for `AutoAssign`, suggested identity for `Review`,
    /// None for `Unknown`.
    pub identity_id: Option<String>,

    /// Similarity of the best candidate, 0 when there is none.
    pub similarity: f32,

    /// Every candidate at or above the review threshold, best first.
    pub candidates: Vec<SearchResult>,
}

impl Decision {
    pub fn unknown(candidates: Vec<SearchResult>) -> Self {
        Self {
            action: Action::Unknown,
            identity_id: None,
            similarity: 0.0,
            candidates,
        }
    }

    pub fn is_auto_assign(&self) -> bool {
        self.action == Action::AutoAssign
    }

    pub fn needs_review(&self) -> bool {
        self.action == Action::Review
    }
}
