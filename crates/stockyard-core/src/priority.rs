use serde::{Deserialize, Serialize};

/// Priority tier of a request or operational priority of a building.
///
/// Tiers are strict: a queue set never serves `Low` while `High` has a
/// servable request, and never serves `Stopped` at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    /// Parked. Requests stay queued but are never selected.
    Stopped,
    #[default]
    Low,
    High,
}

impl Priority {
    /// Number of tiers held by every queue set.
    pub const COUNT: usize = 3;

    /// All tiers in index order.
    pub const ALL: [Priority; Priority::COUNT] = [Priority::Stopped, Priority::Low, Priority::High];

    /// Tiers that are served, highest first.
    pub const SERVED: [Priority; 2] = [Priority::High, Priority::Low];

    /// Index of this tier inside a queue set.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Priority::Stopped => 0,
            Priority::Low => 1,
            Priority::High => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn is_stopped(self) -> bool {
        self == Priority::Stopped
    }
}
