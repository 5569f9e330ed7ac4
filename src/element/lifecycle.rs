use std::fmt;

use serde::Serialize;

/// Transactional state of an in-memory element.
///
/// Transitions only move forward: `New -> Loaded` on commit,
/// `New -> Removed` and `Loaded -> LoadedRemoved` on delete. Nothing leaves a
/// removed state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Created in the current transaction, not yet committed.
    New,
    /// Mirrors storage as of the last read.
    Loaded,
    /// Created and removed in the same transaction; commits to a no-op.
    Removed,
    /// Read from storage and then removed; commits to a delete record.
    LoadedRemoved,
}

impl LifecycleState {
    /// `true` for elements created in this transaction, removed or not.
    pub const fn is_new(self) -> bool {
        matches!(self, LifecycleState::New | LifecycleState::Removed)
    }

    /// `true` for elements materialized from storage, removed or not.
    pub const fn is_loaded(self) -> bool {
        matches!(self, LifecycleState::Loaded | LifecycleState::LoadedRemoved)
    }

    /// `true` immediately after the delete transition, before commit.
    pub const fn is_removed(self) -> bool {
        matches!(self, LifecycleState::Removed | LifecycleState::LoadedRemoved)
    }

    /// State after a delete, or `None` when already terminal.
    pub const fn removed(self) -> Option<Self> {
        match self {
            LifecycleState::New => Some(LifecycleState::Removed),
            LifecycleState::Loaded => Some(LifecycleState::LoadedRemoved),
            LifecycleState::Removed | LifecycleState::LoadedRemoved => None,
        }
    }

    /// State after the owning transaction commits.
    pub const fn committed(self) -> Self {
        match self {
            LifecycleState::New => LifecycleState::Loaded,
            other => other,
        }
    }

    /// Lower-case name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            LifecycleState::New => "new",
            LifecycleState::Loaded => "loaded",
            LifecycleState::Removed => "removed",
            LifecycleState::LoadedRemoved => "loaded_removed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
