use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::table::{self, Operation};

/// Publication state of a listing. `Draft` is the initial state, `Sold` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingState {
    #[default]
    Draft,
    Moderation,
    Active,
    Suspended,
    Sold,
}

impl ListingState {
    pub const fn all() -> [Self; 5] {
        [
            Self::Draft,
            Self::Moderation,
            Self::Active,
            Self::Suspended,
            Self::Sold,
        ]
    }

    /// Persisted name. Round-trips through [`ListingState::restore`].
    pub const fn name(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Moderation => "Moderation",
            Self::Active => "Active",
            Self::Suspended => "Suspended",
            Self::Sold => "Sold",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sold)
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::all()
            .into_iter()
            .find(|state| state.name().eq_ignore_ascii_case(name))
    }

    /// Lenient recovery from a persisted name: anything unrecognized becomes `Draft`.
    pub fn restore(name: &str) -> Self {
        match Self::parse(name) {
            Some(state) => state,
            None => {
                warn!(
                    persisted = name,
                    fallback = Self::Draft.name(),
                    "unknown persisted listing state, falling back to draft"
                );
                Self::Draft
            }
        }
    }

    pub fn allowed_operations(self) -> Vec<Operation> {
        Operation::all()
            .into_iter()
            .filter(|operation| table::target(self, *operation).is_some())
            .collect()
    }
}

impl fmt::Display for ListingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
