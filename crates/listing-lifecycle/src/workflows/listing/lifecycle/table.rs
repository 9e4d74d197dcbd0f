use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::state::ListingState;
use super::LifecycleError;
use crate::workflows::listing::domain::ListingValidationError;

/// Transition operations exposed by the lifecycle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Submit,
    Approve,
    Reject,
    Suspend,
    Sell,
    Revise,
}

impl Operation {
    pub const fn all() -> [Self; 6] {
        [
            Self::Submit,
            Self::Approve,
            Self::Reject,
            Self::Suspend,
            Self::Sell,
            Self::Revise,
        ]
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Suspend => "suspend",
            Self::Sell => "sell",
            Self::Revise => "revise",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown listing operation '{0}'")]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        Self::all()
            .into_iter()
            .find(|operation| operation.name().eq_ignore_ascii_case(raw))
            .ok_or_else(|| UnknownOperation(raw.to_string()))
    }
}

/// Guard results gathered before a transition is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionContext {
    pub property_valid: bool,
    pub moderation_accepted: bool,
}

impl Default for TransitionContext {
    fn default() -> Self {
        Self {
            property_valid: true,
            moderation_accepted: true,
        }
    }
}

/// Nominal target of `operation` from `state`, or `None` when the table forbids it.
/// `approve` reports its accepting branch here.
pub const fn target(state: ListingState, operation: Operation) -> Option<ListingState> {
    use ListingState::*;

    match (state, operation) {
        (Draft, Operation::Submit) => Some(Moderation),
        (Moderation, Operation::Approve) => Some(Active),
        (Moderation, Operation::Reject) => Some(Suspended),
        (Draft | Moderation | Active, Operation::Suspend) => Some(Suspended),
        (Active, Operation::Sell) => Some(Sold),
        (Suspended, Operation::Revise) => Some(Draft),
        _ => None,
    }
}

/// Resolve a transition against the table and the gathered guards.
pub fn transition(
    state: ListingState,
    operation: Operation,
    context: &TransitionContext,
) -> Result<ListingState, LifecycleError> {
    let next = target(state, operation)
        .ok_or(LifecycleError::InvalidTransition { operation, state })?;

    match operation {
        Operation::Submit if !context.property_valid => {
            Err(ListingValidationError::InvalidProperty.into())
        }
        Operation::Approve if !context.moderation_accepted => Ok(ListingState::Suspended),
        _ => Ok(next),
    }
}
