//! Listing state machine: a transition table, the moderation step, and post-commit
//! observer fan-out.
//!
//! Every operation runs to completion synchronously. A failed guard leaves the listing
//! untouched. Observers run only after the new state is committed, so an observer
//! failure never rolls the state back; it surfaces as [`LifecycleError::Observer`]
//! carrying the committed [`TransitionOutcome`].

mod state;
mod table;

pub use state::ListingState;
pub use table::{target, transition, Operation, TransitionContext, UnknownOperation};

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::domain::{Listing, ListingValidationError};
use super::moderation::{Rejection, ValidationPipeline, Verdict};
use super::notifications::ObserverError;

/// Result of a committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub operation: Operation,
    pub from: ListingState,
    pub to: ListingState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

impl TransitionOutcome {
    /// True when `approve` completed into `Suspended` because moderation rejected the listing.
    pub fn is_rejection(&self) -> bool {
        self.rejection.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot {operation} a listing in state {state}")]
    InvalidTransition {
        operation: Operation,
        state: ListingState,
    },
    #[error(transparent)]
    Validation(#[from] ListingValidationError),
    #[error(
        "listing moved from {} to {} but an observer failed: {source}",
        .outcome.from,
        .outcome.to
    )]
    Observer {
        outcome: TransitionOutcome,
        source: ObserverError,
    },
}

/// Applies transition operations to listings.
///
/// The pipeline is read-only during evaluation, so one machine can be shared across
/// threads working on different listings.
#[derive(Debug, Clone)]
pub struct ListingStateMachine {
    pipeline: Arc<ValidationPipeline>,
}

impl ListingStateMachine {
    pub fn new(pipeline: ValidationPipeline) -> Self {
        Self::with_shared_pipeline(Arc::new(pipeline))
    }

    pub fn with_shared_pipeline(pipeline: Arc<ValidationPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &ValidationPipeline {
        &self.pipeline
    }

    pub fn submit(&self, listing: &mut Listing) -> Result<TransitionOutcome, LifecycleError> {
        self.apply(listing, Operation::Submit)
    }

    /// Run moderation. A rejection is a successful call that lands in `Suspended`.
    pub fn approve(&self, listing: &mut Listing) -> Result<TransitionOutcome, LifecycleError> {
        self.apply(listing, Operation::Approve)
    }

    pub fn reject(&self, listing: &mut Listing) -> Result<TransitionOutcome, LifecycleError> {
        self.apply(listing, Operation::Reject)
    }

    pub fn suspend(&self, listing: &mut Listing) -> Result<TransitionOutcome, LifecycleError> {
        self.apply(listing, Operation::Suspend)
    }

    pub fn sell(&self, listing: &mut Listing) -> Result<TransitionOutcome, LifecycleError> {
        self.apply(listing, Operation::Sell)
    }

    pub fn revise(&self, listing: &mut Listing) -> Result<TransitionOutcome, LifecycleError> {
        self.apply(listing, Operation::Revise)
    }

    /// Set the state from a persisted name. Never fails and never notifies observers.
    pub fn restore_state(&self, listing: &mut Listing, name: &str) -> ListingState {
        let state = ListingState::restore(name);
        listing.overwrite_state(state);
        state
    }

    pub fn apply(
        &self,
        listing: &mut Listing,
        operation: Operation,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let from = listing.state();
        if target(from, operation).is_none() {
            return Err(LifecycleError::InvalidTransition {
                operation,
                state: from,
            });
        }

        let mut context = TransitionContext::default();
        let mut rejection = None;
        match operation {
            Operation::Submit => context.property_valid = listing.property().is_valid(),
            Operation::Approve => {
                if let Verdict::Rejected(reason) = self.pipeline.evaluate(listing) {
                    info!(
                        listing_id = %listing.id(),
                        rule = %reason.rule,
                        reason = %reason.reason,
                        "moderation rejected listing"
                    );
                    context.moderation_accepted = false;
                    rejection = Some(reason);
                }
            }
            _ => {}
        }

        let to = transition(from, operation, &context)?;
        listing.commit_state(to);
        info!(
            listing_id = %listing.id(),
            %operation,
            %from,
            %to,
            "listing transition committed"
        );

        let outcome = TransitionOutcome {
            operation,
            from,
            to,
            rejection,
        };

        listing
            .notify_observers(from, to)
            .map_err(|source| LifecycleError::Observer {
                outcome: outcome.clone(),
                source,
            })?;

        Ok(outcome)
    }
}
