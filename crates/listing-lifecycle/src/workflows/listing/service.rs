use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;

use super::domain::{Listing, ListingContent, ListingId, ListingValidationError, Property, User};
use super::lifecycle::{LifecycleError, ListingStateMachine, Operation, TransitionOutcome};
use super::notifications::ChangeObserver;
use super::repository::{ListingRepository, RepositoryError};

/// Inbound payload for a new listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingDraft {
    #[serde(flatten)]
    pub content: ListingContent,
    pub property: Property,
    pub advertiser: User,
}

/// Service composing the repository, the state machine, and the standard observers.
///
/// Operations on one listing id are serialized through a per-id lock; different
/// listings proceed independently.
pub struct ListingService<R> {
    repository: Arc<R>,
    machine: Arc<ListingStateMachine>,
    observers: Vec<Arc<dyn ChangeObserver>>,
    locks: Mutex<HashMap<ListingId, Arc<Mutex<()>>>>,
}

impl<R> ListingService<R>
where
    R: ListingRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        machine: Arc<ListingStateMachine>,
        observers: Vec<Arc<dyn ChangeObserver>>,
    ) -> Self {
        Self {
            repository,
            machine,
            observers,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn machine(&self) -> &ListingStateMachine {
        &self.machine
    }

    /// Create a `Draft` listing and attach the standard observers.
    pub fn create(&self, draft: ListingDraft) -> Result<Listing, ListingServiceError> {
        let ListingDraft {
            content,
            property,
            advertiser,
        } = draft;

        let mut listing = Listing::new(content, Arc::new(property), Arc::new(advertiser))?;
        for observer in &self.observers {
            listing.register_observer(Arc::clone(observer));
        }

        let stored = self.repository.insert(listing)?;
        Ok(stored)
    }

    pub fn get(&self, id: &ListingId) -> Result<Listing, ListingServiceError> {
        let listing = self.repository.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        Ok(listing)
    }

    pub fn list(&self) -> Result<Vec<Listing>, ListingServiceError> {
        Ok(self.repository.list()?)
    }

    /// Apply one operation and persist the result.
    ///
    /// A committed transition is persisted even when an observer fails afterwards. When the
    /// write itself fails the error still carries the committed outcome.
    pub fn apply(
        &self,
        id: &ListingId,
        operation: Operation,
    ) -> Result<(Listing, TransitionOutcome), ListingServiceError> {
        let lock = self.lock_for(id);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.apply_locked(id, operation)
        };
        self.release_lock(id, lock);
        result
    }

    fn apply_locked(
        &self,
        id: &ListingId,
        operation: Operation,
    ) -> Result<(Listing, TransitionOutcome), ListingServiceError> {
        let mut listing = self.repository.fetch(id)?.ok_or(RepositoryError::NotFound)?;

        match self.machine.apply(&mut listing, operation) {
            Ok(outcome) => {
                self.persist_committed(listing.clone(), &outcome)?;
                Ok((listing, outcome))
            }
            Err(LifecycleError::Observer { outcome, source }) => {
                self.persist_committed(listing, &outcome)?;
                Err(LifecycleError::Observer { outcome, source }.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn persist_committed(
        &self,
        listing: Listing,
        outcome: &TransitionOutcome,
    ) -> Result<(), ListingServiceError> {
        self.repository
            .update(listing)
            .map_err(|source| ListingServiceError::Persistence {
                outcome: outcome.clone(),
                source,
            })
    }

    fn lock_for(&self, id: &ListingId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    /// Drop the per-id lock once no other caller holds or waits on it.
    fn release_lock(&self, id: &ListingId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if locks
            .get(id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(id);
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ListingServiceError {
    #[error(transparent)]
    Validation(#[from] ListingValidationError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(
        "listing moved from {} to {} but could not be saved: {source}",
        .outcome.from,
        .outcome.to
    )]
    Persistence {
        outcome: TransitionOutcome,
        source: RepositoryError,
    },
}
