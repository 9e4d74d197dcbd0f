use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use super::common::*;
use crate::workflows::listing::domain::{ListingId, ListingValidationError, UserRole};
use crate::workflows::listing::lifecycle::{LifecycleError, ListingState, Operation};
use crate::workflows::listing::notifications::ChangeObserver;
use crate::workflows::listing::repository::{ListingRepository, RepositoryError};
use crate::workflows::listing::service::{ListingService, ListingServiceError};
use crate::workflows::listing::storage::{CsvListingRepository, CsvListingStore};

#[test]
fn create_attaches_standard_observers() {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let observers: Vec<Arc<dyn ChangeObserver>> =
        vec![RecordingObserver::new("audit", log.clone())];
    let (service, repository) = build_service(observers);

    let listing = service
        .create(draft_request(CLEAN_DESCRIPTION, 500_000))
        .expect("listing created");

    assert_eq!(listing.state(), ListingState::Draft);
    assert_eq!(listing.observer_count(), 1);
    let stored = repository
        .fetch(listing.id())
        .expect("fetch")
        .expect("stored");
    assert_eq!(stored.title(), "T2 Alfama");
}

#[test]
fn create_rejects_non_advertisers() {
    let (service, _) = build_service(Vec::new());
    let mut draft = draft_request(CLEAN_DESCRIPTION, 500_000);
    draft.advertiser.role = UserRole::Buyer;

    match service.create(draft) {
        Err(ListingServiceError::Validation(ListingValidationError::AdvertiserNotAllowed(
            UserRole::Buyer,
        ))) => {}
        other => panic!("expected advertiser validation error, got {other:?}"),
    }
}

#[test]
fn apply_persists_each_successful_transition() {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let observers: Vec<Arc<dyn ChangeObserver>> =
        vec![RecordingObserver::new("audit", log.clone())];
    let (service, repository) = build_service(observers);
    let listing = service
        .create(draft_request(CLEAN_DESCRIPTION, 500_000))
        .expect("listing created");

    let (submitted, outcome) = service
        .apply(listing.id(), Operation::Submit)
        .expect("submit");
    assert_eq!(outcome.to, ListingState::Moderation);
    assert_eq!(submitted.state(), ListingState::Moderation);

    let (approved, _) = service
        .apply(listing.id(), Operation::Approve)
        .expect("approve");
    assert_eq!(approved.state(), ListingState::Active);

    let stored = service.get(listing.id()).expect("stored");
    assert_eq!(stored.state(), ListingState::Active);
    assert_eq!(repository.updates.load(Ordering::Relaxed), 2);
    assert_eq!(events(&log).len(), 2);
}

#[test]
fn invalid_transition_is_not_persisted() {
    let (service, repository) = build_service(Vec::new());
    let listing = service
        .create(draft_request(CLEAN_DESCRIPTION, 500_000))
        .expect("listing created");

    match service.apply(listing.id(), Operation::Sell) {
        Err(ListingServiceError::Lifecycle(LifecycleError::InvalidTransition {
            operation: Operation::Sell,
            state: ListingState::Draft,
        })) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
    assert_eq!(repository.updates.load(Ordering::Relaxed), 0);
    assert_eq!(
        service.get(listing.id()).expect("stored").state(),
        ListingState::Draft
    );
}

#[test]
fn observer_failure_still_persists_committed_state() {
    let observers: Vec<Arc<dyn ChangeObserver>> = vec![Arc::new(FailingObserver)];
    let (service, repository) = build_service(observers);
    let listing = service
        .create(draft_request(CLEAN_DESCRIPTION, 500_000))
        .expect("listing created");

    match service.apply(listing.id(), Operation::Submit) {
        Err(ListingServiceError::Lifecycle(LifecycleError::Observer { outcome, .. })) => {
            assert_eq!(outcome.to, ListingState::Moderation);
        }
        other => panic!("expected observer failure, got {other:?}"),
    }
    assert_eq!(repository.updates.load(Ordering::Relaxed), 1);
    assert_eq!(
        service.get(listing.id()).expect("stored").state(),
        ListingState::Moderation
    );
}

#[test]
fn service_moderates_with_the_configured_rules() {
    let (service, _) = build_service(Vec::new());
    assert_eq!(
        service.machine().pipeline().rule_names(),
        vec!["forbidden_terms", "price_range"]
    );
}

#[test]
fn unknown_listing_is_not_found() {
    let (service, _) = build_service(Vec::new());

    match service.apply(&ListingId("lst-missing".to_string()), Operation::Submit) {
        Err(ListingServiceError::Repository(RepositoryError::NotFound)) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn concurrent_operations_on_one_listing_are_serialized() {
    let (service, _) = build_service(Vec::new());
    let service = Arc::new(service);
    let listing = service
        .create(draft_request(CLEAN_DESCRIPTION, 500_000))
        .expect("listing created");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            let id = listing.id().clone();
            std::thread::spawn(move || service.apply(&id, Operation::Submit).is_ok())
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker thread"))
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(
        service.get(listing.id()).expect("stored").state(),
        ListingState::Moderation
    );
    assert_eq!(service.tracked_locks(), 0);
}

#[test]
fn lock_table_is_emptied_after_each_operation() {
    let (service, _) = build_service(Vec::new());

    for attempt in 0..1_000 {
        let id = ListingId(format!("lst-unknown-{attempt}"));
        assert!(service.apply(&id, Operation::Submit).is_err());
    }
    assert_eq!(service.tracked_locks(), 0);

    let listing = service
        .create(draft_request(CLEAN_DESCRIPTION, 500_000))
        .expect("listing created");
    service
        .apply(listing.id(), Operation::Submit)
        .expect("submit");
    assert_eq!(service.tracked_locks(), 0);
}

#[test]
fn failed_save_reports_committed_outcome() {
    let dir = scratch_path("service-store");
    std::fs::create_dir_all(&dir).expect("store dir");
    let repository = Arc::new(
        CsvListingRepository::open(CsvListingStore::new(dir.join("listings.csv")), &[])
            .expect("open"),
    );
    let service = ListingService::new(repository, Arc::new(machine()), Vec::new());
    let listing = service
        .create(draft_request(CLEAN_DESCRIPTION, 500_000))
        .expect("listing created");

    std::fs::remove_dir_all(&dir).expect("remove store dir");

    match service.apply(listing.id(), Operation::Submit) {
        Err(ListingServiceError::Persistence {
            outcome,
            source: RepositoryError::Unavailable(_),
        }) => {
            assert_eq!(outcome.from, ListingState::Draft);
            assert_eq!(outcome.to, ListingState::Moderation);
        }
        other => panic!("expected persistence failure, got {other:?}"),
    }
    assert_eq!(
        service.get(listing.id()).expect("stored").state(),
        ListingState::Draft
    );
}
