use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::workflows::listing::domain::{
    Listing, ListingContent, ListingId, Property, User, UserRole,
};
use crate::workflows::listing::lifecycle::{ListingState, ListingStateMachine};
use crate::workflows::listing::moderation::{ModerationConfig, PriceRange, ValidationPipeline};
use crate::workflows::listing::notifications::{
    AuditEntry, AuditSink, ChangeObserver, DeliveryError, MessageTransport, NotificationChannel,
    ObserverError,
};
use crate::workflows::listing::repository::{ListingRepository, RepositoryError};
use crate::workflows::listing::service::{ListingDraft, ListingService};

pub(super) const CLEAN_DESCRIPTION: &str = "Sunny two-bedroom flat close to the river";

pub(super) fn property() -> Property {
    Property {
        area_sq_m: 72.5,
        address: "Rua das Flores 12".to_string(),
        city: "Lisboa".to_string(),
    }
}

pub(super) fn invalid_property() -> Property {
    Property {
        area_sq_m: 0.0,
        ..property()
    }
}

pub(super) fn advertiser(channel: Option<NotificationChannel>) -> User {
    User {
        id: "usr-ana".to_string(),
        name: "Ana Costa".to_string(),
        role: UserRole::Agent,
        email: Some("ana@imobiliaria.example".to_string()),
        phone: Some("+351910000000".to_string()),
        chat_handle: None,
        channel,
    }
}

pub(super) fn content(description: &str, price: u64) -> ListingContent {
    ListingContent {
        title: "T2 Alfama".to_string(),
        price,
        description: Some(description.to_string()),
        photos: vec!["photos/t2-alfama/living.jpg".to_string()],
    }
}

pub(super) fn draft_listing() -> Listing {
    Listing::new(
        content(CLEAN_DESCRIPTION, 500_000),
        Arc::new(property()),
        Arc::new(advertiser(None)),
    )
    .expect("valid listing")
}

/// Listing already sitting in `state`, as if loaded from storage.
pub(super) fn listing_in(state: ListingState, description: &str, price: u64) -> Listing {
    listing_in_with(state, description, price, advertiser(None))
}

pub(super) fn listing_in_with(
    state: ListingState,
    description: &str,
    price: u64,
    user: User,
) -> Listing {
    static SEQUENCE: AtomicUsize = AtomicUsize::new(1);
    let id = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    Listing::restore(
        ListingId(format!("fixture-{id}")),
        content(description, price),
        Arc::new(property()),
        Arc::new(user),
        state,
        Utc::now(),
        None,
    )
    .expect("valid listing")
}

pub(super) fn moderation_config() -> ModerationConfig {
    ModerationConfig {
        forbidden_terms: vec!["golpe".to_string()],
        price_range: PriceRange {
            min: 1_000,
            max: 2_000_000,
        },
    }
}

pub(super) fn machine() -> ListingStateMachine {
    ListingStateMachine::new(ValidationPipeline::from_config(&moderation_config()))
}

pub(super) fn draft_request(description: &str, price: u64) -> ListingDraft {
    ListingDraft {
        content: content(description, price),
        property: property(),
        advertiser: advertiser(None),
    }
}

pub(super) type EventLog = Arc<Mutex<Vec<(String, ListingState, ListingState)>>>;

/// Observer appending `(label, from, to)` to a log that may be shared between observers.
#[derive(Debug)]
pub(super) struct RecordingObserver {
    label: String,
    log: EventLog,
}

impl RecordingObserver {
    pub(super) fn new(label: &str, log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            log,
        })
    }
}

impl ChangeObserver for RecordingObserver {
    fn on_state_changed(
        &self,
        _listing: &Listing,
        from: ListingState,
        to: ListingState,
    ) -> Result<(), ObserverError> {
        self.log
            .lock()
            .expect("event log mutex poisoned")
            .push((self.label.clone(), from, to));
        Ok(())
    }
}

#[derive(Debug)]
pub(super) struct FailingObserver;

impl ChangeObserver for FailingObserver {
    fn on_state_changed(
        &self,
        _listing: &Listing,
        _from: ListingState,
        _to: ListingState,
    ) -> Result<(), ObserverError> {
        Err(ObserverError::Failed {
            observer: "failing".to_string(),
            reason: "webhook offline".to_string(),
        })
    }
}

pub(super) fn events(log: &EventLog) -> Vec<(String, ListingState, ListingState)> {
    log.lock().expect("event log mutex poisoned").clone()
}

#[derive(Debug, Default)]
pub(super) struct RecordingTransport {
    deliveries: Mutex<Vec<(String, String)>>,
}

impl RecordingTransport {
    pub(super) fn deliveries(&self) -> Vec<(String, String)> {
        self.deliveries
            .lock()
            .expect("transport mutex poisoned")
            .clone()
    }
}

impl MessageTransport for RecordingTransport {
    fn deliver(&self, recipient: &str, text: &str) -> Result<(), DeliveryError> {
        self.deliveries
            .lock()
            .expect("transport mutex poisoned")
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }
}

#[derive(Debug)]
pub(super) struct FailingTransport;

impl MessageTransport for FailingTransport {
    fn deliver(&self, _recipient: &str, _text: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::Transport {
            channel: NotificationChannel::Sms,
            reason: "gateway timeout".to_string(),
        })
    }
}

#[derive(Debug, Default)]
pub(super) struct MemoryAuditSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryAuditSink {
    pub(super) fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn name(&self) -> &str {
        "memory"
    }

    fn append(&self, entry: &AuditEntry) -> io::Result<()> {
        self.lines
            .lock()
            .expect("audit mutex poisoned")
            .push(entry.render());
        Ok(())
    }
}

#[derive(Debug)]
pub(super) struct BrokenAuditSink;

impl AuditSink for BrokenAuditSink {
    fn name(&self) -> &str {
        "broken"
    }

    fn append(&self, _entry: &AuditEntry) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume"))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) listings: Arc<Mutex<HashMap<ListingId, Listing>>>,
    pub(super) updates: Arc<AtomicUsize>,
}

impl ListingRepository for MemoryRepository {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError> {
        let mut guard = self.listings.lock().expect("repository mutex poisoned");
        if guard.contains_key(listing.id()) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(listing.id().clone(), listing.clone());
        Ok(listing)
    }

    fn update(&self, listing: Listing) -> Result<(), RepositoryError> {
        let mut guard = self.listings.lock().expect("repository mutex poisoned");
        guard.insert(listing.id().clone(), listing);
        self.updates.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        let guard = self.listings.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Listing>, RepositoryError> {
        let guard = self.listings.lock().expect("repository mutex poisoned");
        let mut listings: Vec<Listing> = guard.values().cloned().collect();
        listings.sort_by(|left, right| left.id().cmp(right.id()));
        Ok(listings)
    }
}

pub(super) fn build_service(
    observers: Vec<Arc<dyn ChangeObserver>>,
) -> (ListingService<MemoryRepository>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = ListingService::new(repository.clone(), Arc::new(machine()), observers);
    (service, repository)
}

pub(super) fn scratch_path(name: &str) -> PathBuf {
    static SEQUENCE: AtomicUsize = AtomicUsize::new(0);
    let dir = std::env::temp_dir().join(format!(
        "listing-lifecycle-{}-{}",
        std::process::id(),
        SEQUENCE.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir.join(name)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
