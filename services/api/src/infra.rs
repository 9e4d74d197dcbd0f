use listing_lifecycle::config::StorageConfig;
use listing_lifecycle::workflows::listing::{
    AuditObserver, AuditSink, ChangeObserver, ChannelTransports, FileAuditSink, Listing,
    ListingId, ListingRepository, NotificationObserver, RepositoryError, TracingAuditSink,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryListingRepository {
    listings: Arc<Mutex<BTreeMap<ListingId, Listing>>>,
}

impl ListingRepository for InMemoryListingRepository {
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
        if guard.contains_key(listing.id()) {
            guard.insert(listing.id().clone(), listing);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        let guard = self.listings.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Listing>, RepositoryError> {
        let guard = self.listings.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

/// Audit trail first, then the advertiser notification.
pub(crate) fn standard_observers(
    storage: &StorageConfig,
    transports: ChannelTransports,
) -> Vec<Arc<dyn ChangeObserver>> {
    let mut sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(TracingAuditSink)];
    if let Some(path) = &storage.audit_log {
        sinks.push(Arc::new(FileAuditSink::new(path.clone())));
    }

    vec![
        Arc::new(AuditObserver::new(sinks)),
        Arc::new(NotificationObserver::new(transports)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use listing_lifecycle::workflows::listing::{
        ListingContent, NotificationChannel, Property, User, UserRole,
    };

    fn listing() -> Listing {
        Listing::new(
            ListingContent {
                title: "Loja no Chiado".to_string(),
                price: 250_000,
                description: None,
                photos: Vec::new(),
            },
            Arc::new(Property {
                area_sq_m: 48.0,
                address: "Rua Garrett 40".to_string(),
                city: "Lisboa".to_string(),
            }),
            Arc::new(User {
                id: "usr-rita".to_string(),
                name: "Rita Lopes".to_string(),
                role: UserRole::Agency,
                email: Some("rita@agencia.example".to_string()),
                phone: None,
                chat_handle: None,
                channel: Some(NotificationChannel::Email),
            }),
        )
        .expect("valid listing")
    }

    #[test]
    fn repository_rejects_duplicates_and_unknown_updates() {
        let repository = InMemoryListingRepository::default();
        let listing = listing();

        repository.insert(listing.clone()).expect("insert");
        assert!(matches!(
            repository.insert(listing.clone()),
            Err(RepositoryError::Conflict)
        ));
        assert!(matches!(
            repository.update(self::listing()),
            Err(RepositoryError::NotFound)
        ));
        assert_eq!(repository.list().expect("list").len(), 1);
    }

    #[test]
    fn standard_observers_audit_before_notifying() {
        let storage = StorageConfig {
            audit_log: None,
            listing_store: None,
        };
        let observers = standard_observers(&storage, ChannelTransports::logging());

        assert_eq!(observers.len(), 2);
        assert!(format!("{:?}", observers[0]).starts_with("AuditObserver"));
        assert!(format!("{:?}", observers[1]).starts_with("NotificationObserver"));
    }
}
