//! CSV snapshot persistence for listings.
//!
//! The state is stored by name and restored leniently, so a corrupt state column comes
//! back as `Draft` with a warning instead of failing the whole load.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    Listing, ListingContent, ListingId, ListingValidationError, Property, User, UserRole,
    PHOTO_SEPARATOR,
};
use super::lifecycle::ListingState;
use super::notifications::{ChangeObserver, NotificationChannel};
use super::repository::{ListingRepository, RepositoryError};

/// Flat, text-friendly representation of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: String,
    pub title: String,
    pub price: u64,
    pub description: Option<String>,
    pub photos: String,
    pub area_sq_m: f64,
    pub address: String,
    pub city: String,
    pub advertiser_id: String,
    pub advertiser_name: String,
    pub advertiser_role: UserRole,
    pub advertiser_email: Option<String>,
    pub advertiser_phone: Option<String>,
    pub advertiser_chat_handle: Option<String>,
    pub advertiser_channel: Option<NotificationChannel>,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl ListingRecord {
    pub fn from_listing(listing: &Listing) -> Self {
        let property = listing.property();
        let advertiser = listing.advertiser();

        Self {
            id: listing.id().to_string(),
            title: listing.title().to_string(),
            price: listing.price(),
            description: listing.description().map(str::to_string),
            photos: listing.photos().join(PHOTO_SEPARATOR),
            area_sq_m: property.area_sq_m,
            address: property.address.clone(),
            city: property.city.clone(),
            advertiser_id: advertiser.id.clone(),
            advertiser_name: advertiser.name.clone(),
            advertiser_role: advertiser.role,
            advertiser_email: advertiser.email.clone(),
            advertiser_phone: advertiser.phone.clone(),
            advertiser_chat_handle: advertiser.chat_handle.clone(),
            advertiser_channel: advertiser.channel,
            state: listing.state().name().to_string(),
            created_at: listing.created_at(),
            published_at: listing.published_at(),
        }
    }

    /// Rebuild the listing and attach `observers` in order.
    pub fn into_listing(
        self,
        observers: &[Arc<dyn ChangeObserver>],
    ) -> Result<Listing, ListingValidationError> {
        let photos = self
            .photos
            .split(PHOTO_SEPARATOR)
            .filter(|photo| !photo.is_empty())
            .map(str::to_string)
            .collect();

        let content = ListingContent {
            title: self.title,
            price: self.price,
            description: self.description,
            photos,
        };
        let property = Property {
            area_sq_m: self.area_sq_m,
            address: self.address,
            city: self.city,
        };
        let advertiser = User {
            id: self.advertiser_id,
            name: self.advertiser_name,
            role: self.advertiser_role,
            email: self.advertiser_email,
            phone: self.advertiser_phone,
            chat_handle: self.advertiser_chat_handle,
            channel: self.advertiser_channel,
        };

        let mut listing = Listing::restore(
            ListingId(self.id),
            content,
            Arc::new(property),
            Arc::new(advertiser),
            ListingState::restore(&self.state),
            self.created_at,
            self.published_at,
        )?;
        for observer in observers {
            listing.register_observer(Arc::clone(observer));
        }
        Ok(listing)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("listing store io failure: {0}")]
    Io(#[from] io::Error),
    #[error("listing store csv failure: {0}")]
    Csv(#[from] csv::Error),
    #[error("stored listing '{id}' is invalid: {source}")]
    InvalidRecord {
        id: String,
        source: ListingValidationError,
    },
}

/// Whole-file CSV snapshot of every listing.
#[derive(Debug, Clone)]
pub struct CsvListingStore {
    path: PathBuf,
}

impl CsvListingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<ListingRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            records.push(row?);
        }
        Ok(records)
    }

    /// Replace the snapshot atomically via a sibling temp file.
    pub fn save(&self, records: &[ListingRecord]) -> Result<(), StoreError> {
        let staging = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&staging)?;
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

/// Repository keeping listings in memory and rewriting the CSV snapshot on every write.
#[derive(Debug)]
pub struct CsvListingRepository {
    store: CsvListingStore,
    listings: Mutex<BTreeMap<ListingId, Listing>>,
}

impl CsvListingRepository {
    pub fn open(
        store: CsvListingStore,
        observers: &[Arc<dyn ChangeObserver>],
    ) -> Result<Self, StoreError> {
        let mut listings = BTreeMap::new();
        for record in store.load()? {
            let id = record.id.clone();
            let listing = record
                .into_listing(observers)
                .map_err(|source| StoreError::InvalidRecord { id, source })?;
            listings.insert(listing.id().clone(), listing);
        }

        info!(
            path = %store.path().display(),
            count = listings.len(),
            "listing store loaded"
        );

        Ok(Self {
            store,
            listings: Mutex::new(listings),
        })
    }

    fn persist(&self, listings: &BTreeMap<ListingId, Listing>) -> Result<(), RepositoryError> {
        let records: Vec<ListingRecord> = listings
            .values()
            .map(ListingRecord::from_listing)
            .collect();
        self.store
            .save(&records)
            .map_err(|err| RepositoryError::Unavailable(err.to_string()))
    }

    /// Write `listing` into the map and the snapshot, restoring the previous entry when the
    /// snapshot cannot be written.
    fn write_through(
        &self,
        listings: &mut BTreeMap<ListingId, Listing>,
        listing: Listing,
    ) -> Result<(), RepositoryError> {
        let id = listing.id().clone();
        let previous = listings.insert(id.clone(), listing);

        if let Err(err) = self.persist(listings) {
            match previous {
                Some(previous) => listings.insert(id, previous),
                None => listings.remove(&id),
            };
            return Err(err);
        }
        Ok(())
    }
}

impl ListingRepository for CsvListingRepository {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError> {
        let mut guard = self.listings.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.contains_key(listing.id()) {
            return Err(RepositoryError::Conflict);
        }
        self.write_through(&mut guard, listing.clone())?;
        Ok(listing)
    }

    fn update(&self, listing: Listing) -> Result<(), RepositoryError> {
        let mut guard = self.listings.lock().unwrap_or_else(PoisonError::into_inner);
        if !guard.contains_key(listing.id()) {
            return Err(RepositoryError::NotFound);
        }
        self.write_through(&mut guard, listing)
    }

    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError> {
        let guard = self.listings.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Listing>, RepositoryError> {
        let guard = self.listings.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.values().cloned().collect())
    }
}
