use serde::Serialize;

use super::domain::{Listing, ListingId, Property, UserRole};
use super::lifecycle::{ListingState, Operation};

/// Storage abstraction so the service can run against memory or a durable store.
pub trait ListingRepository: Send + Sync {
    fn insert(&self, listing: Listing) -> Result<Listing, RepositoryError>;
    fn update(&self, listing: Listing) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, RepositoryError>;
    fn list(&self) -> Result<Vec<Listing>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("listing already exists")]
    Conflict,
    #[error("listing not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Advertiser fields safe to expose over the API.
#[derive(Debug, Clone, Serialize)]
pub struct AdvertiserView {
    pub id: String,
    pub name: String,
    pub role: UserRole,
}

/// Serializable snapshot of a listing for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ListingView {
    pub id: ListingId,
    pub title: String,
    pub price: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub photos: Vec<String>,
    pub property: Property,
    pub advertiser: AdvertiserView,
    pub state: ListingState,
    pub allowed_operations: Vec<Operation>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

impl From<&Listing> for ListingView {
    fn from(listing: &Listing) -> Self {
        let advertiser = listing.advertiser();
        Self {
            id: listing.id().clone(),
            title: listing.title().to_string(),
            price: listing.price(),
            description: listing.description().map(str::to_string),
            photos: listing.photos().to_vec(),
            property: listing.property().clone(),
            advertiser: AdvertiserView {
                id: advertiser.id.clone(),
                name: advertiser.name.clone(),
                role: advertiser.role,
            },
            state: listing.state(),
            allowed_operations: listing.state().allowed_operations(),
            created_at: listing.created_at().to_rfc3339(),
            published_at: listing.published_at().map(|at| at.to_rfc3339()),
        }
    }
}
