use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lifecycle::ListingState;
use super::notifications::{ChangeObserver, NotificationChannel, ObserverError};

/// Opaque listing identifier, assigned once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(pub String);

impl ListingId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Photo references are stored joined by this separator, so it may not appear inside one.
pub(crate) const PHOTO_SEPARATOR: &str = "|";

static LISTING_SEQUENCE: AtomicU64 = AtomicU64::new(1);

const LISTING_ID_PREFIX: &str = "lst-";

fn next_listing_id() -> ListingId {
    let id = LISTING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ListingId(format!("{LISTING_ID_PREFIX}{id:06}"))
}

/// Keeps freshly generated ids ahead of ids restored from storage.
fn reserve_listing_id(id: &ListingId) {
    if let Some(sequence) = id
        .0
        .strip_prefix(LISTING_ID_PREFIX)
        .and_then(|raw| raw.parse::<u64>().ok())
    {
        LISTING_SEQUENCE.fetch_max(sequence.saturating_add(1), Ordering::Relaxed);
    }
}

/// Property value object referenced by a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub area_sq_m: f64,
    pub address: String,
    pub city: String,
}

impl Property {
    /// Admission gate applied when a listing first leaves `Draft`.
    pub fn is_valid(&self) -> bool {
        self.area_sq_m > 0.0 && !self.address.trim().is_empty() && !self.city.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Owner,
    Agent,
    Agency,
    Buyer,
    Admin,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            UserRole::Owner => "owner",
            UserRole::Agent => "agent",
            UserRole::Agency => "agency",
            UserRole::Buyer => "buyer",
            UserRole::Admin => "admin",
        }
    }

    /// Only owners, agents and agencies may advertise a listing.
    pub const fn may_advertise(self) -> bool {
        matches!(self, UserRole::Owner | UserRole::Agent | UserRole::Agency)
    }
}

/// Account referenced by a listing as its advertiser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: UserRole,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub chat_handle: Option<String>,
    #[serde(default)]
    pub channel: Option<NotificationChannel>,
}

impl User {
    pub fn channel(&self) -> Option<NotificationChannel> {
        self.channel
    }

    pub fn set_channel(&mut self, channel: Option<NotificationChannel>) {
        self.channel = channel;
    }
}

/// Editable content of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingContent {
    pub title: String,
    pub price: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

/// Construction-time validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListingValidationError {
    #[error("listing title must not be empty")]
    EmptyTitle,
    #[error("listing price must be greater than zero")]
    NonPositivePrice,
    #[error("a user with role '{}' may not advertise a listing", .0.label())]
    AdvertiserNotAllowed(UserRole),
    #[error("property must have a positive area and a non-empty address and city")]
    InvalidProperty,
    #[error("photo reference '{0}' must be non-empty and must not contain '|'")]
    InvalidPhotoReference(String),
}

/// The aggregate under lifecycle control.
///
/// State is only changed by [`super::lifecycle::ListingStateMachine`]; observers are
/// owned here and may be registered at any time.
#[derive(Debug, Clone)]
pub struct Listing {
    id: ListingId,
    content: ListingContent,
    property: Arc<Property>,
    advertiser: Arc<User>,
    state: ListingState,
    created_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
    observers: Vec<Arc<dyn ChangeObserver>>,
}

impl Listing {
    /// Build a new `Draft` listing with a freshly assigned id.
    pub fn new(
        mut content: ListingContent,
        property: Arc<Property>,
        advertiser: Arc<User>,
    ) -> Result<Self, ListingValidationError> {
        content.description = non_blank(content.description);
        validate_content(&content, &advertiser)?;

        Ok(Self {
            id: next_listing_id(),
            content,
            property,
            advertiser,
            state: ListingState::Draft,
            created_at: Utc::now(),
            published_at: None,
            observers: Vec::new(),
        })
    }

    /// Rebuild a listing from persisted parts. The state is taken as-is.
    pub fn restore(
        id: ListingId,
        mut content: ListingContent,
        property: Arc<Property>,
        advertiser: Arc<User>,
        state: ListingState,
        created_at: DateTime<Utc>,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ListingValidationError> {
        content.description = non_blank(content.description);
        validate_content(&content, &advertiser)?;
        reserve_listing_id(&id);

        Ok(Self {
            id,
            content,
            property,
            advertiser,
            state,
            created_at,
            published_at,
            observers: Vec::new(),
        })
    }

    pub fn id(&self) -> &ListingId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.content.title
    }

    pub fn price(&self) -> u64 {
        self.content.price
    }

    pub fn description(&self) -> Option<&str> {
        self.content.description.as_deref()
    }

    pub fn photos(&self) -> &[String] {
        &self.content.photos
    }

    pub fn content(&self) -> &ListingContent {
        &self.content
    }

    pub fn property(&self) -> &Property {
        &self.property
    }

    pub fn advertiser(&self) -> &User {
        &self.advertiser
    }

    pub fn state(&self) -> ListingState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    /// A blank description is stored as no description.
    pub fn set_description(&mut self, description: Option<String>) {
        self.content.description = non_blank(description);
    }

    pub fn set_price(&mut self, price: u64) -> Result<(), ListingValidationError> {
        if price == 0 {
            return Err(ListingValidationError::NonPositivePrice);
        }
        self.content.price = price;
        Ok(())
    }

    pub fn add_photo(
        &mut self,
        reference: impl Into<String>,
    ) -> Result<(), ListingValidationError> {
        let reference = reference.into();
        validate_photo(&reference)?;
        self.content.photos.push(reference);
        Ok(())
    }

    /// Swap the advertiser reference, e.g. after the user changed their channel.
    pub fn set_advertiser(&mut self, advertiser: Arc<User>) -> Result<(), ListingValidationError> {
        if !advertiser.role.may_advertise() {
            return Err(ListingValidationError::AdvertiserNotAllowed(advertiser.role));
        }
        self.advertiser = advertiser;
        Ok(())
    }

    pub fn register_observer(&mut self, observer: Arc<dyn ChangeObserver>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub(crate) fn commit_state(&mut self, next: ListingState) {
        if next == ListingState::Moderation && self.published_at.is_none() {
            self.published_at = Some(Utc::now());
        }
        self.state = next;
    }

    pub(crate) fn overwrite_state(&mut self, state: ListingState) {
        self.state = state;
    }

    /// Fan out a committed transition in registration order, stopping at the first failure.
    pub(crate) fn notify_observers(
        &self,
        from: ListingState,
        to: ListingState,
    ) -> Result<(), ObserverError> {
        for observer in &self.observers {
            observer.on_state_changed(self, from, to)?;
        }
        Ok(())
    }
}

fn validate_content(
    content: &ListingContent,
    advertiser: &User,
) -> Result<(), ListingValidationError> {
    if content.title.trim().is_empty() {
        return Err(ListingValidationError::EmptyTitle);
    }
    if content.price == 0 {
        return Err(ListingValidationError::NonPositivePrice);
    }
    if !advertiser.role.may_advertise() {
        return Err(ListingValidationError::AdvertiserNotAllowed(advertiser.role));
    }
    content.photos.iter().try_for_each(|photo| validate_photo(photo))
}

fn validate_photo(reference: &str) -> Result<(), ListingValidationError> {
    if reference.trim().is_empty() || reference.contains(PHOTO_SEPARATOR) {
        return Err(ListingValidationError::InvalidPhotoReference(reference.to_string()));
    }
    Ok(())
}

fn non_blank(description: Option<String>) -> Option<String> {
    description.filter(|text| !text.trim().is_empty())
}
