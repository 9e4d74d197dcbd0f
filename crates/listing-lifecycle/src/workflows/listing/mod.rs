//! Listing lifecycle engine: publication states, moderation, and change notifications.

pub mod domain;
pub mod lifecycle;
pub mod moderation;
pub mod notifications;
pub mod repository;
pub mod router;
pub mod service;
pub mod storage;

#[cfg(test)]
mod tests;

pub use domain::{
    Listing, ListingContent, ListingId, ListingValidationError, Property, User, UserRole,
};
pub use lifecycle::{
    LifecycleError, ListingState, ListingStateMachine, Operation, TransitionOutcome,
};
pub use moderation::{
    ForbiddenTermsRule, ModerationConfig, PriceRange, PriceRangeRule, Rejection, RuleOutcome,
    ValidationPipeline, ValidationRule, Verdict,
};
pub use notifications::{
    AuditEntry, AuditObserver, AuditSink, ChangeObserver, ChannelTransports, DeliveryError,
    FileAuditSink, LoggingTransport, MessageTransport, NotificationChannel, NotificationObserver,
    ObserverError, TracingAuditSink,
};
pub use repository::{ListingRepository, ListingView, RepositoryError};
pub use router::listing_router;
pub use service::{ListingDraft, ListingService, ListingServiceError};
pub use storage::{CsvListingRepository, CsvListingStore, ListingRecord, StoreError};
