//! Post-transition observers and the outbound channels they deliver through.

mod audit;
mod channel;
mod forwarder;

pub use audit::{AuditEntry, AuditObserver, AuditSink, FileAuditSink, TracingAuditSink};
pub use channel::{
    ChannelTransports, DeliveryError, LoggingTransport, MessageTransport, NotificationChannel,
};
pub use forwarder::NotificationObserver;

use std::fmt::Debug;

use super::domain::Listing;
use super::lifecycle::ListingState;

/// Handler invoked synchronously after every committed transition.
pub trait ChangeObserver: Debug + Send + Sync {
    fn on_state_changed(
        &self,
        listing: &Listing,
        from: ListingState,
        to: ListingState,
    ) -> Result<(), ObserverError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("observer '{observer}' failed: {reason}")]
    Failed { observer: String, reason: String },
}
