use tracing::{debug, warn};

use super::channel::ChannelTransports;
use super::{ChangeObserver, ObserverError};
use crate::workflows::listing::domain::Listing;
use crate::workflows::listing::lifecycle::ListingState;

/// Tells the advertiser about a transition through their configured channel.
#[derive(Debug, Clone)]
pub struct NotificationObserver {
    transports: ChannelTransports,
}

impl NotificationObserver {
    pub fn new(transports: ChannelTransports) -> Self {
        Self { transports }
    }

    pub fn message(from: ListingState, to: ListingState) -> String {
        format!("Your listing moved from {from} to {to}")
    }
}

impl ChangeObserver for NotificationObserver {
    fn on_state_changed(
        &self,
        listing: &Listing,
        from: ListingState,
        to: ListingState,
    ) -> Result<(), ObserverError> {
        let advertiser = listing.advertiser();
        let Some(channel) = advertiser.channel() else {
            return Ok(());
        };

        let Some(recipient) = channel.recipient(advertiser) else {
            warn!(
                listing_id = %listing.id(),
                user_id = %advertiser.id,
                %channel,
                "advertiser has no address for the configured channel; skipping notification"
            );
            return Ok(());
        };

        self.transports
            .for_channel(channel)
            .deliver(recipient, &Self::message(from, to))?;
        debug!(listing_id = %listing.id(), %channel, "advertiser notified");
        Ok(())
    }
}
