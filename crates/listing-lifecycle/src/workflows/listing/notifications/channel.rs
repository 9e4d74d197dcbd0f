use std::fmt::{self, Debug};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::workflows::listing::domain::User;

/// Delivery mechanism configured on a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Sms,
    Chat,
}

impl NotificationChannel {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationChannel::Email => "email",
            NotificationChannel::Sms => "sms",
            NotificationChannel::Chat => "chat",
        }
    }

    /// Address on `user` this channel delivers to.
    pub fn recipient(self, user: &User) -> Option<&str> {
        let address = match self {
            NotificationChannel::Email => user.email.as_deref(),
            NotificationChannel::Sms => user.phone.as_deref(),
            NotificationChannel::Chat => user.chat_handle.as_deref(),
        };
        address.filter(|value| !value.trim().is_empty())
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("{channel} transport unavailable: {reason}")]
    Transport {
        channel: NotificationChannel,
        reason: String,
    },
}

/// Outbound delivery capability (mail, SMS or chat provider adapters).
pub trait MessageTransport: Debug + Send + Sync {
    fn deliver(&self, recipient: &str, text: &str) -> Result<(), DeliveryError>;
}

/// Transport that records deliveries in the log instead of calling a provider.
#[derive(Debug, Clone, Copy)]
pub struct LoggingTransport {
    channel: NotificationChannel,
}

impl LoggingTransport {
    pub fn new(channel: NotificationChannel) -> Self {
        Self { channel }
    }
}

impl MessageTransport for LoggingTransport {
    fn deliver(&self, recipient: &str, text: &str) -> Result<(), DeliveryError> {
        info!(channel = %self.channel, recipient, text, "notification delivered");
        Ok(())
    }
}

/// One transport per channel variant.
#[derive(Debug, Clone)]
pub struct ChannelTransports {
    email: Arc<dyn MessageTransport>,
    sms: Arc<dyn MessageTransport>,
    chat: Arc<dyn MessageTransport>,
}

impl ChannelTransports {
    pub fn new(
        email: Arc<dyn MessageTransport>,
        sms: Arc<dyn MessageTransport>,
        chat: Arc<dyn MessageTransport>,
    ) -> Self {
        Self { email, sms, chat }
    }

    pub fn logging() -> Self {
        Self::new(
            Arc::new(LoggingTransport::new(NotificationChannel::Email)),
            Arc::new(LoggingTransport::new(NotificationChannel::Sms)),
            Arc::new(LoggingTransport::new(NotificationChannel::Chat)),
        )
    }

    pub fn for_channel(&self, channel: NotificationChannel) -> &dyn MessageTransport {
        match channel {
            NotificationChannel::Email => self.email.as_ref(),
            NotificationChannel::Sms => self.sms.as_ref(),
            NotificationChannel::Chat => self.chat.as_ref(),
        }
    }
}
