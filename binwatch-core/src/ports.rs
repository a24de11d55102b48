//! Traits describing the external collaborators and their shared error type.

use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::Error as ReqwestError;

use crate::model::{FeedChange, MessageId, OutgoingSms, UserContact};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to the document store or the SMS provider.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Remote side answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Provider supplied explanation, or the raw body.
        message: String,
    },
    /// Obtaining or refreshing credentials failed.
    #[error("Authentication error: {0}")]
    Auth(String),
    /// A stored document does not have the expected shape.
    #[error("Malformed document {document_id}: {reason}")]
    MalformedDocument {
        /// Identifier of the offending document.
        document_id: String,
        /// What was wrong with it.
        reason: String,
    },
    /// Internal provider error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stream of changes produced by a [`NotificationFeed`] subscription.
pub type ChangeStream = BoxStream<'static, Result<FeedChange, PortError>>;

#[cfg_attr(test, mockall::automock)]
/// Ordered change feed over the `notifications` collection.
pub trait NotificationFeed: Send + Sync {
    /// Open a new subscription.
    ///
    /// The stream is lazy and unbounded. Events arrive in ascending timestamp
    /// order and a fresh subscription starts by replaying every stored
    /// notification as `Added`. Errors are yielded in-band; the stream keeps
    /// going after them and only ends when the subscription is lost.
    fn subscribe(&self) -> ChangeStream;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
/// Read access to the registered users.
pub trait ContactDirectory: Send + Sync {
    /// Load every registered contact.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the store request fails or returns garbage.
    async fn contacts(&self) -> Result<Vec<UserContact>, PortError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
/// Outbound text message gateway.
pub trait SmsSender: Send + Sync {
    /// Submit one message and return the provider's identifier for it.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the provider rejects the message or cannot be reached.
    async fn send(&self, sms: &OutgoingSms) -> Result<MessageId, PortError>;
}
