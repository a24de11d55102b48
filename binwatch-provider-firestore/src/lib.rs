//! Cloud Firestore adapters: the `notifications` change feed and the `users` directory.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use binwatch_core::ports::{ContactDirectory, NotificationFeed};

/// OAuth2 access tokens for a service account.
pub mod auth;
/// Authorized REST client.
pub mod client;
mod convert;
/// Service account key loading.
pub mod credentials;
/// Contact lookup.
pub mod directory;
/// REST document model.
pub mod document;
/// Polling change feed.
pub mod feed;

pub use auth::TokenProvider;
pub use client::{DEFAULT_BASE_URL, FirestoreClient};
pub use credentials::{CredentialsError, ServiceAccount};
pub use directory::FirestoreContactDirectory;
pub use feed::FirestoreNotificationFeed;

/// Both Firestore ports sharing one authorized client.
pub struct FirestorePorts {
    /// Change feed over `notifications`.
    pub feed: Arc<dyn NotificationFeed>,
    /// Directory over `users`.
    pub contacts: Arc<dyn ContactDirectory>,
}

/// Build the Firestore ports from a base64 encoded service account key.
///
/// # Errors
///
/// Returns a [`CredentialsError`] when the key cannot be decoded or its private key is unusable.
pub fn ports(
    http: Client,
    encoded_key: &str,
    base_url: &str,
    poll_interval: Duration,
) -> Result<FirestorePorts, CredentialsError> {
    let account = ServiceAccount::from_base64(encoded_key)?;
    let tokens = TokenProvider::new(http.clone(), account)?;
    let client = FirestoreClient::new(http, base_url, tokens);

    Ok(FirestorePorts {
        feed: Arc::new(FirestoreNotificationFeed::new(client.clone(), poll_interval)),
        contacts: Arc::new(FirestoreContactDirectory::new(client)),
    })
}
