//! Contact lookup over the `users` collection.

use async_trait::async_trait;
use tracing::debug;

use binwatch_core::model::UserContact;
use binwatch_core::ports::{ContactDirectory, PortError};

use crate::client::FirestoreClient;
use crate::convert::user_contact;

/// Collection holding registered users.
pub const USERS: &str = "users";
/// Documents requested per listing call.
pub const DEFAULT_PAGE_SIZE: u32 = 300;

/// Reads every document of `users` on each lookup.
pub struct FirestoreContactDirectory {
    client: FirestoreClient,
    page_size: u32,
}

impl FirestoreContactDirectory {
    /// Create a directory reading pages of [`DEFAULT_PAGE_SIZE`].
    #[must_use]
    pub fn new(client: FirestoreClient) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[async_trait]
impl ContactDirectory for FirestoreContactDirectory {
    async fn contacts(&self) -> Result<Vec<UserContact>, PortError> {
        let mut contacts = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_documents(USERS, self.page_size, page_token.as_deref())
                .await?;
            contacts.extend(page.documents.iter().map(user_contact));

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(contacts = contacts.len(), "Loaded contacts");
        Ok(contacts)
    }
}
