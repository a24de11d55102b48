//! Authorized access to the Firestore REST API.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use binwatch_core::ports::PortError;

use crate::auth::TokenProvider;
use crate::document::Document;

/// Public Firestore endpoint.
pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Subset of the `StructuredQuery` message used by binwatch.
pub struct StructuredQuery {
    from: Vec<CollectionSelector>,
    order_by: Vec<Order>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionSelector {
    collection_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Order {
    field: FieldReference,
    direction: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldReference {
    field_path: String,
}

impl StructuredQuery {
    /// Every document of `collection`, ordered ascending by `field`.
    #[must_use]
    pub fn ascending_by(collection: &str, field: &str) -> Self {
        Self {
            from: vec![CollectionSelector {
                collection_id: collection.to_owned(),
            }],
            order_by: vec![Order {
                field: FieldReference {
                    field_path: field.to_owned(),
                },
                direction: "ASCENDING",
            }],
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunQueryRequest<'a> {
    structured_query: &'a StructuredQuery,
}

/// One streamed `runQuery` result; progress-only entries have no document.
#[derive(Deserialize)]
struct RunQueryResponse {
    #[serde(default)]
    document: Option<Document>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One page of a collection listing.
pub struct DocumentPage {
    /// Documents on this page.
    #[serde(default)]
    pub documents: Vec<Document>,
    /// Token for the following page; absent or empty on the last one.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Clone)]
/// Firestore client bound to one project's default database.
pub struct FirestoreClient {
    http: Client,
    documents_url: Arc<str>,
    tokens: Arc<TokenProvider>,
}

impl FirestoreClient {
    /// Create a client talking to `base_url` (normally [`DEFAULT_BASE_URL`]).
    #[must_use]
    pub fn new(http: Client, base_url: &str, tokens: TokenProvider) -> Self {
        let documents_url = format!(
            "{}/projects/{}/databases/(default)/documents",
            base_url.trim_end_matches('/'),
            tokens.project_id()
        );
        Self {
            http,
            documents_url: documents_url.into(),
            tokens: Arc::new(tokens),
        }
    }

    /// Run a query and return the matching documents in result order.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when authorization or the request fails.
    pub async fn run_query(&self, query: &StructuredQuery) -> Result<Vec<Document>, PortError> {
        let request = self
            .http
            .post(format!("{}:runQuery", self.documents_url))
            .json(&RunQueryRequest {
                structured_query: query,
            });
        let rows = fetch_json::<Vec<RunQueryResponse>>(self.authorize(request).await?).await?;
        Ok(rows.into_iter().filter_map(|row| row.document).collect())
    }

    /// Fetch one page of `collection`.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when authorization or the request fails.
    pub async fn list_documents(
        &self,
        collection: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, PortError> {
        let mut request = self
            .http
            .get(format!("{}/{collection}", self.documents_url))
            .query(&[("pageSize", page_size)]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        fetch_json(self.authorize(request).await?).await
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, PortError> {
        let token = self.tokens.access_token().await?;
        Ok(request.bearer_auth(token))
    }
}

// Small helper to fetch and decode JSON with status handling.
pub(crate) async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    let response = req.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PortError::Status {
            status: status.as_u16(),
            message: google_error_message(&body),
        });
    }
    response.json().await.map_err(PortError::from)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GoogleError {
    Api { error: ApiError },
    OAuth {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    },
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Pull the human readable part out of a Google error body.
fn google_error_message(body: &str) -> String {
    match serde_json::from_str::<GoogleError>(body) {
        Ok(GoogleError::Api { error }) => match error.status {
            Some(status) => format!("{status}: {}", error.message),
            None => error.message,
        },
        Ok(GoogleError::OAuth {
            error,
            error_description,
        }) => match error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        },
        Err(_) => body.trim().to_owned(),
    }
}
