//! Polling change feed over the `notifications` collection.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use tokio::time;
use tracing::debug;

use binwatch_core::model::{ChangeKind, FeedChange};
use binwatch_core::ports::{ChangeStream, NotificationFeed, PortError};

use crate::client::{FirestoreClient, StructuredQuery};
use crate::convert::notification_event;
use crate::document::{Document, document_id};

/// Collection holding bin fullness readings.
pub const NOTIFICATIONS: &str = "notifications";
/// Field the feed is ordered by.
pub const ORDER_FIELD: &str = "datetime";

/// Change feed that polls an ordered query and reports differences between
/// consecutive snapshots, the first snapshot being reported entirely as `Added`.
pub struct FirestoreNotificationFeed {
    client: FirestoreClient,
    poll_interval: Duration,
}

impl FirestoreNotificationFeed {
    /// Create a feed polling every `poll_interval`.
    #[must_use]
    pub fn new(client: FirestoreClient, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
        }
    }
}

impl NotificationFeed for FirestoreNotificationFeed {
    fn subscribe(&self) -> ChangeStream {
        let poller = Poller {
            client: self.client.clone(),
            query: StructuredQuery::ascending_by(NOTIFICATIONS, ORDER_FIELD),
            interval: self.poll_interval,
            tracker: SnapshotTracker::default(),
            pending: VecDeque::new(),
            primed: false,
        };

        stream::unfold(poller, |mut poller| async move {
            let change = poller.next_change().await;
            Some((change, poller))
        })
        .boxed()
    }
}

struct Poller {
    client: FirestoreClient,
    query: StructuredQuery,
    interval: Duration,
    tracker: SnapshotTracker,
    pending: VecDeque<Result<FeedChange, PortError>>,
    primed: bool,
}

impl Poller {
    async fn next_change(&mut self) -> Result<FeedChange, PortError> {
        loop {
            if let Some(change) = self.pending.pop_front() {
                return change;
            }
            if self.primed {
                time::sleep(self.interval).await;
            }
            self.primed = true;

            let documents = self.client.run_query(&self.query).await?;
            let changes = self.tracker.diff(documents);
            debug!(changes = changes.len(), "Polled notifications");
            self.pending.extend(changes);
        }
    }
}

/// Remembers the previous snapshot by document name and update time.
#[derive(Debug, Default)]
pub(crate) struct SnapshotTracker {
    known: HashMap<String, Option<String>>,
}

impl SnapshotTracker {
    /// Compare `documents` (in query order) with the previous snapshot.
    ///
    /// Added and modified documents are reported in query order, removals last.
    pub(crate) fn diff(&mut self, documents: Vec<Document>) -> Vec<Result<FeedChange, PortError>> {
        let mut changes = Vec::new();
        let mut current = HashMap::with_capacity(documents.len());

        for document in documents {
            let kind = match self.known.remove(&document.name) {
                None => Some(ChangeKind::Added),
                Some(seen) if seen != document.update_time => Some(ChangeKind::Modified),
                Some(_) => None,
            };
            if let Some(kind) = kind {
                changes.push(notification_event(&document).map(|event| FeedChange {
                    kind,
                    document_id: event.id.clone(),
                    event: Some(event),
                }));
            }
            current.insert(document.name, document.update_time);
        }

        let mut removed: Vec<String> = self.known.drain().map(|(name, _)| name).collect();
        removed.sort();
        changes.extend(removed.iter().map(|name| {
            Ok(FeedChange {
                kind: ChangeKind::Removed,
                document_id: document_id(name).to_owned(),
                event: None,
            })
        }));

        self.known = current;
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(id: &str, level: u8, second: u8, updated: &str) -> Document {
        serde_json::from_str(&format!(
            r#"{{
                "name": "projects/p/databases/(default)/documents/notifications/{id}",
                "fields": {{
                    "trashLevel": {{"integerValue": "{level}"}},
                    "bin": {{"stringValue": "B1"}},
                    "datetime": {{"timestampValue": "2025-03-01T08:00:{second:02}Z"}},
                    "notificationId": {{"stringValue": "N-{id}"}}
                }},
                "updateTime": "{updated}"
            }}"#
        ))
        .unwrap()
    }

    fn kinds(changes: &[Result<FeedChange, PortError>]) -> Vec<(ChangeKind, String)> {
        changes
            .iter()
            .map(|change| {
                let change = change.as_ref().expect("decodable change");
                (change.kind, change.document_id.clone())
            })
            .collect()
    }

    #[test]
    fn first_snapshot_is_all_added_in_order() {
        let mut tracker = SnapshotTracker::default();
        let changes = tracker.diff(vec![
            notification("a", 40, 1, "t1"),
            notification("b", 95, 2, "t1"),
        ]);

        assert_eq!(
            kinds(&changes),
            vec![
                (ChangeKind::Added, "a".to_owned()),
                (ChangeKind::Added, "b".to_owned())
            ]
        );
    }

    #[test]
    fn later_snapshots_report_only_differences() {
        let mut tracker = SnapshotTracker::default();
        tracker.diff(vec![
            notification("a", 40, 1, "t1"),
            notification("b", 95, 2, "t1"),
        ]);

        let unchanged = tracker.diff(vec![
            notification("a", 40, 1, "t1"),
            notification("b", 95, 2, "t1"),
        ]);
        assert!(unchanged.is_empty());

        let changes = tracker.diff(vec![
            notification("b", 96, 2, "t2"),
            notification("c", 91, 3, "t1"),
        ]);
        assert_eq!(
            kinds(&changes),
            vec![
                (ChangeKind::Modified, "b".to_owned()),
                (ChangeKind::Added, "c".to_owned()),
                (ChangeKind::Removed, "a".to_owned()),
            ]
        );
        let removed = changes.last().and_then(|change| change.as_ref().ok());
        assert!(removed.is_some_and(|change| change.event.is_none()));
    }

    #[test]
    fn undecodable_documents_surface_as_errors() {
        let mut tracker = SnapshotTracker::default();
        let broken: Document = serde_json::from_str(
            r#"{"name": "projects/p/databases/(default)/documents/notifications/x", "updateTime": "t1"}"#,
        )
        .unwrap();

        let changes = tracker.diff(vec![broken, notification("a", 95, 1, "t1")]);

        assert_eq!(changes.len(), 2);
        assert!(matches!(
            &changes[0],
            Err(PortError::MalformedDocument { document_id, .. }) if document_id == "x"
        ));
        assert!(changes[1].is_ok());
    }
}
