//! Loop that feeds notification changes into the [`Dispatcher`].

use std::time::Duration;

use futures::StreamExt;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::dispatch::{Decision, Dispatcher};
use crate::model::{ChangeKind, FeedChange};
use crate::ports::NotificationFeed;

/// Consume `feed` until `cancel` fires.
///
/// Only `Added` changes reach the dispatcher. Feed errors are logged and
/// consumption goes on. When a subscription ends the feed is subscribed again
/// after `resubscribe_delay`; the replayed history is filtered out by the
/// dispatcher's timestamp guard.
pub async fn watch(
    feed: &dyn NotificationFeed,
    dispatcher: &mut Dispatcher,
    resubscribe_delay: Duration,
    cancel: CancellationToken,
) {
    loop {
        let mut changes = feed.subscribe();
        info!("Subscribed to notification feed");

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("Notification watcher stopped");
                    return;
                }
                next = changes.next() => next,
            };

            match next {
                Some(Ok(change)) => handle_change(dispatcher, change),
                Some(Err(err)) => warn!(error = %err, "Notification feed error"),
                None => break,
            }
        }

        warn!(
            delay_ms = resubscribe_delay.as_millis(),
            "Notification feed ended, resubscribing"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("Notification watcher stopped");
                return;
            }
            () = time::sleep(resubscribe_delay) => {}
        }
    }
}

fn handle_change(dispatcher: &mut Dispatcher, change: FeedChange) {
    let FeedChange {
        kind,
        document_id,
        event,
    } = change;

    match (kind, event) {
        (ChangeKind::Added, Some(event)) => {
            // The feed must not wait on this fan-out.
            match dispatcher.on_event_added(event) {
                Decision::Dispatched(fan_out) | Decision::BelowThreshold(fan_out) => drop(fan_out),
                Decision::Discarded { .. } => {}
            }
        }
        (ChangeKind::Added, None) => {
            warn!(document_id = %document_id, "Added change without a payload");
        }
        (kind, _) => {
            trace!(document_id = %document_id, %kind, "Ignoring notification change");
        }
    }
    debug!(latest_seen = ?dispatcher.state().latest_seen(), "Notification change handled");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use futures::stream;

    use super::*;
    use crate::dispatch::DispatchPolicy;
    use crate::model::{
        BinId, MessageId, NotificationEvent, NotificationId, TrashLevel, UserContact, UserId,
    };
    use crate::ports::{MockContactDirectory, MockNotificationFeed, MockSmsSender, PortError};

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, second).unwrap()
    }

    fn event(level: i64, timestamp: DateTime<Utc>, id: &str) -> NotificationEvent {
        NotificationEvent {
            id: format!("doc-{id}"),
            bin: BinId("B1".to_owned()),
            trash_level: TrashLevel::try_from(level).expect("valid level"),
            timestamp,
            notification_id: NotificationId(id.to_owned()),
        }
    }

    fn ana() -> UserContact {
        UserContact {
            user_id: UserId("u1".to_owned()),
            first_name: "Ana".to_owned(),
            contact_number: "09981500001".to_owned(),
        }
    }

    #[tokio::test]
    async fn replays_are_filtered_and_only_added_changes_dispatch() {
        let cancel = CancellationToken::new();

        let mut feed = MockNotificationFeed::new();
        let mut subscriptions = 0_u32;
        let stop = cancel.clone();
        feed.expect_subscribe().times(2).returning(move || {
            subscriptions += 1;
            if subscriptions == 1 {
                stream::iter(vec![
                    Ok(FeedChange::added(event(95, at(10), "N1"))),
                    Ok(FeedChange {
                        kind: ChangeKind::Modified,
                        document_id: "doc-N1".to_owned(),
                        event: Some(event(99, at(11), "N1")),
                    }),
                    Err(PortError::Internal("poll failed".to_owned())),
                    Ok(FeedChange::added(event(97, at(5), "N0"))),
                    Ok(FeedChange {
                        kind: ChangeKind::Removed,
                        document_id: "doc-N0".to_owned(),
                        event: None,
                    }),
                ])
                .boxed()
            } else {
                // A resubscription replays history; the guard must swallow it.
                stop.cancel();
                stream::iter(vec![Ok(FeedChange::added(event(95, at(10), "N1")))]).boxed()
            }
        });

        let mut directory = MockContactDirectory::new();
        directory
            .expect_contacts()
            .times(1)
            .returning(|| Ok(vec![ana()]));
        let mut sender = MockSmsSender::new();
        sender
            .expect_send()
            .withf(|sms| sms.to == "+639981500001" && sms.body.contains("N1"))
            .times(1)
            .returning(|_| Ok(MessageId("SM1".to_owned())));

        let mut dispatcher = Dispatcher::new(
            Arc::new(directory),
            Arc::new(sender),
            DispatchPolicy::default(),
        );

        watch(&feed, &mut dispatcher, Duration::ZERO, cancel).await;

        assert!(dispatcher.drain(Duration::from_secs(5)).await);
        assert_eq!(dispatcher.state().latest_seen(), Some(at(10)));
    }

    #[tokio::test]
    async fn cancellation_stops_an_idle_subscription() {
        let cancel = CancellationToken::new();
        let mut feed = MockNotificationFeed::new();
        feed.expect_subscribe()
            .times(1)
            .returning(|| stream::pending().boxed());

        let mut dispatcher = Dispatcher::new(
            Arc::new(MockContactDirectory::new()),
            Arc::new(MockSmsSender::new()),
            DispatchPolicy::default(),
        );

        cancel.cancel();
        watch(&feed, &mut dispatcher, Duration::ZERO, cancel).await;

        assert_eq!(dispatcher.state().latest_seen(), None);
    }
}
