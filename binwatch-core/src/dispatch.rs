//! Deduplication and fan-out of bin fullness alerts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};

use crate::message::alert_body;
use crate::model::{NotificationEvent, OutgoingSms, TrashLevel, UserContact};
use crate::phone::{DEFAULT_COUNTRY_CODE, format_with_country_code, is_valid_phone_number};
use crate::ports::{ContactDirectory, SmsSender};

/// Remembers the newest event timestamp evaluated by this process.
///
/// Lives only in memory; a restart begins again from [`DispatchState::default`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchState {
    latest_seen: Option<DateTime<Utc>>,
}

impl DispatchState {
    /// Start from a known timestamp instead of an empty state.
    #[must_use]
    pub fn starting_at(latest_seen: DateTime<Utc>) -> Self {
        Self {
            latest_seen: Some(latest_seen),
        }
    }

    /// Timestamp of the newest evaluated event, if any.
    #[must_use]
    pub fn latest_seen(&self) -> Option<DateTime<Utc>> {
        self.latest_seen
    }

    /// Record `timestamp` if it is newer than anything seen so far.
    ///
    /// Returns `false` without touching the state for stale or repeated timestamps.
    pub fn observe(&mut self, timestamp: DateTime<Utc>) -> bool {
        if self.latest_seen.is_some_and(|latest| timestamp <= latest) {
            return false;
        }
        self.latest_seen = Some(timestamp);
        true
    }
}

/// Tunables for who gets alerted and how numbers are normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Readings at or above this level trigger alerts.
    pub threshold: TrashLevel,
    /// Calling code replacing a leading `0` in stored numbers.
    pub country_code: String,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            threshold: TrashLevel::ALERT,
            country_code: DEFAULT_COUNTRY_CODE.to_owned(),
        }
    }
}

/// Counters describing what happened during one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Messages accepted by the provider.
    pub sent: usize,
    /// Messages the provider rejected or that never reached it.
    pub failed: usize,
    /// Contacts skipped because their number did not validate.
    pub invalid: usize,
    /// Whether loading the contacts failed, in which case nothing was attempted.
    pub lookup_failed: bool,
    /// Whether the fan-out task itself panicked or was aborted, leaving the counters incomplete.
    pub panicked: bool,
}

/// Handle to the background work started for one new event.
///
/// Dropping it detaches the work; the owning [`Dispatcher`] keeps tracking it.
#[derive(Debug)]
pub struct FanOut {
    handle: JoinHandle<FanOutReport>,
}

impl FanOut {
    /// Wait for the contact checks and every send of this fan-out to finish.
    pub async fn join(self) -> FanOutReport {
        match self.handle.await {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, "Alert fan-out task failed");
                FanOutReport {
                    panicked: true,
                    ..FanOutReport::default()
                }
            }
        }
    }
}

/// Outcome of offering one event to the dispatcher.
#[derive(Debug)]
pub enum Decision {
    /// Not newer than the latest seen event; ignored.
    Discarded {
        /// The timestamp that made the event stale.
        latest_seen: Option<DateTime<Utc>>,
    },
    /// New, but the reading is below the alert threshold. Contacts are still
    /// loaded and checked, nothing is sent.
    BelowThreshold(FanOut),
    /// New and critical; alerts are being sent in the background.
    Dispatched(FanOut),
}

/// Turns newly added notification events into SMS alerts for every contact.
pub struct Dispatcher {
    contacts: Arc<dyn ContactDirectory>,
    sender: Arc<dyn SmsSender>,
    policy: Arc<DispatchPolicy>,
    state: DispatchState,
    tracker: TaskTracker,
}

impl Dispatcher {
    /// Create a dispatcher with an empty [`DispatchState`].
    #[must_use]
    pub fn new(
        contacts: Arc<dyn ContactDirectory>,
        sender: Arc<dyn SmsSender>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            contacts,
            sender,
            policy: Arc::new(policy),
            state: DispatchState::default(),
            tracker: TaskTracker::new(),
        }
    }

    /// Replace the initial deduplication state.
    #[must_use]
    pub fn with_state(mut self, state: DispatchState) -> Self {
        self.state = state;
        self
    }

    /// Current deduplication state.
    #[must_use]
    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Evaluate a newly added event.
    ///
    /// The state advances before any message goes out, so a failing send never
    /// leads to the event being evaluated again. Every new event loads all
    /// contacts and validates their numbers; only critical readings send. That
    /// work runs on a spawned task, so this returns without waiting for it and
    /// must be called from within a Tokio runtime.
    pub fn on_event_added(&mut self, event: NotificationEvent) -> Decision {
        if !self.state.observe(event.timestamp) {
            trace!(
                document_id = %event.id,
                timestamp = %event.timestamp,
                "Skipping already processed notification"
            );
            return Decision::Discarded {
                latest_seen: self.state.latest_seen(),
            };
        }

        let alerting = event.trash_level >= self.policy.threshold;
        if alerting {
            info!(
                bin = %event.bin,
                trash_level = %event.trash_level,
                notification_id = %event.notification_id,
                "Bin is critically full, alerting contacts"
            );
        } else {
            debug!(
                bin = %event.bin,
                trash_level = %event.trash_level,
                threshold = %self.policy.threshold,
                "Notification below alert threshold"
            );
        }

        let handle = self.tracker.spawn(fan_out(
            Arc::clone(&self.contacts),
            Arc::clone(&self.sender),
            Arc::clone(&self.policy),
            event,
            alerting,
        ));
        let work = FanOut { handle };
        if alerting {
            Decision::Dispatched(work)
        } else {
            Decision::BelowThreshold(work)
        }
    }

    /// Stop accepting work and wait up to `timeout` for in-flight alerts.
    ///
    /// Returns `false` if some alerts were still running when the timeout hit.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, "Waiting for in-flight alerts");
        }
        if time::timeout(timeout, self.tracker.wait()).await.is_ok() {
            true
        } else {
            warn!(
                pending = self.tracker.len(),
                "Gave up waiting for in-flight alerts"
            );
            false
        }
    }
}

async fn fan_out(
    directory: Arc<dyn ContactDirectory>,
    sender: Arc<dyn SmsSender>,
    policy: Arc<DispatchPolicy>,
    event: NotificationEvent,
    alerting: bool,
) -> FanOutReport {
    let mut report = FanOutReport::default();

    let contacts = match directory.contacts().await {
        Ok(contacts) => contacts,
        Err(err) => {
            error!(
                error = %err,
                notification_id = %event.notification_id,
                "Failed to load contacts"
            );
            report.lookup_failed = true;
            return report;
        }
    };

    let mut sends = JoinSet::new();
    for contact in contacts {
        let Some(to) = checked_number(&contact, &policy) else {
            report.invalid += 1;
            continue;
        };
        if !alerting {
            continue;
        }
        let sms = OutgoingSms {
            body: alert_body(&contact.first_name, &event),
            to,
        };
        let sender = Arc::clone(&sender);
        sends.spawn(async move {
            let outcome = sender.send(&sms).await;
            (sms.to, outcome)
        });
    }

    while let Some(joined) = sends.join_next().await {
        match joined {
            Ok((to, Ok(message_id))) => {
                info!(%message_id, to = %to, "SMS sent");
                report.sent += 1;
            }
            Ok((to, Err(err))) => {
                error!(error = %err, to = %to, "Error sending SMS");
                report.failed += 1;
            }
            Err(err) => {
                error!(error = %err, "SMS send task failed");
                report.failed += 1;
            }
        }
    }

    report
}

/// Normalized number of `contact`, or `None` (logged) when it does not validate.
fn checked_number(contact: &UserContact, policy: &DispatchPolicy) -> Option<String> {
    let number = format_with_country_code(&contact.contact_number, &policy.country_code);
    if is_valid_phone_number(&number) {
        Some(number)
    } else {
        error!(user_id = %contact.user_id, number = %number, "Invalid phone number");
        None
    }
}
