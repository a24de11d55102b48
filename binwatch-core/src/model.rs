//! Domain data structures for bin fullness events, contacts, and outgoing alerts.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier of a physical waste bin.
pub struct BinId(pub String);

impl fmt::Display for BinId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier assigned to a notification by the sensor pipeline.
pub struct NotificationId(pub String);

impl fmt::Display for NotificationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier of a registered user.
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier handed back by the SMS provider for an accepted message.
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("trash level {0} is outside 0..=100")]
/// Raised when a fill level does not describe a percentage.
pub struct InvalidTrashLevel(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
/// Fill level of a bin in percent, always within `0..=100`.
pub struct TrashLevel(u8);

impl TrashLevel {
    /// Level at which contacts are alerted unless configured otherwise.
    pub const ALERT: Self = Self(90);

    /// Fill level as a percentage.
    #[must_use]
    pub fn percent(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for TrashLevel {
    type Error = InvalidTrashLevel;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        u8::try_from(raw)
            .ok()
            .filter(|level| *level <= 100)
            .map(Self)
            .ok_or(InvalidTrashLevel(raw))
    }
}

impl fmt::Display for TrashLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A bin fullness reading written to the `notifications` collection.
pub struct NotificationEvent {
    /// Document identifier inside the store.
    pub id: String,
    /// Bin that produced the reading.
    pub bin: BinId,
    /// Reported fill level.
    pub trash_level: TrashLevel,
    /// Moment the reading was taken; the feed is ordered by this value.
    pub timestamp: DateTime<Utc>,
    /// Identifier quoted back to recipients in the alert.
    pub notification_id: NotificationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A registered user that receives alerts.
pub struct UserContact {
    /// Document identifier of the user.
    pub user_id: UserId,
    /// Name used to greet the user.
    pub first_name: String,
    /// Phone number exactly as stored, before normalization.
    pub contact_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A single text message ready for the SMS provider.
pub struct OutgoingSms {
    /// Recipient in E.164 form.
    pub to: String,
    /// Message text.
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Kind of change reported by the notification feed.
pub enum ChangeKind {
    /// A document entered the watched result set.
    Added,
    /// A known document was updated.
    Modified,
    /// A known document left the result set.
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        };
        write!(formatter, "{tag}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One entry of the notification change feed.
pub struct FeedChange {
    /// What happened to the document.
    pub kind: ChangeKind,
    /// Identifier of the affected document.
    pub document_id: String,
    /// Decoded payload; absent for removals.
    pub event: Option<NotificationEvent>,
}

impl FeedChange {
    /// Build an `Added` change carrying its event.
    #[must_use]
    pub fn added(event: NotificationEvent) -> Self {
        Self {
            kind: ChangeKind::Added,
            document_id: event.id.clone(),
            event: Some(event),
        }
    }
}
