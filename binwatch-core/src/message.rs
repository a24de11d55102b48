//! Alert text sent to contacts.

use crate::model::NotificationEvent;

/// Render the alert for one recipient.
#[must_use]
pub fn alert_body(first_name: &str, event: &NotificationEvent) -> String {
    format!(
        "🚨 Alert: Hi {first_name}, Bin {bin} is {level}% full! Notification ID: {id}. Please take action.",
        bin = event.bin,
        level = event.trash_level,
        id = event.notification_id,
    )
}
