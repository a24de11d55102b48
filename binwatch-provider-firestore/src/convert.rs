//! Mapping of stored documents onto domain types.

use binwatch_core::model::{BinId, NotificationEvent, NotificationId, TrashLevel, UserContact, UserId};
use binwatch_core::ports::PortError;

use crate::document::{Document, Value};

const TRASH_LEVEL: &str = "trashLevel";
const BIN: &str = "bin";
const DATETIME: &str = "datetime";
const NOTIFICATION_ID: &str = "notificationId";
const CONTACT_NUMBER: &str = "contactNumber";
const FIRST_NAME: &str = "firstName";

/// Decode a `notifications` document.
///
/// `trashLevel`, `bin` and `datetime` are required. A missing `notificationId`
/// falls back to the document id.
pub(crate) fn notification_event(document: &Document) -> Result<NotificationEvent, PortError> {
    let malformed = |reason: String| PortError::MalformedDocument {
        document_id: document.id().to_owned(),
        reason,
    };

    let raw_level = required(document, TRASH_LEVEL, Value::as_integer).map_err(malformed)?;
    let trash_level = TrashLevel::try_from(raw_level).map_err(|err| malformed(err.to_string()))?;
    let bin = required(document, BIN, Value::as_text).map_err(malformed)?;
    let timestamp = required(document, DATETIME, Value::as_timestamp).map_err(malformed)?;
    let notification_id = document
        .field(NOTIFICATION_ID)
        .and_then(Value::as_text)
        .unwrap_or_else(|| document.id().to_owned());

    Ok(NotificationEvent {
        id: document.id().to_owned(),
        bin: BinId(bin),
        trash_level,
        timestamp,
        notification_id: NotificationId(notification_id),
    })
}

/// Decode a `users` document. Missing fields become empty strings, which
/// later fail phone validation instead of aborting the whole lookup.
pub(crate) fn user_contact(document: &Document) -> UserContact {
    let text = |name: &str| {
        document
            .field(name)
            .and_then(Value::as_text)
            .unwrap_or_default()
    };

    UserContact {
        user_id: UserId(document.id().to_owned()),
        first_name: text(FIRST_NAME),
        contact_number: text(CONTACT_NUMBER),
    }
}

fn required<T>(
    document: &Document,
    name: &str,
    view: impl Fn(&Value) -> Option<T>,
) -> Result<T, String> {
    let value = document
        .field(name)
        .ok_or_else(|| format!("missing field `{name}`"))?;
    view(value).ok_or_else(|| format!("field `{name}` has unusable {} value", value.kind()))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn document(fields: &str) -> Document {
        serde_json::from_str(&format!(
            r#"{{"name": "projects/p/databases/(default)/documents/notifications/doc1", "fields": {fields}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn decodes_notification() {
        let event = notification_event(&document(
            r#"{
                "trashLevel": {"integerValue": "95"},
                "bin": {"stringValue": "B1"},
                "datetime": {"timestampValue": "2025-03-01T08:00:05Z"},
                "notificationId": {"stringValue": "N1"}
            }"#,
        ))
        .unwrap();

        assert_eq!(event.id, "doc1");
        assert_eq!(event.bin, BinId("B1".to_owned()));
        assert_eq!(event.trash_level.percent(), 95);
        assert_eq!(event.timestamp, Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 5).unwrap());
        assert_eq!(event.notification_id, NotificationId("N1".to_owned()));
    }

    #[test]
    fn notification_id_defaults_to_document_id() {
        let event = notification_event(&document(
            r#"{
                "trashLevel": {"doubleValue": 92.5},
                "bin": {"integerValue": "12"},
                "datetime": {"integerValue": "1740816005000"}
            }"#,
        ))
        .unwrap();

        assert_eq!(event.notification_id, NotificationId("doc1".to_owned()));
        assert_eq!(event.bin, BinId("12".to_owned()));
        assert_eq!(event.trash_level.percent(), 92);
    }

    #[test]
    fn missing_and_invalid_fields_are_reported() {
        let missing = notification_event(&document(
            r#"{"bin": {"stringValue": "B1"}, "datetime": {"timestampValue": "2025-03-01T08:00:05Z"}}"#,
        ));
        assert!(matches!(
            missing,
            Err(PortError::MalformedDocument { ref document_id, ref reason })
                if document_id == "doc1" && reason.contains("trashLevel")
        ));

        let out_of_range = notification_event(&document(
            r#"{
                "trashLevel": {"integerValue": "140"},
                "bin": {"stringValue": "B1"},
                "datetime": {"timestampValue": "2025-03-01T08:00:05Z"}
            }"#,
        ));
        assert!(matches!(out_of_range, Err(PortError::MalformedDocument { .. })));

        let bad_time = notification_event(&document(
            r#"{
                "trashLevel": {"integerValue": "50"},
                "bin": {"stringValue": "B1"},
                "datetime": {"booleanValue": true}
            }"#,
        ));
        assert!(matches!(
            bad_time,
            Err(PortError::MalformedDocument { ref reason, .. }) if reason.contains("boolean")
        ));
    }

    #[test]
    fn decodes_user_with_missing_fields() {
        let user = user_contact(&document(r#"{"firstName": {"stringValue": "Ana"}}"#));

        assert_eq!(user.user_id, UserId("doc1".to_owned()));
        assert_eq!(user.first_name, "Ana");
        assert_eq!(user.contact_number, "");
    }
}
