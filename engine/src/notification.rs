//! In-app notifications.

use crate::{Entity, EntityKind, RecordId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    BookingConfirmed,
    BookingCancelled,
    BookingCompleted,
    BookingReminder,
    PaymentUpdate,
    ReviewReceived,
    #[default]
    General,
}

/// Local record of a notification sent to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub id: RecordId,
    pub user_id: RecordId,
    pub title: String,
    pub body: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationType,
    /// Booking, venue or review the notification is about.
    #[serde(default)]
    pub related_id: Option<RecordId>,
    #[serde(default, with = "crate::wire::bool_flag")]
    pub read: bool,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default, with = "crate::wire::bool_flag")]
    pub synced: bool,
}

impl Notification {
    pub fn new(
        user_id: impl Into<RecordId>,
        title: impl Into<String>,
        body: impl Into<String>,
        kind: NotificationType,
        related_id: Option<RecordId>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: RecordId::new(),
            user_id: user_id.into(),
            title: title.into(),
            body: body.into(),
            kind,
            related_id,
            read: false,
            created_at: now,
            synced: false,
        }
    }
}

impl Entity for Notification {
    const KIND: EntityKind = EntityKind::Notification;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn is_synced(&self) -> bool {
        self.synced
    }

    fn set_synced(&mut self, synced: bool) {
        self.synced = synced;
    }
}
