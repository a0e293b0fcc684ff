//! The contract shared by every cached entity.

use crate::{error::Result, Error, RecordId, Timestamp};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kinds of entity mirrored between the device and the remote API.
///
/// The serialized name doubles as the remote path segment and as the
/// discriminator in the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "bookings")]
    Booking,
    #[serde(rename = "grounds")]
    Venue,
    #[serde(rename = "users")]
    User,
    #[serde(rename = "reviews")]
    Review,
    #[serde(rename = "favorites")]
    Favorite,
    #[serde(rename = "notifications")]
    Notification,
}

impl EntityKind {
    /// Every kind, in the order a full sync pass visits them.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::User,
        EntityKind::Venue,
        EntityKind::Booking,
        EntityKind::Review,
        EntityKind::Favorite,
        EntityKind::Notification,
    ];

    /// Collection name used on the wire and in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Booking => "bookings",
            EntityKind::Venue => "grounds",
            EntityKind::User => "users",
            EntityKind::Review => "reviews",
            EntityKind::Favorite => "favorites",
            EntityKind::Notification => "notifications",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownKind(s.to_string()))
    }
}

/// A record that lives in the local cache and is reconciled with the remote
/// store.
///
/// `synced` is false after every local write and only becomes true once the
/// remote store has acknowledged the record.
pub trait Entity: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Which collection this entity belongs to.
    const KIND: EntityKind;

    /// Identity; empty until one has been assigned.
    fn id(&self) -> &str;

    fn set_id(&mut self, id: RecordId);

    fn is_synced(&self) -> bool;

    fn set_synced(&mut self, synced: bool);

    /// Stamp a local modification. Entities without an `updatedAt` field
    /// ignore it.
    fn touch(&mut self, _now: Timestamp) {}

    /// Venue whose aggregate rating depends on this record.
    fn rated_venue(&self) -> Option<&str> {
        None
    }

    /// Reject field values the entity may not hold. Checked before every
    /// local write.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// The id this entity must have, for entities whose identity follows
    /// from their fields. Overrides whatever id the entity carries.
    fn derived_id(&self) -> Option<RecordId> {
        None
    }
}

/// Run `$body` with `$ty` bound to the concrete entity type of `$kind`.
///
/// ```rust
/// use groundbook_engine::{with_entity_kind, Entity, EntityKind};
///
/// let kind: EntityKind = "grounds".parse().unwrap();
/// let name = with_entity_kind!(kind, |E| <E as Entity>::KIND.as_str());
/// assert_eq!(name, "grounds");
/// ```
#[macro_export]
macro_rules! with_entity_kind {
    ($kind:expr, |$ty:ident| $body:expr) => {
        match $kind {
            $crate::EntityKind::Booking => {
                type $ty = $crate::Booking;
                $body
            }
            $crate::EntityKind::Venue => {
                type $ty = $crate::Venue;
                $body
            }
            $crate::EntityKind::User => {
                type $ty = $crate::User;
                $body
            }
            $crate::EntityKind::Review => {
                type $ty = $crate::Review;
                $body
            }
            $crate::EntityKind::Favorite => {
                type $ty = $crate::Favorite;
                $body
            }
            $crate::EntityKind::Notification => {
                type $ty = $crate::Notification;
                $body
            }
        }
    };
}
