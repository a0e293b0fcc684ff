//! Favorite venues.

use crate::{Entity, EntityKind, RecordId, Timestamp};
use serde::{Deserialize, Serialize};

/// A user's bookmark of a venue.
///
/// The id is derived from `(user, venue)`, so adding the same favorite twice
/// writes the same record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    #[serde(default)]
    pub id: RecordId,
    pub user_id: RecordId,
    pub venue_id: RecordId,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default, with = "crate::wire::bool_flag")]
    pub synced: bool,
}

impl Favorite {
    pub fn new(user_id: impl Into<RecordId>, venue_id: impl Into<RecordId>, now: Timestamp) -> Self {
        let user_id = user_id.into();
        let venue_id = venue_id.into();
        Self {
            id: Self::key(&user_id, &venue_id),
            user_id,
            venue_id,
            created_at: now,
            synced: false,
        }
    }

    /// Identity of the favorite linking `user_id` to `venue_id`.
    pub fn key(user_id: &str, venue_id: &str) -> RecordId {
        format!("{user_id}_{venue_id}")
    }
}

impl Entity for Favorite {
    const KIND: EntityKind = EntityKind::Favorite;

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

    fn derived_id(&self) -> Option<RecordId> {
        Some(Self::key(&self.user_id, &self.venue_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_derived() {
        let a = Favorite::new("u-1", "v-1", 1000);
        let b = Favorite::new("u-1", "v-1", 2000);
        assert_eq!(a.id, "u-1_v-1");
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, Favorite::new("u-1", "v-2", 1000).id);
    }

    #[test]
    fn decoded_favorites_derive_their_identity() {
        let blank: Favorite =
            serde_json::from_value(serde_json::json!({"userId": "u-1", "venueId": "v-1"})).unwrap();
        assert_eq!(blank.id, "");
        assert_eq!(blank.derived_id().as_deref(), Some("u-1_v-1"));

        let mut wrong = blank.clone();
        wrong.id = "fav-42".into();
        assert_eq!(wrong.derived_id().as_deref(), Some("u-1_v-1"));
    }
}
