//! Reviews left after a booking.

use crate::{error::Result, Entity, EntityKind, Error, RecordId, Timestamp};
use serde::{Deserialize, Serialize};

/// A 0–5 rating of a venue, tied to the booking it was left for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(default)]
    pub id: RecordId,
    pub user_id: RecordId,
    pub venue_id: RecordId,
    pub booking_id: RecordId,
    pub rating: f64,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default, with = "crate::wire::bool_flag")]
    pub synced: bool,
}

impl Review {
    pub fn new(
        user_id: impl Into<RecordId>,
        venue_id: impl Into<RecordId>,
        booking_id: impl Into<RecordId>,
        rating: f64,
        comment: impl Into<String>,
        now: Timestamp,
    ) -> Result<Self> {
        check_rating(rating)?;
        Ok(Self {
            id: RecordId::new(),
            user_id: user_id.into(),
            venue_id: venue_id.into(),
            booking_id: booking_id.into(),
            rating,
            comment: comment.into(),
            created_at: now,
            synced: false,
        })
    }
}

fn check_rating(rating: f64) -> Result<()> {
    if (0.0..=5.0).contains(&rating) {
        Ok(())
    } else {
        Err(Error::InvalidRating(rating))
    }
}

impl Entity for Review {
    const KIND: EntityKind = EntityKind::Review;

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

    fn rated_venue(&self) -> Option<&str> {
        Some(&self.venue_id)
    }

    fn validate(&self) -> Result<()> {
        check_rating(self.rating)
    }
}
