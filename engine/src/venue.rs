//! Venues (grounds) and their aggregate rating.

use crate::{Entity, EntityKind, RecordId, Review};
use serde::{Deserialize, Serialize};

/// A bookable ground.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    /// Free-text address; also the geocoding key for weather lookups.
    pub location: String,
    pub price_per_hour: f64,
    #[serde(default)]
    pub price_display: String,
    /// Mean of the venue's reviews. Only [`Venue::apply_rating`] sets it.
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub rating_display: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Groundkeeper who manages the venue.
    #[serde(default)]
    pub owner_id: Option<RecordId>,
    #[serde(default, with = "crate::wire::bool_flag")]
    pub has_parking: bool,
    #[serde(default, with = "crate::wire::bool_flag")]
    pub has_floodlights: bool,
    #[serde(default, with = "crate::wire::bool_flag")]
    pub has_changing_rooms: bool,
    #[serde(default, with = "crate::wire::bool_flag")]
    pub has_equipment_rental: bool,
    #[serde(default = "available_by_default", with = "crate::wire::bool_flag")]
    pub available: bool,
    #[serde(default, with = "crate::wire::bool_flag")]
    pub synced: bool,
}

fn available_by_default() -> bool {
    true
}

impl Venue {
    /// A new, unrated and available venue.
    pub fn new(name: impl Into<String>, location: impl Into<String>, price_per_hour: f64) -> Self {
        Self {
            id: RecordId::new(),
            name: name.into(),
            location: location.into(),
            price_per_hour,
            price_display: format_price(price_per_hour),
            rating: 0.0,
            rating_display: format_rating(0.0),
            image_url: None,
            owner_id: None,
            has_parking: false,
            has_floodlights: false,
            has_changing_rooms: false,
            has_equipment_rental: false,
            available: true,
            synced: false,
        }
    }

    /// Set the aggregate rating and its display string.
    pub fn apply_rating(&mut self, rating: f64) {
        self.rating = rating;
        self.rating_display = format_rating(rating);
    }

    /// Change the hourly price and its display string.
    pub fn set_price(&mut self, price_per_hour: f64) {
        self.price_per_hour = price_per_hour;
        self.price_display = format_price(price_per_hour);
    }
}

impl Entity for Venue {
    const KIND: EntityKind = EntityKind::Venue;

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

/// Arithmetic mean of the given ratings; `0.0` when there are none.
pub fn average_rating<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> f64 {
    let (sum, count) = reviews
        .into_iter()
        .fold((0.0, 0u32), |(sum, count), r| (sum + r.rating, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

fn format_price(price: f64) -> String {
    format!("{price:.2}/hr")
}

fn format_rating(rating: f64) -> String {
    format!("{rating:.1}")
}
