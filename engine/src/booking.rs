//! Bookings and their time windows.

use crate::{error::Result, Entity, EntityKind, Error, RecordId, Timestamp, Venue};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Reservation status.
///
/// `PENDING -> CONFIRMED` when the start time arrives, `CONFIRMED ->
/// COMPLETED` when the end time passes. `CANCELLED` is set by an explicit
/// user or operator action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Cancelled and completed bookings are never advanced by time.
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// A reservation of a venue for a whole number of hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(default)]
    pub id: RecordId,
    pub user_id: RecordId,
    pub venue_id: RecordId,
    /// Copied from the venue so bookings render offline.
    #[serde(default)]
    pub venue_name: String,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    /// Local time of day, `HH:MM`.
    pub start_time: String,
    pub duration_hours: u32,
    #[serde(default)]
    pub total_price: f64,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Timestamp,
    #[serde(default, with = "crate::wire::bool_flag")]
    pub synced: bool,
}

impl Booking {
    /// Create a pending booking for `venue`, priced at its hourly rate.
    ///
    /// The slot must parse and last at least one hour. The id is left empty;
    /// one is assigned when the booking is first saved.
    pub fn new(
        user_id: impl Into<RecordId>,
        venue: &Venue,
        date: impl Into<String>,
        start_time: impl Into<String>,
        duration_hours: u32,
        now: Timestamp,
    ) -> Result<Self> {
        let booking = Self {
            id: RecordId::new(),
            user_id: user_id.into(),
            venue_id: venue.id.clone(),
            venue_name: venue.name.clone(),
            date: date.into(),
            start_time: start_time.into(),
            duration_hours,
            total_price: venue.price_per_hour * f64::from(duration_hours),
            status: BookingStatus::Pending,
            payment_id: None,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            created_at: now,
            updated_at: now,
            synced: false,
        };
        booking.window()?;
        Ok(booking)
    }

    /// Start a booking with only the fields tests and fixtures care about.
    pub fn builder(user_id: impl Into<RecordId>, venue_id: impl Into<RecordId>) -> BookingBuilder {
        BookingBuilder::new(user_id.into(), venue_id.into())
    }

    /// Parsed `[start, end)` interval.
    pub fn window(&self) -> Result<BookingWindow> {
        BookingWindow::parse(&self.date, &self.start_time, self.duration_hours)
    }

    /// Whether this booking still occupies its slot.
    pub fn is_active(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }
}

impl Entity for Booking {
    const KIND: EntityKind = EntityKind::Booking;

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

    fn touch(&mut self, now: Timestamp) {
        if self.created_at == 0 {
            self.created_at = now;
        }
        self.updated_at = now;
    }
}

/// Builder for [`Booking`] fixtures. Unset fields take neutral defaults.
#[derive(Debug, Clone)]
pub struct BookingBuilder {
    booking: Booking,
}

impl BookingBuilder {
    fn new(user_id: RecordId, venue_id: RecordId) -> Self {
        Self {
            booking: Booking {
                id: RecordId::new(),
                user_id,
                venue_id,
                venue_name: String::new(),
                date: String::new(),
                start_time: String::new(),
                duration_hours: 1,
                total_price: 0.0,
                status: BookingStatus::Pending,
                payment_id: None,
                payment_status: PaymentStatus::Pending,
                payment_method: None,
                created_at: 0,
                updated_at: 0,
                synced: false,
            },
        }
    }

    pub fn id(mut self, id: impl Into<RecordId>) -> Self {
        self.booking.id = id.into();
        self
    }

    pub fn venue_name(mut self, name: impl Into<String>) -> Self {
        self.booking.venue_name = name.into();
        self
    }

    /// Date, start time and duration in one go.
    pub fn slot(mut self, date: impl Into<String>, start_time: impl Into<String>, hours: u32) -> Self {
        self.booking.date = date.into();
        self.booking.start_time = start_time.into();
        self.booking.duration_hours = hours;
        self
    }

    pub fn status(mut self, status: BookingStatus) -> Self {
        self.booking.status = status;
        self
    }

    pub fn total_price(mut self, price: f64) -> Self {
        self.booking.total_price = price;
        self
    }

    pub fn created_at(mut self, at: Timestamp) -> Self {
        self.booking.created_at = at;
        self.booking.updated_at = at;
        self
    }

    pub fn build(self) -> Booking {
        self.booking
    }
}

/// The half-open interval `[start, end)` a booking occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BookingWindow {
    /// Parse a date, a time of day and a duration into a window.
    pub fn parse(date: &str, start_time: &str, duration_hours: u32) -> Result<Self> {
        if duration_hours == 0 {
            return Err(Error::InvalidDuration(duration_hours));
        }
        let start = parse_date(date)?.and_time(parse_time(start_time)?);
        let end = start
            .checked_add_signed(chrono::Duration::hours(i64::from(duration_hours)))
            .ok_or(Error::DurationOutOfRange(duration_hours))?;
        Ok(Self { start, end })
    }

    /// Half-open overlap: windows that only touch do not overlap.
    pub fn overlaps(&self, other: &BookingWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at < self.end
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidDate(date.to_string()))
}

/// Parse an `HH:MM` (or `HH:MM:SS`) time of day.
pub fn parse_time(time: &str) -> Result<NaiveTime> {
    let trimmed = time.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| Error::InvalidTime(time.to_string()))
}
