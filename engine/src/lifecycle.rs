//! Time-driven booking status transitions.
//!
//! Checked in priority order against the current local time:
//!
//! 1. `now >= end` and not terminal: `COMPLETED`
//! 2. `start <= now < end` and `PENDING`: `CONFIRMED`
//! 3. otherwise unchanged
//!
//! `CANCELLED` and `COMPLETED` bookings are never touched.

use crate::{error::Result, Booking, BookingStatus, NotificationType};
use chrono::NaiveDateTime;

/// The status `booking` should move to at `now`, if any.
///
/// Returns an error only when the booking's slot cannot be parsed; callers
/// skip such bookings.
pub fn next_status(booking: &Booking, now: NaiveDateTime) -> Result<Option<BookingStatus>> {
    if booking.status.is_terminal() {
        return Ok(None);
    }
    let window = booking.window()?;

    if now >= window.end {
        return Ok(Some(BookingStatus::Completed));
    }
    if window.contains(now) && booking.status == BookingStatus::Pending {
        return Ok(Some(BookingStatus::Confirmed));
    }
    Ok(None)
}

/// Notification text for a booking that moved to `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
    pub kind: NotificationType,
}

/// What to tell the booking's owner about a status change.
pub fn transition_notice(booking: &Booking, status: BookingStatus) -> Option<Notice> {
    let venue = if booking.venue_name.is_empty() {
        "your venue"
    } else {
        booking.venue_name.as_str()
    };
    let when = format!("{} at {}", booking.date, booking.start_time);

    let (title, body, kind) = match status {
        BookingStatus::Confirmed => (
            "Booking confirmed",
            format!("Your booking at {venue} on {when} has started. Enjoy the game!"),
            NotificationType::BookingConfirmed,
        ),
        BookingStatus::Completed => (
            "Booking completed",
            format!("Your booking at {venue} on {when} is over. How was it? Leave a review."),
            NotificationType::BookingCompleted,
        ),
        BookingStatus::Cancelled => (
            "Booking cancelled",
            format!("Your booking at {venue} on {when} was cancelled."),
            NotificationType::BookingCancelled,
        ),
        BookingStatus::Pending => return None,
    };

    Some(Notice {
        title: title.to_string(),
        body,
        kind,
    })
}
