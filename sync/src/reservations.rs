//! Reserving and cancelling venue slots.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use groundbook_engine::{
    fully_booked_dates, has_conflict, open_start_times, transition_notice, Booking, BookingStatus,
    CapacityPolicy, Clock, Notification, OpeningHours, RecordId,
};
use tokio::sync::Mutex;

use crate::reconcile::{SyncError, SyncManager, SyncOutcome};
use crate::store::StoreError;

/// Errors from reserving or cancelling.
#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("{date} {start_time} overlaps an existing booking at venue {venue_id}")]
    Conflict {
        venue_id: RecordId,
        date: String,
        start_time: String,
    },

    #[error("Invalid booking: {0}")]
    Invalid(#[from] groundbook_engine::Error),

    #[error("Booking not found: {0}")]
    NotFound(RecordId),

    #[error("Booking {id} is already {status:?}")]
    NotCancellable { id: RecordId, status: BookingStatus },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Booking workflow on top of the sync manager.
pub struct Reservations {
    sync: Arc<SyncManager>,
    clock: Arc<dyn Clock>,
    capacity: CapacityPolicy,
    hours: OpeningHours,
    // Check-then-write must not interleave between two reservations.
    writer: Mutex<()>,
}

impl Reservations {
    pub fn new(sync: Arc<SyncManager>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sync,
            clock,
            capacity: CapacityPolicy::default(),
            hours: OpeningHours::default(),
            writer: Mutex::new(()),
        }
    }

    pub fn with_capacity(mut self, capacity: CapacityPolicy) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_opening_hours(mut self, hours: OpeningHours) -> Self {
        self.hours = hours;
        self
    }

    /// Validate `booking`, reject it if it overlaps an active booking of the
    /// same venue, then save and push it.
    pub async fn reserve(&self, booking: Booking) -> Result<SyncOutcome<Booking>, ReservationError> {
        booking.window()?;

        let _guard = self.writer.lock().await;
        let existing = self.sync.store().bookings_for_venue(&booking.venue_id).await?;
        if has_conflict(&booking, &existing) {
            tracing::info!(
                venue_id = %booking.venue_id,
                date = %booking.date,
                start_time = %booking.start_time,
                "Rejected overlapping booking"
            );
            return Err(ReservationError::Conflict {
                venue_id: booking.venue_id,
                date: booking.date,
                start_time: booking.start_time,
            });
        }

        Ok(self.sync.sync_entity(booking).await?)
    }

    /// Cancel a booking and tell its owner.
    pub async fn cancel(&self, booking_id: &str) -> Result<SyncOutcome<Booking>, ReservationError> {
        let mut booking = self
            .sync
            .store()
            .get::<Booking>(booking_id)
            .await?
            .ok_or_else(|| ReservationError::NotFound(booking_id.to_string()))?;
        if booking.status.is_terminal() {
            return Err(ReservationError::NotCancellable {
                id: booking.id,
                status: booking.status,
            });
        }
        booking.status = BookingStatus::Cancelled;

        let result = self.sync.sync_entity(booking.clone()).await;
        if !matches!(result, Err(SyncError::Store(_))) {
            self.notify_cancelled(&booking).await;
        }
        Ok(result?)
    }

    /// Fully booked dates of a venue in `[from, to]`.
    pub async fn availability(
        &self,
        venue_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>, StoreError> {
        let bookings = self.sync.store().bookings_for_venue(venue_id).await?;
        Ok(fully_booked_dates(venue_id, &bookings, from, to, self.capacity))
    }

    /// Free start times on `date` for a booking of `duration_hours`.
    pub async fn open_slots(
        &self,
        venue_id: &str,
        date: NaiveDate,
        duration_hours: u32,
    ) -> Result<Vec<NaiveTime>, StoreError> {
        let bookings = self.sync.store().bookings_for_venue(venue_id).await?;
        Ok(open_start_times(venue_id, date, duration_hours, self.hours, &bookings))
    }

    async fn notify_cancelled(&self, booking: &Booking) {
        let Some(notice) = transition_notice(booking, BookingStatus::Cancelled) else {
            return;
        };
        let notification = Notification::new(
            booking.user_id.clone(),
            notice.title,
            notice.body,
            notice.kind,
            Some(booking.id.clone()),
            self.clock.now_millis(),
        );
        if let Err(e) = self.sync.sync_entity(notification).await {
            tracing::warn!(booking_id = %booking.id, error = %e, "Cancellation notice kept locally");
        }
    }
}
