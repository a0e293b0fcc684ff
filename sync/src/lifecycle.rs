//! Periodic booking status advancement.
//!
//! Each run walks every cached booking, applies
//! [`groundbook_engine::next_status`], pushes changed bookings through the
//! sync manager and leaves the owner a notification about the change.

use std::sync::Arc;
use std::time::Duration;

use groundbook_engine::{
    next_status, transition_notice, Booking, BookingStatus, Clock, Notification,
};
use serde::Serialize;
use tokio::sync::watch;

use crate::reconcile::{SyncError, SyncManager};
use crate::store::StoreError;

/// What one run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleReport {
    pub scanned: usize,
    pub confirmed: usize,
    pub completed: usize,
    /// Bookings whose slot could not be parsed.
    pub skipped: usize,
    /// Changes kept locally because the push failed.
    pub sync_failures: usize,
}

impl LifecycleReport {
    pub fn changed(&self) -> usize {
        self.confirmed + self.completed
    }
}

/// Advances booking statuses as time passes.
pub struct LifecycleWorker {
    sync: Arc<SyncManager>,
    clock: Arc<dyn Clock>,
}

impl LifecycleWorker {
    pub fn new(sync: Arc<SyncManager>, clock: Arc<dyn Clock>) -> Self {
        Self { sync, clock }
    }

    /// Run once over every cached booking.
    ///
    /// Only failing to read the cache aborts the run; individual bookings
    /// never do.
    pub async fn run_once(&self) -> Result<LifecycleReport, StoreError> {
        let bookings = self.sync.store().list::<Booking>().await?;
        let now = self.clock.now();
        let mut report = LifecycleReport::default();

        for booking in bookings {
            report.scanned += 1;
            let next = match next_status(&booking, now) {
                Ok(Some(next)) => next,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(booking_id = %booking.id, error = %e, "Skipping booking with unparseable slot");
                    report.skipped += 1;
                    continue;
                }
            };

            tracing::info!(booking_id = %booking.id, from = ?booking.status, to = ?next, "Advancing booking");
            let mut updated = booking;
            updated.status = next;

            match self.sync.sync_entity(updated.clone()).await {
                Ok(_) => {}
                Err(SyncError::Remote(e)) => {
                    tracing::warn!(booking_id = %updated.id, error = %e, "Status change kept locally");
                    report.sync_failures += 1;
                }
                Err(SyncError::Store(e)) => {
                    tracing::error!(booking_id = %updated.id, error = %e, "Failed to store status change");
                    report.sync_failures += 1;
                    continue;
                }
            }

            match next {
                BookingStatus::Confirmed => report.confirmed += 1,
                BookingStatus::Completed => report.completed += 1,
                _ => {}
            }
            if !self.notify(&updated, next).await {
                report.sync_failures += 1;
            }
        }

        Ok(report)
    }

    /// Run every `every` until shutdown. A failed run is retried on the next
    /// tick.
    pub async fn run(self, every: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => match self.run_once().await {
                    Ok(report) if report.changed() > 0 => {
                        tracing::info!(
                            confirmed = report.confirmed,
                            completed = report.completed,
                            sync_failures = report.sync_failures,
                            "Lifecycle run finished"
                        );
                    }
                    Ok(report) => {
                        tracing::debug!(scanned = report.scanned, "Lifecycle run found nothing to do");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Lifecycle run failed");
                    }
                },
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("Lifecycle worker stopped");
    }

    /// Record a notification for the booking's owner. Returns false if it
    /// could not be pushed.
    async fn notify(&self, booking: &Booking, status: BookingStatus) -> bool {
        let Some(notice) = transition_notice(booking, status) else {
            return true;
        };
        let notification = Notification::new(
            booking.user_id.clone(),
            notice.title,
            notice.body,
            notice.kind,
            Some(booking.id.clone()),
            self.clock.now_millis(),
        );
        match self.sync.sync_entity(notification).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(booking_id = %booking.id, error = %e, "Failed to push notification");
                false
            }
        }
    }
}
