//! Booking overlap detection and calendar availability.
//!
//! # Semantics
//!
//! Every booking occupies the half-open window `[start, end)`. A candidate
//! conflicts with an existing booking when both are for the same venue,
//! neither is cancelled, and their windows overlap.
//!
//! Records whose date or time cannot be parsed contribute nothing: a
//! malformed candidate never conflicts and a malformed existing booking is
//! ignored. This keeps bad historical data from blocking new bookings.

use crate::booking::{parse_date, BookingWindow};
use crate::{Booking, BookingStatus};
use chrono::{NaiveDate, NaiveTime, Timelike};
use std::collections::{BTreeMap, BTreeSet};

/// Whether `candidate` overlaps any active booking for its venue.
///
/// `existing` may contain bookings for other venues; they are skipped. A
/// stored copy of the candidate itself (same non-empty id) is also skipped so
/// an edited booking can be re-checked against its own old slot.
pub fn has_conflict(candidate: &Booking, existing: &[Booking]) -> bool {
    if candidate.status == BookingStatus::Cancelled {
        return false;
    }
    let Ok(window) = candidate.window() else {
        return false;
    };

    existing
        .iter()
        .filter(|b| b.venue_id == candidate.venue_id && b.is_active())
        .filter(|b| candidate.id.is_empty() || b.id != candidate.id)
        .filter_map(|b| b.window().ok())
        .any(|other| window.overlaps(&other))
}

/// Thresholds after which a calendar date counts as fully booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityPolicy {
    /// Total booked hours on a date at or above which it is full.
    pub max_booked_hours: u32,
    /// Number of bookings on a date at or above which it is full.
    pub max_bookings: usize,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            max_booked_hours: 12,
            max_bookings: 8,
        }
    }
}

/// Dates in `[from, to]` on which `venue_id` is fully booked.
///
/// Hours are attributed to the booking's start date.
pub fn fully_booked_dates(
    venue_id: &str,
    bookings: &[Booking],
    from: NaiveDate,
    to: NaiveDate,
    policy: CapacityPolicy,
) -> BTreeSet<NaiveDate> {
    let mut per_day: BTreeMap<NaiveDate, (u32, usize)> = BTreeMap::new();

    for booking in bookings
        .iter()
        .filter(|b| b.venue_id == venue_id && b.is_active() && b.duration_hours > 0)
    {
        let Ok(date) = parse_date(&booking.date) else {
            continue;
        };
        if date < from || date > to {
            continue;
        }
        let entry = per_day.entry(date).or_default();
        entry.0 = entry.0.saturating_add(booking.duration_hours);
        entry.1 += 1;
    }

    per_day
        .into_iter()
        .filter(|(_, (hours, count))| {
            *hours >= policy.max_booked_hours || *count >= policy.max_bookings
        })
        .map(|(date, _)| date)
        .collect()
}

/// Daily opening hours of a venue. Bookings must end by `closes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningHours {
    pub opens: NaiveTime,
    pub closes: NaiveTime,
}

impl Default for OpeningHours {
    fn default() -> Self {
        Self {
            opens: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
            closes: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
        }
    }
}

/// Whole-hour start times on `date` at which a booking of `duration_hours`
/// fits inside opening hours without overlapping an active booking.
pub fn open_start_times(
    venue_id: &str,
    date: NaiveDate,
    duration_hours: u32,
    hours: OpeningHours,
    bookings: &[Booking],
) -> Vec<NaiveTime> {
    if duration_hours == 0 {
        return Vec::new();
    }

    let taken: Vec<BookingWindow> = bookings
        .iter()
        .filter(|b| b.venue_id == venue_id && b.is_active())
        .filter_map(|b| b.window().ok())
        .collect();

    let closing = date.and_time(hours.closes);
    let length = chrono::Duration::hours(i64::from(duration_hours));

    (hours.opens.hour()..hours.closes.hour())
        .filter_map(|h| NaiveTime::from_hms_opt(h, 0, 0))
        .filter(|t| *t >= hours.opens)
        .filter(|t| {
            let start = date.and_time(*t);
            let Some(end) = start.checked_add_signed(length) else {
                return false;
            };
            let slot = BookingWindow { start, end };
            slot.end <= closing && !taken.iter().any(|w| w.overlaps(&slot))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(id: &str, venue: &str, date: &str, time: &str, hours: u32) -> Booking {
        Booking::builder("u-1", venue)
            .id(id)
            .slot(date, time, hours)
            .status(BookingStatus::Confirmed)
            .build()
    }

    fn day(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn time(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn scenario_overlap_and_adjacent() {
        let existing = vec![booking("b-1", "V", "2024-06-01", "10:00", 2)];
        let overlapping = booking("", "V", "2024-06-01", "11:00", 1);
        let adjacent = booking("", "V", "2024-06-01", "12:00", 1);
        assert!(has_conflict(&overlapping, &existing));
        assert!(!has_conflict(&adjacent, &existing));
    }

    #[test]
    fn boundary_is_half_open() {
        let a = vec![booking("a", "V", "2024-06-01", "14:00", 1)];
        let b = booking("b", "V", "2024-06-01", "15:00", 1);
        let c = booking("c", "V", "2024-06-01", "14:30", 1);
        assert!(!has_conflict(&b, &a));
        assert!(has_conflict(&c, &a));
    }

    #[test]
    fn enclosing_booking_conflicts() {
        let existing = vec![booking("a", "V", "2024-06-01", "14:00", 1)];
        let long = booking("b", "V", "2024-06-01", "12:00", 5);
        assert!(has_conflict(&long, &existing));
    }

    #[test]
    fn other_venues_are_ignored() {
        let existing = vec![booking("a", "W", "2024-06-01", "10:00", 2)];
        let candidate = booking("b", "V", "2024-06-01", "10:00", 2);
        assert!(!has_conflict(&candidate, &existing));
    }

    #[test]
    fn cancelled_bookings_never_conflict() {
        let mut cancelled = booking("a", "V", "2024-06-01", "10:00", 2);
        cancelled.status = BookingStatus::Cancelled;
        let candidate = booking("b", "V", "2024-06-01", "10:00", 2);
        assert!(!has_conflict(&candidate, std::slice::from_ref(&cancelled)));
        assert!(!has_conflict(&cancelled, &[candidate]));
    }

    #[test]
    fn malformed_records_fail_open() {
        let garbage = booking("a", "V", "June 1st", "10am", 2);
        let candidate = booking("b", "V", "2024-06-01", "10:00", 2);
        assert!(!has_conflict(&candidate, std::slice::from_ref(&garbage)));
        assert!(!has_conflict(&garbage, &[candidate]));
    }

    #[test]
    fn own_stored_copy_is_skipped() {
        let stored = booking("b-1", "V", "2024-06-01", "10:00", 2);
        let mut edited = stored.clone();
        edited.start_time = "11:00".into();
        assert!(!has_conflict(&edited, &[stored]));
    }

    #[test]
    fn fully_booked_by_hours() {
        let bookings = vec![
            booking("a", "V", "2024-06-01", "06:00", 6),
            booking("b", "V", "2024-06-01", "12:00", 6),
            booking("c", "V", "2024-06-02", "06:00", 3),
        ];
        let full = fully_booked_dates(
            "V",
            &bookings,
            day("2024-06-01"),
            day("2024-06-30"),
            CapacityPolicy::default(),
        );
        assert_eq!(full.into_iter().collect::<Vec<_>>(), vec![day("2024-06-01")]);
    }

    #[test]
    fn fully_booked_by_count() {
        let bookings: Vec<_> = (0..3)
            .map(|i| booking(&format!("b{i}"), "V", "2024-06-03", &format!("{:02}:00", 8 + i), 1))
            .collect();
        let policy = CapacityPolicy {
            max_booked_hours: 24,
            max_bookings: 3,
        };
        let full = fully_booked_dates("V", &bookings, day("2024-06-01"), day("2024-06-30"), policy);
        assert!(full.contains(&day("2024-06-03")));
    }

    #[test]
    fn fully_booked_respects_range_and_cancellations() {
        let mut cancelled = booking("a", "V", "2024-06-01", "06:00", 12);
        cancelled.status = BookingStatus::Cancelled;
        let outside = booking("b", "V", "2024-07-01", "06:00", 12);
        let full = fully_booked_dates(
            "V",
            &[cancelled, outside],
            day("2024-06-01"),
            day("2024-06-30"),
            CapacityPolicy::default(),
        );
        assert!(full.is_empty());
    }

    #[test]
    fn open_start_times_skip_taken_slots() {
        let bookings = vec![booking("a", "V", "2024-06-01", "10:00", 2)];
        let hours = OpeningHours {
            opens: time(8),
            closes: time(14),
        };
        let open = open_start_times("V", day("2024-06-01"), 1, hours, &bookings);
        assert_eq!(open, vec![time(8), time(9), time(12), time(13)]);
    }

    #[test]
    fn open_start_times_respect_closing() {
        let hours = OpeningHours {
            opens: time(8),
            closes: time(12),
        };
        let open = open_start_times("V", day("2024-06-01"), 3, hours, &[]);
        assert_eq!(open, vec![time(8), time(9)]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_booking(id: &'static str) -> impl Strategy<Value = Booking> {
            (1u32..=3, 6u32..22, 0u32..2, 1u32..=4, 0u8..4).prop_map(
                move |(day, hour, half, hours, status)| {
                    let status = match status {
                        0 => BookingStatus::Pending,
                        1 => BookingStatus::Confirmed,
                        2 => BookingStatus::Cancelled,
                        _ => BookingStatus::Completed,
                    };
                    Booking::builder("u-1", "V")
                        .id(id)
                        .slot(
                            format!("2024-06-{day:02}"),
                            format!("{hour:02}:{:02}", half * 30),
                            hours,
                        )
                        .status(status)
                        .build()
                },
            )
        }

        proptest! {
            #[test]
            fn prop_conflict_is_symmetric(a in arb_booking("a"), b in arb_booking("b")) {
                let ab = has_conflict(&a, std::slice::from_ref(&b));
                let ba = has_conflict(&b, std::slice::from_ref(&a));
                prop_assert_eq!(ab, ba);
            }

            #[test]
            fn prop_cancelled_never_conflicts(a in arb_booking("a"), b in arb_booking("b")) {
                let mut cancelled = b;
                cancelled.status = BookingStatus::Cancelled;
                prop_assert!(!has_conflict(&a, &[cancelled]));
            }

            #[test]
            fn prop_open_slots_never_conflict(
                existing in arb_booking("a"),
                hours in 1u32..=3,
            ) {
                let date = parse_date(&existing.date).unwrap();
                let slots = open_start_times("V", date, hours, OpeningHours::default(), std::slice::from_ref(&existing));
                for slot in slots {
                    let candidate = Booking::builder("u-2", "V")
                        .slot(existing.date.clone(), slot.format("%H:%M").to_string(), hours)
                        .build();
                    prop_assert!(!has_conflict(&candidate, std::slice::from_ref(&existing)));
                }
            }
        }
    }
}
