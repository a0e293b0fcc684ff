//! # Groundbook Engine
//!
//! Domain logic for an offline-first venue booking client.
//!
//! This crate holds everything about bookings that can be decided without
//! touching a disk or a socket: the entity model mirrored between the device
//! cache and the remote API, the booking-overlap rules used before a
//! reservation is accepted, and the time-driven status transitions.
//!
//! ## Design Principles
//!
//! - **No IO**: storage, HTTP and scheduling live in `groundbook-sync`
//! - **Deterministic**: time is always passed in, never read implicitly
//! - **Fail-open on bad data**: unparseable dates never block a booking
//!
//! ## Core Concepts
//!
//! ### Entities
//!
//! Every cached record implements [`Entity`]: it has an opaque string id, a
//! `synced` flag and belongs to one [`EntityKind`]. The kinds are
//! [`Booking`], [`Venue`], [`User`], [`Review`], [`Favorite`] and
//! [`Notification`].
//!
//! ### Booking windows
//!
//! A booking occupies the half-open interval
//! `[date + startTime, date + startTime + durationHours)`. Two bookings that
//! touch at exactly one instant do not overlap.
//!
//! ### Conflicts
//!
//! [`has_conflict`] decides whether a candidate booking overlaps any active
//! booking of the same venue. [`fully_booked_dates`] and
//! [`open_start_times`] feed calendar availability.
//!
//! ### Lifecycle
//!
//! [`next_status`] advances `PENDING -> CONFIRMED -> COMPLETED` as wall-clock
//! time passes. `CANCELLED` and `COMPLETED` are terminal.
//!
//! ## Quick Start
//!
//! ```rust
//! use groundbook_engine::{has_conflict, Booking, BookingStatus};
//!
//! let existing = Booking::builder("user-1", "venue-1")
//!     .id("b-1")
//!     .slot("2024-06-01", "10:00", 2)
//!     .status(BookingStatus::Confirmed)
//!     .build();
//!
//! let overlapping = Booking::builder("user-2", "venue-1")
//!     .slot("2024-06-01", "11:00", 1)
//!     .build();
//! assert!(has_conflict(&overlapping, std::slice::from_ref(&existing)));
//!
//! let adjacent = Booking::builder("user-2", "venue-1")
//!     .slot("2024-06-01", "12:00", 1)
//!     .build();
//! assert!(!has_conflict(&adjacent, &[existing]));
//! ```

pub mod booking;
pub mod clock;
pub mod conflict;
pub mod error;
pub mod favorite;
pub mod lifecycle;
pub mod notification;
pub mod record;
pub mod review;
pub mod user;
pub mod venue;
pub mod wire;

// Re-export main types at crate root
pub use booking::{Booking, BookingBuilder, BookingStatus, BookingWindow, PaymentStatus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use conflict::{
    fully_booked_dates, has_conflict, open_start_times, CapacityPolicy, OpeningHours,
};
pub use error::Error;
pub use favorite::Favorite;
pub use lifecycle::{next_status, transition_notice, Notice};
pub use notification::{Notification, NotificationType};
pub use record::{Entity, EntityKind};
pub use review::Review;
pub use user::{User, UserRole};
pub use venue::{average_rating, Venue};

/// Type aliases for clarity
pub type RecordId = String;
/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;
