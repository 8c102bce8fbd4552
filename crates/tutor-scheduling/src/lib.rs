//! # tutor-scheduling
//!
//! Availability slots and the booking lifecycle.
//!
//! - [`AvailabilityLedger`] publishes, lists and deletes slots and flips
//!   `is_booked` inside a caller's transaction.
//! - [`BookingService`] drives `PENDING → CONFIRMED → COMPLETED` and
//!   `→ CANCELED`, keeping each slot's flag consistent with its booking.

pub mod availability;
pub mod booking;

pub use availability::AvailabilityLedger;
pub use booking::{BookingDetails, BookingService, NewBooking, Party, Side};
