//! Booking State Machine
//!
//! ```text
//! create ──▶ PENDING ──confirm──▶ CONFIRMED ──complete──▶ COMPLETED
//!               │                     │
//!               └───────cancel────────┴──────────────────▶ CANCELED
//! ```
//!
//! Every mutation runs in one store transaction. Creation locks the slot row
//! before reading it, so two students racing for the same slot serialize and
//! the loser sees the winner's booking. The unique constraint on
//! `availability_id` backs this up for any path that skips the lock.
//!
//! Lock order is always booking row, then slot row. Creation also locks the
//! referenced course after the slot, so it serializes with course deletion.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use tutor_core::{
    AvailabilitySlot, Booking, BookingId, BookingStatus, Course, CourseId, MarketError,
    MemoryStore, Professor, ProfessorId, Reader, Result, SlotId, Student, StudentId, Transaction,
    User, UserId,
};

use crate::availability::AvailabilityLedger;

/// Request to reserve a slot
#[derive(Clone, Debug, Deserialize)]
pub struct NewBooking {
    pub student_id: StudentId,
    pub availability_id: SlotId,
    #[serde(default)]
    pub course_id: Option<CourseId>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A booking joined with its parties, slot and course
#[derive(Clone, Debug, Serialize)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub student: Party<Student>,
    pub professor: Party<Professor>,
    pub availability: AvailabilitySlot,
    pub course: Option<Course>,
}

/// A profile with its account's display name
#[derive(Clone, Debug, Serialize)]
pub struct Party<P> {
    pub name: String,
    #[serde(flatten)]
    pub profile: P,
}

/// Which side of a booking the actor is on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Student,
    Professor,
}

/// Booking lifecycle operations
pub struct BookingService {
    store: Arc<MemoryStore>,
}

impl BookingService {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Reserve a free slot for a student; the booking starts `PENDING`
    ///
    /// The slot's `is_booked` flag is left alone until confirmation.
    pub async fn create(&self, request: NewBooking) -> Result<BookingDetails> {
        let mut tx = self.store.begin();

        let slot = tx
            .lock::<AvailabilitySlot>(request.availability_id)
            .await?
            .ok_or_else(|| MarketError::not_found("Availability slot not found"))?;

        if slot.is_booked {
            return Err(MarketError::conflict("Slot is already booked"));
        }
        if slot.has_started(Utc::now()) {
            return Err(MarketError::validation("Slot start time has passed"));
        }
        if tx
            .find_one(|b: &Booking| b.availability_id == slot.id)?
            .is_some()
        {
            return Err(MarketError::conflict("Slot already has a booking"));
        }

        if tx.get::<Student>(request.student_id)?.is_none() {
            return Err(MarketError::not_found("Student not found"));
        }
        if let Some(course_id) = request.course_id {
            let course = tx
                .lock::<Course>(course_id)
                .await?
                .ok_or_else(|| MarketError::not_found("Course not found"))?;
            if course.professor_id != slot.professor_id {
                return Err(MarketError::validation(
                    "Course is not taught by the slot's professor",
                ));
            }
        }

        let now = Utc::now();
        let booking = Booking {
            id: BookingId::new(),
            student_id: request.student_id,
            professor_id: slot.professor_id,
            availability_id: slot.id,
            course_id: request.course_id,
            status: BookingStatus::Pending,
            notes: request
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            created_at: now,
            updated_at: now,
        };
        tx.put(booking.clone());
        let details = details(&tx, booking)?;
        tx.commit()?;

        tracing::info!(
            booking_id = %details.booking.id,
            slot_id = %slot.id,
            student_id = %request.student_id,
            "Booking created"
        );
        Ok(details)
    }

    /// Cancel a pending or confirmed booking and release its slot
    ///
    /// Either party may cancel. The slot is forced free whatever its prior state.
    pub async fn cancel(&self, actor: UserId, booking_id: BookingId) -> Result<BookingDetails> {
        let mut tx = self.store.begin();
        let mut booking = lock_booking(&mut tx, booking_id).await?;
        let side = side_of(&tx, &booking, actor)?;

        booking.advance(BookingStatus::Canceled)?;

        tx.lock::<AvailabilitySlot>(booking.availability_id).await?;
        AvailabilityLedger::mark_free(&mut tx, booking.availability_id)?;
        tx.put(booking.clone());
        let details = details(&tx, booking)?;
        tx.commit()?;

        tracing::info!(booking_id = %booking_id, canceled_by = ?side, "Booking canceled");
        Ok(details)
    }

    /// Professor accepts a pending booking; the slot becomes booked
    pub async fn confirm(&self, actor: UserId, booking_id: BookingId) -> Result<BookingDetails> {
        let mut tx = self.store.begin();
        let mut booking = lock_booking(&mut tx, booking_id).await?;
        require_professor_party(&tx, &booking, actor)?;

        booking.advance(BookingStatus::Confirmed)?;

        tx.lock::<AvailabilitySlot>(booking.availability_id).await?;
        AvailabilityLedger::mark_booked(&mut tx, booking.availability_id)?;
        tx.put(booking.clone());
        let details = details(&tx, booking)?;
        tx.commit()?;

        tracing::info!(booking_id = %booking_id, "Booking confirmed");
        Ok(details)
    }

    /// Professor marks a confirmed session as held; the slot stays booked
    pub async fn complete(&self, actor: UserId, booking_id: BookingId) -> Result<BookingDetails> {
        let mut tx = self.store.begin();
        let mut booking = lock_booking(&mut tx, booking_id).await?;
        require_professor_party(&tx, &booking, actor)?;

        booking.advance(BookingStatus::Completed)?;

        tx.put(booking.clone());
        let details = details(&tx, booking)?;
        tx.commit()?;

        tracing::info!(booking_id = %booking_id, "Booking completed");
        Ok(details)
    }

    /// A booking visible to one of its parties
    pub fn get(&self, actor: UserId, booking_id: BookingId) -> Result<BookingDetails> {
        let booking = self
            .store
            .get::<Booking>(booking_id)?
            .ok_or_else(|| MarketError::not_found("Booking not found"))?;
        side_of(&*self.store, &booking, actor)?;
        details(&*self.store, booking)
    }

    /// Newest first
    pub fn list_for_student(&self, student_id: StudentId) -> Result<Vec<BookingDetails>> {
        self.list(|b| b.student_id == student_id)
    }

    /// Newest first
    pub fn list_for_professor(&self, professor_id: ProfessorId) -> Result<Vec<BookingDetails>> {
        self.list(|b| b.professor_id == professor_id)
    }

    fn list(&self, filter: impl Fn(&Booking) -> bool) -> Result<Vec<BookingDetails>> {
        let mut bookings = self.store.find(filter)?;
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
            .into_iter()
            .map(|booking| details(&*self.store, booking))
            .collect()
    }
}

async fn lock_booking(
    tx: &mut Transaction<'_>,
    booking_id: BookingId,
) -> Result<Booking> {
    tx.lock::<Booking>(booking_id)
        .await?
        .ok_or_else(|| MarketError::not_found("Booking not found"))
}

/// Which party `actor` is, or `Forbidden`
pub fn side_of(reader: &impl Reader, booking: &Booking, actor: UserId) -> Result<Side> {
    let student = reader.get::<Student>(booking.student_id)?;
    if student.is_some_and(|s| s.user_id == actor) {
        return Ok(Side::Student);
    }
    let professor = reader.get::<Professor>(booking.professor_id)?;
    if professor.is_some_and(|p| p.user_id == actor) {
        return Ok(Side::Professor);
    }
    Err(MarketError::forbidden("Not a party to this booking"))
}

fn require_professor_party(reader: &impl Reader, booking: &Booking, actor: UserId) -> Result<()> {
    match side_of(reader, booking, actor) {
        Ok(Side::Professor) => Ok(()),
        Ok(Side::Student) | Err(_) => Err(MarketError::forbidden(
            "Only the booking's professor can do this",
        )),
    }
}

fn party<P>(reader: &impl Reader, user_id: UserId, profile: P) -> Result<Party<P>> {
    let name = reader
        .get::<User>(user_id)?
        .map(|u| u.name)
        .unwrap_or_default();
    Ok(Party { name, profile })
}

/// Join a booking with its student, professor, slot and course
pub fn details(reader: &impl Reader, booking: Booking) -> Result<BookingDetails> {
    let student = reader
        .get::<Student>(booking.student_id)?
        .ok_or_else(|| MarketError::not_found("Student not found"))?;
    let professor = reader
        .get::<Professor>(booking.professor_id)?
        .ok_or_else(|| MarketError::not_found("Professor not found"))?;
    let availability = reader
        .get::<AvailabilitySlot>(booking.availability_id)?
        .ok_or_else(|| MarketError::not_found("Availability slot not found"))?;
    let course = match booking.course_id {
        Some(id) => reader.get::<Course>(id)?,
        None => None,
    };

    Ok(BookingDetails {
        student: party(reader, student.user_id, student)?,
        professor: party(reader, professor.user_id, professor)?,
        availability,
        course,
        booking,
    })
}
