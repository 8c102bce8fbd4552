//! Domain Models
//!
//! Core records of the tutoring marketplace. Uses `rust_decimal` for all
//! monetary values - never use f64 for money!

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MarketError, Result};

macro_rules! id_type {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(Uuid);

            impl $name {
                pub fn new() -> Self {
                    Self(Uuid::new_v4())
                }

                pub const fn from_uuid(id: Uuid) -> Self {
                    Self(id)
                }

                pub const fn as_uuid(&self) -> Uuid {
                    self.0
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl From<$name> for Uuid {
                fn from(id: $name) -> Uuid {
                    id.0
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl std::str::FromStr for $name {
                type Err = uuid::Error;

                fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                    Uuid::parse_str(s).map(Self)
                }
            }
        )+
    };
}

id_type!(
    /// Account identifier (issued at registration, carried in session tokens)
    UserId,
    ProfessorId,
    StudentId,
    /// Availability slot identifier
    SlotId,
    BookingId,
    PaymentId,
    CourseId,
    LessonId,
    ReviewId,
    ConversationId,
    MessageId,
);

/// Account role
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Professor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Professor => "PROFESSOR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "STUDENT" => Some(Role::Student),
            "PROFESSOR" => Some(Role::Professor),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered account
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,

    /// `salt$digest`, see [`crate::identity::hash_password`]
    #[serde(default, skip_serializing)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
}

/// Professor profile
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Professor {
    pub id: ProfessorId,
    pub user_id: UserId,
    pub bio: Option<String>,

    /// Price of a one-hour session; `None` falls back to the configured default
    pub hourly_rate: Option<Decimal>,

    pub subjects: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Professor {
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: ProfessorId::new(),
            user_id,
            bio: None,
            hourly_rate: None,
            subjects: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Case-insensitive subject match
    pub fn teaches(&self, subject: &str) -> bool {
        self.subjects.iter().any(|s| s.eq_ignore_ascii_case(subject))
    }
}

/// Student profile
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub user_id: UserId,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: StudentId::new(),
            user_id,
            bio: None,
            created_at: Utc::now(),
        }
    }
}

/// A course published by a professor
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub professor_id: ProfessorId,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A lesson inside a course
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub course_id: CourseId,
    pub title: String,
    pub content: String,

    /// Ordering within the course
    pub position: u32,

    pub created_at: DateTime<Utc>,
}

/// A professor-defined time window offered for booking
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: SlotId,
    pub professor_id: ProfessorId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    /// IANA timezone name the professor published the slot in
    pub timezone: String,

    pub is_booked: bool,
    pub created_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    /// Whether the slot has already started at `now`
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now
    }
}

/// Booking lifecycle
///
/// ```text
/// PENDING ──▶ CONFIRMED ──▶ COMPLETED
///    │            │
///    └────────────┴──▶ CANCELED
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Canceled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Canceled => "CANCELED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    /// No transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Canceled | BookingStatus::Completed)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::{Canceled, Completed, Confirmed, Pending};
        matches!(
            (*self, next),
            (Pending, Confirmed) | (Confirmed, Completed) | (Pending | Confirmed, Canceled)
        )
    }

    /// Validate a transition, returning the new status
    pub fn transition(self, next: BookingStatus) -> Result<BookingStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(MarketError::conflict(format!(
                "Booking cannot move from {} to {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A student's claim on an availability slot
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub student_id: StudentId,
    pub professor_id: ProfessorId,

    /// Unique across all bookings, whatever their status
    pub availability_id: SlotId,

    pub course_id: Option<CourseId>,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Move to `next` if the lifecycle allows it
    pub fn advance(&mut self, next: BookingStatus) -> Result<()> {
        self.status = self.status.transition(next)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Payment lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// What a payment purchased; exactly one of a booking or a course
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PaymentTarget {
    Booking(BookingId),
    Course(CourseId),
}

/// A recorded financial transaction
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub student_id: StudentId,
    pub professor_id: Option<ProfessorId>,
    pub target: PaymentTarget,
    pub amount: Decimal,
    pub currency: String,

    /// Name of the provider that executed the charge
    pub provider: String,

    pub status: PaymentStatus,
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn booking_id(&self) -> Option<BookingId> {
        match self.target {
            PaymentTarget::Booking(id) => Some(id),
            PaymentTarget::Course(_) => None,
        }
    }

    pub fn course_id(&self) -> Option<CourseId> {
        match self.target {
            PaymentTarget::Course(id) => Some(id),
            PaymentTarget::Booking(_) => None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }
}

/// A student's rating of a course or professor
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub student_id: StudentId,
    pub course_id: Option<CourseId>,
    pub professor_id: Option<ProfessorId>,

    /// 1 to 5 inclusive
    pub rating: u8,

    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Message thread between one student and one professor
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub student_id: StudentId,
    pub professor_id: ProfessorId,
    pub created_at: DateTime<Utc>,

    /// Time of the latest message (or creation)
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}
