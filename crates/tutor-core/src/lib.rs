//! # tutor-core
//!
//! Domain model, persistence and identity for the tutoring marketplace.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        tutor-server                           │
//! ├───────────────┬──────────────────┬───────────────────────────┤
//! │ tutor-catalog │ tutor-payments   │ tutor-scheduling           │
//! │ (reviews gate)│ (PaymentProvider │ (Availability Ledger,      │
//! │               │   strategy)      │  Booking State Machine)    │
//! ├───────────────┴──────────────────┴───────────────────────────┤
//! │  tutor-core: model · MemoryStore (tx, row locks, uniques)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every multi-step mutation runs in one [`store::Transaction`]: row locks
//! serialize writers per row, staged writes commit together or not at all.

pub mod directory;
pub mod error;
pub mod identity;
pub mod model;
pub mod store;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use error::{ErrorKind, MarketError, Result, StoreError};
pub use identity::{Claims, SessionToken, TokenSigner};
pub use model::{
    AvailabilitySlot, Booking, BookingId, BookingStatus, Conversation, ConversationId, Course,
    CourseId, Lesson, LessonId, Message, MessageId, Payment, PaymentId, PaymentStatus,
    PaymentTarget, Professor, ProfessorId, Review, ReviewId, Role, SlotId, Student, StudentId,
    User, UserId,
};
pub use store::{MemoryStore, Reader, Record, Transaction};
