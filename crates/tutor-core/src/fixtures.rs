//! Test Fixtures
//!
//! Seed helpers for tests. Rows are written straight into the store so tests
//! can set up states the services refuse to create (slots in the past, for
//! instance).

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use crate::model::{
    AvailabilitySlot, Course, CourseId, Professor, ProfessorId, Role, SlotId, Student, User,
    UserId,
};
use crate::store::{MemoryStore, Record};

/// Commit a single row
pub fn insert<R: Record>(store: &MemoryStore, row: R) -> R {
    let mut tx = store.begin();
    tx.put(row.clone());
    tx.commit().expect("fixture insert");
    row
}

fn user(store: &MemoryStore, role: Role, name: &str) -> User {
    let id = UserId::new();
    insert(
        store,
        User {
            id,
            email: format!("{}-{id}@example.com", name.to_lowercase()),
            name: name.into(),
            role,
            password_hash: String::new(),
            created_at: Utc::now(),
        },
    )
}

/// A professor account with an optional hourly rate
pub fn professor(store: &MemoryStore, hourly_rate: Option<Decimal>) -> (User, Professor) {
    let user = user(store, Role::Professor, "Professor");
    let mut profile = Professor::new(user.id);
    profile.hourly_rate = hourly_rate;
    let profile = insert(store, profile);
    (user, profile)
}

pub fn student(store: &MemoryStore) -> (User, Student) {
    let user = user(store, Role::Student, "Student");
    let profile = insert(store, Student::new(user.id));
    (user, profile)
}

/// A one-hour slot starting `starts_in` from now (negative = already started)
pub fn slot(store: &MemoryStore, professor_id: ProfessorId, starts_in: Duration) -> AvailabilitySlot {
    let start = Utc::now() + starts_in;
    insert(
        store,
        AvailabilitySlot {
            id: SlotId::new(),
            professor_id,
            start_time: start,
            end_time: start + Duration::hours(1),
            timezone: "UTC".into(),
            is_booked: false,
            created_at: Utc::now(),
        },
    )
}

pub fn course(store: &MemoryStore, professor_id: ProfessorId, price: Decimal) -> Course {
    insert(
        store,
        Course {
            id: CourseId::new(),
            professor_id,
            title: "Linear Algebra".into(),
            description: "Vectors, matrices and friends".into(),
            price,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
    )
}
