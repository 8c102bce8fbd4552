//! Profile Directory
//!
//! Resolves an acting user to the professor or student profile that owns
//! bookings, payments and reviews.

use crate::error::{MarketError, Result};
use crate::model::{Professor, Student, User, UserId};
use crate::store::Reader;

pub fn professor_for_user(reader: &impl Reader, user_id: UserId) -> Result<Option<Professor>> {
    Ok(reader.find_one(|p: &Professor| p.user_id == user_id)?)
}

pub fn student_for_user(reader: &impl Reader, user_id: UserId) -> Result<Option<Student>> {
    Ok(reader.find_one(|s: &Student| s.user_id == user_id)?)
}

/// The acting user's professor profile, or `Forbidden`
pub fn require_professor(reader: &impl Reader, user_id: UserId) -> Result<Professor> {
    professor_for_user(reader, user_id)?
        .ok_or_else(|| MarketError::forbidden("Only professors can perform this action"))
}

/// The acting user's student profile, or `Forbidden`
pub fn require_student(reader: &impl Reader, user_id: UserId) -> Result<Student> {
    student_for_user(reader, user_id)?
        .ok_or_else(|| MarketError::forbidden("Only students can perform this action"))
}

pub fn user_by_email(reader: &impl Reader, email: &str) -> Result<Option<User>> {
    Ok(reader.find_one(|u: &User| u.email.eq_ignore_ascii_case(email))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_role_lookup() {
        let store = MemoryStore::new();
        let professor = Professor::new(UserId::new());
        let student = Student::new(UserId::new());

        let mut tx = store.begin();
        tx.put(professor.clone());
        tx.put(student.clone());
        tx.commit().unwrap();

        assert_eq!(require_professor(&store, professor.user_id).unwrap().id, professor.id);
        assert_eq!(require_student(&store, student.user_id).unwrap().id, student.id);

        let err = require_professor(&store, student.user_id).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Forbidden);
        assert!(student_for_user(&store, professor.user_id).unwrap().is_none());
    }
}
