//! Professor and student profiles

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tutor_core::directory;
use tutor_core::{
    MarketError, MemoryStore, Professor, ProfessorId, Reader, Result, Student, StudentId, User,
    UserId,
};

use crate::reviews::{RatingSummary, rating_summary};

/// Public view of a professor
#[derive(Clone, Debug, Serialize)]
pub struct ProfessorProfile {
    #[serde(flatten)]
    pub professor: Professor,
    pub name: String,
    pub rating: RatingSummary,
}

/// Public view of a student
#[derive(Clone, Debug, Serialize)]
pub struct StudentProfile {
    #[serde(flatten)]
    pub student: Student,
    pub name: String,
}

/// Partial update; absent fields are left alone
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfessorUpdate {
    pub bio: Option<String>,
    pub hourly_rate: Option<Decimal>,
    pub subjects: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct StudentUpdate {
    pub bio: Option<String>,
}

pub struct ProfileService {
    store: Arc<MemoryStore>,
}

impl ProfileService {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn get_professor(&self, id: ProfessorId) -> Result<ProfessorProfile> {
        let professor = self
            .store
            .get::<Professor>(id)?
            .ok_or_else(|| MarketError::not_found("Professor not found"))?;
        professor_profile(&*self.store, professor)
    }

    /// Professors teaching `subject` (all when `None`), by name
    pub fn list_professors(&self, subject: Option<&str>) -> Result<Vec<ProfessorProfile>> {
        let subject = subject.map(str::trim).filter(|s| !s.is_empty());
        let mut profiles = self
            .store
            .find(|p: &Professor| subject.is_none_or(|s| p.teaches(s)))?
            .into_iter()
            .map(|professor| professor_profile(&*self.store, professor))
            .collect::<Result<Vec<_>>>()?;
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }

    pub async fn update_professor(&self, actor: UserId, update: ProfessorUpdate) -> Result<ProfessorProfile> {
        if update.hourly_rate.is_some_and(|rate| rate.is_sign_negative()) {
            return Err(MarketError::validation("Hourly rate cannot be negative"));
        }

        let mut tx = self.store.begin();
        let current = directory::require_professor(&tx, actor)?;
        let mut professor = tx
            .lock::<Professor>(current.id)
            .await?
            .ok_or_else(|| MarketError::not_found("Professor not found"))?;

        if let Some(bio) = update.bio {
            professor.bio = non_blank(bio);
        }
        if let Some(rate) = update.hourly_rate {
            professor.hourly_rate = Some(rate);
        }
        if let Some(subjects) = update.subjects {
            professor.subjects = subjects
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        tx.put(professor.clone());
        let profile = professor_profile(&tx, professor)?;
        tx.commit()?;

        tracing::info!(professor_id = %profile.professor.id, "Updated professor profile");
        Ok(profile)
    }

    pub fn get_student(&self, id: StudentId) -> Result<StudentProfile> {
        let student = self
            .store
            .get::<Student>(id)?
            .ok_or_else(|| MarketError::not_found("Student not found"))?;
        let name = display_name(&*self.store, student.user_id)?;
        Ok(StudentProfile { student, name })
    }

    pub async fn update_student(&self, actor: UserId, update: StudentUpdate) -> Result<StudentProfile> {
        let mut tx = self.store.begin();
        let current = directory::require_student(&tx, actor)?;
        let mut student = tx
            .lock::<Student>(current.id)
            .await?
            .ok_or_else(|| MarketError::not_found("Student not found"))?;

        if let Some(bio) = update.bio {
            student.bio = non_blank(bio);
        }
        tx.put(student.clone());
        let name = display_name(&tx, student.user_id)?;
        tx.commit()?;

        tracing::info!(student_id = %student.id, "Updated student profile");
        Ok(StudentProfile { student, name })
    }
}

fn professor_profile(reader: &impl Reader, professor: Professor) -> Result<ProfessorProfile> {
    Ok(ProfessorProfile {
        name: display_name(reader, professor.user_id)?,
        rating: rating_summary(reader, professor.id)?,
        professor,
    })
}

fn display_name(reader: &impl Reader, user_id: UserId) -> Result<String> {
    Ok(reader
        .get::<User>(user_id)?
        .map(|user| user.name)
        .unwrap_or_default())
}

fn non_blank(s: String) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tutor_core::{ErrorKind, fixtures};

    fn service() -> (Arc<MemoryStore>, ProfileService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), ProfileService::new(store))
    }

    #[tokio::test]
    async fn test_update_professor() {
        let (store, profiles) = service();
        let (user, professor) = fixtures::professor(&store, None);

        let updated = profiles
            .update_professor(
                user.id,
                ProfessorUpdate {
                    bio: Some("  Number theory nerd ".into()),
                    hourly_rate: Some(dec!(45.50)),
                    subjects: Some(vec!["Math".into(), " ".into(), "Physics".into()]),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.professor.id, professor.id);
        assert_eq!(updated.professor.bio.as_deref(), Some("Number theory nerd"));
        assert_eq!(updated.professor.hourly_rate, Some(dec!(45.50)));
        assert_eq!(updated.professor.subjects, vec!["Math", "Physics"]);
        assert_eq!(updated.rating.count, 0);
    }

    #[tokio::test]
    async fn test_update_professor_rejects_negative_rate() {
        let (store, profiles) = service();
        let (user, _) = fixtures::professor(&store, None);

        let err = profiles
            .update_professor(
                user.id,
                ProfessorUpdate {
                    hourly_rate: Some(dec!(-1)),
                    ..ProfessorUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_students_cannot_edit_professor_profile() {
        let (store, profiles) = service();
        let (user, _) = fixtures::student(&store);

        let err = profiles
            .update_professor(user.id, ProfessorUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_list_filters_by_subject() {
        let (store, profiles) = service();
        let (math, _) = fixtures::professor(&store, None);
        fixtures::professor(&store, None);
        profiles
            .update_professor(
                math.id,
                ProfessorUpdate {
                    subjects: Some(vec!["Mathematics".into()]),
                    ..ProfessorUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(profiles.list_professors(None).unwrap().len(), 2);
        let found = profiles.list_professors(Some("mathematics")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].professor.user_id, math.id);
    }

    #[tokio::test]
    async fn test_student_profile() {
        let (store, profiles) = service();
        let (user, student) = fixtures::student(&store);

        profiles
            .update_student(user.id, StudentUpdate { bio: Some("Learning Rust".into()) })
            .await
            .unwrap();
        let profile = profiles.get_student(student.id).unwrap();
        assert_eq!(profile.student.bio.as_deref(), Some("Learning Rust"));
        assert_eq!(profile.name, user.name);

        let err = profiles.get_student(StudentId::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
