//! Courses and lessons
//!
//! Professors publish courses made of ordered lessons. Every mutation runs
//! under the course row lock, which `charge_for_course` also takes, so a
//! course cannot disappear under a purchase in flight.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tutor_core::directory;
use tutor_core::{
    Booking, BookingStatus, Course, CourseId, Lesson, LessonId, MarketError, MemoryStore, Payment,
    PaymentTarget, ProfessorId, Reader, Result, Transaction, UserId,
};

#[derive(Clone, Debug, Deserialize)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
}

/// Partial update; absent fields are left alone
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewLesson {
    pub title: String,
    #[serde(default)]
    pub content: String,

    /// Appended after the last lesson when absent
    #[serde(default)]
    pub position: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LessonUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub position: Option<u32>,
}

/// A course with its lessons in order
#[derive(Clone, Debug, Serialize)]
pub struct CourseDetails {
    #[serde(flatten)]
    pub course: Course,
    pub lessons: Vec<Lesson>,
}

pub struct CourseService {
    store: Arc<MemoryStore>,
}

impl CourseService {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn create_course(&self, actor: UserId, request: NewCourse) -> Result<Course> {
        let title = required_title(&request.title)?;
        check_price(request.price)?;

        let mut tx = self.store.begin();
        let professor = directory::require_professor(&tx, actor)?;
        let now = Utc::now();
        let course = Course {
            id: CourseId::new(),
            professor_id: professor.id,
            title,
            description: request.description.trim().to_string(),
            price: request.price,
            created_at: now,
            updated_at: now,
        };
        tx.put(course.clone());
        tx.commit()?;

        tracing::info!(course_id = %course.id, professor_id = %professor.id, "Created course");
        Ok(course)
    }

    pub async fn update_course(
        &self,
        actor: UserId,
        course_id: CourseId,
        update: CourseUpdate,
    ) -> Result<Course> {
        let title = update.title.as_deref().map(required_title).transpose()?;
        if let Some(price) = update.price {
            check_price(price)?;
        }

        let mut tx = self.store.begin();
        let mut course = owned_course(&mut tx, actor, course_id).await?;
        if let Some(title) = title {
            course.title = title;
        }
        if let Some(description) = update.description {
            course.description = description.trim().to_string();
        }
        if let Some(price) = update.price {
            course.price = price;
        }
        course.updated_at = Utc::now();
        tx.put(course.clone());
        tx.commit()?;

        tracing::info!(course_id = %course.id, "Updated course");
        Ok(course)
    }

    pub fn get_course(&self, course_id: CourseId) -> Result<CourseDetails> {
        let course = self
            .store
            .get::<Course>(course_id)?
            .ok_or_else(|| MarketError::not_found("Course not found"))?;
        let lessons = lessons_of(&*self.store, course_id)?;
        Ok(CourseDetails { course, lessons })
    }

    /// Newest first, optionally narrowed to one professor and a
    /// case-insensitive title/description search
    pub fn list_courses(
        &self,
        professor_id: Option<ProfessorId>,
        search: Option<&str>,
    ) -> Result<Vec<Course>> {
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut courses = self.store.find(|c: &Course| {
            professor_id.is_none_or(|id| c.professor_id == id)
                && needle.as_deref().is_none_or(|needle| {
                    c.title.to_lowercase().contains(needle)
                        || c.description.to_lowercase().contains(needle)
                })
        })?;
        courses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(courses)
    }

    /// Remove a course and its lessons
    ///
    /// Fails with `Conflict` once anyone paid for it or holds a live booking
    /// for it.
    pub async fn delete_course(&self, actor: UserId, course_id: CourseId) -> Result<()> {
        let mut tx = self.store.begin();
        owned_course(&mut tx, actor, course_id).await?;

        let purchased = tx.find_one(|p: &Payment| {
            p.is_paid() && p.target == PaymentTarget::Course(course_id)
        })?;
        if purchased.is_some() {
            return Err(MarketError::conflict("Course has been purchased"));
        }
        let booked = tx.find_one(|b: &Booking| {
            b.course_id == Some(course_id) && b.status != BookingStatus::Canceled
        })?;
        if booked.is_some() {
            return Err(MarketError::conflict("Course has active bookings"));
        }

        for lesson in lessons_of(&tx, course_id)? {
            tx.delete::<Lesson>(lesson.id);
        }
        tx.delete::<Course>(course_id);
        tx.commit()?;

        tracing::info!(course_id = %course_id, "Deleted course");
        Ok(())
    }

    pub async fn add_lesson(
        &self,
        actor: UserId,
        course_id: CourseId,
        request: NewLesson,
    ) -> Result<Lesson> {
        let title = required_title(&request.title)?;

        let mut tx = self.store.begin();
        owned_course(&mut tx, actor, course_id).await?;
        let position = match request.position {
            Some(position) => position,
            None => lessons_of(&tx, course_id)?
                .last()
                .map_or(1, |lesson| lesson.position + 1),
        };

        let lesson = Lesson {
            id: LessonId::new(),
            course_id,
            title,
            content: request.content,
            position,
            created_at: Utc::now(),
        };
        tx.put(lesson.clone());
        tx.commit()?;

        tracing::info!(lesson_id = %lesson.id, course_id = %course_id, "Added lesson");
        Ok(lesson)
    }

    pub async fn update_lesson(
        &self,
        actor: UserId,
        lesson_id: LessonId,
        update: LessonUpdate,
    ) -> Result<Lesson> {
        let title = update.title.as_deref().map(required_title).transpose()?;

        let course_id = self.lesson(lesson_id)?.course_id;
        let mut tx = self.store.begin();
        owned_course(&mut tx, actor, course_id).await?;
        let mut lesson = tx
            .get::<Lesson>(lesson_id)?
            .ok_or_else(|| MarketError::not_found("Lesson not found"))?;

        if let Some(title) = title {
            lesson.title = title;
        }
        if let Some(content) = update.content {
            lesson.content = content;
        }
        if let Some(position) = update.position {
            lesson.position = position;
        }
        tx.put(lesson.clone());
        tx.commit()?;

        tracing::debug!(lesson_id = %lesson.id, "Updated lesson");
        Ok(lesson)
    }

    pub async fn delete_lesson(&self, actor: UserId, lesson_id: LessonId) -> Result<()> {
        let lesson = self.lesson(lesson_id)?;

        let mut tx = self.store.begin();
        owned_course(&mut tx, actor, lesson.course_id).await?;
        tx.delete::<Lesson>(lesson_id);
        tx.commit()?;

        tracing::info!(lesson_id = %lesson_id, course_id = %lesson.course_id, "Deleted lesson");
        Ok(())
    }

    fn lesson(&self, lesson_id: LessonId) -> Result<Lesson> {
        self.store
            .get::<Lesson>(lesson_id)?
            .ok_or_else(|| MarketError::not_found("Lesson not found"))
    }
}

/// Lock a course and check the actor is its professor
async fn owned_course(tx: &mut Transaction<'_>, actor: UserId, course_id: CourseId) -> Result<Course> {
    let professor = directory::require_professor(&*tx, actor)?;
    let course = tx
        .lock::<Course>(course_id)
        .await?
        .ok_or_else(|| MarketError::not_found("Course not found"))?;
    if course.professor_id != professor.id {
        return Err(MarketError::forbidden("Course belongs to another professor"));
    }
    Ok(course)
}

fn lessons_of(reader: &impl Reader, course_id: CourseId) -> Result<Vec<Lesson>> {
    let mut lessons = reader.find(|l: &Lesson| l.course_id == course_id)?;
    lessons.sort_by_key(|l| (l.position, l.created_at));
    Ok(lessons)
}

fn required_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(MarketError::validation("Title is required"));
    }
    Ok(title.to_string())
}

fn check_price(price: Decimal) -> Result<()> {
    if price.is_sign_negative() {
        return Err(MarketError::validation("Price cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use tutor_core::{ErrorKind, Professor, User, fixtures};
    use tutor_payments::{MockPaymentProvider, PaymentService, PaymentSettings};
    use tutor_scheduling::{BookingService, NewBooking};

    fn service() -> (Arc<MemoryStore>, CourseService, (User, Professor)) {
        let store = Arc::new(MemoryStore::new());
        let professor = fixtures::professor(&store, None);
        (store.clone(), CourseService::new(store), professor)
    }

    fn new_course(title: &str) -> NewCourse {
        NewCourse {
            title: title.into(),
            description: "Proofs for people who hate proofs".into(),
            price: dec!(75),
        }
    }

    fn new_lesson(title: &str) -> NewLesson {
        NewLesson {
            title: title.into(),
            content: String::new(),
            position: None,
        }
    }

    #[tokio::test]
    async fn test_course_with_ordered_lessons() {
        let (_, courses, (user, professor)) = service();
        let course = courses.create_course(user.id, new_course("Real Analysis")).unwrap();
        assert_eq!(course.professor_id, professor.id);

        let second = courses.add_lesson(user.id, course.id, new_lesson("Limits")).await.unwrap();
        let mut intro = new_lesson("Sets");
        intro.position = Some(0);
        courses.add_lesson(user.id, course.id, intro).await.unwrap();
        let third = courses.add_lesson(user.id, course.id, new_lesson("Continuity")).await.unwrap();

        assert_eq!(second.position, 1);
        assert_eq!(third.position, 2);

        let details = courses.get_course(course.id).unwrap();
        let titles: Vec<_> = details.lessons.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Sets", "Limits", "Continuity"]);
    }

    #[tokio::test]
    async fn test_course_validation_and_ownership() {
        let (store, courses, (user, _)) = service();

        let err = courses.create_course(user.id, new_course("  ")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let mut free_money = new_course("Arbitrage");
        free_money.price = dec!(-5);
        assert_eq!(
            courses.create_course(user.id, free_money).unwrap_err().kind(),
            ErrorKind::Validation
        );

        let (student, _) = fixtures::student(&store);
        let err = courses.create_course(student.id, new_course("Topology")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let course = courses.create_course(user.id, new_course("Topology")).unwrap();
        let (other, _) = fixtures::professor(&store, None);
        let err = courses
            .update_course(other.id, course.id, CourseUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let updated = courses
            .update_course(
                user.id,
                course.id,
                CourseUpdate {
                    price: Some(dec!(80)),
                    ..CourseUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, dec!(80));
        assert_eq!(updated.title, "Topology");
    }

    #[test]
    fn test_list_and_search() {
        let (store, courses, (user, professor)) = service();
        courses.create_course(user.id, new_course("Real Analysis")).unwrap();
        courses.create_course(user.id, new_course("Group Theory")).unwrap();
        let (other, _) = fixtures::professor(&store, None);
        courses.create_course(other.id, new_course("Organic Chemistry")).unwrap();

        assert_eq!(courses.list_courses(None, None).unwrap().len(), 3);
        assert_eq!(courses.list_courses(Some(professor.id), None).unwrap().len(), 2);

        let found = courses.list_courses(None, Some("ANALYSIS")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Real Analysis");
    }

    #[tokio::test]
    async fn test_delete_removes_lessons() {
        let (store, courses, (user, _)) = service();
        let course = courses.create_course(user.id, new_course("Set Theory")).unwrap();
        let lesson = courses.add_lesson(user.id, course.id, new_lesson("ZFC")).await.unwrap();

        courses.delete_course(user.id, course.id).await.unwrap();

        assert_eq!(courses.get_course(course.id).unwrap_err().kind(), ErrorKind::NotFound);
        assert!(store.get::<Lesson>(lesson.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_purchased_course_conflicts() {
        let (store, courses, (user, _)) = service();
        let course = courses.create_course(user.id, new_course("Set Theory")).unwrap();
        let (buyer, _) = fixtures::student(&store);
        let payments = PaymentService::new(
            store.clone(),
            Arc::new(MockPaymentProvider::new()),
            PaymentSettings::default(),
        );
        payments.charge_for_course(buyer.id, course.id).await.unwrap();

        let err = courses.delete_course(user.id, course.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_delete_booked_course_conflicts() {
        let (store, courses, (user, professor)) = service();
        let course = courses.create_course(user.id, new_course("Set Theory")).unwrap();
        let (_, student) = fixtures::student(&store);
        let slot = fixtures::slot(&store, professor.id, Duration::days(2));
        let bookings = BookingService::new(store.clone());
        let booking = bookings
            .create(NewBooking {
                student_id: student.id,
                availability_id: slot.id,
                course_id: Some(course.id),
                notes: None,
            })
            .await
            .unwrap();

        let err = courses.delete_course(user.id, course.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        bookings.cancel(user.id, booking.booking.id).await.unwrap();
        courses.delete_course(user.id, course.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_lesson_edits_require_owner() {
        let (store, courses, (user, _)) = service();
        let course = courses.create_course(user.id, new_course("Set Theory")).unwrap();
        let lesson = courses.add_lesson(user.id, course.id, new_lesson("ZFC")).await.unwrap();
        let (other, _) = fixtures::professor(&store, None);

        let err = courses.delete_lesson(other.id, lesson.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let renamed = courses
            .update_lesson(
                user.id,
                lesson.id,
                LessonUpdate {
                    title: Some("Axioms".into()),
                    ..LessonUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.title, "Axioms");

        courses.delete_lesson(user.id, lesson.id).await.unwrap();
        assert!(courses.get_course(course.id).unwrap().lessons.is_empty());
    }
}
