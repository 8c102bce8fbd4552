//! Review Eligibility Gate
//!
//! A course review needs proof of purchase, read from the payment records.
//! A professor-only review needs a completed session with that professor.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tutor_core::directory;
use tutor_core::{
    Booking, BookingStatus, Course, CourseId, MarketError, MemoryStore, Professor, ProfessorId,
    Reader, Result, Review, ReviewId, UserId,
};
use tutor_payments::PaymentService;

#[derive(Clone, Debug, Deserialize)]
pub struct NewReview {
    #[serde(default)]
    pub course_id: Option<CourseId>,
    #[serde(default)]
    pub professor_id: Option<ProfessorId>,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Mean rating over every review that names a professor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSummary {
    /// Rounded to two places; `None` without reviews
    pub average: Option<Decimal>,
    pub count: usize,
}

pub struct ReviewService {
    store: Arc<MemoryStore>,
    payments: Arc<PaymentService>,
}

impl ReviewService {
    pub fn new(store: Arc<MemoryStore>, payments: Arc<PaymentService>) -> Self {
        Self { store, payments }
    }

    pub fn create_review(&self, actor: UserId, request: NewReview) -> Result<Review> {
        if !(1..=5).contains(&request.rating) {
            return Err(MarketError::validation("Rating must be between 1 and 5"));
        }

        let mut tx = self.store.begin();
        let student = directory::require_student(&tx, actor)?;

        let professor_id = match (request.course_id, request.professor_id) {
            (None, None) => {
                return Err(MarketError::validation("A review needs a course or a professor"));
            }
            (Some(course_id), professor_id) => {
                let course = tx
                    .get::<Course>(course_id)?
                    .ok_or_else(|| MarketError::not_found("Course not found"))?;
                if professor_id.is_some_and(|id| id != course.professor_id) {
                    return Err(MarketError::validation("Course is taught by another professor"));
                }

                let reviewed = tx.find_one(|r: &Review| {
                    r.student_id == student.id && r.course_id == Some(course_id)
                })?;
                if reviewed.is_some() {
                    return Err(MarketError::conflict("You have already reviewed this course"));
                }
                if !self.payments.has_paid_for_course(student.id, course_id)? {
                    return Err(MarketError::forbidden("Purchase the course before reviewing it"));
                }
                course.professor_id
            }
            (None, Some(professor_id)) => {
                if tx.get::<Professor>(professor_id)?.is_none() {
                    return Err(MarketError::not_found("Professor not found"));
                }
                let completed = tx.find_one(|b: &Booking| {
                    b.student_id == student.id
                        && b.professor_id == professor_id
                        && b.status == BookingStatus::Completed
                })?;
                if completed.is_none() {
                    return Err(MarketError::forbidden(
                        "Complete a session with this professor before reviewing them",
                    ));
                }
                professor_id
            }
        };

        let review = Review {
            id: ReviewId::new(),
            student_id: student.id,
            course_id: request.course_id,
            professor_id: Some(professor_id),
            rating: request.rating,
            comment: request
                .comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            created_at: Utc::now(),
        };
        tx.put(review.clone());
        tx.commit()?;

        tracing::info!(
            review_id = %review.id,
            student_id = %student.id,
            professor_id = %professor_id,
            rating = review.rating,
            "Review posted"
        );
        Ok(review)
    }

    /// Newest first
    pub fn list_for_course(&self, course_id: CourseId) -> Result<Vec<Review>> {
        self.list(|r| r.course_id == Some(course_id))
    }

    /// Newest first
    pub fn list_for_professor(&self, professor_id: ProfessorId) -> Result<Vec<Review>> {
        self.list(|r| r.professor_id == Some(professor_id))
    }

    pub fn rating_summary(&self, professor_id: ProfessorId) -> Result<RatingSummary> {
        rating_summary(&*self.store, professor_id)
    }

    fn list(&self, filter: impl Fn(&Review) -> bool) -> Result<Vec<Review>> {
        let mut reviews = self.store.find(filter)?;
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }
}

pub fn rating_summary(reader: &impl Reader, professor_id: ProfessorId) -> Result<RatingSummary> {
    let ratings = reader.find(|r: &Review| r.professor_id == Some(professor_id))?;
    let count = ratings.len();
    let average = (count > 0).then(|| {
        let total: Decimal = ratings.iter().map(|r| Decimal::from(r.rating)).sum();
        (total / Decimal::from(count)).round_dp(2)
    });
    Ok(RatingSummary { average, count })
}
