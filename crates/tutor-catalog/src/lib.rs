//! # tutor-catalog
//!
//! Everything around the booking core: accounts, profiles, courses and
//! lessons, reviews, and student/professor messaging.
//!
//! Each operation is a single store transaction. Role checks go through
//! [`tutor_core::directory`], so callers pass the acting user's id and the
//! service decides what that user may do.

pub mod accounts;
pub mod courses;
pub mod messaging;
pub mod profiles;
pub mod reviews;

pub use accounts::{AccountService, Registration};
pub use courses::{CourseDetails, CourseService, CourseUpdate, LessonUpdate, NewCourse, NewLesson};
pub use messaging::{ConversationSummary, MessagingService};
pub use profiles::{ProfessorProfile, ProfessorUpdate, ProfileService, StudentProfile, StudentUpdate};
pub use reviews::{NewReview, RatingSummary, ReviewService};
