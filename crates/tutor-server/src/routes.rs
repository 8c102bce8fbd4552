//! Route table

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    accounts, availability, bookings, courses, health_check, messages, payments, profiles, reviews,
};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // Accounts & profiles
        .route("/api/auth/register", post(accounts::register))
        .route("/api/auth/login", post(accounts::login))
        .route("/api/professors", get(profiles::list_professors))
        .route("/api/professors/me", put(profiles::update_professor))
        .route("/api/professors/{id}", get(profiles::get_professor))
        .route("/api/students/me", put(profiles::update_student))
        .route("/api/students/{id}", get(profiles::get_student))
        // Scheduling
        .route("/api/professors/{id}/availability", get(availability::list_slots))
        .route("/api/availability", post(availability::create_slot))
        .route("/api/availability/{id}", axum::routing::delete(availability::delete_slot))
        .route(
            "/api/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/api/bookings/{id}", get(bookings::get_booking))
        .route("/api/bookings/{id}/cancel", post(bookings::cancel_booking))
        .route("/api/bookings/{id}/confirm", post(bookings::confirm_booking))
        .route("/api/bookings/{id}/complete", post(bookings::complete_booking))
        // Payments
        .route("/api/payments", get(payments::list_payments))
        .route("/api/payments/bookings/{id}", post(payments::pay_booking))
        .route("/api/payments/courses/{id}", post(payments::pay_course))
        // Courses & reviews
        .route(
            "/api/courses",
            get(courses::list_courses).post(courses::create_course),
        )
        .route(
            "/api/courses/{id}",
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route("/api/courses/{id}/lessons", post(courses::add_lesson))
        .route(
            "/api/lessons/{id}",
            put(courses::update_lesson).delete(courses::delete_lesson),
        )
        .route("/api/reviews", post(reviews::create_review))
        .route("/api/courses/{id}/reviews", get(reviews::course_reviews))
        .route("/api/professors/{id}/reviews", get(reviews::professor_reviews))
        // Messaging
        .route(
            "/api/conversations",
            get(messages::list_conversations).post(messages::start_conversation),
        )
        .route(
            "/api/conversations/{id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use chrono::{Duration, Utc};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use tutor_core::{MemoryStore, TokenSigner};
    use tutor_payments::{MockPaymentProvider, PaymentSettings};

    fn app() -> Router {
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            TokenSigner::new("route-test-secret", Duration::hours(1)),
            Arc::new(MockPaymentProvider::new()),
            PaymentSettings::default(),
        );
        router(state)
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, email: &str, role: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": email,
                "password": "correct-horse",
                "name": email.split('@').next().unwrap(),
                "role": role,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn my_professor_id(app: &Router, token: &str) -> String {
        let (_, body) = call(app, "PUT", "/api/professors/me", Some(token), Some(json!({}))).await;
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["payment_provider"], "mock");
    }

    #[tokio::test]
    async fn test_auth_required() {
        let app = app();

        let (status, body) = call(&app, "GET", "/api/bookings", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_ERROR");

        let (status, _) = call(&app, "GET", "/api/bookings", Some("forged.token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_and_duplicate_registration() {
        let app = app();
        register(&app, "ada@example.com", "STUDENT").await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "correct-horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "STUDENT");
        assert!(body["user"].get("password_hash").is_none());

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": "ADA@example.com",
                "password": "correct-horse",
                "name": "Ada",
                "role": "STUDENT",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_book_and_pay_flow() {
        let app = app();
        let professor = register(&app, "grace@example.com", "PROFESSOR").await;
        let student = register(&app, "alan@example.com", "STUDENT").await;
        let professor_id = my_professor_id(&app, &professor).await;

        let start = Utc::now() + Duration::days(1);
        let (status, slot) = call(
            &app,
            "POST",
            "/api/availability",
            Some(professor.as_str()),
            Some(json!({
                "start_time": start,
                "end_time": start + Duration::hours(1),
                "timezone": "Europe/London",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{slot}");

        // Students cannot publish availability
        let (status, _) = call(
            &app,
            "POST",
            "/api/availability",
            Some(student.as_str()),
            Some(json!({ "start_time": start, "end_time": start + Duration::hours(1) })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, booking) = call(
            &app,
            "POST",
            "/api/bookings",
            Some(student.as_str()),
            Some(json!({ "availability_id": slot["id"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{booking}");
        assert_eq!(booking["status"], "PENDING");
        let booking_id = booking["id"].as_str().unwrap();

        let (status, _) = call(
            &app,
            "POST",
            "/api/bookings",
            Some(student.as_str()),
            Some(json!({ "availability_id": slot["id"] })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let pay = format!("/api/payments/bookings/{booking_id}");
        let (status, payment) = call(&app, "POST", &pay, Some(student.as_str()), None).await;
        assert_eq!(status, StatusCode::OK, "{payment}");
        assert_eq!(payment["status"], "PAID");
        assert_eq!(payment["amount"], "50.00");

        let (status, _) = call(&app, "POST", &pay, Some(student.as_str()), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, booking) = call(&app, "GET", &format!("/api/bookings/{booking_id}"), Some(professor.as_str()), None).await;
        assert_eq!(booking["status"], "CONFIRMED");

        let (_, free) = call(
            &app,
            "GET",
            &format!("/api/professors/{professor_id}/availability"),
            None,
            None,
        )
        .await;
        assert_eq!(free.as_array().unwrap().len(), 0);

        let (_, all) = call(
            &app,
            "GET",
            &format!("/api/professors/{professor_id}/availability?include_booked=true"),
            None,
            None,
        )
        .await;
        assert_eq!(all.as_array().unwrap().len(), 1);

        let (status, payments) = call(&app, "GET", "/api/payments", Some(student.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payments.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_review_gated_on_purchase() {
        let app = app();
        let professor = register(&app, "emmy@example.com", "PROFESSOR").await;
        let student = register(&app, "kurt@example.com", "STUDENT").await;

        let (status, course) = call(
            &app,
            "POST",
            "/api/courses",
            Some(professor.as_str()),
            Some(json!({ "title": "Abstract Algebra", "price": "120.00" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{course}");
        let course_id = course["id"].as_str().unwrap();
        let review = json!({ "course_id": course_id, "rating": 5, "comment": "Rings!" });

        let (status, body) = call(&app, "POST", "/api/reviews", Some(student.as_str()), Some(review.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/payments/courses/{course_id}"),
            Some(student.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, "POST", "/api/reviews", Some(student.as_str()), Some(review.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "POST", "/api/reviews", Some(student.as_str()), Some(review)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, reviews) = call(&app, "GET", &format!("/api/courses/{course_id}/reviews"), None, None).await;
        assert_eq!(reviews.as_array().unwrap().len(), 1);

        let (status, _) = call(&app, "DELETE", &format!("/api/courses/{course_id}"), Some(professor.as_str()), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_declined_payment_is_402() {
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            TokenSigner::new("route-test-secret", Duration::hours(1)),
            Arc::new(MockPaymentProvider::declining()),
            PaymentSettings::default(),
        );
        let app = router(state);
        let professor = register(&app, "emmy@example.com", "PROFESSOR").await;
        let student = register(&app, "kurt@example.com", "STUDENT").await;

        let (_, course) = call(
            &app,
            "POST",
            "/api/courses",
            Some(professor.as_str()),
            Some(json!({ "title": "Galois Theory", "price": "80" })),
        )
        .await;
        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/payments/courses/{}", course["id"].as_str().unwrap()),
            Some(student.as_str()),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["code"], "PAYMENT_ERROR");
    }

    #[tokio::test]
    async fn test_messaging_routes() {
        let app = app();
        let professor = register(&app, "grace@example.com", "PROFESSOR").await;
        let student = register(&app, "alan@example.com", "STUDENT").await;
        let professor_id = my_professor_id(&app, &professor).await;

        let (status, conversation) = call(
            &app,
            "POST",
            "/api/conversations",
            Some(student.as_str()),
            Some(json!({ "professor_id": professor_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{conversation}");
        let uri = format!("/api/conversations/{}/messages", conversation["id"].as_str().unwrap());

        let (status, _) = call(&app, "POST", &uri, Some(student.as_str()), Some(json!({ "body": "Hello!" }))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, messages) = call(&app, "GET", &uri, Some(professor.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(messages[0]["body"], "Hello!");

        let (_, inbox) = call(&app, "GET", "/api/conversations", Some(professor.as_str()), None).await;
        assert_eq!(inbox[0]["unread"], 0);
    }
}
