//! Payment Processor
//!
//! Charges students for booked sessions and course purchases. Each charge runs
//! in one store transaction that holds the row lock on the thing being paid
//! for while the provider is called, so concurrent attempts on the same
//! booking or course serialize and only the first can succeed.
//!
//! ```text
//! lock booking ─▶ checks ─▶ lock slot ─▶ provider ─▶ payment + CONFIRMED + booked ─▶ commit
//!                                            │
//!                                            └─ declined ─▶ rollback, nothing written
//! ```

use std::sync::{Arc, RwLock};

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use tutor_core::directory;
use tutor_core::{
    AvailabilitySlot, Booking, BookingId, BookingStatus, Course, CourseId, MarketError,
    MemoryStore, Payment, PaymentId, PaymentStatus, PaymentTarget, Professor, ProfessorId, Reader,
    Result, Student, StudentId, UserId,
};
use tutor_scheduling::AvailabilityLedger;

use crate::provider::{PaymentMetadata, PaymentProvider, ProviderCharge};

/// Pricing knobs for charges
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// ISO currency code recorded on every payment
    pub currency: String,

    /// Session price when the professor has no hourly rate
    pub default_session_amount: Decimal,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            currency: "USD".into(),
            default_session_amount: dec!(50.00),
        }
    }
}

/// Executes charges through the active [`PaymentProvider`]
pub struct PaymentService {
    store: Arc<MemoryStore>,
    provider: RwLock<Arc<dyn PaymentProvider>>,
    settings: PaymentSettings,
}

impl PaymentService {
    pub fn new(
        store: Arc<MemoryStore>,
        provider: Arc<dyn PaymentProvider>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            store,
            provider: RwLock::new(provider),
            settings,
        }
    }

    /// Replace the active provider
    ///
    /// Charges already in flight finish on the provider they started with.
    pub fn set_provider(&self, provider: Arc<dyn PaymentProvider>) {
        let mut active = match self.provider.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tracing::info!(from = active.name(), to = provider.name(), "Switched payment provider");
        *active = provider;
    }

    pub fn provider_name(&self) -> String {
        self.provider().name().to_string()
    }

    pub fn settings(&self) -> &PaymentSettings {
        &self.settings
    }

    fn provider(&self) -> Arc<dyn PaymentProvider> {
        match self.provider.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Pay for a booked session and confirm it
    ///
    /// The amount is the professor's hourly rate, or the default session
    /// amount when none is set. On success the booking ends up `CONFIRMED`
    /// and its slot booked. A decline leaves every row untouched.
    pub async fn charge_for_booking(&self, payer: UserId, booking_id: BookingId) -> Result<Payment> {
        let mut tx = self.store.begin();

        let mut booking = tx
            .lock::<Booking>(booking_id)
            .await?
            .ok_or_else(|| MarketError::not_found("Booking not found"))?;

        let student = tx
            .get::<Student>(booking.student_id)?
            .filter(|student| student.user_id == payer)
            .ok_or_else(|| MarketError::forbidden("Only the booking's student can pay for it"))?;

        if booking.status.is_terminal() {
            return Err(MarketError::conflict(format!(
                "Cannot pay for a {} booking",
                booking.status.as_str().to_lowercase()
            )));
        }
        if paid_for(&tx, PaymentTarget::Booking(booking_id))?.is_some() {
            return Err(MarketError::conflict("Booking is already paid"));
        }

        let slot = tx
            .lock::<AvailabilitySlot>(booking.availability_id)
            .await?
            .ok_or_else(|| MarketError::not_found("Availability slot not found"))?;

        let amount = tx
            .get::<Professor>(booking.professor_id)?
            .and_then(|professor| professor.hourly_rate)
            .unwrap_or(self.settings.default_session_amount);

        let mut metadata = PaymentMetadata::new();
        metadata.insert("booking_id".into(), booking_id.to_string());
        metadata.insert("student_id".into(), student.id.to_string());

        let provider = self.provider();
        let charge = self.execute(provider.as_ref(), amount, &metadata).await?;

        let payment = self.record(
            student.id,
            Some(booking.professor_id),
            PaymentTarget::Booking(booking_id),
            amount,
            provider.name(),
            &charge,
        );
        tx.put(payment.clone());

        if booking.status == BookingStatus::Pending {
            booking.advance(BookingStatus::Confirmed)?;
            tx.put(booking);
        }
        AvailabilityLedger::mark_booked(&mut tx, slot.id)?;

        if let Err(e) = tx.commit() {
            compensate(provider.as_ref(), &payment).await;
            return Err(e.into());
        }

        tracing::info!(
            payment_id = %payment.id,
            booking_id = %booking_id,
            amount = %amount,
            provider = provider.name(),
            "Booking paid"
        );
        Ok(payment)
    }

    /// Buy a course
    ///
    /// Attempts by the same student serialize on the student row, so a course
    /// is paid at most once per student. The course row is locked after it.
    pub async fn charge_for_course(&self, payer: UserId, course_id: CourseId) -> Result<Payment> {
        let mut tx = self.store.begin();

        let student = directory::require_student(&tx, payer)?;
        tx.lock::<Student>(student.id).await?;

        let course = tx
            .lock::<Course>(course_id)
            .await?
            .ok_or_else(|| MarketError::not_found("Course not found"))?;

        if paid_by(&tx, student.id, PaymentTarget::Course(course_id))?.is_some() {
            return Err(MarketError::conflict("Course is already purchased"));
        }

        let mut metadata = PaymentMetadata::new();
        metadata.insert("course_id".into(), course_id.to_string());
        metadata.insert("student_id".into(), student.id.to_string());

        let provider = self.provider();
        let charge = self.execute(provider.as_ref(), course.price, &metadata).await?;

        let payment = self.record(
            student.id,
            Some(course.professor_id),
            PaymentTarget::Course(course_id),
            course.price,
            provider.name(),
            &charge,
        );
        tx.put(payment.clone());

        if let Err(e) = tx.commit() {
            compensate(provider.as_ref(), &payment).await;
            return Err(e.into());
        }

        tracing::info!(
            payment_id = %payment.id,
            course_id = %course_id,
            amount = %course.price,
            "Course purchased"
        );
        Ok(payment)
    }

    /// A student's payments, newest first
    pub fn list_for_student(&self, student_id: StudentId) -> Result<Vec<Payment>> {
        let mut payments = self.store.find(|p: &Payment| p.student_id == student_id)?;
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    pub fn has_paid_for_course(&self, student_id: StudentId, course_id: CourseId) -> Result<bool> {
        Ok(paid_by(&*self.store, student_id, PaymentTarget::Course(course_id))?.is_some())
    }

    pub fn paid_for_booking(&self, booking_id: BookingId) -> Result<Option<Payment>> {
        paid_for(&*self.store, PaymentTarget::Booking(booking_id))
    }

    async fn execute(
        &self,
        provider: &dyn PaymentProvider,
        amount: Decimal,
        metadata: &PaymentMetadata,
    ) -> Result<ProviderCharge> {
        let charge = provider
            .process_payment(amount, &self.settings.currency, metadata)
            .await?;

        if !charge.success {
            let reason = charge
                .message
                .clone()
                .unwrap_or_else(|| "Payment was declined".into());
            tracing::warn!(provider = provider.name(), amount = %amount, %reason, "Charge declined");
            return Err(MarketError::Payment(reason));
        }
        Ok(charge)
    }

    fn record(
        &self,
        student_id: StudentId,
        professor_id: Option<ProfessorId>,
        target: PaymentTarget,
        amount: Decimal,
        provider: &str,
        charge: &ProviderCharge,
    ) -> Payment {
        Payment {
            id: PaymentId::new(),
            student_id,
            professor_id,
            target,
            amount,
            currency: self.settings.currency.clone(),
            provider: provider.to_string(),
            status: PaymentStatus::Paid,
            external_ref: charge.external_ref.clone(),
            created_at: Utc::now(),
        }
    }
}

fn paid_for(reader: &impl Reader, target: PaymentTarget) -> Result<Option<Payment>> {
    Ok(reader.find_one(|p: &Payment| p.is_paid() && p.target == target)?)
}

fn paid_by(reader: &impl Reader, student_id: StudentId, target: PaymentTarget) -> Result<Option<Payment>> {
    Ok(reader.find_one(|p: &Payment| {
        p.is_paid() && p.student_id == student_id && p.target == target
    })?)
}

/// Best-effort refund of a charge whose bookkeeping failed to commit
async fn compensate(provider: &dyn PaymentProvider, payment: &Payment) {
    let Some(external_ref) = payment.external_ref.as_deref() else {
        return;
    };
    match provider.refund(external_ref, payment.amount).await {
        Ok(refund) if refund.success => {
            tracing::warn!(%external_ref, "Refunded charge after failed commit");
        }
        _ => {
            tracing::error!(%external_ref, amount = %payment.amount, "Charge succeeded but was neither recorded nor refunded");
        }
    }
}
