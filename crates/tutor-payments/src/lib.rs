//! # tutor-payments
//!
//! Charges for tutoring sessions and course purchases.
//!
//! Money moves through a [`PaymentProvider`] (strategy pattern); the
//! [`PaymentService`] owns the bookkeeping around it: who may pay, what it
//! costs, and the atomic hand-off from "charged" to "booking confirmed".
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tutor_payments::{MockPaymentProvider, PaymentService, PaymentSettings};
//!
//! let payments = PaymentService::new(
//!     store.clone(),
//!     Arc::new(MockPaymentProvider::new()),
//!     PaymentSettings::default(),
//! );
//! let payment = payments.charge_for_booking(user_id, booking_id).await?;
//! ```

pub mod processor;
pub mod provider;

pub use processor::{PaymentService, PaymentSettings};
pub use provider::{
    MockPaymentProvider, PaymentMetadata, PaymentProvider, ProviderCharge, ProviderRefund,
};
