//! Payment Providers
//!
//! Abstractions and implementations for the component that actually moves
//! money. The processor only ever talks to [`PaymentProvider`], so a real
//! gateway replaces the mock without touching any caller.

mod mock;

pub use mock::MockPaymentProvider;

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tutor_core::{PaymentStatus, Result};

/// Free-form key/value context passed along with a charge
pub type PaymentMetadata = HashMap<String, String>;

/// Outcome of a charge attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderCharge {
    pub success: bool,

    /// Provider-side transaction reference
    pub external_ref: Option<String>,

    /// `Paid` on success, `Failed` on decline
    pub status: PaymentStatus,

    /// Decline reason, if any
    #[serde(default)]
    pub message: Option<String>,
}

impl ProviderCharge {
    pub fn paid(external_ref: impl Into<String>) -> Self {
        Self {
            success: true,
            external_ref: Some(external_ref.into()),
            status: PaymentStatus::Paid,
            message: None,
        }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            external_ref: None,
            status: PaymentStatus::Failed,
            message: Some(reason.into()),
        }
    }
}

/// Outcome of a refund attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderRefund {
    pub success: bool,
    pub external_ref: String,

    /// `Refunded` on success
    pub status: PaymentStatus,
}

/// Payment provider trait (Strategy pattern)
///
/// Implement this for each gateway: Stripe, PayPal, Adyen, etc.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Charge `amount` in `currency`
    ///
    /// A decline is a successful call returning `success: false`; `Err` is
    /// reserved for the provider being unreachable.
    async fn process_payment(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: &PaymentMetadata,
    ) -> Result<ProviderCharge>;

    /// Return `amount` of a previous charge
    async fn refund(&self, external_ref: &str, amount: Decimal) -> Result<ProviderRefund>;

    /// Provider name recorded on every payment
    fn name(&self) -> &str;
}
